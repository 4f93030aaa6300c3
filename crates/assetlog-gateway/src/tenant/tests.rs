// crates/assetlog-gateway/src/tenant/tests.rs
// ============================================================================
// Module: Tenant Resolver Tests
// Description: Unit tests for trusted, token, and query tenant handling.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use assetlog_core::TenantId;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use proptest::prelude::*;

use super::RequestContext;
use super::TenantError;
use super::resolve_tenant;
use super::tenant_from_token;

fn tenant(raw: u64) -> TenantId {
    TenantId::from_raw(raw).expect("nonzero tenant")
}

fn token(claims: &str) -> String {
    format!("eyJhbGciOiJub25lIn0.{}.sig", URL_SAFE_NO_PAD.encode(claims))
}

#[test]
fn trusted_org_id_wins_over_token() {
    let context = RequestContext {
        trusted_org_id: Some(7),
        identity_token: Some(token(r#"{"aud":"org:9"}"#)),
        query_tenant: None,
    };
    assert_eq!(resolve_tenant(&context), Ok(tenant(7)));
}

#[test]
fn token_audience_string_resolves() {
    assert_eq!(tenant_from_token(&token(r#"{"aud":"org:42"}"#)), Some(tenant(42)));
}

#[test]
fn token_audience_array_resolves() {
    let claims = r#"{"aud":["grafana","org:13"],"namespace":"org-99"}"#;
    assert_eq!(tenant_from_token(&token(claims)), Some(tenant(13)));
}

#[test]
fn token_namespace_claim_resolves() {
    assert_eq!(tenant_from_token(&token(r#"{"namespace":"org-5"}"#)), Some(tenant(5)));
}

#[test]
fn token_with_padding_and_bearer_prefix_resolves() {
    let claims = r#"{"aud":"org:8"}"#;
    let padded = format!("Bearer h.{}.s", URL_SAFE.encode(claims));
    assert_eq!(tenant_from_token(&padded), Some(tenant(8)));
}

#[test]
fn malformed_tokens_do_not_resolve() {
    assert_eq!(tenant_from_token(""), None);
    assert_eq!(tenant_from_token("only.two"), None);
    assert_eq!(tenant_from_token("a.b.c.d"), None);
    assert_eq!(tenant_from_token("h.%%%.s"), None);
    assert_eq!(tenant_from_token(&token("not json")), None);
    assert_eq!(tenant_from_token(&token(r#"{"aud":"org:0"}"#)), None);
    assert_eq!(tenant_from_token(&token(r#"{"aud":"org:abc"}"#)), None);
    assert_eq!(tenant_from_token(&token(r#"{"aud":42}"#)), None);
    assert_eq!(tenant_from_token(&token(r#"{"sub":"user:1"}"#)), None);
}

#[test]
fn no_source_is_unresolved() {
    let context = RequestContext {
        trusted_org_id: Some(0),
        identity_token: Some(token(r#"{"sub":"user:1"}"#)),
        query_tenant: None,
    };
    assert!(matches!(resolve_tenant(&context), Err(TenantError::Unresolved(_))));
}

#[test]
fn query_tenant_alone_is_not_a_source() {
    let context = RequestContext {
        trusted_org_id: None,
        identity_token: None,
        query_tenant: Some("3".to_string()),
    };
    assert!(matches!(resolve_tenant(&context), Err(TenantError::Unresolved(_))));
}

#[test]
fn query_tenant_matching_is_accepted() {
    let context = RequestContext {
        trusted_org_id: Some(3),
        identity_token: None,
        query_tenant: Some(" 3 ".to_string()),
    };
    assert_eq!(resolve_tenant(&context), Ok(tenant(3)));
}

#[test]
fn blank_query_tenant_is_ignored() {
    for blank in ["", "   "] {
        let context = RequestContext {
            trusted_org_id: Some(42),
            identity_token: None,
            query_tenant: Some(blank.to_string()),
        };
        assert_eq!(resolve_tenant(&context), Ok(tenant(42)));
    }
}

#[test]
fn query_tenant_disagreeing_is_rejected() {
    let context = RequestContext {
        trusted_org_id: Some(3),
        identity_token: None,
        query_tenant: Some("4".to_string()),
    };
    let Err(TenantError::Mismatch { query, resolved }) = resolve_tenant(&context) else {
        panic!("expected mismatch");
    };
    assert_eq!(query, "4");
    assert_eq!(resolved, tenant(3));
}

#[test]
fn unparsable_query_tenant_is_rejected() {
    let context = RequestContext {
        trusted_org_id: None,
        identity_token: Some(token(r#"{"aud":"org:6"}"#)),
        query_tenant: Some("six".to_string()),
    };
    assert!(matches!(resolve_tenant(&context), Err(TenantError::Mismatch { .. })));
}

proptest! {
    #[test]
    fn any_other_query_tenant_is_rejected(trusted in 1_i64 .. 1_000_000, query in 1_u64 .. 1_000_000) {
        prop_assume!(u64::try_from(trusted).ok() != Some(query));
        let context = RequestContext {
            trusted_org_id: Some(trusted),
            identity_token: None,
            query_tenant: Some(query.to_string()),
        };
        let is_mismatch = matches!(resolve_tenant(&context), Err(TenantError::Mismatch { .. }));
        prop_assert!(is_mismatch);
    }
}
