// crates/assetlog-gateway/src/tenant.rs
// ============================================================================
// Module: Tenant Resolver
// Description: Resolve the tenant for a request from trusted or token sources.
// Purpose: Reject, never guess, when tenant sources disagree.
// Dependencies: assetlog-core, base64, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The host injects a trusted organization id on most requests. When it is
//! absent, the tenant is read best-effort from the caller's identity token:
//! an `aud` claim `org:<id>` (string or array) or a `namespace` claim
//! `org-<id>`. The token signature is not checked here; the host has already
//! authenticated the caller.
//!
//! A tenant id supplied in a query parameter is never a source. It is only
//! cross-checked, and any disagreement (including an unparsable value)
//! rejects the request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use assetlog_core::TenantId;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Audience prefix carrying the org id.
const AUDIENCE_PREFIX: &str = "org:";
/// Namespace prefix carrying the org id.
const NAMESPACE_PREFIX: &str = "org-";
/// Optional scheme prefix on bearer values.
const BEARER_PREFIX: &str = "Bearer ";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Tenant sources available on one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    /// Host-injected organization id; zero or negative means absent.
    pub trusted_org_id: Option<i64>,
    /// Caller identity token (three-segment JWT).
    pub identity_token: Option<String>,
    /// Tenant id supplied by the caller in a query parameter; blank means absent.
    pub query_tenant: Option<String>,
}

/// Tenant resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TenantError {
    /// No source yielded a tenant id.
    #[error("tenant unresolved: {0}")]
    Unresolved(String),
    /// A caller-supplied tenant id disagrees with the resolved tenant.
    #[error("tenant mismatch: query tenant {query} does not match resolved tenant {resolved}")]
    Mismatch {
        /// Query parameter value as supplied.
        query: String,
        /// Tenant resolved from trusted or token sources.
        resolved: TenantId,
    },
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

/// Resolves the tenant for a request.
///
/// # Errors
///
/// Returns [`TenantError::Unresolved`] when neither the trusted id nor the
/// token yields a tenant, and [`TenantError::Mismatch`] when a non-blank
/// query tenant differs from the resolved one.
pub fn resolve_tenant(context: &RequestContext) -> Result<TenantId, TenantError> {
    let trusted = context
        .trusted_org_id
        .and_then(|raw| u64::try_from(raw).ok())
        .and_then(TenantId::from_raw);
    let resolved = match trusted {
        Some(tenant_id) => tenant_id,
        None => context
            .identity_token
            .as_deref()
            .and_then(tenant_from_token)
            .ok_or_else(|| {
                TenantError::Unresolved(
                    "no trusted org id and no org claim in identity token".to_string(),
                )
            })?,
    };
    let query = context.query_tenant.as_deref().filter(|query| !query.trim().is_empty());
    if let Some(query) = query {
        let matches = query.parse::<TenantId>().is_ok_and(|parsed| parsed == resolved);
        if !matches {
            return Err(TenantError::Mismatch {
                query: query.to_string(),
                resolved,
            });
        }
    }
    Ok(resolved)
}

/// Extracts the tenant from an identity token's claims, if present.
#[must_use]
pub fn tenant_from_token(token: &str) -> Option<TenantId> {
    let token = token.trim();
    let token = token.strip_prefix(BEARER_PREFIX).unwrap_or(token).trim();
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (segments.next(), segments.next(), segments.next(), segments.next())
    else {
        return None;
    };
    let bytes = URL_SAFE_NO_PAD.decode(payload).or_else(|_| URL_SAFE.decode(payload)).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    audience_tenant(claims.get("aud"))
        .or_else(|| claims.get("namespace").and_then(Value::as_str).and_then(namespace_tenant))
}

/// Finds an `org:<id>` entry in an audience claim.
fn audience_tenant(audience: Option<&Value>) -> Option<TenantId> {
    match audience? {
        Value::String(value) => prefixed_tenant(value, AUDIENCE_PREFIX),
        Value::Array(values) => values
            .iter()
            .filter_map(Value::as_str)
            .find_map(|value| prefixed_tenant(value, AUDIENCE_PREFIX)),
        _ => None,
    }
}

/// Parses an `org-<id>` namespace claim.
fn namespace_tenant(namespace: &str) -> Option<TenantId> {
    prefixed_tenant(namespace, NAMESPACE_PREFIX)
}

/// Parses `<prefix><id>` into a nonzero tenant id.
fn prefixed_tenant(value: &str, prefix: &str) -> Option<TenantId> {
    value.trim().strip_prefix(prefix)?.parse::<TenantId>().ok()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests;
