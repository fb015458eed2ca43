//! Per-request resolution from verified claims to a live backend.
//!
//! Every pod/pea handler starts here: derive the tenant address from
//! the token issuer, load the credential record tagged by the token
//! subject, and construct the backend the record names.  The order is
//! fixed; a request that fails an earlier step never reaches a later
//! one.

use crate::auth::{Claims, TenantId};
use crate::credentials::CredentialRecord;
use crate::errors::GatewayError;
use crate::storage::{self, Backend};
use crate::AppState;

/// Everything a backend-facing handler needs for one request.
pub struct RequestContext {
    pub claims: Claims,
    pub tenant: TenantId,
    pub record: CredentialRecord,
    pub backend: Box<dyn Backend>,
}

/// Resolve `claims` to a tenant, its credential record, and a backend.
///
/// The record tag is the token's `sub` claim; the tenant address comes
/// from the issuer key only.  A tenant with no record under that tag
/// gets [`GatewayError::CredentialNotFound`] before any backend work.
pub async fn resolve(state: &AppState, claims: Claims) -> Result<RequestContext, GatewayError> {
    let tenant = TenantId::from_issuer(&claims.iss)?;
    let record = state.credentials.get(&tenant, &claims.sub)?;
    let backend = storage::for_record(&record).await?;
    Ok(RequestContext {
        claims,
        tenant,
        record,
        backend,
    })
}
