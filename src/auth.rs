//! Bearer-token verification and scope-based authorization.
//!
//! Tokens are self-describing EdDSA JWTs: the `iss` claim carries the
//! hex-encoded Ed25519 public key of the signer, so a stateless gateway
//! can authenticate any tenant without a key directory.  The flip side
//! is that the issuer field is attacker-controlled until the signature
//! has been checked against the key it names — [`verify`] never returns
//! claims whose issuer did not actually produce the signature.
//!
//! Scope strings are sets of whitespace-delimited `verb:resource`
//! tokens (`"create:pods read:pea"`).  A capability is granted only by
//! an exact delimited verb match; substring containment is not enough.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::errors::GatewayError;

/// Length of a raw Ed25519 public key in bytes.
const PUBLIC_KEY_LEN: usize = 32;

/// Length of the tenant address suffix taken from the key digest.
const ADDRESS_LEN: usize = 20;

// -- Claims ------------------------------------------------------------------

/// Verified claims extracted from a bearer token.
///
/// Created per request by [`verify`] and never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Hex-encoded Ed25519 public key of the signer (the tenant).
    pub iss: String,
    /// Resource tag the request addresses (e.g. the credential tag "s3").
    pub sub: String,
    /// Space-delimited capability tokens.
    #[serde(default)]
    pub scope: String,
    /// Issued-at, seconds since epoch.
    pub iat: i64,
    /// Expiry, seconds since epoch.  Tokens are valid in `[iat, exp)`.
    pub exp: i64,
}

/// Payload fields read before signature verification.
///
/// Only the issuer is taken from here, and only to look up the key the
/// signature is then checked against.
#[derive(Deserialize)]
struct UnverifiedIssuer {
    iss: String,
}

// -- Token verification ------------------------------------------------------

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: &str) -> Option<&str> {
    let (prefix, token) = header.split_at_checked(7)?;
    if !prefix.eq_ignore_ascii_case("bearer ") || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Verify a bearer token and return its claims.
///
/// The token names its own signer in `iss`; the signature is checked
/// against that key, so a token verifies only if the claimed issuer
/// really produced it.  `leeway` is the allowed clock skew in seconds
/// when enforcing the validity window.
///
/// Pure function of the token and the current time: repeated calls with
/// the same input return equal claims.
pub fn verify(token: &str, leeway: u64) -> Result<Claims, GatewayError> {
    let header = jsonwebtoken::decode_header(token).map_err(|_| GatewayError::InvalidSignature)?;
    if header.alg != Algorithm::EdDSA {
        return Err(GatewayError::InvalidSignature);
    }

    // Peek at the unverified payload only to learn which key to check.
    let issuer = peek_issuer(token)?;
    let key = issuer_decoding_key(&issuer)?;

    let mut validation = Validation::new(Algorithm::EdDSA);
    validation.leeway = leeway;
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let data = decode::<Claims>(token, &key, &validation).map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => GatewayError::TokenExpired,
        _ => GatewayError::InvalidSignature,
    })?;

    let claims = data.claims;
    if claims.exp <= claims.iat {
        // exp > iat is an invariant of well-formed tokens.
        return Err(GatewayError::InvalidSignature);
    }
    if claims.iat > now_secs() + leeway as i64 {
        // Not yet inside the validity window.
        return Err(GatewayError::TokenExpired);
    }
    Ok(claims)
}

/// Decode the payload segment without verifying and return the issuer.
fn peek_issuer(token: &str) -> Result<String, GatewayError> {
    let mut parts = token.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(GatewayError::InvalidSignature);
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| GatewayError::InvalidSignature)?;
    let unverified: UnverifiedIssuer =
        serde_json::from_slice(&bytes).map_err(|_| GatewayError::InvalidSignature)?;
    Ok(unverified.iss)
}

/// Build an EdDSA decoding key from a hex-encoded issuer public key.
fn issuer_decoding_key(issuer: &str) -> Result<DecodingKey, GatewayError> {
    let raw = decode_issuer_key(issuer)?;
    let component = URL_SAFE_NO_PAD.encode(raw);
    DecodingKey::from_ed_components(&component).map_err(|_| GatewayError::InvalidSignature)
}

/// Decode the issuer claim into raw public key bytes.
fn decode_issuer_key(issuer: &str) -> Result<[u8; PUBLIC_KEY_LEN], GatewayError> {
    let hex_str = issuer
        .strip_prefix("0x")
        .or_else(|| issuer.strip_prefix("0X"))
        .unwrap_or(issuer);
    let bytes = hex::decode(hex_str).map_err(|_| GatewayError::InvalidSignature)?;
    bytes
        .try_into()
        .map_err(|_| GatewayError::InvalidSignature)
}

fn now_secs() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

// -- Tenant identity ---------------------------------------------------------

/// Canonical tenant identity derived from a verified issuer public key.
///
/// The address is the hex encoding of the last 20 bytes of
/// SHA-256(public key) — recomputed per request, never stored, and
/// never taken from user-supplied subject or scope fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(String);

impl TenantId {
    /// Derive the tenant address from a verified issuer claim.
    pub fn from_issuer(issuer: &str) -> Result<Self, GatewayError> {
        let raw = decode_issuer_key(issuer)?;
        let digest = Sha256::digest(raw);
        Ok(Self(hex::encode(&digest[digest.len() - ADDRESS_LEN..])))
    }

    /// The address as a lowercase hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// -- Scope authorization -----------------------------------------------------

/// The four capabilities a scope token can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Create,
    Read,
    Update,
    Delete,
}

impl Capability {
    /// The scope verb granting this capability.
    pub fn verb(self) -> &'static str {
        match self {
            Capability::Create => "create",
            Capability::Read => "read",
            Capability::Update => "update",
            Capability::Delete => "delete",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.verb())
    }
}

impl Claims {
    /// Whether the scope grants `capability`.
    ///
    /// The scope is decomposed into whitespace-delimited tokens and the
    /// verb of each token (the part before the first `:`) is compared
    /// exactly.  A verb embedded inside a longer token never matches,
    /// so a crafted scope like `"xread:pods"` grants nothing.
    pub fn allows(&self, capability: Capability) -> bool {
        self.scope.split_whitespace().any(|token| {
            let verb = token.split(':').next().unwrap_or(token);
            verb == capability.verb() || (capability == Capability::Update && verb == "write")
        })
    }

    /// Authorize `capability` or fail with `Forbidden`.
    pub fn authorize(&self, capability: Capability) -> Result<(), GatewayError> {
        if self.allows(capability) {
            Ok(())
        } else {
            Err(GatewayError::Forbidden)
        }
    }
}

// -- Tests -------------------------------------------------------------------
