//! JWT bearer-token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use spire_core::{ClaimSet, Principal, ServicePrincipal, UserPrincipal};
use tracing::debug;

use crate::error::AuthResult;

/// Default clock-skew leeway applied to expiry and not-before checks.
const DEFAULT_LEEWAY_SECONDS: u64 = 120;

/// Signing key material for token verification.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    /// HMAC shared secret (HS256).
    HmacSecret(String),
    /// RSA public key in PEM form (RS256).
    RsaPem(String),
}

/// Validates JWT bearer tokens and extracts the caller [`Principal`].
///
/// The validator is built once at startup from configuration and shared
/// across requests. Validation checks the signature, issuer, audience, and
/// expiry (with clock-skew leeway), folds the claims, and discriminates
/// user from service principals on the presence of a `client_id` claim.
///
/// All failure modes return `None` from [`validate`](TokenValidator::validate);
/// the function never errors and never panics.
///
/// # Example
///
/// ```
/// use spire_auth::{KeyMaterial, TokenValidator};
///
/// let validator = TokenValidator::new(
///     &KeyMaterial::HmacSecret("test-secret".to_string()),
///     "https://issuer.example.com",
///     "spire-api",
/// )
/// .expect("HMAC key material is always valid");
///
/// assert!(validator.validate("not a token").is_none());
/// ```
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
    issuer: String,
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("validation", &self.validation)
            .field("issuer", &self.issuer)
            .finish_non_exhaustive()
    }
}

impl TokenValidator {
    /// Builds a validator from key material, expected issuer, and expected
    /// audience, with the default 120-second leeway.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`](crate::AuthError) when RSA PEM material cannot
    /// be parsed. HMAC material never fails.
    pub fn new(
        key: &KeyMaterial,
        issuer: impl Into<String>,
        audience: impl Into<String>,
    ) -> AuthResult<Self> {
        let (decoding_key, algorithm) = match key {
            KeyMaterial::HmacSecret(secret) => {
                (DecodingKey::from_secret(secret.as_bytes()), Algorithm::HS256)
            }
            KeyMaterial::RsaPem(pem) => {
                (DecodingKey::from_rsa_pem(pem.as_bytes())?, Algorithm::RS256)
            }
        };

        let issuer = issuer.into();
        let mut validation = Validation::new(algorithm);
        validation.set_issuer(&[&issuer]);
        validation.set_audience(&[&audience.into()]);
        validation.leeway = DEFAULT_LEEWAY_SECONDS;

        Ok(Self {
            decoding_key,
            validation,
            issuer,
        })
    }

    /// Overrides the clock-skew leeway in seconds.
    #[must_use]
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.validation.leeway = seconds;
        self
    }

    /// Validates a bearer token and extracts the caller principal.
    ///
    /// The raw header value is normalized first: surrounding whitespace and
    /// double quotes are trimmed, and a leading case-insensitive `Bearer `
    /// prefix is stripped.
    ///
    /// Returns `None` for every failure mode: malformed tokens, bad
    /// signatures, wrong issuer or audience, and expired tokens.
    #[must_use]
    pub fn validate(&self, token: &str) -> Option<Principal> {
        let token = normalize(token);
        if token.is_empty() {
            return None;
        }

        let data = match jsonwebtoken::decode::<serde_json::Value>(
            token,
            &self.decoding_key,
            &self.validation,
        ) {
            Ok(data) => data,
            Err(error) => {
                debug!(error = %error, "Token validation failed");
                return None;
            }
        };

        let map = data.claims.as_object()?;
        let claims = fold_claims(map);
        let issuer = claims
            .get("iss")
            .unwrap_or(self.issuer.as_str())
            .to_string();

        let principal = match claims.get("client_id") {
            Some(client_id) => {
                let client_id = client_id.to_string();
                Principal::Service(ServicePrincipal::from_claims(issuer, client_id, claims))
            }
            None => Principal::User(UserPrincipal::from_claims(issuer, claims)),
        };
        Some(principal)
    }
}

/// Trims whitespace, surrounding double quotes, and a leading
/// case-insensitive `Bearer ` prefix.
fn normalize(token: &str) -> &str {
    let token = token.trim();
    let token = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token);
    let token = match token.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &token[7..],
        _ => token,
    };
    token.trim()
}

/// Folds raw JWT claims into a [`ClaimSet`].
///
/// Array-valued claims contribute one instance per element, in element
/// order, so multi-valued role and scope claims accumulate while other
/// claim types keep their first value.
fn fold_claims(map: &serde_json::Map<String, serde_json::Value>) -> ClaimSet {
    let mut claims = ClaimSet::new();
    for (claim_type, value) in map {
        match value {
            serde_json::Value::Array(items) => {
                for item in items {
                    claims.insert(claim_type.clone(), stringify(item));
                }
            }
            other => claims.insert(claim_type.clone(), stringify(other)),
        }
    }
    claims
}

/// Renders a claim value as its string form.
fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
