//! Caller identity types.
//!
//! This module provides the [`Principal`] type representing an authenticated
//! caller (a human user or a machine client) together with the [`ClaimSet`]
//! map its claims are folded into.
//!
//! A `Principal` is constructed once per inbound request from a validated
//! bearer token and flows through the dispatch pipeline on the request
//! context. It is never persisted.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Claim types whose duplicate values are concatenated instead of dropped.
///
/// Tokens routinely carry several `role` or `scope` claims; folding them
/// first-wins would silently lose grants. These claim types accumulate
/// space-separated in arrival order.
const CONCATENATING_CLAIMS: [&str; 4] = ["role", "roles", "scope", "scp"];

/// An ordered map of claims extracted from a bearer token.
///
/// Claims preserve their arrival order. Duplicate claim types fold
/// deterministically: the first value wins, except for role/scope-like
/// claim types (`role`, `roles`, `scope`, `scp`) whose values concatenate
/// space-separated.
///
/// # Example
///
/// ```
/// use spire_core::ClaimSet;
///
/// let mut claims = ClaimSet::new();
/// claims.insert("sub", "user-123");
/// claims.insert("sub", "ignored");
/// claims.insert("role", "admin");
/// claims.insert("role", "editor");
///
/// assert_eq!(claims.get("sub"), Some("user-123"));
/// assert_eq!(claims.get("role"), Some("admin editor"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimSet {
    claims: IndexMap<String, String>,
}

impl ClaimSet {
    /// Creates an empty claim set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the claim type concatenates duplicates.
    #[must_use]
    pub fn is_concatenating(claim_type: &str) -> bool {
        CONCATENATING_CLAIMS.contains(&claim_type)
    }

    /// Inserts a claim, folding duplicates.
    ///
    /// For role/scope-like claim types the new value is appended
    /// space-separated; for every other claim type the first value wins and
    /// later values are dropped.
    pub fn insert(&mut self, claim_type: impl Into<String>, value: impl Into<String>) {
        let claim_type = claim_type.into();
        let value = value.into();
        match self.claims.entry(claim_type) {
            indexmap::map::Entry::Occupied(mut entry) => {
                if Self::is_concatenating(entry.key()) {
                    let existing = entry.get_mut();
                    existing.push(' ');
                    existing.push_str(&value);
                }
            }
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(value);
            }
        }
    }

    /// Returns the folded value for a claim type, if present.
    #[must_use]
    pub fn get(&self, claim_type: &str) -> Option<&str> {
        self.claims.get(claim_type).map(String::as_str)
    }

    /// Returns `true` if the claim type is present.
    #[must_use]
    pub fn contains(&self, claim_type: &str) -> bool {
        self.claims.contains_key(claim_type)
    }

    /// Iterates over `(claim_type, value)` pairs in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.claims.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of distinct claim types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.claims.len()
    }

    /// Returns `true` if no claims are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ClaimSet
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut claims = Self::new();
        for (claim_type, value) in iter {
            claims.insert(claim_type, value);
        }
        claims
    }
}

/// The authenticated identity of a caller.
///
/// A principal is either a human [`User`](Principal::User) or a machine
/// [`Service`](Principal::Service) client. The discriminant comes from the
/// token shape: tokens carrying a `client_id` claim identify services,
/// everything else identifies users.
///
/// # Example
///
/// ```
/// use spire_core::{ClaimSet, Principal, UserPrincipal};
///
/// let principal = Principal::User(UserPrincipal::from_claims(
///     "https://issuer.example.com",
///     [("sub", "user-123"), ("email", "alice@example.com")]
///         .into_iter()
///         .collect::<ClaimSet>(),
/// ));
/// assert!(!principal.is_service());
/// assert_eq!(principal.id(), "user-123");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Principal {
    /// A human user authenticated with an identity token.
    User(UserPrincipal),
    /// A machine client authenticated with a client-credentials token.
    Service(ServicePrincipal),
}

impl Principal {
    /// Returns `true` for machine clients.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    /// Returns the principal's opaque identifier.
    ///
    /// May be the empty sentinel when the token carried no usable subject.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::User(u) => &u.id,
            Self::Service(s) => &s.id,
        }
    }

    /// Returns the token issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        match self {
            Self::User(u) => &u.issuer,
            Self::Service(s) => &s.issuer,
        }
    }

    /// Returns the folded claim set.
    #[must_use]
    pub const fn claims(&self) -> &ClaimSet {
        match self {
            Self::User(u) => &u.claims,
            Self::Service(s) => &s.claims,
        }
    }

    /// Returns a string identifier suitable for logging.
    ///
    /// This never returns sensitive information like secrets or tokens.
    ///
    /// # Returns
    ///
    /// - User: `user:<id>` (e.g., `user:u123`)
    /// - Service: `service:<service_name>` (e.g., `service:billing-sync`)
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::User(u) => format!("user:{}", u.id),
            Self::Service(s) => format!("service:{}", s.service_name),
        }
    }

    /// Returns roles extracted from the identity for authorization.
    ///
    /// - User: the whitespace-split values of the folded `role`/`roles` claim
    /// - Service: the token scopes as pseudo-roles
    #[must_use]
    pub fn roles(&self) -> Vec<&str> {
        match self {
            Self::User(u) => u
                .claims
                .get("role")
                .or_else(|| u.claims.get("roles"))
                .map(|v| v.split_whitespace().collect())
                .unwrap_or_default(),
            Self::Service(s) => s.scopes.iter().map(String::as_str).collect(),
        }
    }
}

/// A human user identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPrincipal {
    /// Opaque user identifier (the token subject). Empty when the token
    /// carried no usable subject.
    pub id: String,
    /// Token issuer.
    pub issuer: String,
    /// Email address, when the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Preferred username, when the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Display name, when the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Given name, when the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    /// Family name, when the token carries one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    /// Folded claim set.
    pub claims: ClaimSet,
}

impl UserPrincipal {
    /// Builds a user principal from a folded claim set.
    ///
    /// The id comes from the `sub` claim; a missing subject yields the empty
    /// sentinel rather than an error. Well-known profile claims (`email`,
    /// `preferred_username`, `name`, `given_name`, `family_name`) populate
    /// the optional profile fields.
    #[must_use]
    pub fn from_claims(issuer: impl Into<String>, claims: ClaimSet) -> Self {
        let get = |claim_type: &str| claims.get(claim_type).map(ToString::to_string);
        Self {
            id: get("sub").unwrap_or_default(),
            issuer: issuer.into(),
            email: get("email"),
            user_name: get("preferred_username"),
            display_name: get("name"),
            first_name: get("given_name"),
            last_name: get("family_name"),
            claims,
        }
    }
}

/// A machine client identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    /// Opaque client identifier (the token subject, falling back to the
    /// `client_id` claim).
    pub id: String,
    /// Token issuer.
    pub issuer: String,
    /// The registered client name (the `client_id` claim).
    pub service_name: String,
    /// Granted scopes, split from the folded `scope` claim.
    pub scopes: Vec<String>,
    /// Folded claim set.
    pub claims: ClaimSet,
}

impl ServicePrincipal {
    /// Builds a service principal from a folded claim set.
    ///
    /// `service_name` is the `client_id` claim value. The id comes from
    /// `sub` when present, otherwise from `client_id`. Scopes are the
    /// whitespace-split values of the folded `scope` (or `scp`) claim.
    #[must_use]
    pub fn from_claims(
        issuer: impl Into<String>,
        client_id: impl Into<String>,
        claims: ClaimSet,
    ) -> Self {
        let client_id = client_id.into();
        let id = claims
            .get("sub")
            .map_or_else(|| client_id.clone(), ToString::to_string);
        let scopes = claims
            .get("scope")
            .or_else(|| claims.get("scp"))
            .map(|v| v.split_whitespace().map(ToString::to_string).collect())
            .unwrap_or_default();
        Self {
            id,
            issuer: issuer.into(),
            service_name: client_id,
            scopes,
            claims,
        }
    }

    /// Returns `true` if the client was granted the scope.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}
