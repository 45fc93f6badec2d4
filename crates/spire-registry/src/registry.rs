//! The immutable operation registry and its builder.

use indexmap::IndexMap;
use thiserror::Error;

use crate::entry::{HttpMethod, OperationEntry};

/// Errors raised while building a registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two operations were registered under the same `(route, method)` pair.
    #[error("Duplicate operation registration: {method} {route}")]
    Duplicate {
        /// The conflicting HTTP method.
        method: HttpMethod,
        /// The conflicting route path.
        route: String,
    },
}

/// Collects [`OperationEntry`] values and builds an [`OperationRegistry`].
///
/// Registration order is preserved; documentation synthesis iterates entries
/// in the order they were added.
///
/// # Example
///
/// ```
/// use spire_registry::{AuthPolicy, HttpMethod, OperationEntry, RegistryBuilder};
/// use spire_core::{DispatchError, Empty, NoContent, Operation, RequestContext};
///
/// struct Ping;
///
/// impl Operation<Empty, NoContent> for Ping {
///     async fn handle(
///         &self,
///         _ctx: &RequestContext,
///         _request: Empty,
///     ) -> Result<NoContent, DispatchError> {
///         Ok(NoContent {})
///     }
/// }
///
/// let registry = RegistryBuilder::new()
///     .operation(OperationEntry::unary(
///         "/ping",
///         HttpMethod::Get,
///         "health",
///         AuthPolicy::None,
///         Ping,
///     ))
///     .build()
///     .expect("no duplicates");
///
/// assert!(registry.lookup(HttpMethod::Get, "/ping").is_some());
/// ```
#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<OperationEntry>,
}

impl RegistryBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an operation entry.
    #[must_use]
    pub fn operation(mut self, entry: OperationEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Builds the immutable registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] naming the first `(route, method)`
    /// pair registered more than once. Registrations are never silently
    /// shadowed.
    pub fn build(self) -> Result<OperationRegistry, RegistryError> {
        let mut operations = IndexMap::with_capacity(self.entries.len());
        for entry in self.entries {
            let key = (entry.method(), entry.route().to_string());
            if operations.contains_key(&key) {
                return Err(RegistryError::Duplicate {
                    method: key.0,
                    route: key.1,
                });
            }
            operations.insert(key, entry);
        }
        Ok(OperationRegistry { operations })
    }
}

impl std::fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// The immutable operation registry.
///
/// Built once at startup via [`RegistryBuilder`]; lookups are hash-based and
/// require no locking.
pub struct OperationRegistry {
    operations: IndexMap<(HttpMethod, String), OperationEntry>,
}

impl OperationRegistry {
    /// Looks up the entry registered under `(method, route)`.
    #[must_use]
    pub fn lookup(&self, method: HttpMethod, route: &str) -> Option<&OperationEntry> {
        self.operations.get(&(method, route.to_string()))
    }

    /// Iterates entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &OperationEntry> {
        self.operations.values()
    }

    /// Returns the number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns `true` when no operations are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("operations", &self.operations.len())
            .finish()
    }
}
