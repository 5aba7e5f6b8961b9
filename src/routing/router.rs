//! Route registration and lookup.
//!
//! # Responsibilities
//! - Store service factories under four match strategies plus a default
//! - Reject duplicate keys within a strategy
//! - Resolve a raw URI to exactly one factory
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(1) exact lookups via HashMap
//! - Directory prefixes in a BTreeMap; lookup is the lexicographic floor of
//!   the path, accepted only if it is a literal prefix. This is not a true
//!   longest-prefix match for every prefix set (e.g. `/a/` and `/a/b/` hide
//!   each other's neighbours); it is kept as-is
//! - O(n) regex scan in registration order (acceptable for typical counts)

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Bound;

use crate::routing::matcher::PathPattern;
use crate::service::{NotFoundService, ServiceFactory};

/// Match strategy of a registered route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    /// Full raw URI, query string included.
    ExactUri,
    /// Path only (URI before `?`).
    ExactPath,
    /// Literal path prefix.
    DirectoryPrefix,
    /// Regex that must match the whole path.
    Regex,
    /// Catch-all used when nothing else matches.
    Default,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouteKind::ExactUri => "exact-uri",
            RouteKind::ExactPath => "exact-path",
            RouteKind::DirectoryPrefix => "directory-prefix",
            RouteKind::Regex => "regex",
            RouteKind::Default => "default",
        };
        f.write_str(name)
    }
}

/// Error type for route registration.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("duplicate {kind} route: {key:?}")]
    Duplicate { kind: RouteKind, key: String },

    #[error("invalid route pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Registered routes, resolved in fixed priority order.
pub struct RouteTable {
    uris: HashMap<String, ServiceFactory>,
    paths: HashMap<String, ServiceFactory>,
    directories: BTreeMap<String, ServiceFactory>,
    patterns: Vec<(PathPattern, ServiceFactory)>,
    default: Option<ServiceFactory>,
    not_found: ServiceFactory,
}

impl RouteTable {
    /// An empty table falling back to [`NotFoundService`].
    pub fn new() -> Self {
        Self::with_not_found(NotFoundService::factory())
    }

    /// An empty table with a custom built-in fallback.
    pub fn with_not_found(not_found: ServiceFactory) -> Self {
        Self {
            uris: HashMap::new(),
            paths: HashMap::new(),
            directories: BTreeMap::new(),
            patterns: Vec::new(),
            default: None,
            not_found,
        }
    }

    /// Register `factory` under `kind`.
    ///
    /// `key` is the URI, path, prefix or pattern; it is ignored for
    /// [`RouteKind::Default`].
    pub fn register(&mut self, kind: RouteKind, key: &str, factory: ServiceFactory) -> Result<(), RouteError> {
        match kind {
            RouteKind::ExactUri => insert_unique(&mut self.uris, kind, key, factory)?,
            RouteKind::ExactPath => insert_unique(&mut self.paths, kind, key, factory)?,
            RouteKind::DirectoryPrefix => {
                if self.directories.contains_key(key) {
                    return Err(RouteError::Duplicate {
                        kind,
                        key: key.to_string(),
                    });
                }
                self.directories.insert(key.to_string(), factory);
            }
            RouteKind::Regex => {
                let pattern = PathPattern::new(key).map_err(|source| RouteError::InvalidPattern {
                    pattern: key.to_string(),
                    source,
                })?;
                self.patterns.push((pattern, factory));
            }
            RouteKind::Default => {
                if self.default.is_some() {
                    return Err(RouteError::Duplicate {
                        kind,
                        key: String::new(),
                    });
                }
                self.default = Some(factory);
            }
        }

        tracing::debug!(kind = %kind, key = %key, "Route registered");
        Ok(())
    }

    pub fn register_uri(&mut self, uri: &str, factory: ServiceFactory) -> Result<&mut Self, RouteError> {
        self.register(RouteKind::ExactUri, uri, factory)?;
        Ok(self)
    }

    pub fn register_path(&mut self, path: &str, factory: ServiceFactory) -> Result<&mut Self, RouteError> {
        self.register(RouteKind::ExactPath, path, factory)?;
        Ok(self)
    }

    pub fn register_directory(&mut self, prefix: &str, factory: ServiceFactory) -> Result<&mut Self, RouteError> {
        self.register(RouteKind::DirectoryPrefix, prefix, factory)?;
        Ok(self)
    }

    pub fn register_regex(&mut self, pattern: &str, factory: ServiceFactory) -> Result<&mut Self, RouteError> {
        self.register(RouteKind::Regex, pattern, factory)?;
        Ok(self)
    }

    pub fn register_default(&mut self, factory: ServiceFactory) -> Result<&mut Self, RouteError> {
        self.register(RouteKind::Default, "", factory)?;
        Ok(self)
    }

    /// Resolve a raw request URI to the factory that serves it.
    pub fn resolve(&self, uri: &str) -> &ServiceFactory {
        self.resolve_with_kind(uri).0
    }

    /// Like [`resolve`](Self::resolve), also reporting which tier matched.
    /// The built-in fallback reports [`RouteKind::Default`].
    pub fn resolve_with_kind(&self, uri: &str) -> (&ServiceFactory, RouteKind) {
        if let Some(factory) = self.uris.get(uri) {
            return (factory, RouteKind::ExactUri);
        }

        let path = uri.split_once('?').map_or(uri, |(path, _)| path);

        if let Some(factory) = self.paths.get(path) {
            return (factory, RouteKind::ExactPath);
        }

        if let Some(factory) = self.floor_directory(path) {
            return (factory, RouteKind::DirectoryPrefix);
        }

        if let Some((_, factory)) = self.patterns.iter().find(|(p, _)| p.matches(path)) {
            return (factory, RouteKind::Regex);
        }

        (self.default.as_ref().unwrap_or(&self.not_found), RouteKind::Default)
    }

    fn floor_directory(&self, path: &str) -> Option<&ServiceFactory> {
        let (prefix, factory) = self
            .directories
            .range::<str, _>((Bound::Unbounded, Bound::Included(path)))
            .next_back()?;
        path.starts_with(prefix.as_str()).then_some(factory)
    }

    /// Number of registered routes, default included.
    pub fn len(&self) -> usize {
        self.uris.len()
            + self.paths.len()
            + self.directories.len()
            + self.patterns.len()
            + usize::from(self.default.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("uris", &self.uris.keys().collect::<Vec<_>>())
            .field("paths", &self.paths.keys().collect::<Vec<_>>())
            .field("directories", &self.directories.keys().collect::<Vec<_>>())
            .field(
                "patterns",
                &self.patterns.iter().map(|(p, _)| p.as_str()).collect::<Vec<_>>(),
            )
            .field("has_default", &self.default.is_some())
            .finish()
    }
}

fn insert_unique(
    map: &mut HashMap<String, ServiceFactory>,
    kind: RouteKind,
    key: &str,
    factory: ServiceFactory,
) -> Result<(), RouteError> {
    if map.contains_key(key) {
        return Err(RouteError::Duplicate {
            kind,
            key: key.to_string(),
        });
    }
    map.insert(key.to_string(), factory);
    Ok(())
}
