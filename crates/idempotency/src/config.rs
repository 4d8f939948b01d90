use std::time::Duration;

/// Per-operation cache configuration.
///
/// These values are provided by the calling environment; the core never
/// reads ambient process state. Table and location configuration belong
/// to the store adapter, not here.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Namespaces the cache key, typically the operation name.
    pub scope: String,
    /// Input fields included in the fingerprint; all other fields are
    /// ignored when deciding whether two inputs are the same request.
    pub hashed_fields: Vec<String>,
    /// Store-enforced record lifetime.
    pub ttl: Duration,
}

impl CacheConfig {
    /// Ten minutes, matching the store's usual lock window.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

    pub fn new(
        scope: impl Into<String>,
        hashed_fields: impl IntoIterator<Item = impl Into<String>>,
        ttl: Duration,
    ) -> Self {
        CacheConfig {
            scope: scope.into(),
            hashed_fields: hashed_fields.into_iter().map(Into::into).collect(),
            ttl,
        }
    }
}
