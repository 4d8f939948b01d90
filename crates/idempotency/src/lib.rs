//! Turns an arbitrary side-effecting operation into an idempotent one.
//!
//! The cache coordinates concurrent callers around a shared record in a
//! conditional store: the first caller to win the conditional insert
//! executes the operation, everyone else observes either the
//! in-progress lock or the cached terminal result.
//!
//! ```no_compile
//! let store = Arc::new(DynamoDbRecordStore::from_env().await?);
//! let cache = IdempotencyCache::new(
//!     store,
//!     CacheConfig::new("createOrder", ["orderId"], CacheConfig::DEFAULT_TTL),
//! );
//!
//! let create_order = guard(cache, |request: OrderRequest| async move {
//!     orders.create(request).await
//! });
//!
//! match create_order(request).await? {
//!     Outcome::Completed(order) => respond(order),
//!     Outcome::Failed(error) => respond_error(error),
//!     Outcome::InProgress => respond_conflict(),
//! }
//! ```

pub use crate::cache::{CacheError, IdempotencyCache, Outcome};
pub use crate::config::CacheConfig;
pub use crate::fingerprint::fingerprint;
pub use crate::guard::guard;

mod cache;
mod config;
mod fingerprint;
mod guard;
