use crate::cache::{CacheError, IdempotencyCache, Outcome};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;

/// Wrap any operation with idempotency.
///
/// Returns a callable composed explicitly at the call site: every
/// invocation goes through the cache, so repeated calls with the same
/// fingerprint replay the stored outcome instead of re-running the
/// operation.
pub fn guard<Input, Response, Err, Op, Fut>(
    cache: IdempotencyCache,
    operation: Op,
) -> impl Fn(Input) -> Pin<Box<dyn Future<Output = Result<Outcome<Response>, CacheError<Err>>> + Send>>
where
    Input: Serialize + Send + 'static,
    Response: Serialize + DeserializeOwned + Send + 'static,
    Err: Display + Send + 'static,
    Op: Fn(Input) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response, Err>> + Send + 'static,
{
    move |input: Input| {
        let cache: IdempotencyCache = cache.clone();
        let operation: Op = operation.clone();

        Box::pin(async move { cache.execute(input, operation).await })
    }
}
