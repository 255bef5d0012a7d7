//! Higher-order caching wrapper
//!
//! Wraps any async operation so its successful results are served from the
//! tiered cache, keyed by a namespace plus the serialized arguments.

use super::key::CacheKey;
use super::tiered::{SetOptions, TieredCache};
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

/// Wrap `operation` with [`TieredCache::cached_fetch`].
///
/// The namespace is kept verbatim in every key, so a namespace such as
/// `"tournament:standings"` is purged by the `tournament` entity tag.
///
/// ```no_run
/// # use courtsync::cache::{cached, SetOptions, TieredCache};
/// # use std::{sync::Arc, time::Duration};
/// # async fn demo() {
/// let cache = Arc::new(TieredCache::in_memory(100));
/// let standings = cached(
///     cache,
///     "tournament:standings",
///     SetOptions::ttl(Duration::from_secs(60)),
///     |id: u64| async move { Ok::<_, String>(vec![id]) },
/// );
/// let first = standings(5).await;
/// # }
/// ```
pub fn cached<A, T, E, F, Fut>(
    cache: Arc<TieredCache>,
    namespace: impl Into<String>,
    options: SetOptions,
    operation: F,
) -> impl Fn(A) -> BoxFuture<'static, Result<T, E>>
where
    A: Serialize + Send + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
    E: Send + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let namespace = namespace.into();
    let operation = Arc::new(operation);

    move |args: A| -> BoxFuture<'static, Result<T, E>> {
        let cache = cache.clone();
        let operation = operation.clone();

        let payload = match serde_json::to_string(&args) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(
                    namespace = %namespace,
                    error = %e,
                    "Arguments not serializable, bypassing cache"
                );
                return Box::pin(async move { (*operation)(args).await });
            }
        };
        let key = CacheKey::from_parts(&namespace, &payload).into_string();

        Box::pin(async move {
            cache
                .cached_fetch(&key, options, move || (*operation)(args))
                .await
        })
    }
}
