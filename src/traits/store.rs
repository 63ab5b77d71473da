//! Metrics store trait abstraction.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::RawSample;

/// Read-only access to the external metrics store.
///
/// `Ok(None)` means the store is healthy but holds no rows yet. Any failure
/// to reach or read the store is an `Err`; callers must be able to tell the
/// two apart.
///
/// # Example
///
/// ```ignore
/// use metricast::traits::MetricsAccessor;
///
/// async fn peek<A: MetricsAccessor>(store: &A) {
///     match store.latest().await {
///         Ok(Some(row)) => println!("latest: {:?}", row),
///         Ok(None) => println!("no data yet"),
///         Err(e) => eprintln!("store down: {}", e),
///     }
/// }
/// ```
#[async_trait]
pub trait MetricsAccessor: Send + Sync {
    /// Most recent raw row, or `None` if nothing has been stored yet.
    ///
    /// Implementations must bound this call with their own timeout.
    async fn latest(&self) -> Result<Option<RawSample>, StoreError>;
}
