//! Host clock and task abstraction.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The engine's view of the host runtime.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time` and `tokio::spawn`
/// - **Simulation**: a virtual clock advanced by the scenario runner
///
/// Detection cycles are spawned through this trait so the main tick never
/// blocks on the service; in simulation the same code runs under a
/// controlled clock.
#[async_trait]
pub trait AnchorContext: Send + Sync + 'static {
    /// Monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Suspends the calling task for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Spawns a detached background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
