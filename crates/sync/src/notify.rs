//! Seam for the optional media-server notification.

use crate::error::Result;
use async_trait::async_trait;

/// "New content landed, rescan your library."
///
/// Invoked after archives are published; strictly best-effort. A failed
/// notification is logged by the engine and never rolls anything back.
// TODO: When `dyn async trait` stabilizes, migrate to native 2024 Edition async traits.
#[async_trait]
pub trait LibraryNotifier: Send + Sync {
    async fn refresh_library(&self) -> Result<()>;
}

/// Notifier used when no media server is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait]
impl LibraryNotifier for NoopNotifier {
    async fn refresh_library(&self) -> Result<()> {
        Ok(())
    }
}
