//! Komga implementation of the library notifier.
//!
//! One endpoint is all the engine needs: "rescan this library". Metadata
//! flows into Komga from the archives themselves on scan.

use async_trait::async_trait;
use exn::ResultExt;
use koma_config::MediaServerConfig;
use koma_sync::LibraryNotifier;
use koma_sync::error::{ErrorKind, Result};

pub struct KomgaNotifier {
    client: reqwest::Client,
    scan_url: String,
    username: String,
    password: String,
}

impl KomgaNotifier {
    pub fn new(config: &MediaServerConfig) -> Self {
        let base = config.base_url.trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            scan_url: format!("{base}/api/v1/libraries/{}/scan", config.library_id),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }
}

#[async_trait]
impl LibraryNotifier for KomgaNotifier {
    async fn refresh_library(&self) -> Result<()> {
        let response = self
            .client
            .post(&self.scan_url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .or_raise(|| ErrorKind::Notify)?;
        response.error_for_status().or_raise(|| ErrorKind::Notify)?;
        tracing::debug!(url = %self.scan_url, "library scan requested");
        Ok(())
    }
}
