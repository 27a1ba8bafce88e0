//! Hue Bridge management API (v1 REST)

pub mod client;
pub mod discovery;
pub mod error;
pub mod groups;
pub mod lights;

use std::future::Future;

use crate::hue::models::RemoteGroup;

pub use client::{BridgeInfo, HueClient};
pub use error::HueError;

/// The management calls the bridge orchestrator depends on
pub trait ManagementApi: Send + Sync + 'static {
    /// Verify the stored credentials
    fn authenticate(&self) -> impl Future<Output = Result<(), HueError>> + Send;

    /// All entertainment groups on the bridge
    fn entertainment_groups(&self)
        -> impl Future<Output = Result<Vec<RemoteGroup>, HueError>> + Send;

    /// Enable or disable streaming mode for a group
    fn set_streaming(
        &self,
        group_id: &str,
        active: bool,
    ) -> impl Future<Output = Result<(), HueError>> + Send;
}

impl ManagementApi for HueClient {
    async fn authenticate(&self) -> Result<(), HueError> {
        HueClient::authenticate(self).await.map(|_| ())
    }

    async fn entertainment_groups(&self) -> Result<Vec<RemoteGroup>, HueError> {
        groups::get_entertainment_groups(self).await
    }

    async fn set_streaming(&self, group_id: &str, active: bool) -> Result<(), HueError> {
        groups::set_stream_active(self, group_id, active).await
    }
}
