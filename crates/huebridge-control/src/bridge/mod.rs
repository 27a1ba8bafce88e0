//! Art-Net to Hue bridge
//!
//! Startup: authenticate, look up the entertainment room, build fixtures,
//! enable streaming mode, wait for the bridge, DTLS handshake, ping all
//! lights, then start listening for Art-Net. Shutdown is driven by the
//! `watch::Receiver<bool>` handed to [`BridgeOrchestrator::new`].

mod config;
mod supervisor;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dmx::{ArtNetListener, Fixture, FixtureRegistry, FrameRouter, ListenerHandle, Rgb16};
use crate::error::ConfigError;
use crate::hue::api::{HueClient, ManagementApi};
use crate::hue::models::{ColorUpdate, RemoteGroup};
use crate::hue::stream::{DtlsConnector, SessionState, StreamingSession, TransportConnector};
use crate::Result;

pub use config::{BridgeConfig, BridgeTimings};

/// Brings the bridge up and hands back a [`RunningBridge`]
pub struct BridgeOrchestrator<A: ManagementApi> {
    config: BridgeConfig,
    api: Arc<A>,
    connector: Arc<dyn TransportConnector>,
    shutdown: watch::Receiver<bool>,
}

impl BridgeOrchestrator<HueClient> {
    /// Orchestrator talking to a real Hue Bridge
    pub fn new(config: BridgeConfig, shutdown: watch::Receiver<bool>) -> Result<Self> {
        let api = HueClient::new(&config.hue)?;
        Ok(Self::with_parts(
            config,
            api,
            Arc::new(DtlsConnector::default()),
            shutdown,
        ))
    }
}

impl<A: ManagementApi> BridgeOrchestrator<A> {
    pub fn with_parts(
        config: BridgeConfig,
        api: A,
        connector: Arc<dyn TransportConnector>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            config,
            api: Arc::new(api),
            connector,
            shutdown,
        }
    }

    /// Start, run until the shutdown signal fires, then close.
    pub async fn run(self) -> Result<()> {
        let mut bridge = self.start().await?;
        bridge.wait().await;
        info!("Received shutdown signal. Closing Hue connection...");
        bridge.close().await;
        Ok(())
    }

    /// Run the startup sequence. Any failure aborts it; if streaming mode was
    /// already enabled it is disabled again before the error is returned.
    pub async fn start(self) -> Result<RunningBridge<A>> {
        self.config.timings.validate()?;
        let credentials = self.config.psk_credentials()?;
        let group_id = self.config.group_id.clone();

        self.api.authenticate().await?;
        info!("Authenticated with Hue Bridge at {}", self.config.hue.bridge_ip);

        let room = self.find_room().await?;
        let fixtures: Arc<[Fixture]> =
            FixtureRegistry::build(&self.config.fixtures, &room, &self.config.validation)?.into();
        info!(
            "Mapped {} lights of entertainment room '{}' to universe {}",
            fixtures.len(),
            room.name,
            self.config.universe
        );

        info!("Requesting streaming mode...");
        self.api.set_streaming(&group_id, true).await?;
        info!("Streaming enabled");

        let session = Arc::new(StreamingSession::new(
            self.config.hue.bridge_ip.clone(),
            credentials,
            Arc::clone(&self.connector),
        ));

        match self.arm(&session, &fixtures).await {
            Ok((listener, artnet_addr)) => {
                let supervisor = tokio::spawn(supervisor::supervise(
                    Arc::clone(&self.api),
                    Arc::clone(&session),
                    Arc::clone(&fixtures),
                    group_id.clone(),
                    self.config.timings,
                    self.shutdown.clone(),
                ));
                Ok(RunningBridge {
                    api: self.api,
                    group_id,
                    session,
                    listener,
                    supervisor: Some(supervisor),
                    shutdown: self.shutdown,
                    artnet_addr,
                    closed: false,
                })
            }
            Err(e) => {
                session.close();
                if let Err(disable) = self.api.set_streaming(&group_id, false).await {
                    warn!("Failed to disable streaming mode: {}", disable);
                }
                Err(e)
            }
        }
    }

    async fn find_room(&self) -> Result<RemoteGroup> {
        let rooms = self.api.entertainment_groups().await?;
        let mut matching: Vec<RemoteGroup> = rooms
            .into_iter()
            .filter(|g| g.id == self.config.group_id)
            .collect();
        if matching.len() != 1 {
            return Err(ConfigError::RoomNotFound {
                id: self.config.group_id.clone(),
                matches: matching.len(),
            }
            .into());
        }
        Ok(matching.remove(0))
    }

    /// Settle delay, handshake, ping, Art-Net listener.
    async fn arm(
        &self,
        session: &Arc<StreamingSession>,
        fixtures: &Arc<[Fixture]>,
    ) -> Result<(ListenerHandle, SocketAddr)> {
        info!(
            "Sleeping for {}ms to give the Hue bridge time to enable streaming mode",
            self.config.timings.settle_delay.as_millis()
        );
        tokio::time::sleep(self.config.timings.settle_delay).await;

        let mut events = session.subscribe();
        session.connect().await?;
        if *events.borrow_and_update() == SessionState::Connected {
            ping_lights(session, fixtures);
        }

        let listener = ArtNetListener::bind_addr(self.config.listen_address).await?;
        let artnet_addr = listener.local_addr()?;
        let router = FrameRouter::new(
            self.config.universe,
            Arc::clone(fixtures),
            Arc::clone(session),
        );
        Ok((listener.spawn(router), artnet_addr))
    }
}

/// Set every light to black so the bridge confirms the stream is live.
pub(crate) fn ping_lights(session: &StreamingSession, fixtures: &[Fixture]) {
    info!("Pinging all lights");
    let updates: Vec<ColorUpdate> = fixtures
        .iter()
        .map(|f| ColorUpdate::new(f, Rgb16::BLACK))
        .collect();
    session.send(&updates);
}

/// A started bridge
pub struct RunningBridge<A: ManagementApi> {
    api: Arc<A>,
    group_id: String,
    session: Arc<StreamingSession>,
    listener: ListenerHandle,
    supervisor: Option<JoinHandle<()>>,
    shutdown: watch::Receiver<bool>,
    artnet_addr: SocketAddr,
    closed: bool,
}

impl<A: ManagementApi> RunningBridge<A> {
    /// Address the Art-Net listener is bound to
    pub fn artnet_addr(&self) -> SocketAddr {
        self.artnet_addr
    }

    pub fn session(&self) -> &Arc<StreamingSession> {
        &self.session
    }

    /// Wait until the shutdown signal fires (or its sender is gone).
    pub async fn wait(&mut self) {
        let _ = self.shutdown.wait_for(|stop| *stop).await;
    }

    /// Close the stream and the listener concurrently, then disable
    /// streaming mode. Best-effort and idempotent.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Some(supervisor) = self.supervisor.take() {
            supervisor.abort();
            let _ = supervisor.await;
        }

        let session = Arc::clone(&self.session);
        tokio::join!(async move { session.close() }, self.listener.close());

        match self.api.set_streaming(&self.group_id, false).await {
            Ok(()) => info!("Streaming mode disabled"),
            Err(e) => warn!("Failed to disable streaming mode: {}", e),
        }
    }
}

impl<A: ManagementApi> Drop for RunningBridge<A> {
    fn drop(&mut self) {
        if let Some(supervisor) = self.supervisor.take() {
            supervisor.abort();
        }
    }
}
