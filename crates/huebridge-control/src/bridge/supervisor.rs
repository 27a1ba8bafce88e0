//! Keepalive and reconnection for a running stream

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::{ping_lights, BridgeTimings};
use crate::dmx::Fixture;
use crate::hue::api::ManagementApi;
use crate::hue::stream::{SessionState, StreamingSession};

pub(super) async fn supervise<A: ManagementApi>(
    api: Arc<A>,
    session: Arc<StreamingSession>,
    fixtures: Arc<[Fixture]>,
    group_id: String,
    timings: BridgeTimings,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut events = session.subscribe();

    // The stream may already have dropped between the handshake and now
    // (a failed ping or early DMX frame); no change event follows that.
    if *events.borrow_and_update() == SessionState::Disconnected && !*shutdown.borrow() {
        warn!("Hue streaming session lost during startup, will attempt reconnection");
        if !reconnect(&*api, &session, &fixtures, &group_id, &timings, &mut shutdown).await {
            debug!("Stream supervisor stopped");
            return;
        }
        events.mark_unchanged();
    }

    let mut keepalive = tokio::time::interval(timings.keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = keepalive.tick() => session.keepalive(timings.max_idle),
            changed = events.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *events.borrow_and_update();
                if state != SessionState::Disconnected || *shutdown.borrow() {
                    continue;
                }
                warn!("Hue streaming session lost, will attempt reconnection");
                if !reconnect(&*api, &session, &fixtures, &group_id, &timings, &mut shutdown).await {
                    break;
                }
                events.mark_unchanged();
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    debug!("Stream supervisor stopped");
}

/// Retry until connected (true) or shut down (false), backing off
/// exponentially up to 16x the base delay.
async fn reconnect<A: ManagementApi>(
    api: &A,
    session: &StreamingSession,
    fixtures: &[Fixture],
    group_id: &str,
    timings: &BridgeTimings,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    let mut attempt: u32 = 0;
    loop {
        let delay = timings.reconnect_delay * (1u32 << attempt.min(4));
        if attempt > 0 {
            error!(
                "Reconnection attempt {} failed. Retrying in {:.1}s...",
                attempt,
                delay.as_secs_f64()
            );
        }
        attempt += 1;
        if !sleep_unless_shutdown(delay, shutdown).await {
            return false;
        }

        info!("Attempting stream reconnection (attempt {})...", attempt);
        // A restarted bridge comes back with streaming mode off
        if let Err(e) = api.set_streaming(group_id, true).await {
            warn!("Failed to re-enable streaming mode: {}", e);
            continue;
        }
        if !sleep_unless_shutdown(timings.settle_delay, shutdown).await {
            return false;
        }

        match session.connect().await {
            Ok(()) => {
                info!("Hue streaming session re-established");
                ping_lights(session, fixtures);
                return true;
            }
            Err(e) => warn!("Reconnection error: {}", e),
        }
    }
}

/// Sleep for `delay`; false if shutdown was requested meanwhile.
async fn sleep_unless_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.wait_for(|stop| *stop) => false,
    }
}
