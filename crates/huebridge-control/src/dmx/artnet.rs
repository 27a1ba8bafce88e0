//! Art-Net protocol input (ArtDmx)
//!
//! Art-Net is a UDP-based protocol for transmitting DMX512 over Ethernet.
//! Only OpDmx packets are consumed; everything else on the port is ignored.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::router::{ColorSink, FrameRouter};
use super::DMX_UNIVERSE_SIZE;
use crate::Result;

/// Standard Art-Net UDP port
pub const ARTNET_PORT: u16 = 6454;

const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const HEADER_LEN: usize = 18;
const MAX_RECV_BACKOFF: Duration = Duration::from_secs(1);

/// One universe worth of DMX data as received from the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DmxFrame {
    /// 15-bit Art-Net port address
    pub universe: u16,
    pub data: Vec<u8>,
}

/// Parse an ArtDmx packet. Returns `None` for anything that is not a
/// well-formed OpDmx packet.
pub fn parse_art_dmx(packet: &[u8]) -> Option<DmxFrame> {
    if packet.len() < HEADER_LEN || &packet[0..8] != ARTNET_ID {
        return None;
    }

    // OpCode is little-endian, unlike the rest of the header
    let opcode = u16::from_le_bytes([packet[8], packet[9]]);
    if opcode != OP_DMX {
        return None;
    }

    // SubUni (low byte) + Net (high 7 bits)
    let universe = u16::from_le_bytes([packet[14], packet[15]]) & 0x7FFF;
    let length = u16::from_be_bytes([packet[16], packet[17]]) as usize;
    let length = length.min(DMX_UNIVERSE_SIZE).min(packet.len() - HEADER_LEN);

    Some(DmxFrame {
        universe,
        data: packet[HEADER_LEN..HEADER_LEN + length].to_vec(),
    })
}

/// Receives ArtDmx packets and feeds them to a [`FrameRouter`]
pub struct ArtNetListener {
    socket: UdpSocket,
}

impl ArtNetListener {
    /// Bind the Art-Net port on the given local address.
    pub async fn bind(ip: IpAddr) -> Result<Self> {
        Self::bind_addr(SocketAddr::new(ip, ARTNET_PORT)).await
    }

    /// Bind an explicit socket address (port 0 picks an ephemeral port).
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        info!("Art-Net listener bound to {}", socket.local_addr()?);
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Start the receive loop. The router is owned by the task, so frames are
    /// handled one at a time in arrival order.
    pub fn spawn<S>(self, mut router: FrameRouter<S>) -> ListenerHandle
    where
        S: ColorSink + Send + 'static,
    {
        let (stop_tx, mut stop_rx) = oneshot::channel();
        let socket = self.socket;

        let handle = tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let mut recv_errors: u32 = 0;
            loop {
                tokio::select! {
                    res = socket.recv_from(&mut buf) => match res {
                        Ok((len, from)) => {
                            recv_errors = 0;
                            match parse_art_dmx(&buf[..len]) {
                                Some(frame) => router.on_frame(&frame),
                                None => trace!("Ignoring non-ArtDmx packet from {}", from),
                            }
                        }
                        Err(e) => {
                            recv_errors = recv_errors.saturating_add(1);
                            if recv_errors == 1 {
                                warn!("Art-Net receive error: {}", e);
                            } else {
                                debug!("Art-Net receive error (#{}): {}", recv_errors, e);
                            }
                            tokio::time::sleep(recv_backoff(recv_errors)).await;
                        }
                    },
                    _ = &mut stop_rx => {
                        debug!("Art-Net listener stopping");
                        break;
                    }
                }
            }
        });

        ListenerHandle {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        }
    }
}

/// Pause after the n-th consecutive receive error: 10ms doubling up to 1s
fn recv_backoff(consecutive_errors: u32) -> Duration {
    let exp = consecutive_errors.saturating_sub(1).min(7);
    (Duration::from_millis(10) * (1u32 << exp)).min(MAX_RECV_BACKOFF)
}

/// Handle to a running Art-Net listener
pub struct ListenerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ListenerHandle {
    /// Stop the receive loop and wait for it to exit. Safe to call twice.
    pub async fn close(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Art-Net listener task failed: {}", e);
            }
            info!("Art-Net listener closed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn art_dmx(universe: u16, data: &[u8]) -> Vec<u8> {
        let mut packet = vec![0u8; HEADER_LEN];
        packet[0..8].copy_from_slice(ARTNET_ID);
        packet[8..10].copy_from_slice(&OP_DMX.to_le_bytes());
        packet[10..12].copy_from_slice(&14u16.to_be_bytes());
        packet[14..16].copy_from_slice(&universe.to_le_bytes());
        packet[16..18].copy_from_slice(&(data.len() as u16).to_be_bytes());
        packet.extend_from_slice(data);
        packet
    }

    #[test]
    fn test_parse_art_dmx() {
        let frame = parse_art_dmx(&art_dmx(11, &[1, 2, 3, 4])).unwrap();
        assert_eq!(frame.universe, 11);
        assert_eq!(frame.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_parse_full_universe_with_net() {
        let data = [7u8; 512];
        let frame = parse_art_dmx(&art_dmx(0x0102, &data)).unwrap();
        assert_eq!(frame.universe, 0x0102);
        assert_eq!(frame.data.len(), 512);
    }

    #[test]
    fn test_rejects_other_packets() {
        assert!(parse_art_dmx(b"Art-Net\0").is_none());

        let mut poll = art_dmx(0, &[]);
        poll[8..10].copy_from_slice(&0x2000u16.to_le_bytes());
        assert!(parse_art_dmx(&poll).is_none());

        let mut bad_id = art_dmx(0, &[1]);
        bad_id[0] = b'X';
        assert!(parse_art_dmx(&bad_id).is_none());
    }

    #[test]
    fn test_recv_errors_back_off() {
        assert_eq!(recv_backoff(1), Duration::from_millis(10));
        assert_eq!(recv_backoff(2), Duration::from_millis(20));
        assert_eq!(recv_backoff(5), Duration::from_millis(160));
        assert_eq!(recv_backoff(8), MAX_RECV_BACKOFF);
        assert_eq!(recv_backoff(u32::MAX), MAX_RECV_BACKOFF);
    }

    #[test]
    fn test_truncated_payload_is_clamped() {
        let mut packet = art_dmx(3, &[9, 9, 9]);
        // Claim 512 channels but only carry 3
        packet[16..18].copy_from_slice(&512u16.to_be_bytes());
        let frame = parse_art_dmx(&packet).unwrap();
        assert_eq!(frame.data, vec![9, 9, 9]);
    }
}
