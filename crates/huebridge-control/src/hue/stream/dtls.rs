//! DTLS 1.2 PSK transport to the bridge's entertainment port

use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use openssl::error::ErrorStack;
use openssl::ssl::{SslConnector, SslMethod, SslStream, SslVerifyMode, SslVersion};
use tracing::debug;

use crate::error::SessionError;

/// UDP port the bridge listens on for entertainment streaming
pub const STREAMING_PORT: u16 = 2100;

/// The only cipher suite the bridge accepts
const CIPHER_LIST: &str = "PSK-AES128-GCM-SHA256";

/// PSK identity and key for the DTLS handshake
#[derive(Clone)]
pub struct PskCredentials {
    /// The paired username
    pub identity: String,
    /// The decoded client key
    pub key: Vec<u8>,
}

impl std::fmt::Debug for PskCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PskCredentials")
            .field("identity", &"***REDACTED***")
            .field("key", &"***REDACTED***")
            .finish()
    }
}

/// An established encrypted stream. Writes are fire-and-forget datagrams.
pub trait StreamTransport: Send {
    /// Send one complete message
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()>;

    /// Tear the connection down (best-effort)
    fn shutdown(&mut self);
}

/// Performs the (blocking) handshake and produces a transport
pub trait TransportConnector: Send + Sync + 'static {
    fn connect(
        &self,
        host: &str,
        credentials: &PskCredentials,
    ) -> Result<Box<dyn StreamTransport>, SessionError>;
}

/// Connected UDP socket exposed as a byte stream for OpenSSL
#[derive(Debug)]
struct UdpChannel(UdpSocket);

impl Read for UdpChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.recv(buf)
    }
}

impl Write for UdpChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.send(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// OpenSSL based DTLS connector
#[derive(Debug, Clone)]
pub struct DtlsConnector {
    port: u16,
    handshake_timeout: Duration,
    write_timeout: Duration,
}

impl Default for DtlsConnector {
    fn default() -> Self {
        Self {
            port: STREAMING_PORT,
            handshake_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_millis(50),
        }
    }
}

fn handshake_error(e: impl std::fmt::Display) -> SessionError {
    SessionError::Handshake(e.to_string())
}

impl DtlsConnector {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    fn resolve(&self, host: &str) -> Result<SocketAddr, SessionError> {
        (host, self.port)
            .to_socket_addrs()
            .map_err(handshake_error)?
            .next()
            .ok_or_else(|| SessionError::Handshake(format!("Could not resolve {}", host)))
    }

    fn ssl_connector(credentials: &PskCredentials) -> Result<SslConnector, ErrorStack> {
        let mut builder = SslConnector::builder(SslMethod::dtls())?;
        builder.set_min_proto_version(Some(SslVersion::DTLS1_2))?;
        builder.set_cipher_list(CIPHER_LIST)?;
        builder.set_verify(SslVerifyMode::NONE);

        let identity = credentials.identity.clone().into_bytes();
        let key = credentials.key.clone();
        builder.set_psk_client_callback(move |_ssl, _hint, identity_out, psk_out| {
            // Identity is written as a NUL terminated string
            if identity.len() >= identity_out.len() || key.len() > psk_out.len() {
                return Err(ErrorStack::get());
            }
            identity_out[..identity.len()].copy_from_slice(&identity);
            identity_out[identity.len()] = 0;
            psk_out[..key.len()].copy_from_slice(&key);
            Ok(key.len())
        });

        Ok(builder.build())
    }
}

impl TransportConnector for DtlsConnector {
    fn connect(
        &self,
        host: &str,
        credentials: &PskCredentials,
    ) -> Result<Box<dyn StreamTransport>, SessionError> {
        let addr = self.resolve(host)?;
        let local: SocketAddr = if addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };

        let socket = UdpSocket::bind(local).map_err(handshake_error)?;
        socket.connect(addr).map_err(handshake_error)?;
        socket
            .set_read_timeout(Some(self.handshake_timeout))
            .map_err(handshake_error)?;
        socket
            .set_write_timeout(Some(self.write_timeout))
            .map_err(handshake_error)?;

        let connector = Self::ssl_connector(credentials).map_err(handshake_error)?;
        let mut config = connector.configure().map_err(handshake_error)?;
        config.set_verify_hostname(false);
        config.set_use_server_name_indication(false);
        config.set_mtu(1400).map_err(handshake_error)?;

        debug!("Starting DTLS handshake with {}", addr);
        let stream = config
            .connect(host, UdpChannel(socket))
            .map_err(handshake_error)?;

        Ok(Box::new(DtlsTransport { stream }))
    }
}

/// Established DTLS session
pub struct DtlsTransport {
    stream: SslStream<UdpChannel>,
}

impl StreamTransport for DtlsTransport {
    fn write_frame(&mut self, frame: &[u8]) -> io::Result<()> {
        self.stream.write_all(frame)
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.stream.shutdown() {
            debug!("DTLS shutdown: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redaction() {
        let creds = PskCredentials {
            identity: "user-abc".to_string(),
            key: vec![1, 2, 3],
        };
        let debug_str = format!("{:?}", creds);
        assert!(!debug_str.contains("user-abc"));
        assert!(debug_str.contains("***REDACTED***"));
    }

    #[test]
    fn test_ssl_connector_builds_with_psk_cipher() {
        let creds = PskCredentials {
            identity: "user".to_string(),
            key: vec![0u8; 16],
        };
        assert!(DtlsConnector::ssl_connector(&creds).is_ok());
    }

    #[test]
    fn test_handshake_fails_without_bridge() {
        // Nothing listens on this port, so the handshake cannot complete
        let unused = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = unused.local_addr().unwrap().port();
        drop(unused);

        let connector = DtlsConnector::default()
            .with_port(port)
            .with_handshake_timeout(Duration::from_millis(200));
        let creds = PskCredentials {
            identity: "user".to_string(),
            key: vec![0u8; 16],
        };
        let result = connector.connect("127.0.0.1", &creds);
        assert!(matches!(result, Err(SessionError::Handshake(_))));
    }
}
