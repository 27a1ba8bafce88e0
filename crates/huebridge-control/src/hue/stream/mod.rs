//! Hue Entertainment streaming (DTLS)

pub mod dtls;
pub mod protocol;
pub mod session;

pub use dtls::{DtlsConnector, PskCredentials, StreamTransport, TransportConnector, STREAMING_PORT};
pub use session::{SessionState, StreamingSession};
