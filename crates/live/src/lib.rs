//! mentor-live – Live-Sprachsitzung
//!
//! Verbindet Mikrofon-Capture, Transport zur Live-API und den
//! Playback-Scheduler zu einer Sitzung mit beobachtbarem Zustand.
//!
//! - `transport`: schmale Schnittstelle zur Gegenstelle
//! - `gemini`: WebSocket-Implementierung (tokio-tungstenite)
//! - `session`: Lifecycle, Ereignisverarbeitung, Abbau

pub mod config;
pub mod gemini;
pub mod session;
pub mod transport;

pub use config::{LiveConfig, DEFAULT_LIVE_MODEL, DEFAULT_VOICE};
pub use gemini::{GeminiConnector, GeminiTransport, DEFAULT_LIVE_URL};
pub use session::{LiveSession, SessionStats};
pub use transport::{OutboundFrame, Transport, TransportConnector, TransportEvent};
