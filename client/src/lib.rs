//! mentor-client – Kommandozeilen-Client
//!
//! Text- und Audio-Analysen ueber `generateContent` sowie die
//! Live-Sprachsitzung mit Mikrofon und Lautsprecher.

pub mod analyse;
pub mod ausgabe;
pub mod config;
pub mod logging;
pub mod upload;

pub use analyse::MentorClient;
pub use config::ClientConfig;
