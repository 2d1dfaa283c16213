//! mentor-protocol – Wire-Typen fuer die Sprach-API
//!
//! Dieses Crate definiert die JSON-Nachrichten der Live-Sitzung
//! (WebSocket) und der Einzelanalyse (`generateContent`) sowie die
//! Mentor-Systemanweisung mit Antwort-Schema.

pub mod generate;
pub mod live;
pub mod prompt;

pub use generate::{Content, GenerateContentRequest, GenerateContentResponse, InlineData, Part};
pub use live::{pcm_mime, ClientMessage, LiveEvent, ServerMessage, Setup};
pub use prompt::{response_schema, SYSTEM_INSTRUCTION};
