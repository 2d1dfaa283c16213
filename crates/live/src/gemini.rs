//! WebSocket-Transport zur Live-API
//!
//! ```text
//! connect_async(url?key=...)
//!     -> Setup als erste Text-Nachricht
//!     -> Schreib-Task: mpsc -> WebSocket (Reihenfolge bleibt erhalten)
//!     -> Lese-Task: WebSocket -> ServerMessage -> TransportEvent
//! ```

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use mentor_core::{MentorError, Result};
use mentor_protocol::{ClientMessage, LiveEvent, ServerMessage, Setup};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, trace, warn};

use crate::transport::{OutboundFrame, Transport, TransportConnector, TransportEvent};

/// Standard-Endpunkt der bidirektionalen Live-API
pub const DEFAULT_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Kapazitaet der Ereignis-Queue vom Lese-Task zur Sitzung
const EVENT_PUFFER: usize = 64;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Baut WebSocket-Verbindungen zur Live-API auf
#[derive(Clone)]
pub struct GeminiConnector {
    url: String,
    api_key: String,
    send_queue: usize,
}

impl GeminiConnector {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, send_queue: usize) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            send_queue: send_queue.max(1),
        }
    }

    /// Vollstaendige URL inklusive Schluessel (nie loggen)
    fn endpoint(&self) -> String {
        let trenner = if self.url.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.url, trenner, self.api_key)
    }
}

impl std::fmt::Debug for GeminiConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConnector")
            .field("url", &self.url)
            .field("send_queue", &self.send_queue)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TransportConnector for GeminiConnector {
    type Session = GeminiTransport;

    async fn open(
        &mut self,
        setup: &Setup,
    ) -> Result<(GeminiTransport, mpsc::Receiver<TransportEvent>)> {
        let setup_json = ClientMessage::Setup(setup.clone()).to_json()?;

        info!(url = %self.url, model = %setup.model, "Verbinde mit Live-API");
        let (ws, _response) = connect_async(self.endpoint())
            .await
            .map_err(|e| MentorError::Verbindung(e.to_string()))?;

        let (mut write, read) = ws.split();
        write
            .send(Message::Text(setup_json))
            .await
            .map_err(|e| MentorError::Verbindung(format!("Setup nicht gesendet: {e}")))?;
        debug!(stimme = setup.voice_name(), "Setup gesendet, warte auf Bestaetigung");

        let (out_tx, out_rx) = mpsc::channel(self.send_queue);
        let (event_tx, event_rx) = mpsc::channel(EVENT_PUFFER);

        let writer = tokio::spawn(schreib_loop(write, out_rx));
        let reader = tokio::spawn(lese_loop(read, event_tx));

        Ok((
            GeminiTransport {
                out_tx: Some(out_tx),
                reader: Some(reader),
                writer: Some(writer),
            },
            event_rx,
        ))
    }
}

/// Offene WebSocket-Verbindung
#[derive(Debug)]
pub struct GeminiTransport {
    out_tx: Option<mpsc::Sender<String>>,
    reader: Option<JoinHandle<()>>,
    writer: Option<JoinHandle<()>>,
}

impl Transport for GeminiTransport {
    fn send(&mut self, frame: OutboundFrame) -> Result<()> {
        let Some(tx) = &self.out_tx else {
            return Err(MentorError::Getrennt("Transport bereits geschlossen".into()));
        };
        let json = ClientMessage::audio(frame.mime_type, frame.data).to_json()?;
        tx.try_send(json).map_err(|e| match e {
            TrySendError::Full(_) => MentorError::Rueckstau,
            TrySendError::Closed(_) => MentorError::Getrennt("Schreib-Task beendet".into()),
        })
    }

    fn close(&mut self) {
        // Sender droppen: Schreib-Task sendet Close-Frame und endet
        if self.out_tx.take().is_none() {
            return;
        }
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        // Schreib-Task laeuft selbststaendig aus
        self.writer.take();
        debug!("WebSocket-Transport geschlossen");
    }
}

impl Drop for GeminiTransport {
    fn drop(&mut self) {
        self.close();
    }
}

async fn schreib_loop(mut write: SplitSink<WsStream, Message>, mut out: mpsc::Receiver<String>) {
    while let Some(text) = out.recv().await {
        trace!(bytes = text.len(), "Sende Audio-Chunk");
        if let Err(e) = write.send(Message::Text(text)).await {
            warn!("WebSocket-Senden fehlgeschlagen: {}", e);
            return;
        }
    }
    let _ = write.send(Message::Close(None)).await;
    let _ = write.close().await;
}

async fn lese_loop(mut read: SplitStream<WsStream>, events: mpsc::Sender<TransportEvent>) {
    let mut grund = None;
    while let Some(msg) = read.next().await {
        let payload = match msg {
            Ok(Message::Text(text)) => text.into_bytes(),
            Ok(Message::Binary(bytes)) => bytes,
            Ok(Message::Close(frame)) => {
                grund = frame
                    .map(|f| f.reason.to_string())
                    .filter(|r| !r.is_empty());
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                return;
            }
        };

        for event in map_payload(&payload) {
            if events.send(event).await.is_err() {
                // Sitzung hoert nicht mehr zu
                return;
            }
        }
    }
    info!(grund = grund.as_deref().unwrap_or("-"), "Live-API hat die Verbindung beendet");
    let _ = events.send(TransportEvent::Closed(grund)).await;
}

/// Uebersetzt eine Server-Nachricht in Transport-Ereignisse.
///
/// Unlesbare Nachrichten werden geloggt und uebersprungen.
pub(crate) fn map_payload(payload: &[u8]) -> Vec<TransportEvent> {
    let msg = match ServerMessage::parse(payload) {
        Ok(m) => m,
        Err(e) => {
            warn!("Server-Nachricht uebersprungen: {}", e);
            return Vec::new();
        }
    };

    msg.events()
        .into_iter()
        .filter_map(|event| match event {
            LiveEvent::SetupComplete => Some(TransportEvent::Opened),
            LiveEvent::Audio(data) => Some(TransportEvent::Audio(data)),
            LiveEvent::Interrupted => Some(TransportEvent::Interrupted),
            LiveEvent::TurnComplete => Some(TransportEvent::TurnComplete),
            LiveEvent::GoAway { time_left } => {
                info!(
                    restzeit = time_left.as_deref().unwrap_or("unbekannt"),
                    "Live-API kuendigt Verbindungsende an"
                );
                None
            }
        })
        .collect()
}
