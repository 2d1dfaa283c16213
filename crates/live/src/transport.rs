//! Transport-Schnittstelle der Live-Sitzung
//!
//! Schmale Abstraktion ueber die Gegenstelle: oeffnen, senden, schliessen
//! und ein Ereignis-Stream in Ankunftsreihenfolge.

use async_trait::async_trait;
use mentor_core::Result;
use mentor_protocol::Setup;
use tokio::sync::mpsc;

/// Eingehendes Ereignis der Gegenstelle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Gegenstelle hat das Setup bestaetigt
    Opened,
    /// Base64-kodiertes PCM16-Fragment
    Audio(String),
    /// Antwort des Modells wurde abgebrochen
    Interrupted,
    TurnComplete,
    /// Verbindung beendet (optional mit Grund)
    Closed(Option<String>),
    Error(String),
}

/// Ausgehender Audio-Frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub mime_type: String,
    pub data: String,
}

/// Geoeffnete Verbindung
pub trait Transport: Send {
    /// Reiht einen Frame ein, ohne auf Zustellung zu warten.
    ///
    /// Reihenfolge bleibt erhalten. Ist der Sendepuffer voll, wird mit
    /// `Rueckstau` abgelehnt statt zu blockieren.
    fn send(&mut self, frame: OutboundFrame) -> Result<()>;

    /// Schliesst die Verbindung. Mehrfacher Aufruf ist erlaubt.
    fn close(&mut self);
}

/// Baut Verbindungen auf
#[async_trait]
pub trait TransportConnector: Send {
    type Session: Transport + 'static;

    /// Oeffnet eine Verbindung und sendet das Setup.
    ///
    /// Das erste Ereignis ist `Opened`, sobald die Gegenstelle bestaetigt.
    async fn open(
        &mut self,
        setup: &Setup,
    ) -> Result<(Self::Session, mpsc::Receiver<TransportEvent>)>;
}
