//! Gemeinsame Typen fuer Mentor
//!
//! Sitzungs-Identifikation, beobachtbarer Sitzungszustand und das
//! strukturierte Feedback der Einzelanalyse.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Eindeutige ID eines Verbindungsversuchs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Erstellt eine neue zufaellige SessionId
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Gibt die innere UUID zurueck
    pub fn inner(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session:{}", self.0)
    }
}

/// Phase der Live-Sitzung
///
/// `Connecting`/`Connected` schliessen `Idle` aus. Der Endzustand einer
/// Verbindung (geschlossen) faellt nach dem Abbau wieder auf `Idle`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
}

/// Beobachtbarer Zustand fuer die Oberflaeche
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    /// Letzte Fehlermeldung, bleibt bis zum naechsten `connect()` stehen
    pub error: Option<String>,
    /// Lautheit des letzten Capture-Frames (0.0..=1.0)
    pub loudness: f32,
}

impl SessionStatus {
    pub fn is_connected(&self) -> bool {
        self.phase == SessionPhase::Connected
    }

    pub fn is_connecting(&self) -> bool {
        self.phase == SessionPhase::Connecting
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Fehlermeldung oder leerer String
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}

/// Strukturiertes Mentor-Feedback
///
/// Wire-Format: `{correctedVersion, professionalVersion, tip?}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MentorFeedback {
    /// Grammatikalisch korrigierte Fassung im Stil des Sprechers
    pub corrected_version: String,
    /// Professionelle Business-Englisch-Fassung
    pub professional_version: String,
    /// Optionaler Einzeiler-Tipp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tip: Option<String>,
}

impl MentorFeedback {
    /// Tipp nur wenn er Inhalt hat
    pub fn tip(&self) -> Option<&str> {
        self.tip
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}
