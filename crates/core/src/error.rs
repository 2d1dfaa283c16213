//! Fehlertypen fuer Mentor
//!
//! Zentraler Fehler-Enum der alle moeglichen Fehlerzustaende abdeckt.
//! Untermodule koennen eigene Fehler definieren und via `From` konvertieren.

use thiserror::Error;

/// Globaler Result-Alias fuer Mentor
pub type Result<T> = std::result::Result<T, MentorError>;

/// Alle moeglichen Fehler im Mentor-System
#[derive(Debug, Error)]
pub enum MentorError {
    // --- Geraete & Berechtigungen ---
    #[error("Mikrofonzugriff nicht moeglich: {0}")]
    MikrofonVerweigert(String),

    #[error("Audiogeraet nicht verfuegbar: {0}")]
    Geraet(String),

    // --- Transport ---
    #[error("Verbindung fehlgeschlagen: {0}")]
    Verbindung(String),

    #[error("Verbindung getrennt: {0}")]
    Getrennt(String),

    #[error("Sendepuffer voll, Frame verworfen")]
    Rueckstau,

    // --- Protokoll & Daten ---
    #[error("Ungueltige Nachricht: {0}")]
    UngueltigeNachricht(String),

    #[error("Audio-Fragment nicht dekodierbar: {0}")]
    Dekodierung(String),

    #[error("Keine Antwort vom Modell")]
    LeereAntwort,

    // --- Konfiguration ---
    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    // --- Intern ---
    #[error("Interner Fehler: {0}")]
    Intern(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl MentorError {
    /// Erstellt einen internen Fehler aus einer beliebigen Nachricht
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }

    /// Mikrofon- oder Geraetefehler beenden einen Verbindungsversuch sofort
    pub fn ist_geraetefehler(&self) -> bool {
        matches!(self, Self::MikrofonVerweigert(_) | Self::Geraet(_))
    }

    /// Fehler der Gegenstelle oder des Netzwerks
    pub fn ist_transportfehler(&self) -> bool {
        matches!(
            self,
            Self::Verbindung(_) | Self::Getrennt(_) | Self::Rueckstau
        )
    }

    /// Meldung fuer die Anzeige. Nie leer.
    pub fn nutzer_meldung(&self) -> String {
        let text = self.to_string();
        if text.trim().is_empty() {
            "Sitzung konnte nicht gestartet werden".into()
        } else {
            text
        }
    }
}

impl From<serde_json::Error> for MentorError {
    fn from(e: serde_json::Error) -> Self {
        Self::UngueltigeNachricht(e.to_string())
    }
}
