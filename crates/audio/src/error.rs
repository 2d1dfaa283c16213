//! Fehlertypen fuer das Audio-Crate

use mentor_core::MentorError;
use thiserror::Error;

use crate::scheduler::SlotId;

/// Alle moeglichen Fehler im Audio-Crate
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Audio-Geraet nicht gefunden: {0}")]
    GeraetNichtGefunden(String),

    #[error("Kein Standard-Eingabegeraet verfuegbar")]
    KeinStandardEingabegeraet,

    #[error("Kein Standard-Ausgabegeraet verfuegbar")]
    KeinStandardAusgabegeraet,

    #[error("Mikrofon nicht verfuegbar: {0}")]
    MikrofonNichtVerfuegbar(String),

    #[error("Stream-Fehler: {0}")]
    StreamFehler(String),

    #[error("Codec-Fehler: {0}")]
    CodecFehler(String),

    #[error("Konfigurationsfehler: {0}")]
    Konfiguration(String),

    #[error("Playback-Slot unbekannt oder bereits beendet: {0}")]
    SlotUnbekannt(SlotId),

    #[error("Audio-Thread beendet")]
    ThreadBeendet,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unerwarteter Fehler: {0}")]
    Anyhow(#[from] anyhow::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;

impl From<AudioError> for MentorError {
    fn from(e: AudioError) -> Self {
        match e {
            AudioError::CodecFehler(msg) => MentorError::Dekodierung(msg),
            AudioError::Konfiguration(msg) => MentorError::Konfiguration(msg),
            AudioError::KeinStandardEingabegeraet | AudioError::MikrofonNichtVerfuegbar(_) => {
                MentorError::MikrofonVerweigert(e.to_string())
            }
            other => MentorError::Geraet(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn konvertierung_in_mentor_error() {
        let e: MentorError = AudioError::CodecFehler("ungerade".into()).into();
        assert!(matches!(e, MentorError::Dekodierung(_)));

        let e: MentorError = AudioError::KeinStandardEingabegeraet.into();
        assert!(matches!(e, MentorError::MikrofonVerweigert(_)));
        assert!(e.ist_geraetefehler());

        let e: MentorError = AudioError::MikrofonNichtVerfuegbar("belegt".into()).into();
        assert!(matches!(e, MentorError::MikrofonVerweigert(_)));

        // Sonstige Stream-Fehler sind Geraetefehler, kein verweigerter Zugriff
        let e: MentorError = AudioError::StreamFehler("busy".into()).into();
        assert!(matches!(e, MentorError::Geraet(_)));
    }
}
