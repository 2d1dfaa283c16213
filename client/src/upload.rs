//! Audio-Datei fuer die Analyse laden
//!
//! Der MIME-Typ folgt aus der Dateiendung, wenn er nicht explizit
//! angegeben ist.

use std::path::Path;

use mentor_audio::codec;
use mentor_core::{MentorError, Result};
use tracing::debug;

/// Obergrenze fuer Inline-Daten in `generateContent`
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

/// Geladene Aufnahme, bereit fuer `process_audio`
#[derive(Debug, Clone)]
pub struct Aufnahme {
    pub base64: String,
    pub mime_type: String,
    pub bytes: usize,
}

/// MIME-Typ anhand der Dateiendung
pub fn mime_aus_pfad(pfad: &Path) -> Option<&'static str> {
    let endung = pfad.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match endung.as_str() {
        "wav" => "audio/wav",
        "mp3" => "audio/mp3",
        "webm" => "audio/webm",
        "ogg" | "oga" => "audio/ogg",
        "m4a" | "mp4" => "audio/mp4",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        _ => return None,
    };
    Some(mime)
}

/// Liest eine Audio-Datei und kodiert sie als Base64
pub fn datei_laden(pfad: &Path, mime: Option<&str>) -> Result<Aufnahme> {
    let mime_type = match mime {
        Some(m) if m.starts_with("audio/") => m.to_string(),
        Some(m) => {
            return Err(MentorError::Konfiguration(format!(
                "MIME-Typ '{m}' ist kein Audio-Typ"
            )))
        }
        None => mime_aus_pfad(pfad)
            .ok_or_else(|| {
                MentorError::Konfiguration(format!(
                    "Audioformat von '{}' unbekannt, --mime angeben",
                    pfad.display()
                ))
            })?
            .to_string(),
    };

    let meta = std::fs::metadata(pfad)
        .map_err(|e| MentorError::Konfiguration(format!("'{}': {e}", pfad.display())))?;
    if meta.len() == 0 {
        return Err(MentorError::UngueltigeNachricht(format!(
            "'{}' ist leer",
            pfad.display()
        )));
    }
    if meta.len() > MAX_UPLOAD_BYTES {
        return Err(MentorError::Konfiguration(format!(
            "'{}' ist zu gross ({} Bytes, maximal {MAX_UPLOAD_BYTES})",
            pfad.display(),
            meta.len()
        )));
    }

    let daten = std::fs::read(pfad)
        .map_err(|e| MentorError::Konfiguration(format!("'{}': {e}", pfad.display())))?;
    debug!(pfad = %pfad.display(), bytes = daten.len(), mime = %mime_type, "Audio-Datei geladen");

    Ok(Aufnahme {
        base64: codec::encode(&daten),
        mime_type,
        bytes: daten.len(),
    })
}
