//! Einzelanalyse ueber `generateContent`
//!
//! Schickt getippten Text oder eine Aufnahme an das Modell und liest das
//! strukturierte Mentor-Feedback aus der Antwort.

use std::time::Duration;

use mentor_core::{MentorError, MentorFeedback, Result};
use mentor_protocol::{GenerateContentRequest, GenerateContentResponse};
use tracing::{debug, info, instrument};

/// Basis-URL der REST-API
pub const DEFAULT_BASIS_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Standard-Modell fuer Text- und Audio-Analysen
pub const DEFAULT_ANALYSE_MODELL: &str = "gemini-3-flash-preview";

/// Maximale Laenge eines Fehler-Bodys in Meldungen
const MAX_FEHLERTEXT: usize = 300;

/// HTTP-Client fuer die Einzelanalyse
pub struct MentorClient {
    http: reqwest::Client,
    basis_url: String,
    modell: String,
    api_key: String,
}

impl MentorClient {
    pub fn new(
        basis_url: impl Into<String>,
        modell: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MentorError::intern(format!("HTTP-Client: {e}")))?;
        Ok(Self {
            http,
            basis_url: basis_url.into(),
            modell: modell.into(),
            api_key: api_key.into(),
        })
    }

    /// Analysiert getippten Text
    #[instrument(skip_all, fields(zeichen = text.len()))]
    pub async fn process_text(&self, text: &str) -> Result<MentorFeedback> {
        if text.trim().is_empty() {
            return Err(MentorError::UngueltigeNachricht("Leere Eingabe".into()));
        }
        self.senden(&GenerateContentRequest::text(text)).await
    }

    /// Analysiert eine Aufnahme (Base64-Daten mit MIME-Typ)
    #[instrument(skip_all, fields(mime = mime_type, bytes = base64_audio.len()))]
    pub async fn process_audio(&self, base64_audio: &str, mime_type: &str) -> Result<MentorFeedback> {
        if base64_audio.is_empty() {
            return Err(MentorError::UngueltigeNachricht("Leere Aufnahme".into()));
        }
        self.senden(&GenerateContentRequest::audio(base64_audio, mime_type))
            .await
    }

    /// Endpunkt ohne Schluessel
    fn endpoint(&self) -> String {
        let modell = self.modell.trim_start_matches("models/");
        format!(
            "{}/models/{}:generateContent",
            self.basis_url.trim_end_matches('/'),
            modell
        )
    }

    async fn senden(&self, request: &GenerateContentRequest) -> Result<MentorFeedback> {
        let url = self.endpoint();
        debug!(url = %url, "Sende Analyse-Anfrage");

        // without_url(): der Schluessel steht in der Query
        let antwort = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(request)
            .send()
            .await
            .map_err(|e| MentorError::Verbindung(e.without_url().to_string()))?;

        let status = antwort.status();
        if !status.is_success() {
            let body = antwort.text().await.unwrap_or_default();
            return Err(MentorError::Verbindung(format!(
                "HTTP {status}: {}",
                kuerzen(body.trim(), MAX_FEHLERTEXT)
            )));
        }

        let antwort: GenerateContentResponse = antwort
            .json()
            .await
            .map_err(|e| MentorError::UngueltigeNachricht(e.without_url().to_string()))?;
        let feedback = antwort.feedback()?;
        info!(mit_tipp = feedback.tip().is_some(), "Mentor-Feedback erhalten");
        Ok(feedback)
    }
}

fn kuerzen(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}
