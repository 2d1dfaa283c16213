//! Einzelanalyse (`generateContent`)
//!
//! Request- und Response-Typen fuer Text- und Audio-Analysen. Die Antwort
//! des Modells ist ein JSON-Text im ersten Kandidaten, der als
//! `MentorFeedback` gelesen wird.

use mentor_core::{MentorError, MentorFeedback, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prompt::{response_schema, ANTWORT_MIME, AUDIO_ANALYSE_HINWEIS, SYSTEM_INSTRUCTION};

// ---------------------------------------------------------------------------
// Gemeinsame Bausteine
// ---------------------------------------------------------------------------

/// Binaere Nutzdaten als Base64 mit MIME-Typ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

/// Ein Teil eines Inhalts: Text oder Inline-Daten
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }),
        }
    }
}

/// Inhalt mit optionaler Rolle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: Some("user".to_string()),
            parts,
        }
    }

    /// Systemanweisung (ohne Rolle)
    pub fn system(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    pub response_schema: Value,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            response_mime_type: ANTWORT_MIME.to_string(),
            response_schema: response_schema(),
        }
    }
}

/// Body von `POST models/{model}:generateContent`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub system_instruction: Content,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// Analyse eines getippten Texts
    pub fn text(text: &str) -> Self {
        Self::mit_teilen(vec![Part::text(text)])
    }

    /// Analyse einer Aufnahme (Base64-Daten + MIME-Typ)
    pub fn audio(base64_audio: &str, mime_type: &str) -> Self {
        Self::mit_teilen(vec![
            Part::inline(mime_type, base64_audio),
            Part::text(AUDIO_ANALYSE_HINWEIS),
        ])
    }

    fn mit_teilen(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content::user(parts)],
            system_instruction: Content::system(SYSTEM_INSTRUCTION),
            generation_config: GenerationConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Verketteter Text aller Text-Parts des ersten Kandidaten
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// Liest die Mentor-Antwort aus dem ersten Kandidaten
    pub fn feedback(&self) -> Result<MentorFeedback> {
        let text = self.text().ok_or(MentorError::LeereAntwort)?;
        parse_feedback(&text)
    }
}

/// Parst den JSON-Text des Modells als `MentorFeedback`
pub fn parse_feedback(text: &str) -> Result<MentorFeedback> {
    serde_json::from_str(text.trim()).map_err(|e| {
        MentorError::UngueltigeNachricht(format!("Mentor-Antwort nicht lesbar: {e}"))
    })
}
