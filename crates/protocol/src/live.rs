//! Live-Protokoll (WebSocket, bidirektionales Streaming)
//!
//! ## Ablauf
//! 1. Client sendet `{"setup": {...}}` als erste Nachricht
//! 2. Server bestaetigt mit `{"setupComplete": {}}`
//! 3. Client streamt `{"realtimeInput": {"mediaChunks": [...]}}`
//! 4. Server liefert `serverContent` mit Audio-Parts, `interrupted`,
//!    `turnComplete` sowie gelegentlich `goAway`
//!
//! Alle Nachrichten sind JSON. Der Server darf sie auch als Binaer-Frames
//! senden, der Inhalt bleibt JSON.

use mentor_core::{MentorError, Result};
use serde::{Deserialize, Serialize};

use crate::generate::{Content, InlineData};
use crate::prompt::SYSTEM_INSTRUCTION;

/// Einzige Antwort-Modalitaet der Live-Sitzung
pub const MODALITAET_AUDIO: &str = "AUDIO";

/// MIME-Deskriptor fuer PCM16-Mono mit Abtastrate
pub fn pcm_mime(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

// ---------------------------------------------------------------------------
// Client -> Server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrebuiltVoiceConfig {
    pub voice_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceConfig {
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveGenerationConfig {
    pub response_modalities: Vec<String>,
    pub speech_config: SpeechConfig,
}

/// Sitzungs-Setup (erste Nachricht nach dem Verbindungsaufbau)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setup {
    /// Vollstaendiger Modellname (`models/...`)
    pub model: String,
    pub generation_config: LiveGenerationConfig,
    pub system_instruction: Content,
}

impl Setup {
    /// Audio-Sitzung mit vorgefertigter Stimme und Mentor-Anweisung
    pub fn new(model: &str, voice_name: &str) -> Self {
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        Self {
            model,
            generation_config: LiveGenerationConfig {
                response_modalities: vec![MODALITAET_AUDIO.to_string()],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice_name.to_string(),
                        },
                    },
                },
            },
            system_instruction: Content::system(SYSTEM_INSTRUCTION),
        }
    }

    pub fn voice_name(&self) -> &str {
        &self
            .generation_config
            .speech_config
            .voice_config
            .prebuilt_voice_config
            .voice_name
    }
}

/// Echtzeit-Eingabe: ein oder mehrere Audio-Chunks
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RealtimeInput {
    pub media_chunks: Vec<InlineData>,
}

/// Nachrichten vom Client an den Server
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMessage {
    Setup(Setup),
    RealtimeInput(RealtimeInput),
}

impl ClientMessage {
    /// Ein einzelner Audio-Chunk
    pub fn audio(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        ClientMessage::RealtimeInput(RealtimeInput {
            media_chunks: vec![InlineData {
                mime_type: mime_type.into(),
                data: data.into(),
            }],
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Server -> Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerContent {
    #[serde(default)]
    pub model_turn: Option<Content>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default)]
    pub turn_complete: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoAway {
    #[serde(default)]
    pub time_left: Option<String>,
}

/// Nachricht vom Server. Unbekannte Felder werden ignoriert.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    #[serde(default)]
    pub setup_complete: Option<serde_json::Value>,
    #[serde(default)]
    pub server_content: Option<ServerContent>,
    #[serde(default)]
    pub go_away: Option<GoAway>,
}

/// Aus einer Server-Nachricht abgeleitetes Ereignis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    SetupComplete,
    /// Base64-kodiertes PCM16-Fragment
    Audio(String),
    Interrupted,
    TurnComplete,
    GoAway { time_left: Option<String> },
}

impl ServerMessage {
    /// Parst Text- oder Binaer-Payload
    pub fn parse(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| {
            MentorError::UngueltigeNachricht(format!("Server-Nachricht nicht lesbar: {e}"))
        })
    }

    /// Ereignisse in Verarbeitungsreihenfolge.
    ///
    /// Audio-Parts kommen vor einer Unterbrechung derselben Nachricht.
    pub fn events(&self) -> Vec<LiveEvent> {
        let mut events = Vec::new();
        if self.setup_complete.is_some() {
            events.push(LiveEvent::SetupComplete);
        }
        if let Some(content) = &self.server_content {
            if let Some(turn) = &content.model_turn {
                events.extend(
                    turn.parts
                        .iter()
                        .filter_map(|p| p.inline_data.as_ref())
                        .filter(|d| !d.data.is_empty())
                        .map(|d| LiveEvent::Audio(d.data.clone())),
                );
            }
            if content.interrupted {
                events.push(LiveEvent::Interrupted);
            }
            if content.turn_complete {
                events.push(LiveEvent::TurnComplete);
            }
        }
        if let Some(go_away) = &self.go_away {
            events.push(LiveEvent::GoAway {
                time_left: go_away.time_left.clone(),
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn setup_serialisierung() {
        let msg = ClientMessage::Setup(Setup::new(
            "gemini-2.5-flash-native-audio-preview-09-2025",
            "Kore",
        ));
        let v: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        let setup = &v["setup"];

        assert_eq!(
            setup["model"],
            "models/gemini-2.5-flash-native-audio-preview-09-2025"
        );
        assert_eq!(setup["generationConfig"]["responseModalities"], json!(["AUDIO"]));
        assert_eq!(
            setup["generationConfig"]["speechConfig"]["voiceConfig"]["prebuiltVoiceConfig"]
                ["voiceName"],
            "Kore"
        );
        assert!(setup["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("mentor"));
    }

    #[test]
    fn modell_praefix_nicht_doppelt() {
        let setup = Setup::new("models/x", "Puck");
        assert_eq!(setup.model, "models/x");
        assert_eq!(setup.voice_name(), "Puck");
    }

    #[test]
    fn audio_chunk_serialisierung() {
        let msg = ClientMessage::audio(pcm_mime(16000), "AAA=");
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"realtimeInput":{"mediaChunks":[{"mimeType":"audio/pcm;rate=16000","data":"AAA="}]}}"#
        );
    }

    #[test]
    fn setup_complete_erkannt() {
        let msg = ServerMessage::parse(br#"{"setupComplete":{}}"#).unwrap();
        assert_eq!(msg.events(), vec![LiveEvent::SetupComplete]);
    }

    #[test]
    fn alle_audio_parts_vor_unterbrechung() {
        let payload = json!({
            "serverContent": {
                "modelTurn": { "parts": [
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "AAAA" } },
                    { "text": "ignoriert" },
                    { "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "BBBB" } }
                ]},
                "interrupted": true
            }
        });
        let msg = ServerMessage::parse(payload.to_string().as_bytes()).unwrap();
        assert_eq!(
            msg.events(),
            vec![
                LiveEvent::Audio("AAAA".into()),
                LiveEvent::Audio("BBBB".into()),
                LiveEvent::Interrupted,
            ]
        );
    }

    #[test]
    fn turn_complete_und_go_away() {
        let payload = json!({
            "serverContent": { "turnComplete": true },
            "goAway": { "timeLeft": "10s" }
        });
        let msg = ServerMessage::parse(payload.to_string().as_bytes()).unwrap();
        assert_eq!(
            msg.events(),
            vec![
                LiveEvent::TurnComplete,
                LiveEvent::GoAway {
                    time_left: Some("10s".into())
                },
            ]
        );
    }

    #[test]
    fn unbekannte_nachricht_ohne_ereignisse() {
        let msg = ServerMessage::parse(br#"{"usageMetadata":{"totalTokenCount":3}}"#).unwrap();
        assert!(msg.events().is_empty());
    }

    #[test]
    fn kaputte_nachricht() {
        assert!(matches!(
            ServerMessage::parse(b"{nicht json"),
            Err(MentorError::UngueltigeNachricht(_))
        ));
    }
}
