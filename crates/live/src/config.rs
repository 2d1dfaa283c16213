//! Parameter einer Live-Sitzung

use mentor_audio::{
    CaptureConfig, PlaybackConfig, DEFAULT_CAPTURE_RATE, DEFAULT_FRAME_SIZE, DEFAULT_PLAYBACK_RATE,
};
use mentor_core::{MentorError, Result};
use mentor_protocol::Setup;

/// Standard-Modell fuer native Audio-Ausgabe
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-09-2025";

/// Standard-Stimme
pub const DEFAULT_VOICE: &str = "Kore";

#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub model: String,
    pub voice: String,
    /// Capture-Abtastrate (Hz)
    pub input_rate: u32,
    /// Playback-Abtastrate der Modell-Ausgabe (Hz)
    pub output_rate: u32,
    /// Samples pro Capture-Frame
    pub frame_size: usize,
    /// Kapazitaet der Frame-Queue zwischen Capture und Transport
    pub send_queue: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_LIVE_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            input_rate: DEFAULT_CAPTURE_RATE,
            output_rate: DEFAULT_PLAYBACK_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            send_queue: 8,
        }
    }
}

impl LiveConfig {
    /// Prueft Werte die keinen Sinn ergeben
    pub fn validate(&self) -> Result<()> {
        if self.input_rate == 0 || self.output_rate == 0 {
            return Err(MentorError::Konfiguration(
                "Abtastrate darf nicht 0 sein".into(),
            ));
        }
        if self.frame_size == 0 {
            return Err(MentorError::Konfiguration(
                "Frame-Groesse darf nicht 0 sein".into(),
            ));
        }
        if self.send_queue == 0 {
            return Err(MentorError::Konfiguration(
                "Sendepuffer darf nicht 0 sein".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(MentorError::Konfiguration("Kein Live-Modell gesetzt".into()));
        }
        Ok(())
    }

    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.input_rate,
            buffer_size: self.input_rate as usize * 2,
            frame_size: self.frame_size,
            frame_queue: self.send_queue,
        }
    }

    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            sample_rate: self.output_rate,
        }
    }

    pub fn setup(&self) -> Setup {
        Setup::new(&self.model, &self.voice)
    }
}
