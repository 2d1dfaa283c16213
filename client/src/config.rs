//! Client-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Client ohne Konfigurationsdatei
//! lauffaehig ist. Nur der API-Schluessel muss gesetzt sein, per Datei
//! oder Umgebungsvariable.

use mentor_core::{MentorError, Result};
use mentor_live::{LiveConfig, DEFAULT_LIVE_URL};
use serde::{Deserialize, Serialize};

use crate::analyse::{DEFAULT_ANALYSE_MODELL, DEFAULT_BASIS_URL};
use crate::logging::log_format_gueltig;

/// Vollstaendige Client-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Zugang zur Sprach-API
    pub api: ApiEinstellungen,
    /// Live-Sitzung
    pub live: LiveEinstellungen,
    /// Geraeteauswahl
    pub audio: AudioEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
}

/// API-Einstellungen
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEinstellungen {
    /// API-Schluessel direkt in der Datei (optional)
    pub schluessel: Option<String>,
    /// Umgebungsvariable mit dem API-Schluessel
    pub schluessel_env: String,
    /// Basis-URL fuer `generateContent`
    pub basis_url: String,
    /// WebSocket-Endpunkt der Live-API
    pub live_url: String,
    /// Modell fuer Text- und Audio-Analysen
    pub analyse_modell: String,
    /// Modell fuer die Live-Sitzung
    pub live_modell: String,
}

impl Default for ApiEinstellungen {
    fn default() -> Self {
        Self {
            schluessel: None,
            schluessel_env: "GEMINI_API_KEY".into(),
            basis_url: DEFAULT_BASIS_URL.into(),
            live_url: DEFAULT_LIVE_URL.into(),
            analyse_modell: DEFAULT_ANALYSE_MODELL.into(),
            live_modell: mentor_live::DEFAULT_LIVE_MODEL.into(),
        }
    }
}

impl std::fmt::Debug for ApiEinstellungen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiEinstellungen")
            .field("schluessel", &self.schluessel.as_ref().map(|_| "***"))
            .field("schluessel_env", &self.schluessel_env)
            .field("basis_url", &self.basis_url)
            .field("live_url", &self.live_url)
            .field("analyse_modell", &self.analyse_modell)
            .field("live_modell", &self.live_modell)
            .finish()
    }
}

/// Einstellungen der Live-Sitzung
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveEinstellungen {
    /// Vorgefertigte Stimme des Modells
    pub stimme: String,
    /// Capture-Abtastrate in Hz
    pub eingabe_rate: u32,
    /// Playback-Abtastrate in Hz
    pub ausgabe_rate: u32,
    /// Samples pro Capture-Frame
    pub frame_groesse: usize,
    /// Kapazitaet der Frame-Queue zum Transport
    pub sende_puffer: usize,
}

impl Default for LiveEinstellungen {
    fn default() -> Self {
        let live = LiveConfig::default();
        Self {
            stimme: live.voice,
            eingabe_rate: live.input_rate,
            ausgabe_rate: live.output_rate,
            frame_groesse: live.frame_size,
            sende_puffer: live.send_queue,
        }
    }
}

/// Geraeteauswahl per Namensfilter (leer = Standardgeraet)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioEinstellungen {
    pub eingabegeraet: Option<String>,
    pub ausgabegeraet: Option<String>,
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl ClientConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(pfad) {
            Ok(inhalt) => toml::from_str::<Self>(&inhalt)
                .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Self::default()
            }
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
                ))
            }
        };
        config.validieren()?;
        Ok(config)
    }

    /// Lehnt Nullwerte, leere Modellnamen und unbekannte Log-Formate ab
    pub fn validieren(&self) -> Result<()> {
        if self.api.analyse_modell.trim().is_empty() {
            return Err(MentorError::Konfiguration(
                "api.analyse_modell ist leer".into(),
            ));
        }
        if !log_format_gueltig(&self.logging.format) {
            return Err(MentorError::Konfiguration(format!(
                "logging.format '{}' unbekannt (text oder json)",
                self.logging.format
            )));
        }
        self.live_config().validate()
    }

    /// API-Schluessel aus der Datei oder der konfigurierten Umgebungsvariable
    pub fn api_schluessel(&self) -> Result<String> {
        self.api_schluessel_mit(|name| std::env::var(name).ok())
    }

    fn api_schluessel_mit(&self, env: impl Fn(&str) -> Option<String>) -> Result<String> {
        self.api
            .schluessel
            .clone()
            .or_else(|| env(&self.api.schluessel_env))
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                MentorError::Konfiguration(format!(
                    "Kein API-Schluessel: api.schluessel oder ${} setzen",
                    self.api.schluessel_env
                ))
            })
    }

    /// Parameter fuer die Live-Sitzung
    pub fn live_config(&self) -> LiveConfig {
        LiveConfig {
            model: self.api.live_modell.clone(),
            voice: self.live.stimme.clone(),
            input_rate: self.live.eingabe_rate,
            output_rate: self.live.ausgabe_rate,
            frame_size: self.live.frame_groesse,
            send_queue: self.live.sende_puffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ClientConfig::default();
        assert!(cfg.validieren().is_ok());
        assert_eq!(cfg.api.schluessel_env, "GEMINI_API_KEY");
        assert_eq!(cfg.api.analyse_modell, "gemini-3-flash-preview");
        assert_eq!(cfg.live.stimme, "Kore");
        assert_eq!(cfg.live.eingabe_rate, 16000);
        assert_eq!(cfg.live.ausgabe_rate, 24000);
        assert_eq!(cfg.live.frame_groesse, 4096);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [api]
            live_modell = "models/test-live"

            [live]
            stimme = "Puck"
            sende_puffer = 4

            [audio]
            eingabegeraet = "USB"
        "#;
        let cfg: ClientConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.live.stimme, "Puck");
        assert_eq!(cfg.audio.eingabegeraet.as_deref(), Some("USB"));
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.live.eingabe_rate, 16000);

        let live = cfg.live_config();
        assert_eq!(live.model, "models/test-live");
        assert_eq!(live.send_queue, 4);
    }

    #[test]
    fn fehlende_datei_liefert_standard() {
        let dir = tempfile::tempdir().unwrap();
        let pfad = dir.path().join("gibt-es-nicht.toml");
        let cfg = ClientConfig::laden(pfad.to_str().unwrap()).unwrap();
        assert_eq!(cfg.live.stimme, "Kore");
    }

    #[test]
    fn datei_laden() {
        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[logging]\nformat = \"json\"").unwrap();
        let cfg = ClientConfig::laden(datei.path().to_str().unwrap()).unwrap();
        assert_eq!(cfg.logging.format, "json");
    }

    #[test]
    fn kaputte_datei_ist_fehler() {
        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[live\nstimme = ").unwrap();
        assert!(ClientConfig::laden(datei.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn nullwerte_abgelehnt() {
        let mut datei = tempfile::NamedTempFile::new().unwrap();
        writeln!(datei, "[live]\nframe_groesse = 0").unwrap();
        assert!(ClientConfig::laden(datei.path().to_str().unwrap()).is_err());
    }

    #[test]
    fn unbekanntes_log_format_abgelehnt() {
        let mut cfg = ClientConfig::default();
        cfg.logging.format = "xml".into();
        assert!(matches!(cfg.validieren(), Err(MentorError::Konfiguration(_))));
    }

    #[test]
    fn schluessel_aus_datei_vor_env() {
        let mut cfg = ClientConfig::default();
        cfg.api.schluessel = Some(" datei-key ".into());
        let key = cfg
            .api_schluessel_mit(|_| Some("env-key".into()))
            .unwrap();
        assert_eq!(key, "datei-key");
    }

    #[test]
    fn schluessel_aus_env() {
        let cfg = ClientConfig::default();
        let key = cfg
            .api_schluessel_mit(|name| (name == "GEMINI_API_KEY").then(|| "env-key".into()))
            .unwrap();
        assert_eq!(key, "env-key");
    }

    #[test]
    fn fehlender_schluessel_ist_konfigurationsfehler() {
        let cfg = ClientConfig::default();
        let err = cfg.api_schluessel_mit(|_| None).unwrap_err();
        assert!(matches!(err, MentorError::Konfiguration(ref m) if m.contains("GEMINI_API_KEY")));

        let err = cfg.api_schluessel_mit(|_| Some("   ".into())).unwrap_err();
        assert!(matches!(err, MentorError::Konfiguration(_)));
    }

    #[test]
    fn debug_verbirgt_schluessel() {
        let mut cfg = ClientConfig::default();
        cfg.api.schluessel = Some("geheim".into());
        assert!(!format!("{cfg:?}").contains("geheim"));
    }
}
