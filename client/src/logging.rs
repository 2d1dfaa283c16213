//! Structured Logging Setup via tracing-subscriber
//!
//! Konfigurierbar per Umgebungsvariable:
//! - `MENTOR_LOG_LEVEL`: Filter (z.B. `debug` oder `mentor_live=trace`), Standard: Config
//! - `MENTOR_LOG_FORMAT`: Format (text/json), Standard: Config
//!
//! Logs gehen nach stderr, stdout bleibt fuer die Ausgabe des Mentors frei.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialisiert das Logging-System.
///
/// Umgebungsvariablen haben Vorrang vor den Werten aus der Konfiguration.
/// Faellt auf `info` / `text` zurueck falls beides ungueltig ist.
pub fn logging_initialisieren(level: &str, format: &str) {
    let filter = EnvFilter::try_from_env("MENTOR_LOG_LEVEL")
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let format = format_waehlen(std::env::var("MENTOR_LOG_FORMAT").ok(), format);

    match format {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(true)
                .with_current_span(true)
                .init();
        }
        _ => {
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .init();
        }
    }
}

/// Waehlt das Format: Umgebung vor Config, ungueltige Werte werden zu "text"
fn format_waehlen(env: Option<String>, config: &str) -> &'static str {
    match env.as_deref().unwrap_or(config) {
        "json" => "json",
        _ => "text",
    }
}

/// Validiert ob ein Log-Format-String gueltig ist.
pub fn log_format_gueltig(format: &str) -> bool {
    matches!(format, "text" | "json")
}
