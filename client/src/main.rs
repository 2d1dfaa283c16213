//! Mentor Client – Einstiegspunkt
//!
//! Laedt die Konfiguration, initialisiert das Logging und fuehrt den
//! gewaehlten Unterbefehl aus.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mentor_audio::{codec, encode_wav, list_devices, record_clip, CpalBackend, Richtung, WAV_MIME};
use mentor_client::{ausgabe, logging, upload, ClientConfig, MentorClient};
use mentor_live::{GeminiConnector, LiveSession};

#[derive(Parser)]
#[command(name = "mentor", version, about = "Englisch-Mentor fuer Text, Aufnahmen und Live-Gespraeche")]
struct Cli {
    /// Pfad zur Konfigurationsdatei
    #[arg(long, short, env = "MENTOR_CONFIG", default_value = "mentor.toml")]
    config: String,

    #[command(subcommand)]
    befehl: Befehl,
}

#[derive(Subcommand)]
enum Befehl {
    /// Getippten Text korrigieren lassen
    Text {
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Audio-Datei analysieren
    Audio {
        datei: PathBuf,
        /// MIME-Typ, sonst aus der Dateiendung
        #[arg(long)]
        mime: Option<String>,
    },
    /// Vom Mikrofon aufnehmen und analysieren
    Record {
        #[arg(long, default_value_t = 5.0)]
        seconds: f64,
    },
    /// Live-Gespraech mit dem Mentor (Ctrl+C beendet)
    Live,
    /// Audio-Geraete auflisten
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ClientConfig::laden(&cli.config)?;
    logging::logging_initialisieren(&config.logging.level, &config.logging.format);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config,
        "Mentor Client gestartet"
    );

    match cli.befehl {
        Befehl::Text { text } => {
            let client = analyse_client(&config)?;
            let feedback = client.process_text(&text.join(" ")).await?;
            print!("{}", ausgabe::feedback_formatieren(&feedback));
        }
        Befehl::Audio { datei, mime } => {
            let aufnahme = upload::datei_laden(&datei, mime.as_deref())?;
            let client = analyse_client(&config)?;
            let feedback = client
                .process_audio(&aufnahme.base64, &aufnahme.mime_type)
                .await?;
            print!("{}", ausgabe::feedback_formatieren(&feedback));
        }
        Befehl::Record { seconds } => aufnehmen(&config, seconds).await?,
        Befehl::Live => live(&config).await?,
        Befehl::Devices => {
            for richtung in [Richtung::Eingabe, Richtung::Ausgabe] {
                let geraete = list_devices(richtung)?;
                print!("{}", ausgabe::geraete_formatieren(richtung, &geraete));
            }
        }
    }

    Ok(())
}

fn analyse_client(config: &ClientConfig) -> Result<MentorClient> {
    Ok(MentorClient::new(
        config.api.basis_url.clone(),
        config.api.analyse_modell.clone(),
        config.api_schluessel()?,
    )?)
}

/// Nimmt einen Clip auf und schickt ihn als WAV zur Analyse
async fn aufnehmen(config: &ClientConfig, sekunden: f64) -> Result<()> {
    if !(sekunden > 0.0 && sekunden <= 60.0) {
        anyhow::bail!("--seconds muss zwischen 0 und 60 liegen");
    }
    let client = analyse_client(config)?;
    let capture = config.live_config().capture_config();
    let geraet = config.audio.eingabegeraet.clone();

    eprintln!("Aufnahme laeuft ({sekunden:.1} s)...");
    let clip = tokio::task::spawn_blocking(move || {
        record_clip(geraet.as_deref(), capture, Duration::from_secs_f64(sekunden))
    })
    .await
    .context("Aufnahme-Thread abgebrochen")??;
    eprintln!("Aufgenommen: {:.1} s, wird analysiert...", clip.duration());

    let wav = encode_wav(clip.samples(), clip.sample_rate())?;
    let feedback = client
        .process_audio(&codec::encode(&wav), WAV_MIME)
        .await?;
    print!("{}", ausgabe::feedback_formatieren(&feedback));
    Ok(())
}

/// Live-Sitzung bis Ctrl+C oder Ende durch die Gegenstelle
async fn live(config: &ClientConfig) -> Result<()> {
    let live_config = config.live_config();
    let connector = GeminiConnector::new(
        config.api.live_url.clone(),
        config.api_schluessel()?,
        live_config.send_queue,
    );
    let backend = CpalBackend::new(
        config.audio.eingabegeraet.clone(),
        config.audio.ausgabegeraet.clone(),
    );
    let mut session = LiveSession::new(live_config, backend, connector);

    let mut status_rx = session.subscribe();
    let anzeige = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let zeile = ausgabe::status_zeile(&status_rx.borrow_and_update());
            eprint!("\r\x1b[2K{zeile}");
        }
    });

    session.connect().await?;
    eprintln!("\nVerbunden, einfach sprechen. Ctrl+C beendet.");

    tokio::select! {
        _ = session.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Ctrl+C, Sitzung wird beendet");
        }
    }

    let fehler = session.status().error;
    session.disconnect();
    anzeige.abort();
    eprintln!("\n{}", ausgabe::statistik_formatieren(&session.stats()));

    match fehler {
        Some(meldung) => anyhow::bail!(meldung),
        None => Ok(()),
    }
}
