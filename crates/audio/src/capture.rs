//! Mikrofon-Capture via cpal
//!
//! Oeffnet einen cpal InputStream im Format des Geraets und schreibt
//! Samples in einen lock-free Ring-Buffer. Ein eigener Thread liest den
//! Ring-Buffer, rechnet auf Mono in der Zielrate um, bildet Frames fester
//! Groesse und gibt sie kodiert weiter.
//!
//! ```text
//! cpal Capture Callback
//!     -> Ring-Buffer (lock-free, ringbuf, Geraeteformat)
//!     -> Capture-Thread: Downmix + Resampling (EingangsWandler)
//!     -> Frames sammeln (4096 Samples bei 16kHz)
//!     -> CapturePipeline: Lautheit, PCM16, Base64
//!     -> try_send an den Transport (voll = Frame verwerfen)
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BuildStreamError, Device, SampleFormat, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use crate::device::{bereitschaft_abwarten, format_waehlen, load_cpal_device, GeraeteFormat, Richtung};
use crate::error::{AudioError, AudioResult};
use crate::pipeline::{AudioFrame, CapturePipeline, EncodedFrame, DEFAULT_FRAME_SIZE};
use crate::resample::EingangsWandler;

/// Standard-Abtastrate fuer die Aufnahme
pub const DEFAULT_CAPTURE_RATE: u32 = 16000;

/// Samples pro Lesevorgang aus dem Ring-Buffer
const LESE_BLOCK: usize = 4096;

/// Konfiguration fuer den Audio-Capture
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Zielrate in Hz, geliefert wird immer Mono
    pub sample_rate: u32,
    /// Ring-Buffer Kapazitaet in Samples der Zielrate
    pub buffer_size: usize,
    /// Frame-Groesse in Samples
    pub frame_size: usize,
    /// Kapazitaet der Frame-Queue zum Transport
    pub frame_queue: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_CAPTURE_RATE,
            buffer_size: DEFAULT_CAPTURE_RATE as usize * 2, // 2 Sekunden Puffer
            frame_size: DEFAULT_FRAME_SIZE,
            frame_queue: 8,
        }
    }
}

/// Konsumiert Geraete-Samples (interleaved) fuer die Verarbeitung
pub type CaptureConsumer = HeapCons<f32>;

/// Audio-Capture-Stream
///
/// Haelt den cpal-Stream am Leben. Wird der CaptureStream gedroppt,
/// stoppt die Aufnahme automatisch.
pub struct CaptureStream {
    _stream: Stream,
    config: CaptureConfig,
    format: GeraeteFormat,
}

impl CaptureStream {
    /// Gibt die Konfiguration des Streams zurueck
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Format in dem das Geraet tatsaechlich liefert
    pub fn format(&self) -> GeraeteFormat {
        self.format
    }

    /// Wandler vom Geraeteformat auf Mono in der Zielrate
    pub fn wandler(&self) -> AudioResult<EingangsWandler> {
        EingangsWandler::new(
            self.format.sample_rate,
            self.format.channels,
            self.config.sample_rate,
        )
    }
}

/// Oeffnet einen Capture-Stream auf dem gegebenen Geraet.
///
/// Das Geraet laeuft in seinem eigenen Format (siehe `format_waehlen`),
/// der Ring-Buffer enthaelt interleaved Geraete-Samples. Umrechnung auf
/// die Zielrate passiert beim Lesen ueber `CaptureStream::wandler`.
pub fn open_capture_stream(
    device: &Device,
    config: CaptureConfig,
) -> AudioResult<(CaptureStream, CaptureConsumer)> {
    let format = format_waehlen(device, Richtung::Eingabe, config.sample_rate)?;
    let stream_config = StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let rb = HeapRb::<f32>::new(ring_kapazitaet(&config, &format));
    let (mut producer, consumer) = rb.split();

    let err_fn = |err| error!("Capture-Fehler: {}", err);

    let stream = match format.sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| in_ring(&mut producer, data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => {
            let mut umgewandelt = Vec::new();
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _| {
                    umgewandelt.clear();
                    umgewandelt.extend(data.iter().map(|&s| s as f32 / 32768.0));
                    in_ring(&mut producer, &umgewandelt);
                },
                err_fn,
                None,
            )
        }
        andere => {
            return Err(AudioError::StreamFehler(format!(
                "Nicht unterstuetztes Sample-Format: {andere:?}"
            )))
        }
    }
    .map_err(eingabe_fehler)?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(
        geraet_rate = format.sample_rate,
        kanaele = format.channels,
        ziel_rate = config.sample_rate,
        "Capture-Stream geoeffnet"
    );

    Ok((
        CaptureStream {
            _stream: stream,
            config,
            format,
        },
        consumer,
    ))
}

fn in_ring(producer: &mut HeapProd<f32>, data: &[f32]) {
    let written = producer.push_slice(data);
    if written < data.len() {
        warn!(verworfen = data.len() - written, "Capture Ring-Buffer voll");
    }
}

/// Ring-Buffer-Groesse in Geraete-Samples. `buffer_size` zaehlt in der Zielrate.
fn ring_kapazitaet(config: &CaptureConfig, format: &GeraeteFormat) -> usize {
    let ziel = config.buffer_size.max(config.frame_size).max(1) as f64;
    let faktor = format.sample_rate as f64 / config.sample_rate.max(1) as f64
        * format.channels.max(1) as f64;
    (ziel * faktor).ceil() as usize
}

/// Nicht verfuegbares Geraet heisst fuer den Nutzer: kein Mikrofonzugriff
fn eingabe_fehler(e: BuildStreamError) -> AudioError {
    match e {
        BuildStreamError::DeviceNotAvailable => AudioError::MikrofonNichtVerfuegbar(e.to_string()),
        andere => AudioError::StreamFehler(andere.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Frame-Weitergabe
// ---------------------------------------------------------------------------

/// Zaehler fuer weitergegebene und verworfene Frames
#[derive(Debug, Default)]
pub struct CaptureCounters {
    pub frames_forwarded: AtomicU64,
    pub frames_dropped: AtomicU64,
}

/// Gibt kodierte Frames an die Queue weiter, ohne je zu blockieren.
///
/// Solange `forwarding` nicht gesetzt ist, und wenn die Queue voll oder
/// geschlossen ist, wird der Frame verworfen, nicht nachgeholt.
pub fn forward_frame(
    frame: EncodedFrame,
    forwarding: &AtomicBool,
    tx: &mpsc::Sender<EncodedFrame>,
    counters: &CaptureCounters,
) -> bool {
    if !forwarding.load(Ordering::Relaxed) {
        counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
        return false;
    }
    match tx.try_send(frame) {
        Ok(()) => {
            counters.frames_forwarded.fetch_add(1, Ordering::Relaxed);
            true
        }
        Err(e) => {
            counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Capture-Frame verworfen: {}", e);
            false
        }
    }
}

/// Mikrofon-Eingang fuer die Live-Sitzung
///
/// Der cpal-Stream und der Capture-Loop leben im Thread "mentor-capture".
/// Frames werden erst nach `start()` weitergegeben.
pub struct DeviceInput {
    running: Arc<AtomicBool>,
    forwarding: Arc<AtomicBool>,
    counters: Arc<CaptureCounters>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceInput {
    /// Fordert das Mikrofon an. `None` = Standardgeraet.
    pub fn open(
        device_name: Option<String>,
        config: CaptureConfig,
    ) -> AudioResult<(Self, mpsc::Receiver<EncodedFrame>)> {
        let (frame_tx, frame_rx) = mpsc::channel(config.frame_queue.max(1));
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<AudioResult<()>>(1);

        let running = Arc::new(AtomicBool::new(true));
        let forwarding = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(CaptureCounters::default());

        let t_running = Arc::clone(&running);
        let t_forwarding = Arc::clone(&forwarding);
        let t_counters = Arc::clone(&counters);

        let thread = std::thread::Builder::new()
            .name("mentor-capture".to_string())
            .spawn(move || {
                let geoeffnet = load_cpal_device(Richtung::Eingabe, device_name.as_deref())
                    .and_then(|device| open_capture_stream(&device, config.clone()))
                    .and_then(|(stream, consumer)| {
                        let wandler = stream.wandler()?;
                        Ok((stream, consumer, wandler))
                    });
                let (_stream, consumer, wandler) = match geoeffnet {
                    Ok(v) => v,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }

                capture_loop(
                    consumer,
                    wandler,
                    CapturePipeline::new(config.frame_size, config.sample_rate),
                    frame_tx,
                    t_running,
                    t_forwarding,
                    t_counters,
                );
                debug!("Capture-Thread beendet, Mikrofon freigegeben");
                // _stream wird hier gedroppt
            })
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        bereitschaft_abwarten(&ready_rx)?;

        Ok((
            Self {
                running,
                forwarding,
                counters,
                thread: Some(thread),
            },
            frame_rx,
        ))
    }

    /// Beginnt mit der Weitergabe an den Transport
    pub fn start(&mut self) -> AudioResult<()> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(AudioError::ThreadBeendet);
        }
        self.forwarding.store(true, Ordering::Relaxed);
        info!("Capture-Weitergabe gestartet");
        Ok(())
    }

    /// Stoppt Weitergabe und Aufnahme, gibt das Mikrofon frei. Idempotent.
    pub fn close(&mut self) {
        self.forwarding.store(false, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
            debug!(
                weitergegeben = self.counters.frames_forwarded.load(Ordering::Relaxed),
                verworfen = self.counters.frames_dropped.load(Ordering::Relaxed),
                "Mikrofon geschlossen"
            );
        }
    }

    pub fn counters(&self) -> &CaptureCounters {
        &self.counters
    }
}

impl Drop for DeviceInput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Capture-Loop: liest den Ring-Buffer bis `running` false wird
fn capture_loop(
    mut consumer: CaptureConsumer,
    mut wandler: EingangsWandler,
    mut pipeline: CapturePipeline,
    frame_tx: mpsc::Sender<EncodedFrame>,
    running: Arc<AtomicBool>,
    forwarding: Arc<AtomicBool>,
    counters: Arc<CaptureCounters>,
) {
    let mut roh = vec![0.0f32; LESE_BLOCK];
    let mut mono = Vec::with_capacity(pipeline.frame_size());
    debug!("Capture-Loop gestartet (frame_size={})", pipeline.frame_size());

    while running.load(Ordering::Relaxed) {
        let available = consumer.pop_slice(&mut roh);
        if available == 0 {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }

        mono.clear();
        if let Err(e) = wandler.verarbeiten(&roh[..available], &mut mono) {
            warn!("Capture-Umrechnung fehlgeschlagen: {}", e);
            continue;
        }
        for frame in pipeline.push_samples(&mono) {
            forward_frame(frame, &forwarding, &frame_tx, &counters);
        }
    }
}

// ---------------------------------------------------------------------------
// Clip-Aufnahme
// ---------------------------------------------------------------------------

/// Nimmt `dauer` lang vom Mikrofon auf (blockierend).
///
/// Das Ergebnis ist Mono in `config.sample_rate`, unabhaengig vom
/// Geraeteformat.
pub fn record_clip(
    device_name: Option<&str>,
    config: CaptureConfig,
    dauer: Duration,
) -> AudioResult<AudioFrame> {
    let device = load_cpal_device(Richtung::Eingabe, device_name)?;
    let sample_rate = config.sample_rate;
    let ziel = (dauer.as_secs_f64() * sample_rate as f64) as usize;
    let (stream, mut consumer) = open_capture_stream(&device, config)?;
    let mut wandler = stream.wandler()?;

    let mut samples = Vec::with_capacity(ziel);
    let mut roh = vec![0.0f32; LESE_BLOCK];
    // Sicherheitsgrenze falls das Geraet keine Samples liefert
    let frist = Instant::now() + dauer + Duration::from_secs(2);

    while samples.len() < ziel {
        if Instant::now() > frist {
            return Err(AudioError::StreamFehler(
                "Mikrofon liefert keine Samples".into(),
            ));
        }
        let n = consumer.pop_slice(&mut roh);
        if n == 0 {
            std::thread::sleep(Duration::from_millis(5));
            continue;
        }
        wandler.verarbeiten(&roh[..n], &mut samples)?;
    }
    drop(stream);

    samples.truncate(ziel);
    info!(samples = samples.len(), sample_rate, "Clip aufgenommen");
    Ok(AudioFrame::new(samples, sample_rate))
}
