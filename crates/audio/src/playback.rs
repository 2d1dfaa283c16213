//! Audio-Playback via cpal
//!
//! Der cpal-OutputStream rendert aus einem Mixer, der geplante Slots an
//! absoluten Positionen der Geraete-Uhr abspielt. Die Uhr ist die Anzahl
//! bereits gerenderter Frames geteilt durch die Abtastrate.
//!
//! Der Mixer laeuft immer in der Rate der Modell-Ausgabe (Mono). Liefert
//! das Geraet eine andere Rate oder mehrere Kanaele, rechnet der
//! `AusgabeWandler` im Callback um. Die Uhr laeuft dann um hoechstens
//! einen Resampler-Block voraus.
//!
//! cpal::Stream ist !Send, daher lebt der Stream in einem eigenen
//! std::thread bis `close()` aufgerufen wird.

use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use crate::device::{bereitschaft_abwarten, format_waehlen, load_cpal_device, Richtung};
use crate::error::{AudioError, AudioResult};
use crate::resample::AusgabeWandler;
use crate::scheduler::{PlaybackSink, SlotId};

/// Standard-Abtastrate der Modell-Ausgabe
pub const DEFAULT_PLAYBACK_RATE: u32 = 24000;

/// Konfiguration fuer den Audio-Playback
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Rate der Mono-Slots und der Mixer-Uhr in Hz
    pub sample_rate: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_PLAYBACK_RATE,
        }
    }
}

struct Voice {
    id: SlotId,
    start_frame: u64,
    samples: Arc<[f32]>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

/// Mixer mit Geraete-Uhr
///
/// Laeuft im cpal-Callback. Ueberlappende Slots werden addiert und
/// auf [-1, 1] begrenzt.
pub struct Mixer {
    voices: Vec<Voice>,
    frames_rendered: u64,
    sample_rate: u32,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            voices: Vec::new(),
            frames_rendered: 0,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Geraete-Uhr in Sekunden
    pub fn now(&self) -> f64 {
        self.frames_rendered as f64 / self.sample_rate as f64
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Anzahl noch nicht beendeter Slots
    pub fn active(&self) -> usize {
        self.voices.len()
    }

    /// Plant Samples ab `start` Sekunden ein. Liegt `start` bereits hinter
    /// der Uhr, beginnt der Slot vollstaendig beim naechsten Block.
    pub fn add(&mut self, id: SlotId, samples: Arc<[f32]>, start: f64) {
        let start_frame = ((start.max(0.0) * self.sample_rate as f64).round() as u64)
            .max(self.frames_rendered);
        self.voices.push(Voice {
            id,
            start_frame,
            samples,
        });
    }

    /// Entfernt einen Slot. `false` wenn er nicht (mehr) existiert.
    pub fn remove(&mut self, id: SlotId) -> bool {
        let vorher = self.voices.len();
        self.voices.retain(|v| v.id != id);
        self.voices.len() != vorher
    }

    /// Rendert den naechsten Block (interleaved) und gibt beendete Slots zurueck
    pub fn render(&mut self, out: &mut [f32], channels: usize) -> Vec<SlotId> {
        let channels = channels.max(1);
        let frames = (out.len() / channels) as u64;
        out.fill(0.0);

        let begin = self.frames_rendered;
        let end = begin + frames;

        for voice in &self.voices {
            let von = voice.start_frame.max(begin);
            let bis = voice.end_frame().min(end);
            for abs in von..bis {
                let sample = voice.samples[(abs - voice.start_frame) as usize];
                let frame = (abs - begin) as usize;
                for ch in 0..channels {
                    out[frame * channels + ch] += sample;
                }
            }
        }

        for s in out.iter_mut() {
            *s = s.clamp(-1.0, 1.0);
        }

        self.frames_rendered = end;

        let mut beendet = Vec::new();
        self.voices.retain(|v| {
            let fertig = v.end_frame() <= end;
            if fertig {
                beendet.push(v.id);
            }
            !fertig
        });
        beendet
    }
}

/// Ausgabegeraet mit Mixer, implementiert `PlaybackSink`
pub struct DeviceOutput {
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
    shutdown_tx: Option<crossbeam_channel::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl DeviceOutput {
    /// Oeffnet das Ausgabegeraet. `None` = Standardgeraet.
    ///
    /// Der Receiver liefert die IDs abgeschlossener Slots.
    pub fn open(
        device_name: Option<String>,
        config: PlaybackConfig,
    ) -> AudioResult<(Self, mpsc::UnboundedReceiver<SlotId>)> {
        let mixer = Arc::new(Mutex::new(Mixer::new(config.sample_rate)));
        let (beendet_tx, beendet_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = std::sync::mpsc::sync_channel::<AudioResult<()>>(1);
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);

        let thread_mixer = Arc::clone(&mixer);
        let sample_rate = config.sample_rate;

        let thread = std::thread::Builder::new()
            .name("mentor-playback".to_string())
            .spawn(move || {
                let stream = match open_output_stream(
                    device_name.as_deref(),
                    &config,
                    thread_mixer,
                    beendet_tx,
                ) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if ready_tx.send(Ok(())).is_err() {
                    return;
                }
                // Blockiert bis close() oder bis der Sender gedroppt wird
                let _ = shutdown_rx.recv();
                drop(stream);
                debug!("Playback-Thread beendet, Stream freigegeben");
            })
            .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

        bereitschaft_abwarten(&ready_rx)?;

        Ok((
            Self {
                mixer,
                sample_rate,
                shutdown_tx: Some(shutdown_tx),
                thread: Some(thread),
            },
            beendet_rx,
        ))
    }

    /// Anzahl aktuell im Mixer befindlicher Slots
    pub fn active(&self) -> usize {
        self.mixer.lock().active()
    }
}

impl PlaybackSink for DeviceOutput {
    fn now(&self) -> f64 {
        self.mixer.lock().now()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn schedule(&mut self, id: SlotId, samples: Arc<[f32]>, start: f64) -> AudioResult<()> {
        if self.shutdown_tx.is_none() {
            return Err(AudioError::ThreadBeendet);
        }
        self.mixer.lock().add(id, samples, start);
        Ok(())
    }

    fn stop(&mut self, id: SlotId) -> AudioResult<()> {
        if self.mixer.lock().remove(id) {
            Ok(())
        } else {
            Err(AudioError::SlotUnbekannt(id))
        }
    }

    fn close(&mut self) {
        let Some(tx) = self.shutdown_tx.take() else {
            return;
        };
        let _ = tx.send(());
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
        self.mixer.lock().voices.clear();
        debug!("Ausgabegeraet geschlossen");
    }
}

impl Drop for DeviceOutput {
    fn drop(&mut self) {
        self.close();
    }
}

/// Baut den cpal-OutputStream, der aus dem Mixer liest
fn open_output_stream(
    device_name: Option<&str>,
    config: &PlaybackConfig,
    mixer: Arc<Mutex<Mixer>>,
    beendet_tx: mpsc::UnboundedSender<SlotId>,
) -> AudioResult<Stream> {
    let device = load_cpal_device(Richtung::Ausgabe, device_name)?;
    let format = format_waehlen(&device, Richtung::Ausgabe, config.sample_rate)?;

    let stream_config = StreamConfig {
        channels: format.channels,
        sample_rate: cpal::SampleRate(format.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let err_fn = |err| error!("Playback-Fehler: {}", err);

    let mut wandler = AusgabeWandler::new(config.sample_rate, format.sample_rate)?;
    let ch = format.channels as usize;
    let mut beendet = Vec::new();
    let mut rendern = move |data: &mut [f32]| {
        {
            let mut m = mixer.lock();
            let ergebnis = wandler.fuellen(data, ch, |block| beendet.extend(m.render(block, 1)));
            if let Err(e) = ergebnis {
                warn!("Playback-Umrechnung fehlgeschlagen: {}", e);
                data.fill(0.0);
            }
        }
        for id in beendet.drain(..) {
            let _ = beendet_tx.send(id);
        }
    };

    let stream = match format.sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| rendern(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => {
            let mut float_buf = Vec::new();
            device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _| {
                    float_buf.resize(data.len(), 0.0);
                    rendern(&mut float_buf);
                    for (out, s) in data.iter_mut().zip(float_buf.iter()) {
                        *out = (*s * i16::MAX as f32) as i16;
                    }
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
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    debug!(
        geraet_rate = format.sample_rate,
        kanaele = format.channels,
        mixer_rate = config.sample_rate,
        "Playback-Stream geoeffnet"
    );

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: usize, wert: f32) -> Arc<[f32]> {
        vec![wert; n].into()
    }

    #[test]
    fn playback_config_default() {
        let config = PlaybackConfig::default();
        assert_eq!(config.sample_rate, 24000);
    }

    #[test]
    fn uhr_zaehlt_gerenderte_frames() {
        let mut m = Mixer::new(24000);
        assert_eq!(m.now(), 0.0);
        let mut out = vec![0.0; 2400];
        m.render(&mut out, 1);
        assert!((m.now() - 0.1).abs() < 1e-12);

        // Stereo: 2400 Werte = 1200 Frames
        m.render(&mut out, 2);
        assert_eq!(m.frames_rendered(), 3600);
    }

    #[test]
    fn slot_startet_an_absoluter_position() {
        let mut m = Mixer::new(10);
        m.add(SlotId(0), slot(3, 0.5), 0.4);
        let mut out = vec![0.0; 8];
        let beendet = m.render(&mut out, 1);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 0.5, 0.5, 0.5, 0.0]);
        assert_eq!(beendet, vec![SlotId(0)]);
        assert_eq!(m.active(), 0);
    }

    #[test]
    fn aufeinanderfolgende_slots_ohne_luecke() {
        let mut m = Mixer::new(10);
        m.add(SlotId(0), slot(4, 0.25), 0.0);
        m.add(SlotId(1), slot(4, 0.5), 0.4);
        let mut out = vec![0.0; 8];
        m.render(&mut out, 1);
        assert_eq!(out, vec![0.25, 0.25, 0.25, 0.25, 0.5, 0.5, 0.5, 0.5]);
    }

    #[test]
    fn slot_ueber_blockgrenze() {
        let mut m = Mixer::new(10);
        m.add(SlotId(7), slot(6, 0.1), 0.0);
        let mut out = vec![0.0; 4];
        assert!(m.render(&mut out, 1).is_empty());
        assert_eq!(m.active(), 1);
        let beendet = m.render(&mut out, 1);
        assert_eq!(beendet, vec![SlotId(7)]);
        assert_eq!(out, vec![0.1, 0.1, 0.0, 0.0]);
    }

    #[test]
    fn mono_slot_auf_alle_kanaele() {
        let mut m = Mixer::new(10);
        m.add(SlotId(0), slot(2, 0.3), 0.0);
        let mut out = vec![0.0; 4];
        m.render(&mut out, 2);
        assert_eq!(out, vec![0.3, 0.3, 0.3, 0.3]);
    }

    #[test]
    fn ueberlappung_wird_begrenzt() {
        let mut m = Mixer::new(10);
        m.add(SlotId(0), slot(2, 0.8), 0.0);
        m.add(SlotId(1), slot(2, 0.8), 0.0);
        let mut out = vec![0.0; 2];
        m.render(&mut out, 1);
        assert_eq!(out, vec![1.0, 1.0]);
    }

    #[test]
    fn entfernen_stoppt_sofort() {
        let mut m = Mixer::new(10);
        m.add(SlotId(0), slot(10, 0.5), 0.0);
        let mut out = vec![0.0; 2];
        m.render(&mut out, 1);
        assert!(m.remove(SlotId(0)));
        assert!(!m.remove(SlotId(0)), "Zweites Entfernen meldet unbekannt");
        let beendet = m.render(&mut out, 1);
        assert!(beendet.is_empty(), "Gestoppte Slots melden kein Ende");
        assert_eq!(out, vec![0.0, 0.0]);
    }

    #[test]
    fn verspaeteter_slot_spielt_vollstaendig() {
        let mut m = Mixer::new(10);
        // Geplant bei now = 0, der Block war aber schon unterwegs
        let start = m.now();
        let mut out = vec![0.0; 4];
        m.render(&mut out, 1);
        m.add(SlotId(0), vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6].into(), start);

        let mut out = vec![0.0; 6];
        let beendet = m.render(&mut out, 1);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(beendet, vec![SlotId(0)]);
    }

    #[test]
    fn verspaeteter_slot_mitten_im_block() {
        let mut m = Mixer::new(10);
        let mut out = vec![0.0; 4];
        m.render(&mut out, 1);
        // Start bei Frame 2, Uhr steht bei Frame 4
        m.add(SlotId(0), vec![0.1, 0.2, 0.3, 0.4].into(), 0.2);
        m.render(&mut out, 1);
        assert_eq!(out, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn ausgabegeraet_oeffnen() {
        let result = DeviceOutput::open(None, PlaybackConfig::default());
        assert!(result.is_ok(), "Ausgabegeraet sollte oeffenbar sein");
        let (mut output, _rx) = result.unwrap();
        output.close();
        output.close();
    }
}
