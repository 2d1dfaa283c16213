//! Capture-Pipeline
//!
//! Sammelt Mikrofon-Samples zu Frames fester Groesse und verarbeitet
//! jeden Frame: Lautheit messen, nach PCM16 wandeln, Base64 kodieren.
//! Das Ergebnis geht unveraendert an den Transport.

use std::sync::Arc;

use crate::codec;
use crate::loudness;

/// Standard-Frame-Groesse in Samples (Latenz vs. Overhead, kein Protokollwert)
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Unveraenderlicher Mono-Frame mit fester Abtastrate
#[derive(Debug, Clone)]
pub struct AudioFrame {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Dauer in Sekunden
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Fertig kodierter Capture-Frame
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedFrame {
    /// Laufende Nummer in Capture-Reihenfolge
    pub sequence: u64,
    /// Base64 der PCM16-Little-Endian-Samples
    pub data: String,
    /// Lautheit (0.0..=1.0) fuer die Pegelanzeige
    pub loudness: f32,
    pub sample_rate: u32,
    pub sample_count: usize,
}

/// Capture-Pipeline: Frame-Sammlung + Kodierung
pub struct CapturePipeline {
    frame_size: usize,
    sample_rate: u32,
    buffer: Vec<f32>,
    sequence: u64,
}

impl CapturePipeline {
    /// Erstellt eine Pipeline fuer Frames der gegebenen Groesse
    pub fn new(frame_size: usize, sample_rate: u32) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            sample_rate,
            buffer: Vec::with_capacity(frame_size * 2),
            sequence: 0,
        }
    }

    /// Haengt Samples an und gibt alle vollstaendigen Frames kodiert zurueck
    pub fn push_samples(&mut self, input: &[f32]) -> Vec<EncodedFrame> {
        self.buffer.extend_from_slice(input);

        let mut fertig = Vec::new();
        while self.buffer.len() >= self.frame_size {
            let samples: Vec<f32> = self.buffer.drain(..self.frame_size).collect();
            let frame = AudioFrame::new(samples, self.sample_rate);
            fertig.push(self.process_frame(&frame));
        }
        fertig
    }

    /// Verarbeitet genau einen Frame
    pub fn process_frame(&mut self, frame: &AudioFrame) -> EncodedFrame {
        let sequence = self.sequence;
        self.sequence += 1;

        EncodedFrame {
            sequence,
            data: codec::encode_frame(frame.samples()),
            loudness: loudness::loudness(frame.samples()),
            sample_rate: frame.sample_rate(),
            sample_count: frame.len(),
        }
    }

    /// Anzahl gepufferter Samples die noch keinen vollen Frame ergeben
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Verwirft gepufferte Samples und setzt die Sequenz zurueck
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.sequence = 0;
    }
}
