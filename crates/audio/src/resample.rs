//! Kanal- und Ratenanpassung zwischen Geraet und Live-API
//!
//! Viele Geraete liefern nur 44.1/48 kHz Stereo. Die Live-API erwartet
//! 16 kHz Mono und liefert 24 kHz Mono.
//!
//! ```text
//! Capture:  Geraet (interleaved) -> Downmix -> Resampling -> CapturePipeline
//! Playback: Mixer (Mono, 24 kHz) -> Resampling -> FIFO -> Upmix -> Geraet
//! ```

use std::collections::VecDeque;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use crate::error::{AudioError, AudioResult};

/// Eingangsblock des Resamplers in Frames
pub const RESAMPLE_BLOCK: usize = 1024;

/// Mittelt interleaved Samples zu Mono. Unvollstaendige Frames am Ende
/// werden ignoriert.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Streaming-Resampler fuer Mono-Signale.
///
/// Sammelt Eingabe bis ein ganzer Block vorliegt. Bei gleicher Rate
/// wird unveraendert durchgereicht.
pub struct Ratenwandler {
    resampler: Option<SincFixedIn<f32>>,
    puffer: Vec<f32>,
}

impl Ratenwandler {
    pub fn new(von: u32, nach: u32) -> AudioResult<Self> {
        if von == 0 || nach == 0 {
            return Err(AudioError::Konfiguration(
                "Abtastrate darf nicht 0 sein".into(),
            ));
        }
        let resampler = if von == nach {
            None
        } else {
            let params = SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 128,
                window: WindowFunction::BlackmanHarris2,
            };
            let r = SincFixedIn::<f32>::new(nach as f64 / von as f64, 1.0, params, RESAMPLE_BLOCK, 1)
                .map_err(|e| AudioError::Konfiguration(format!("Resampler: {e}")))?;
            Some(r)
        };
        Ok(Self {
            resampler,
            puffer: Vec::with_capacity(RESAMPLE_BLOCK * 2),
        })
    }

    pub fn durchreichend(&self) -> bool {
        self.resampler.is_none()
    }

    /// Haengt das umgerechnete Signal an `ausgabe` an
    pub fn verarbeiten(&mut self, mono: &[f32], ausgabe: &mut Vec<f32>) -> AudioResult<()> {
        let Some(resampler) = self.resampler.as_mut() else {
            ausgabe.extend_from_slice(mono);
            return Ok(());
        };
        self.puffer.extend_from_slice(mono);
        while self.puffer.len() >= RESAMPLE_BLOCK {
            let block = resampler
                .process(&[&self.puffer[..RESAMPLE_BLOCK]], None)
                .map_err(|e| AudioError::CodecFehler(format!("Resampling: {e}")))?;
            if let Some(kanal) = block.first() {
                ausgabe.extend_from_slice(kanal);
            }
            self.puffer.drain(..RESAMPLE_BLOCK);
        }
        Ok(())
    }
}

/// Geraete-Eingang -> Mono in Zielrate
pub struct EingangsWandler {
    kanaele: usize,
    rest: Vec<f32>,
    rate: Ratenwandler,
    mono: Vec<f32>,
}

impl EingangsWandler {
    pub fn new(geraete_rate: u32, kanaele: u16, ziel_rate: u32) -> AudioResult<Self> {
        Ok(Self {
            kanaele: kanaele.max(1) as usize,
            rest: Vec::new(),
            rate: Ratenwandler::new(geraete_rate, ziel_rate)?,
            mono: Vec::new(),
        })
    }

    /// Nimmt interleaved Geraete-Samples, auch mit angeschnittenen Frames
    pub fn verarbeiten(&mut self, interleaved: &[f32], ausgabe: &mut Vec<f32>) -> AudioResult<()> {
        self.rest.extend_from_slice(interleaved);
        let voll = self.rest.len() / self.kanaele * self.kanaele;
        if voll == 0 {
            return Ok(());
        }
        self.mono = downmix(&self.rest[..voll], self.kanaele);
        self.rest.drain(..voll);
        self.rate.verarbeiten(&self.mono, ausgabe)
    }
}

/// Mono-Quelle in Quellrate -> Geraete-Ausgabe (interleaved)
pub struct AusgabeWandler {
    rate: Ratenwandler,
    fifo: VecDeque<f32>,
    block: Vec<f32>,
    umgerechnet: Vec<f32>,
}

impl AusgabeWandler {
    pub fn new(quell_rate: u32, geraete_rate: u32) -> AudioResult<Self> {
        Ok(Self {
            rate: Ratenwandler::new(quell_rate, geraete_rate)?,
            fifo: VecDeque::new(),
            block: Vec::new(),
            umgerechnet: Vec::new(),
        })
    }

    /// Fuellt `out` komplett. `quelle` rendert jeweils einen Mono-Block.
    ///
    /// Ohne Umrechnung wird genau so viel gerendert wie gebraucht wird.
    pub fn fuellen(
        &mut self,
        out: &mut [f32],
        kanaele: usize,
        mut quelle: impl FnMut(&mut [f32]),
    ) -> AudioResult<()> {
        let kanaele = kanaele.max(1);
        let frames = out.len() / kanaele;

        while self.fifo.len() < frames {
            let n = if self.rate.durchreichend() {
                frames - self.fifo.len()
            } else {
                RESAMPLE_BLOCK
            };
            self.block.clear();
            self.block.resize(n, 0.0);
            quelle(self.block.as_mut_slice());

            self.umgerechnet.clear();
            self.rate.verarbeiten(&self.block, &mut self.umgerechnet)?;
            self.fifo.extend(self.umgerechnet.iter().copied());
        }

        for frame in out.chunks_exact_mut(kanaele) {
            let s = self.fifo.pop_front().unwrap_or(0.0);
            frame.fill(s);
        }
        Ok(())
    }
}
