//! Audio-Geraete-Enumeration und -Auswahl
//!
//! Listet Ein- und Ausgabegeraete mit ihren Sprach-relevanten Abtastraten
//! auf und laedt ein cpal-Device per Namensfilter.

use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, SampleFormat, SupportedStreamConfigRange};
use tracing::{debug, info, warn};

use crate::error::{AudioError, AudioResult};

/// Abtastraten die fuer Capture (16 kHz) und Playback (24 kHz) interessant sind
const GEPRUEFTE_RATEN: [u32; 5] = [16000, 24000, 32000, 44100, 48000];

/// Wie lange ein Stream-Thread fuer das Oeffnen des Geraets brauchen darf
pub const GERAET_FRIST: Duration = Duration::from_secs(5);

/// Richtung eines Geraets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Richtung {
    Eingabe,
    Ausgabe,
}

/// Repraesentiert ein Audio-Geraet mit seinen Eigenschaften
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Anzeigename des Geraets
    pub name: String,
    pub richtung: Richtung,
    /// Standardgeraet des Hosts?
    pub standard: bool,
    /// Unterstuetzte Abtastraten aus `GEPRUEFTE_RATEN`
    pub sample_rates: Vec<u32>,
    /// Maximale Kanalanzahl
    pub channels: u16,
}

impl AudioDevice {
    /// Prueft ob das Geraet die Abtastrate direkt liefern kann
    pub fn unterstuetzt(&self, rate: u32) -> bool {
        self.sample_rates.contains(&rate)
    }
}

/// Listet alle Geraete einer Richtung auf
pub fn list_devices(richtung: Richtung) -> AudioResult<Vec<AudioDevice>> {
    let host = cpal::default_host();
    let standard_name = standard_device(&host, richtung).and_then(|d| d.name().ok());

    let devices: Vec<Device> = match richtung {
        Richtung::Eingabe => host.input_devices(),
        Richtung::Ausgabe => host.output_devices(),
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?
    .collect();

    let mut result = Vec::with_capacity(devices.len());
    for device in devices {
        match beschreiben(&device, richtung) {
            Ok(mut ad) => {
                ad.standard = standard_name.as_deref() == Some(ad.name.as_str());
                result.push(ad);
            }
            Err(e) => warn!(?richtung, "Geraet konnte nicht gelesen werden: {}", e),
        }
    }
    debug!(?richtung, anzahl = result.len(), "Geraete aufgelistet");
    Ok(result)
}

/// Laedt ein cpal-Device. `None` = Standardgeraet, sonst erstes Geraet
/// dessen Name den Filter enthaelt.
pub fn load_cpal_device(richtung: Richtung, name: Option<&str>) -> AudioResult<Device> {
    let host = cpal::default_host();
    let Some(filter) = name else {
        return standard_device(&host, richtung).ok_or(match richtung {
            Richtung::Eingabe => AudioError::KeinStandardEingabegeraet,
            Richtung::Ausgabe => AudioError::KeinStandardAusgabegeraet,
        });
    };

    let mut devices = match richtung {
        Richtung::Eingabe => host.input_devices(),
        Richtung::Ausgabe => host.output_devices(),
    }
    .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    devices
        .find(|d| d.name().map(|n| n.contains(filter)).unwrap_or(false))
        .ok_or_else(|| AudioError::GeraetNichtGefunden(filter.to_string()))
}

/// Format in dem ein Geraet tatsaechlich geoeffnet wird
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeraeteFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

/// Ein unterstuetzter Konfigurationsbereich eines Geraets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bereich {
    pub min_rate: u32,
    pub max_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

fn format_unterstuetzt(f: SampleFormat) -> bool {
    matches!(f, SampleFormat::F32 | SampleFormat::I16)
}

/// Waehlt das Geraeteformat fuer eine Wunschrate.
///
/// Bevorzugt einen Bereich der die Rate direkt liefert (wenigste Kanaele,
/// F32 vor I16). Sonst gilt das Standardformat des Geraets, die Sitzung
/// rechnet dann Kanaele und Rate um.
pub fn format_aus_bereichen(
    bereiche: &[Bereich],
    wunsch_rate: u32,
    standard: Option<GeraeteFormat>,
) -> Option<GeraeteFormat> {
    let direkt = bereiche
        .iter()
        .filter(|b| format_unterstuetzt(b.sample_format))
        .filter(|b| (b.min_rate..=b.max_rate).contains(&wunsch_rate) && b.channels > 0)
        .min_by_key(|b| (b.channels, b.sample_format != SampleFormat::F32));
    if let Some(b) = direkt {
        return Some(GeraeteFormat {
            sample_rate: wunsch_rate,
            channels: b.channels,
            sample_format: b.sample_format,
        });
    }
    standard.filter(|f| format_unterstuetzt(f.sample_format) && f.channels > 0 && f.sample_rate > 0)
}

/// Ermittelt das Format, in dem `device` fuer `wunsch_rate` geoeffnet wird
pub fn format_waehlen(
    device: &Device,
    richtung: Richtung,
    wunsch_rate: u32,
) -> AudioResult<GeraeteFormat> {
    let (bereiche, standard) = match richtung {
        Richtung::Eingabe => (
            device
                .supported_input_configs()
                .map(|c| c.map(|r| bereich(&r)).collect::<Vec<_>>())
                .unwrap_or_default(),
            device.default_input_config().ok(),
        ),
        Richtung::Ausgabe => (
            device
                .supported_output_configs()
                .map(|c| c.map(|r| bereich(&r)).collect::<Vec<_>>())
                .unwrap_or_default(),
            device.default_output_config().ok(),
        ),
    };
    let standard = standard.map(|c| GeraeteFormat {
        sample_rate: c.sample_rate().0,
        channels: c.channels(),
        sample_format: c.sample_format(),
    });

    let format = format_aus_bereichen(&bereiche, wunsch_rate, standard).ok_or_else(|| {
        AudioError::Konfiguration(format!(
            "Geraet bietet kein nutzbares Format (F32/I16) fuer {wunsch_rate} Hz"
        ))
    })?;
    if format.sample_rate != wunsch_rate {
        info!(
            ?richtung,
            geraet = format.sample_rate,
            ziel = wunsch_rate,
            kanaele = format.channels,
            "Geraet liefert die Zielrate nicht, rechne um"
        );
    }
    Ok(format)
}

fn bereich(r: &SupportedStreamConfigRange) -> Bereich {
    Bereich {
        min_rate: r.min_sample_rate().0,
        max_rate: r.max_sample_rate().0,
        channels: r.channels(),
        sample_format: r.sample_format(),
    }
}

/// Wartet auf die Bereitschaftsmeldung eines Stream-Threads, hoechstens
/// `GERAET_FRIST`.
pub(crate) fn bereitschaft_abwarten(rx: &Receiver<AudioResult<()>>) -> AudioResult<()> {
    bereitschaft_mit_frist(rx, GERAET_FRIST)
}

fn bereitschaft_mit_frist(rx: &Receiver<AudioResult<()>>, frist: Duration) -> AudioResult<()> {
    match rx.recv_timeout(frist) {
        Ok(ergebnis) => ergebnis,
        Err(RecvTimeoutError::Timeout) => Err(AudioError::StreamFehler(format!(
            "Geraet hat nach {} ms nicht geantwortet",
            frist.as_millis()
        ))),
        Err(RecvTimeoutError::Disconnected) => Err(AudioError::ThreadBeendet),
    }
}

fn standard_device(host: &cpal::Host, richtung: Richtung) -> Option<Device> {
    match richtung {
        Richtung::Eingabe => host.default_input_device(),
        Richtung::Ausgabe => host.default_output_device(),
    }
}

fn beschreiben(device: &Device, richtung: Richtung) -> AudioResult<AudioDevice> {
    let name = device
        .name()
        .map_err(|e| AudioError::StreamFehler(e.to_string()))?;

    let ranges: Vec<SupportedStreamConfigRange> = match richtung {
        Richtung::Eingabe => device
            .supported_input_configs()
            .map(|c| c.collect())
            .unwrap_or_default(),
        Richtung::Ausgabe => device
            .supported_output_configs()
            .map(|c| c.collect())
            .unwrap_or_default(),
    };

    let (sample_rates, channels) = raten_und_kanaele(
        ranges
            .iter()
            .map(|r| (r.min_sample_rate().0, r.max_sample_rate().0, r.channels())),
    );

    Ok(AudioDevice {
        name,
        richtung,
        standard: false,
        sample_rates,
        channels,
    })
}

/// Verdichtet (min, max, kanaele)-Bereiche zu gepruefter Ratenliste + max. Kanaelen
fn raten_und_kanaele(bereiche: impl Iterator<Item = (u32, u32, u16)>) -> (Vec<u32>, u16) {
    let mut raten = Vec::new();
    let mut kanaele = 1u16;
    for (min, max, ch) in bereiche {
        for rate in GEPRUEFTE_RATEN {
            if (min..=max).contains(&rate) && !raten.contains(&rate) {
                raten.push(rate);
            }
        }
        kanaele = kanaele.max(ch);
    }
    raten.sort_unstable();
    (raten, kanaele)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bereitschaft_gemeldet() {
        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        tx.send(Ok(())).unwrap();
        assert!(bereitschaft_mit_frist(&rx, Duration::from_millis(50)).is_ok());

        let (tx, rx) = std::sync::mpsc::sync_channel(1);
        tx.send(Err(AudioError::KeinStandardEingabegeraet)).unwrap();
        assert!(matches!(
            bereitschaft_mit_frist(&rx, Duration::from_millis(50)),
            Err(AudioError::KeinStandardEingabegeraet)
        ));
    }

    #[test]
    fn haengendes_geraet_laeuft_in_frist() {
        let (_tx, rx) = std::sync::mpsc::sync_channel::<AudioResult<()>>(1);
        let start = std::time::Instant::now();
        let err = bereitschaft_mit_frist(&rx, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, AudioError::StreamFehler(_)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn beendeter_thread_ohne_meldung() {
        let (tx, rx) = std::sync::mpsc::sync_channel::<AudioResult<()>>(1);
        drop(tx);
        assert!(matches!(
            bereitschaft_mit_frist(&rx, Duration::from_millis(50)),
            Err(AudioError::ThreadBeendet)
        ));
    }

    #[test]
    #[ignore = "Benoetigt Audio-Hardware"]
    fn eingabegeraete_auflistbar() {
        let devices = list_devices(Richtung::Eingabe).expect("Liste sollte abrufbar sein");
        println!(
            "Eingabegeraete: {:?}",
            devices.iter().map(|d| &d.name).collect::<Vec<_>>()
        );
    }

    #[test]
    fn raten_aus_bereichen() {
        let (raten, kanaele) =
            raten_und_kanaele([(8000, 16000, 1), (44100, 48000, 2), (16000, 16000, 1)].into_iter());
        assert_eq!(raten, vec![16000, 44100, 48000]);
        assert_eq!(kanaele, 2);
    }

    #[test]
    fn keine_bereiche() {
        let (raten, kanaele) = raten_und_kanaele(std::iter::empty());
        assert!(raten.is_empty());
        assert_eq!(kanaele, 1);
    }

    fn b(min_rate: u32, max_rate: u32, channels: u16, sample_format: SampleFormat) -> Bereich {
        Bereich {
            min_rate,
            max_rate,
            channels,
            sample_format,
        }
    }

    const STANDARD_48K: GeraeteFormat = GeraeteFormat {
        sample_rate: 48000,
        channels: 2,
        sample_format: SampleFormat::F32,
    };

    #[test]
    fn zielrate_direkt_mit_wenigsten_kanaelen() {
        let bereiche = [
            b(8000, 48000, 2, SampleFormat::F32),
            b(8000, 48000, 1, SampleFormat::I16),
            b(8000, 48000, 1, SampleFormat::F32),
        ];
        let f = format_aus_bereichen(&bereiche, 16000, Some(STANDARD_48K)).unwrap();
        assert_eq!(f.sample_rate, 16000);
        assert_eq!(f.channels, 1);
        assert_eq!(f.sample_format, SampleFormat::F32);
    }

    #[test]
    fn nur_48k_faellt_auf_standardformat() {
        let bereiche = [b(44100, 48000, 2, SampleFormat::F32)];
        let f = format_aus_bereichen(&bereiche, 16000, Some(STANDARD_48K)).unwrap();
        assert_eq!(f, STANDARD_48K);
    }

    #[test]
    fn unbrauchbare_formate_ignoriert() {
        let bereiche = [b(16000, 16000, 1, SampleFormat::U8)];
        assert_eq!(format_aus_bereichen(&bereiche, 16000, Some(STANDARD_48K)), Some(STANDARD_48K));

        let standard_i32 = GeraeteFormat {
            sample_format: SampleFormat::I32,
            ..STANDARD_48K
        };
        assert_eq!(format_aus_bereichen(&bereiche, 16000, Some(standard_i32)), None);
        assert_eq!(format_aus_bereichen(&[], 16000, None), None);
    }

    #[test]
    fn unterstuetzte_rate() {
        let dev = AudioDevice {
            name: "Test Mikrofon".to_string(),
            richtung: Richtung::Eingabe,
            standard: true,
            sample_rates: vec![16000, 48000],
            channels: 1,
        };
        assert!(dev.unterstuetzt(16000));
        assert!(!dev.unterstuetzt(24000));
    }
}
