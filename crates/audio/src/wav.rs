//! WAV-Kodierung fuer aufgenommene Clips (Mono, PCM16)

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::codec;
use crate::error::{AudioError, AudioResult};

/// MIME-Typ der erzeugten Dateien
pub const WAV_MIME: &str = "audio/wav";

/// Kodiert Mono-Samples als 16-Bit WAV im Speicher
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> AudioResult<Vec<u8>> {
    if sample_rate == 0 {
        return Err(AudioError::Konfiguration("Abtastrate 0".into()));
    }
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        for sample in codec::float_to_int16(samples) {
            writer
                .write_sample(sample)
                .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| AudioError::CodecFehler(e.to_string()))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::WavReader;

    #[test]
    fn wav_header_und_samples() {
        let bytes = encode_wav(&[0.0, 0.5, -1.0], 16000).unwrap();
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16000);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 16383, -32767]);
    }

    #[test]
    fn leerer_clip_ist_gueltig() {
        let bytes = encode_wav(&[], 24000).unwrap();
        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn rate_null_abgelehnt() {
        assert!(matches!(
            encode_wav(&[0.0], 0),
            Err(AudioError::Konfiguration(_))
        ));
    }
}
