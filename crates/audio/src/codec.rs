//! PCM16-Codec und Base64-Transportkodierung
//!
//! Ausgehend: f32 (-1.0..1.0) -> i16 (Skala 32767, vorher geclippt)
//! -> Little-Endian-Bytes -> Base64.
//! Eingehend: Base64 -> Little-Endian-Bytes -> i16 -> f32 (Skala 1/32768).

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::error::{AudioError, AudioResult};

/// Skalierung beim Kodieren (f32 -> i16)
pub const PCM16_ENCODE_SCALE: f32 = 32767.0;
/// Skalierung beim Dekodieren (i16 -> f32)
pub const PCM16_DECODE_SCALE: f32 = 32768.0;

/// Konvertiert f32-Samples zu i16.
///
/// Werte ausserhalb von [-1, 1] werden vor der Skalierung auf die Grenze
/// geclippt, es gibt keinen Ueberlauf. NaN wird zu 0.
pub fn float_to_int16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| {
            if s.is_nan() {
                0
            } else {
                (s.clamp(-1.0, 1.0) * PCM16_ENCODE_SCALE) as i16
            }
        })
        .collect()
}

/// Konvertiert i16-Samples zu normalisierten f32 (`sample / 32768.0`)
pub fn int16_to_float(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| s as f32 / PCM16_DECODE_SCALE)
        .collect()
}

/// i16-Samples als Little-Endian-Bytes
pub fn int16_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        out.extend_from_slice(&s.to_le_bytes());
    }
    out
}

/// Little-Endian-Bytes zu i16-Samples.
///
/// Ungerade Laenge ist ein Formatfehler.
pub fn bytes_to_int16(bytes: &[u8]) -> AudioResult<Vec<i16>> {
    if bytes.len() % 2 != 0 {
        return Err(AudioError::CodecFehler(format!(
            "PCM16-Payload mit ungerader Laenge: {} Bytes",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect())
}

/// Kodiert Bytes als Standard-Base64
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Dekodiert Standard-Base64
pub fn decode(text: &str) -> AudioResult<Vec<u8>> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| AudioError::CodecFehler(e.to_string()))
}

/// Capture-Frame -> transportfaehiger String
pub fn encode_frame(samples: &[f32]) -> String {
    encode(&int16_to_bytes(&float_to_int16(samples)))
}

/// Eingehendes Fragment -> normalisierte f32-Samples
pub fn decode_fragment(text: &str) -> AudioResult<Vec<f32>> {
    let bytes = decode(text)?;
    let pcm = bytes_to_int16(&bytes)?;
    Ok(int16_to_float(&pcm))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_to_int16_skaliert_linear() {
        let out = float_to_int16(&[0.0, 1.0, -1.0, 0.5]);
        assert_eq!(out, vec![0, 32767, -32767, 16383]);
    }

    #[test]
    fn float_to_int16_clippt_statt_ueberlauf() {
        let out = float_to_int16(&[1.5, -3.0, f32::INFINITY, f32::NEG_INFINITY, f32::NAN]);
        assert_eq!(out, vec![32767, -32767, 32767, -32767, 0]);
    }

    #[test]
    fn int16_to_float_normalisiert() {
        let out = int16_to_float(&[0, -32768, 16384]);
        assert_eq!(out, vec![0.0, -1.0, 0.5]);
        assert!(int16_to_float(&[i16::MAX])[0] < 1.0);
    }

    #[test]
    fn bytes_little_endian() {
        assert_eq!(int16_to_bytes(&[1, -2]), vec![0x01, 0x00, 0xFE, 0xFF]);
        assert_eq!(bytes_to_int16(&[0x01, 0x00, 0xFE, 0xFF]).unwrap(), vec![1, -2]);
    }

    #[test]
    fn bytes_ungerade_laenge_ist_fehler() {
        assert!(matches!(
            bytes_to_int16(&[0x01, 0x02, 0x03]),
            Err(AudioError::CodecFehler(_))
        ));
    }

    #[test]
    fn base64_leere_eingabe() {
        assert_eq!(encode(&[]), "");
        assert!(decode("").unwrap().is_empty());
    }

    #[test]
    fn base64_alle_bytewerte() {
        let alle: Vec<u8> = (0..=255u8).collect();
        assert_eq!(decode(&encode(&alle)).unwrap(), alle);
        // Laengen mit Padding 0, 1 und 2
        for n in 1..=3 {
            assert_eq!(decode(&encode(&alle[..n])).unwrap(), &alle[..n]);
        }
    }

    #[test]
    fn base64_ungueltig() {
        assert!(decode("nicht base64!").is_err());
    }

    #[test]
    fn frame_kodieren_und_fragment_dekodieren() {
        let frame = vec![0.25f32, -0.25, 0.0, 1.0];
        let text = encode_frame(&frame);
        let zurueck = decode_fragment(&text).unwrap();
        assert_eq!(zurueck.len(), frame.len());
        for (a, b) in frame.iter().zip(zurueck.iter()) {
            assert!((a - b).abs() < 1e-3, "{a} vs {b}");
        }
    }

    #[test]
    fn fragment_mit_ungerader_laenge_wird_abgelehnt() {
        let text = encode(&[0x00, 0x01, 0x02]);
        assert!(decode_fragment(&text).is_err());
    }
}
