//! Lautheitsmessung fuer die Pegelanzeige
//!
//! Grober RMS-Proxy mit fester Verstaerkung. Nur fuer die Visualisierung,
//! jeder Wert wird vom naechsten Frame sofort ersetzt.

/// Feste Verstaerkung damit normale Sprache sichtbar ausschlaegt
pub const LOUDNESS_GAIN: f32 = 5.0;

/// Berechnet den RMS-Pegel eines Audio-Frames
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Lautheit in [0, 1]: `min(1, 5 * rms)`
pub fn loudness(samples: &[f32]) -> f32 {
    let wert = LOUDNESS_GAIN * rms_level(samples);
    if wert.is_nan() {
        return 0.0;
    }
    wert.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rms_stille() {
        let silence = vec![0.0f32; 4096];
        assert!(rms_level(&silence) < f32::EPSILON);
        assert_eq!(loudness(&silence), 0.0);
    }

    #[test]
    fn rms_signal() {
        let signal = vec![0.5f32; 4096];
        let rms = rms_level(&signal);
        assert!((rms - 0.5).abs() < 0.01);
    }

    #[test]
    fn rms_leer() {
        assert!(rms_level(&[]) < f32::EPSILON);
        assert_eq!(loudness(&[]), 0.0);
    }

    #[test]
    fn lautheit_verstaerkt_leise_signale() {
        let leise = vec![0.1f32; 4096];
        assert!((loudness(&leise) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn lautheit_clippt_bei_eins() {
        let voll = vec![1.0f32; 4096];
        assert_eq!(loudness(&voll), 1.0);
        let negativ = vec![-1.0f32; 4096];
        assert_eq!(loudness(&negativ), 1.0);
        let uebersteuert = vec![40.0f32, -40.0];
        assert_eq!(loudness(&uebersteuert), 1.0);
    }

    #[test]
    fn lautheit_bei_nicht_endlichen_werten_im_bereich() {
        for frame in [vec![f32::INFINITY], vec![f32::NAN, 0.5], vec![f32::MAX; 8]] {
            let l = loudness(&frame);
            assert!((0.0..=1.0).contains(&l), "Lautheit {l} ausserhalb [0,1]");
        }
    }
}
