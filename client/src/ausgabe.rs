//! Terminal-Ausgabe fuer Feedback, Geraete und Sitzungszustand

use std::fmt::Write;

use mentor_audio::{AudioDevice, Richtung};
use mentor_core::{MentorFeedback, SessionPhase, SessionStatus};
use mentor_live::SessionStats;

/// Formatiert die Mentor-Antwort. Der Tipp erscheint nur wenn vorhanden.
pub fn feedback_formatieren(feedback: &MentorFeedback) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Corrected:    {}", feedback.corrected_version);
    let _ = writeln!(out, "Professional: {}", feedback.professional_version);
    if let Some(tip) = feedback.tip() {
        let _ = writeln!(out, "Tip:          {tip}");
    }
    out
}

/// Tabelle der Geraete einer Richtung
pub fn geraete_formatieren(richtung: Richtung, geraete: &[AudioDevice]) -> String {
    let titel = match richtung {
        Richtung::Eingabe => "Eingabegeraete",
        Richtung::Ausgabe => "Ausgabegeraete",
    };
    let mut out = format!("{titel}:\n");
    if geraete.is_empty() {
        out.push_str("  (keine)\n");
        return out;
    }
    for g in geraete {
        let marker = if g.standard { '*' } else { ' ' };
        let raten = g
            .sample_rates
            .iter()
            .map(|r| r.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            " {marker} {} [{} Kanaele; {raten} Hz]",
            g.name, g.channels
        );
    }
    out
}

/// Einzeilige Statusanzeige der Live-Sitzung mit Pegelbalken
pub fn status_zeile(status: &SessionStatus) -> String {
    const BREITE: usize = 20;
    if let Some(fehler) = status.error.as_deref() {
        return format!("Fehler: {fehler}");
    }
    match status.phase {
        SessionPhase::Idle => "Getrennt".to_string(),
        SessionPhase::Connecting => "Verbinde...".to_string(),
        SessionPhase::Connected => {
            let voll = (status.loudness.clamp(0.0, 1.0) * BREITE as f32).round() as usize;
            format!(
                "Live [{}{}]",
                "#".repeat(voll),
                " ".repeat(BREITE - voll)
            )
        }
    }
}

/// Zusammenfassung nach Ende der Live-Sitzung
pub fn statistik_formatieren(stats: &SessionStats) -> String {
    format!(
        "Gesendet: {} Frames ({} verworfen), Wiedergegeben: {} Fragmente ({} uebersprungen), Unterbrechungen: {}",
        stats.frames_sent,
        stats.frames_dropped,
        stats.fragments_scheduled,
        stats.fragments_skipped,
        stats.interruptions
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback(tip: Option<&str>) -> MentorFeedback {
        MentorFeedback {
            corrected_version: "I went home.".into(),
            professional_version: "I headed home.".into(),
            tip: tip.map(String::from),
        }
    }

    #[test]
    fn feedback_mit_tipp() {
        let text = feedback_formatieren(&feedback(Some("Use past tense.")));
        assert!(text.contains("Corrected:    I went home."));
        assert!(text.contains("Professional: I headed home."));
        assert!(text.contains("Tip:          Use past tense."));
    }

    #[test]
    fn feedback_ohne_tipp() {
        let text = feedback_formatieren(&feedback(None));
        assert!(!text.contains("Tip"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn geraeteliste() {
        let geraete = vec![
            AudioDevice {
                name: "USB Mic".into(),
                richtung: Richtung::Eingabe,
                standard: true,
                sample_rates: vec![16000, 48000],
                channels: 1,
            },
            AudioDevice {
                name: "Line In".into(),
                richtung: Richtung::Eingabe,
                standard: false,
                sample_rates: vec![44100],
                channels: 2,
            },
        ];
        let text = geraete_formatieren(Richtung::Eingabe, &geraete);
        assert!(text.starts_with("Eingabegeraete:"));
        assert!(text.contains(" * USB Mic [1 Kanaele; 16000, 48000 Hz]"));
        assert!(text.contains("   Line In [2 Kanaele; 44100 Hz]"));

        assert!(geraete_formatieren(Richtung::Ausgabe, &[]).contains("(keine)"));
    }

    #[test]
    fn statuszeilen() {
        let mut status = SessionStatus::default();
        assert_eq!(status_zeile(&status), "Getrennt");

        status.phase = SessionPhase::Connected;
        status.loudness = 0.5;
        assert_eq!(status_zeile(&status), format!("Live [{}{}]", "#".repeat(10), " ".repeat(10)));

        status.loudness = 3.0;
        assert_eq!(status_zeile(&status), format!("Live [{}]", "#".repeat(20)));

        status.phase = SessionPhase::Idle;
        status.error = Some("Mikrofon verweigert".into());
        assert_eq!(status_zeile(&status), "Fehler: Mikrofon verweigert");
    }

    #[test]
    fn statistik() {
        let stats = SessionStats {
            frames_sent: 10,
            frames_dropped: 1,
            fragments_scheduled: 4,
            fragments_skipped: 0,
            interruptions: 2,
        };
        let text = statistik_formatieren(&stats);
        assert!(text.contains("Gesendet: 10 Frames (1 verworfen)"));
        assert!(text.contains("Unterbrechungen: 2"));
    }
}
