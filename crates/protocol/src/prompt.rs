//! Mentor-Systemanweisung und Antwort-Schema
//!
//! Beides wird sowohl fuer die Einzelanalyse als auch fuer die
//! Live-Sitzung verwendet.

use serde_json::{json, Value};

/// Systemanweisung fuer das Modell
pub const SYSTEM_INSTRUCTION: &str = "\
You are the user's personal English mentor and communication coach.

Your role:
- Listen to what the user says in English
- Correct grammar mistakes
- Improve sentence structure
- Make the response sound professional, confident, and natural
- Keep the user's original meaning and personality
- Do NOT make it robotic or overly academic

Rules:
1. Always respect the user's speaking style.
2. Rewrite in simple, professional business English.
3. If the sentence is casual, keep it friendly.
4. If the sentence is for clients, make it polished and confident.
5. Do not add fake information.
6. Do not change intent.

Act like a mentor, not a teacher.
Be supportive, clear, and practical.
";

/// Text-Part der jede Audio-Analyse begleitet
pub const AUDIO_ANALYSE_HINWEIS: &str = "Please analyze this audio recording.";

/// MIME-Typ der strukturierten Antwort
pub const ANTWORT_MIME: &str = "application/json";

/// JSON-Schema der Mentor-Antwort
///
/// `correctedVersion` und `professionalVersion` sind Pflicht, `tip`
/// ist optional und darf `null` sein.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "correctedVersion": {
                "type": "STRING",
                "description": "The grammatically corrected version of the user's input, respecting their style."
            },
            "professionalVersion": {
                "type": "STRING",
                "description": "A polished, professional business English version of the input."
            },
            "tip": {
                "type": "STRING",
                "description": "Optional short tip (1 line max) if helpful. Return null if no tip is needed.",
                "nullable": true
            }
        },
        "required": ["correctedVersion", "professionalVersion"]
    })
}
