//! Prompts for the vision-model backends.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing what the OCR reader or the
//!    classifier is asked for requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real model.
//!
//! Both prompts ask for a bare JSON array. The reply parsers in
//! [`crate::pipeline::recognize`] and [`crate::pipeline::classify`] tolerate
//! fenced or chatty replies, but a strict prompt keeps those repairs rare.

/// System prompt for plate OCR.
pub const OCR_SYSTEM_PROMPT: &str = r#"You are an optical character recognition engine for traffic photographs.

Read every distinct text region visible in the image: license plates, stickers, signs, badges.

Reply with a JSON array and nothing else. One object per text region:
  {"text": "<exact characters>", "confidence": <0.0-1.0>, "box": [x, y, width, height]}

Rules:
- Copy characters exactly as printed; do not correct or complete them
- "confidence" is your probability that the text is read correctly
- "box" is in pixels of the original image; omit it if unsure
- If no text is visible, reply with []"#;

/// System prompt for brand/type classification.
pub const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are an image classifier for vehicles.

Identify the most prominent vehicle in the image. Reply with a JSON array and nothing else, best guess first, at most 3 entries:
  {"label": "<Brand> <type>", "score": <0.0-1.0>}

Rules:
- The label is the manufacturer name, one space, then the body type (e.g. "Toyota sedan", "Ford pickup")
- Scores are probabilities and should sum to at most 1
- If no vehicle is visible, reply with []"#;

/// Build the user turn for OCR, naming the expected languages.
///
/// Plate alphabets are mostly Latin, but the language hint keeps the model
/// from "translating" signage it reads around the plate.
pub fn ocr_instruction(languages: &[String]) -> String {
    if languages.is_empty() {
        return "Read all text in this image.".to_string();
    }
    let names: Vec<&str> = languages.iter().map(|l| language_name(l)).collect();
    format!(
        "Read all text in this image. Expected languages: {}.",
        names.join(", ")
    )
}

/// Build the user turn for classification, optionally restricting the label set.
pub fn classify_instruction(labels: &[String]) -> String {
    if labels.is_empty() {
        return "Classify the vehicle in this image.".to_string();
    }
    format!(
        "Classify the vehicle in this image. Choose labels only from this list:\n{}",
        labels
            .iter()
            .map(|l| format!("- {l}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

/// English name for an ISO 639-1 language code. Unknown codes pass through.
fn language_name(code: &str) -> &str {
    match code.to_ascii_lowercase().as_str() {
        "es" => "Spanish",
        "en" => "English",
        "pt" => "Portuguese",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        _ => code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ocr_prompt_requests_json() {
        assert!(OCR_SYSTEM_PROMPT.contains("JSON array"));
        assert!(OCR_SYSTEM_PROMPT.contains("\"confidence\""));
    }

    #[test]
    fn ocr_instruction_names_languages() {
        let s = ocr_instruction(&["es".to_string(), "en".to_string()]);
        assert!(s.contains("Spanish, English"));
        assert!(ocr_instruction(&["xx".to_string()]).contains("xx"));
        assert!(!ocr_instruction(&[]).contains("Expected"));
    }

    #[test]
    fn classify_instruction_lists_labels() {
        let s = classify_instruction(&["Seat hatchback".to_string(), "Ford van".to_string()]);
        assert!(s.contains("- Seat hatchback\n- Ford van"));
    }
}
