//! Plate validation: turn raw OCR candidates into one plate or "not detected".
//!
//! OCR over a street photo returns every legible string: plate text, dealer
//! stickers, bumper slogans, street signs. Each candidate is normalised
//! (uppercase, whitespace removed) and kept only if it passes both gates:
//!
//! 1. **Confidence** — strictly above the configured threshold.
//! 2. **Grammar** — the normalised text matches the plate format.
//!
//! Among survivors the highest confidence wins; ties go to the candidate the
//! recognizer emitted first.
//!
//! Plate formats differ by country, so the grammar is a trait object supplied
//! through configuration. [`RegexGrammar::default`] is only a starting
//! policy.

use crate::error::IdentifyError;
use crate::output::PlateResult;
use crate::pipeline::recognize::OcrCandidate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Default plate format: 2–3 letters, 3–4 digits, 0–2 trailing letters.
pub const DEFAULT_PLATE_PATTERN: &str = r"^[A-Z]{2,3}[0-9]{3,4}[A-Z]{0,2}$";

/// Default confidence gate. A candidate must score strictly above this.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;

static RE_DEFAULT_PLATE: Lazy<Regex> = Lazy::new(|| Regex::new(DEFAULT_PLATE_PATTERN).unwrap());

/// A plate format. Receives text that is already normalised.
pub trait PlateGrammar: Send + Sync {
    /// Whether `normalized` is a well-formed plate.
    fn matches(&self, normalized: &str) -> bool;

    /// Human-readable description, used in logs and `Debug` output.
    fn describe(&self) -> String;
}

/// A plate grammar backed by an anchored regular expression.
#[derive(Clone)]
pub struct RegexGrammar {
    pattern: Regex,
}

impl RegexGrammar {
    /// Compile a custom plate pattern.
    ///
    /// Missing `^`/`$` anchors are added: a plate grammar must match the
    /// whole candidate, never a substring of a longer sign.
    pub fn new(pattern: &str) -> Result<Self, IdentifyError> {
        let mut anchored = String::with_capacity(pattern.len() + 2);
        if !pattern.starts_with('^') {
            anchored.push('^');
        }
        anchored.push_str(pattern);
        if !pattern.ends_with('$') {
            anchored.push('$');
        }
        let pattern = Regex::new(&anchored).map_err(|e| {
            IdentifyError::InvalidConfig(format!("invalid plate pattern '{anchored}': {e}"))
        })?;
        Ok(Self { pattern })
    }

    pub fn as_str(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Default for RegexGrammar {
    fn default() -> Self {
        Self {
            pattern: RE_DEFAULT_PLATE.clone(),
        }
    }
}

impl fmt::Debug for RegexGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RegexGrammar").field(&self.as_str()).finish()
    }
}

impl PlateGrammar for RegexGrammar {
    fn matches(&self, normalized: &str) -> bool {
        self.pattern.is_match(normalized)
    }

    fn describe(&self) -> String {
        format!("regex {}", self.as_str())
    }
}

/// Uppercase and drop every whitespace character.
///
/// `"ab 1234 cd"` → `"AB1234CD"`. Punctuation is kept, so a grammar decides
/// for itself whether `AB-1234` is acceptable.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Applies the grammar and confidence gates to OCR output.
#[derive(Clone)]
pub struct PlateValidator {
    grammar: Arc<dyn PlateGrammar>,
    threshold: f32,
}

impl PlateValidator {
    pub fn new(grammar: Arc<dyn PlateGrammar>, threshold: f32) -> Self {
        Self { grammar, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Normalised text of `candidate` if it passes both gates.
    pub fn accept(&self, candidate: &OcrCandidate) -> Option<String> {
        // NaN fails this comparison, so a garbage score never passes.
        if !(candidate.confidence > self.threshold) {
            return None;
        }
        let normalized = normalize(&candidate.text);
        if normalized.is_empty() || !self.grammar.matches(&normalized) {
            return None;
        }
        Some(normalized)
    }

    /// Pick the best plate from `candidates`.
    ///
    /// Returns [`PlateResult::not_detected`] when nothing passes; that is a
    /// normal outcome, not an error.
    pub fn validate(&self, candidates: &[OcrCandidate]) -> PlateResult {
        let mut best: Option<(String, f32)> = None;

        for candidate in candidates {
            let Some(normalized) = self.accept(candidate) else {
                debug!(
                    "Rejected plate candidate {:?} ({:.2})",
                    candidate.text, candidate.confidence
                );
                continue;
            };
            // Strict `>` keeps the earliest candidate on ties.
            let better = best
                .as_ref()
                .map_or(true, |(_, conf)| candidate.confidence > *conf);
            if better {
                best = Some((normalized, candidate.confidence));
            }
        }

        match best {
            Some((text, confidence)) => {
                debug!("Selected plate {} ({:.2})", text, confidence);
                PlateResult::detected(text)
            }
            None => PlateResult::not_detected(),
        }
    }
}

impl Default for PlateValidator {
    fn default() -> Self {
        Self::new(Arc::new(RegexGrammar::default()), DEFAULT_CONFIDENCE_THRESHOLD)
    }
}

impl fmt::Debug for PlateValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlateValidator")
            .field("grammar", &self.grammar.describe())
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::NOT_DETECTED;

    fn cand(text: &str, confidence: f32) -> OcrCandidate {
        OcrCandidate::new(text, confidence)
    }

    #[test]
    fn normalize_uppercases_and_strips_whitespace() {
        assert_eq!(normalize("ab 1234\tcd"), "AB1234CD");
        assert_eq!(normalize("  xyz 987 "), "XYZ987");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn default_grammar_accepts_documented_shapes() {
        let g = RegexGrammar::default();
        for ok in ["AB123", "ABC1234", "AB1234CD", "ABC123D"] {
            assert!(g.matches(ok), "{ok} should match");
        }
        for bad in ["A1234", "ABCD123", "AB12", "AB12345", "AB1234CDE", "1234AB", "AB-1234"] {
            assert!(!g.matches(bad), "{bad} should not match");
        }
    }

    #[test]
    fn custom_pattern_is_anchored() {
        let g = RegexGrammar::new("[0-9]{4}[A-Z]{3}").unwrap();
        assert_eq!(g.as_str(), "^[0-9]{4}[A-Z]{3}$");
        assert!(g.matches("1234BCD"));
        assert!(!g.matches("X1234BCDX"));
    }

    #[test]
    fn invalid_pattern_is_config_error() {
        let err = RegexGrammar::new("[A-Z").unwrap_err();
        assert!(matches!(err, IdentifyError::InvalidConfig(_)));
    }

    #[test]
    fn empty_candidates_not_detected() {
        let result = PlateValidator::default().validate(&[]);
        assert!(!result.found);
        assert_eq!(result.text, NOT_DETECTED);
    }

    #[test]
    fn picks_highest_confidence_not_first_match() {
        let v = PlateValidator::default();
        let result = v.validate(&[
            cand("AB123", 0.6),
            cand("TOYOTA", 0.99),
            cand("xy 9876 z", 0.85),
            cand("CD4567", 0.7),
        ]);
        assert_eq!(result, PlateResult::detected("XY9876Z"));
    }

    #[test]
    fn tie_goes_to_first_candidate() {
        let v = PlateValidator::default();
        let result = v.validate(&[cand("AB1234", 0.8), cand("CD5678", 0.8)]);
        assert_eq!(result.text, "AB1234");
    }

    #[test]
    fn threshold_is_strict() {
        let v = PlateValidator::default();
        assert!(!v.validate(&[cand("AB1234", 0.5)]).found);
        assert!(v.validate(&[cand("AB1234", 0.5001)]).found);
    }

    #[test]
    fn nan_confidence_never_passes() {
        let v = PlateValidator::default();
        assert!(!v.validate(&[cand("AB1234", f32::NAN)]).found);
    }

    #[test]
    fn confident_non_plate_is_rejected() {
        let v = PlateValidator::default();
        let result = v.validate(&[cand("SE VENDE", 0.97), cand("www.auto.es", 0.95)]);
        assert!(!result.found);
    }

    #[test]
    fn result_always_satisfies_grammar() {
        let v = PlateValidator::default();
        let g = RegexGrammar::default();
        let inputs = [
            vec![cand("ab1234cd", 0.9), cand("HELLO", 0.99)],
            vec![cand("A B C 1 2 3", 0.7)],
            vec![cand("12", 0.9), cand("ZZ999", 0.51)],
            vec![cand("QQQ0000QQ", 0.2), cand("QQ0000", 0.3)],
        ];
        for list in &inputs {
            let r = v.validate(list);
            if r.found {
                assert!(g.matches(&r.text), "{} violates grammar", r.text);
            }
        }
    }

    #[test]
    fn custom_threshold_and_grammar() {
        let v = PlateValidator::new(Arc::new(RegexGrammar::new("[0-9]{4}[A-Z]{3}").unwrap()), 0.2);
        let result = v.validate(&[cand("AB1234", 0.9), cand("1234 bcd", 0.3)]);
        assert_eq!(result.text, "1234BCD");
    }
}
