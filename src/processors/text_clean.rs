//! Field text cleaning.
//!
//! Cleaning is a deterministic, pure function of the raw text plus the
//! template's per-field tables: literal misread corrections first, then
//! whitelist filtering (disallowed characters are deleted, not replaced),
//! then the field-shape rule for the field's kind, then a final trim.
//! Feeding a cleaned value back through produces the same value.

use crate::core::config::{FieldId, FieldKind, Template};
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));
static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D+").expect("static pattern"));
static NAME_DISALLOWED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z\s\-'.]").expect("static pattern"));

/// Cleans recognized field text according to the template's tables.
#[derive(Debug, Clone, Copy)]
pub struct TextCleaner<'t> {
    template: &'t Template,
}

impl<'t> TextCleaner<'t> {
    /// Creates a cleaner over a compiled template.
    pub fn new(template: &'t Template) -> Self {
        Self { template }
    }

    /// Cleans one field's raw text.
    ///
    /// Returns `None` when the input is absent, blank, or (for the
    /// fixed-prefix request identifier) contains no substring of the exact
    /// required shape. A truncated or partially-matching identifier is
    /// never returned.
    pub fn clean(&self, id: FieldId, raw: Option<&str>) -> Option<String> {
        let raw = raw?;
        if raw.trim().is_empty() {
            return None;
        }

        let mut text = raw.to_string();
        for rule in self.template.misreads(id) {
            text = text.replace(&rule.from, &rule.to);
        }
        if let Some(strip) = self.template.strip_pattern(id) {
            text = strip.replace_all(&text, "").into_owned();
        }

        let text = match id.kind() {
            FieldKind::NumericId => WHITESPACE.replace_all(&text, "").into_owned(),
            FieldKind::Phone => NON_DIGIT.replace_all(&text, "").into_owned(),
            FieldKind::Address => {
                let spaced = insert_word_breaks(&text);
                WHITESPACE.replace_all(&spaced, " ").into_owned()
            }
            FieldKind::Name => {
                let letters = NAME_DISALLOWED.replace_all(&text, "");
                WHITESPACE.replace_all(&letters, " ").into_owned()
            }
            FieldKind::RequestId => {
                let compact = WHITESPACE.replace_all(&text, "").into_owned();
                match self.template.request_shape().find(&compact) {
                    Some(found) => found.as_str().to_string(),
                    None => return None,
                }
            }
            FieldKind::General => text,
        };

        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

/// Inserts a space before an interior uppercase letter, and before a digit
/// that follows a letter. Recovers word boundaries from OCR runs that drop
/// inter-word spaces ("42SmithStreetRichmond3121").
fn insert_word_breaks(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut prev: Option<char> = None;
    for c in text.chars() {
        if let Some(p) = prev {
            let break_before_upper = c.is_ascii_uppercase() && !p.is_whitespace();
            let break_before_digit = c.is_ascii_digit() && p.is_ascii_alphabetic();
            if break_before_upper || break_before_digit {
                out.push(' ');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TemplateConfig;

    fn template() -> Template {
        TemplateConfig::default().compile().unwrap()
    }

    #[test]
    fn test_clean_none_and_blank_input() {
        let template = template();
        let cleaner = TextCleaner::new(&template);
        assert_eq!(cleaner.clean(FieldId::Surname, None), None);
        assert_eq!(cleaner.clean(FieldId::Surname, Some("   ")), None);
    }

    #[test]
    fn test_phone_fields_keep_digits_only() {
        let template = template();
        let cleaner = TextCleaner::new(&template);
        assert_eq!(
            cleaner.clean(FieldId::HomePhone, Some("(03) 9876-5432")),
            Some("0398765432".to_string())
        );
        assert_eq!(cleaner.clean(FieldId::MobilePhone, Some("abc")), None);
    }

    #[test]
    fn test_medicare_whitespace_collapsed() {
        let template = template();
        let cleaner = TextCleaner::new(&template);
        assert_eq!(
            cleaner.clean(FieldId::MedicareNumber, Some(" 1234 567890 / 1 ")),
            Some("1234567890/1".to_string())
        );
    }

    #[test]
    fn test_address_word_breaks_inserted() {
        let template = template();
        let cleaner = TextCleaner::new(&template);
        assert_eq!(
            cleaner.clean(FieldId::Address, Some("42SmithStreetRichmond3121")),
            Some("42 Smith Street Richmond 3121".to_string())
        );
    }

    #[test]
    fn test_request_number_exact_shape_or_none() {
        let template = template();
        let cleaner = TextCleaner::new(&template);
        assert_eq!(
            cleaner.clean(FieldId::RequestNumber, Some(" 24H 12345 extra")),
            Some("24H12345".to_string())
        );
        // A near-miss is dropped entirely, never truncated.
        assert_eq!(cleaner.clean(FieldId::RequestNumber, Some("24H123")), None);
    }

    #[test]
    fn test_name_punctuation_restricted() {
        let template = template();
        let cleaner = TextCleaner::new(&template);
        assert_eq!(
            cleaner.clean(FieldId::Surname, Some("O'Brien-Smith~ Jr.#")),
            Some("O'Brien-Smith Jr.".to_string())
        );
    }

    #[test]
    fn test_doctor_misreads_corrected_before_filtering() {
        let template = template();
        let cleaner = TextCleaner::new(&template);
        assert_eq!(
            cleaner.clean(FieldId::DoctorInformation, Some("Dr J Smith §$Ol23")),
            Some("DrJSmith550123".to_string())
        );
    }

    #[test]
    fn test_clean_is_idempotent() {
        let template = template();
        let cleaner = TextCleaner::new(&template);
        let cases = [
            (FieldId::Address, "42SmithStreetRichmond3121"),
            (FieldId::HomePhone, "(03) 9876 5432"),
            (FieldId::MedicareNumber, "1234 567890/1"),
            (FieldId::RequestNumber, "24H12345"),
            (FieldId::Surname, "O'Brien-Smith"),
            (FieldId::DoctorInformation, "Dr J Smith 123456§$"),
        ];
        for (id, raw) in cases {
            let once = cleaner.clean(id, Some(raw)).unwrap();
            let twice = cleaner.clean(id, Some(&once)).unwrap();
            assert_eq!(once, twice, "cleaning {id} twice diverged");
        }
    }
}
