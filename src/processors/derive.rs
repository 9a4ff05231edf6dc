//! Rules that split composite recognized values into derived fields.
//!
//! Every rule here is a pure function of an already-cleaned value plus the
//! template's tables. Rules are independently idempotent, never re-trigger
//! cleaning, and degrade to `None` on any mismatch rather than erroring: an
//! address without a discoverable postcode or an unparseable phone blob
//! simply leaves the derived fields empty.

use crate::core::config::Template;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{10})/(\d)$").expect("static pattern"));
static TRAILING_POSTCODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})$").expect("static pattern"));
static LABELLED_PHONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\(([HhMm])\)").expect("static pattern"));
static DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("static pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static pattern"));
static QUOTED_SEGMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"["'][^"']*["']?"#).expect("static pattern"));

/// The components of a split address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    /// Street number and name, up to and including the street-type token.
    pub address: Option<String>,
    /// Locality following the street portion.
    pub suburb: Option<String>,
    /// Trailing 4-digit postcode.
    pub postcode: Option<String>,
    /// State code mapped from the postcode's leading digit.
    pub state: Option<String>,
}

/// Home/mobile numbers extracted from a combined phone blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhonePair {
    /// The home (landline) number.
    pub home: Option<String>,
    /// The mobile number.
    pub mobile: Option<String>,
}

/// Splits composite recognized strings into their logical parts.
#[derive(Debug, Clone, Copy)]
pub struct DerivedFieldResolver<'t> {
    template: &'t Template,
}

impl<'t> DerivedFieldResolver<'t> {
    /// Creates a resolver over a compiled template.
    pub fn new(template: &'t Template) -> Self {
        Self { template }
    }

    /// Splits a `<10 digits>/<1 digit>` identifier into number and position.
    pub fn split_identifier(&self, value: &str) -> Option<(String, String)> {
        let caps = IDENTIFIER_SPLIT.captures(value)?;
        Some((caps[1].to_string(), caps[2].to_string()))
    }

    /// Extracts home and mobile numbers from a combined phone blob.
    ///
    /// Labelled `(H)`/`(M)` markers win; otherwise digit runs are assigned
    /// by the template's mobile prefix (one run) or positionally, first run
    /// mobile and second home (two runs). Zero or more than two unlabelled
    /// runs leave both numbers empty.
    pub fn resolve_phones(&self, blob: &str) -> PhonePair {
        let phone = self.template.phone();
        let compact = WHITESPACE.replace_all(blob, "").into_owned();
        // Rewrite the international prefix to the national trunk form
        // before any classification.
        let compact = compact.replace(&format!("+{}", phone.country_code), "0");

        let mut pair = PhonePair::default();
        for caps in LABELLED_PHONE.captures_iter(&compact) {
            let number = caps[1].to_string();
            match &caps[2] {
                "H" | "h" => {
                    if pair.home.is_none() {
                        pair.home = Some(number);
                    } else {
                        tracing::warn!("multiple (H) phone numbers; keeping the first");
                    }
                }
                _ => {
                    if pair.mobile.is_none() {
                        pair.mobile = Some(number);
                    } else {
                        tracing::warn!("multiple (M) phone numbers; keeping the first");
                    }
                }
            }
        }
        if pair.home.is_some() || pair.mobile.is_some() {
            return pair;
        }

        let runs: Vec<&str> = DIGIT_RUN.find_iter(&compact).map(|m| m.as_str()).collect();
        match runs.as_slice() {
            [single] => {
                if single.starts_with(&phone.mobile_prefix) {
                    pair.mobile = Some(single.to_string());
                } else {
                    pair.home = Some(single.to_string());
                }
            }
            [first, second] => {
                pair.mobile = Some(first.to_string());
                pair.home = Some(second.to_string());
            }
            _ => {
                tracing::debug!(runs = runs.len(), "unlabelled phone blob not classifiable");
            }
        }
        pair
    }

    /// Splits a cleaned address into street, suburb, postcode, and state.
    ///
    /// The postcode is the trailing 4-digit run; its leading digit selects
    /// the state. The street portion ends at the first street-type token;
    /// without one, the first two tokens become the street portion.
    pub fn split_address(&self, full_address: &str) -> AddressParts {
        let config = self.template.address();
        let mut parts = AddressParts::default();
        let mut remainder = full_address.trim().to_string();

        if let Some(caps) = TRAILING_POSTCODE.captures(&remainder) {
            let postcode = caps[1].to_string();
            let start = caps.get(1).expect("group 1 always present").start();
            remainder.truncate(start);
            remainder = remainder.trim().to_string();

            let state = postcode
                .chars()
                .next()
                .and_then(|d| config.state_by_first_digit.get(&d.to_string()))
                .cloned()
                .unwrap_or_else(|| config.default_state.clone());
            parts.postcode = Some(postcode);
            parts.state = Some(state);
        }

        let tokens: Vec<&str> = remainder.split_whitespace().collect();
        let street_index = tokens.iter().position(|token| {
            let bare = token.trim_matches(|c| c == ',' || c == '.');
            config
                .street_types
                .iter()
                .any(|street| street.eq_ignore_ascii_case(bare))
        });

        let (street, suburb) = match street_index {
            Some(index) => (&tokens[..=index], &tokens[index + 1..]),
            None if tokens.len() >= 2 => (&tokens[..2], &tokens[2..]),
            None => (&tokens[..], &[] as &[&str]),
        };
        if !street.is_empty() {
            parts.address = Some(street.join(" "));
        }
        if !suburb.is_empty() {
            parts.suburb = Some(suburb.join(" "));
        }
        parts
    }

    /// Extracts the provider reference code from a physician free-text
    /// block: the last 8 characters, uppercased, alphanumerics only.
    ///
    /// Returns `None` unless exactly 8 alphanumeric characters remain; a
    /// truncated code is never produced.
    pub fn extract_provider_code(&self, text: &str) -> Option<String> {
        let tail: String = text
            .chars()
            .rev()
            .take(8)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        let code: String = tail
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        if code.chars().count() == 8 {
            Some(code)
        } else {
            None
        }
    }

    /// Removes a quoted nickname segment from a given-name value.
    pub fn strip_nickname(&self, given: &str) -> String {
        let stripped = QUOTED_SEGMENT.replace_all(given, "");
        WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
    }

    /// Assembles a display name from given name and surname.
    ///
    /// Both parts must be present; otherwise the display name is `None`.
    pub fn assemble_name(&self, given: Option<&str>, surname: Option<&str>) -> Option<String> {
        let given = self.strip_nickname(given?);
        let surname = surname?;
        if given.is_empty() || surname.trim().is_empty() {
            return None;
        }
        Some(format!("{} {}", given, surname.trim()))
    }

    /// Constrains a sex marker to `M`, `F`, or `U`.
    pub fn normalize_sex(&self, value: Option<&str>) -> String {
        match value.map(str::trim) {
            Some("M") | Some("m") => "M".to_string(),
            Some("F") | Some("f") => "F".to_string(),
            Some("U") | Some("u") => "U".to_string(),
            _ => "U".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TemplateConfig;

    fn template() -> Template {
        TemplateConfig::default().compile().unwrap()
    }

    #[test]
    fn test_split_identifier() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        assert_eq!(
            resolver.split_identifier("1234567890/1"),
            Some(("1234567890".to_string(), "1".to_string()))
        );
        assert_eq!(resolver.split_identifier("123456789/1"), None);
        assert_eq!(resolver.split_identifier("1234567890"), None);
    }

    #[test]
    fn test_labelled_phone_blob() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        let pair = resolver.resolve_phones("0412345678(M)0398765432(H)");
        assert_eq!(pair.mobile.as_deref(), Some("0412345678"));
        assert_eq!(pair.home.as_deref(), Some("0398765432"));
    }

    #[test]
    fn test_international_prefix_rewritten_before_labels() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        let pair = resolver.resolve_phones("+61412345678(M)");
        assert_eq!(pair.mobile.as_deref(), Some("0412345678"));
        assert_eq!(pair.home, None);
    }

    #[test]
    fn test_single_unlabelled_number_classified_by_prefix() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);

        let mobile = resolver.resolve_phones("0412 345 678");
        assert_eq!(mobile.mobile.as_deref(), Some("0412345678"));
        assert_eq!(mobile.home, None);

        let home = resolver.resolve_phones("0398765432");
        assert_eq!(home.home.as_deref(), Some("0398765432"));
        assert_eq!(home.mobile, None);
    }

    #[test]
    fn test_two_unlabelled_numbers_assigned_positionally() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        let pair = resolver.resolve_phones("0412345678 0398765432");
        assert_eq!(pair.mobile.as_deref(), Some("0412345678"));
        assert_eq!(pair.home.as_deref(), Some("0398765432"));
    }

    #[test]
    fn test_too_many_or_no_digit_runs_yield_nothing() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        assert_eq!(
            resolver.resolve_phones("0412345678 0398765432 0411111111"),
            PhonePair::default()
        );
        assert_eq!(resolver.resolve_phones("no digits here"), PhonePair::default());
    }

    #[test]
    fn test_split_address_with_street_type() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        let parts = resolver.split_address("42 Smith Street Richmond 3121");
        assert_eq!(parts.address.as_deref(), Some("42 Smith Street"));
        assert_eq!(parts.suburb.as_deref(), Some("Richmond"));
        assert_eq!(parts.postcode.as_deref(), Some("3121"));
        assert_eq!(parts.state.as_deref(), Some("VIC"));
    }

    #[test]
    fn test_split_address_without_street_type_falls_back() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        let parts = resolver.split_address("12 Foobar Newtown 2042");
        assert_eq!(parts.address.as_deref(), Some("12 Foobar"));
        assert_eq!(parts.suburb.as_deref(), Some("Newtown"));
        assert_eq!(parts.state.as_deref(), Some("NSW"));
    }

    #[test]
    fn test_split_address_without_postcode() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        let parts = resolver.split_address("42 Smith Street Richmond");
        assert_eq!(parts.address.as_deref(), Some("42 Smith Street"));
        assert_eq!(parts.suburb.as_deref(), Some("Richmond"));
        assert_eq!(parts.postcode, None);
        assert_eq!(parts.state, None);
    }

    #[test]
    fn test_split_address_unmapped_leading_digit_uses_default() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        let mut config = TemplateConfig::default();
        config.address.state_by_first_digit.clear();
        let bare = config.compile().unwrap();
        let resolver_bare = DerivedFieldResolver::new(&bare);
        assert_eq!(
            resolver_bare.split_address("1 Main St Somewhere 3121").state,
            Some("NSW".to_string())
        );
        // The populated table maps 3 to VIC.
        assert_eq!(
            resolver.split_address("1 Main St Somewhere 3121").state,
            Some("VIC".to_string())
        );
    }

    #[test]
    fn test_address_is_present_whenever_suburb_is() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        for input in ["3121", "Richmond", "42 Smith Street Richmond 3121", "X Y Z"] {
            let parts = resolver.split_address(input);
            if parts.suburb.is_some() {
                assert!(parts.address.is_some(), "suburb without address for {input:?}");
            }
        }
    }

    #[test]
    fn test_provider_code_exactly_eight_or_none() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        assert_eq!(
            resolver.extract_provider_code("DrJSmith2468ab13"),
            Some("2468AB13".to_string())
        );
        // Shorter than 8 after filtering: no truncated value.
        assert_eq!(resolver.extract_provider_code("ab1"), None);
        assert_eq!(resolver.extract_provider_code(""), None);
    }

    #[test]
    fn test_name_assembly_and_nickname_removal() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        assert_eq!(
            resolver.assemble_name(Some("John 'Johnno'"), Some("Citizen")),
            Some("John Citizen".to_string())
        );
        assert_eq!(resolver.assemble_name(Some("John"), None), None);
        assert_eq!(resolver.assemble_name(None, Some("Citizen")), None);
    }

    #[test]
    fn test_normalize_sex() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);
        assert_eq!(resolver.normalize_sex(Some("M")), "M");
        assert_eq!(resolver.normalize_sex(Some("f")), "F");
        assert_eq!(resolver.normalize_sex(Some("X")), "U");
        assert_eq!(resolver.normalize_sex(None), "U");
    }

    #[test]
    fn test_rules_are_idempotent() {
        let template = template();
        let resolver = DerivedFieldResolver::new(&template);

        let once = resolver.split_address("42 Smith Street Richmond 3121");
        let again = resolver.split_address(once.address.as_deref().unwrap());
        assert_eq!(again.address.as_deref(), Some("42 Smith Street"));

        let pair = resolver.resolve_phones("0412345678(M)");
        let again = resolver.resolve_phones(pair.mobile.as_deref().unwrap());
        assert_eq!(again.mobile, pair.mobile);
    }
}
