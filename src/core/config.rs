//! Template configuration for the form-scanning pipeline.
//!
//! A deployment supports exactly one form template, described by a
//! [`TemplateConfig`]: the anchor search window and pattern, one
//! [`FieldSpec`] per logical field, and the cleaning/derivation/validation
//! tables. The configuration is deserialized once at startup, compiled into
//! an immutable [`Template`], and passed by reference into every pipeline
//! instance. Nothing in it is mutated afterwards, so a single compiled
//! template can be shared across concurrent pipelines without locking.

use crate::core::traits::RecognitionMode;
use crate::processors::geometry::Rect;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while loading or compiling a template configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read template configuration from '{path}'")]
    Read {
        /// Path of the configuration file.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration document could not be parsed.
    #[error("failed to parse template configuration")]
    Parse(#[from] serde_json::Error),

    /// Two field specs share the same identifier.
    #[error("duplicate field spec for '{field}'")]
    DuplicateField {
        /// The duplicated field identifier.
        field: &'static str,
    },

    /// A configured regular expression does not compile.
    #[error("invalid pattern '{pattern}' for {context}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Where the pattern was configured.
        context: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    /// The anchor search window has no area.
    #[error("anchor search region {0:?} is degenerate")]
    DegenerateSearchRegion(Rect),
}

/// Identifier of a logical field on the form.
///
/// The set is closed per template; derived fields (split phone numbers,
/// address components, the provider code) share the same namespace as
/// located fields so that one record maps every value uniformly.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FieldId {
    RequestNumber,
    RequestDate,
    ReceivedDate,
    Surname,
    GivenNames,
    Name,
    Sex,
    Address,
    Suburb,
    Postcode,
    State,
    DateOfBirth,
    HomePhone,
    MobilePhone,
    PhoneNumber,
    MedicareNumber,
    MedicarePosition,
    ProviderNumber,
    DoctorInformation,
}

impl FieldId {
    /// Returns the snake_case identifier used in configuration files,
    /// log lines, and validation-error keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldId::RequestNumber => "request_number",
            FieldId::RequestDate => "request_date",
            FieldId::ReceivedDate => "received_date",
            FieldId::Surname => "surname",
            FieldId::GivenNames => "given_names",
            FieldId::Name => "name",
            FieldId::Sex => "sex",
            FieldId::Address => "address",
            FieldId::Suburb => "suburb",
            FieldId::Postcode => "postcode",
            FieldId::State => "state",
            FieldId::DateOfBirth => "date_of_birth",
            FieldId::HomePhone => "home_phone",
            FieldId::MobilePhone => "mobile_phone",
            FieldId::PhoneNumber => "phone_number",
            FieldId::MedicareNumber => "medicare_number",
            FieldId::MedicarePosition => "medicare_position",
            FieldId::ProviderNumber => "provider_number",
            FieldId::DoctorInformation => "doctor_information",
        }
    }

    /// Returns the shape-rule family applied after whitelist filtering.
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldId::MedicareNumber => FieldKind::NumericId,
            FieldId::HomePhone | FieldId::MobilePhone => FieldKind::Phone,
            FieldId::Address => FieldKind::Address,
            FieldId::GivenNames | FieldId::Surname | FieldId::Name => FieldKind::Name,
            FieldId::RequestNumber => FieldKind::RequestId,
            _ => FieldKind::General,
        }
    }
}

impl std::fmt::Display for FieldId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Families of field-specific shape rules used by text cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Numeric identifier: internal whitespace is collapsed away.
    NumericId,
    /// Phone-like: everything but digits is stripped.
    Phone,
    /// Free-text address: missing inter-word spaces are reinserted.
    Address,
    /// Person name: letters, spaces, hyphen, apostrophe, period.
    Name,
    /// Fixed-prefix request identifier: exact shape extracted or null.
    RequestId,
    /// No shape rule beyond whitelist and trim.
    General,
}

/// A calibrated offset describing where a field lies relative to the
/// anchor's top-left corner.
///
/// `dy` is recorded as distance *above* the anchor, so the field's top edge
/// is `anchor.y - dy` (a negative `dy` places the field below the anchor).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RelativeOffset {
    /// Horizontal offset from the anchor's left edge.
    pub dx: i32,
    /// Vertical distance above the anchor's top edge.
    pub dy: i32,
    /// Width of the field region.
    pub width: u32,
    /// Height of the field region.
    pub height: u32,
}

impl RelativeOffset {
    /// Resolves the offset against an anchor position into a rectangle.
    pub fn resolve(&self, anchor_x: i32, anchor_y: i32) -> Rect {
        let x1 = anchor_x + self.dx;
        let y1 = anchor_y - self.dy;
        Rect::from_xywh(x1, y1, self.width as i32, self.height as i32)
    }
}

/// Specification of one located field: where to look and how to read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    /// The field this spec locates.
    pub id: FieldId,
    /// Absolute fallback rectangle, used when no anchor was found.
    pub region: Rect,
    /// Calibrated anchor-relative offset, when the field participates in
    /// anchor-relative location.
    #[serde(default)]
    pub offset: Option<RelativeOffset>,
    /// Recognition mode for this field's region. Defaults to
    /// [`RecognitionMode::Block`] when unset.
    #[serde(default)]
    pub mode: Option<RecognitionMode>,
}

/// A literal substring correction applied to recognized text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionRule {
    /// The misread substring.
    pub from: String,
    /// Its replacement.
    pub to: String,
}

/// Configuration of the anchor search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Search window, larger than the anchor's expected extent to tolerate
    /// scan misalignment.
    pub search_region: Rect,
    /// Strict format pattern an anchor candidate must satisfy in full.
    pub pattern: String,
    /// Characters allowed in a candidate; everything else is stripped
    /// before pattern matching.
    pub allowed_chars: String,
    /// Misread corrections tried, in order, when the unmodified cleaned
    /// token does not satisfy the pattern.
    pub corrections: Vec<CorrectionRule>,
}

/// Per-field text-cleaning tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleaningConfig {
    /// Character classes to delete per field, as regex patterns of the
    /// *disallowed* characters (e.g. `[^0-9/]`).
    pub strip: BTreeMap<FieldId, String>,
    /// Literal misread corrections per field, applied before filtering.
    pub misreads: BTreeMap<FieldId, Vec<CorrectionRule>>,
}

/// Address-splitting tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressConfig {
    /// Street-type tokens that terminate the street portion of an address.
    pub street_types: Vec<String>,
    /// Mapping from the postcode's leading digit to a state code.
    pub state_by_first_digit: BTreeMap<String, String>,
    /// State used when the leading digit is unmapped.
    pub default_state: String,
}

/// Phone-classification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhoneConfig {
    /// International country calling code, without the `+`.
    pub country_code: String,
    /// National mobile prefix (trunk digit included).
    pub mobile_prefix: String,
}

/// Record-validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Fields that must carry a value for the record to pass validation.
    pub required: Vec<FieldId>,
    /// Format patterns per field; a present value failing its pattern adds
    /// a validation error.
    pub patterns: BTreeMap<FieldId, String>,
    /// Fields holding `%d/%m/%Y` dates.
    pub date_fields: Vec<FieldId>,
    /// Overall-confidence floor below which the record is flagged.
    pub confidence_floor: f32,
}

/// The full template configuration for one deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Width of the prepared (canonical) form image.
    pub canvas_width: u32,
    /// Height of the prepared (canonical) form image.
    pub canvas_height: u32,
    /// Anchor search configuration.
    pub anchor: AnchorConfig,
    /// One spec per located field.
    pub fields: Vec<FieldSpec>,
    /// Text-cleaning tables.
    pub cleaning: CleaningConfig,
    /// Address-splitting tables.
    pub address: AddressConfig,
    /// Phone-classification configuration.
    pub phone: PhoneConfig,
    /// Record-validation configuration.
    pub validation: ValidationConfig,
    /// Fixed prefix of the request identifier (followed by five digits).
    pub request_number_prefix: String,
}

impl TemplateConfig {
    /// Loads a template configuration from a JSON file.
    pub fn from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Compiles the configuration into an immutable [`Template`],
    /// validating field uniqueness and every configured pattern.
    pub fn compile(self) -> Result<Template, ConfigError> {
        if self.anchor.search_region.is_degenerate() {
            return Err(ConfigError::DegenerateSearchRegion(
                self.anchor.search_region,
            ));
        }

        let mut seen = std::collections::BTreeSet::new();
        for spec in &self.fields {
            if !seen.insert(spec.id) {
                return Err(ConfigError::DuplicateField {
                    field: spec.id.as_str(),
                });
            }
        }

        let anchor_pattern = compile_pattern(&self.anchor.pattern, "anchor")?;
        let mut strip = BTreeMap::new();
        for (id, pattern) in &self.cleaning.strip {
            strip.insert(
                *id,
                compile_pattern(pattern, &format!("cleaning.strip.{id}"))?,
            );
        }
        let mut validation_patterns = BTreeMap::new();
        for (id, pattern) in &self.validation.patterns {
            validation_patterns.insert(
                *id,
                compile_pattern(pattern, &format!("validation.patterns.{id}"))?,
            );
        }
        let shape = format!("{}\\d{{5}}", regex::escape(&self.request_number_prefix));
        let request_shape = compile_pattern(&shape, "request_number_prefix")?;

        Ok(Template {
            config: self,
            anchor_pattern,
            strip,
            validation_patterns,
            request_shape,
        })
    }
}

fn compile_pattern(pattern: &str, context: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        context: context.to_string(),
        source,
    })
}

/// A compiled, immutable template shared by every pipeline instance.
#[derive(Debug)]
pub struct Template {
    config: TemplateConfig,
    anchor_pattern: Regex,
    strip: BTreeMap<FieldId, Regex>,
    validation_patterns: BTreeMap<FieldId, Regex>,
    request_shape: Regex,
}

impl Template {
    /// The underlying configuration.
    pub fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Canonical canvas dimensions as `(width, height)`.
    pub fn canvas(&self) -> (u32, u32) {
        (self.config.canvas_width, self.config.canvas_height)
    }

    /// The anchor search configuration.
    pub fn anchor(&self) -> &AnchorConfig {
        &self.config.anchor
    }

    /// The compiled anchor pattern.
    pub fn anchor_pattern(&self) -> &Regex {
        &self.anchor_pattern
    }

    /// The located-field specs, in template order.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.config.fields
    }

    /// The compiled strip pattern for a field, when one is configured.
    pub fn strip_pattern(&self, id: FieldId) -> Option<&Regex> {
        self.strip.get(&id)
    }

    /// The misread-correction table for a field.
    pub fn misreads(&self, id: FieldId) -> &[CorrectionRule] {
        self.config
            .cleaning
            .misreads
            .get(&id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// The compiled validation pattern for a field, when one is configured.
    pub fn validation_pattern(&self, id: FieldId) -> Option<&Regex> {
        self.validation_patterns.get(&id)
    }

    /// The compiled request-identifier shape (`prefix` + 5 digits).
    pub fn request_shape(&self) -> &Regex {
        &self.request_shape
    }

    /// The address-splitting tables.
    pub fn address(&self) -> &AddressConfig {
        &self.config.address
    }

    /// The phone-classification configuration.
    pub fn phone(&self) -> &PhoneConfig {
        &self.config.phone
    }

    /// The validation configuration.
    pub fn validation(&self) -> &ValidationConfig {
        &self.config.validation
    }
}

impl Default for TemplateConfig {
    /// The reference pathology request form template: a 1024x768 canvas
    /// with the Medicare identifier as anchor.
    fn default() -> Self {
        let fields = vec![
            FieldSpec {
                id: FieldId::RequestNumber,
                region: Rect::from_coords(775, 30, 1006, 125),
                offset: None,
                mode: None,
            },
            FieldSpec {
                id: FieldId::MedicareNumber,
                region: Rect::from_coords(540, 15, 788, 98),
                offset: None,
                mode: Some(RecognitionMode::SingleLine),
            },
            FieldSpec {
                id: FieldId::Surname,
                region: Rect::from_coords(24, 96, 166, 151),
                offset: Some(RelativeOffset {
                    dx: -504,
                    dy: -75,
                    width: 200,
                    height: 20,
                }),
                mode: Some(RecognitionMode::SingleLine),
            },
            FieldSpec {
                id: FieldId::GivenNames,
                region: Rect::from_coords(280, 97, 470, 172),
                offset: Some(RelativeOffset {
                    dx: -239,
                    dy: -75,
                    width: 200,
                    height: 20,
                }),
                mode: Some(RecognitionMode::SingleLine),
            },
            FieldSpec {
                id: FieldId::Sex,
                region: Rect::from_coords(617, 105, 657, 125),
                offset: Some(RelativeOffset {
                    dx: 77,
                    dy: -75,
                    width: 40,
                    height: 20,
                }),
                mode: Some(RecognitionMode::SingleChar),
            },
            FieldSpec {
                id: FieldId::DateOfBirth,
                region: Rect::from_coords(655, 95, 788, 152),
                offset: Some(RelativeOffset {
                    dx: 126,
                    dy: -75,
                    width: 150,
                    height: 20,
                }),
                mode: Some(RecognitionMode::SingleLine),
            },
            FieldSpec {
                id: FieldId::Address,
                region: Rect::from_coords(39, 145, 212, 213),
                offset: Some(RelativeOffset {
                    dx: -504,
                    dy: -114,
                    width: 300,
                    height: 60,
                }),
                mode: None,
            },
            FieldSpec {
                id: FieldId::PhoneNumber,
                region: Rect::from_coords(666, 149, 949, 292),
                offset: Some(RelativeOffset {
                    dx: 123,
                    dy: -116,
                    width: 200,
                    height: 40,
                }),
                mode: None,
            },
            FieldSpec {
                id: FieldId::RequestDate,
                region: Rect::from_coords(694, 481, 894, 501),
                offset: Some(RelativeOffset {
                    dx: 154,
                    dy: -451,
                    width: 200,
                    height: 20,
                }),
                mode: Some(RecognitionMode::SingleLine),
            },
            FieldSpec {
                id: FieldId::DoctorInformation,
                region: Rect::from_coords(466, 538, 864, 684),
                offset: Some(RelativeOffset {
                    dx: -22,
                    dy: -526,
                    width: 357,
                    height: 120,
                }),
                mode: None,
            },
        ];

        let mut strip = BTreeMap::new();
        strip.insert(FieldId::MedicareNumber, r"[^0-9/]".to_string());
        strip.insert(FieldId::HomePhone, r"[^0-9]".to_string());
        strip.insert(FieldId::MobilePhone, r"[^0-9]".to_string());
        strip.insert(FieldId::Address, r"[^A-Za-z0-9\s]".to_string());
        strip.insert(FieldId::DoctorInformation, r"[^A-Za-z0-9]".to_string());
        strip.insert(FieldId::RequestNumber, r"[^A-Za-z0-9]".to_string());

        let mut misreads = BTreeMap::new();
        misreads.insert(
            FieldId::DoctorInformation,
            vec![
                CorrectionRule {
                    from: "§".to_string(),
                    to: "5".to_string(),
                },
                CorrectionRule {
                    from: "$".to_string(),
                    to: "5".to_string(),
                },
                CorrectionRule {
                    from: "O".to_string(),
                    to: "0".to_string(),
                },
                CorrectionRule {
                    from: "l".to_string(),
                    to: "1".to_string(),
                },
            ],
        );

        let mut state_by_first_digit = BTreeMap::new();
        for (digit, state) in [
            ("2", "NSW"),
            ("3", "VIC"),
            ("4", "QLD"),
            ("5", "SA"),
            ("6", "WA"),
            ("7", "TAS"),
            ("8", "NT"),
            ("0", "NT"),
            ("9", "ACT"),
        ] {
            state_by_first_digit.insert(digit.to_string(), state.to_string());
        }

        let mut patterns = BTreeMap::new();
        patterns.insert(FieldId::MedicareNumber, r"^\d{10}$".to_string());
        patterns.insert(FieldId::HomePhone, r"^\d{10}$".to_string());
        patterns.insert(FieldId::MobilePhone, r"^\d{10}$".to_string());
        patterns.insert(FieldId::RequestNumber, r"^24H\d{5}$".to_string());
        patterns.insert(FieldId::ProviderNumber, r"^[A-Za-z0-9]{8}$".to_string());

        Self {
            canvas_width: 1024,
            canvas_height: 768,
            anchor: AnchorConfig {
                search_region: Rect::from_coords(531, 0, 804, 80),
                pattern: r"^\d{10}/\d$".to_string(),
                allowed_chars: "0123456789/".to_string(),
                corrections: vec![
                    CorrectionRule {
                        from: "|".to_string(),
                        to: "/".to_string(),
                    },
                    CorrectionRule {
                        from: "l".to_string(),
                        to: "/".to_string(),
                    },
                    CorrectionRule {
                        from: "I".to_string(),
                        to: "/".to_string(),
                    },
                    CorrectionRule {
                        from: "\\".to_string(),
                        to: "/".to_string(),
                    },
                ],
            },
            fields,
            cleaning: CleaningConfig { strip, misreads },
            address: AddressConfig {
                street_types: [
                    "Street", "St", "Road", "Rd", "Avenue", "Ave", "Drive", "Dr", "Boulevard",
                    "Blvd", "Lane", "Ln", "Terrace", "Terr", "Place", "Pl", "Court", "Ct",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                state_by_first_digit,
                default_state: "NSW".to_string(),
            },
            phone: PhoneConfig {
                country_code: "61".to_string(),
                mobile_prefix: "04".to_string(),
            },
            validation: ValidationConfig {
                required: vec![
                    FieldId::GivenNames,
                    FieldId::Surname,
                    FieldId::DateOfBirth,
                    FieldId::RequestDate,
                    FieldId::MedicareNumber,
                    FieldId::RequestNumber,
                    FieldId::ProviderNumber,
                ],
                patterns,
                date_fields: vec![FieldId::DateOfBirth, FieldId::RequestDate],
                confidence_floor: 70.0,
            },
            request_number_prefix: "24H".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_template_compiles() {
        let template = TemplateConfig::default().compile().unwrap();
        assert_eq!(template.canvas(), (1024, 768));
        assert!(template.anchor_pattern().is_match("1234567890/1"));
        assert!(!template.anchor_pattern().is_match("123456789/1"));
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let mut config = TemplateConfig::default();
        let dup = config.fields[0].clone();
        config.fields.push(dup);
        assert!(matches!(
            config.compile(),
            Err(ConfigError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_invalid_strip_pattern_rejected() {
        let mut config = TemplateConfig::default();
        config
            .cleaning
            .strip
            .insert(FieldId::Surname, "[unclosed".to_string());
        assert!(matches!(
            config.compile(),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_degenerate_search_region_rejected() {
        let mut config = TemplateConfig::default();
        config.anchor.search_region = Rect::from_coords(100, 50, 100, 80);
        assert!(matches!(
            config.compile(),
            Err(ConfigError::DegenerateSearchRegion(_))
        ));
    }

    #[test]
    fn test_request_shape_from_prefix() {
        let template = TemplateConfig::default().compile().unwrap();
        assert!(template.request_shape().is_match("24H12345"));
        assert!(!template.request_shape().is_match("25H12345"));
    }

    #[test]
    fn test_relative_offset_resolution_subtracts_dy() {
        let offset = RelativeOffset {
            dx: -504,
            dy: -75,
            width: 200,
            height: 20,
        };
        let rect = offset.resolve(540, 20);
        assert_eq!(rect, Rect::from_coords(36, 95, 236, 115));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = TemplateConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: TemplateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.fields.len(), config.fields.len());
        assert_eq!(back.request_number_prefix, "24H");
        back.compile().unwrap();
    }
}
