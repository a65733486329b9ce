use std::error::Error;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitFamily {
    Volume,
    Weight,
    Count,
    Other,
}

impl UnitFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitFamily::Volume => "volume",
            UnitFamily::Weight => "weight",
            UnitFamily::Count => "count",
            UnitFamily::Other => "other",
        }
    }
}

impl fmt::Display for UnitFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A measuring unit. `Count` and `Other` carry labels and compare by them, so
/// `count:egg/eggs` and `count:cracker/crackers` are different units.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Unit {
    Teaspoon,
    Tablespoon,
    Cup,
    Pint,
    Quart,
    Gallon,
    Liter,
    Centiliter,
    Milliliter,
    FluidOunce,
    Pound,
    Ounce,
    Gram,
    Milligram,
    Kilogram,
    Count { singular: String, plural: String },
    Other(String),
}

impl Unit {
    pub const FIXED: [Unit; 15] = [
        Unit::Teaspoon,
        Unit::Tablespoon,
        Unit::Cup,
        Unit::Pint,
        Unit::Quart,
        Unit::Gallon,
        Unit::Liter,
        Unit::Centiliter,
        Unit::Milliliter,
        Unit::FluidOunce,
        Unit::Pound,
        Unit::Ounce,
        Unit::Gram,
        Unit::Milligram,
        Unit::Kilogram,
    ];

    pub fn count(singular: &str, plural: &str) -> Self {
        Unit::Count {
            singular: singular.trim().to_string(),
            plural: plural.trim().to_string(),
        }
    }

    pub fn family(&self) -> UnitFamily {
        match self {
            Unit::Teaspoon
            | Unit::Tablespoon
            | Unit::Cup
            | Unit::Pint
            | Unit::Quart
            | Unit::Gallon
            | Unit::Liter
            | Unit::Centiliter
            | Unit::Milliliter
            | Unit::FluidOunce => UnitFamily::Volume,
            Unit::Pound | Unit::Ounce | Unit::Gram | Unit::Milligram | Unit::Kilogram => {
                UnitFamily::Weight
            }
            Unit::Count { .. } => UnitFamily::Count,
            Unit::Other(_) => UnitFamily::Other,
        }
    }

    /// Canonical token used in dataset files. `None` for labelled units.
    pub fn token(&self) -> Option<&'static str> {
        let token = match self {
            Unit::Teaspoon => "teaspoon",
            Unit::Tablespoon => "tablespoon",
            Unit::Cup => "cup",
            Unit::Pint => "pint",
            Unit::Quart => "quart",
            Unit::Gallon => "gallon",
            Unit::Liter => "liter",
            Unit::Centiliter => "centiliter",
            Unit::Milliliter => "milliliter",
            Unit::FluidOunce => "fluidOunce",
            Unit::Pound => "pound",
            Unit::Ounce => "ounce",
            Unit::Gram => "gram",
            Unit::Milligram => "milligram",
            Unit::Kilogram => "kilogram",
            Unit::Count { .. } | Unit::Other(_) => return None,
        };
        Some(token)
    }

    pub fn abbreviation(&self) -> String {
        let short = match self {
            Unit::Teaspoon => "tsp",
            Unit::Tablespoon => "tbsp",
            Unit::Cup => "cup",
            Unit::Pint => "pt",
            Unit::Quart => "qt",
            Unit::Gallon => "gal",
            Unit::Liter => "L",
            Unit::Centiliter => "cL",
            Unit::Milliliter => "mL",
            Unit::FluidOunce => "fl oz",
            Unit::Pound => "lb",
            Unit::Ounce => "oz",
            Unit::Gram => "g",
            Unit::Milligram => "mg",
            Unit::Kilogram => "kg",
            Unit::Count { singular, .. } => return singular.clone(),
            Unit::Other(name) => return name.clone(),
        };
        short.to_string()
    }

    /// Display label for `amount` of this unit: "1 cup" but "2 cups".
    pub fn label(&self, amount: f64) -> String {
        let singular = amount == 1.0;
        let (one, many) = match self {
            Unit::Teaspoon => ("teaspoon", "teaspoons"),
            Unit::Tablespoon => ("tablespoon", "tablespoons"),
            Unit::Cup => ("cup", "cups"),
            Unit::Pint => ("pint", "pints"),
            Unit::Quart => ("quart", "quarts"),
            Unit::Gallon => ("gallon", "gallons"),
            Unit::Liter => ("liter", "liters"),
            Unit::Centiliter => ("centiliter", "centiliters"),
            Unit::Milliliter => ("milliliter", "milliliters"),
            Unit::FluidOunce => ("fluid ounce", "fluid ounces"),
            Unit::Pound => ("pound", "pounds"),
            Unit::Ounce => ("ounce", "ounces"),
            Unit::Gram => ("gram", "grams"),
            Unit::Milligram => ("milligram", "milligrams"),
            Unit::Kilogram => ("kilogram", "kilograms"),
            Unit::Count { singular: s, plural: p } => {
                return if singular { s.clone() } else { p.clone() };
            }
            Unit::Other(name) => return name.clone(),
        };
        if singular { one } else { many }.to_string()
    }

    /// Parses a unit token the way dataset files and the CLI spell them.
    /// Unknown tokens fall back to `Other`; only blank input is an error.
    pub fn parse_token(raw: &str) -> Result<Self, ParseUnitError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseUnitError::Empty);
        }

        let normalized = trimmed.to_ascii_lowercase().replace(['_', '-', '.'], " ");
        let compact = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
        let unit = match compact.as_str() {
            "teaspoon" | "teaspoons" | "tsp" | "tsps" => Unit::Teaspoon,
            "tablespoon" | "tablespoons" | "tbsp" | "tbsps" | "tbs" | "tbl" => Unit::Tablespoon,
            "cup" | "cups" | "c" => Unit::Cup,
            "pint" | "pints" | "pt" | "pts" => Unit::Pint,
            "quart" | "quarts" | "qt" | "qts" => Unit::Quart,
            "gallon" | "gallons" | "gal" | "gals" => Unit::Gallon,
            "liter" | "liters" | "litre" | "litres" | "l" => Unit::Liter,
            "centiliter" | "centiliters" | "centilitre" | "centilitres" | "cl" => {
                Unit::Centiliter
            }
            "milliliter" | "milliliters" | "millilitre" | "millilitres" | "ml" => {
                Unit::Milliliter
            }
            "fluidounce" | "fluidounces" | "fluid ounce" | "fluid ounces" | "fl oz" | "floz"
            | "fl ozs" => Unit::FluidOunce,
            "pound" | "pounds" | "lb" | "lbs" => Unit::Pound,
            "ounce" | "ounces" | "oz" => Unit::Ounce,
            "gram" | "grams" | "g" | "gr" => Unit::Gram,
            "milligram" | "milligrams" | "mg" => Unit::Milligram,
            "kilogram" | "kilograms" | "kg" | "kgs" => Unit::Kilogram,
            _ => {
                return Ok(parse_count_spec(trimmed).unwrap_or_else(|| {
                    let words: Vec<&str> = trimmed.split_whitespace().collect();
                    Unit::Other(words.join(" ").to_lowercase())
                }));
            }
        };
        Ok(unit)
    }
}

/// `count:egg/eggs`, or `count:egg` with an `s` plural.
fn parse_count_spec(raw: &str) -> Option<Unit> {
    let (prefix, rest) = raw.split_once(':')?;
    if !prefix.trim().eq_ignore_ascii_case("count") {
        return None;
    }
    let (singular, plural) = match rest.split_once('/') {
        Some((singular, plural)) => (singular.trim().to_string(), plural.trim().to_string()),
        None => {
            let singular = rest.trim().to_string();
            let plural = format!("{singular}s");
            (singular, plural)
        }
    };
    if singular.is_empty() || plural.is_empty() {
        return None;
    }
    Some(Unit::Count { singular, plural })
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::Count { singular, plural } => write!(f, "count:{singular}/{plural}"),
            Unit::Other(name) => f.write_str(name),
            fixed => f.write_str(fixed.token().unwrap_or_default()),
        }
    }
}

impl FromStr for Unit {
    type Err = ParseUnitError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Unit::parse_token(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseUnitError {
    Empty,
    InvalidShape(String),
}

impl fmt::Display for ParseUnitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseUnitError::Empty => f.write_str("unit token is empty"),
            ParseUnitError::InvalidShape(detail) => write!(f, "unsupported unit encoding: {detail}"),
        }
    }
}

impl Error for ParseUnitError {}

#[derive(Serialize, Deserialize)]
struct CountLabels {
    singular: String,
    plural: String,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum UnitRepr {
    Token(String),
    Count { count: CountLabels },
}

impl Serialize for Unit {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let repr = match self {
            Unit::Count { singular, plural } => UnitRepr::Count {
                count: CountLabels {
                    singular: singular.clone(),
                    plural: plural.clone(),
                },
            },
            Unit::Other(name) => UnitRepr::Token(name.clone()),
            fixed => UnitRepr::Token(fixed.token().unwrap_or_default().to_string()),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Unit {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match UnitRepr::deserialize(deserializer)? {
            UnitRepr::Token(token) => Unit::parse_token(&token).map_err(de::Error::custom),
            UnitRepr::Count { count } => {
                if count.singular.trim().is_empty() || count.plural.trim().is_empty() {
                    return Err(de::Error::custom("count unit labels must be non-empty"));
                }
                Ok(Unit::count(&count.singular, &count.plural))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ParseUnitError, Unit, UnitFamily};

    #[test]
    fn parses_long_names_plurals_and_abbreviations() {
        assert_eq!(Unit::parse_token("cup").unwrap(), Unit::Cup);
        assert_eq!(Unit::parse_token(" Cups ").unwrap(), Unit::Cup);
        assert_eq!(Unit::parse_token("tsp").unwrap(), Unit::Teaspoon);
        assert_eq!(Unit::parse_token("TBSP").unwrap(), Unit::Tablespoon);
        assert_eq!(Unit::parse_token("lb").unwrap(), Unit::Pound);
        assert_eq!(Unit::parse_token("fluidOunce").unwrap(), Unit::FluidOunce);
        assert_eq!(Unit::parse_token("fl oz").unwrap(), Unit::FluidOunce);
        assert_eq!(Unit::parse_token("fl_oz").unwrap(), Unit::FluidOunce);
        assert_eq!(Unit::parse_token("litre").unwrap(), Unit::Liter);
    }

    #[test]
    fn unknown_tokens_become_other_and_blank_is_rejected() {
        assert_eq!(
            Unit::parse_token("pinch").unwrap(),
            Unit::Other("pinch".to_string())
        );
        assert_eq!(Unit::parse_token("   "), Err(ParseUnitError::Empty));
    }

    #[test]
    fn other_units_ignore_case_and_spacing() {
        assert_eq!(
            Unit::parse_token(" Pinch ").unwrap(),
            Unit::parse_token("pinch").unwrap()
        );
        assert_eq!(
            Unit::parse_token("Heaping  Spoon").unwrap(),
            Unit::Other("heaping spoon".to_string())
        );
        let stored: Unit = serde_json::from_str("\"PINCH\"").expect("other should decode");
        assert_eq!(stored, Unit::Other("pinch".to_string()));
    }

    #[test]
    fn count_spec_parses_with_and_without_plural() {
        assert_eq!(
            Unit::parse_token("count:egg/eggs").unwrap(),
            Unit::count("egg", "eggs")
        );
        assert_eq!(
            Unit::parse_token("count:clove").unwrap(),
            Unit::count("clove", "cloves")
        );
    }

    #[test]
    fn count_units_compare_by_labels() {
        assert_ne!(
            Unit::count("egg", "eggs"),
            Unit::count("cracker", "crackers")
        );
        assert_ne!(Unit::count("egg", "eggs"), Unit::count("egg", "egges"));
        assert_eq!(Unit::count("egg", "eggs"), Unit::count(" egg", "eggs "));
        assert_eq!(Unit::count("egg", "eggs").family(), UnitFamily::Count);
        assert_eq!(Unit::Other("pinch".into()).family(), UnitFamily::Other);
    }

    #[test]
    fn labels_pluralize_by_amount() {
        assert_eq!(Unit::Cup.label(1.0), "cup");
        assert_eq!(Unit::Cup.label(2.0), "cups");
        assert_eq!(Unit::Cup.label(0.5), "cups");
        assert_eq!(Unit::FluidOunce.label(3.0), "fluid ounces");
        assert_eq!(Unit::count("egg", "eggs").label(1.0), "egg");
        assert_eq!(Unit::count("egg", "eggs").label(4.0), "eggs");
    }

    #[test]
    fn serde_uses_tokens_and_count_objects() {
        let json = serde_json::to_string(&Unit::FluidOunce).expect("unit should serialize");
        assert_eq!(json, "\"fluidOunce\"");

        let count: Unit = serde_json::from_str(r#"{"count":{"singular":"egg","plural":"eggs"}}"#)
            .expect("count unit should decode");
        assert_eq!(count, Unit::count("egg", "eggs"));
        assert_eq!(
            serde_json::to_value(&count).expect("count should serialize"),
            serde_json::json!({"count": {"singular": "egg", "plural": "eggs"}})
        );

        let other: Unit = serde_json::from_str("\"handful\"").expect("other should decode");
        assert_eq!(other, Unit::Other("handful".to_string()));
        assert!(serde_json::from_str::<Unit>("\"\"").is_err());
        assert!(serde_json::from_str::<Unit>("42").is_err());
    }
}
