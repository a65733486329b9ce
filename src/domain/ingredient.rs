use std::error::Error;
use std::fmt;

use serde::Serialize;
use time::OffsetDateTime;

use super::unit::Unit;

/// One stored equivalence `from_amount from_unit == to_amount to_unit`.
/// Both amounts are finite and strictly positive; that is checked here so the
/// resolver never sees an unusable ratio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversionFact {
    #[serde(rename = "fromAmount")]
    from_amount: f64,
    #[serde(rename = "fromUnit")]
    from_unit: Unit,
    #[serde(rename = "toAmount")]
    to_amount: f64,
    #[serde(rename = "toUnit")]
    to_unit: Unit,
}

impl ConversionFact {
    pub fn new(
        from_amount: f64,
        from_unit: Unit,
        to_amount: f64,
        to_unit: Unit,
    ) -> Result<Self, FactError> {
        check_amount("fromAmount", from_amount)?;
        check_amount("toAmount", to_amount)?;
        Ok(Self {
            from_amount,
            from_unit,
            to_amount,
            to_unit,
        })
    }

    pub fn from_amount(&self) -> f64 {
        self.from_amount
    }

    pub fn from_unit(&self) -> &Unit {
        &self.from_unit
    }

    pub fn to_amount(&self) -> f64 {
        self.to_amount
    }

    pub fn to_unit(&self) -> &Unit {
        &self.to_unit
    }

    pub fn forward_multiplier(&self) -> f64 {
        self.to_amount / self.from_amount
    }

    pub fn reverse_multiplier(&self) -> f64 {
        self.from_amount / self.to_amount
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {} = {} {}",
            format_amount(self.from_amount),
            self.from_unit.label(self.from_amount),
            format_amount(self.to_amount),
            self.to_unit.label(self.to_amount)
        )
    }
}

fn check_amount(field: &'static str, value: f64) -> Result<(), FactError> {
    if !value.is_finite() {
        return Err(FactError::NonFinite { field });
    }
    if value <= 0.0 {
        return Err(FactError::NonPositive { field, value });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum FactError {
    NonPositive { field: &'static str, value: f64 },
    NonFinite { field: &'static str },
    MissingField(&'static str),
    InvalidUnit { field: &'static str, message: String },
}

impl fmt::Display for FactError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactError::NonPositive { field, value } => {
                write!(f, "{field} must be greater than zero (got {value})")
            }
            FactError::NonFinite { field } => write!(f, "{field} must be a finite number"),
            FactError::MissingField(field) => write!(f, "missing '{field}'"),
            FactError::InvalidUnit { field, message } => write!(f, "{field}: {message}"),
        }
    }
}

impl Error for FactError {}

#[derive(Debug, Clone, PartialEq)]
pub struct Ingredient {
    pub id: String,
    pub default_id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub is_custom: bool,
    pub is_favorite: bool,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub facts: Vec<ConversionFact>,
}

impl Ingredient {
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

/// Case-insensitive comparison key for ingredient names.
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Renders amounts without trailing zeros: 2, 0.5, 7.25.
pub fn format_amount(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let rendered = format!("{value:.4}");
    rendered
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}
