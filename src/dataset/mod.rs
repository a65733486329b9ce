use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::domain::ingredient::{ConversionFact, FactError};
use crate::domain::unit::{ParseUnitError, Unit};

const BUNDLED_DATASET: &str = include_str!("../default_ingredients.json");

/// One revision of the default ingredient list, as produced by the
/// authoring pipeline.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub version: i64,
    pub ingredients: Vec<IngredientDescriptor>,
    /// Entries that could not be read as a descriptor, by position.
    pub rejected: Vec<(usize, String)>,
    source: String,
    digest: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientDescriptor {
    #[serde(default, rename = "id")]
    pub default_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    conversions: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct RawDataset {
    version: i64,
    #[serde(default)]
    ingredients: Vec<Value>,
}

/// A missing or null name reads as empty; the reconciler skips those.
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Result of decoding one descriptor's conversions: the usable facts, in
/// file order, plus the position and reason of every rejected one.
#[derive(Debug, Clone, Default)]
pub struct DecodedFacts {
    pub facts: Vec<ConversionFact>,
    pub rejected: Vec<(usize, FactError)>,
}

impl Dataset {
    pub fn bundled() -> Result<Self, DatasetError> {
        Self::parse(BUNDLED_DATASET, "<bundled>")
    }

    pub fn from_path(path: &Path) -> Result<Self, DatasetError> {
        let raw = std::fs::read_to_string(path).map_err(|err| DatasetError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    #[cfg(test)]
    pub fn from_json_str(raw: &str) -> Result<Self, DatasetError> {
        Self::parse(raw, "<inline>")
    }

    fn parse(raw: &str, source: &str) -> Result<Self, DatasetError> {
        let parsed: RawDataset = serde_json::from_str(raw).map_err(|err| DatasetError::Json {
            source_name: source.to_string(),
            error: err,
        })?;
        if parsed.version < 1 {
            return Err(DatasetError::InvalidVersion(parsed.version));
        }

        let mut ingredients = Vec::with_capacity(parsed.ingredients.len());
        let mut rejected = Vec::new();
        for (index, value) in parsed.ingredients.into_iter().enumerate() {
            match serde_json::from_value::<IngredientDescriptor>(value) {
                Ok(descriptor) => ingredients.push(descriptor.normalized()),
                Err(err) => {
                    log::warn!("skipping ingredient #{} of {}: {}", index + 1, source, err);
                    rejected.push((index, err.to_string()));
                }
            }
        }
        Ok(Self {
            version: parsed.version,
            ingredients,
            rejected,
            source: source.to_string(),
            digest: sha256_hex(raw.as_bytes()),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// SHA-256 of the dataset bytes, hex encoded.
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

impl IngredientDescriptor {
    #[cfg(test)]
    pub fn new(default_id: Option<&str>, name: &str) -> Self {
        Self {
            default_id: default_id.map(str::to_string),
            name: name.to_string(),
            category: None,
            brand: None,
            conversions: Vec::new(),
        }
        .normalized()
    }

    #[cfg(test)]
    pub fn with_fact(mut self, fact: &ConversionFact) -> Self {
        if let Ok(value) = serde_json::to_value(fact) {
            self.conversions.push(value);
        }
        self
    }

    fn normalized(mut self) -> Self {
        self.default_id = non_empty(self.default_id.as_deref());
        self.name = self.name.trim().to_string();
        self.category = non_empty(self.category.as_deref());
        self.brand = non_empty(self.brand.as_deref());
        self
    }

    #[cfg(test)]
    pub fn conversion_count(&self) -> usize {
        self.conversions.len()
    }

    pub fn decode_facts(&self) -> DecodedFacts {
        let mut decoded = DecodedFacts::default();
        for (index, value) in self.conversions.iter().enumerate() {
            match decode_fact(value) {
                Ok(fact) => decoded.facts.push(fact),
                Err(err) => decoded.rejected.push((index, err)),
            }
        }
        decoded
    }
}

fn decode_fact(value: &Value) -> Result<ConversionFact, FactError> {
    let object = value.as_object().ok_or_else(|| FactError::InvalidUnit {
        field: "conversion",
        message: "conversion must be an object".to_string(),
    })?;
    let from_amount = required_amount(object, "fromAmount")?;
    let from_unit = required_unit(object, "fromUnit")?;
    let to_amount = required_amount(object, "toAmount")?;
    let to_unit = required_unit(object, "toUnit")?;
    ConversionFact::new(from_amount, from_unit, to_amount, to_unit)
}

fn required_amount(object: &Map<String, Value>, key: &'static str) -> Result<f64, FactError> {
    object
        .get(key)
        .ok_or(FactError::MissingField(key))?
        .as_f64()
        .ok_or(FactError::NonFinite { field: key })
}

fn required_unit(object: &Map<String, Value>, key: &'static str) -> Result<Unit, FactError> {
    let value = object.get(key).ok_or(FactError::MissingField(key))?;
    if !value.is_string() && !value.is_object() {
        return Err(FactError::InvalidUnit {
            field: key,
            message: ParseUnitError::InvalidShape(value.to_string()).to_string(),
        });
    }
    serde_json::from_value(value.clone()).map_err(|err| FactError::InvalidUnit {
        field: key,
        message: err.to_string(),
    })
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[derive(Debug)]
pub enum DatasetError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Json {
        source_name: String,
        error: serde_json::Error,
    },
    InvalidVersion(i64),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Io { path, source } => {
                write!(f, "unable to read dataset {}: {}", path.display(), source)
            }
            DatasetError::Json { source_name, error } => {
                write!(f, "invalid dataset JSON in {}: {}", source_name, error)
            }
            DatasetError::InvalidVersion(version) => {
                write!(f, "dataset version must be a positive integer (got {version})")
            }
        }
    }
}

impl Error for DatasetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DatasetError::Io { source, .. } => Some(source),
            DatasetError::Json { error, .. } => Some(error),
            DatasetError::InvalidVersion(_) => None,
        }
    }
}
