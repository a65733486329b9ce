use std::error::Error;
use std::fmt;

use rusqlite::Connection;

use crate::db;

pub const DEFAULTS_LOADED_KEY: &str = "defaults_loaded";
pub const DATASET_VERSION_KEY: &str = "dataset_version";
pub const DATASET_DIGEST_KEY: &str = "dataset_digest";

/// Durable per-device state that decides whether a dataset still needs to be
/// applied. Written only after the registry commit of a pass succeeds.
pub trait MarkerStore {
    fn has_loaded_defaults(&self) -> Result<bool, MarkerError>;
    fn applied_version(&self) -> Result<Option<i64>, MarkerError>;
    fn applied_digest(&self) -> Result<Option<String>, MarkerError>;
    fn mark_loaded(&mut self, version: i64, digest: &str) -> Result<(), MarkerError>;
}

#[derive(Debug)]
pub enum MarkerError {
    Db(rusqlite::Error),
    Corrupt { key: &'static str, value: String },
    Unavailable(String),
}

impl fmt::Display for MarkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarkerError::Db(err) => write!(f, "database error: {}", err),
            MarkerError::Corrupt { key, value } => {
                write!(f, "marker '{}' holds an unreadable value '{}'", key, value)
            }
            MarkerError::Unavailable(message) => write!(f, "{}", message),
        }
    }
}

impl Error for MarkerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MarkerError::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for MarkerError {
    fn from(value: rusqlite::Error) -> Self {
        MarkerError::Db(value)
    }
}

/// Markers kept in the registry database's `meta` table.
pub struct MetaMarkers<'a> {
    conn: &'a Connection,
}

impl<'a> MetaMarkers<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl MarkerStore for MetaMarkers<'_> {
    fn has_loaded_defaults(&self) -> Result<bool, MarkerError> {
        match db::get_meta(self.conn, DEFAULTS_LOADED_KEY)?.as_deref() {
            None | Some("false") => Ok(false),
            Some("true") => Ok(true),
            Some(other) => Err(MarkerError::Corrupt {
                key: DEFAULTS_LOADED_KEY,
                value: other.to_string(),
            }),
        }
    }

    fn applied_version(&self) -> Result<Option<i64>, MarkerError> {
        let Some(raw) = db::get_meta(self.conn, DATASET_VERSION_KEY)? else {
            return Ok(None);
        };
        raw.trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| MarkerError::Corrupt {
                key: DATASET_VERSION_KEY,
                value: raw,
            })
    }

    fn applied_digest(&self) -> Result<Option<String>, MarkerError> {
        Ok(db::get_meta(self.conn, DATASET_DIGEST_KEY)?)
    }

    fn mark_loaded(&mut self, version: i64, digest: &str) -> Result<(), MarkerError> {
        let tx = self.conn.unchecked_transaction()?;
        db::set_meta(&tx, DATASET_VERSION_KEY, &version.to_string())?;
        db::set_meta(&tx, DATASET_DIGEST_KEY, digest)?;
        db::set_meta(&tx, DEFAULTS_LOADED_KEY, "true")?;
        tx.commit()?;
        Ok(())
    }
}

/// In-process markers, clean or pre-seeded.
#[cfg(test)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryMarkers {
    pub loaded: bool,
    pub version: Option<i64>,
    pub digest: Option<String>,
    pub fail_writes: bool,
}

#[cfg(test)]
impl MemoryMarkers {
    pub fn seeded(version: i64) -> Self {
        Self {
            loaded: true,
            version: Some(version),
            digest: None,
            fail_writes: false,
        }
    }
}

#[cfg(test)]
impl MarkerStore for MemoryMarkers {
    fn has_loaded_defaults(&self) -> Result<bool, MarkerError> {
        Ok(self.loaded)
    }

    fn applied_version(&self) -> Result<Option<i64>, MarkerError> {
        Ok(self.version)
    }

    fn applied_digest(&self) -> Result<Option<String>, MarkerError> {
        Ok(self.digest.clone())
    }

    fn mark_loaded(&mut self, version: i64, digest: &str) -> Result<(), MarkerError> {
        if self.fail_writes {
            return Err(MarkerError::Unavailable("marker store is read-only".to_string()));
        }
        self.loaded = true;
        self.version = Some(version);
        self.digest = Some(digest.to_string());
        Ok(())
    }
}
