use std::error::Error;
use std::fmt;

use rusqlite::Connection;

use crate::db;
use crate::domain::ingredient::Ingredient;

/// Every mutation of one pass. A change set is applied as a unit or not at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub inserts: Vec<Ingredient>,
    pub updates: Vec<Ingredient>,
    pub deletes: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }
}

pub trait Registry {
    /// Every record, ordered by case-insensitive name and then instance id.
    fn fetch_all(&self) -> Result<Vec<Ingredient>, RegistryError>;

    /// Applies `changes` atomically. Updates only rewrite dataset-owned
    /// fields and the fact set.
    fn commit(&mut self, changes: &ChangeSet) -> Result<(), RegistryError>;
}

#[derive(Debug)]
pub enum RegistryError {
    Db(rusqlite::Error),
    MissingRecord(String),
    Unavailable(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Db(err) => write!(f, "database error: {}", err),
            RegistryError::MissingRecord(id) => {
                write!(f, "ingredient '{}' disappeared during the pass", id)
            }
            RegistryError::Unavailable(message) => write!(f, "{}", message),
        }
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            RegistryError::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for RegistryError {
    fn from(value: rusqlite::Error) -> Self {
        RegistryError::Db(value)
    }
}

pub struct SqliteRegistry<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRegistry<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl Registry for SqliteRegistry<'_> {
    fn fetch_all(&self) -> Result<Vec<Ingredient>, RegistryError> {
        Ok(db::list_ingredients(self.conn)?)
    }

    fn commit(&mut self, changes: &ChangeSet) -> Result<(), RegistryError> {
        let tx = self.conn.unchecked_transaction()?;
        for ingredient in &changes.inserts {
            db::insert_ingredient(&tx, ingredient)?;
        }
        for ingredient in &changes.updates {
            if !db::update_descriptor_fields(&tx, ingredient)? {
                return Err(RegistryError::MissingRecord(ingredient.id.clone()));
            }
        }
        for id in &changes.deletes {
            db::delete_ingredient(&tx, id)?;
        }
        tx.commit()?;
        Ok(())
    }
}
