use std::error::Error;
use std::fmt;
use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::{ConfigError, Settings};
use crate::convert::{self, ConversionError, Stage};
use crate::dataset::{Dataset, DatasetError};
use crate::db;
use crate::doctor::{run_doctor, DoctorError, DoctorReport};
use crate::domain::ingredient::{name_key, ConversionFact, FactError, Ingredient};
use crate::domain::unit::{ParseUnitError, Unit, UnitFamily};
use crate::locks::{FileLock, LockError};
use crate::reconcile::{
    MarkerStore, MetaMarkers, ReconcileError, ReconcileOptions, ReconcileReport, Reconciler,
    SqliteRegistry,
};

pub struct App {
    conn: Connection,
    settings: Settings,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FactView {
    pub index: usize,
    #[serde(flatten)]
    pub fact: ConversionFact,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IngredientView {
    pub id: String,
    pub default_id: Option<String>,
    pub name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
    pub is_custom: bool,
    pub is_favorite: bool,
    pub last_used_at: Option<String>,
    pub created_at: String,
    pub facts: Vec<FactView>,
}

impl From<Ingredient> for IngredientView {
    fn from(value: Ingredient) -> Self {
        let facts = value
            .facts
            .into_iter()
            .enumerate()
            .map(|(index, fact)| FactView {
                index: index + 1,
                text: fact.describe(),
                fact,
            })
            .collect();
        Self {
            id: value.id,
            default_id: value.default_id,
            name: value.name,
            category: value.category,
            brand: value.brand,
            is_custom: value.is_custom,
            is_favorite: value.is_favorite,
            last_used_at: value.last_used_at.as_ref().and_then(rfc3339),
            created_at: rfc3339(&value.created_at).unwrap_or_default(),
            facts,
        }
    }
}

fn rfc3339(value: &OffsetDateTime) -> Option<String> {
    value.format(&Rfc3339).ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub favorites_only: bool,
    pub custom: Option<bool>,
    pub category: Option<String>,
    pub query: Option<String>,
}

impl ListFilter {
    fn matches(&self, ingredient: &Ingredient) -> bool {
        if self.favorites_only && !ingredient.is_favorite {
            return false;
        }
        if self.custom.is_some_and(|custom| custom != ingredient.is_custom) {
            return false;
        }
        if let Some(category) = self.category.as_deref() {
            let wanted = name_key(category);
            if ingredient.category.as_deref().map(name_key) != Some(wanted) {
                return false;
            }
        }
        if let Some(query) = self.query.as_deref() {
            if !ingredient.name_key().contains(&name_key(query)) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConversionView {
    pub ingredient_id: String,
    pub ingredient: String,
    pub amount: f64,
    pub from: Unit,
    pub to: Unit,
    pub value: f64,
    pub stage: Stage,
    pub path: Vec<Unit>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusView {
    pub home: String,
    pub db_path: String,
    pub config_path: Option<String>,
    pub defaults_loaded: bool,
    pub applied_version: Option<i64>,
    pub applied_digest: Option<String>,
    pub dataset_source: String,
    pub dataset_version: i64,
    pub update_pending: bool,
    pub ingredients: i64,
    pub defaults: i64,
    pub custom: i64,
    pub favorites: i64,
    pub facts: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UnitView {
    pub token: String,
    pub abbreviation: String,
    pub family: UnitFamily,
}

impl App {
    pub fn open(settings: Settings) -> Result<Self, AppError> {
        ensure_parent_dir(&settings.db_path)?;
        let db_path = settings.db_path.to_str().ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "database path is not valid UTF-8: {}",
                settings.db_path.display()
            ))
        })?;
        let conn = db::open_connection(db_path)?;
        Ok(Self { conn, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn doctor(&self) -> Result<DoctorReport, AppError> {
        Ok(run_doctor(&self.conn, &self.settings)?)
    }

    /// The dataset named by `--dataset` or the config file, else the bundled one.
    pub fn load_dataset(&self, path: Option<&Path>) -> Result<Dataset, AppError> {
        let chosen = path.or(self.settings.dataset_path.as_deref());
        Ok(match chosen {
            Some(path) => Dataset::from_path(path)?,
            None => Dataset::bundled()?,
        })
    }

    pub fn reconcile(&self, dataset: &Dataset, force: bool) -> Result<ReconcileReport, AppError> {
        let mut registry = SqliteRegistry::new(&self.conn);
        let mut markers = MetaMarkers::new(&self.conn);
        let report = Reconciler::new(&mut registry, &mut markers)
            .with_lock(self.settings.lock_path(), self.settings.lock_timeout)
            .run(dataset, ReconcileOptions { force })?;
        Ok(report)
    }

    /// Startup check run before commands that read or edit the registry.
    pub fn reconcile_on_launch(&self) -> Result<ReconcileReport, AppError> {
        let dataset = self.load_dataset(None)?;
        self.reconcile(&dataset, false)
    }

    pub fn status(&self) -> Result<StatusView, AppError> {
        let markers = MetaMarkers::new(&self.conn);
        let dataset = self.load_dataset(None)?;
        let applied_version = markers.applied_version()?;
        let defaults_loaded = markers.has_loaded_defaults()?;
        let counts = db::count_ingredients(&self.conn)?;
        Ok(StatusView {
            home: self.settings.home.display().to_string(),
            db_path: self.settings.db_path.display().to_string(),
            config_path: self
                .settings
                .config_path
                .as_ref()
                .map(|path| path.display().to_string()),
            defaults_loaded,
            applied_version,
            applied_digest: markers.applied_digest()?,
            dataset_source: dataset.source().to_string(),
            dataset_version: dataset.version,
            update_pending: !defaults_loaded || dataset.version > applied_version.unwrap_or(0),
            ingredients: counts.total,
            defaults: counts.defaults(),
            custom: counts.custom,
            favorites: counts.favorites,
            facts: counts.facts,
        })
    }

    pub fn list(&self, filter: &ListFilter) -> Result<Vec<IngredientView>, AppError> {
        Ok(db::list_ingredients(&self.conn)?
            .into_iter()
            .filter(|ingredient| filter.matches(ingredient))
            .map(IngredientView::from)
            .collect())
    }

    pub fn show(&self, key: &str) -> Result<IngredientView, AppError> {
        Ok(IngredientView::from(self.find(key)?))
    }

    pub fn convert(
        &self,
        amount: f64,
        from: &str,
        to: &str,
        key: &str,
    ) -> Result<ConversionView, AppError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(AppError::InvalidArgument(format!(
                "amount must be a positive number (got {amount})"
            )));
        }
        let from = Unit::parse_token(from)?;
        let to = Unit::parse_token(to)?;

        let _lock = self.lock()?;
        let ingredient = self.find(key)?;
        let conversion = convert::resolve_detailed(amount, &from, &to, &ingredient.facts)?;
        db::set_last_used(&self.conn, &ingredient.id, &OffsetDateTime::now_utc())?;

        Ok(ConversionView {
            text: format!(
                "{} {} = {} {}",
                crate::domain::ingredient::format_amount(amount),
                from.label(amount),
                crate::domain::ingredient::format_amount(conversion.value),
                to.label(conversion.value)
            ),
            ingredient_id: ingredient.id,
            ingredient: ingredient.name,
            amount,
            from,
            to,
            value: conversion.value,
            stage: conversion.stage,
            path: conversion.path,
        })
    }

    pub fn create_custom(
        &self,
        name: &str,
        category: Option<&str>,
        brand: Option<&str>,
    ) -> Result<IngredientView, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidArgument(
                "ingredient name cannot be empty".to_string(),
            ));
        }

        let _lock = self.lock()?;
        let clash = db::list_ingredients(&self.conn)?
            .into_iter()
            .any(|existing| existing.is_custom && existing.name_key() == name_key(name));
        if clash {
            return Err(AppError::InvalidArgument(format!(
                "a custom ingredient named '{name}' already exists"
            )));
        }

        let ingredient = Ingredient {
            id: Uuid::now_v7().to_string(),
            default_id: None,
            name: name.to_string(),
            category: non_empty(category),
            brand: non_empty(brand),
            is_custom: true,
            is_favorite: false,
            last_used_at: None,
            created_at: OffsetDateTime::now_utc(),
            facts: Vec::new(),
        };
        db::insert_ingredient(&self.conn, &ingredient)?;
        log::info!("created custom ingredient {} ({})", ingredient.name, ingredient.id);
        Ok(IngredientView::from(ingredient))
    }

    pub fn add_fact(
        &self,
        key: &str,
        from_amount: f64,
        from_unit: &str,
        to_amount: f64,
        to_unit: &str,
    ) -> Result<IngredientView, AppError> {
        let fact = ConversionFact::new(
            from_amount,
            Unit::parse_token(from_unit)?,
            to_amount,
            Unit::parse_token(to_unit)?,
        )?;
        if fact.from_unit() == fact.to_unit() {
            return Err(AppError::InvalidArgument(
                "a conversion must relate two different units".to_string(),
            ));
        }

        let _lock = self.lock()?;
        let mut ingredient = self.find_custom(key)?;
        ingredient.facts.push(fact);
        db::replace_facts(&self.conn, &ingredient.id, &ingredient.facts)?;
        Ok(IngredientView::from(ingredient))
    }

    /// `index` is 1-based, as printed by `show`.
    pub fn remove_fact(&self, key: &str, index: usize) -> Result<IngredientView, AppError> {
        let _lock = self.lock()?;
        let mut ingredient = self.find_custom(key)?;
        if index == 0 || index > ingredient.facts.len() {
            return Err(AppError::InvalidArgument(format!(
                "'{}' has no conversion #{index}",
                ingredient.name
            )));
        }
        ingredient.facts.remove(index - 1);
        db::replace_facts(&self.conn, &ingredient.id, &ingredient.facts)?;
        Ok(IngredientView::from(ingredient))
    }

    pub fn set_favorite(&self, key: &str, favorite: bool) -> Result<IngredientView, AppError> {
        let _lock = self.lock()?;
        let mut ingredient = self.find(key)?;
        db::set_favorite(&self.conn, &ingredient.id, favorite)?;
        ingredient.is_favorite = favorite;
        Ok(IngredientView::from(ingredient))
    }

    pub fn mark_used(&self, key: &str) -> Result<IngredientView, AppError> {
        let _lock = self.lock()?;
        let mut ingredient = self.find(key)?;
        let now = OffsetDateTime::now_utc();
        db::set_last_used(&self.conn, &ingredient.id, &now)?;
        ingredient.last_used_at = Some(now);
        Ok(IngredientView::from(ingredient))
    }

    pub fn delete(&self, key: &str) -> Result<IngredientView, AppError> {
        let _lock = self.lock()?;
        let ingredient = self.find(key)?;
        db::delete_ingredient(&self.conn, &ingredient.id)?;
        log::info!("deleted {} ({})", ingredient.name, ingredient.id);
        Ok(IngredientView::from(ingredient))
    }

    pub fn units() -> Vec<UnitView> {
        Unit::FIXED
            .iter()
            .map(|unit| UnitView {
                token: unit.to_string(),
                abbreviation: unit.abbreviation(),
                family: unit.family(),
            })
            .collect()
    }

    fn lock(&self) -> Result<FileLock, AppError> {
        Ok(FileLock::acquire(
            &self.settings.lock_path(),
            self.settings.lock_timeout,
        )?)
    }

    /// Exact instance id, then a unique id prefix or case-insensitive name.
    fn find(&self, key: &str) -> Result<Ingredient, AppError> {
        let key = key.trim();
        if key.is_empty() {
            return Err(AppError::InvalidArgument(
                "ingredient reference cannot be empty".to_string(),
            ));
        }
        if let Some(found) = db::get_ingredient(&self.conn, key)? {
            return Ok(found);
        }
        let ids = db::find_ingredient_ids(&self.conn, key, key)?;
        match ids.len() {
            0 => Err(AppError::NotFound(key.to_string())),
            1 => db::get_ingredient(&self.conn, &ids[0])?
                .ok_or_else(|| AppError::NotFound(key.to_string())),
            _ => Err(AppError::Ambiguous {
                key: key.to_string(),
                candidates: ids,
            }),
        }
    }

    fn find_custom(&self, key: &str) -> Result<Ingredient, AppError> {
        let ingredient = self.find(key)?;
        if !ingredient.is_custom {
            return Err(AppError::ReadOnlyDefault(ingredient.name));
        }
        Ok(ingredient)
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn ensure_parent_dir(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[derive(Debug)]
pub enum AppError {
    Io(std::io::Error),
    Db(rusqlite::Error),
    Dataset(DatasetError),
    Reconcile(ReconcileError),
    Lock(LockError),
    Markers(crate::reconcile::MarkerError),
    Config(ConfigError),
    Doctor(DoctorError),
    Conversion(ConversionError),
    Fact(FactError),
    Unit(ParseUnitError),
    InvalidArgument(String),
    NotFound(String),
    Ambiguous { key: String, candidates: Vec<String> },
    ReadOnlyDefault(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Io(err) => write!(f, "I/O error: {}", err),
            AppError::Db(err) => write!(f, "database error: {}", err),
            AppError::Dataset(err) => write!(f, "{}", err),
            AppError::Reconcile(err) => write!(f, "{}", err),
            AppError::Lock(err) => write!(f, "{}", err),
            AppError::Markers(err) => write!(f, "dataset marker error: {}", err),
            AppError::Config(err) => write!(f, "{}", err),
            AppError::Doctor(err) => write!(f, "doctor failed: {}", err),
            AppError::Conversion(err) => write!(f, "{}", err),
            AppError::Fact(err) => write!(f, "invalid conversion: {}", err),
            AppError::Unit(err) => write!(f, "invalid unit: {}", err),
            AppError::InvalidArgument(message) => write!(f, "{}", message),
            AppError::NotFound(key) => write!(f, "ingredient '{}' not found", key),
            AppError::Ambiguous { key, candidates } => write!(
                f,
                "'{}' matches {} ingredients; use one of: {}",
                key,
                candidates.len(),
                candidates.join(", ")
            ),
            AppError::ReadOnlyDefault(name) => write!(
                f,
                "'{}' comes from the default dataset; create a custom ingredient to edit conversions",
                name
            ),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Io(err) => Some(err),
            AppError::Db(err) => Some(err),
            AppError::Dataset(err) => Some(err),
            AppError::Reconcile(err) => Some(err),
            AppError::Lock(err) => Some(err),
            AppError::Markers(err) => Some(err),
            AppError::Config(err) => Some(err),
            AppError::Doctor(err) => Some(err),
            AppError::Conversion(err) => Some(err),
            AppError::Fact(err) => Some(err),
            AppError::Unit(err) => Some(err),
            AppError::InvalidArgument(_)
            | AppError::NotFound(_)
            | AppError::Ambiguous { .. }
            | AppError::ReadOnlyDefault(_) => None,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::Io(value)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(value: rusqlite::Error) -> Self {
        AppError::Db(value)
    }
}

impl From<DatasetError> for AppError {
    fn from(value: DatasetError) -> Self {
        AppError::Dataset(value)
    }
}

impl From<ReconcileError> for AppError {
    fn from(value: ReconcileError) -> Self {
        AppError::Reconcile(value)
    }
}

impl From<LockError> for AppError {
    fn from(value: LockError) -> Self {
        AppError::Lock(value)
    }
}

impl From<crate::reconcile::MarkerError> for AppError {
    fn from(value: crate::reconcile::MarkerError) -> Self {
        AppError::Markers(value)
    }
}

impl From<ConversionError> for AppError {
    fn from(value: ConversionError) -> Self {
        AppError::Conversion(value)
    }
}

impl From<FactError> for AppError {
    fn from(value: FactError) -> Self {
        AppError::Fact(value)
    }
}

impl From<ParseUnitError> for AppError {
    fn from(value: ParseUnitError) -> Self {
        AppError::Unit(value)
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<DoctorError> for AppError {
    fn from(value: DoctorError) -> Self {
        AppError::Doctor(value)
    }
}

#[cfg(test)]
mod tests;
