use std::error::Error;
use std::fmt;

use rusqlite::Connection;
use serde::Serialize;

use crate::config::Settings;
use crate::convert::find_inconsistencies;
use crate::dataset::Dataset;
use crate::db::{self, CURRENT_SCHEMA_VERSION};
use crate::domain::ingredient::format_amount;
use crate::locks::{describe_holder, FileLock, LockError};
use crate::reconcile::{plan_dedupe, MarkerError, MarkerStore, MetaMarkers};

/// Relative spread tolerated between two routes for the same unit pair.
pub const RATIO_TOLERANCE: f64 = 0.02;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DoctorStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorCheck {
    pub name: String,
    pub status: DoctorStatus,
    pub detail: String,
}

impl DoctorCheck {
    fn new(name: &str, status: DoctorStatus, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DoctorReport {
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn failure_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|check| check.status == DoctorStatus::Fail)
            .count()
    }
}

#[derive(Debug)]
pub enum DoctorError {
    Db(rusqlite::Error),
    Lock(LockError),
    Markers(MarkerError),
}

impl fmt::Display for DoctorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DoctorError::Db(err) => write!(f, "database error: {}", err),
            DoctorError::Lock(err) => write!(f, "lock error: {}", err),
            DoctorError::Markers(err) => write!(f, "dataset marker error: {}", err),
        }
    }
}

impl Error for DoctorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DoctorError::Db(err) => Some(err),
            DoctorError::Lock(err) => Some(err),
            DoctorError::Markers(err) => Some(err),
        }
    }
}

impl From<rusqlite::Error> for DoctorError {
    fn from(value: rusqlite::Error) -> Self {
        DoctorError::Db(value)
    }
}

impl From<LockError> for DoctorError {
    fn from(value: LockError) -> Self {
        DoctorError::Lock(value)
    }
}

impl From<MarkerError> for DoctorError {
    fn from(value: MarkerError) -> Self {
        DoctorError::Markers(value)
    }
}

pub fn run_doctor(conn: &Connection, settings: &Settings) -> Result<DoctorReport, DoctorError> {
    let checks = vec![
        check_schema(conn)?,
        check_lock(settings)?,
        check_dataset(conn, settings)?,
        check_duplicates(conn)?,
        check_ratios(conn)?,
    ];
    Ok(DoctorReport { checks })
}

fn check_schema(conn: &Connection) -> Result<DoctorCheck, DoctorError> {
    let stored = db::get_meta(conn, "schema_version")?;
    let expected = CURRENT_SCHEMA_VERSION.to_string();
    Ok(match stored {
        Some(version) if version == expected => DoctorCheck::new(
            "schema",
            DoctorStatus::Pass,
            format!("schema version {version}"),
        ),
        Some(version) => DoctorCheck::new(
            "schema",
            DoctorStatus::Fail,
            format!("schema version {version}, expected {expected}"),
        ),
        None => DoctorCheck::new("schema", DoctorStatus::Fail, "schema version missing"),
    })
}

fn check_lock(settings: &Settings) -> Result<DoctorCheck, DoctorError> {
    let path = settings.lock_path();
    let guard = FileLock::try_acquire(&path)?;
    let check = match guard {
        Some(_) => DoctorCheck::new("lock_health", DoctorStatus::Pass, "registry lock is acquirable"),
        None => DoctorCheck::new(
            "lock_health",
            DoctorStatus::Warn,
            format!(
                "registry lock is held ({}): {}",
                describe_holder(&path).unwrap_or_else(|| "unknown holder".to_string()),
                path.display()
            ),
        ),
    };
    drop(guard);
    Ok(check)
}

fn check_dataset(conn: &Connection, settings: &Settings) -> Result<DoctorCheck, DoctorError> {
    let loaded = match settings.dataset_path.as_deref() {
        Some(path) => Dataset::from_path(path),
        None => Dataset::bundled(),
    };
    let dataset = match loaded {
        Ok(dataset) => dataset,
        Err(err) => return Ok(DoctorCheck::new("dataset", DoctorStatus::Fail, err.to_string())),
    };

    let rejected_facts: usize = dataset
        .ingredients
        .iter()
        .map(|descriptor| descriptor.decode_facts().rejected.len())
        .sum();
    let rejected_entries = dataset.rejected.len();
    let markers = MetaMarkers::new(conn);
    let applied = markers.applied_version()?;
    let digest = markers.applied_digest()?;

    let (status, detail) = if !markers.has_loaded_defaults()? {
        (
            DoctorStatus::Warn,
            "defaults not loaded yet (run `pantry reconcile`)".to_string(),
        )
    } else if dataset.version > applied.unwrap_or(0) {
        (
            DoctorStatus::Warn,
            format!(
                "dataset version {} pending (applied {})",
                dataset.version,
                applied.map_or_else(|| "none".to_string(), |value| value.to_string())
            ),
        )
    } else if applied == Some(dataset.version)
        && digest.as_deref().is_some_and(|digest| digest != dataset.digest())
    {
        (
            DoctorStatus::Warn,
            format!(
                "{} changed without a version bump (version {})",
                dataset.source(),
                dataset.version
            ),
        )
    } else if rejected_facts > 0 || rejected_entries > 0 {
        (
            DoctorStatus::Warn,
            format!(
                "{rejected_entries} unreadable ingredient(s) and {rejected_facts} malformed conversion(s) in {}",
                dataset.source()
            ),
        )
    } else {
        (
            DoctorStatus::Pass,
            format!("dataset version {} applied", dataset.version),
        )
    };
    Ok(DoctorCheck::new("dataset", status, detail))
}

fn check_duplicates(conn: &Connection) -> Result<DoctorCheck, DoctorError> {
    let plan = plan_dedupe(&db::list_ingredients(conn)?);
    if plan.groups.is_empty() {
        return Ok(DoctorCheck::new(
            "duplicates",
            DoctorStatus::Pass,
            "no duplicate default ingredients",
        ));
    }
    let names: Vec<&str> = plan.groups.iter().map(|group| group.name.as_str()).collect();
    Ok(DoctorCheck::new(
        "duplicates",
        DoctorStatus::Warn,
        format!(
            "{} duplicate default record(s): {} (run `pantry reconcile`)",
            plan.removed(),
            names.join(", ")
        ),
    ))
}

fn check_ratios(conn: &Connection) -> Result<DoctorCheck, DoctorError> {
    let mut findings = Vec::new();
    for ingredient in db::list_ingredients(conn)? {
        for finding in find_inconsistencies(&ingredient.facts, RATIO_TOLERANCE) {
            let ratios: Vec<String> = finding.ratios.iter().map(|ratio| format_amount(*ratio)).collect();
            findings.push(format!(
                "{}: {} -> {} is {}",
                ingredient.name,
                finding.from,
                finding.to,
                ratios.join(" or ")
            ));
        }
    }
    if findings.is_empty() {
        return Ok(DoctorCheck::new(
            "ratios",
            DoctorStatus::Pass,
            "conversion facts are consistent",
        ));
    }
    Ok(DoctorCheck::new(
        "ratios",
        DoctorStatus::Warn,
        format!("{} inconsistent pair(s); {}", findings.len(), findings.join("; ")),
    ))
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{run_doctor, DoctorStatus};
    use crate::config::Settings;
    use crate::db;
    use crate::domain::ingredient::{ConversionFact, Ingredient};
    use crate::domain::unit::Unit;
    use crate::locks::FileLock;

    fn open() -> (rusqlite::Connection, Settings) {
        let home = std::env::temp_dir().join(format!("pantry-doctor-{}", Uuid::now_v7()));
        std::fs::create_dir_all(&home).expect("home");
        let settings = Settings::for_home(&home);
        let conn = db::open_connection(settings.db_path.to_str().expect("utf8")).expect("db");
        (conn, settings)
    }

    fn status_of(report: &super::DoctorReport, name: &str) -> DoctorStatus {
        report
            .checks
            .iter()
            .find(|check| check.name == name)
            .map(|check| check.status)
            .expect("check should be present")
    }

    #[test]
    fn fresh_store_warns_about_pending_defaults() {
        let (conn, settings) = open();
        let report = run_doctor(&conn, &settings).expect("doctor should run");
        assert_eq!(report.failure_count(), 0);
        assert_eq!(status_of(&report, "schema"), DoctorStatus::Pass);
        assert_eq!(status_of(&report, "dataset"), DoctorStatus::Warn);
        assert_eq!(status_of(&report, "duplicates"), DoctorStatus::Pass);
    }

    #[test]
    fn held_lock_and_inconsistent_ratios_are_reported() {
        let (conn, settings) = open();
        let facts = vec![
            ConversionFact::new(1.0, Unit::Cup, 120.0, Unit::Gram).expect("fact"),
            ConversionFact::new(1.0, Unit::Tablespoon, 8.0, Unit::Gram).expect("fact"),
        ];
        db::insert_ingredient(
            &conn,
            &Ingredient {
                id: "x".to_string(),
                default_id: None,
                name: "Cocoa".to_string(),
                category: None,
                brand: None,
                is_custom: true,
                is_favorite: false,
                last_used_at: None,
                created_at: time::OffsetDateTime::now_utc(),
                facts,
            },
        )
        .expect("insert");
        let _held = FileLock::try_acquire(&settings.lock_path())
            .expect("lock")
            .expect("free");

        let report = run_doctor(&conn, &settings).expect("doctor should run");
        assert_eq!(status_of(&report, "lock_health"), DoctorStatus::Warn);
        assert_eq!(status_of(&report, "ratios"), DoctorStatus::Warn);
        let detail = &report
            .checks
            .iter()
            .find(|check| check.name == "ratios")
            .expect("ratios check")
            .detail;
        assert!(detail.contains("Cocoa: cup -> tablespoon"));
    }
}
