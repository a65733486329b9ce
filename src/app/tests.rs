use std::path::PathBuf;

use uuid::Uuid;

use super::{App, AppError, ListFilter};
use crate::config::Settings;
use crate::convert::{ConversionError, Stage};
use crate::dataset::Dataset;
use crate::locks::FileLock;
use crate::reconcile::Outcome;

fn unique_home() -> PathBuf {
    let root = std::env::temp_dir().join(format!("pantry-app-test-{}", Uuid::now_v7()));
    std::fs::create_dir_all(&root).expect("temp home should be creatable");
    root
}

fn open_app() -> App {
    App::open(Settings::for_home(&unique_home())).expect("app should open")
}

fn loaded_app() -> App {
    let app = open_app();
    let report = app.reconcile_on_launch().expect("launch reconcile should succeed");
    assert_eq!(report.outcome, Outcome::FirstLoad);
    app
}

#[test]
fn launch_reconcile_loads_bundled_defaults_once() {
    let app = open_app();
    let before = app.status().expect("status should succeed");
    assert!(!before.defaults_loaded);
    assert!(before.update_pending);
    assert_eq!(before.ingredients, 0);

    let first = app.reconcile_on_launch().expect("first launch");
    assert_eq!(first.outcome, Outcome::FirstLoad);
    assert!(first.inserted > 0);

    let second = app.reconcile_on_launch().expect("second launch");
    assert_eq!(second.outcome, Outcome::UpToDate);
    assert_eq!(second.inserted, 0);

    let after = app.status().expect("status should succeed");
    assert!(after.defaults_loaded);
    assert!(!after.update_pending);
    assert_eq!(after.applied_version, Some(1));
    assert_eq!(after.ingredients, first.inserted as i64);
    assert_eq!(after.custom, 0);
    assert_eq!(after.defaults, after.ingredients);
}

#[test]
fn convert_uses_facts_and_marks_the_ingredient_used() {
    let app = loaded_app();

    let direct = app
        .convert(2.0, "cups", "g", "All-purpose flour")
        .expect("conversion should succeed");
    assert_eq!(direct.value, 240.0);
    assert_eq!(direct.stage, Stage::DirectFact);
    assert_eq!(direct.text, "2 cups = 240 grams");

    let reverse = app
        .convert(240.0, "gram", "cup", "all-purpose FLOUR")
        .expect("reverse conversion should succeed");
    assert!((reverse.value - 2.0).abs() < 1e-9);
    assert_eq!(reverse.stage, Stage::ReverseFact);

    let same_family = app
        .convert(1.0, "cup", "tbsp", "All-purpose flour")
        .expect("same family conversion should succeed");
    assert_eq!(same_family.stage, Stage::SameFamily);
    assert!((same_family.value - 16.0).abs() < 1e-9);

    let shown = app.show("All-purpose flour").expect("show should succeed");
    assert!(shown.last_used_at.is_some());
}

#[test]
fn convert_reports_missing_paths_and_rejects_bad_amounts() {
    let app = loaded_app();
    let created = app
        .create_custom("Mystery powder", None, None)
        .expect("create should succeed");

    let err = app
        .convert(1.0, "cup", "gram", &created.id)
        .expect_err("no facts means no path");
    assert!(matches!(
        err,
        AppError::Conversion(ConversionError::NoPath { .. })
    ));
    let shown = app.show(&created.id).expect("show should succeed");
    assert!(shown.last_used_at.is_none());

    let err = app
        .convert(0.0, "cup", "gram", &created.id)
        .expect_err("zero amount should be rejected");
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[test]
fn custom_ingredients_accept_fact_edits() {
    let app = loaded_app();
    let created = app
        .create_custom("  Grandma's blend ", Some("Flour"), Some(" "))
        .expect("create should succeed");
    assert_eq!(created.name, "Grandma's blend");
    assert!(created.is_custom);
    assert!(created.default_id.is_none());
    assert_eq!(created.category.as_deref(), Some("Flour"));
    assert!(created.brand.is_none());

    let updated = app
        .add_fact(&created.id, 1.0, "cup", 130.0, "g")
        .expect("fact should be added");
    assert_eq!(updated.facts.len(), 1);
    let updated = app
        .add_fact("grandma's blend", 1.0, "count:scoop/scoops", 30.0, "gram")
        .expect("fact should be added by name");
    assert_eq!(updated.facts.len(), 2);
    assert_eq!(updated.facts[1].index, 2);

    let converted = app
        .convert(2.0, "count:scoop/scoops", "cup", &created.id)
        .expect("chained conversion should succeed");
    assert_eq!(converted.stage, Stage::Chained);
    assert!((converted.value - 60.0 / 130.0).abs() < 1e-9);

    let trimmed = app
        .remove_fact(&created.id, 1)
        .expect("fact should be removed");
    assert_eq!(trimmed.facts.len(), 1);
    assert!(trimmed.facts[0].text.contains("scoop"));

    let err = app
        .remove_fact(&created.id, 5)
        .expect_err("out of range index should fail");
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[test]
fn fact_edits_are_rejected_for_default_records() {
    let app = loaded_app();
    let err = app
        .add_fact("Butter", 1.0, "cup", 200.0, "gram")
        .expect_err("defaults are read-only");
    assert!(matches!(err, AppError::ReadOnlyDefault(name) if name == "Butter"));

    let err = app
        .remove_fact("Butter", 1)
        .expect_err("defaults are read-only");
    assert!(matches!(err, AppError::ReadOnlyDefault(_)));

    let err = app
        .add_fact("Butter", 1.0, "cup", 2.0, "cups")
        .expect_err("same unit facts are rejected first");
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[test]
fn duplicate_custom_names_are_rejected_but_may_shadow_defaults() {
    let app = loaded_app();
    app.create_custom("Butter", Some("Fat"), Some("Farm"))
        .expect("a custom record may share a default's name");
    let err = app
        .create_custom("butter", None, None)
        .expect_err("second custom with the same name should fail");
    assert!(matches!(err, AppError::InvalidArgument(_)));

    let err = app.show("Butter").expect_err("name now matches two records");
    match err {
        AppError::Ambiguous { key, candidates } => {
            assert_eq!(key, "Butter");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected Ambiguous, got {other:?}"),
    }
}

#[test]
fn favorites_usage_and_deletion_round_trip() {
    let app = loaded_app();
    let fav = app.set_favorite("Honey", true).expect("fav should succeed");
    assert!(fav.is_favorite);

    let favorites = app
        .list(&ListFilter {
            favorites_only: true,
            ..ListFilter::default()
        })
        .expect("list should succeed");
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].name, "Honey");

    let used = app.mark_used("Honey").expect("use should succeed");
    assert!(used.last_used_at.is_some());

    let unfav = app.set_favorite(&used.id, false).expect("unfav should succeed");
    assert!(!unfav.is_favorite);

    let deleted = app.delete(&used.id).expect("delete should succeed");
    assert_eq!(deleted.name, "Honey");
    let err = app.show("Honey").expect_err("deleted record is gone");
    assert!(matches!(err, AppError::NotFound(_)));
}

#[test]
fn deleted_defaults_are_not_restored_until_the_dataset_changes() {
    let app = loaded_app();
    app.delete("Honey").expect("delete should succeed");
    let report = app.reconcile_on_launch().expect("launch reconcile");
    assert_eq!(report.outcome, Outcome::UpToDate);
    assert!(matches!(app.show("Honey"), Err(AppError::NotFound(_))));

    let bundled = Dataset::bundled().expect("bundled dataset");
    let forced = app.reconcile(&bundled, true).expect("forced reconcile");
    assert_eq!(forced.outcome, Outcome::Forced);
    assert_eq!(forced.inserted, 1);
    assert!(app.show("Honey").is_ok());
}

#[test]
fn list_filters_combine() {
    let app = loaded_app();
    app.create_custom("Oat flour", Some("flour"), None)
        .expect("create should succeed");

    let flours = app
        .list(&ListFilter {
            category: Some("FLOUR".to_string()),
            ..ListFilter::default()
        })
        .expect("list should succeed");
    assert!(flours.len() > 1);
    assert!(flours
        .iter()
        .all(|item| item.category.as_deref().map(str::to_lowercase) == Some("flour".into())));

    let custom_flours = app
        .list(&ListFilter {
            custom: Some(true),
            query: Some("oat".to_string()),
            ..ListFilter::default()
        })
        .expect("list should succeed");
    assert_eq!(custom_flours.len(), 1);
    assert_eq!(custom_flours[0].name, "Oat flour");

    let defaults = app
        .list(&ListFilter {
            custom: Some(false),
            query: Some("oat".to_string()),
            ..ListFilter::default()
        })
        .expect("list should succeed");
    assert!(defaults.iter().all(|item| !item.is_custom));
}

#[test]
fn blank_lookups_and_names_are_invalid() {
    let app = loaded_app();
    assert!(matches!(app.show("  "), Err(AppError::InvalidArgument(_))));
    assert!(matches!(
        app.create_custom(" ", None, None),
        Err(AppError::InvalidArgument(_))
    ));
    assert!(matches!(
        app.convert(1.0, " ", "gram", "Butter"),
        Err(AppError::Unit(_))
    ));
}

#[test]
fn edits_wait_for_the_registry_lock() {
    let home = unique_home();
    let mut settings = Settings::for_home(&home);
    settings.lock_timeout = std::time::Duration::from_millis(50);
    let app = App::open(settings).expect("app should open");
    let _held = FileLock::try_acquire(&app.settings().lock_path())
        .expect("lock dir should be creatable")
        .expect("lock should be free");

    let err = app
        .create_custom("Blocked", None, None)
        .expect_err("held lock should time out");
    assert!(matches!(err, AppError::Lock(_)));
    let err = app
        .reconcile_on_launch()
        .expect_err("reconcile also needs the lock");
    assert!(matches!(err, AppError::Reconcile(_)));
}

#[test]
fn units_cover_the_fixed_table() {
    let units = App::units();
    assert_eq!(units.len(), 15);
    assert!(units.iter().any(|unit| unit.token == "cup"));
}
