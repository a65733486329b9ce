use std::io::{self, IsTerminal};

use crate::app::{ConversionView, IngredientView, ListFilter, StatusView, UnitView};
use crate::doctor::{DoctorReport, DoctorStatus};
use crate::domain::unit::Unit;
use crate::reconcile::ReconcileReport;

pub fn print_ingredient_list(ingredients: &[IngredientView], filter: &ListFilter) {
    let palette = Palette::auto();
    println!("{}", palette.heading("Ingredients"));
    if let Some(summary) = filter_summary(filter) {
        println!("{}", palette.dim(&format!("filters: {summary}")));
    }

    if ingredients.is_empty() {
        println!("{}", palette.dim("no ingredients matched"));
        return;
    }

    for ingredient in ingredients {
        println!("{}", format_ingredient_row(ingredient, &palette));
    }
    println!(
        "{}",
        palette.dim(&format!("{} ingredient(s)", ingredients.len()))
    );
}

fn format_ingredient_row(ingredient: &IngredientView, palette: &Palette) -> String {
    let marker = if ingredient.is_favorite { "★" } else { " " };
    let mut line = format!(
        "{} {} {}",
        palette.favorite(marker),
        palette.id(&ingredient.id),
        ingredient.name
    );
    if ingredient.is_custom {
        line.push(' ');
        line.push_str(&palette.custom("[custom]"));
    }
    if let Some(category) = ingredient.category.as_deref() {
        line.push(' ');
        line.push_str(&palette.category(&format!("({category})")));
    }
    if let Some(brand) = ingredient.brand.as_deref() {
        line.push(' ');
        line.push_str(&palette.dim(brand));
    }
    line
}

pub fn print_ingredient(ingredient: &IngredientView) {
    let palette = Palette::auto();
    println!("{}", palette.heading(&ingredient.name));
    println!("id: {}", palette.id(&ingredient.id));
    if let Some(default_id) = ingredient.default_id.as_deref() {
        println!("default id: {default_id}");
    }
    println!(
        "kind: {}",
        if ingredient.is_custom { "custom" } else { "default" }
    );
    if let Some(category) = ingredient.category.as_deref() {
        println!("category: {category}");
    }
    if let Some(brand) = ingredient.brand.as_deref() {
        println!("brand: {brand}");
    }
    println!("favorite: {}", if ingredient.is_favorite { "yes" } else { "no" });
    if let Some(last_used) = ingredient.last_used_at.as_deref() {
        println!("last used: {last_used}");
    }

    if ingredient.facts.is_empty() {
        println!("{}", palette.dim("no conversions"));
        return;
    }
    println!("conversions:");
    for fact in &ingredient.facts {
        println!("  {} {}", palette.dim(&format!("#{}", fact.index)), fact.text);
    }
}

pub fn print_conversion(conversion: &ConversionView, explain: bool) {
    println!("{}", conversion.text);
    if !explain {
        return;
    }
    let palette = Palette::auto();
    println!(
        "{}",
        palette.dim(&format!(
            "ingredient: {} · stage: {}",
            conversion.ingredient,
            conversion.stage.as_str()
        ))
    );
    if !conversion.path.is_empty() {
        let hops: Vec<String> = conversion.path.iter().map(ToString::to_string).collect();
        println!("{}", palette.dim(&format!("path: {}", hops.join(" → "))));
    }
}

pub fn print_no_conversion(from: &Unit, to: &Unit, ingredient: &str) {
    let palette = Palette::auto();
    println!(
        "{}",
        palette.dim(&format!(
            "no conversion available from {from} to {to} for {ingredient}"
        ))
    );
}

pub fn print_reconcile_report(report: &ReconcileReport) {
    let palette = Palette::auto();
    let version = |value: Option<i64>| value.map_or_else(|| "none".to_string(), |v| v.to_string());
    println!(
        "{} {} (version {} → {})",
        palette.heading("reconcile"),
        report.outcome.as_str(),
        version(report.from_version),
        version(report.to_version)
    );
    println!(
        "inserted {} · updated {} · renamed {} · duplicates removed {}",
        report.inserted, report.updated, report.renamed, report.removed_duplicates
    );
    if report.preserved_custom > 0 {
        println!("custom ingredients left untouched: {}", report.preserved_custom);
    }
    if report.skipped_facts > 0 || report.skipped_ingredients > 0 {
        println!(
            "{}",
            palette.warn(&format!(
                "skipped {} malformed conversion(s) and {} ingredient(s)",
                report.skipped_facts, report.skipped_ingredients
            ))
        );
    }
    if report.digest_changed {
        println!(
            "{}",
            palette.warn("dataset contents changed without a version bump; use --force to re-apply")
        );
    }
}

pub fn print_status(status: &StatusView) {
    let palette = Palette::auto();
    println!("{}", palette.heading("pantry status"));
    println!("home: {}", status.home);
    println!("database: {}", status.db_path);
    if let Some(config) = status.config_path.as_deref() {
        println!("config: {config}");
    }
    let applied = status
        .applied_version
        .map_or_else(|| "none".to_string(), |value| value.to_string());
    println!(
        "dataset: {} (version {}, applied {})",
        status.dataset_source, status.dataset_version, applied
    );
    if status.update_pending {
        println!("{}", palette.warn("dataset update pending"));
    }
    println!(
        "ingredients: {} ({} default, {} custom, {} favorite) · conversions: {}",
        status.ingredients, status.defaults, status.custom, status.favorites, status.facts
    );
}

pub fn print_units(units: &[UnitView]) {
    let palette = Palette::auto();
    for unit in units {
        println!(
            "{:<12} {:<6} {}",
            unit.token,
            unit.abbreviation,
            palette.dim(unit.family.as_str())
        );
    }
    println!(
        "{}",
        palette.dim("count units: count:egg/eggs · any other word is kept as-is")
    );
}

pub fn print_doctor_report(report: &DoctorReport) {
    let palette = Palette::auto();
    for check in &report.checks {
        let label = match check.status {
            DoctorStatus::Pass => palette.pass("PASS"),
            DoctorStatus::Warn => palette.warn("WARN"),
            DoctorStatus::Fail => palette.fail("FAIL"),
        };
        println!("{label} {}: {}", check.name, check.detail);
    }
}

fn filter_summary(filter: &ListFilter) -> Option<String> {
    let mut parts = Vec::new();
    if filter.favorites_only {
        parts.push("favorites=true".to_string());
    }
    match filter.custom {
        Some(true) => parts.push("kind=custom".to_string()),
        Some(false) => parts.push("kind=default".to_string()),
        None => {}
    }
    if let Some(category) = filter.category.as_deref().and_then(non_empty) {
        parts.push(format!("category={category}"));
    }
    if let Some(query) = filter.query.as_deref().and_then(non_empty) {
        parts.push(format!("query={query}"));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

fn non_empty(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

struct Palette {
    enabled: bool,
}

impl Palette {
    fn auto() -> Self {
        let enabled = std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal();
        Self { enabled }
    }

    fn paint(&self, code: &str, text: &str) -> String {
        if self.enabled {
            format!("\x1b[{code}m{text}\x1b[0m")
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        self.paint("1;36", text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint("2", text)
    }

    fn id(&self, text: &str) -> String {
        self.paint("1;94", text)
    }

    fn favorite(&self, text: &str) -> String {
        self.paint("33", text)
    }

    fn custom(&self, text: &str) -> String {
        self.paint("35", text)
    }

    fn category(&self, text: &str) -> String {
        self.paint("90", text)
    }

    fn pass(&self, text: &str) -> String {
        self.paint("32", text)
    }

    fn warn(&self, text: &str) -> String {
        self.paint("33", text)
    }

    fn fail(&self, text: &str) -> String {
        self.paint("31", text)
    }
}
