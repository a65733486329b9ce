use std::path::PathBuf;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::{Args, CommandFactory, Parser, Subcommand};

fn cli_styles() -> Styles {
    Styles::styled()
        .header(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::BrightYellow.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightGreen.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::BrightMagenta.on_default())
}

pub fn styled_command() -> clap::Command {
    Cli::command()
}

#[derive(Debug, Parser)]
#[command(name = "pantry")]
#[command(bin_name = "pantry")]
#[command(version)]
#[command(about = "Ingredient unit conversions backed by a versioned default dataset")]
#[command(styles = cli_styles())]
pub struct Cli {
    #[arg(
        short = 'd',
        long,
        env = "PANTRY_DB_PATH",
        help = "Path to the SQLite ingredient registry (default: <home>/pantry.sqlite)."
    )]
    pub db: Option<PathBuf>,

    #[arg(
        short = 'H',
        long,
        env = "PANTRY_HOME",
        default_value = ".pantry",
        help = "Directory holding the registry, config and lock files."
    )]
    pub home: PathBuf,

    #[arg(
        short = 'c',
        long,
        env = "PANTRY_CONFIG",
        help = "Config file (default: <home>/pantry.toml when present)."
    )]
    pub config: Option<PathBuf>,

    #[arg(short = 'v', long, global = true, help = "Log debug output to stderr.")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Apply the default dataset and remove duplicate defaults.")]
    Reconcile(ReconcileArgs),
    #[command(about = "Show registry and dataset state.")]
    Status(JsonArgs),
    #[command(about = "List ingredients.")]
    Ls(ListArgs),
    #[command(about = "Show one ingredient and its conversions.")]
    Show(ShowArgs),
    #[command(about = "Convert an amount between units for one ingredient.")]
    Convert(ConvertArgs),
    #[command(about = "Create a custom ingredient.")]
    New(NewArgs),
    #[command(about = "Manage conversions of a custom ingredient.")]
    Fact(FactArgs),
    #[command(about = "Mark an ingredient as favorite.")]
    Fav(TargetArgs),
    #[command(about = "Clear an ingredient's favorite flag.")]
    Unfav(TargetArgs),
    #[command(about = "Record that an ingredient was just used.")]
    Use(TargetArgs),
    #[command(about = "Delete an ingredient and its conversions.")]
    Rm(TargetArgs),
    #[command(about = "List the fixed units and their abbreviations.")]
    Units(JsonArgs),
    #[command(about = "Run registry and dataset health checks.")]
    Doctor(JsonArgs),
    #[command(about = "Print shell completions.")]
    Completions(CompletionsArgs),
}

impl Commands {
    /// Commands that read or edit ingredients see an up-to-date registry.
    pub fn reconciles_on_launch(&self) -> bool {
        matches!(
            self,
            Commands::Ls(_)
                | Commands::Show(_)
                | Commands::Convert(_)
                | Commands::New(_)
                | Commands::Fact(_)
                | Commands::Fav(_)
                | Commands::Unfav(_)
                | Commands::Use(_)
                | Commands::Rm(_)
        )
    }
}

#[derive(Debug, Args)]
pub struct JsonArgs {
    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    #[arg(
        long,
        env = "PANTRY_DATASET",
        help = "Dataset JSON to apply instead of the bundled defaults."
    )]
    pub dataset: Option<PathBuf>,

    #[arg(long, help = "Re-apply even when the dataset version is not newer.")]
    pub force: bool,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(short = 'f', long, help = "Only favorites.")]
    pub favorites: bool,

    #[arg(long, conflicts_with = "defaults", help = "Only custom ingredients.")]
    pub custom: bool,

    #[arg(long, help = "Only ingredients from the default dataset.")]
    pub defaults: bool,

    #[arg(long, help = "Only this category (case-insensitive).")]
    pub category: Option<String>,

    #[arg(short = 'q', long, help = "Name substring (case-insensitive).")]
    pub query: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[arg(help = "Ingredient id, id prefix, or name.")]
    pub ingredient: String,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ConvertArgs {
    #[arg(help = "Amount to convert.")]
    pub amount: f64,

    #[arg(help = "Source unit (cup, tbsp, g, count:egg/eggs, ...).")]
    pub from: String,

    #[arg(help = "Target unit.")]
    pub to: String,

    #[arg(help = "Ingredient id, id prefix, or name.")]
    pub ingredient: String,

    #[arg(short = 'e', long, help = "Show which resolution stage produced the result.")]
    pub explain: bool,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct NewArgs {
    #[arg(help = "Ingredient name.")]
    pub name: String,

    #[arg(long, help = "Optional category.")]
    pub category: Option<String>,

    #[arg(long, help = "Optional brand.")]
    pub brand: Option<String>,

    #[arg(short = 'j', long, help = "Render machine-readable JSON.")]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct FactArgs {
    #[command(subcommand)]
    pub command: FactSubcommands,
}

#[derive(Debug, Subcommand)]
pub enum FactSubcommands {
    #[command(about = "Add a conversion, e.g. `fact add flour 1 cup 120 g`.")]
    Add(FactAddArgs),
    #[command(about = "Remove a conversion by its number in `show`.")]
    Rm(FactRmArgs),
}

#[derive(Debug, Args)]
pub struct FactAddArgs {
    pub ingredient: String,
    pub from_amount: f64,
    pub from_unit: String,
    pub to_amount: f64,
    pub to_unit: String,
}

#[derive(Debug, Args)]
pub struct FactRmArgs {
    pub ingredient: String,
    #[arg(help = "1-based conversion number.")]
    pub index: usize,
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    #[arg(help = "Ingredient id, id prefix, or name.")]
    pub ingredient: String,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    #[arg(help = "Shell name (bash, zsh, fish, elvish, powershell). Auto-detected if omitted.")]
    pub shell: Option<String>,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
