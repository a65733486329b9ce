use log::LevelFilter;

pub const LOG_ENV: &str = "PANTRY_LOG";

/// Installs the stderr logger. `PANTRY_LOG` beats the configured level and
/// `--verbose` beats both.
pub fn init(verbose: bool, configured: Option<LevelFilter>) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(configured.unwrap_or(LevelFilter::Warn))
        .format_target(false)
        .format_timestamp(None);
    if let Ok(filters) = std::env::var(LOG_ENV) {
        builder.parse_filters(&filters);
    }
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    let _ = builder.try_init();
}
