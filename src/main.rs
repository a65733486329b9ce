mod app;
mod cli;
mod completions;
mod config;
mod convert;
mod dataset;
mod db;
mod doctor;
mod domain;
mod locks;
mod logging;
mod reconcile;
mod ui;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), app::AppError> {
    let rendered = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

fn run() -> Result<(), app::AppError> {
    use clap::Parser;
    use cli::{Commands, FactSubcommands};

    let cli = cli::Cli::parse();
    if let Commands::Completions(args) = &cli.command {
        return completions::run_completions_command(args.shell.as_deref());
    }

    let dataset_path = match &cli.command {
        Commands::Reconcile(args) => args.dataset.clone(),
        _ => None,
    };
    let settings = config::Settings::resolve(&config::Overrides {
        home: cli.home.clone(),
        db_path: cli.db.clone(),
        config_path: cli.config.clone(),
        dataset_path,
    })?;
    logging::init(cli.verbose, settings.log_level);

    let app = app::App::open(settings)?;
    log::debug!(
        "home={} db={}",
        app.settings().home.display(),
        app.settings().db_path.display()
    );
    if cli.command.reconciles_on_launch() {
        let report = app.reconcile_on_launch()?;
        if report.outcome != reconcile::Outcome::UpToDate || report.removed_duplicates > 0 {
            log::info!(
                "launch reconcile: {} (inserted {}, updated {}, duplicates removed {})",
                report.outcome.as_str(),
                report.inserted,
                report.updated,
                report.removed_duplicates
            );
        }
    }

    match cli.command {
        Commands::Reconcile(args) => {
            let dataset = app.load_dataset(None)?;
            let report = app.reconcile(&dataset, args.force)?;
            if args.json {
                print_json(&report)?;
            } else {
                ui::print_reconcile_report(&report);
            }
        }
        Commands::Status(args) => {
            let status = app.status()?;
            if args.json {
                print_json(&status)?;
            } else {
                ui::print_status(&status);
            }
        }
        Commands::Ls(args) => {
            let filter = app::ListFilter {
                favorites_only: args.favorites,
                custom: match (args.custom, args.defaults) {
                    (true, _) => Some(true),
                    (false, true) => Some(false),
                    (false, false) => None,
                },
                category: args.category,
                query: args.query,
            };
            let ingredients = app.list(&filter)?;
            if args.json {
                print_json(&ingredients)?;
            } else {
                ui::print_ingredient_list(&ingredients, &filter);
            }
        }
        Commands::Show(args) => {
            let ingredient = app.show(&args.ingredient)?;
            if args.json {
                print_json(&ingredient)?;
            } else {
                ui::print_ingredient(&ingredient);
            }
        }
        Commands::Convert(args) => {
            match app.convert(args.amount, &args.from, &args.to, &args.ingredient) {
                Ok(conversion) if args.json => print_json(&conversion)?,
                Ok(conversion) => ui::print_conversion(&conversion, args.explain),
                Err(app::AppError::Conversion(convert::ConversionError::NoPath { from, to })) => {
                    if args.json {
                        print_json(&serde_json::json!({
                            "ingredient": args.ingredient,
                            "amount": args.amount,
                            "from": from,
                            "to": to,
                            "value": null,
                        }))?;
                    } else {
                        ui::print_no_conversion(&from, &to, &args.ingredient);
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Commands::New(args) => {
            let ingredient = app.create_custom(
                &args.name,
                args.category.as_deref(),
                args.brand.as_deref(),
            )?;
            if args.json {
                print_json(&ingredient)?;
            } else {
                println!("created {} {}", ingredient.id, ingredient.name);
            }
        }
        Commands::Fact(args) => match args.command {
            FactSubcommands::Add(add) => {
                let ingredient = app.add_fact(
                    &add.ingredient,
                    add.from_amount,
                    &add.from_unit,
                    add.to_amount,
                    &add.to_unit,
                )?;
                ui::print_ingredient(&ingredient);
            }
            FactSubcommands::Rm(rm) => {
                let ingredient = app.remove_fact(&rm.ingredient, rm.index)?;
                ui::print_ingredient(&ingredient);
            }
        },
        Commands::Fav(args) => {
            let ingredient = app.set_favorite(&args.ingredient, true)?;
            println!("★ {}", ingredient.name);
        }
        Commands::Unfav(args) => {
            let ingredient = app.set_favorite(&args.ingredient, false)?;
            println!("unfavorited {}", ingredient.name);
        }
        Commands::Use(args) => {
            let ingredient = app.mark_used(&args.ingredient)?;
            println!("used {}", ingredient.name);
        }
        Commands::Rm(args) => {
            let ingredient = app.delete(&args.ingredient)?;
            println!("deleted {} {}", ingredient.id, ingredient.name);
        }
        Commands::Units(args) => {
            let units = app::App::units();
            if args.json {
                print_json(&units)?;
            } else {
                ui::print_units(&units);
            }
        }
        Commands::Doctor(args) => {
            let report = app.doctor()?;
            if args.json {
                print_json(&report)?;
            } else {
                ui::print_doctor_report(&report);
            }
            if report.failure_count() > 0 {
                return Err(app::AppError::InvalidArgument(format!(
                    "doctor found {} failing check(s)",
                    report.failure_count()
                )));
            }
        }
        Commands::Completions(_) => {}
    }

    Ok(())
}
