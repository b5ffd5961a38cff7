use std::{process::ExitCode, sync::Arc};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use citywx_core::{
    Config, FileStorage, LocationMode, PersistentStore, WeatherApp, WeatherService, location,
    provider,
};
use inquire::{CustomType, Password, PasswordDisplayMode, Select};

use crate::{
    interactive::{self, SessionEnd},
    render,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "citywx", version, about = "Current weather by city, with saved favorites")]
pub struct Cli {
    /// Print debug logs to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Without a subcommand, starts the interactive session.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key and how your location is found.
    Configure,

    /// Show the weather for a city.
    Show {
        /// City name, e.g. `New York` or `Paris,FR`.
        #[arg(required = true, num_args = 1..)]
        city: Vec<String>,
    },

    /// Show the weather at your current location.
    Here,

    /// Manage saved cities.
    Favorites {
        #[command(subcommand)]
        action: Option<FavoritesAction>,
    },

    /// Browse weather and favorites from a menu.
    Interactive,
}

#[derive(Debug, Subcommand)]
pub enum FavoritesAction {
    /// List saved cities.
    List,
    /// Save the city from the last lookup.
    Add,
    /// Remove a saved city by id.
    Remove { id: i64 },
    /// Show the weather for a saved city by id.
    Load { id: i64 },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command.unwrap_or(Command::Interactive) {
            Command::Configure => configure()?,
            Command::Show { city } => {
                let app = open_app(Access::Online)?;
                app.search(&city.join(" ")).await;
                print_report(&app)?;
            }
            Command::Here => {
                let app = open_app(Access::Online)?;
                app.search_by_location().await;
                print_report(&app)?;
            }
            Command::Favorites { action } => {
                let action = action.unwrap_or(FavoritesAction::List);
                let access = match action {
                    FavoritesAction::Load { .. } => Access::Online,
                    _ => Access::Offline,
                };
                favorites(&open_app(access)?, action).await?;
            }
            Command::Interactive => {
                let app = Arc::new(open_app(Access::Online)?);
                if let SessionEnd::Interrupted = interactive::run(app).await? {
                    return Ok(ExitCode::from(130));
                }
            }
        }

        Ok(ExitCode::SUCCESS)
    }
}

/// Whether a command needs to reach the weather service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Online,
    /// Only local state is touched; a missing API key is fine.
    Offline,
}

fn open_app(access: Access) -> anyhow::Result<WeatherApp> {
    let config = Config::load()?;
    build_app(&config, access)
}

fn build_app(config: &Config, access: Access) -> anyhow::Result<WeatherApp> {
    let service: Box<dyn WeatherService> = match (provider::service_from_config(config), access) {
        (Ok(service), _) => service,
        (Err(e), Access::Online) => return Err(e),
        (Err(e), Access::Offline) => {
            tracing::debug!(error = %e, "no weather service, continuing with local data");
            Box::new(provider::Unconfigured)
        }
    };
    let location = location::source_from_config(&config.location);

    let data_dir = config.resolved_data_dir()?;
    tracing::debug!(data_dir = %data_dir.display(), "using data directory");
    let store = PersistentStore::new(Arc::new(FileStorage::new(data_dir)));

    Ok(WeatherApp::new(Arc::from(service), Arc::from(location), store))
}

fn print_report(app: &WeatherApp) -> anyhow::Result<()> {
    let state = app.snapshot();
    if let Some(error) = state.error {
        bail!(error);
    }
    if let Some(report) = &state.report {
        print!("{}", render::report(report, state.is_current_favorite()));
    }
    Ok(())
}

async fn favorites(app: &WeatherApp, action: FavoritesAction) -> anyhow::Result<()> {
    match action {
        FavoritesAction::List => print!("{}", render::favorites(&app.snapshot().favorites)),
        FavoritesAction::Add => {
            let state = app.snapshot();
            let Some(report) = &state.report else {
                bail!("No weather report to save.\nHint: run `citywx show <city>` first.");
            };
            let label = render::city_label(&report.name, &report.country);
            if app.add_favorite() {
                println!("Saved {label}.");
            } else {
                println!("{label} is already saved.");
            }
        }
        FavoritesAction::Remove { id } => {
            if app.remove_favorite(id) {
                println!("Removed city {id}.");
            } else {
                println!("No saved city with id {id}.");
            }
        }
        FavoritesAction::Load { id } => {
            let Some(city) = app.snapshot().favorites.find(id).cloned() else {
                bail!("No saved city with id {id}.\nHint: run `citywx favorites list`.");
            };
            app.load_favorite(&city.name).await;
            print_report(app)?;
        }
    }
    Ok(())
}

fn configure() -> anyhow::Result<()> {
    let path = Config::config_file_path()?;
    let mut config = Config::load_from(&path)?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .with_help_message("Get one at https://openweathermap.org/api")
        .prompt()
        .context("Failed to read API key")?;
    if !api_key.trim().is_empty() {
        config.set_api_key(api_key);
    }

    let modes = LocationMode::all().to_vec();
    let start = modes
        .iter()
        .position(|m| *m == config.location.mode)
        .unwrap_or(0);
    let mode = Select::new("How should your location be found?", modes)
        .with_starting_cursor(start)
        .prompt()
        .context("Failed to read location mode")?;
    config.location.mode = mode;

    if mode == LocationMode::Fixed {
        let latitude = CustomType::<f64>::new("Latitude:")
            .with_error_message("Please enter a number, e.g. 59.91")
            .prompt()
            .context("Failed to read latitude")?;
        let longitude = CustomType::<f64>::new("Longitude:")
            .with_error_message("Please enter a number, e.g. 10.75")
            .prompt()
            .context("Failed to read longitude")?;
        config.location.latitude = Some(latitude);
        config.location.longitude = Some(longitude);
    }

    config.save_to(&path)?;
    println!("Configuration saved to {}", path.display());
    Ok(())
}
