mod cli;
mod errors;
mod setup;
mod view;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use fourcast_core::{AppError, Config};
use fourcast_services::{CurrentLocationOutcome, LocationSyncService, SearchOutcome, SyncError};
use fourcast_weather::Coordinate;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command};
use crate::errors::to_app_error;
use crate::view::{render, temperature_text, SavedListView};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    fourcast_core::init()?;

    let (config, _) = Config::load_validated()?;
    let service = Arc::new(setup::build_service(&config).await?);

    tracing::info!("Fourcast started");

    match run(cli, &config, service).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::debug!("Command failed: {}", e);
            eprintln!("Error: {}", e.user_message());
            eprintln!("  {}", e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli, config: &Config, service: Arc<LocationSyncService>) -> Result<(), AppError> {
    match cli.command {
        Command::Search { city, save } => search(&service, &city, save, cli.json).await,
        Command::Save { city, lat, lon } => {
            let id = service
                .save(&city, Coordinate::new(lat, lon))
                .await
                .map_err(to_app_error)?;
            println!("Saved '{}' as location {}", city.trim(), id);
            Ok(())
        }
        Command::List => {
            let snapshot = service.current_snapshot().await.map_err(to_app_error)?;
            if cli.json {
                print_json(&snapshot)
            } else {
                print!("{}", render(&snapshot));
                Ok(())
            }
        }
        Command::Refresh { watch } => refresh(service, watch, cli.json).await,
        Command::Delete { id } => {
            service.delete(id).await.map_err(to_app_error)?;
            println!("Deleted location {}", id);
            Ok(())
        }
        Command::Here => here(&service, config).await,
    }
}

async fn search(
    service: &LocationSyncService,
    city: &str,
    save: bool,
    json: bool,
) -> Result<(), AppError> {
    let result = match service.search(city).await.map_err(to_app_error)? {
        SearchOutcome::Found(result) => result,
        SearchOutcome::NotFound => {
            println!("No place found for '{}'", city.trim());
            return Ok(());
        }
    };

    if json {
        print_json(&result)?;
    } else {
        println!(
            "{} ({}): {}  {}",
            result.query,
            result.coordinate,
            temperature_text(Some(&result.reading)),
            result.reading.condition.description()
        );
    }

    if save {
        let id = service
            .save_search_result(&result)
            .await
            .map_err(to_app_error)?;
        println!("Saved as location {}", id);
    }
    Ok(())
}

async fn refresh(
    service: Arc<LocationSyncService>,
    watch: Option<u64>,
    json: bool,
) -> Result<(), AppError> {
    let mut view = SavedListView::new(service.clone());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted; cancelling refresh");
                cancel.cancel();
            }
        });
    }

    loop {
        match service.refresh_all(&cancel).await {
            Ok(batch) if json => print_json(&batch)?,
            Ok(_) => {
                if let Some(frame) = view.next_frame().await.map_err(to_app_error)? {
                    print!("{}", frame);
                }
            }
            Err(SyncError::Cancelled) => {
                println!("Refresh cancelled");
                return Ok(());
            }
            Err(e) => return Err(to_app_error(e)),
        }

        let Some(secs) = watch else {
            return Ok(());
        };
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(Duration::from_secs(secs.max(1))) => {}
        }
    }
}

async fn here(service: &LocationSyncService, config: &Config) -> Result<(), AppError> {
    let locator = setup::locator(&config.location);
    match service
        .current_location_weather(locator.as_ref())
        .await
        .map_err(to_app_error)?
    {
        CurrentLocationOutcome::Weather {
            coordinate,
            reading,
        } => {
            println!(
                "Current location ({}): {}  {}",
                coordinate,
                temperature_text(Some(&reading)),
                reading.condition.description()
            );
        }
        CurrentLocationOutcome::PermissionDenied => {
            println!("Location permission not granted. Set [location] in the config file to enable.");
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    println!("{}", text);
    Ok(())
}
