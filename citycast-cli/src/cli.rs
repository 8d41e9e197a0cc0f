use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use anyhow::Context;
use citycast_core::{CityOrchestrator, Config, MainQueue, config::API_KEY_ENV};
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{InquireError, Password, PasswordDisplayMode, Text};
use tracing::debug;

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "citycast", version, about = "City weather and tourist places")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key in the config file.
    Configure {
        /// Key to store; prompted for when omitted.
        #[arg(long)]
        key: Option<String>,
    },

    /// Show weather and tourist places for a city.
    Show {
        /// City name; the configured default city when omitted.
        city: Option<String>,

        #[arg(long, value_enum, default_value_t = View::All)]
        view: View,
    },

    /// Enter city names one after another.
    Explore,
}

/// Which screen(s) to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum View {
    Now,
    Forecast,
    Places,
    All,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { key } => configure(key),
            Command::Show { city, view } => show(city, view).await,
            Command::Explore => explore().await,
        }
    }
}

fn configure(key: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let key = match key {
        Some(key) => key,
        None => Password::new("OpenWeather API key:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?,
    };
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }

    config.set_api_key(key);
    let path = config.save()?;
    println!("Saved OpenWeather API key to {}", path.display());
    Ok(())
}

fn warn_if_unconfigured(config: &Config) {
    if config.api_key().is_none() {
        eprintln!(
            "No OpenWeather API key configured; weather will be unavailable.\n\
             Hint: run `citycast configure` or set {API_KEY_ENV}."
        );
    }
}

async fn show(city: Option<String>, view: View) -> anyhow::Result<()> {
    let config = Config::load()?;
    warn_if_unconfigured(&config);

    let orchestrator = CityOrchestrator::builder_from_config(&config)?.build();
    let city = city.unwrap_or_else(|| config.default_city());

    let report = orchestrator.run(city).await;
    debug!(
        "Run for '{}' finished: {:?} (weather updated: {}, places updated: {})",
        report.city, report.outcome, report.weather_updated, report.places_updated
    );
    render::render(&orchestrator.snapshot(), view);
    Ok(())
}

async fn explore() -> anyhow::Result<()> {
    let config = Config::load()?;
    warn_if_unconfigured(&config);

    let (queue, main_loop) = MainQueue::new();
    let orchestrator = CityOrchestrator::builder_from_config(&config)?
        .dispatcher(Arc::new(queue))
        .build();

    let dirty = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&dirty);
    orchestrator.subscribe(move |_| flag.store(true, Ordering::SeqCst));

    let mut handle = orchestrator.start();
    loop {
        handle.wait().await.context("Pipeline run panicked")?;
        main_loop.run_pending();
        if dirty.swap(false, Ordering::SeqCst) {
            render::render(&orchestrator.snapshot(), View::All);
        }

        let input = tokio::task::spawn_blocking(|| {
            Text::new("Change location:")
                .with_help_message("Esc or empty input to quit")
                .prompt()
        })
        .await?;

        let city = match input {
            Ok(city) if city.is_empty() => break,
            Ok(city) => city,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e).context("Failed to read city name"),
        };

        handle = orchestrator.set_city(city);
    }

    Ok(())
}
