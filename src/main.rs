mod actions;
mod app;
mod cli;
mod component;
mod config;
mod focus;
mod form;
mod libs;
mod page;
mod tui;
mod utils;

use app::{App, RootState};
use clap::Parser;
use color_eyre::eyre::{Context, Result};
use dotenv::dotenv;
use tracing::info;

#[cfg(not(tarpaulin_include))]
async fn run() -> Result<()> {
    use cli::ClapSource;

    let args = cli::Cli::parse();

    let config = crate::config::Config::new(Some(ClapSource::new(&args)))
        .context("Error when loading config")?;
    info!(
        debounce_ms = config.widget.debounce_ms,
        minimum_length = config.widget.minimum_length,
        maximum_suggestions = config.widget.maximum_suggestions,
        policy = %config.widget.result_policy,
        "config loaded"
    );

    let state = RootState::new(config);
    let mut app = App::new(
        state,
        tui::Tui::new()?
            .tick_rate(args.tick_rate)
            .frame_rate(args.frame_rate),
    )
    .context("Error when building the form")?;

    app.run().await?;
    Ok(())
}

#[tokio::main]
#[cfg(not(tarpaulin_include))]
async fn main() -> Result<()> {
    dotenv().ok();
    utils::errors::init()?;
    utils::logging::init()?;

    run().await
}
