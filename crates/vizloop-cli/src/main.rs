//! Headless runner for Vizloop demos.
//!
//! Loads settings, mounts one demo on a scheduler, runs it for the
//! configured budget (or until the demo halts), and prints the run
//! summary as JSON on stdout. Logs go to stderr.
//!
//! # Usage
//!
//! ```text
//! vizloop [life|mpc|attention]
//! ```
//!
//! The optional argument overrides `run.demo` from the settings file.
//! Settings are read from `vizloop.yaml`, or from the path in
//! `VIZLOOP_CONFIG`; a missing file means defaults.

mod error;
mod run;
mod settings;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    info!("vizloop starting");

    let path = settings::config_path();
    let mut settings = Settings::load_or_default(&path)
        .with_context(|| format!("loading {}", path.display()))?;
    if let Some(name) = std::env::args().nth(1) {
        settings.run.demo = name.parse()?;
    }
    info!(
        demo = %settings.run.demo,
        duration_ms = settings.run.duration_ms,
        tick_rate_ms = settings.scheduler.tick_rate_ms,
        log_capacity = settings.scheduler.log_capacity,
        "Configuration loaded"
    );

    let report = run::run_demo(&settings).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!("vizloop finished");
    Ok(())
}
