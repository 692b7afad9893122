//! Mount the selected demo on a scheduler and run it headless.

use serde::Serialize;
use tracing::info;
use vizloop_core::config::SimulationConfig;
use vizloop_core::runner::run_for;
use vizloop_core::scheduler::SimulationScheduler;
use vizloop_demos::{DemoKind, attention, life, mpc};

use crate::error::CliError;
use crate::settings::Settings;

/// Run the demo named in `settings.run` and return its summary as JSON.
///
/// # Errors
///
/// Returns [`CliError`] if the demo settings are invalid or the summary
/// cannot be serialized.
pub async fn run_demo(settings: &Settings) -> Result<serde_json::Value, CliError> {
    info!(
        demo = %settings.run.demo,
        duration_ms = settings.run.duration_ms,
        tick_rate_ms = settings.scheduler.tick_rate_ms,
        "Mounting demo"
    );
    match settings.run.demo {
        DemoKind::Life => {
            let config = life::simulation(&settings.life, &settings.scheduler)?;
            summarize(config, settings).await
        }
        DemoKind::Mpc => {
            let config = mpc::simulation(&settings.mpc, &settings.scheduler)?;
            summarize(config, settings).await
        }
        DemoKind::Attention => {
            let config = attention::simulation(&settings.attention, &settings.scheduler)?;
            summarize(config, settings).await
        }
    }
}

async fn summarize<S, L>(
    config: SimulationConfig<S, L>,
    settings: &Settings,
) -> Result<serde_json::Value, CliError>
where
    S: Clone + Send + Serialize + 'static,
    L: Clone + Send + Serialize + 'static,
{
    let scheduler = SimulationScheduler::new(config)?;
    let summary = run_for(scheduler, settings.run.duration()).await;
    Ok(serde_json::to_value(&summary)?)
}
