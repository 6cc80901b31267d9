use anyhow::Result;
use chrono::Local;
use dayahead_forecaster::{config, controller, telemetry};
use config::Config;
use controller::{DayAheadRequest, DayAheadRunner};
use telemetry::init_tracing;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    let runner = DayAheadRunner::from_config(&cfg);

    let date = cfg.forecast.date.unwrap_or_else(|| Local::now().date_naive());
    let request = DayAheadRequest::new(cfg.forecast.robustness, cfg.forecast.strategy, date)
        .with_previous_days(cfg.forecast.previous_days);

    info!(
        %date,
        strategy = %request.strategy,
        network = %cfg.grid.network,
        "starting day-ahead forecaster"
    );

    tokio::select! {
        result = runner.run_day_ahead(&request) => match result {
            Ok(outcome) => {
                info!(
                    objective = outcome.objective,
                    archived = outcome.archive_written,
                    "day-ahead run complete"
                );
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }
            Err(e) => {
                error!(phase = %e.phase(), quantity = ?e.quantity(), error = %e, "day-ahead run failed");
                return Err(e.into());
            }
        },
        _ = telemetry::shutdown_signal() => {
            warn!("run interrupted before completion");
        }
    }

    Ok(())
}
