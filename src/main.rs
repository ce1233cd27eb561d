use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand};
use energy_insight::battery::BatteryAnalyzer;
use energy_insight::config::Config;
use energy_insight::domain::{OperationalSample, Station, WeatherSample};
use energy_insight::forecast::{
    CsvWeatherSource, ForecastEngine, ForecastInputs, OpenMeteoClient, WeatherSource,
};
use energy_insight::ingest::read_operational_csv;
use energy_insight::ml::{LinearForecastModel, SoftmaxDayModel};
use energy_insight::telemetry::{cancel_on_shutdown, init_tracing};
use energy_insight::PipelineError;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Open-Meteo serves at most this much history
const MAX_PAST_DAYS: i64 = 92;

#[derive(Parser)]
#[command(name = "energy-insight")]
#[command(
    about = "PV forecast and battery sizing analysis from station exports",
    long_about = None
)]
struct Cli {
    /// Pretty-print the JSON result
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Forecast PV power for every weather row from the start date on
    Forecast {
        /// First forecast day (YYYY-MM-DD), today by default
        #[arg(long)]
        from: Option<NaiveDate>,
    },
    /// Classify each day of battery operation
    Battery,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let cfg = Config::load()?;
    let station = cfg.station()?;

    let cancel = CancellationToken::new();
    let watcher = cancel_on_shutdown(cancel.clone());

    let operational = read_operational_csv(&cfg.data.operational_csv)?;
    info!(
        rows = operational.report.rows_parsed(),
        skipped = operational.report.rows_skipped,
        "operational data loaded"
    );
    let operational = operational.samples;
    let weather = load_weather(&cfg, &station, &operational).await?;

    let result = match cli.command {
        Command::Forecast { from } => {
            let forecast_start: NaiveDateTime = from
                .unwrap_or_else(|| Local::now().date_naive())
                .and_time(chrono::NaiveTime::MIN);
            let model = LinearForecastModel::load(&cfg.data.forecast_model)
                .map_err(PipelineError::from)?;
            let ratio = cfg.plant.performance_ratio;
            let capacity = cfg.plant.capacity_kw();
            let token = cancel.clone();

            let run = tokio::task::spawn_blocking(move || {
                let inputs = ForecastInputs {
                    operational,
                    weather,
                    forecast_start,
                };
                ForecastEngine::new(&model, station, ratio, capacity).run(&inputs, &token)
            })
            .await
            .context("forecast task panicked")??;
            to_json(&run, cli.pretty)?
        }
        Command::Battery => {
            let model =
                SoftmaxDayModel::load(&cfg.data.battery_model).map_err(PipelineError::from)?;
            let token = cancel.clone();

            let days = tokio::task::spawn_blocking(move || {
                BatteryAnalyzer::new(&model, station).run(&operational, &weather, &token)
            })
            .await
            .context("battery analysis task panicked")??;
            to_json(&days, cli.pretty)?
        }
    };

    println!("{result}");
    watcher.abort();
    Ok(())
}

/// Local weather export when present, Open-Meteo otherwise.
async fn load_weather(
    cfg: &Config,
    station: &Station,
    operational: &[OperationalSample],
) -> Result<Vec<WeatherSample>> {
    if cfg.data.weather_csv.exists() {
        let samples = CsvWeatherSource::new(&cfg.data.weather_csv)
            .fetch(station)
            .await?;
        return Ok(samples);
    }

    // reach back far enough to overlap the station history
    let past_days = operational
        .first()
        .map(|s| (Local::now().date_naive() - s.timestamp.date()).num_days())
        .unwrap_or(0)
        .clamp(0, MAX_PAST_DAYS);
    warn!(
        path = %cfg.data.weather_csv.display(),
        past_days,
        "no local weather file, fetching from Open-Meteo"
    );

    let client = OpenMeteoClient::new(
        cfg.weather.base_url.clone(),
        Duration::from_secs(cfg.weather.timeout_seconds),
        cfg.weather.forecast_days,
    )
    .with_past_days(past_days as u32);
    Ok(client.fetch(station).await?)
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}
