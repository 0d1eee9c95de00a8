use clap::Parser;
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use task_alert_service::alerting::{EvaluationService, PollScheduler, TickOutcome};
use task_alert_service::config::{ConfigSource, DEFAULT_POLL_INTERVAL_SECONDS, FileConfigSource};
use task_alert_service::logging::init_logging;
use task_alert_service::notifications::MailgunSender;
use task_alert_service::task_scheduler::SchtasksInspector;
use task_alert_service::version::VERSION;

#[derive(Parser, Debug)]
#[command(name = "task-alert", version = VERSION, about = "Emails an alert when a scheduled task does not finish with its expected result")]
struct Cli {
    /// Monitor configuration file (TOML, or JSON when the extension is .json).
    #[arg(long, env = "TASK_ALERT_CONFIG", default_value = "task_alert_config.toml")]
    config: PathBuf,

    /// Poll interval in seconds, used until the configuration file provides one.
    #[arg(long, env = "TASK_ALERT_INTERVAL", default_value_t = DEFAULT_POLL_INTERVAL_SECONDS)]
    interval: u64,

    /// Directory for the rolling JSON log file.
    #[arg(long, env = "TASK_ALERT_LOG_DIR", default_value = "logs")]
    log_dir: PathBuf,

    /// Run a single evaluation pass and exit.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    init_logging(&cli.log_dir);
    info!(version = VERSION, config = ?cli.config, "Starting task alert service...");

    if cli.interval == 0 {
        return Err("--interval must be greater than zero".into());
    }

    let config_source = Arc::new(FileConfigSource::new(&cli.config));
    let initial_interval = match config_source.load() {
        Ok(config) => Duration::from_secs(config.poll_interval_seconds),
        Err(e) => {
            error!(error = %e, interval_seconds = cli.interval, "Could not load configuration at startup. Will retry every tick.");
            Duration::from_secs(cli.interval)
        }
    };

    let evaluator = EvaluationService::new(
        Arc::new(SchtasksInspector::new()),
        Arc::new(MailgunSender::new()),
    );
    let scheduler = PollScheduler::new(config_source, evaluator, initial_interval);

    if cli.once {
        let outcome = scheduler.run_tick().await;
        info!(?outcome, "Single pass finished.");
        return match outcome {
            TickOutcome::ConfigFailed => Err("configuration could not be loaded".into()),
            _ => Ok(()),
        };
    }

    scheduler.start()?;
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested. Waiting for the current tick to finish...");
    scheduler.stop().await;
    info!("Task alert service stopped.");
    Ok(())
}
