use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wearwatch::config::{Config, NarrativeBackendConfig};
use wearwatch::dataset::{Dataset, DatasetCache};
use wearwatch::monitor::ConditionMonitor;
use wearwatch::narrative::{
    GeminiBackend, MockBackend, NarrativeAssistant, NarrativeBackend, OllamaBackend,
    OpenAIBackend,
};
use wearwatch::NarrativeError;
use wearwatch::presentation::{render_dashboard, MapView};

/// Command-line arguments for the wearable dashboard
#[derive(Parser)]
#[command(
    name = "wearwatch",
    about = "IoT wearable health & environment dashboard",
    long_about = "Loads a CSV of wearable sensor readings, reports KPIs, flags readings outside \
                  the safety envelope, and optionally asks a hosted language model for a \
                  narrative summary or answers about the data."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Dataset to load, overriding the configured path
    #[arg(short, long, value_name = "CSV")]
    data: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
enum Command {
    /// Render the full dashboard (default)
    Dashboard {
        /// Write the map markers to a GeoJSON file
        #[arg(long, value_name = "FILE")]
        geojson: Option<PathBuf>,

        /// Append a narrative safety summary
        #[arg(long)]
        summarize: bool,
    },
    /// Print only the readings that violate a threshold
    Alerts {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Ask the language model for a safety summary of the KPIs
    Summarize,
    /// Ask the language model a question about the dataset
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Re-render the dashboard whenever the dataset changes
    Watch,
}

impl Cli {
    /// Validate the CLI arguments
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in Config::load
            if config_path.exists() && !config_path.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    config_path.display()
                ));
            }
        }

        if let Some(ref data_path) = self.data {
            if data_path.is_dir() {
                return Err(format!(
                    "Dataset path is a directory: {}",
                    data_path.display()
                ));
            }
        }

        Ok(())
    }

    fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Dashboard {
            geojson: None,
            summarize: false,
        })
    }
}

/// Application state shared by every subcommand
struct App {
    config: Config,
    data_path: PathBuf,
    cache: DatasetCache,
    monitor: ConditionMonitor,
}

impl App {
    fn new(config: Config, data_override: Option<PathBuf>) -> Self {
        let data_path = data_override.unwrap_or_else(|| config.dataset.path.clone());
        let monitor = ConditionMonitor::new(&config.thresholds);
        Self {
            config,
            data_path,
            cache: DatasetCache::new(),
            monitor,
        }
    }

    fn dataset(&mut self) -> Result<Arc<Dataset>> {
        self.cache
            .get_or_load(&self.data_path)
            .with_context(|| format!("Failed to load dataset {}", self.data_path.display()))
    }

    fn render(&mut self) -> Result<String> {
        let dataset = self.dataset()?;
        let kpis = self.monitor.compute_kpis(&dataset)?;
        let alerts = self.monitor.detect_alerts(&dataset);
        if !alerts.is_empty() {
            warn!(
                "{} of {} readings violate the safety envelope",
                alerts.len(),
                dataset.len()
            );
        }
        Ok(render_dashboard(
            &dataset,
            &kpis,
            &alerts,
            self.config.display.max_trend_rows,
        ))
    }

    fn run(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Dashboard { geojson, summarize } => {
                println!("{}", self.render()?);

                if let Some(path) = geojson {
                    self.write_geojson(&path)?;
                }

                if summarize {
                    println!("Narrative Summary");
                    match self.summarize() {
                        Ok(text) => println!("{}", text),
                        // The dashboard stays usable when the service is down
                        Err(e) => println!("  {:#}", e),
                    }
                }
                Ok(())
            }
            Command::Alerts { json } => {
                let dataset = self.dataset()?;
                let alerts = self.monitor.detect_alerts(&dataset);
                if json {
                    println!("{}", serde_json::to_string_pretty(&alerts)?);
                } else if alerts.is_empty() {
                    println!("{}", wearwatch::presentation::ALL_CLEAR);
                } else {
                    for alert in alerts.iter() {
                        let labels: Vec<&str> = alert.conditions.iter().map(|c| c.label()).collect();
                        println!(
                            "{:>5}  {}  {:?}  {}",
                            alert.index,
                            alert.reading.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            alert.severity(),
                            labels.join(", ")
                        );
                    }
                }
                Ok(())
            }
            Command::Summarize => {
                println!("{}", self.summarize()?);
                Ok(())
            }
            Command::Ask { question } => {
                let question = question.join(" ");
                let dataset = self.dataset()?;
                let assistant = self.assistant()?;
                let answer =
                    block_on(assistant.answer(&dataset, &question))?.map_err(narrative_failure)?;
                println!("{}", answer);
                Ok(())
            }
            Command::Watch => self.watch(),
        }
    }

    fn write_geojson(&mut self, path: &Path) -> Result<()> {
        let dataset = self.dataset()?;
        let kpis = self.monitor.compute_kpis(&dataset)?;
        let geojson = MapView::from_dataset(&dataset, &kpis).to_geojson();
        std::fs::write(path, serde_json::to_string_pretty(&geojson)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Wrote map markers to {}", path.display());
        Ok(())
    }

    fn summarize(&mut self) -> Result<String> {
        let dataset = self.dataset()?;
        let kpis = self.monitor.compute_kpis(&dataset)?;
        let assistant = self.assistant()?;
        Ok(block_on(assistant.summarize(&kpis))?.map_err(narrative_failure)?)
    }

    fn assistant(&self) -> Result<NarrativeAssistant> {
        let resolved = self.config.narrative.resolve()?;
        info!("Using narrative backend {:?}", resolved);
        let backend = build_backend(&resolved)?;
        Ok(NarrativeAssistant::with_timeout(
            backend,
            self.config.narrative.request_timeout(),
        ))
    }

    /// Poll the dataset file and re-render on change until interrupted
    fn watch(&mut self) -> Result<()> {
        let running = Arc::new(AtomicBool::new(true));
        let handler_flag = Arc::clone(&running);
        ctrlc::set_handler(move || {
            info!("Received interrupt signal (SIGINT), stopping watch");
            handler_flag.store(false, Ordering::SeqCst);
        })
        .context("Error setting SIGINT handler")?;

        println!("{}", self.render()?);
        info!(
            "Watching {} every {:?}. Press Ctrl+C to stop.",
            self.data_path.display(),
            self.config.dataset.poll_interval()
        );

        let poll_interval = self.config.dataset.poll_interval();
        let mut last_poll = Instant::now();

        while running.load(Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(100));
            if last_poll.elapsed() < poll_interval {
                continue;
            }
            last_poll = Instant::now();

            match self.cache.is_stale(&self.data_path) {
                Ok(false) => {}
                Ok(true) => match self.render() {
                    Ok(output) => println!("{}", output),
                    // A half-written file is retried on the next poll
                    Err(e) => warn!("Dataset changed but could not be rendered: {:#}", e),
                },
                Err(e) => warn!("Cannot stat {}: {}", self.data_path.display(), e),
            }
        }

        info!("Watch stopped");
        Ok(())
    }
}

/// Report timeouts the same way as an unreachable service
fn narrative_failure(e: NarrativeError) -> anyhow::Error {
    match e {
        NarrativeError::ServiceUnavailable(_) => e.into(),
        _ if e.is_unavailable() => NarrativeError::ServiceUnavailable(e.to_string()).into(),
        _ => e.into(),
    }
}

fn build_backend(config: &NarrativeBackendConfig) -> Result<Arc<dyn NarrativeBackend>> {
    let backend: Arc<dyn NarrativeBackend> = match config {
        NarrativeBackendConfig::Gemini {
            api_key,
            model,
            endpoint,
        } => match endpoint {
            Some(url) => Arc::new(GeminiBackend::with_base_url(
                api_key.clone(),
                model.clone(),
                url.clone(),
            )?),
            None => Arc::new(GeminiBackend::new(api_key.clone(), model.clone())?),
        },
        NarrativeBackendConfig::OpenAI {
            api_key,
            model,
            endpoint,
        } => match endpoint {
            Some(url) => Arc::new(OpenAIBackend::with_base_url(
                api_key.clone(),
                model.clone(),
                url.clone(),
            )?),
            None => Arc::new(OpenAIBackend::new(api_key.clone(), model.clone())?),
        },
        NarrativeBackendConfig::Ollama { endpoint, model } => {
            Arc::new(OllamaBackend::new(endpoint.clone(), model.clone())?)
        }
        NarrativeBackendConfig::Mock => Arc::new(MockBackend::success()),
    };
    Ok(backend)
}

/// Drive one narrative request to completion on a single-threaded runtime
fn block_on<F: std::future::Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let mut app = App::new(config, cli.data.clone());
    if let Err(e) = app.run(cli.command()) {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_dashboard() {
        let cli = Cli::try_parse_from(["wearwatch"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Dashboard {
                geojson: None,
                summarize: false
            }
        );
    }

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::try_parse_from(["wearwatch", "ask", "was", "it", "hot?"]).unwrap();
        match cli.command() {
            Command::Ask { question } => assert_eq!(question.join(" "), "was it hot?"),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_ask_requires_question() {
        assert!(Cli::try_parse_from(["wearwatch", "ask"]).is_err());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let cli = Cli::try_parse_from(["wearwatch", "--config", "/tmp"]).unwrap();
        assert!(cli.validate().is_err());

        let cli = Cli::try_parse_from(["wearwatch", "--data", "/tmp"]).unwrap();
        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cli_validation_with_missing_files() {
        let cli = Cli::try_parse_from([
            "wearwatch",
            "--config",
            "/nonexistent/config.toml",
            "--data",
            "/nonexistent/readings.csv",
        ])
        .unwrap();
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_timeout_reported_as_unavailable() {
        let err = narrative_failure(NarrativeError::Timeout(Duration::from_secs(60)));
        assert_eq!(
            err.to_string(),
            "Narrative service unavailable: Narrative service did not respond within 60s"
        );

        let err = narrative_failure(NarrativeError::ServiceUnavailable("quota".to_string()));
        assert_eq!(err.to_string(), "Narrative service unavailable: quota");

        let err = narrative_failure(NarrativeError::EmptyQuestion);
        assert_eq!(err.to_string(), "Question must not be empty");
    }

    #[test]
    fn test_data_override_wins() {
        let app = App::new(Config::default(), Some(PathBuf::from("shift.csv")));
        assert_eq!(app.data_path, PathBuf::from("shift.csv"));

        let app = App::new(Config::default(), None);
        assert_eq!(
            app.data_path,
            PathBuf::from("iot_worker_conditions_dataset.csv")
        );
    }

    #[test]
    fn test_mock_backend_summary_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.csv");
        std::fs::write(
            &path,
            "Timestamp,Temperature (°C),Humidity (%),Sound (dB),AQI,Heart Rate (bpm),SpO2 (%),Latitude,Longitude\n\
             2025-03-01 08:00:00,30,50,60,80,90,98,12.9,77.5\n",
        )
        .unwrap();

        let mut config = Config::default();
        config.narrative.backend = wearwatch::config::BackendKind::Mock;
        let mut app = App::new(config, Some(path));

        let text = app.summarize().unwrap();
        assert!(!text.is_empty());
        assert!(app.render().unwrap().contains("Real-Time KPIs"));
    }
}
