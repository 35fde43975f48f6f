use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use avocado::constants;
use avocado::gazetteer::Gazetteer;
use avocado::geocode::{Geocoder, GoogleGeocoder};
use avocado::resolver::{ResolutionResult, Resolver};
use avocado::web_server::{self, AppState};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Google Maps API key. Without it only the built-in city table is used.
    #[arg(long, global = true, env = "GOOGLE_MAPS_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Base URL of the geocoding API.
    #[arg(long, global = true)]
    geocode_url: Option<String>,

    /// Seconds before a geocoding request is abandoned.
    #[arg(long, global = true)]
    geocode_timeout: Option<u64>,

    /// JSON file replacing the built-in city table.
    #[arg(long, global = true, env = "AVOCADO_GAZETTEER")]
    gazetteer: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the web server.
    Serve {
        #[arg(long, default_value_t = 3000, help = "Port for the web server.")]
        port: u16,
    },
    /// Resolve a city name to coordinates and print the result.
    Locate {
        city: String,
        #[arg(long, help = "Print the result as JSON.")]
        json: bool,
    },
    /// List the cities in the gazetteer.
    Cities,
}

impl Cli {
    fn load_gazetteer(&self) -> Result<Arc<Gazetteer>> {
        match &self.gazetteer {
            Some(path) => {
                let table = Gazetteer::from_json_file(path)
                    .with_context(|| format!("Failed to load gazetteer from {}", path.display()))?;
                info!("Loaded {} cities from {}", table.len(), path.display());
                Ok(Arc::new(table))
            }
            None => Ok(Gazetteer::builtin()),
        }
    }

    fn geocoder(&self) -> Result<Option<Arc<dyn Geocoder>>> {
        let Some(api_key) = constants::usable_api_key(self.api_key.clone()) else {
            info!("No maps API key configured, using the city table only");
            return Ok(None);
        };
        let base_url = self
            .geocode_url
            .clone()
            .unwrap_or_else(|| constants::GEOCODE_URL.clone());
        let timeout = Duration::from_secs(
            self.geocode_timeout
                .unwrap_or(*constants::GEOCODE_TIMEOUT_SECS),
        );
        let geocoder =
            GoogleGeocoder::new(api_key, base_url, timeout).context("Failed to create geocoder")?;
        Ok(Some(Arc::new(geocoder)))
    }
}

fn describe(result: &ResolutionResult) -> String {
    match result {
        ResolutionResult::Found {
            query,
            coordinate,
            source,
        } => format!("{}: {} (via {})", query, coordinate, source),
        ResolutionResult::NotFound { query } => format!("{}: not found", query),
        ResolutionResult::Error { query, message } => format!("{}: {}", query, message),
        ResolutionResult::Pending { query } => format!("{}: pending", query),
        ResolutionResult::Idle => "nothing to resolve".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for GOOGLE_MAPS_API_KEY)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG (e.g. RUST_LOG=info,avocado=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!("Avocado starting with command: {:?}", cli.command);

    let gazetteer = cli.load_gazetteer()?;
    let geocoder = cli.geocoder()?;

    match cli.command {
        Commands::Serve { port } => {
            let state = AppState::new(&constants::TEMPLATES_DIR, gazetteer, geocoder);
            let mut web_server_handle = tokio::spawn(async move {
                if let Err(e) = web_server::start_web_server(port, state).await {
                    error!("Web server failed: {:?}", e);
                }
            });

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down...");
                    web_server_handle.abort();
                }
                res = &mut web_server_handle => {
                    match res {
                        Ok(_) => info!("Web server task completed unexpectedly."),
                        Err(e) if e.is_panic() => error!("Web server task panicked: {:?}", e),
                        Err(e) => error!("Web server task failed: {:?}", e),
                    }
                }
            }
            info!("Shutdown complete.");
        }
        Commands::Locate { city, json } => {
            let mut resolver = Resolver::new(gazetteer, geocoder);
            let result = resolver.resolve(&city).await;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(result).context("Failed to serialize result")?
                );
            } else {
                println!("{}", describe(result));
            }
        }
        Commands::Cities => {
            for entry in gazetteer.entries() {
                println!("{}\t{}", entry.name, entry.coordinate);
            }
        }
    }

    Ok(())
}
