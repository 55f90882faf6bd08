//! Chemical API server
//!
//! Serves the chemicals collection over HTTP. Every option can also be set
//! through the environment variable named in `--help`.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chemical_api::{
    load_seed, serve, ChemicalStore, Credential, MemoryStore, MongoSettings, Settings,
};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chemical-api")]
#[command(about = "REST API over a database of chemicals")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// MongoDB host
    #[arg(long, env = "MONGO_HOST", default_value = "mongo")]
    mongo_host: String,

    /// MongoDB port
    #[arg(long, env = "MONGO_PORT", default_value_t = 27017)]
    mongo_port: u16,

    /// MongoDB database name
    #[arg(long, env = "MONGO_DBNAME", default_value = "eve")]
    mongo_dbname: String,

    /// Administrator username for writes
    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    admin_username: String,

    /// Administrator password for writes
    #[arg(long, env = "ADMIN_PASSWORD", default_value = "admin", hide_env_values = true)]
    admin_password: String,

    /// JSON seed file loaded into the in-memory store at start-up
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Store records in MongoDB instead of memory (ignores --seed)
    #[cfg(feature = "mongo")]
    #[arg(long)]
    mongo: bool,
}

impl Cli {
    fn settings(&self) -> Settings {
        Settings {
            bind: SocketAddr::new(self.host, self.port),
            mongo: MongoSettings {
                host: self.mongo_host.clone(),
                port: self.mongo_port,
                dbname: self.mongo_dbname.clone(),
            },
            admin: Credential::new(&self.admin_username, &self.admin_password),
            ..Settings::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = cli.settings();

    let store = match open_store(&cli, &settings).await {
        Ok(store) => store,
        Err(code) => return ExitCode::from(code),
    };

    match serve(settings, store).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Server error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn open_store(cli: &Cli, settings: &Settings) -> Result<Arc<dyn ChemicalStore>, u8> {
    #[cfg(feature = "mongo")]
    if cli.mongo {
        let store = chemical_api::MongoStore::connect(&settings.mongo)
            .await
            .map_err(|e| {
                error!("Error: {e}");
                3u8
            })?;
        return Ok(Arc::new(store));
    }
    #[cfg(not(feature = "mongo"))]
    let _ = settings;

    let store = match &cli.seed {
        Some(path) => {
            let records = load_seed(path).map_err(|e| {
                error!("Error loading seed: {e}");
                e.exit_code() as u8
            })?;
            info!(count = records.len(), seed = %path.display(), "seeded in-memory store");
            MemoryStore::with_records(records)
        }
        None => MemoryStore::new(),
    };
    Ok(Arc::new(store))
}
