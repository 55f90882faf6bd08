//! Sample client
//!
//! Runs a few filtered queries against a running server, then posts a new
//! chemical with the administrator credential.

use std::process::ExitCode;

use chemical_api::{ChemicalClient, ClientError, Credential, NewChemical, DEFAULT_IP, DEFAULT_PORT};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "chemical-client")]
#[command(about = "Query and update a chemical API server")]
#[command(version)]
struct Cli {
    /// Server address
    #[arg(long, default_value = DEFAULT_IP)]
    ip: String,

    /// Server port
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Lower band gap bound (exclusive)
    #[arg(long, default_value_t = 0.0)]
    min_band_gap: f64,

    /// Upper band gap bound (exclusive)
    #[arg(long, default_value_t = 3.0)]
    max_band_gap: f64,

    /// Element to search formulas for
    #[arg(long, default_value = "Ga")]
    element: String,

    #[arg(long, env = "ADMIN_USERNAME", default_value = "admin")]
    username: String,

    #[arg(long, env = "ADMIN_PASSWORD", default_value = "secret", hide_env_values = true)]
    password: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: &Cli) -> Result<(), ClientError> {
    let client = ChemicalClient::new(&cli.ip, cli.port)?;
    let (min, max) = (cli.min_band_gap, cli.max_band_gap);

    let total = client.query_by_band_gap(Some(min), Some(max))?;
    println!("Found {} items with a band gap between {} and {}.", total, min, max);

    let total = client.query_by_element(&cli.element)?;
    println!("Found {} containing the element {}.", total, cli.element);

    let total = client.query_by_element_and_band_gap(&cli.element, Some(min), Some(max))?;
    println!(
        "Found {} items that contain {} and also have a band gap between {:.1} and {:.1}.",
        total, cli.element, min, max
    );

    let chemical = NewChemical {
        formula: "Kr1Pt0N1T3".to_string(),
        band_gap: 1e6,
        color: "Green".to_string(),
    };
    let credential = Credential::new(&cli.username, &cli.password);
    match client.post_chemical(&chemical, &credential) {
        Ok(_) => println!("POST of {} successful.", chemical.formula),
        Err(ClientError::Status { status, .. }) => {
            println!("Error posting data. Request returned code {}.", status)
        }
        Err(e) => return Err(e),
    }

    Ok(())
}
