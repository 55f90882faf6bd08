//! Convert the chemicals CSV export into the JSON seed file.

use std::path::PathBuf;
use std::process::ExitCode;

use chemical_api::{convert_file, DEFAULT_INPUT, DEFAULT_OUTPUT};
use clap::Parser;

#[derive(Parser)]
#[command(name = "convert-csv")]
#[command(about = "Convert chemicals CSV data to a JSON seed file")]
#[command(version)]
struct Cli {
    /// CSV export to read
    #[arg(default_value = DEFAULT_INPUT)]
    input: PathBuf,

    /// JSON file to write
    #[arg(default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Suppress progress output, only show errors
    #[arg(long, short)]
    quiet: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match convert_file(&cli.input, &cli.output) {
        Ok(count) => {
            if !cli.quiet {
                println!(
                    "Converted {} chemicals from {} to {}",
                    count,
                    cli.input.display(),
                    cli.output.display()
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}
