//! CSV import.
//!
//! Turns the raw data export into the JSON seed consumed by the database (and
//! by the server's `--seed` option). Only three columns are read:
//!
//! | CSV column | Field |
//! |------------|-------|
//! | `Chemical formula` | `formula` |
//! | `Property 1 value` | `band_gap` |
//! | `Property 2 value` | `color` |
//!
//! Other columns are ignored.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::{ApiError, ConvertError};
use crate::schema::ResourceSchema;
use crate::types::NewChemical;
use crate::validator::{validate_record, WriteKind};

pub const DEFAULT_INPUT: &str = "data.csv";
pub const DEFAULT_OUTPUT: &str = "../mongo-seed/data.json";

/// One row of the data export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CsvRow {
    #[serde(rename = "Chemical formula")]
    pub formula: String,
    #[serde(rename = "Property 1 value")]
    pub band_gap: f64,
    #[serde(rename = "Property 2 value")]
    pub color: String,
}

pub fn row_to_chemical(row: CsvRow) -> NewChemical {
    NewChemical {
        formula: row.formula,
        band_gap: row.band_gap,
        color: row.color,
    }
}

/// Read every row of a CSV export.
///
/// # Errors
///
/// Returns `ConvertError::Csv` on the first malformed row.
pub fn read_chemicals<R: Read>(reader: R) -> Result<Vec<NewChemical>, ConvertError> {
    csv::Reader::from_reader(reader)
        .deserialize::<CsvRow>()
        .map(|row| {
            row.map(row_to_chemical)
                .map_err(|source| ConvertError::Csv { source })
        })
        .collect()
}

/// Convert a CSV export to a JSON array, returning the number of records.
///
/// # Errors
///
/// Returns `ConvertError::Csv` for bad input and `ConvertError::Json` if the
/// output can't be written.
pub fn convert<R: Read, W: Write>(reader: R, writer: W) -> Result<usize, ConvertError> {
    let chemicals = read_chemicals(reader)?;
    serde_json::to_writer(writer, &chemicals).map_err(|source| ConvertError::Json { source })?;
    Ok(chemicals.len())
}

/// Convert `input` into `output`, replacing it if present.
///
/// # Errors
///
/// Returns `ConvertError::FileNotFound` if `input` doesn't exist,
/// `ConvertError::Io` if either file can't be opened, or any error of
/// [`convert`].
pub fn convert_file(input: &Path, output: &Path) -> Result<usize, ConvertError> {
    let reader = open(input)?;
    let file = File::create(output).map_err(|source| ConvertError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    let mut writer = BufWriter::new(file);
    let count = convert(reader, &mut writer)?;
    writer.flush().map_err(|source| ConvertError::Io {
        path: output.to_path_buf(),
        source,
    })?;

    info!(count, input = %input.display(), output = %output.display(), "converted");
    Ok(count)
}

/// Load a JSON seed file (as written by [`convert_file`]).
///
/// Every record is validated as a create against the chemicals schema.
///
/// # Errors
///
/// Returns `ConvertError::FileNotFound`, `ConvertError::Io` or
/// `ConvertError::Json`, or `ConvertError::InvalidSeed` naming the first
/// record that breaks a field constraint.
pub fn load_seed(path: &Path) -> Result<Vec<NewChemical>, ConvertError> {
    let reader = open(path)?;
    let records: Vec<Value> =
        serde_json::from_reader(reader).map_err(|source| ConvertError::Json { source })?;
    seed_records(&ResourceSchema::chemicals(), records)
}

fn seed_records(
    schema: &ResourceSchema,
    records: Vec<Value>,
) -> Result<Vec<NewChemical>, ConvertError> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            validate_record(schema, &record, WriteKind::Create).map_err(|e| {
                let message = match e {
                    ApiError::InvalidRecord { errors } => errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join("; "),
                    other => other.to_string(),
                };
                ConvertError::InvalidSeed { index, message }
            })?;
            serde_json::from_value(record).map_err(|source| ConvertError::Json { source })
        })
        .collect()
}

fn open(path: &Path) -> Result<BufReader<File>, ConvertError> {
    if !path.exists() {
        return Err(ConvertError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let file = File::open(path).map_err(|source| ConvertError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(BufReader::new(file))
}
