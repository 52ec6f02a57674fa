//! Validate command - check a processor result against the abnormal it was
//! produced from.

use std::path::{Path, PathBuf};

use kubediag::api::Abnormal;
use kubediag::validation::validate_result;

use crate::error::CliError;

/// Run the validate command.
pub fn run(current: &Path, result: &Path) -> Result<(), CliError> {
    let current = read_abnormal(current)?;
    let result = read_abnormal(result)?;

    validate_result(&result, &current).map_err(CliError::Rejected)?;

    println!("Result for {} accepted", current.key());
    Ok(())
}

fn read_abnormal(path: &Path) -> Result<Abnormal, CliError> {
    let content = std::fs::read(path).map_err(|error| CliError::FileRead {
        path: PathBuf::from(path),
        error,
    })?;
    serde_json::from_slice(&content).map_err(|error| CliError::Decode {
        path: PathBuf::from(path),
        error,
    })
}
