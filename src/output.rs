//! The module responsible for writing output data to disk.
use crate::results::ResultTable;
use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use std::fs;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which run output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "varroapop_results";

/// Format for writing a result table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Comma-separated values with a header row
    #[default]
    Csv,
    /// A JSON object mapping each column name to its values
    Json,
}

impl OutputFormat {
    /// The file name results are written to in an output folder
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Csv => "results.csv",
            Self::Json => "results.json",
        }
    }
}

/// The default output folder for a run, named after its job ID if it has one
pub fn get_output_dir(job_id: Option<&str>) -> PathBuf {
    [OUTPUT_DIRECTORY_ROOT, job_id.unwrap_or("latest")]
        .iter()
        .collect()
}

/// Create an output folder.
///
/// An existing non-empty folder is only replaced if `allow_overwrite` is set.
///
/// # Returns
///
/// Whether an existing folder was overwritten
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    if output_dir.is_dir() {
        let is_empty = fs::read_dir(output_dir)?.next().is_none();
        if is_empty {
            return Ok(false);
        }

        if !allow_overwrite {
            bail!(
                "Output folder {} already exists and is not empty (use --overwrite to replace it)",
                output_dir.display()
            );
        }

        fs::remove_dir_all(output_dir)?;
        fs::create_dir_all(output_dir)?;
        return Ok(true);
    }

    fs::create_dir_all(output_dir)?;
    Ok(false)
}

/// Write a result table to a file in the given format
pub fn write_results(table: &ResultTable, file_path: &Path, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Csv => table.write_csv(file_path)?,
        OutputFormat::Json => fs::write(file_path, table.to_json()?)
            .with_context(|| format!("Could not write {}", file_path.display()))?,
    }

    Ok(())
}

/// Write a result table into an output folder, returning the path written to
pub fn write_results_to_dir(
    table: &ResultTable,
    output_dir: &Path,
    format: OutputFormat,
) -> Result<PathBuf> {
    let file_path = output_dir.join(format.file_name());
    write_results(table, &file_path, format)?;

    Ok(file_path)
}
