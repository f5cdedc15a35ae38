//! Code for writing metadata to file
use anyhow::{Result, anyhow};
use chrono::prelude::*;
use platform_info::{PlatformInfo, PlatformInfoAPI, UNameAPI};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata,
    platform: PlatformMetadata,
}

/// Information about a simulation run
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata<'a> {
    /// The date and time on which the run started
    datetime: String,
    /// Which engine backend was used
    backend: &'a str,
    /// The run's job ID, if file names were unique
    #[serde(skip_serializing_if = "Option::is_none")]
    job_id: Option<&'a str>,
    /// The weather file the run used
    weather: &'a Path,
    /// The number of parameters passed to the engine
    parameter_count: usize,
    /// The number of result rows, if results were parsed
    #[serde(skip_serializing_if = "Option::is_none")]
    result_rows: Option<usize>,
}

impl<'a> RunMetadata<'a> {
    /// Describe a run which started now
    pub fn new(
        backend: &'a str,
        job_id: Option<&'a str>,
        weather: &'a Path,
        parameter_count: usize,
        result_rows: Option<usize>,
    ) -> Self {
        Self {
            datetime: Local::now().to_rfc2822(),
            backend,
            job_id,
            weather,
            parameter_count,
            result_rows,
        }
    }
}

#[derive(Serialize)]
struct ProgramMetadata {
    /// The program name
    name: &'static str,
    /// The program version as specified in Cargo.toml
    version: &'static str,
    /// Whether it is a debug build
    is_debug: bool,
}

impl Default for ProgramMetadata {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            is_debug: cfg!(debug_assertions),
        }
    }
}

/// Information about the platform the program is running on.
///
/// The fields correspond to different data available from the [`PlatformInfo`] struct.
#[derive(Serialize)]
struct PlatformMetadata {
    sysname: String,
    nodename: String,
    release: String,
    version: String,
    machine: String,
    osname: String,
}

impl PlatformMetadata {
    fn new() -> Result<Self> {
        let info = PlatformInfo::new()
            .map_err(|err| anyhow!("Unable to determine platform info: {err}"))?;
        Ok(Self {
            sysname: info.sysname().to_string_lossy().into(),
            nodename: info.nodename().to_string_lossy().into(),
            release: info.release().to_string_lossy().into(),
            version: info.version().to_string_lossy().into(),
            machine: info.machine().to_string_lossy().into(),
            osname: info.osname().to_string_lossy().into(),
        })
    }
}

/// Write metadata to the specified output folder in TOML format
pub fn write_metadata(output_path: &Path, run: RunMetadata) -> Result<()> {
    let metadata = Metadata {
        run,
        program: ProgramMetadata::default(),
        platform: PlatformMetadata::new()?,
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}
