//! Writing engine input files.
use crate::error::{VarroaPopError, VarroaPopResult};
use crate::parameters::ParameterSet;
use log::debug;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// The key under which the process engine expects the weather file path
pub const WEATHER_FILE_KEY: &str = "WeatherFileName";

/// The `key=value` lines for a parameter set, without any weather line.
///
/// A `WeatherFileName` parameter is skipped; the weather file is always given separately.
pub fn input_lines(parameters: &ParameterSet) -> Vec<String> {
    parameters
        .iter()
        .filter(|(name, _)| !name.eq_ignore_ascii_case(WEATHER_FILE_KEY))
        .map(|(name, value)| format!("{name}={value}"))
        .collect()
}

/// Write an input file for the engine.
///
/// One `key=value` line is written per parameter, followed by a `WeatherFileName=<path>` line if
/// `weather_path` is given. The file is written to a temporary file alongside `destination` and
/// then moved into place, replacing any existing file.
pub fn write_input_file(
    parameters: &ParameterSet,
    weather_path: Option<&Path>,
    destination: &Path,
) -> VarroaPopResult<()> {
    let mut lines = input_lines(parameters);
    if let Some(weather_path) = weather_path {
        lines.push(format!("{WEATHER_FILE_KEY}={}", weather_path.display()));
    }

    write_lines_atomic(&lines, destination)?;
    debug!(
        "Wrote {} input lines to {}",
        lines.len(),
        destination.display()
    );

    Ok(())
}

/// Write lines to `destination` via a temporary file in the same directory
pub(crate) fn write_lines_atomic(lines: &[String], destination: &Path) -> VarroaPopResult<()> {
    let io_err = |err: std::io::Error| VarroaPopError::io(destination, err);
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir).map_err(io_err)?;
    for line in lines {
        writeln!(file, "{line}").map_err(io_err)?;
    }
    file.flush().map_err(io_err)?;
    file.persist(destination)
        .map_err(|err| VarroaPopError::io(destination, err.error))?;

    Ok(())
}
