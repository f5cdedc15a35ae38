//! Code for loading program settings.
use crate::engine::process::{CommandFlags, ProcessRunner};
use crate::engine::session::SessionOptions;
use crate::get_varroapop_config_dir;
use crate::log::DEFAULT_LOG_LEVEL;
use crate::model::ModelPaths;
use crate::schema::{ResultSchema, SchemaVersion};
use anyhow::{Context, Result};
use clap::ValueEnum;
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# Program settings for the VarroaPop wrapper.
# Uncomment a line to change its value.
";

/// How the engine is invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Run the console executable once per simulation
    #[default]
    Process,
    /// Load the shared library into this process
    Library,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_executable() -> PathBuf {
    PathBuf::from("files/exe/VarroaPop.exe")
}

fn default_session_file() -> PathBuf {
    PathBuf::from("files/exe/default.vrp")
}

fn default_library() -> PathBuf {
    PathBuf::from("files/exe/liblibvpop.so")
}

fn default_weather_dir() -> PathBuf {
    PathBuf::from("files/weather")
}

fn default_working_dir() -> PathBuf {
    PathBuf::from("files")
}

fn default_true() -> bool {
    true
}

fn default_batch_flags() -> Vec<String> {
    CommandFlags::default().batch
}

fn default_output_flag() -> String {
    CommandFlags::default().output
}

fn default_input_flag() -> String {
    CommandFlags::default().input
}

fn default_log_flag() -> String {
    CommandFlags::default().log
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> PathBuf {
    let mut path = get_varroapop_config_dir();
    path.push(SETTINGS_FILE_NAME);

    path
}

/// Program settings from config file
#[derive(Debug, Clone, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How to invoke the engine ("process" or "library")
    #[serde(default)]
    pub backend: Backend,
    /// Path to the engine's console executable
    #[serde(default = "default_executable")]
    pub executable: PathBuf,
    /// Path to the engine session (.vrp) file passed to the executable
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
    /// Path to the engine's shared library
    #[serde(default = "default_library")]
    pub library: PathBuf,
    /// Folder containing the bundled weather files
    #[serde(default = "default_weather_dir")]
    pub weather_dir: PathBuf,
    /// Folder under which input, log and result files are written
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    /// Layout of the engine's results ("executable" or "library")
    #[serde(default)]
    pub schema: SchemaVersion,
    /// A TOML file describing a custom results layout. Overrides `schema`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_file: Option<PathBuf>,
    /// Whether to add a random job ID to run file names
    #[serde(default)]
    pub unique_file_names: bool,
    /// Whether the engine should write a log file for each run
    #[serde(default)]
    pub write_engine_log: bool,
    /// Whether to keep the input and raw result files of library runs
    #[serde(default)]
    pub keep_files: bool,
    /// Whether to drop the last line the shared library returns in each buffer
    #[serde(default = "default_true")]
    pub discard_trailing_line: bool,
    /// Whether to skip parsing results of library runs and log the engine's messages instead
    #[serde(default)]
    pub debug: bool,
    /// Seconds to wait for the executable before killing it (no limit if absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Flags which put the executable into batch mode
    #[serde(default = "default_batch_flags")]
    pub batch_flags: Vec<String>,
    /// Flag preceding the results file path
    #[serde(default = "default_output_flag")]
    pub output_flag: String,
    /// Flag preceding the input file path
    #[serde(default = "default_input_flag")]
    pub input_flag: String,
    /// Flag preceding the log file path
    #[serde(default = "default_log_flag")]
    pub log_flag: String,
    /// Flag preceding the weather file path, for builds which take weather on the command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_flag: Option<String>,
    /// Extra flags appended to every command line
    #[serde(default)]
    pub extra_flags: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            backend: Backend::default(),
            executable: default_executable(),
            session_file: default_session_file(),
            library: default_library(),
            weather_dir: default_weather_dir(),
            working_dir: default_working_dir(),
            schema: SchemaVersion::default(),
            schema_file: None,
            unique_file_names: false,
            write_engine_log: false,
            keep_files: false,
            discard_trailing_line: true,
            debug: false,
            timeout_secs: None,
            batch_flags: default_batch_flags(),
            output_flag: default_output_flag(),
            input_flag: default_input_flag(),
            log_flag: default_log_flag(),
            weather_flag: None,
            extra_flags: Vec::new(),
        }
    }
}

impl Settings {
    /// Read the settings file from the program's config folder.
    ///
    /// If the file is not present, default values for settings will be used
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path())
    }

    /// Read settings from the specified path, using defaults if the file doesn't exist
    pub fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(file_path)
            .with_context(|| format!("Could not read {}", file_path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Could not parse settings file {}", file_path.display()))
    }

    /// The result layout to parse engine output with
    pub fn result_schema(&self) -> Result<ResultSchema> {
        match &self.schema_file {
            Some(path) => ResultSchema::from_path(path)
                .with_context(|| format!("Could not load schema file {}", path.display())),
            None => Ok(ResultSchema::for_version(self.schema)),
        }
    }

    /// The flag spellings for the console executable
    pub fn command_flags(&self) -> CommandFlags {
        CommandFlags {
            batch: self.batch_flags.clone(),
            output: self.output_flag.clone(),
            input: self.input_flag.clone(),
            log: self.log_flag.clone(),
            weather: self.weather_flag.clone(),
        }
    }

    /// How long to wait for the executable, if there is a limit
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// A runner for the console executable
    pub fn process_runner(&self) -> ProcessRunner {
        ProcessRunner::new(self.command_flags(), self.timeout())
    }

    /// Options for shared-library sessions
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            discard_trailing_line: self.discard_trailing_line,
            debug: self.debug,
            keep_files: self.keep_files,
            write_engine_log: self.write_engine_log,
        }
    }

    /// Where models find weather and write run files.
    ///
    /// The weather folder is made absolute, as preset paths are passed on to the engine.
    pub fn model_paths(&self) -> Result<ModelPaths> {
        let weather_dir = std::path::absolute(&self.weather_dir).with_context(|| {
            format!(
                "Could not resolve weather folder {}",
                self.weather_dir.display()
            )
        })?;

        Ok(ModelPaths {
            weather_dir,
            working_dir: self.working_dir.clone(),
        })
    }

    /// The contents of the default settings file
    pub fn default_file_contents() -> String {
        let settings_raw =
            toml::to_string(&Settings::default()).expect("Could not convert settings to TOML");

        // Comment out every setting and precede it with its doc comment
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            let Some(last) = line.find('=') else {
                continue;
            };

            let field = line[..last].trim();
            let docs = Settings::get_field_docs(field).expect("Missing doc comment for field");
            for doc_line in docs.lines() {
                write!(&mut out, "\n# # {}\n", doc_line.trim()).unwrap();
            }
            writeln!(&mut out, "# {}", line.trim()).unwrap();
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_settings_load_from_path_no_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME); // NB: doesn't exist
        assert_eq!(
            Settings::load_from_path(&file_path).unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_settings_load_from_path() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "log_level = \"warn\"").unwrap();
            writeln!(file, "backend = \"library\"").unwrap();
            writeln!(file, "schema = \"library\"").unwrap();
            writeln!(file, "timeout_secs = 30").unwrap();
            writeln!(file, "weather_flag = \"/w\"").unwrap();
        }

        let settings = Settings::load_from_path(&file_path).unwrap();
        assert_eq!(
            settings,
            Settings {
                log_level: "warn".to_string(),
                backend: Backend::Library,
                schema: SchemaVersion::Library,
                timeout_secs: Some(30),
                weather_flag: Some("/w".to_string()),
                ..Settings::default()
            }
        );
        assert_eq!(settings.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(settings.command_flags().weather.as_deref(), Some("/w"));
    }

    #[test]
    fn test_settings_load_from_path_invalid() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&file_path, "backend = \"carrier pigeon\"\n").unwrap();
        assert!(Settings::load_from_path(&file_path).is_err());
    }

    #[test]
    fn test_result_schema() {
        let dir = tempdir().unwrap();
        let mut settings = Settings {
            schema: SchemaVersion::Library,
            ..Settings::default()
        };
        assert_eq!(settings.result_schema().unwrap().width(), 44);

        let file_path = dir.path().join("schema.toml");
        fs::write(&file_path, "skip_rows = 1\ncolumns = [\"Date\", \"Colony Size\"]\n").unwrap();
        settings.schema_file = Some(file_path);
        assert_eq!(settings.result_schema().unwrap().width(), 2);
    }

    #[test]
    fn test_model_paths_absolute_weather_dir() {
        let settings = Settings::default();
        let paths = settings.model_paths().unwrap();
        assert!(paths.weather_dir.is_absolute());
        assert!(paths.weather_dir.ends_with("files/weather"));
        assert_eq!(paths.working_dir, settings.working_dir);

        let dir = tempdir().unwrap();
        let settings = Settings {
            weather_dir: dir.path().to_path_buf(),
            ..Settings::default()
        };
        assert_eq!(settings.model_paths().unwrap().weather_dir, dir.path());
    }

    #[test]
    fn test_default_file_contents() {
        let contents = Settings::default_file_contents();
        assert!(contents.contains("# log_level = \"info\""));
        assert!(contents.contains("# # Path to the engine's console executable"));

        // Uncommenting everything gives the defaults back
        let uncommented: String = contents
            .lines()
            .filter_map(|line| line.strip_prefix("# "))
            .filter(|line| !line.starts_with('#') && line.contains('='))
            .map(|line| format!("{line}\n"))
            .collect();
        assert_eq!(
            toml::from_str::<Settings>(&uncommented).unwrap(),
            Settings::default()
        );
    }
}
