//! The caller-facing model: parameters, weather and an engine to run them with.
use crate::engine::{Engine, RunRequest};
use crate::error::{VarroaPopError, VarroaPopResult};
use crate::input_file::WEATHER_FILE_KEY;
use crate::job::{RunFiles, RunIdentity};
use crate::parameters::{ParameterSet, ParameterValue};
use crate::results::ResultTable;
use crate::weather::WeatherReference;
use log::info;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Where a model finds weather files and writes its run files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    /// Folder containing the bundled weather files
    pub weather_dir: PathBuf,
    /// Folder under which input, log and result files are written
    pub working_dir: PathBuf,
}

/// A VarroaPop model bound to an engine.
///
/// Parameters accumulate across calls to [`VarroaPop::set_parameters`] and
/// [`VarroaPop::load_input_file`]. Each call to [`VarroaPop::run_model`] replaces the previous
/// output.
#[derive(Debug)]
pub struct VarroaPop<E: Engine> {
    engine: E,
    paths: ModelPaths,
    identity: RunIdentity,
    parameters: ParameterSet,
    weather: WeatherReference,
    contamination: Option<Vec<String>>,
    output: Option<ResultTable>,
}

impl<E: Engine> VarroaPop<E> {
    /// Create a model with no parameters and the default weather
    pub fn new(engine: E, paths: ModelPaths, identity: RunIdentity) -> Self {
        Self {
            engine,
            paths,
            identity,
            parameters: ParameterSet::new(),
            weather: WeatherReference::default(),
            contamination: None,
            output: None,
        }
    }

    /// Merge parameters into the model, optionally changing the weather too.
    ///
    /// # Returns
    ///
    /// The full parameter set after merging
    pub fn set_parameters<I, K, V>(&mut self, parameters: I, weather: Option<&str>) -> &ParameterSet
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<ParameterValue>,
    {
        self.parameters.set(parameters);
        self.take_weather_parameter();
        if let Some(weather) = weather {
            self.set_weather(weather);
        }
        &self.parameters
    }

    /// Use a preset name or a weather file path
    pub fn set_weather(&mut self, name_or_path: &str) {
        self.weather = WeatherReference::new(name_or_path);
    }

    /// Merge the parameters in a `key=value` input file.
    ///
    /// A `WeatherFileName` line in the file sets the weather instead of being kept as a parameter.
    pub fn load_input_file(&mut self, path: &Path) -> VarroaPopResult<&ParameterSet> {
        self.parameters.load_from_file(path)?;
        self.take_weather_parameter();
        Ok(&self.parameters)
    }

    /// Move a `WeatherFileName` parameter into the weather reference
    fn take_weather_parameter(&mut self) {
        if let Some(value) = self.parameters.remove(WEATHER_FILE_KEY) {
            self.set_weather(&value.to_string());
        }
    }

    /// Read a contamination table to push to the engine on each run
    pub fn load_contamination_file(&mut self, path: &Path) -> VarroaPopResult<()> {
        let contents = fs::read_to_string(path).map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                VarroaPopError::NotFound {
                    what: "Contamination file",
                    path: path.to_path_buf(),
                }
            } else {
                VarroaPopError::io(path, err)
            }
        })?;

        self.contamination = Some(contents.lines().map(str::to_string).collect());
        Ok(())
    }

    /// The current parameters
    pub fn parameters(&self) -> &ParameterSet {
        &self.parameters
    }

    /// The current weather
    pub fn weather(&self) -> &WeatherReference {
        &self.weather
    }

    /// The path of the current weather file
    pub fn weather_path(&self) -> PathBuf {
        self.weather.path(&self.paths.weather_dir)
    }

    /// The job ID used in file names, if file names are unique
    pub fn job_id(&self) -> Option<&str> {
        self.identity.job_id()
    }

    /// The files used by each run
    pub fn run_files(&self) -> RunFiles {
        RunFiles::new(&self.paths.working_dir, &self.identity)
    }

    /// The engine this model runs with
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Run a simulation with the current parameters and weather.
    ///
    /// # Returns
    ///
    /// The results, or `None` if the engine is in debug mode
    pub fn run_model(&mut self) -> VarroaPopResult<Option<&ResultTable>> {
        if self.parameters.is_empty() {
            return Err(VarroaPopError::configuration(
                "no parameters have been set for the model",
            ));
        }

        let weather_path = self.weather_path();
        let files = self.run_files();
        let request = RunRequest {
            parameters: &self.parameters,
            weather_path: &weather_path,
            contamination: self.contamination.as_deref(),
            files: &files,
        };

        info!(
            "Running VarroaPop with the {} engine (weather: {})",
            self.engine.name(),
            weather_path.display()
        );
        self.output = None;
        self.output = self.engine.run(&request)?;

        Ok(self.output.as_ref())
    }

    /// The results of the last successful run
    pub fn get_output(&self) -> Option<&ResultTable> {
        self.output.as_ref()
    }

    /// The results of the last successful run as column-oriented JSON
    pub fn get_output_json(&self) -> VarroaPopResult<Option<String>> {
        self.output.as_ref().map(ResultTable::to_json).transpose()
    }
}
