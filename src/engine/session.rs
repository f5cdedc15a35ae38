//! A long-lived session with the in-process engine.
use super::library::EngineLibrary;
use super::{Engine, RunRequest};
use crate::error::{VarroaPopError, VarroaPopResult};
use crate::input_file::{input_lines, write_lines_atomic};
use crate::parameters::ParameterSet;
use crate::results::ResultTable;
use crate::schema::ResultSchema;
use crate::weather::read_weather_lines;
use log::{debug, info, warn};

/// Lifecycle of a [`LibrarySession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The library is loaded but the model hasn't been initialised
    Created,
    /// The model is initialised and nothing has been pushed yet
    Initialized,
    /// State has been pushed since the last run
    Idle,
    /// A simulation has run
    Ran,
    /// The library has been released
    Closed,
}

/// Options controlling how a session drives the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Drop the last line of every line buffer returned by the engine
    pub discard_trailing_line: bool,
    /// Run without parsing results (raw lines are still logged and kept)
    pub debug: bool,
    /// Write the pushed input and raw results to the run's files
    pub keep_files: bool,
    /// Write the engine's info and error lines to the run's log file
    pub write_engine_log: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            discard_trailing_line: true,
            debug: false,
            keep_files: false,
            write_engine_log: false,
        }
    }
}

/// The lines drained from the engine after a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRun {
    /// Result lines, including any banner lines
    pub results: Vec<String>,
    /// Info lines
    pub info: Vec<String>,
    /// Error lines
    pub errors: Vec<String>,
}

/// Clear the engine's result, error and info buffers.
///
/// # Returns
///
/// The names of the buffers the engine failed to clear
fn clear_all<L: EngineLibrary>(library: &mut L) -> Vec<&'static str> {
    let cleared = [
        ("results", library.clear_results()),
        ("errors", library.clear_errors()),
        ("info", library.clear_info()),
    ];
    cleared
        .into_iter()
        .filter_map(|(buffer, ok)| (!ok).then_some(buffer))
        .collect()
}

/// Clears the engine's buffers if a run ends early.
///
/// On the normal path [`DrainGuard::finish`] clears them instead and reports any failure.
struct DrainGuard<'a, L: EngineLibrary> {
    library: &'a mut L,
    armed: bool,
}

impl<'a, L: EngineLibrary> DrainGuard<'a, L> {
    fn new(library: &'a mut L) -> Self {
        Self {
            library,
            armed: true,
        }
    }

    fn finish(mut self) -> Vec<&'static str> {
        self.armed = false;
        clear_all(&mut *self.library)
    }
}

impl<L: EngineLibrary> Drop for DrainGuard<'_, L> {
    fn drop(&mut self) {
        if self.armed {
            for buffer in clear_all(&mut *self.library) {
                warn!("Engine failed to clear its {buffer} buffer");
            }
        }
    }
}

/// Decode raw engine lines, dropping the trailing sentinel line if requested
fn decode_lines(raw: Vec<Vec<u8>>, discard_trailing_line: bool) -> Vec<String> {
    let mut lines: Vec<String> = raw
        .into_iter()
        .map(|line| String::from_utf8_lossy(&line).into_owned())
        .collect();
    if discard_trailing_line {
        lines.pop();
    }

    lines
}

/// The engine's error lines followed by its info lines
fn read_diagnostics<L: EngineLibrary>(library: &mut L, discard_trailing_line: bool) -> Vec<String> {
    let mut diagnostics = library
        .errors()
        .map(|lines| decode_lines(lines, discard_trailing_line))
        .unwrap_or_default();
    diagnostics.extend(
        library
            .info()
            .map(|lines| decode_lines(lines, discard_trailing_line))
            .unwrap_or_default(),
    );

    diagnostics
}

/// Lines are passed as C strings, so they can't contain NUL bytes
fn check_lines(lines: &[String]) -> VarroaPopResult<()> {
    match lines.iter().position(|line| line.contains('\0')) {
        Some(idx) => Err(VarroaPopError::invalid_argument(format!(
            "line {} contains a NUL byte",
            idx + 1
        ))),
        None => Ok(()),
    }
}

/// A session with an engine library.
///
/// The session owns the library and releases it when closed or dropped. Every call after
/// [`LibrarySession::close`] fails without reaching the engine.
#[derive(Debug)]
pub struct LibrarySession<L: EngineLibrary> {
    library: L,
    state: SessionState,
    options: SessionOptions,
    schema: ResultSchema,
}

impl<L: EngineLibrary> LibrarySession<L> {
    /// Start a session with a loaded library
    pub fn new(library: L, schema: ResultSchema, options: SessionOptions) -> Self {
        Self {
            library,
            state: SessionState::Created,
            options,
            schema,
        }
    }

    /// The current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The underlying library
    pub fn library(&self) -> &L {
        &self.library
    }

    fn ensure_open(&self) -> VarroaPopResult<()> {
        if self.state == SessionState::Closed {
            Err(VarroaPopError::configuration("engine session is closed"))
        } else {
            Ok(())
        }
    }

    fn ensure_initialized(&self) -> VarroaPopResult<()> {
        self.ensure_open()?;
        if self.state == SessionState::Created {
            Err(VarroaPopError::configuration(
                "engine session has not been initialised",
            ))
        } else {
            Ok(())
        }
    }

    fn diagnostics(&mut self) -> Vec<String> {
        read_diagnostics(&mut self.library, self.options.discard_trailing_line)
    }

    /// Initialise the engine's model. Must be called exactly once.
    pub fn initialize(&mut self) -> VarroaPopResult<()> {
        self.ensure_open()?;
        if self.state != SessionState::Created {
            return Err(VarroaPopError::configuration(
                "engine session is already initialised",
            ));
        }

        if !self.library.initialize_model() {
            return Err(VarroaPopError::EngineInit {
                diagnostics: self.diagnostics(),
            });
        }

        debug!("Engine model initialised");
        self.state = SessionState::Initialized;
        Ok(())
    }

    /// Clear the engine's result, error and info buffers
    pub fn clear_buffers(&mut self) -> VarroaPopResult<()> {
        self.ensure_initialized()?;
        let failed = clear_all(&mut self.library);
        self.check_cleared(&failed)
    }

    fn check_cleared(&mut self, failed: &[&str]) -> VarroaPopResult<()> {
        if failed.is_empty() {
            return Ok(());
        }

        let mut diagnostics: Vec<String> = failed
            .iter()
            .map(|buffer| format!("failed to clear the {buffer} buffer"))
            .collect();
        diagnostics.extend(self.diagnostics());
        Err(VarroaPopError::EngineRejected {
            what: "buffer clear",
            diagnostics,
        })
    }

    fn push(
        &mut self,
        what: &'static str,
        lines: &[String],
        call: fn(&mut L, &[String]) -> bool,
    ) -> VarroaPopResult<()> {
        self.ensure_initialized()?;
        check_lines(lines)?;

        if !call(&mut self.library, lines) {
            return Err(VarroaPopError::EngineRejected {
                what,
                diagnostics: self.diagnostics(),
            });
        }

        debug!("Pushed {} lines of {what} to engine", lines.len());
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Set the engine's initial conditions and parameters, replacing any set before
    pub fn push_parameters(&mut self, parameters: &ParameterSet) -> VarroaPopResult<()> {
        self.push("parameters", &input_lines(parameters), L::set_initial_conditions)
    }

    /// Replace the engine's weather with the lines of a weather file
    pub fn push_weather(&mut self, lines: &[String]) -> VarroaPopResult<()> {
        self.ensure_initialized()?;
        if !self.library.clear_weather() {
            return Err(VarroaPopError::EngineRejected {
                what: "weather",
                diagnostics: self.diagnostics(),
            });
        }

        self.push("weather", lines, L::set_weather)
    }

    /// Load a contamination table into the engine
    pub fn push_contamination_table(&mut self, lines: &[String]) -> VarroaPopResult<()> {
        self.push("contamination table", lines, L::set_contamination_table)
    }

    /// Run one simulation and drain the engine's buffers.
    ///
    /// The buffers are cleared afterwards whether or not the run succeeded. If the engine fails
    /// to clear them after a successful run, [`VarroaPopError::EngineRejected`] is returned.
    pub fn run_raw(&mut self) -> VarroaPopResult<RawRun> {
        self.ensure_initialized()?;
        let discard = self.options.discard_trailing_line;

        let (raw, failed) = {
            let guard = DrainGuard::new(&mut self.library);
            if !guard.library.run_simulation() {
                return Err(VarroaPopError::EngineRun {
                    message: "simulation reported failure".into(),
                    diagnostics: read_diagnostics(&mut *guard.library, discard),
                });
            }

            let Some(results) = guard.library.results() else {
                return Err(VarroaPopError::EngineRun {
                    message: "engine did not return results".into(),
                    diagnostics: read_diagnostics(&mut *guard.library, discard),
                });
            };

            let raw = RawRun {
                results: decode_lines(results, discard),
                info: guard
                    .library
                    .info()
                    .map(|lines| decode_lines(lines, discard))
                    .unwrap_or_default(),
                errors: guard
                    .library
                    .errors()
                    .map(|lines| decode_lines(lines, discard))
                    .unwrap_or_default(),
            };
            (raw, guard.finish())
        };

        self.state = SessionState::Ran;
        self.check_cleared(&failed)?;
        Ok(raw)
    }

    /// Run one simulation and parse its results.
    ///
    /// # Returns
    ///
    /// The result table, or `None` in debug mode
    pub fn run(&mut self) -> VarroaPopResult<Option<ResultTable>> {
        let raw = self.run_raw()?;
        self.parse_raw(&raw)
    }

    fn parse_raw(&self, raw: &RawRun) -> VarroaPopResult<Option<ResultTable>> {
        if self.options.debug {
            for line in &raw.info {
                info!("Engine: {line}");
            }
            for line in &raw.errors {
                warn!("Engine: {line}");
            }
            return Ok(None);
        }

        ResultTable::parse(&raw.results, &self.schema).map(Some)
    }

    /// Release the engine. Later calls do nothing.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.library.release();
            self.state = SessionState::Closed;
            debug!("Engine session closed");
        }
    }
}

impl<L: EngineLibrary> Drop for LibrarySession<L> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<L: EngineLibrary> Engine for LibrarySession<L> {
    fn name(&self) -> &'static str {
        "library"
    }

    fn run(&mut self, request: &RunRequest) -> VarroaPopResult<Option<ResultTable>> {
        self.ensure_open()?;

        // Read inputs before touching the engine
        let weather = read_weather_lines(request.weather_path)?;

        if self.state == SessionState::Created {
            self.initialize()?;
        }

        self.clear_buffers()?;
        self.push_parameters(request.parameters)?;
        self.push_weather(&weather)?;
        if let Some(table) = request.contamination {
            self.push_contamination_table(table)?;
        }

        let files = request.files;
        let write_files = self.options.keep_files || self.options.write_engine_log;
        if write_files {
            files.create_dirs()?;
        }
        if self.options.keep_files {
            write_lines_atomic(&input_lines(request.parameters), &files.input)?;
        }

        let raw = self.run_raw()?;

        if self.options.keep_files {
            write_lines_atomic(&raw.results, &files.results)?;
        }
        if self.options.write_engine_log {
            let log_lines: Vec<String> = raw.info.iter().chain(&raw.errors).cloned().collect();
            write_lines_atomic(&log_lines, &files.log)?;
        }

        self.parse_raw(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{RunFiles, RunIdentity};
    use crate::parameters::ParameterValue;
    use crate::schema::SchemaVersion;
    use crate::weather::resolve;
    use chrono::NaiveDate;
    use float_cmp::approx_eq;
    use itertools::Itertools;
    use rstest::{fixture, rstest};
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    const DATE_FORMAT: &str = "%m/%d/%Y";

    /// Stands in for the native engine: one row of results per simulated day
    #[derive(Debug, Default)]
    struct MockLibrary {
        calls: Vec<&'static str>,
        initial_conditions: Vec<String>,
        weather: Vec<String>,
        contamination: Vec<String>,
        results: Vec<String>,
        fail_init: bool,
        fail_run: bool,
        reject_weather: bool,
        fail_clear: bool,
    }

    impl MockLibrary {
        fn parameter(&self, name: &str) -> Option<&str> {
            self.initial_conditions
                .iter()
                .find_map(|line| line.strip_prefix(name)?.strip_prefix('='))
        }

        fn count(&self, call: &str) -> usize {
            self.calls.iter().filter(|c| **c == call).count()
        }

        fn as_bytes(lines: &[String]) -> Vec<Vec<u8>> {
            lines.iter().map(|line| line.as_bytes().to_vec()).collect()
        }
    }

    impl EngineLibrary for MockLibrary {
        fn initialize_model(&mut self) -> bool {
            self.calls.push("initialize_model");
            !self.fail_init
        }

        fn clear_results(&mut self) -> bool {
            self.calls.push("clear_results");
            self.results.clear();
            !self.fail_clear
        }

        fn clear_weather(&mut self) -> bool {
            self.calls.push("clear_weather");
            self.weather.clear();
            true
        }

        fn clear_errors(&mut self) -> bool {
            self.calls.push("clear_errors");
            !self.fail_clear
        }

        fn clear_info(&mut self) -> bool {
            self.calls.push("clear_info");
            !self.fail_clear
        }

        fn set_initial_conditions(&mut self, lines: &[String]) -> bool {
            self.calls.push("set_initial_conditions");
            self.initial_conditions = lines.to_vec();
            true
        }

        fn set_weather(&mut self, lines: &[String]) -> bool {
            self.calls.push("set_weather");
            self.weather = lines.to_vec();
            !self.reject_weather
        }

        fn set_contamination_table(&mut self, lines: &[String]) -> bool {
            self.calls.push("set_contamination_table");
            self.contamination = lines.to_vec();
            true
        }

        fn run_simulation(&mut self) -> bool {
            self.calls.push("run_simulation");
            if self.fail_run {
                return false;
            }

            let parse = |name| {
                NaiveDate::parse_from_str(self.parameter(name).unwrap(), DATE_FORMAT).unwrap()
            };
            let (start, end) = (parse("simstart"), parse("simend"));
            let workers = self.parameter("icworkeradults").unwrap_or("0");
            let values = std::iter::repeat_n("0", 42).join(" ");

            let mut results = vec!["banner".to_string(), "header".to_string(), String::new()];
            results.extend(
                start
                    .iter_days()
                    .take_while(|day| *day <= end)
                    .map(|day| format!("{} {workers} {values}", day.format(DATE_FORMAT))),
            );
            // Incomplete sentinel record
            results.push("end".into());
            self.results = results;
            true
        }

        fn results(&mut self) -> Option<Vec<Vec<u8>>> {
            self.calls.push("results");
            Some(Self::as_bytes(&self.results))
        }

        fn errors(&mut self) -> Option<Vec<Vec<u8>>> {
            self.calls.push("errors");
            let errors = if self.fail_run || self.reject_weather || self.fail_init {
                vec!["Error: something went wrong".to_string(), String::new()]
            } else {
                vec![String::new()]
            };
            Some(Self::as_bytes(&errors))
        }

        fn info(&mut self) -> Option<Vec<Vec<u8>>> {
            self.calls.push("info");
            Some(Self::as_bytes(&["Info: ran".to_string(), String::new()]))
        }

        fn release(&mut self) {
            self.calls.push("release");
        }
    }

    fn session(library: MockLibrary) -> LibrarySession<MockLibrary> {
        LibrarySession::new(
            library,
            ResultSchema::for_version(SchemaVersion::Library),
            SessionOptions::default(),
        )
    }

    #[fixture]
    fn parameters() -> ParameterSet {
        let mut parameters = ParameterSet::new();
        parameters.set([
            ("ICWorkerAdults", ParameterValue::Integer(18000)),
            ("SimStart", ParameterValue::from("06/15/2014")),
            ("SimEnd", ParameterValue::from("10/10/2014")),
        ]);
        parameters
    }

    #[fixture]
    fn weather_dir() -> TempDir {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("15057_grid_35.875_lat.wea"),
            "06/15/2014 30 20\n",
        )
        .unwrap();
        dir
    }

    fn run_request<'a>(
        parameters: &'a ParameterSet,
        weather_path: &'a Path,
        files: &'a RunFiles,
    ) -> RunRequest<'a> {
        RunRequest {
            parameters,
            weather_path,
            contamination: None,
            files,
        }
    }

    #[rstest]
    fn test_run_durham(parameters: ParameterSet, weather_dir: TempDir) {
        let weather_path = resolve("Durham", weather_dir.path());
        let files = RunFiles::new(weather_dir.path(), &RunIdentity::shared());
        let mut session = session(MockLibrary::default());

        let table = Engine::run(
            &mut session,
            &run_request(&parameters, &weather_path, &files),
        )
        .unwrap()
        .unwrap();

        // 15 June to 10 October inclusive
        assert_eq!(table.len(), 118);
        let sizes = table.numeric_column("Colony Size").unwrap();
        assert_eq!(sizes.len(), 118);
        assert!(sizes.iter().all(|size| approx_eq!(f64, *size, 18000.0)));
        assert_eq!(table.dates().next(), Some("06/15/2014"));
        assert_eq!(table.dates().last(), Some("10/10/2014"));
        assert_eq!(session.state(), SessionState::Ran);
        assert_eq!(
            session.library().weather,
            ["06/15/2014 30 20".to_string()]
        );

        // Nothing written unless asked for
        assert!(!files.input.exists());
    }

    #[rstest]
    fn test_run_nonexistent_city(parameters: ParameterSet, weather_dir: TempDir) {
        let weather_path = resolve("nonexistent-city", weather_dir.path());
        assert_eq!(weather_path, Path::new("nonexistent-city"));
        let files = RunFiles::new(weather_dir.path(), &RunIdentity::shared());
        let mut session = session(MockLibrary::default());

        assert!(matches!(
            Engine::run(
                &mut session,
                &run_request(&parameters, &weather_path, &files)
            ),
            Err(VarroaPopError::NotFound { .. })
        ));
        assert_eq!(session.library().count("run_simulation"), 0);
    }

    #[rstest]
    fn test_repeated_runs_drain_buffers(parameters: ParameterSet, weather_dir: TempDir) {
        let weather_path = resolve("durham", weather_dir.path());
        let files = RunFiles::new(weather_dir.path(), &RunIdentity::shared());
        let mut session = session(MockLibrary::default());
        let request = run_request(&parameters, &weather_path, &files);

        let first = Engine::run(&mut session, &request).unwrap().unwrap();
        let second = Engine::run(&mut session, &request).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(session.library().count("initialize_model"), 1);
        assert!(session.library().results.is_empty());
    }

    #[test]
    fn test_initialize_twice() {
        let mut session = session(MockLibrary::default());
        session.initialize().unwrap();
        assert_eq!(session.state(), SessionState::Initialized);
        assert!(matches!(
            session.initialize(),
            Err(VarroaPopError::Configuration { .. })
        ));
        assert_eq!(session.library().count("initialize_model"), 1);
    }

    #[test]
    fn test_initialize_failure() {
        let mut session = session(MockLibrary {
            fail_init: true,
            ..Default::default()
        });
        let err = session.initialize().unwrap_err();
        assert!(matches!(err, VarroaPopError::EngineInit { .. }));
        assert_eq!(err.diagnostics(), ["Error: something went wrong", "Info: ran"]);
        assert_eq!(session.state(), SessionState::Created);
    }

    #[test]
    fn test_push_before_initialize() {
        let mut session = session(MockLibrary::default());
        assert!(matches!(
            session.push_weather(&[]),
            Err(VarroaPopError::Configuration { .. })
        ));
        assert!(session.library().calls.is_empty());
    }

    #[test]
    fn test_weather_rejected() {
        let mut session = session(MockLibrary {
            reject_weather: true,
            ..Default::default()
        });
        session.initialize().unwrap();
        let err = session.push_weather(&["bad".into()]).unwrap_err();
        assert!(matches!(
            err,
            VarroaPopError::EngineRejected {
                what: "weather",
                ..
            }
        ));
        assert!(err.to_string().contains("something went wrong"));
        assert_eq!(
            session.library().calls[1..3],
            ["clear_weather", "set_weather"]
        );
    }

    #[test]
    fn test_push_line_with_nul() {
        let mut session = session(MockLibrary::default());
        session.initialize().unwrap();
        assert!(matches!(
            session.push_contamination_table(&["a\0b".into()]),
            Err(VarroaPopError::InvalidArgument { .. })
        ));
        assert_eq!(session.library().count("set_contamination_table"), 0);
    }

    #[rstest]
    fn test_run_failure_clears_buffers(parameters: ParameterSet) {
        let mut session = session(MockLibrary {
            fail_run: true,
            ..Default::default()
        });
        session.initialize().unwrap();
        session.push_parameters(&parameters).unwrap();

        let err = session.run().unwrap_err();
        assert!(matches!(err, VarroaPopError::EngineRun { .. }));
        assert!(err.diagnostics().contains(&"Error: something went wrong".to_string()));

        let calls = &session.library().calls;
        assert_eq!(
            calls[calls.len() - 3..],
            ["clear_results", "clear_errors", "clear_info"]
        );
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn test_clear_buffers_failure() {
        let mut session = session(MockLibrary {
            fail_clear: true,
            ..Default::default()
        });
        session.initialize().unwrap();

        let err = session.clear_buffers().unwrap_err();
        assert!(matches!(
            err,
            VarroaPopError::EngineRejected {
                what: "buffer clear",
                ..
            }
        ));
        assert_eq!(
            err.diagnostics()[..3],
            [
                "failed to clear the results buffer",
                "failed to clear the errors buffer",
                "failed to clear the info buffer",
            ]
        );
    }

    #[rstest]
    fn test_run_reports_clear_failure(parameters: ParameterSet) {
        let mut session = session(MockLibrary {
            fail_clear: true,
            ..Default::default()
        });
        session.initialize().unwrap();
        session.push_parameters(&parameters).unwrap();

        assert!(matches!(
            session.run(),
            Err(VarroaPopError::EngineRejected {
                what: "buffer clear",
                ..
            })
        ));
        assert_eq!(session.library().count("clear_info"), 1);
        assert_eq!(session.state(), SessionState::Ran);
    }

    #[rstest]
    fn test_trailing_line_kept(parameters: ParameterSet) {
        let mut session = LibrarySession::new(
            MockLibrary::default(),
            ResultSchema::for_version(SchemaVersion::Library),
            SessionOptions {
                discard_trailing_line: false,
                ..Default::default()
            },
        );
        session.initialize().unwrap();
        session.push_parameters(&parameters).unwrap();

        let raw = session.run_raw().unwrap();
        assert_eq!(raw.results.last().map(String::as_str), Some("end"));
        assert_eq!(raw.info, ["Info: ran", ""]);

        // The sentinel line doesn't fit the schema
        assert!(matches!(
            ResultTable::parse(&raw.results, &ResultSchema::for_version(SchemaVersion::Library)),
            Err(VarroaPopError::SchemaMismatch { found: 1, .. })
        ));
    }

    #[rstest]
    fn test_debug_mode(parameters: ParameterSet, weather_dir: TempDir) {
        let weather_path = resolve("durham", weather_dir.path());
        let files = RunFiles::new(weather_dir.path(), &RunIdentity::unique());
        let mut session = LibrarySession::new(
            MockLibrary::default(),
            ResultSchema::for_version(SchemaVersion::Library),
            SessionOptions {
                debug: true,
                keep_files: true,
                write_engine_log: true,
                ..Default::default()
            },
        );

        let result = Engine::run(
            &mut session,
            &run_request(&parameters, &weather_path, &files),
        )
        .unwrap();
        assert!(result.is_none());

        let input = fs::read_to_string(&files.input).unwrap();
        assert!(input.lines().any(|line| line == "icworkeradults=18000"));
        assert!(!input.contains("WeatherFileName"));
        let results = fs::read_to_string(&files.results).unwrap();
        assert_eq!(results.lines().count(), 3 + 118);
        let log = fs::read_to_string(&files.log).unwrap();
        assert!(log.starts_with("Info: ran"));
    }

    #[test]
    fn test_close_twice() {
        let mut session = session(MockLibrary::default());
        session.initialize().unwrap();
        session.close();
        session.close();
        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.library().count("release"), 1);

        assert!(matches!(
            session.run(),
            Err(VarroaPopError::Configuration { .. })
        ));
        assert!(matches!(
            session.clear_buffers(),
            Err(VarroaPopError::Configuration { .. })
        ));
        assert_eq!(session.library().count("run_simulation"), 0);
    }

    #[test]
    fn test_decode_lines() {
        let raw = vec![b"a".to_vec(), b"b\xff".to_vec(), b"c".to_vec()];
        assert_eq!(decode_lines(raw.clone(), true), ["a", "b\u{fffd}"]);
        assert_eq!(decode_lines(raw, false).len(), 3);
        assert!(decode_lines(Vec::new(), true).is_empty());
    }
}
