//! Running the console build of the engine as a child process.
use super::{Engine, RunRequest};
use crate::error::{VarroaPopError, VarroaPopResult};
use crate::input_file::write_input_file;
use crate::results::ResultTable;
use crate::schema::ResultSchema;
use crate::weather::check_weather_file;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// How often to check whether a child process with a timeout has exited
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// The flag spellings the engine executable understands.
///
/// These depend on the engine build, so they are configurable rather than fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFlags {
    /// Flags placed straight after the session file (batch mode)
    pub batch: Vec<String>,
    /// Flag preceding the results file path
    pub output: String,
    /// Flag preceding the input file path
    pub input: String,
    /// Flag preceding the log file path
    pub log: String,
    /// Flag preceding the weather file path, if the engine takes one on the command line
    pub weather: Option<String>,
}

impl Default for CommandFlags {
    fn default() -> Self {
        Self {
            batch: vec!["/b".into()],
            output: "/or".into(),
            input: "/i".into(),
            log: "/ol".into(),
            weather: None,
        }
    }
}

/// The arguments of a single engine invocation
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// Path to the engine executable
    pub executable: &'a Path,
    /// Path to the engine's session (`.vrp`) file
    pub session_file: &'a Path,
    /// Path to the input file
    pub input_file: &'a Path,
    /// Path the engine should write results to
    pub output_file: &'a Path,
    /// Whether the engine should write a log file
    pub write_log: bool,
    /// Path for the log file (required if `write_log` is set)
    pub log_file: Option<&'a Path>,
    /// Weather file to pass on the command line (only used if a weather flag is configured)
    pub weather_path: Option<&'a Path>,
    /// Additional flags, appended verbatim
    pub extra_flags: &'a [String],
}

/// The state of a [`ProcessRunner`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunState {
    /// No process has been started
    #[default]
    Idle,
    /// A process is running
    Running,
    /// The last process exited successfully
    Completed,
    /// The last process failed to start, exited unsuccessfully or timed out
    Failed,
}

/// Builds engine command lines and runs them to completion
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    flags: CommandFlags,
    timeout: Option<Duration>,
    state: RunState,
}

impl ProcessRunner {
    /// Create a new runner.
    ///
    /// # Arguments
    ///
    /// * `flags` - Flag spellings for the engine build
    /// * `timeout` - Kill the engine if it runs for longer than this
    pub fn new(flags: CommandFlags, timeout: Option<Duration>) -> Self {
        Self {
            flags,
            timeout,
            state: RunState::Idle,
        }
    }

    /// The state of the most recent run
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Build the engine command line.
    ///
    /// The order is: executable, session file, batch flags, output flag and path, input flag and
    /// path, then optionally the log flag and path, the weather flag and path and any extra flags.
    /// Each path is passed as a single argument.
    pub fn build_command(&self, invocation: &Invocation) -> VarroaPopResult<Command> {
        let mut command = Command::new(invocation.executable);
        command
            .arg(invocation.session_file)
            .args(&self.flags.batch)
            .arg(&self.flags.output)
            .arg(invocation.output_file)
            .arg(&self.flags.input)
            .arg(invocation.input_file);

        if invocation.write_log {
            let log_file = invocation.log_file.ok_or_else(|| {
                VarroaPopError::configuration("a log file was requested but no log path was given")
            })?;
            command.arg(&self.flags.log).arg(log_file);
        }

        if let (Some(flag), Some(weather_path)) = (&self.flags.weather, invocation.weather_path) {
            command.arg(flag).arg(weather_path);
        }

        command.args(invocation.extra_flags);

        Ok(command)
    }

    /// Run the engine and wait for it to exit.
    ///
    /// Standard output and error are captured and logged. An unsuccessful exit status is reported
    /// as [`VarroaPopError::EngineRun`] with the captured standard error lines.
    pub fn run(&mut self, invocation: &Invocation) -> VarroaPopResult<ExitStatus> {
        let result = self.run_inner(invocation);
        self.state = if result.is_ok() {
            RunState::Completed
        } else {
            RunState::Failed
        };

        result
    }

    fn run_inner(&mut self, invocation: &Invocation) -> VarroaPopResult<ExitStatus> {
        check_exists("Engine executable", invocation.executable)?;
        check_exists("Session file", invocation.session_file)?;

        let mut command = self.build_command(invocation)?;
        command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        debug!("Running engine: {command:?}");

        let mut child = command
            .spawn()
            .map_err(|err| VarroaPopError::io(invocation.executable, err))?;
        self.state = RunState::Running;

        let stdout = capture(child.stdout.take());
        let stderr = capture(child.stderr.take());
        let status = match self.timeout {
            Some(timeout) => wait_with_timeout(&mut child, timeout),
            None => child
                .wait()
                .map_err(|err| VarroaPopError::io(invocation.executable, err)),
        };

        // After a timeout the pipes may be held open by the engine's own children, so the
        // capture threads are left to finish on their own
        if let Err(err @ VarroaPopError::Timeout { .. }) = status {
            return Err(err);
        }
        let stdout = join_capture(stdout);
        let stderr = join_capture(stderr);

        for line in stdout.lines() {
            debug!("engine: {line}");
        }
        for line in stderr.lines() {
            warn!("engine: {line}");
        }

        let status = status?;
        if status.success() {
            return Ok(status);
        }

        let status_text = status.code().map_or_else(
            || "terminated by signal".to_string(),
            |code| format!("exit code {code}"),
        );
        Err(VarroaPopError::EngineRun {
            message: format!("engine process failed with {status_text}"),
            diagnostics: stderr.lines().map(str::to_string).collect(),
        })
    }
}

/// Check that a file the engine needs exists
fn check_exists(what: &'static str, path: &Path) -> VarroaPopResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(VarroaPopError::NotFound {
            what,
            path: path.to_path_buf(),
        })
    }
}

/// Delete a file left over from an earlier run, if there is one
fn remove_stale(path: &Path) -> VarroaPopResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed stale file {}", path.display());
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(VarroaPopError::io(path, err)),
    }
}

/// Read a child's output stream to completion on a separate thread
fn capture<R: Read + Send + 'static>(stream: Option<R>) -> Option<JoinHandle<String>> {
    stream.map(|mut stream| {
        thread::spawn(move || {
            let mut bytes = Vec::new();
            // Whatever was read before an error is still useful
            let _ = stream.read_to_end(&mut bytes);
            String::from_utf8_lossy(&bytes).into_owned()
        })
    })
}

/// Collect the output captured by [`capture`]
fn join_capture(handle: Option<JoinHandle<String>>) -> String {
    handle
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

/// Wait for the child to exit, killing it if it takes longer than `timeout`
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> VarroaPopResult<ExitStatus> {
    let start = Instant::now();
    let io_err = |err| VarroaPopError::io(PathBuf::from("<engine process>"), err);
    loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            return Ok(status);
        }

        if start.elapsed() >= timeout {
            warn!("Engine exceeded timeout of {}s; killing it", timeout.as_secs());
            child.kill().map_err(io_err)?;
            child.wait().map_err(io_err)?;
            return Err(VarroaPopError::Timeout {
                seconds: timeout.as_secs(),
            });
        }

        thread::sleep(POLL_INTERVAL);
    }
}

/// The engine's console executable
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    executable: PathBuf,
    session_file: PathBuf,
    runner: ProcessRunner,
    write_log: bool,
    extra_flags: Vec<String>,
    schema: ResultSchema,
}

impl ProcessEngine {
    /// Create a new process engine.
    ///
    /// # Arguments
    ///
    /// * `executable` - Path to the engine executable
    /// * `session_file` - Path to the engine's session (`.vrp`) file
    /// * `runner` - Runner with the flag spellings and timeout to use
    /// * `schema` - Layout of the results file the executable writes
    pub fn new(
        executable: impl Into<PathBuf>,
        session_file: impl Into<PathBuf>,
        runner: ProcessRunner,
        schema: ResultSchema,
    ) -> Self {
        Self {
            executable: executable.into(),
            session_file: session_file.into(),
            runner,
            write_log: false,
            extra_flags: Vec::new(),
            schema,
        }
    }

    /// Ask the engine to write a log file for each run
    pub fn with_log(mut self, write_log: bool) -> Self {
        self.write_log = write_log;
        self
    }

    /// Append extra flags to every command line
    pub fn with_extra_flags(mut self, extra_flags: Vec<String>) -> Self {
        self.extra_flags = extra_flags;
        self
    }

    /// The state of the most recent run
    pub fn state(&self) -> RunState {
        self.runner.state()
    }
}

impl Engine for ProcessEngine {
    fn name(&self) -> &'static str {
        "process"
    }

    fn run(&mut self, request: &RunRequest) -> VarroaPopResult<Option<ResultTable>> {
        if request.contamination.is_some() {
            return Err(VarroaPopError::configuration(
                "contamination tables can only be pushed to the in-process engine; reference the \
                file from the parameters instead",
            ));
        }

        // Fail before writing anything if the weather file is missing
        check_weather_file(request.weather_path)?;

        request.files.create_dirs()?;
        remove_stale(&request.files.results)?;
        remove_stale(&request.files.log)?;
        write_input_file(
            request.parameters,
            Some(request.weather_path),
            &request.files.input,
        )?;

        let invocation = Invocation {
            executable: &self.executable,
            session_file: &self.session_file,
            input_file: &request.files.input,
            output_file: &request.files.results,
            write_log: self.write_log,
            log_file: Some(&request.files.log),
            weather_path: Some(request.weather_path),
            extra_flags: &self.extra_flags,
        };
        self.runner.run(&invocation)?;
        info!("Engine finished; reading {}", request.files.results.display());

        ResultTable::from_path(&request.files.results, &self.schema).map(Some)
    }
}
