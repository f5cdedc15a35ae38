//! The command line interface for running and inspecting VarroaPop simulations.
use crate::engine::Engine;
use crate::engine::library::NativeLibrary;
use crate::engine::process::ProcessEngine;
use crate::engine::session::LibrarySession;
use crate::job::RunIdentity;
use crate::log;
use crate::model::VarroaPop;
use crate::output::metadata::{RunMetadata, write_metadata};
use crate::output::{
    OutputFormat, create_output_directory, get_output_dir, write_results, write_results_to_dir,
};
use crate::parameters::ParameterValue;
use crate::results::ResultTable;
use crate::schema::{ResultSchema, SchemaVersion};
use crate::settings::{Backend, Settings};
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;
pub mod weather;
use weather::WeatherSubcommands;

/// The command line interface for the VarroaPop wrapper.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for the run command
#[derive(Args, Default)]
pub struct RunOpts {
    /// Set a parameter, e.g. `--param ICWorkerAdults=18000` (may be repeated)
    #[arg(short, long = "param", value_name = "KEY=VALUE", value_parser = parse_parameter)]
    pub params: Vec<(String, ParameterValue)>,
    /// A `key=value` input file to read parameters from (applied before `--param`)
    #[arg(short, long)]
    pub input_file: Option<PathBuf>,
    /// Weather preset name or path to a weather file
    #[arg(short, long)]
    pub weather: Option<String>,
    /// A contamination table to push to the engine (library backend only)
    #[arg(long)]
    pub contamination: Option<PathBuf>,
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
    /// Format of the results file
    #[arg(long, value_enum, default_value_t)]
    pub format: OutputFormat,
    /// Override the engine backend from the settings file
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,
}

/// Options for the parse command
#[derive(Args, Default)]
pub struct ParseOpts {
    /// A known results layout
    #[arg(long, value_enum, conflicts_with = "schema_file")]
    pub schema: Option<SchemaVersion>,
    /// A TOML file describing a custom results layout
    #[arg(long)]
    pub schema_file: Option<PathBuf>,
    /// Where to write the parsed table (`.json` for JSON, otherwise CSV). Printed as JSON if
    /// omitted.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run a simulation.
    Run {
        /// Run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Parse an engine results file.
    Parse {
        /// Path to the results file.
        results_file: PathBuf,
        /// Parse options
        #[command(flatten)]
        opts: ParseOpts,
    },
    /// Inspect the bundled weather presets.
    Weather {
        /// The available subcommands for weather presets.
        #[command(subcommand)]
        subcommand: WeatherSubcommands,
    },
    /// Manage the program settings file.
    Settings {
        /// The available subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run { opts } => handle_run_command(&opts, None),
            Self::Parse { results_file, opts } => {
                handle_parse_command(&results_file, &opts, None)
            }
            Self::Weather { subcommand } => subcommand.execute(),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse a `KEY=VALUE` command-line argument
fn parse_parameter(arg: &str) -> Result<(String, ParameterValue), String> {
    let (key, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{arg}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing parameter name in '{arg}'"));
    }

    Ok((key.to_string(), ParameterValue::parse(value.trim())))
}

/// Parse CLI arguments and start the program
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ varroapop --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Build the engine selected in the settings
fn create_engine(settings: &Settings, schema: ResultSchema) -> Result<Box<dyn Engine>> {
    let engine: Box<dyn Engine> = match settings.backend {
        Backend::Process => Box::new(
            ProcessEngine::new(
                &settings.executable,
                &settings.session_file,
                settings.process_runner(),
                schema,
            )
            .with_log(settings.write_engine_log)
            .with_extra_flags(settings.extra_flags.clone()),
        ),
        Backend::Library => {
            let library = NativeLibrary::load(&settings.library)
                .context("Failed to load engine library.")?;
            Box::new(LibrarySession::new(
                library,
                schema,
                settings.session_options(),
            ))
        }
    };

    Ok(engine)
}

/// Handle the `run` command.
pub fn handle_run_command(opts: &RunOpts, settings: Option<Settings>) -> Result<()> {
    let mut settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // The backend can be overridden on the command line
    if let Some(backend) = opts.backend {
        settings.backend = backend;
    }

    let identity = RunIdentity::new(settings.unique_file_names);
    let output_path = opts
        .output_dir
        .clone()
        .unwrap_or_else(|| get_output_dir(identity.job_id()));
    let overwrite = create_output_directory(&output_path, opts.overwrite).with_context(|| {
        format!(
            "Failed to create output directory: {}",
            output_path.display()
        )
    })?;

    log::init(Some(settings.log_level.as_str()), Some(output_path.as_path()))
        .context("Failed to initialise logging.")?;
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    let schema = settings.result_schema()?;
    let engine = create_engine(&settings, schema)?;
    let mut model = VarroaPop::new(engine, settings.model_paths()?, identity);

    if let Some(input_file) = &opts.input_file {
        model
            .load_input_file(input_file)
            .with_context(|| format!("Failed to read input file {}", input_file.display()))?;
        info!("Loaded parameters from {}", input_file.display());
    }
    model.set_parameters(opts.params.iter().cloned(), opts.weather.as_deref());
    if let Some(contamination) = &opts.contamination {
        model.load_contamination_file(contamination)?;
    }

    let result_rows = model
        .run_model()
        .context("Simulation failed.")?
        .map(ResultTable::len);

    if let Some(table) = model.get_output() {
        let file_path = write_results_to_dir(table, &output_path, opts.format)?;
        info!("Wrote {} rows to {}", table.len(), file_path.display());
    } else {
        info!("Debug mode: no results were parsed");
    }

    let weather_path = model.weather_path();
    write_metadata(
        &output_path,
        RunMetadata::new(
            model.engine().name(),
            model.job_id(),
            &weather_path,
            model.parameters().len(),
            result_rows,
        ),
    )
    .context("Failed to save metadata.")?;

    info!("Simulation complete!");
    Ok(())
}

/// The schema for the parse command: command-line options first, then the settings file
fn choose_schema(opts: &ParseOpts, settings: &Settings) -> Result<ResultSchema> {
    if let Some(path) = &opts.schema_file {
        return ResultSchema::from_path(path)
            .with_context(|| format!("Could not load schema file {}", path.display()));
    }

    match opts.schema {
        Some(version) => Ok(ResultSchema::for_version(version)),
        None => settings.result_schema(),
    }
}

/// Handle the `parse` command.
pub fn handle_parse_command(
    results_file: &Path,
    opts: &ParseOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = if let Some(settings) = settings {
        settings
    } else {
        Settings::load().context("Failed to load settings.")?
    };

    // We won't save log files when parsing
    if !log::is_logger_initialised() {
        log::init(Some(settings.log_level.as_str()), None).context("Failed to initialise logging.")?;
    }

    let schema = choose_schema(opts, &settings)?;
    let table = ResultTable::from_path(results_file, &schema)
        .with_context(|| format!("Failed to parse {}", results_file.display()))?;

    match &opts.output {
        Some(output) => {
            let is_json = output
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            let format = if is_json {
                OutputFormat::Json
            } else {
                OutputFormat::Csv
            };
            write_results(&table, output, format)?;
            info!("Wrote {} rows to {}", table.len(), output.display());
        }
        None => println!("{}", table.to_json()?),
    }

    Ok(())
}
