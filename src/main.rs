//! Provides the main entry point to the program.
use human_panic::setup_panic;
use varroapop::cli::run_cli;
use varroapop::log;

fn main() {
    setup_panic!();

    if let Err(err) = run_cli() {
        if log::is_logger_initialised() {
            ::log::error!("{err:?}");
        } else {
            eprintln!("Error: {err:?}");
        }

        std::process::exit(1);
    }
}
