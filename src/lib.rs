//! Preparing, running and reading simulations of the VarroaPop honeybee colony model.
//!
//! The engine itself is external: either a console executable run once per simulation or a shared
//! library kept loaded across simulations. This crate writes its inputs, invokes it and parses its
//! results.
#![warn(missing_docs)]
use std::path::PathBuf;

pub mod cli;
pub mod engine;
pub mod error;
pub mod input_file;
pub mod job;
pub mod log;
pub mod model;
pub mod output;
pub mod parameters;
pub mod results;
pub mod schema;
pub mod settings;
pub mod weather;

pub use error::{VarroaPopError, VarroaPopResult};
pub use model::VarroaPop;

/// Get the folder the program's settings are read from
pub fn get_varroapop_config_dir() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("varroapop");

    path
}
