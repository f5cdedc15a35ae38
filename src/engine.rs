//! Invoking the VarroaPop engine.
//!
//! The engine is available either as a console executable ([`process`]) or as a shared library
//! loaded into this process ([`library`] and [`session`]). Both are driven through the [`Engine`]
//! trait.
use crate::error::VarroaPopResult;
use crate::job::RunFiles;
use crate::parameters::ParameterSet;
use crate::results::ResultTable;
use std::path::Path;

pub mod library;
pub mod process;
pub mod session;

/// Everything the engine needs for one simulation
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    /// The merged parameter set
    pub parameters: &'a ParameterSet,
    /// The resolved weather file
    pub weather_path: &'a Path,
    /// Contents of a contamination table, if one was supplied
    pub contamination: Option<&'a [String]>,
    /// Where to write input, log and result files
    pub files: &'a RunFiles,
}

/// A way of running simulations
pub trait Engine {
    /// A short name for the engine, for logging
    fn name(&self) -> &'static str;

    /// Run one simulation.
    ///
    /// # Returns
    ///
    /// The parsed results, or `None` if the engine was configured not to produce any (debug mode)
    fn run(&mut self, request: &RunRequest) -> VarroaPopResult<Option<ResultTable>>;
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn run(&mut self, request: &RunRequest) -> VarroaPopResult<Option<ResultTable>> {
        (**self).run(request)
    }
}
