//! The foreign-function surface of the engine's shared-library build.
//!
//! [`EngineLibrary`] is the seam between the session logic and the native code, so that sessions
//! can be tested without a native build. [`NativeLibrary`] implements it by loading the shared
//! object at runtime.
use crate::error::{VarroaPopError, VarroaPopResult};
use libloading::{Library, Symbol};
use log::{debug, error};
use std::cell::Cell;
use std::ffi::{CStr, CString, c_char, c_int};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicBool, Ordering};

/// Whether a native engine library is currently loaded in this process.
///
/// The engine keeps global state, so only one instance may be live at a time.
static LIBRARY_LOADED: AtomicBool = AtomicBool::new(false);

const INITIALIZE_MODEL: &[u8] = b"InitializeModel\0";
const CLEAR_RESULTS: &[u8] = b"ClearResultsBuffer\0";
const CLEAR_WEATHER: &[u8] = b"ClearWeather\0";
const CLEAR_ERRORS: &[u8] = b"ClearErrorList\0";
const CLEAR_INFO: &[u8] = b"ClearInfoList\0";
const SET_INITIAL_CONDITIONS: &[u8] = b"SetICVariablesCPA\0";
const SET_WEATHER: &[u8] = b"SetWeatherCPA\0";
const SET_CONTAMINATION_TABLE: &[u8] = b"SetContaminationTableCPA\0";
const RUN_SIMULATION: &[u8] = b"RunSimulation\0";
const GET_RESULTS: &[u8] = b"GetResultsCPA\0";
const GET_ERRORS: &[u8] = b"GetErrorListCPA\0";
const GET_INFO: &[u8] = b"GetInfoListCPA\0";

/// Every symbol the wrapper calls, checked when the library is loaded
const REQUIRED_SYMBOLS: [&[u8]; 12] = [
    INITIALIZE_MODEL,
    CLEAR_RESULTS,
    CLEAR_WEATHER,
    CLEAR_ERRORS,
    CLEAR_INFO,
    SET_INITIAL_CONDITIONS,
    SET_WEATHER,
    SET_CONTAMINATION_TABLE,
    RUN_SIMULATION,
    GET_RESULTS,
    GET_ERRORS,
    GET_INFO,
];

type NoArgFn = unsafe extern "C" fn() -> bool;
type SetLinesFn = unsafe extern "C" fn(*mut *mut c_char, c_int) -> bool;
type SetInitialConditionsFn = unsafe extern "C" fn(*mut *mut c_char, c_int, bool) -> bool;
type GetLinesFn = unsafe extern "C" fn(*mut *mut *mut c_char, *mut c_int) -> bool;

/// The calls the wrapper makes into the engine.
///
/// Each returns whether the engine reported success. Line getters return the raw bytes of each
/// line, or `None` if the call failed.
pub trait EngineLibrary {
    /// Set up the engine's model state
    fn initialize_model(&mut self) -> bool;
    /// Empty the results buffer
    fn clear_results(&mut self) -> bool;
    /// Remove any loaded weather
    fn clear_weather(&mut self) -> bool;
    /// Empty the error list
    fn clear_errors(&mut self) -> bool;
    /// Empty the info list
    fn clear_info(&mut self) -> bool;
    /// Set initial conditions and parameters from `key=value` lines, replacing previous ones
    fn set_initial_conditions(&mut self, lines: &[String]) -> bool;
    /// Load weather from the lines of a weather file
    fn set_weather(&mut self, lines: &[String]) -> bool;
    /// Load a contamination table from its lines
    fn set_contamination_table(&mut self, lines: &[String]) -> bool;
    /// Run one simulation
    fn run_simulation(&mut self) -> bool;
    /// Get the result lines of the last simulation
    fn results(&mut self) -> Option<Vec<Vec<u8>>>;
    /// Get the engine's error list
    fn errors(&mut self) -> Option<Vec<Vec<u8>>>;
    /// Get the engine's info list
    fn info(&mut self) -> Option<Vec<Vec<u8>>>;
    /// Release the engine. No other call may be made afterwards.
    fn release(&mut self);
}

/// The engine's shared library, loaded at runtime.
///
/// Only one may be loaded per process. It can be moved between threads but not shared between
/// them.
#[derive(Debug)]
pub struct NativeLibrary {
    library: Option<Library>,
    path: PathBuf,
    _not_sync: PhantomData<Cell<()>>,
}

impl NativeLibrary {
    /// Load the engine library at `path`.
    ///
    /// Fails if the file doesn't exist, can't be loaded, lacks a required symbol or another engine
    /// library is already loaded.
    pub fn load(path: &Path) -> VarroaPopResult<Self> {
        if !path.is_file() {
            return Err(VarroaPopError::NotFound {
                what: "Engine library",
                path: path.to_path_buf(),
            });
        }

        if LIBRARY_LOADED.swap(true, Ordering::SeqCst) {
            return Err(VarroaPopError::configuration(
                "an engine library is already loaded in this process",
            ));
        }

        match Self::open(path) {
            Ok(library) => {
                debug!("Loaded engine library {}", path.display());
                Ok(Self {
                    library: Some(library),
                    path: path.to_path_buf(),
                    _not_sync: PhantomData,
                })
            }
            Err(err) => {
                LIBRARY_LOADED.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    fn open(path: &Path) -> VarroaPopResult<Library> {
        // SAFETY: loading the engine runs its initialisers, which we trust as we do its functions
        let library = unsafe { Library::new(path) }.map_err(|err| {
            VarroaPopError::configuration(format!(
                "failed to load engine library {}: {err}",
                path.display()
            ))
        })?;

        for name in REQUIRED_SYMBOLS {
            // SAFETY: the symbol is only looked up here, not called
            if let Err(err) = unsafe { library.get::<NoArgFn>(name) } {
                return Err(VarroaPopError::configuration(format!(
                    "engine library {} is missing symbol {}: {err}",
                    path.display(),
                    String::from_utf8_lossy(&name[..name.len() - 1])
                )));
            }
        }

        Ok(library)
    }

    /// The path the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a symbol, logging if the library has been released
    fn symbol<T>(&self, name: &[u8]) -> Option<Symbol<'_, T>> {
        let Some(library) = &self.library else {
            error!("Engine library {} called after release", self.path.display());
            return None;
        };

        // SAFETY: the symbol types match the engine's exported C signatures
        unsafe { library.get::<T>(name) }
            .inspect_err(|err| error!("Engine symbol lookup failed: {err}"))
            .ok()
    }

    fn call_no_arg(&self, name: &[u8]) -> bool {
        self.symbol::<NoArgFn>(name)
            // SAFETY: the function takes no arguments
            .is_some_and(|func| unsafe { func() })
    }

    fn call_set_lines(&self, name: &[u8], lines: &[String]) -> bool {
        let Some(mut lines) = CLines::new(lines) else {
            return false;
        };
        self.symbol::<SetLinesFn>(name).is_some_and(|func| {
            // SAFETY: the array and strings stay alive for the duration of the call and the
            // engine copies what it needs
            unsafe { func(lines.as_mut_ptr(), lines.count) }
        })
    }

    fn call_get_lines(&self, name: &[u8]) -> Option<Vec<Vec<u8>>> {
        let func = self.symbol::<GetLinesFn>(name)?;
        let mut array: *mut *mut c_char = ptr::null_mut();
        let mut count: c_int = 0;

        // SAFETY: both out-pointers are valid for writes
        if !unsafe { func(&raw mut array, &raw mut count) } {
            return None;
        }

        if array.is_null() {
            return Some(Vec::new());
        }

        // The engine keeps ownership of the array; copy the lines out before the next call
        let count = usize::try_from(count).unwrap_or(0);
        let lines = (0..count)
            .filter_map(|idx| {
                // SAFETY: the engine guarantees `count` entries
                let line = unsafe { *array.add(idx) };
                // SAFETY: non-null entries are NUL-terminated strings owned by the engine
                (!line.is_null()).then(|| unsafe { CStr::from_ptr(line) }.to_bytes().to_vec())
            })
            .collect();

        Some(lines)
    }
}

impl EngineLibrary for NativeLibrary {
    fn initialize_model(&mut self) -> bool {
        self.call_no_arg(INITIALIZE_MODEL)
    }

    fn clear_results(&mut self) -> bool {
        self.call_no_arg(CLEAR_RESULTS)
    }

    fn clear_weather(&mut self) -> bool {
        self.call_no_arg(CLEAR_WEATHER)
    }

    fn clear_errors(&mut self) -> bool {
        self.call_no_arg(CLEAR_ERRORS)
    }

    fn clear_info(&mut self) -> bool {
        self.call_no_arg(CLEAR_INFO)
    }

    fn set_initial_conditions(&mut self, lines: &[String]) -> bool {
        let Some(mut lines) = CLines::new(lines) else {
            return false;
        };
        self.symbol::<SetInitialConditionsFn>(SET_INITIAL_CONDITIONS)
            .is_some_and(|func| {
                // SAFETY: as for `call_set_lines`; previous initial conditions are reset
                unsafe { func(lines.as_mut_ptr(), lines.count, true) }
            })
    }

    fn set_weather(&mut self, lines: &[String]) -> bool {
        self.call_set_lines(SET_WEATHER, lines)
    }

    fn set_contamination_table(&mut self, lines: &[String]) -> bool {
        self.call_set_lines(SET_CONTAMINATION_TABLE, lines)
    }

    fn run_simulation(&mut self) -> bool {
        self.call_no_arg(RUN_SIMULATION)
    }

    fn results(&mut self) -> Option<Vec<Vec<u8>>> {
        self.call_get_lines(GET_RESULTS)
    }

    fn errors(&mut self) -> Option<Vec<Vec<u8>>> {
        self.call_get_lines(GET_ERRORS)
    }

    fn info(&mut self) -> Option<Vec<Vec<u8>>> {
        self.call_get_lines(GET_INFO)
    }

    fn release(&mut self) {
        if let Some(library) = self.library.take() {
            if let Err(err) = library.close() {
                error!("Failed to unload engine library: {err}");
            }
            LIBRARY_LOADED.store(false, Ordering::SeqCst);
            debug!("Released engine library {}", self.path.display());
        }
    }
}

impl Drop for NativeLibrary {
    fn drop(&mut self) {
        self.release();
    }
}

/// Lines converted to a C array of NUL-terminated strings
struct CLines {
    // Owns the strings the pointers refer to
    _strings: Vec<CString>,
    pointers: Vec<*mut c_char>,
    count: c_int,
}

impl CLines {
    /// Convert lines, failing if any contains a NUL byte or there are too many
    fn new(lines: &[String]) -> Option<Self> {
        let strings: Vec<CString> = lines
            .iter()
            .map(|line| CString::new(line.as_bytes()))
            .collect::<Result<_, _>>()
            .inspect_err(|err| error!("Cannot pass line to engine: {err}"))
            .ok()?;
        let count = c_int::try_from(strings.len()).ok()?;
        let pointers = strings
            .iter()
            .map(|string| string.as_ptr().cast_mut())
            .collect();

        Some(Self {
            _strings: strings,
            pointers,
            count,
        })
    }

    fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.pointers.as_mut_ptr()
    }
}
