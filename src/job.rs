//! Job identifiers and the file names derived from them.
use crate::error::{VarroaPopError, VarroaPopResult};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Subfolder of the working directory for input files
const INPUT_DIR_NAME: &str = "input";

/// Subfolder of the working directory for engine log files
const LOG_DIR_NAME: &str = "logs";

/// Subfolder of the working directory for raw result files
const OUTPUT_DIR_NAME: &str = "output";

/// Identifies a run so that concurrent runs sharing a directory don't overwrite each other.
///
/// Without a job ID, fixed file names are reused between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunIdentity(Option<String>);

impl RunIdentity {
    /// A new random 8-hex-character job ID
    pub fn unique() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(Some(id))
    }

    /// No job ID: fixed file names are used
    pub fn shared() -> Self {
        Self(None)
    }

    /// Create a unique identity if `unique` is set, otherwise a shared one
    pub fn new(unique: bool) -> Self {
        if unique { Self::unique() } else { Self::shared() }
    }

    /// The job ID, if there is one
    pub fn job_id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// A file name of the form `<stem>[_<id>].txt`
    fn file_name(&self, stem: &str) -> String {
        match &self.0 {
            Some(id) => format!("{stem}_{id}.txt"),
            None => format!("{stem}.txt"),
        }
    }
}

/// The files used by a single run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFiles {
    /// The engine input file
    pub input: PathBuf,
    /// The engine log file
    pub log: PathBuf,
    /// The raw results file
    pub results: PathBuf,
}

impl RunFiles {
    /// The file paths for a run under `working_dir`
    pub fn new(working_dir: &Path, identity: &RunIdentity) -> Self {
        Self {
            input: working_dir
                .join(INPUT_DIR_NAME)
                .join(identity.file_name("vp_input")),
            log: working_dir
                .join(LOG_DIR_NAME)
                .join(identity.file_name("vp_log")),
            results: working_dir
                .join(OUTPUT_DIR_NAME)
                .join(identity.file_name("vp_results")),
        }
    }

    /// Create the folders the files live in
    pub fn create_dirs(&self) -> VarroaPopResult<()> {
        for path in [&self.input, &self.log, &self.results] {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(|err| VarroaPopError::io(dir, err))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_unique_identity() {
        let identity = RunIdentity::unique();
        let id = identity.job_id().unwrap();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(RunIdentity::unique(), identity);
    }

    #[test]
    fn test_shared_files() {
        let files = RunFiles::new(Path::new("files"), &RunIdentity::shared());
        assert_eq!(files.input, Path::new("files/input/vp_input.txt"));
        assert_eq!(files.log, Path::new("files/logs/vp_log.txt"));
        assert_eq!(files.results, Path::new("files/output/vp_results.txt"));
    }

    #[test]
    fn test_unique_files() {
        let identity = RunIdentity::unique();
        let id = identity.job_id().unwrap();
        let files = RunFiles::new(Path::new("files"), &identity);
        assert_eq!(
            files.input,
            Path::new("files/input").join(format!("vp_input_{id}.txt"))
        );
        assert_eq!(
            files.results,
            Path::new("files/output").join(format!("vp_results_{id}.txt"))
        );
    }

    #[test]
    fn test_create_dirs() {
        let dir = tempdir().unwrap();
        let files = RunFiles::new(dir.path(), &RunIdentity::shared());
        files.create_dirs().unwrap();
        assert!(dir.path().join("input").is_dir());
        assert!(dir.path().join("logs").is_dir());
        assert!(dir.path().join("output").is_dir());
    }
}
