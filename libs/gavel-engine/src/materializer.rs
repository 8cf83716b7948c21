/// Source Materializer
///
/// Allocates one uniquely named directory per grading run under an injected
/// root and writes the submission's source there under the file name its
/// toolchain expects. The returned [`ExecutionJob`] owns that directory and
/// removes it when dropped, so every exit path of a grading run (verdict,
/// early return, panic, cancelled future) leaves nothing behind.

use crate::languages::java;
use gavel_common::types::Language;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("no public entry point found")]
    NoEntryPoint,
    #[error("failed to prepare job directory: {0}")]
    Io(#[from] io::Error),
}

/// Ephemeral working area of one grading run
#[derive(Debug)]
pub struct ExecutionJob {
    pub id: Uuid,
    pub language: Language,
    pub dir: PathBuf,
    pub source_path: PathBuf,
    /// Compiled output; `None` for interpreted languages
    pub artifact_path: Option<PathBuf>,
    /// Public class the managed runtime must be started with
    pub entry_point: Option<String>,
}

impl Drop for ExecutionJob {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => debug!(job_id = %self.id, dir = %self.dir.display(), "Job directory removed"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(job_id = %self.id, dir = %self.dir.display(), error = %e, "Failed to remove job directory"),
        }
    }
}

/// Removes a half-built job directory unless disarmed
struct DirGuard<'a> {
    dir: &'a Path,
    armed: bool,
}

impl Drop for DirGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = fs::remove_dir_all(self.dir);
        }
    }
}

#[derive(Debug, Clone)]
pub struct Materializer {
    root: PathBuf,
}

impl Materializer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create a fresh job directory and write `source` into it.
    ///
    /// No process is spawned here. For java the file must be named after the
    /// public class; if none can be found the job area is removed and
    /// [`MaterializeError::NoEntryPoint`] is returned.
    pub fn materialize(&self, language: Language, source: &str) -> Result<ExecutionJob, MaterializeError> {
        fs::create_dir_all(&self.root)?;

        let id = Uuid::new_v4();
        let dir = self.root.join(format!("job-{}", id));
        // create_dir (not create_dir_all) fails on an existing path, so two
        // jobs can never share a directory
        fs::create_dir(&dir)?;
        let mut guard = DirGuard { dir: &dir, armed: true };

        let (file_name, artifact_name, entry_point) = match language {
            Language::C => ("main.c".to_string(), Some("main".to_string()), None),
            Language::Cpp => ("main.cpp".to_string(), Some("main".to_string()), None),
            Language::Java => {
                let class = java::public_class_name(source).ok_or(MaterializeError::NoEntryPoint)?;
                (format!("{}.java", class), Some(format!("{}.class", class)), Some(class))
            }
            Language::Python => ("main.py".to_string(), None, None),
        };

        let source_path = dir.join(&file_name);
        fs::write(&source_path, source)?;

        guard.armed = false;
        drop(guard);

        debug!(job_id = %id, language = %language, source = %source_path.display(), "Source materialized");

        Ok(ExecutionJob {
            id,
            language,
            artifact_path: artifact_name.map(|name| dir.join(name)),
            source_path,
            entry_point,
            dir,
        })
    }
}
