/// Language Adapter
///
/// A closed set of variants behind one interface, selected by the
/// submission's language tag. Each variant knows its compile command (if
/// any), its run command, and the stderr phrases its runtime prints when it
/// runs out of memory.

use crate::config::JudgeConfig;
use crate::languages::{java::JavaAdapter, native::NativeAdapter, python::PythonAdapter};
use crate::materializer::ExecutionJob;
use anyhow::Result;
use gavel_common::types::Language;
use std::path::{Path, PathBuf};

/// A single process invocation for the supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Ask the supervisor to cap the child's address space. Runtimes that
    /// enforce their own heap ceiling leave this off.
    pub external_memory_limit: bool,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>, args: Vec<String>, working_dir: &Path) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: working_dir.to_path_buf(),
            external_memory_limit: false,
        }
    }

    pub fn with_external_memory_limit(mut self) -> Self {
        self.external_memory_limit = true;
        self
    }

    /// Command line for logs and diagnostics
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone)]
pub enum LanguageAdapter {
    Native(NativeAdapter),
    Managed(JavaAdapter),
    Interpreted(PythonAdapter),
}

impl LanguageAdapter {
    pub fn for_language(language: Language, config: &JudgeConfig) -> Result<Self> {
        let toolchain = config.toolchain(language)?;
        Ok(match language {
            Language::C | Language::Cpp => LanguageAdapter::Native(NativeAdapter::new(language, toolchain)),
            Language::Java => LanguageAdapter::Managed(JavaAdapter::new(toolchain)),
            Language::Python => LanguageAdapter::Interpreted(PythonAdapter::new(toolchain)),
        })
    }

    pub fn language(&self) -> Language {
        match self {
            LanguageAdapter::Native(native) => native.language,
            LanguageAdapter::Managed(_) => Language::Java,
            LanguageAdapter::Interpreted(_) => Language::Python,
        }
    }

    /// `None` means the language runs straight from source
    pub fn compile_command(&self, job: &ExecutionJob) -> Option<ProcessSpec> {
        match self {
            LanguageAdapter::Native(native) => Some(native.compile_command(job)),
            LanguageAdapter::Managed(java) => Some(java.compile_command(job)),
            LanguageAdapter::Interpreted(_) => None,
        }
    }

    pub fn run_command(&self, job: &ExecutionJob, memory_limit_mb: u64) -> ProcessSpec {
        match self {
            LanguageAdapter::Native(native) => native.run_command(job),
            LanguageAdapter::Managed(java) => java.run_command(job, memory_limit_mb),
            LanguageAdapter::Interpreted(python) => python.run_command(job),
        }
    }

    pub fn is_oom_signature(&self, stderr: &str) -> bool {
        match self {
            LanguageAdapter::Native(native) => native.is_oom_signature(stderr),
            LanguageAdapter::Managed(java) => java.is_oom_signature(stderr),
            LanguageAdapter::Interpreted(python) => python.is_oom_signature(stderr),
        }
    }
}
