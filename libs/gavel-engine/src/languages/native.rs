use crate::adapter::ProcessSpec;
use crate::config::ToolchainConfig;
use crate::materializer::ExecutionJob;
use gavel_common::types::Language;

const OOM_SIGNATURES: &[&str] = &[
    "std::bad_alloc",
    "cannot allocate memory",
    "out of memory",
    "memory exhausted",
];

/// C and C++: compiled once to `main` in the job directory, run directly
#[derive(Debug, Clone)]
pub struct NativeAdapter {
    pub language: Language,
    pub compiler: String,
    pub flags: Vec<String>,
}

impl NativeAdapter {
    pub fn new(language: Language, toolchain: &ToolchainConfig) -> Self {
        Self {
            language,
            compiler: toolchain.command.clone(),
            flags: toolchain.args.clone(),
        }
    }

    fn artifact(job: &ExecutionJob) -> String {
        job.artifact_path
            .clone()
            .unwrap_or_else(|| job.dir.join("main"))
            .to_string_lossy()
            .to_string()
    }

    pub fn compile_command(&self, job: &ExecutionJob) -> ProcessSpec {
        // Flags go after the source so link flags like -lm resolve
        let mut args = vec![
            "-o".to_string(),
            Self::artifact(job),
            job.source_path.to_string_lossy().to_string(),
        ];
        args.extend(self.flags.iter().cloned());
        ProcessSpec::new(&self.compiler, args, &job.dir)
    }

    pub fn run_command(&self, job: &ExecutionJob) -> ProcessSpec {
        ProcessSpec::new(Self::artifact(job), Vec::new(), &job.dir).with_external_memory_limit()
    }

    pub fn is_oom_signature(&self, stderr: &str) -> bool {
        super::mentions_any(stderr, OOM_SIGNATURES)
    }
}
