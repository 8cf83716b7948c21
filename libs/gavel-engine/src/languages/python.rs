use crate::adapter::ProcessSpec;
use crate::config::ToolchainConfig;
use crate::materializer::ExecutionJob;

const OOM_SIGNATURES: &[&str] = &["MemoryError", "cannot allocate memory"];

/// Interpreted: no compile step, the interpreter re-reads the source each run
#[derive(Debug, Clone)]
pub struct PythonAdapter {
    pub interpreter: String,
    pub flags: Vec<String>,
}

impl PythonAdapter {
    pub fn new(toolchain: &ToolchainConfig) -> Self {
        Self {
            interpreter: toolchain.command.clone(),
            flags: toolchain.args.clone(),
        }
    }

    pub fn run_command(&self, job: &ExecutionJob) -> ProcessSpec {
        // -B keeps the interpreter from writing bytecode caches
        let mut args = vec!["-B".to_string()];
        args.extend(self.flags.iter().cloned());
        args.push(job.source_path.to_string_lossy().to_string());
        ProcessSpec::new(&self.interpreter, args, &job.dir).with_external_memory_limit()
    }

    pub fn is_oom_signature(&self, stderr: &str) -> bool {
        super::mentions_any(stderr, OOM_SIGNATURES)
    }
}
