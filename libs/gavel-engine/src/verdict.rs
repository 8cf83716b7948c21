//! Fault taxonomy. Every way a grading run can end badly is one `Fault`, and
//! every fault resolves to exactly one terminal verdict with a diagnostic.

use gavel_common::types::{Termination, Verdict};

/// Longest diagnostic excerpt kept from a process's output
pub const MAX_DIAGNOSTIC_BYTES: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Source failed to build, or no entry point could be found
    CompileError { output: String },
    /// Toolchain missing or unusable, or the job area could not be prepared
    LaunchFailure { test_case: Option<usize>, reason: String },
    /// Nonzero exit, unexpected signal, or stderr on a zero exit
    RuntimeFault { test_case: usize, stderr: String },
    TimeExceeded { test_case: usize },
    MemoryExceeded { test_case: usize },
    OutputMismatch { test_case: usize },
}

impl Fault {
    pub fn verdict(&self) -> Verdict {
        match self {
            Fault::CompileError { .. } => Verdict::CompilationError,
            Fault::LaunchFailure { .. } | Fault::RuntimeFault { .. } => Verdict::RuntimeError,
            Fault::TimeExceeded { .. } => Verdict::TimeLimitExceeded,
            Fault::MemoryExceeded { .. } => Verdict::MemoryLimitExceeded,
            Fault::OutputMismatch { .. } => Verdict::WrongAnswer,
        }
    }

    /// Caller-facing text; test case indices are 1-based
    pub fn diagnostic(&self) -> String {
        match self {
            Fault::CompileError { output } => {
                let output = truncate(output.trim());
                if output.is_empty() {
                    "Compilation Error".to_string()
                } else {
                    format!("Compilation Error\n{}", output)
                }
            }
            Fault::LaunchFailure { test_case: Some(i), reason } => {
                format!("Runtime Error on Test Case {}: {}", i, truncate(reason.trim()))
            }
            Fault::LaunchFailure { test_case: None, reason } => {
                format!("Runtime Error: {}", truncate(reason.trim()))
            }
            Fault::RuntimeFault { test_case, stderr } => {
                let stderr = truncate(stderr.trim());
                if stderr.is_empty() {
                    format!("Runtime Error on Test Case {}", test_case)
                } else {
                    format!("Runtime Error on Test Case {}\n{}", test_case, stderr)
                }
            }
            Fault::TimeExceeded { test_case } => format!("Time Limit Exceeded on Test Case {}", test_case),
            Fault::MemoryExceeded { test_case } => format!("Memory Limit Exceeded on Test Case {}", test_case),
            Fault::OutputMismatch { test_case } => format!("Wrong Answer on Test Case {}", test_case),
        }
    }

    /// Fault for a run step that did not succeed, or `None` on success
    pub fn from_run(termination: Termination, test_case: usize, stderr: String) -> Option<Self> {
        match termination {
            Termination::Success => None,
            Termination::Failed => Some(Fault::RuntimeFault { test_case, stderr }),
            Termination::TimedOut => Some(Fault::TimeExceeded { test_case }),
            Termination::MemoryExceeded => Some(Fault::MemoryExceeded { test_case }),
            Termination::LaunchFailed => Some(Fault::LaunchFailure {
                test_case: Some(test_case),
                reason: stderr,
            }),
        }
    }
}

fn truncate(text: &str) -> &str {
    if text.len() <= MAX_DIAGNOSTIC_BYTES {
        return text;
    }
    let mut end = MAX_DIAGNOSTIC_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_fault_has_one_verdict() {
        assert_eq!(Fault::CompileError { output: String::new() }.verdict(), Verdict::CompilationError);
        assert_eq!(
            Fault::LaunchFailure { test_case: None, reason: String::new() }.verdict(),
            Verdict::RuntimeError
        );
        assert_eq!(Fault::TimeExceeded { test_case: 1 }.verdict(), Verdict::TimeLimitExceeded);
        assert_eq!(Fault::MemoryExceeded { test_case: 1 }.verdict(), Verdict::MemoryLimitExceeded);
        assert_eq!(Fault::OutputMismatch { test_case: 1 }.verdict(), Verdict::WrongAnswer);
    }

    #[test]
    fn test_diagnostics_name_the_test_case() {
        assert_eq!(Fault::OutputMismatch { test_case: 3 }.diagnostic(), "Wrong Answer on Test Case 3");
        assert_eq!(
            Fault::RuntimeFault { test_case: 2, stderr: String::new() }.diagnostic(),
            "Runtime Error on Test Case 2"
        );
        assert_eq!(
            Fault::RuntimeFault { test_case: 1, stderr: "boom\n".to_string() }.diagnostic(),
            "Runtime Error on Test Case 1\nboom"
        );
        assert_eq!(Fault::TimeExceeded { test_case: 4 }.diagnostic(), "Time Limit Exceeded on Test Case 4");
    }

    #[test]
    fn test_from_run() {
        assert_eq!(Fault::from_run(Termination::Success, 1, String::new()), None);
        assert_eq!(
            Fault::from_run(Termination::LaunchFailed, 2, "missing".to_string()).unwrap().verdict(),
            Verdict::RuntimeError
        );
        assert_eq!(
            Fault::from_run(Termination::MemoryExceeded, 2, String::new()).unwrap(),
            Fault::MemoryExceeded { test_case: 2 }
        );
    }

    #[test]
    fn test_long_compile_output_is_truncated() {
        let output = "é".repeat(MAX_DIAGNOSTIC_BYTES);
        let diagnostic = Fault::CompileError { output }.diagnostic();
        assert!(diagnostic.len() <= MAX_DIAGNOSTIC_BYTES + "Compilation Error\n".len());
    }
}
