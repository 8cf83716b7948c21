/// Judge Orchestrator
///
/// Drives one submission through materialize → compile (once) → run each
/// test case in order, stopping at the first failing case. Every fault is
/// resolved here into exactly one terminal verdict; callers always get a
/// well-formed submission back, never an error.
///
/// State machine:
/// `Pending → Compiling → (CE) | Running(1) → … → Running(n) → AC`,
/// with WA / TLE / MLE / RE ending the run at the case that produced them.

use crate::adapter::LanguageAdapter;
use crate::config::JudgeConfig;
use crate::evaluator;
use crate::materializer::{MaterializeError, Materializer};
use crate::progress::ProgressSink;
use crate::supervisor::{ExecutionResult, LocalSupervisor, RunLimits, Supervisor};
use crate::verdict::Fault;
use gavel_common::types::{Language, RunResponse, Submission, Termination, Verdict};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Guardrails applied before any process is spawned
pub const MAX_SOURCE_CODE_BYTES: usize = 1024 * 1024; // 1MB
pub const MAX_TEST_INPUT_BYTES: usize = 10 * 1024 * 1024; // 10MB

pub struct Judge<S = LocalSupervisor> {
    config: JudgeConfig,
    materializer: Materializer,
    supervisor: S,
}

impl Judge<LocalSupervisor> {
    pub fn new(config: JudgeConfig) -> Self {
        let supervisor = LocalSupervisor::new(config.max_output_bytes);
        Self::with_supervisor(config, supervisor)
    }
}

impl<S: Supervisor> Judge<S> {
    pub fn with_supervisor(config: JudgeConfig, supervisor: S) -> Self {
        Self {
            materializer: Materializer::new(config.workspace_root.clone()),
            config,
            supervisor,
        }
    }

    pub fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Grade `submission` in place.
    ///
    /// Progress (the pass counter) is handed to `sink` after every passing
    /// test case, and the terminal verdict once at the end.
    #[instrument(
        skip_all,
        fields(
            submission_id = %submission.id,
            language = %submission.language,
            test_count = submission.test_cases.len()
        )
    )]
    pub async fn grade<P: ProgressSink + ?Sized>(&self, submission: &mut Submission, sink: &mut P) {
        let start = Instant::now();

        submission.verdict = Verdict::Pending;
        submission.test_cases_passed = 0;
        submission.total_test_cases = submission.test_cases.len();
        submission.diagnostic_message = None;
        submission.execution_time_ms = 0;

        info!("Grading started");

        match self.judge_test_cases(submission, sink).await {
            Ok(()) => {
                submission.verdict = Verdict::Accepted;
                submission.diagnostic_message = None;
            }
            Err(fault) => {
                warn!(verdict = %fault.verdict(), diagnostic = %fault.diagnostic(), "Grading ended early");
                submission.verdict = fault.verdict();
                submission.diagnostic_message = Some(fault.diagnostic());
            }
        }

        persist(submission, sink).await;

        info!(
            verdict = %submission.verdict,
            passed = submission.test_cases_passed,
            total = submission.total_test_cases,
            max_test_ms = submission.execution_time_ms,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Grading completed"
        );
    }

    /// Everything between `Pending` and a terminal state. The job directory
    /// lives exactly as long as this call.
    async fn judge_test_cases<P: ProgressSink + ?Sized>(
        &self,
        submission: &mut Submission,
        sink: &mut P,
    ) -> Result<(), Fault> {
        if submission.source_code.len() > MAX_SOURCE_CODE_BYTES {
            return Err(Fault::LaunchFailure {
                test_case: None,
                reason: format!("source code exceeds maximum size of {} bytes", MAX_SOURCE_CODE_BYTES),
            });
        }

        let adapter = self.adapter(submission.language)?;
        let job = self
            .materializer
            .materialize(submission.language, &submission.source_code)
            .map_err(materialize_fault)?;

        if let Some(compile) = adapter.compile_command(&job) {
            debug!(language = %adapter.language(), command = %compile.display(), "Compiling");
            let result = self.supervisor.run(&compile, b"", self.compile_limits()).await;
            check_compile(&result, self.config.compile_timeout_ms)?;
        }

        let limits = RunLimits {
            timeout_ms: submission.time_limit_ms,
            memory_limit_mb: Some(submission.memory_limit_mb),
        };
        let run = adapter.run_command(&job, submission.memory_limit_mb);

        for index in 0..submission.test_cases.len() {
            let number = index + 1;

            let result = {
                let input = &submission.test_cases[index].input;
                if input.len() > MAX_TEST_INPUT_BYTES {
                    return Err(Fault::LaunchFailure {
                        test_case: Some(number),
                        reason: format!("test input exceeds maximum size of {} bytes", MAX_TEST_INPUT_BYTES),
                    });
                }
                self.supervisor.run(&run, input.as_bytes(), limits).await
            };

            submission.execution_time_ms = submission.execution_time_ms.max(result.elapsed_ms);
            debug!(
                test_num = number,
                termination = ?result.termination,
                execution_ms = result.elapsed_ms,
                "Test case executed"
            );

            let stderr = result.stderr_lossy();
            let termination = reclassify(&adapter, result.termination, &stderr);
            if let Some(fault) = Fault::from_run(termination, number, stderr) {
                return Err(fault);
            }

            let actual = result.stdout_lossy();
            if !evaluator::outputs_match(&actual, &submission.test_cases[index].expected_output) {
                return Err(Fault::OutputMismatch { test_case: number });
            }

            submission.test_cases_passed += 1;
            persist(submission, sink).await;
        }

        Ok(())
    }

    /// Ad-hoc run: compile if needed, run once with `input`, return raw
    /// output without any comparison
    #[instrument(skip_all, fields(language = %language))]
    pub async fn run_once(&self, language: Language, source: &str, input: &str) -> RunResponse {
        if source.len() > MAX_SOURCE_CODE_BYTES || input.len() > MAX_TEST_INPUT_BYTES {
            return failed_response(Termination::LaunchFailed, "source or input exceeds maximum size".to_string());
        }

        let adapter = match self.adapter(language) {
            Ok(adapter) => adapter,
            Err(fault) => return failed_response(Termination::LaunchFailed, fault.diagnostic()),
        };
        let job = match self.materializer.materialize(language, source) {
            Ok(job) => job,
            Err(MaterializeError::NoEntryPoint) => {
                return failed_response(Termination::Failed, MaterializeError::NoEntryPoint.to_string())
            }
            Err(e) => return failed_response(Termination::LaunchFailed, e.to_string()),
        };

        if let Some(compile) = adapter.compile_command(&job) {
            let result = self.supervisor.run(&compile, b"", self.compile_limits()).await;
            if !result.exited_cleanly() {
                return to_response(&result, result.termination);
            }
        }

        let limits = RunLimits {
            timeout_ms: self.config.default_time_limit_ms,
            memory_limit_mb: Some(self.config.default_memory_limit_mb),
        };
        let run = adapter.run_command(&job, self.config.default_memory_limit_mb);
        let result = self.supervisor.run(&run, input.as_bytes(), limits).await;
        let termination = reclassify(&adapter, result.termination, &result.stderr_lossy());
        to_response(&result, termination)
    }

    fn adapter(&self, language: Language) -> Result<LanguageAdapter, Fault> {
        LanguageAdapter::for_language(language, &self.config).map_err(|e| Fault::LaunchFailure {
            test_case: None,
            reason: e.to_string(),
        })
    }

    fn compile_limits(&self) -> RunLimits {
        RunLimits {
            timeout_ms: self.config.compile_timeout_ms,
            memory_limit_mb: None,
        }
    }
}

fn materialize_fault(err: MaterializeError) -> Fault {
    match err {
        MaterializeError::NoEntryPoint => Fault::CompileError { output: err.to_string() },
        MaterializeError::Io(_) => Fault::LaunchFailure {
            test_case: None,
            reason: err.to_string(),
        },
    }
}

/// Only a genuine compiler failure is CE; warnings on a zero exit are not
fn check_compile(result: &ExecutionResult, compile_timeout_ms: u64) -> Result<(), Fault> {
    if result.exited_cleanly() {
        return Ok(());
    }
    match result.termination {
        Termination::LaunchFailed => Err(Fault::LaunchFailure {
            test_case: None,
            reason: result.stderr_lossy(),
        }),
        Termination::TimedOut => Err(Fault::CompileError {
            output: format!("compilation exceeded {}ms", compile_timeout_ms),
        }),
        _ => {
            // Some compilers report errors on stdout
            let mut output = result.stdout_lossy();
            output.push_str(&result.stderr_lossy());
            Err(Fault::CompileError { output })
        }
    }
}

/// A failed run whose stderr carries the runtime's own out-of-memory
/// message is MLE, not RE
fn reclassify(adapter: &LanguageAdapter, termination: Termination, stderr: &str) -> Termination {
    if termination == Termination::Failed && adapter.is_oom_signature(stderr) {
        Termination::MemoryExceeded
    } else {
        termination
    }
}

async fn persist<P: ProgressSink + ?Sized>(submission: &mut Submission, sink: &mut P) {
    submission.touch();
    if let Err(e) = sink.persist(submission).await {
        // Non-fatal - grading continues
        warn!(submission_id = %submission.id, error = %e, "Failed to persist progress");
    }
}

fn to_response(result: &ExecutionResult, status: Termination) -> RunResponse {
    RunResponse {
        stdout: result.stdout_lossy(),
        stderr: result.stderr_lossy(),
        status,
        exit_code: result.exit_code,
        execution_time_ms: result.elapsed_ms,
    }
}

fn failed_response(status: Termination, stderr: String) -> RunResponse {
    RunResponse {
        stdout: String::new(),
        stderr,
        status,
        exit_code: None,
        execution_time_ms: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ProcessSpec;
    use async_trait::async_trait;
    use gavel_common::types::TestCase;
    use std::collections::VecDeque;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Spy supervisor: replays scripted results and records every call
    #[derive(Default)]
    struct ScriptedSupervisor {
        script: Mutex<VecDeque<ExecutionResult>>,
        calls: Mutex<Vec<(ProcessSpec, Vec<u8>)>>,
    }

    impl ScriptedSupervisor {
        fn new(script: Vec<ExecutionResult>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(ProcessSpec, Vec<u8>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Supervisor for ScriptedSupervisor {
        async fn run(&self, spec: &ProcessSpec, stdin: &[u8], _limits: RunLimits) -> ExecutionResult {
            self.calls.lock().unwrap().push((spec.clone(), stdin.to_vec()));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("supervisor invoked more often than scripted")
        }
    }

    struct PanickingSupervisor;

    #[async_trait]
    impl Supervisor for PanickingSupervisor {
        async fn run(&self, _spec: &ProcessSpec, _stdin: &[u8], _limits: RunLimits) -> ExecutionResult {
            panic!("supervisor exploded");
        }
    }

    /// Records (verdict, passed) at every persist
    #[derive(Default)]
    struct RecordingSink {
        snapshots: Vec<(Verdict, usize)>,
    }

    #[async_trait]
    impl ProgressSink for RecordingSink {
        async fn persist(&mut self, submission: &Submission) -> anyhow::Result<()> {
            self.snapshots.push((submission.verdict, submission.test_cases_passed));
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl ProgressSink for FailingSink {
        async fn persist(&mut self, _submission: &Submission) -> anyhow::Result<()> {
            anyhow::bail!("redis is down")
        }
    }

    fn result(termination: Termination, exit_code: Option<i32>, stdout: &str, stderr: &str) -> ExecutionResult {
        ExecutionResult {
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            exit_code,
            signal: None,
            elapsed_ms: 7,
            termination,
        }
    }

    fn ok(stdout: &str) -> ExecutionResult {
        result(Termination::Success, Some(0), stdout, "")
    }

    fn scratch_config() -> JudgeConfig {
        JudgeConfig {
            workspace_root: std::env::temp_dir().join(format!("gavel-judge-{}", uuid::Uuid::new_v4())),
            ..JudgeConfig::default()
        }
    }

    fn submission(language: Language, source: &str, cases: &[(&str, &str)]) -> Submission {
        let test_cases = cases
            .iter()
            .map(|(input, expected)| TestCase {
                input: input.to_string(),
                expected_output: expected.to_string(),
                hidden: false,
            })
            .collect();
        Submission::new(language, source.to_string(), test_cases, 2000, 256)
    }

    fn assert_workspace_empty(root: &Path) {
        let leftovers: Vec<PathBuf> = match std::fs::read_dir(root) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        };
        assert!(leftovers.is_empty(), "job directories left behind: {:?}", leftovers);
        std::fs::remove_dir_all(root).ok();
    }

    async fn grade_with(
        language: Language,
        source: &str,
        cases: &[(&str, &str)],
        script: Vec<ExecutionResult>,
    ) -> (Submission, Vec<(ProcessSpec, Vec<u8>)>, RecordingSink) {
        let config = scratch_config();
        let root = config.workspace_root.clone();
        let judge = Judge::with_supervisor(config, ScriptedSupervisor::new(script));
        let mut sub = submission(language, source, cases);
        let mut sink = RecordingSink::default();

        judge.grade(&mut sub, &mut sink).await;

        assert_workspace_empty(&root);
        (sub, judge.supervisor.calls(), sink)
    }

    #[tokio::test]
    async fn test_compile_error_runs_no_tests() {
        let (sub, calls, _) = grade_with(
            Language::Cpp,
            "int main( { }",
            &[("1", "1"), ("2", "2"), ("3", "3")],
            vec![result(Termination::Failed, Some(1), "", "main.cpp:1:11: error: expected ')'")],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::CompilationError);
        assert_eq!(sub.test_cases_passed, 0);
        assert_eq!(sub.total_test_cases, 3);
        assert!(sub.diagnostic_message.unwrap().contains("expected ')'"));
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.program, "g++");
        assert!(calls.iter().all(|(_, stdin)| stdin.is_empty()));
    }

    #[tokio::test]
    async fn test_compiler_warnings_do_not_fail_the_build() {
        let (sub, calls, _) = grade_with(
            Language::C,
            "int main(){int x; return 0;}",
            &[("", "")],
            vec![
                result(Termination::Failed, Some(0), "", "warning: unused variable 'x'"),
                ok(""),
            ],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::Accepted);
        assert_eq!(calls.len(), 2);
    }

    #[tokio::test]
    async fn test_all_match_is_accepted() {
        let (sub, calls, sink) = grade_with(
            Language::Python,
            "print(sum(map(int, input().split())))",
            &[("2 3\n", "5\n"), ("10 20", "30")],
            vec![ok("5\n"), ok("  30  \n")],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::Accepted);
        assert_eq!(sub.test_cases_passed, 2);
        assert_eq!(sub.total_test_cases, 2);
        assert_eq!(sub.diagnostic_message, None);
        assert_eq!(sub.execution_time_ms, 7);

        // interpreted: no compile step, inputs fed in declared order
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, b"2 3\n");
        assert_eq!(calls[1].1, b"10 20");

        assert_eq!(
            sink.snapshots,
            vec![(Verdict::Pending, 1), (Verdict::Pending, 2), (Verdict::Accepted, 2)]
        );
    }

    #[tokio::test]
    async fn test_fail_fast_on_first_mismatch() {
        let (sub, calls, sink) = grade_with(
            Language::Python,
            "print(input())",
            &[("a", "a"), ("b", "b"), ("c", "c"), ("d", "d")],
            vec![ok("a"), ok("x")],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::WrongAnswer);
        assert_eq!(sub.test_cases_passed, 1);
        assert_eq!(sub.diagnostic_message.as_deref(), Some("Wrong Answer on Test Case 2"));
        assert_eq!(calls.len(), 2);
        assert_eq!(sink.snapshots.last(), Some(&(Verdict::WrongAnswer, 1)));
    }

    #[tokio::test]
    async fn test_wrong_answer_on_first_case() {
        let (sub, _, _) = grade_with(
            Language::Python,
            "print(sum(map(int, input().split())))",
            &[("2 3\n", "6\n")],
            vec![ok("5\n")],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::WrongAnswer);
        assert_eq!(sub.test_cases_passed, 0);
        assert!(sub.diagnostic_message.unwrap().contains("Test Case 1"));
    }

    #[tokio::test]
    async fn test_timeout_is_tle_even_with_correct_output() {
        let (sub, calls, _) = grade_with(
            Language::Python,
            "while True: pass",
            &[("", "5"), ("", "5")],
            vec![result(Termination::TimedOut, None, "5", "")],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::TimeLimitExceeded);
        assert_eq!(sub.test_cases_passed, 0);
        assert_eq!(sub.diagnostic_message.as_deref(), Some("Time Limit Exceeded on Test Case 1"));
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_kill_is_mle() {
        let (sub, _, _) = grade_with(
            Language::Cpp,
            "int main(){}",
            &[("", ""), ("", "")],
            vec![ok(""), ok(""), result(Termination::MemoryExceeded, None, "", "")],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::MemoryLimitExceeded);
        assert_eq!(sub.test_cases_passed, 1);
        assert_eq!(sub.diagnostic_message.as_deref(), Some("Memory Limit Exceeded on Test Case 2"));
    }

    #[tokio::test]
    async fn test_runtime_oom_message_is_mle() {
        let (sub, calls, _) = grade_with(
            Language::Java,
            "public class Main { public static void main(String[] a) {} }",
            &[("", "")],
            vec![
                ok(""),
                result(
                    Termination::Failed,
                    Some(1),
                    "",
                    "Exception in thread \"main\" java.lang.OutOfMemoryError: Java heap space",
                ),
            ],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::MemoryLimitExceeded);
        assert_eq!(calls[0].0.program, "javac");
        assert!(calls[1].0.args.contains(&"-Xmx256m".to_string()));
        assert_eq!(calls[1].0.args.last().unwrap(), "Main");
    }

    #[tokio::test]
    async fn test_crash_is_runtime_error() {
        let (sub, _, _) = grade_with(
            Language::Python,
            "1/0",
            &[("", "")],
            vec![result(Termination::Failed, Some(1), "", "ZeroDivisionError: division by zero")],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::RuntimeError);
        let diagnostic = sub.diagnostic_message.unwrap();
        assert!(diagnostic.starts_with("Runtime Error on Test Case 1"));
        assert!(diagnostic.contains("ZeroDivisionError"));
    }

    #[tokio::test]
    async fn test_stderr_on_success_is_runtime_error() {
        let (sub, _, _) = grade_with(
            Language::Python,
            "import sys; print(5); sys.stderr.write('debug')",
            &[("", "5")],
            vec![result(Termination::Failed, Some(0), "5", "debug")],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::RuntimeError);
    }

    #[tokio::test]
    async fn test_missing_toolchain_is_runtime_error_not_ce() {
        let (sub, calls, _) = grade_with(
            Language::Cpp,
            "int main(){}",
            &[("", "")],
            vec![ExecutionResult::launch_failed("failed to launch g++: No such file".to_string(), 0)],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::RuntimeError);
        assert!(sub.diagnostic_message.unwrap().contains("failed to launch g++"));
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_on_run_names_test_case() {
        let (sub, _, _) = grade_with(
            Language::Python,
            "print(1)",
            &[("", "1")],
            vec![ExecutionResult::launch_failed("failed to launch python3".to_string(), 0)],
        )
        .await;

        assert_eq!(sub.verdict, Verdict::RuntimeError);
        assert!(sub.diagnostic_message.unwrap().starts_with("Runtime Error on Test Case 1"));
    }

    #[tokio::test]
    async fn test_java_without_public_class_spawns_nothing() {
        let (sub, calls, _) = grade_with(Language::Java, "class Main {}", &[("", "")], Vec::new()).await;

        assert_eq!(sub.verdict, Verdict::CompilationError);
        assert!(sub.diagnostic_message.unwrap().contains("no public entry point found"));
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_input_is_rejected_before_running() {
        let big = "9".repeat(MAX_TEST_INPUT_BYTES + 1);
        let (sub, calls, _) = grade_with(Language::Python, "print(1)", &[("", "1"), (big.as_str(), "1")], vec![ok("1")]).await;

        assert_eq!(sub.verdict, Verdict::RuntimeError);
        assert_eq!(sub.test_cases_passed, 1);
        assert_eq!(calls.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_test_list_is_accepted() {
        let (sub, calls, _) = grade_with(Language::Python, "print(1)", &[], Vec::new()).await;
        assert_eq!(sub.verdict, Verdict::Accepted);
        assert_eq!(sub.total_test_cases, 0);
        assert!(calls.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_failure_does_not_change_verdict() {
        let config = scratch_config();
        let root = config.workspace_root.clone();
        let judge = Judge::with_supervisor(config, ScriptedSupervisor::new(vec![ok("1")]));
        let mut sub = submission(Language::Python, "print(1)", &[("", "1")]);

        judge.grade(&mut sub, &mut FailingSink).await;

        assert_eq!(sub.verdict, Verdict::Accepted);
        assert_eq!(sub.test_cases_passed, 1);
        assert_workspace_empty(&root);
    }

    #[tokio::test]
    async fn test_supervisor_panic_still_cleans_up() {
        let config = scratch_config();
        let root = config.workspace_root.clone();
        let judge = Judge::with_supervisor(config, PanickingSupervisor);

        let handle = tokio::spawn(async move {
            let mut sub = submission(Language::Cpp, "int main(){}", &[("", "")]);
            judge.grade(&mut sub, &mut crate::progress::NoopProgress).await;
        });

        let err = handle.await.unwrap_err();
        assert!(err.is_panic());
        assert_workspace_empty(&root);
    }

    #[tokio::test]
    async fn test_run_once_returns_raw_output() {
        let config = scratch_config();
        let root = config.workspace_root.clone();
        let judge = Judge::with_supervisor(config, ScriptedSupervisor::new(vec![ok(""), ok("hello\n")]));

        let response = judge.run_once(Language::Cpp, "int main(){}", "x").await;
        assert_eq!(response.status, Termination::Success);
        assert_eq!(response.stdout, "hello\n");
        assert_eq!(response.stderr, "");

        let calls = judge.supervisor.calls();
        assert_eq!(calls[1].1, b"x");
        assert_workspace_empty(&root);
    }

    #[tokio::test]
    async fn test_run_once_surfaces_compiler_output() {
        let config = scratch_config();
        let root = config.workspace_root.clone();
        let judge = Judge::with_supervisor(
            config,
            ScriptedSupervisor::new(vec![result(Termination::Failed, Some(1), "", "error: boom")]),
        );

        let response = judge.run_once(Language::C, "int main(", "").await;
        assert_eq!(response.status, Termination::Failed);
        assert_eq!(response.stderr, "error: boom");
        assert_eq!(judge.supervisor.calls().len(), 1);
        assert_workspace_empty(&root);
    }
}
