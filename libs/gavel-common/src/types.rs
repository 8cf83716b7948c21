use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Languages accepted for grading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[serde(alias = "c++", alias = "cxx")]
    Cpp,
    Java,
    #[serde(alias = "py", alias = "python3")]
    Python,
}

impl Language {
    pub const ALL: [Language; 4] = [Language::C, Language::Cpp, Language::Java, Language::Python];

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "c" => Some(Language::C),
            "cpp" | "c++" | "cxx" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            "python" | "py" | "python3" => Some(Language::Python),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::C => "c",
            Language::Cpp => "cpp",
            Language::Java => "java",
            Language::Python => "python",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Hidden tests are not echoed back to submitters
    #[serde(default)]
    pub hidden: bool,
}

/// Final classification of a graded submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Pending,
    #[serde(rename = "AC")]
    Accepted,
    #[serde(rename = "WA")]
    WrongAnswer,
    #[serde(rename = "TLE")]
    TimeLimitExceeded,
    #[serde(rename = "MLE")]
    MemoryLimitExceeded,
    #[serde(rename = "RE")]
    RuntimeError,
    #[serde(rename = "CE")]
    CompilationError,
}

impl Verdict {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Verdict::Pending)
    }

    pub fn code(&self) -> &'static str {
        match self {
            Verdict::Pending => "Pending",
            Verdict::Accepted => "AC",
            Verdict::WrongAnswer => "WA",
            Verdict::TimeLimitExceeded => "TLE",
            Verdict::MemoryLimitExceeded => "MLE",
            Verdict::RuntimeError => "RE",
            Verdict::CompilationError => "CE",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// How a single supervised process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    Success,
    Failed,
    TimedOut,
    MemoryExceeded,
    LaunchFailed,
}

/// A submission as persisted between the API, the worker and the judge.
///
/// Only the judge mutates the grading fields; everything else is fixed at
/// creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub language: Language,
    pub source_code: String,
    pub test_cases: Vec<TestCase>,
    pub time_limit_ms: u64,
    pub memory_limit_mb: u64,
    pub verdict: Verdict,
    pub test_cases_passed: usize,
    pub total_test_cases: usize,
    pub diagnostic_message: Option<String>,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(
        language: Language,
        source_code: String,
        test_cases: Vec<TestCase>,
        time_limit_ms: u64,
        memory_limit_mb: u64,
    ) -> Self {
        let now = Utc::now();
        let total_test_cases = test_cases.len();
        Self {
            id: Uuid::new_v4(),
            language,
            source_code,
            test_cases,
            time_limit_ms,
            memory_limit_mb,
            verdict: Verdict::Pending,
            test_cases_passed: 0,
            total_test_cases,
            diagnostic_message: None,
            execution_time_ms: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump `updated_at`; called before every persist
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn to_response(&self) -> GradeResponse {
        GradeResponse {
            submission_id: self.id,
            verdict: self.verdict,
            test_cases_passed: self.test_cases_passed,
            total_test_cases: self.total_test_cases,
            diagnostic_message: self.diagnostic_message.clone(),
            execution_time_ms: self.execution_time_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradeRequest {
    pub language: Language,
    pub source_code: String,
    pub test_cases: Vec<TestCase>,
    #[serde(default)]
    pub time_limit_ms: Option<u64>,
    #[serde(default)]
    pub memory_limit_mb: Option<u64>,
}

/// Final or in-progress grading state as seen by callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResponse {
    pub submission_id: Uuid,
    pub verdict: Verdict,
    pub test_cases_passed: usize,
    pub total_test_cases: usize,
    pub diagnostic_message: Option<String>,
    pub execution_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub language: Language,
    pub source_code: String,
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
    pub stdout: String,
    pub stderr: String,
    pub status: Termination,
    pub exit_code: Option<i32>,
    pub execution_time_ms: u64,
}
