use crate::adapter::ProcessSpec;
use crate::config::ToolchainConfig;
use crate::materializer::ExecutionJob;

const OOM_SIGNATURES: &[&str] = &[
    "java.lang.OutOfMemoryError",
    "Java heap space",
    "GC overhead limit exceeded",
    "Could not reserve enough space",
    "Cannot allocate memory",
    "insufficient memory for the Java Runtime",
];

const CLASS_MODIFIERS: &[&str] = &["final", "abstract", "static", "strictfp", "sealed"];

/// Initial heap and code cache are kept small so the JVM fits the budget
const INITIAL_HEAP_MB: u64 = 16;
const CODE_CACHE_MB: u64 = 16;

/// Find the public top-level class the source file has to be named after.
///
/// Comments and string literals are skipped, so `// public class Foo` does
/// not count. Returns `None` when no `public [modifiers] class Name` appears.
pub fn public_class_name(source: &str) -> Option<String> {
    let code = strip_comments_and_strings(source);
    let tokens: Vec<&str> = code
        .split(|c: char| c.is_whitespace() || c == '{')
        .filter(|t| !t.is_empty())
        .collect();

    for (i, token) in tokens.iter().enumerate() {
        if *token != "public" {
            continue;
        }
        let mut j = i + 1;
        while j < tokens.len() && CLASS_MODIFIERS.contains(&tokens[j]) {
            j += 1;
        }
        if tokens.get(j) != Some(&"class") {
            continue;
        }
        if let Some(name) = tokens.get(j + 1).and_then(|t| identifier_prefix(t)) {
            return Some(name);
        }
    }
    None
}

fn identifier_prefix(token: &str) -> Option<String> {
    let name: String = token
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    match name.chars().next() {
        Some(first) if !first.is_ascii_digit() => Some(name),
        _ => None,
    }
}

fn strip_comments_and_strings(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            '"' | '\'' => {
                let quote = c;
                let mut escaped = false;
                for next in chars.by_ref() {
                    if escaped {
                        escaped = false;
                    } else if next == '\\' {
                        escaped = true;
                    } else if next == quote {
                        break;
                    }
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Managed runtime: `javac` into the job directory, then the JVM with a heap
/// ceiling. Address-space rlimits break the JVM's up-front reservations, so
/// the heap flags are what holds the memory budget.
#[derive(Debug, Clone)]
pub struct JavaAdapter {
    pub compiler: String,
    pub runtime: String,
    pub compile_flags: Vec<String>,
}

impl JavaAdapter {
    pub fn new(toolchain: &ToolchainConfig) -> Self {
        Self {
            compiler: toolchain.command.clone(),
            runtime: toolchain.runtime.clone().unwrap_or_else(|| "java".to_string()),
            compile_flags: toolchain.args.clone(),
        }
    }

    pub fn compile_command(&self, job: &ExecutionJob) -> ProcessSpec {
        let mut args = vec!["-d".to_string(), job.dir.to_string_lossy().to_string()];
        args.extend(self.compile_flags.iter().cloned());
        args.push(job.source_path.to_string_lossy().to_string());
        ProcessSpec::new(&self.compiler, args, &job.dir)
    }

    pub fn run_command(&self, job: &ExecutionJob, memory_limit_mb: u64) -> ProcessSpec {
        let max_heap = memory_limit_mb.max(1);
        let args = vec![
            format!("-Xmx{}m", max_heap),
            format!("-Xms{}m", INITIAL_HEAP_MB.min(max_heap)),
            format!("-XX:ReservedCodeCacheSize={}m", CODE_CACHE_MB),
            "-XX:+UseSerialGC".to_string(),
            "-cp".to_string(),
            job.dir.to_string_lossy().to_string(),
            job.entry_point.clone().unwrap_or_else(|| "Main".to_string()),
        ];
        ProcessSpec::new(&self.runtime, args, &job.dir)
    }

    pub fn is_oom_signature(&self, stderr: &str) -> bool {
        super::mentions_any(stderr, OOM_SIGNATURES)
    }
}
