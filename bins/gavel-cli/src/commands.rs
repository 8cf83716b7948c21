// CLI commands for local grading
use anyhow::{Context, Result, bail};
use gavel_common::types::{Language, Submission, TestCase, Termination, Verdict};
use gavel_engine::{Judge, JudgeConfig, NoopProgress};
use std::fs;
use std::path::Path;

pub fn load_config(path: Option<&Path>) -> Result<JudgeConfig> {
    match path {
        Some(path) => JudgeConfig::load(path),
        None => JudgeConfig::load_default(),
    }
}

fn parse_language(name: &str) -> Result<Language> {
    match Language::from_str(name) {
        Some(language) => Ok(language),
        None => bail!("Unknown language '{}'. Valid options: c, cpp, java, python", name),
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read source file {}", path.display()))
}

/// Load test cases from a JSON array
pub fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read test file {}", path.display()))?;
    let cases: Vec<TestCase> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse test file {}", path.display()))?;
    if cases.is_empty() {
        bail!("Test file {} contains no test cases", path.display());
    }
    Ok(cases)
}

/// Grade a local source file; returns whether it was accepted
pub async fn grade(
    config: JudgeConfig,
    language: &str,
    source: &Path,
    tests: &Path,
    time_limit: Option<u64>,
    memory_limit: Option<u64>,
    json: bool,
) -> Result<bool> {
    let language = parse_language(language)?;
    let source_code = read_source(source)?;
    let test_cases = load_test_cases(tests)?;

    let time_limit_ms = time_limit.unwrap_or(config.default_time_limit_ms);
    let memory_limit_mb = memory_limit.unwrap_or(config.default_memory_limit_mb);

    if !json {
        println!("⚖️  Grading {} ({})", source.display(), language);
        println!("  Test cases: {}", test_cases.len());
        println!("  Limits: {}ms / {}MB", time_limit_ms, memory_limit_mb);
        println!();
    }

    let judge = Judge::new(config);
    let mut submission = Submission::new(language, source_code, test_cases, time_limit_ms, memory_limit_mb);
    judge.grade(&mut submission, &mut NoopProgress).await;

    let response = submission.to_response();
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        let icon = if response.verdict == Verdict::Accepted { "✅" } else { "❌" };
        println!("{} Verdict: {}", icon, response.verdict);
        println!("  Passed: {} / {}", response.test_cases_passed, response.total_test_cases);
        println!("  Slowest test: {}ms", response.execution_time_ms);
        if let Some(message) = &response.diagnostic_message {
            println!("\n{}", message);
        }
    }

    Ok(response.verdict == Verdict::Accepted)
}

/// Run a local source file once and echo its output
pub async fn run(config: JudgeConfig, language: &str, source: &Path, input: Option<&Path>) -> Result<()> {
    let language = parse_language(language)?;
    let source_code = read_source(source)?;
    let input = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file {}", path.display()))?,
        None => String::new(),
    };

    let judge = Judge::new(config);
    let response = judge.run_once(language, &source_code, &input).await;

    print!("{}", response.stdout);
    if !response.stderr.is_empty() {
        eprint!("{}", response.stderr);
    }
    if response.status != Termination::Success {
        eprintln!("\n⚠️  {:?} (exit code: {:?}, {}ms)", response.status, response.exit_code, response.execution_time_ms);
    }
    Ok(())
}

/// Print the toolchains and limits the judge will use
pub fn show_config(config: &JudgeConfig) {
    println!("📋 Configured Languages:\n");
    println!("{:<10} {:<12} {:<12} {}", "LANGUAGE", "COMMAND", "RUNTIME", "FLAGS");
    println!("{}", "─".repeat(60));

    for name in config.list_languages() {
        let Some(language) = Language::from_str(&name) else { continue };
        if let Ok(toolchain) = config.toolchain(language) {
            println!(
                "{:<10} {:<12} {:<12} {}",
                name,
                toolchain.command,
                toolchain.runtime.as_deref().unwrap_or("-"),
                toolchain.args.join(" ")
            );
        }
    }

    println!("\n  Workspace root: {}", config.workspace_root.display());
    println!("  Defaults: {}ms / {}MB, compile timeout {}ms",
        config.default_time_limit_ms, config.default_memory_limit_mb, config.compile_timeout_ms);
}
