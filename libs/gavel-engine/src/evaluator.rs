/// Output Evaluator - language-agnostic comparison
///
/// **Normalization Rules (applied to both sides):**
/// - Trim leading whitespace: YES
/// - Trim trailing whitespace: YES
/// - Internal whitespace and blank lines: preserved
/// - Case sensitivity: YES (exact match required)
///
/// Knows nothing about processes, languages or persistence.

/// Normalize output for comparison
pub fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Compare a program's stdout with the expected output
pub fn outputs_match(actual: &str, expected: &str) -> bool {
    normalize_output(actual) == normalize_output(expected)
}
