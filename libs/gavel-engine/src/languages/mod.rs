//! Per-language toolchain knowledge: compile/run command shapes and the
//! stderr phrases each runtime prints when it runs out of memory.

pub mod java;
pub mod native;
pub mod python;

/// Case-insensitive search for any of `needles` in `stderr`
pub(crate) fn mentions_any(stderr: &str, needles: &[&str]) -> bool {
    let haystack = stderr.to_lowercase();
    needles.iter().any(|n| haystack.contains(&n.to_lowercase()))
}
