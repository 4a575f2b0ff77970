//! Host checks run before a cycle touches anything.

use std::path::Path;

use crate::error::{BenchError, Result};

/// Programs every cycle needs regardless of configuration.
pub const BASE_PROGRAMS: &[&str] = &["git", "pgrep", "kill"];

/// Whether `program` can be executed: an explicit path must exist, a bare
/// name must resolve on PATH.
pub fn is_available(program: &str) -> bool {
    if program.contains('/') {
        return Path::new(program).exists();
    }
    which::which(program).is_ok()
}

/// Fail with the first program that cannot be found.
pub fn check_programs<'a, I>(programs: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    for program in programs {
        if !is_available(program) {
            return Err(BenchError::MissingProgram(program.to_string()));
        }
        tracing::debug!(program, "found");
    }
    Ok(())
}
