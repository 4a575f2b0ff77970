use crate::error::{BenchError, Result};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// File constants
// ---------------------------------------------------------------------------

pub const CONFIG_FILE: &str = "loadbench.yaml";

pub const DEFAULT_NODE_HOME: &str = "~/.near/localnet/node0";
pub const VALIDATOR_KEY_FILE: &str = "validator_key.json";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Expand a leading `~/` against the user's home directory.
pub fn expand_home(path: &Path) -> Result<PathBuf> {
    match path.strip_prefix("~") {
        Ok(rest) => {
            let home = home::home_dir().ok_or(BenchError::HomeNotFound)?;
            Ok(home.join(rest))
        }
        Err(_) => Ok(path.to_path_buf()),
    }
}

/// Expand `~/` and anchor relative paths at the benchmarked checkout.
pub fn resolve(root: &Path, path: &Path) -> Result<PathBuf> {
    let expanded = expand_home(path)?;
    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(root.join(expanded))
    }
}

/// Executable inside a Python virtual environment.
pub fn venv_bin(venv: &Path, program: &str) -> PathBuf {
    venv.join("bin").join(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_anchor_at_root() {
        let p = resolve(Path::new("/work/nearcore"), Path::new("target/release")).unwrap();
        assert_eq!(p, PathBuf::from("/work/nearcore/target/release"));
    }

    #[test]
    fn absolute_paths_pass_through() {
        let p = resolve(Path::new("/work"), Path::new("/opt/keys/k.json")).unwrap();
        assert_eq!(p, PathBuf::from("/opt/keys/k.json"));
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = home::home_dir() else {
            return;
        };
        let p = resolve(Path::new("/work"), Path::new(DEFAULT_NODE_HOME)).unwrap();
        assert_eq!(p, home.join(".near/localnet/node0"));
    }

    #[test]
    fn tilde_inside_a_name_is_literal() {
        let p = expand_home(Path::new("~backup/x")).unwrap();
        assert_eq!(p, PathBuf::from("~backup/x"));
    }

    #[test]
    fn venv_bin_layout() {
        assert_eq!(
            venv_bin(Path::new(".venv"), "locust"),
            PathBuf::from(".venv/bin/locust")
        );
    }
}
