use crate::command::{CommandRunner, CommandSpec};
use crate::error::Result;
use crate::types::BenchmarkRunConfig;

/// Foreground load-generator invocation. The last step of a cycle.
pub struct BenchmarkLauncher<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> BenchmarkLauncher<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    /// Build the load-generator command line. Every value is passed through
    /// exactly as configured.
    pub fn command(config: &BenchmarkRunConfig) -> CommandSpec {
        let credential = config.credential_path.to_string_lossy().into_owned();
        let mut spec = CommandSpec::new(config.program.to_string_lossy())
            .args(["-H", config.endpoint.as_str()])
            .arg("-f")
            .arg(config.locustfile.to_string_lossy())
            .args(["--funding-key", credential.as_str()])
            .args(["--users".to_string(), config.users.to_string()])
            .args(["--spawn-rate".to_string(), config.spawn_rate.to_string()])
            .args(["--processes".to_string(), config.processes.to_string()])
            .env(config.credential_env.as_str(), credential.as_str());
        if config.headless {
            spec = spec.arg("--headless");
        }
        spec
    }

    /// Block until the load generator exits and return its exit code as-is.
    pub fn run(&self, config: &BenchmarkRunConfig) -> Result<i32> {
        let spec = Self::command(config);
        tracing::info!(
            endpoint = %config.endpoint,
            users = config.users,
            spawn_rate = config.spawn_rate,
            processes = config.processes,
            headless = config.headless,
            "launching load generator"
        );
        let code = self.runner.run(&spec)?;
        tracing::info!(exit_code = code, "load generator exited");
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::BackgroundHandle;
    use std::cell::RefCell;
    use std::path::{Path, PathBuf};

    struct Recorder {
        seen: RefCell<Vec<CommandSpec>>,
        code: i32,
    }

    impl CommandRunner for Recorder {
        fn run(&self, spec: &CommandSpec) -> Result<i32> {
            self.seen.borrow_mut().push(spec.clone());
            Ok(self.code)
        }
        fn spawn_background(&self, _: &CommandSpec, _: Option<&Path>) -> Result<BackgroundHandle> {
            unreachable!("launcher never backgrounds")
        }
    }

    fn run_config(headless: bool) -> BenchmarkRunConfig {
        BenchmarkRunConfig {
            program: PathBuf::from("/w/.venv/bin/locust"),
            endpoint: "127.0.0.1:3030".into(),
            locustfile: PathBuf::from("/w/pytest/tests/loadtest/locust/locustfiles/ft.py"),
            credential_path: PathBuf::from("/home/u/.near/localnet/node0/validator_key.json"),
            credential_env: "KEY".into(),
            users: 1000,
            spawn_rate: 10,
            processes: 8,
            headless,
        }
    }

    #[test]
    fn command_carries_configured_values_unmodified() {
        let spec = BenchmarkLauncher::command(&run_config(true));
        assert_eq!(spec.program, "/w/.venv/bin/locust");
        assert!(spec.has_flag_value("-H", "127.0.0.1:3030"));
        assert!(spec.has_flag_value(
            "--funding-key",
            "/home/u/.near/localnet/node0/validator_key.json"
        ));
        assert!(spec.has_flag_value("--users", "1000"));
        assert!(spec.has_flag_value("--spawn-rate", "10"));
        assert!(spec.has_flag_value("--processes", "8"));
        assert!(spec.args.contains(&"--headless".to_string()));
        assert_eq!(
            spec.env,
            vec![(
                "KEY".to_string(),
                "/home/u/.near/localnet/node0/validator_key.json".to_string()
            )]
        );
    }

    #[test]
    fn interactive_mode_omits_headless() {
        let spec = BenchmarkLauncher::command(&run_config(false));
        assert!(!spec.args.contains(&"--headless".to_string()));
    }

    #[test]
    fn exit_status_is_propagated() {
        let runner = Recorder {
            seen: RefCell::new(Vec::new()),
            code: 3,
        };
        let code = BenchmarkLauncher::new(&runner)
            .run(&run_config(true))
            .unwrap();
        assert_eq!(code, 3);
        assert_eq!(runner.seen.borrow().len(), 1);
    }
}
