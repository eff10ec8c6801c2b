use crate::error::{InstallError, Result};
use std::process::Command;

/// Captured result of an external command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Combined output, used for version probes where tools write the
    /// version line to either stream.
    pub fn text(&self) -> String {
        if self.stdout.trim().is_empty() {
            self.stderr.clone()
        } else {
            self.stdout.clone()
        }
    }
}

/// Seam over external process invocation. Everything that mutates or probes
/// host state outside this process (version probes, apt-get, systemctl,
/// journalctl, hostname) goes through this trait so tests can script it.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput>;
}

/// Real implementation backed by std::process.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
        let output = Command::new(program)
            .args(args)
            .env("DEBIAN_FRONTEND", "noninteractive")
            .output()
            .map_err(|e| InstallError::CommandFailed {
                command: format!("{} {}", program, args.join(" ")),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted runner for tests: responses keyed by program name, every
    /// invocation recorded for assertions.
    #[derive(Default)]
    pub struct RecordingRunner {
        responses: Mutex<HashMap<String, Vec<CommandOutput>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl RecordingRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for `program`. Responses are consumed in order;
        /// the last one repeats once the queue is exhausted.
        pub fn respond(&self, program: &str, status: i32, stdout: &str) {
            self.responses
                .lock()
                .unwrap()
                .entry(program.to_string())
                .or_default()
                .push(CommandOutput {
                    status,
                    stdout: stdout.to_string(),
                    stderr: String::new(),
                });
        }

        pub fn calls_to(&self, program: &str) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with(program))
                .cloned()
                .collect()
        }
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{} {}", program, args.join(" ")));

            let mut responses = self.responses.lock().unwrap();
            match responses.get_mut(program) {
                Some(queue) if !queue.is_empty() => {
                    if queue.len() == 1 {
                        Ok(queue[0].clone())
                    } else {
                        Ok(queue.remove(0))
                    }
                }
                _ => Err(InstallError::CommandFailed {
                    command: program.to_string(),
                    message: "command not found".to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;

    #[test]
    fn test_recording_runner_scripts_and_records() {
        let runner = RecordingRunner::new();
        runner.respond("go", 0, "go version go1.21.6 linux/amd64");

        let out = runner.run("go", &["version"]).unwrap();
        assert!(out.success());
        assert!(out.stdout.contains("1.21.6"));

        assert!(runner.run("missing-tool", &[]).is_err());
        assert_eq!(runner.calls_to("go"), vec!["go version"]);
    }

    #[test]
    fn test_text_prefers_stdout_then_stderr() {
        let out = CommandOutput {
            status: 0,
            stdout: String::new(),
            stderr: "captaincore v1.2.3".to_string(),
        };
        assert!(out.text().contains("1.2.3"));
    }
}
