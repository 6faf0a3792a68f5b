use crate::collectors::CollectError;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

/// Program plus arguments for one inventory tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    argv: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
        }
    }

    /// `program` run through `prefix` (e.g. `sudo -n`); an empty prefix runs it
    /// directly.
    pub fn elevated(prefix: &[String], program: impl Into<String>) -> Self {
        let mut argv = prefix.to_vec();
        argv.push(program.into());
        Self { argv }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    pub fn label(&self) -> String {
        self.argv.join(" ")
    }
}

/// Runs inventory tools with a hard deadline. A tool that hangs is killed
/// and reported like a missing one.
#[derive(Debug, Clone)]
pub struct ToolRunner {
    timeout: Duration,
}

impl ToolRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn run(&self, cmd: &ToolCommand) -> Result<String, CollectError> {
        let tool = cmd.label();
        let Some((program, args)) = cmd.argv.split_first() else {
            return Err(CollectError::Malformed {
                what: "empty tool command".to_string(),
            });
        };

        let mut child = Command::new(program);
        child
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match time::timeout(self.timeout, child.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => return Err(CollectError::ToolUnavailable { tool, source }),
            Err(_elapsed) => {
                return Err(CollectError::ToolTimeout {
                    tool,
                    timeout: self.timeout,
                })
            }
        };
        if !output.status.success() {
            return Err(CollectError::ToolFailed {
                tool,
                status: output.status,
            });
        }

        debug!(tool = %tool, bytes = output.stdout.len(), "tool finished");
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elevated_command_prepends_prefix() {
        let prefix = vec!["sudo".to_string(), "-n".to_string()];
        let cmd = ToolCommand::elevated(&prefix, "dmidecode").arg("-t").arg("cache");
        assert_eq!(cmd.label(), "sudo -n dmidecode -t cache");

        let plain = ToolCommand::elevated(&[], "dmidecode").arg("-t");
        assert_eq!(plain, ToolCommand::new("dmidecode").arg("-t"));
    }

    #[tokio::test]
    async fn missing_tool_is_unavailable() {
        let runner = ToolRunner::new(Duration::from_secs(1));
        let err = runner
            .run(&ToolCommand::new("hostsnap-no-such-tool-5f3a"))
            .await
            .expect_err("missing binary must fail");
        assert!(matches!(err, CollectError::ToolUnavailable { .. }));
    }

    #[tokio::test]
    async fn hung_tool_times_out() {
        let runner = ToolRunner::new(Duration::from_millis(50));
        let err = runner
            .run(&ToolCommand::new("sleep").arg("5"))
            .await
            .expect_err("sleep must exceed the deadline");
        assert!(matches!(err, CollectError::ToolTimeout { .. }));
    }
}
