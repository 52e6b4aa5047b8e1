//! kubectl command builder.
//!
//! Child processes are killed when dropped, so abandoning a call on
//! cancellation also aborts the underlying API request.

use crate::error::OrchestratorError;
use crate::orchestrator::OrchestratorResult;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct KubectlOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone)]
pub struct KubectlCommand {
    program: String,
    context: Option<String>,
    namespace: Option<String>,
    args: Vec<String>,
    stdin: Option<String>,
}

impl KubectlCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            context: None,
            namespace: None,
            args: Vec::new(),
            stdin: None,
        }
    }

    pub fn context(mut self, context: Option<&str>) -> Self {
        self.context = context.map(str::to_string);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed a document to the command's standard input (for `-f -`).
    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Full argument list, global flags first.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = Vec::with_capacity(self.args.len() + 4);
        if let Some(context) = &self.context {
            argv.push("--context".to_string());
            argv.push(context.clone());
        }
        if let Some(namespace) = &self.namespace {
            argv.push("--namespace".to_string());
            argv.push(namespace.clone());
        }
        argv.extend(self.args.iter().cloned());
        argv
    }

    /// Run to completion unless `cancel` fires first.
    pub async fn output(self, cancel: &CancellationToken) -> OrchestratorResult<KubectlOutput> {
        if cancel.is_cancelled() {
            return Err(OrchestratorError::Cancelled);
        }

        let argv = self.argv();
        debug!("Executing kubectl command: {} {:?}", self.program, argv);

        let mut child = Command::new(&self.program)
            .args(&argv)
            .stdin(if self.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OrchestratorError::Unavailable(format!("failed to execute {}: {}", self.program, e))
            })?;

        if let (Some(input), Some(mut pipe)) = (self.stdin, child.stdin.take()) {
            let write = async {
                pipe.write_all(input.as_bytes()).await?;
                pipe.shutdown().await
            };
            tokio::select! {
                _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
                res = write => res.map_err(|e| {
                    OrchestratorError::Unavailable(format!("failed to write kubectl input: {}", e))
                })?,
            }
        }

        let output = tokio::select! {
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            res = child.wait_with_output() => res.map_err(|e| {
                OrchestratorError::Unavailable(format!("failed to wait for kubectl: {}", e))
            })?,
        };

        Ok(KubectlOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_precede_arguments() {
        let cmd = KubectlCommand::new("kubectl")
            .context(Some("prod"))
            .namespace("desk")
            .arg("get")
            .args(["pods", "-o", "json"]);

        assert_eq!(
            cmd.argv(),
            vec!["--context", "prod", "--namespace", "desk", "get", "pods", "-o", "json"]
        );
    }

    #[test]
    fn test_no_context_is_omitted() {
        let cmd = KubectlCommand::new("kubectl").context(None).arg("version");
        assert_eq!(cmd.argv(), vec!["version"]);
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = KubectlCommand::new("kubectl").arg("version").output(&cancel).await;
        assert!(matches!(result, Err(OrchestratorError::Cancelled)));
    }

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let cancel = CancellationToken::new();
        let result = KubectlCommand::new("/nonexistent/kubectl-desk-test")
            .arg("version")
            .output(&cancel)
            .await;
        assert!(matches!(result, Err(OrchestratorError::Unavailable(_))));
    }
}
