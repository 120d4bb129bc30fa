//! External process execution

use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use super::ToolError;

/// Cap on how much stderr is kept in an error message
const MAX_STDERR_CHARS: usize = 2000;

/// A single invocation of an external program
#[derive(Debug, Clone)]
pub struct ExternalCommand {
    program: PathBuf,
    args: Vec<OsString>,
    stdout: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdout: None,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Redirect the program's stdout into `path` (created or truncated)
    pub fn stdout_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Shell-like rendering for logs
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        if let Some(ref stdout) = self.stdout {
            line.push_str(" > ");
            line.push_str(&stdout.display().to_string());
        }
        line
    }

    /// Run to completion; a non-zero exit status is an error carrying stderr
    pub async fn run(&self) -> Result<(), ToolError> {
        debug!(command = %self.display(), "Running external tool");

        let mut command = Command::new(&self.program);
        command.args(&self.args).stdin(Stdio::null()).stderr(Stdio::piped());

        match self.stdout {
            Some(ref path) => {
                let file = tokio::fs::File::create(path)
                    .await
                    .map_err(|source| ToolError::Io {
                        path: path.clone(),
                        source,
                    })?;
                command.stdout(Stdio::from(file.into_std().await));
            },
            None => {
                command.stdout(Stdio::null());
            },
        }

        let output = command.output().await.map_err(|source| ToolError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ToolError::ProcessFailed {
                program: self.program.display().to_string(),
                status: output.status.to_string(),
                stderr: truncate(stderr.trim(), MAX_STDERR_CHARS),
            });
        }

        Ok(())
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let command = ExternalCommand::new("minimap2")
            .arg("-c")
            .arg("ref.fa")
            .arg("q.fa")
            .stdout_to("q.fa.ref.fa.mm2.paf");
        assert_eq!(command.display(), "minimap2 -c ref.fa q.fa > q.fa.ref.fa.mm2.paf");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = ExternalCommand::new("/nonexistent/seqalign-tool")
            .run()
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_carries_stderr() {
        let err = ExternalCommand::new("sh")
            .arg("-c")
            .arg("echo 'database not found' >&2; exit 2")
            .run()
            .await
            .unwrap_err();

        match err {
            ToolError::ProcessFailed { stderr, .. } => assert_eq!(stderr, "database not found"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stdout_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");

        ExternalCommand::new("sh")
            .arg("-c")
            .arg("printf 'a\\tb\\n'")
            .stdout_to(&out)
            .run()
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(out).unwrap(), "a\tb\n");
    }
}
