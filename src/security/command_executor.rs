//! SafeCommandExecutor: Type-safe command execution with compile-time injection prevention
//!
//! # Security Features
//!
//! - **Whitelist-based validation**: Only pre-approved commands can execute
//! - **Injection prevention**: Uses `tokio::process::Command` which prevents shell injection
//! - **Argument sanitization**: Arguments passed as Vec, never interpolated into shell strings
//! - **Working directory validation**: Validates existence before execution
//! - **Timeout control**: Prevents long-running or hanging processes
//!
//! # Example
//!
//! ```rust,no_run
//! use module_publisher::security::SafeCommandExecutor;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let mut executor = SafeCommandExecutor::new(std::env::temp_dir())?;
//! executor.set_timeout(Duration::from_secs(30));
//!
//! let output = executor.execute("git", &["--version"]).await?;
//! println!("{}", String::from_utf8_lossy(&output.stdout));
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Allowed commands whitelist for security.
///
/// Only these commands can be executed via SafeCommandExecutor.
/// This prevents arbitrary command execution and potential security vulnerabilities.
const ALLOWED_COMMANDS: &[&str] = &["git", "terraform", "terraform-docs", "tfsec", "infracost"];

/// Errors that can occur during command execution
#[derive(Error, Debug)]
pub enum CommandError {
    /// Command is not in the allowed whitelist
    #[error("Command '{0}' is not in the allowed whitelist")]
    CommandNotAllowed(String),

    /// Working directory does not exist or is not accessible
    #[error("Working directory does not exist: {0}")]
    InvalidWorkingDirectory(PathBuf),

    /// Command execution failed (e.g., binary not found, permission denied)
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),

    /// Command exceeded the timeout duration
    #[error("Command timeout after {0:?}")]
    Timeout(Duration),
}

/// Safe command executor with security controls
///
/// This struct provides a secure way to execute external commands with:
/// - Whitelist validation
/// - Working directory control
/// - Timeout management
/// - Injection prevention through `tokio::process::Command`
#[derive(Debug, Clone)]
pub struct SafeCommandExecutor {
    /// Working directory where commands will be executed
    working_dir: PathBuf,
    /// Optional timeout for command execution
    timeout: Option<Duration>,
}

impl SafeCommandExecutor {
    /// Create a new SafeCommandExecutor with working directory validation.
    ///
    /// # Arguments
    ///
    /// * `working_dir` - The directory where commands will be executed. Must exist.
    ///
    /// # Errors
    ///
    /// Returns `CommandError::InvalidWorkingDirectory` if the directory does not exist.
    pub fn new<P: AsRef<Path>>(working_dir: P) -> Result<Self, CommandError> {
        let working_dir = working_dir.as_ref().to_path_buf();

        if !working_dir.exists() {
            return Err(CommandError::InvalidWorkingDirectory(working_dir));
        }

        Ok(Self {
            working_dir,
            timeout: None,
        })
    }

    /// Set command execution timeout.
    ///
    /// Commands exceeding this duration will be terminated.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = Some(timeout);
    }

    /// Check whether a command is in the allowed whitelist.
    ///
    /// Configured executables may be absolute paths; only the final path
    /// component is matched against the whitelist.
    pub fn is_allowed(command: &str) -> bool {
        let name = Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command);
        ALLOWED_COMMANDS.contains(&name)
    }

    /// Execute a command with whitelist validation and argument sanitization.
    ///
    /// # Security Features
    ///
    /// - **Whitelist validation**: Only pre-approved commands can execute
    /// - **Injection prevention**: Uses `tokio::process::Command`, not shell interpolation
    /// - **Argument safety**: Arguments are passed as a vector, preventing shell expansion
    ///
    /// # Arguments
    ///
    /// * `command` - The command to execute (must be in `ALLOWED_COMMANDS`)
    /// * `args` - Command arguments (safely passed without shell interpretation)
    ///
    /// # Errors
    ///
    /// - `CommandError::CommandNotAllowed` - Command not in whitelist
    /// - `CommandError::ExecutionFailed` - Binary not found or execution error
    /// - `CommandError::Timeout` - Command exceeded the configured timeout
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<Output, CommandError> {
        self.execute_with_env(command, args, &[]).await
    }

    /// Execute a command with additional environment variables.
    ///
    /// The variables are set on top of the inherited environment; existing
    /// names are overridden for the child process only.
    pub async fn execute_with_env(
        &self,
        command: &str,
        args: &[&str],
        env: &[(&str, &str)],
    ) -> Result<Output, CommandError> {
        // Whitelist validation: Only pre-approved commands
        if !Self::is_allowed(command) {
            return Err(CommandError::CommandNotAllowed(command.to_string()));
        }

        // Execute using tokio::process::Command (type-safe, prevents injection)
        // Arguments are passed as Vec, never interpolated into shell strings
        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // The child must not outlive a cancelled future
            .kill_on_drop(true);

        for (name, value) in env {
            cmd.env(name, value);
        }

        let child = cmd
            .spawn()
            .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?;

        let output = match self.timeout {
            Some(duration) => tokio::time::timeout(duration, child.wait_with_output())
                .await
                .map_err(|_| CommandError::Timeout(duration))?
                .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?,
            None => child
                .wait_with_output()
                .await
                .map_err(|e| CommandError::ExecutionFailed(e.to_string()))?,
        };

        Ok(output)
    }
}
