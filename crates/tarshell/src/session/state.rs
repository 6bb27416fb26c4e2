//! Session result types

use crate::error::CommandError;

/// What the driver should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlFlow {
    /// Keep reading commands.
    #[default]
    None,
    /// Stop the driving loop; the host decides how to terminate.
    Exit,
}

/// Result of executing one command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecResult {
    /// Output text
    pub stdout: String,
    /// Error text
    pub stderr: String,
    /// Exit code
    pub exit_code: i32,
    /// Control flow signal for the driver
    pub control_flow: ControlFlow,
}

impl ExecResult {
    /// Create a successful result with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Create a failed result with the given stderr.
    pub fn err(stderr: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stderr: stderr.into(),
            exit_code,
            ..Default::default()
        }
    }

    /// Create the result of `exit`.
    pub fn exit() -> Self {
        Self {
            control_flow: ControlFlow::Exit,
            ..Default::default()
        }
    }

    /// Check if the result indicates success.
    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if the driver should stop.
    pub fn is_exit(&self) -> bool {
        self.control_flow == ControlFlow::Exit
    }

    /// Text to show the user: the error message on failure, the output otherwise.
    pub fn text(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

impl From<CommandError> for ExecResult {
    fn from(err: CommandError) -> Self {
        let exit_code = err.exit_code();
        ExecResult::err(err.to_string(), exit_code)
    }
}

/// One dispatched startup-script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptStep {
    /// Trimmed command line as dispatched
    pub line: String,
    pub result: ExecResult,
}

/// Outcome of replaying a startup script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// Dispatched lines in file order; comments and blanks are not included
    pub steps: Vec<ScriptStep>,
    /// Whether an `exit` line stopped the replay
    pub exited: bool,
}

impl ScriptReport {
    /// Results of all dispatched lines, in order.
    pub fn results(&self) -> impl Iterator<Item = &ExecResult> {
        self.steps.iter().map(|step| &step.result)
    }
}
