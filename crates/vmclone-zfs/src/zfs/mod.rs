mod dataset;
mod snapshot;

use tracing::trace;

use crate::runner::{CommandOutput, CommandRunner, SystemRunner};
use crate::{Result, ZfsError};

/// Tag used for snapshot holds when the caller does not pick one.
pub const DEFAULT_HOLD_TAG: &str = "vmclone";

/// Handle to the `zfs` command line tool.
///
/// Every operation spawns a fresh process; nothing is held open between
/// calls, so long-running destroys never block concurrent queries.
pub struct Zfs<R = SystemRunner> {
    runner: R,
    binary: String,
}

impl Zfs<SystemRunner> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_runner(SystemRunner, "zfs")
    }

    #[must_use]
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self::with_runner(SystemRunner, binary)
    }
}

impl Default for Zfs<SystemRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> Zfs<R> {
    #[must_use]
    pub fn with_runner(runner: R, binary: impl Into<String>) -> Self {
        Self {
            runner,
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn render(&self, args: &[String]) -> String {
        std::iter::once(self.binary.as_str())
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn exec(&self, args: &[String]) -> Result<CommandOutput> {
        trace!(command = %self.render(args), "running zfs");
        self.runner
            .run(&self.binary, args)
            .map_err(|source| ZfsError::Spawn {
                program: self.binary.clone(),
                source,
            })
    }

    /// Runs a command and returns its stdout, classifying failures.
    fn run(&self, args: &[String]) -> Result<String> {
        let output = self.exec(args)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(ZfsError::classify(&self.render(args), &output.stderr))
        }
    }

    fn unexpected(&self, args: &[String], line: &str) -> ZfsError {
        ZfsError::UnexpectedOutput {
            command: self.render(args),
            line: line.to_string(),
        }
    }
}

pub(crate) fn args<const N: usize>(fixed: [&str; N]) -> Vec<String> {
    fixed.iter().map(ToString::to_string).collect()
}
