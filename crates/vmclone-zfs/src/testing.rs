//! Scripted command runner for tests.

use std::sync::Mutex;

use crate::runner::{CommandOutput, CommandRunner};

struct Rule {
    prefix: Vec<String>,
    output: CommandOutput,
    remaining: Option<usize>,
}

/// Replays canned outputs for commands matching a prefix and records every
/// invocation.
///
/// Rules are tried in insertion order; unmatched commands succeed with empty
/// output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedRunner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn on(self, prefix: &[&str], output: CommandOutput) -> Self {
        self.push_rule(prefix, output, None);
        self
    }

    /// Like [`on`](Self::on) but the rule only answers once.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn once(self, prefix: &[&str], output: CommandOutput) -> Self {
        self.push_rule(prefix, output, Some(1));
        self
    }

    fn push_rule(&self, prefix: &[&str], output: CommandOutput, remaining: Option<usize>) {
        self.rules.lock().expect("lock poisoned").push(Rule {
            prefix: prefix.iter().map(ToString::to_string).collect(),
            output,
            remaining,
        });
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Invocations rendered as space-joined strings.
    #[must_use]
    pub fn call_lines(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.join(" ")).collect()
    }
}

#[must_use]
pub fn ok(stdout: &str) -> CommandOutput {
    CommandOutput {
        code: Some(0),
        stdout: stdout.to_string(),
        stderr: String::new(),
    }
}

#[must_use]
pub fn fail(code: i32, stderr: &str) -> CommandOutput {
    CommandOutput {
        code: Some(code),
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[String]) -> std::io::Result<CommandOutput> {
        let mut invocation = vec![program.to_string()];
        invocation.extend(args.iter().cloned());
        self.calls
            .lock()
            .expect("lock poisoned")
            .push(invocation.clone());

        let mut rules = self.rules.lock().expect("lock poisoned");
        for rule in rules.iter_mut() {
            if rule.remaining == Some(0) || !invocation.starts_with(&rule.prefix) {
                continue;
            }
            if let Some(remaining) = rule.remaining.as_mut() {
                *remaining -= 1;
            }
            return Ok(rule.output.clone());
        }
        Ok(ok(""))
    }
}
