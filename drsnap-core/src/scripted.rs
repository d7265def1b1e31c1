//! Scripted [`CommandRunner`] for tests.
//!
//! Rules match on a substring of the rendered command line and are checked in
//! the order they were added. Each rule replays its queue of results and keeps
//! returning the last one once the queue is drained.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::command::{CommandResult, CommandRunner, CommandSpec};
use crate::error::Result;

/// Exit code returned for commands no rule matches.
pub const UNSCRIPTED_EXIT_CODE: i32 = 127;

struct Rule {
    pattern: String,
    queue: VecDeque<CommandResult>,
    last: CommandResult,
}

#[derive(Default)]
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always answer commands containing `pattern` with `result`.
    pub fn on(self, pattern: impl Into<String>, result: CommandResult) -> Self {
        self.on_sequence(pattern, vec![result])
    }

    /// Answer successive matching commands with `results`, repeating the last.
    pub fn on_sequence(self, pattern: impl Into<String>, results: Vec<CommandResult>) -> Self {
        let mut queue: VecDeque<CommandResult> = results.into();
        let last = queue
            .back()
            .cloned()
            .unwrap_or_else(|| CommandResult::failed(UNSCRIPTED_EXIT_CODE, "empty script"));
        if queue.len() == 1 {
            queue.clear();
        }
        if let Ok(mut rules) = self.rules.lock() {
            rules.push(Rule {
                pattern: pattern.into(),
                queue,
                last,
            });
        }
        self
    }

    /// Every command line run so far, in invocation order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of invocations whose command line contains `pattern`.
    pub fn call_count(&self, pattern: &str) -> usize {
        self.calls()
            .iter()
            .filter(|line| line.contains(pattern))
            .count()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandResult> {
        let line = command.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(line.clone());
        }

        let mut rules = match self.rules.lock() {
            Ok(rules) => rules,
            Err(poisoned) => poisoned.into_inner(),
        };
        let result = rules
            .iter_mut()
            .find(|rule| line.contains(&rule.pattern))
            .map(|rule| rule.queue.pop_front().unwrap_or_else(|| rule.last.clone()))
            .unwrap_or_else(|| {
                CommandResult::failed(
                    UNSCRIPTED_EXIT_CODE,
                    format!("no scripted response for: {line}"),
                )
            });
        Ok(result)
    }
}
