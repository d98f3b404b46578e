//! Progress reporting.
//!
//! Every component receives a `&dyn Reporter` instead of writing to the
//! terminal directly, so the pipeline can run under a console front end or
//! be observed from tests.

use std::fmt;
use std::sync::Mutex;

/// Kind of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// A pipeline stage starting or finishing.
    Step,
    /// Supporting detail for the current step.
    Info,
    /// A command line about to be executed.
    Command,
    /// One line of a child process's standard output.
    Output,
    /// Scratchpad allocation and release.
    Scratch,
    Error,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Step => "step",
            Self::Info => "info",
            Self::Command => "exec",
            Self::Output => "output",
            Self::Scratch => "scratch",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait Reporter {
    fn report(&self, category: Category, message: &str);
}

/// Prints tagged progress lines to the terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report(&self, category: Category, message: &str) {
        match category {
            Category::Step => println!("{message}"),
            Category::Output => println!("    | {message}"),
            Category::Error => eprintln!("Error: {message}"),
            other => println!("  [{other}] {message}"),
        }
    }
}

/// Collects messages in memory.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    messages: Mutex<Vec<(Category, String)>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(Category, String)> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }

    /// Messages of one category, in the order they were reported.
    pub fn lines(&self, category: Category) -> Vec<String> {
        self.messages()
            .into_iter()
            .filter(|(c, _)| *c == category)
            .map(|(_, message)| message)
            .collect()
    }
}

impl Reporter for MemoryReporter {
    fn report(&self, category: Category, message: &str) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push((category, message.to_string()));
        }
    }
}
