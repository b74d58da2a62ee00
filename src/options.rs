//! Virtual machine configuration.
use std::path::PathBuf;

use crate::runtime::DEFAULT_MAX_STACK_DEPTH;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmOptions {
    /// Directory user classes are loaded from.
    pub classpath: PathBuf,
    /// Frames a thread may hold before `StackOverflowError`.
    pub max_stack_depth: usize,
    /// Log every executed instruction at `trace` level.
    pub trace_instructions: bool,
}

impl VmOptions {
    pub fn new(classpath: impl Into<PathBuf>) -> Self {
        Self {
            classpath: classpath.into(),
            ..Self::default()
        }
    }

    pub fn with_max_stack_depth(mut self, depth: usize) -> Self {
        self.max_stack_depth = depth;
        self
    }

    pub fn with_trace_instructions(mut self, enabled: bool) -> Self {
        self.trace_instructions = enabled;
        self
    }
}

impl Default for VmOptions {
    fn default() -> Self {
        Self {
            classpath: PathBuf::from("."),
            max_stack_depth: DEFAULT_MAX_STACK_DEPTH,
            trace_instructions: false,
        }
    }
}
