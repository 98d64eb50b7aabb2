//! Tree-Function invocation records.
//!
//! A [`TreeFunctionBinding`] is the value held by a `TreeFunction` Parameter:
//! it names a function kind and lists the Parameters the function reads and
//! writes. Bindings reference Parameters by [`Entry`] only; they never own
//! them.

use serde::{Deserialize, Serialize};

use crate::label::Entry;

/// Scheduling priority within one execution level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum TreeFunctionPriority {
    #[default]
    Normal,
    High,
}

impl TreeFunctionPriority {
    pub(crate) fn code(self) -> i64 {
        match self {
            TreeFunctionPriority::Normal => 0,
            TreeFunctionPriority::High => 1,
        }
    }

    pub(crate) fn from_code(code: i64) -> Self {
        if code > 0 {
            TreeFunctionPriority::High
        } else {
            TreeFunctionPriority::Normal
        }
    }
}

/// A Tree-Function invocation: function name, ordered inputs and outputs,
/// heaviness and priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeFunctionBinding {
    pub function: String,
    pub inputs: Vec<Entry>,
    pub outputs: Vec<Entry>,
    pub heavy: bool,
    pub priority: TreeFunctionPriority,
}

impl TreeFunctionBinding {
    pub fn new(function: impl Into<String>) -> Self {
        TreeFunctionBinding {
            function: function.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            heavy: false,
            priority: TreeFunctionPriority::Normal,
        }
    }

    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = Entry>) -> Self {
        self.inputs = inputs.into_iter().collect();
        self
    }

    pub fn with_outputs(mut self, outputs: impl IntoIterator<Item = Entry>) -> Self {
        self.outputs = outputs.into_iter().collect();
        self
    }

    pub fn heavy(mut self, heavy: bool) -> Self {
        self.heavy = heavy;
        self
    }

    pub fn with_priority(mut self, priority: TreeFunctionPriority) -> Self {
        self.priority = priority;
        self
    }

    /// True when `entry` is one of the declared inputs.
    pub fn reads(&self, entry: &Entry) -> bool {
        self.inputs.contains(entry)
    }

    /// True when `entry` is one of the declared outputs.
    pub fn writes(&self, entry: &Entry) -> bool {
        self.outputs.contains(entry)
    }
}
