use std::path::Path;

use serde::{Deserialize, Serialize};

/// An external executable together with leading arguments.
///
/// Per-invocation arguments (work share, device index, ...) are appended
/// after `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCommand {
    pub program: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// File name of the program, as it shows up in the process table.
    pub fn process_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }
}

/// External collaborators invoked by the launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolSet {
    pub cpu: ToolCommand,
    pub memory: ToolCommand,
    pub gpu: ToolCommand,
    pub gpu_query: ToolCommand,
}

impl Default for ToolSet {
    fn default() -> Self {
        Self {
            cpu: ToolCommand::new("cpu-benchmark"),
            memory: ToolCommand::new("stress-ng"),
            gpu: ToolCommand::new("gpu-benchmark"),
            gpu_query: ToolCommand::new("nvidia-smi"),
        }
    }
}
