/// Drag-and-drop results consumed by the move workflow.
use serde::{Deserialize, Serialize};

/// A slot in a list: the list plus an index among its rendered tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropLocation {
    pub list_id: String,
    pub index: usize,
}

impl DropLocation {
    pub fn new(list_id: impl Into<String>, index: usize) -> Self {
        Self {
            list_id: list_id.into(),
            index,
        }
    }
}

/// The end of a drag gesture. `destination` is `None` when the task was
/// dropped outside any list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropResult {
    pub task_id: String,
    pub source: DropLocation,
    pub destination: Option<DropLocation>,
}

impl DropResult {
    /// The destination, unless the drop changes nothing.
    pub fn effective_destination(&self) -> Option<&DropLocation> {
        self.destination
            .as_ref()
            .filter(|destination| **destination != self.source)
    }
}
