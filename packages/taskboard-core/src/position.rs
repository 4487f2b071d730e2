/// Position allocation for ordered sibling groups (lists of a board, tasks
/// of a list).
///
/// Positions are ordering hints, not keys. New items get the current sibling
/// count; dropped items get the raw destination index. Other siblings are
/// never renumbered, so values can collide and the render order falls back
/// to insertion order for ties.
use crate::types::{List, Task};

/// Anything that sorts by an integer position within its sibling group.
pub trait Positioned {
    fn position(&self) -> i64;
}

impl Positioned for List {
    fn position(&self) -> i64 {
        self.position
    }
}

impl Positioned for Task {
    fn position(&self) -> i64 {
        self.position
    }
}

impl<T: Positioned> Positioned for std::sync::Arc<T> {
    fn position(&self) -> i64 {
        (**self).position()
    }
}

/// Position for an item appended to a group that currently has
/// `sibling_count` members.
pub fn append_position(sibling_count: usize) -> i64 {
    sibling_count as i64
}

/// Position for an item dropped at `destination_index`.
pub fn drop_position(destination_index: usize) -> i64 {
    destination_index as i64
}

/// Sort into render order: ascending position, ties keep their incoming
/// order (`sort_by_key` is stable).
pub fn render_order<T: Positioned>(items: &mut [T]) {
    items.sort_by_key(Positioned::position);
}
