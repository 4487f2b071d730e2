/// Reconciliation controller: the workflows that touch the gateway and the
/// store together.
///
/// Rules shared by every workflow:
/// - the gateway call goes first; the store changes only after it resolved
/// - a failed call leaves the collections as they were, records the message
///   in the store's `error` field and is returned to the caller
/// - nothing is retried
///
/// The move workflow is the exception to "store after success": it always
/// ends with a full task re-fetch for the current board, even when its
/// update failed, so local order converges on the server's.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::drag::DropResult;
use crate::gateway::{RemoteFailure, RemoteGateway};
use crate::position::{append_position, drop_position};
use crate::store::{EntityStore, LoadState};
use crate::types::{Board, BoardPatch, List, ListPatch, NewList, NewTask, Task, TaskPatch};

const TARGET: &str = "taskboard.controller";

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Another submission is already in progress")]
    Busy,

    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

/// What a move workflow did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Dropped outside a list or on its own slot. No calls, no mutations.
    Unchanged,
    /// Updated remotely, patched locally and reconciled.
    Moved,
}

/// Clears the submitting flag when the submission ends, however it ends.
struct Submission<'a>(&'a AtomicBool);

impl Drop for Submission<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct BoardController {
    gateway: Arc<dyn RemoteGateway>,
    store: Arc<EntityStore>,
    submitting: AtomicBool,
}

impl BoardController {
    pub fn new(gateway: Arc<dyn RemoteGateway>, store: Arc<EntityStore>) -> Self {
        Self {
            gateway,
            store,
            submitting: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.store
    }

    /// True while a list creation is waiting on the gateway.
    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    fn begin_submission(&self) -> Result<Submission<'_>, ControllerError> {
        if self.submitting.swap(true, Ordering::AcqRel) {
            return Err(ControllerError::Busy);
        }
        Ok(Submission(&self.submitting))
    }

    fn record_failure(&self, action: &str, error: &RemoteFailure) {
        log::error!(target: TARGET, "Failed to {}: {}", action, error);
        self.store
            .set_error(Some(format!("Failed to {}: {}", action, error)));
    }

    fn current_board_id(&self) -> Option<String> {
        self.store.current_board().map(|b| b.id.clone())
    }

    // ── Boards ───────────────────────────────────────────────────────────

    /// Fetch the user's boards into the store.
    pub async fn load_boards(&self) -> Result<(), ControllerError> {
        match self.gateway.list_boards().await {
            Ok(boards) => {
                log::info!(target: TARGET, "Loaded {} boards", boards.len());
                self.store.set(boards);
                self.store.set_error(None);
                Ok(())
            }
            Err(e) => {
                self.record_failure("load boards", &e);
                Err(e.into())
            }
        }
    }

    /// Load a board, then its lists, then its tasks, in that order.
    ///
    /// Never returns an error: the outcome is the terminal `LoadState`
    /// (`Ready`, `NotFound` or `Failed`), which is also written to the store.
    /// Each collection is replaced as soon as its own fetch succeeds, so a
    /// task fetch failure leaves fresh lists next to stale tasks.
    pub async fn load_board(&self, board_id: &str) -> LoadState {
        log::info!(target: TARGET, "Loading board {}", board_id);
        self.store.set_load_state(LoadState::Loading);

        let state = match self.fetch_board(board_id).await {
            Ok(state) => state,
            Err(e) => {
                self.record_failure(&format!("load board {}", board_id), &e);
                LoadState::Failed
            }
        };
        self.store.set_load_state(state);
        state
    }

    async fn fetch_board(&self, board_id: &str) -> Result<LoadState, RemoteFailure> {
        let boards = self.gateway.list_boards().await?;
        let Some(board) = boards.into_iter().find(|b| b.id == board_id) else {
            log::warn!(target: TARGET, "Board not found: {}", board_id);
            return Ok(LoadState::NotFound);
        };
        self.store.set_current_board(Some(board));

        let lists = self.gateway.list_lists(board_id).await?;
        log::debug!(target: TARGET, "Loaded {} lists", lists.len());
        self.store.set(lists);

        let tasks = self.gateway.list_tasks_for_board(board_id).await?;
        log::debug!(target: TARGET, "Loaded {} tasks", tasks.len());
        self.store.set(tasks);

        self.store.set_error(None);
        Ok(LoadState::Ready)
    }

    pub async fn create_board(&self, title: &str) -> Result<Board, ControllerError> {
        let title = require_title(title)?;
        match self.gateway.create_board(&title).await {
            Ok(board) => {
                self.store.add(board.clone());
                self.store.set_error(None);
                Ok(board)
            }
            Err(e) => {
                self.record_failure("create board", &e);
                Err(e.into())
            }
        }
    }

    pub async fn update_board(&self, id: &str, patch: &BoardPatch) -> Result<(), ControllerError> {
        let mut patch = patch.clone();
        if let Some(title) = &patch.title {
            patch.title = Some(require_title(title)?);
        }
        if let Err(e) = self.gateway.update_board(id, &patch).await {
            self.record_failure("update board", &e);
            return Err(e.into());
        }
        self.store.update::<Board>(id, &patch);
        if let Some(current) = self.store.current_board().filter(|b| b.id == id) {
            self.store.set_current_board(Some(current.patched(&patch)));
        }
        self.store.set_error(None);
        Ok(())
    }

    /// Delete a board. The service cascades to its lists and tasks; locally
    /// the board entry goes away together with any of its lists and tasks
    /// the store still holds, and it stops being the current board.
    pub async fn delete_board(&self, id: &str) -> Result<(), ControllerError> {
        if let Err(e) = self.gateway.delete_board(id).await {
            self.record_failure("delete board", &e);
            return Err(e.into());
        }
        self.store.remove::<Board>(id);

        let list_ids: Vec<String> = self
            .store
            .collection::<List>()
            .iter()
            .filter(|l| l.board_id == id)
            .map(|l| l.id.clone())
            .collect();
        self.store.remove_where::<List>(|l| l.board_id == id);
        self.store
            .remove_where::<Task>(|t| list_ids.contains(&t.list_id));

        if self.current_board_id().as_deref() == Some(id) {
            self.store.set_current_board(None);
            self.store.set_load_state(LoadState::Idle);
        }
        self.store.set_error(None);
        log::info!(target: TARGET, "Deleted board {}", id);
        Ok(())
    }

    // ── Lists ────────────────────────────────────────────────────────────

    /// Append a list to the current board.
    ///
    /// The position is the local list count, not a re-fetched one. Only one
    /// list creation runs at a time; a second one gets `Busy`.
    pub async fn create_list(&self, title: &str) -> Result<List, ControllerError> {
        let title = require_title(title)?;
        let board_id = self
            .current_board_id()
            .ok_or_else(|| ControllerError::NotFound("no board loaded".to_string()))?;
        let _submission = self.begin_submission()?;

        let new_list = NewList {
            title,
            position: append_position(self.store.count::<List>(|l| l.board_id == board_id)),
            board_id,
        };
        match self.gateway.create_list(&new_list).await {
            Ok(list) => {
                self.store.add(list.clone());
                self.store.set_error(None);
                Ok(list)
            }
            Err(e) => {
                self.record_failure("create list", &e);
                Err(e.into())
            }
        }
    }

    pub async fn update_list(&self, id: &str, patch: &ListPatch) -> Result<(), ControllerError> {
        let mut patch = patch.clone();
        if let Some(title) = &patch.title {
            patch.title = Some(require_title(title)?);
        }
        if let Err(e) = self.gateway.update_list(id, &patch).await {
            self.record_failure("update list", &e);
            return Err(e.into());
        }
        self.store.update::<List>(id, &patch);
        self.store.set_error(None);
        Ok(())
    }

    /// Delete a list and, locally, every task that belonged to it.
    pub async fn delete_list(&self, id: &str) -> Result<(), ControllerError> {
        if let Err(e) = self.gateway.delete_list(id).await {
            self.record_failure("delete list", &e);
            return Err(e.into());
        }
        self.store.remove::<List>(id);
        let removed = self.store.remove_where::<Task>(|t| t.list_id == id);
        log::info!(target: TARGET, "Deleted list {} with {} tasks", id, removed);
        self.store.set_error(None);
        Ok(())
    }

    // ── Tasks ────────────────────────────────────────────────────────────

    /// Append a task to a list, positioned after the list's local tasks.
    pub async fn create_task(
        &self,
        list_id: &str,
        title: &str,
        description: Option<String>,
    ) -> Result<Task, ControllerError> {
        let title = require_title(title)?;
        if self.store.get::<List>(list_id).is_none() {
            return Err(ControllerError::NotFound(format!("list {}", list_id)));
        }

        let new_task = NewTask {
            title,
            description,
            list_id: list_id.to_string(),
            position: append_position(self.store.count::<Task>(|t| t.list_id == list_id)),
        };
        match self.gateway.create_task(&new_task).await {
            Ok(task) => {
                self.store.add(task.clone());
                self.store.set_error(None);
                Ok(task)
            }
            Err(e) => {
                self.record_failure("create task", &e);
                Err(e.into())
            }
        }
    }

    /// Edit a task's title, description, list or position. The store is
    /// patched only after the gateway accepted the same patch.
    pub async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<(), ControllerError> {
        if patch.is_empty() {
            return Err(ControllerError::Validation("nothing to update".to_string()));
        }
        let mut patch = patch.clone();
        if let Some(title) = &patch.title {
            patch.title = Some(require_title(title)?);
        }
        if let Err(e) = self.gateway.update_task(id, &patch).await {
            self.record_failure("update task", &e);
            return Err(e.into());
        }
        self.store.update::<Task>(id, &patch);
        self.store.set_error(None);
        Ok(())
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ControllerError> {
        if let Err(e) = self.gateway.delete_task(id).await {
            self.record_failure("delete task", &e);
            return Err(e.into());
        }
        self.store.remove::<Task>(id);
        self.store.set_error(None);
        Ok(())
    }

    /// Apply a drag-and-drop result.
    ///
    /// 1. no destination, or the task's own slot: return `Unchanged`
    /// 2. update the task remotely with the destination list and index
    /// 3. on success apply the same patch locally; on failure skip it
    /// 4. re-fetch every task of the current board, whatever step 2 did
    ///
    /// A step-2 failure is returned after step 4 has run.
    pub async fn move_task(&self, drop: &DropResult) -> Result<MoveOutcome, ControllerError> {
        let Some(destination) = drop.effective_destination() else {
            log::debug!(target: TARGET, "Drop of {} changes nothing", drop.task_id);
            return Ok(MoveOutcome::Unchanged);
        };

        let patch = TaskPatch::relocate(&destination.list_id, drop_position(destination.index));
        let update = self.gateway.update_task(&drop.task_id, &patch).await;
        match &update {
            Ok(_) => {
                self.store.update::<Task>(&drop.task_id, &patch);
            }
            Err(e) => {
                log::error!(target: TARGET, "Failed to move task {}: {}", drop.task_id, e);
            }
        }

        let reconciled = self.reconcile_tasks().await;

        if let Err(e) = update {
            self.record_failure("move task", &e);
            return Err(e.into());
        }
        reconciled?;
        self.store.set_error(None);
        Ok(MoveOutcome::Moved)
    }

    /// Replace the task collection with the server's tasks for the current
    /// board. Does nothing when no board is loaded.
    pub async fn reconcile_tasks(&self) -> Result<(), ControllerError> {
        let Some(board_id) = self.current_board_id() else {
            log::debug!(target: TARGET, "No current board, skipping task re-fetch");
            return Ok(());
        };
        match self.gateway.list_tasks_for_board(&board_id).await {
            Ok(tasks) => {
                log::debug!(target: TARGET, "Re-fetched {} tasks for {}", tasks.len(), board_id);
                self.store.set(tasks);
                Ok(())
            }
            Err(e) => {
                self.record_failure("re-fetch tasks", &e);
                Err(e.into())
            }
        }
    }
}

/// Titles must be non-empty after trimming; the trimmed form is what gets
/// sent.
fn require_title(title: &str) -> Result<String, ControllerError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ControllerError::Validation("title must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_title_trims() {
        assert_eq!(require_title("  Todo ").unwrap(), "Todo");
        assert!(matches!(
            require_title("   "),
            Err(ControllerError::Validation(_))
        ));
    }

    #[test]
    fn test_submission_flag_resets_on_drop() {
        let flag = AtomicBool::new(false);
        {
            flag.store(true, Ordering::Release);
            let _submission = Submission(&flag);
        }
        assert!(!flag.load(Ordering::Acquire));
    }
}
