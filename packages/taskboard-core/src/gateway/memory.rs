/// In-process gateway.
///
/// Behaves like the persistence service as the controller sees it:
/// - boards are scoped to one user and listed newest first
/// - lists and tasks are listed ascending by position; a row rewritten by
///   an update moves to the end of its table (as in a heap-organized
///   store), so position ties come back in last-write order
/// - deletes cascade board -> lists -> tasks server-side
/// - creates against a missing parent fail with `NotFound`
///
/// Failures can be queued per operation with `fail_next`, and every call is
/// counted (failed calls included).
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::{GatewayOp, RemoteFailure, RemoteGateway};
use crate::position::render_order;
use crate::types::{Board, BoardPatch, List, ListPatch, NewList, NewTask, Task, TaskPatch};

struct MemoryInner {
    boards: Vec<Board>,
    lists: Vec<List>,
    tasks: Vec<Task>,
    failures: HashMap<GatewayOp, VecDeque<RemoteFailure>>,
    calls: HashMap<GatewayOp, usize>,
    /// Creation counter; keeps `created_at` strictly increasing.
    created: i64,
}

pub struct MemoryGateway {
    user_id: String,
    epoch: DateTime<Utc>,
    inner: Mutex<MemoryInner>,
}

impl MemoryGateway {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            epoch: Utc::now(),
            inner: Mutex::new(MemoryInner {
                boards: Vec::new(),
                lists: Vec::new(),
                tasks: Vec::new(),
                failures: HashMap::new(),
                calls: HashMap::new(),
                created: 0,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `op` fail with `failure`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: GatewayOp, failure: RemoteFailure) {
        self.inner()
            .failures
            .entry(op)
            .or_default()
            .push_back(failure);
    }

    /// Number of calls made for `op`.
    pub fn calls(&self, op: GatewayOp) -> usize {
        self.inner().calls.get(&op).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.inner().calls.values().sum()
    }

    /// Insert a board directly, bypassing accounting and failure injection.
    pub fn seed_board(&self, title: &str) -> Board {
        let mut inner = self.inner();
        let board = Board {
            id: new_id(),
            title: title.to_string(),
            user_id: self.user_id.clone(),
            created_at: self.next_timestamp(&mut inner),
        };
        inner.boards.push(board.clone());
        board
    }

    /// Insert a board owned by someone else.
    pub fn seed_foreign_board(&self, title: &str, user_id: &str) -> Board {
        let mut inner = self.inner();
        let board = Board {
            id: new_id(),
            title: title.to_string(),
            user_id: user_id.to_string(),
            created_at: self.next_timestamp(&mut inner),
        };
        inner.boards.push(board.clone());
        board
    }

    pub fn seed_list(&self, board_id: &str, title: &str, position: i64) -> List {
        let mut inner = self.inner();
        let list = List {
            id: new_id(),
            title: title.to_string(),
            board_id: board_id.to_string(),
            position,
            created_at: self.next_timestamp(&mut inner),
        };
        inner.lists.push(list.clone());
        list
    }

    pub fn seed_task(&self, list_id: &str, title: &str, position: i64) -> Task {
        let mut inner = self.inner();
        let task = Task {
            id: new_id(),
            title: title.to_string(),
            description: None,
            list_id: list_id.to_string(),
            position,
            created_at: self.next_timestamp(&mut inner),
        };
        inner.tasks.push(task.clone());
        task
    }

    /// Server-side task row, without accounting.
    pub fn stored_task(&self, id: &str) -> Option<Task> {
        self.inner().tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn stored_task_count(&self) -> usize {
        self.inner().tasks.len()
    }

    fn next_timestamp(&self, inner: &mut MemoryInner) -> DateTime<Utc> {
        inner.created += 1;
        self.epoch + Duration::milliseconds(inner.created)
    }

    /// Count the call, then pop a queued failure for it, if any.
    fn begin(&self, op: GatewayOp) -> Result<MutexGuard<'_, MemoryInner>, RemoteFailure> {
        let mut inner = self.inner();
        *inner.calls.entry(op).or_insert(0) += 1;
        if let Some(failure) = inner.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            log::debug!(target: "taskboard.gateway.memory", "{:?} failing: {}", op, failure);
            return Err(failure);
        }
        Ok(inner)
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn not_found(kind: &str, id: &str) -> RemoteFailure {
    RemoteFailure::NotFound(format!("{} {}", kind, id))
}

/// Take the row out of `rows` and push its patched version at the end.
fn rewrite<T: Clone>(
    rows: &mut Vec<T>,
    matches: impl Fn(&T) -> bool,
    patch: impl FnOnce(&T) -> T,
) -> Option<T> {
    let index = rows.iter().position(matches)?;
    let old = rows.remove(index);
    let new = patch(&old);
    rows.push(new.clone());
    Some(new)
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn list_boards(&self) -> Result<Vec<Board>, RemoteFailure> {
        let inner = self.begin(GatewayOp::ListBoards)?;
        let mut boards: Vec<Board> = inner
            .boards
            .iter()
            .filter(|b| b.user_id == self.user_id)
            .cloned()
            .collect();
        boards.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(boards)
    }

    async fn create_board(&self, title: &str) -> Result<Board, RemoteFailure> {
        let mut inner = self.begin(GatewayOp::CreateBoard)?;
        let board = Board {
            id: new_id(),
            title: title.to_string(),
            user_id: self.user_id.clone(),
            created_at: self.next_timestamp(&mut inner),
        };
        inner.boards.push(board.clone());
        Ok(board)
    }

    async fn update_board(&self, id: &str, patch: &BoardPatch) -> Result<Board, RemoteFailure> {
        let mut inner = self.begin(GatewayOp::UpdateBoard)?;
        rewrite(&mut inner.boards, |b| b.id == id, |b| b.patched(patch))
            .ok_or_else(|| not_found("board", id))
    }

    async fn delete_board(&self, id: &str) -> Result<(), RemoteFailure> {
        let mut inner = self.begin(GatewayOp::DeleteBoard)?;
        let before = inner.boards.len();
        inner.boards.retain(|b| b.id != id);
        if inner.boards.len() == before {
            return Err(not_found("board", id));
        }
        let list_ids: Vec<String> = inner
            .lists
            .iter()
            .filter(|l| l.board_id == id)
            .map(|l| l.id.clone())
            .collect();
        inner.lists.retain(|l| l.board_id != id);
        inner.tasks.retain(|t| !list_ids.contains(&t.list_id));
        Ok(())
    }

    async fn list_lists(&self, board_id: &str) -> Result<Vec<List>, RemoteFailure> {
        let inner = self.begin(GatewayOp::ListLists)?;
        let mut lists: Vec<List> = inner
            .lists
            .iter()
            .filter(|l| l.board_id == board_id)
            .cloned()
            .collect();
        render_order(&mut lists);
        Ok(lists)
    }

    async fn create_list(&self, list: &NewList) -> Result<List, RemoteFailure> {
        let mut inner = self.begin(GatewayOp::CreateList)?;
        if !inner.boards.iter().any(|b| b.id == list.board_id) {
            return Err(not_found("board", &list.board_id));
        }
        let list = List {
            id: new_id(),
            title: list.title.clone(),
            board_id: list.board_id.clone(),
            position: list.position,
            created_at: self.next_timestamp(&mut inner),
        };
        inner.lists.push(list.clone());
        Ok(list)
    }

    async fn update_list(&self, id: &str, patch: &ListPatch) -> Result<List, RemoteFailure> {
        let mut inner = self.begin(GatewayOp::UpdateList)?;
        rewrite(&mut inner.lists, |l| l.id == id, |l| l.patched(patch))
            .ok_or_else(|| not_found("list", id))
    }

    async fn delete_list(&self, id: &str) -> Result<(), RemoteFailure> {
        let mut inner = self.begin(GatewayOp::DeleteList)?;
        let before = inner.lists.len();
        inner.lists.retain(|l| l.id != id);
        if inner.lists.len() == before {
            return Err(not_found("list", id));
        }
        inner.tasks.retain(|t| t.list_id != id);
        Ok(())
    }

    async fn list_tasks(&self, list_id: &str) -> Result<Vec<Task>, RemoteFailure> {
        let inner = self.begin(GatewayOp::ListTasks)?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .iter()
            .filter(|t| t.list_id == list_id)
            .cloned()
            .collect();
        render_order(&mut tasks);
        Ok(tasks)
    }

    async fn list_tasks_for_board(&self, board_id: &str) -> Result<Vec<Task>, RemoteFailure> {
        let inner = self.begin(GatewayOp::ListTasksForBoard)?;
        let list_ids: Vec<&str> = inner
            .lists
            .iter()
            .filter(|l| l.board_id == board_id)
            .map(|l| l.id.as_str())
            .collect();
        let mut tasks: Vec<Task> = inner
            .tasks
            .iter()
            .filter(|t| list_ids.contains(&t.list_id.as_str()))
            .cloned()
            .collect();
        render_order(&mut tasks);
        Ok(tasks)
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, RemoteFailure> {
        let mut inner = self.begin(GatewayOp::CreateTask)?;
        if !inner.lists.iter().any(|l| l.id == task.list_id) {
            return Err(not_found("list", &task.list_id));
        }
        let task = Task {
            id: new_id(),
            title: task.title.clone(),
            description: task.description.clone(),
            list_id: task.list_id.clone(),
            position: task.position,
            created_at: self.next_timestamp(&mut inner),
        };
        inner.tasks.push(task.clone());
        Ok(task)
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, RemoteFailure> {
        let mut inner = self.begin(GatewayOp::UpdateTask)?;
        if let Some(list_id) = &patch.list_id {
            if !inner.lists.iter().any(|l| &l.id == list_id) {
                return Err(not_found("list", list_id));
            }
        }
        rewrite(&mut inner.tasks, |t| t.id == id, |t| t.patched(patch))
            .ok_or_else(|| not_found("task", id))
    }

    async fn delete_task(&self, id: &str) -> Result<(), RemoteFailure> {
        let mut inner = self.begin(GatewayOp::DeleteTask)?;
        let before = inner.tasks.len();
        inner.tasks.retain(|t| t.id != id);
        if inner.tasks.len() == before {
            return Err(not_found("task", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_boards_scoped_to_user_newest_first() {
        let gateway = MemoryGateway::new("u1");
        let older = gateway.seed_board("Older");
        gateway.seed_foreign_board("Theirs", "u2");
        let newer = gateway.create_board("Newer").await.unwrap();

        let boards = gateway.list_boards().await.unwrap();
        let ids: Vec<_> = boards.iter().map(|b| b.id.clone()).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
    }

    #[tokio::test]
    async fn test_tasks_for_board_spans_lists_in_position_order() {
        let gateway = MemoryGateway::new("u1");
        let board = gateway.seed_board("B");
        let other = gateway.seed_board("Other");
        let l1 = gateway.seed_list(&board.id, "L1", 0);
        let l2 = gateway.seed_list(&board.id, "L2", 1);
        let l3 = gateway.seed_list(&other.id, "L3", 0);
        gateway.seed_task(&l1.id, "a", 1);
        gateway.seed_task(&l2.id, "b", 0);
        gateway.seed_task(&l3.id, "c", 0);

        let tasks = gateway.list_tasks_for_board(&board.id).await.unwrap();
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_updated_rows_sort_after_ties() {
        let gateway = MemoryGateway::new("u1");
        let board = gateway.seed_board("B");
        let list = gateway.seed_list(&board.id, "L", 0);
        let first = gateway.seed_task(&list.id, "first", 0);
        gateway.seed_task(&list.id, "second", 0);

        gateway
            .update_task(&first.id, &TaskPatch::title("first*"))
            .await
            .unwrap();

        let tasks = gateway.list_tasks(&list.id).await.unwrap();
        let titles: Vec<_> = tasks.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["second", "first*"]);
    }

    #[tokio::test]
    async fn test_delete_board_cascades() {
        let gateway = MemoryGateway::new("u1");
        let board = gateway.seed_board("B");
        let list = gateway.seed_list(&board.id, "L", 0);
        gateway.seed_task(&list.id, "t", 0);

        gateway.delete_board(&board.id).await.unwrap();

        assert_eq!(gateway.stored_task_count(), 0);
        assert!(gateway.list_lists(&board.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_next_is_consumed_once_and_counted() {
        let gateway = MemoryGateway::new("u1");
        gateway.fail_next(
            GatewayOp::ListBoards,
            RemoteFailure::Network("offline".to_string()),
        );

        assert!(matches!(
            gateway.list_boards().await,
            Err(RemoteFailure::Network(_))
        ));
        assert!(gateway.list_boards().await.is_ok());
        assert_eq!(gateway.calls(GatewayOp::ListBoards), 2);
        assert_eq!(gateway.total_calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let gateway = MemoryGateway::new("u1");
        assert!(matches!(
            gateway.delete_task("nope").await,
            Err(RemoteFailure::NotFound(_))
        ));
        let new_task = NewTask {
            title: "t".to_string(),
            description: None,
            list_id: "nope".to_string(),
            position: 0,
        };
        assert!(matches!(
            gateway.create_task(&new_task).await,
            Err(RemoteFailure::NotFound(_))
        ));
    }
}
