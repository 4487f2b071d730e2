pub mod memory;

use async_trait::async_trait;

use crate::types::{Board, BoardPatch, List, ListPatch, NewList, NewTask, Task, TaskPatch};

/// The only channel to the persistence service.
///
/// Every call is atomic from the caller's point of view and is never
/// retried here. Implementations: `MemoryGateway` (in-process) and the REST
/// gateway of the client crate.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Boards of the current user, newest first.
    async fn list_boards(&self) -> Result<Vec<Board>, RemoteFailure>;
    async fn create_board(&self, title: &str) -> Result<Board, RemoteFailure>;
    async fn update_board(&self, id: &str, patch: &BoardPatch) -> Result<Board, RemoteFailure>;
    async fn delete_board(&self, id: &str) -> Result<(), RemoteFailure>;

    /// Lists of a board, ascending by position.
    async fn list_lists(&self, board_id: &str) -> Result<Vec<List>, RemoteFailure>;
    async fn create_list(&self, list: &NewList) -> Result<List, RemoteFailure>;
    async fn update_list(&self, id: &str, patch: &ListPatch) -> Result<List, RemoteFailure>;
    async fn delete_list(&self, id: &str) -> Result<(), RemoteFailure>;

    /// Tasks of one list, ascending by position.
    async fn list_tasks(&self, list_id: &str) -> Result<Vec<Task>, RemoteFailure>;
    /// Tasks across every list of a board, ascending by position.
    async fn list_tasks_for_board(&self, board_id: &str) -> Result<Vec<Task>, RemoteFailure>;
    async fn create_task(&self, task: &NewTask) -> Result<Task, RemoteFailure>;
    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, RemoteFailure>;
    async fn delete_task(&self, id: &str) -> Result<(), RemoteFailure>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RemoteFailure {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Gateway operations, used for failure injection and call accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayOp {
    ListBoards,
    CreateBoard,
    UpdateBoard,
    DeleteBoard,
    ListLists,
    CreateList,
    UpdateList,
    DeleteList,
    ListTasks,
    ListTasksForBoard,
    CreateTask,
    UpdateTask,
    DeleteTask,
}
