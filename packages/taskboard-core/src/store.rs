/// Entity store: the client-side owner of boards, lists and tasks.
///
/// State lives in a `tokio::sync::watch` channel. Every effective mutation
/// publishes a new `StoreSnapshot`; no-op mutations publish nothing. Each
/// collection is an `Arc<Vec<Arc<T>>>`: a mutation builds a new vector but
/// reuses the `Arc` of every item it did not touch, so consumers can detect
/// changes with `Arc::ptr_eq`.
use std::sync::Arc;

use tokio::sync::watch;

use crate::position::render_order;
use crate::types::{Board, BoardPatch, List, ListPatch, Task, TaskPatch};

pub type Collection<T> = Arc<Vec<Arc<T>>>;

/// Progress of the board-load workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    Ready,
    /// The requested board is not among the user's boards. Terminal, but
    /// not an error.
    NotFound,
    Failed,
}

/// Immutable view of the whole store at one instant.
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub boards: Collection<Board>,
    pub current_board: Option<Arc<Board>>,
    pub lists: Collection<List>,
    pub tasks: Collection<Task>,
    pub load_state: LoadState,
    /// Last user-facing error message from a workflow.
    pub error: Option<String>,
}

impl StoreSnapshot {
    pub fn is_loading(&self) -> bool {
        self.load_state == LoadState::Loading
    }

    /// Lists of a board in render order.
    pub fn lists_for_board(&self, board_id: &str) -> Vec<Arc<List>> {
        let mut lists: Vec<_> = self
            .lists
            .iter()
            .filter(|l| l.board_id == board_id)
            .cloned()
            .collect();
        render_order(&mut lists);
        lists
    }

    /// Tasks of a list in render order.
    pub fn tasks_in_list(&self, list_id: &str) -> Vec<Arc<Task>> {
        let mut tasks: Vec<_> = self
            .tasks
            .iter()
            .filter(|t| t.list_id == list_id)
            .cloned()
            .collect();
        render_order(&mut tasks);
        tasks
    }
}

/// An entity kind the store keeps a collection of.
pub trait Entity: Sized + Send + Sync + 'static {
    type Patch;

    /// Kind name used in log lines and error messages.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn patched(&self, patch: &Self::Patch) -> Self;
    fn collection(snapshot: &StoreSnapshot) -> &Collection<Self>;
    fn collection_mut(snapshot: &mut StoreSnapshot) -> &mut Collection<Self>;
}

impl Entity for Board {
    type Patch = BoardPatch;
    const KIND: &'static str = "board";

    fn id(&self) -> &str {
        &self.id
    }

    fn patched(&self, patch: &BoardPatch) -> Self {
        Board::patched(self, patch)
    }

    fn collection(snapshot: &StoreSnapshot) -> &Collection<Self> {
        &snapshot.boards
    }

    fn collection_mut(snapshot: &mut StoreSnapshot) -> &mut Collection<Self> {
        &mut snapshot.boards
    }
}

impl Entity for List {
    type Patch = ListPatch;
    const KIND: &'static str = "list";

    fn id(&self) -> &str {
        &self.id
    }

    fn patched(&self, patch: &ListPatch) -> Self {
        List::patched(self, patch)
    }

    fn collection(snapshot: &StoreSnapshot) -> &Collection<Self> {
        &snapshot.lists
    }

    fn collection_mut(snapshot: &mut StoreSnapshot) -> &mut Collection<Self> {
        &mut snapshot.lists
    }
}

impl Entity for Task {
    type Patch = TaskPatch;
    const KIND: &'static str = "task";

    fn id(&self) -> &str {
        &self.id
    }

    fn patched(&self, patch: &TaskPatch) -> Self {
        Task::patched(self, patch)
    }

    fn collection(snapshot: &StoreSnapshot) -> &Collection<Self> {
        &snapshot.tasks
    }

    fn collection_mut(snapshot: &mut StoreSnapshot) -> &mut Collection<Self> {
        &mut snapshot.tasks
    }
}

pub struct EntityStore {
    state: watch::Sender<StoreSnapshot>,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        let (state, _) = watch::channel(StoreSnapshot::default());
        Self { state }
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<StoreSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.state.borrow().clone()
    }

    pub fn collection<T: Entity>(&self) -> Collection<T> {
        Arc::clone(T::collection(&self.state.borrow()))
    }

    pub fn get<T: Entity>(&self, id: &str) -> Option<Arc<T>> {
        T::collection(&self.state.borrow())
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    /// Number of items in a collection matching `pred`.
    pub fn count<T: Entity>(&self, pred: impl Fn(&T) -> bool) -> usize {
        T::collection(&self.state.borrow())
            .iter()
            .filter(|&item| pred(Arc::as_ref(item)))
            .count()
    }

    /// Replace a whole collection.
    pub fn set<T: Entity>(&self, items: Vec<T>) {
        log::trace!(target: "taskboard.store", "set {} x{}", T::KIND, items.len());
        let items: Vec<Arc<T>> = items.into_iter().map(Arc::new).collect();
        self.state.send_modify(|snapshot| {
            *T::collection_mut(snapshot) = Arc::new(items);
        });
    }

    /// Append one item.
    pub fn add<T: Entity>(&self, item: T) {
        self.state.send_modify(|snapshot| {
            let collection = T::collection_mut(snapshot);
            let mut next = Vec::with_capacity(collection.len() + 1);
            next.extend(collection.iter().cloned());
            next.push(Arc::new(item));
            *collection = Arc::new(next);
        });
    }

    /// Merge `patch` into the item with `id`. Returns false (and publishes
    /// nothing) when no item matches.
    pub fn update<T: Entity>(&self, id: &str, patch: &T::Patch) -> bool {
        self.state.send_if_modified(|snapshot| {
            let collection = T::collection_mut(snapshot);
            if !collection.iter().any(|item| item.id() == id) {
                return false;
            }
            let next = collection
                .iter()
                .map(|item| {
                    if item.id() == id {
                        Arc::new(item.patched(patch))
                    } else {
                        Arc::clone(item)
                    }
                })
                .collect();
            *collection = Arc::new(next);
            true
        })
    }

    /// Delete the item with `id`. Returns false when it was absent.
    pub fn remove<T: Entity>(&self, id: &str) -> bool {
        self.remove_where::<T>(|item| item.id() == id) > 0
    }

    /// Delete every item matching `pred` in a single publish. Returns the
    /// number removed.
    pub fn remove_where<T: Entity>(&self, pred: impl Fn(&T) -> bool) -> usize {
        let mut removed = 0;
        self.state.send_if_modified(|snapshot| {
            let collection = T::collection_mut(snapshot);
            let next: Vec<Arc<T>> = collection
                .iter()
                .filter(|&item| !pred(Arc::as_ref(item)))
                .cloned()
                .collect();
            removed = collection.len() - next.len();
            if removed == 0 {
                return false;
            }
            *collection = Arc::new(next);
            true
        });
        removed
    }

    pub fn current_board(&self) -> Option<Arc<Board>> {
        self.state.borrow().current_board.clone()
    }

    pub fn set_current_board(&self, board: Option<Board>) {
        self.state.send_modify(|snapshot| {
            snapshot.current_board = board.map(Arc::new);
        });
    }

    pub fn load_state(&self) -> LoadState {
        self.state.borrow().load_state
    }

    pub fn set_load_state(&self, load_state: LoadState) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.load_state == load_state {
                return false;
            }
            snapshot.load_state = load_state;
            true
        });
    }

    pub fn set_error(&self, error: Option<String>) {
        self.state.send_if_modified(|snapshot| {
            if snapshot.error == error {
                return false;
            }
            snapshot.error = error;
            true
        });
    }
}
