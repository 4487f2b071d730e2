//! Client-side synchronization engine for a kanban task board.
//!
//! The [`store::EntityStore`] owns boards, lists and tasks and publishes
//! snapshots to subscribers. The [`controller::BoardController`] runs the
//! load, create, update, move and delete workflows against a
//! [`gateway::RemoteGateway`] and writes the results into the store.

pub mod controller;
pub mod drag;
pub mod gateway;
pub mod position;
pub mod store;
pub mod types;
