/// REST gateway for a PostgREST-style persistence service.
///
///   GET    /rest/v1/boards?select=*&order=created_at.desc
///   GET    /rest/v1/lists?select=*&board_id=eq.<id>&order=position.asc
///   GET    /rest/v1/tasks?select=*&list_id=eq.<id>&order=position.asc
///   GET    /rest/v1/tasks?select=*,lists!inner(board_id)&lists.board_id=eq.<id>&order=position.asc
///   POST   /rest/v1/<table>                 (Prefer: return=representation)
///   PATCH  /rest/v1/<table>?id=eq.<id>      (Prefer: return=representation)
///   DELETE /rest/v1/<table>?id=eq.<id>      (Prefer: return=representation)
///
/// Writes ask for the affected rows back; an empty array means the id
/// matched nothing and is reported as `NotFound`.
///
/// Every request carries the `apikey` header and, when signed in, a bearer
/// token. Row-level security on the service scopes boards to the user.
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use std::time::Duration;

use taskboard_core::gateway::{RemoteFailure, RemoteGateway};
use taskboard_core::types::{Board, BoardPatch, List, ListPatch, NewList, NewTask, Task, TaskPatch};

use crate::config::ClientConfig;

const TARGET: &str = "taskboard.gateway.rest";

pub struct RestGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
    user_id: Option<String>,
}

#[derive(Serialize)]
struct NewBoardRow<'a> {
    title: &'a str,
    user_id: &'a str,
}

impl RestGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, RemoteFailure> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RemoteFailure::Network(format!("HTTP client setup failed: {}", e)))?;
        Ok(Self {
            client,
            base_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            access_token: config.access_token.clone(),
            user_id: config.user_id.clone(),
        })
    }

    fn request(&self, method: Method, table: &str) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    fn returning(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, table)
            .header("Prefer", "return=representation")
    }

    async fn send(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<reqwest::Response, RemoteFailure> {
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                RemoteFailure::Network(format!("{} timed out", what))
            } else {
                RemoteFailure::Network(format!("{}: {}", what, e))
            }
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let failure = failure_for_status(status, what, body);
        log::warn!(target: TARGET, "{}", failure);
        Err(failure)
    }

    async fn rows<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<Vec<T>, RemoteFailure> {
        let response = self.send(builder, what).await?;
        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| RemoteFailure::Decode(format!("{}: {}", what, e)))
    }

    /// A write that returns exactly one row; an empty representation means
    /// no row matched.
    async fn single<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        what: &str,
    ) -> Result<T, RemoteFailure> {
        self.rows(builder, what)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteFailure::NotFound(what.to_string()))
    }

    async fn delete(&self, table: &str, id: &str, what: &str) -> Result<(), RemoteFailure> {
        let builder = self
            .returning(Method::DELETE, table)
            .query(&[("id", eq(id))]);
        self.single::<IgnoredAny>(builder, what).await?;
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{}", value)
}

/// Map a non-success HTTP status to a gateway failure.
pub fn failure_for_status(status: StatusCode, what: &str, body: String) -> RemoteFailure {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RemoteFailure::Unauthorized(format!("{}: {}", what, body))
        }
        StatusCode::NOT_FOUND => RemoteFailure::NotFound(what.to_string()),
        _ => RemoteFailure::Server {
            status: status.as_u16(),
            message: if body.is_empty() {
                what.to_string()
            } else {
                body
            },
        },
    }
}

#[async_trait]
impl RemoteGateway for RestGateway {
    async fn list_boards(&self) -> Result<Vec<Board>, RemoteFailure> {
        let builder = self
            .request(Method::GET, "boards")
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.rows(builder, "list boards").await
    }

    async fn create_board(&self, title: &str) -> Result<Board, RemoteFailure> {
        let user_id = self
            .user_id
            .as_deref()
            .ok_or_else(|| RemoteFailure::Unauthorized("Not authenticated".to_string()))?;
        let builder = self
            .returning(Method::POST, "boards")
            .json(&[NewBoardRow { title, user_id }]);
        self.single(builder, "create board").await
    }

    async fn update_board(&self, id: &str, patch: &BoardPatch) -> Result<Board, RemoteFailure> {
        let builder = self
            .returning(Method::PATCH, "boards")
            .query(&[("id", eq(id))])
            .json(patch);
        self.single(builder, &format!("board {}", id)).await
    }

    async fn delete_board(&self, id: &str) -> Result<(), RemoteFailure> {
        self.delete("boards", id, &format!("board {}", id)).await
    }

    async fn list_lists(&self, board_id: &str) -> Result<Vec<List>, RemoteFailure> {
        let builder = self.request(Method::GET, "lists").query(&[
            ("select", "*".to_string()),
            ("board_id", eq(board_id)),
            ("order", "position.asc".to_string()),
        ]);
        self.rows(builder, "list lists").await
    }

    async fn create_list(&self, list: &NewList) -> Result<List, RemoteFailure> {
        let builder = self.returning(Method::POST, "lists").json(&[list]);
        self.single(builder, "create list").await
    }

    async fn update_list(&self, id: &str, patch: &ListPatch) -> Result<List, RemoteFailure> {
        let builder = self
            .returning(Method::PATCH, "lists")
            .query(&[("id", eq(id))])
            .json(patch);
        self.single(builder, &format!("list {}", id)).await
    }

    async fn delete_list(&self, id: &str) -> Result<(), RemoteFailure> {
        self.delete("lists", id, &format!("list {}", id)).await
    }

    async fn list_tasks(&self, list_id: &str) -> Result<Vec<Task>, RemoteFailure> {
        let builder = self.request(Method::GET, "tasks").query(&[
            ("select", "*".to_string()),
            ("list_id", eq(list_id)),
            ("order", "position.asc".to_string()),
        ]);
        self.rows(builder, "list tasks").await
    }

    async fn list_tasks_for_board(&self, board_id: &str) -> Result<Vec<Task>, RemoteFailure> {
        // Inner join on lists restricts tasks to the board; the embedded
        // `lists` object in each row is ignored on decode.
        let builder = self.request(Method::GET, "tasks").query(&[
            ("select", "*,lists!inner(board_id)".to_string()),
            ("lists.board_id", eq(board_id)),
            ("order", "position.asc".to_string()),
        ]);
        self.rows(builder, "list tasks for board").await
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, RemoteFailure> {
        let builder = self.returning(Method::POST, "tasks").json(&[task]);
        self.single(builder, "create task").await
    }

    async fn update_task(&self, id: &str, patch: &TaskPatch) -> Result<Task, RemoteFailure> {
        let builder = self
            .returning(Method::PATCH, "tasks")
            .query(&[("id", eq(id))])
            .json(patch);
        self.single(builder, &format!("task {}", id)).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), RemoteFailure> {
        self.delete("tasks", id, &format!("task {}", id)).await
    }
}
