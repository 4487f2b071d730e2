use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// A board owned by one user. Holds lists through their `board_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub title: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

/// A column within a board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct List {
    pub id: String,
    pub title: String,
    pub board_id: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// A card within a list. `list_id` is mutable: reassigning it is how a
/// task moves between lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    /// `None` is serialized as `null`, which is not the same as `""`.
    pub description: Option<String>,
    pub list_id: String,
    pub position: i64,
    pub created_at: DateTime<Utc>,
}

/// Fields sent when creating a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewList {
    pub title: String,
    pub board_id: String,
    pub position: i64,
}

/// Fields sent when creating a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub list_id: String,
    pub position: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

/// Partial task update. Absent fields are left alone.
///
/// `description` is a double option: `None` leaves the description as is,
/// `Some(None)` clears it (sent as `null`), `Some(Some(text))` replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "present_field"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
}

/// Keeps an explicit `null` distinct from a missing field: a present field
/// always deserializes to `Some(..)`, a missing one falls back to `default`.
fn present_field<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl BoardPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
        }
    }
}

impl ListPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }
}

impl TaskPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// The patch a drag-and-drop move sends: new list plus new position.
    pub fn relocate(list_id: impl Into<String>, position: i64) -> Self {
        Self {
            list_id: Some(list_id.into()),
            position: Some(position),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.list_id.is_none()
            && self.position.is_none()
    }
}

impl Board {
    pub fn patched(&self, patch: &BoardPatch) -> Self {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        next
    }
}

impl List {
    pub fn patched(&self, patch: &ListPatch) -> Self {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(position) = patch.position {
            next.position = position;
        }
        next
    }
}

impl Task {
    pub fn patched(&self, patch: &TaskPatch) -> Self {
        let mut next = self.clone();
        if let Some(title) = &patch.title {
            next.title = title.clone();
        }
        if let Some(description) = &patch.description {
            next.description = description.clone();
        }
        if let Some(list_id) = &patch.list_id {
            next.list_id = list_id.clone();
        }
        if let Some(position) = patch.position {
            next.position = position;
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task {
            id: "t1".to_string(),
            title: "Write docs".to_string(),
            description: Some("draft".to_string()),
            list_id: "l1".to_string(),
            position: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_task_patch_merges_only_present_fields() {
        let original = task();
        let moved = original.patched(&TaskPatch::relocate("l2", 3));
        assert_eq!(moved.list_id, "l2");
        assert_eq!(moved.position, 3);
        assert_eq!(moved.title, original.title);
        assert_eq!(moved.description, original.description);
    }

    #[test]
    fn test_task_patch_can_clear_description() {
        let patch = TaskPatch {
            description: Some(None),
            ..Default::default()
        };
        assert_eq!(task().patched(&patch).description, None);
    }

    #[test]
    fn test_task_patch_wire_format() {
        let json = serde_json::to_value(TaskPatch::relocate("l2", 0)).unwrap();
        assert_eq!(json, serde_json::json!({ "list_id": "l2", "position": 0 }));

        let clear = TaskPatch {
            description: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_value(clear).unwrap();
        assert_eq!(json, serde_json::json!({ "description": null }));
    }

    #[test]
    fn test_task_patch_null_differs_from_missing() {
        let cleared: TaskPatch = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));

        let untouched: TaskPatch = serde_json::from_str(r#"{"title":"x"}"#).unwrap();
        assert_eq!(untouched.description, None);
        assert!(!untouched.is_empty());
    }

    #[test]
    fn test_task_description_null_vs_empty() {
        let mut t = task();
        t.description = None;
        let json = serde_json::to_value(&t).unwrap();
        assert!(json["description"].is_null());

        t.description = Some(String::new());
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["description"], "");
    }
}
