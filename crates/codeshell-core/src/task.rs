use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Low,
        Priority::Medium,
        Priority::High,
        Priority::Urgent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Todo,
        Status::InProgress,
        Status::Review,
        Status::Done,
        Status::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::Review => "review",
            Status::Done => "done",
            Status::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseFieldError {
    pub kind: &'static str,
    pub value: String,
}

/// Lowercases and folds `-` and spaces to `_` so "In Progress", "in-progress"
/// and "in_progress" all name the same variant.
fn field_key(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

impl FromStr for Priority {
    type Err = ParseFieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = field_key(value);
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == key)
            .ok_or_else(|| ParseFieldError {
                kind: "priority",
                value: value.to_string(),
            })
    }
}

impl FromStr for Status {
    type Err = ParseFieldError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = match field_key(value).as_str() {
            "to_do" => "todo".to_string(),
            "canceled" => "cancelled".to_string(),
            other => other.to_string(),
        };
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == key)
            .ok_or_else(|| ParseFieldError {
                kind: "status",
                value: value.to_string(),
            })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
    #[serde(default)]
    pub actual_hours: f64,
}

impl Task {
    pub fn is_done(&self) -> bool {
        self.status == Status::Done
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => due < now && !self.is_done(),
            None => false,
        }
    }

    /// Case-insensitive substring match over title, description and tags.
    pub fn matches(&self, query: &str) -> bool {
        let needle = query.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&needle))
    }
}

/// Request accepted by [`crate::task_store::TaskStore::create`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub due_date: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub assignee: Option<String>,
    pub estimated_hours: Option<f64>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// Partial update merged over an existing task. `None` leaves the field alone.
///
/// The optional task fields take `Some(None)` to clear them; in JSON that is
/// an explicit `null`. Deserializing a patch silently drops keys it does not
/// know about.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    #[serde(deserialize_with = "nullable")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub tags: Option<Vec<String>>,
    #[serde(deserialize_with = "nullable")]
    pub assignee: Option<Option<String>>,
    #[serde(deserialize_with = "nullable")]
    pub estimated_hours: Option<Option<f64>>,
    pub actual_hours: Option<f64>,
}

/// Keeps a present `null` apart from a missing key: a missing key falls back to
/// the field default (`None`), `null` becomes `Some(None)`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl TaskPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<(), TaskError> {
        if let Some(title) = self.title.as_deref() {
            validate_title(title)?;
        }
        validate_hours("estimated_hours", self.estimated_hours.flatten())?;
        validate_hours("actual_hours", self.actual_hours)?;
        Ok(())
    }

    pub(crate) fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(tags) = self.tags {
            task.tags = normalize_tags(tags);
        }
        if let Some(assignee) = self.assignee {
            task.assignee = assignee;
        }
        if let Some(hours) = self.estimated_hours {
            task.estimated_hours = hours;
        }
        if let Some(hours) = self.actual_hours {
            task.actual_hours = hours;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("Task title is required")]
    EmptyTitle,
    #[error("{field} must be a non-negative number, got {value}")]
    NegativeHours { field: &'static str, value: f64 },
}

pub(crate) fn validate_title(title: &str) -> Result<(), TaskError> {
    if title.trim().is_empty() {
        return Err(TaskError::EmptyTitle);
    }
    Ok(())
}

pub(crate) fn validate_hours(field: &'static str, hours: Option<f64>) -> Result<(), TaskError> {
    match hours {
        Some(value) if !value.is_finite() || value < 0.0 => {
            Err(TaskError::NegativeHours { field, value })
        }
        _ => Ok(()),
    }
}

/// Trims tags, drops empty ones and removes case-insensitive duplicates while
/// keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .collect()
}

pub fn render_task_line(task: &Task) -> String {
    let due = task
        .due_date
        .map(|due| due.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{} | {} | {} | {} | {}",
        task.id, task.status, task.priority, due, task.title
    )
}
