//! Transformation functions for Google Tasks API payloads
//!
//! Request bodies, response models and error classification for the Tasks
//! REST API (`tasks/v1`). The HTTP calls themselves live in the shell.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::destination::{DestTask, NewTask, TaskList};
use crate::error::DestinationError;

pub const TASKS_API_BASE: &str = "https://tasks.googleapis.com/tasks/v1";

/// OAuth scope granting read/write access to task lists and tasks.
pub const TASKS_SCOPE: &str = "https://www.googleapis.com/auth/tasks";

/// Largest page size the API accepts for lists and tasks.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Task list resource
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoogleTaskList {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub updated: Option<String>,
}

/// Task resource
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GoogleTask {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub deleted: Option<bool>,
}

/// Paged collection response (`tasklists.list`, `tasks.list`)
#[derive(Debug, Deserialize, Clone)]
pub struct GooglePage<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    #[serde(rename = "nextPageToken")]
    pub next_page_token: Option<String>,
}

/// Body for `tasks.insert`
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct GoogleTaskBody {
    pub title: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due: Option<String>,
}

/// Error envelope returned by Google APIs
#[derive(Debug, Deserialize)]
struct GoogleErrorResponse {
    error: GoogleErrorBody,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<GoogleErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Convert a task list resource, flagging the account's default list.
pub fn transform_task_list(list: GoogleTaskList, default_list_id: Option<&str>) -> TaskList {
    TaskList {
        is_default: default_list_id == Some(list.id.as_str()),
        id: list.id,
        title: list.title,
    }
}

pub fn transform_task(task: GoogleTask) -> DestTask {
    DestTask {
        completed: task.status.as_deref() == Some("completed"),
        id: task.id,
        title: task.title,
        parent: task.parent,
    }
}

/// Tasks in a list, with tombstones dropped.
pub fn transform_tasks(tasks: Vec<GoogleTask>) -> Vec<DestTask> {
    tasks
        .into_iter()
        .filter(|t| !t.deleted.unwrap_or(false))
        .map(transform_task)
        .collect()
}

/// Due dates are sent as midnight UTC; the API ignores the time part.
pub fn format_due(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

pub fn task_body(task: &NewTask) -> GoogleTaskBody {
    GoogleTaskBody {
        title: task.title.clone(),
        status: if task.completed {
            "completed"
        } else {
            "needsAction"
        },
        notes: task.notes.clone().filter(|n| !n.trim().is_empty()),
        due: task.due.map(format_due),
    }
}

/// Query parameters for `tasks.insert`: nesting and sibling position.
pub fn insert_query(task: &NewTask) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(parent) = &task.parent {
        query.push(("parent", parent.clone()));
    }
    if let Some(previous) = &task.previous {
        query.push(("previous", previous.clone()));
    }
    query
}

/// Map a failed HTTP response to a destination error.
///
/// 429 and quota-flavoured 403s are rate limits, 408 and 5xx are transient,
/// anything else (bad request, auth, not found) is fatal.
pub fn classify_error(status: u16, body: &str) -> DestinationError {
    let parsed = serde_json::from_str::<GoogleErrorResponse>(body).ok();
    let message = parsed
        .as_ref()
        .map(|e| e.error.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.trim().to_string());
    let message = format!("HTTP {status}: {message}");

    let rate_limit_reason = parsed.as_ref().is_some_and(|e| {
        e.error.errors.iter().any(|d| {
            matches!(
                d.reason.as_str(),
                "rateLimitExceeded" | "userRateLimitExceeded" | "quotaExceeded"
            )
        })
    });

    match status {
        429 => DestinationError::RateLimited(message),
        403 if rate_limit_reason => DestinationError::RateLimited(message),
        408 | 500..=599 => DestinationError::Transient(message),
        _ => DestinationError::Fatal(message),
    }
}
