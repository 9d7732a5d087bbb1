//! Destination API contract
//!
//! What the mapper and the resetter need from a task service. Implementations
//! own authentication and retry/backoff; callers only see an error once a
//! request has failed for good.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DestinationError;

/// Top-level container in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskList {
    pub id: String,
    pub title: String,
    /// The account's default list, which the service refuses to delete.
    #[serde(default)]
    pub is_default: bool,
}

/// A task as stored in the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Request to create a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NewTask {
    pub title: String,
    /// Parent task id. The destination supports a single level of nesting.
    pub parent: Option<String>,
    /// Sibling to insert after. `None` puts the task first under its parent.
    pub previous: Option<String>,
    pub completed: bool,
    pub notes: Option<String>,
    pub due: Option<NaiveDate>,
}

/// Task service operations used by the migration.
///
/// Calls are issued one at a time and awaited before the next one starts:
/// parent and insert-after ids must already exist server-side.
#[allow(async_fn_in_trait)]
pub trait Destination {
    async fn list_lists(&mut self) -> Result<Vec<TaskList>, DestinationError>;

    /// First list whose title matches exactly.
    async fn find_list_by_title(&mut self, title: &str) -> Result<Option<TaskList>, DestinationError> {
        Ok(self
            .list_lists()
            .await?
            .into_iter()
            .find(|list| list.title == title))
    }

    async fn create_list(&mut self, title: &str) -> Result<TaskList, DestinationError>;

    /// Delete a list together with its tasks.
    async fn delete_list(&mut self, list_id: &str) -> Result<(), DestinationError>;

    async fn create_task(&mut self, list_id: &str, task: &NewTask) -> Result<DestTask, DestinationError>;

    /// Delete a task and its sub-tasks.
    async fn delete_task(&mut self, list_id: &str, task_id: &str) -> Result<(), DestinationError>;

    /// Every task in a list, completed ones included.
    async fn list_tasks(&mut self, list_id: &str) -> Result<Vec<DestTask>, DestinationError>;
}
