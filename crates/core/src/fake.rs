//! In-memory destination for tests
//!
//! Mimics the parts of Google Tasks the migration relies on: a task without
//! `previous` goes first under its parent, a task with `previous` goes right
//! after that sibling, and sub-tasks cannot have sub-tasks.

use crate::destination::{DestTask, Destination, NewTask, TaskList};
use crate::error::DestinationError;

#[derive(Debug, Clone)]
pub struct FakeTask {
    pub task: DestTask,
    pub list_id: String,
}

#[derive(Debug, Default)]
pub struct FakeDestination {
    pub lists: Vec<TaskList>,
    /// Tasks per list in display order, parents before their sub-tasks.
    pub tasks: Vec<FakeTask>,
    /// Create calls that reached the fake, failing ones excluded.
    pub writes: usize,
    pub fail_task_titles: Vec<String>,
    pub fail_list_titles: Vec<String>,
    pub fail_delete_ids: Vec<String>,
    pub next_id: usize,
}

impl FakeDestination {
    pub fn with_lists(titles: &[&str]) -> Self {
        let mut fake = Self::default();
        for title in titles {
            let id = fake.id("list");
            fake.lists.push(TaskList {
                id,
                title: title.to_string(),
                is_default: false,
            });
        }
        fake
    }

    fn id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn list_id(&self, title: &str) -> Option<String> {
        self.lists
            .iter()
            .find(|l| l.title == title)
            .map(|l| l.id.clone())
    }

    fn task_id(&self, list_id: &str, title: &str) -> Option<String> {
        self.tasks
            .iter()
            .find(|t| t.list_id == list_id && t.task.title == title)
            .map(|t| t.task.id.clone())
    }

    /// Ordered child titles of `parent` (a task title) in the list, or the
    /// top-level titles when `parent` is `None`.
    pub fn children(&self, list_title: &str, parent: Option<&str>) -> Vec<String> {
        let Some(list_id) = self.list_id(list_title) else {
            return vec![];
        };
        let parent_id = match parent {
            Some(title) => match self.task_id(&list_id, title) {
                Some(id) => Some(id),
                None => return vec![],
            },
            None => None,
        };
        self.tasks
            .iter()
            .filter(|t| t.list_id == list_id && t.task.parent == parent_id)
            .map(|t| t.task.title.clone())
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Nesting depth of every task (1 = top level).
    pub fn depths(&self) -> Vec<usize> {
        self.tasks
            .iter()
            .map(|t| {
                let mut depth = 1;
                let mut parent = t.task.parent.clone();
                while let Some(id) = parent {
                    depth += 1;
                    parent = self
                        .tasks
                        .iter()
                        .find(|o| o.task.id == id)
                        .and_then(|o| o.task.parent.clone());
                }
                depth
            })
            .collect()
    }
}

impl Destination for FakeDestination {
    async fn list_lists(&mut self) -> Result<Vec<TaskList>, DestinationError> {
        Ok(self.lists.clone())
    }

    async fn create_list(&mut self, title: &str) -> Result<TaskList, DestinationError> {
        if self.fail_list_titles.iter().any(|t| t == title) {
            return Err(DestinationError::Fatal(format!("cannot create list {title}")));
        }
        let list = TaskList {
            id: self.id("list"),
            title: title.to_string(),
            is_default: false,
        };
        self.writes += 1;
        self.lists.push(list.clone());
        Ok(list)
    }

    async fn delete_list(&mut self, list_id: &str) -> Result<(), DestinationError> {
        if self.fail_delete_ids.iter().any(|id| id == list_id) {
            return Err(DestinationError::Transient(format!("retries exhausted deleting {list_id}")));
        }
        let before = self.lists.len();
        self.lists.retain(|l| l.id != list_id || l.is_default);
        if self.lists.len() == before {
            return Err(DestinationError::Fatal(format!("cannot delete list {list_id}")));
        }
        self.tasks.retain(|t| t.list_id != list_id);
        Ok(())
    }

    async fn create_task(&mut self, list_id: &str, task: &NewTask) -> Result<DestTask, DestinationError> {
        if !self.lists.iter().any(|l| l.id == list_id) {
            return Err(DestinationError::Fatal(format!("list {list_id} not found")));
        }
        if self.fail_task_titles.iter().any(|t| t == &task.title) {
            return Err(DestinationError::Fatal(format!("cannot create {}", task.title)));
        }
        if let Some(parent) = &task.parent {
            let parent_task = self
                .tasks
                .iter()
                .find(|t| &t.task.id == parent && t.list_id == list_id)
                .ok_or_else(|| DestinationError::Fatal(format!("parent {parent} not found")))?;
            if parent_task.task.parent.is_some() {
                return Err(DestinationError::Fatal("sub-tasks cannot have sub-tasks".to_string()));
            }
        }

        let position = match &task.previous {
            Some(previous) => {
                let index = self
                    .tasks
                    .iter()
                    .position(|t| &t.task.id == previous && t.task.parent == task.parent)
                    .ok_or_else(|| DestinationError::Fatal(format!("previous {previous} is not a sibling")))?;
                // Skip over the sibling's own sub-tasks.
                let mut end = index + 1;
                while end < self.tasks.len() && self.tasks[end].task.parent.as_ref() == Some(previous) {
                    end += 1;
                }
                end
            }
            None => match &task.parent {
                Some(parent) => self
                    .tasks
                    .iter()
                    .position(|t| &t.task.id == parent)
                    .map(|i| i + 1)
                    .unwrap_or(self.tasks.len()),
                None => self
                    .tasks
                    .iter()
                    .position(|t| t.list_id == list_id)
                    .unwrap_or(self.tasks.len()),
            },
        };

        let created = DestTask {
            id: self.id("task"),
            title: task.title.clone(),
            parent: task.parent.clone(),
            completed: task.completed,
        };
        self.writes += 1;
        self.tasks.insert(
            position,
            FakeTask {
                task: created.clone(),
                list_id: list_id.to_string(),
            },
        );
        Ok(created)
    }

    async fn delete_task(&mut self, list_id: &str, task_id: &str) -> Result<(), DestinationError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| {
            t.list_id != list_id || (t.task.id != task_id && t.task.parent.as_deref() != Some(task_id))
        });
        if self.tasks.len() == before {
            return Err(DestinationError::Fatal(format!("task {task_id} not found")));
        }
        Ok(())
    }

    async fn list_tasks(&mut self, list_id: &str) -> Result<Vec<DestTask>, DestinationError> {
        Ok(self
            .tasks
            .iter()
            .filter(|t| t.list_id == list_id)
            .map(|t| t.task.clone())
            .collect())
    }
}
