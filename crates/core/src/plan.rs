//! Depth-collapsing mapping from an area node to Google Tasks creates
//!
//! Google Tasks has lists, tasks and exactly one level of sub-tasks. Things
//! has Area → Project → Heading → Task. The collapse rule:
//!
//! ```text
//! Area                 -> TaskList
//!   Task (standalone)  -> task
//!   Project            -> task
//!     Heading          -> sub-task "--- Heading ---" (placeholder)
//!       Task           -> sub-task of the project, right after its placeholder
//!     Task             -> sub-task of the project, after the last heading group
//! ```
//!
//! Sub-tasks cannot have sub-tasks, so the placeholder works as a divider: the
//! heading's tasks follow it among the project's sub-tasks and nothing is ever
//! deeper than list → task → sub-task. After a heading group, the next
//! sibling is inserted after the group's last task, or after the placeholder
//! when the heading has no tasks. The planner only emits references by
//! source key; the executor swaps them for server ids as it goes.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{AreaNode, PlacedTask, Placement};

/// Source identity of something that becomes a destination task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum SourceKey {
    Project(String),
    Heading(String),
    Task(String),
}

/// One create operation, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedTask {
    pub key: SourceKey,
    pub title: String,
    /// Parent destination task, `None` for top-level tasks in the list.
    pub parent: Option<SourceKey>,
    /// Previously created sibling under the same parent.
    pub previous: Option<SourceKey>,
    pub completed: bool,
    pub notes: Option<String>,
    pub due: Option<NaiveDate>,
}

/// Everything to create for one area node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListPlan {
    pub area_id: Option<String>,
    pub title: String,
    pub tasks: Vec<PlannedTask>,
}

impl ListPlan {
    /// Nesting depth of a planned task relative to the list (1 = top level).
    pub fn depth_of(&self, key: &SourceKey) -> Option<usize> {
        let parents: HashMap<&SourceKey, Option<&SourceKey>> = self
            .tasks
            .iter()
            .map(|t| (&t.key, t.parent.as_ref()))
            .collect();

        let mut depth = 0;
        let mut current = Some(key);
        while let Some(k) = current {
            depth += 1;
            current = *parents.get(k)?;
        }
        Some(depth)
    }
}

/// Title of the placeholder task standing in for a heading.
pub fn heading_title(title: &str) -> String {
    format!("--- {title} ---")
}

/// Tracks the last created sibling under one destination parent.
#[derive(Default)]
struct Siblings {
    last: Option<SourceKey>,
}

impl Siblings {
    /// Record `key` as the newest sibling and return the anchor to insert after.
    fn push(&mut self, key: &SourceKey) -> Option<SourceKey> {
        self.last.replace(key.clone())
    }
}

/// Plan the creates for one area node.
///
/// Top level: standalone tasks first, then projects, chained as one sibling
/// run. Inside a project: each heading placeholder followed by its tasks, then
/// the direct tasks, all chained as one run under the project task.
pub fn plan_area(node: &AreaNode) -> ListPlan {
    let mut tasks = Vec::new();
    let mut top = Siblings::default();

    for placed in &node.tasks {
        tasks.push(plan_task(placed, None, &mut top));
    }

    for project_node in &node.projects {
        let project = &project_node.project;
        let project_key = SourceKey::Project(project.id.clone());
        tasks.push(PlannedTask {
            previous: top.push(&project_key),
            key: project_key.clone(),
            title: project.title.clone(),
            parent: None,
            completed: false,
            notes: project.notes.clone(),
            due: None,
        });

        let mut children = Siblings::default();
        for heading_node in &project_node.headings {
            let heading_key = SourceKey::Heading(heading_node.heading.id.clone());
            tasks.push(PlannedTask {
                previous: children.push(&heading_key),
                key: heading_key,
                title: heading_title(&heading_node.heading.title),
                parent: Some(project_key.clone()),
                completed: false,
                notes: None,
                due: None,
            });

            for placed in &heading_node.tasks {
                tasks.push(plan_task(placed, Some(&project_key), &mut children));
            }
        }

        for placed in &project_node.tasks {
            tasks.push(plan_task(placed, Some(&project_key), &mut children));
        }
    }

    ListPlan {
        area_id: node.id().map(str::to_string),
        title: node.list_title().to_string(),
        tasks,
    }
}

fn plan_task(placed: &PlacedTask, owner: Option<&SourceKey>, siblings: &mut Siblings) -> PlannedTask {
    let parent = match placed.placement {
        Placement::UnderHeading | Placement::UnderProject => owner.cloned(),
        Placement::InArea | Placement::Unfiled => None,
    };
    let key = SourceKey::Task(placed.task.id.clone());

    PlannedTask {
        previous: siblings.push(&key),
        key,
        title: placed.task.title.clone(),
        parent,
        completed: placed.task.completed,
        notes: placed.task.notes.clone(),
        due: placed.task.due,
    }
}
