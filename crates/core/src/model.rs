//! Source records and the assembled Forest
//!
//! Records are what the Things reader yields: flat rows with identity, title,
//! parent linkage and an ordering hint. The Forest is the tree the assembler
//! builds out of them, ready to be mapped onto Google Tasks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Title of the synthetic list holding area-less projects and unfiled tasks.
pub const DEFAULT_LIST_TITLE: &str = "Things Imported Tasks";

/// Things Area
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub index: i64,
}

/// Things Project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub area_id: Option<String>,
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Things Heading. Always lives inside a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub id: String,
    pub title: String,
    pub project_id: String,
    #[serde(default)]
    pub index: i64,
}

/// Direct parent of a task as stored in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum TaskParent {
    Heading(String),
    Project(String),
    Area(String),
    /// No parent at all (inbox, anytime, someday without an area).
    None,
}

/// Things Task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub parent: TaskParent,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub index: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub due: Option<NaiveDate>,
}

/// Where an assembled task ended up. Closed set: the mapper matches on it
/// exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Placement {
    UnderHeading,
    UnderProject,
    InArea,
    Unfiled,
}

/// A task together with its structural placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedTask {
    pub placement: Placement,
    pub task: Task,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeadingNode {
    pub heading: Heading,
    pub tasks: Vec<PlacedTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectNode {
    pub project: Project,
    pub headings: Vec<HeadingNode>,
    /// Tasks attached to the project without a heading.
    pub tasks: Vec<PlacedTask>,
}

/// One destination list worth of content.
///
/// `area` is `None` for the synthetic node that collects area-less projects
/// and unfiled tasks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaNode {
    pub area: Option<Area>,
    pub tasks: Vec<PlacedTask>,
    pub projects: Vec<ProjectNode>,
}

impl AreaNode {
    /// Source id of the area, `None` for the synthetic node.
    pub fn id(&self) -> Option<&str> {
        self.area.as_ref().map(|a| a.id.as_str())
    }

    /// Title of the destination list this node maps to.
    pub fn list_title(&self) -> &str {
        self.area
            .as_ref()
            .map(|a| a.title.as_str())
            .unwrap_or(DEFAULT_LIST_TITLE)
    }

    /// Every task owned by this node, at any depth.
    pub fn all_tasks(&self) -> impl Iterator<Item = &PlacedTask> {
        self.tasks.iter().chain(self.projects.iter().flat_map(|p| {
            p.headings
                .iter()
                .flat_map(|h| h.tasks.iter())
                .chain(p.tasks.iter())
        }))
    }
}

/// Assembled source hierarchy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Forest {
    pub areas: Vec<AreaNode>,
}

/// Summary counts of a Forest
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ForestStats {
    pub lists: usize,
    pub projects: usize,
    pub headings: usize,
    pub tasks: usize,
}

impl Forest {
    pub fn stats(&self) -> ForestStats {
        let mut stats = ForestStats {
            lists: self.areas.len(),
            ..ForestStats::default()
        };

        for node in &self.areas {
            stats.projects += node.projects.len();
            stats.headings += node.projects.iter().map(|p| p.headings.len()).sum::<usize>();
            stats.tasks += node.all_tasks().count();
        }

        stats
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}
