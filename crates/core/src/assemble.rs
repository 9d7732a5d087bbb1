//! Hierarchy Assembler
//!
//! Turns the flat record set coming out of the Things reader into a
//! [`Forest`]. Every task is classified into exactly one [`Placement`] based on
//! its parent linkage alone. A record pointing at a parent that is not in the
//! set is a reader defect and fails the whole assembly.

use std::collections::{HashMap, HashSet};

use crate::error::{AssemblyError, RecordKind};
use crate::model::{
    Area, AreaNode, Forest, Heading, HeadingNode, PlacedTask, Placement, Project, ProjectNode,
    Task, TaskParent,
};

/// Build the Forest from flat records.
///
/// Children are ordered by their source index, ties broken by id. Areas keep
/// the same ordering; the synthetic no-area node, if needed, comes last.
pub fn assemble(
    areas: Vec<Area>,
    projects: Vec<Project>,
    headings: Vec<Heading>,
    tasks: Vec<Task>,
) -> Result<Forest, AssemblyError> {
    let area_ids = unique_ids(RecordKind::Area, areas.iter().map(|a| a.id.as_str()))?;
    let project_ids = unique_ids(RecordKind::Project, projects.iter().map(|p| p.id.as_str()))?;
    let heading_ids = unique_ids(RecordKind::Heading, headings.iter().map(|h| h.id.as_str()))?;
    unique_ids(RecordKind::Task, tasks.iter().map(|t| t.id.as_str()))?;

    let mut projects_by_area: HashMap<Option<String>, Vec<Project>> = HashMap::new();
    for project in projects {
        if let Some(area_id) = &project.area_id {
            check_parent(&area_ids, RecordKind::Project, &project.id, RecordKind::Area, area_id)?;
        }
        projects_by_area
            .entry(project.area_id.clone())
            .or_default()
            .push(project);
    }

    let mut headings_by_project: HashMap<String, Vec<Heading>> = HashMap::new();
    for heading in headings {
        check_parent(
            &project_ids,
            RecordKind::Heading,
            &heading.id,
            RecordKind::Project,
            &heading.project_id,
        )?;
        headings_by_project
            .entry(heading.project_id.clone())
            .or_default()
            .push(heading);
    }

    let mut by_heading: HashMap<String, Vec<PlacedTask>> = HashMap::new();
    let mut by_project: HashMap<String, Vec<PlacedTask>> = HashMap::new();
    let mut by_area: HashMap<String, Vec<PlacedTask>> = HashMap::new();
    let mut unfiled: Vec<PlacedTask> = Vec::new();

    for task in tasks {
        let placement = classify(&task);
        let bucket = match &task.parent {
            TaskParent::Heading(id) => {
                check_parent(&heading_ids, RecordKind::Task, &task.id, RecordKind::Heading, id)?;
                by_heading.entry(id.clone()).or_default()
            }
            TaskParent::Project(id) => {
                check_parent(&project_ids, RecordKind::Task, &task.id, RecordKind::Project, id)?;
                by_project.entry(id.clone()).or_default()
            }
            TaskParent::Area(id) => {
                check_parent(&area_ids, RecordKind::Task, &task.id, RecordKind::Area, id)?;
                by_area.entry(id.clone()).or_default()
            }
            TaskParent::None => &mut unfiled,
        };
        bucket.push(PlacedTask { placement, task });
    }

    let mut build_projects = |mut projects: Vec<Project>| -> Vec<ProjectNode> {
        sort_by_order(&mut projects, |p| (p.index, p.id.as_str()));
        projects
            .into_iter()
            .map(|project| {
                let mut headings = headings_by_project.remove(&project.id).unwrap_or_default();
                sort_by_order(&mut headings, |h| (h.index, h.id.as_str()));
                let headings = headings
                    .into_iter()
                    .map(|heading| {
                        let tasks = sorted_tasks(by_heading.remove(&heading.id));
                        HeadingNode { heading, tasks }
                    })
                    .collect();
                let tasks = sorted_tasks(by_project.remove(&project.id));
                ProjectNode {
                    project,
                    headings,
                    tasks,
                }
            })
            .collect()
    };

    let mut areas = areas;
    sort_by_order(&mut areas, |a| (a.index, a.id.as_str()));

    let mut nodes: Vec<AreaNode> = Vec::with_capacity(areas.len() + 1);
    for area in areas {
        let projects = build_projects(
            projects_by_area
                .remove(&Some(area.id.clone()))
                .unwrap_or_default(),
        );
        let tasks = sorted_tasks(by_area.remove(&area.id));
        nodes.push(AreaNode {
            area: Some(area),
            tasks,
            projects,
        });
    }

    let loose_projects = build_projects(projects_by_area.remove(&None).unwrap_or_default());
    if !loose_projects.is_empty() || !unfiled.is_empty() {
        nodes.push(AreaNode {
            area: None,
            tasks: sorted_tasks(Some(unfiled)),
            projects: loose_projects,
        });
    }

    Ok(Forest { areas: nodes })
}

/// Structural placement of a task, derived from its parent linkage only.
pub fn classify(task: &Task) -> Placement {
    match task.parent {
        TaskParent::Heading(_) => Placement::UnderHeading,
        TaskParent::Project(_) => Placement::UnderProject,
        TaskParent::Area(_) => Placement::InArea,
        TaskParent::None => Placement::Unfiled,
    }
}

fn unique_ids<'a>(
    kind: RecordKind,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashSet<String>, AssemblyError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id.to_string()) {
            return Err(AssemblyError::DuplicateId {
                kind,
                id: id.to_string(),
            });
        }
    }
    Ok(seen)
}

fn check_parent(
    known: &HashSet<String>,
    kind: RecordKind,
    id: &str,
    parent_kind: RecordKind,
    parent_id: &str,
) -> Result<(), AssemblyError> {
    if known.contains(parent_id) {
        Ok(())
    } else {
        Err(AssemblyError::DanglingParent {
            kind,
            id: id.to_string(),
            parent_kind,
            parent_id: parent_id.to_string(),
        })
    }
}

fn sort_by_order<T>(items: &mut [T], key: impl Fn(&T) -> (i64, &str)) {
    items.sort_by(|a, b| key(a).cmp(&key(b)));
}

fn sorted_tasks(tasks: Option<Vec<PlacedTask>>) -> Vec<PlacedTask> {
    let mut tasks = tasks.unwrap_or_default();
    sort_by_order(&mut tasks, |t| (t.task.index, t.task.id.as_str()));
    tasks
}
