//! Destination Mapper
//!
//! Executes the per-area plans against a [`Destination`], one call at a time.
//! Source keys are swapped for server ids through a translation table that
//! lives for a single run. Failures are isolated per area: the failing area
//! stops, later areas still run.
//!
//! Re-running against the same destination reuses lists by title but creates
//! every task again. Nothing about a run is persisted.

use std::collections::HashMap;

use serde::Serialize;

use crate::destination::{Destination, NewTask, TaskList};
use crate::error::DestinationError;
use crate::model::Forest;
use crate::plan::{plan_area, ListPlan, SourceKey};

/// Area that could not be migrated completely.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaFailure {
    /// `None` for the synthetic default list.
    pub area_id: Option<String>,
    pub area_title: String,
    /// Tasks created in this area before the failure.
    pub tasks_created: usize,
    pub error: DestinationError,
}

/// Destination list an area was mapped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListOutcome {
    pub area_id: Option<String>,
    pub title: String,
    pub list_id: String,
    pub reused: bool,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MigrationReport {
    pub lists_created: usize,
    pub lists_reused: usize,
    pub tasks_created: usize,
    pub lists: Vec<ListOutcome>,
    pub failures: Vec<AreaFailure>,
}

impl MigrationReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Source id → destination task id for one run.
#[derive(Debug, Default)]
struct TranslationTable {
    tasks: HashMap<SourceKey, String>,
}

impl TranslationTable {
    fn resolve(&self, key: Option<&SourceKey>) -> Result<Option<String>, DestinationError> {
        key.map(|k| {
            self.tasks
                .get(k)
                .cloned()
                .ok_or_else(|| DestinationError::Fatal(format!("no destination task for {k:?}")))
        })
        .transpose()
    }
}

/// Migrate every area of the forest, in order.
pub async fn migrate<D: Destination>(forest: &Forest, destination: &mut D) -> MigrationReport {
    let mut report = MigrationReport::default();
    let mut table = TranslationTable::default();

    for node in &forest.areas {
        let plan = plan_area(node);
        log::info!(
            "Migrating '{}' ({} task(s) to create)",
            plan.title,
            plan.tasks.len()
        );

        let before = report.tasks_created;
        if let Err(error) = migrate_list(&plan, destination, &mut table, &mut report).await {
            log::warn!("Aborting '{}': {}", plan.title, error);
            report.failures.push(AreaFailure {
                area_id: plan.area_id.clone(),
                area_title: plan.title.clone(),
                tasks_created: report.tasks_created - before,
                error,
            });
        }
    }

    report
}

/// Find a list by exact title or create it. Returns the list and whether it
/// already existed.
async fn resolve_list<D: Destination>(
    title: &str,
    destination: &mut D,
) -> Result<(TaskList, bool), DestinationError> {
    if let Some(existing) = destination.find_list_by_title(title).await? {
        log::info!("Reusing task list '{}' ({})", existing.title, existing.id);
        return Ok((existing, true));
    }

    let created = destination.create_list(title).await?;
    log::info!("Created task list '{}' ({})", created.title, created.id);
    Ok((created, false))
}

async fn migrate_list<D: Destination>(
    plan: &ListPlan,
    destination: &mut D,
    table: &mut TranslationTable,
    report: &mut MigrationReport,
) -> Result<(), DestinationError> {
    let (list, reused) = resolve_list(&plan.title, destination).await?;
    if reused {
        report.lists_reused += 1;
    } else {
        report.lists_created += 1;
    }
    report.lists.push(ListOutcome {
        area_id: plan.area_id.clone(),
        title: list.title.clone(),
        list_id: list.id.clone(),
        reused,
    });

    for planned in &plan.tasks {
        let new_task = NewTask {
            title: planned.title.clone(),
            parent: table.resolve(planned.parent.as_ref())?,
            previous: table.resolve(planned.previous.as_ref())?,
            completed: planned.completed,
            notes: planned.notes.clone(),
            due: planned.due,
        };

        let created = destination.create_task(&list.id, &new_task).await?;
        log::debug!("Created '{}' ({})", created.title, created.id);
        table.tasks.insert(planned.key.clone(), created.id);
        report.tasks_created += 1;
    }

    Ok(())
}
