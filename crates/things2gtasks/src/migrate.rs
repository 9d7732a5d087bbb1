use std::future::Future;
use std::path::Path;

use crate::prelude::{println, *};
use colored::Colorize;
use things2gtasks_core::destination::Destination;
use things2gtasks_core::migrate::{migrate, MigrationReport};
use things2gtasks_core::model::Forest;
use things2gtasks_core::reset::reset;

use crate::config::{self, GoogleArgs, SourceArgs};

#[derive(Debug, clap::Args)]
pub struct App {
    #[clap(flatten)]
    source: SourceArgs,

    #[clap(flatten)]
    google: GoogleArgs,

    /// Delete every existing Google task list before migrating
    #[arg(long)]
    clean_slate: bool,

    /// Skip the clean-slate confirmation prompt
    #[arg(long, short = 'y')]
    yes: bool,

    /// Output the report as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let file_config = config::load_file_config(global.config_file.as_deref())?;
    let db_path = config::resolve_db_path(&app.source, &file_config)?;
    let google_paths = config::resolve_google_paths(&app.google, &file_config)?;

    if global.verbose {
        println!("Reading Things database at {}", db_path.display());
    }

    let report = migrate_source(
        &db_path,
        app.clean_slate,
        || {
            if app.clean_slate && !app.yes {
                confirm_clean_slate()
            } else {
                Ok(true)
            }
        },
        || crate::google::connect(&google_paths),
    )
    .await?;

    let Some(report) = report else {
        println!("Aborted. Nothing was changed.");
        return Ok(());
    };

    if app.json {
        println!("{}", format_report_json(&report)?);
    } else {
        println!("{}", format_report_text(&report));
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(Error::Incomplete(report.failures.len()).into())
    }
}

/// Read and validate the source, then connect and migrate.
///
/// The destination is connected only after the whole database has been read
/// and assembled and `confirm` has agreed. Returns `None` when `confirm`
/// declines.
pub async fn migrate_source<D, C, F, Fut>(
    db_path: &Path,
    clean_slate: bool,
    confirm: C,
    connect: F,
) -> Result<Option<MigrationReport>>
where
    D: Destination,
    C: FnOnce() -> Result<bool>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<D>>,
{
    let forest = crate::things::load_forest(db_path)?;
    let stats = forest.stats();
    log::info!(
        "Planning {} list(s), {} project(s), {} heading(s), {} task(s)",
        stats.lists,
        stats.projects,
        stats.headings,
        stats.tasks
    );

    if !confirm()? {
        return Ok(None);
    }

    let mut destination = connect().await?;
    run_migration(&forest, &mut destination, clean_slate)
        .await
        .map(Some)
}

/// Optional reset followed by the migration. A failed reset stops here.
pub async fn run_migration<D: Destination>(
    forest: &Forest,
    destination: &mut D,
    clean_slate: bool,
) -> Result<MigrationReport> {
    if clean_slate {
        let deleted = reset(destination)
            .await
            .map_err(|e| Error::CleanSlate(e.to_string()))?;
        log::info!("Clean slate: deleted {deleted} task list(s)");
    }

    Ok(migrate(forest, destination).await)
}

fn confirm_clean_slate() -> Result<bool> {
    dialoguer::Confirm::with_theme(&dialoguer::theme::ColorfulTheme::default())
        .with_prompt("Delete ALL existing Google task lists before migrating?")
        .default(false)
        .interact()
        .map_err(|e| eyre!("Confirmation cancelled: {}", e))
}

fn format_report_json(report: &MigrationReport) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(|e| eyre!("JSON serialization failed: {}", e))
}

fn format_report_text(report: &MigrationReport) -> String {
    let mut table = new_table();
    table.add_row(prettytable::row!["LIST", "ID", "STATUS"]);
    for list in &report.lists {
        let status = if list.reused { "reused" } else { "created" };
        table.add_row(prettytable::row![list.title, list.list_id, status]);
    }

    let mut result = String::new();
    if !report.lists.is_empty() {
        result.push_str(&table.to_string());
        result.push('\n');
    }

    result.push_str(&format!(
        "{} {} list(s) created, {} reused, {} task(s) created\n",
        "Summary:".bold(),
        report.lists_created,
        report.lists_reused,
        report.tasks_created
    ));

    for failure in &report.failures {
        result.push_str(&format!(
            "{} '{}' stopped after {} task(s): {}\n",
            "Failed:".red().bold(),
            failure.area_title,
            failure.tasks_created,
            failure.error
        ));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use things2gtasks_core::destination::{DestTask, NewTask, TaskList};
    use things2gtasks_core::error::DestinationError;
    use things2gtasks_core::migrate::{AreaFailure, ListOutcome};

    /// Destination that refuses everything.
    struct Offline;

    impl Destination for Offline {
        async fn list_lists(&mut self) -> Result<Vec<TaskList>, DestinationError> {
            Err(DestinationError::Transient("offline".into()))
        }
        async fn create_list(&mut self, _title: &str) -> Result<TaskList, DestinationError> {
            Err(DestinationError::Transient("offline".into()))
        }
        async fn delete_list(&mut self, _list_id: &str) -> Result<(), DestinationError> {
            Err(DestinationError::Transient("offline".into()))
        }
        async fn create_task(&mut self, _list_id: &str, _task: &NewTask) -> Result<DestTask, DestinationError> {
            Err(DestinationError::Transient("offline".into()))
        }
        async fn delete_task(&mut self, _list_id: &str, _task_id: &str) -> Result<(), DestinationError> {
            Err(DestinationError::Transient("offline".into()))
        }
        async fn list_tasks(&mut self, _list_id: &str) -> Result<Vec<DestTask>, DestinationError> {
            Err(DestinationError::Transient("offline".into()))
        }
    }

    /// In-memory destination that logs every call.
    struct Recorder {
        calls: Rc<RefCell<Vec<String>>>,
        lists: Vec<TaskList>,
        tasks: Vec<(String, DestTask)>,
        next_id: usize,
    }

    impl Recorder {
        fn new(calls: Rc<RefCell<Vec<String>>>, lists: Vec<TaskList>) -> Self {
            Self {
                calls,
                lists,
                tasks: Vec::new(),
                next_id: 0,
            }
        }

        fn id(&mut self, prefix: &str) -> String {
            self.next_id += 1;
            format!("{prefix}{}", self.next_id)
        }
    }

    impl Destination for Recorder {
        async fn list_lists(&mut self) -> Result<Vec<TaskList>, DestinationError> {
            self.calls.borrow_mut().push("list_lists".into());
            Ok(self.lists.clone())
        }
        async fn create_list(&mut self, title: &str) -> Result<TaskList, DestinationError> {
            self.calls.borrow_mut().push(format!("create_list:{title}"));
            let list = TaskList {
                id: self.id("L"),
                title: title.into(),
                is_default: false,
            };
            self.lists.push(list.clone());
            Ok(list)
        }
        async fn delete_list(&mut self, list_id: &str) -> Result<(), DestinationError> {
            self.calls.borrow_mut().push(format!("delete_list:{list_id}"));
            self.lists.retain(|l| l.id != list_id);
            Ok(())
        }
        async fn create_task(&mut self, list_id: &str, task: &NewTask) -> Result<DestTask, DestinationError> {
            self.calls.borrow_mut().push(format!("create_task:{}", task.title));
            let created = DestTask {
                id: self.id("T"),
                title: task.title.clone(),
                parent: task.parent.clone(),
                completed: task.completed,
            };
            self.tasks.push((list_id.to_string(), created.clone()));
            Ok(created)
        }
        async fn delete_task(&mut self, _list_id: &str, task_id: &str) -> Result<(), DestinationError> {
            self.calls.borrow_mut().push(format!("delete_task:{task_id}"));
            self.tasks.retain(|(_, t)| t.id != task_id);
            Ok(())
        }
        async fn list_tasks(&mut self, list_id: &str) -> Result<Vec<DestTask>, DestinationError> {
            Ok(self
                .tasks
                .iter()
                .filter(|(id, _)| id == list_id)
                .map(|(_, t)| t.clone())
                .collect())
        }
    }

    fn existing_list() -> Vec<TaskList> {
        vec![TaskList {
            id: "L-old".into(),
            title: "Old".into(),
            is_default: false,
        }]
    }

    fn sample_report() -> MigrationReport {
        MigrationReport {
            lists_created: 1,
            lists_reused: 1,
            tasks_created: 7,
            lists: vec![
                ListOutcome {
                    area_id: Some("a1".into()),
                    title: "Work".into(),
                    list_id: "L1".into(),
                    reused: false,
                },
                ListOutcome {
                    area_id: Some("a2".into()),
                    title: "Home".into(),
                    list_id: "L2".into(),
                    reused: true,
                },
            ],
            failures: vec![AreaFailure {
                area_id: Some("a2".into()),
                area_title: "Home".into(),
                tasks_created: 3,
                error: DestinationError::Fatal("HTTP 400: bad".into()),
            }],
        }
    }

    // ============================================================================
    // migrate_source tests
    // ============================================================================

    #[test]
    fn test_dangling_reference_never_reaches_destination() {
        let (_dir, path) = crate::things::tests::database(
            "INSERT INTO TMTask (uuid, type, title, heading) VALUES ('t1', 0, 'Lost', 'ghost');",
        );
        let calls = Rc::new(RefCell::new(Vec::new()));
        let connected = Cell::new(false);

        let result = block_on(migrate_source(
            &path,
            true,
            || Ok(true),
            || {
                connected.set(true);
                let recorder = Recorder::new(calls.clone(), existing_list());
                async move { Ok::<_, color_eyre::Report>(recorder) }
            },
        ));

        let err = result.unwrap_err();
        assert!(err.to_string().contains("ghost"));
        assert!(!connected.get());
        assert!(calls.borrow().is_empty());
    }

    #[test]
    fn test_valid_source_resets_then_migrates() {
        let (_dir, path) = crate::things::tests::database(
            r#"
            INSERT INTO TMArea (uuid, title) VALUES ('a1', 'Work');
            INSERT INTO TMTask (uuid, type, title, area) VALUES ('t1', 0, 'Plan', 'a1');
            "#,
        );
        let calls = Rc::new(RefCell::new(Vec::new()));

        let report = block_on(migrate_source(
            &path,
            true,
            || Ok(true),
            || {
                let recorder = Recorder::new(calls.clone(), existing_list());
                async move { Ok::<_, color_eyre::Report>(recorder) }
            },
        ))
        .unwrap()
        .unwrap();

        assert!(report.is_success());
        assert_eq!(report.lists_created, 1);
        assert_eq!(report.tasks_created, 1);

        let calls = calls.borrow();
        let position = |call: &str| calls.iter().position(|c| c == call).unwrap();
        assert!(position("delete_list:L-old") < position("create_list:Work"));
        assert!(position("create_list:Work") < position("create_task:Plan"));
    }

    #[test]
    fn test_declined_confirmation_never_connects() {
        let (_dir, path) = crate::things::tests::database(
            "INSERT INTO TMArea (uuid, title) VALUES ('a1', 'Work');",
        );
        let connected = Cell::new(false);

        let report = block_on(migrate_source(
            &path,
            true,
            || Ok(false),
            || {
                connected.set(true);
                let recorder = Recorder::new(Rc::default(), existing_list());
                async move { Ok::<_, color_eyre::Report>(recorder) }
            },
        ))
        .unwrap();

        assert!(report.is_none());
        assert!(!connected.get());
    }

    // ============================================================================
    // run_migration tests
    // ============================================================================

    #[test]
    fn test_clean_slate_failure_aborts_before_migration() {
        let err = block_on(run_migration(&Forest::default(), &mut Offline, true)).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err, Error::CleanSlate(ref msg) if msg.contains("enumerate")));
    }

    #[test]
    fn test_without_clean_slate_empty_forest_touches_nothing() {
        let report = block_on(run_migration(&Forest::default(), &mut Offline, false)).unwrap();
        assert!(report.is_success());
        assert_eq!(report.tasks_created, 0);
    }

    // ============================================================================
    // format tests
    // ============================================================================

    #[test]
    fn test_format_report_text() {
        colored::control::set_override(false);
        let text = format_report_text(&sample_report());

        assert!(text.contains("Work"));
        assert!(text.contains("created"));
        assert!(text.contains("reused"));
        assert!(text.contains("Summary: 1 list(s) created, 1 reused, 7 task(s) created"));
        assert!(text.contains("Failed: 'Home' stopped after 3 task(s): HTTP 400: bad"));
    }

    #[test]
    fn test_format_report_json() {
        let json: serde_json::Value =
            serde_json::from_str(&format_report_json(&sample_report()).unwrap()).unwrap();

        assert_eq!(json["tasks_created"], 7);
        assert_eq!(json["lists"][1]["reused"], true);
        assert_eq!(json["failures"][0]["area_title"], "Home");
        assert_eq!(json["failures"][0]["error"]["kind"], "fatal");
    }
}
