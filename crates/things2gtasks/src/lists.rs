use crate::prelude::{println, *};
use colored::Colorize;
use serde::Serialize;
use things2gtasks_core::destination::{DestTask, Destination, TaskList};

use crate::config::{self, GoogleArgs};

#[derive(Debug, clap::Args)]
pub struct App {
    #[clap(flatten)]
    google: GoogleArgs,

    /// Include the tasks of every list
    #[arg(long)]
    tasks: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
pub struct ListOutput {
    #[serde(flatten)]
    pub list: TaskList,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<DestTask>>,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let file_config = config::load_file_config(global.config_file.as_deref())?;
    let google_paths = config::resolve_google_paths(&app.google, &file_config)?;

    let mut client = crate::google::connect(&google_paths).await?;
    if global.verbose {
        println!("Fetching task lists...");
    }

    let output = lists_data(&mut client, app.tasks).await?;

    if app.json {
        let json = serde_json::to_string_pretty(&output)
            .map_err(|e| eyre!("JSON serialization failed: {}", e))?;
        println!("{json}");
    } else {
        println!("{}", format_lists_text(&output));
    }

    Ok(())
}

pub async fn lists_data<D: Destination>(
    destination: &mut D,
    with_tasks: bool,
) -> Result<Vec<ListOutput>> {
    let lists = destination.list_lists().await?;

    let mut output = Vec::with_capacity(lists.len());
    for list in lists {
        let tasks = if with_tasks {
            Some(destination.list_tasks(&list.id).await?)
        } else {
            None
        };
        output.push(ListOutput { list, tasks });
    }

    Ok(output)
}

fn format_lists_text(output: &[ListOutput]) -> String {
    if output.is_empty() {
        return format!("{}", "No task lists.".yellow());
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["TITLE", "ID", "TASKS"]);
    for entry in output {
        let title = if entry.list.is_default {
            format!("{} (default)", entry.list.title)
        } else {
            entry.list.title.clone()
        };
        let count = entry
            .tasks
            .as_ref()
            .map(|t| t.len().to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row(prettytable::row![title, entry.list.id, count]);
    }

    let mut result = table.to_string();

    for entry in output {
        let Some(tasks) = &entry.tasks else {
            continue;
        };
        result.push_str(&format!("\n{}\n", entry.list.title.bright_cyan().bold()));
        for task in tasks {
            let indent = if task.parent.is_some() { "      " } else { "  " };
            let check = if task.completed { "[x]" } else { "[ ]" };
            result.push_str(&format!("{indent}{check} {}\n", task.title));
        }
    }

    result
}
