use crate::prelude::{println, *};
use colored::Colorize;
use things2gtasks_core::model::Forest;
use things2gtasks_core::plan::{plan_area, ListPlan};

use crate::config::{self, SourceArgs};

#[derive(Debug, clap::Args)]
pub struct App {
    #[clap(flatten)]
    source: SourceArgs,

    /// Output the planned lists as JSON
    #[arg(long)]
    json: bool,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let file_config = config::load_file_config(global.config_file.as_deref())?;
    let db_path = config::resolve_db_path(&app.source, &file_config)?;

    if global.verbose {
        println!("Reading {}", db_path.display());
    }

    let forest = crate::things::load_forest(&db_path)?;
    let plans = plan_forest(&forest);

    if app.json {
        let json = serde_json::to_string_pretty(&plans)
            .map_err(|e| eyre!("JSON serialization failed: {}", e))?;
        println!("{json}");
    } else {
        println!("{}", format_plans_text(&forest, &plans));
    }

    Ok(())
}

pub fn plan_forest(forest: &Forest) -> Vec<ListPlan> {
    forest.areas.iter().map(plan_area).collect()
}

/// Render the destination shape as an indented outline.
fn format_plans_text(forest: &Forest, plans: &[ListPlan]) -> String {
    let mut result = String::new();

    if plans.is_empty() {
        result.push_str(&format!("{}\n", "Nothing to migrate.".yellow()));
        return result;
    }

    for plan in plans {
        result.push_str(&format!("{}\n", plan.title.bright_cyan().bold()));
        for task in &plan.tasks {
            let indent = if task.parent.is_some() { "      " } else { "  " };
            let check = if task.completed { "[x]" } else { "[ ]" };
            let mut line = format!("{indent}{check} {}", task.title);
            if let Some(due) = task.due {
                line.push_str(&format!(" {}", format!("(due {due})").bright_black()));
            }
            result.push_str(&line);
            result.push('\n');
        }
        result.push('\n');
    }

    let stats = forest.stats();
    let total: usize = plans.iter().map(|p| p.tasks.len()).sum();
    result.push_str(&format!(
        "{} {} list(s), {} Google task(s) from {} project(s), {} heading(s), {} task(s)\n",
        "Plan:".bold(),
        plans.len(),
        total,
        stats.projects,
        stats.headings,
        stats.tasks
    ));

    result
}
