use std::path::PathBuf;

use crate::prelude::*;
use clap::Parser;

mod config;
mod error;
mod google;
mod lists;
mod migrate;
mod prelude;
mod preview;
mod things;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Migrate a Things 3 database (areas, projects, headings, tasks) into Google Tasks"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Path to a TOML config file
    #[clap(long, env = "THINGS2GTASKS_CONFIG", global = true)]
    config_file: Option<PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "THINGS2GTASKS_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Copy the Things hierarchy into Google Tasks
    Migrate(crate::migrate::App),

    /// Show what a migration would create, without touching Google
    Preview(crate::preview::App),

    /// Show the task lists currently in Google Tasks
    Lists(crate::lists::App),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Migrate(sub_app) => crate::migrate::run(sub_app, app.global).await,
        SubCommands::Preview(sub_app) => crate::preview::run(sub_app, app.global).await,
        SubCommands::Lists(sub_app) => crate::lists::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
