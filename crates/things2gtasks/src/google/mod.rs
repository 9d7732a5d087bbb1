use crate::config::GooglePaths;
use crate::prelude::*;

pub mod auth;
pub mod client;

pub use client::GoogleTasksClient;

/// Authorize and build a Google Tasks client.
pub async fn connect(paths: &GooglePaths) -> Result<GoogleTasksClient> {
    let http = reqwest::Client::builder()
        .user_agent(concat!("things2gtasks/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    let token = auth::access_token(&http, paths).await?;
    Ok(GoogleTasksClient::new(http, token))
}
