//! OAuth for installed applications
//!
//! A cached token is reused while fresh and refreshed when expired. Without a
//! usable token the loopback flow runs: the consent URL is printed, Google
//! redirects to a one-shot listener on 127.0.0.1, and the code is exchanged
//! with a PKCE verifier.

use std::path::Path;

use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use things2gtasks_core::google::TASKS_SCOPE;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

use crate::config::GooglePaths;
use crate::prelude::{eprintln, *};

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Tokens this close to expiry are treated as expired.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Client secrets file as downloaded from Google Cloud Console.
#[derive(Debug, Deserialize)]
pub struct CredentialsFile {
    #[serde(default)]
    installed: Option<ClientSecret>,
    #[serde(default)]
    web: Option<ClientSecret>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    DEFAULT_AUTH_URI.to_string()
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl CredentialsFile {
    pub fn parse(contents: &str) -> Result<ClientSecret> {
        let file: CredentialsFile = serde_json::from_str(contents)
            .map_err(|e| Error::Auth(format!("invalid credentials file: {e}")))?;
        file.installed.or(file.web).ok_or_else(|| {
            Error::Auth("credentials file has neither an 'installed' nor a 'web' client".into())
                .into()
        })
    }
}

/// Token cached on disk between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl StoredToken {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => false,
        }
    }

    /// Build from a token endpoint response. Refresh responses usually omit
    /// the refresh token, so the previous one is carried over.
    pub fn from_response(
        response: TokenResponse,
        previous_refresh: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token.or(previous_refresh),
            expires_at: response.expires_in.map(|secs| now + Duration::seconds(secs)),
            scope: response.scope,
        }
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Return a valid access token, running whichever step is needed.
pub async fn access_token(http: &reqwest::Client, paths: &GooglePaths) -> Result<String> {
    let cached = load_token(&paths.token)?;

    if let Some(token) = &cached {
        if token.is_fresh(Utc::now()) {
            log::debug!("Using cached token from {}", paths.token.display());
            return Ok(token.access_token.clone());
        }
    }

    let secret = load_credentials(&paths.credentials)?;

    if let Some(refresh_token) = cached.and_then(|t| t.refresh_token) {
        match refresh(http, &secret, &refresh_token).await {
            Ok(token) => {
                log::info!("Refreshed Google access token");
                save_token(&paths.token, &token)?;
                return Ok(token.access_token);
            }
            Err(err) => log::warn!("Token refresh failed, re-authorizing: {err}"),
        }
    }

    let token = authorize(http, &secret).await?;
    save_token(&paths.token, &token)?;
    eprintln!("Credentials saved to {}", paths.token.display());
    Ok(token.access_token)
}

fn load_credentials(path: &Path) -> Result<ClientSecret> {
    if !path.exists() {
        return Err(Error::Auth(format!(
            "credentials file not found at {}. Download OAuth client secrets from \
             Google Cloud Console and pass them with --creds-path",
            path.display()
        ))
        .into());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
    CredentialsFile::parse(&contents)
}

fn load_token(path: &Path) -> Result<Option<StoredToken>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read token file {}", path.display()))?;
    match serde_json::from_str(&contents) {
        Ok(token) => Ok(Some(token)),
        Err(err) => {
            log::warn!("Ignoring unreadable token file {}: {}", path.display(), err);
            Ok(None)
        }
    }
}

fn save_token(path: &Path, token: &StoredToken) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(token)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write token file {}", path.display()))
}

async fn refresh(
    http: &reqwest::Client,
    secret: &ClientSecret,
    refresh_token: &str,
) -> Result<StoredToken> {
    let mut params = vec![
        ("grant_type", "refresh_token"),
        ("client_id", secret.client_id.as_str()),
        ("refresh_token", refresh_token),
    ];
    if let Some(client_secret) = &secret.client_secret {
        params.push(("client_secret", client_secret.as_str()));
    }

    let response = post_form(http, &secret.token_uri, &params).await?;
    Ok(StoredToken::from_response(
        response,
        Some(refresh_token.to_string()),
        Utc::now(),
    ))
}

async fn authorize(http: &reqwest::Client, secret: &ClientSecret) -> Result<StoredToken> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .context("Failed to bind local redirect listener")?;
    let redirect_uri = format!("http://127.0.0.1:{}", listener.local_addr()?.port());

    let verifier = random_string(64);
    let state = random_string(32);
    let url = authorization_url(secret, &redirect_uri, &pkce_challenge(&verifier), &state)?;

    eprintln!("Open this URL in your browser to authorize access to Google Tasks:\n\n{url}\n");

    let (mut stream, _) = listener
        .accept()
        .await
        .context("Failed to accept redirect")?;
    let mut request_line = String::new();
    BufReader::new(&mut stream)
        .read_line(&mut request_line)
        .await
        .context("Failed to read redirect")?;

    let redirect = parse_redirect(&request_line);
    let body = match &redirect {
        Ok(_) => "Authorization complete. You can close this window.",
        Err(_) => "Authorization failed. Check the terminal for details.",
    };
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await?;

    let (code, returned_state) = redirect?;
    if returned_state != state {
        return Err(Error::Auth("state mismatch in authorization redirect".into()).into());
    }

    let mut params = vec![
        ("grant_type", "authorization_code"),
        ("code", code.as_str()),
        ("client_id", secret.client_id.as_str()),
        ("redirect_uri", redirect_uri.as_str()),
        ("code_verifier", verifier.as_str()),
    ];
    if let Some(client_secret) = &secret.client_secret {
        params.push(("client_secret", client_secret.as_str()));
    }

    let response = post_form(http, &secret.token_uri, &params).await?;
    log::info!("Obtained Google access token");
    Ok(StoredToken::from_response(response, None, Utc::now()))
}

async fn post_form(
    http: &reqwest::Client,
    url: &str,
    params: &[(&str, &str)],
) -> Result<TokenResponse> {
    let response = http
        .post(url)
        .form(params)
        .send()
        .await
        .map_err(|e| Error::Auth(format!("token request failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::Auth(format!("token endpoint returned {status}: {body}")).into());
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| eyre!("Failed to parse token response: {}", e))
}

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// S256 code challenge for a PKCE verifier.
pub fn pkce_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

pub fn authorization_url(
    secret: &ClientSecret,
    redirect_uri: &str,
    challenge: &str,
    state: &str,
) -> Result<String> {
    let url = Url::parse_with_params(
        &secret.auth_uri,
        &[
            ("client_id", secret.client_id.as_str()),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", TASKS_SCOPE),
            ("code_challenge", challenge),
            ("code_challenge_method", "S256"),
            ("state", state),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| Error::Auth(format!("invalid auth_uri '{}': {e}", secret.auth_uri)))?;
    Ok(url.into())
}

/// Extract `(code, state)` from the redirect's request line,
/// e.g. `GET /?state=abc&code=xyz HTTP/1.1`.
pub fn parse_redirect(request_line: &str) -> Result<(String, String)> {
    let target = request_line
        .split_whitespace()
        .nth(1)
        .ok_or_else(|| Error::Auth("malformed redirect request".into()))?;
    let url = Url::parse(&format!("http://127.0.0.1{target}"))
        .map_err(|e| Error::Auth(format!("malformed redirect target '{target}': {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(Error::Auth(format!("authorization denied: {error}")).into());
    }

    match (code, state) {
        (Some(code), Some(state)) => Ok((code, state)),
        _ => Err(Error::Auth("redirect is missing code or state".into()).into()),
    }
}
