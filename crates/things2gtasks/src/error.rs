#[derive(thiserror::Error, Debug, serde::Deserialize, serde::Serialize)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authorization failed: {0}")]
    Auth(String),

    #[error("Clean slate failed: {0}")]
    CleanSlate(String),

    #[error("Migration finished with {0} failed area(s)")]
    Incomplete(usize),
}
