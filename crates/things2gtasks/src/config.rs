//! Configuration: CLI flags and environment first, then an optional TOML file

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::prelude::*;

const APP_DIR: &str = "things2gtasks";

/// Contents of `config.toml`
///
/// ```toml
/// [things]
/// db_path = "/Users/me/Library/Group Containers/.../main.sqlite"
///
/// [google]
/// credentials_path = "credentials.json"
/// token_path = "token.json"
/// ```
#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub things: ThingsSection,
    #[serde(default)]
    pub google: GoogleSection,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ThingsSection {
    pub db_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GoogleSection {
    pub credentials_path: Option<PathBuf>,
    pub token_path: Option<PathBuf>,
}

/// Things database location
#[derive(Debug, Clone, clap::Args)]
pub struct SourceArgs {
    /// Path to the Things 3 database (main.sqlite)
    #[arg(long, env = "THINGS_DB_PATH")]
    pub db_path: Option<PathBuf>,
}

/// Google credentials locations
#[derive(Debug, Clone, clap::Args)]
pub struct GoogleArgs {
    /// Path to the OAuth client secrets JSON downloaded from Google Cloud Console
    #[arg(long, env = "GOOGLE_CREDENTIALS_PATH")]
    pub creds_path: Option<PathBuf>,

    /// Where the OAuth token is cached between runs
    #[arg(long, env = "GOOGLE_TOKEN_PATH")]
    pub token_path: Option<PathBuf>,
}

/// Resolved Google file locations
#[derive(Debug, Clone, PartialEq)]
pub struct GooglePaths {
    pub credentials: PathBuf,
    pub token: PathBuf,
}

/// Default config location: `<config dir>/things2gtasks/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// Default token location: `<cache dir>/things2gtasks/token.json`
pub fn default_token_path() -> Result<PathBuf> {
    let cache_dir = dirs_next::cache_dir()
        .ok_or_eyre("Unable to determine cache directory")?
        .join(APP_DIR);

    Ok(cache_dir.join("token.json"))
}

pub fn parse_file_config(contents: &str) -> Result<FileConfig> {
    toml::from_str(contents).map_err(|e| Error::Config(e.to_string()).into())
}

/// Load the config file.
///
/// An explicitly given path must exist. The default location is optional.
pub fn load_file_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "config file not found at {}",
                    path.display()
                ))
                .into());
            }
            path.to_path_buf()
        }
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(FileConfig::default()),
        },
    };

    log::debug!("Loading configuration from {}", path.display());
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_file_config(&contents)
}

pub fn resolve_db_path(args: &SourceArgs, file: &FileConfig) -> Result<PathBuf> {
    args.db_path
        .clone()
        .or_else(|| file.things.db_path.clone())
        .ok_or_else(|| {
            Error::Config(
                "Things database path was not provided. Use --db-path, THINGS_DB_PATH or \
                 [things] db_path in the config file"
                    .to_string(),
            )
            .into()
        })
}

pub fn resolve_google_paths(args: &GoogleArgs, file: &FileConfig) -> Result<GooglePaths> {
    let credentials = args
        .creds_path
        .clone()
        .or_else(|| file.google.credentials_path.clone())
        .ok_or_else(|| {
            Error::Config(
                "Google credentials path was not provided. Use --creds-path, \
                 GOOGLE_CREDENTIALS_PATH or [google] credentials_path in the config file"
                    .to_string(),
            )
        })?;

    let token = match args
        .token_path
        .clone()
        .or_else(|| file.google.token_path.clone())
    {
        Some(path) => path,
        None => default_token_path()?,
    };

    Ok(GooglePaths { credentials, token })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn no_args() -> (SourceArgs, GoogleArgs) {
        (
            SourceArgs { db_path: None },
            GoogleArgs {
                creds_path: None,
                token_path: None,
            },
        )
    }

    #[test]
    fn test_parse_file_config_full() {
        let config = parse_file_config(
            r#"
            [things]
            db_path = "/tmp/main.sqlite"

            [google]
            credentials_path = "creds.json"
            token_path = "tok.json"
            "#,
        )
        .unwrap();

        assert_eq!(config.things.db_path, Some(PathBuf::from("/tmp/main.sqlite")));
        assert_eq!(config.google.credentials_path, Some(PathBuf::from("creds.json")));
        assert_eq!(config.google.token_path, Some(PathBuf::from("tok.json")));
    }

    #[test]
    fn test_parse_file_config_empty() {
        assert_eq!(parse_file_config("").unwrap(), FileConfig::default());
    }

    #[test]
    fn test_parse_file_config_rejects_unknown_keys() {
        assert!(parse_file_config("[things]\ndatabase = \"x\"\n").is_err());
    }

    #[test]
    fn test_cli_wins_over_file() {
        let file = parse_file_config("[things]\ndb_path = \"from-file\"\n").unwrap();
        let args = SourceArgs {
            db_path: Some(PathBuf::from("from-cli")),
        };
        assert_eq!(resolve_db_path(&args, &file).unwrap(), PathBuf::from("from-cli"));

        let (no_source, _) = no_args();
        assert_eq!(
            resolve_db_path(&no_source, &file).unwrap(),
            PathBuf::from("from-file")
        );
    }

    #[test]
    fn test_missing_db_path_is_an_error() {
        let (source, _) = no_args();
        let err = resolve_db_path(&source, &FileConfig::default()).unwrap_err();
        assert!(err.to_string().contains("--db-path"));
    }

    #[test]
    fn test_google_paths_from_file() {
        let file = parse_file_config(
            "[google]\ncredentials_path = \"c.json\"\ntoken_path = \"t.json\"\n",
        )
        .unwrap();
        let (_, google) = no_args();

        assert_eq!(
            resolve_google_paths(&google, &file).unwrap(),
            GooglePaths {
                credentials: PathBuf::from("c.json"),
                token: PathBuf::from("t.json"),
            }
        );
    }

    #[test]
    fn test_missing_credentials_is_an_error() {
        let (_, google) = no_args();
        assert!(resolve_google_paths(&google, &FileConfig::default()).is_err());
    }

    #[test]
    fn test_load_file_config_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[google]\ncredentials_path = \"creds.json\"").unwrap();

        let config = load_file_config(Some(file.path())).unwrap();
        assert_eq!(config.google.credentials_path, Some(PathBuf::from("creds.json")));
    }

    #[test]
    fn test_load_file_config_explicit_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(load_file_config(Some(&missing)).is_err());
    }
}
