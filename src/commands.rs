// CLI commands
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

use crate::config::StoreConfig;
use crate::state::Disease;
use crate::store::DiseaseStore;

#[derive(Debug, Serialize)]
pub struct CommandError {
    message: String,
}

impl<E: std::fmt::Display> From<E> for CommandError {
    fn from(error: E) -> Self {
        CommandError {
            message: error.to_string(),
        }
    }
}

impl CommandError {
    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

#[derive(Debug, Parser)]
#[command(name = "drbanana", version, about = "Manage recorded tree diseases")]
pub struct Cli {
    /// Data directory holding the database and image copies
    #[arg(long, global = true, env = "DRBANANA_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List every recorded disease
    List,
    /// Record a disease, copying its photo into private storage
    Add {
        #[arg(long)]
        name: String,
        /// Path or file:// URI of the photo
        #[arg(long)]
        image: String,
    },
    /// Show a single disease
    Show { id: Uuid },
    /// Delete a single disease
    Delete { id: Uuid },
    /// Delete every disease
    Clear,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CommandOutput {
    Diseases(Vec<Disease>),
    Disease(Option<Disease>),
    Added { id: Uuid },
    Deleted { deleted: bool },
    Cleared { removed: usize },
}

fn resolve_config(data_dir: Option<PathBuf>) -> CommandResult<StoreConfig> {
    match data_dir {
        Some(dir) => Ok(StoreConfig::in_dir(dir)),
        None => Ok(StoreConfig::default_location()?),
    }
}

/// Open the store, run one command against it and close it again
pub async fn execute(cli: Cli) -> CommandResult<CommandOutput> {
    let config = resolve_config(cli.data_dir)?;
    let store = DiseaseStore::open(config).await?;

    let output = match cli.command {
        Command::List => CommandOutput::Diseases(store.current()),
        Command::Add { name, image } => CommandOutput::Added {
            id: store.add(name, image).await?,
        },
        Command::Show { id } => CommandOutput::Disease(store.get_by_id(&id)?),
        Command::Delete { id } => CommandOutput::Deleted {
            deleted: store.delete_by_id(id).await?,
        },
        Command::Clear => CommandOutput::Cleared {
            removed: store.delete_all().await?,
        },
    };

    store.close()?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(data_dir: &std::path::Path, args: &[&str]) -> Cli {
        let mut argv = vec!["drbanana", "--data-dir", data_dir.to_str().unwrap()];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_show_rejects_bad_id() {
        assert!(Cli::try_parse_from(["drbanana", "show", "not-a-uuid"]).is_err());
    }

    #[tokio::test]
    async fn test_add_list_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        let photo = dir.path().join("leaf.jpg");
        std::fs::write(&photo, b"leaf").unwrap();

        let added = execute(cli(
            &data,
            &["add", "--name", "Fusarium wilt", "--image", photo.to_str().unwrap()],
        ))
        .await
        .unwrap();
        let id = match added {
            CommandOutput::Added { id } => id,
            other => panic!("unexpected output: {:?}", other),
        };

        let listed = execute(cli(&data, &["list"])).await.unwrap();
        match listed {
            CommandOutput::Diseases(diseases) => {
                assert_eq!(diseases.len(), 1);
                assert_eq!(diseases[0].id, id);
            }
            other => panic!("unexpected output: {:?}", other),
        }

        let deleted = execute(cli(&data, &["delete", &id.to_string()])).await.unwrap();
        assert!(matches!(deleted, CommandOutput::Deleted { deleted: true }));

        let shown = execute(cli(&data, &["show", &id.to_string()])).await.unwrap();
        assert!(matches!(shown, CommandOutput::Disease(None)));
    }

    #[tokio::test]
    async fn test_missing_image_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.jpg");

        let err = execute(cli(
            dir.path(),
            &["add", "--name", "x", "--image", missing.to_str().unwrap()],
        ))
        .await
        .unwrap_err();
        assert!(err.message().contains("Failed to read image"));
    }
}
