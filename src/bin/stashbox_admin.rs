//! CLI entry point for stashbox-admin: offline credential and bucket management.
//!
//! Operates directly on the metadata collections named in the config file,
//! so it works while the server is stopped.  It is how the first access key
//! is issued when the credential routes are closed.  Results are printed
//! to stdout as JSON; errors go to stderr with a non-zero exit code.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use stashbox::config::load_config_or_default;
use stashbox::errors::StoreResult;
use stashbox::AppState;

#[derive(Parser)]
#[command(name = "stashbox-admin", about = "stashbox credential and bucket administration")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long, global = true, default_value = "stashbox.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage access keys
    #[command(subcommand)]
    Credential(CredentialCommand),
    /// Manage buckets
    #[command(subcommand)]
    Bucket(BucketCommand),
}

#[derive(Subcommand)]
enum CredentialCommand {
    /// Issue a new key pair under a unique name
    Issue {
        #[arg(long)]
        name: String,
        /// Expiry, RFC 3339 or `YYYY-MM-DD HH:MM:SS` (UTC). Empty never expires.
        #[arg(long, default_value = "")]
        expire_time: String,
    },
    /// List all access keys
    List,
    /// Show one access key
    Get {
        #[arg(long)]
        name: String,
    },
    /// Delete an access key (no error if absent)
    Delete {
        #[arg(long)]
        name: String,
    },
}

#[derive(Subcommand)]
enum BucketCommand {
    /// Register a bucket
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        access_policy: String,
        #[arg(long, default_value = "")]
        storage_type: String,
    },
    /// List all buckets
    List,
    /// Show one bucket
    Get {
        #[arg(long)]
        name: String,
    },
    /// Unregister a bucket (blobs on disk are kept)
    Delete {
        #[arg(long)]
        name: String,
    },
}

#[derive(Serialize)]
struct Deleted<'a> {
    deleted: &'a str,
}

fn print_json<T: Serialize>(value: &T) -> StoreResult<()> {
    let out = serde_json::to_string_pretty(value).map_err(anyhow::Error::from)?;
    println!("{}", out);
    Ok(())
}

async fn run_credential(state: &AppState, cmd: CredentialCommand) -> StoreResult<()> {
    match cmd {
        CredentialCommand::Issue { name, expire_time } => {
            print_json(&state.credentials.issue_and_save(&name, &expire_time).await?)
        }
        CredentialCommand::List => print_json(&state.credentials.list().await?),
        CredentialCommand::Get { name } => print_json(&state.credentials.get(&name).await?),
        CredentialCommand::Delete { name } => {
            state.credentials.delete(&name).await?;
            print_json(&Deleted { deleted: &name })
        }
    }
}

async fn run_bucket(state: &AppState, cmd: BucketCommand) -> StoreResult<()> {
    match cmd {
        BucketCommand::Create {
            name,
            access_policy,
            storage_type,
        } => print_json(
            &state
                .buckets
                .create(&name, &access_policy, &storage_type)
                .await?,
        ),
        BucketCommand::List => print_json(&state.buckets.list().await?),
        BucketCommand::Get { name } => print_json(&state.buckets.get(&name).await?),
        BucketCommand::Delete { name } => {
            state.buckets.delete(&name).await?;
            print_json(&Deleted { deleted: &name })
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config_or_default(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading config: {}", e);
            std::process::exit(1);
        }
    };

    let state = match AppState::from_config(config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening stores: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Credential(cmd) => run_credential(&state, cmd).await,
        Commands::Bucket(cmd) => run_bucket(&state, cmd).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stashbox::config::Config;
    use stashbox::errors::{Resource, StoreError};
    use tempfile::TempDir;

    fn test_state(tmp: &TempDir) -> AppState {
        let mut config = Config::default();
        config.metadata.dir = tmp.path().join("config").display().to_string();
        config.storage.root_dir = tmp.path().join("blobs").display().to_string();
        AppState::from_config(config).unwrap()
    }

    #[tokio::test]
    async fn test_credential_bootstrap_round_trip() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp);

        run_credential(
            &state,
            CredentialCommand::Issue {
                name: "admin".into(),
                expire_time: String::new(),
            },
        )
        .await
        .unwrap();
        let issued = state.credentials.get("admin").await.unwrap();
        assert!(state.credentials.verify(&issued.access_key, &issued.secret_key).await);

        // A second process sees the key through the same collection file.
        let reopened = test_state(&tmp);
        assert_eq!(reopened.credentials.list().await.unwrap(), vec![issued]);

        run_credential(&state, CredentialCommand::List).await.unwrap();
        run_credential(&state, CredentialCommand::Get { name: "admin".into() })
            .await
            .unwrap();

        let err = run_credential(
            &state,
            CredentialCommand::Issue {
                name: "admin".into(),
                expire_time: String::new(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        run_credential(&state, CredentialCommand::Delete { name: "admin".into() })
            .await
            .unwrap();
        assert!(state.credentials.list().await.unwrap().is_empty());
        let err = run_credential(&state, CredentialCommand::Get { name: "admin".into() })
            .await
            .unwrap_err();
        assert!(err.is_not_found(Resource::Credential));
    }

    #[tokio::test]
    async fn test_bucket_round_trip() {
        let tmp = TempDir::new().unwrap();
        let state = test_state(&tmp);

        run_bucket(
            &state,
            BucketCommand::Create {
                name: "photos".into(),
                access_policy: String::new(),
                storage_type: "local".into(),
            },
        )
        .await
        .unwrap();
        let record = state.buckets.get("photos").await.unwrap();
        assert_eq!(record.access_policy, "private");
        assert_eq!(record.storage_type, "local");

        run_bucket(&state, BucketCommand::List).await.unwrap();
        run_bucket(&state, BucketCommand::Delete { name: "photos".into() })
            .await
            .unwrap();
        let err = run_bucket(&state, BucketCommand::Get { name: "photos".into() })
            .await
            .unwrap_err();
        assert!(err.is_not_found(Resource::Bucket));
    }

    #[test]
    fn test_cli_parses_nested_subcommands() {
        let cli = Cli::try_parse_from([
            "stashbox-admin",
            "--config",
            "custom.yaml",
            "credential",
            "issue",
            "--name",
            "admin",
            "--expire-time",
            "2999-01-01T00:00:00Z",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("custom.yaml"));
        match cli.command {
            Commands::Credential(CredentialCommand::Issue { name, expire_time }) => {
                assert_eq!(name, "admin");
                assert_eq!(expire_time, "2999-01-01T00:00:00Z");
            }
            _ => panic!("expected credential issue"),
        }
    }
}
