//! # pfind CLI entry point
//!
//! Loads `config.toml` (and `.env`), installs telemetry and dispatches to
//! the finder or the HTTP server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pfind_core::{ArtifactId, ContainerId, PfindConfig};
use pfind_finder::{ParticipantRef, SaveContext, finder_from_config};
use std::path::PathBuf;
use std::sync::Arc;

/// Locate participant result files and save edited copies as new versions.
#[derive(Parser, Debug)]
#[command(name = "pfind", version, about, long_about = None)]
struct Cli {
    /// Path to config.toml (searched upward from the working directory otherwise)
    #[arg(long, global = true, env = "PFIND_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the HTTP API
    Serve,

    /// Resolve a participant's results folder and list the files found there
    Locate {
        #[arg(long, env = "PFIND_USER")]
        user: String,
        #[arg(long)]
        accelerometer: String,
        #[arg(long)]
        participant: String,
    },

    /// Download an artifact's content
    Fetch {
        #[arg(long, env = "PFIND_USER")]
        user: String,
        #[arg(long)]
        id: String,
        /// Write to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Save a file as the next version of a base filename
    Save {
        #[arg(long, env = "PFIND_USER")]
        user: String,
        #[arg(long)]
        container: String,
        #[arg(long)]
        base_filename: String,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        content_kind: Option<String>,
        #[arg(long, requires = "participant")]
        accelerometer: Option<String>,
        #[arg(long, requires = "accelerometer")]
        participant: Option<String>,
    },

    /// Print the version number the next save would try first
    NextVersion {
        #[arg(long, env = "PFIND_USER")]
        user: String,
        #[arg(long)]
        container: String,
        #[arg(long)]
        base_filename: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = PfindConfig::load_from(cli.config.as_deref())?;
    pfind_telemetry::init_telemetry(&config.observability)?;
    tracing::debug!(command = ?cli.command, "pfind starting");

    match cli.command {
        Commands::Serve => {
            let finder = Arc::new(finder_from_config(&config)?);
            pfind_server::serve(finder, &config.server).await?;
        }
        Commands::Locate {
            user,
            accelerometer,
            participant,
        } => {
            let finder = finder_from_config(&config)?;
            let outcome = finder
                .locate_participant_files(&user, &accelerometer, &participant)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Fetch { user, id, out } => {
            let finder = finder_from_config(&config)?;
            let bytes = finder.load_editable(&user, &ArtifactId::new(id)).await?;
            match out {
                Some(path) => tokio::fs::write(&path, &bytes)
                    .await
                    .with_context(|| format!("Failed to write {:?}", path))?,
                None => {
                    use tokio::io::AsyncWriteExt;
                    let mut stdout = tokio::io::stdout();
                    stdout.write_all(&bytes).await?;
                    stdout.flush().await?;
                }
            }
        }
        Commands::Save {
            user,
            container,
            base_filename,
            input,
            content_kind,
            accelerometer,
            participant,
        } => {
            let finder = finder_from_config(&config)?;
            let payload = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {:?}", input))?;

            let mut ctx = SaveContext::new(ContainerId::new(container), base_filename, payload);
            if let Some(kind) = content_kind {
                ctx = ctx.with_content_kind(kind);
            }
            let participant = accelerometer
                .zip(participant)
                .map(|(a, p)| ParticipantRef::new(a, p));

            let receipt = finder
                .save_edited_artifact(&user, &ctx, participant.as_ref())
                .await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&receipt.artifact.descriptor)?
            );
        }
        Commands::NextVersion {
            user,
            container,
            base_filename,
        } => {
            let finder = finder_from_config(&config)?;
            let next = finder
                .next_version(&user, &ContainerId::new(container), &base_filename)
                .await?;
            println!("{}", next);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_locate() {
        let cli = Cli::try_parse_from([
            "pfind",
            "locate",
            "--user",
            "researcher@lab.edu",
            "--accelerometer",
            "ActiGraph",
            "--participant",
            "PID123",
        ])
        .unwrap();
        match cli.command {
            Commands::Locate {
                user, participant, ..
            } => {
                assert_eq!(user, "researcher@lab.edu");
                assert_eq!(participant, "PID123");
            }
            other => panic!("Expected locate, got {other:?}"),
        }
    }

    #[test]
    fn test_save_participant_flags_go_together() {
        let result = Cli::try_parse_from([
            "pfind",
            "save",
            "--user",
            "u@lab.edu",
            "--container",
            "c",
            "--base-filename",
            "data.csv",
            "--input",
            "edited.csv",
            "--participant",
            "PID123",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_next_version() {
        let cli = Cli::try_parse_from([
            "pfind",
            "--config",
            "/etc/pfind/config.toml",
            "next-version",
            "--user",
            "researcher@lab.edu",
            "--container",
            "c",
            "--base-filename",
            "data.csv",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/pfind/config.toml")));
        assert!(matches!(cli.command, Commands::NextVersion { .. }));
    }
}
