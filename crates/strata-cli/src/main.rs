use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use strata_core::domain::Rotation;
use strata_core::observability::init_tracing;
use strata_core::{App, AppBuilder, Config, ErrorKind, ImageError};
use tracing::warn;

/// Thumbnail lifecycle: temp → incoming → active.
#[derive(Debug, Parser)]
#[command(name = "strata", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ingest an image into the incoming tier
    Upload { file: PathBuf },
    /// Move an uploaded image and its thumbnails to the active tier
    Publish { key: String },
    /// Replace an active image by a rotated copy under a new key
    Rotate {
        key: String,
        #[arg(long, default_value_t = Rotation::Clockwise, allow_hyphen_values = true)]
        rotation: Rotation,
    },
    /// Delete active images with every thumbnail
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Remove expired artifacts from the incoming tier
    Clean,
    /// Tool versions, capabilities and counters
    Info,
}

#[derive(Debug, Serialize)]
struct Failure<'a> {
    error: &'a str,
    message: String,
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, Box<dyn Error>> {
    Ok(serde_json::to_value(value)?)
}

/// upload はファイルを rename で取り込むので、元ファイルは残すためにコピーを渡す
async fn stage(temp_root: &Path, file: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let missing = || ImageError::MissingFile(file.to_path_buf());
    let name = file.file_name().ok_or_else(missing)?.to_string_lossy();
    match tokio::fs::metadata(file).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(missing().into()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(missing().into()),
        Err(e) => return Err(e.into()),
    }

    let staged = temp_root.join(format!("staged-{}-{name}", std::process::id()));
    tokio::fs::copy(file, &staged).await?;
    Ok(staged)
}

async fn execute(app: &App, command: Command) -> Result<Value, Box<dyn Error>> {
    match command {
        Command::Upload { file } => {
            let staged = stage(app.tiers().temp_dir().root(), &file).await?;
            let result = app.upload(&staged).await;
            if result.is_err()
                && let Err(e) = tokio::fs::remove_file(&staged).await
                && e.kind() != io::ErrorKind::NotFound
            {
                warn!(path = %staged.display(), error = %e, "failed to remove staged file");
            }
            to_json(&result?)
        }
        Command::Publish { key } => to_json(&app.publish(&key).await?),
        Command::Rotate { key, rotation } => to_json(&app.rotate(&key, rotation).await?),
        Command::Delete { keys } => to_json(&app.delete(&keys).await?),
        Command::Clean => to_json(&app.clean_incoming().await?),
        Command::Info => Ok(json!({
            "tools": app.tool_versions().await,
            "capabilities": app.capabilities(),
            "modern_formats": app.keys().modern_formats(),
            "counts": app.counts(),
        })),
    }
}

async fn run(cli: Cli) -> Result<Value, Box<dyn Error>> {
    let config = Config::from_env()?;
    init_tracing(&config.log)?;

    let app = AppBuilder::from_config(&config)?.build().await?;
    let result = execute(&app, cli.command).await;

    // 背景処理（modern 派生画像、deferred publish）を待ってから終了
    app.drain().await;
    tracing::debug!(counts = ?app.counts(), "background work drained");
    result
}

fn report(err: &(dyn Error + 'static)) -> ExitCode {
    let (kind, code) = match err.downcast_ref::<ImageError>().map(ImageError::kind) {
        Some(kind) => {
            let code = match kind {
                ErrorKind::BadInput => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::Internal => 1,
            };
            (serde_json::to_value(kind).ok(), code)
        }
        None => (None, 1),
    };
    let failure = Failure {
        error: kind.as_ref().and_then(Value::as_str).unwrap_or("internal"),
        message: err.to_string(),
    };
    match serde_json::to_string(&failure) {
        Ok(line) => eprintln!("{line}"),
        Err(_) => eprintln!("{err}"),
    }
    ExitCode::from(code)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(value) => {
            match serde_json::to_string_pretty(&value) {
                Ok(text) => println!("{text}"),
                Err(_) => println!("{value}"),
            }
            ExitCode::SUCCESS
        }
        Err(err) => report(err.as_ref()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn staging_copies_and_keeps_the_source() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("violin.jpg");
        tokio::fs::write(&source, "JPEG 1151x551").await.unwrap();

        let staged = stage(dir.path(), &source).await.unwrap();

        assert!(source.is_file());
        assert!(staged.to_string_lossy().ends_with("-violin.jpg"));
        assert_eq!(
            tokio::fs::read_to_string(&staged).await.unwrap(),
            "JPEG 1151x551"
        );
    }

    #[tokio::test]
    async fn a_missing_source_is_bad_input() {
        let dir = TempDir::new().unwrap();

        let err = stage(dir.path(), &dir.path().join("gone.jpg"))
            .await
            .unwrap_err();

        let err = err.downcast_ref::<ImageError>().unwrap();
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }

    #[tokio::test]
    async fn write_failures_are_not_reported_as_bad_input() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("a.png");
        tokio::fs::write(&source, "PNG 4x4").await.unwrap();

        let err = stage(&dir.path().join("no-such-temp"), &source)
            .await
            .unwrap_err();

        assert!(err.downcast_ref::<ImageError>().is_none());
        assert!(err.downcast_ref::<io::Error>().is_some());
    }
}
