//! download command - Download an object to a local file

use std::path::{Path, PathBuf};

use bk_core::{ObjectLocator, ObjectStore, StorageClient};
use clap::Args;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Download an object to a local file
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Source object (bucket/key)
    pub source: String,

    /// Local destination file, or an existing directory
    pub target: PathBuf,
}

#[derive(Debug, Serialize)]
struct DownloadOutput {
    status: &'static str,
    source: String,
    target: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the download command
pub async fn execute<S: ObjectStore + ?Sized>(
    args: DownloadArgs,
    client: &StorageClient<S>,
    formatter: &Formatter,
) -> ExitCode {
    let source = match ObjectLocator::parse_object(&args.source) {
        Ok(l) => l,
        Err(e) => {
            formatter.error(&format!("Invalid source path: {e}"));
            return ExitCode::UsageError;
        }
    };

    let target = resolve_target(&source, &args.target);
    let target_display = target.display().to_string();

    let size = match client.download(&source, &target).await {
        Ok(n) => n,
        Err(e) => return formatter.fail(&format!("Failed to download {source}"), &e),
    };
    let size_human = humansize::format_size(size, humansize::BINARY);

    if formatter.is_json() {
        formatter.json(&DownloadOutput {
            status: "success",
            source: source.to_string(),
            target: target_display,
            size_bytes: size,
            size_human,
        });
    } else {
        formatter.success(&format!("{source} -> {target_display} ({size_human})"));
    }
    ExitCode::Success
}

/// Downloading into a directory keeps the object's base name
fn resolve_target(source: &ObjectLocator, target: &Path) -> PathBuf {
    if target.is_dir() {
        target.join(source.file_name().unwrap_or("download"))
    } else {
        target.to_path_buf()
    }
}
