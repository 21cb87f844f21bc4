//! upload command - Upload a local file to an object

use std::path::{Path, PathBuf};

use bk_core::{ObjectLocator, ObjectStore, StorageClient};
use clap::Args;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Upload a local file to an object
#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Local source file
    pub source: PathBuf,

    /// Destination object (bucket/key, or bucket/dir/ to keep the file name)
    pub target: String,
}

#[derive(Debug, Serialize)]
struct UploadOutput {
    status: &'static str,
    source: String,
    target: String,
    size_bytes: u64,
    size_human: String,
}

/// Execute the upload command
pub async fn execute<S: ObjectStore + ?Sized>(
    args: UploadArgs,
    client: &StorageClient<S>,
    formatter: &Formatter,
) -> ExitCode {
    if args.source.is_dir() {
        formatter.error("Source is a directory. Upload files one at a time.");
        return ExitCode::UsageError;
    }

    let target = match ObjectLocator::parse(&args.target) {
        Ok(l) => resolve_target(&args.source, l),
        Err(e) => {
            formatter.error(&format!("Invalid target path: {e}"));
            return ExitCode::UsageError;
        }
    };

    let source_display = args.source.display().to_string();

    let size = match client.upload(&target, &args.source).await {
        Ok(n) => n,
        Err(e) => return formatter.fail(&format!("Failed to upload {source_display}"), &e),
    };
    let size_human = humansize::format_size(size, humansize::BINARY);

    if formatter.is_json() {
        formatter.json(&UploadOutput {
            status: "success",
            source: source_display,
            target: target.to_string(),
            size_bytes: size,
            size_human,
        });
    } else {
        formatter.success(&format!("{source_display} -> {target} ({size_human})"));
    }
    ExitCode::Success
}

/// A target naming a directory (empty key or trailing `/`) keeps the local
/// file name
fn resolve_target(source: &Path, target: ObjectLocator) -> ObjectLocator {
    if !target.key.is_empty() && !target.key.ends_with('/') {
        return target;
    }
    let filename = source.file_name().unwrap_or_default().to_string_lossy();
    ObjectLocator::new(target.bucket, format!("{}{filename}", target.key))
}
