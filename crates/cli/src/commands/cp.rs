//! cp command - Copy objects
//!
//! Server-side copy between two object paths, in the same bucket or across
//! buckets. No bytes pass through the local machine.

use bk_core::{ObjectLocator, ObjectStore, StorageClient};
use clap::Args;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Copy objects
#[derive(Args, Debug)]
pub struct CpArgs {
    /// Source object (bucket/key)
    pub source: String,

    /// Destination object (bucket/key, or bucket/dir/ to keep the source name)
    pub target: String,

    /// Only show what would be copied (dry run)
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct CpOutput {
    status: &'static str,
    source: String,
    target: String,
}

/// Execute the cp command
pub async fn execute<S: ObjectStore + ?Sized>(
    args: CpArgs,
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

    let target = match ObjectLocator::parse(&args.target) {
        Ok(l) => resolve_target(&source, l),
        Err(e) => {
            formatter.error(&format!("Invalid target path: {e}"));
            return ExitCode::UsageError;
        }
    };

    if args.dry_run {
        formatter.println(&format!("Would copy: {source} -> {target}"));
        return ExitCode::Success;
    }

    if let Err(e) = client.copy(&source, &target).await {
        return formatter.fail(&format!("Failed to copy {source}"), &e);
    }

    if formatter.is_json() {
        formatter.json(&CpOutput {
            status: "success",
            source: source.to_string(),
            target: target.to_string(),
        });
    } else {
        formatter.success(&format!("{source} -> {target}"));
    }
    ExitCode::Success
}

/// A target naming a directory (empty key or trailing `/`) keeps the source
/// file name
fn resolve_target(source: &ObjectLocator, target: ObjectLocator) -> ObjectLocator {
    if !target.key.is_empty() && !target.key.ends_with('/') {
        return target;
    }
    let name = source.file_name().unwrap_or_default();
    ObjectLocator::new(target.bucket, format!("{}{name}", target.key))
}
