//! ls command - List object paths
//!
//! Lists the direct children (files and sub-directories) of a path, or every
//! object below it with `--recursive`.

use bk_core::{ObjectLocator, ObjectStore, StorageClient};
use clap::Args;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// List object paths
#[derive(Args, Debug)]
pub struct LsArgs {
    /// Remote path (bucket[/path])
    pub path: String,

    /// List every object below the path instead of direct children
    #[arg(short, long)]
    pub recursive: bool,
}

/// Output structure for ls command (JSON format)
#[derive(Debug, Serialize)]
struct LsOutput {
    bucket: String,
    path: String,
    recursive: bool,
    items: Vec<String>,
}

/// Execute the ls command
pub async fn execute<S: ObjectStore + ?Sized>(
    args: LsArgs,
    client: &StorageClient<S>,
    formatter: &Formatter,
) -> ExitCode {
    let locator = match ObjectLocator::parse(&args.path) {
        Ok(l) => l,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let result = if args.recursive {
        client.list_all(&locator.bucket, &locator.key).await
    } else {
        client
            .list_direct_children(&locator.bucket, &locator.key)
            .await
    };

    let items = match result {
        Ok(items) => items,
        Err(e) => return formatter.fail("Failed to list objects", &e),
    };

    if formatter.is_json() {
        formatter.json(&LsOutput {
            bucket: locator.bucket,
            path: locator.key,
            recursive: args.recursive,
            items,
        });
    } else {
        for item in &items {
            formatter.println(item);
        }
    }

    ExitCode::Success
}
