//! exists command - Check whether an object exists
//!
//! Exits 0 when the object exists and 5 otherwise. Permission and network
//! failures are reported as "does not exist" too.

use bk_core::{ObjectLocator, ObjectStore, StorageClient};
use clap::Args;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Check whether an object exists
#[derive(Args, Debug)]
pub struct ExistsArgs {
    /// Object path (bucket/key)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct ExistsOutput {
    path: String,
    exists: bool,
}

/// Execute the exists command
pub async fn execute<S: ObjectStore + ?Sized>(
    args: ExistsArgs,
    client: &StorageClient<S>,
    formatter: &Formatter,
) -> ExitCode {
    let locator = match ObjectLocator::parse_object(&args.path) {
        Ok(l) => l,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let exists = client.exists(&locator).await;

    if formatter.is_json() {
        formatter.json(&ExistsOutput {
            path: locator.to_string(),
            exists,
        });
    } else {
        formatter.println(if exists { "true" } else { "false" });
    }

    if exists {
        ExitCode::Success
    } else {
        ExitCode::NotFound
    }
}
