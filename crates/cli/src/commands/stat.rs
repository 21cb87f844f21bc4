//! stat command - Show object metadata

use bk_core::{ObjectLocator, ObjectStore, StorageClient};
use clap::Args;
use serde::Serialize;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Show object metadata
#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object path (bucket/key)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct StatOutput {
    bucket: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_class: Option<String>,
}

/// Execute the stat command
pub async fn execute<S: ObjectStore + ?Sized>(
    args: StatArgs,
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

    let info = match client.attributes(&locator).await {
        Ok(info) => info,
        Err(e) => return formatter.fail(&format!("Failed to stat {locator}"), &e),
    };

    if formatter.is_json() {
        formatter.json(&StatOutput {
            bucket: info.bucket,
            name: info.name,
            last_modified: info.last_modified.map(|t| t.to_string()),
            size_bytes: info.size_bytes,
            size_human: info.size_human,
            etag: info.etag,
            content_type: info.content_type,
            storage_class: info.storage_class,
        });
    } else {
        formatter.println(&format!("Name      : {}", info.name));
        formatter.println(&format!("Bucket    : {}", info.bucket));
        if let Some(modified) = info.last_modified {
            formatter.println(&format!(
                "Date      : {}",
                modified.strftime("%Y-%m-%d %H:%M:%S UTC")
            ));
        }
        if let (Some(size), Some(human)) = (info.size_bytes, &info.size_human) {
            formatter.println(&format!("Size      : {human} ({size} bytes)"));
        }
        if let Some(etag) = &info.etag {
            formatter.println(&format!("ETag      : {etag}"));
        }
        if let Some(ct) = &info.content_type {
            formatter.println(&format!("Type      : {ct}"));
        }
        if let Some(sc) = &info.storage_class {
            formatter.println(&format!("Class     : {sc}"));
        }
    }
    ExitCode::Success
}
