//! cat command - Display object contents
//!
//! Outputs the entire content of an object to stdout.

use std::io::{self, Write};

use bk_core::{ObjectLocator, ObjectStore, StorageClient};
use clap::Args;

use crate::exit_code::ExitCode;
use crate::output::Formatter;

/// Display object contents
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Object path (bucket/key)
    pub path: String,
}

/// Execute the cat command
pub async fn execute<S: ObjectStore + ?Sized>(
    args: CatArgs,
    client: &StorageClient<S>,
    formatter: &Formatter,
) -> ExitCode {
    let mut stdout = io::stdout();
    run(args, client, formatter, &mut stdout).await
}

async fn run<S: ObjectStore + ?Sized, W: Write>(
    args: CatArgs,
    client: &StorageClient<S>,
    formatter: &Formatter,
    out: &mut W,
) -> ExitCode {
    let locator = match ObjectLocator::parse_object(&args.path) {
        Ok(l) => l,
        Err(e) => {
            formatter.error(&e.to_string());
            return ExitCode::UsageError;
        }
    };

    let data = match client.read(&locator).await {
        Ok(d) => d,
        Err(e) => return formatter.fail(&format!("Failed to read {locator}"), &e),
    };

    // Raw bytes, bypassing the formatter
    if let Err(e) = out.write_all(&data).and_then(|()| out.flush()) {
        formatter.error(&format!("Failed to write to stdout: {e}"));
        return ExitCode::GeneralError;
    }
    ExitCode::Success
}
