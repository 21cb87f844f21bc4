//! CLI command definitions and execution
//!
//! Every command authenticates once with the credentials file, performs a
//! single library operation and maps the outcome to an exit code.

use std::path::PathBuf;

use bk_core::StorageClient;
use bk_s3::S3Store;
use clap::{Parser, Subcommand};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

mod cat;
mod completions;
mod cp;
mod download;
mod exists;
mod ls;
mod stat;
mod upload;

/// bk - object storage helper
///
/// Existence checks, listings, copies and transfers against an
/// S3-compatible object store.
#[derive(Parser, Debug)]
#[command(name = "bk")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Credentials file (defaults to <config dir>/bucketkit/credentials.toml)
    #[arg(long, global = true, env = "BK_CREDENTIALS")]
    pub credentials: Option<PathBuf>,

    /// Output format: human-readable or JSON
    #[arg(long, global = true, default_value = "false")]
    pub json: bool,

    /// Disable colored output
    #[arg(long, global = true, default_value = "false")]
    pub no_color: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, default_value = "false")]
    pub quiet: bool,

    /// Enable debug logging
    #[arg(long, global = true, default_value = "false")]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether an object exists (exit code 5 when it does not)
    Exists(exists::ExistsArgs),

    /// List direct children of a path, or every object with -r
    Ls(ls::LsArgs),

    /// Server-side copy between object paths
    Cp(cp::CpArgs),

    /// Download an object to a local file
    Download(download::DownloadArgs),

    /// Upload a local file to an object
    Upload(upload::UploadArgs),

    /// Display object contents
    Cat(cat::CatArgs),

    /// Show object metadata
    Stat(stat::StatArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

/// Execute the CLI command and return an exit code
pub async fn execute(cli: Cli) -> ExitCode {
    let output_config = OutputConfig {
        json: cli.json,
        no_color: cli.no_color,
        quiet: cli.quiet,
    };

    if let Commands::Completions(args) = cli.command {
        return completions::execute(args);
    }

    let formatter = Formatter::new(output_config);
    let client = match connect(cli.credentials, &formatter).await {
        Ok(c) => c,
        Err(code) => return code,
    };

    match cli.command {
        Commands::Exists(args) => exists::execute(args, &client, &formatter).await,
        Commands::Ls(args) => ls::execute(args, &client, &formatter).await,
        Commands::Cp(args) => cp::execute(args, &client, &formatter).await,
        Commands::Download(args) => download::execute(args, &client, &formatter).await,
        Commands::Upload(args) => upload::execute(args, &client, &formatter).await,
        Commands::Cat(args) => cat::execute(args, &client, &formatter).await,
        Commands::Stat(args) => stat::execute(args, &client, &formatter).await,
        Commands::Completions(_) => ExitCode::Success,
    }
}

/// Resolve the credentials file and authenticate
async fn connect(
    credentials: Option<PathBuf>,
    formatter: &Formatter,
) -> Result<StorageClient<S3Store>, ExitCode> {
    let path = match credentials {
        Some(p) => p,
        None => bk_core::default_credentials_path()
            .map_err(|e| formatter.fail("Cannot locate credentials", &e))?,
    };

    tracing::debug!(path = %path.display(), "authenticating");
    bk_s3::authenticate(&path)
        .await
        .map_err(|e| formatter.fail("Authentication failed", &e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bk",
            "ls",
            "bucket/dir",
            "--json",
            "--credentials",
            "/tmp/creds.toml",
        ])
        .unwrap();
        assert!(cli.json);
        assert_eq!(cli.credentials, Some(PathBuf::from("/tmp/creds.toml")));
        assert!(matches!(cli.command, Commands::Ls(_)));
    }

    #[test]
    fn test_parse_requires_subcommand() {
        assert!(Cli::try_parse_from(["bk"]).is_err());
    }
}
