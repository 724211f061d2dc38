//! Command-line interface definitions for Sitefeed.
//!
//! Every option has a default and an environment variable, so the binary
//! runs with no arguments at all.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for a Sitefeed run.
///
/// # Examples
///
/// ```sh
/// # Defaults: ./config.json, documents in ./feeds
/// sitefeed
///
/// # YAML configuration, documents served from a web root
/// sitefeed --config sites.yaml --feeds-dir /var/www/feeds
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the feed configuration (JSON, or YAML by extension)
    #[arg(short, long, env = "SITEFEED_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Directory holding the generated feed documents
    #[arg(short, long, env = "SITEFEED_FEEDS_DIR", default_value = "feeds")]
    pub feeds_dir: PathBuf,
}
