//! Command dispatch logic for repo-census

use super::{CollectArgs, InitArgs, init_config, process_collect};
use crate::{Host, Result};
use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "repo-census", version, author, long_about = None)]
#[command(about = "Collect process and quality metrics for a sample of popular repositories")]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: CensusSubcommand,
}

#[derive(Subcommand, Debug)]
enum CensusSubcommand {
    /// List repositories, measure each one, and write the output table
    Collect(Box<CollectArgs>),
    /// Generate a default configuration file
    Init(InitArgs),
}

/// Dispatch command-line arguments to the appropriate handler
///
/// # Arguments
///
/// * `args` - An iterator of command-line arguments (typically from `std::env::args()`)
///
/// # Errors
///
/// Returns an error if the configuration is unusable or the executed command fails outright.
/// A collection run that produces no output is reported through the host's error stream
/// and exit code instead.
pub async fn run<I, T, H>(host: &mut H, args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
    H: Host,
{
    match Cli::parse_from(args).command {
        CensusSubcommand::Collect(collect_args) => process_collect(host, &collect_args).await,
        CensusSubcommand::Init(init_args) => init_config(host, &init_args),
    }
}
