mod cli;

use clap::{Parser, Subcommand};
use tracing_subscriber::fmt::format::{FmtSpan, Writer};
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::EnvFilter;

use cli::build::{cmd_build, BuildArgs};
use cli::check::{cmd_check, CheckArgs};
use cli::hash::{cmd_hash, HashArgs};
use cli::spell::{cmd_spell, SpellArgs};

#[derive(Parser)]
#[command(
    name = "cudagen",
    version,
    about = "Lower tensor-IR kernels to CUDA C++ source"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Lower .tir files to .cu translation units
    Build(BuildArgs),
    /// Lower without writing output
    Check(CheckArgs),
    /// Print the BLAKE3 fingerprint of the emitted source
    Hash(HashArgs),
    /// Print the CUDA spelling of data types
    Spell(SpellArgs),
}

struct NoTimestamp;

impl FormatTime for NoTimestamp {
    fn format_time(&self, _w: &mut Writer<'_>) -> std::fmt::Result {
        Ok(())
    }
}

/// `CUDAGEN_LOG` sets the filter (e.g. `cudagen=debug`); logging stays
/// off when it is unset. `CUDAGEN_LOG_STYLE=full` adds timestamps.
fn init_tracing() {
    let Ok(filter) = EnvFilter::try_from_env("CUDAGEN_LOG") else {
        return;
    };
    let full = std::env::var("CUDAGEN_LOG_STYLE").is_ok_and(|s| s == "full");
    if full {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_timer(NoTimestamp)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => cmd_build(args),
        Command::Check(args) => cmd_check(args),
        Command::Hash(args) => cmd_hash(args),
        Command::Spell(args) => cmd_spell(args),
    }
}
