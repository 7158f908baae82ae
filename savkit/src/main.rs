mod repack;
mod savdump;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use repack::{repack, sort, LayoutArgs};
use savdump::{savdump, Savdump};
use tracing::{error, info, metadata::LevelFilter};
use tracing_subscriber::{prelude::*, EnvFilter};

#[derive(Subcommand)]
enum Command {
    /// Read data from a save container.
    ///
    /// Save containers are the `.sav` files stored next to a saved game's `.gam`, holding the
    /// area, store, and other resources changed during play.
    Savdump {
        /// Container to read from.
        filename: PathBuf,

        /// What to dump.
        #[clap(subcommand)]
        what: Savdump,
    },

    /// Sort the item records of one entry (eg. a bag's `.sto`) and write the repacked container.
    Sort {
        /// Container to read from.
        filename: PathBuf,

        /// Name of the entry whose records are sorted, eg. `THBAG05.sto`.
        entry: String,

        /// Where to write the repacked container. Defaults to the input path with `.sorted`
        /// appended.
        #[clap(short, long)]
        output: Option<PathBuf>,

        #[clap(flatten)]
        layout: LayoutArgs,
    },

    /// Parse a container and write it back out unchanged. Used for checking that a container
    /// survives a round trip.
    Repack {
        /// Container to read from.
        filename: PathBuf,

        /// Where to write the repacked container.
        output: PathBuf,
    },
}

#[derive(Parser)]
struct Args {
    /// Tool to run.
    #[clap(subcommand)]
    command: Command,
}

fn fallible_main() -> anyhow::Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Savdump { filename, what } => savdump(&filename, what)?,
        Command::Sort {
            filename,
            entry,
            output,
            layout,
        } => sort(&filename, &entry, output.as_deref(), &layout.into())?,
        Command::Repack { filename, output } => repack(&filename, &output)?,
    }

    Ok(())
}

fn main() {
    let subscriber = tracing_subscriber::registry()
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::DEBUG.into())
                .from_env_lossy(),
        )
        .with(tracing_subscriber::fmt::layer().without_time());
    tracing::subscriber::set_global_default(subscriber)
        .expect("cannot set default tracing subscriber");

    info!("savkit version {}", env!("CARGO_PKG_VERSION"));

    if let Err(err) = fallible_main() {
        error!("in fallible_main: {err:?}");
        std::process::exit(1);
    }
}
