use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{ensure, Context};
use clap::Args;
use savkit_archive::{Container, RecordLayout};
use tracing::info;

use crate::savdump::load_container;

/// Where the records sit inside the entry's payload. Defaults match store (`.sto`) item lists.
#[derive(Debug, Clone, Copy, Args)]
pub struct LayoutArgs {
    /// Bytes before the first record.
    #[clap(long, default_value_t = RecordLayout::STORE_ITEMS.header_len)]
    pub header_len: usize,

    /// Bytes after the last record.
    #[clap(long, default_value_t = RecordLayout::STORE_ITEMS.trailer_len)]
    pub trailer_len: usize,

    /// Size of a single record.
    #[clap(long, default_value_t = RecordLayout::STORE_ITEMS.record_size)]
    pub record_size: usize,
}

impl From<LayoutArgs> for RecordLayout {
    fn from(args: LayoutArgs) -> Self {
        Self {
            header_len: args.header_len,
            trailer_len: args.trailer_len,
            record_size: args.record_size,
        }
    }
}

fn write_container(container: &Container, output: &Path) -> anyhow::Result<()> {
    let bytes = container
        .to_bytes()
        .context("cannot serialize container")?;
    fs::write(output, &bytes).with_context(|| format!("cannot write {output:?}"))?;
    info!(?output, len = bytes.len(), "Wrote container");
    Ok(())
}

fn sorted_path(filename: &Path) -> PathBuf {
    let mut path = OsString::from(filename);
    path.push(".sorted");
    path.into()
}

pub fn sort(
    filename: &Path,
    entry: &str,
    output: Option<&Path>,
    layout: &RecordLayout,
) -> anyhow::Result<()> {
    let output = output.map_or_else(|| sorted_path(filename), Path::to_path_buf);
    ensure!(
        output != filename,
        "refusing to overwrite the input container {filename:?}"
    );

    let mut container = load_container(filename)?;
    container
        .sort_records(entry, layout)
        .with_context(|| format!("cannot sort records of {entry:?}"))?;
    write_container(&container, &output)
}

pub fn repack(filename: &Path, output: &Path) -> anyhow::Result<()> {
    let container = load_container(filename)?;
    write_container(&container, output)
}
