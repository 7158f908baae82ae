use std::{fs, path::Path};

use anyhow::{anyhow, Context};
use clap::Subcommand;
use savkit_archive::Container;
use tracing::{debug, info};

#[derive(Clone, Subcommand)]
pub enum Savdump {
    /// List the entries in the container along with their sizes and offsets.
    List,

    /// Decompress a single entry and write its payload to a file.
    Extract {
        /// Name of the entry, eg. `THBAG05.sto`. If several entries share the name, the first one
        /// is extracted.
        entry: String,

        /// Where to write the payload. Defaults to the entry's name in the current directory.
        #[clap(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Decompress every entry and check it against its declared size. Used for diagnosing corrupt
    /// containers.
    Verify,
}

pub fn load_container(filename: &Path) -> anyhow::Result<Container> {
    info!(?filename, "Opening container");
    let buffer = fs::read(filename).with_context(|| format!("cannot read {filename:?}"))?;
    debug!(
        "Size on disk: {} bytes | {:.2} KiB",
        buffer.len(),
        buffer.len() as f64 / 1024.0
    );
    Container::parse(&buffer).with_context(|| format!("cannot parse container {filename:?}"))
}

pub fn savdump(filename: &Path, dump: Savdump) -> anyhow::Result<()> {
    let container = load_container(filename)?;

    match dump {
        Savdump::List => {
            debug!("Printing entries");
            for (i, (entry, offset)) in container
                .entries()
                .iter()
                .zip(container.entry_offsets())
                .enumerate()
            {
                println!(
                    "{i:4} {:<16} {:>10} {:>10} @ {offset:08x}",
                    entry.name(),
                    entry.uncompressed_len(),
                    entry.compressed_len(),
                );
            }
        }
        Savdump::Extract { entry, output } => {
            let found = container
                .find_by_name(&entry)
                .ok_or_else(|| anyhow!("no entry named {entry:?} in {filename:?}"))?;
            let payload = found
                .decompress()
                .with_context(|| format!("cannot decompress {entry:?}"))?;
            let output = output.unwrap_or_else(|| entry.clone().into());
            fs::write(&output, &payload)
                .with_context(|| format!("cannot write payload to {output:?}"))?;
            info!(?output, len = payload.len(), "Extracted {entry}");
        }
        Savdump::Verify => {
            container.verify().context("container failed verification")?;
            info!(entries = container.len(), "All entries decompress cleanly");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use savkit_archive::{Container, Entry};

    use super::{savdump, Savdump};

    #[test]
    fn extract_writes_the_decompressed_payload() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("test.sav");
        let output = dir.path().join("bag.sto");

        let mut container = Container::new();
        container.push(Entry::from_payload("THBAG05.sto", b"STORV1.0 contents").unwrap());
        fs::write(&input, container.to_bytes().unwrap()).unwrap();

        savdump(
            &input,
            Savdump::Extract {
                entry: "THBAG05.sto".into(),
                output: Some(output.clone()),
            },
        )
        .unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"STORV1.0 contents");

        assert!(savdump(
            &input,
            Savdump::Extract {
                entry: "MISSING.sto".into(),
                output: Some(output),
            },
        )
        .is_err());
    }

    #[test]
    fn verify_fails_on_a_bad_signature() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("bad.sav");
        fs::write(&input, b"BAD SIG!").unwrap();
        assert!(savdump(&input, Savdump::Verify).is_err());
    }
}
