use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{Builder, EntryType, Header};
use walkdir::WalkDir;

/// GNU marker name for an entry whose real name follows as its payload.
const GNU_LONG_LINK: &[u8] = b"././@LongLink";

/// Builds a reproducible `.tgz` from a directory tree.
///
/// Entries are visited in file-name order and carry zeroed timestamps and
/// ownership plus a normalised `0o644`/`0o755` mode, so identical trees always
/// produce identical bytes. Names are written as `./<relative path>`, the same
/// shape `tar -czf - .` produces, which npm unpacks straight into the package
/// root.
pub struct TarPacker {
    root: PathBuf,
}

impl TarPacker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write the archive into `writer`, returning it once the gzip trailer has
    /// been written and flushed.
    pub fn pack_into<W: Write>(&self, writer: W) -> Result<W> {
        let mut builder = Builder::new(GzEncoder::new(writer, Compression::default()));

        for entry in WalkDir::new(&self.root).min_depth(1).sort_by_file_name() {
            let entry = entry.context("failed to walk package directory")?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .context("failed to relativize path")?;
            let file_type = entry.file_type();

            let mut header = Header::new_gnu();
            header.set_mtime(0);
            header.set_uid(0);
            header.set_gid(0);

            if file_type.is_dir() {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                let name = archive_name(relative, true)?;
                append_named(&mut builder, &mut header, &name, io::empty())?;
            } else if file_type.is_file() {
                let metadata = entry.metadata().context("failed to stat package file")?;
                header.set_entry_type(EntryType::Regular);
                header.set_mode(if is_executable(&metadata) { 0o755 } else { 0o644 });
                header.set_size(metadata.len());
                let file = File::open(entry.path())
                    .with_context(|| format!("failed to open {}", entry.path().display()))?;
                let name = archive_name(relative, false)?;
                append_named(&mut builder, &mut header, &name, file)?;
            } else {
                tracing::debug!(path = %entry.path().display(), "skipping non-regular file");
            }
        }

        let encoder = builder.into_inner().context("failed to finish tar stream")?;
        let mut writer = encoder.finish().context("failed to finish gzip stream")?;
        writer.flush()?;
        Ok(writer)
    }
}

fn archive_name(relative: &Path, is_dir: bool) -> Result<String> {
    let mut name = String::from(".");
    for component in relative.components() {
        let Component::Normal(part) = component else {
            bail!("unexpected path component in {}", relative.display());
        };
        let Some(part) = part.to_str() else {
            bail!("non UTF-8 file name in {}", relative.display());
        };
        name.push('/');
        name.push_str(part);
    }
    if is_dir {
        name.push('/');
    }
    Ok(name)
}

/// Append `data` under `name` exactly as given.
///
/// `Builder::append_data` would normalise the leading `./` away, so the name
/// is written into the header directly, spilling into a GNU long-name record
/// when it does not fit the 100 byte field.
fn append_named<W: Write, R: Read>(
    builder: &mut Builder<W>,
    header: &mut Header,
    name: &str,
    data: R,
) -> Result<()> {
    let bytes = name.as_bytes();
    let field = &mut header.as_old_mut().name;

    if bytes.len() <= field.len() {
        field[..bytes.len()].copy_from_slice(bytes);
    } else {
        let mut long = Header::new_gnu();
        long.as_old_mut().name[..GNU_LONG_LINK.len()].copy_from_slice(GNU_LONG_LINK);
        long.set_mode(0o644);
        long.set_uid(0);
        long.set_gid(0);
        long.set_mtime(0);
        long.set_entry_type(EntryType::GNULongName);
        long.set_size(bytes.len() as u64 + 1);
        long.set_cksum();
        builder
            .append(&long, bytes.chain(&[0u8][..]))
            .context("failed to write long name record")?;

        let field = &mut header.as_old_mut().name;
        let len = field.len();
        field.copy_from_slice(&bytes[..len]);
    }

    header.set_cksum();
    builder
        .append(header, data)
        .with_context(|| format!("failed to append {name}"))?;
    Ok(())
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}
