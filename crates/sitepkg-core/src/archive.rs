//! Tar creation and extraction driven by a [`Manifest`].
//!
//! Only the listed paths are written; directories are written as a bare
//! entry and never recursed into. On extraction, entries the manifest does
//! not list are skipped, and the embedded mode (including setuid, setgid
//! and sticky bits) is applied verbatim, independent of the process umask.

use std::collections::{HashMap, HashSet};
use std::fs::{self, DirBuilder, File, OpenOptions, Permissions};
use std::io::{self, Read, Write};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tar::{Archive, Builder, EntryType, Header, HeaderMode};
use tracing::{debug, info};

use crate::digest::HashingReader;
use crate::manifest::entry_key;
use crate::owner::{self, ByName, EntryOwner, OwnerResolver};
use crate::{ArchiveError, Manifest, Missing};

/// Permission bits carried through the archive.
const MODE_MASK: u32 = 0o7777;

impl Manifest {
    /// Write every listed path into a tar stream, in manifest order.
    ///
    /// Returns the writer once the archive footer has been written.
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::SourceMissing`] for an absent path, unless the
    ///   policy ignores it.
    /// - [`ArchiveError::Unsupported`] for anything that is not a regular
    ///   file or a directory.
    /// - [`ArchiveError::Io`] / [`ArchiveError::Stream`] on I/O failure.
    pub fn create<W: Write>(&self, writer: W) -> Result<W, ArchiveError> {
        let mut builder = Builder::new(writer);
        builder.mode(HeaderMode::Complete);

        for name in self.entries() {
            let path = self.resolve(name);
            let meta = match fs::metadata(&path) {
                Ok(meta) => meta,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    self.policy().tolerate(Missing::Source(&path))?;
                    continue;
                }
                Err(e) => return Err(ArchiveError::io(&path)(e)),
            };

            let mut header = header_for(name, &meta)?;
            let mode = meta.mode() & MODE_MASK;

            if meta.is_dir() {
                header.set_size(0);
                append_named(&mut builder, &mut header, name, io::empty())
                    .map_err(ArchiveError::Stream)?;
                info!(name = %name, mode = format!("{mode:o}"), "add dir");
            } else {
                let file = File::open(&path).map_err(ArchiveError::io(&path))?;
                let mut reader = HashingReader::new(file);
                append_named(&mut builder, &mut header, name, &mut reader)
                    .map_err(ArchiveError::io(&path))?;
                info!(
                    name = %name,
                    mode = format!("{mode:o}"),
                    bytes = reader.bytes_read(),
                    sha256 = %reader.hex_digest(),
                    "add file"
                );
            }
        }

        builder.into_inner().map_err(ArchiveError::Stream)
    }

    /// Restore listed entries from a tar stream, resolving owners by name.
    ///
    /// # Errors
    ///
    /// See [`Manifest::extract_with`].
    pub fn extract<R: Read>(&self, reader: R) -> Result<(), ArchiveError> {
        self.extract_with(reader, &ByName)
    }

    /// Restore listed entries from a tar stream.
    ///
    /// The check for manifest paths absent from the archive runs only after
    /// the whole stream has been consumed.
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::NotInArchive`] for a listed path the archive does
    ///   not contain, unless the policy ignores it.
    /// - [`ArchiveError::Unsupported`] for a listed entry that is neither a
    ///   regular file nor a directory.
    /// - [`ArchiveError::Io`] / [`ArchiveError::Stream`] on I/O failure,
    ///   including a refused `chown`.
    pub fn extract_with<R: Read>(
        &self,
        reader: R,
        owners: &dyn OwnerResolver,
    ) -> Result<(), ArchiveError> {
        // `f` and `./f` may both be listed; one archive entry satisfies both
        let mut wanted: HashMap<PathBuf, Vec<&str>> = HashMap::new();
        for name in self.entries() {
            wanted.entry(entry_key(name)).or_default().push(name.as_str());
        }
        let mut seen: HashSet<&str> = HashSet::new();

        let mut archive = Archive::new(reader);
        for entry in archive.entries().map_err(ArchiveError::Stream)? {
            let mut entry = entry.map_err(ArchiveError::Stream)?;
            let raw = String::from_utf8_lossy(&entry.path_bytes()).into_owned();

            let Some(names) = wanted.get(&entry_key(&raw)) else {
                debug!(name = %raw, "skipping entry not in manifest");
                continue;
            };
            let name = names[0];

            let header = entry.header();
            let kind = header.entry_type();
            let mode = header.mode().map_err(ArchiveError::Stream)? & MODE_MASK;
            let path = self.resolve(name);

            match kind {
                EntryType::Directory => {
                    make_dir(&path, mode)?;
                    info!(name, mode = format!("{mode:o}"), "extracted dir");
                }
                EntryType::Regular | EntryType::Continuous => {
                    let entry_owner = entry_owner(header)?;
                    let target = owners.resolve(&entry_owner);

                    let file = OpenOptions::new()
                        .write(true)
                        .create(true)
                        .truncate(true)
                        .mode(0)
                        .open(&path)
                        .map_err(ArchiveError::io(&path))?;

                    let mut payload = HashingReader::new(&mut entry);
                    let mut out = &file;
                    io::copy(&mut payload, &mut out).map_err(ArchiveError::io(&path))?;

                    std::os::unix::fs::fchown(&file, Some(target.uid), Some(target.gid))
                        .map_err(ArchiveError::io(&path))?;
                    // chown may clear setuid/setgid, so the mode goes last
                    file.set_permissions(Permissions::from_mode(mode))
                        .map_err(ArchiveError::io(&path))?;

                    info!(
                        name,
                        mode = format!("{mode:o}"),
                        uid = target.uid,
                        gid = target.gid,
                        bytes = payload.bytes_read(),
                        sha256 = %payload.hex_digest(),
                        "extracted file"
                    );
                }
                other => {
                    return Err(ArchiveError::Unsupported {
                        name: name.to_string(),
                        kind: format!("{other:?}"),
                    });
                }
            }

            seen.extend(names.iter().copied());
        }

        for name in self.entries() {
            if !seen.contains(name.as_str()) {
                self.policy().tolerate(Missing::ArchiveEntry(name))?;
            }
        }

        Ok(())
    }
}

/// Name used by GNU tar for long-name extension entries.
const LONG_LINK: &[u8] = b"././@LongLink";

/// Append an entry whose name is the manifest string, byte for byte.
///
/// Absolute names and names with `..` components are stored as given.
/// Names that do not fit the 100-byte header field are preceded by a GNU
/// long-name entry.
fn append_named<W: Write, R: Read>(
    builder: &mut Builder<W>,
    header: &mut Header,
    name: &str,
    data: R,
) -> io::Result<()> {
    let bytes = name.as_bytes();
    let max = header.as_old().name.len();

    if bytes.len() >= max {
        let mut long = Header::new_gnu();
        long.as_old_mut().name[..LONG_LINK.len()].copy_from_slice(LONG_LINK);
        long.set_mode(0o644);
        long.set_uid(0);
        long.set_gid(0);
        long.set_mtime(0);
        // NUL-terminated, as GNU tar writes it
        long.set_size(bytes.len() as u64 + 1);
        long.set_entry_type(EntryType::GNULongName);
        long.set_cksum();
        builder.append(&long, bytes.chain(&[0u8][..]))?;
    }

    let field = &mut header.as_old_mut().name;
    let n = bytes.len().min(max);
    field.fill(0);
    field[..n].copy_from_slice(&bytes[..n]);
    header.set_cksum();

    builder.append(header, data)
}

fn header_for(name: &str, meta: &fs::Metadata) -> Result<Header, ArchiveError> {
    let file_type = meta.file_type();
    if !file_type.is_dir() && !file_type.is_file() {
        return Err(ArchiveError::Unsupported {
            name: name.to_string(),
            kind: describe(&file_type),
        });
    }

    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(meta, HeaderMode::Complete);
    header.set_mode(meta.mode() & MODE_MASK);

    if let Some(user) = owner::user_name(meta.uid()) {
        header.set_username(&user).map_err(ArchiveError::io(name))?;
    }
    if let Some(group) = owner::group_name(meta.gid()) {
        header.set_groupname(&group).map_err(ArchiveError::io(name))?;
    }

    Ok(header)
}

fn entry_owner(header: &Header) -> Result<EntryOwner, ArchiveError> {
    let id = |v: io::Result<u64>| -> Result<u32, ArchiveError> {
        let v = v.map_err(ArchiveError::Stream)?;
        u32::try_from(v).map_err(|_| {
            ArchiveError::Stream(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("owner id {v} out of range"),
            ))
        })
    };

    Ok(EntryOwner {
        uid: id(header.uid())?,
        gid: id(header.gid())?,
        user: header.username().ok().flatten().map(String::from),
        group: header.groupname().ok().flatten().map(String::from),
    })
}

fn make_dir(path: &Path, mode: u32) -> Result<(), ArchiveError> {
    match DirBuilder::new().mode(mode).create(path) {
        Ok(()) => fs::set_permissions(path, Permissions::from_mode(mode))
            .map_err(ArchiveError::io(path)),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            debug!(path = %path.display(), "directory already exists");
            Ok(())
        }
        Err(e) => Err(ArchiveError::io(path)(e)),
    }
}

fn describe(file_type: &fs::FileType) -> String {
    use std::os::unix::fs::FileTypeExt;

    let kind = if file_type.is_symlink() {
        "symlink"
    } else if file_type.is_socket() {
        "socket"
    } else if file_type.is_fifo() {
        "fifo"
    } else if file_type.is_block_device() {
        "block device"
    } else if file_type.is_char_device() {
        "char device"
    } else {
        "unknown"
    };
    kind.to_string()
}
