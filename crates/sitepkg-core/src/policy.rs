//! Tolerance for entries that are absent at create or extract time.

use std::path::Path;

use tracing::info;

use crate::ArchiveError;

/// Whether absent entries abort the operation or are logged and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingPolicy {
    /// Absent entries are errors.
    #[default]
    Fail,
    /// Absent entries are logged at info level and skipped.
    Ignore,
}

/// The two absences the policy can tolerate.
#[derive(Debug, Clone, Copy)]
pub enum Missing<'a> {
    /// A manifest path does not exist on disk while creating.
    Source(&'a Path),
    /// A manifest path never appeared in the archive while extracting.
    ArchiveEntry(&'a str),
}

impl MissingPolicy {
    /// Map the usual `--ignore-missing` switch to a policy.
    pub fn from_ignore(ignore_missing: bool) -> Self {
        if ignore_missing {
            Self::Ignore
        } else {
            Self::Fail
        }
    }

    /// Decide the outcome for one absence.
    ///
    /// # Errors
    ///
    /// Under [`MissingPolicy::Fail`] returns [`ArchiveError::SourceMissing`]
    /// or [`ArchiveError::NotInArchive`].
    pub fn tolerate(self, missing: Missing<'_>) -> Result<(), ArchiveError> {
        match (self, missing) {
            (Self::Ignore, Missing::Source(path)) => {
                info!(path = %path.display(), "ignoring missing");
                Ok(())
            }
            (Self::Ignore, Missing::ArchiveEntry(name)) => {
                info!(name, "missing");
                Ok(())
            }
            (Self::Fail, Missing::Source(path)) => Err(ArchiveError::SourceMissing {
                path: path.to_path_buf(),
            }),
            (Self::Fail, Missing::ArchiveEntry(name)) => Err(ArchiveError::NotInArchive {
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignore_tolerates_both() {
        let policy = MissingPolicy::from_ignore(true);
        assert!(policy.tolerate(Missing::Source(Path::new("/x"))).is_ok());
        assert!(policy.tolerate(Missing::ArchiveEntry("x")).is_ok());
    }

    #[test]
    fn test_fail_names_the_entry() {
        let policy = MissingPolicy::from_ignore(false);
        assert_eq!(policy, MissingPolicy::default());

        match policy.tolerate(Missing::Source(Path::new("/x/y"))) {
            Err(ArchiveError::SourceMissing { path }) => assert_eq!(path, Path::new("/x/y")),
            other => panic!("unexpected: {other:?}"),
        }
        match policy.tolerate(Missing::ArchiveEntry("y")) {
            Err(ArchiveError::NotInArchive { name }) => assert_eq!(name, "y"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
