//! Ownership of extracted files.
//!
//! Archive headers carry both numeric ids and user/group names. Which one
//! wins on the extracting host is a strategy: [`ByName`] consults the local
//! user database and falls back to the numeric ids from the header,
//! [`NumericIds`] never looks anything up (containers, tests).

use nix::unistd::{Gid, Group, Uid, User};
use tracing::trace;

/// Numeric owner applied with `chown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    /// User id.
    pub uid: u32,
    /// Group id.
    pub gid: u32,
}

/// Ownership as recorded in an archive entry header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryOwner {
    /// Numeric user id from the header.
    pub uid: u32,
    /// Numeric group id from the header.
    pub gid: u32,
    /// User name from the header, if any.
    pub user: Option<String>,
    /// Group name from the header, if any.
    pub group: Option<String>,
}

/// Strategy turning header ownership into ids for the local host.
pub trait OwnerResolver: std::fmt::Debug + Send + Sync {
    /// Pick the uid/gid to apply to an extracted file.
    fn resolve(&self, entry: &EntryOwner) -> Owner;
}

/// Resolve by name on the local host, falling back to the header's ids.
///
/// User and group are resolved independently. The fallback trusts the
/// numeric ids embedded in the archive.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByName;

impl OwnerResolver for ByName {
    fn resolve(&self, entry: &EntryOwner) -> Owner {
        let uid = named(entry.user.as_deref())
            .and_then(|name| User::from_name(name).ok().flatten())
            .map_or(entry.uid, |user| user.uid.as_raw());

        let gid = named(entry.group.as_deref())
            .and_then(|name| Group::from_name(name).ok().flatten())
            .map_or(entry.gid, |group| group.gid.as_raw());

        trace!(?entry, uid, gid, "resolved owner by name");
        Owner { uid, gid }
    }
}

/// Use the numeric ids from the header as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericIds;

impl OwnerResolver for NumericIds {
    fn resolve(&self, entry: &EntryOwner) -> Owner {
        Owner {
            uid: entry.uid,
            gid: entry.gid,
        }
    }
}

fn named(name: Option<&str>) -> Option<&str> {
    name.filter(|n| !n.is_empty())
}

/// Local user name for `uid`, used when writing headers.
pub fn user_name(uid: u32) -> Option<String> {
    User::from_uid(Uid::from_raw(uid))
        .ok()
        .flatten()
        .map(|user| user.name)
}

/// Local group name for `gid`, used when writing headers.
pub fn group_name(gid: u32) -> Option<String> {
    Group::from_gid(Gid::from_raw(gid))
        .ok()
        .flatten()
        .map(|group| group.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(user: Option<&str>, group: Option<&str>) -> EntryOwner {
        EntryOwner {
            uid: 4242,
            gid: 4343,
            user: user.map(String::from),
            group: group.map(String::from),
        }
    }

    #[test]
    fn test_numeric_ids_ignore_names() {
        let owner = NumericIds.resolve(&entry(Some("root"), Some("root")));
        assert_eq!(owner, Owner { uid: 4242, gid: 4343 });
    }

    #[test]
    fn test_by_name_falls_back_to_header_ids() {
        let owner = ByName.resolve(&entry(
            Some("sitepkg-no-such-user"),
            Some("sitepkg-no-such-group"),
        ));
        assert_eq!(owner, Owner { uid: 4242, gid: 4343 });

        let owner = ByName.resolve(&entry(None, Some("")));
        assert_eq!(owner, Owner { uid: 4242, gid: 4343 });
    }

    #[test]
    fn test_by_name_resolves_root() {
        // uid 0 is named root on every host these tests run on
        let Some(name) = user_name(0) else { return };
        let owner = ByName.resolve(&entry(Some(&name), None));
        assert_eq!(owner.uid, 0);
        assert_eq!(owner.gid, 4343);
    }

    #[test]
    fn test_group_resolved_independently() {
        let Some(name) = group_name(0) else { return };
        let owner = ByName.resolve(&entry(Some("sitepkg-no-such-user"), Some(&name)));
        assert_eq!(owner, Owner { uid: 4242, gid: 0 });
    }
}
