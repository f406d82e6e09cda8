//! sitepkg core: package a declared set of paths into a verifiable archive
//! and restore it onto another root.
//!
//! # Architecture
//!
//! - [`Manifest`] is the archive engine. Membership is explicit: one path
//!   per entry, no recursion. [`Manifest::create`] writes a tar stream,
//!   [`Manifest::extract`] restores content, mode and ownership.
//! - [`Pipeline`] fixes the transform order: archive, then compress, then
//!   seal (see the `sealedbox` crate), then digest. Extraction is the exact
//!   inverse.
//! - [`storage`] is the collaborator that moves the final bytes to and from
//!   local disk, HTTP(S) or S3. Backends are constructed by the caller and
//!   injected through [`storage::Router`].
//!
//! Two failure modes are tolerable by policy ([`MissingPolicy`]): a source
//! path missing at create time and a manifest path missing from the
//! archive at extract time. Everything else aborts the whole call.

pub mod archive;
pub mod compression;
pub mod digest;
pub mod error;
pub mod manifest;
pub mod owner;
pub mod pipeline;
pub mod policy;
pub mod storage;

pub use compression::Compression;
pub use error::{ArchiveError, PipelineError};
pub use manifest::Manifest;
pub use owner::{ByName, EntryOwner, NumericIds, Owner, OwnerResolver};
pub use pipeline::{Extracted, Packed, Pipeline};
pub use policy::{Missing, MissingPolicy};

/// Re-exported so callers can hold keys without a direct dependency.
pub use sealedbox::{Key, SealedBox};
