//! Duplicate discovery.
//!
//! [`groups`] turns a hashed inventory into duplicate groups; [`finder`]
//! drives the whole pipeline (walk, hash, resolve) for the command-line
//! operations.

pub mod finder;
pub mod groups;

pub use finder::{DupeFinder, FinderError, ScanSummary};
pub use groups::{
    find_duplicates, find_duplicates_against, DuplicateGroup, GroupFile, GroupTotals,
};
