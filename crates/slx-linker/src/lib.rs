#![warn(missing_docs)]
//! Links compiled shader libraries into a single executable shader module.
//!
//! A [`Linker`] holds libraries registered under names. Attaching a subset
//! publishes their defined functions into one name table (with rollback if
//! two libraries export the same name), and [`Linker::link`] walks the
//! table from an entry function, clones everything reachable into a fresh
//! module, merges resources, schedules static constructors, and runs the
//! prepare pass pipeline from [`slx_opt`].
//!
//! Flow: `register_lib(name, module)` → `attach_lib(name)` →
//! `link(entry, profile)`.

mod error;
mod job;
mod library;
mod linker;

pub use error::{Diagnostic, LinkError};
pub use library::{FunctionLinkInfo, Library, ResourceRef};
pub use linker::Linker;
