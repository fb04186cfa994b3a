//! AST data model for the rill compiler.
//!
//! The tree is parameterized by a [`Phase`](ast::Phase) that declares which
//! elaboration slots are present: item/loop identifiers (builder),
//! resolutions and definition paths (resolver), expression types and
//! per-package tables (type checker). The [`fold`] module provides the
//! phase-to-phase visitor scaffold, [`build`] the parsed-to-built pass.

pub mod ast;
pub mod build;
pub mod context;
pub mod fold;
pub mod pretty;
pub mod ty;

pub use ast::*;
pub use build::build_package;
pub use context::{Context, PackageLoader};
pub use fold::{fold_package, Folder};
pub use ty::{Ty, TyVar};
