//! Type inference and checking: resolved -> typecked.
//!
//! Two phases share one inference context per package: signature lowering
//! computes an item's type from its AST form on demand ([`lower`]), and
//! body checking infers types inside function bodies and global
//! initializers ([`check`]). A final zonk pass deep-resolves every
//! expression type through the substitution.

pub mod check;
pub mod infer;
mod lower;

pub use check::typecheck_package;
pub use infer::InferCtx;
