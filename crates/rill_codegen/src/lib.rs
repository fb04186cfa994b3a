//! WebAssembly text-format code generation.

mod codegen;
pub mod layout;

pub use codegen::{generate, CodegenError};
