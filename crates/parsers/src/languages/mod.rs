//! Language front ends. Each module exposes a `parse_<language>` function
//! that lowers source text into the shared [`ir`] AST.

pub mod javascript;
pub use javascript::{parse_javascript, MAX_NESTING};
