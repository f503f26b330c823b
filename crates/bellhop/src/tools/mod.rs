//! A set of built-in tools that models can use.

mod glob;
mod read_file;

pub use glob::glob_tool;
pub use read_file::read_file_tool;
