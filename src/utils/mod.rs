/// Relative-path helpers for the record tree.
pub mod paths;
