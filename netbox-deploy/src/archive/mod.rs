//! Source tarball rewriting

pub mod reader;
pub mod rewrite;
pub mod source;
