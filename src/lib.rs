//! The library code for the `tipsite` generator, which turns a directory of
//! "Tip of the Week" articles into a navigable static site. A build runs in
//! four steps:
//!
//! 1. Loading tips from source files on disk ([`crate::loader`])
//! 2. Resolving references between tips ([`crate::xref`])
//! 3. Ordering the published tips into a navigation index ([`crate::index`])
//! 4. Rendering tip pages, the index page, and the index manifest to disk
//!    ([`crate::write`])
//!
//! Loading is where most things can go wrong. A tip whose front-matter is
//! malformed is skipped and reported, but two tips claiming the same number
//! abort the build since navigation would be ambiguous. Broken references are
//! never fatal; they're collected and handed back to the caller in a
//! [`crate::build::Report`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

pub mod build;
pub mod config;
pub mod document;
pub mod index;
pub mod loader;
pub mod markdown;
pub mod url;
pub mod write;
pub mod xref;
