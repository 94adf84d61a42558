//! Defines the [`Document`] type, the in-memory record for a single tip, along
//! with the naming rules that tie a tip's numeric id to its `permalink` and
//! `order` front-matter fields.

use serde::Deserialize;
use std::path::PathBuf;

/// Every tip lives under this path segment, i.e. `tips/{id}`.
pub const PERMALINK_PREFIX: &str = "tips";

/// The minimum number of digits in a tip's `order` field.
pub const ORDER_WIDTH: usize = 3;

/// A single loaded tip. Documents are built once by the
/// [`crate::loader::Loader`] and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// The tip number, taken from the permalink.
    pub id: u32,

    /// The title, e.g. `Tip of the Week #1: string_view`.
    pub title: String,

    /// Always equal to [`permalink_for`]`(id)`.
    pub permalink: String,

    /// Always equal to [`zero_pad`]`(id, ORDER_WIDTH)`.
    pub order: String,

    /// Unpublished tips are loaded and may be referenced, but they are not
    /// indexed or rendered.
    pub published: bool,

    /// The raw markdown following the front-matter.
    pub body: String,

    /// Where the document was read from. Only used for diagnostics.
    pub source_path: PathBuf,
}

/// The YAML block at the head of every tip. Keys other than these (`layout`,
/// `sidenav`, `type`, ...) belong to the theme and are ignored.
#[derive(Deserialize, Clone, Debug)]
pub(crate) struct Frontmatter {
    pub title: String,
    pub permalink: String,
    pub order: String,
    pub published: bool,
}

/// Returns the permalink for tip `id`.
pub fn permalink_for(id: u32) -> String {
    format!("{}/{}", PERMALINK_PREFIX, id)
}

/// Left-pads the decimal form of `id` with zeros to at least `width` digits.
pub fn zero_pad(id: u32, width: usize) -> String {
    format!("{:0width$}", id, width = width)
}

/// Extracts the tip id from a permalink of the form `tips/{id}`. Returns
/// `None` for anything else, including zero, leading zeros, and trailing
/// slashes, so that a `Some` result always round-trips through
/// [`permalink_for`].
pub fn parse_permalink(permalink: &str) -> Option<u32> {
    let digits = permalink
        .strip_prefix(PERMALINK_PREFIX)?
        .strip_prefix('/')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<u32>() {
        Ok(id) if id > 0 && permalink_for(id) == permalink => Some(id),
        _ => None,
    }
}
