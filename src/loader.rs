//! Loads [`Document`]s from raw text sources. A source that fails
//! front-matter validation is skipped and reported in
//! [`Collection::rejected`]; two sources claiming the same tip id fail the
//! whole load with [`Error::DuplicateId`].

use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::Read,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::document::{
    parse_permalink, zero_pad, Document, Frontmatter, ORDER_WIDTH,
};

/// File extensions recognised as tip sources.
const MARKDOWN_EXTENSIONS: &[&str] = &["md", "markdown"];

/// A raw, not yet parsed, tip source.
#[derive(Clone, Debug)]
pub struct Source {
    pub path: PathBuf,
    pub text: String,
}

impl Source {
    pub fn new(path: impl Into<PathBuf>, text: impl Into<String>) -> Source {
        Source {
            path: path.into(),
            text: text.into(),
        }
    }
}

/// The outcome of a successful load.
#[derive(Debug, Default)]
pub struct Collection {
    /// Accepted documents in the order their sources were given.
    pub documents: Vec<Document>,

    /// Sources that were skipped because their front-matter was malformed.
    pub rejected: Vec<Rejected>,

    by_id: HashMap<u32, usize>,
}

impl Collection {
    /// Looks up a document by tip id.
    pub fn get(&self, id: u32) -> Option<&Document> {
        self.by_id.get(&id).map(|&i| &self.documents[i])
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// A source skipped for malformed front-matter.
#[derive(Debug)]
pub struct Rejected {
    pub path: PathBuf,
    pub reason: Reason,
}

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.reason)
    }
}

/// Parses a single source into a [`Document`]. The source must be
/// structured as follows:
///
/// 1. Initial front-matter fence (`---`) on the first line
/// 2. YAML front-matter with fields `title`, `permalink`, `order`, and
///    `published`
/// 3. Terminal front-matter fence (`---`) on a line of its own
/// 4. Tip body
///
/// For example:
///
/// ```md
/// ---
/// title: "Tip of the Week #1: string_view"
/// layout: tips
/// permalink: tips/1
/// order: "001"
/// published: true
/// ---
/// Originally posted as TotW #1 on April 20, 2012
/// ```
pub fn parse_document(source: &Source) -> Result<Document> {
    parse_text(&source.path, &source.text).map_err(|reason| {
        Error::MalformedFrontMatter {
            path: source.path.clone(),
            reason,
        }
    })
}

fn parse_text(path: &Path, input: &str) -> std::result::Result<Document, Reason> {
    let (yaml_start, yaml_stop, body_start) = frontmatter_indices(input)?;
    let frontmatter: Frontmatter =
        serde_yaml::from_str(&input[yaml_start..yaml_stop])?;

    if frontmatter.title.trim().is_empty() {
        return Err(Reason::EmptyTitle);
    }

    let id = parse_permalink(&frontmatter.permalink)
        .ok_or_else(|| Reason::InvalidPermalink(frontmatter.permalink.clone()))?;

    let expected = zero_pad(id, ORDER_WIDTH);
    if frontmatter.order != expected {
        return Err(Reason::OrderMismatch {
            order: frontmatter.order,
            expected,
        });
    }

    Ok(Document {
        id,
        title: frontmatter.title,
        permalink: frontmatter.permalink,
        order: frontmatter.order,
        published: frontmatter.published,
        body: input[body_start..].to_owned(),
        source_path: path.to_owned(),
    })
}

/// Returns `(yaml_start, yaml_stop, body_start)` byte offsets. Both fences
/// must occupy a whole line; trailing whitespace (including `\r`) is
/// tolerated.
fn frontmatter_indices(input: &str) -> std::result::Result<(usize, usize, usize), Reason> {
    const FENCE: &str = "---";
    const BOM: char = '\u{feff}';

    let start = if input.starts_with(BOM) { BOM.len_utf8() } else { 0 };
    let first_line_end = input[start..]
        .find('\n')
        .map_or(input.len(), |i| start + i);
    if input[start..first_line_end].trim_end() != FENCE {
        return Err(Reason::MissingStartFence);
    }

    let yaml_start = (first_line_end + 1).min(input.len());
    let mut line_start = yaml_start;
    while line_start < input.len() {
        let line_end = input[line_start..]
            .find('\n')
            .map_or(input.len(), |i| line_start + i);
        if input[line_start..line_end].trim_end() == FENCE {
            return Ok((
                yaml_start,
                line_start,
                (line_end + 1).min(input.len()),
            ));
        }
        line_start = line_end + 1;
    }
    Err(Reason::MissingEndFence)
}

/// Parses every source, skipping (and logging) those with malformed
/// front-matter. Fails with [`Error::DuplicateId`] as soon as a second
/// source claims an id that's already taken.
pub fn load_sources<I>(sources: I) -> Result<Collection>
where
    I: IntoIterator<Item = Source>,
{
    let mut collection = Collection::default();
    for source in sources {
        let document = match parse_document(&source) {
            Ok(document) => document,
            Err(Error::MalformedFrontMatter { path, reason }) => {
                warn!(path = %path.display(), %reason, "skipping tip with malformed front-matter");
                collection.rejected.push(Rejected { path, reason });
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(&i) = collection.by_id.get(&document.id) {
            return Err(Error::DuplicateId {
                id: document.id,
                first: collection.documents[i].source_path.clone(),
                second: document.source_path,
            });
        }

        debug!(id = document.id, path = %document.source_path.display(), "loaded tip");
        collection
            .by_id
            .insert(document.id, collection.documents.len());
        collection.documents.push(document);
    }

    info!(
        loaded = collection.documents.len(),
        rejected = collection.rejected.len(),
        "loaded tips"
    );
    Ok(collection)
}

/// Recursively searches `source_directory` for tip files (extension `.md`
/// or `.markdown`) and loads them with [`load_sources`]. Files are visited in
/// file-name order so diagnostics are stable from run to run.
pub fn load_directory(source_directory: &Path) -> Result<Collection> {
    let mut sources = Vec::new();
    for result in WalkDir::new(source_directory)
        .sort_by(|a, b| a.file_name().cmp(b.file_name()))
    {
        let entry = result?;
        if !entry.file_type().is_file() || !is_markdown(entry.path()) {
            continue;
        }

        let mut text = String::new();
        File::open(entry.path())
            .and_then(|mut file| file.read_to_string(&mut text))
            .map_err(|err| Error::Io {
                path: entry.path().to_owned(),
                err,
            })?;
        sources.push(Source::new(entry.path(), text));
    }
    load_sources(sources)
}

fn is_markdown(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => MARKDOWN_EXTENSIONS.contains(&ext),
        None => false,
    }
}

/// Why a source's front-matter was rejected.
#[derive(Debug)]
pub enum Reason {
    /// The source doesn't begin with a `---` line.
    MissingStartFence,

    /// The starting fence was found but no closing `---` line follows it.
    MissingEndFence,

    /// The front-matter isn't valid YAML, or a required key is missing or has
    /// the wrong type.
    Yaml(serde_yaml::Error),

    /// The title is blank.
    EmptyTitle,

    /// The permalink isn't of the form `tips/{id}`.
    InvalidPermalink(String),

    /// The order isn't the zero-padded id.
    OrderMismatch { order: String, expected: String },
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reason::MissingStartFence => write!(f, "tip must begin with `---`"),
            Reason::MissingEndFence => write!(f, "missing closing `---`"),
            Reason::Yaml(err) => err.fmt(f),
            Reason::EmptyTitle => write!(f, "`title` must not be empty"),
            Reason::InvalidPermalink(permalink) => write!(
                f,
                "permalink `{}` is not of the form `tips/<id>`",
                permalink
            ),
            Reason::OrderMismatch { order, expected } => write!(
                f,
                "order `{}` doesn't match the permalink; wanted `{}`",
                order, expected
            ),
        }
    }
}

impl std::error::Error for Reason {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Reason::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Reason {
    /// Converts a [`serde_yaml::Error`] into a [`Reason`]. It allows us to use
    /// the `?` operator when deserializing front-matter.
    fn from(err: serde_yaml::Error) -> Reason {
        Reason::Yaml(err)
    }
}

/// Represents the result of a load operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading tips.
#[derive(Debug)]
pub enum Error {
    /// Returned by [`parse_document`] when a source's front-matter is
    /// malformed. [`load_sources`] records these in [`Collection::rejected`]
    /// instead of failing.
    MalformedFrontMatter { path: PathBuf, reason: Reason },

    /// Returned when two sources claim the same tip id.
    DuplicateId {
        id: u32,
        first: PathBuf,
        second: PathBuf,
    },

    /// Returned when a source file can't be read.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned for errors walking the source directory.
    WalkDir(walkdir::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedFrontMatter { path, reason } => write!(
                f,
                "malformed front-matter in `{}`: {}",
                path.display(),
                reason
            ),
            Error::DuplicateId { id, first, second } => write!(
                f,
                "tip {} is declared by both `{}` and `{}`",
                id,
                first.display(),
                second.display()
            ),
            Error::Io { path, err } => {
                write!(f, "reading `{}`: {}", path.display(), err)
            }
            Error::WalkDir(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::MalformedFrontMatter { reason, .. } => Some(reason),
            Error::DuplicateId { .. } => None,
            Error::Io { err, .. } => Some(err),
            Error::WalkDir(err) => Some(err),
        }
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator while walking the source directory.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tip(id: u32, body: &str) -> Source {
        Source::new(
            format!("totw-{}.md", id),
            format!(
                "---\ntitle: \"Tip of the Week #{id}: Example\"\nlayout: tips\nsidenav: side-nav-tips.html\npublished: true\npermalink: tips/{id}\ntype: markdown\norder: \"{order:0>3}\"\n---\n{body}",
                id = id,
                order = id,
                body = body,
            ),
        )
    }

    fn reject(text: &str) -> Reason {
        match parse_document(&Source::new("bad.md", text)) {
            Err(Error::MalformedFrontMatter { reason, .. }) => reason,
            Err(e) => panic!("unexpected error: {}", e),
            Ok(document) => panic!("unexpectedly parsed tip {}", document.id),
        }
    }

    #[test]
    fn test_parse_document() -> Result<()> {
        let document = parse_document(&tip(1, "Hello\n\n---\n\nWorld\n"))?;
        assert_eq!(1, document.id);
        assert_eq!("Tip of the Week #1: Example", document.title);
        assert_eq!("tips/1", document.permalink);
        assert_eq!("001", document.order);
        assert!(document.published);
        assert_eq!("Hello\n\n---\n\nWorld\n", document.body);
        assert_eq!(PathBuf::from("totw-1.md"), document.source_path);
        Ok(())
    }

    #[test]
    fn test_parse_document_crlf() -> Result<()> {
        let text = "---\r\ntitle: T\r\npermalink: tips/7\r\norder: \"007\"\r\npublished: false\r\n---\r\nbody\r\n";
        let document = parse_document(&Source::new("crlf.md", text))?;
        assert_eq!(7, document.id);
        assert!(!document.published);
        assert_eq!("body\r\n", document.body);
        Ok(())
    }

    #[test]
    fn test_fence_inside_value_is_not_a_fence() -> Result<()> {
        let text = "---\ntitle: \"a --- b\"\npermalink: tips/2\norder: \"002\"\npublished: true\n---\n";
        let document = parse_document(&Source::new("two.md", text))?;
        assert_eq!("a --- b", document.title);
        assert_eq!("", document.body);
        Ok(())
    }

    #[test]
    fn test_missing_fences() {
        assert!(matches!(
            reject("title: T\n---\n"),
            Reason::MissingStartFence
        ));
        assert!(matches!(
            reject("---\ntitle: T\npermalink: tips/1\n"),
            Reason::MissingEndFence
        ));
    }

    #[test]
    fn test_missing_required_key() {
        let reason = reject("---\npermalink: tips/1\norder: \"001\"\npublished: true\n---\n");
        assert!(matches!(reason, Reason::Yaml(_)));
        assert!(reason.to_string().contains("title"), "{}", reason);

        let reason = reject("---\ntitle: T\npermalink: tips/1\norder: \"001\"\n---\n");
        assert!(reason.to_string().contains("published"), "{}", reason);
    }

    #[test]
    fn test_wrong_type() {
        assert!(matches!(
            reject("---\ntitle: T\npermalink: tips/1\norder: \"001\"\npublished: sometimes\n---\n"),
            Reason::Yaml(_)
        ));
        assert!(matches!(
            reject("---\ntitle: [a, b]\npermalink: tips/1\norder: \"001\"\npublished: true\n---\n"),
            Reason::Yaml(_)
        ));
    }

    #[test]
    fn test_permalink_and_order_invariants() {
        assert!(matches!(
            reject("---\ntitle: T\npermalink: posts/1\norder: \"001\"\npublished: true\n---\n"),
            Reason::InvalidPermalink(p) if p == "posts/1"
        ));
        assert!(matches!(
            reject("---\ntitle: T\npermalink: tips/12\norder: \"12\"\npublished: true\n---\n"),
            Reason::OrderMismatch { order, expected } if order == "12" && expected == "012"
        ));
        assert!(matches!(
            reject("---\ntitle: T\npermalink: tips/12\norder: \"013\"\npublished: true\n---\n"),
            Reason::OrderMismatch { .. }
        ));
        assert!(matches!(
            reject("---\ntitle: \"  \"\npermalink: tips/12\norder: \"012\"\npublished: true\n---\n"),
            Reason::EmptyTitle
        ));
    }

    #[test]
    fn test_load_sources_skips_malformed() -> Result<()> {
        let collection = load_sources(vec![
            tip(3, "three"),
            Source::new("broken.md", "no front-matter here"),
            tip(1, "one"),
        ])?;
        assert_eq!(2, collection.len());
        assert_eq!(1, collection.rejected.len());
        assert_eq!(PathBuf::from("broken.md"), collection.rejected[0].path);
        assert_eq!("three", collection.get(3).map(|d| d.body.as_str()).unwrap_or_default());
        assert!(collection.get(2).is_none());
        for document in &collection.documents {
            assert_eq!(format!("tips/{}", document.id), document.permalink);
            assert_eq!(zero_pad(document.id, 3), document.order);
        }
        Ok(())
    }

    #[test]
    fn test_duplicate_id() {
        let mut other = tip(5, "second");
        other.path = PathBuf::from("totw-5-again.md");
        match load_sources(vec![tip(5, "first"), tip(6, ""), other]) {
            Err(Error::DuplicateId { id, first, second }) => {
                assert_eq!(5, id);
                assert_eq!(PathBuf::from("totw-5.md"), first);
                assert_eq!(PathBuf::from("totw-5-again.md"), second);
            }
            other => panic!("wanted DuplicateId, got {:?}", other.map(|c| c.len())),
        }
    }

    #[test]
    fn test_load_directory() -> Result<()> {
        let collection = load_directory(Path::new("./testdata/site/tips"))?;
        let ids: Vec<u32> = collection.documents.iter().map(|d| d.id).collect();
        assert_eq!(vec![1, 3, 59, 140], ids);
        assert_eq!(1, collection.rejected.len());
        assert!(collection.rejected[0].path.ends_with("drafts/untitled.md"));
        assert!(matches!(collection.rejected[0].reason, Reason::Yaml(_)));
        Ok(())
    }
}
