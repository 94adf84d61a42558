//! Builds the navigation [`Index`]: the published tips in ascending id order.
//! The index can be written out as a YAML [`Manifest`] and read back.

use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::url::Linker;

/// The ordered list of tips to render and navigate between.
pub struct Index<'a> {
    entries: Vec<&'a Document>,
}

impl<'a> Index<'a> {
    /// Indexes the published documents, sorted by id. Ids are unique within a
    /// loaded collection so the order is total.
    pub fn build<I>(documents: I) -> Index<'a>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut entries: Vec<&Document> =
            documents.into_iter().filter(|d| d.published).collect();
        entries.sort_by_key(|d| d.id);
        Index { entries }
    }

    pub fn entries(&self) -> &[&'a Document] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<u32> {
        self.entries.iter().map(|d| d.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entries immediately before and after tip `id`. Both are
    /// `None` when `id` isn't in the index.
    pub fn neighbours(&self, id: u32) -> (Option<&'a Document>, Option<&'a Document>) {
        match self.entries.binary_search_by_key(&id, |d| d.id) {
            Ok(i) => (
                i.checked_sub(1).map(|j| self.entries[j]),
                self.entries.get(i + 1).copied(),
            ),
            Err(_) => (None, None),
        }
    }

    /// Describes the index for serialization.
    pub fn to_manifest(&self, linker: &Linker) -> Manifest {
        Manifest {
            tips: self
                .entries
                .iter()
                .map(|d| ManifestEntry {
                    id: d.id,
                    title: d.title.clone(),
                    permalink: d.permalink.clone(),
                    url: linker.url_for(d.id).to_string(),
                })
                .collect(),
        }
    }
}

/// The serialized form of an [`Index`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    pub tips: Vec<ManifestEntry>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: u32,
    pub title: String,
    pub permalink: String,
    pub url: String,
}

impl Manifest {
    pub fn ids(&self) -> Vec<u32> {
        self.tips.iter().map(|t| t.id).collect()
    }

    /// Writes the manifest as YAML.
    pub fn write_to<W: Write>(&self, w: W) -> Result<()> {
        serde_yaml::to_writer(w, self)?;
        Ok(())
    }

    /// Reads a manifest written by [`Manifest::write_to`]. Entries must be in
    /// strictly ascending id order, as an [`Index`] would have written them.
    pub fn read_from<R: Read>(r: R) -> Result<Manifest> {
        let manifest: Manifest = serde_yaml::from_reader(r)?;
        for pair in manifest.tips.windows(2) {
            if pair[0].id >= pair[1].id {
                return Err(Error::OutOfOrder {
                    previous: pair[0].id,
                    next: pair[1].id,
                });
            }
        }
        Ok(manifest)
    }
}

/// The result of a fallible manifest operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error writing or reading a [`Manifest`].
#[derive(Debug)]
pub enum Error {
    /// Returned for YAML (de)serialization errors, including I/O errors on
    /// the underlying reader or writer.
    Yaml(serde_yaml::Error),

    /// Returned when a manifest's entries aren't in ascending id order.
    OutOfOrder { previous: u32, next: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Yaml(err) => err.fmt(f),
            Error::OutOfOrder { previous, next } => write!(
                f,
                "manifest lists tip {} after tip {}",
                next, previous
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Yaml(err) => Some(err),
            Error::OutOfOrder { .. } => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::{permalink_for, zero_pad, ORDER_WIDTH};
    use std::path::PathBuf;
    use url::Url;

    fn document(id: u32, published: bool) -> Document {
        Document {
            id,
            title: format!("Tip of the Week #{}", id),
            permalink: permalink_for(id),
            order: zero_pad(id, ORDER_WIDTH),
            published,
            body: String::new(),
            source_path: PathBuf::from(format!("{}.md", id)),
        }
    }

    fn documents(ids: &[u32]) -> Vec<Document> {
        ids.iter().map(|&id| document(id, true)).collect()
    }

    #[test]
    fn test_build_orders_by_id() {
        let documents = documents(&[173, 1, 229, 59, 140]);
        let index = Index::build(&documents);
        assert_eq!(vec![1, 59, 140, 173, 229], index.ids());
    }

    #[test]
    fn test_build_orders_by_number_not_text() {
        let documents = documents(&[1000, 99, 100, 9]);
        assert_eq!(vec![9, 99, 100, 1000], Index::build(&documents).ids());
    }

    #[test]
    fn test_build_skips_unpublished() {
        let documents = vec![document(3, true), document(2, false), document(1, true)];
        let index = Index::build(&documents);
        assert_eq!(vec![1, 3], index.ids());
        assert_eq!(2, index.len());
    }

    #[test]
    fn test_neighbours() {
        let documents = documents(&[1, 59, 140]);
        let index = Index::build(&documents);
        let ids = |(prev, next): (Option<&Document>, Option<&Document>)| {
            (prev.map(|d| d.id), next.map(|d| d.id))
        };
        assert_eq!((None, Some(59)), ids(index.neighbours(1)));
        assert_eq!((Some(1), Some(140)), ids(index.neighbours(59)));
        assert_eq!((Some(59), None), ids(index.neighbours(140)));
        assert_eq!((None, None), ids(index.neighbours(2)));
    }

    #[test]
    fn test_manifest_round_trip() -> Result<()> {
        let linker = Linker::new(Url::parse("https://abseil.io/").unwrap());
        let documents = documents(&[229, 1, 173, 59, 140]);
        let index = Index::build(&documents);

        let mut buf = Vec::new();
        index.to_manifest(&linker).write_to(&mut buf)?;
        let manifest = Manifest::read_from(&buf[..])?;

        assert_eq!(index.ids(), manifest.ids());
        assert_eq!("tips/59", manifest.tips[1].permalink);
        assert_eq!("https://abseil.io/tips/59/", manifest.tips[1].url);
        Ok(())
    }

    #[test]
    fn test_manifest_out_of_order() {
        let yaml = "tips:\n  - id: 2\n    title: b\n    permalink: tips/2\n    url: x\n  - id: 1\n    title: a\n    permalink: tips/1\n    url: y\n";
        assert!(matches!(
            Manifest::read_from(yaml.as_bytes()),
            Err(Error::OutOfOrder { previous: 2, next: 1 })
        ));
    }
}
