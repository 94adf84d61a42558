use crate::document::Document;
use crate::index::{Error as ManifestError, Index};
use crate::markdown;
use crate::url::Linker;
use gtmpl::{Template, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use url::Url;

/// The file name of the index page, relative to the output directory.
pub const INDEX_FILE: &str = "index.html";

/// The file name of the index manifest, relative to the output directory.
pub const MANIFEST_FILE: &str = "index.yaml";

/// Responsible for templating and writing HTML pages to disk from an
/// [`Index`] of tips.
pub struct Writer<'a> {
    /// The template for tip pages.
    pub tip_template: &'a Template,

    /// The template for the index page.
    pub index_template: &'a Template,

    /// Maps tip ids to page URLs. The index page lives at the site root.
    pub linker: &'a Linker,

    /// The directory in which all output files are written. The page for tip
    /// `N` is written to `{output_directory}/tips/N/index.html`.
    pub output_directory: &'a Path,

    /// The site title. This is made available to both tip and index
    /// templates.
    pub title: &'a str,

    /// The URL for the site's home page. This is made available to both tip
    /// and index templates, typically as the destination for the site-header
    /// link.
    pub home_page: &'a Url,

    /// The URL for the static assets. This is made available to both tip and
    /// index templates, typically for the theme's stylesheet.
    pub static_url: &'a Url,
}

impl Writer<'_> {
    /// Takes a single [`Page`], templates it, and writes it to disk.
    fn write_page(&self, page: &Page) -> Result<()> {
        let mut value = page.to_value();
        if let Value::Object(obj) = &mut value {
            obj.insert("title".to_owned(), Value::String(self.title.to_owned()));
            obj.insert(
                "home_page".to_owned(),
                Value::String(self.home_page.to_string()),
            );
            obj.insert(
                "static_url".to_owned(),
                Value::String(self.static_url.to_string()),
            );
        }
        page.template.execute(
            &mut File::create(&page.file_path)?,
            &gtmpl::Context::from(value)?,
        )?;
        debug!(path = %page.file_path.display(), "wrote page");
        Ok(())
    }

    /// Writes a page for every tip in `index`, the index page itself, and the
    /// index manifest. Returns the number of pages written.
    pub fn write_index(&self, index: &Index) -> Result<usize> {
        let targets: HashMap<u32, Url> = index
            .entries()
            .iter()
            .map(|d| (d.id, self.linker.url_for(d.id)))
            .collect();

        std::fs::create_dir_all(self.output_directory)?;
        let mut seen_dirs: HashSet<PathBuf> = HashSet::new();
        let mut written = 0;
        for page in std::iter::once(self.index_page(index))
            .chain(self.tip_pages(index, &targets))
        {
            if let Some(dir) = page.file_path.parent() {
                if seen_dirs.insert(dir.to_owned()) {
                    std::fs::create_dir_all(dir)?;
                }
            }
            self.write_page(&page)?;
            written += 1;
        }

        index
            .to_manifest(self.linker)
            .write_to(File::create(self.output_directory.join(MANIFEST_FILE))?)?;
        Ok(written)
    }

    /// The path the page for `document` is written to.
    pub fn tip_path(&self, document: &Document) -> PathBuf {
        self.output_directory
            .join(&document.permalink)
            .join(INDEX_FILE)
    }

    fn index_page<'t>(&'t self, index: &Index) -> Page<'t> {
        Page {
            item: Value::Array(
                index
                    .entries()
                    .iter()
                    .map(|d| summarize(d, self.linker))
                    .collect(),
            ),
            file_path: self.output_directory.join(INDEX_FILE),
            prev: None,
            next: None,
            template: self.index_template,
        }
    }

    fn tip_pages<'t>(
        &'t self,
        index: &Index,
        targets: &HashMap<u32, Url>,
    ) -> Vec<Page<'t>> {
        index
            .entries()
            .iter()
            .map(|d| {
                let (prev, next) = index.neighbours(d.id);
                let mut body = String::new();
                markdown::to_html(
                    &mut body,
                    &d.body,
                    d.id,
                    self.linker,
                    targets,
                );
                Page {
                    item: tip_value(d, self.linker, body),
                    file_path: self.tip_path(d),
                    prev: prev.map(|p| self.linker.url_for(p.id)),
                    next: next.map(|n| self.linker.url_for(n.id)),
                    template: self.tip_template,
                }
            })
            .collect()
    }
}

/// An object representing an output HTML file. A [`Page`] can be converted to a
/// [`Value`] and thus rendered in a template via [`Page::to_value`].
struct Page<'a> {
    /// The main item for the page.
    item: Value,

    /// The target location on disk for the output file.
    file_path: PathBuf,

    /// The URL for the previous page, if any.
    prev: Option<Url>,

    /// The URL for the next page, if any.
    next: Option<Url>,

    /// The template with which the page will be rendered.
    template: &'a Template,
}

impl Page<'_> {
    /// Converts a [`Page`] into a [`Value`]. The result is a [`Value::Object`]
    /// with fields `item`, `prev`, and `next` (see [`Page`] for descriptions).
    fn to_value(&self) -> Value {
        let option_to_value = |opt: &Option<Url>| match opt {
            Some(url) => Value::String(url.to_string()),
            None => Value::Nil,
        };

        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("item".to_owned(), self.item.clone());
        m.insert("prev".to_owned(), option_to_value(&self.prev));
        m.insert("next".to_owned(), option_to_value(&self.next));
        Value::Object(m)
    }
}

/// The fields shared by index entries and tip pages.
fn summary_map(d: &Document, linker: &Linker) -> HashMap<String, Value> {
    let mut m: HashMap<String, Value> = HashMap::new();
    m.insert("id".to_owned(), Value::String(d.id.to_string()));
    m.insert("title".to_owned(), Value::String(d.title.clone()));
    m.insert("permalink".to_owned(), Value::String(d.permalink.clone()));
    m.insert("order".to_owned(), Value::String(d.order.clone()));
    m.insert("url".to_owned(), Value::String(linker.url_for(d.id).to_string()));
    m
}

fn summarize(d: &Document, linker: &Linker) -> Value {
    Value::Object(summary_map(d, linker))
}

fn tip_value(d: &Document, linker: &Linker, body: String) -> Value {
    let mut m = summary_map(d, linker);
    m.insert("body".to_owned(), Value::String(body));
    Value::Object(m)
}

/// The result of a fallible page-writing operation.
type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template(String),

    /// An error writing the index manifest.
    Manifest(ManifestError),

    /// An error writing the output files.
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<String> for Error {
    /// Converts a template error message ([`String`]) into an [`Error`]. This
    /// allows us to use the `?` operator for fallible template operations.
    fn from(err: String) -> Error {
        Error::Template(err)
    }
}

impl From<ManifestError> for Error {
    fn from(err: ManifestError) -> Error {
        Error::Manifest(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template(err) => err.fmt(f),
            Error::Manifest(err) => write!(f, "writing manifest: {}", err),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template(_) => None,
            Error::Manifest(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::document::{permalink_for, zero_pad, ORDER_WIDTH};
    use crate::index::Manifest;

    fn document(id: u32, body: &str) -> Document {
        Document {
            id,
            title: format!("Tip of the Week #{}", id),
            permalink: permalink_for(id),
            order: zero_pad(id, ORDER_WIDTH),
            published: true,
            body: body.to_owned(),
            source_path: PathBuf::from(format!("{}.md", id)),
        }
    }

    fn template(text: &str) -> Template {
        let mut template = Template::default();
        template.parse(text).unwrap();
        template
    }

    #[test]
    fn test_write_index() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let linker = Linker::new(Url::parse("https://abseil.io/")?);
        let home_page = linker.index_url().clone();
        let static_url = linker.index_url().join("static/")?;
        let tip_template = template(
            "{{.title}}|{{.item.title}}|{{.prev}}|{{.next}}|{{.item.body}}",
        );
        let index_template =
            template("{{range .item}}{{.order}} {{.url}}\n{{end}}");
        let writer = Writer {
            tip_template: &tip_template,
            index_template: &index_template,
            linker: &linker,
            output_directory: dir.path(),
            title: "Tips",
            home_page: &home_page,
            static_url: &static_url,
        };

        let documents = vec![
            document(59, "See Tip #1."),
            document(1, "First."),
            document(140, "Last."),
        ];
        let index = Index::build(&documents);
        assert_eq!(4, writer.write_index(&index)?);

        let index_html = std::fs::read_to_string(dir.path().join(INDEX_FILE))?;
        assert_eq!(
            "001 https://abseil.io/tips/1/\n059 https://abseil.io/tips/59/\n140 https://abseil.io/tips/140/\n",
            index_html
        );

        let tip_html =
            std::fs::read_to_string(dir.path().join("tips/59/index.html"))?;
        assert!(tip_html.starts_with("Tips|Tip of the Week #59|https://abseil.io/tips/1/|https://abseil.io/tips/140/|"), "{}", tip_html);
        assert!(tip_html.contains("https://abseil.io/tips/1/"), "{}", tip_html);

        let manifest =
            Manifest::read_from(File::open(dir.path().join(MANIFEST_FILE))?)?;
        assert_eq!(vec![1, 59, 140], manifest.ids());
        Ok(())
    }
}
