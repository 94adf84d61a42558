//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: loading the tips
//! ([`crate::loader`]), resolving their cross-references ([`crate::xref`]),
//! indexing them ([`crate::index`]), rendering tip and index pages
//! ([`crate::write`]), and copying the theme's static assets into the output
//! directory. [`check_site`] runs only the load and resolve steps.

use crate::config::Config;
use crate::document::PERMALINK_PREFIX;
use crate::index::Index;
use crate::loader::{self, Collection, Error as LoadError, Rejected};
use crate::url::Linker;
use crate::write::{Error as WriteError, Writer};
use crate::xref::{self, Diagnostic};
use gtmpl::Template;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// What a build or check found. Fatal problems are returned as [`Error`]s
/// instead.
#[derive(Debug, Default)]
pub struct Report {
    /// The number of tips that loaded successfully.
    pub documents: usize,

    /// The number of pages written, including the index page. Always zero
    /// for [`check_site`].
    pub pages: usize,

    /// Sources skipped for malformed front-matter.
    pub rejected: Vec<Rejected>,

    /// Reference problems, ordered by source tip and then by position.
    pub diagnostics: Vec<Diagnostic>,
}

impl Report {
    /// True when nothing was rejected and every reference resolved to a
    /// published tip.
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.diagnostics.is_empty()
    }

    fn new(collection: Collection, diagnostics: Vec<Diagnostic>) -> Report {
        Report {
            documents: collection.documents.len(),
            pages: 0,
            rejected: collection.rejected,
            diagnostics,
        }
    }
}

/// Loads the tips and resolves their references without writing anything.
pub fn check_site(config: &Config) -> Result<Report> {
    let linker = Linker::new(config.site_root.clone());
    let collection = loader::load_directory(&config.source_directory)?;
    let resolution = xref::resolve(&collection, &linker);
    Ok(Report::new(collection, resolution.diagnostics))
}

/// Builds the site from a [`Config`] object into `output_directory`. This
/// calls into [`loader::load_directory`], [`xref::resolve`], [`Index::build`],
/// and [`Writer::write_index`] which do the heavy-lifting. This function also
/// copies the static assets from the theme directory to the output
/// directory.
pub fn build_site(config: &Config, output_directory: &Path) -> Result<Report> {
    // Generated directories are replaced wholesale, so they must never reach
    // into the inputs.
    let tips_output_directory = output_directory.join(PERMALINK_PREFIX);
    let static_output_directory = output_directory.join("static");
    for generated in &[&tips_output_directory, &static_output_directory] {
        for input in &[&config.source_directory, &config.theme_directory] {
            if overlaps(generated, input)? {
                return Err(Error::OutputOverlapsInput {
                    output: generated.to_path_buf(),
                    input: input.to_path_buf(),
                });
            }
        }
    }

    let linker = Linker::new(config.site_root.clone());

    // load and cross-check all tips before touching the output directory
    let collection = loader::load_directory(&config.source_directory)?;
    let resolution = xref::resolve(&collection, &linker);
    let index = Index::build(&collection.documents);

    // Parse the template files.
    let index_template = parse_template(config.index_template.iter())?;
    let tip_template = parse_template(config.tip_template.iter())?;

    // Only remove directories we generate; the output directory itself may
    // hold files we don't own.
    rmdir(&tips_output_directory)?;
    rmdir(&static_output_directory)?;

    let writer = Writer {
        tip_template: &tip_template,
        index_template: &index_template,
        linker: &linker,
        output_directory,
        title: &config.title,
        home_page: &config.home_page,
        static_url: &config.static_url,
    };
    let pages = writer.write_index(&index)?;

    if let Some(static_source_directory) = &config.static_source_directory {
        copy_dir(static_source_directory, &static_output_directory)?;
    }

    info!(
        tips = index.len(),
        pages,
        rejected = collection.rejected.len(),
        diagnostics = resolution.diagnostics.len(),
        "built site"
    );

    let mut report = Report::new(collection, resolution.diagnostics);
    report.pages = pages;
    Ok(report)
}

// True if either path is, or is inside, the other. Neither needs to exist.
fn overlaps(a: &Path, b: &Path) -> Result<bool> {
    let (a, b) = (canonicalize(a)?, canonicalize(b)?);
    Ok(a.starts_with(&b) || b.starts_with(&a))
}

// Canonicalizes the longest existing prefix of `path` and appends the rest.
fn canonicalize(path: &Path) -> Result<PathBuf> {
    match path.canonicalize() {
        Ok(path) => Ok(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            match (path.parent(), path.file_name()) {
                (Some(parent), Some(name)) if parent.as_os_str().is_empty() => {
                    Ok(canonicalize(Path::new("."))?.join(name))
                }
                (Some(parent), Some(name)) => Ok(canonicalize(parent)?.join(name)),
                _ => Err(Error::Io(e)),
            }
        }
        Err(e) => Err(Error::Io(e)),
    }
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &dst.join(entry.file_name()))?;
        } else {
            std::fs::copy(entry.path(), dst.join(entry.file_name()))?;
        }
    }

    Ok(())
}

// Concatenates the template files and parses the result as one template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(&template_file)
            .map_err(|e| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err: e,
            })?
            .read_to_string(&mut contents)?;
        contents.push(' ');
    }

    let mut template = Template::default();
    template.parse(&contents).map_err(Error::ParseTemplate)?;
    Ok(template)
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during loading, writing,
/// cleaning output directories, parsing template files, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned for fatal loading errors, e.g. duplicate tip ids.
    Load(LoadError),

    /// Returned for errors writing pages to disk as HTML files.
    Write(WriteError),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned instead of cleaning a generated output directory that is, or
    /// is nested with, the tip sources or the theme.
    OutputOverlapsInput { output: PathBuf, input: PathBuf },

    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Load(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "cleaning directory `{}`: {}", path.display(), err)
            }
            Error::OutputOverlapsInput { output, input } => write!(
                f,
                "refusing to replace `{}`: it overlaps `{}`",
                output.display(),
                input.display()
            ),
            Error::OpenTemplateFile { path, err } => {
                write!(f, "opening template file `{}`: {}", path.display(), err)
            }
            Error::ParseTemplate(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Load(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::OutputOverlapsInput { .. } => None,
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<LoadError> for Error {
    /// Converts [`LoadError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: LoadError) -> Error {
        Error::Load(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}
