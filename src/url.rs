//! Maps tip ids to page URLs and back. Link destinations found in tip bodies
//! are resolved the way a browser would resolve them from the page they
//! appear on, so `/tips/36`, `../36`, and `https://{site}/tips/36/` all name
//! tip 36.

use crate::document::{parse_permalink, permalink_for};
use url::{ParseError, Url};

/// Converts between tip ids and the URLs their pages are published at.
#[derive(Clone, Debug)]
pub struct Linker {
    site_root: Url,
}

impl Linker {
    /// Constructs a new `Linker`.
    ///
    /// # Arguments
    ///
    /// * `site_root` - the URL the output directory is served from. A missing
    ///   trailing slash is added, otherwise [`Url::join`] would treat the last
    ///   path segment as a file name and drop it.
    pub fn new(mut site_root: Url) -> Linker {
        if !site_root.path().ends_with('/') {
            let path = format!("{}/", site_root.path());
            site_root.set_path(&path);
        }
        Linker { site_root }
    }

    /// The URL of the site root, which is also where the index page lives.
    pub fn index_url(&self) -> &Url {
        &self.site_root
    }

    /// The URL of the page for tip `id`, e.g. `https://abseil.io/tips/36/`.
    pub fn url_for(&self, id: u32) -> Url {
        let mut url = self.site_root.clone();
        url.set_path(&format!("{}{}/", self.site_root.path(), permalink_for(id)));
        url
    }

    /// Returns the id of the tip that `href` points at when it is followed
    /// from the page of tip `from`, or `None` if it points anywhere else.
    /// Query strings and fragments are ignored.
    pub fn tip_id(&self, href: &str, from: u32) -> Option<u32> {
        self.tip_target(href, from).map(|(id, _)| id)
    }

    /// Like [`Linker::tip_id`], but also returns the absolute URL `href`
    /// resolves to, query and fragment included. Fragment-only destinations
    /// (`#section`) stay on the current page and never name a tip.
    pub fn tip_target(&self, href: &str, from: u32) -> Option<(u32, Url)> {
        if href.is_empty() || href.starts_with('#') {
            return None;
        }
        let absolute = match Url::parse(href) {
            Ok(absolute) => absolute,
            Err(ParseError::RelativeUrlWithoutBase) => {
                self.url_for(from).join(href).ok()?
            }
            Err(_) => return None,
        };
        if absolute.origin() != self.site_root.origin() {
            return None;
        }
        let relative = absolute.path().strip_prefix(self.site_root.path())?;
        let id = parse_permalink(relative.strip_suffix('/').unwrap_or(relative))?;
        Some((id, absolute))
    }
}
