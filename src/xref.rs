//! Finds references from one tip to another and checks that they land.
//!
//! A reference is either a *mention* in running text (`Tip #36`, `TotW #36`,
//! `Tip of the Week #36`, case-insensitive) or a markdown *link* whose
//! destination is a tip page (see [`Linker::tip_id`]). A link whose text also
//! mentions a tip is a single reference, to the link's destination. Nothing
//! inside code or raw HTML is a reference, and a tip never references itself.

use std::{fmt, ops::Range, sync::LazyLock};

use pulldown_cmark::{Event, Parser, Tag};
use regex::{Captures, Regex};
use tracing::warn;
use url::Url;

use crate::loader::Collection;
use crate::markdown;
use crate::url::Linker;

/// Matches a tip mention. The tip number is capture group 1.
const MENTION_PATTERN: &str =
    r"(?i:\b(?:tip(?:\s+of\s+the\s+week)?|totw)\s*#(\d+))\b";

static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(MENTION_PATTERN).expect("valid regex"));

// Inline links are tried first so that a mention inside a link's text
// doesn't shadow the link itself.
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"\[(?P<text>[^\]\n]*)\]\(\s*<?(?P<dest>[^\s<>()]+)>?(?:\s+"[^"]*")?\s*\)|{}"#,
        MENTION_PATTERN
    ))
    .expect("valid regex")
});

/// How a reference was written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceKind {
    Mention,
    Link,
}

/// An in-text citation of tip `target_id` from the body of tip `source_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CrossReference {
    pub source_id: u32,
    pub target_id: u32,

    /// Byte range of the reference within the source body.
    pub span: Range<usize>,

    /// The text at `span`.
    pub raw: String,

    pub kind: ReferenceKind,
}

/// A reference whose target exists, along with the URL of the target page.
#[derive(Clone, Debug)]
pub struct ResolvedReference {
    pub reference: CrossReference,
    pub url: Url,
}

/// A non-fatal problem with a reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// The target tip doesn't exist.
    BrokenReference(CrossReference),

    /// The target tip exists but isn't published, so its page won't be
    /// rendered. The reference still counts as resolved.
    UnpublishedReference(CrossReference),
}

impl Diagnostic {
    pub fn reference(&self) -> &CrossReference {
        match self {
            Diagnostic::BrokenReference(r) => r,
            Diagnostic::UnpublishedReference(r) => r,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let r = self.reference();
        match self {
            Diagnostic::BrokenReference(_) => write!(
                f,
                "tip {}: `{}` (byte {}) refers to tip {}, which doesn't exist",
                r.source_id, r.raw, r.span.start, r.target_id
            ),
            Diagnostic::UnpublishedReference(_) => write!(
                f,
                "tip {}: `{}` (byte {}) refers to tip {}, which isn't published",
                r.source_id, r.raw, r.span.start, r.target_id
            ),
        }
    }
}

/// Everything the resolver found. Both lists are ordered by source id, then
/// by position in the source body.
#[derive(Debug, Default)]
pub struct Resolution {
    pub resolved: Vec<ResolvedReference>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    /// The number of references that didn't resolve.
    pub fn broken(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::BrokenReference(_)))
            .count()
    }
}

/// Scans every document in `collection` and resolves its references against
/// the same collection.
pub fn resolve(collection: &Collection, linker: &Linker) -> Resolution {
    let mut documents: Vec<_> = collection.documents.iter().collect();
    documents.sort_by_key(|d| d.id);

    let mut resolution = Resolution::default();
    for document in documents {
        for reference in scan(&document.body, document.id, linker) {
            match collection.get(reference.target_id) {
                None => {
                    warn!(
                        source = reference.source_id,
                        target = reference.target_id,
                        raw = %reference.raw,
                        "broken tip reference"
                    );
                    resolution
                        .diagnostics
                        .push(Diagnostic::BrokenReference(reference));
                }
                Some(target) => {
                    if !target.published {
                        warn!(
                            source = reference.source_id,
                            target = reference.target_id,
                            "reference to unpublished tip"
                        );
                        resolution
                            .diagnostics
                            .push(Diagnostic::UnpublishedReference(reference.clone()));
                    }
                    resolution.resolved.push(ResolvedReference {
                        url: linker.url_for(target.id),
                        reference,
                    });
                }
            }
        }
    }
    resolution
}

/// Returns the references in `body` to tips other than `source_id`, in
/// order of appearance.
pub fn scan(body: &str, source_id: u32, linker: &Linker) -> Vec<CrossReference> {
    let skipped = skipped_ranges(body);
    let skip = |offset: usize| skipped.iter().any(|r| r.contains(&offset));

    let mut references = Vec::new();
    for caps in REFERENCE.captures_iter(body) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        if skip(whole.start()) {
            continue;
        }

        match (caps.name("dest"), caps.name("text")) {
            (Some(dest), Some(text)) => {
                match linker.tip_id(dest.as_str(), source_id) {
                    Some(target_id) => references.push(CrossReference {
                        source_id,
                        target_id,
                        span: whole.range(),
                        raw: whole.as_str().to_owned(),
                        kind: ReferenceKind::Link,
                    }),
                    // Not a tip link, but its text may still cite a tip.
                    None => references.extend(
                        mentions(text.as_str())
                            .filter(|(span, _)| !skip(text.start() + span.start))
                            .map(|(span, target_id)| CrossReference {
                                source_id,
                                target_id,
                                raw: text.as_str()[span.clone()].to_owned(),
                                span: text.start() + span.start
                                    ..text.start() + span.end,
                                kind: ReferenceKind::Mention,
                            }),
                    ),
                }
            }
            _ => {
                if let Some(target_id) = mention_target(&caps) {
                    references.push(CrossReference {
                        source_id,
                        target_id,
                        span: whole.range(),
                        raw: whole.as_str().to_owned(),
                        kind: ReferenceKind::Mention,
                    });
                }
            }
        }
    }
    references.retain(|r| r.target_id != source_id);
    references
}

/// Returns the span and tip number of every mention in `text`. Numbers too
/// large for a tip id are not mentions.
pub(crate) fn mentions(text: &str) -> impl Iterator<Item = (Range<usize>, u32)> + '_ {
    MENTION.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        Some((whole.range(), mention_target(&caps)?))
    })
}

fn mention_target(caps: &Captures) -> Option<u32> {
    // The mention's number is the last group in both patterns.
    caps.iter()
        .skip(1)
        .flatten()
        .last()?
        .as_str()
        .parse()
        .ok()
}

/// Byte ranges of code blocks, code spans, and raw HTML in `body`. None of
/// them is rendered as running text.
fn skipped_ranges(body: &str) -> Vec<Range<usize>> {
    Parser::new_ext(body, markdown::options())
        .into_offset_iter()
        .filter_map(|(event, range)| match event {
            Event::Start(Tag::CodeBlock(_)) | Event::Code(_) | Event::Html(_) => Some(range),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::loader::{load_sources, Result, Source};

    fn linker() -> Linker {
        Linker::new(Url::parse("https://abseil.io/").unwrap())
    }

    fn tip(id: u32, published: bool, body: &str) -> Source {
        Source::new(
            format!("{}.md", id),
            format!(
                "---\ntitle: Tip {id}\npermalink: tips/{id}\norder: \"{id:03}\"\npublished: {published}\n---\n{body}",
                id = id,
                published = published,
                body = body,
            ),
        )
    }

    fn targets(body: &str) -> Vec<(u32, ReferenceKind)> {
        scan(body, 1, &linker())
            .into_iter()
            .map(|r| (r.target_id, r.kind))
            .collect()
    }

    #[test]
    fn test_scan_mentions() {
        use ReferenceKind::Mention;
        assert_eq!(
            vec![(36, Mention), (3, Mention), (59, Mention), (140, Mention)],
            targets("See Tip #36, TotW #3, tip of the week #59, and TIP #140.")
        );
        assert!(targets("#include <string> and Tips #3 and Tip #36th").is_empty());
    }

    #[test]
    fn test_scan_spans() {
        let body = "As Tip #36 said.";
        let references = scan(body, 7, &linker());
        assert_eq!(1, references.len());
        assert_eq!(7, references[0].source_id);
        assert_eq!(3..10, references[0].span);
        assert_eq!("Tip #36", references[0].raw);
        assert_eq!("Tip #36", &body[references[0].span.clone()]);
    }

    #[test]
    fn test_scan_links() {
        use ReferenceKind::{Link, Mention};
        assert_eq!(vec![(3, Link)], targets("See [Tip #36](/tips/3)."));
        assert_eq!(vec![(3, Link)], targets("See [here](../3 \"three\")."));
        assert_eq!(
            vec![(36, Mention)],
            targets("See [Tip #36](https://example.org/elsewhere).")
        );
        assert!(targets("[guide](/docs/cpp/guides/strings)").is_empty());
    }

    #[test]
    fn test_scan_skips_code() {
        let body = "Tip #1\n\n```c++\n// Tip #2\n```\n\n    Tip #3\n\nand `Tip #4` then Tip #5\n";
        assert_eq!(
            vec![1, 5],
            targets(body).into_iter().map(|(id, _)| id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_scan_skips_raw_html() {
        let body = "<!-- Tip #999 -->\n\nSee Tip #5 and <span>Tip #6</span>.\n\n<div>\nTip #7\n</div>\n";
        assert_eq!(
            vec![5, 6],
            targets(body).into_iter().map(|(id, _)| id).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_scan_skips_self_and_in_page_links() {
        assert!(targets("As Tip #1 says, see [below](#later) and [top](/tips/1).").is_empty());
        assert_eq!(
            vec![(36, ReferenceKind::Link)],
            targets("[details](/tips/36#the-details)")
        );
    }

    #[test]
    fn test_resolve_broken_reference() -> Result<()> {
        let collection = load_sources(vec![
            tip(1, true, "Nothing to see."),
            tip(2, true, "See Tip #1 and Tip #999."),
        ])?;
        let resolution = resolve(&collection, &linker());

        assert_eq!(1, resolution.broken());
        match &resolution.diagnostics[..] {
            [Diagnostic::BrokenReference(r)] => {
                assert_eq!(2, r.source_id);
                assert_eq!(999, r.target_id);
                assert_eq!("Tip #999", r.raw);
            }
            other => panic!("unexpected diagnostics: {:?}", other),
        }

        assert_eq!(1, resolution.resolved.len());
        assert_eq!(1, resolution.resolved[0].reference.target_id);
        assert_eq!(
            "https://abseil.io/tips/1/",
            resolution.resolved[0].url.as_str()
        );
        Ok(())
    }

    #[test]
    fn test_resolve_orders_diagnostics() -> Result<()> {
        let collection = load_sources(vec![
            tip(9, true, "Tip #900 then Tip #800"),
            tip(4, true, "Tip #700 then [x](/tips/600)"),
        ])?;
        let diagnostics: Vec<(u32, u32)> = resolve(&collection, &linker())
            .diagnostics
            .iter()
            .map(|d| (d.reference().source_id, d.reference().target_id))
            .collect();
        assert_eq!(vec![(4, 700), (4, 600), (9, 900), (9, 800)], diagnostics);
        Ok(())
    }

    #[test]
    fn test_resolve_unpublished() -> Result<()> {
        let collection = load_sources(vec![
            tip(1, true, "See Tip #2."),
            tip(2, false, "Draft. Tip #2 continues [below](#later)."),
        ])?;
        let resolution = resolve(&collection, &linker());
        assert_eq!(0, resolution.broken());
        assert_eq!(1, resolution.resolved.len());
        assert!(matches!(
            &resolution.diagnostics[..],
            [Diagnostic::UnpublishedReference(r)] if r.target_id == 2
        ));
        Ok(())
    }
}
