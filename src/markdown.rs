use crate::url::Linker;
use crate::xref;
use pulldown_cmark::*;
use std::collections::HashMap;
use url::Url;

/// The markdown extensions tips are written with.
pub(crate) fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);
    options
}

/// Converts the markdown body of tip `source_id` to HTML, appending the
/// result to `out`.
///
/// * `linker` resolves link destinations relative to the tip's page.
/// * `targets` maps the ids of rendered tips to their page URLs. Mentions of
///   those tips become links, and links to them are rewritten to point at the
///   page. References to anything else are left as written.
pub fn to_html(
    out: &mut String,
    markdown: &str,
    source_id: u32,
    linker: &Linker,
    targets: &HashMap<u32, Url>,
) {
    let mut converter = EventConverter {
        linker,
        targets,
        source_id,
        code_depth: 0,
        link_depth: 0,
        pending: String::new(),
    };
    let mut events = Vec::new();
    for ev in Parser::new_ext(markdown, options()) {
        converter.push(ev, &mut events);
    }
    converter.flush(&mut events);
    html::push_html(out, events.into_iter());
}

struct EventConverter<'a> {
    linker: &'a Linker,
    targets: &'a HashMap<u32, Url>,
    source_id: u32,
    code_depth: usize,
    link_depth: usize,

    /// Adjacent text events and soft breaks are buffered here so a mention
    /// split across events or lines is still found.
    pending: String,
}

impl<'a> EventConverter<'a> {
    fn push<'b>(&mut self, ev: Event<'b>, out: &mut Vec<Event<'b>>) {
        if self.code_depth == 0 && self.link_depth == 0 {
            match &ev {
                Event::Text(text) => {
                    self.pending.push_str(text);
                    return;
                }
                // Wrapped lines may split a mention.
                Event::SoftBreak => {
                    self.pending.push('\n');
                    return;
                }
                _ => (),
            }
        }

        self.flush(out);
        match ev {
            Event::Start(tag) => {
                self.track(&tag, 1);
                out.push(Event::Start(self.convert_tag(tag)));
            }
            Event::End(tag) => {
                self.track(&tag, -1);
                out.push(Event::End(self.convert_tag(tag)));
            }
            _ => out.push(ev),
        }
    }

    fn track(&mut self, tag: &Tag, delta: isize) {
        let depth = match tag {
            Tag::CodeBlock(_) => &mut self.code_depth,
            Tag::Link(..) | Tag::Image(..) => &mut self.link_depth,
            _ => return,
        };
        *depth = (*depth as isize + delta).max(0) as usize;
    }

    fn convert_tag<'b>(&self, tag: Tag<'b>) -> Tag<'b> {
        match tag {
            // Tip headings need to be demoted twice to be subordinate to
            // both the site title (h1) and the tip title (h2).
            Tag::Heading(s) => Tag::Heading((s + 2).min(6)),

            // Links to other tips are pointed at the rendered page of the
            // target, whatever form the author wrote them in.
            Tag::Link(link_type, dest, title) => {
                match self
                    .linker
                    .tip_target(&dest, self.source_id)
                    .and_then(|(id, href)| Some((self.targets.get(&id)?, href)))
                {
                    Some((url, href)) => {
                        let mut url = url.clone();
                        url.set_query(href.query());
                        url.set_fragment(href.fragment());
                        Tag::Link(link_type, CowStr::from(String::from(url)), title)
                    }
                    None => Tag::Link(link_type, dest, title),
                }
            }
            _ => tag,
        }
    }

    /// Emits the buffered text, wrapping mentions of rendered tips in links.
    fn flush<'b>(&mut self, out: &mut Vec<Event<'b>>) {
        if self.pending.is_empty() {
            return;
        }
        let text = std::mem::take(&mut self.pending);

        let mut last = 0;
        for (span, id) in xref::mentions(&text) {
            let url = match self.targets.get(&id) {
                Some(url) => url,
                None => continue,
            };
            if span.start > last {
                out.push(Event::Text(CowStr::from(text[last..span.start].to_owned())));
            }
            let dest = CowStr::from(url.as_str().to_owned());
            out.push(Event::Start(Tag::Link(
                LinkType::Inline,
                dest.clone(),
                CowStr::from(""),
            )));
            out.push(Event::Text(CowStr::from(text[span.clone()].to_owned())));
            out.push(Event::End(Tag::Link(LinkType::Inline, dest, CowStr::from(""))));
            last = span.end;
        }
        if last < text.len() {
            out.push(Event::Text(CowStr::from(text[last..].to_owned())));
        }
    }
}
