//! Content extraction: title, description and images from a parsed page.
//!
//! Page markup is not stable, so each of the three fields is found by an
//! ordered chain of increasingly permissive stages. Stages are plain
//! functions over the parsed page, evaluated lazily by [`first_match`]; the first
//! one that yields something non-empty wins and later stages never run.
//!
//! ```text
//! title        heading signature ─▶ first <h1> ─▶ <title> minus site suffix
//! description  after anchor ─▶ anchor container ─▶ any paragraph ─▶ main text
//! images       after anchor ─▶ anchor's nearest <div> ─▶ whole page
//! ```
//!
//! The *anchor* is the element matched by the heading signature. Stages that
//! depend on it yield nothing when the signature is absent.

use super::dom;
use crate::content::ContentRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Tuning knobs for the heuristics. The defaults target LearnableMeta pages.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// CSS selector for the element that marks the main heading.
    pub heading_selector: String,
    /// Suffixes removed from the document `<title>`. Only these are stripped:
    /// `Foo — Site` becomes `Foo` once `" — Site"` is listed here.
    pub title_suffixes: Vec<String>,
    /// A fallback paragraph must be strictly longer than this (in chars).
    pub min_paragraph_chars: usize,
    /// Fallback paragraphs containing any of these are skipped.
    pub excluded_substrings: Vec<String>,
    /// Main-region text is cut to this many chars, then `...` is appended.
    pub fallback_max_chars: usize,
    /// Both declared image dimensions must be strictly greater than this.
    pub min_image_dimension: u32,
    /// Image URLs containing any of these (case-insensitive) are decorative.
    pub decorative_markers: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            heading_selector: "h3.text-2xl.font-bold.mb-4.text-gray-900.text-center".into(),
            title_suffixes: vec![
                " - Learnable Meta".into(),
                " — Learnable Meta".into(),
                " | Learnable Meta".into(),
            ],
            min_paragraph_chars: 30,
            excluded_substrings: vec!["Check out".into(), "http".into()],
            fallback_max_chars: 300,
            min_image_dimension: 100,
            decorative_markers: vec!["avatar".into(), "logo".into(), "favicon".into()],
        }
    }
}

/// One named step of a fallback chain.
pub type Stage<'s, C, T> = (&'static str, &'s dyn Fn(&C) -> Option<T>);

/// Run `stages` in order and return the first result, with the stage name.
///
/// Stages after the winning one are not invoked.
pub fn first_match<C, T>(ctx: &C, stages: &[Stage<'_, C, T>]) -> Option<(&'static str, T)> {
    stages
        .iter()
        .find_map(|(name, stage)| stage(ctx).map(|value| (*name, value)))
}

/// Everything a stage may look at.
struct Page<'a> {
    doc: &'a Html,
    anchor: Option<ElementRef<'a>>,
    base: Option<Url>,
    options: &'a ExtractOptions,
}

impl<'a> Page<'a> {
    fn new(doc: &'a Html, source_url: &str, options: &'a ExtractOptions) -> Self {
        let anchor = match Selector::parse(&options.heading_selector) {
            Ok(sel) => doc.select(&sel).next(),
            Err(e) => {
                warn!("Invalid heading selector '{}': {}", options.heading_selector, e);
                None
            }
        };
        Self {
            doc,
            anchor,
            base: Url::parse(source_url).ok(),
            options,
        }
    }
}

/// Extract content with the default options.
pub fn extract(document: &Html, source_url: &str) -> ContentRecord {
    extract_with_options(document, source_url, &ExtractOptions::default())
}

/// Parse `html` and extract content with the default options.
pub fn extract_html(html: &str, source_url: &str) -> ContentRecord {
    extract(&Html::parse_document(html), source_url)
}

/// Extract content. Never fails: missing fields come back empty.
pub fn extract_with_options(document: &Html, source_url: &str, options: &ExtractOptions) -> ContentRecord {
    let page = Page::new(document, source_url, options);

    let title_stages: [Stage<'_, Page<'_>, String>; 3] = [
        ("heading signature", &title_from_anchor),
        ("first h1", &title_from_h1),
        ("document title", &title_from_document),
    ];
    let description_stages: [Stage<'_, Page<'_>, String>; 4] = [
        ("paragraph after heading", &description_after_anchor),
        ("heading container", &description_in_anchor_parent),
        ("any paragraph", &description_any_paragraph),
        ("main region text", &description_from_main_region),
    ];
    let image_stages: [Stage<'_, Page<'_>, Vec<String>>; 3] = [
        ("siblings after heading", &images_after_anchor),
        ("heading container", &images_in_anchor_container),
        ("whole page", &images_anywhere),
    ];

    let title = first_match(&page, &title_stages)
        .map(|(stage, t)| {
            debug!("Title from {}: {}", stage, t);
            t
        })
        .unwrap_or_default();

    let description = first_match(&page, &description_stages)
        .map(|(stage, d)| {
            debug!("Description from {} ({} chars)", stage, d.chars().count());
            d
        })
        .unwrap_or_default();

    let images = first_match(&page, &image_stages)
        .map(|(stage, imgs)| {
            debug!("{} image(s) from {}", imgs.len(), stage);
            imgs
        })
        .unwrap_or_default();

    ContentRecord {
        title,
        description,
        images,
        source_url: source_url.to_string(),
    }
}

// ── Title ────────────────────────────────────────────────────────────────────

fn title_from_anchor(page: &Page<'_>) -> Option<String> {
    page.anchor.and_then(|a| non_empty(dom::text_content(a).trim()))
}

static SEL_H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").unwrap());
static SEL_TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());

fn title_from_h1(page: &Page<'_>) -> Option<String> {
    page.doc
        .select(&SEL_H1)
        .next()
        .and_then(|h1| non_empty(dom::text_content(h1).trim()))
}

fn title_from_document(page: &Page<'_>) -> Option<String> {
    let raw = page.doc.select(&SEL_TITLE).next().map(dom::text_content)?;
    let mut title = dom::collapse_whitespace(&raw);
    for suffix in &page.options.title_suffixes {
        if let Some(stripped) = title.strip_suffix(suffix.as_str()) {
            title = stripped.to_string();
            break;
        }
    }
    non_empty(title.trim())
}

// ── Description ──────────────────────────────────────────────────────────────

/// First `<p>` among the anchor's following siblings, or the first `<p>`
/// nested in one. The walk stops at the first sibling that yields a
/// paragraph, even if its text is empty.
fn description_after_anchor(page: &Page<'_>) -> Option<String> {
    let anchor = page.anchor?;
    let paragraph = dom::following_siblings(anchor).find_map(|sib| {
        if dom::is_tag(sib, "p") {
            Some(sib)
        } else {
            dom::descendants_where(sib, |d| dom::is_tag(d, "p")).next()
        }
    })?;
    non_empty(dom::text_content(paragraph).trim())
}

fn description_in_anchor_parent(page: &Page<'_>) -> Option<String> {
    let parent = dom::parent_element(page.anchor?)?;
    first_substantive_paragraph(parent, page.options)
}

fn description_any_paragraph(page: &Page<'_>) -> Option<String> {
    first_substantive_paragraph(page.doc.root_element(), page.options)
}

static SEL_MAIN: Lazy<Selector> = Lazy::new(|| Selector::parse("main").unwrap());
static SEL_CONTENT: Lazy<Selector> = Lazy::new(|| Selector::parse(".content").unwrap());
static SEL_BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

const STRIPPED_TAGS: &[&str] = &[
    "nav", "header", "footer", "script", "style", "iframe", "button", "aside", "h1", "h2", "h3",
    "h4", "h5", "h6",
];

fn description_from_main_region(page: &Page<'_>) -> Option<String> {
    let region = [&*SEL_MAIN, &*SEL_CONTENT, &*SEL_BODY]
        .iter()
        .find_map(|sel| page.doc.select(sel).next())
        .unwrap_or_else(|| page.doc.root_element());

    let text = dom::collapse_whitespace(&dom::text_excluding(region, &is_page_chrome));
    non_empty(&truncate_chars(&text, page.options.fallback_max_chars))
}

fn is_page_chrome(el: ElementRef<'_>) -> bool {
    STRIPPED_TAGS.iter().any(|t| dom::is_tag(el, t)) || dom::has_class(el, "sidebar")
}

fn first_substantive_paragraph(scope: ElementRef<'_>, options: &ExtractOptions) -> Option<String> {
    dom::descendants_where(scope, |d| dom::is_tag(d, "p"))
        .map(|p| dom::text_content(p).trim().to_string())
        .find(|text| is_substantive(text, options))
}

fn is_substantive(text: &str, options: &ExtractOptions) -> bool {
    text.chars().count() > options.min_paragraph_chars
        && !options
            .excluded_substrings
            .iter()
            .any(|s| text.contains(s.as_str()))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

// ── Images ───────────────────────────────────────────────────────────────────

fn images_after_anchor(page: &Page<'_>) -> Option<Vec<String>> {
    let anchor = page.anchor?;
    let urls = dom::following_siblings(anchor)
        .flat_map(|sib| dom::self_and_descendants_where(sib, |d| dom::is_tag(d, "img")))
        .filter_map(|img| accepted_image(page, img))
        .collect();
    non_empty_vec(urls)
}

fn images_in_anchor_container(page: &Page<'_>) -> Option<Vec<String>> {
    let anchor = page.anchor?;
    let container = dom::closest(anchor, |e| dom::is_tag(e, "div")).or_else(|| dom::parent_element(anchor))?;
    let urls = dom::descendants_where(container, |d| dom::is_tag(d, "img"))
        .filter_map(|img| accepted_image(page, img))
        .collect();
    non_empty_vec(urls)
}

fn images_anywhere(page: &Page<'_>) -> Option<Vec<String>> {
    let urls = dom::self_and_descendants_where(page.doc.root_element(), |d| dom::is_tag(d, "img"))
        .filter_map(|img| accepted_image(page, img))
        .collect();
    non_empty_vec(urls)
}

/// Absolute URL of `img` if it passes the size and decoration filters.
fn accepted_image(page: &Page<'_>, img: ElementRef<'_>) -> Option<String> {
    let src = img.value().attr("src").map(str::trim).filter(|s| !s.is_empty())?;
    let url = resolve_url(page.base.as_ref(), src);

    let lower = url.to_ascii_lowercase();
    if page
        .options
        .decorative_markers
        .iter()
        .any(|m| lower.contains(&m.to_ascii_lowercase()))
    {
        return None;
    }

    let min = page.options.min_image_dimension;
    let (w, h) = declared_size(img);
    if w <= min || h <= min {
        return None;
    }
    Some(url)
}

/// Resolve `src` against the page URL. `data:` URLs and unresolvable
/// values are returned as-is.
pub fn resolve_url(base: Option<&Url>, src: &str) -> String {
    if src.starts_with("data:") {
        return src.to_string();
    }
    match Url::parse(src) {
        Ok(abs) => abs.to_string(),
        Err(_) => base
            .and_then(|b| b.join(src).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| src.to_string()),
    }
}

static RE_DIMENSION_ATTR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(?:px)?\s*$").unwrap());
static RE_STYLE_WIDTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|;)\s*width\s*:\s*(\d+(?:\.\d+)?)px").unwrap());
static RE_STYLE_HEIGHT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|;)\s*height\s*:\s*(\d+(?:\.\d+)?)px").unwrap());

/// Declared `(width, height)` in pixels; 0 where unknown.
pub fn declared_size(img: ElementRef<'_>) -> (u32, u32) {
    let el = img.value();
    let style = el.attr("style").unwrap_or("");
    let dim = |attr: &str, style_re: &Regex| {
        el.attr(attr)
            .and_then(|v| capture_px(&RE_DIMENSION_ATTR, v))
            .or_else(|| capture_px(style_re, style))
            .unwrap_or(0)
    };
    (dim("width", &RE_STYLE_WIDTH), dim("height", &RE_STYLE_HEIGHT))
}

fn capture_px(re: &Regex, text: &str) -> Option<u32> {
    let caps = re.captures(text)?;
    caps[1].parse::<f64>().ok().map(|v| v as u32)
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

fn non_empty_vec(v: Vec<String>) -> Option<Vec<String>> {
    (!v.is_empty()).then_some(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const URL: &str = "https://learnablemeta.com/maps/42";
    const HEADING: &str = r#"<h3 class="text-2xl font-bold mb-4 text-gray-900 text-center">"#;
    const LONG: &str = "This paragraph is comfortably longer than thirty characters.";

    fn page(body: &str) -> String {
        format!("<html><head><title>Fallback - Learnable Meta</title></head><body>{body}</body></html>")
    }

    // ── Chains ───────────────────────────────────────────────────────────

    #[test]
    fn later_stages_are_not_invoked_after_a_match() {
        let calls = [Cell::new(0), Cell::new(0), Cell::new(0), Cell::new(0)];
        let s0 = |_: &()| {
            calls[0].set(calls[0].get() + 1);
            None
        };
        let s1 = |_: &()| {
            calls[1].set(calls[1].get() + 1);
            Some("second".to_string())
        };
        let s2 = |_: &()| {
            calls[2].set(calls[2].get() + 1);
            Some("third".to_string())
        };
        let s3 = |_: &()| {
            calls[3].set(calls[3].get() + 1);
            Some("fourth".to_string())
        };
        let stages: [Stage<'_, (), String>; 4] = [("a", &s0), ("b", &s1), ("c", &s2), ("d", &s3)];

        let (name, value) = first_match(&(), &stages).unwrap();
        assert_eq!((name, value.as_str()), ("b", "second"));
        let counts: Vec<_> = calls.iter().map(Cell::get).collect();
        assert_eq!(counts, vec![1, 1, 0, 0]);
    }

    #[test]
    fn exhausted_chain_is_none() {
        let none = |_: &()| None::<String>;
        let stages: [Stage<'_, (), String>; 2] = [("a", &none), ("b", &none)];
        assert!(first_match(&(), &stages).is_none());
    }

    // ── Title ────────────────────────────────────────────────────────────

    #[test]
    fn title_prefers_heading_signature() {
        let html = page(&format!("<h1>Generic</h1>{HEADING} Topic X </h3>"));
        assert_eq!(extract_html(&html, URL).title, "Topic X");
    }

    #[test]
    fn title_falls_back_to_h1() {
        let html = page("<h3>Plain h3</h3><h1> Generic Heading </h1>");
        assert_eq!(extract_html(&html, URL).title, "Generic Heading");
    }

    #[test]
    fn title_falls_back_to_cleaned_document_title() {
        let html = page("<p>nothing here</p>");
        assert_eq!(extract_html(&html, URL).title, "Fallback");
    }

    #[test]
    fn custom_site_suffix_is_stripped() {
        let doc = Html::parse_document("<html><head><title>Foo — Site</title></head><body></body></html>");
        let options = ExtractOptions {
            title_suffixes: vec![" — Site".into()],
            ..Default::default()
        };
        assert_eq!(extract_with_options(&doc, URL, &options).title, "Foo");
    }

    #[test]
    fn empty_h1_does_not_win() {
        let html = page("<h1>   </h1>");
        assert_eq!(extract_html(&html, URL).title, "Fallback");
    }

    // ── Description ──────────────────────────────────────────────────────

    #[test]
    fn description_takes_first_sibling_paragraph_even_if_short() {
        let html = page(&format!(
            "<div>{HEADING}Topic</h3><span>x</span><p>Short one.</p></div><p>{LONG}</p>"
        ));
        assert_eq!(extract_html(&html, URL).description, "Short one.");
    }

    #[test]
    fn description_finds_paragraph_nested_in_sibling() {
        let html = page(&format!(
            "<div>{HEADING}Topic</h3><div class=\"card\"><p> Nested text </p></div></div>"
        ));
        assert_eq!(extract_html(&html, URL).description, "Nested text");
    }

    #[test]
    fn description_uses_parent_container_when_no_sibling_paragraph() {
        let html = page(&format!(
            "<p>An earlier paragraph outside the heading container.</p>\
             <div><p>{LONG}</p>{HEADING}Topic</h3><span>no paragraph</span></div>"
        ));
        assert_eq!(extract_html(&html, URL).description, LONG);
    }

    #[test]
    fn parent_container_skips_excluded_and_short_paragraphs() {
        let html = page(&format!(
            "<p>An earlier paragraph outside the heading container.</p>\
             <section><p>Too short</p><p>Check out our shop, it has many items for sale.</p>\
             <p>{LONG}</p>{HEADING}Topic</h3></section>"
        ));
        assert_eq!(extract_html(&html, URL).description, LONG);
    }

    #[test]
    fn global_paragraph_filter_skips_urls_and_promotions() {
        let html = page(
            "<p>Check out the new course bundle for this region now!</p>\
             <p>See https://example.com/some/long/link/for/details</p>\
             <p>Bollards in this country are white with a red band.</p>",
        );
        assert_eq!(
            extract_html(&html, URL).description,
            "Bollards in this country are white with a red band."
        );
    }

    #[test]
    fn description_falls_back_to_stripped_main_text() {
        let html = page(
            "<nav>Menu</nav><main><h2>Heading</h2><div>Some   loose\n text</div> \
             <script>var x = 1;</script><button>Click</button> \
             <div class=\"sidebar\">ads</div> <span>here.</span></main><footer>foot</footer>",
        );
        assert_eq!(extract_html(&html, URL).description, "Some loose text here.");
    }

    #[test]
    fn main_text_fallback_is_truncated_with_ellipsis() {
        let words = "word ".repeat(100);
        let html = page(&format!("<main><div>{words}</div></main>"));
        let d = extract_html(&html, URL).description;
        assert_eq!(d.chars().count(), 303);
        assert!(d.ends_with("..."));
    }

    #[test]
    fn empty_document_yields_empty_description() {
        let rec = extract_html("<html><body></body></html>", URL);
        assert!(rec.description.is_empty());
        assert!(!rec.is_usable());
    }

    // ── Images ───────────────────────────────────────────────────────────

    #[test]
    fn images_after_heading_are_filtered() {
        let html = page(&format!(
            r#"<div>{HEADING}Topic</h3>
               <div><img src="/img/map.png" width="300" height="300"></div>
               <img src="/img/direct.jpg" width="200" height="150">
               <img src="/img/avatar.png" width="300" height="300">
               <img src="/img/site-logo.png" width="300" height="300">
               <img src="/img/small.png" width="100" height="300">
               <img src="/img/favicon.png" width="300" height="300">
            </div><img src="/img/elsewhere.png" width="500" height="500">"#
        ));
        assert_eq!(
            extract_html(&html, URL).images,
            vec![
                "https://learnablemeta.com/img/map.png".to_string(),
                "https://learnablemeta.com/img/direct.jpg".to_string(),
            ]
        );
    }

    #[test]
    fn images_fall_back_to_heading_container() {
        let html = page(&format!(
            r#"<div class="outer"><div class="card"><img src="https://cdn.example.com/before.png" width="400" height="400">{HEADING}Topic</h3></div></div>
               <img src="https://cdn.example.com/other.png" width="400" height="400">"#
        ));
        assert_eq!(
            extract_html(&html, URL).images,
            vec!["https://cdn.example.com/before.png".to_string()]
        );
    }

    #[test]
    fn images_fall_back_to_whole_page() {
        let html = page(
            r#"<img src="https://cdn.example.com/Logo.png" width="400" height="400">
               <img src="https://cdn.example.com/photo.png" style="width: 250px; height:180px">
               <img src="https://cdn.example.com/nosize.png">"#,
        );
        assert_eq!(
            extract_html(&html, URL).images,
            vec!["https://cdn.example.com/photo.png".to_string()]
        );
    }

    #[test]
    fn data_urls_pass_through() {
        let html = page(r#"<img src="data:image/png;base64,AAAA" width="120" height="120">"#);
        assert_eq!(extract_html(&html, URL).images, vec!["data:image/png;base64,AAAA".to_string()]);
    }

    #[test]
    fn dimension_parsing() {
        let doc = Html::parse_document(
            r#"<img id="a" width="300px" height=" 120 "><img id="b" width="50%" style="max-width:900px;height:200px">"#,
        );
        let sel = Selector::parse("img").unwrap();
        let imgs: Vec<_> = doc.select(&sel).collect();
        assert_eq!(declared_size(imgs[0]), (300, 120));
        assert_eq!(declared_size(imgs[1]), (0, 200));
    }

    // ── End to end ───────────────────────────────────────────────────────

    #[test]
    fn heading_paragraph_and_image() {
        let desc = "Fifty characters of description text, exactly ok..";
        assert_eq!(desc.chars().count(), 50);
        let html = page(&format!(
            r#"<div>{HEADING}Topic X</h3><p>{desc}</p><img src="https://cdn.example.com/x.png" width="300" height="300"></div>"#
        ));
        let rec = extract_html(&html, URL);
        assert_eq!(rec.title, "Topic X");
        assert_eq!(rec.description, desc);
        assert_eq!(rec.images, vec!["https://cdn.example.com/x.png".to_string()]);
        assert_eq!(rec.source_url, URL);
        assert!(rec.is_usable());
    }
}
