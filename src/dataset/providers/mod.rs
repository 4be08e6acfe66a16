// src/dataset/providers/mod.rs
//! HTML extraction for the two municipal listing pages.

use reqwest::Url;
use scraper::{ElementRef, Selector};

/// Static selector; the literals are fixed so a parse failure is a typo.
macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: once_cell::sync::Lazy<scraper::Selector> =
            once_cell::sync::Lazy::new(|| {
                scraper::Selector::parse($css).expect(concat!("valid selector: ", $css))
            });
    };
}
pub(crate) use selector;

pub mod programs;
pub mod spaces;

/// Text of an element with each text node trimmed and joined.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    el.text().map(str::trim).collect::<String>()
}

/// Trimmed text of the first match under `el`, if any and non-empty.
pub(crate) fn first_text(el: ElementRef<'_>, sel: &Selector) -> Option<String> {
    el.select(sel)
        .next()
        .map(text_of)
        .filter(|s| !s.is_empty())
}

/// Absolute URL for an `href`, resolved against the site base.
pub(crate) fn absolute(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href == "#" {
        return None;
    }
    base.join(href).ok().map(|u| u.to_string())
}
