//! Allow-list HTML sanitizer for rendered rich text
//!
//! The input is parsed with html5ever and re-serialized keeping only the
//! elements in [`ALLOWED_TAGS`] and the attributes in [`ALLOWED_ATTRIBUTES`].
//! Elements outside the list are unwrapped (their text survives), except
//! for [`DROPPED_TAGS`], whose content is removed entirely.

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::helpers::html_escape;

/// Elements kept in sanitized output
pub const ALLOWED_TAGS: &[&str] = &[
    "a", "br", "code", "em", "h1", "h2", "h3", "h4", "h5", "h6", "img", "li", "ol", "p", "pre",
    "span", "strong", "ul",
];

/// Attributes kept per element
pub const ALLOWED_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "target", "rel"]),
    ("img", &["src", "alt", "width", "height"]),
    ("p", &["class"]),
    ("span", &["class"]),
];

/// Schemes accepted in `href` and `src`; relative URLs are always accepted
pub const ALLOWED_URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Elements removed together with everything inside them
pub const DROPPED_TAGS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template", "title",
];

const VOID_TAGS: &[&str] = &["br", "img"];

/// Sanitize an HTML fragment
pub fn sanitize_html(html: &str) -> String {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);

    let mut output = String::with_capacity(html.len());
    match find_element(&dom.document, "body") {
        Some(body) => write_children(&body, &mut output),
        None => write_children(&dom.document, &mut output),
    }
    output
}

fn find_element(handle: &Handle, tag: &str) -> Option<Handle> {
    if let NodeData::Element { ref name, .. } = handle.data {
        if &*name.local == tag {
            return Some(handle.clone());
        }
    }
    handle
        .children
        .borrow()
        .iter()
        .find_map(|child| find_element(child, tag))
}

fn write_children(handle: &Handle, output: &mut String) {
    for child in handle.children.borrow().iter() {
        write_node(child, output);
    }
}

fn write_node(handle: &Handle, output: &mut String) {
    match &handle.data {
        NodeData::Text { contents } => {
            output.push_str(&html_escape(&contents.borrow()));
        }
        NodeData::Element { name, attrs, .. } => {
            let tag: &str = &name.local;

            if DROPPED_TAGS.contains(&tag) {
                return;
            }
            if !ALLOWED_TAGS.contains(&tag) {
                write_children(handle, output);
                return;
            }

            output.push('<');
            output.push_str(tag);
            for attr in attrs.borrow().iter() {
                let attr_name: &str = &attr.name.local;
                let value: &str = &attr.value;
                if is_allowed_attribute(tag, attr_name, value) {
                    output.push_str(&format!(r#" {}="{}""#, attr_name, html_escape(value)));
                }
            }

            if VOID_TAGS.contains(&tag) {
                output.push_str(" />");
                return;
            }

            output.push('>');
            write_children(handle, output);
            output.push_str("</");
            output.push_str(tag);
            output.push('>');
        }
        NodeData::Document => write_children(handle, output),
        // Comments, doctypes and processing instructions are dropped
        _ => {}
    }
}

fn is_allowed_attribute(tag: &str, attr: &str, value: &str) -> bool {
    let listed = ALLOWED_ATTRIBUTES
        .iter()
        .any(|(t, attrs)| *t == tag && attrs.contains(&attr));

    if !listed {
        return false;
    }

    match attr {
        "href" | "src" => is_allowed_url(value),
        _ => true,
    }
}

fn is_allowed_url(url: &str) -> bool {
    let url = url.trim();
    match url.find(':') {
        Some(colon) => {
            let scheme = &url[..colon];
            // A colon after a path separator is not a scheme
            if scheme.contains(['/', '?', '#']) {
                return true;
            }
            ALLOWED_URL_SCHEMES
                .iter()
                .any(|allowed| scheme.eq_ignore_ascii_case(allowed))
        }
        None => true,
    }
}
