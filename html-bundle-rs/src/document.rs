//! Mutable HTML document.
//!
//! The source text is tokenized with `lol_html`, and every element is recorded
//! in an arena of records addressed by [`NodeId`], in document order. Edits
//! only touch a record. Serialization streams the original source through the
//! rewriter a second time and applies the recorded edits to the matching
//! elements, so everything that was not edited comes out byte for byte as it
//! went in. That includes the DOCTYPE, comments, whitespace, and the raw text
//! of `<script>` and `<style>`.

use std::cell::RefCell;

use lol_html::html_content::{ContentType, Element as HtmlElement};
use lol_html::{element, rewrite_str, text, HandlerResult, RewriteStrSettings};

use crate::error::{Error, Result};

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Index of an element in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct Element {
    /// Lowercase tag name.
    name: String,
    attributes: Vec<(String, String)>,
    /// Attributes as parsed, compared against when serializing.
    parsed_attributes: Vec<(String, String)>,
    /// Raw text of a `<script>` or `<style>` element.
    text: String,
    text_replaced: bool,
}

impl Element {
    fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn is_raw_text(&self) -> bool {
        RAW_TEXT_ELEMENTS.iter().any(|name| self.is(name))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))
    }

    /// Replays the recorded edits onto the element as the rewriter streams it.
    fn apply(&self, el: &mut HtmlElement<'_, '_>) -> HandlerResult {
        for (key, _) in &self.parsed_attributes {
            if self.position(key).is_none() {
                el.remove_attribute(key);
            }
        }
        for (key, value) in &self.attributes {
            let unchanged = self
                .parsed_attributes
                .iter()
                .any(|(k, v)| k.eq_ignore_ascii_case(key) && v == value);
            if !unchanged {
                el.set_attribute(key, value)?;
            }
        }
        if self.text_replaced {
            el.set_inner_content(&self.text, ContentType::Html);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    source: String,
    elements: Vec<Element>,
}

impl Document {
    pub fn parse(html: &str) -> Result<Self> {
        let elements = RefCell::new(Vec::<Element>::new());
        rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!("*", |el| {
                        let attributes: Vec<(String, String)> = el
                            .attributes()
                            .iter()
                            .map(|attr| (attr.name(), attr.value()))
                            .collect();
                        elements.borrow_mut().push(Element {
                            name: el.tag_name(),
                            parsed_attributes: attributes.clone(),
                            attributes,
                            text: String::new(),
                            text_replaced: false,
                        });
                        Ok(())
                    }),
                    // Raw text elements have no child elements, so their text
                    // belongs to the element recorded last
                    text!("script", |chunk| append_text(&elements, chunk.as_str())),
                    text!("style", |chunk| append_text(&elements, chunk.as_str())),
                ],
                strict: false,
                ..RewriteStrSettings::new()
            },
        )
        .map_err(|err| Error::Parse(err.to_string()))?;

        Ok(Document {
            source: html.to_string(),
            elements: elements.into_inner(),
        })
    }

    fn element(&self, id: NodeId) -> Option<&Element> {
        self.elements.get(id.0)
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.elements.get_mut(id.0)
    }

    /// Elements named `name` (ASCII case-insensitive), in document order.
    pub fn elements_by_tag_name(&self, name: &str) -> Vec<NodeId> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, element)| element.is(name))
            .map(|(index, _)| NodeId(index))
            .collect()
    }

    /// `<script>` elements carrying a non-empty `src`, in document order.
    pub fn external_scripts(&self) -> Vec<NodeId> {
        self.elements_by_tag_name("script")
            .into_iter()
            .filter(|id| self.attribute(*id, "src").is_some_and(|src| !src.is_empty()))
            .collect()
    }

    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|element| element.name.as_str())
    }

    /// Value of attribute `name`. Valueless attributes read as `""`.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        let element = self.element(id)?;
        element
            .position(name)
            .map(|index| element.attributes[index].1.as_str())
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(element) = self.element_mut(id) else {
            return;
        };
        match element.position(name) {
            Some(index) => element.attributes[index].1 = value.to_string(),
            None => element
                .attributes
                .push((name.to_string(), value.to_string())),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        if let Some(element) = self.element_mut(id) {
            element
                .attributes
                .retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        }
    }

    /// Text of a `<script>` or `<style>` element, as written in the document.
    /// Other elements have no raw text and read as `""`.
    pub fn text_content(&self, id: NodeId) -> String {
        self.element(id)
            .map(|element| element.text.clone())
            .unwrap_or_default()
    }

    /// Replaces the content of a `<script>` or `<style>` element with `text`.
    ///
    /// The text is kept raw, with any closing tag sequence for the element
    /// broken up. Other elements are left alone.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        let Some(element) = self.element_mut(id) else {
            return;
        };
        if !element.is_raw_text() {
            return;
        }
        element.text = escape_raw_text(text, &element.name);
        element.text_replaced = true;
    }

    pub fn to_html(&self) -> Result<String> {
        let mut next = 0;
        let html = rewrite_str(
            &self.source,
            RewriteStrSettings {
                element_content_handlers: vec![element!("*", |el| {
                    let index = next;
                    next += 1;
                    if let Some(element) = self.elements.get(index) {
                        element.apply(el)?;
                    }
                    Ok(())
                })],
                strict: false,
                ..RewriteStrSettings::new()
            },
        )
        .map_err(|err| Error::Parse(err.to_string()));
        html
    }
}

fn append_text(elements: &RefCell<Vec<Element>>, chunk: &str) -> HandlerResult {
    if let Some(last) = elements.borrow_mut().last_mut() {
        last.text.push_str(chunk);
    }
    Ok(())
}

/// Breaks up `</name` sequences (ASCII case-insensitive) as `<\/name`.
fn escape_raw_text(text: &str, name: &str) -> String {
    let needle = format!("</{}", name.to_ascii_lowercase());
    let lower = text.to_ascii_lowercase();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in lower.match_indices(&needle) {
        out.push_str(&text[last..start]);
        out.push_str("<\\/");
        last = start + 2;
    }
    out.push_str(&text[last..]);
    out
}
