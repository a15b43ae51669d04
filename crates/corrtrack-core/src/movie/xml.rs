//! Thin accessor over a parsed XML document, so the underlying parser crate
//! (`roxmltree`) stays swappable behind this module per the engine's design
//! notes on replaceable DOM traversal.

use crate::error::{CorrTrackError, Result};

/// Parse `text` and hand the root element to `f`. A closure-based API
/// avoids a self-referential `Document`/`String` pair: the borrowed tree
/// never needs to outlive the text it was parsed from.
pub fn with_parsed<T>(text: &str, f: impl FnOnce(XmlNode) -> Result<T>) -> Result<T> {
    let doc = roxmltree::Document::parse(text).map_err(|e| CorrTrackError::Corrupt {
        reason: format!("malformed XML: {e}"),
    })?;
    f(XmlNode(doc.root_element()))
}

#[derive(Clone, Copy)]
pub struct XmlNode<'a>(roxmltree::Node<'a, 'a>);

impl<'a> XmlNode<'a> {
    pub fn tag_name(&self) -> &str {
        self.0.tag_name().name()
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.0.attribute(name)
    }

    pub fn text(&self) -> Option<&str> {
        self.0.text()
    }

    pub fn children_named(&self, name: &str) -> impl Iterator<Item = XmlNode<'a>> + 'a {
        self.0
            .children()
            .filter(move |n| n.is_element() && n.tag_name().name() == name)
            .map(XmlNode)
    }

    pub fn find_first(&self, name: &str) -> Option<XmlNode<'a>> {
        self.0
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == name)
            .map(XmlNode)
    }

    /// The full text content of every text node in this subtree, concatenated.
    pub fn all_text(&self) -> String {
        self.0.descendants().filter_map(|n| n.text()).collect::<Vec<_>>().join("")
    }
}
