use quick_xml::events::Event;
use quick_xml::Reader;

use crate::core::FacturaError;

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with its prefixed name (e.g. `cbc:ID`), an ordered
/// attribute list, and ordered children.
///
/// Attributes keep insertion order so repeated serialization yields the
/// same bytes; namespace declarations (`xmlns`, `xmlns:*`) live in the
/// attribute list like any other attribute and are interpreted by the
/// canonicalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Append an attribute (builder style).
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    /// Append a text child (builder style).
    pub fn text(mut self, value: impl Into<String>) -> Self {
        self.children.push(Node::Text(value.into()));
        self
    }

    /// Append an element child (builder style).
    pub fn child(mut self, element: Element) -> Self {
        self.children.push(Node::Element(element));
        self
    }

    /// Append an element child in place.
    pub fn push(&mut self, element: Element) {
        self.children.push(Node::Element(element));
    }

    /// The prefix part of the name, if any (`cbc:ID` → `cbc`).
    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    /// The local part of the name (`cbc:ID` → `ID`).
    pub fn local_name(&self) -> &str {
        self.name.split_once(':').map_or(&*self.name, |(_, l)| l)
    }

    /// Look up an attribute by exact name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Child elements, skipping text nodes.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given prefixed name.
    pub fn first(&self, name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == name)
    }

    /// Mutable counterpart of [`Element::first`].
    pub fn first_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Walk a path of prefixed names from this element.
    pub fn find_path(&self, path: &[&str]) -> Option<&Element> {
        let mut current = self;
        for segment in path {
            current = current.first(segment)?;
        }
        Some(current)
    }

    /// Mutable counterpart of [`Element::find_path`].
    pub fn find_path_mut(&mut self, path: &[&str]) -> Option<&mut Element> {
        let mut current = self;
        for segment in path {
            current = current.first_mut(segment)?;
        }
        Some(current)
    }

    /// First descendant (depth-first) with the given local name.
    pub fn descendant_by_local(&self, local: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.local_name() == local {
                return Some(child);
            }
            if let Some(found) = child.descendant_by_local(local) {
                return Some(found);
            }
        }
        None
    }

    /// Concatenated text content of direct text children.
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Remove the first child element with the given prefixed name,
    /// returning it.
    pub fn remove_child(&mut self, name: &str) -> Option<Element> {
        let index = self.children.iter().position(
            |n| matches!(n, Node::Element(e) if e.name == name),
        )?;
        match self.children.remove(index) {
            Node::Element(e) => Some(e),
            Node::Text(_) => unreachable!("position matched an element"),
        }
    }
}

/// Path to the signature write slot below the document root.
pub const EXTENSION_SLOT_PATH: &[&str] =
    &["ext:UBLExtensions", "ext:UBLExtension", "ext:ExtensionContent"];

/// Parse serialized XML back into an element tree.
///
/// Text is kept verbatim (no whitespace trimming): the canonicalizer must
/// see the document exactly as serialized. Comments and processing
/// instructions are not part of the documents this crate produces and are
/// skipped.
pub fn parse_document(xml: &[u8]) -> Result<Element, FacturaError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| FacturaError::Xml(format!("XML parse error: {e}")))?
        {
            Event::Start(ref e) => {
                stack.push(element_from_start(e)?);
            }
            Event::Empty(ref e) => {
                let element = element_from_start(e)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| FacturaError::Xml(format!("XML unescape error: {e}")))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(ref c) => {
                let text = String::from_utf8(c.to_vec())
                    .map_err(|e| FacturaError::Xml(format!("CDATA is not UTF-8: {e}")))?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Text(text));
                }
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FacturaError::Xml("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(FacturaError::Xml("unclosed elements at end of input".into()));
    }
    root.ok_or_else(|| FacturaError::Xml("document has no root element".into()))
}

fn element_from_start(e: &quick_xml::events::BytesStart<'_>) -> Result<Element, FacturaError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|e| FacturaError::Xml(format!("element name is not UTF-8: {e}")))?
        .to_string();
    let mut element = Element::new(name);
    for attr in e.attributes() {
        let attr = attr.map_err(|e| FacturaError::Xml(format!("bad attribute: {e}")))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| FacturaError::Xml(format!("attribute name is not UTF-8: {e}")))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| FacturaError::Xml(format!("attribute unescape error: {e}")))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), FacturaError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(FacturaError::Xml("multiple root elements".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_style_tree() {
        let tree = Element::new("cac:Party")
            .child(Element::new("cbc:Name").text("ACME"))
            .child(Element::new("cbc:ID").attr("schemeID", "6").text("20123456789"));
        assert_eq!(tree.first("cbc:Name").unwrap().text_content(), "ACME");
        assert_eq!(
            tree.first("cbc:ID").unwrap().attribute("schemeID"),
            Some("6")
        );
    }

    #[test]
    fn parse_preserves_attribute_order() {
        let xml = br#"<a z="1" b="2" m="3"><c/>texto</a>"#;
        let tree = parse_document(xml).unwrap();
        let names: Vec<_> = tree.attributes.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, ["z", "b", "m"]);
        assert_eq!(tree.text_content(), "texto");
    }

    #[test]
    fn parse_unescapes_entities() {
        let tree = parse_document(br#"<a t="x &amp; y">1 &lt; 2</a>"#).unwrap();
        assert_eq!(tree.attribute("t"), Some("x & y"));
        assert_eq!(tree.text_content(), "1 < 2");
    }

    #[test]
    fn find_path_walks_the_slot() {
        let tree = Element::new("Invoice").child(
            Element::new("ext:UBLExtensions").child(
                Element::new("ext:UBLExtension").child(Element::new("ext:ExtensionContent")),
            ),
        );
        assert!(tree.find_path(EXTENSION_SLOT_PATH).is_some());
    }

    #[test]
    fn remove_child_extracts_element() {
        let mut tree = Element::new("a")
            .child(Element::new("b").text("1"))
            .child(Element::new("c"));
        let removed = tree.remove_child("b").unwrap();
        assert_eq!(removed.text_content(), "1");
        assert!(tree.first("b").is_none());
        assert!(tree.first("c").is_some());
    }

    #[test]
    fn prefix_and_local_name() {
        let e = Element::new("cbc:ID");
        assert_eq!(e.prefix(), Some("cbc"));
        assert_eq!(e.local_name(), "ID");
        let plain = Element::new("Invoice");
        assert_eq!(plain.prefix(), None);
        assert_eq!(plain.local_name(), "Invoice");
    }
}
