//! Exclusive XML canonicalization (C14N 1.0, `xml-exc-c14n`).
//!
//! Operates directly on the [`Element`] tree so the canonical form is
//! computed from exactly the same structure the serializer emits. Only the
//! subset of C14N needed by the signature profile is implemented: no
//! comments, no processing instructions, no `InclusiveNamespaces`
//! prefix list.

use std::collections::BTreeMap;

use crate::ubl::{Element, Node};

/// Canonicalization failure (an element or attribute uses a prefix with no
/// in-scope declaration).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct C14nError(pub String);

impl std::fmt::Display for C14nError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "canonicalization error: {}", self.0)
    }
}

impl std::error::Error for C14nError {}

/// Canonicalize `element` as the apex of the output subset.
///
/// `in_scope` supplies namespace declarations inherited from ancestors that
/// are *not* part of the output (exclusive C14N still resolves prefixes
/// against them); pass an empty slice for a document root.
pub fn canonicalize(element: &Element, in_scope: &[(&str, &str)]) -> Result<String, C14nError> {
    let mut scope = BTreeMap::new();
    for (prefix, uri) in in_scope {
        scope.insert((*prefix).to_string(), (*uri).to_string());
    }
    let rendered = BTreeMap::new();
    let mut out = String::new();
    render_element(element, &scope, &rendered, &mut out)?;
    Ok(out)
}

fn render_element(
    element: &Element,
    in_scope: &BTreeMap<String, String>,
    rendered: &BTreeMap<String, String>,
    out: &mut String,
) -> Result<(), C14nError> {
    // Fold this element's namespace declarations into the scope.
    let mut scope = in_scope.clone();
    for (name, value) in &element.attributes {
        if name == "xmlns" {
            scope.insert(String::new(), value.clone());
        } else if let Some(prefix) = name.strip_prefix("xmlns:") {
            scope.insert(prefix.to_string(), value.clone());
        }
    }

    // Visibly utilized prefixes: the element's own prefix plus every
    // prefixed (non-xmlns) attribute. Unprefixed attributes carry no
    // namespace.
    let own_prefix = element.prefix().unwrap_or("").to_string();
    let mut visible: Vec<String> = vec![own_prefix];
    for (name, _) in regular_attributes(element) {
        if let Some((prefix, _)) = name.split_once(':') {
            if !visible.iter().any(|p| p.as_str() == prefix) {
                visible.push(prefix.to_string());
            }
        }
    }

    // Decide which of the visible prefixes need a declaration here.
    let mut to_render: Vec<(String, String)> = Vec::new();
    let mut next_rendered = rendered.clone();
    for prefix in visible {
        let uri = match scope.get(&prefix) {
            Some(uri) => uri.clone(),
            None if prefix.is_empty() => String::new(),
            None => {
                return Err(C14nError(format!(
                    "prefix '{prefix}' used on <{}> has no in-scope declaration",
                    element.name
                )))
            }
        };
        let already = next_rendered.get(&prefix);
        let needed = match (&uri, already) {
            // Default-namespace undeclaration is only written when an
            // ancestor rendered a non-empty default.
            (u, None) if u.is_empty() => false,
            (u, Some(prev)) => prev != u,
            (_, None) => true,
        };
        if needed {
            to_render.push((prefix.clone(), uri.clone()));
        }
        next_rendered.insert(prefix, uri);
    }
    // Namespace nodes sort with the default declaration first, then by
    // prefix.
    to_render.sort();

    // Attributes sort by (namespace URI, local name); all attributes this
    // profile emits are unqualified, so the key degenerates to local name.
    let mut attrs: Vec<(&String, &String)> = regular_attributes(element).collect();
    attrs.sort_by(|(a, _), (b, _)| {
        let key = |name: &str| -> (String, String) {
            match name.split_once(':') {
                Some((prefix, local)) => (
                    scope.get(prefix).cloned().unwrap_or_default(),
                    local.to_string(),
                ),
                None => (String::new(), name.to_string()),
            }
        };
        key(a).cmp(&key(b))
    });

    out.push('<');
    out.push_str(&element.name);
    for (prefix, uri) in &to_render {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attribute(uri, out);
        out.push('"');
    }
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attribute(value, out);
        out.push('"');
    }
    out.push('>');

    for child in &element.children {
        match child {
            Node::Element(e) => render_element(e, &scope, &next_rendered, out)?,
            Node::Text(t) => escape_text(t, out),
        }
    }

    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
    Ok(())
}

fn regular_attributes(element: &Element) -> impl Iterator<Item = (&String, &String)> {
    element
        .attributes
        .iter()
        .filter(|(name, _)| name != "xmlns" && !name.starts_with("xmlns:"))
        .map(|(name, value)| (name, value))
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attribute(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_element_expands_to_tag_pair() {
        let e = Element::new("a");
        assert_eq!(canonicalize(&e, &[]).unwrap(), "<a></a>");
    }

    #[test]
    fn attributes_are_sorted_by_local_name() {
        let e = Element::new("item")
            .attr("z", "3")
            .attr("a", "1")
            .attr("m", "2");
        assert_eq!(
            canonicalize(&e, &[]).unwrap(),
            r#"<item a="1" m="2" z="3"></item>"#
        );
    }

    #[test]
    fn only_visibly_utilized_namespaces_are_emitted() {
        let e = Element::new("Invoice")
            .attr("xmlns", "urn:invoice")
            .attr("xmlns:cbc", "urn:cbc")
            .attr("xmlns:unused", "urn:unused")
            .child(Element::new("cbc:ID").text("F001-1"));
        let c14n = canonicalize(&e, &[]).unwrap();
        assert_eq!(
            c14n,
            r#"<Invoice xmlns="urn:invoice"><cbc:ID xmlns:cbc="urn:cbc">F001-1</cbc:ID></Invoice>"#
        );
    }

    #[test]
    fn rendered_declarations_are_not_repeated_in_descendants() {
        let e = Element::new("ds:SignedInfo")
            .attr("xmlns:ds", "urn:ds")
            .child(Element::new("ds:Reference").attr("URI", ""));
        assert_eq!(
            canonicalize(&e, &[]).unwrap(),
            r#"<ds:SignedInfo xmlns:ds="urn:ds"><ds:Reference URI=""></ds:Reference></ds:SignedInfo>"#
        );
    }

    #[test]
    fn inherited_scope_resolves_prefixes() {
        let e = Element::new("ds:SignedInfo").child(Element::new("ds:Reference"));
        let c14n = canonicalize(&e, &[("ds", "urn:ds")]).unwrap();
        assert!(c14n.starts_with(r#"<ds:SignedInfo xmlns:ds="urn:ds">"#));
    }

    #[test]
    fn undeclared_prefix_is_an_error() {
        let e = Element::new("cbc:ID");
        assert!(canonicalize(&e, &[]).is_err());
    }

    #[test]
    fn namespace_declarations_sort_default_first() {
        let e = Element::new("root")
            .attr("xmlns:b", "urn:b")
            .attr("xmlns", "urn:default")
            .attr("b:x", "1");
        assert_eq!(
            canonicalize(&e, &[]).unwrap(),
            r#"<root xmlns="urn:default" xmlns:b="urn:b" b:x="1"></root>"#
        );
    }

    #[test]
    fn unused_default_declaration_is_dropped_on_prefixed_apex() {
        let e = Element::new("b:root")
            .attr("xmlns:b", "urn:b")
            .attr("xmlns", "urn:default")
            .child(Element::new("plain"));
        // The prefixed apex does not utilize the default namespace; the
        // unprefixed child does.
        assert_eq!(
            canonicalize(&e, &[]).unwrap(),
            r#"<b:root xmlns:b="urn:b"><plain xmlns="urn:default"></plain></b:root>"#
        );
    }

    #[test]
    fn text_escaping_follows_c14n() {
        let e = Element::new("a").text("1 < 2 & 3 > 0\r");
        assert_eq!(
            canonicalize(&e, &[]).unwrap(),
            "<a>1 &lt; 2 &amp; 3 &gt; 0&#xD;</a>"
        );
    }

    #[test]
    fn attribute_escaping_follows_c14n() {
        let e = Element::new("a").attr("t", "a\"b\n&<");
        assert_eq!(
            canonicalize(&e, &[]).unwrap(),
            "<a t=\"a&quot;b&#xA;&amp;&lt;\"></a>"
        );
    }
}
