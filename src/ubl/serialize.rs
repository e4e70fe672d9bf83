use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use rust_decimal::Decimal;

use super::model::{Element, Node};
use crate::core::FacturaError;

/// Serialize a document tree to UTF-8 bytes.
///
/// Emits the XML declaration, then the tree with attributes in insertion
/// order and **no** indentation or inter-element whitespace: the signature
/// reference digest is computed over these bytes, so any cosmetic
/// whitespace would change the canonicalized form. Empty elements
/// serialize as `<tag/>`.
pub fn serialize_document(root: &Element) -> Result<Vec<u8>, FacturaError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_io)?;
    write_element(&mut writer, root)?;
    Ok(writer.into_inner().into_inner())
}

fn write_element(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    element: &Element,
) -> Result<(), FacturaError> {
    let mut start = BytesStart::new(&element.name);
    for (name, value) in &element.attributes {
        start.push_attribute((name.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_io)?;
        return Ok(());
    }

    writer.write_event(Event::Start(start)).map_err(xml_io)?;
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(writer, e)?,
            Node::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(xml_io)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(&element.name)))
        .map_err(xml_io)?;
    Ok(())
}

fn xml_io(e: std::io::Error) -> FacturaError {
    FacturaError::Xml(format!("XML write error: {e}"))
}

/// Format a monetary amount: exactly two fractional digits, banker's
/// rounding, `.` separator.
pub fn format_money(amount: Decimal) -> String {
    with_scale(amount.round_dp(2), 2)
}

/// Format a percentage: exactly two fractional digits ("18.00").
pub fn format_percent(percent: Decimal) -> String {
    with_scale(percent.round_dp(2), 2)
}

/// Format a quantity: two fractional digits, extended to three when the
/// third is significant.
pub fn format_quantity(quantity: Decimal) -> String {
    let rounded = quantity.round_dp(3);
    if rounded == rounded.round_dp(2) {
        with_scale(rounded, 2)
    } else {
        with_scale(rounded, 3)
    }
}

fn with_scale(value: Decimal, scale: u32) -> String {
    let mut value = value;
    value.rescale(scale);
    value.to_string()
}
