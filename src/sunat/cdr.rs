//! ZIP framing and CDR (Constancia de Recepción) interpretation.

use std::io::{Cursor, Read, Write};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::core::{DocumentStatus, FacturaError};

/// Package signed XML into the exchange archive: a flat ZIP with a single
/// deflate entry named exactly like the exchange file.
pub fn package_zip(file_name: &str, signed_xml: &[u8]) -> Result<Vec<u8>, FacturaError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer
        .start_file(file_name, options)
        .map_err(|e| FacturaError::Builder(format!("cannot create ZIP entry: {e}")))?;
    writer
        .write_all(signed_xml)
        .map_err(|e| FacturaError::Builder(format!("cannot write ZIP entry: {e}")))?;
    let cursor = writer
        .finish()
        .map_err(|e| FacturaError::Builder(format!("cannot finish ZIP: {e}")))?;
    Ok(cursor.into_inner())
}

/// Pull the ApplicationResponse XML out of a CDR archive. The entry is
/// named `R-{fileName}`; directory entries and nested paths are ignored.
pub fn extract_cdr_xml(zip_bytes: &[u8]) -> Result<Vec<u8>, FacturaError> {
    let mut archive = ZipArchive::new(Cursor::new(zip_bytes))
        .map_err(|e| FacturaError::Xml(format!("CDR is not a ZIP archive: {e}")))?;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| FacturaError::Xml(format!("cannot read CDR entry: {e}")))?;
        if !entry.is_file() {
            continue;
        }
        let name = entry.name().to_string();
        if name.contains('/') || !name.starts_with("R-") {
            continue;
        }
        let mut xml = Vec::new();
        entry
            .read_to_end(&mut xml)
            .map_err(|e| FacturaError::Xml(format!("cannot read CDR entry '{name}': {e}")))?;
        return Ok(xml);
    }
    Err(FacturaError::Xml(
        "CDR archive has no R-* ApplicationResponse entry".into(),
    ))
}

/// The authoritative outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cdr {
    /// `DocumentResponse/Response/ResponseCode`.
    pub response_code: String,
    /// `DocumentResponse/Response/Description`.
    pub description: String,
}

impl Cdr {
    /// Classify the response code: "0" accepted, 2000–3999 accepted with
    /// observations, anything else rejected.
    pub fn outcome(&self) -> DocumentStatus {
        if self.response_code == "0" {
            return DocumentStatus::Accepted;
        }
        match self.response_code.parse::<u32>() {
            Ok(code) if (2000..=3999).contains(&code) => {
                DocumentStatus::AcceptedWithObservations
            }
            _ => DocumentStatus::Rejected,
        }
    }
}

/// Parse the ApplicationResponse XML of a CDR. Elements are matched by
/// local name; the first `Response` block under `DocumentResponse` is
/// authoritative.
pub fn parse_application_response(xml: &[u8]) -> Result<Cdr, FacturaError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut response_code = None;
    let mut description = None;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| FacturaError::Xml(format!("CDR parse error: {e}")))?
        {
            Event::Start(ref e) => {
                let local = std::str::from_utf8(e.local_name().as_ref())
                    .unwrap_or("")
                    .to_string();
                path.push(local);
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| FacturaError::Xml(format!("CDR unescape error: {e}")))?
                    .into_owned();
                let in_document_response = path.iter().any(|p| p == "DocumentResponse");
                let parent = path.len().checked_sub(2).map(|i| path[i].as_str());
                let leaf = path.last().map(String::as_str);
                if in_document_response && parent == Some("Response") {
                    match leaf {
                        Some("ResponseCode") if response_code.is_none() => {
                            response_code = Some(text);
                        }
                        Some("Description") if description.is_none() => {
                            description = Some(text);
                        }
                        _ => {}
                    }
                }
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(Cdr {
        response_code: response_code.ok_or_else(|| {
            FacturaError::Xml("ApplicationResponse has no DocumentResponse/Response/ResponseCode".into())
        })?,
        description: description.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn application_response(code: &str, description: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ar:ApplicationResponse xmlns:ar="urn:oasis:names:specification:ubl:schema:xsd:ApplicationResponse-2"
    xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
    xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:ID>R-20123456789-01-F001-123</cbc:ID>
  <cac:DocumentResponse>
    <cac:Response>
      <cbc:ResponseCode>{code}</cbc:ResponseCode>
      <cbc:Description>{description}</cbc:Description>
    </cac:Response>
  </cac:DocumentResponse>
</ar:ApplicationResponse>"#
        )
    }

    #[test]
    fn zip_roundtrip_is_flat_single_entry() {
        let zip = package_zip("20123456789-01-F001-123.xml", b"<Invoice/>").unwrap();
        let mut archive = ZipArchive::new(Cursor::new(zip.as_slice())).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "20123456789-01-F001-123.xml");
        assert!(entry.is_file());
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        assert_eq!(content, b"<Invoice/>");
    }

    #[test]
    fn extracts_cdr_entry_by_prefix() {
        let xml = application_response("0", "Aceptada");
        let zip = package_zip("R-20123456789-01-F001-123.xml", xml.as_bytes()).unwrap();
        let extracted = extract_cdr_xml(&zip).unwrap();
        assert_eq!(extracted, xml.as_bytes());
    }

    #[test]
    fn missing_cdr_entry_is_an_error() {
        let zip = package_zip("readme.txt", b"hola").unwrap();
        assert!(extract_cdr_xml(&zip).is_err());
    }

    #[test]
    fn parses_application_response() {
        let xml = application_response("0", "La Factura F001-123 ha sido aceptada");
        let cdr = parse_application_response(xml.as_bytes()).unwrap();
        assert_eq!(cdr.response_code, "0");
        assert_eq!(cdr.description, "La Factura F001-123 ha sido aceptada");
        assert_eq!(cdr.outcome(), DocumentStatus::Accepted);
    }

    #[test]
    fn classifies_observation_codes() {
        let cdr = Cdr {
            response_code: "2335".into(),
            description: String::new(),
        };
        assert_eq!(cdr.outcome(), DocumentStatus::AcceptedWithObservations);
        let cdr = Cdr {
            response_code: "3999".into(),
            description: String::new(),
        };
        assert_eq!(cdr.outcome(), DocumentStatus::AcceptedWithObservations);
    }

    #[test]
    fn classifies_error_codes_as_rejected() {
        for code in ["1032", "4000", "garbage"] {
            let cdr = Cdr {
                response_code: code.into(),
                description: String::new(),
            };
            assert_eq!(cdr.outcome(), DocumentStatus::Rejected, "code {code}");
        }
    }
}
