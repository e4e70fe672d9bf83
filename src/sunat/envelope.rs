use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::core::FacturaError;

const SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SERVICE_NS: &str = "http://service.sunat.gob.pe";
const WSSE_NS: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const PASSWORD_TEXT: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordText";

/// The three operations of the `billService`.
pub enum Operation<'a> {
    SendBill {
        file_name: &'a str,
        /// Base64 of the flat ZIP holding the signed XML.
        content: &'a str,
    },
    GetStatus {
        ticket: &'a str,
    },
    GetStatusCdr {
        ruc: &'a str,
        doc_type: &'a str,
        series: &'a str,
        number: &'a str,
    },
}

impl Operation<'_> {
    fn element_name(&self) -> &'static str {
        match self {
            Self::SendBill { .. } => "ser:sendBill",
            Self::GetStatus { .. } => "ser:getStatus",
            Self::GetStatusCdr { .. } => "ser:getStatusCdr",
        }
    }

    fn parameters(&self) -> Vec<(&'static str, &str)> {
        match self {
            Self::SendBill { file_name, content } => {
                vec![("fileName", *file_name), ("contentFile", *content)]
            }
            Self::GetStatus { ticket } => vec![("ticket", *ticket)],
            Self::GetStatusCdr {
                ruc,
                doc_type,
                series,
                number,
            } => vec![
                ("rucComprobante", *ruc),
                ("tipoComprobante", *doc_type),
                ("serieComprobante", *series),
                ("numeroComprobante", *number),
            ],
        }
    }
}

/// Build a SOAP 1.1 request envelope with the WSSE `UsernameToken` header.
/// No timestamp, no nonce; password travels as `PasswordText`.
pub fn build_envelope(
    username: &str,
    password: &str,
    operation: &Operation<'_>,
) -> Result<String, FacturaError> {
    let mut writer = EnvelopeWriter::new();
    writer.start_with_attrs(
        "soapenv:Envelope",
        &[
            ("xmlns:soapenv", SOAP_ENV),
            ("xmlns:ser", SERVICE_NS),
            ("xmlns:wsse", WSSE_NS),
        ],
    )?;

    writer.start("soapenv:Header")?;
    writer.start("wsse:Security")?;
    writer.start("wsse:UsernameToken")?;
    writer.text_element("wsse:Username", username)?;
    writer.text_element_with_attrs("wsse:Password", password, &[("Type", PASSWORD_TEXT)])?;
    writer.end("wsse:UsernameToken")?;
    writer.end("wsse:Security")?;
    writer.end("soapenv:Header")?;

    writer.start("soapenv:Body")?;
    writer.start(operation.element_name())?;
    for (name, value) in operation.parameters() {
        writer.text_element(name, value)?;
    }
    writer.end(operation.element_name())?;
    writer.end("soapenv:Body")?;

    writer.end("soapenv:Envelope")?;
    writer.into_string()
}

/// Minimal event writer for envelopes; no indentation.
struct EnvelopeWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl EnvelopeWriter {
    fn new() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    fn into_string(self) -> Result<String, FacturaError> {
        String::from_utf8(self.writer.into_inner().into_inner())
            .map_err(|e| FacturaError::Xml(format!("envelope is not UTF-8: {e}")))
    }

    fn start(&mut self, name: &str) -> Result<(), FacturaError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)
    }

    fn start_with_attrs(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), FacturaError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer.write_event(Event::Start(elem)).map_err(xml_io)
    }

    fn end(&mut self, name: &str) -> Result<(), FacturaError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)
    }

    fn text_element(&mut self, name: &str, text: &str) -> Result<(), FacturaError> {
        self.start(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end(name)
    }

    fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<(), FacturaError> {
        self.start_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end(name)
    }
}

fn xml_io(e: std::io::Error) -> FacturaError {
    FacturaError::Xml(format!("envelope write error: {e}"))
}

/// Fields a `billService` response can carry; prefixes vary between
/// deployments, so elements are matched by local name.
#[derive(Debug, Default, Clone)]
pub struct SoapResponse {
    pub ticket: Option<String>,
    pub status_code: Option<String>,
    /// Base64 CDR ZIP from `getStatus` / `getStatusCdr`.
    pub content: Option<String>,
    pub status_message: Option<String>,
    /// Base64 CDR ZIP returned synchronously by `sendBill`.
    pub application_response: Option<String>,
    pub fault: Option<SoapFault>,
}

/// A SOAP fault with its code string preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    pub code: String,
    pub message: String,
}

/// Local interpretation of a fault code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// `Client.1xxx` — the payload is invalid; the document is rejected.
    Rejected,
    /// `0xxx` — infrastructure trouble on the authority's side; retriable.
    Transport,
    /// `2xxx`/`3xxx` — accepted with observations.
    AcceptedWithObservations,
    /// Anything else.
    Unknown,
}

impl SoapFault {
    /// Map the numeric tail of the fault code (`soap-env:Client.1032` →
    /// 1032) onto the local error kinds.
    pub fn kind(&self) -> FaultKind {
        let tail = self
            .code
            .rsplit(['.', ':'])
            .next()
            .unwrap_or("");
        match tail.parse::<u32>() {
            Ok(n) if (1000..=1999).contains(&n) => FaultKind::Rejected,
            Ok(n) if n < 1000 => FaultKind::Transport,
            Ok(n) if (2000..=3999).contains(&n) => FaultKind::AcceptedWithObservations,
            _ => FaultKind::Unknown,
        }
    }
}

/// Parse a `billService` response envelope.
pub fn parse_response(xml: &str) -> Result<SoapResponse, FacturaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut response = SoapResponse::default();
    let mut fault_code = None;
    let mut fault_string = None;
    let mut current: Option<String> = None;

    loop {
        match reader
            .read_event()
            .map_err(|e| FacturaError::Xml(format!("SOAP response parse error: {e}")))?
        {
            Event::Start(ref e) => {
                let local = std::str::from_utf8(e.local_name().as_ref())
                    .unwrap_or("")
                    .to_string();
                current = Some(local);
            }
            Event::Text(ref t) => {
                let text = t
                    .unescape()
                    .map_err(|e| FacturaError::Xml(format!("SOAP unescape error: {e}")))?
                    .into_owned();
                match current.as_deref() {
                    Some("ticket") => response.ticket = Some(text),
                    Some("statusCode") => response.status_code = Some(text),
                    Some("content") => response.content = Some(text),
                    Some("statusMessage") => response.status_message = Some(text),
                    Some("applicationResponse") => response.application_response = Some(text),
                    Some("faultcode") => fault_code = Some(text),
                    Some("faultstring") => fault_string = Some(text),
                    _ => {}
                }
            }
            Event::End(_) => current = None,
            Event::Eof => break,
            _ => {}
        }
    }

    if fault_code.is_some() || fault_string.is_some() {
        response.fault = Some(SoapFault {
            code: fault_code.unwrap_or_default(),
            message: fault_string.unwrap_or_default(),
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_wsse_credentials() {
        let envelope = build_envelope(
            "20123456789MODDATOS",
            "moddatos",
            &Operation::GetStatus { ticket: "12345" },
        )
        .unwrap();
        assert!(envelope.contains("<wsse:Username>20123456789MODDATOS</wsse:Username>"));
        assert!(envelope.contains("PasswordText"));
        assert!(envelope.contains("<ser:getStatus><ticket>12345</ticket></ser:getStatus>"));
        assert!(envelope.contains("xmlns:ser=\"http://service.sunat.gob.pe\""));
    }

    #[test]
    fn send_bill_envelope_orders_parameters() {
        let envelope = build_envelope(
            "20123456789MODDATOS",
            "moddatos",
            &Operation::SendBill {
                file_name: "20123456789-01-F001-123.xml",
                content: "UEsDBA==",
            },
        )
        .unwrap();
        let file_pos = envelope.find("<fileName>").unwrap();
        let content_pos = envelope.find("<contentFile>").unwrap();
        assert!(file_pos < content_pos);
    }

    #[test]
    fn parses_send_bill_ticket() {
        let xml = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/">
            <soap-env:Body>
              <br:sendBillResponse xmlns:br="http://service.sunat.gob.pe">
                <ticket>1234567890</ticket>
              </br:sendBillResponse>
            </soap-env:Body></soap-env:Envelope>"#;
        let response = parse_response(xml).unwrap();
        assert_eq!(response.ticket.as_deref(), Some("1234567890"));
        assert!(response.fault.is_none());
    }

    #[test]
    fn parses_get_status_with_content() {
        let xml = r#"<Envelope><Body><getStatusResponse>
            <status><statusCode>0</statusCode><content>UEsDBA==</content></status>
            </getStatusResponse></Body></Envelope>"#;
        let response = parse_response(xml).unwrap();
        assert_eq!(response.status_code.as_deref(), Some("0"));
        assert_eq!(response.content.as_deref(), Some("UEsDBA=="));
    }

    #[test]
    fn parses_fault_verbatim() {
        let xml = r#"<soap-env:Envelope xmlns:soap-env="http://schemas.xmlsoap.org/soap/envelope/">
            <soap-env:Body><soap-env:Fault>
              <faultcode>soap-env:Client.1032</faultcode>
              <faultstring>Firma inválida</faultstring>
            </soap-env:Fault></soap-env:Body></soap-env:Envelope>"#;
        let response = parse_response(xml).unwrap();
        let fault = response.fault.unwrap();
        assert_eq!(fault.code, "soap-env:Client.1032");
        assert_eq!(fault.message, "Firma inválida");
        assert_eq!(fault.kind(), FaultKind::Rejected);
    }

    #[test]
    fn fault_kind_ranges() {
        let fault = |code: &str| SoapFault {
            code: code.into(),
            message: String::new(),
        };
        assert_eq!(fault("soap-env:Client.1032").kind(), FaultKind::Rejected);
        assert_eq!(fault("soap-env:Server.0109").kind(), FaultKind::Transport);
        assert_eq!(
            fault("soap-env:Client.2335").kind(),
            FaultKind::AcceptedWithObservations
        );
        assert_eq!(
            fault("soap-env:Client.3001").kind(),
            FaultKind::AcceptedWithObservations
        );
        assert_eq!(fault("soap-env:Client.4001").kind(), FaultKind::Unknown);
        assert_eq!(fault("env:Receiver").kind(), FaultKind::Unknown);
    }
}
