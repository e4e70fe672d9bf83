use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use facturador::core::FacturaError;
use facturador::sunat::cdr::{extract_cdr_xml, package_zip, parse_application_response};
use facturador::sunat::{with_retry, RetryPolicy};

// --- S5: transport flap ---

#[tokio::test(start_paused = true)]
async fn transport_flap_resolves_after_backoff() {
    let attempts = AtomicU32::new(0);
    let attempts = &attempts;
    let started = tokio::time::Instant::now();

    let result = with_retry(&RetryPolicy::default(), || async move {
        match attempts.fetch_add(1, Ordering::SeqCst) {
            0..=2 => Err(FacturaError::Transport("connection reset".into())),
            _ => Ok("0".to_string()),
        }
    })
    .await
    .unwrap();

    // A single final result reaches the caller.
    assert_eq!(result, "0");
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    // Backoff delays match 100 / 400 / 1600 ms.
    assert_eq!(started.elapsed(), Duration::from_millis(100 + 400 + 1600));
}

#[tokio::test(start_paused = true)]
async fn retry_exhaustion_surfaces_the_transport_error() {
    let attempts = AtomicU32::new(0);
    let attempts = &attempts;
    let started = tokio::time::Instant::now();

    let result: Result<(), _> = with_retry(&RetryPolicy::default(), || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(FacturaError::Transport("still down".into()))
    })
    .await;

    assert!(matches!(result, Err(FacturaError::Transport(_))));
    // One initial try plus four retries.
    assert_eq!(attempts.load(Ordering::SeqCst), 5);
    assert_eq!(
        started.elapsed(),
        Duration::from_millis(100 + 400 + 1600 + 6400)
    );
}

#[tokio::test(start_paused = true)]
async fn non_transport_errors_are_not_retried() {
    let attempts = AtomicU32::new(0);
    let attempts = &attempts;

    let result: Result<(), _> = with_retry(&RetryPolicy::default(), || async move {
        attempts.fetch_add(1, Ordering::SeqCst);
        Err(FacturaError::Rejected {
            code: "soap-env:Client.1032".into(),
            message: "Firma inválida".into(),
        })
    })
    .await;

    assert!(matches!(result, Err(FacturaError::Rejected { .. })));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}

// --- CDR framing end to end ---

#[test]
fn cdr_archive_roundtrip() {
    let application_response = r#"<?xml version="1.0" encoding="UTF-8"?>
<ar:ApplicationResponse xmlns:ar="urn:oasis:names:specification:ubl:schema:xsd:ApplicationResponse-2"
    xmlns:cac="urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2"
    xmlns:cbc="urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2">
  <cbc:ID>R-20123456789-01-F001-123</cbc:ID>
  <cac:DocumentResponse>
    <cac:Response>
      <cbc:ResponseCode>0</cbc:ResponseCode>
      <cbc:Description>La Factura numero F001-123, ha sido aceptada</cbc:Description>
    </cac:Response>
  </cac:DocumentResponse>
</ar:ApplicationResponse>"#;

    let zip = package_zip(
        "R-20123456789-01-F001-123.xml",
        application_response.as_bytes(),
    )
    .unwrap();
    let xml = extract_cdr_xml(&zip).unwrap();
    let cdr = parse_application_response(&xml).unwrap();
    assert_eq!(cdr.response_code, "0");
    assert!(cdr.description.contains("aceptada"));
    assert_eq!(cdr.outcome(), facturador::core::DocumentStatus::Accepted);
}

#[test]
fn cdr_rejection_codes_classify_as_rejected() {
    let xml = r#"<ApplicationResponse>
  <DocumentResponse><Response>
    <ResponseCode>2324</ResponseCode>
    <Description>Observada</Description>
  </Response></DocumentResponse>
</ApplicationResponse>"#;
    let cdr = parse_application_response(xml.as_bytes()).unwrap();
    assert_eq!(
        cdr.outcome(),
        facturador::core::DocumentStatus::AcceptedWithObservations
    );
}
