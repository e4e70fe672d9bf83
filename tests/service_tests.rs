use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use facturador::core::*;
use facturador::service::DocumentService;
use facturador::signer::XadesSigner;
use facturador::storage::{DocumentRepository, MemoryRepository};
use facturador::sunat::cdr::Cdr;
use facturador::sunat::{BillService, SubmitOutcome, TicketStatus};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509NameBuilder, X509};
use rust_decimal_macros::dec;
use tokio::sync::Mutex;

// --- collaborators ---

fn test_signer() -> XadesSigner {
    let rsa = Rsa::generate(2048).unwrap();
    let key = PKey::from_rsa(rsa).unwrap();
    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "ACME SAC").unwrap();
    let name = name.build();
    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(365).unwrap())
        .unwrap();
    let serial = {
        let mut bn = BigNum::new().unwrap();
        bn.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
        bn.to_asn1_integer().unwrap()
    };
    builder.set_serial_number(&serial).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    let cert = builder.build();
    let p12 = Pkcs12::builder()
        .name("firma")
        .pkey(&key)
        .cert(&cert)
        .build2("secret")
        .unwrap();
    XadesSigner::from_pkcs12_der(&p12.to_der().unwrap(), "secret").unwrap()
}

/// Scripted `billService` double: pops pre-programmed results and records
/// the file names that were submitted.
#[derive(Default)]
struct ScriptedBillService {
    send_results: Mutex<VecDeque<Result<SubmitOutcome, FacturaError>>>,
    status_results: Mutex<VecDeque<Result<TicketStatus, FacturaError>>>,
    submitted_files: Mutex<Vec<String>>,
}

impl ScriptedBillService {
    fn new() -> Self {
        Self::default()
    }

    async fn push_send(&self, result: Result<SubmitOutcome, FacturaError>) {
        self.send_results.lock().await.push_back(result);
    }

    async fn push_status(&self, result: Result<TicketStatus, FacturaError>) {
        self.status_results.lock().await.push_back(result);
    }

    async fn submitted(&self) -> Vec<String> {
        self.submitted_files.lock().await.clone()
    }
}

fn accepted_status(code: &str) -> TicketStatus {
    TicketStatus {
        status_code: "0".into(),
        message: None,
        cdr: Some(Cdr {
            response_code: code.into(),
            description: "procesada".into(),
        }),
        cdr_zip: Some(vec![0x50, 0x4b]),
    }
}

#[async_trait]
impl BillService for ScriptedBillService {
    async fn send_bill(
        &self,
        file_name: &str,
        _signed_xml: &[u8],
    ) -> Result<SubmitOutcome, FacturaError> {
        self.submitted_files
            .lock()
            .await
            .push(file_name.to_string());
        self.send_results
            .lock()
            .await
            .pop_front()
            .expect("unexpected sendBill call")
    }

    async fn get_status(&self, _ticket: &str) -> Result<TicketStatus, FacturaError> {
        self.status_results
            .lock()
            .await
            .pop_front()
            .expect("unexpected getStatus call")
    }

    async fn get_status_cdr(
        &self,
        _ruc: &str,
        _doc_type: &str,
        _series: &str,
        _number: u32,
    ) -> Result<TicketStatus, FacturaError> {
        self.status_results
            .lock()
            .await
            .pop_front()
            .expect("unexpected getStatusCdr call")
    }
}

struct Fixture {
    service: DocumentService,
    repository: Arc<MemoryRepository>,
    sunat: Arc<ScriptedBillService>,
}

fn fixture() -> Fixture {
    let repository = Arc::new(MemoryRepository::new());
    let sunat = Arc::new(ScriptedBillService::new());
    let service = DocumentService::new(
        repository.clone(),
        Arc::new(test_signer()),
        sunat.clone(),
    );
    Fixture {
        service,
        repository,
        sunat,
    }
}

fn factura() -> NewDocument {
    DocumentBuilder::new(DocumentType::Factura, "F001", 123)
        .issuer(Issuer {
            ruc: "20123456789".into(),
            name: "ACME SAC".into(),
            address: "Av. Arequipa 123, Lima".into(),
        })
        .recipient(Recipient {
            doc_kind: IdentityDocKind::Ruc,
            doc_number: "20987654321".into(),
            name: "Cliente SA".into(),
        })
        .add_line(LineBuilder::new("Servicio de consultoría", dec!(1), dec!(118.00)).build())
        .build()
}

// --- S1: factura acceptance via ticket ---

#[tokio::test]
async fn factura_acceptance_through_ticket() {
    let f = fixture();
    f.sunat
        .push_send(Ok(SubmitOutcome::Ticket("1234567890".into())))
        .await;

    let receipt = f.service.issue(factura()).await.unwrap();
    assert_eq!(receipt.status, DocumentStatus::Submitted);
    assert_eq!(receipt.ticket.as_deref(), Some("1234567890"));
    assert_eq!(
        f.sunat.submitted().await,
        vec!["20123456789-01-F001-123.xml".to_string()]
    );

    // CDR code "0" arrives on poll.
    f.sunat.push_status(Ok(accepted_status("0"))).await;
    let report = f.service.poll_status(&receipt.id).await.unwrap();
    assert_eq!(report.status, DocumentStatus::Accepted);
    assert_eq!(report.response_code.as_deref(), Some("0"));

    // The terminal state is persisted; further polls do not hit SUNAT
    // (the scripted queue is empty and would panic).
    let again = f.service.poll_status(&receipt.id).await.unwrap();
    assert_eq!(again.status, DocumentStatus::Accepted);

    let stored = f.repository.find(&receipt.id).await.unwrap();
    assert_eq!(stored.status, DocumentStatus::Accepted);
    assert_eq!(stored.ticket.as_deref(), Some("1234567890"));
}

// --- synchronous CDR in the sendBill response ---

#[tokio::test]
async fn synchronous_cdr_resolves_immediately() {
    let f = fixture();
    f.sunat
        .push_send(Ok(SubmitOutcome::Cdr(Cdr {
            response_code: "0".into(),
            description: "aceptada".into(),
        })))
        .await;

    let receipt = f.service.issue(factura()).await.unwrap();
    assert_eq!(receipt.status, DocumentStatus::Accepted);
    assert!(receipt.ticket.is_none());
    assert_eq!(receipt.response_code.as_deref(), Some("0"));
}

#[tokio::test]
async fn observation_codes_finish_as_accepted_with_observations() {
    let f = fixture();
    f.sunat
        .push_send(Ok(SubmitOutcome::Ticket("42".into())))
        .await;
    let receipt = f.service.issue(factura()).await.unwrap();

    f.sunat.push_status(Ok(accepted_status("2335"))).await;
    let report = f.service.poll_status(&receipt.id).await.unwrap();
    assert_eq!(report.status, DocumentStatus::AcceptedWithObservations);
}

// --- S4: rejected submission ---

#[tokio::test]
async fn soap_fault_rejects_the_document() {
    let f = fixture();
    f.sunat
        .push_send(Err(FacturaError::Rejected {
            code: "soap-env:Client.1032".into(),
            message: "Firma inválida".into(),
        }))
        .await;

    let err = f.service.issue(factura()).await.unwrap_err();
    match err {
        FacturaError::Rejected { code, message } => {
            assert_eq!(code, "soap-env:Client.1032");
            assert_eq!(message, "Firma inválida");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }

    // The record is terminal and its ticket stays empty.
    let stored = f.repository.list().await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, DocumentStatus::Rejected);
    assert!(stored[0].ticket.is_none());
}

#[tokio::test]
async fn transport_failure_leaves_document_retriable() {
    let f = fixture();
    f.sunat
        .push_send(Err(FacturaError::Transport("connection reset".into())))
        .await;

    let err = f.service.issue(factura()).await.unwrap_err();
    assert!(matches!(err, FacturaError::Transport(_)));

    let stored = f.repository.list().await;
    assert_eq!(stored[0].status, DocumentStatus::FailedTransport);
    assert!(!stored[0].status.is_terminal());
}

// --- validation gate ---

#[tokio::test]
async fn invalid_document_is_refused_before_any_network_call() {
    let f = fixture();
    let mut doc = factura();
    doc.series = "X9".into();
    let err = f.service.issue(doc).await.unwrap_err();
    assert!(matches!(err, FacturaError::Validation(_)));
    assert!(f.sunat.submitted().await.is_empty());
}

// --- poll / fetch ---

#[tokio::test]
async fn polling_unknown_id_is_not_found() {
    let f = fixture();
    let err = f.service.poll_status("missing").await.unwrap_err();
    assert!(matches!(err, FacturaError::NotFound(_)));
}

#[tokio::test]
async fn in_process_ticket_reports_submitted() {
    let f = fixture();
    f.sunat
        .push_send(Ok(SubmitOutcome::Ticket("77".into())))
        .await;
    let receipt = f.service.issue(factura()).await.unwrap();

    f.sunat
        .push_status(Ok(TicketStatus {
            status_code: "98".into(),
            message: Some("EN PROCESO".into()),
            cdr: None,
            cdr_zip: None,
        }))
        .await;
    let report = f.service.poll_status(&receipt.id).await.unwrap();
    assert_eq!(report.status, DocumentStatus::Submitted);
}

#[tokio::test]
async fn fetch_cdr_returns_code_and_bytes() {
    let f = fixture();
    f.sunat.push_status(Ok(accepted_status("0"))).await;
    let retrieval = f
        .service
        .fetch_cdr("20123456789", "01", "F001", 123)
        .await
        .unwrap();
    assert_eq!(retrieval.response_code, "0");
    assert!(!retrieval.zip.is_empty());
}

#[tokio::test]
async fn fetch_cdr_without_content_is_not_found() {
    let f = fixture();
    f.sunat
        .push_status(Ok(TicketStatus {
            status_code: "98".into(),
            message: None,
            cdr: None,
            cdr_zip: None,
        }))
        .await;
    let err = f
        .service
        .fetch_cdr("20123456789", "01", "F001", 123)
        .await
        .unwrap_err();
    assert!(matches!(err, FacturaError::NotFound(_)));
}
