//! Document service: drives a record through the issuing pipeline
//! (validate → persist draft → build UBL → serialize → sign → package →
//! submit → persist result) and owns the status transitions.
//!
//! The UBL tree and signed bytes are transient artifacts, regenerated on
//! demand; only the record itself is persisted.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::{
    validation_failure, validate, Document, DocumentStatus, FacturaError, NewDocument,
};
use crate::signer::XadesSigner;
use crate::storage::DocumentRepository;
use crate::sunat::cdr::Cdr;
use crate::sunat::{BillService, SubmitOutcome};
use crate::ubl;

/// Result of admitting a document.
#[derive(Debug, Clone, Serialize)]
pub struct IssueReceipt {
    pub id: String,
    #[serde(rename = "estado")]
    pub status: DocumentStatus,
    #[serde(rename = "ticket_id", skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    /// Present when SUNAT resolved the submission synchronously.
    #[serde(rename = "codigo_respuesta", skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    #[serde(rename = "descripcion", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Result of polling a document.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub id: String,
    #[serde(rename = "estado")]
    pub status: DocumentStatus,
    #[serde(rename = "ticket_id", skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(rename = "codigo_respuesta", skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    #[serde(rename = "descripcion", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A CDR retrieved by business tuple.
#[derive(Debug, Clone, Serialize)]
pub struct CdrRetrieval {
    #[serde(rename = "codigo_respuesta")]
    pub response_code: String,
    #[serde(rename = "descripcion")]
    pub description: String,
    /// The raw CDR archive, Base64 for JSON transport.
    #[serde(rename = "cdr_zip", with = "base64_bytes")]
    pub zip: Vec<u8>,
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }
}

/// Orchestrates the issuing pipeline over the shared collaborators.
pub struct DocumentService {
    repository: Arc<dyn DocumentRepository>,
    signer: Arc<XadesSigner>,
    sunat: Arc<dyn BillService>,
}

impl DocumentService {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        signer: Arc<XadesSigner>,
        sunat: Arc<dyn BillService>,
    ) -> Self {
        Self {
            repository,
            signer,
            sunat,
        }
    }

    /// Admit and issue a document end to end.
    pub async fn issue(&self, new_document: NewDocument) -> Result<IssueReceipt, FacturaError> {
        let errors = validate(&new_document);
        if !errors.is_empty() {
            return Err(validation_failure(&errors));
        }

        let id = Uuid::new_v4().to_string();
        let now = chrono::Local::now().naive_local();
        let document = new_document.into_document(id.clone(), now);
        let file_name = document.file_name();
        self.repository.save(document.clone()).await?;
        info!(%id, %file_name, "document admitted");

        let signed_xml = self.sign_document(&document)?;
        self.repository
            .update_status(&id, DocumentStatus::Signed)
            .await?;

        match self.sunat.send_bill(&file_name, &signed_xml).await {
            Ok(SubmitOutcome::Ticket(ticket)) => {
                self.repository
                    .update_status(&id, DocumentStatus::Submitted)
                    .await?;
                self.repository.set_ticket(&id, &ticket).await?;
                info!(%id, %ticket, "submitted, awaiting CDR");
                Ok(IssueReceipt {
                    id,
                    status: DocumentStatus::Submitted,
                    ticket: Some(ticket),
                    response_code: None,
                    description: None,
                })
            }
            Ok(SubmitOutcome::Cdr(cdr)) => {
                self.repository
                    .update_status(&id, DocumentStatus::Submitted)
                    .await?;
                let status = self.apply_cdr(&id, &cdr).await?;
                Ok(IssueReceipt {
                    id,
                    status,
                    ticket: None,
                    response_code: Some(cdr.response_code),
                    description: Some(cdr.description),
                })
            }
            Err(FacturaError::Rejected { code, message }) => {
                warn!(%id, %code, %message, "submission rejected");
                self.repository
                    .update_status(&id, DocumentStatus::Rejected)
                    .await?;
                Err(FacturaError::Rejected { code, message })
            }
            Err(FacturaError::Transport(message)) => {
                warn!(%id, %message, "submission failed at transport level");
                self.repository
                    .update_status(&id, DocumentStatus::FailedTransport)
                    .await?;
                Err(FacturaError::Transport(message))
            }
            Err(other) => Err(other),
        }
    }

    /// Query a document's current state, exchanging the ticket for the
    /// CDR when SUNAT has finished processing.
    pub async fn poll_status(&self, id: &str) -> Result<StatusReport, FacturaError> {
        let document = self.repository.find(id).await?;

        if document.status.is_terminal() {
            return Ok(Self::stored_report(&document));
        }
        let Some(ticket) = document.ticket.clone() else {
            // Includes the cancellation window: submitted but the ticket
            // never arrived. Recovery is fetch_cdr on the business tuple.
            return Ok(Self::stored_report(&document));
        };
        if document.status != DocumentStatus::Submitted {
            return Ok(Self::stored_report(&document));
        }

        let status = self.sunat.get_status(&ticket).await?;
        if status.in_process() {
            return Ok(Self::stored_report(&document));
        }

        if let Some(cdr) = status.cdr {
            let final_status = self.apply_cdr(id, &cdr).await?;
            return Ok(StatusReport {
                id: id.to_string(),
                status: final_status,
                ticket: Some(ticket),
                response_code: Some(cdr.response_code),
                description: Some(cdr.description),
            });
        }
        if status.status_code == "99" {
            self.repository
                .update_status(id, DocumentStatus::Rejected)
                .await?;
            return Ok(StatusReport {
                id: id.to_string(),
                status: DocumentStatus::Rejected,
                ticket: Some(ticket),
                response_code: Some(status.status_code),
                description: status.message,
            });
        }
        Ok(Self::stored_report(&document))
    }

    /// Retrieve the CDR of an already processed document by its business
    /// tuple.
    pub async fn fetch_cdr(
        &self,
        ruc: &str,
        doc_type: &str,
        series: &str,
        number: u32,
    ) -> Result<CdrRetrieval, FacturaError> {
        let status = self
            .sunat
            .get_status_cdr(ruc, doc_type, series, number)
            .await?;
        match status.cdr {
            Some(cdr) => Ok(CdrRetrieval {
                response_code: cdr.response_code,
                description: cdr.description,
                zip: status.cdr_zip.unwrap_or_default(),
            }),
            None => Err(FacturaError::NotFound(format!(
                "no CDR available for {ruc}-{doc_type}-{series}-{number}"
            ))),
        }
    }

    /// Regenerate, serialize and sign the UBL document. Signature
    /// failures leave the record in `RECEIVED` so the pipeline can be
    /// re-run.
    fn sign_document(&self, document: &Document) -> Result<Vec<u8>, FacturaError> {
        let tree = ubl::build_document(document)?;
        let xml = ubl::serialize_document(&tree)?;
        Ok(self.signer.sign(&xml)?)
    }

    async fn apply_cdr(&self, id: &str, cdr: &Cdr) -> Result<DocumentStatus, FacturaError> {
        let status = cdr.outcome();
        self.repository.update_status(id, status).await?;
        info!(%id, code = %cdr.response_code, ?status, "CDR applied");
        Ok(status)
    }

    fn stored_report(document: &Document) -> StatusReport {
        StatusReport {
            id: document.id.clone(),
            status: document.status,
            ticket: document.ticket.clone(),
            response_code: None,
            description: None,
        }
    }
}
