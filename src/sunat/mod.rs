//! SOAP client for the SUNAT `billService`.
//!
//! Wraps the three operations (`sendBill`, `getStatus`, `getStatusCdr`)
//! behind the [`BillService`] trait so the document service can be driven
//! by a mock in tests. The client owns a pooled `reqwest::Client` and
//! immutable credentials; retry behavior follows the operation: the
//! idempotent status queries retry on any transport failure, `sendBill`
//! only when the request provably never reached the endpoint.

pub mod cdr;
pub mod envelope;

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tracing::{debug, warn};

use crate::core::FacturaError;
use cdr::Cdr;
use envelope::{build_envelope, parse_response, FaultKind, Operation, SoapResponse};

/// Default service URL (the beta environment).
pub const BETA_URL: &str = "https://e-beta.sunat.gob.pe/ol-ti-itcpfegem-beta/billService";

/// Outcome of a `sendBill` call. Individual documents may get their CDR
/// synchronously in the response body; summaries get a ticket. Both
/// shapes are accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Asynchronous processing; exchange the ticket later.
    Ticket(String),
    /// The CDR came back in the `sendBill` response.
    Cdr(Cdr),
}

/// Result of a status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketStatus {
    /// Raw `statusCode`: "0" done, "98" in process, "99" processed with
    /// errors.
    pub status_code: String,
    pub message: Option<String>,
    /// Parsed CDR when the response carried one.
    pub cdr: Option<Cdr>,
    /// The raw CDR ZIP, kept for callers that hand the bytes onward.
    pub cdr_zip: Option<Vec<u8>>,
}

impl TicketStatus {
    /// Whether SUNAT is still processing the ticket.
    pub fn in_process(&self) -> bool {
        self.status_code == "98"
    }
}

/// The `billService` operations the document service depends on.
#[async_trait]
pub trait BillService: Send + Sync {
    async fn send_bill(
        &self,
        file_name: &str,
        signed_xml: &[u8],
    ) -> Result<SubmitOutcome, FacturaError>;

    async fn get_status(&self, ticket: &str) -> Result<TicketStatus, FacturaError>;

    async fn get_status_cdr(
        &self,
        ruc: &str,
        doc_type: &str,
        series: &str,
        number: u32,
    ) -> Result<TicketStatus, FacturaError>;
}

/// Exponential backoff schedule for transport failures:
/// 100 ms, 400 ms, 1.6 s, 6.4 s.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub factor: u32,
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(100),
            factor: 4,
            max_retries: 4,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base * self.factor.pow(attempt)
    }
}

/// Run `operation`, retrying on [`FacturaError::Transport`] per `policy`.
/// Any other error, and exhaustion, surface unchanged.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, FacturaError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FacturaError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Err(FacturaError::Transport(message)) if attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                warn!(attempt, ?delay, %message, "transport failure, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// SOAP client against a single `billService` URL.
pub struct SunatClient {
    http: reqwest::Client,
    url: String,
    username: String,
    password: String,
    retry: RetryPolicy,
}

impl SunatClient {
    /// `username` is the concatenated `{RUC}{SOL_USER}`. A `?wsdl` suffix
    /// on the URL is tolerated and stripped; only the service URL is used.
    pub fn new(url: &str, username: &str, password: &str) -> Result<Self, FacturaError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FacturaError::Transport(e.to_string()))?;
        let url = url.strip_suffix("?wsdl").unwrap_or(url).to_string();
        Ok(Self {
            http,
            url,
            username: username.to_string(),
            password: password.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Override the retry schedule.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn post(&self, envelope: String) -> Result<(u16, String), reqwest::Error> {
        let response = self
            .http
            .post(&self.url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPAction", "\"\"")
            .body(envelope)
            .send()
            .await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok((status, body))
    }

    /// One call: POST the envelope, surface 5xx as transport, parse the
    /// response body.
    async fn call(&self, operation: &Operation<'_>) -> Result<SoapResponse, FacturaError> {
        let envelope = build_envelope(&self.username, &self.password, operation)?;
        let (status, body) = self
            .post(envelope)
            .await
            .map_err(|e| FacturaError::Transport(e.to_string()))?;
        if status >= 500 {
            return Err(FacturaError::Transport(format!(
                "billService returned HTTP {status}"
            )));
        }
        parse_response(&body)
    }

    /// Interpret a fault per the §4.5 mapping. Observation faults resolve
    /// to a synthetic CDR outcome so the state machine lands on
    /// `ACCEPTED_WITH_OBSERVATIONS`; unknown faults are treated as
    /// rejections with the fault string preserved verbatim.
    fn fault_to_error(fault: envelope::SoapFault) -> Result<SubmitOutcome, FacturaError> {
        match fault.kind() {
            FaultKind::Transport => Err(FacturaError::Transport(fault.message)),
            FaultKind::AcceptedWithObservations => Ok(SubmitOutcome::Cdr(Cdr {
                response_code: fault
                    .code
                    .rsplit(['.', ':'])
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                description: fault.message,
            })),
            FaultKind::Rejected | FaultKind::Unknown => Err(FacturaError::Rejected {
                code: fault.code,
                message: fault.message,
            }),
        }
    }

    fn status_from_response(response: SoapResponse) -> Result<TicketStatus, FacturaError> {
        if let Some(fault) = response.fault {
            return match fault.kind() {
                FaultKind::Transport => Err(FacturaError::Transport(fault.message)),
                _ => Err(FacturaError::Rejected {
                    code: fault.code,
                    message: fault.message,
                }),
            };
        }
        let status_code = response
            .status_code
            .ok_or_else(|| FacturaError::Xml("status response has no statusCode".into()))?;
        let (cdr, cdr_zip) = match response.content {
            Some(content) => {
                let zip = BASE64
                    .decode(content.as_bytes())
                    .map_err(|e| FacturaError::Xml(format!("bad CDR encoding: {e}")))?;
                let xml = cdr::extract_cdr_xml(&zip)?;
                (Some(cdr::parse_application_response(&xml)?), Some(zip))
            }
            None => (None, None),
        };
        Ok(TicketStatus {
            status_code,
            message: response.status_message,
            cdr,
            cdr_zip,
        })
    }
}

#[async_trait]
impl BillService for SunatClient {
    async fn send_bill(
        &self,
        file_name: &str,
        signed_xml: &[u8],
    ) -> Result<SubmitOutcome, FacturaError> {
        let zip = cdr::package_zip(file_name, signed_xml)?;
        let content = BASE64.encode(zip);
        let operation = Operation::SendBill {
            file_name,
            content: &content,
        };
        let envelope = build_envelope(&self.username, &self.password, &operation)?;

        // sendBill is not idempotent: retry only while the request provably
        // never reached the endpoint (connect/timeout), never after a
        // response arrived.
        let mut attempt = 0;
        let (status, body) = loop {
            match self.post(envelope.clone()).await {
                Ok(result) => break result,
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay(attempt);
                    warn!(attempt, ?delay, error = %e, "sendBill never sent, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(FacturaError::Transport(e.to_string())),
            }
        };
        if status >= 500 {
            return Err(FacturaError::Transport(format!(
                "billService returned HTTP {status}"
            )));
        }

        let response = parse_response(&body)?;
        if let Some(fault) = response.fault {
            return Self::fault_to_error(fault);
        }
        if let Some(ticket) = response.ticket {
            debug!(%ticket, %file_name, "sendBill accepted");
            return Ok(SubmitOutcome::Ticket(ticket));
        }
        if let Some(content) = response.application_response {
            let zip = BASE64
                .decode(content.as_bytes())
                .map_err(|e| FacturaError::Xml(format!("bad CDR encoding: {e}")))?;
            let xml = cdr::extract_cdr_xml(&zip)?;
            return Ok(SubmitOutcome::Cdr(cdr::parse_application_response(&xml)?));
        }
        Err(FacturaError::Xml(
            "sendBill response has neither ticket nor applicationResponse".into(),
        ))
    }

    async fn get_status(&self, ticket: &str) -> Result<TicketStatus, FacturaError> {
        with_retry(&self.retry, || async move {
            let response = self.call(&Operation::GetStatus { ticket }).await?;
            Self::status_from_response(response)
        })
        .await
    }

    async fn get_status_cdr(
        &self,
        ruc: &str,
        doc_type: &str,
        series: &str,
        number: u32,
    ) -> Result<TicketStatus, FacturaError> {
        let number = number.to_string();
        with_retry(&self.retry, || {
            let number = number.clone();
            async move {
                let response = self
                    .call(&Operation::GetStatusCdr {
                        ruc,
                        doc_type,
                        series,
                        number: &number,
                    })
                    .await?;
                Self::status_from_response(response)
            }
        })
        .await
    }
}
