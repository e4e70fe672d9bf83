use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::catalogs::{Currency, DocumentType, IdentityDocKind, IgvAffectation};
use super::status::DocumentStatus;

/// The company issuing the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issuer {
    /// 11-digit RUC.
    pub ruc: String,
    /// Legal name.
    #[serde(rename = "razon_social")]
    pub name: String,
    /// Fiscal address.
    #[serde(rename = "direccion")]
    pub address: String,
}

/// The customer receiving the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
    /// Identity document kind (catalog 06).
    #[serde(rename = "tipo_doc")]
    pub doc_kind: IdentityDocKind,
    /// Identity document number.
    #[serde(rename = "num_doc")]
    pub doc_number: String,
    /// Legal name.
    #[serde(rename = "nombre")]
    pub name: String,
}

/// A single item line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Line {
    /// Seller's item code, if any.
    #[serde(rename = "codigo", default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Item description.
    #[serde(rename = "descripcion")]
    pub description: String,
    /// Invoiced quantity.
    #[serde(rename = "cantidad")]
    pub quantity: Decimal,
    /// UN/ECE Rec 20 unit code.
    #[serde(rename = "unidad", default = "default_unit_code")]
    pub unit_code: String,
    /// Unit price including IGV (catalog 16 code 01).
    #[serde(rename = "valor_unitario")]
    pub unit_price: Decimal,
    /// Line net amount (without IGV).
    #[serde(rename = "valor_total")]
    pub net: Decimal,
    /// IGV carried by this line.
    pub igv: Decimal,
    /// Catalog 07 IGV affectation.
    #[serde(rename = "tipo_afectacion", default = "default_affectation")]
    pub affectation: IgvAffectation,
}

fn default_unit_code() -> String {
    "NIU".to_string()
}

fn default_affectation() -> IgvAffectation {
    IgvAffectation::Taxed
}

/// Monetary totals for the whole document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Totals {
    /// Gross taxable base (sum of line nets).
    #[serde(rename = "gravado")]
    pub gross: Decimal,
    /// Total IGV.
    pub igv: Decimal,
    /// Overall payable amount.
    pub total: Decimal,
}

/// Reason block carried by credit and debit notes.
///
/// `reason_code` is a catalog 09 code for credit notes and a catalog 10
/// code for debit notes; validation resolves it against the right catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    /// Referenced document id in `SERIE-NUMBER` form (e.g. `F001-123`).
    #[serde(rename = "nro_comprobante_afectado")]
    pub reference_id: String,
    /// Catalog 09 / 10 reason code.
    #[serde(rename = "codigo_motivo")]
    pub reason_code: String,
    /// Free-text description of the reason.
    #[serde(rename = "descripcion_motivo")]
    pub description: String,
}

/// Business content of a document as admitted from the caller.
///
/// The service assigns id, issue timestamp and lifecycle fields on
/// admission; callers never supply them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDocument {
    /// Catalog 01 document type.
    #[serde(rename = "tipo_comprobante")]
    pub doc_type: DocumentType,
    /// Series (e.g. `F001`).
    #[serde(rename = "serie")]
    pub series: String,
    /// Correlative number, 1..=99_999_999.
    #[serde(rename = "numero")]
    pub number: u32,
    /// Document currency.
    #[serde(rename = "moneda")]
    pub currency: Currency,
    #[serde(rename = "emisor")]
    pub issuer: Issuer,
    #[serde(rename = "receptor")]
    pub recipient: Recipient,
    /// Present on credit and debit notes only.
    #[serde(
        rename = "motivo_o_sustento",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub discrepancy: Option<Discrepancy>,
    #[serde(rename = "items")]
    pub lines: Vec<Line>,
    #[serde(rename = "totales")]
    pub totals: Totals,
}

/// A persisted document record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Locally generated opaque id.
    pub id: String,
    #[serde(rename = "tipo_comprobante")]
    pub doc_type: DocumentType,
    #[serde(rename = "serie")]
    pub series: String,
    #[serde(rename = "numero")]
    pub number: u32,
    /// Civil date and wall clock taken at service admission.
    #[serde(rename = "fecha_emision")]
    pub issue_date: NaiveDateTime,
    #[serde(rename = "moneda")]
    pub currency: Currency,
    #[serde(rename = "emisor")]
    pub issuer: Issuer,
    #[serde(rename = "receptor")]
    pub recipient: Recipient,
    #[serde(
        rename = "motivo_o_sustento",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub discrepancy: Option<Discrepancy>,
    #[serde(rename = "items")]
    pub lines: Vec<Line>,
    #[serde(rename = "totales")]
    pub totals: Totals,
    #[serde(rename = "estado")]
    pub status: DocumentStatus,
    /// SUNAT ticket, set once upon submission.
    #[serde(rename = "ticket_id", default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<String>,
    #[serde(rename = "creado_en")]
    pub created_at: NaiveDateTime,
    #[serde(rename = "actualizado_en")]
    pub last_updated: NaiveDateTime,
}

impl NewDocument {
    /// Promote the admitted content to a persisted record.
    pub fn into_document(self, id: String, now: NaiveDateTime) -> Document {
        Document {
            id,
            doc_type: self.doc_type,
            series: self.series,
            number: self.number,
            issue_date: now,
            currency: self.currency,
            issuer: self.issuer,
            recipient: self.recipient,
            discrepancy: self.discrepancy,
            lines: self.lines,
            totals: self.totals,
            status: DocumentStatus::Received,
            ticket: None,
            created_at: now,
            last_updated: now,
        }
    }
}

impl Document {
    /// The `SERIE-NUMBER` identifier emitted as `cbc:ID`.
    pub fn ubl_id(&self) -> String {
        format!("{}-{}", self.series, self.number)
    }

    /// The prescribed exchange filename:
    /// `{RUC}-{TypeCode}-{Series}-{Number}.xml`, number not zero-padded.
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}-{}.xml",
            self.issuer.ruc,
            self.doc_type.code(),
            self.series,
            self.number
        )
    }
}
