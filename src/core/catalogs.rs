//! SUNAT catalog code lists.
//!
//! Every closed enumeration from the CPE catalogs used by this crate is
//! modeled as a tagged variant with a forward/backward code mapping:
//! catalog 01 (document types), catalog 06 (identity documents), catalog 07
//! (IGV affectation), catalogs 09/10 (note reasons), catalog 16 (price
//! types), plus the UN/ECE 5153 tax schemes and the two currencies the
//! service operates in.

use serde::{Deserialize, Serialize};

/// Catalog 01 — document type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// 01 — Factura electrónica.
    #[serde(rename = "01")]
    Factura,
    /// 03 — Boleta de venta electrónica.
    #[serde(rename = "03")]
    Boleta,
    /// 07 — Nota de crédito electrónica.
    #[serde(rename = "07")]
    CreditNote,
    /// 08 — Nota de débito electrónica.
    #[serde(rename = "08")]
    DebitNote,
}

impl DocumentType {
    /// Catalog 01 two-digit code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Factura => "01",
            Self::Boleta => "03",
            Self::CreditNote => "07",
            Self::DebitNote => "08",
        }
    }

    /// Parse from a catalog 01 code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Factura),
            "03" => Some(Self::Boleta),
            "07" => Some(Self::CreditNote),
            "08" => Some(Self::DebitNote),
            _ => None,
        }
    }

    /// Whether this type is a credit or debit note.
    pub fn is_note(&self) -> bool {
        matches!(self, Self::CreditNote | Self::DebitNote)
    }

    /// Infer the type of a referenced document from its series prefix
    /// (`F001-123` → factura, `B001-1` → boleta).
    pub fn from_series_prefix(series: &str) -> Option<Self> {
        match series.as_bytes().first() {
            Some(b'F') => Some(Self::Factura),
            Some(b'B') => Some(Self::Boleta),
            _ => None,
        }
    }
}

/// Catalog 06 — identity document kinds accepted for recipients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityDocKind {
    /// DNI — documento nacional de identidad (8 digits).
    #[serde(rename = "DNI")]
    Dni,
    /// RUC — registro único de contribuyentes (11 digits).
    #[serde(rename = "RUC")]
    Ruc,
    /// CE — carné de extranjería.
    #[serde(rename = "CE")]
    ForeignerCard,
    /// PASS — pasaporte.
    #[serde(rename = "PASS")]
    Passport,
}

impl IdentityDocKind {
    /// Catalog 06 code emitted in `AdditionalAccountID` and
    /// `CompanyID@schemeID`.
    pub fn catalog06_code(&self) -> &'static str {
        match self {
            Self::Dni => "1",
            Self::Ruc => "6",
            Self::ForeignerCard => "4",
            Self::Passport => "7",
        }
    }

    /// Parse from a catalog 06 code string.
    pub fn from_catalog06_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Dni),
            "6" => Some(Self::Ruc),
            "4" => Some(Self::ForeignerCard),
            "7" => Some(Self::Passport),
            _ => None,
        }
    }
}

/// Catalog 07 — IGV affectation of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IgvAffectation {
    /// 10 — Gravado, operación onerosa (standard 18 % rate).
    #[serde(rename = "10")]
    Taxed,
    /// 20 — Exonerado, operación onerosa.
    #[serde(rename = "20")]
    Exempt,
    /// 30 — Inafecto, operación onerosa.
    #[serde(rename = "30")]
    Inaffected,
    /// 40 — Exportación de bienes o servicios.
    #[serde(rename = "40")]
    Export,
}

impl IgvAffectation {
    /// Catalog 07 code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Taxed => "10",
            Self::Exempt => "20",
            Self::Inaffected => "30",
            Self::Export => "40",
        }
    }

    /// Parse from a catalog 07 code string.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "10" => Some(Self::Taxed),
            "20" => Some(Self::Exempt),
            "30" => Some(Self::Inaffected),
            "40" => Some(Self::Export),
            _ => None,
        }
    }

    /// UN/ECE 5305 category letter for `TaxCategory/ID`.
    pub fn category_code(&self) -> &'static str {
        match self {
            Self::Taxed => "S",
            Self::Exempt => "E",
            Self::Inaffected => "O",
            Self::Export => "G",
        }
    }

    /// The tax scheme this affectation contributes to.
    pub fn tax_scheme(&self) -> TaxSchemeKind {
        match self {
            Self::Taxed => TaxSchemeKind::Igv,
            Self::Exempt | Self::Inaffected | Self::Export => TaxSchemeKind::Other,
        }
    }

    /// Whether lines under this affectation carry IGV.
    pub fn bears_igv(&self) -> bool {
        matches!(self, Self::Taxed)
    }
}

/// UN/ECE 5153 tax scheme identifiers used in `TaxScheme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaxSchemeKind {
    /// 1000 — IGV (the 18 % value-added tax).
    Igv,
    /// 2000 — ISC (selective consumption tax).
    Isc,
    /// 9999 — Otros conceptos.
    Other,
}

impl TaxSchemeKind {
    pub fn id(&self) -> &'static str {
        match self {
            Self::Igv => "1000",
            Self::Isc => "2000",
            Self::Other => "9999",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Igv => "IGV",
            Self::Isc => "ISC",
            Self::Other => "OTROS",
        }
    }

    /// UN/ECE 5153 tax type code.
    pub fn type_code(&self) -> &'static str {
        match self {
            Self::Igv => "VAT",
            Self::Isc => "EXC",
            Self::Other => "OTH",
        }
    }
}

/// Catalog 16 — price type on `PricingReference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceType {
    /// 01 — Precio unitario (incluye el IGV).
    #[serde(rename = "01")]
    IncludesIgv,
    /// 02 — Valor referencial unitario en operaciones no onerosas (gratuitas).
    #[serde(rename = "02")]
    FreeOfCharge,
}

impl PriceType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::IncludesIgv => "01",
            Self::FreeOfCharge => "02",
        }
    }
}

/// Catalog 09 — credit note reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditNoteReason {
    /// 01 — Anulación de la operación.
    #[serde(rename = "01")]
    Annulment,
    /// 02 — Anulación por error en el RUC.
    #[serde(rename = "02")]
    RucError,
    /// 03 — Corrección por error en la descripción.
    #[serde(rename = "03")]
    DescriptionCorrection,
    /// 04 — Descuento global.
    #[serde(rename = "04")]
    GlobalDiscount,
    /// 05 — Descuento por ítem.
    #[serde(rename = "05")]
    ItemDiscount,
    /// 06 — Devolución total.
    #[serde(rename = "06")]
    TotalReturn,
    /// 07 — Devolución por ítem.
    #[serde(rename = "07")]
    ItemReturn,
    /// 08 — Bonificación.
    #[serde(rename = "08")]
    Bonus,
    /// 09 — Disminución en el valor.
    #[serde(rename = "09")]
    ValueDecrease,
    /// 10 — Otros conceptos.
    #[serde(rename = "10")]
    Other,
}

impl CreditNoteReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Annulment => "01",
            Self::RucError => "02",
            Self::DescriptionCorrection => "03",
            Self::GlobalDiscount => "04",
            Self::ItemDiscount => "05",
            Self::TotalReturn => "06",
            Self::ItemReturn => "07",
            Self::Bonus => "08",
            Self::ValueDecrease => "09",
            Self::Other => "10",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Annulment),
            "02" => Some(Self::RucError),
            "03" => Some(Self::DescriptionCorrection),
            "04" => Some(Self::GlobalDiscount),
            "05" => Some(Self::ItemDiscount),
            "06" => Some(Self::TotalReturn),
            "07" => Some(Self::ItemReturn),
            "08" => Some(Self::Bonus),
            "09" => Some(Self::ValueDecrease),
            "10" => Some(Self::Other),
            _ => None,
        }
    }
}

/// Catalog 10 — debit note reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DebitNoteReason {
    /// 01 — Intereses por mora.
    #[serde(rename = "01")]
    LateInterest,
    /// 02 — Aumento en el valor.
    #[serde(rename = "02")]
    ValueIncrease,
    /// 03 — Penalidades / otros conceptos.
    #[serde(rename = "03")]
    Penalties,
}

impl DebitNoteReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::LateInterest => "01",
            Self::ValueIncrease => "02",
            Self::Penalties => "03",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::LateInterest),
            "02" => Some(Self::ValueIncrease),
            "03" => Some(Self::Penalties),
            _ => None,
        }
    }
}

/// ISO 4217 currencies the service issues documents in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Currency {
    /// Peruvian sol.
    #[serde(rename = "PEN")]
    Pen,
    /// US dollar.
    #[serde(rename = "USD")]
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Pen => "PEN",
            Self::Usd => "USD",
        }
    }
}

/// Check whether `code` is a known UN/ECE Rec 20 unit code.
pub fn is_known_unit_code(code: &str) -> bool {
    COMMON_UNIT_CODES.binary_search(&code).is_ok()
}

/// UN/ECE Rec 20 unit codes accepted on invoice lines (sorted for binary
/// search). "NIU" (number of international units) is the default.
static COMMON_UNIT_CODES: &[&str] = &[
    "BX",  // Box
    "C62", // One (unit)
    "CEN", // Hundred
    "CMK", // Square centimetre
    "CMQ", // Cubic centimetre
    "CMT", // Centimetre
    "DAY", // Day
    "DZN", // Dozen
    "GLL", // Gallon (US)
    "GRM", // Gram
    "HUR", // Hour
    "KGM", // Kilogram
    "KTM", // Kilometre
    "KWH", // Kilowatt hour
    "LBR", // Pound
    "LTR", // Litre
    "MGM", // Milligram
    "MIL", // Thousand
    "MLT", // Millilitre
    "MMT", // Millimetre
    "MTK", // Square metre
    "MTQ", // Cubic metre
    "MTR", // Metre
    "NIU", // Number of international units
    "ONZ", // Ounce
    "PK",  // Pack
    "SET", // Set
    "TNE", // Tonne
    "ZZ",  // Mutually defined
];
