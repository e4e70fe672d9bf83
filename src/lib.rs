//! # facturador
//!
//! Peruvian electronic invoicing (SUNAT CPE): issues facturas, boletas,
//! and credit/debit notes against the national tax authority's SOAP
//! endpoint.
//!
//! The pipeline: a domain record becomes a UBL 2.1 tree, is serialized
//! deterministically, signed with an enveloped XAdES-BES signature inside
//! the `ext:UBLExtensions` slot, packaged in a flat ZIP, and exchanged
//! over SOAP with ticket-based CDR retrieval.
//!
//! All monetary values use [`rust_decimal::Decimal`] — never floating
//! point.
//!
//! ## Quick start
//!
//! ```rust
//! use facturador::core::*;
//! use facturador::ubl;
//! use rust_decimal_macros::dec;
//!
//! let doc = DocumentBuilder::new(DocumentType::Factura, "F001", 123)
//!     .issuer(Issuer {
//!         ruc: "20123456789".into(),
//!         name: "ACME SAC".into(),
//!         address: "Av. Arequipa 123, Lima".into(),
//!     })
//!     .recipient(Recipient {
//!         doc_kind: IdentityDocKind::Ruc,
//!         doc_number: "20987654321".into(),
//!         name: "Cliente SA".into(),
//!     })
//!     .add_line(LineBuilder::new("Consultoría", dec!(1), dec!(118.00)).build())
//!     .build();
//!
//! assert!(validate(&doc).is_empty());
//! assert_eq!(doc.totals.total, dec!(118.00));
//!
//! let record = doc.into_document(
//!     "id-1".into(),
//!     chrono::NaiveDate::from_ymd_opt(2025, 3, 10).unwrap().and_hms_opt(10, 0, 0).unwrap(),
//! );
//! let xml = ubl::serialize_document(&ubl::build_document(&record).unwrap()).unwrap();
//! assert!(xml.starts_with(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
//! ```

pub mod config;
pub mod core;
pub mod http;
pub mod service;
pub mod signer;
pub mod storage;
pub mod sunat;
pub mod ubl;

// Re-export core types at crate root for convenience
pub use crate::core::*;
