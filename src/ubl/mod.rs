//! UBL 2.1 document generation for SUNAT CPE.
//!
//! The document is modeled as an explicit ordered element tree
//! ([`model::Element`]) rather than serde structs: signature digests are
//! computed over the serialized bytes, so attribute order and namespace
//! placement must be deterministic and fully under our control.
//!
//! # Pipeline position
//!
//! ```no_run
//! use facturador::core::Document;
//! use facturador::ubl;
//!
//! let doc: Document = todo!(); // admitted by the service
//! let tree = ubl::build_document(&doc).unwrap();
//! let xml = ubl::serialize_document(&tree).unwrap();
//! ```

mod builder;
mod model;
mod serialize;

pub use builder::build_document;
pub use model::{parse_document, Element, Node, EXTENSION_SLOT_PATH};
pub use serialize::{format_money, format_percent, format_quantity, serialize_document};

/// UBL version emitted in `cbc:UBLVersionID`.
pub const UBL_VERSION: &str = "2.1";

/// SUNAT customization emitted in `cbc:CustomizationID`.
pub const CUSTOMIZATION_ID: &str = "2.0";

/// Catalog 17 operation type for domestic sale (`cbc:ProfileID`).
pub const PROFILE_DOMESTIC_SALE: &str = "0101";

/// Id of the `cac:Signature` block and of the XAdES `ds:Signature`.
pub const SIGNATURE_PARTY_ID: &str = "IDSignSP";

/// Namespace URIs declared on every document root, in the fixed
/// declaration order `xmlns, cac, cbc, ccts, ds, ext, qdt, udt, xsi`.
pub mod ns {
    /// UBL Invoice root namespace.
    pub const INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    /// UBL CreditNote root namespace.
    pub const CREDIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2";
    /// UBL DebitNote root namespace.
    pub const DEBIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:DebitNote-2";
    /// Common Aggregate Components.
    pub const CAC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    /// Common Basic Components.
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
    /// Core Component Technical Specification.
    pub const CCTS: &str = "urn:un:unece:uncefact:documentation:2";
    /// XML digital signatures.
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
    /// UBL extension components.
    pub const EXT: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
    /// Qualified datatypes.
    pub const QDT: &str = "urn:oasis:names:specification:ubl:schema:xsd:QualifiedDatatypes-2";
    /// Unqualified datatypes.
    pub const UDT: &str =
        "urn:un:unece:uncefact:data:specification:UnqualifiedDataTypesSchemaModule:2";
    /// XML Schema instance.
    pub const XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
}

/// SUNAT catalog URIs referenced from code-list attributes.
pub mod catalog_uri {
    pub const CATALOG_01: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo01";
    pub const CATALOG_06: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo06";
    pub const CATALOG_07: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo07";
    pub const CATALOG_09: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo09";
    pub const CATALOG_10: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo10";
    pub const CATALOG_16: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo16";
    pub const CATALOG_17: &str = "urn:pe:gob:sunat:cpe:see:gem:catalogos:catalogo17";
}
