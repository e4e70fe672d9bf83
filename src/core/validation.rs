use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::catalogs::{
    is_known_unit_code, CreditNoteReason, DebitNoteReason, DocumentType, IdentityDocKind,
};
use super::error::ValidationError;
use super::types::NewDocument;

/// Absolute tolerance for monetary cross-checks.
const MONEY_TOLERANCE: Decimal = dec!(0.01);

/// Standard IGV rate.
const IGV_RATE: Decimal = dec!(0.18);

/// Maximum correlative number.
const MAX_NUMBER: u32 = 99_999_999;

/// Validate an admitted document against the issuing rules.
/// Returns all validation errors found (not just the first).
pub fn validate(doc: &NewDocument) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    validate_series(doc, &mut errors);

    if doc.number == 0 || doc.number > MAX_NUMBER {
        errors.push(ValidationError::new(
            "numero",
            format!("number must be between 1 and {MAX_NUMBER}"),
        ));
    }

    // Issuer
    if !is_ruc(&doc.issuer.ruc) {
        errors.push(ValidationError::new(
            "emisor.ruc",
            "RUC must be exactly 11 digits",
        ));
    }
    if doc.issuer.name.trim().is_empty() {
        errors.push(ValidationError::new(
            "emisor.razon_social",
            "issuer legal name must not be empty",
        ));
    }

    // Recipient
    validate_recipient(doc, &mut errors);

    // Lines
    if doc.lines.is_empty() {
        errors.push(ValidationError::new(
            "items",
            "document must have at least one line",
        ));
    }
    for (i, line) in doc.lines.iter().enumerate() {
        if line.description.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("items[{i}].descripcion"),
                "description must not be empty",
            ));
        }
        if line.quantity <= Decimal::ZERO {
            errors.push(ValidationError::new(
                format!("items[{i}].cantidad"),
                "quantity must be greater than zero",
            ));
        }
        if line.unit_price < Decimal::ZERO {
            errors.push(ValidationError::new(
                format!("items[{i}].valor_unitario"),
                "unit price must not be negative",
            ));
        }
        if !is_known_unit_code(&line.unit_code) {
            errors.push(ValidationError::new(
                format!("items[{i}].unidad"),
                format!("'{}' is not a known UN/ECE unit code", line.unit_code),
            ));
        }
    }

    validate_totals(doc, &mut errors);
    validate_discrepancy(doc, &mut errors);

    errors
}

fn validate_series(doc: &NewDocument, errors: &mut Vec<ValidationError>) {
    let series = doc.series.as_str();
    let ok = match doc.doc_type {
        DocumentType::Factura => is_series_with_prefix(series, b'F'),
        DocumentType::Boleta => is_series_with_prefix(series, b'B'),
        // Note series are four uppercase alphanumerics led by the letter of
        // the referenced document family (covers FC01, BC01, FD01, ...).
        DocumentType::CreditNote | DocumentType::DebitNote => is_note_series(series),
    };
    if !ok {
        errors.push(ValidationError::new(
            "serie",
            format!(
                "'{series}' is not a valid series for document type {}",
                doc.doc_type.code()
            ),
        ));
    }
}

fn validate_recipient(doc: &NewDocument, errors: &mut Vec<ValidationError>) {
    let recipient = &doc.recipient;
    let num = recipient.doc_number.as_str();
    let ok = match recipient.doc_kind {
        IdentityDocKind::Dni => num.len() == 8 && num.bytes().all(|b| b.is_ascii_digit()),
        IdentityDocKind::Ruc => is_ruc(num),
        IdentityDocKind::ForeignerCard | IdentityDocKind::Passport => {
            !num.is_empty() && num.len() <= 15 && num.bytes().all(|b| b.is_ascii_alphanumeric())
        }
    };
    if !ok {
        errors.push(ValidationError::new(
            "receptor.num_doc",
            format!(
                "'{num}' is not a valid {:?} number",
                recipient.doc_kind
            ),
        ));
    }
    if recipient.name.trim().is_empty() {
        errors.push(ValidationError::new(
            "receptor.nombre",
            "recipient name must not be empty",
        ));
    }
}

fn validate_totals(doc: &NewDocument, errors: &mut Vec<ValidationError>) {
    let line_net_sum: Decimal = doc.lines.iter().map(|l| l.net).sum();
    if (line_net_sum - doc.totals.gross).abs() > MONEY_TOLERANCE {
        errors.push(ValidationError::new(
            "totales.gravado",
            format!(
                "gross {} does not match sum of line nets {}",
                doc.totals.gross, line_net_sum
            ),
        ));
    }

    // The 18 % cross-check only holds when every line is standard-taxed.
    // Each line may carry up to half a cent of rounding, so the tolerance
    // scales with the line count.
    if !doc.lines.is_empty() && doc.lines.iter().all(|l| l.affectation.bears_igv()) {
        let expected_igv = (doc.totals.gross * IGV_RATE).round_dp(2);
        let tolerance = MONEY_TOLERANCE * Decimal::from(doc.lines.len());
        if (doc.totals.igv - expected_igv).abs() > tolerance {
            errors.push(ValidationError::new(
                "totales.igv",
                format!(
                    "IGV {} is not 18% of the gross base (expected {})",
                    doc.totals.igv, expected_igv
                ),
            ));
        }
    }

    let expected_total = doc.totals.gross + doc.totals.igv;
    if (doc.totals.total - expected_total).abs() > MONEY_TOLERANCE {
        errors.push(ValidationError::new(
            "totales.total",
            format!(
                "total {} does not equal gross + IGV ({expected_total})",
                doc.totals.total
            ),
        ));
    }
}

fn validate_discrepancy(doc: &NewDocument, errors: &mut Vec<ValidationError>) {
    match (&doc.discrepancy, doc.doc_type.is_note()) {
        (None, true) => {
            errors.push(ValidationError::new(
                "motivo_o_sustento",
                "credit and debit notes require a discrepancy block",
            ));
        }
        (Some(_), false) => {
            errors.push(ValidationError::new(
                "motivo_o_sustento",
                "only credit and debit notes carry a discrepancy block",
            ));
        }
        (Some(d), true) => {
            match parse_reference_id(&d.reference_id) {
                Some((ref_series, _)) => {
                    // The note family must agree with the referenced series
                    // (F-series notes amend facturas, B-series boletas).
                    if doc.series.as_bytes().first() != ref_series.as_bytes().first() {
                        errors.push(ValidationError::new(
                            "motivo_o_sustento.nro_comprobante_afectado",
                            format!(
                                "note series '{}' is not compatible with referenced document '{}'",
                                doc.series, d.reference_id
                            ),
                        ));
                    }
                }
                None => {
                    errors.push(ValidationError::new(
                        "motivo_o_sustento.nro_comprobante_afectado",
                        format!("'{}' is not a valid SERIE-NUMBER reference", d.reference_id),
                    ));
                }
            }
            let reason_known = match doc.doc_type {
                DocumentType::CreditNote => CreditNoteReason::from_code(&d.reason_code).is_some(),
                DocumentType::DebitNote => DebitNoteReason::from_code(&d.reason_code).is_some(),
                _ => unreachable!("guarded by is_note"),
            };
            if !reason_known {
                errors.push(ValidationError::new(
                    "motivo_o_sustento.codigo_motivo",
                    format!(
                        "'{}' is not a known reason code for document type {}",
                        d.reason_code,
                        doc.doc_type.code()
                    ),
                ));
            }
        }
        (None, false) => {}
    }
}

/// Exactly 11 ASCII digits.
pub fn is_ruc(value: &str) -> bool {
    value.len() == 11 && value.bytes().all(|b| b.is_ascii_digit())
}

/// `{prefix}` followed by three digits, e.g. `F001` / `B001`.
fn is_series_with_prefix(series: &str, prefix: u8) -> bool {
    let b = series.as_bytes();
    b.len() == 4 && b[0] == prefix && b[1..].iter().all(u8::is_ascii_digit)
}

/// Four uppercase alphanumerics starting with `F` or `B`, e.g. `FC01`.
fn is_note_series(series: &str) -> bool {
    let b = series.as_bytes();
    b.len() == 4
        && matches!(b[0], b'F' | b'B')
        && b[1..]
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Split a `SERIE-NUMBER` reference into its parts, checking both.
pub fn parse_reference_id(reference: &str) -> Option<(&str, u32)> {
    let (series, number) = reference.split_once('-')?;
    let b = series.as_bytes();
    let series_ok = b.len() == 4
        && b[0].is_ascii_uppercase()
        && b[1..]
            .iter()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
    if !series_ok {
        return None;
    }
    let number: u32 = number.parse().ok()?;
    if number == 0 || number > MAX_NUMBER {
        return None;
    }
    Some((series, number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::{DocumentBuilder, LineBuilder};
    use crate::core::catalogs::Currency;
    use crate::core::types::{Issuer, Recipient, Totals};

    fn issuer() -> Issuer {
        Issuer {
            ruc: "20123456789".into(),
            name: "ACME SAC".into(),
            address: "Av. Arequipa 123, Lima".into(),
        }
    }

    fn ruc_recipient() -> Recipient {
        Recipient {
            doc_kind: IdentityDocKind::Ruc,
            doc_number: "20987654321".into(),
            name: "Cliente SA".into(),
        }
    }

    fn valid_factura() -> NewDocument {
        DocumentBuilder::new(DocumentType::Factura, "F001", 123)
            .currency(Currency::Pen)
            .issuer(issuer())
            .recipient(ruc_recipient())
            .add_line(LineBuilder::new("Consultoría", dec!(1), dec!(118.00)).build())
            .build()
    }

    #[test]
    fn valid_factura_passes() {
        assert!(validate(&valid_factura()).is_empty());
    }

    #[test]
    fn bad_ruc_rejected() {
        let mut doc = valid_factura();
        doc.issuer.ruc = "123".into();
        let errors = validate(&doc);
        assert!(errors.iter().any(|e| e.field == "emisor.ruc"));
    }

    #[test]
    fn series_must_match_type() {
        let mut doc = valid_factura();
        doc.series = "B001".into();
        assert!(validate(&doc).iter().any(|e| e.field == "serie"));

        doc.series = "F01".into();
        assert!(validate(&doc).iter().any(|e| e.field == "serie"));
    }

    #[test]
    fn number_range_enforced() {
        let mut doc = valid_factura();
        doc.number = 0;
        assert!(validate(&doc).iter().any(|e| e.field == "numero"));
        doc.number = 100_000_000;
        assert!(validate(&doc).iter().any(|e| e.field == "numero"));
    }

    #[test]
    fn dni_number_length_checked() {
        let mut doc = valid_factura();
        doc.doc_type = DocumentType::Boleta;
        doc.series = "B001".into();
        doc.recipient = Recipient {
            doc_kind: IdentityDocKind::Dni,
            doc_number: "1234567".into(),
            name: "Juan Pérez".into(),
        };
        assert!(validate(&doc).iter().any(|e| e.field == "receptor.num_doc"));
    }

    #[test]
    fn empty_lines_rejected() {
        let mut doc = valid_factura();
        doc.lines.clear();
        doc.totals = Totals {
            gross: Decimal::ZERO,
            igv: Decimal::ZERO,
            total: Decimal::ZERO,
        };
        assert!(validate(&doc).iter().any(|e| e.field == "items"));
    }

    #[test]
    fn gross_must_match_line_sum() {
        let mut doc = valid_factura();
        doc.totals.gross = dec!(90.00);
        doc.totals.total = dec!(108.00);
        assert!(validate(&doc).iter().any(|e| e.field == "totales.gravado"));
    }

    #[test]
    fn igv_rate_cross_checked() {
        let mut doc = valid_factura();
        doc.totals.igv = dec!(10.00);
        doc.totals.total = dec!(110.00);
        assert!(validate(&doc).iter().any(|e| e.field == "totales.igv"));
    }

    #[test]
    fn tolerance_absorbs_rounding() {
        let mut doc = valid_factura();
        doc.totals.igv = dec!(18.01);
        doc.totals.total = dec!(118.01);
        assert!(validate(&doc).is_empty());
    }

    #[test]
    fn credit_note_needs_discrepancy() {
        let doc = DocumentBuilder::new(DocumentType::CreditNote, "FC01", 1)
            .issuer(issuer())
            .recipient(ruc_recipient())
            .add_line(LineBuilder::new("Anulación", dec!(1), dec!(118.00)).build())
            .build();
        assert!(validate(&doc)
            .iter()
            .any(|e| e.field == "motivo_o_sustento"));
    }

    #[test]
    fn credit_note_with_valid_reference_passes() {
        let doc = DocumentBuilder::new(DocumentType::CreditNote, "FC01", 1)
            .issuer(issuer())
            .recipient(ruc_recipient())
            .discrepancy("F001-123", "01", "Anulación de la operación")
            .add_line(LineBuilder::new("Anulación", dec!(1), dec!(118.00)).build())
            .build();
        assert!(validate(&doc).is_empty());
    }

    #[test]
    fn note_family_must_match_reference() {
        let doc = DocumentBuilder::new(DocumentType::CreditNote, "FC01", 1)
            .issuer(issuer())
            .recipient(ruc_recipient())
            .discrepancy("B001-5", "01", "Anulación")
            .add_line(LineBuilder::new("Anulación", dec!(1), dec!(118.00)).build())
            .build();
        assert!(validate(&doc)
            .iter()
            .any(|e| e.field == "motivo_o_sustento.nro_comprobante_afectado"));
    }

    #[test]
    fn debit_reason_codes_use_catalog_10() {
        let doc = DocumentBuilder::new(DocumentType::DebitNote, "FD01", 1)
            .issuer(issuer())
            .recipient(ruc_recipient())
            // "04" exists in catalog 09 but not in catalog 10.
            .discrepancy("F001-123", "04", "Descuento global")
            .add_line(LineBuilder::new("Interés", dec!(1), dec!(11.80)).build())
            .build();
        assert!(validate(&doc)
            .iter()
            .any(|e| e.field == "motivo_o_sustento.codigo_motivo"));
    }

    #[test]
    fn reference_id_parsing() {
        assert_eq!(parse_reference_id("F001-123"), Some(("F001", 123)));
        assert_eq!(parse_reference_id("FC01-1"), Some(("FC01", 1)));
        assert_eq!(parse_reference_id("F001-0"), None);
        assert_eq!(parse_reference_id("F001123"), None);
        assert_eq!(parse_reference_id("f001-123"), None);
        assert_eq!(parse_reference_id("F001-123456789"), None);
    }
}
