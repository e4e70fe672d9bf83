use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::catalogs::{Currency, DocumentType, IgvAffectation};
use super::types::{Discrepancy, Issuer, Line, NewDocument, Recipient, Totals};

/// Builder for admitted documents.
///
/// ```
/// use facturador::core::*;
/// use rust_decimal_macros::dec;
///
/// let doc = DocumentBuilder::new(DocumentType::Factura, "F001", 123)
///     .issuer(Issuer {
///         ruc: "20123456789".into(),
///         name: "ACME SAC".into(),
///         address: "Av. Arequipa 123, Lima".into(),
///     })
///     .recipient(Recipient {
///         doc_kind: IdentityDocKind::Ruc,
///         doc_number: "20987654321".into(),
///         name: "Cliente SA".into(),
///     })
///     .add_line(LineBuilder::new("Consultoría", dec!(1), dec!(118.00)).build())
///     .build();
///
/// assert_eq!(doc.totals.total, dec!(118.00));
/// ```
pub struct DocumentBuilder {
    doc_type: DocumentType,
    series: String,
    number: u32,
    currency: Currency,
    issuer: Option<Issuer>,
    recipient: Option<Recipient>,
    discrepancy: Option<Discrepancy>,
    lines: Vec<Line>,
    totals: Option<Totals>,
}

impl DocumentBuilder {
    pub fn new(doc_type: DocumentType, series: impl Into<String>, number: u32) -> Self {
        Self {
            doc_type,
            series: series.into(),
            number,
            currency: Currency::Pen,
            issuer: None,
            recipient: None,
            discrepancy: None,
            lines: Vec::new(),
            totals: None,
        }
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn issuer(mut self, issuer: Issuer) -> Self {
        self.issuer = Some(issuer);
        self
    }

    pub fn recipient(mut self, recipient: Recipient) -> Self {
        self.recipient = Some(recipient);
        self
    }

    /// Reason block for credit/debit notes.
    pub fn discrepancy(
        mut self,
        reference_id: impl Into<String>,
        reason_code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.discrepancy = Some(Discrepancy {
            reference_id: reference_id.into(),
            reason_code: reason_code.into(),
            description: description.into(),
        });
        self
    }

    pub fn add_line(mut self, line: Line) -> Self {
        self.lines.push(line);
        self
    }

    /// Override the computed totals.
    pub fn totals(mut self, totals: Totals) -> Self {
        self.totals = Some(totals);
        self
    }

    /// Finish building. Totals are summed from the lines unless set
    /// explicitly. Placeholder parties are filled in when absent so the
    /// result can always be handed to validation.
    pub fn build(self) -> NewDocument {
        let totals = self.totals.unwrap_or_else(|| compute_totals(&self.lines));
        NewDocument {
            doc_type: self.doc_type,
            series: self.series,
            number: self.number,
            currency: self.currency,
            issuer: self.issuer.unwrap_or(Issuer {
                ruc: String::new(),
                name: String::new(),
                address: String::new(),
            }),
            recipient: self.recipient.unwrap_or(Recipient {
                doc_kind: super::catalogs::IdentityDocKind::Ruc,
                doc_number: String::new(),
                name: String::new(),
            }),
            discrepancy: self.discrepancy,
            lines: self.lines,
            totals,
        }
    }
}

/// Sum document totals from line amounts.
pub fn compute_totals(lines: &[Line]) -> Totals {
    let gross: Decimal = lines.iter().map(|l| l.net).sum();
    let igv: Decimal = lines.iter().map(|l| l.igv).sum();
    Totals {
        gross,
        igv,
        total: gross + igv,
    }
}

/// Builder for item lines. Derives net and IGV from the IGV-inclusive
/// unit price for taxed lines; both can be overridden.
pub struct LineBuilder {
    code: Option<String>,
    description: String,
    quantity: Decimal,
    unit_code: String,
    unit_price: Decimal,
    net: Option<Decimal>,
    igv: Option<Decimal>,
    affectation: IgvAffectation,
}

impl LineBuilder {
    pub fn new(description: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            code: None,
            description: description.into(),
            quantity,
            unit_code: "NIU".to_string(),
            unit_price,
            net: None,
            igv: None,
            affectation: IgvAffectation::Taxed,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn unit(mut self, unit_code: impl Into<String>) -> Self {
        self.unit_code = unit_code.into();
        self
    }

    pub fn affectation(mut self, affectation: IgvAffectation) -> Self {
        self.affectation = affectation;
        self
    }

    pub fn net(mut self, net: Decimal) -> Self {
        self.net = Some(net);
        self
    }

    pub fn igv(mut self, igv: Decimal) -> Self {
        self.igv = Some(igv);
        self
    }

    pub fn build(self) -> Line {
        let total = self.quantity * self.unit_price;
        let net = self.net.unwrap_or_else(|| {
            if self.affectation.bears_igv() {
                (total / dec!(1.18)).round_dp(2)
            } else {
                total.round_dp(2)
            }
        });
        let igv = self.igv.unwrap_or_else(|| {
            if self.affectation.bears_igv() {
                (total.round_dp(2) - net).round_dp(2)
            } else {
                Decimal::ZERO
            }
        });
        Line {
            code: self.code,
            description: self.description,
            quantity: self.quantity,
            unit_code: self.unit_code,
            unit_price: self.unit_price,
            net,
            igv,
            affectation: self.affectation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn taxed_line_splits_igv_out_of_price() {
        let line = LineBuilder::new("Producto", dec!(1), dec!(118.00)).build();
        assert_eq!(line.net, dec!(100.00));
        assert_eq!(line.igv, dec!(18.00));
    }

    #[test]
    fn exempt_line_carries_no_igv() {
        let line = LineBuilder::new("Libro", dec!(2), dec!(25.00))
            .affectation(IgvAffectation::Exempt)
            .build();
        assert_eq!(line.net, dec!(50.00));
        assert_eq!(line.igv, Decimal::ZERO);
    }

    #[test]
    fn totals_sum_lines() {
        let totals = compute_totals(&[
            LineBuilder::new("a", dec!(1), dec!(118.00)).build(),
            LineBuilder::new("b", dec!(1), dec!(59.00)).build(),
        ]);
        assert_eq!(totals.gross, dec!(150.00));
        assert_eq!(totals.igv, dec!(27.00));
        assert_eq!(totals.total, dec!(177.00));
    }
}
