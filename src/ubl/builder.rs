use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::model::Element;
use super::serialize::{format_money, format_percent, format_quantity};
use super::{catalog_uri, ns, CUSTOMIZATION_ID, PROFILE_DOMESTIC_SALE, SIGNATURE_PARTY_ID, UBL_VERSION};
use crate::core::{
    Discrepancy, Document, DocumentType, FacturaError, IgvAffectation, Line, PriceType,
    TaxSchemeKind,
};

/// Build the UBL tree for an admitted document.
///
/// The root element and line vocabulary follow the document type; the
/// signature slot (`ext:UBLExtensions/ext:UBLExtension/ext:ExtensionContent`)
/// is created empty and filled later by the signer.
pub fn build_document(doc: &Document) -> Result<Element, FacturaError> {
    match doc.doc_type {
        DocumentType::Factura | DocumentType::Boleta => build_invoice(doc),
        DocumentType::CreditNote => build_note(doc, NoteKind::Credit),
        DocumentType::DebitNote => build_note(doc, NoteKind::Debit),
    }
}

enum NoteKind {
    Credit,
    Debit,
}

fn build_invoice(doc: &Document) -> Result<Element, FacturaError> {
    let mut root = root_element("Invoice", ns::INVOICE);
    root.push(extension_slot());
    root.push(Element::new("cbc:UBLVersionID").text(UBL_VERSION));
    root.push(Element::new("cbc:CustomizationID").text(CUSTOMIZATION_ID));
    root.push(
        Element::new("cbc:ProfileID")
            .attr("schemeName", "SUNAT:Identificador de Tipo de Operación")
            .attr("schemeAgencyName", "PE:SUNAT")
            .attr("schemeURI", catalog_uri::CATALOG_17)
            .text(PROFILE_DOMESTIC_SALE),
    );
    root.push(Element::new("cbc:ID").text(doc.ubl_id()));
    root.push(Element::new("cbc:IssueDate").text(doc.issue_date.format("%Y-%m-%d").to_string()));
    root.push(Element::new("cbc:IssueTime").text(doc.issue_date.format("%H:%M:%S").to_string()));
    root.push(
        Element::new("cbc:InvoiceTypeCode")
            .attr("listAgencyName", "PE:SUNAT")
            .attr("listName", "SUNAT:Identificador de Tipo de Documento")
            .attr("listURI", catalog_uri::CATALOG_01)
            .text(doc.doc_type.code()),
    );
    root.push(currency_code(doc));
    root.push(signature_block(doc));
    root.push(supplier_party(doc));
    root.push(customer_party(doc));
    push_document_tax_totals(&mut root, doc);
    root.push(monetary_total(doc));
    for (index, line) in doc.lines.iter().enumerate() {
        root.push(line_element(doc, line, index, LineVocabulary::Invoice));
    }
    Ok(root)
}

fn build_note(doc: &Document, kind: NoteKind) -> Result<Element, FacturaError> {
    let discrepancy = doc.discrepancy.as_ref().ok_or_else(|| {
        FacturaError::Builder("note document is missing its discrepancy block".into())
    })?;

    let (root_name, root_ns, vocabulary) = match kind {
        NoteKind::Credit => ("CreditNote", ns::CREDIT_NOTE, LineVocabulary::CreditNote),
        NoteKind::Debit => ("DebitNote", ns::DEBIT_NOTE, LineVocabulary::DebitNote),
    };

    let mut root = root_element(root_name, root_ns);
    root.push(extension_slot());
    root.push(Element::new("cbc:UBLVersionID").text(UBL_VERSION));
    root.push(Element::new("cbc:CustomizationID").text(CUSTOMIZATION_ID));
    root.push(Element::new("cbc:ID").text(doc.ubl_id()));
    root.push(Element::new("cbc:IssueDate").text(doc.issue_date.format("%Y-%m-%d").to_string()));
    root.push(Element::new("cbc:IssueTime").text(doc.issue_date.format("%H:%M:%S").to_string()));
    if matches!(kind, NoteKind::Credit) {
        root.push(
            Element::new("cbc:CreditNoteTypeCode")
                .attr("listAgencyName", "PE:SUNAT")
                .attr("listName", "SUNAT:Identificador de Tipo de Documento")
                .attr("listURI", catalog_uri::CATALOG_01)
                .text(doc.doc_type.code()),
        );
    }
    root.push(currency_code(doc));
    root.push(discrepancy_response(discrepancy));
    root.push(billing_reference(discrepancy));
    root.push(signature_block(doc));
    root.push(supplier_party(doc));
    root.push(customer_party(doc));
    push_document_tax_totals(&mut root, doc);
    root.push(monetary_total(doc));
    for (index, line) in doc.lines.iter().enumerate() {
        root.push(line_element(doc, line, index, vocabulary));
    }
    Ok(root)
}

/// Root element with the eight namespace declarations in fixed order.
fn root_element(name: &str, root_ns: &str) -> Element {
    Element::new(name)
        .attr("xmlns", root_ns)
        .attr("xmlns:cac", ns::CAC)
        .attr("xmlns:cbc", ns::CBC)
        .attr("xmlns:ccts", ns::CCTS)
        .attr("xmlns:ds", ns::DS)
        .attr("xmlns:ext", ns::EXT)
        .attr("xmlns:qdt", ns::QDT)
        .attr("xmlns:udt", ns::UDT)
        .attr("xmlns:xsi", ns::XSI)
}

/// The empty signature write slot.
fn extension_slot() -> Element {
    Element::new("ext:UBLExtensions").child(
        Element::new("ext:UBLExtension").child(Element::new("ext:ExtensionContent")),
    )
}

fn currency_code(doc: &Document) -> Element {
    Element::new("cbc:DocumentCurrencyCode")
        .attr("listID", "ISO 4217 Alpha")
        .attr("listName", "Currency")
        .attr("listAgencyName", "United Nations Economic Commission for Europe")
        .text(doc.currency.code())
}

/// The `cac:Signature` block pointing at the XAdES signature by id.
fn signature_block(doc: &Document) -> Element {
    Element::new("cac:Signature")
        .child(Element::new("cbc:ID").text(SIGNATURE_PARTY_ID))
        .child(
            Element::new("cac:SignatoryParty")
                .child(
                    Element::new("cac:PartyIdentification")
                        .child(Element::new("cbc:ID").text(&doc.issuer.ruc)),
                )
                .child(
                    Element::new("cac:PartyName")
                        .child(Element::new("cbc:Name").text(&doc.issuer.name)),
                ),
        )
        .child(
            Element::new("cac:DigitalSignatureAttachment").child(
                Element::new("cac:ExternalReference")
                    .child(Element::new("cbc:URI").text(format!("#{SIGNATURE_PARTY_ID}"))),
            ),
        )
}

fn supplier_party(doc: &Document) -> Element {
    Element::new("cac:AccountingSupplierParty")
        .child(Element::new("cbc:CustomerAssignedAccountID").text(&doc.issuer.ruc))
        .child(Element::new("cbc:AdditionalAccountID").text("6"))
        .child(
            Element::new("cac:Party")
                .child(
                    Element::new("cac:PartyName")
                        .child(Element::new("cbc:Name").text(&doc.issuer.name)),
                )
                .child(
                    Element::new("cac:PartyLegalEntity")
                        .child(Element::new("cbc:RegistrationName").text(&doc.issuer.name)),
                )
                .child(
                    Element::new("cac:PartyTaxScheme")
                        .child(Element::new("cbc:RegistrationName").text(&doc.issuer.name))
                        .child(company_id("6", &doc.issuer.ruc))
                        .child(
                            Element::new("cac:RegistrationAddress")
                                .child(Element::new("cbc:AddressTypeCode").text("0000")),
                        )
                        .child(
                            Element::new("cac:TaxScheme")
                                .child(Element::new("cbc:ID").text("-")),
                        ),
                ),
        )
}

fn customer_party(doc: &Document) -> Element {
    let recipient = &doc.recipient;
    let kind_code = recipient.doc_kind.catalog06_code();
    Element::new("cac:AccountingCustomerParty")
        .child(Element::new("cbc:CustomerAssignedAccountID").text(&recipient.doc_number))
        .child(Element::new("cbc:AdditionalAccountID").text(kind_code))
        .child(
            Element::new("cac:Party")
                .child(
                    Element::new("cac:PartyLegalEntity")
                        .child(Element::new("cbc:RegistrationName").text(&recipient.name)),
                )
                .child(
                    Element::new("cac:PartyTaxScheme")
                        .child(Element::new("cbc:RegistrationName").text(&recipient.name))
                        .child(company_id(kind_code, &recipient.doc_number))
                        .child(
                            Element::new("cac:TaxScheme")
                                .child(Element::new("cbc:ID").text("-")),
                        ),
                ),
        )
}

/// Catalog 06 qualified `cbc:CompanyID`.
fn company_id(scheme_id: &str, value: &str) -> Element {
    Element::new("cbc:CompanyID")
        .attr("schemeID", scheme_id)
        .attr("schemeName", "SUNAT:Identificador de Documento de Identidad")
        .attr("schemeAgencyName", "PE:SUNAT")
        .attr("schemeURI", catalog_uri::CATALOG_06)
        .text(value)
}

/// Document-level `cac:TaxTotal`: one subtotal per distinct affectation
/// present in the lines.
fn push_document_tax_totals(root: &mut Element, doc: &Document) {
    let mut tax_total = Element::new("cac:TaxTotal").child(
        money("cbc:TaxAmount", doc.totals.igv, doc),
    );

    let mut seen: Vec<IgvAffectation> = Vec::new();
    for line in &doc.lines {
        if !seen.contains(&line.affectation) {
            seen.push(line.affectation);
        }
    }
    for affectation in seen {
        let taxable: Decimal = doc
            .lines
            .iter()
            .filter(|l| l.affectation == affectation)
            .map(|l| l.net)
            .sum();
        let tax: Decimal = doc
            .lines
            .iter()
            .filter(|l| l.affectation == affectation)
            .map(|l| l.igv)
            .sum();
        tax_total.push(tax_subtotal(doc, affectation, taxable, tax));
    }
    root.push(tax_total);
}

/// One `cac:TaxSubtotal` for an affectation group.
fn tax_subtotal(
    doc: &Document,
    affectation: IgvAffectation,
    taxable: Decimal,
    tax: Decimal,
) -> Element {
    Element::new("cac:TaxSubtotal")
        .child(money("cbc:TaxableAmount", taxable, doc))
        .child(money("cbc:TaxAmount", tax, doc))
        .child(tax_category(affectation))
}

fn tax_category(affectation: IgvAffectation) -> Element {
    let percent = if affectation.bears_igv() {
        dec!(18.00)
    } else {
        Decimal::ZERO
    };
    let scheme = affectation.tax_scheme();
    Element::new("cac:TaxCategory")
        .child(
            Element::new("cbc:ID")
                .attr("schemeID", "UN/ECE 5305")
                .attr("schemeName", "Tax Category Identifier")
                .attr("schemeAgencyName", "United Nations Economic Commission for Europe")
                .text(affectation.category_code()),
        )
        .child(Element::new("cbc:Percent").text(format_percent(percent)))
        .child(
            Element::new("cbc:TaxExemptionReasonCode")
                .attr("listAgencyName", "PE:SUNAT")
                .attr("listName", "SUNAT:Codigo de Tipo de Afectación del IGV")
                .attr("listURI", catalog_uri::CATALOG_07)
                .text(affectation.code()),
        )
        .child(tax_scheme(scheme))
}

fn tax_scheme(scheme: TaxSchemeKind) -> Element {
    Element::new("cac:TaxScheme")
        .child(
            Element::new("cbc:ID")
                .attr("schemeID", "UN/ECE 5153")
                .attr("schemeAgencyID", "6")
                .text(scheme.id()),
        )
        .child(Element::new("cbc:Name").text(scheme.name()))
        .child(Element::new("cbc:TaxTypeCode").text(scheme.type_code()))
}

fn monetary_total(doc: &Document) -> Element {
    let tax_inclusive = doc.totals.gross + doc.totals.igv;
    Element::new("cac:LegalMonetaryTotal")
        .child(money("cbc:LineExtensionAmount", doc.totals.gross, doc))
        .child(money("cbc:TaxInclusiveAmount", tax_inclusive, doc))
        .child(money("cbc:PayableAmount", doc.totals.total, doc))
}

fn discrepancy_response(discrepancy: &Discrepancy) -> Element {
    Element::new("cac:DiscrepancyResponse")
        .child(Element::new("cbc:ReferenceID").text(&discrepancy.reference_id))
        .child(Element::new("cbc:ResponseCode").text(&discrepancy.reason_code))
        .child(Element::new("cbc:Description").text(&discrepancy.description))
}

/// `cac:BillingReference` to the amended document; its type code is
/// inferred from the referenced series prefix (F → factura, B → boleta).
fn billing_reference(discrepancy: &Discrepancy) -> Element {
    let referenced_type = discrepancy
        .reference_id
        .split('-')
        .next()
        .and_then(DocumentType::from_series_prefix)
        .unwrap_or(DocumentType::Factura);
    Element::new("cac:BillingReference").child(
        Element::new("cac:InvoiceDocumentReference")
            .child(Element::new("cbc:ID").text(&discrepancy.reference_id))
            .child(Element::new("cbc:DocumentTypeCode").text(referenced_type.code())),
    )
}

#[derive(Clone, Copy)]
enum LineVocabulary {
    Invoice,
    CreditNote,
    DebitNote,
}

impl LineVocabulary {
    fn line_name(self) -> &'static str {
        match self {
            Self::Invoice => "cac:InvoiceLine",
            Self::CreditNote => "cac:CreditNoteLine",
            Self::DebitNote => "cac:DebitNoteLine",
        }
    }

    fn quantity_name(self) -> &'static str {
        match self {
            Self::Invoice => "cbc:InvoicedQuantity",
            Self::CreditNote => "cbc:CreditedQuantity",
            Self::DebitNote => "cbc:DebitedQuantity",
        }
    }
}

fn line_element(doc: &Document, line: &Line, index: usize, vocabulary: LineVocabulary) -> Element {
    let price_type = if line.unit_price.is_zero() {
        PriceType::FreeOfCharge
    } else {
        PriceType::IncludesIgv
    };

    let mut element = Element::new(vocabulary.line_name())
        .child(Element::new("cbc:ID").text((index + 1).to_string()))
        .child(
            Element::new(vocabulary.quantity_name())
                .attr("unitCode", &line.unit_code)
                .text(format_quantity(line.quantity)),
        )
        .child(money("cbc:LineExtensionAmount", line.net, doc))
        .child(
            Element::new("cac:PricingReference").child(
                Element::new("cac:AlternativeConditionPrice")
                    .child(money("cbc:PriceAmount", line.unit_price, doc))
                    .child(
                        Element::new("cbc:PriceTypeCode")
                            .attr("listAgencyName", "PE:SUNAT")
                            .attr("listName", "SUNAT:Indicador de Tipo de Precio")
                            .attr("listURI", catalog_uri::CATALOG_16)
                            .text(price_type.code()),
                    ),
            ),
        )
        .child(
            Element::new("cac:TaxTotal")
                .child(money("cbc:TaxAmount", line.igv, doc))
                .child(tax_subtotal(doc, line.affectation, line.net, line.igv)),
        );

    let mut item = Element::new("cac:Item")
        .child(Element::new("cbc:Description").text(&line.description));
    if let Some(code) = &line.code {
        item.push(
            Element::new("cac:SellersItemIdentification")
                .child(Element::new("cbc:ID").text(code)),
        );
    }
    element.push(item);

    element.push(
        Element::new("cac:Price").child(money("cbc:PriceAmount", line.unit_price, doc)),
    );
    element
}

/// Amount element with `currencyID`.
fn money(name: &str, amount: Decimal, doc: &Document) -> Element {
    Element::new(name)
        .attr("currencyID", doc.currency.code())
        .text(format_money(amount))
}
