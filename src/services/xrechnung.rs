//! XRechnung 3.0 export (EN 16931, UBL 2.1 invoice syntax) and a structural
//! check of XRechnung documents.
//!
//! The export is built from an invoice with its customer, items and the
//! issuing tenant. Validation parses the XML and checks that the elements
//! German public-sector recipients reject documents without are present;
//! it is not a replacement for the KoSIT schematron validator.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use super::totals::round_money;
use crate::models::customer::Model as CustomerModel;
use crate::models::invoice::Model as InvoiceModel;
use crate::models::invoice_item::Model as InvoiceItemModel;
use crate::models::tenant::Model as TenantModel;

pub const CUSTOMIZATION_ID: &str =
    "urn:cen.eu:en16931:2017#compliant#urn:xoev-de:kosit:standard:xrechnung_3.0";
pub const PROFILE_ID: &str = "urn:fdc:peppol.eu:2017:poacc:billing:01:1.0";

const UBL_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
const CAC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
const CBC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";

const CURRENCY: &str = "EUR";
/// UNTDID 1001 commercial invoice
const COMMERCIAL_INVOICE: &str = "380";
/// UN/ECE rec 20 "one" (piece)
const DEFAULT_UNIT: &str = "C62";
/// EAS code of the German Leitweg-ID
const LEITWEG_SCHEME: &str = "0204";
const EMAIL_SCHEME: &str = "EM";

#[derive(Debug, Error)]
pub enum XRechnungError {
    #[error("Failed to write XML: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Generated XML is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Everything an export needs. Routing fields left unset fall back to the
/// customer's data.
#[derive(Debug, Clone, Copy)]
pub struct XRechnungInput<'a> {
    pub invoice: &'a InvoiceModel,
    pub customer: &'a CustomerModel,
    pub items: &'a [InvoiceItemModel],
    pub seller: &'a TenantModel,
    pub leitweg_id: Option<&'a str>,
    pub buyer_reference: Option<&'a str>,
}

impl<'a> XRechnungInput<'a> {
    /// Requested Leitweg-ID, else the one stored on the customer.
    pub fn leitweg_id(&self) -> Option<&'a str> {
        non_blank(self.leitweg_id).or_else(|| non_blank(self.customer.leitweg_id.as_deref()))
    }

    /// BT-10: requested reference, else the Leitweg-ID, else the customer
    /// number.
    pub fn buyer_reference(&self) -> &'a str {
        non_blank(self.buyer_reference)
            .or_else(|| self.leitweg_id())
            .unwrap_or(self.customer.customer_number.as_str())
    }
}

/// Outcome of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// File name offered for downloads, e.g. `RE-2024-001_xrechnung.xml`.
pub fn file_name(invoice_number: &str) -> String {
    format!("{invoice_number}_xrechnung.xml")
}

/// Renders the invoice as an XRechnung UBL document.
pub fn generate(input: &XRechnungInput<'_>) -> Result<String, XRechnungError> {
    let invoice = input.invoice;
    let mut xml = UblWriter::new();

    xml.declaration()?;
    xml.open(
        "ubl:Invoice",
        &[
            ("xmlns:ubl", UBL_NS),
            ("xmlns:cac", CAC_NS),
            ("xmlns:cbc", CBC_NS),
        ],
    )?;
    xml.leaf("cbc:CustomizationID", CUSTOMIZATION_ID)?;
    xml.leaf("cbc:ProfileID", PROFILE_ID)?;
    xml.leaf("cbc:ID", &invoice.invoice_number)?;
    xml.leaf("cbc:IssueDate", &invoice.date.format("%Y-%m-%d").to_string())?;
    xml.leaf("cbc:DueDate", &invoice.due_date.format("%Y-%m-%d").to_string())?;
    xml.leaf("cbc:InvoiceTypeCode", COMMERCIAL_INVOICE)?;
    xml.optional("cbc:Note", invoice.notes.as_deref())?;
    xml.leaf("cbc:DocumentCurrencyCode", CURRENCY)?;
    xml.leaf("cbc:BuyerReference", input.buyer_reference())?;

    write_seller(&mut xml, input.seller)?;
    write_buyer(&mut xml, input.customer, input.leitweg_id())?;
    write_payment(&mut xml, invoice, input.seller)?;
    write_tax_total(&mut xml, invoice, input.items)?;

    xml.open("cac:LegalMonetaryTotal", &[])?;
    xml.amount("cbc:LineExtensionAmount", invoice.subtotal)?;
    xml.amount("cbc:TaxExclusiveAmount", invoice.subtotal)?;
    xml.amount("cbc:TaxInclusiveAmount", invoice.total)?;
    xml.amount("cbc:PayableAmount", invoice.total)?;
    xml.close("cac:LegalMonetaryTotal")?;

    for (index, item) in input.items.iter().enumerate() {
        write_line(&mut xml, index + 1, item)?;
    }

    xml.close("ubl:Invoice")?;
    xml.finish()
}

fn write_seller(xml: &mut UblWriter, seller: &TenantModel) -> Result<(), XRechnungError> {
    xml.open("cac:AccountingSupplierParty", &[])?;
    xml.open("cac:Party", &[])?;
    xml.leaf_with("cbc:EndpointID", &[("schemeID", EMAIL_SCHEME)], &seller.email)?;
    if let Some(tax_number) = non_blank(seller.tax_number.as_deref()) {
        xml.open("cac:PartyIdentification", &[])?;
        xml.leaf("cbc:ID", tax_number)?;
        xml.close("cac:PartyIdentification")?;
    }
    xml.open("cac:PartyName", &[])?;
    xml.leaf("cbc:Name", &seller.name)?;
    xml.close("cac:PartyName")?;
    write_address(
        xml,
        seller.street.as_deref(),
        seller.city.as_deref(),
        seller.postal_code.as_deref(),
        Some(seller.country.as_str()),
    )?;
    let tax_id = non_blank(seller.vat_id.as_deref()).or(non_blank(seller.tax_number.as_deref()));
    write_tax_scheme(xml, tax_id)?;
    xml.open("cac:PartyLegalEntity", &[])?;
    xml.leaf("cbc:RegistrationName", &seller.name)?;
    xml.close("cac:PartyLegalEntity")?;
    xml.open("cac:Contact", &[])?;
    xml.leaf(
        "cbc:Name",
        non_blank(seller.contact_person.as_deref()).unwrap_or(&seller.name),
    )?;
    xml.optional("cbc:Telephone", seller.phone.as_deref())?;
    xml.leaf("cbc:ElectronicMail", &seller.email)?;
    xml.close("cac:Contact")?;
    xml.close("cac:Party")?;
    xml.close("cac:AccountingSupplierParty")
}

fn write_buyer(
    xml: &mut UblWriter,
    customer: &CustomerModel,
    leitweg_id: Option<&str>,
) -> Result<(), XRechnungError> {
    xml.open("cac:AccountingCustomerParty", &[])?;
    xml.open("cac:Party", &[])?;
    match (leitweg_id, non_blank(customer.email.as_deref())) {
        (Some(leitweg_id), _) => {
            xml.leaf_with("cbc:EndpointID", &[("schemeID", LEITWEG_SCHEME)], leitweg_id)?
        }
        (None, Some(email)) => {
            xml.leaf_with("cbc:EndpointID", &[("schemeID", EMAIL_SCHEME)], email)?
        }
        (None, None) => {}
    }
    xml.open("cac:PartyIdentification", &[])?;
    xml.leaf("cbc:ID", &customer.customer_number)?;
    xml.close("cac:PartyIdentification")?;
    xml.open("cac:PartyName", &[])?;
    xml.leaf("cbc:Name", &customer.name)?;
    xml.close("cac:PartyName")?;
    write_address(
        xml,
        customer.street.as_deref(),
        customer.city.as_deref(),
        customer.postal_code.as_deref(),
        customer.country.as_deref(),
    )?;
    write_tax_scheme(xml, non_blank(customer.vat_id.as_deref()))?;
    xml.open("cac:PartyLegalEntity", &[])?;
    xml.leaf("cbc:RegistrationName", &customer.name)?;
    xml.close("cac:PartyLegalEntity")?;
    xml.open("cac:Contact", &[])?;
    xml.leaf(
        "cbc:Name",
        non_blank(customer.contact_person.as_deref()).unwrap_or(&customer.name),
    )?;
    xml.optional("cbc:Telephone", customer.phone.as_deref())?;
    xml.optional("cbc:ElectronicMail", customer.email.as_deref())?;
    xml.close("cac:Contact")?;
    xml.close("cac:Party")?;
    xml.close("cac:AccountingCustomerParty")
}

fn write_address(
    xml: &mut UblWriter,
    street: Option<&str>,
    city: Option<&str>,
    postal_code: Option<&str>,
    country: Option<&str>,
) -> Result<(), XRechnungError> {
    xml.open("cac:PostalAddress", &[])?;
    xml.optional("cbc:StreetName", street)?;
    xml.optional("cbc:CityName", city)?;
    xml.optional("cbc:PostalZone", postal_code)?;
    xml.open("cac:Country", &[])?;
    xml.leaf("cbc:IdentificationCode", non_blank(country).unwrap_or("DE"))?;
    xml.close("cac:Country")?;
    xml.close("cac:PostalAddress")
}

fn write_tax_scheme(xml: &mut UblWriter, company_id: Option<&str>) -> Result<(), XRechnungError> {
    let Some(company_id) = company_id else {
        return Ok(());
    };
    xml.open("cac:PartyTaxScheme", &[])?;
    xml.leaf("cbc:CompanyID", company_id)?;
    xml.vat_scheme()?;
    xml.close("cac:PartyTaxScheme")
}

fn write_payment(
    xml: &mut UblWriter,
    invoice: &InvoiceModel,
    seller: &TenantModel,
) -> Result<(), XRechnungError> {
    xml.open("cac:PaymentMeans", &[])?;
    xml.leaf(
        "cbc:PaymentMeansCode",
        payment_means_code(invoice.payment_method.as_deref()),
    )?;
    xml.leaf("cbc:PaymentID", &invoice.invoice_number)?;
    if let Some(iban) = non_blank(seller.iban.as_deref()) {
        xml.open("cac:PayeeFinancialAccount", &[])?;
        xml.leaf("cbc:ID", iban)?;
        xml.leaf(
            "cbc:Name",
            non_blank(seller.bank_account_holder.as_deref()).unwrap_or(&seller.name),
        )?;
        if let Some(bic) = non_blank(seller.bic.as_deref()) {
            xml.open("cac:FinancialInstitutionBranch", &[])?;
            xml.leaf("cbc:ID", bic)?;
            xml.close("cac:FinancialInstitutionBranch")?;
        }
        xml.close("cac:PayeeFinancialAccount")?;
    }
    xml.close("cac:PaymentMeans")?;

    let terms = match non_blank(invoice.payment_terms.as_deref()) {
        Some(terms) => terms.to_string(),
        None => format!("Zahlbar bis {}", invoice.due_date.format("%d.%m.%Y")),
    };
    xml.open("cac:PaymentTerms", &[])?;
    xml.leaf("cbc:Note", &terms)?;
    xml.close("cac:PaymentTerms")
}

fn write_tax_total(
    xml: &mut UblWriter,
    invoice: &InvoiceModel,
    items: &[InvoiceItemModel],
) -> Result<(), XRechnungError> {
    xml.open("cac:TaxTotal", &[])?;
    xml.amount("cbc:TaxAmount", invoice.total - invoice.subtotal)?;
    for (rate, taxable) in taxable_by_rate(items) {
        xml.open("cac:TaxSubtotal", &[])?;
        xml.amount("cbc:TaxableAmount", taxable)?;
        xml.amount("cbc:TaxAmount", taxable * rate / Decimal::ONE_HUNDRED)?;
        xml.open("cac:TaxCategory", &[])?;
        xml.leaf("cbc:ID", tax_category(rate))?;
        xml.leaf("cbc:Percent", &rate.normalize().to_string())?;
        xml.vat_scheme()?;
        xml.close("cac:TaxCategory")?;
        xml.close("cac:TaxSubtotal")?;
    }
    xml.close("cac:TaxTotal")
}

fn write_line(
    xml: &mut UblWriter,
    position: usize,
    item: &InvoiceItemModel,
) -> Result<(), XRechnungError> {
    let unit = non_blank(item.unit.as_deref()).unwrap_or(DEFAULT_UNIT);

    xml.open("cac:InvoiceLine", &[])?;
    xml.leaf("cbc:ID", &position.to_string())?;
    xml.leaf_with(
        "cbc:InvoicedQuantity",
        &[("unitCode", unit)],
        &item.quantity.normalize().to_string(),
    )?;
    xml.amount("cbc:LineExtensionAmount", item.total)?;
    xml.open("cac:Item", &[])?;
    xml.leaf("cbc:Description", &item.description)?;
    xml.leaf("cbc:Name", &item.description)?;
    xml.open("cac:ClassifiedTaxCategory", &[])?;
    xml.leaf("cbc:ID", tax_category(item.tax_rate))?;
    xml.leaf("cbc:Percent", &item.tax_rate.normalize().to_string())?;
    xml.vat_scheme()?;
    xml.close("cac:ClassifiedTaxCategory")?;
    xml.close("cac:Item")?;
    xml.open("cac:Price", &[])?;
    xml.amount("cbc:PriceAmount", item.price)?;
    xml.close("cac:Price")?;
    xml.close("cac:InvoiceLine")
}

/// Net amounts per tax rate, ascending by rate.
fn taxable_by_rate(items: &[InvoiceItemModel]) -> BTreeMap<Decimal, Decimal> {
    let mut groups = BTreeMap::new();
    for item in items {
        *groups.entry(item.tax_rate.normalize()).or_insert(Decimal::ZERO) += item.total;
    }
    groups
}

/// UNCL 5305: `Z` zero rated, `S` standard (including the reduced 7 %).
fn tax_category(rate: Decimal) -> &'static str {
    if rate.is_zero() { "Z" } else { "S" }
}

/// UNCL 4461 payment means; credit transfer unless stated otherwise.
fn payment_means_code(method: Option<&str>) -> &'static str {
    match method.map(str::trim) {
        Some("sepa") => "58",
        Some("cash") => "10",
        Some("card") => "48",
        Some("paypal") => "68",
        Some("direct_debit") => "59",
        _ => "30",
    }
}

fn money(value: Decimal) -> String {
    let mut rounded = round_money(value);
    rounded.rescale(2);
    rounded.to_string()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

struct UblWriter {
    inner: Writer<Vec<u8>>,
}

impl UblWriter {
    fn new() -> Self {
        Self {
            inner: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn declaration(&mut self) -> Result<(), XRechnungError> {
        self.inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        Ok(())
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<(), XRechnungError> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.inner.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<(), XRechnungError> {
        self.inner.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn leaf(&mut self, name: &str, text: &str) -> Result<(), XRechnungError> {
        self.leaf_with(name, &[], text)
    }

    fn leaf_with(
        &mut self,
        name: &str,
        attributes: &[(&str, &str)],
        text: &str,
    ) -> Result<(), XRechnungError> {
        self.open(name, attributes)?;
        self.inner.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    /// Skips the element entirely when there is no value.
    fn optional(&mut self, name: &str, text: Option<&str>) -> Result<(), XRechnungError> {
        match non_blank(text) {
            Some(text) => self.leaf(name, text),
            None => Ok(()),
        }
    }

    fn amount(&mut self, name: &str, value: Decimal) -> Result<(), XRechnungError> {
        self.leaf_with(name, &[("currencyID", CURRENCY)], &money(value))
    }

    fn vat_scheme(&mut self) -> Result<(), XRechnungError> {
        self.open("cac:TaxScheme", &[])?;
        self.leaf("cbc:ID", "VAT")?;
        self.close("cac:TaxScheme")
    }

    fn finish(self) -> Result<String, XRechnungError> {
        Ok(String::from_utf8(self.inner.into_inner())?)
    }
}

/// Header fields (BT-1, BT-2, BT-3, BT-5, BT-10) that must carry a value.
const REQUIRED_HEADER: [&str; 5] = [
    "ID",
    "IssueDate",
    "InvoiceTypeCode",
    "DocumentCurrencyCode",
    "BuyerReference",
];

/// Checks that `xml` is a well-formed UBL invoice carrying the XRechnung 3.0
/// customization and the mandatory header, party, total and line elements.
pub fn validate(xml: &str) -> ValidationReport {
    let document = match ParsedDocument::parse(xml) {
        Ok(document) => document,
        Err(err) => {
            return ValidationReport::from_errors(vec![format!("XML is not well-formed: {err}")]);
        }
    };
    let mut errors = Vec::new();

    if document.root.as_deref() != Some("Invoice") {
        errors.push("Root element must be a UBL Invoice".to_string());
        return ValidationReport::from_errors(errors);
    }

    let customization = document.text("Invoice/CustomizationID").unwrap_or_default();
    if !customization.contains("urn:xoev-de:kosit:standard:xrechnung_3.0") {
        errors.push("Missing XRechnung 3.0 customization ID".to_string());
    }

    for field in REQUIRED_HEADER {
        if document.text(&format!("Invoice/{field}")).is_none() {
            errors.push(format!("Missing required field {field}"));
        }
    }
    if let Some(issue_date) = document.text("Invoice/IssueDate") {
        if NaiveDate::parse_from_str(issue_date, "%Y-%m-%d").is_err() {
            errors.push("IssueDate must be formatted as YYYY-MM-DD".to_string());
        }
    }

    if !document.has("Invoice/AccountingSupplierParty") {
        errors.push("Missing supplier information".to_string());
    }
    if !document.has("Invoice/AccountingCustomerParty") {
        errors.push("Missing customer information".to_string());
    }
    if document.text("Invoice/LegalMonetaryTotal/PayableAmount").is_none() {
        errors.push("Missing payable amount".to_string());
    }
    if !document.has("Invoice/InvoiceLine") {
        errors.push("Missing invoice lines".to_string());
    }

    ValidationReport::from_errors(errors)
}

/// Element paths by local name (`Invoice/LegalMonetaryTotal/PayableAmount`)
/// with the first non-blank text seen at each path.
#[derive(Debug, Default)]
struct ParsedDocument {
    root: Option<String>,
    paths: HashSet<String>,
    texts: HashMap<String, String>,
}

impl ParsedDocument {
    fn parse(xml: &str) -> Result<Self, quick_xml::Error> {
        let mut reader = Reader::from_str(xml);
        let mut document = Self::default();
        let mut stack: Vec<String> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(element) => {
                    let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                    document.root.get_or_insert_with(|| name.clone());
                    stack.push(name);
                    document.paths.insert(stack.join("/"));
                }
                Event::Empty(element) => {
                    let name = String::from_utf8_lossy(element.local_name().as_ref()).into_owned();
                    document.root.get_or_insert_with(|| name.clone());
                    document.paths.insert(format!("{}/{name}", stack.join("/")));
                }
                Event::Text(text) => {
                    let value = String::from_utf8_lossy(&text).trim().to_string();
                    if !value.is_empty() && !stack.is_empty() {
                        document.texts.entry(stack.join("/")).or_insert(value);
                    }
                }
                Event::End(_) => {
                    stack.pop();
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(document)
    }

    fn has(&self, path: &str) -> bool {
        self.paths.contains(path)
    }

    fn text(&self, path: &str) -> Option<&str> {
        self.texts.get(path).map(String::as_str)
    }
}
