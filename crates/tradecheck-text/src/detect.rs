//! Keyword-scoring document-type classifier.
//!
//! Each type collects one point per indicator phrase found anywhere in the
//! text. Naming the type in one of the first 15 non-empty lines adds 5 and
//! counts as a header hit; naming it only further down adds 5 without one.
//!
//! Blank lines do not use up the header window, so leading whitespace in an
//! extracted PDF cannot push the title out of it. A type named below the
//! header earns the bonus once however many lines repeat the name, so long
//! schedules that mention a type on every row do not swamp the indicators.
//! Covering schedules list other documents by name, so strong schedule
//! evidence boosts that type and takes points from the types it lists.
//! A unique best score of at least 3, or 2 with a header hit, wins.

use regex::Regex;
use tracing::debug;

use tradecheck_core::traits::DocumentClassifier;
use tradecheck_core::types::DocumentType;

const HEADER_LINES: usize = 15;
const NAME_BONUS: u32 = 5;

const DHL_RECEIPT: &[&str] = &[
    "d h l", "waybill", "airway bill", "tracking number", "track no", "express service",
    "delivery receipt", "delivery note", "parcel receipt", "shipping label", "consignment note",
    "dispatch note", "dispatch advice",
];

const COMMERCIAL_INVOICE: &[&str] = &[
    "commercial invoice", "invoice no", "invoice date", "invoice value", "total value", "unit price",
    "price per unit", "payment terms", "terms of payment", "incoterms", "cfr", "cif", "fob", "ex works",
    "currency", "quantity", "qty", "amount", "net weight", "gross weight", "buyer", "seller",
    "supplier", "description of goods", "goods description", "purchase order", "contract no", "order no",
];

const BILL_OF_LADING: &[&str] = &[
    "bill of lading", "ocean freight", "shipper", "consignee", "notify party", "port of loading",
    "port of discharge", "vessel", "carrier", "container no", "container number", "seal no",
    "shipped on board", "on board date", "non negotiable", "voyage no", "freight prepaid",
    "freight collect", "charter party", "house bill", "master bill",
];

const PACKING_LIST: &[&str] = &[
    "packing list", "package list", "packages", "package numbers", "packing details",
    "packaging details", "contents list", "item list", "packing instructions", "package contents",
];

const SHIPMENT_ADVICE: &[&str] = &[
    "shipment advice", "shipping advice", "shipment notification", "shipping notification",
    "advice of shipment", "shipment details", "shipping details", "shipment information",
    "shipment status",
];

const COVERING_SCHEDULE: &[&str] = &[
    "covering schedule", "schedule of documents", "document schedule", "attachments list",
    "supporting documents", "document list", "attachments", "schedule of attachments",
];

const ENCLOSURE_PHRASES: &[&str] = &[
    "please find enclosed", "enclosed the following documents", "documents for", "1st mail",
    "2nd mail", "mail of documents", "documentary credit", "your reference",
];

const SHIPMENT_HINTS: &[&str] =
    &["shipment details", "shipping details", "vessel name", "shipped on board date", "expected arrival date"];

/// Per-type scores from one classification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeScores {
    scores: Vec<(DocumentType, u32)>,
    header_hits: u32,
}

impl TypeScores {
    pub fn get(&self, doc_type: DocumentType) -> u32 {
        self.scores.iter().find(|(t, _)| *t == doc_type).map_or(0, |(_, s)| *s)
    }

    pub fn header_hits(&self) -> u32 { self.header_hits }

    /// The winning type, if the best score is unique and confident enough.
    pub fn decide(&self) -> DocumentType {
        let max = self.scores.iter().map(|(_, s)| *s).max().unwrap_or(0);
        let mut leaders = self.scores.iter().filter(|(_, s)| *s == max);
        let (Some(&(leader, _)), None) = (leaders.next(), leaders.next()) else {
            return DocumentType::Unknown;
        };
        if max >= 3 || (max >= 2 && self.header_hits > 0) {
            leader
        } else {
            DocumentType::Unknown
        }
    }

    fn add(&mut self, doc_type: DocumentType, points: u32) {
        if let Some((_, s)) = self.scores.iter_mut().find(|(t, _)| *t == doc_type) {
            *s += points;
        }
    }

    fn penalise(&mut self, doc_type: DocumentType, points: u32) {
        if let Some((_, s)) = self.scores.iter_mut().find(|(t, _)| *t == doc_type) {
            *s = s.saturating_sub(points);
        }
    }
}

pub struct HeuristicClassifier {
    indicators: Vec<(DocumentType, Vec<Regex>)>,
}

impl HeuristicClassifier {
    pub fn new() -> Result<Self, regex::Error> {
        let table: [(DocumentType, &[&str]); 6] = [
            (DocumentType::DhlReceipt, DHL_RECEIPT),
            (DocumentType::CommercialInvoice, COMMERCIAL_INVOICE),
            (DocumentType::BillOfLading, BILL_OF_LADING),
            (DocumentType::PackingList, PACKING_LIST),
            (DocumentType::ShipmentAdvice, SHIPMENT_ADVICE),
            (DocumentType::CoveringSchedule, COVERING_SCHEDULE),
        ];
        let indicators = table
            .into_iter()
            .map(|(doc_type, phrases)| {
                let patterns = phrases.iter().map(|p| phrase_pattern(p)).collect::<Result<Vec<_>, _>>()?;
                Ok((doc_type, patterns))
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { indicators })
    }

    pub fn score(&self, document_text: &str) -> TypeScores {
        let lower = document_text.to_lowercase();
        let mut scores = TypeScores {
            scores: self
                .indicators
                .iter()
                .map(|(t, patterns)| (*t, patterns.iter().filter(|re| re.is_match(&lower)).count() as u32))
                .collect(),
            header_hits: 0,
        };

        let lines: Vec<&str> = lower.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        let header = &lines[..lines.len().min(HEADER_LINES)];
        for line in header {
            if let Some(doc_type) = named_type(line) {
                scores.add(doc_type, NAME_BONUS);
                scores.header_hits += 1;
            }
        }
        for doc_type in DocumentType::KNOWN {
            let in_header = header.iter().any(|l| names(l, doc_type));
            if !in_header && lines[header.len()..].iter().any(|l| names(l, doc_type)) {
                scores.add(doc_type, NAME_BONUS);
            }
        }

        apply_covering_evidence(&lower, &mut scores);
        if contains_any(&lower, SHIPMENT_HINTS) {
            scores.add(DocumentType::ShipmentAdvice, 2);
        }
        scores
    }
}

impl DocumentClassifier for HeuristicClassifier {
    fn classify(&self, document_text: &str) -> DocumentType {
        let scores = self.score(document_text);
        let decided = scores.decide();
        debug!(?scores, %decided, "heuristic document-type scores");
        decided
    }
}

fn phrase_pattern(phrase: &str) -> Result<Regex, regex::Error> {
    let body = phrase.split_whitespace().map(regex::escape).collect::<Vec<_>>().join(r"[\s\-/]*");
    Regex::new(&format!(r"\b{body}\b"))
}

fn contains_any(text: &str, needles: &[&str]) -> bool { needles.iter().any(|n| text.contains(n)) }

/// Whether a lowercased line names `doc_type` outright.
fn names(line: &str, doc_type: DocumentType) -> bool {
    match doc_type {
        DocumentType::DhlReceipt => line.contains("dhl") || line.contains("waybill"),
        DocumentType::Unknown => false,
        other => line.contains(&other.as_str().to_lowercase()),
    }
}

/// First type named by a header line, in the order the checks are most specific.
fn named_type(line: &str) -> Option<DocumentType> {
    [
        DocumentType::PackingList,
        DocumentType::ShipmentAdvice,
        DocumentType::CoveringSchedule,
        DocumentType::CommercialInvoice,
        DocumentType::BillOfLading,
        DocumentType::DhlReceipt,
    ]
    .into_iter()
    .find(|t| names(line, *t))
}

fn apply_covering_evidence(lower: &str, scores: &mut TypeScores) {
    if lower.contains("covering schedule") || lower.contains("schedule of documents") {
        scores.add(DocumentType::CoveringSchedule, 10);
    }
    if lower.contains("mail of documents") {
        scores.add(DocumentType::CoveringSchedule, 8);
    }

    let mut evidence = 0;
    if contains_any(lower, ENCLOSURE_PHRASES) {
        evidence += 1;
    }
    if lower.contains("mail of documents") {
        evidence += 1;
    }
    if contains_any(lower, COVERING_SCHEDULE) {
        evidence += 1;
    }
    let referenced = [
        lower.contains("commercial invoice"),
        lower.contains("packing list"),
        lower.contains("shipping advice") || lower.contains("shipment advice"),
        lower.contains("bill of lading") || lower.contains("konnossement"),
        lower.contains("draft"),
    ]
    .into_iter()
    .filter(|&b| b)
    .count();
    if referenced >= 3 {
        evidence += 1;
    }

    if evidence >= 3 {
        scores.penalise(DocumentType::BillOfLading, 8);
        for t in [DocumentType::CommercialInvoice, DocumentType::PackingList, DocumentType::ShipmentAdvice, DocumentType::DhlReceipt] {
            scores.penalise(t, 5);
        }
    } else if evidence == 2 {
        scores.penalise(DocumentType::BillOfLading, 4);
        scores.penalise(DocumentType::CommercialInvoice, 2);
    }

    // a bill of lading named inside a mailing list is an enclosure, not the document
    if (lower.contains("bill of lading") || lower.contains("konnossement"))
        && contains_any(lower, &["1st mail", "2nd mail", "mail of documents", "please find enclosed", "documents for"])
    {
        scores.penalise(DocumentType::BillOfLading, 3);
    }
}
