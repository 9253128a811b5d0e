//! Domain types shared by the chunker, the TF-IDF engine and the retrieval
//! orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

pub type ChunkId = String;

/// A rule document as selected by the caller: an identifier (usually the file
/// name) and its full text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDocument {
    pub id: String,
    pub text: String,
}

impl RuleDocument {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into() }
    }
}

/// A bounded segment of a rule document that is scored independently.
///
/// - `id`: `"{doc_id}:{chunk_index}"`
/// - `doc_id`: identifier of the originating [`RuleDocument`]
/// - `content`: the text payload, a verbatim slice of the source
/// - `start`/`end`: character range of `content` within the source text
/// - `byte_start`/`byte_end`: the same range in bytes, for slicing
/// - `chunk_index`/`total_chunks`: position within the parent document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub content: String,
    pub start: usize,
    pub end: usize,
    pub byte_start: usize,
    pub byte_end: usize,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

/// One entry of a ranked result. `score` is the cosine similarity in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    pub chunk: Chunk,
    pub score: f64,
}

impl RankedChunk {
    pub fn source_id(&self) -> &str { &self.chunk.doc_id }
    pub fn text(&self) -> &str { &self.chunk.content }
}

/// How term frequency is computed when weighting a chunk or a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermWeighting {
    /// Raw occurrence count of the term.
    #[default]
    RawCount,
    /// Occurrence count divided by the number of tokens in the text.
    LengthNormalized,
}

/// Trade document categories that drive rule selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DocumentType {
    #[serde(rename = "BILL OF LADING")]
    BillOfLading,
    #[serde(rename = "COMMERCIAL INVOICE")]
    CommercialInvoice,
    #[serde(rename = "PACKING LIST")]
    PackingList,
    #[serde(rename = "DHL RECEIPT")]
    DhlReceipt,
    #[serde(rename = "SHIPMENT ADVICE")]
    ShipmentAdvice,
    #[serde(rename = "COVERING SCHEDULE")]
    CoveringSchedule,
    #[serde(rename = "UNKNOWN")]
    Unknown,
}

impl DocumentType {
    /// Every concrete type, in scoring order. `Unknown` is excluded.
    pub const KNOWN: [DocumentType; 6] = [
        DocumentType::DhlReceipt,
        DocumentType::CommercialInvoice,
        DocumentType::BillOfLading,
        DocumentType::PackingList,
        DocumentType::ShipmentAdvice,
        DocumentType::CoveringSchedule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentType::BillOfLading => "BILL OF LADING",
            DocumentType::CommercialInvoice => "COMMERCIAL INVOICE",
            DocumentType::PackingList => "PACKING LIST",
            DocumentType::DhlReceipt => "DHL RECEIPT",
            DocumentType::ShipmentAdvice => "SHIPMENT ADVICE",
            DocumentType::CoveringSchedule => "COVERING SCHEDULE",
            DocumentType::Unknown => "UNKNOWN",
        }
    }

    pub fn is_known(self) -> bool { self != DocumentType::Unknown }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DocumentType {
    type Err = Error;

    /// Case-insensitive; surrounding whitespace and inner runs of spaces are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        if wanted == DocumentType::Unknown.as_str() {
            return Ok(DocumentType::Unknown);
        }
        DocumentType::KNOWN
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| Error::InvalidInput(format!("unrecognised document type '{}'", s.trim())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_parses_loosely() {
        assert_eq!("  packing   list ".parse::<DocumentType>().unwrap(), DocumentType::PackingList);
        assert_eq!("UNKNOWN".parse::<DocumentType>().unwrap(), DocumentType::Unknown);
        assert!("invoice".parse::<DocumentType>().is_err());
    }

    #[test]
    fn document_type_serializes_as_display_name() {
        let json = serde_json::to_string(&DocumentType::DhlReceipt).unwrap();
        assert_eq!(json, "\"DHL RECEIPT\"");
        let back: DocumentType = serde_json::from_str("\"BILL OF LADING\"").unwrap();
        assert_eq!(back, DocumentType::BillOfLading);
    }
}
