//! Reading Bundestag plenary protocol XML into the entity graph.

mod coordinator;
mod fields;
mod normalize;
mod parser;
#[cfg(test)]
mod tests;

pub use coordinator::{
    DocumentFailure, IngestReport, SourceDocument, discover_protocols, ingest_protocols,
};
pub use fields::{DurationParser, FieldParseError, parse_protocol_date, parse_protocol_time};
pub use normalize::{NON_ALIGNED_FACTION, faction_from_surname, normalize_faction};
pub use parser::{DocumentReport, ProtocolError, ProtocolParser, comment_id, speech_text};
