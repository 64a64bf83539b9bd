//! In-memory entity graph built from plenary protocols and its translation into
//! store-neutral upsert operations.

mod cypher;
mod entities;
mod operations;
mod registry;

pub use cypher::CypherStatement;
pub use entities::{
    Comment, CommentKey, Faction, FactionKey, Member, MemberKey, NewComment, NewMember,
    NewSession, NewSpeech, Session, SessionKey, SpeakerProfile, Speech, SpeechKey,
};
pub use operations::{
    EdgeClause, GraphOperation, NodeLabel, NodeUpsert, Properties, RelationType,
    build_operations,
};
pub use registry::{
    EntityTable, GraphRegistry, InvalidIdError, RegistryCounts, SessionAssignment,
};
