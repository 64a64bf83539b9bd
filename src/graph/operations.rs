use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::info;

use super::entities::{Comment, Faction, Member, Session, Speech};
use super::registry::GraphRegistry;

pub type Properties = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeLabel {
    Faction,
    Member,
    Session,
    Speech,
    Comment,
}

impl NodeLabel {
    pub const ALL: [NodeLabel; 5] = [
        NodeLabel::Faction,
        NodeLabel::Session,
        NodeLabel::Member,
        NodeLabel::Speech,
        NodeLabel::Comment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Faction => "Faction",
            Self::Member => "Member",
            Self::Session => "Session",
            Self::Speech => "Speech",
            Self::Comment => "Comment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RelationType {
    MemberOf,
    DeliveredBy,
    HeldIn,
    PartOf,
}

impl RelationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MemberOf => "MEMBER_OF",
            Self::DeliveredBy => "DELIVERED_BY",
            Self::HeldIn => "HELD_IN",
            Self::PartOf => "PART_OF",
        }
    }
}

/// Node merge: `on_create` is written once, `on_match` on every later upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeUpsert {
    pub label: NodeLabel,
    pub id: String,
    pub on_create: Properties,
    pub on_match: Properties,
}

/// Relationship from the upserted node to a node that must already exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeClause {
    pub relation: RelationType,
    pub target_label: NodeLabel,
    pub target_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphOperation {
    pub node: NodeUpsert,
    pub edges: Vec<EdgeClause>,
}

impl GraphOperation {
    fn node(label: NodeLabel, id: &str, on_create: Properties, on_match: Properties) -> Self {
        Self {
            node: NodeUpsert {
                label,
                id: id.to_string(),
                on_create,
                on_match,
            },
            edges: Vec::new(),
        }
    }

    fn with_edge(mut self, relation: RelationType, target_label: NodeLabel, target_id: &str) -> Self {
        self.edges.push(EdgeClause {
            relation,
            target_label,
            target_id: target_id.to_string(),
        });
        self
    }
}

/// Flattens the registry into upserts ordered parents first:
/// factions, sessions, members, speeches, comments.
pub fn build_operations(registry: &GraphRegistry) -> Vec<GraphOperation> {
    let counts = registry.counts();
    let mut operations = Vec::with_capacity(
        counts.factions + counts.sessions + counts.members + counts.speeches + counts.comments,
    );

    operations.extend(registry.factions().iter().map(faction_operation));
    operations.extend(registry.sessions().iter().map(session_operation));
    operations.extend(
        registry
            .members()
            .iter()
            .map(|member| member_operation(registry, member)),
    );
    operations.extend(
        registry
            .speeches()
            .iter()
            .map(|speech| speech_operation(registry, speech)),
    );
    operations.extend(
        registry
            .comments()
            .iter()
            .map(|comment| comment_operation(registry, comment)),
    );

    info!(
        factions = counts.factions,
        sessions = counts.sessions,
        members = counts.members,
        speeches = counts.speeches,
        comments = counts.comments,
        total = operations.len(),
        "built graph operations"
    );

    operations
}

pub fn faction_operation(faction: &Faction) -> GraphOperation {
    let member_count = faction.member_count();
    GraphOperation::node(
        NodeLabel::Faction,
        &faction.id,
        properties([
            ("name", json!(faction.name)),
            ("origin_party", json!(faction.origin_party)),
            ("member_count", json!(member_count)),
        ]),
        properties([("member_count", json!(member_count))]),
    )
}

pub fn member_operation(registry: &GraphRegistry, member: &Member) -> GraphOperation {
    let operation = GraphOperation::node(
        NodeLabel::Member,
        &member.id,
        properties([
            ("name", json!(member.full_name())),
            ("birthdate", date_value(member.birthdate)),
            ("function", json!(member.function)),
        ]),
        properties([("function", json!(member.function))]),
    );

    match member.faction().and_then(|key| registry.factions().get(key)) {
        Some(faction) => operation.with_edge(RelationType::MemberOf, NodeLabel::Faction, &faction.id),
        None => operation,
    }
}

pub fn session_operation(session: &Session) -> GraphOperation {
    GraphOperation::node(
        NodeLabel::Session,
        &session.id,
        properties([
            ("date", date_value(session.date)),
            ("time", time_value(session.time)),
            ("room", json!(session.room)),
            ("access", json!(session.access)),
        ]),
        properties([("access", json!(session.access))]),
    )
}

pub fn speech_operation(registry: &GraphRegistry, speech: &Speech) -> GraphOperation {
    let comment_count = speech.comment_count();
    let mut operation = GraphOperation::node(
        NodeLabel::Speech,
        &speech.id,
        properties([
            ("title", json!(speech.title)),
            ("date", date_value(speech.date)),
            ("text", json!(speech.text)),
            ("comment_count", json!(comment_count)),
        ]),
        properties([("comment_count", json!(comment_count))]),
    );

    if let Some(member) = registry.members().get(speech.member()) {
        operation = operation.with_edge(RelationType::DeliveredBy, NodeLabel::Member, &member.id);
    }
    if let Some(session) = speech.session().and_then(|key| registry.sessions().get(key)) {
        operation = operation.with_edge(RelationType::HeldIn, NodeLabel::Session, &session.id);
    }

    operation
}

pub fn comment_operation(registry: &GraphRegistry, comment: &Comment) -> GraphOperation {
    let operation = GraphOperation::node(
        NodeLabel::Comment,
        &comment.id,
        properties([
            ("author", json!(comment.author)),
            ("text", json!(comment.text)),
            ("date", date_value(comment.date)),
        ]),
        Properties::new(),
    );

    match registry.speeches().get(comment.speech()) {
        Some(speech) => operation.with_edge(RelationType::PartOf, NodeLabel::Speech, &speech.id),
        None => operation,
    }
}

fn properties<const N: usize>(entries: [(&str, Value); N]) -> Properties {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn date_value(date: Option<NaiveDate>) -> Value {
    date.map(|date| json!(date.format("%Y-%m-%d").to_string()))
        .unwrap_or(Value::Null)
}

fn time_value(time: Option<NaiveTime>) -> Value {
    time.map(|time| json!(time.format("%H:%M:%S").to_string()))
        .unwrap_or(Value::Null)
}
