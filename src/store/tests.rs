use rusqlite::Connection;
use serde_json::{Value, json};

use super::*;
use crate::graph::{
    EdgeClause, GraphOperation, GraphRegistry, NewComment, NewMember, NewSession, NewSpeech,
    NodeLabel, NodeUpsert, Properties, RelationType, build_operations,
};

fn props(value: Value) -> Properties {
    value.as_object().cloned().unwrap_or_default()
}

fn faction_op(id: &str, member_count: usize) -> GraphOperation {
    GraphOperation {
        node: NodeUpsert {
            label: NodeLabel::Faction,
            id: id.to_string(),
            on_create: props(json!({ "name": id, "member_count": member_count })),
            on_match: props(json!({ "member_count": member_count })),
        },
        edges: Vec::new(),
    }
}

fn member_op(id: &str, faction_id: &str) -> GraphOperation {
    GraphOperation {
        node: NodeUpsert {
            label: NodeLabel::Member,
            id: id.to_string(),
            on_create: props(json!({ "name": id })),
            on_match: Properties::new(),
        },
        edges: vec![EdgeClause {
            relation: RelationType::MemberOf,
            target_label: NodeLabel::Faction,
            target_id: faction_id.to_string(),
        }],
    }
}

#[derive(Default)]
struct RecordingSink {
    chunk_sizes: Vec<usize>,
    fail_on: Option<usize>,
}

impl ChunkSink for RecordingSink {
    fn execute_chunk(&mut self, chunk_index: usize, chunk: &[GraphOperation]) -> anyhow::Result<()> {
        self.chunk_sizes.push(chunk.len());
        if self.fail_on == Some(chunk_index) {
            anyhow::bail!("connection reset");
        }
        Ok(())
    }
}

fn memory_store() -> SqliteGraphStore {
    SqliteGraphStore::from_connection(Connection::open_in_memory().unwrap()).unwrap()
}

fn node_property(store: &SqliteGraphStore, label: &str, id: &str, path: &str) -> Option<String> {
    store
        .connection()
        .query_row(
            "SELECT CAST(json_extract(properties, ?3) AS TEXT) FROM graph_nodes WHERE label = ?1 AND id = ?2",
            rusqlite::params![label, id, path],
            |row| row.get(0),
        )
        .unwrap()
}

#[test]
fn operations_are_split_into_bounded_chunks_in_order() {
    let operations = (0..2500)
        .map(|index| faction_op(&format!("F{index}"), 0))
        .collect::<Vec<_>>();
    let mut sink = RecordingSink::default();

    let summary = execute_in_chunks(&operations, DEFAULT_CHUNK_SIZE, &mut sink).unwrap();

    assert_eq!(sink.chunk_sizes, vec![1000, 1000, 500]);
    assert_eq!(summary.chunks_committed, 3);
    assert_eq!(summary.operations_committed, 2500);
}

#[test]
fn a_failing_chunk_stops_execution_and_reports_its_position() {
    let operations = (0..2500)
        .map(|index| faction_op(&format!("F{index}"), 0))
        .collect::<Vec<_>>();
    let mut sink = RecordingSink {
        fail_on: Some(1),
        ..RecordingSink::default()
    };

    let error = execute_in_chunks(&operations, 1000, &mut sink).unwrap_err();

    assert_eq!(sink.chunk_sizes, vec![1000, 1000]);
    assert_eq!(error.chunk_index, 1);
    assert_eq!(error.first_operation, 1000);
    assert_eq!(error.chunk_size, 1000);
    assert_eq!(error.committed.chunks_committed, 1);
    assert_eq!(error.committed.operations_committed, 1000);
    assert!(error.to_string().starts_with("batch 2 "));
    assert_eq!(
        std::error::Error::source(&error).map(ToString::to_string),
        Some("connection reset".to_string())
    );
}

#[test]
fn empty_input_and_zero_chunk_size_are_handled() {
    let mut sink = RecordingSink::default();
    let summary = execute_in_chunks(&[], 1000, &mut sink).unwrap();
    assert!(sink.chunk_sizes.is_empty());
    assert_eq!(summary.operations_committed, 0);

    let operations = vec![faction_op("A", 0), faction_op("B", 0)];
    let summary = execute_in_chunks(&operations, 0, &mut sink).unwrap();
    assert_eq!(sink.chunk_sizes, vec![1, 1]);
    assert_eq!(summary.chunk_size, 1);
}

#[test]
fn sqlite_store_persists_the_registry_graph() {
    let mut registry = GraphRegistry::new();
    let spd = registry.create_faction("SPD", "SPD", "").unwrap();
    let erika = registry
        .create_member(
            "11001",
            NewMember {
                first_name: "Erika".to_string(),
                last_name: "Mustermann".to_string(),
                ..NewMember::default()
            },
        )
        .unwrap();
    registry.associate_member_faction(erika, spd);
    let session = registry
        .create_session("WP20_S42", NewSession::default())
        .unwrap();
    let speech = registry
        .create_speech(
            "ID1",
            NewSpeech {
                date: None,
                title: "Haushalt".to_string(),
                member: erika,
                text: "Hello".to_string(),
            },
        )
        .unwrap();
    registry.assign_speech_session(speech, session);
    let comment = registry
        .create_comment(
            "ID1_abc",
            NewComment {
                author: "unbekannt".to_string(),
                text: "(Beifall)".to_string(),
                date: None,
                speech,
            },
        )
        .unwrap();
    registry.add_speech_comment(speech, comment);

    let operations = build_operations(&registry);
    let mut store = memory_store();
    execute_in_chunks(&operations, 2, &mut store).unwrap();

    let counts = graph_counts(store.connection()).unwrap();
    assert_eq!(counts.nodes_total, 5);
    assert_eq!(counts.edges_total, 4);
    assert_eq!(
        counts.edges_by_relation,
        vec![
            ("DELIVERED_BY".to_string(), 1),
            ("HELD_IN".to_string(), 1),
            ("MEMBER_OF".to_string(), 1),
            ("PART_OF".to_string(), 1),
        ]
    );
    assert_eq!(store.committed().edges_missing_target, 0);

    // replaying the same operations must not duplicate anything
    execute_in_chunks(&operations, 1000, &mut store).unwrap();
    assert_eq!(graph_counts(store.connection()).unwrap(), counts);
}

#[test]
fn upserts_only_touch_match_properties_on_existing_nodes() {
    let mut store = memory_store();
    execute_in_chunks(&[faction_op("SPD", 1)], 10, &mut store).unwrap();

    let mut update = faction_op("SPD", 3);
    update
        .node
        .on_create
        .insert("name".to_string(), json!("Renamed"));
    execute_in_chunks(&[update], 10, &mut store).unwrap();

    assert_eq!(
        node_property(&store, "Faction", "SPD", "$.member_count").as_deref(),
        Some("3")
    );
    assert_eq!(
        node_property(&store, "Faction", "SPD", "$.name").as_deref(),
        Some("SPD")
    );
}

#[test]
fn edges_to_missing_targets_are_skipped() {
    let mut store = memory_store();

    execute_in_chunks(&[member_op("11001", "GHOST")], 10, &mut store).unwrap();

    let counts = graph_counts(store.connection()).unwrap();
    assert_eq!(counts.nodes_total, 1);
    assert_eq!(counts.edges_total, 0);
    assert_eq!(store.committed().edges_missing_target, 1);
}

#[test]
fn a_failing_chunk_is_rolled_back_and_earlier_chunks_stay() {
    let mut store = memory_store();
    store
        .connection()
        .execute_batch(
            "CREATE TRIGGER reject_boom BEFORE INSERT ON graph_nodes
             WHEN NEW.id = 'boom'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();

    let operations = vec![
        faction_op("A", 0),
        faction_op("B", 0),
        faction_op("C", 0),
        faction_op("boom", 0),
        faction_op("D", 0),
    ];

    let error = execute_in_chunks(&operations, 2, &mut store).unwrap_err();
    assert_eq!(error.chunk_index, 1);
    assert_eq!(error.committed.operations_committed, 2);

    let ids = store
        .connection()
        .prepare("SELECT id FROM graph_nodes ORDER BY id")
        .unwrap()
        .query_map([], |row| row.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(store.committed().nodes_written, 2);
}

#[test]
fn schema_records_its_version() {
    let store = memory_store();
    assert_eq!(
        read_metadata(store.connection(), "db_schema_version").unwrap(),
        Some(DB_SCHEMA_VERSION.to_string())
    );
    assert_eq!(read_metadata(store.connection(), "missing").unwrap(), None);
}
