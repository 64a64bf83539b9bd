use serde::Serialize;
use serde_json::{Map, Value};

use super::operations::GraphOperation;

/// A parameterized Cypher statement equivalent to one [`GraphOperation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CypherStatement {
    pub statement: String,
    pub parameters: Map<String, Value>,
}

impl GraphOperation {
    /// Renders `MERGE ... ON CREATE SET ... ON MATCH SET ...` plus one guarded
    /// relationship merge per edge. Edges whose target is missing are skipped by
    /// the `OPTIONAL MATCH` guard instead of aborting the statement.
    pub fn to_cypher(&self) -> CypherStatement {
        let mut parameters = Map::new();
        parameters.insert("id".to_string(), Value::String(self.node.id.clone()));

        let mut statement = format!("MERGE (n:{} {{id: $id}})", self.node.label.as_str());

        if !self.node.on_create.is_empty() {
            let assignments = self
                .node
                .on_create
                .iter()
                .map(|(key, value)| {
                    parameters.insert(key.clone(), value.clone());
                    format!("n.{key} = ${key}")
                })
                .collect::<Vec<String>>();
            statement.push_str(" ON CREATE SET ");
            statement.push_str(&assignments.join(", "));
        }

        if !self.node.on_match.is_empty() {
            let assignments = self
                .node
                .on_match
                .iter()
                .map(|(key, value)| {
                    let parameter = format!("match_{key}");
                    parameters.insert(parameter.clone(), value.clone());
                    format!("n.{key} = ${parameter}")
                })
                .collect::<Vec<String>>();
            statement.push_str(" ON MATCH SET ");
            statement.push_str(&assignments.join(", "));
        }

        for (position, edge) in self.edges.iter().enumerate() {
            let parameter = format!("target{position}");
            parameters.insert(parameter.clone(), Value::String(edge.target_id.clone()));
            statement.push_str(&format!(
                " WITH n OPTIONAL MATCH (t{position}:{label} {{id: ${parameter}}}) \
                 FOREACH (_ IN CASE WHEN t{position} IS NULL THEN [] ELSE [1] END | \
                 MERGE (n)-[:{relation}]->(t{position}))",
                label = edge.target_label.as_str(),
                relation = edge.relation.as_str(),
            ));
        }

        CypherStatement {
            statement,
            parameters,
        }
    }
}
