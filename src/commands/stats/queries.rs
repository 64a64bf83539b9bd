use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grouping {
    Member,
    Faction,
}

impl Grouping {
    fn alias(self) -> &'static str {
        match self {
            Self::Member => "m",
            Self::Faction => "f",
        }
    }

    fn joins(self) -> &'static str {
        match self {
            Self::Member => {
                "JOIN graph_nodes m ON m.label = 'Member' AND m.id = d.target_id"
            }
            Self::Faction => {
                "JOIN graph_nodes m ON m.label = 'Member' AND m.id = d.target_id
                 JOIN graph_edges mo ON mo.source_label = 'Member' AND mo.source_id = m.id AND mo.rel_type = 'MEMBER_OF'
                 JOIN graph_nodes f ON f.label = 'Faction' AND f.id = mo.target_id"
            }
        }
    }
}

/// Restricts speeches to one session when `?2` is bound, to all speeches when it is NULL.
const SESSION_SCOPE: &str = "(?2 IS NULL OR EXISTS (
    SELECT 1 FROM graph_edges h
    WHERE h.source_label = 'Speech' AND h.source_id = sp.id
      AND h.rel_type = 'HELD_IN' AND h.target_id = ?2))";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpeechLengthRow {
    pub id: String,
    pub name: String,
    pub average_length: f64,
    pub speeches: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRateRow {
    pub id: String,
    pub name: String,
    pub speeches: i64,
    pub comments: i64,
    pub average_per_speech: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionRanking {
    pub id: String,
    pub date: Option<String>,
    pub speeches: i64,
    pub total_length: i64,
}

/// Average text length of non-empty speeches, highest first.
pub fn speech_lengths(
    connection: &Connection,
    grouping: Grouping,
    session: Option<&str>,
    limit: usize,
) -> Result<Vec<SpeechLengthRow>> {
    let g = grouping.alias();
    let sql = format!(
        "SELECT {g}.id,
                COALESCE(json_extract({g}.properties, '$.name'), {g}.id),
                AVG(LENGTH(json_extract(sp.properties, '$.text'))),
                COUNT(*)
         FROM graph_nodes sp
         JOIN graph_edges d ON d.source_label = 'Speech' AND d.source_id = sp.id AND d.rel_type = 'DELIVERED_BY'
         {joins}
         WHERE sp.label = 'Speech'
           AND LENGTH(COALESCE(json_extract(sp.properties, '$.text'), '')) > 0
           AND {SESSION_SCOPE}
         GROUP BY {g}.id
         ORDER BY 3 DESC, 1
         LIMIT ?1",
        joins = grouping.joins(),
    );

    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare speech length query")?;
    let rows = statement.query_map(params![sql_limit(limit), session], |row| {
        Ok(SpeechLengthRow {
            id: row.get(0)?,
            name: row.get(1)?,
            average_length: row.get(2)?,
            speeches: row.get(3)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Comments per speech; every speech counts, including those without comments.
pub fn comment_rates(
    connection: &Connection,
    grouping: Grouping,
    session: Option<&str>,
    limit: usize,
) -> Result<Vec<CommentRateRow>> {
    let g = grouping.alias();
    let sql = format!(
        "SELECT {g}.id,
                COALESCE(json_extract({g}.properties, '$.name'), {g}.id),
                COUNT(*),
                SUM(sc.comments),
                AVG(sc.comments * 1.0)
         FROM (
           SELECT sp.id AS speech_id,
                  (SELECT COUNT(*) FROM graph_edges c
                   WHERE c.rel_type = 'PART_OF' AND c.target_label = 'Speech' AND c.target_id = sp.id) AS comments
           FROM graph_nodes sp
           WHERE sp.label = 'Speech' AND {SESSION_SCOPE}
         ) sc
         JOIN graph_edges d ON d.source_label = 'Speech' AND d.source_id = sc.speech_id AND d.rel_type = 'DELIVERED_BY'
         {joins}
         GROUP BY {g}.id
         ORDER BY 5 DESC, 1
         LIMIT ?1",
        joins = grouping.joins(),
    );

    let mut statement = connection
        .prepare(&sql)
        .context("failed to prepare comment rate query")?;
    let rows = statement.query_map(params![sql_limit(limit), session], |row| {
        Ok(CommentRateRow {
            id: row.get(0)?,
            name: row.get(1)?,
            speeches: row.get(2)?,
            comments: row.get(3)?,
            average_per_speech: row.get(4)?,
        })
    })?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrder {
    SpeechCount,
    TotalLength,
}

pub fn longest_session(connection: &Connection, order: SessionOrder) -> Result<Option<SessionRanking>> {
    let order_by = match order {
        SessionOrder::SpeechCount => "3 DESC, 4 DESC, 1",
        SessionOrder::TotalLength => "4 DESC, 3 DESC, 1",
    };
    let sql = format!(
        "SELECT s.id,
                json_extract(s.properties, '$.date'),
                COUNT(*),
                COALESCE(SUM(LENGTH(json_extract(sp.properties, '$.text'))), 0)
         FROM graph_nodes s
         JOIN graph_edges h ON h.rel_type = 'HELD_IN' AND h.target_label = 'Session' AND h.target_id = s.id
         JOIN graph_nodes sp ON sp.label = 'Speech' AND sp.id = h.source_id
         WHERE s.label = 'Session'
         GROUP BY s.id
         ORDER BY {order_by}
         LIMIT 1"
    );

    let ranking = connection
        .query_row(&sql, [], |row| {
            Ok(SessionRanking {
                id: row.get(0)?,
                date: row.get(1)?,
                speeches: row.get(2)?,
                total_length: row.get(3)?,
            })
        })
        .optional()
        .context("failed to rank sessions")?;
    Ok(ranking)
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
