use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags};
use serde::Serialize;
use tracing::info;

use crate::cli::{StatsArgs, default_db_path};
use crate::store::{GraphCounts, graph_counts};
use crate::util::now_utc_string;

use super::output::write_text_report;
use super::queries::{
    CommentRateRow, Grouping, SessionOrder, SessionRanking, SpeechLengthRow, comment_rates,
    longest_session, speech_lengths,
};

#[derive(Debug, Clone, Serialize)]
pub struct SessionHighlight {
    pub session: SessionRanking,
    pub member_speech_lengths: Vec<SpeechLengthRow>,
    pub member_comment_rates: Vec<CommentRateRow>,
    pub faction_speech_lengths: Vec<SpeechLengthRow>,
    pub faction_comment_rates: Vec<CommentRateRow>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub generated_at: String,
    pub db_path: String,
    pub limit: usize,
    pub graph: GraphCounts,
    pub member_speech_lengths: Vec<SpeechLengthRow>,
    pub faction_speech_lengths: Vec<SpeechLengthRow>,
    pub member_comment_rates: Vec<CommentRateRow>,
    pub faction_comment_rates: Vec<CommentRateRow>,
    pub longest_by_speeches: Option<SessionHighlight>,
    pub longest_by_length: Option<SessionHighlight>,
}

pub fn run(args: StatsArgs) -> Result<()> {
    let db_path = args
        .db_path
        .clone()
        .unwrap_or_else(|| default_db_path(&args.cache_root));
    if !db_path.exists() {
        bail!("database not found: {}", db_path.display());
    }

    let connection = Connection::open_with_flags(&db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open {}", db_path.display()))?;

    info!(path = %db_path.display(), limit = args.limit, "computing statistics");
    let report = collect_stats(&connection, &db_path.display().to_string(), args.limit)?;

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        serde_json::to_writer_pretty(&mut output, &report)
            .context("failed to serialize stats json output")?;
        writeln!(output)?;
    } else {
        write_text_report(&mut output, &report)?;
    }
    output.flush()?;
    Ok(())
}

pub(super) fn collect_stats(connection: &Connection, db_path: &str, limit: usize) -> Result<StatsReport> {
    Ok(StatsReport {
        generated_at: now_utc_string(),
        db_path: db_path.to_string(),
        limit,
        graph: graph_counts(connection)?,
        member_speech_lengths: speech_lengths(connection, Grouping::Member, None, limit)?,
        faction_speech_lengths: speech_lengths(connection, Grouping::Faction, None, limit)?,
        member_comment_rates: comment_rates(connection, Grouping::Member, None, limit)?,
        faction_comment_rates: comment_rates(connection, Grouping::Faction, None, limit)?,
        longest_by_speeches: highlight(connection, SessionOrder::SpeechCount, limit)?,
        longest_by_length: highlight(connection, SessionOrder::TotalLength, limit)?,
    })
}

fn highlight(
    connection: &Connection,
    order: SessionOrder,
    limit: usize,
) -> Result<Option<SessionHighlight>> {
    let Some(session) = longest_session(connection, order)? else {
        return Ok(None);
    };
    let id = Some(session.id.as_str());

    Ok(Some(SessionHighlight {
        member_speech_lengths: speech_lengths(connection, Grouping::Member, id, limit)?,
        member_comment_rates: comment_rates(connection, Grouping::Member, id, limit)?,
        faction_speech_lengths: speech_lengths(connection, Grouping::Faction, id, limit)?,
        faction_comment_rates: comment_rates(connection, Grouping::Faction, id, limit)?,
        session,
    }))
}
