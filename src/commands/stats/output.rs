use std::io::Write;

use anyhow::Result;

use super::queries::{CommentRateRow, SpeechLengthRow};
use super::run::{SessionHighlight, StatsReport};

pub(super) fn write_text_report<W: Write>(output: &mut W, report: &StatsReport) -> Result<()> {
    writeln!(output, "Database: {}", report.db_path)?;
    writeln!(output, "Nodes:")?;
    for (label, count) in &report.graph.nodes_by_label {
        writeln!(output, "\t{label:<10}\t{count}")?;
    }
    writeln!(output, "Edges:")?;
    for (relation, count) in &report.graph.edges_by_relation {
        writeln!(output, "\t{relation:<14}\t{count}")?;
    }

    write_lengths(output, "Average speech length per member", &report.member_speech_lengths)?;
    write_lengths(output, "Average speech length per faction", &report.faction_speech_lengths)?;
    write_rates(output, "Comments per speech per member", &report.member_comment_rates)?;
    write_rates(output, "Comments per speech per faction", &report.faction_comment_rates)?;

    write_session(output, "Longest session by speech count", report.longest_by_speeches.as_ref())?;
    write_session(output, "Longest session by total speech length", report.longest_by_length.as_ref())?;

    Ok(())
}

fn write_lengths<W: Write>(output: &mut W, title: &str, rows: &[SpeechLengthRow]) -> Result<()> {
    writeln!(output)?;
    writeln!(output, "{title}")?;
    if rows.is_empty() {
        writeln!(output, "\t(no data)")?;
        return Ok(());
    }
    writeln!(output, "\t{:<30}\t{:>12}\t{:>8}", "name", "avg chars", "speeches")?;
    for row in rows {
        writeln!(
            output,
            "\t{:<30}\t{:>12.2}\t{:>8}",
            row.name, row.average_length, row.speeches
        )?;
    }
    Ok(())
}

fn write_rates<W: Write>(output: &mut W, title: &str, rows: &[CommentRateRow]) -> Result<()> {
    writeln!(output)?;
    writeln!(output, "{title}")?;
    if rows.is_empty() {
        writeln!(output, "\t(no data)")?;
        return Ok(());
    }
    writeln!(
        output,
        "\t{:<30}\t{:>10}\t{:>8}\t{:>8}",
        "name", "avg", "comments", "speeches"
    )?;
    for row in rows {
        writeln!(
            output,
            "\t{:<30}\t{:>10.2}\t{:>8}\t{:>8}",
            row.name, row.average_per_speech, row.comments, row.speeches
        )?;
    }
    Ok(())
}

fn write_session<W: Write>(
    output: &mut W,
    title: &str,
    highlight: Option<&SessionHighlight>,
) -> Result<()> {
    writeln!(output)?;
    let Some(highlight) = highlight else {
        writeln!(output, "{title}: (no sessions with speeches)")?;
        return Ok(());
    };

    let session = &highlight.session;
    writeln!(
        output,
        "{title}: {} date={} speeches={} chars={}",
        session.id,
        session.date.as_deref().unwrap_or("-"),
        session.speeches,
        session.total_length
    )?;
    write_lengths(output, "  speech length per member", &highlight.member_speech_lengths)?;
    write_rates(output, "  comments per member", &highlight.member_comment_rates)?;
    write_lengths(output, "  speech length per faction", &highlight.faction_speech_lengths)?;
    write_rates(output, "  comments per faction", &highlight.faction_comment_rates)?;
    Ok(())
}
