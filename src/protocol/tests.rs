use std::fs;

use chrono::{NaiveDate, NaiveTime, TimeDelta};

use super::*;
use crate::graph::GraphRegistry;

const PROTOCOL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE dbtplenarprotokoll SYSTEM "dbtplenarprotokoll.dtd">
<dbtplenarprotokoll wahlperiode="20" sitzung-nr="42" sitzung-datum="16.06.2022" sitzung-start-uhrzeit="9:00" sitzung-ort="Berlin">
  <rednerliste>
    <redner id="11001">
      <name><vorname>Erika</vorname><nachname>Mustermann</nachname><fraktion>SPD</fraktion></name>
      <thema>Haushalt</thema>
      <redezeit>PT12M30S</redezeit>
    </redner>
    <redner id="11002">
      <name><vorname>Max</vorname><nachname>Beispiel</nachname><fraktion>BÜNDNIS 90/DIE GRÜNEN</fraktion></name>
    </redner>
    <redner id="11003">
      <name><vorname>Petra</vorname><nachname>Pau (LINKE)</nachname></name>
    </redner>
    <redner id="11004">
      <name><vorname>Hans</vorname><nachname>Gast</nachname><fraktion>Piraten</fraktion></name>
    </redner>
  </rednerliste>
  <sitzungsverlauf>
    <rede id="ID204200100">
      <redner id="11001"><name><vorname>Erika</vorname><nachname>Mustermann</nachname><fraktion>SPD</fraktion></name></redner>
      <p>  Hello  </p>
      <kommentar>(Beifall bei der SPD)</kommentar>
      <p>World</p>
      <kommentar>   </kommentar>
      <kommentar>(Beifall bei der SPD)</kommentar>
      <kommentar>(Zuruf: Unsinn!)</kommentar>
    </rede>
    <rede id="ID204200200">
      <p klasse="redner"><redner id="99999"/>Unbekannt:</p>
    </rede>
    <rede id="">
      <p klasse="redner"><redner id="11002"/></p>
    </rede>
  </sitzungsverlauf>
</dbtplenarprotokoll>
"#;

fn parse(xml: &str) -> (GraphRegistry, DocumentReport) {
    let parser = ProtocolParser::new().unwrap();
    let mut registry = GraphRegistry::new();
    let report = parser
        .parse_document(&mut registry, "20042.xml", xml)
        .unwrap();
    (registry, report)
}

#[test]
fn normalize_faction_merges_union_spellings() {
    assert_eq!(normalize_faction("CDU"), "CDU/CSU");
    assert_eq!(normalize_faction("CSU"), "CDU/CSU");
    assert_eq!(normalize_faction("CDUCSU"), "CDU/CSU");
    assert_eq!(normalize_faction("CDU/CSU"), "CDU/CSU");
}

#[test]
fn normalize_faction_buckets_long_and_placeholder_labels() {
    assert_eq!(
        normalize_faction("Some Unknown Parliamentary Group"),
        NON_ALIGNED_FACTION
    );
    assert_eq!(normalize_faction("Abgeordneter"), NON_ALIGNED_FACTION);
    assert_eq!(normalize_faction("fraktionslos"), NON_ALIGNED_FACTION);
    assert_eq!(normalize_faction("Präsident"), "Sitzungsleitung");
    assert_eq!(normalize_faction("Gäste"), "Sitzungsleitung");
}

#[test]
fn normalize_faction_is_stable_on_canonical_names() {
    for canonical in [
        "BÜNDNIS 90/DIE GRÜNEN",
        "DIE LINKE",
        "AfD",
        "SPD",
        "FDP",
        "CDU/CSU",
        "Fraktionslos",
        "Sitzungsleitung",
    ] {
        assert_eq!(normalize_faction(canonical), canonical);
    }
    assert_eq!(normalize_faction("Bündnis 90/Die Grünen"), "BÜNDNIS 90/DIE GRÜNEN");
    assert_eq!(normalize_faction("Piraten"), "PIRATEN");
    assert_eq!(normalize_faction(""), "");
}

#[test]
fn faction_from_surname_reads_parenthetical_party() {
    assert_eq!(faction_from_surname("Pau (LINKE)"), Some("DIE LINKE"));
    assert_eq!(faction_from_surname("Roth (Grünen)"), Some("BÜNDNIS 90/DIE GRÜNEN"));
    assert_eq!(faction_from_surname("Mustermann"), None);
}

#[test]
fn field_parsers_accept_protocol_formats() {
    assert_eq!(
        parse_protocol_date("16.06.2022"),
        Ok(NaiveDate::from_ymd_opt(2022, 6, 16))
    );
    assert_eq!(parse_protocol_date(""), Ok(None));
    assert!(parse_protocol_date("2022-06-16").is_err());

    assert_eq!(
        parse_protocol_time("9:00"),
        Ok(NaiveTime::from_hms_opt(9, 0, 0))
    );
    assert_eq!(
        parse_protocol_time("13:05:30"),
        Ok(NaiveTime::from_hms_opt(13, 5, 30))
    );
    assert!(parse_protocol_time("9 Uhr").is_err());
}

#[test]
fn duration_parser_reads_iso_durations_and_defaults_to_zero() {
    let durations = DurationParser::new().unwrap();

    assert_eq!(
        durations.parse_or_zero("PT12M30S"),
        TimeDelta::try_seconds(750).unwrap()
    );
    assert_eq!(
        durations.parse_or_zero("P1DT1H"),
        TimeDelta::try_hours(25).unwrap()
    );
    assert_eq!(
        durations.parse_or_zero("PT0.5S"),
        TimeDelta::try_milliseconds(500).unwrap()
    );
    assert_eq!(durations.parse_or_zero("12 Minuten"), TimeDelta::zero());
    assert_eq!(durations.parse_or_zero("PT"), TimeDelta::zero());
    assert_eq!(durations.parse_or_zero(""), TimeDelta::zero());
}

#[test]
fn comment_ids_are_deterministic_per_speech_and_text() {
    let first = comment_id("ID1", "(Beifall)");
    let again = comment_id("ID1", "(Beifall)");
    let other_text = comment_id("ID1", "(Heiterkeit)");
    let other_speech = comment_id("ID2", "(Beifall)");

    assert_eq!(first, again);
    assert_ne!(first, other_text);
    assert_ne!(first, other_speech);
    assert!(first.starts_with("ID1_"));
}

#[test]
fn speech_text_joins_direct_paragraphs() {
    let xml = "<rede id=\"r\"><p>Hello</p><kommentar>(Beifall)</kommentar><p> World </p><div><p>nested</p></div></rede>";
    let document = roxmltree::Document::parse(xml).unwrap();

    assert_eq!(speech_text(document.root_element()), "Hello\nWorld");
}

#[test]
fn parse_document_builds_factions_members_and_session() {
    let (registry, report) = parse(PROTOCOL);

    let faction_ids = registry
        .factions()
        .iter()
        .map(|faction| faction.id.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(faction_ids, vec!["SPD", "BÜNDNIS 90/DIE GRÜNEN", "PIRATEN"]);

    let spd = registry.factions().get_by_id("SPD").unwrap();
    assert_eq!(spd.member_count(), 1);

    // the surname fallback resolves to a faction that no speaker record declared
    let pau = registry.members().get_by_id("11003").unwrap();
    assert!(pau.faction().is_none());
    assert!(
        report
            .warnings
            .iter()
            .any(|warning| warning.contains("DIE LINKE") && warning.contains("11003"))
    );

    let session = registry.sessions().get_by_id("WP20_S42").unwrap();
    assert_eq!(session.date, NaiveDate::from_ymd_opt(2022, 6, 16));
    assert_eq!(session.time, NaiveTime::from_hms_opt(9, 0, 0));
    assert_eq!(session.room, "Berlin");
    assert_eq!(session.access, "Öffentlich");
    assert_eq!(report.session_id.as_deref(), Some("WP20_S42"));

    let profile = registry.speaker_profiles().get_by_id("11001").unwrap();
    assert_eq!(profile.topic, "Haushalt");
    assert_eq!(profile.speaking_time, TimeDelta::try_seconds(750).unwrap());
}

#[test]
fn parse_document_links_speeches_and_deduplicates_comments() {
    let (registry, report) = parse(PROTOCOL);

    assert_eq!(report.speeches_seen, 3);
    assert_eq!(report.speeches_skipped, 2);
    assert_eq!(registry.speeches().len(), 1);

    let speech = registry.speeches().get_by_id("ID204200100").unwrap();
    assert_eq!(speech.text, "Hello\nWorld");
    assert_eq!(speech.title, "Rede von Erika Mustermann");
    assert_eq!(speech.date, NaiveDate::from_ymd_opt(2022, 6, 16));
    assert_eq!(speech.comment_count(), 2);

    let session = registry.sessions().get_by_id("WP20_S42").unwrap();
    assert_eq!(session.speeches().len(), 1);
    assert_eq!(speech.session().map(|key| &registry.sessions()[key].id), Some(&session.id));

    let author = &registry.members()[speech.member()];
    assert_eq!(author.id, "11001");
    assert_eq!(author.speeches().len(), 1);

    for comment in registry.comments().iter() {
        assert_eq!(comment.author, "unbekannt");
        assert_eq!(registry.speeches()[comment.speech()].id, "ID204200100");
    }
}

#[test]
fn parsing_the_same_document_twice_is_idempotent() {
    let parser = ProtocolParser::new().unwrap();
    let mut registry = GraphRegistry::new();

    parser
        .parse_document(&mut registry, "a.xml", PROTOCOL)
        .unwrap();
    let after_first = registry.counts();
    let second = parser
        .parse_document(&mut registry, "a.xml", PROTOCOL)
        .unwrap();

    assert_eq!(registry.counts(), after_first);
    assert_eq!(second.created.speeches, 0);
    let speech = registry.speeches().get_by_id("ID204200100").unwrap();
    assert_eq!(speech.comment_count(), 2);
    assert_eq!(registry.sessions().get_by_id("WP20_S42").unwrap().speeches().len(), 1);
}

#[test]
fn unparsable_session_fields_become_warnings() {
    let xml = r#"<dbtplenarprotokoll wahlperiode="20" sitzung-nr="7" sitzung-datum="32.13.2022" sitzung-start-uhrzeit="neun Uhr"/>"#;
    let (registry, report) = parse(xml);

    let session = registry.sessions().get_by_id("WP20_S7").unwrap();
    assert!(session.date.is_none());
    assert!(session.time.is_none());
    assert_eq!(report.warnings.len(), 2);
}

#[test]
fn malformed_documents_are_rejected_without_touching_the_registry() {
    let parser = ProtocolParser::new().unwrap();
    let mut registry = GraphRegistry::new();

    let result = parser.parse_document(&mut registry, "broken.xml", "<dbtplenarprotokoll><rede>");

    assert!(matches!(result, Err(ProtocolError::Document { .. })));
    assert_eq!(registry.counts(), crate::graph::RegistryCounts::default());
}

#[test]
fn ingest_protocols_skips_broken_files_and_keeps_going() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b_broken.XML"), "<dbtplenarprotokoll>").unwrap();
    fs::write(dir.path().join("a_session.xml"), PROTOCOL).unwrap();
    fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let paths = discover_protocols(dir.path()).unwrap();
    assert_eq!(paths.len(), 2);
    assert!(paths[0].ends_with("a_session.xml"));

    let parser = ProtocolParser::new().unwrap();
    let mut registry = GraphRegistry::new();
    let report = ingest_protocols(&parser, &mut registry, &paths);

    assert_eq!(report.documents_found, 2);
    assert_eq!(report.documents_parsed, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("b_broken.XML"));
    assert_eq!(report.sources[0].filename, "a_session.xml");
    assert_eq!(report.sources[0].sha256.len(), 64);
    assert_eq!(registry.speeches().len(), 1);
    assert!(report.warnings().all(|warning| warning.starts_with("a_session.xml: ")));
}
