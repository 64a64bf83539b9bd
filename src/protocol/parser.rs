use anyhow::Result;
use roxmltree::{Document, Node, ParsingOptions};
use serde::Serialize;
use tracing::{debug, warn};

use crate::graph::{
    GraphRegistry, MemberKey, NewComment, NewMember, NewSession, NewSpeech, RegistryCounts,
    SessionAssignment, SessionKey,
};
use crate::util::sha256_hex;

use super::fields::{DurationParser, parse_protocol_date, parse_protocol_time};
use super::normalize::{NON_ALIGNED_FACTION, faction_from_surname, normalize_faction};

const PUBLIC_ACCESS: &str = "Öffentlich";
const UNKNOWN_COMMENT_AUTHOR: &str = "unbekannt";
const COMMENT_HASH_CHARS: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed protocol document {source_name}")]
    Document {
        source_name: String,
        #[source]
        source: roxmltree::Error,
    },
}

/// Outcome of parsing one protocol document into the registry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DocumentReport {
    pub source: String,
    pub session_id: Option<String>,
    pub created: RegistryCounts,
    pub speeches_seen: usize,
    pub speeches_skipped: usize,
    pub warnings: Vec<String>,
}

impl DocumentReport {
    fn warn(&mut self, warning: String) {
        warn!(source = %self.source, warning = %warning, "protocol warning");
        self.warnings.push(warning);
    }
}

/// Session context established by the session pass and consumed by the speech pass.
#[derive(Debug, Clone, Copy, Default)]
struct SessionContext {
    session: Option<SessionKey>,
    date: Option<chrono::NaiveDate>,
}

/// Deterministic id for a comment, derived from its speech and its text.
pub fn comment_id(speech_id: &str, text: &str) -> String {
    let digest = sha256_hex(text.as_bytes());
    format!("{speech_id}_{}", &digest[..COMMENT_HASH_CHARS])
}

#[derive(Debug, Clone)]
pub struct ProtocolParser {
    durations: DurationParser,
}

impl ProtocolParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            durations: DurationParser::new()?,
        })
    }

    /// Parses one protocol and merges its entities into `registry`.
    ///
    /// Passes run in a fixed order because each one resolves references created by
    /// the previous ones: factions, members, session, speaker metadata, speeches.
    /// A document that is not well-formed XML leaves the registry untouched.
    pub fn parse_document(
        &self,
        registry: &mut GraphRegistry,
        source_name: &str,
        xml: &str,
    ) -> Result<DocumentReport, ProtocolError> {
        let options = ParsingOptions {
            allow_dtd: true,
            ..ParsingOptions::default()
        };
        let document =
            Document::parse_with_options(xml, options).map_err(|source| ProtocolError::Document {
                source_name: source_name.to_string(),
                source,
            })?;

        let before = registry.counts();
        let mut report = DocumentReport {
            source: source_name.to_string(),
            ..DocumentReport::default()
        };

        faction_pass(&document, registry);
        member_pass(&document, registry, &mut report);
        let session = session_pass(&document, registry, &mut report);
        self.speaker_metadata_pass(&document, registry);
        speech_pass(&document, registry, session, &mut report);

        report.created = registry.counts().created_since(&before);
        debug!(
            source = %source_name,
            factions = report.created.factions,
            members = report.created.members,
            speeches = report.created.speeches,
            comments = report.created.comments,
            "parsed protocol"
        );

        Ok(report)
    }

    /// Needs members from the member pass; speaker records of unknown members are ignored.
    fn speaker_metadata_pass(&self, document: &Document, registry: &mut GraphRegistry) {
        for speaker in elements_named(document.root(), "redner") {
            let Some(member) = registry.members().key_of(attribute(speaker, "id")) else {
                continue;
            };

            let topic = element_text(speaker, "thema");
            let speaking_time = self
                .durations
                .parse_or_zero(&element_text(speaker, "redezeit"));

            // the member key was just resolved, so the id cannot be empty
            let _ = registry.create_speaker_profile(member, &topic, speaking_time);
        }
    }
}

/// First pass: every faction label found in a speaker's name block.
fn faction_pass(document: &Document, registry: &mut GraphRegistry) {
    for speaker in elements_named(document.root(), "redner") {
        let Some(name) = first_element_named(speaker, "name") else {
            continue;
        };

        let label = element_text(name, "fraktion");
        if label.is_empty() {
            continue;
        }

        let faction_id = normalize_faction(&label);
        if let Some(existing) = registry.factions().get_by_id(&faction_id) {
            if existing.name != label {
                debug!(label = %label, faction = %existing.id, "label merged into existing faction");
            }
            continue;
        }
        if registry.create_faction(&faction_id, &label, "").is_err() {
            debug!(label = %label, "faction label normalized to an empty id");
        }
    }
}

/// Needs the factions of the first pass to attach members to them.
fn member_pass(document: &Document, registry: &mut GraphRegistry, report: &mut DocumentReport) {
    for speaker in elements_named(document.root(), "redner") {
        let Some(name) = first_element_named(speaker, "name") else {
            continue;
        };

        let id = attribute(speaker, "id");
        let first_name = element_text(name, "vorname");
        let last_name = element_text(name, "nachname");
        let mut faction_label = element_text(name, "fraktion");

        if faction_label.is_empty() && !last_name.is_empty() {
            if let Some(fallback) = faction_from_surname(&last_name) {
                faction_label = fallback.to_string();
            }
        }
        let faction_id = normalize_faction(&faction_label);

        let member = match registry.create_member(
            id,
            NewMember {
                first_name,
                last_name,
                ..NewMember::default()
            },
        ) {
            Ok(member) => member,
            Err(_) => {
                debug!("skipping speaker record without id");
                continue;
            }
        };

        match registry.factions().key_of(&faction_id) {
            Some(faction) if !faction_id.is_empty() => {
                registry.associate_member_faction(member, faction)
            }
            _ if faction_id.is_empty() || faction_id == NON_ALIGNED_FACTION => {}
            _ => report.warn(format!("faction {faction_id} not found for member {id}")),
        }
    }
}

/// Reads the session metadata from the root element. Does not depend on earlier passes,
/// but must precede the speech pass which attaches speeches to this session.
fn session_pass(
    document: &Document,
    registry: &mut GraphRegistry,
    report: &mut DocumentReport,
) -> SessionContext {
    let root = document.root_element();

    let date = match parse_protocol_date(attribute(root, "sitzung-datum")) {
        Ok(date) => date,
        Err(err) => {
            report.warn(err.to_string());
            None
        }
    };
    let time = match parse_protocol_time(attribute(root, "sitzung-start-uhrzeit")) {
        Ok(time) => time,
        Err(err) => {
            report.warn(err.to_string());
            None
        }
    };

    let term = attribute(root, "wahlperiode").trim();
    let number = attribute(root, "sitzung-nr").trim();
    if term.is_empty() || number.is_empty() {
        report.warn(format!(
            "session metadata incomplete (wahlperiode={term:?}, sitzung-nr={number:?})"
        ));
        return SessionContext {
            session: None,
            date,
        };
    }

    let session_id = format!("WP{term}_S{number}");
    let session = registry
        .create_session(
            &session_id,
            NewSession {
                date,
                time,
                room: attribute(root, "sitzung-ort").to_string(),
                access: PUBLIC_ACCESS.to_string(),
            },
        )
        .ok();

    report.session_id = Some(session_id);
    SessionContext { session, date }
}

/// Last pass: needs members (speaker resolution) and the session of this document.
fn speech_pass(
    document: &Document,
    registry: &mut GraphRegistry,
    context: SessionContext,
    report: &mut DocumentReport,
) {
    for speech_element in elements_named(document.root(), "rede") {
        report.speeches_seen += 1;

        let speech_id = attribute(speech_element, "id");
        let speaker_id = first_element_named(speech_element, "redner")
            .map(|speaker| attribute(speaker, "id"))
            .unwrap_or_default();
        let Some(member) = resolve_speaker(registry, speech_id, speaker_id) else {
            report.speeches_skipped += 1;
            continue;
        };

        let mut title = element_text(speech_element, "thema");
        if title.is_empty() {
            let speaker = &registry.members()[member];
            title = format!("Rede von {} {}", speaker.first_name, speaker.last_name);
        }

        let speech = match registry.create_speech(
            speech_id,
            NewSpeech {
                date: context.date,
                title,
                member,
                text: speech_text(speech_element),
            },
        ) {
            Ok(speech) => speech,
            Err(_) => {
                report.speeches_skipped += 1;
                continue;
            }
        };

        if let Some(session) = context.session {
            if let SessionAssignment::Conflict(existing) =
                registry.assign_speech_session(speech, session)
            {
                let existing_id = registry.sessions()[existing].id.clone();
                report.warn(format!(
                    "speech {speech_id} already belongs to session {existing_id}"
                ));
            }
        }
        registry.add_member_speech(member, speech);

        for comment_element in elements_named(speech_element, "kommentar") {
            let text = text_content(comment_element).trim().to_string();
            if text.is_empty() {
                continue;
            }

            let id = comment_id(speech_id, &text);
            let created = registry.create_comment(
                &id,
                NewComment {
                    author: UNKNOWN_COMMENT_AUTHOR.to_string(),
                    text,
                    date: context.date,
                    speech,
                },
            );
            if let Ok(comment) = created {
                registry.add_speech_comment(speech, comment);
            }
        }
    }
}

fn resolve_speaker(registry: &GraphRegistry, speech_id: &str, speaker_id: &str) -> Option<MemberKey> {
    if speech_id.trim().is_empty() || speaker_id.trim().is_empty() {
        return None;
    }
    registry.members().key_of(speaker_id)
}

/// Joins the trimmed text of each direct `<p>` child, one paragraph per line.
pub fn speech_text(speech_element: Node) -> String {
    let mut text = String::new();
    for paragraph in speech_element
        .children()
        .filter(|child| child.is_element() && child.has_tag_name("p"))
    {
        text.push_str(text_content(paragraph).trim());
        text.push('\n');
    }
    text.trim().to_string()
}

fn elements_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> + 'a {
    node.descendants()
        .skip(1)
        .filter(move |candidate| candidate.is_element() && candidate.has_tag_name(tag))
}

fn first_element_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    tag: &'static str,
) -> Option<Node<'a, 'input>> {
    elements_named(node, tag).next()
}

fn element_text(node: Node, tag: &'static str) -> String {
    first_element_named(node, tag)
        .map(|element| text_content(element).trim().to_string())
        .unwrap_or_default()
}

fn text_content(node: Node) -> String {
    node.descendants()
        .filter(|descendant| descendant.is_text())
        .filter_map(|descendant| descendant.text())
        .collect()
}

fn attribute<'a>(node: Node<'a, '_>, name: &str) -> &'a str {
    node.attribute(name).unwrap_or("")
}
