use std::collections::HashMap;
use std::ops::Index;

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use super::entities::{
    Comment, CommentKey, Faction, FactionKey, Member, MemberKey, NewComment, NewMember,
    NewSession, NewSpeech, Session, SessionKey, SpeakerProfile, SpeakerProfileKey, Speech,
    SpeechKey,
};

pub trait TableKey: Copy {
    fn from_index(index: usize) -> Self;
    fn index(self) -> usize;
}

pub trait Keyed {
    type Key: TableKey;
    const KIND: &'static str;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("refusing to register {kind} with an empty id")]
pub struct InvalidIdError {
    pub kind: &'static str,
}

/// Deduplicated storage for one entity type, iterated in insertion order.
#[derive(Debug, Clone)]
pub struct EntityTable<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for EntityTable<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Keyed> EntityTable<T> {
    /// Returns the existing entry for `id` untouched, or stores the value built by `build`.
    pub fn create_or_get(
        &mut self,
        id: &str,
        build: impl FnOnce(String) -> T,
    ) -> Result<T::Key, InvalidIdError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(InvalidIdError { kind: T::KIND });
        }

        if let Some(&position) = self.index.get(id) {
            return Ok(T::Key::from_index(position));
        }

        let position = self.items.len();
        self.items.push(build(id.to_string()));
        self.index.insert(id.to_string(), position);
        Ok(T::Key::from_index(position))
    }

    pub fn key_of(&self, id: &str) -> Option<T::Key> {
        self.index.get(id.trim()).copied().map(T::Key::from_index)
    }

    pub fn get_by_id(&self, id: &str) -> Option<&T> {
        self.index.get(id.trim()).map(|&position| &self.items[position])
    }

    pub fn get(&self, key: T::Key) -> Option<&T> {
        self.items.get(key.index())
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn get_mut(&mut self, key: T::Key) -> &mut T {
        &mut self.items[key.index()]
    }
}

impl<T: Keyed> Index<T::Key> for EntityTable<T> {
    type Output = T;

    fn index(&self, key: T::Key) -> &T {
        &self.items[key.index()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAssignment {
    Assigned,
    Unchanged,
    /// The speech already belongs to another session; nothing was changed.
    Conflict(SessionKey),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCounts {
    pub factions: usize,
    pub members: usize,
    pub sessions: usize,
    pub speeches: usize,
    pub comments: usize,
    pub speaker_profiles: usize,
}

impl RegistryCounts {
    pub fn created_since(&self, before: &RegistryCounts) -> RegistryCounts {
        RegistryCounts {
            factions: self.factions.saturating_sub(before.factions),
            members: self.members.saturating_sub(before.members),
            sessions: self.sessions.saturating_sub(before.sessions),
            speeches: self.speeches.saturating_sub(before.speeches),
            comments: self.comments.saturating_sub(before.comments),
            speaker_profiles: self.speaker_profiles.saturating_sub(before.speaker_profiles),
        }
    }
}

/// The entity graph for one run. Built during ingestion, read-only afterwards.
#[derive(Debug, Default)]
pub struct GraphRegistry {
    factions: EntityTable<Faction>,
    members: EntityTable<Member>,
    sessions: EntityTable<Session>,
    speeches: EntityTable<Speech>,
    comments: EntityTable<Comment>,
    speaker_profiles: EntityTable<SpeakerProfile>,
}

impl GraphRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn factions(&self) -> &EntityTable<Faction> {
        &self.factions
    }

    pub fn members(&self) -> &EntityTable<Member> {
        &self.members
    }

    pub fn sessions(&self) -> &EntityTable<Session> {
        &self.sessions
    }

    pub fn speeches(&self) -> &EntityTable<Speech> {
        &self.speeches
    }

    pub fn comments(&self) -> &EntityTable<Comment> {
        &self.comments
    }

    pub fn speaker_profiles(&self) -> &EntityTable<SpeakerProfile> {
        &self.speaker_profiles
    }

    pub fn counts(&self) -> RegistryCounts {
        RegistryCounts {
            factions: self.factions.len(),
            members: self.members.len(),
            sessions: self.sessions.len(),
            speeches: self.speeches.len(),
            comments: self.comments.len(),
            speaker_profiles: self.speaker_profiles.len(),
        }
    }

    pub fn create_faction(
        &mut self,
        id: &str,
        name: &str,
        origin_party: &str,
    ) -> Result<FactionKey, InvalidIdError> {
        self.factions.create_or_get(id, |id| Faction {
            id,
            name: name.to_string(),
            origin_party: origin_party.to_string(),
            members: Vec::new(),
        })
    }

    pub fn create_member(
        &mut self,
        id: &str,
        fields: NewMember,
    ) -> Result<MemberKey, InvalidIdError> {
        self.members.create_or_get(id, |id| Member {
            id,
            first_name: fields.first_name,
            last_name: fields.last_name,
            birthdate: fields.birthdate,
            profession: fields.profession,
            function: fields.function,
            faction: None,
            speeches: Vec::new(),
        })
    }

    pub fn create_session(
        &mut self,
        id: &str,
        fields: NewSession,
    ) -> Result<SessionKey, InvalidIdError> {
        self.sessions.create_or_get(id, |id| Session {
            id,
            date: fields.date,
            time: fields.time,
            room: fields.room,
            access: fields.access,
            speeches: Vec::new(),
        })
    }

    pub fn create_speech(
        &mut self,
        id: &str,
        fields: NewSpeech,
    ) -> Result<SpeechKey, InvalidIdError> {
        self.speeches.create_or_get(id, |id| Speech {
            id,
            date: fields.date,
            title: fields.title,
            text: fields.text,
            member: fields.member,
            session: None,
            comments: Vec::new(),
        })
    }

    pub fn create_comment(
        &mut self,
        id: &str,
        fields: NewComment,
    ) -> Result<CommentKey, InvalidIdError> {
        self.comments.create_or_get(id, |id| Comment {
            id,
            author: fields.author,
            text: fields.text,
            date: fields.date,
            speech: fields.speech,
        })
    }

    pub fn create_speaker_profile(
        &mut self,
        member: MemberKey,
        topic: &str,
        speaking_time: TimeDelta,
    ) -> Result<SpeakerProfileKey, InvalidIdError> {
        let member_id = self.members[member].id.clone();
        self.speaker_profiles.create_or_get(&member_id, |member_id| SpeakerProfile {
            member_id,
            member,
            topic: topic.to_string(),
            speaking_time,
        })
    }

    /// Sets the member's faction and moves the member into that faction's member list.
    pub fn associate_member_faction(&mut self, member: MemberKey, faction: FactionKey) {
        let previous = self.members[member].faction;
        if previous == Some(faction) {
            return;
        }

        if let Some(previous) = previous {
            self.factions
                .get_mut(previous)
                .members
                .retain(|existing| *existing != member);
        }

        self.members.get_mut(member).faction = Some(faction);
        let members = &mut self.factions.get_mut(faction).members;
        if !members.contains(&member) {
            members.push(member);
        }
    }

    /// Links a speech and a session on both sides, or leaves both untouched.
    pub fn assign_speech_session(
        &mut self,
        speech: SpeechKey,
        session: SessionKey,
    ) -> SessionAssignment {
        match self.speeches[speech].session {
            Some(existing) if existing == session => SessionAssignment::Unchanged,
            Some(existing) => SessionAssignment::Conflict(existing),
            None => {
                self.speeches.get_mut(speech).session = Some(session);
                let speeches = &mut self.sessions.get_mut(session).speeches;
                if !speeches.contains(&speech) {
                    speeches.push(speech);
                }
                SessionAssignment::Assigned
            }
        }
    }

    pub fn add_member_speech(&mut self, member: MemberKey, speech: SpeechKey) {
        let speeches = &mut self.members.get_mut(member).speeches;
        if !speeches.contains(&speech) {
            speeches.push(speech);
        }
    }

    pub fn add_speech_comment(&mut self, speech: SpeechKey, comment: CommentKey) {
        let comments = &mut self.speeches.get_mut(speech).comments;
        if !comments.contains(&comment) {
            comments.push(comment);
        }
    }
}
