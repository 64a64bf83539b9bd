use chrono::{NaiveDate, NaiveTime, TimeDelta};

use super::registry::{Keyed, TableKey};

macro_rules! table_key {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(usize);

        impl TableKey for $name {
            fn from_index(index: usize) -> Self {
                Self(index)
            }

            fn index(self) -> usize {
                self.0
            }
        }
    };
}

table_key!(FactionKey);
table_key!(MemberKey);
table_key!(SessionKey);
table_key!(SpeechKey);
table_key!(CommentKey);
table_key!(SpeakerProfileKey);

/// A parliamentary group. `id` is the normalized faction key.
#[derive(Debug, Clone)]
pub struct Faction {
    pub id: String,
    pub name: String,
    pub origin_party: String,
    pub(in crate::graph) members: Vec<MemberKey>,
}

impl Faction {
    pub fn members(&self) -> &[MemberKey] {
        &self.members
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

impl Keyed for Faction {
    type Key = FactionKey;
    const KIND: &'static str = "faction";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewMember {
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub profession: String,
    pub function: String,
}

#[derive(Debug, Clone)]
pub struct Member {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub birthdate: Option<NaiveDate>,
    pub profession: String,
    pub function: String,
    pub(in crate::graph) faction: Option<FactionKey>,
    pub(in crate::graph) speeches: Vec<SpeechKey>,
}

impl Member {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn faction(&self) -> Option<FactionKey> {
        self.faction
    }

    pub fn speeches(&self) -> &[SpeechKey] {
        &self.speeches
    }
}

impl Keyed for Member {
    type Key = MemberKey;
    const KIND: &'static str = "member";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewSession {
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub room: String,
    pub access: String,
}

/// One sitting. The id is synthesized from term and session number.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub room: String,
    pub access: String,
    pub(in crate::graph) speeches: Vec<SpeechKey>,
}

impl Session {
    pub fn speeches(&self) -> &[SpeechKey] {
        &self.speeches
    }
}

impl Keyed for Session {
    type Key = SessionKey;
    const KIND: &'static str = "session";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct NewSpeech {
    pub date: Option<NaiveDate>,
    pub title: String,
    pub member: MemberKey,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct Speech {
    pub id: String,
    pub date: Option<NaiveDate>,
    pub title: String,
    pub text: String,
    pub(in crate::graph) member: MemberKey,
    pub(in crate::graph) session: Option<SessionKey>,
    pub(in crate::graph) comments: Vec<CommentKey>,
}

impl Speech {
    pub fn member(&self) -> MemberKey {
        self.member
    }

    pub fn session(&self) -> Option<SessionKey> {
        self.session
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }
}

impl Keyed for Speech {
    type Key = SpeechKey;
    const KIND: &'static str = "speech";

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub author: String,
    pub text: String,
    pub date: Option<NaiveDate>,
    pub speech: SpeechKey,
}

/// An interjection recorded against a speech. The speech reference is not optional.
#[derive(Debug, Clone)]
pub struct Comment {
    pub id: String,
    pub author: String,
    pub text: String,
    pub date: Option<NaiveDate>,
    pub(in crate::graph) speech: SpeechKey,
}

impl Comment {
    pub fn speech(&self) -> SpeechKey {
        self.speech
    }
}

impl Keyed for Comment {
    type Key = CommentKey;
    const KIND: &'static str = "comment";

    fn id(&self) -> &str {
        &self.id
    }
}

/// Topic and speaking time taken from a speaker record, one per member.
#[derive(Debug, Clone)]
pub struct SpeakerProfile {
    pub member_id: String,
    pub member: MemberKey,
    pub topic: String,
    pub speaking_time: TimeDelta,
}

impl Keyed for SpeakerProfile {
    type Key = SpeakerProfileKey;
    const KIND: &'static str = "speaker profile";

    fn id(&self) -> &str {
        &self.member_id
    }
}
