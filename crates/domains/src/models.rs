//! # Domain Models
//!
//! These structs represent the core entities of the sözlük.
//! We use UUID v7 for time-ordered, globally unique identification.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Published entries a novice needs before their application is reviewed.
pub const NOVICE_ENTRY_THRESHOLD: u64 = 10;

/// An entry must score strictly above this rate to be an author's "nice" entry.
pub fn nice_entry_threshold() -> BigDecimal {
    BigDecimal::from(1)
}

/// Who may start a private conversation with an author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessagePreference {
    #[default]
    AllUsers,
    /// Only authors who are no longer novices.
    AuthorOnly,
    /// Only authors the recipient follows.
    FollowingOnly,
    Disabled,
}

impl MessagePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AllUsers => "all_users",
            Self::AuthorOnly => "author_only",
            Self::FollowingOnly => "following_only",
            Self::Disabled => "disabled",
        }
    }
}

impl FromStr for MessagePreference {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_users" => Ok(Self::AllUsers),
            "author_only" => Ok(Self::AuthorOnly),
            "following_only" => Ok(Self::FollowingOnly),
            "disabled" => Ok(Self::Disabled),
            other => Err(AppError::validation(format!("unknown message preference `{other}`"))),
        }
    }
}

/// Where a novice stands in the authorship review queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    /// Not enough published entries yet.
    #[default]
    OnHold,
    /// Threshold reached, waiting for review.
    Pending,
    Approved,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OnHold => "on_hold",
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }

    /// Where a novice's application moves once they have `published`
    /// entries, or `None` when it stays put. Non-novices and approved
    /// applications never move.
    pub fn transition(self, is_novice: bool, published: u64) -> Option<ApplicationStatus> {
        if !is_novice {
            return None;
        }
        match self {
            Self::OnHold if published >= NOVICE_ENTRY_THRESHOLD => Some(Self::Pending),
            Self::Pending if published < NOVICE_ENTRY_THRESHOLD => Some(Self::OnHold),
            _ => None,
        }
    }
}

/// An application status recomputed from the author's published count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReview {
    pub from: ApplicationStatus,
    pub to: ApplicationStatus,
    pub published: u64,
}

impl StatusReview {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

impl FromStr for ApplicationStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on_hold" => Ok(Self::OnHold),
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            other => Err(AppError::validation(format!("unknown application status `{other}`"))),
        }
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub message_preference: MessagePreference,
    pub is_novice: bool,
    pub application_status: ApplicationStatus,
    /// Stamped when the author enters the review queue.
    pub application_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Author {
    pub fn from_new(new: NewAuthor, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: new.username,
            email: new.email,
            message_preference: MessagePreference::default(),
            is_novice: new.is_novice,
            application_status: ApplicationStatus::default(),
            application_date: None,
            created_at: now,
        }
    }

    pub fn absolute_url(&self) -> String {
        format!("/biri/{}/", self.username)
    }
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Registration input. Authors start as novices unless stated otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuthor {
    pub username: String,
    pub email: String,
    pub is_novice: bool,
}

impl NewAuthor {
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            is_novice: true,
        }
    }

    pub fn novice(mut self, is_novice: bool) -> Self {
        self.is_novice = is_novice;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    /// The URL slug, unique even when names transliterate alike
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn absolute_url(&self) -> String {
        format!("/category/{}/", self.slug)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A headword. Entries are written under topics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    /// Lowercased with Turkish casing rules.
    pub title: String,
    pub slug: String,
    /// Author of the first published entry, if any.
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Topic {
    /// A stored topic always exists, even without entries.
    pub fn exists(&self) -> bool {
        true
    }

    pub fn absolute_url(&self) -> String {
        format!("/topic/{}/", self.slug)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub is_draft: bool,
    pub vote_rate: BigDecimal,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn is_published(&self) -> bool {
        !self.is_draft
    }

    pub fn absolute_url(&self) -> String {
        format!("/entry/{}/", self.id)
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.id, self.author_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub topic_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    pub is_draft: bool,
}

impl NewEntry {
    pub fn published(topic_id: Uuid, author_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            topic_id,
            author_id,
            content: content.into(),
            is_draft: false,
        }
    }

    pub fn draft(topic_id: Uuid, author_id: Uuid, content: impl Into<String>) -> Self {
        Self {
            is_draft: true,
            ..Self::published(topic_id, author_id, content)
        }
    }
}

/// An entry write together with what it did to the rest of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryWrite {
    pub entry: Entry,
    /// The write made the entry's author the creator of its topic.
    pub topic_claimed: bool,
    /// Set when the write changed the author's published count.
    pub review: Option<StatusReview>,
}

/// How a vote delta reaches an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
    /// A fresh vote, or the withdrawal of one.
    Cast,
    /// The voter flipped an existing vote: the old vote is undone and the new
    /// one applied, so the delta lands twice.
    Change,
}

impl VoteKind {
    pub fn effective_delta(&self, delta: &BigDecimal) -> BigDecimal {
        match self {
            Self::Cast => delta.clone(),
            Self::Change => delta.clone() * BigDecimal::from(2),
        }
    }
}

/// Trailing windows for an author's entry counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryWindow {
    Day,
    Week,
    Month,
}

impl EntryWindow {
    pub fn duration(&self) -> Duration {
        match self {
            Self::Day => Duration::days(1),
            Self::Week => Duration::days(7),
            Self::Month => Duration::days(30),
        }
    }

    /// Earliest creation time still inside the window.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.duration()
    }
}

/// The unordered pair of authors a conversation belongs to.
///
/// Stored low/high so `{a, b}` and `{b, a}` hit the same unique key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    low: Uuid,
    high: Uuid,
}

impl ParticipantPair {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn low(&self) -> Uuid {
        self.low
    }

    pub fn high(&self) -> Uuid {
        self.high
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.low == id || self.high == id
    }

    /// The participant that is not `id`, if `id` takes part at all.
    pub fn other(&self, id: Uuid) -> Option<Uuid> {
        if self.low == id {
            Some(self.high)
        } else if self.high == id {
            Some(self.low)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participants: ParticipantPair,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}, {}>", self.id, self.participants.low(), self.participants.high())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// A message that passed the compose rules but has no conversation yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl OutgoingMessage {
    pub fn participants(&self) -> ParticipantPair {
        ParticipantPair::new(self.sender_id, self.recipient_id)
    }
}

/// Result of storing an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub conversation: Conversation,
    pub message: Message,
    /// True when this message opened the conversation.
    pub conversation_created: bool,
}

/// A private note one author keeps about another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memento {
    pub id: Uuid,
    pub holder_id: Uuid,
    pub patient_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Memento {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Memento#{}, from {} about {}", self.id, self.holder_id, self.patient_id)
    }
}

/// A pending e-mail confirmation. Only the token hash is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserVerification {
    pub id: Uuid,
    pub author_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl UserVerification {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFavorite {
    pub id: Uuid,
    pub author_id: Uuid,
    pub entry_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for EntryFavorite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry favorisi #{}", self.id)
    }
}

/// Feedback sent through the contact form; the reporter may be anonymous.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneralReport {
    pub id: Uuid,
    pub reporter_email: Option<String>,
    pub subject: String,
    pub content: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for GeneralReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <GeneralReport>#{}", self.subject, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReport {
    pub reporter_email: Option<String>,
    pub subject: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicFollowing {
    pub id: Uuid,
    pub topic_id: Uuid,
    pub author_id: Uuid,
    /// Last time the follower caught up with the topic.
    pub read_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for TopicFollowing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.topic_id, self.author_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn participant_pair_ignores_order() {
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        assert_eq!(ParticipantPair::new(a, b), ParticipantPair::new(b, a));
        assert_eq!(ParticipantPair::new(b, a).other(a), Some(b));
        assert_eq!(ParticipantPair::new(a, b).other(Uuid::now_v7()), None);
    }

    #[test]
    fn preference_and_status_round_trip_through_storage_names() {
        for pref in [
            MessagePreference::AllUsers,
            MessagePreference::AuthorOnly,
            MessagePreference::FollowingOnly,
            MessagePreference::Disabled,
        ] {
            assert_eq!(pref.as_str().parse::<MessagePreference>(), Ok(pref));
        }
        assert_eq!("pending".parse::<ApplicationStatus>(), Ok(ApplicationStatus::Pending));
        assert!("banned".parse::<ApplicationStatus>().is_err());
    }

    #[test]
    fn change_vote_doubles_delta() {
        let delta: BigDecimal = "0.2".parse().unwrap();
        assert_eq!(VoteKind::Cast.effective_delta(&delta), delta);
        assert_eq!(VoteKind::Change.effective_delta(&delta), "0.4".parse::<BigDecimal>().unwrap());
    }

    #[test]
    fn windows_reach_back_from_now() {
        let now = Utc.with_ymd_and_hms(2024, 3, 31, 12, 0, 0).unwrap();
        assert_eq!(EntryWindow::Day.since(now), Utc.with_ymd_and_hms(2024, 3, 30, 12, 0, 0).unwrap());
        assert_eq!(EntryWindow::Week.since(now), Utc.with_ymd_and_hms(2024, 3, 24, 12, 0, 0).unwrap());
        assert_eq!(EntryWindow::Month.since(now), Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn only_novices_move_through_the_review_queue() {
        use ApplicationStatus::*;
        let threshold = NOVICE_ENTRY_THRESHOLD;
        assert_eq!(OnHold.transition(true, threshold - 1), None);
        assert_eq!(OnHold.transition(true, threshold), Some(Pending));
        assert_eq!(Pending.transition(true, threshold), None);
        assert_eq!(Pending.transition(true, threshold - 1), Some(OnHold));
        assert_eq!(Approved.transition(true, 0), None);
        assert_eq!(OnHold.transition(false, threshold + 5), None);
        assert_eq!(Pending.transition(false, 0), None);
    }

    #[test]
    fn messaging_records_display_like_the_admin_lists() {
        let now = Utc::now();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        let pair = ParticipantPair::new(b, a);
        let conversation = Conversation {
            id: Uuid::now_v7(),
            participants: pair,
            created_at: now,
        };
        assert_eq!(
            conversation.to_string(),
            format!("{}<{}, {}>", conversation.id, pair.low(), pair.high())
        );

        let message = Message {
            id: Uuid::now_v7(),
            conversation_id: conversation.id,
            sender_id: a,
            recipient_id: b,
            body: "selam".into(),
            sent_at: now,
            read_at: None,
        };
        assert_eq!(message.to_string(), message.id.to_string());

        let favorite = EntryFavorite {
            id: Uuid::now_v7(),
            author_id: a,
            entry_id: Uuid::now_v7(),
            created_at: now,
        };
        assert_eq!(favorite.to_string(), format!("Entry favorisi #{}", favorite.id));
    }

    #[test]
    fn new_authors_are_novices_on_hold() {
        let author = Author::from_new(NewAuthor::new("user", "user@example.com"), Utc::now());
        assert!(author.is_novice);
        assert_eq!(author.application_status, ApplicationStatus::OnHold);
        assert_eq!(author.message_preference, MessagePreference::AllUsers);
        assert_eq!(author.absolute_url(), "/biri/user/");
        assert_eq!(author.to_string(), "user");
    }
}
