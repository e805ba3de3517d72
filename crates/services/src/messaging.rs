//! # Messaging
//!
//! Decides whether one author may write to another and files every sent
//! message into the single conversation of that pair, opening it on first
//! contact.

use std::fmt;
use std::sync::Arc;

use domains::{
    AppError, Author, AuthorRepo, Clock, Conversation, Message, MessagePreference, MessageRepo,
    OutgoingMessage, ParticipantPair, Result,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Why a message was not sent. Refusals are ordinary outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    SelfMessage,
    /// One of the two authors blocks the other.
    Blocked,
    RecipientDisabled,
    /// Recipient accepts messages from non-novice authors only.
    NoviceSender,
    /// Recipient accepts messages only from authors they follow.
    NotFollowed,
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::SelfMessage => "cannot message yourself",
            Self::Blocked => "one of the authors blocks the other",
            Self::RecipientDisabled => "recipient does not accept messages",
            Self::NoviceSender => "recipient only accepts messages from authors",
            Self::NotFollowed => "recipient only accepts messages from authors they follow",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComposeOutcome {
    Sent {
        message: Message,
        conversation: Conversation,
    },
    Refused(Refusal),
}

impl ComposeOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Sent { message, .. } => Some(message),
            Self::Refused(_) => None,
        }
    }

    pub fn refusal(&self) -> Option<Refusal> {
        match self {
            Self::Sent { .. } => None,
            Self::Refused(refusal) => Some(*refusal),
        }
    }

    pub fn into_message(self) -> Option<Message> {
        match self {
            Self::Sent { message, .. } => Some(message),
            Self::Refused(_) => None,
        }
    }
}

pub struct MessagingService {
    authors: Arc<dyn AuthorRepo>,
    messages: Arc<dyn MessageRepo>,
    clock: Arc<dyn Clock>,
}

impl MessagingService {
    pub fn new(
        authors: Arc<dyn AuthorRepo>,
        messages: Arc<dyn MessageRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            authors,
            messages,
            clock,
        }
    }

    /// Sends `body` from `sender_id` to `recipient_id` unless the recipient's
    /// preferences or a block forbid it. Refusals take precedence over a
    /// blank body, which is only an error for a message that would be sent.
    pub async fn compose(
        &self,
        sender_id: Uuid,
        recipient_id: Uuid,
        body: &str,
    ) -> Result<ComposeOutcome> {
        if sender_id == recipient_id {
            debug!(sender = %sender_id, "refused self message");
            return Ok(ComposeOutcome::Refused(Refusal::SelfMessage));
        }
        let sender = self.require_author(sender_id).await?;
        let recipient = self.require_author(recipient_id).await?;

        if let Some(refusal) = self.check_permission(&sender, &recipient).await? {
            debug!(sender = %sender_id, recipient = %recipient_id, reason = %refusal, "message refused");
            return Ok(ComposeOutcome::Refused(refusal));
        }
        if body.trim().is_empty() {
            return Err(AppError::validation("message body cannot be empty"));
        }

        let outgoing = OutgoingMessage {
            id: Uuid::now_v7(),
            sender_id,
            recipient_id,
            body: body.to_string(),
            sent_at: self.clock.now(),
        };
        let delivery = self.messages.deliver(&outgoing).await?;

        if delivery.conversation_created {
            info!(conversation = %delivery.conversation.id, "conversation started");
        }
        info!(
            message = %delivery.message.id,
            conversation = %delivery.conversation.id,
            "message sent"
        );

        Ok(ComposeOutcome::Sent {
            message: delivery.message,
            conversation: delivery.conversation,
        })
    }

    async fn check_permission(&self, sender: &Author, recipient: &Author) -> Result<Option<Refusal>> {
        if self.authors.blocks_between(sender.id, recipient.id).await? {
            return Ok(Some(Refusal::Blocked));
        }

        let refusal = match recipient.message_preference {
            MessagePreference::AllUsers => None,
            MessagePreference::Disabled => Some(Refusal::RecipientDisabled),
            MessagePreference::AuthorOnly if sender.is_novice => Some(Refusal::NoviceSender),
            MessagePreference::AuthorOnly => None,
            MessagePreference::FollowingOnly => {
                if self.authors.is_following(recipient.id, sender.id).await? {
                    None
                } else {
                    Some(Refusal::NotFollowed)
                }
            }
        };
        Ok(refusal)
    }

    /// Stamps the message as read now. A second call moves the stamp forward.
    pub async fn mark_read(&self, message_id: Uuid) -> Result<Message> {
        self.messages
            .mark_message_read(message_id, self.clock.now())
            .await?
            .ok_or_else(|| AppError::not_found("Message", message_id))
    }

    pub async fn conversation_between(&self, a: Uuid, b: Uuid) -> Result<Option<Conversation>> {
        self.messages.find_conversation(ParticipantPair::new(a, b)).await
    }

    pub async fn conversations_for(&self, author_id: Uuid) -> Result<Vec<Conversation>> {
        self.messages.conversations_of(author_id).await
    }

    pub async fn conversation_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>> {
        self.messages.conversation_messages(conversation_id).await
    }

    /// The most recently sent message of the conversation.
    pub async fn last_message(&self, conversation_id: Uuid) -> Result<Option<Message>> {
        self.messages.last_message(conversation_id).await
    }

    async fn require_author(&self, id: Uuid) -> Result<Author> {
        self.authors
            .get_author(id)
            .await?
            .ok_or_else(|| AppError::not_found("Author", id))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::Utc;
    use domains::{Delivery, ManualClock, MockAuthorRepo, MockMessageRepo, NewAuthor};

    use super::*;

    fn author(name: &str, is_novice: bool, preference: MessagePreference) -> Author {
        Author {
            message_preference: preference,
            ..Author::from_new(NewAuthor::new(name, format!("{name}@example.com")).novice(is_novice), Utc::now())
        }
    }

    fn authors_repo(people: &[&Author], blocked: bool, recipient_follows: bool) -> MockAuthorRepo {
        let by_id: HashMap<Uuid, Author> = people.iter().map(|a| (a.id, (*a).clone())).collect();
        let mut repo = MockAuthorRepo::new();
        repo.expect_get_author()
            .returning(move |id| Ok(by_id.get(&id).cloned()));
        repo.expect_blocks_between().returning(move |_, _| Ok(blocked));
        repo.expect_is_following()
            .returning(move |_, _| Ok(recipient_follows));
        repo
    }

    fn delivering_repo() -> MockMessageRepo {
        let mut repo = MockMessageRepo::new();
        repo.expect_deliver().times(1).returning(|outgoing| {
            let conversation = Conversation {
                id: Uuid::now_v7(),
                participants: outgoing.participants(),
                created_at: outgoing.sent_at,
            };
            Ok(Delivery {
                message: Message {
                    id: outgoing.id,
                    conversation_id: conversation.id,
                    sender_id: outgoing.sender_id,
                    recipient_id: outgoing.recipient_id,
                    body: outgoing.body.clone(),
                    sent_at: outgoing.sent_at,
                    read_at: None,
                },
                conversation,
                conversation_created: true,
            })
        });
        repo
    }

    fn silent_repo() -> MockMessageRepo {
        let mut repo = MockMessageRepo::new();
        repo.expect_deliver().never();
        repo
    }

    fn service(authors: MockAuthorRepo, messages: MockMessageRepo) -> MessagingService {
        MessagingService::new(Arc::new(authors), Arc::new(messages), Arc::new(ManualClock::default()))
    }

    #[tokio::test]
    async fn sends_to_open_recipient_from_novice() {
        let sender = author("novice", true, MessagePreference::AllUsers);
        let recipient = author("user", true, MessagePreference::AllUsers);
        let svc = service(authors_repo(&[&sender, &recipient], false, false), delivering_repo());

        let outcome = svc.compose(sender.id, recipient.id, "selam").await.unwrap();
        let message = outcome.message().expect("message should be sent");
        assert_eq!(message.sender_id, sender.id);
        assert_eq!(message.recipient_id, recipient.id);
        assert!(!message.is_read());
    }

    #[tokio::test]
    async fn refuses_self_message_without_touching_storage() {
        let me = author("user", false, MessagePreference::AllUsers);
        let mut authors = MockAuthorRepo::new();
        authors.expect_get_author().never();
        let svc = service(authors, silent_repo());

        let outcome = svc.compose(me.id, me.id, "hi").await.unwrap();
        assert_eq!(outcome.refusal(), Some(Refusal::SelfMessage));
    }

    #[tokio::test]
    async fn refuses_when_blocked() {
        let sender = author("a", false, MessagePreference::AllUsers);
        let recipient = author("b", false, MessagePreference::AllUsers);
        let svc = service(authors_repo(&[&sender, &recipient], true, true), silent_repo());

        let outcome = svc.compose(sender.id, recipient.id, "hi").await.unwrap();
        assert_eq!(outcome.refusal(), Some(Refusal::Blocked));
    }

    #[tokio::test]
    async fn refuses_when_recipient_disabled_messages() {
        let sender = author("a", false, MessagePreference::AllUsers);
        let recipient = author("b", false, MessagePreference::Disabled);
        let svc = service(authors_repo(&[&sender, &recipient], false, true), silent_repo());

        let outcome = svc.compose(sender.id, recipient.id, "hi").await.unwrap();
        assert_eq!(outcome.refusal(), Some(Refusal::RecipientDisabled));
    }

    #[tokio::test]
    async fn author_only_refuses_novices_but_not_authors() {
        let novice = author("novice", true, MessagePreference::AllUsers);
        let veteran = author("veteran", false, MessagePreference::AllUsers);
        let recipient = author("picky", false, MessagePreference::AuthorOnly);

        let svc = service(authors_repo(&[&novice, &recipient], false, false), silent_repo());
        let outcome = svc.compose(novice.id, recipient.id, "hi").await.unwrap();
        assert_eq!(outcome.refusal(), Some(Refusal::NoviceSender));

        let svc = service(authors_repo(&[&veteran, &recipient], false, false), delivering_repo());
        assert!(svc.compose(veteran.id, recipient.id, "hi").await.unwrap().is_sent());
    }

    #[tokio::test]
    async fn following_only_requires_recipient_to_follow_sender() {
        let sender = author("a", false, MessagePreference::AllUsers);
        let recipient = author("b", false, MessagePreference::FollowingOnly);

        let svc = service(authors_repo(&[&sender, &recipient], false, false), silent_repo());
        let outcome = svc.compose(sender.id, recipient.id, "hi").await.unwrap();
        assert_eq!(outcome.refusal(), Some(Refusal::NotFollowed));

        let svc = service(authors_repo(&[&sender, &recipient], false, true), delivering_repo());
        assert!(svc.compose(sender.id, recipient.id, "hi").await.unwrap().is_sent());
    }

    #[tokio::test]
    async fn unknown_recipient_is_an_error() {
        let sender = author("a", false, MessagePreference::AllUsers);
        let svc = service(authors_repo(&[&sender], false, false), silent_repo());

        let err = svc.compose(sender.id, Uuid::now_v7(), "hi").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(kind, _) if kind == "Author"));
    }

    #[tokio::test]
    async fn blank_body_is_rejected() {
        let sender = author("a", false, MessagePreference::AllUsers);
        let recipient = author("b", false, MessagePreference::AllUsers);
        let svc = service(authors_repo(&[&sender, &recipient], false, false), silent_repo());

        let err = svc.compose(sender.id, recipient.id, "   ").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn refusals_win_over_a_blank_body() {
        let me = author("me", false, MessagePreference::AllUsers);
        let svc = service(MockAuthorRepo::new(), silent_repo());
        let outcome = svc.compose(me.id, me.id, "").await.unwrap();
        assert_eq!(outcome.refusal(), Some(Refusal::SelfMessage));

        let sender = author("a", false, MessagePreference::AllUsers);
        let recipient = author("b", false, MessagePreference::AllUsers);
        let svc = service(authors_repo(&[&sender, &recipient], true, false), silent_repo());
        let outcome = svc.compose(sender.id, recipient.id, "   ").await.unwrap();
        assert_eq!(outcome.refusal(), Some(Refusal::Blocked));

        let closed = author("c", false, MessagePreference::Disabled);
        let svc = service(authors_repo(&[&sender, &closed], false, false), silent_repo());
        let outcome = svc.compose(sender.id, closed.id, "\n\t").await.unwrap();
        assert_eq!(outcome.refusal(), Some(Refusal::RecipientDisabled));
    }

    #[tokio::test]
    async fn blank_body_to_unknown_recipient_is_not_found() {
        let sender = author("a", false, MessagePreference::AllUsers);
        let svc = service(authors_repo(&[&sender], false, false), silent_repo());

        let err = svc.compose(sender.id, Uuid::now_v7(), "").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(kind, _) if kind == "Author"));
    }

    #[tokio::test]
    async fn mark_read_reports_missing_message() {
        let mut messages = MockMessageRepo::new();
        messages.expect_mark_message_read().returning(|_, _| Ok(None));
        let svc = service(MockAuthorRepo::new(), messages);

        let err = svc.mark_read(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(kind, _) if kind == "Message"));
    }
}
