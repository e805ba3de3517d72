use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::{
    AppError, Conversation, Delivery, Message, MessageRepo, OutgoingMessage, ParticipantPair, Result,
};
use sqlx::sqlite::SqliteRow;
use uuid::Uuid;

use super::{col, db_err, SqliteStore};

fn conversation_from_row(row: &SqliteRow) -> Result<Conversation> {
    Ok(Conversation {
        id: col(row, "id")?,
        participants: ParticipantPair::new(col(row, "participant_low")?, col(row, "participant_high")?),
        created_at: col(row, "created_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    Ok(Message {
        id: col(row, "id")?,
        conversation_id: col(row, "conversation_id")?,
        sender_id: col(row, "sender_id")?,
        recipient_id: col(row, "recipient_id")?,
        body: col(row, "body")?,
        sent_at: col(row, "sent_at")?,
        read_at: col(row, "read_at")?,
    })
}

#[async_trait]
impl MessageRepo for SqliteStore {
    async fn deliver(&self, outgoing: &OutgoingMessage) -> Result<Delivery> {
        let pair = outgoing.participants();
        if pair.low() == pair.high() {
            return Err(AppError::validation("a conversation needs two distinct authors"));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // The unique pair key makes a racing sender land in the same row.
        let created = sqlx::query(
            "INSERT INTO conversations (id, participant_low, participant_high, created_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT (participant_low, participant_high) DO NOTHING",
        )
        .bind(Uuid::now_v7())
        .bind(pair.low())
        .bind(pair.high())
        .bind(outgoing.sent_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?
        .rows_affected()
            == 1;

        let row = sqlx::query("SELECT * FROM conversations WHERE participant_low = ? AND participant_high = ?")
            .bind(pair.low())
            .bind(pair.high())
            .fetch_one(&mut *tx)
            .await
            .map_err(db_err)?;
        let conversation = conversation_from_row(&row)?;

        let message = Message {
            id: outgoing.id,
            conversation_id: conversation.id,
            sender_id: outgoing.sender_id,
            recipient_id: outgoing.recipient_id,
            body: outgoing.body.clone(),
            sent_at: outgoing.sent_at,
            read_at: None,
        };
        sqlx::query(
            "INSERT INTO messages (id, conversation_id, sender_id, recipient_id, body, sent_at, read_at) \
             VALUES (?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(message.id)
        .bind(message.conversation_id)
        .bind(message.sender_id)
        .bind(message.recipient_id)
        .bind(&message.body)
        .bind(message.sent_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(Delivery {
            conversation,
            message,
            conversation_created: created,
        })
    }

    async fn get_message(&self, id: Uuid) -> Result<Option<Message>> {
        sqlx::query("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(message_from_row)
            .transpose()
    }

    async fn mark_message_read(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Message>> {
        let result = sqlx::query("UPDATE messages SET read_at = ? WHERE id = ?")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_message(id).await
    }

    async fn get_conversation(&self, id: Uuid) -> Result<Option<Conversation>> {
        sqlx::query("SELECT * FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(conversation_from_row)
            .transpose()
    }

    async fn find_conversation(&self, pair: ParticipantPair) -> Result<Option<Conversation>> {
        sqlx::query("SELECT * FROM conversations WHERE participant_low = ? AND participant_high = ?")
            .bind(pair.low())
            .bind(pair.high())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .as_ref()
            .map(conversation_from_row)
            .transpose()
    }

    async fn conversations_of(&self, author: Uuid) -> Result<Vec<Conversation>> {
        sqlx::query(
            "SELECT * FROM conversations WHERE participant_low = ? OR participant_high = ? \
             ORDER BY created_at DESC",
        )
        .bind(author)
        .bind(author)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?
        .iter()
        .map(conversation_from_row)
        .collect()
    }

    async fn conversation_messages(&self, conversation: Uuid) -> Result<Vec<Message>> {
        sqlx::query("SELECT * FROM messages WHERE conversation_id = ? ORDER BY sent_at ASC, rowid ASC")
            .bind(conversation)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(message_from_row)
            .collect()
    }

    async fn last_message(&self, conversation: Uuid) -> Result<Option<Message>> {
        sqlx::query(
            "SELECT * FROM messages WHERE conversation_id = ? ORDER BY sent_at DESC, rowid DESC LIMIT 1",
        )
        .bind(conversation)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .as_ref()
        .map(message_from_row)
        .transpose()
    }
}
