use crate::models::{DeleteOutcome, LikeRow, LikedUserRow, MessageRow, UserRow};
use crate::Database;
use amora_types::models::{LikesPredicate, MessageContainer};
use anyhow::Result;
use rusqlite::{Connection, Row};

const MESSAGE_COLUMNS: &str = "m.id, m.sender_id, s.username, m.recipient_id, r.username, m.content,
        m.date_read, m.message_sent, m.sender_deleted, m.recipient_deleted
     FROM messages m
     JOIN users s ON s.id = m.sender_id
     JOIN users r ON r.id = m.recipient_id";

impl Database {
    // -- Users --

    /// Returns `false` if the username is already taken. The UNIQUE index is
    /// the check, so concurrent registrations cannot both succeed.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            match conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            ) {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn user_exists(&self, username: &str) -> Result<bool> {
        Ok(self.resolve_user(username)?.is_some())
    }

    /// Username to user id.
    pub fn resolve_user(&self, username: &str) -> Result<Option<String>> {
        self.with_conn(|conn| {
            conn.query_row("SELECT id FROM users WHERE username = ?1", [username], |row| {
                row.get(0)
            })
            .optional()
        })
    }

    // -- Likes --

    /// Inserts the like unless the pair already exists. Returns `None` for a
    /// duplicate; the check and the insert are a single statement.
    pub fn insert_like(&self, source_id: &str, target_id: &str) -> Result<Option<LikeRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "INSERT OR IGNORE INTO likes (source_id, target_id) VALUES (?1, ?2)
                 RETURNING source_id, target_id, created_at",
                (source_id, target_id),
                |row| {
                    Ok(LikeRow {
                        source_id: row.get(0)?,
                        target_id: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// One page of the caller's likes listing plus the total row count.
    pub fn get_likes(
        &self,
        user_id: &str,
        predicate: LikesPredicate,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<LikedUserRow>, u64)> {
        let (from, order) = match predicate {
            LikesPredicate::Liked => (
                "FROM likes l JOIN users u ON u.id = l.target_id WHERE l.source_id = ?1",
                "l.created_at DESC, l.rowid DESC",
            ),
            LikesPredicate::LikedBy => (
                "FROM likes l JOIN users u ON u.id = l.source_id WHERE l.target_id = ?1",
                "l.created_at DESC, l.rowid DESC",
            ),
            LikesPredicate::Matched => (
                "FROM likes l
                 JOIN likes back ON back.source_id = l.target_id AND back.target_id = l.source_id
                 JOIN users u ON u.id = l.target_id
                 WHERE l.source_id = ?1",
                "MAX(l.created_at, back.created_at) DESC, l.rowid DESC",
            ),
        };
        let liked_at = match predicate {
            LikesPredicate::Matched => "MAX(l.created_at, back.created_at)",
            _ => "l.created_at",
        };

        self.with_conn(|conn| {
            let total: i64 =
                conn.query_row(&format!("SELECT COUNT(*) {from}"), [user_id], |row| row.get(0))?;

            let mut stmt = conn.prepare(&format!(
                "SELECT u.id, u.username, {liked_at} {from} ORDER BY {order} LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit, offset], |row| {
                    Ok(LikedUserRow {
                        user_id: row.get(0)?,
                        username: row.get(1)?,
                        liked_at: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, content) VALUES (?1, ?2, ?3, ?4)",
                (id, sender_id, recipient_id, content),
            )?;
            query_message(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Message {} vanished after insert", id))
        })
    }

    /// One page of a container view, newest first, plus the total row count.
    pub fn get_messages_for_user(
        &self,
        user_id: &str,
        container: MessageContainer,
        limit: u32,
        offset: u32,
    ) -> Result<(Vec<MessageRow>, u64)> {
        let filter = match container {
            MessageContainer::Inbox => "m.recipient_id = ?1 AND m.recipient_deleted = 0",
            MessageContainer::Outbox => "m.sender_id = ?1 AND m.sender_deleted = 0",
            MessageContainer::Unread => {
                "m.recipient_id = ?1 AND m.recipient_deleted = 0 AND m.date_read IS NULL"
            }
        };

        self.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM messages m WHERE {filter}"),
                [user_id],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {MESSAGE_COLUMNS}
                 WHERE {filter}
                 ORDER BY m.message_sent DESC, m.rowid DESC
                 LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![user_id, limit, offset], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok((rows, total as u64))
        })
    }

    /// Every message between the two users still visible to `user_id`,
    /// oldest first. Unread messages addressed to `user_id` are marked read
    /// in the same transaction.
    pub fn get_message_thread(&self, user_id: &str, other_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            tx.execute(
                "UPDATE messages SET date_read = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE recipient_id = ?1 AND sender_id = ?2
                   AND date_read IS NULL AND recipient_deleted = 0",
                (user_id, other_id),
            )?;

            let rows = {
                let mut stmt = tx.prepare(&format!(
                    "SELECT {MESSAGE_COLUMNS}
                     WHERE (m.recipient_id = ?1 AND m.sender_id = ?2 AND m.recipient_deleted = 0)
                        OR (m.sender_id = ?1 AND m.recipient_id = ?2 AND m.sender_deleted = 0)
                     ORDER BY m.message_sent ASC, m.rowid ASC"
                ))?;
                let rows = stmt
                    .query_map((user_id, other_id), message_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            };

            tx.commit()?;
            Ok(rows)
        })
    }

    /// Sets the deleted flag for whichever side `user_id` is on. Once both
    /// flags are set the row is removed.
    pub fn delete_message_for(&self, id: &str, user_id: &str) -> Result<DeleteOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let parties: Option<(String, String)> = tx
                .query_row(
                    "SELECT sender_id, recipient_id FROM messages WHERE id = ?1",
                    [id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((sender_id, recipient_id)) = parties else {
                return Ok(DeleteOutcome::NotFound);
            };

            if user_id == sender_id {
                tx.execute("UPDATE messages SET sender_deleted = 1 WHERE id = ?1", [id])?;
            } else if user_id == recipient_id {
                tx.execute("UPDATE messages SET recipient_deleted = 1 WHERE id = ?1", [id])?;
            } else {
                return Ok(DeleteOutcome::NotParticipant);
            }

            let purged = tx.execute(
                "DELETE FROM messages WHERE id = ?1 AND sender_deleted = 1 AND recipient_deleted = 1",
                [id],
            )?;

            tx.commit()?;
            Ok(if purged > 0 {
                DeleteOutcome::Purged
            } else {
                DeleteOutcome::Hidden
            })
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt =
        conn.prepare("SELECT id, username, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    conn.query_row(
        &format!("SELECT {MESSAGE_COLUMNS} WHERE m.id = ?1"),
        [id],
        message_from_row,
    )
    .optional()
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_username: row.get(2)?,
        recipient_id: row.get(3)?,
        recipient_username: row.get(4)?,
        content: row.get(5)?,
        date_read: row.get(6)?,
        message_sent: row.get(7)?,
        sender_deleted: row.get(8)?,
        recipient_deleted: row.get(9)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
