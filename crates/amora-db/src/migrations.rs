use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, likes, messages)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE likes (
                source_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                target_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (source_id, target_id),
                CHECK (source_id <> target_id)
            );

            CREATE INDEX idx_likes_target ON likes(target_id, created_at);

            CREATE TABLE messages (
                id                  TEXT PRIMARY KEY,
                sender_id           TEXT NOT NULL REFERENCES users(id),
                recipient_id        TEXT NOT NULL REFERENCES users(id),
                content             TEXT NOT NULL CHECK (length(content) > 0),
                date_read           TEXT,
                message_sent        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                sender_deleted      INTEGER NOT NULL DEFAULT 0,
                recipient_deleted   INTEGER NOT NULL DEFAULT 0,
                CHECK (sender_id <> recipient_id)
            );

            CREATE INDEX idx_messages_recipient ON messages(recipient_id, message_sent);
            CREATE INDEX idx_messages_sender ON messages(sender_id, message_sent);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
