use crate::Database;
use crate::models::{MessageRow, SessionRow, SessionStats, SessionWithCount, UserRow, VerificationRow};
use anyhow::Result;
use rusqlite::Connection;

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, is_active, is_staff, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, 0, ?5)",
                (id, username, email, password_hash, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn activate_user(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE users SET is_active = 1 WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Grants the admin analytics routes. Returns false when no such user exists.
    pub fn set_user_staff(&self, username: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let n = conn.execute("UPDATE users SET is_staff = 1 WHERE username = ?1", [username])?;
            Ok(n > 0)
        })
    }

    // -- Email verifications --

    pub fn create_verification(
        &self,
        id: &str,
        user_id: &str,
        token: &str,
        created_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO email_verifications (id, user_id, token, created_at, is_verified)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                (id, user_id, token, created_at),
            )?;
            Ok(())
        })
    }

    pub fn get_verification_by_token(&self, token: &str) -> Result<Option<VerificationRow>> {
        self.with_conn(|conn| query_verification(conn, "token", token))
    }

    pub fn get_verification_by_user(&self, user_id: &str) -> Result<Option<VerificationRow>> {
        self.with_conn(|conn| query_verification(conn, "user_id", user_id))
    }

    pub fn mark_verified(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE email_verifications SET is_verified = 1 WHERE id = ?1",
                [id],
            )?;
            Ok(())
        })
    }

    pub fn delete_verification(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM email_verifications WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Chat sessions --

    pub fn create_session(&self, id: &str, title: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_sessions (id, title, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                (id, title, now),
            )?;
            Ok(())
        })
    }

    pub fn get_session(&self, id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, created_at, updated_at FROM chat_sessions WHERE id = ?1",
            )?;
            let row = stmt.query_row([id], map_session).optional()?;
            Ok(row)
        })
    }

    pub fn touch_session(&self, id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE chat_sessions SET updated_at = ?2 WHERE id = ?1",
                (id, now),
            )?;
            Ok(())
        })
    }

    /// All sessions for the sidebar, newest-created first, with message counts.
    pub fn list_sessions(&self) -> Result<Vec<SessionWithCount>> {
        self.with_conn(|conn| {
            query_sessions_with_counts(conn, "ORDER BY s.created_at DESC", None)
        })
    }

    // -- Chat messages --

    pub fn insert_message(
        &self,
        id: &str,
        session_id: &str,
        content: &str,
        is_user: bool,
        created_at: &str,
        thinking_time: Option<f64>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (id, session_id, content, is_user, created_at, thinking_time)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![id, session_id, content, is_user, created_at, thinking_time],
            )?;
            Ok(())
        })
    }

    /// Messages for a session, timestamp-ascending.
    pub fn get_messages(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, content, is_user, created_at, thinking_time
                 FROM chat_messages
                 WHERE session_id = ?1
                 ORDER BY created_at ASC, rowid ASC",
            )?;
            let rows = stmt
                .query_map([session_id], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// The most recent `limit` messages before the one named by `exclude_id`,
    /// returned timestamp-ascending.
    pub fn get_history(
        &self,
        session_id: &str,
        exclude_id: &str,
        limit: u32,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, content, is_user, created_at, thinking_time
                 FROM chat_messages
                 WHERE session_id = ?1 AND id != ?2
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3",
            )?;
            let mut rows = stmt
                .query_map(rusqlite::params![session_id, exclude_id, limit], map_message)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();
            Ok(rows)
        })
    }

    // -- Analytics --

    pub fn count_sessions(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let n = conn.query_row("SELECT COUNT(*) FROM chat_sessions", [], |row| row.get(0))?;
            Ok(n)
        })
    }

    pub fn count_messages(&self, is_user: Option<bool>) -> Result<i64> {
        self.with_conn(|conn| {
            let n = match is_user {
                Some(flag) => conn.query_row(
                    "SELECT COUNT(*) FROM chat_messages WHERE is_user = ?1",
                    [flag],
                    |row| row.get(0),
                )?,
                None => {
                    conn.query_row("SELECT COUNT(*) FROM chat_messages", [], |row| row.get(0))?
                }
            };
            Ok(n)
        })
    }

    /// Per-day session counts on or after `since` (a `YYYY-MM-DD` date).
    /// Days with no activity are absent; the caller zero-fills.
    pub fn daily_session_counts(&self, since: &str) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| query_daily_counts(conn, "chat_sessions", since))
    }

    pub fn daily_message_counts(&self, since: &str) -> Result<Vec<(String, i64)>> {
        self.with_conn(|conn| query_daily_counts(conn, "chat_messages", since))
    }

    /// Sessions by recent activity, with message counts.
    pub fn recent_sessions(&self, limit: u32) -> Result<Vec<SessionWithCount>> {
        self.with_conn(|conn| {
            query_sessions_with_counts(conn, "ORDER BY s.updated_at DESC LIMIT ?1", Some(limit))
        })
    }

    /// Sessions by message count, busiest first.
    pub fn most_active_sessions(&self, limit: u32) -> Result<Vec<SessionWithCount>> {
        self.with_conn(|conn| {
            query_sessions_with_counts(conn, "ORDER BY message_count DESC LIMIT ?1", Some(limit))
        })
    }

    /// Average thinking time across AI messages that have one recorded.
    pub fn avg_thinking_time(&self) -> Result<Option<f64>> {
        self.with_conn(|conn| {
            let avg = conn.query_row(
                "SELECT AVG(thinking_time) FROM chat_messages
                 WHERE is_user = 0 AND thinking_time IS NOT NULL",
                [],
                |row| row.get(0),
            )?;
            Ok(avg)
        })
    }

    pub fn session_stats(&self, session_id: &str) -> Result<SessionStats> {
        self.with_conn(|conn| {
            let stats = conn.query_row(
                "SELECT
                    COUNT(*),
                    COALESCE(SUM(is_user = 1), 0),
                    COALESCE(SUM(is_user = 0), 0),
                    AVG(CASE WHEN is_user = 0 THEN thinking_time END),
                    AVG(CASE WHEN is_user = 1 THEN LENGTH(content) END),
                    AVG(CASE WHEN is_user = 0 THEN LENGTH(content) END)
                 FROM chat_messages WHERE session_id = ?1",
                [session_id],
                |row| {
                    Ok(SessionStats {
                        total_messages: row.get(0)?,
                        user_messages: row.get(1)?,
                        ai_messages: row.get(2)?,
                        avg_thinking_time: row.get(3)?,
                        avg_user_message_length: row.get(4)?,
                        avg_ai_message_length: row.get(5)?,
                    })
                },
            )?;
            Ok(stats)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, email, password, is_active, is_staff, created_at
         FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                is_active: row.get(4)?,
                is_staff: row.get(5)?,
                created_at: row.get(6)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_verification(conn: &Connection, column: &str, value: &str) -> Result<Option<VerificationRow>> {
    let sql = format!(
        "SELECT id, user_id, token, created_at, is_verified
         FROM email_verifications WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(VerificationRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                token: row.get(2)?,
                created_at: row.get(3)?,
                is_verified: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_sessions_with_counts(
    conn: &Connection,
    tail: &str,
    limit: Option<u32>,
) -> Result<Vec<SessionWithCount>> {
    let sql = format!(
        "SELECT s.id, s.title, s.created_at, s.updated_at,
                (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id) AS message_count
         FROM chat_sessions s
         {}",
        tail
    );
    let mut stmt = conn.prepare(&sql)?;

    let map = |row: &rusqlite::Row<'_>| {
        Ok(SessionWithCount {
            session: SessionRow {
                id: row.get(0)?,
                title: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            },
            message_count: row.get(4)?,
        })
    };

    let rows = match limit {
        Some(n) => stmt.query_map([n], map)?.collect::<std::result::Result<Vec<_>, _>>()?,
        None => stmt.query_map([], map)?.collect::<std::result::Result<Vec<_>, _>>()?,
    };

    Ok(rows)
}

fn query_daily_counts(conn: &Connection, table: &str, since: &str) -> Result<Vec<(String, i64)>> {
    let sql = format!(
        "SELECT date(created_at), COUNT(*) FROM {}
         WHERE date(created_at) >= ?1
         GROUP BY date(created_at)",
        table
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([since], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRow> {
    Ok(SessionRow {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        content: row.get(2)?,
        is_user: row.get(3)?,
        created_at: row.get(4)?,
        thinking_time: row.get(5)?,
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

#[cfg(test)]
mod tests {
    use crate::Database;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn user_roundtrip_and_unique_email() {
        let db = db();
        db.create_user("u1", "asha", "asha@example.com", "hash", "2026-08-01 10:00:00.000")
            .unwrap();

        let user = db.get_user_by_email("asha@example.com").unwrap().unwrap();
        assert_eq!(user.username, "asha");
        assert!(!user.is_active);
        assert!(!user.is_staff);

        // Same email under a different username must be rejected.
        let err = db.create_user("u2", "other", "asha@example.com", "hash", "2026-08-01 10:00:01.000");
        assert!(err.is_err());

        assert!(db.get_user_by_username("nobody").unwrap().is_none());
    }

    #[test]
    fn activation_flips_active_flag() {
        let db = db();
        db.create_user("u1", "asha", "asha@example.com", "hash", "2026-08-01 10:00:00.000")
            .unwrap();
        db.activate_user("u1").unwrap();
        assert!(db.get_user_by_id("u1").unwrap().unwrap().is_active);
    }

    #[test]
    fn one_verification_per_user() {
        let db = db();
        db.create_user("u1", "asha", "asha@example.com", "hash", "2026-08-01 10:00:00.000")
            .unwrap();
        db.create_verification("v1", "u1", "tok-1", "2026-08-01 10:00:00.000")
            .unwrap();

        // Second row for the same user violates the one-to-one constraint.
        assert!(
            db.create_verification("v2", "u1", "tok-2", "2026-08-01 10:00:01.000")
                .is_err()
        );

        // Replace instead: delete then recreate, as the resend flow does.
        db.delete_verification("v1").unwrap();
        db.create_verification("v2", "u1", "tok-2", "2026-08-01 10:00:02.000")
            .unwrap();

        let v = db.get_verification_by_user("u1").unwrap().unwrap();
        assert_eq!(v.token, "tok-2");
        assert!(!v.is_verified);

        db.mark_verified("v2").unwrap();
        assert!(db.get_verification_by_token("tok-2").unwrap().unwrap().is_verified);
    }

    #[test]
    fn messages_come_back_in_timestamp_order() {
        let db = db();
        db.create_session("s1", "First question", "2026-08-01 10:00:00.000").unwrap();
        db.insert_message("m2", "s1", "second", false, "2026-08-01 10:00:02.000", Some(0.0))
            .unwrap();
        db.insert_message("m1", "s1", "first", true, "2026-08-01 10:00:01.000", None)
            .unwrap();
        db.insert_message("m3", "s1", "third", true, "2026-08-01 10:00:03.000", None)
            .unwrap();

        let rows = db.get_messages("s1").unwrap();
        let contents: Vec<_> = rows.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
        assert!(rows.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn history_excludes_current_message_and_caps_at_limit() {
        let db = db();
        db.create_session("s1", "t", "2026-08-01 10:00:00.000").unwrap();
        for i in 0..15 {
            let ts = format!("2026-08-01 10:00:{:02}.000", i);
            db.insert_message(&format!("m{}", i), "s1", &format!("msg {}", i), i % 2 == 0, &ts, None)
                .unwrap();
        }

        let history = db.get_history("s1", "m14", 10).unwrap();
        assert_eq!(history.len(), 10);
        // Most recent ten prior messages, ascending.
        assert_eq!(history.first().unwrap().content, "msg 4");
        assert_eq!(history.last().unwrap().content, "msg 13");
    }

    #[test]
    fn session_listing_is_newest_first_with_counts() {
        let db = db();
        db.create_session("s1", "older", "2026-08-01 10:00:00.000").unwrap();
        db.create_session("s2", "newer", "2026-08-02 10:00:00.000").unwrap();
        db.insert_message("m1", "s1", "hi", true, "2026-08-01 10:00:01.000", None).unwrap();

        let listed = db.list_sessions().unwrap();
        assert_eq!(listed[0].session.id, "s2");
        assert_eq!(listed[0].message_count, 0);
        assert_eq!(listed[1].session.id, "s1");
        assert_eq!(listed[1].message_count, 1);
    }

    #[test]
    fn analytics_aggregates() {
        let db = db();
        db.create_session("s1", "a", "2026-08-01 10:00:00.000").unwrap();
        db.create_session("s2", "b", "2026-08-02 10:00:00.000").unwrap();
        db.insert_message("m1", "s1", "q1", true, "2026-08-01 10:00:01.000", None).unwrap();
        db.insert_message("m2", "s1", "answer one", false, "2026-08-01 10:00:02.000", Some(2.0))
            .unwrap();
        db.insert_message("m3", "s1", "q2", true, "2026-08-01 10:00:03.000", None).unwrap();
        db.insert_message("m4", "s1", "a2", false, "2026-08-01 10:00:04.000", Some(4.0))
            .unwrap();

        assert_eq!(db.count_sessions().unwrap(), 2);
        assert_eq!(db.count_messages(None).unwrap(), 4);
        assert_eq!(db.count_messages(Some(true)).unwrap(), 2);
        assert_eq!(db.count_messages(Some(false)).unwrap(), 2);
        assert_eq!(db.avg_thinking_time().unwrap(), Some(3.0));

        let daily = db.daily_session_counts("2026-08-01").unwrap();
        assert!(daily.contains(&("2026-08-01".to_string(), 1)));
        assert!(daily.contains(&("2026-08-02".to_string(), 1)));

        let busiest = db.most_active_sessions(10).unwrap();
        assert_eq!(busiest[0].session.id, "s1");
        assert_eq!(busiest[0].message_count, 4);

        let stats = db.session_stats("s1").unwrap();
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.user_messages, 2);
        assert_eq!(stats.ai_messages, 2);
        assert_eq!(stats.avg_thinking_time, Some(3.0));
        // "q1" and "q2" are both two characters.
        assert_eq!(stats.avg_user_message_length, Some(2.0));
    }

    #[test]
    fn stats_for_empty_session_are_zeroed() {
        let db = db();
        db.create_session("s1", "empty", "2026-08-01 10:00:00.000").unwrap();
        let stats = db.session_stats("s1").unwrap();
        assert_eq!(stats.total_messages, 0);
        assert_eq!(stats.avg_thinking_time, None);
        assert_eq!(stats.avg_user_message_length, None);
    }
}
