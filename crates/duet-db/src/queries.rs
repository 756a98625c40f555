use crate::Database;
use crate::models::{ChatMessageRow, DateRequestRow, GalleryRow, NotificationRow, UserRow};
use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, params};

impl Database {
    // -- Users --

    /// Insert a new user. Returns `None` when the username or email collides
    /// with an existing row (UNIQUE constraint), so callers can map that to a
    /// duplicate-account error instead of a server error.
    pub fn create_user(
        &self,
        username: &str,
        email: &str,
        phone: Option<&str>,
        password_hash: &str,
        role: &str,
    ) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (username, email, phone, password_hash, role)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![username, email, phone, password_hash, role],
            );
            match inserted {
                Ok(_) => Ok(Some(conn.last_insert_rowid())),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", &[&email]))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", &[&id]))
    }

    /// Everyone except the given user — the notification fan-out set.
    pub fn users_other_than(&self, id: i64) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{USER_SELECT} WHERE id != ?1"))?;
            let rows = stmt
                .query_map([id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Role promotion happens out-of-band (ops tooling, tests); registration
    /// never creates a privileged user.
    pub fn set_user_role(&self, id: i64, role: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("UPDATE users SET role = ?1 WHERE id = ?2", params![role, id])?;
            Ok(changed > 0)
        })
    }

    // -- Gallery --

    pub fn insert_gallery_item(
        &self,
        user_id: i64,
        file_type: &str,
        file_path: &str,
        caption: Option<&str>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO gallery (user_id, file_type, file_path, caption)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user_id, file_type, file_path, caption],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_gallery(&self) -> Result<Vec<GalleryRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{GALLERY_SELECT} ORDER BY g.created_at DESC, g.id DESC"
            ))?;
            let rows = stmt
                .query_map([], gallery_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_gallery_item(&self, id: i64) -> Result<Option<GalleryRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{GALLERY_SELECT} WHERE g.id = ?1"),
                    [id],
                    gallery_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_gallery_item(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM gallery WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Date requests --

    pub fn insert_date_request(
        &self,
        user_id: i64,
        request_type: &str,
        title: &str,
        description: Option<&str>,
        location: Option<&str>,
    ) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO date_requests (user_id, request_type, title, description, location)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, request_type, title, description, location],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn list_date_requests(&self) -> Result<Vec<DateRequestRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{REQUEST_SELECT} ORDER BY dr.created_at DESC, dr.id DESC"
            ))?;
            let rows = stmt
                .query_map([], request_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_date_request(&self, id: i64) -> Result<Option<DateRequestRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("{REQUEST_SELECT} WHERE dr.id = ?1"),
                    [id],
                    request_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Returns the number of rows updated (0 means the request does not exist).
    pub fn update_request_status(&self, id: i64, status: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE date_requests SET status = ?1 WHERE id = ?2",
                params![status, id],
            )?;
            Ok(changed)
        })
    }

    pub fn delete_date_request(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM date_requests WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    // -- Chat --

    pub fn insert_chat_message(&self, sender_id: i64, receiver_id: i64, message: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO chat_messages (sender_id, receiver_id, message)
                 VALUES (?1, ?2, ?3)",
                params![sender_id, receiver_id, message],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Both directions between the two users, oldest first. The id tiebreak
    /// keeps ordering stable for messages created within the same second.
    pub fn chat_history(&self, user_id: i64, partner_id: i64) -> Result<Vec<ChatMessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT cm.id, cm.sender_id, cm.receiver_id,
                        sender.username, receiver.username,
                        cm.message, cm.read_status, cm.created_at
                 FROM chat_messages cm
                 JOIN users sender ON cm.sender_id = sender.id
                 JOIN users receiver ON cm.receiver_id = receiver.id
                 WHERE (cm.sender_id = ?1 AND cm.receiver_id = ?2)
                    OR (cm.sender_id = ?2 AND cm.receiver_id = ?1)
                 ORDER BY cm.created_at ASC, cm.id ASC",
            )?;
            let rows = stmt
                .query_map(params![user_id, partner_id], |row| {
                    Ok(ChatMessageRow {
                        id: row.get(0)?,
                        sender_id: row.get(1)?,
                        receiver_id: row.get(2)?,
                        sender_username: row.get(3)?,
                        receiver_username: row.get(4)?,
                        message: row.get(5)?,
                        read_status: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_chat_message(&self, id: i64) -> Result<Option<ChatMessageRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT cm.id, cm.sender_id, cm.receiver_id,
                            sender.username, receiver.username,
                            cm.message, cm.read_status, cm.created_at
                     FROM chat_messages cm
                     JOIN users sender ON cm.sender_id = sender.id
                     JOIN users receiver ON cm.receiver_id = receiver.id
                     WHERE cm.id = ?1",
                    [id],
                    |row| {
                        Ok(ChatMessageRow {
                            id: row.get(0)?,
                            sender_id: row.get(1)?,
                            receiver_id: row.get(2)?,
                            sender_username: row.get(3)?,
                            receiver_username: row.get(4)?,
                            message: row.get(5)?,
                            read_status: row.get(6)?,
                            created_at: row.get(7)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn mark_messages_read(&self, receiver_id: i64, sender_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE chat_messages SET read_status = 1
                 WHERE receiver_id = ?1 AND sender_id = ?2",
                params![receiver_id, sender_id],
            )?;
            Ok(changed)
        })
    }

    pub fn unread_message_count(&self, receiver_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM chat_messages WHERE receiver_id = ?1 AND read_status = 0",
                [receiver_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Notifications --

    pub fn insert_notification(&self, user_id: i64, kind: &str, message: &str) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO notifications (user_id, type, message) VALUES (?1, ?2, ?3)",
                params![user_id, kind, message],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Most-recent 50 for the user. Older rows stay in the table but are
    /// never returned.
    pub fn list_notifications(&self, user_id: i64) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, type, message, read_status, sent_email, sent_sms, created_at
                 FROM notifications
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT 50",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(NotificationRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        kind: row.get(2)?,
                        message: row.get(3)?,
                        read_status: row.get(4)?,
                        sent_email: row.get(5)?,
                        sent_sms: row.get(6)?,
                        created_at: row.get(7)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Matching on both id and user prevents cross-user marking.
    pub fn mark_notification_read(&self, id: i64, user_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read_status = 1 WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn mark_all_notifications_read(&self, user_id: i64) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET read_status = 1 WHERE user_id = ?1 AND read_status = 0",
                [user_id],
            )?;
            Ok(changed)
        })
    }

    pub fn unread_notification_count(&self, user_id: i64) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read_status = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Record which best-effort channels actually delivered.
    pub fn mark_notification_delivered(&self, id: i64, email: bool, sms: bool) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE notifications
                 SET sent_email = sent_email OR ?1, sent_sms = sent_sms OR ?2
                 WHERE id = ?3",
                params![email, sms, id],
            )?;
            Ok(())
        })
    }
}

const USER_SELECT: &str =
    "SELECT id, username, email, phone, password_hash, role, created_at FROM users";

const GALLERY_SELECT: &str = "SELECT g.id, g.user_id, u.username, g.file_type, g.file_path,
            g.caption, g.created_at
     FROM gallery g
     JOIN users u ON g.user_id = u.id";

const REQUEST_SELECT: &str = "SELECT dr.id, dr.user_id, u.username, u.email, dr.request_type,
            dr.title, dr.description, dr.location, dr.status, dr.created_at
     FROM date_requests dr
     JOIN users u ON dr.user_id = u.id";

fn query_user(
    conn: &Connection,
    predicate: &str,
    params: &[&dyn rusqlite::types::ToSql],
) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(&format!("{USER_SELECT} WHERE {predicate}"), params, user_from_row)
        .optional()?;
    Ok(row)
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        password_hash: row.get(4)?,
        role: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn gallery_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<GalleryRow> {
    Ok(GalleryRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        file_type: row.get(3)?,
        file_path: row.get(4)?,
        caption: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn request_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DateRequestRow> {
    Ok(DateRequestRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        username: row.get(2)?,
        email: row.get(3)?,
        request_type: row.get(4)?,
        title: row.get(5)?,
        description: row.get(6)?,
        location: row.get(7)?,
        status: row.get(8)?,
        created_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::Database;

    fn db_with_couple() -> (Database, i64, i64) {
        let db = Database::open_in_memory().unwrap();
        let a = db
            .create_user("irfan", "irfan@example.com", Some("+620001"), "hash-a", "user")
            .unwrap()
            .unwrap();
        let b = db
            .create_user("sisti", "sisti@example.com", None, "hash-b", "user")
            .unwrap()
            .unwrap();
        (db, a, b)
    }

    #[test]
    fn duplicate_username_or_email_returns_none() {
        let (db, _, _) = db_with_couple();
        let dup_name = db
            .create_user("irfan", "other@example.com", None, "h", "user")
            .unwrap();
        assert!(dup_name.is_none());
        let dup_email = db
            .create_user("someone", "sisti@example.com", None, "h", "user")
            .unwrap();
        assert!(dup_email.is_none());
    }

    #[test]
    fn user_lookup_by_email_and_id() {
        let (db, a, _) = db_with_couple();
        let by_email = db.get_user_by_email("irfan@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, a);
        assert_eq!(by_email.phone.as_deref(), Some("+620001"));
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
        assert_eq!(db.get_user_by_id(a).unwrap().unwrap().username, "irfan");
    }

    #[test]
    fn users_other_than_excludes_caller() {
        let (db, a, b) = db_with_couple();
        let others = db.users_other_than(a).unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id, b);
    }

    #[test]
    fn role_promotion() {
        let (db, a, _) = db_with_couple();
        assert!(db.set_user_role(a, "super_admin").unwrap());
        assert_eq!(db.get_user_by_id(a).unwrap().unwrap().role, "super_admin");
        assert!(!db.set_user_role(999, "super_admin").unwrap());
    }

    #[test]
    fn gallery_roundtrip_and_delete() {
        let (db, a, _) = db_with_couple();
        let id = db
            .insert_gallery_item(a, "photo", "/uploads/photos/x.png", Some("us"))
            .unwrap();
        let item = db.get_gallery_item(id).unwrap().unwrap();
        assert_eq!(item.username, "irfan");
        assert_eq!(item.file_type, "photo");

        assert!(db.delete_gallery_item(id).unwrap());
        assert!(!db.delete_gallery_item(id).unwrap());
        assert!(db.get_gallery_item(id).unwrap().is_none());
    }

    #[test]
    fn gallery_list_is_newest_first() {
        let (db, a, b) = db_with_couple();
        let first = db.insert_gallery_item(a, "photo", "/uploads/photos/1.png", None).unwrap();
        let second = db.insert_gallery_item(b, "video", "/uploads/videos/2.mp4", None).unwrap();
        let items = db.list_gallery().unwrap();
        assert_eq!(items[0].id, second);
        assert_eq!(items[1].id, first);
    }

    #[test]
    fn request_status_lifecycle() {
        let (db, a, _) = db_with_couple();
        let id = db
            .insert_date_request(a, "food", "Lunch", Some("pasta"), Some("downtown"))
            .unwrap();
        assert_eq!(db.get_date_request(id).unwrap().unwrap().status, "pending");

        assert_eq!(db.update_request_status(id, "approved").unwrap(), 1);
        assert_eq!(db.get_date_request(id).unwrap().unwrap().status, "approved");

        assert_eq!(db.update_request_status(9999, "approved").unwrap(), 0);

        assert!(db.delete_date_request(id).unwrap());
        assert!(!db.delete_date_request(id).unwrap());
    }

    #[test]
    fn chat_history_covers_both_directions_in_order() {
        let (db, a, b) = db_with_couple();
        let m1 = db.insert_chat_message(a, b, "hi").unwrap();
        let m2 = db.insert_chat_message(b, a, "hello").unwrap();
        let m3 = db.insert_chat_message(a, b, "lunch?").unwrap();

        let history = db.chat_history(a, b).unwrap();
        let ids: Vec<i64> = history.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![m1, m2, m3]);
        assert_eq!(history[0].sender_username, "irfan");
        assert_eq!(history[1].receiver_username, "irfan");
        assert!(!history[0].read_status);

        // the same conversation seen from the partner's side
        assert_eq!(db.chat_history(b, a).unwrap().len(), 3);
    }

    #[test]
    fn mark_read_only_touches_received_messages() {
        let (db, a, b) = db_with_couple();
        db.insert_chat_message(a, b, "one").unwrap();
        db.insert_chat_message(a, b, "two").unwrap();
        db.insert_chat_message(b, a, "reply").unwrap();

        assert_eq!(db.unread_message_count(b).unwrap(), 2);
        assert_eq!(db.mark_messages_read(b, a).unwrap(), 2);
        assert_eq!(db.unread_message_count(b).unwrap(), 0);
        // a's incoming message from b is untouched
        assert_eq!(db.unread_message_count(a).unwrap(), 1);
    }

    #[test]
    fn notification_listing_caps_at_fifty() {
        let (db, a, _) = db_with_couple();
        for i in 0..60 {
            db.insert_notification(a, "chat_message", &format!("msg {i}")).unwrap();
        }
        let listed = db.list_notifications(a).unwrap();
        assert_eq!(listed.len(), 50);
        // newest first
        assert_eq!(listed[0].message, "msg 59");
        assert_eq!(listed[49].message, "msg 10");
    }

    #[test]
    fn notification_read_marking_is_scoped_and_idempotent() {
        let (db, a, b) = db_with_couple();
        let n = db.insert_notification(a, "date_request", "new request").unwrap();
        db.insert_notification(a, "chat_message", "new message").unwrap();

        // b cannot mark a's notification
        assert!(!db.mark_notification_read(n, b).unwrap());
        assert!(db.mark_notification_read(n, a).unwrap());

        assert_eq!(db.unread_notification_count(a).unwrap(), 1);
        assert_eq!(db.mark_all_notifications_read(a).unwrap(), 1);
        assert_eq!(db.mark_all_notifications_read(a).unwrap(), 0);
        assert_eq!(db.unread_notification_count(a).unwrap(), 0);
    }

    #[test]
    fn delivery_flags_accumulate() {
        let (db, a, _) = db_with_couple();
        let n = db.insert_notification(a, "date_request", "hey").unwrap();
        db.mark_notification_delivered(n, true, false).unwrap();
        db.mark_notification_delivered(n, false, true).unwrap();
        let row = &db.list_notifications(a).unwrap()[0];
        assert!(row.sent_email);
        assert!(row.sent_sms);
    }
}
