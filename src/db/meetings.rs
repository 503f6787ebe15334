//! Meeting record persistence.
//!
//! CRUD plus the pipeline's status mutations. The store does not enforce
//! the state machine; the pipeline is the only status writer after
//! creation and is responsible for only ever narrowing status forward.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use crate::meeting::status::MeetingStatus;

/// A meeting row. `key_decisions`/`action_items` are stored as JSON text
/// columns and surface here as string lists once summarization populates
/// them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeetingRecord {
    pub id: i64,
    pub owner_id: String,
    pub title: String,
    pub date: String,
    pub duration: Option<String>,
    pub participants: Option<String>,
    pub audio_path: Option<String>,
    pub transcription: Option<String>,
    pub summary: Option<String>,
    pub key_decisions: Option<Vec<String>>,
    pub action_items: Option<Vec<String>>,
    pub status: MeetingStatus,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields required to create a meeting at upload intake.
#[derive(Debug, Clone)]
pub struct NewMeeting {
    pub owner_id: String,
    pub title: String,
    pub date: String,
    pub duration: Option<String>,
    pub participants: Option<String>,
    pub audio_path: String,
}

const COLUMNS: &str = "id, owner_id, title, date, duration, participants, audio_path, \
     transcription, summary, key_decisions, action_items, status, created_at, updated_at";

fn map_row(row: &Row<'_>) -> rusqlite::Result<MeetingRecord> {
    let status_str: String = row.get(11)?;
    let status = MeetingStatus::parse(&status_str).ok_or(rusqlite::Error::InvalidQuery)?;

    let key_decisions: Option<String> = row.get(9)?;
    let action_items: Option<String> = row.get(10)?;

    let parse_list = |json: Option<String>| -> rusqlite::Result<Option<Vec<String>>> {
        match json {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|_| rusqlite::Error::InvalidQuery),
            None => Ok(None),
        }
    };

    Ok(MeetingRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        date: row.get(3)?,
        duration: row.get(4)?,
        participants: row.get(5)?,
        audio_path: row.get(6)?,
        transcription: row.get(7)?,
        summary: row.get(8)?,
        key_decisions: parse_list(key_decisions)?,
        action_items: parse_list(action_items)?,
        status,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
    })
}

/// Repository for meeting records.
pub struct MeetingRepository;

impl MeetingRepository {
    /// Insert a new meeting (status = uploading). Returns the new id.
    pub fn insert(conn: &Connection, meeting: &NewMeeting) -> Result<i64> {
        conn.execute(
            "INSERT INTO meetings (owner_id, title, date, duration, participants, audio_path, status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                meeting.owner_id,
                meeting.title,
                meeting.date,
                meeting.duration,
                meeting.participants,
                meeting.audio_path,
                MeetingStatus::Uploading.as_str(),
            ],
        )
        .context("Failed to insert meeting")?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a meeting by id, scoped to its owner. A meeting that exists but
    /// belongs to someone else comes back as `None`, not an error.
    pub fn get(conn: &Connection, id: i64, owner_id: &str) -> Result<Option<MeetingRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM meetings WHERE id = ?1 AND owner_id = ?2"
            ))
            .context("Failed to prepare meeting query")?;

        let mut rows = stmt
            .query_map(params![id, owner_id], map_row)
            .context("Failed to query meeting")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List an owner's meetings, newest first.
    pub fn list_by_owner(conn: &Connection, owner_id: &str) -> Result<Vec<MeetingRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM meetings WHERE owner_id = ?1 \
                 ORDER BY created_at DESC, id DESC"
            ))
            .context("Failed to prepare meetings list query")?;

        let rows = stmt
            .query_map(params![owner_id], map_row)
            .context("Failed to list meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }

        Ok(meetings)
    }

    /// Case-insensitive substring search over title, summary and
    /// participants, newest first.
    pub fn search(conn: &Connection, owner_id: &str, query: &str) -> Result<Vec<MeetingRecord>> {
        let pattern = format!("%{}%", query);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM meetings WHERE owner_id = ?1 \
                 AND (title LIKE ?2 OR summary LIKE ?2 OR participants LIKE ?2) \
                 ORDER BY created_at DESC, id DESC"
            ))
            .context("Failed to prepare meeting search query")?;

        let rows = stmt
            .query_map(params![owner_id, pattern], map_row)
            .context("Failed to search meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }

        Ok(meetings)
    }

    /// Update the meeting status.
    pub fn set_status(conn: &Connection, id: i64, status: MeetingStatus) -> Result<()> {
        conn.execute(
            "UPDATE meetings SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
            params![status.as_str(), id],
        )
        .context("Failed to update meeting status")?;
        Ok(())
    }

    /// Store the transcript and advance to summarizing in one update.
    pub fn set_transcription(conn: &Connection, id: i64, text: &str) -> Result<()> {
        conn.execute(
            "UPDATE meetings SET transcription = ?1, status = ?2, \
             updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
            params![text, MeetingStatus::Summarizing.as_str(), id],
        )
        .context("Failed to store transcription")?;
        Ok(())
    }

    /// Store the summary fields and mark completed in one update.
    pub fn complete(
        conn: &Connection,
        id: i64,
        summary: &str,
        key_decisions: &[String],
        action_items: &[String],
    ) -> Result<()> {
        let decisions_json =
            serde_json::to_string(key_decisions).context("Failed to encode key decisions")?;
        let actions_json =
            serde_json::to_string(action_items).context("Failed to encode action items")?;

        conn.execute(
            "UPDATE meetings SET summary = ?1, key_decisions = ?2, action_items = ?3, \
             status = ?4, updated_at = CURRENT_TIMESTAMP WHERE id = ?5",
            params![
                summary,
                decisions_json,
                actions_json,
                MeetingStatus::Completed.as_str(),
                id,
            ],
        )
        .context("Failed to complete meeting")?;
        Ok(())
    }

    /// Mark the meeting failed. Only the status flag is recorded; the
    /// specific cause lives in the logs.
    pub fn fail(conn: &Connection, id: i64) -> Result<()> {
        Self::set_status(conn, id, MeetingStatus::Failed)
    }

    /// Clear the artifact reference after the file is deleted.
    pub fn clear_audio_path(conn: &Connection, id: i64) -> Result<()> {
        conn.execute(
            "UPDATE meetings SET audio_path = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
            params![id],
        )
        .context("Failed to clear audio path")?;
        Ok(())
    }

    /// Delete a meeting, scoped to its owner. Returns whether a row was
    /// removed. The caller is responsible for the on-disk artifact.
    pub fn delete(conn: &Connection, id: i64, owner_id: &str) -> Result<bool> {
        let deleted = conn
            .execute(
                "DELETE FROM meetings WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )
            .context("Failed to delete meeting")?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn new_meeting(owner: &str, title: &str) -> NewMeeting {
        NewMeeting {
            owner_id: owner.to_string(),
            title: title.to_string(),
            date: "2025-06-01T10:00:00Z".to_string(),
            duration: Some("45 min".to_string()),
            participants: Some("Ana, Raj".to_string()),
            audio_path: "/tmp/standup.mp3".to_string(),
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = setup_db();
        let id = MeetingRepository::insert(&conn, &new_meeting("user-1", "Standup")).unwrap();
        assert!(id > 0);

        let meeting = MeetingRepository::get(&conn, id, "user-1").unwrap().unwrap();
        assert_eq!(meeting.title, "Standup");
        assert_eq!(meeting.status, MeetingStatus::Uploading);
        assert_eq!(meeting.audio_path, Some("/tmp/standup.mp3".to_string()));
        assert!(meeting.transcription.is_none());
        assert!(meeting.summary.is_none());
        assert!(meeting.key_decisions.is_none());
    }

    #[test]
    fn test_get_scoped_to_owner() {
        let conn = setup_db();
        let id = MeetingRepository::insert(&conn, &new_meeting("owner-a", "Private")).unwrap();

        assert!(MeetingRepository::get(&conn, id, "owner-a").unwrap().is_some());
        assert!(MeetingRepository::get(&conn, id, "owner-b").unwrap().is_none());
    }

    #[test]
    fn test_get_nonexistent() {
        let conn = setup_db();
        assert!(MeetingRepository::get(&conn, 9999, "user-1").unwrap().is_none());
    }

    #[test]
    fn test_set_transcription_advances_status() {
        let conn = setup_db();
        let id = MeetingRepository::insert(&conn, &new_meeting("user-1", "Sync")).unwrap();

        MeetingRepository::set_status(&conn, id, MeetingStatus::Transcribing).unwrap();
        MeetingRepository::set_transcription(&conn, id, "hello everyone").unwrap();

        let meeting = MeetingRepository::get(&conn, id, "user-1").unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Summarizing);
        assert_eq!(meeting.transcription, Some("hello everyone".to_string()));
    }

    #[test]
    fn test_complete_stores_all_fields() {
        let conn = setup_db();
        let id = MeetingRepository::insert(&conn, &new_meeting("user-1", "Planning")).unwrap();

        MeetingRepository::complete(
            &conn,
            id,
            "We planned the quarter.",
            &["Ship in June".to_string()],
            &["Raj writes the RFC".to_string()],
        )
        .unwrap();

        let meeting = MeetingRepository::get(&conn, id, "user-1").unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Completed);
        assert_eq!(meeting.summary, Some("We planned the quarter.".to_string()));
        assert_eq!(meeting.key_decisions, Some(vec!["Ship in June".to_string()]));
        assert_eq!(meeting.action_items, Some(vec!["Raj writes the RFC".to_string()]));
    }

    #[test]
    fn test_fail_sets_status_only() {
        let conn = setup_db();
        let id = MeetingRepository::insert(&conn, &new_meeting("user-1", "Sync")).unwrap();

        MeetingRepository::fail(&conn, id).unwrap();

        let meeting = MeetingRepository::get(&conn, id, "user-1").unwrap().unwrap();
        assert_eq!(meeting.status, MeetingStatus::Failed);
        assert!(meeting.transcription.is_none());
        assert!(meeting.summary.is_none());
    }

    #[test]
    fn test_clear_audio_path() {
        let conn = setup_db();
        let id = MeetingRepository::insert(&conn, &new_meeting("user-1", "Sync")).unwrap();

        MeetingRepository::clear_audio_path(&conn, id).unwrap();

        let meeting = MeetingRepository::get(&conn, id, "user-1").unwrap().unwrap();
        assert!(meeting.audio_path.is_none());
    }

    #[test]
    fn test_list_by_owner_newest_first() {
        let conn = setup_db();
        MeetingRepository::insert(&conn, &new_meeting("user-1", "First")).unwrap();
        MeetingRepository::insert(&conn, &new_meeting("user-1", "Second")).unwrap();
        MeetingRepository::insert(&conn, &new_meeting("user-2", "Other owner")).unwrap();

        let meetings = MeetingRepository::list_by_owner(&conn, "user-1").unwrap();
        assert_eq!(meetings.len(), 2);
        assert_eq!(meetings[0].title, "Second");
        assert_eq!(meetings[1].title, "First");
    }

    #[test]
    fn test_search_matches_title_summary_participants() {
        let conn = setup_db();
        let id1 = MeetingRepository::insert(&conn, &new_meeting("user-1", "Budget review")).unwrap();
        let id2 = MeetingRepository::insert(&conn, &new_meeting("user-1", "1:1")).unwrap();
        MeetingRepository::insert(&conn, &new_meeting("user-2", "Budget other owner")).unwrap();

        MeetingRepository::complete(&conn, id2, "Discussed the budget overrun.", &[], &[]).unwrap();

        let results = MeetingRepository::search(&conn, "user-1", "budget").unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().any(|m| m.id == id1));
        assert!(results.iter().any(|m| m.id == id2));

        // Participants field matches too
        let results = MeetingRepository::search(&conn, "user-1", "raj").unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_delete_scoped_to_owner() {
        let conn = setup_db();
        let id = MeetingRepository::insert(&conn, &new_meeting("user-1", "Gone soon")).unwrap();

        assert!(!MeetingRepository::delete(&conn, id, "user-2").unwrap());
        assert!(MeetingRepository::get(&conn, id, "user-1").unwrap().is_some());

        assert!(MeetingRepository::delete(&conn, id, "user-1").unwrap());
        assert!(MeetingRepository::get(&conn, id, "user-1").unwrap().is_none());
    }
}
