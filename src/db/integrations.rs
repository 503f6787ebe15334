//! Integration (notification channel) persistence.
//!
//! The `settings` column holds a JSON payload whose shape depends on the
//! `type` column. The two are modelled together as a tagged variant so an
//! unknown type or malformed payload is rejected at write time rather
//! than discovered during fan-out.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

/// Slack channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackSettings {
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// Email recipient settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailSettings {
    pub recipients: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// Per-type settings payload.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationSettings {
    Slack(SlackSettings),
    Email(EmailSettings),
}

impl IntegrationSettings {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Slack(_) => "slack",
            Self::Email(_) => "email",
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let json = match self {
            Self::Slack(settings) => serde_json::to_string(settings),
            Self::Email(settings) => serde_json::to_string(settings),
        };
        json.context("Failed to encode integration settings")
    }

    /// Parse and validate a settings payload for the given type.
    pub fn from_parts(kind: &str, settings: &serde_json::Value) -> Result<Self> {
        match kind {
            "slack" => {
                let settings: SlackSettings = serde_json::from_value(settings.clone())
                    .context("Invalid slack settings")?;
                if settings.channel_id.trim().is_empty() {
                    bail!("Slack settings require a non-empty channel_id");
                }
                Ok(Self::Slack(settings))
            }
            "email" => {
                let settings: EmailSettings = serde_json::from_value(settings.clone())
                    .context("Invalid email settings")?;
                if settings.recipients.is_empty() {
                    bail!("Email settings require at least one recipient");
                }
                Ok(Self::Email(settings))
            }
            other => bail!("Unknown integration type: {}", other),
        }
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        let value = match self {
            Self::Slack(settings) => serde_json::to_value(settings),
            Self::Email(settings) => serde_json::to_value(settings),
        };
        value.context("Failed to encode integration settings")
    }
}

/// An integration row.
#[derive(Debug, Clone)]
pub struct IntegrationRecord {
    pub id: i64,
    pub owner_id: String,
    pub settings: IntegrationSettings,
    pub is_enabled: bool,
    pub created_at: String,
    pub updated_at: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<IntegrationRecord> {
    let kind: String = row.get(2)?;
    let settings_json: String = row.get(3)?;

    let value: serde_json::Value =
        serde_json::from_str(&settings_json).map_err(|_| rusqlite::Error::InvalidQuery)?;
    let settings = IntegrationSettings::from_parts(&kind, &value)
        .map_err(|_| rusqlite::Error::InvalidQuery)?;

    Ok(IntegrationRecord {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        settings,
        is_enabled: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

const COLUMNS: &str = "id, owner_id, type, settings, is_enabled, created_at, updated_at";

/// Repository for integration records.
pub struct IntegrationRepository;

impl IntegrationRepository {
    pub fn insert(
        conn: &Connection,
        owner_id: &str,
        settings: &IntegrationSettings,
        is_enabled: bool,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO integrations (owner_id, type, settings, is_enabled) \
             VALUES (?1, ?2, ?3, ?4)",
            params![owner_id, settings.kind(), settings.to_json()?, is_enabled],
        )
        .context("Failed to insert integration")?;

        Ok(conn.last_insert_rowid())
    }

    pub fn get(conn: &Connection, id: i64, owner_id: &str) -> Result<Option<IntegrationRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM integrations WHERE id = ?1 AND owner_id = ?2"
            ))
            .context("Failed to prepare integration query")?;

        let mut rows = stmt
            .query_map(params![id, owner_id], map_row)
            .context("Failed to query integration")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List an owner's integrations, newest first.
    pub fn list_by_owner(conn: &Connection, owner_id: &str) -> Result<Vec<IntegrationRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM integrations WHERE owner_id = ?1 \
                 ORDER BY created_at DESC, id DESC"
            ))
            .context("Failed to prepare integrations list query")?;

        let rows = stmt
            .query_map(params![owner_id], map_row)
            .context("Failed to list integrations")?;

        let mut integrations = Vec::new();
        for row in rows {
            integrations.push(row?);
        }

        Ok(integrations)
    }

    /// Replace settings and/or the enabled flag.
    pub fn update(
        conn: &Connection,
        id: i64,
        owner_id: &str,
        settings: Option<&IntegrationSettings>,
        is_enabled: Option<bool>,
    ) -> Result<Option<IntegrationRecord>> {
        if let Some(settings) = settings {
            conn.execute(
                "UPDATE integrations SET type = ?1, settings = ?2, \
                 updated_at = CURRENT_TIMESTAMP WHERE id = ?3 AND owner_id = ?4",
                params![settings.kind(), settings.to_json()?, id, owner_id],
            )
            .context("Failed to update integration settings")?;
        }

        if let Some(enabled) = is_enabled {
            conn.execute(
                "UPDATE integrations SET is_enabled = ?1, \
                 updated_at = CURRENT_TIMESTAMP WHERE id = ?2 AND owner_id = ?3",
                params![enabled, id, owner_id],
            )
            .context("Failed to update integration enabled flag")?;
        }

        Self::get(conn, id, owner_id)
    }

    pub fn delete(conn: &Connection, id: i64, owner_id: &str) -> Result<bool> {
        let deleted = conn
            .execute(
                "DELETE FROM integrations WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
            )
            .context("Failed to delete integration")?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;
    use serde_json::json;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn slack_settings(channel: &str) -> IntegrationSettings {
        IntegrationSettings::Slack(SlackSettings {
            channel_id: channel.to_string(),
            webhook_url: None,
        })
    }

    fn email_settings(recipient: &str) -> IntegrationSettings {
        IntegrationSettings::Email(EmailSettings {
            recipients: vec![recipient.to_string()],
            subject: None,
        })
    }

    #[test]
    fn test_settings_validation_slack() {
        let settings =
            IntegrationSettings::from_parts("slack", &json!({"channel_id": "C123"})).unwrap();
        assert_eq!(settings.kind(), "slack");

        assert!(IntegrationSettings::from_parts("slack", &json!({"channel_id": ""})).is_err());
        assert!(IntegrationSettings::from_parts("slack", &json!({})).is_err());
    }

    #[test]
    fn test_settings_validation_email() {
        let settings = IntegrationSettings::from_parts(
            "email",
            &json!({"recipients": ["a@example.com"], "subject": "Minutes"}),
        )
        .unwrap();
        assert_eq!(settings.kind(), "email");

        assert!(IntegrationSettings::from_parts("email", &json!({"recipients": []})).is_err());
    }

    #[test]
    fn test_settings_validation_unknown_type() {
        assert!(IntegrationSettings::from_parts("pager", &json!({})).is_err());
    }

    #[test]
    fn test_insert_and_get() {
        let conn = setup_db();
        let id =
            IntegrationRepository::insert(&conn, "user-1", &slack_settings("C123"), true).unwrap();

        let integration = IntegrationRepository::get(&conn, id, "user-1").unwrap().unwrap();
        assert!(integration.is_enabled);
        assert_eq!(integration.settings, slack_settings("C123"));
    }

    #[test]
    fn test_get_scoped_to_owner() {
        let conn = setup_db();
        let id =
            IntegrationRepository::insert(&conn, "owner-a", &email_settings("a@x.com"), true)
                .unwrap();

        assert!(IntegrationRepository::get(&conn, id, "owner-b").unwrap().is_none());
    }

    #[test]
    fn test_list_by_owner() {
        let conn = setup_db();
        IntegrationRepository::insert(&conn, "user-1", &slack_settings("C1"), true).unwrap();
        IntegrationRepository::insert(&conn, "user-1", &email_settings("a@x.com"), false).unwrap();
        IntegrationRepository::insert(&conn, "user-2", &slack_settings("C2"), true).unwrap();

        let integrations = IntegrationRepository::list_by_owner(&conn, "user-1").unwrap();
        assert_eq!(integrations.len(), 2);
    }

    #[test]
    fn test_update_toggles_enabled() {
        let conn = setup_db();
        let id =
            IntegrationRepository::insert(&conn, "user-1", &slack_settings("C123"), true).unwrap();

        let updated = IntegrationRepository::update(&conn, id, "user-1", None, Some(false))
            .unwrap()
            .unwrap();
        assert!(!updated.is_enabled);
        // Settings untouched
        assert_eq!(updated.settings, slack_settings("C123"));
    }

    #[test]
    fn test_update_replaces_settings() {
        let conn = setup_db();
        let id =
            IntegrationRepository::insert(&conn, "user-1", &slack_settings("C123"), true).unwrap();

        let new_settings = email_settings("team@example.com");
        let updated =
            IntegrationRepository::update(&conn, id, "user-1", Some(&new_settings), None)
                .unwrap()
                .unwrap();
        assert_eq!(updated.settings, new_settings);
    }

    #[test]
    fn test_delete() {
        let conn = setup_db();
        let id =
            IntegrationRepository::insert(&conn, "user-1", &slack_settings("C123"), true).unwrap();

        assert!(!IntegrationRepository::delete(&conn, id, "user-2").unwrap());
        assert!(IntegrationRepository::delete(&conn, id, "user-1").unwrap());
        assert!(IntegrationRepository::get(&conn, id, "user-1").unwrap().is_none());
    }
}
