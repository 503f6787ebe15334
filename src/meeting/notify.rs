//! Notification fan-out.
//!
//! After a meeting completes, each of the owner's enabled integrations
//! gets an independent delivery attempt. One channel failing never stops
//! the others, and `send_all` never raises to the pipeline — every error
//! is logged and contained here.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::{IntegrationRecord, IntegrationSettings, MeetingRecord};
use crate::notify::{EmailClient, SlackClient};

pub struct Notifier {
    slack: Arc<dyn SlackClient>,
    email: Arc<dyn EmailClient>,
}

impl Notifier {
    pub fn new(slack: Arc<dyn SlackClient>, email: Arc<dyn EmailClient>) -> Self {
        Self { slack, email }
    }

    /// Deliver the meeting summary through every enabled integration.
    /// Deliveries run concurrently; failures are logged per integration.
    pub async fn send_all(&self, meeting: &MeetingRecord, integrations: &[IntegrationRecord]) {
        let mut handles = Vec::new();

        for integration in integrations {
            if !integration.is_enabled {
                continue;
            }

            match &integration.settings {
                IntegrationSettings::Slack(settings) => {
                    let slack = Arc::clone(&self.slack);
                    let channel = settings.channel_id.clone();
                    let text = format!("Meeting Summary: {}", meeting.title);
                    let blocks = slack_blocks(meeting);
                    let meeting_id = meeting.id;
                    let integration_id = integration.id;

                    handles.push(tokio::spawn(async move {
                        match slack.post_message(&channel, &text, Some(blocks)).await {
                            Ok(ts) => info!(
                                "Meeting {}: Slack notification sent (integration {}, ts {})",
                                meeting_id, integration_id, ts
                            ),
                            Err(e) => error!(
                                "Meeting {}: Slack notification failed (integration {}): {}",
                                meeting_id, integration_id, e
                            ),
                        }
                    }));
                }
                IntegrationSettings::Email(settings) => {
                    let email = Arc::clone(&self.email);
                    let recipients = settings.recipients.clone();
                    let subject = settings
                        .subject
                        .clone()
                        .unwrap_or_else(|| format!("Meeting Summary: {}", meeting.title));
                    let html = email_html(meeting);
                    let meeting_id = meeting.id;
                    let integration_id = integration.id;

                    handles.push(tokio::spawn(async move {
                        match email.send(&recipients, &subject, &html, None).await {
                            Ok(()) => info!(
                                "Meeting {}: email notification sent (integration {})",
                                meeting_id, integration_id
                            ),
                            Err(e) => error!(
                                "Meeting {}: email notification failed (integration {}): {}",
                                meeting_id, integration_id, e
                            ),
                        }
                    }));
                }
            }
        }

        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Notification task panicked: {}", e);
            }
        }
    }
}

fn slack_blocks(meeting: &MeetingRecord) -> Value {
    json!([
        {
            "type": "section",
            "text": {
                "type": "mrkdwn",
                "text": format!(
                    "*{}*\n{}",
                    meeting.title,
                    meeting.summary.as_deref().unwrap_or("")
                ),
            }
        }
    ])
}

fn email_html(meeting: &MeetingRecord) -> String {
    let mut html = format!(
        "<h2>{}</h2>\n<p><strong>Date:</strong> {}</p>\n",
        meeting.title, meeting.date
    );

    if let Some(duration) = &meeting.duration {
        html.push_str(&format!("<p><strong>Duration:</strong> {}</p>\n", duration));
    }

    html.push_str(&format!(
        "<h3>Summary:</h3>\n<p>{}</p>\n",
        meeting.summary.as_deref().unwrap_or("")
    ));

    if let Some(decisions) = meeting.key_decisions.as_deref().filter(|d| !d.is_empty()) {
        html.push_str("<h3>Key Decisions:</h3>\n<ul>");
        for decision in decisions {
            html.push_str(&format!("<li>{}</li>", decision));
        }
        html.push_str("</ul>\n");
    }

    if let Some(items) = meeting.action_items.as_deref().filter(|i| !i.is_empty()) {
        html.push_str("<h3>Action Items:</h3>\n<ul>");
        for item in items {
            html.push_str(&format!("<li>{}</li>", item));
        }
        html.push_str("</ul>\n");
    }

    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::integrations::{EmailSettings, SlackSettings};
    use crate::meeting::status::MeetingStatus;
    use crate::notify::NotifyError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn completed_meeting() -> MeetingRecord {
        MeetingRecord {
            id: 1,
            owner_id: "user-1".to_string(),
            title: "Quarterly planning".to_string(),
            date: "2025-06-01T10:00:00Z".to_string(),
            duration: Some("60 min".to_string()),
            participants: None,
            audio_path: None,
            transcription: Some("transcript".to_string()),
            summary: Some("We planned the quarter.".to_string()),
            key_decisions: Some(vec!["Ship in June".to_string()]),
            action_items: Some(vec!["Draft the RFC".to_string()]),
            status: MeetingStatus::Completed,
            created_at: "2025-06-01 10:00:00".to_string(),
            updated_at: "2025-06-01 10:30:00".to_string(),
        }
    }

    fn integration(id: i64, settings: IntegrationSettings, enabled: bool) -> IntegrationRecord {
        IntegrationRecord {
            id,
            owner_id: "user-1".to_string(),
            settings,
            is_enabled: enabled,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    struct FailingSlack {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SlackClient for FailingSlack {
        async fn post_message(
            &self,
            _channel: &str,
            _text: &str,
            _blocks: Option<Value>,
        ) -> Result<String, NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::Slack("channel_not_found".to_string()))
        }
    }

    struct CountingEmail {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmailClient for CountingEmail {
        async fn send(
            &self,
            _to: &[String],
            _subject: &str,
            _html: &str,
            _text: Option<&str>,
        ) -> Result<(), NotifyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slack_failure_does_not_block_email() {
        let slack = Arc::new(FailingSlack {
            calls: AtomicUsize::new(0),
        });
        let email = Arc::new(CountingEmail {
            calls: AtomicUsize::new(0),
        });
        let notifier = Notifier::new(slack.clone(), email.clone());

        let integrations = vec![
            integration(
                1,
                IntegrationSettings::Slack(SlackSettings {
                    channel_id: "C123".to_string(),
                    webhook_url: None,
                }),
                true,
            ),
            integration(
                2,
                IntegrationSettings::Email(EmailSettings {
                    recipients: vec!["team@example.com".to_string()],
                    subject: None,
                }),
                true,
            ),
        ];

        notifier.send_all(&completed_meeting(), &integrations).await;

        // Both deliveries were attempted despite the Slack failure.
        assert_eq!(slack.calls.load(Ordering::SeqCst), 1);
        assert_eq!(email.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_disabled_integrations_are_skipped() {
        let slack = Arc::new(FailingSlack {
            calls: AtomicUsize::new(0),
        });
        let email = Arc::new(CountingEmail {
            calls: AtomicUsize::new(0),
        });
        let notifier = Notifier::new(slack.clone(), email.clone());

        let integrations = vec![integration(
            1,
            IntegrationSettings::Slack(SlackSettings {
                channel_id: "C123".to_string(),
                webhook_url: None,
            }),
            false,
        )];

        notifier.send_all(&completed_meeting(), &integrations).await;

        assert_eq!(slack.calls.load(Ordering::SeqCst), 0);
        assert_eq!(email.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_email_html_includes_sections() {
        let html = email_html(&completed_meeting());
        assert!(html.contains("<h2>Quarterly planning</h2>"));
        assert!(html.contains("<strong>Duration:</strong> 60 min"));
        assert!(html.contains("We planned the quarter."));
        assert!(html.contains("<li>Ship in June</li>"));
        assert!(html.contains("<li>Draft the RFC</li>"));
    }

    #[test]
    fn test_email_html_omits_empty_sections() {
        let mut meeting = completed_meeting();
        meeting.key_decisions = Some(Vec::new());
        meeting.action_items = None;
        meeting.duration = None;

        let html = email_html(&meeting);
        assert!(!html.contains("Key Decisions"));
        assert!(!html.contains("Action Items"));
        assert!(!html.contains("Duration"));
    }

    #[test]
    fn test_slack_blocks_shape() {
        let blocks = slack_blocks(&completed_meeting());
        assert_eq!(blocks[0]["type"], "section");
        let text = blocks[0]["text"]["text"].as_str().unwrap();
        assert!(text.starts_with("*Quarterly planning*"));
        assert!(text.contains("We planned the quarter."));
    }
}
