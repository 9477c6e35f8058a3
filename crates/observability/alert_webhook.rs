use super::notifier::{AlertEvent, AlertSink};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use url::Url;

/// Discord-compatible webhooks cap `content` at 2000 characters.
const CONTENT_LIMIT: usize = 2000;
const TRUNCATED_SUFFIX: &str = "\n… (truncated)";

pub(crate) struct AlertWebhookSink {
    webhook_url: Url,
    client: Client,
}

impl AlertWebhookSink {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;
        Ok(Self {
            webhook_url,
            client,
        })
    }
}

pub(crate) fn format_content(event: &AlertEvent) -> String {
    let mut lines = vec![format!(
        "**{}** `{}` `{}` `{}`",
        event.service_name,
        event.environment,
        event.component,
        event.level.as_str()
    )];

    let location = match (&event.file, event.line) {
        (Some(file), Some(line)) => format!(" `{file}:{line}`"),
        _ => String::new(),
    };
    lines.push(format!(
        "`{}` `{}`{location}",
        event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        event.target,
    ));

    if let Some(message) = event.message.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        lines.push(format!("> {message}"));
    }

    if !event.spans.is_empty() {
        let chain = event
            .spans
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(" > ");
        lines.push(format!("spans: `{chain}`"));
    }

    if !event.fields.is_empty() {
        lines.push("fields:".to_string());
        lines.extend(event.fields.iter().map(|(k, v)| format!("- `{k}` = `{v}`")));
    }

    for span in event.spans.iter().filter(|s| !s.fields.is_empty()) {
        lines.push(format!("span `{}`:", span.name));
        lines.extend(span.fields.iter().map(|(k, v)| format!("- `{k}` = `{v}`")));
    }

    truncate_content(lines.join("\n"))
}

fn truncate_content(content: String) -> String {
    if content.chars().count() <= CONTENT_LIMIT {
        return content;
    }
    let keep = CONTENT_LIMIT - TRUNCATED_SUFFIX.chars().count();
    let mut truncated: String = content.chars().take(keep).collect();
    truncated.push_str(TRUNCATED_SUFFIX);
    truncated
}

#[async_trait]
impl AlertSink for AlertWebhookSink {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&json!({ "content": format_content(event) }))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }
        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn sink_name(&self) -> &'static str {
        "alert_webhook"
    }
}

// reqwest errors carry the URL, which embeds the webhook token.
fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("alert webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("alert webhook connection failed");
    }
    anyhow!("alert webhook request failed")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use tracing::Level;

    use super::super::notifier::SpanSummary;
    use super::*;

    fn event() -> AlertEvent {
        AlertEvent {
            level: Level::ERROR,
            timestamp: Utc::now(),
            service_name: "esim-backend".to_string(),
            environment: "production".to_string(),
            component: "backend".to_string(),
            target: "backend::usecases::payments".to_string(),
            file: Some("backend/src/usecases/payments.rs".to_string()),
            line: Some(42),
            message: Some("payments: fulfillment failed".to_string()),
            fields: BTreeMap::from([("order_id".to_string(), "abc".to_string())]),
            spans: vec![SpanSummary {
                name: "request".to_string(),
                fields: BTreeMap::from([("uri".to_string(), "/api/stripe/webhook".to_string())]),
            }],
        }
    }

    #[test]
    fn content_lists_message_fields_and_spans() {
        let content = format_content(&event());
        assert!(content.starts_with("**esim-backend** `production` `backend` `ERROR`"));
        assert!(content.contains("`backend/src/usecases/payments.rs:42`"));
        assert!(content.contains("> payments: fulfillment failed"));
        assert!(content.contains("- `order_id` = `abc`"));
        assert!(content.contains("span `request`:"));
    }

    #[test]
    fn long_content_is_truncated() {
        let mut long = event();
        long.message = Some("x".repeat(5000));
        let content = format_content(&long);
        assert_eq!(content.chars().count(), CONTENT_LIMIT);
        assert!(content.ends_with(TRUNCATED_SUFFIX));
    }
}
