//! Discord webhook delivery, one webhook per audience.
//!
//! 429 responses are retried after the delay Discord asks for, up to
//! [`MAX_RATE_LIMIT_RETRIES`] attempts.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::{
    config::Webhooks,
    error::AppResult,
    notify::{Audience, Delivery, DeliverySink, Notification},
};

const MAX_RATE_LIMIT_RETRIES: u32 = 3;
const MAX_RETRY_WAIT: Duration = Duration::from_secs(60);

pub struct DiscordWebhookSink {
    client: reqwest::Client,
    webhooks: Webhooks,
}

impl DiscordWebhookSink {
    pub fn new(client: reqwest::Client, webhooks: Webhooks) -> Self {
        Self { client, webhooks }
    }

    fn webhook_for(&self, audience: Audience) -> Option<&str> {
        match audience {
            Audience::AllMovies => self.webhooks.all_movies.as_deref(),
            Audience::Anime => self.webhooks.anime.as_deref(),
            Audience::Watchlist => self.webhooks.watchlist.as_deref(),
        }
    }

    async fn send_with_retry(&self, url: &str, payload: &Value) -> AppResult<()> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            let response = self.client.post(url).json(payload).send().await?;
            let status = response.status();

            if status.is_success() {
                return Ok(());
            }

            if status.as_u16() == 429 && attempts < MAX_RATE_LIMIT_RETRIES {
                let wait = retry_after(response.headers()).unwrap_or(Duration::from_secs(1));
                debug!(wait = ?wait, attempt = attempts, "discord rate limited, retrying");
                tokio::time::sleep(wait).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "discord webhook rejected message");
            return Err(anyhow::anyhow!("discord webhook failed: {status}").into());
        }
    }
}

#[async_trait]
impl DeliverySink for DiscordWebhookSink {
    async fn deliver(
        &self,
        audience: Audience,
        notification: &Notification,
    ) -> AppResult<Delivery> {
        let Some(url) = self.webhook_for(audience) else {
            return Ok(Delivery::NoDestination);
        };

        self.send_with_retry(url, &build_payload(notification)).await?;
        Ok(Delivery::Sent)
    }
}

/// Seconds from `Retry-After` or Discord's reset header, capped at [`MAX_RETRY_WAIT`].
fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    ["Retry-After", "X-RateLimit-Reset-After"].into_iter().find_map(|header| {
        let secs = headers.get(header)?.to_str().ok()?.parse::<f64>().ok()?;
        let wait = Duration::try_from_secs_f64(secs.max(0.0)).unwrap_or(MAX_RETRY_WAIT);
        Some(wait.min(MAX_RETRY_WAIT))
    })
}

fn build_payload(notification: &Notification) -> Value {
    let mut embed = json!({
        "title": notification.heading,
        "url": notification.url,
        "color": notification.color,
    });
    if let Some(description) = &notification.description {
        embed["description"] = json!(description);
    }
    if let Some(image) = &notification.image_url {
        embed["image"] = json!({ "url": image });
    }
    if !notification.fields.is_empty() {
        embed["fields"] = notification
            .fields
            .iter()
            .map(|f| json!({ "name": f.name, "value": f.value, "inline": f.inline }))
            .collect();
    }

    let mut payload = json!({ "embeds": [embed] });

    if !notification.mentions.is_empty() {
        let pings: Vec<String> =
            notification.mentions.iter().map(|id| format!("<@{id}>")).collect();
        let users: Vec<String> = notification.mentions.iter().map(|id| id.to_string()).collect();
        payload["content"] = json!(pings.join(" "));
        payload["allowed_mentions"] = json!({ "users": users });
    }

    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::EmbedField;

    fn notification() -> Notification {
        Notification {
            heading: "🔄 Showtimes Updated for: Flow".to_string(),
            url: "https://www.cinemark.com/movies/flow".to_string(),
            description: None,
            image_url: Some("https://img.example/flow.jpg".to_string()),
            color: 0x3498db,
            fields: vec![EmbedField {
                name: "New Dates".into(),
                value: "Fri, Sat".into(),
                inline: false,
            }],
            mentions: vec![],
        }
    }

    #[test]
    fn payload_carries_embed_fields() {
        let payload = build_payload(&notification());
        let embed = &payload["embeds"][0];

        assert_eq!(embed["title"], "🔄 Showtimes Updated for: Flow");
        assert_eq!(embed["color"], 0x3498db);
        assert_eq!(embed["image"]["url"], "https://img.example/flow.jpg");
        assert_eq!(embed["fields"][0]["name"], "New Dates");
        assert_eq!(embed["fields"][0]["inline"], false);
        assert!(embed.get("description").is_none());
        assert!(payload.get("content").is_none());
    }

    #[test]
    fn mentions_become_pings() {
        let payload = build_payload(&Notification { mentions: vec![7, 42], ..notification() });

        assert_eq!(payload["content"], "<@7> <@42>");
        assert_eq!(payload["allowed_mentions"]["users"][1], "42");
    }

    #[test]
    fn retry_after_reads_and_caps_the_wait() {
        let headers = |name: &'static str, value: &'static str| {
            let mut map = HeaderMap::new();
            map.insert(name, value.parse().unwrap());
            map
        };

        assert_eq!(
            retry_after(&headers("retry-after", "1.5")),
            Some(Duration::from_millis(1500))
        );
        assert_eq!(
            retry_after(&headers("x-ratelimit-reset-after", "-3")),
            Some(Duration::ZERO)
        );
        assert_eq!(retry_after(&headers("retry-after", "inf")), Some(MAX_RETRY_WAIT));
        assert_eq!(retry_after(&headers("retry-after", "NaN")), Some(Duration::ZERO));
        assert_eq!(retry_after(&headers("retry-after", "soon")), None);
        assert_eq!(retry_after(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn unconfigured_audience_is_a_silent_no_op() {
        let sink = DiscordWebhookSink::new(
            reqwest::Client::new(),
            Webhooks { anime: Some("https://discord.invalid/hook".into()), ..Default::default() },
        );

        let delivery = sink.deliver(Audience::AllMovies, &notification()).await.unwrap();
        assert_eq!(delivery, Delivery::NoDestination);
    }
}
