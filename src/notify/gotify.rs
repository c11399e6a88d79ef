//! [Gotify](https://gotify.net) notification client.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Notifier, NotifyOptions};
use crate::errors::Result;

pub const APP_NAME: &str = "brewday";
const PRIORITY: u8 = 8;

#[derive(Debug, Deserialize)]
struct Application {
    name: String,
    token: String,
}

#[derive(Debug, Serialize)]
struct ApplicationRequest<'a> {
    name: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    message: &'a str,
    title: &'a str,
    priority: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    extras: Option<Extras>,
}

#[derive(Debug, Serialize)]
struct Extras {
    #[serde(rename = "client::display", skip_serializing_if = "Option::is_none")]
    display: Option<Display>,
    #[serde(rename = "client::notification", skip_serializing_if = "Option::is_none")]
    notification: Option<NotificationExtras>,
}

#[derive(Debug, Serialize)]
struct Display {
    #[serde(rename = "contentType")]
    content_type: &'static str,
}

#[derive(Debug, Serialize)]
struct NotificationExtras {
    #[serde(skip_serializing_if = "Option::is_none")]
    click: Option<Click>,
    #[serde(rename = "bigImageUrl", skip_serializing_if = "Option::is_none")]
    big_image_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct Click {
    url: String,
}

fn extras(options: &NotifyOptions) -> Option<Extras> {
    if options.is_empty() {
        return None;
    }
    let display = options.markdown.then_some(Display {
        content_type: "text/markdown",
    });
    let notification = (options.on_click_url.is_some() || options.big_image_url.is_some())
        .then(|| NotificationExtras {
            click: options.on_click_url.clone().map(|url| Click { url }),
            big_image_url: options.big_image_url.clone(),
        });
    Some(Extras {
        display,
        notification,
    })
}

/// Sends messages to a Gotify server under the `brewday` application.
#[derive(Debug, Clone)]
pub struct GotifyNotifier {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl GotifyNotifier {
    /// Uses an already known application token.
    pub fn with_token(base_url: &str, token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// Logs in with basic auth and resolves the application token, creating
    /// the application if the server does not have it yet.
    pub async fn connect(base_url: &str, username: &str, password: &str) -> anyhow::Result<Self> {
        let mut notifier = Self::with_token(base_url, "");
        notifier.token = notifier.resolve_app_token(username, password).await?;
        Ok(notifier)
    }

    async fn resolve_app_token(&self, username: &str, password: &str) -> anyhow::Result<String> {
        let app_url = format!("{}/application", self.base_url);
        info!(app = APP_NAME, "Initializing gotify app");
        let apps: Vec<Application> = self
            .client
            .get(&app_url)
            .basic_auth(username, Some(password))
            .send()
            .await
            .context("Failed to list gotify applications")?
            .error_for_status()
            .context("Gotify returned error status while listing applications")?
            .json()
            .await
            .context("Failed to parse gotify application list")?;

        if let Some(app) = apps.into_iter().find(|a| a.name == APP_NAME) {
            info!(app = APP_NAME, "Gotify app already exists, using its token");
            return Ok(app.token);
        }

        info!(app = APP_NAME, "Gotify app does not exist, creating it");
        let app: Application = self
            .client
            .post(&app_url)
            .basic_auth(username, Some(password))
            .json(&ApplicationRequest {
                name: APP_NAME,
                description: "Brew day notifications",
            })
            .send()
            .await
            .context("Failed to create gotify application")?
            .error_for_status()
            .context("Gotify returned error status while creating application")?
            .json()
            .await
            .context("Failed to parse created gotify application")?;
        Ok(app.token)
    }
}

#[async_trait]
impl Notifier for GotifyNotifier {
    async fn send(&self, message: &str, title: &str, options: &NotifyOptions) -> Result<()> {
        let body = Message {
            message,
            title,
            priority: PRIORITY,
            extras: extras(options),
        };
        debug!(title, "Sending gotify message");
        self.client
            .post(format!("{}/message", self.base_url))
            .query(&[("token", self.token.as_str())])
            .json(&body)
            .send()
            .await
            .context("Failed to send gotify message")?
            .error_for_status()
            .context("Gotify returned error status for message")?;
        Ok(())
    }
}
