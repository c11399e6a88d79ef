//! Outbound push notifications.

pub mod gotify;

pub use gotify::GotifyNotifier;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::errors::Result;

/// Presentation hints understood by the notification transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotifyOptions {
    pub markdown: bool,
    pub on_click_url: Option<String>,
    pub big_image_url: Option<String>,
}

impl NotifyOptions {
    /// Reads the `markdown`, `onClickURL` and `bigImageURL` keys of a JSON
    /// object. Unknown keys and values of the wrong type are ignored.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let string = |key: &str| {
            map.get(key)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        Self {
            markdown: map.get("markdown").and_then(Value::as_bool).unwrap_or(false),
            on_click_url: string("onClickURL"),
            big_image_url: string("bigImageURL"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &str, title: &str, options: &NotifyOptions) -> Result<()>;
}
