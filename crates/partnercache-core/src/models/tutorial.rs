use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::Record;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Tutorial {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Display duration as entered by the admin ("12:30", "1h 5m")
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl Record for Tutorial {
    const TABLE: &'static str = "tutorials";
}

impl Tutorial {
    pub fn category_display(&self) -> &str {
        self.category.as_deref().unwrap_or("General")
    }

    pub fn has_video(&self) -> bool {
        self.video_url.as_deref().is_some_and(|u| !u.trim().is_empty())
    }
}
