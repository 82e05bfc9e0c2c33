use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum MaterialKind {
    Banner,
    Social,
    Email,
    Video,
    Document,
    #[serde(other)]
    Other,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Banner => "banner",
            MaterialKind::Social => "social",
            MaterialKind::Email => "email",
            MaterialKind::Video => "video",
            MaterialKind::Document => "document",
            MaterialKind::Other => "other",
        }
    }
}

impl std::fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MaterialKind::Banner => write!(f, "Banner"),
            MaterialKind::Social => write!(f, "Social Media"),
            MaterialKind::Email => write!(f, "Email Template"),
            MaterialKind::Video => write!(f, "Video"),
            MaterialKind::Document => write!(f, "Document"),
            MaterialKind::Other => write!(f, "Other"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MarketingMaterial {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: MaterialKind,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Pixel size for banners, e.g. "728x90"
    #[serde(default)]
    pub dimensions: Option<String>,
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

impl Record for MarketingMaterial {
    const TABLE: &'static str = "marketing_materials";
}
