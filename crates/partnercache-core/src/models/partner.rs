use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum PartnerStatus {
    Pending,
    Approved,
    Rejected,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PartnerProfile {
    pub id: String,
    /// Identity-provider user id the partner row belongs to
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub referral_code: Option<String>,
    /// Percentage of referred trading fees paid to the partner
    #[serde(default)]
    pub commission_rate: Option<f64>,
    pub status: PartnerStatus,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl Record for PartnerProfile {
    const TABLE: &'static str = "partners";
}

impl PartnerProfile {
    pub fn is_approved(&self) -> bool {
        self.status == PartnerStatus::Approved
    }

    pub fn commission_display(&self) -> String {
        match self.commission_rate {
            Some(rate) => format!("{:.1}%", rate),
            None => "Not set".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_commission_display() {
        let mut profile: PartnerProfile = serde_json::from_value(json!({
            "id": "p1",
            "user_id": "u1",
            "full_name": "Dana Reyes",
            "email": "dana@example.com",
            "status": "approved",
            "commission_rate": 25.0,
            "created_at": "2026-09-01T10:00:00Z"
        }))
        .unwrap();

        assert!(profile.is_approved());
        assert_eq!(profile.commission_display(), "25.0%");
        profile.commission_rate = None;
        assert_eq!(profile.commission_display(), "Not set");
    }
}
