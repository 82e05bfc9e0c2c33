use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::Record;

// ============================================================================
// Consultations
// ============================================================================

/// A bookable (date, time) pair for a one-on-one consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ConsultationSlot {
    pub id: String,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub date: NaiveDate,
    /// Wall-clock start time as stored by the backend ("14:00" or "14:00:00")
    pub time: String,
    pub is_available: bool,
}

impl Record for ConsultationSlot {
    const TABLE: &'static str = "consultation_slots";
}

impl ConsultationSlot {
    /// "Oct 20, 2026 at 14:00"
    pub fn label(&self) -> String {
        format!("{} at {}", self.date.format("%b %d, %Y"), short_time(&self.time))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ConsultationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl ConsultationStatus {
    /// Whether a booking in this status still holds its slot.
    pub fn holds_slot(&self) -> bool {
        matches!(self, ConsultationStatus::Pending | ConsultationStatus::Confirmed)
    }
}

impl std::str::FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(ConsultationStatus::Pending),
            "confirmed" => Ok(ConsultationStatus::Confirmed),
            "cancelled" => Ok(ConsultationStatus::Cancelled),
            "completed" => Ok(ConsultationStatus::Completed),
            other => Err(format!("unknown consultation status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Consultation {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    pub topic: String,
    #[serde(default)]
    pub message: Option<String>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub date: NaiveDate,
    pub time: String,
    pub status: ConsultationStatus,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl Record for Consultation {
    const TABLE: &'static str = "consultations";
}

/// Insert payload for a consultation; the backend assigns id and created_at.
#[derive(Debug, Clone, Serialize)]
pub struct NewConsultation {
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub topic: String,
    pub message: Option<String>,
    pub date: NaiveDate,
    pub time: String,
    pub status: ConsultationStatus,
}

// ============================================================================
// Webinars
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct WebinarSession {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub date: NaiveDate,
    pub time: String,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    /// Seat limit; `None` means unlimited
    #[serde(default)]
    pub max_participants: Option<i32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Record for WebinarSession {
    const TABLE: &'static str = "webinar_sessions";
}

impl WebinarSession {
    pub fn label(&self) -> String {
        format!(
            "{} - {} at {}",
            self.title,
            self.date.format("%b %d, %Y"),
            short_time(&self.time)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Confirmed,
    Cancelled,
    Attended,
    NoShow,
}

impl std::str::FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "cancelled" => Ok(RegistrationStatus::Cancelled),
            "attended" => Ok(RegistrationStatus::Attended),
            "no_show" => Ok(RegistrationStatus::NoShow),
            other => Err(format!("unknown registration status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct WebinarRegistration {
    pub id: String,
    pub session_id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
    pub status: RegistrationStatus,
    #[cfg_attr(feature = "ts", ts(type = "string"))]
    pub created_at: DateTime<Utc>,
}

impl Record for WebinarRegistration {
    const TABLE: &'static str = "webinar_registrations";
}

#[derive(Debug, Clone, Serialize)]
pub struct NewRegistration {
    pub session_id: String,
    pub name: String,
    pub email: String,
    pub company: Option<String>,
    pub status: RegistrationStatus,
}

/// Drop the seconds the backend's `time` columns carry ("14:00:00" -> "14:00").
fn short_time(time: &str) -> &str {
    match time.len() {
        8 if time.as_bytes()[5] == b':' => &time[..5],
        _ => time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_label_trims_seconds() {
        let slot: ConsultationSlot = serde_json::from_value(json!({
            "id": "s1",
            "date": "2026-10-20",
            "time": "14:00:00",
            "is_available": true
        }))
        .unwrap();
        assert_eq!(slot.label(), "Oct 20, 2026 at 14:00");
    }

    #[test]
    fn test_status_round_trips_snake_case() {
        assert_eq!(
            serde_json::to_value(RegistrationStatus::NoShow).unwrap(),
            json!("no_show")
        );
        assert_eq!("no-show".parse::<RegistrationStatus>(), Ok(RegistrationStatus::NoShow));
        assert!("maybe".parse::<ConsultationStatus>().is_err());
    }

    #[test]
    fn test_holds_slot() {
        assert!(ConsultationStatus::Pending.holds_slot());
        assert!(ConsultationStatus::Confirmed.holds_slot());
        assert!(!ConsultationStatus::Cancelled.holds_slot());
        assert!(!ConsultationStatus::Completed.holds_slot());
    }
}
