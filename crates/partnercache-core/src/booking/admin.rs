use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::api::{decode_row, fetch_records, ApiError, Filter, Query, Record, RemoteClient};
use crate::models::{
    Consultation, ConsultationSlot, ConsultationStatus, RegistrationStatus, WebinarRegistration,
};

use super::consultation::release_slot;

/// Status changes and deletions for booked consultations and registrations.
///
/// Errors are passed through untranslated.
#[derive(Clone)]
pub struct BookingAdmin {
    remote: Arc<dyn RemoteClient>,
}

impl BookingAdmin {
    pub fn new(remote: Arc<dyn RemoteClient>) -> Self {
        Self { remote }
    }

    /// Change a consultation's status, keeping its slot in step.
    ///
    /// Leaving pending/confirmed frees the slot. Returning to one of them
    /// claims it again and fails with `Conflict` if someone else holds it.
    pub async fn set_consultation_status(
        &self,
        id: &str,
        status: ConsultationStatus,
    ) -> Result<Consultation, ApiError> {
        let current = self.find_consultation(id).await?;
        let was_holding = current.status.holds_slot();
        let reclaim = status.holds_slot() && !was_holding;

        if reclaim && !self.claim(&current).await? {
            return Err(ApiError::Conflict(format!(
                "slot {} {} is no longer available",
                current.date, current.time
            )));
        }

        let row = match self
            .update_one(Consultation::TABLE, id, json!({ "status": status }))
            .await
        {
            Ok(row) => row,
            Err(e) => {
                if reclaim {
                    self.release(&current).await;
                }
                return Err(e);
            }
        };
        info!(id, ?status, "Consultation status updated");

        if was_holding && !status.holds_slot() {
            self.release(&current).await;
        }
        decode_row(Consultation::TABLE, row)
    }

    pub async fn set_registration_status(
        &self,
        id: &str,
        status: RegistrationStatus,
    ) -> Result<WebinarRegistration, ApiError> {
        let row = self
            .update_one(WebinarRegistration::TABLE, id, json!({ "status": status }))
            .await?;
        info!(id, ?status, "Registration status updated");
        decode_row(WebinarRegistration::TABLE, row)
    }

    /// Delete a consultation. A booking that still held its slot gives it back.
    pub async fn delete_consultation(&self, id: &str) -> Result<(), ApiError> {
        let consultation = self.find_consultation(id).await?;

        self.remote
            .delete(Consultation::TABLE, &[Filter::eq("id", id)])
            .await?;
        info!(id, "Consultation deleted");

        if consultation.status.holds_slot() {
            self.release(&consultation).await;
        }
        Ok(())
    }

    pub async fn delete_registration(&self, id: &str) -> Result<(), ApiError> {
        let removed = self
            .remote
            .delete(WebinarRegistration::TABLE, &[Filter::eq("id", id)])
            .await?;
        if removed == 0 {
            return Err(ApiError::NotFound(format!("registration {}", id)));
        }
        info!(id, "Registration deleted");
        Ok(())
    }

    async fn find_consultation(&self, id: &str) -> Result<Consultation, ApiError> {
        let query = Query::table(Consultation::TABLE)
            .filter(Filter::eq("id", id))
            .range(0, 1);
        let (found, _) = fetch_records::<Consultation>(self.remote.as_ref(), &query).await?;
        found
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("consultation {}", id)))
    }

    /// Take the consultation's (date, time) slot if it is still free.
    async fn claim(&self, consultation: &Consultation) -> Result<bool, ApiError> {
        let changed = self
            .remote
            .update(
                ConsultationSlot::TABLE,
                json!({ "is_available": false }),
                &slot_filters(consultation, true),
            )
            .await?;
        Ok(!changed.is_empty())
    }

    /// Free the consultation's slot. Failures are logged; the booking change stands.
    async fn release(&self, consultation: &Consultation) {
        match release_slot(self.remote.as_ref(), &slot_filters(consultation, false)).await {
            Ok(0) => {
                warn!(id = %consultation.id, date = %consultation.date, time = %consultation.time, "No slot to release");
            }
            Ok(_) => {
                info!(id = %consultation.id, date = %consultation.date, time = %consultation.time, "Slot released");
            }
            Err(e) => {
                warn!(id = %consultation.id, error = %e, "Failed to release slot");
            }
        }
    }

    async fn update_one(&self, table: &str, id: &str, patch: Value) -> Result<Value, ApiError> {
        self.remote
            .update(table, patch, &[Filter::eq("id", id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(format!("{} {}", table, id)))
    }
}

fn slot_filters(consultation: &Consultation, available: bool) -> [Filter; 3] {
    [
        Filter::eq("date", consultation.date.to_string()),
        Filter::eq("time", consultation.time.as_str()),
        Filter::eq("is_available", available),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryClient;
    use crate::booking::consultation::{claim_slot, ConsultationBooking};
    use crate::booking::error::Field;
    use crate::booking::flow::BookingFlow;
    use chrono::NaiveDate;

    fn consultation_row(id: &str, time: &str, status: &str) -> Value {
        json!({
            "id": id,
            "name": "Ana",
            "email": "ana@example.com",
            "topic": "Payouts",
            "date": "2026-10-20",
            "time": time,
            "status": status,
            "created_at": "2026-10-01T10:00:00Z"
        })
    }

    fn remote() -> Arc<MemoryClient> {
        Arc::new(
            MemoryClient::new()
                .with_rows(
                    "consultation_slots",
                    vec![
                        json!({"id": "s1", "date": "2026-10-20", "time": "09:00", "is_available": false}),
                        json!({"id": "s2", "date": "2026-10-20", "time": "15:00", "is_available": false}),
                    ],
                )
                .with_rows(
                    "consultations",
                    vec![
                        consultation_row("c1", "09:00", "pending"),
                        consultation_row("c2", "15:00", "completed"),
                    ],
                )
                .with_rows(
                    "webinar_registrations",
                    vec![json!({
                        "id": "r1",
                        "session_id": "w1",
                        "name": "Ana",
                        "email": "ana@example.com",
                        "status": "confirmed",
                        "created_at": "2026-10-01T10:00:00Z"
                    })],
                ),
        )
    }

    fn slot_available(remote: &MemoryClient, id: &str) -> bool {
        remote
            .rows("consultation_slots")
            .iter()
            .find(|r| r["id"] == id)
            .map(|r| r["is_available"] == true)
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_set_statuses() {
        let remote = remote();
        let admin = BookingAdmin::new(remote.clone());

        let c = admin
            .set_consultation_status("c1", ConsultationStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(c.status, ConsultationStatus::Confirmed);

        let r = admin
            .set_registration_status("r1", RegistrationStatus::NoShow)
            .await
            .unwrap();
        assert_eq!(r.status, RegistrationStatus::NoShow);

        assert!(matches!(
            admin.set_consultation_status("missing", ConsultationStatus::Cancelled).await,
            Err(ApiError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_deleting_active_consultation_releases_slot() {
        let remote = remote();
        let admin = BookingAdmin::new(remote.clone());

        admin.delete_consultation("c1").await.unwrap();

        assert!(slot_available(&remote, "s1"));
        assert!(!slot_available(&remote, "s2"));
        assert_eq!(remote.rows("consultations").len(), 1);
    }

    #[tokio::test]
    async fn test_deleting_completed_consultation_keeps_slot() {
        let remote = remote();
        let admin = BookingAdmin::new(remote.clone());

        admin.delete_consultation("c2").await.unwrap();
        assert!(!slot_available(&remote, "s2"));
        assert!(matches!(admin.delete_consultation("c2").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete_registration() {
        let remote = remote();
        let admin = BookingAdmin::new(remote.clone());

        admin.delete_registration("r1").await.unwrap();
        assert!(remote.rows("webinar_registrations").is_empty());
        assert!(matches!(admin.delete_registration("r1").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_then_delete_frees_slot_for_rebooking() {
        let remote = Arc::new(MemoryClient::new().with_rows(
            "consultation_slots",
            vec![json!({"id": "s1", "date": "2026-10-20", "time": "09:00", "is_available": true})],
        ));
        let today = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let mut flow = BookingFlow::new(ConsultationBooking, remote.clone());
        flow.load_options(today).await.unwrap();
        flow.select("s1").unwrap();
        flow.proceed().unwrap();
        flow.set_field(Field::Name, "Ana");
        flow.set_field(Field::Email, "ana@example.com");
        flow.set_field(Field::Topic, "Payouts");
        let booking_id = flow.submit().await.unwrap().id.clone();
        flow.close().unwrap();
        assert!(flow.load_options(today).await.unwrap().is_empty());

        let admin = BookingAdmin::new(remote.clone());
        admin
            .set_consultation_status(&booking_id, ConsultationStatus::Cancelled)
            .await
            .unwrap();
        assert!(slot_available(&remote, "s1"));

        admin.delete_consultation(&booking_id).await.unwrap();
        assert!(remote.rows("consultations").is_empty());
        let ids: Vec<String> = flow
            .load_options(today)
            .await
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(ids, vec!["s1"]);
    }

    #[tokio::test]
    async fn test_reactivating_needs_the_slot_back() {
        let remote = remote();
        let admin = BookingAdmin::new(remote.clone());

        admin
            .set_consultation_status("c1", ConsultationStatus::Cancelled)
            .await
            .unwrap();
        admin
            .set_consultation_status("c1", ConsultationStatus::Confirmed)
            .await
            .unwrap();
        assert!(!slot_available(&remote, "s1"));

        admin
            .set_consultation_status("c1", ConsultationStatus::Cancelled)
            .await
            .unwrap();
        assert!(claim_slot(remote.as_ref(), "s1").await.unwrap());

        let err = admin
            .set_consultation_status("c1", ConsultationStatus::Pending)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        let row = remote
            .rows("consultations")
            .into_iter()
            .find(|r| r["id"] == "c1")
            .unwrap();
        assert_eq!(row["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_delete_succeeds_when_slot_release_fails() {
        let remote = remote();
        let admin = BookingAdmin::new(remote.clone());
        remote.fail_next("consultation_slots", "connection reset");

        admin.delete_consultation("c1").await.unwrap();

        assert_eq!(remote.rows("consultations").len(), 1);
        assert!(!slot_available(&remote, "s1"));
    }
}
