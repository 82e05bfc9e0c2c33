use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use tracing::{debug, warn};

use crate::api::{fetch_records, insert_record, ApiError, Filter, Query, Record, RemoteClient};
use crate::models::{Consultation, ConsultationSlot, ConsultationStatus, NewConsultation};

use super::error::{BookingError, Field};
use super::flow::BookingKind;
use super::form::ContactForm;

/// Upper bound on listed slots.
const MAX_SLOTS: usize = 200;

/// One-on-one consultation bookings against `consultation_slots`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsultationBooking;

/// Mark the slot unavailable only if it still is. True iff this call won it.
pub async fn claim_slot(remote: &dyn RemoteClient, slot_id: &str) -> Result<bool, ApiError> {
    let changed = remote
        .update(
            ConsultationSlot::TABLE,
            json!({ "is_available": false }),
            &[Filter::eq("id", slot_id), Filter::eq("is_available", true)],
        )
        .await?;
    Ok(changed.len() == 1)
}

pub async fn release_slot(remote: &dyn RemoteClient, filters: &[Filter]) -> Result<usize, ApiError> {
    let changed = remote
        .update(ConsultationSlot::TABLE, json!({ "is_available": true }), filters)
        .await?;
    Ok(changed.len())
}

#[async_trait]
impl BookingKind for ConsultationBooking {
    type Choice = ConsultationSlot;
    type Booking = Consultation;

    const REQUIRED: &'static [Field] = &[Field::Name, Field::Email, Field::Topic];

    fn option_id(option: &ConsultationSlot) -> &str {
        &option.id
    }

    async fn load_options(
        &self,
        remote: &dyn RemoteClient,
        today: NaiveDate,
    ) -> Result<Vec<ConsultationSlot>, ApiError> {
        let query = Query::table(ConsultationSlot::TABLE)
            .filter(Filter::gte("date", today.to_string()))
            .filter(Filter::eq("is_available", true))
            .order_asc("date")
            .order_asc("time")
            .range(0, MAX_SLOTS);
        let (slots, _) = fetch_records::<ConsultationSlot>(remote, &query).await?;
        debug!(count = slots.len(), "Available consultation slots loaded");
        Ok(slots)
    }

    async fn book(
        &self,
        remote: &dyn RemoteClient,
        slot: &ConsultationSlot,
        form: &ContactForm,
    ) -> Result<Consultation, BookingError> {
        // Claim first so two bookings can never both hold the slot
        if !claim_slot(remote, &slot.id).await? {
            return Err(BookingError::SlotTaken(slot.label()));
        }

        let payload = NewConsultation {
            name: form.required(Field::Name),
            email: form.normalized_email(),
            company: form.optional(Field::Company),
            topic: form.required(Field::Topic),
            message: form.optional(Field::Message),
            date: slot.date,
            time: slot.time.clone(),
            status: ConsultationStatus::Pending,
        };

        match insert_record::<Consultation, _>(remote, &payload).await {
            Ok(consultation) => Ok(consultation),
            Err(e) => {
                if let Err(release_err) = release_slot(remote, &[Filter::eq("id", slot.id.as_str())]).await {
                    warn!(slot = %slot.id, error = %release_err, "Failed to release claimed slot");
                }
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::{MemoryClient, Operation};
    use crate::booking::error::StepError;
    use crate::booking::flow::{BookingFlow, Step};
    use serde_json::Value;
    use std::sync::Arc;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn slot_row(id: &str, date: &str, time: &str, available: bool) -> Value {
        json!({"id": id, "date": date, "time": time, "is_available": available})
    }

    fn remote_with_slots() -> Arc<MemoryClient> {
        Arc::new(MemoryClient::new().with_rows(
            "consultation_slots",
            vec![
                slot_row("past", "2026-10-10", "10:00", true),
                slot_row("s2", "2026-10-20", "15:00", true),
                slot_row("s1", "2026-10-20", "09:00", true),
                slot_row("taken", "2026-10-21", "09:00", false),
            ],
        ))
    }

    fn fill(flow: &mut BookingFlow<ConsultationBooking>) {
        flow.set_field(Field::Name, "Ana Silva");
        flow.set_field(Field::Email, "ana@example.com");
        flow.set_field(Field::Topic, "Commission payouts");
    }

    #[tokio::test]
    async fn test_load_options_filters_future_available_slots() {
        let remote = remote_with_slots();
        let mut flow = BookingFlow::new(ConsultationBooking, remote);

        let ids: Vec<String> = flow
            .load_options(today())
            .await
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_cannot_proceed_without_selection() {
        let mut flow = BookingFlow::new(ConsultationBooking, remote_with_slots());
        flow.load_options(today()).await.unwrap();

        assert!(!flow.can_proceed());
        assert_eq!(flow.proceed(), Err(StepError::NoSelection));
        assert_eq!(flow.step(), Step::Selection);
        assert!(matches!(flow.select("taken"), Err(StepError::UnknownOption(_))));

        flow.select("s1").unwrap();
        assert!(flow.can_proceed());
        flow.proceed().unwrap();
        assert_eq!(flow.step(), Step::Details);
    }

    #[tokio::test]
    async fn test_validation_happens_before_remote_calls() {
        let remote = remote_with_slots();
        let mut flow = BookingFlow::new(ConsultationBooking, remote.clone());
        flow.load_options(today()).await.unwrap();
        flow.select("s1").unwrap();
        flow.proceed().unwrap();
        flow.set_field(Field::Name, "Ana");
        flow.set_field(Field::Email, "ana@example.com");

        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, BookingError::MissingField(Field::Topic)));
        assert_eq!(flow.step(), Step::Details);
        assert_eq!(remote.calls("consultation_slots", Operation::Update), 0);
        assert_eq!(remote.calls("consultations", Operation::Insert), 0);
    }

    #[tokio::test]
    async fn test_successful_booking_claims_slot() {
        let remote = remote_with_slots();
        let mut flow = BookingFlow::new(ConsultationBooking, remote.clone());
        flow.load_options(today()).await.unwrap();
        flow.select("s1").unwrap();
        flow.proceed().unwrap();
        fill(&mut flow);

        let booking = flow.submit().await.unwrap().clone();
        assert_eq!(booking.status, ConsultationStatus::Pending);
        assert_eq!(booking.time, "09:00");
        assert_eq!(flow.step(), Step::Success);
        assert_eq!(flow.confirmation(), Some(&booking));

        // The slot no longer shows up
        flow.close().unwrap();
        let ids: Vec<String> = flow
            .load_options(today())
            .await
            .unwrap()
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(ids, vec!["s2"]);
    }

    #[tokio::test]
    async fn test_close_resets_form_and_selection() {
        let mut flow = BookingFlow::new(ConsultationBooking, remote_with_slots());
        flow.load_options(today()).await.unwrap();
        flow.select("s2").unwrap();
        flow.proceed().unwrap();
        fill(&mut flow);
        flow.submit().await.unwrap();

        assert!(flow.back().is_err());
        flow.close().unwrap();

        assert_eq!(flow.step(), Step::Selection);
        assert!(flow.selected().is_none());
        assert_eq!(flow.form(), &ContactForm::default());
        assert!(flow.confirmation().is_none());
    }

    #[tokio::test]
    async fn test_back_keeps_form() {
        let mut flow = BookingFlow::new(ConsultationBooking, remote_with_slots());
        flow.load_options(today()).await.unwrap();
        flow.select("s2").unwrap();
        flow.proceed().unwrap();
        fill(&mut flow);

        flow.back().unwrap();
        assert_eq!(flow.step(), Step::Selection);
        assert_eq!(flow.form().name, "Ana Silva");
        assert_eq!(flow.selected().map(|s| s.id.as_str()), Some("s2"));
        assert!(flow.close().is_err());
    }

    #[tokio::test]
    async fn test_slot_taken_after_selection() {
        let remote = remote_with_slots();
        let mut flow = BookingFlow::new(ConsultationBooking, remote.clone());
        flow.load_options(today()).await.unwrap();
        flow.select("s1").unwrap();
        flow.proceed().unwrap();
        fill(&mut flow);

        // Someone else claims it between selection and submit
        assert!(claim_slot(remote.as_ref(), "s1").await.unwrap());

        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, BookingError::SlotTaken(_)));
        assert_eq!(
            err.user_message(),
            "This time slot is no longer available. Please choose another."
        );
        assert_eq!(flow.step(), Step::Details);
        assert!(remote.rows("consultations").is_empty());
    }

    #[tokio::test]
    async fn test_failed_insert_releases_claim_and_allows_retry() {
        let remote = remote_with_slots();
        let mut flow = BookingFlow::new(ConsultationBooking, remote.clone());
        flow.load_options(today()).await.unwrap();
        flow.select("s1").unwrap();
        flow.proceed().unwrap();
        fill(&mut flow);

        remote.fail_next("consultations", "insert failed");
        let err = flow.submit().await.unwrap_err();
        assert!(matches!(err, BookingError::Remote(_)));
        assert_eq!(flow.step(), Step::Details);

        let slot = remote
            .rows("consultation_slots")
            .into_iter()
            .find(|r| r["id"] == "s1")
            .unwrap();
        assert_eq!(slot["is_available"], true);

        flow.submit().await.unwrap();
        assert_eq!(flow.step(), Step::Success);
    }

    #[tokio::test]
    async fn test_concurrent_bookings_cannot_share_a_slot() {
        let remote = remote_with_slots();
        let slot: ConsultationSlot = serde_json::from_value(slot_row("s1", "2026-10-20", "09:00", true)).unwrap();
        let form = ContactForm {
            name: "Ana".into(),
            email: "ana@example.com".into(),
            topic: "Payouts".into(),
            ..Default::default()
        };

        let (a, b) = tokio::join!(
            ConsultationBooking.book(remote.as_ref(), &slot, &form),
            ConsultationBooking.book(remote.as_ref(), &slot, &form),
        );

        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(remote.rows("consultations").len(), 1);
    }
}
