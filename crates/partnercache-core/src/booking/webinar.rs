use async_trait::async_trait;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use crate::api::{fetch_records, insert_record, ApiError, Filter, Query, Record, RemoteClient};
use crate::models::{NewRegistration, RegistrationStatus, WebinarRegistration, WebinarSession};

use super::error::{BookingError, Field};
use super::flow::BookingKind;
use super::form::ContactForm;

const MAX_SESSIONS: usize = 100;
/// Seat-count lookups in flight at once.
const MAX_CONCURRENT_COUNTS: usize = 5;

/// Webinar session registrations.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebinarBooking;

/// Registrations that still take a seat (everything but cancelled).
pub async fn seats_taken(remote: &dyn RemoteClient, session_id: &str) -> Result<usize, ApiError> {
    let query = Query::table(WebinarRegistration::TABLE)
        .filter(Filter::eq("session_id", session_id))
        .filter(Filter::neq("status", "cancelled"))
        .range(0, 1)
        .with_count();
    let page = remote.query(&query).await?;
    Ok(page.total.unwrap_or(page.rows.len()))
}

#[async_trait]
impl BookingKind for WebinarBooking {
    type Choice = WebinarSession;
    type Booking = WebinarRegistration;

    const REQUIRED: &'static [Field] = &[Field::Name, Field::Email];

    fn option_id(option: &WebinarSession) -> &str {
        &option.id
    }

    /// Active upcoming sessions, minus the ones with no seats left.
    async fn load_options(
        &self,
        remote: &dyn RemoteClient,
        today: NaiveDate,
    ) -> Result<Vec<WebinarSession>, ApiError> {
        let query = Query::table(WebinarSession::TABLE)
            .filter(Filter::eq("is_active", true))
            .filter(Filter::gte("date", today.to_string()))
            .order_asc("date")
            .order_asc("time")
            .range(0, MAX_SESSIONS);
        let (sessions, _) = fetch_records::<WebinarSession>(remote, &query).await?;

        let open: Vec<Option<WebinarSession>> = stream::iter(sessions)
            .map(|session| async move {
                let Some(limit) = session.max_participants else {
                    return Some(session);
                };
                match seats_taken(remote, &session.id).await {
                    Ok(taken) if taken >= limit.max(0) as usize => {
                        debug!(session = %session.id, taken, limit, "Webinar session full");
                        None
                    }
                    Ok(_) => Some(session),
                    Err(e) => {
                        warn!(session = %session.id, error = %e, "Failed to count registrations");
                        Some(session)
                    }
                }
            })
            .buffered(MAX_CONCURRENT_COUNTS)
            .collect()
            .await;

        Ok(open.into_iter().flatten().collect())
    }

    async fn book(
        &self,
        remote: &dyn RemoteClient,
        session: &WebinarSession,
        form: &ContactForm,
    ) -> Result<WebinarRegistration, BookingError> {
        let payload = NewRegistration {
            session_id: session.id.clone(),
            name: form.required(Field::Name),
            email: form.normalized_email(),
            company: form.optional(Field::Company),
            status: RegistrationStatus::Confirmed,
        };

        insert_record::<WebinarRegistration, _>(remote, &payload)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    BookingError::Duplicate(session.id.clone())
                } else {
                    e.into()
                }
            })
    }
}
