//! The linear booking state machine shared by consultations and webinars.
//!
//! ```text
//! Selection ──proceed──▶ Details ──submit──▶ Success
//!     ▲                    │                    │
//!     └──────back──────────┘                    │
//!     └──────────────────close──────────────────┘
//! ```
//!
//! `proceed` needs a selected option and `submit` needs a successful create.
//! `close` is the only way out of `Success` and the only transition that
//! clears the form.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{error, info, warn};

use crate::api::{ApiError, RemoteClient};

use super::error::{BookingError, Field, StepError};
use super::form::ContactForm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Selection,
    Details,
    Success,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Selection => write!(f, "selection"),
            Step::Details => write!(f, "details"),
            Step::Success => write!(f, "success"),
        }
    }
}

/// What a concrete flow books and how.
#[async_trait]
pub trait BookingKind: Send + Sync {
    /// A bookable thing shown in the selection step (a slot, a session)
    type Choice: Clone + Send + Sync + std::fmt::Debug;
    /// The record created on success
    type Booking: Clone + Send + Sync + std::fmt::Debug;

    /// Contact fields that must be filled before submitting.
    const REQUIRED: &'static [Field];

    fn option_id(option: &Self::Choice) -> &str;

    /// Options open for booking on or after `today`.
    async fn load_options(
        &self,
        remote: &dyn RemoteClient,
        today: NaiveDate,
    ) -> Result<Vec<Self::Choice>, ApiError>;

    /// Create the booking for an already validated form.
    async fn book(
        &self,
        remote: &dyn RemoteClient,
        option: &Self::Choice,
        form: &ContactForm,
    ) -> Result<Self::Booking, BookingError>;
}

pub struct BookingFlow<K: BookingKind> {
    kind: K,
    remote: Arc<dyn RemoteClient>,
    step: Step,
    options: Vec<K::Choice>,
    selected: Option<K::Choice>,
    form: ContactForm,
    confirmation: Option<K::Booking>,
}

impl<K: BookingKind> BookingFlow<K> {
    pub fn new(kind: K, remote: Arc<dyn RemoteClient>) -> Self {
        Self {
            kind,
            remote,
            step: Step::Selection,
            options: Vec::new(),
            selected: None,
            form: ContactForm::default(),
            confirmation: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn options(&self) -> &[K::Choice] {
        &self.options
    }

    pub fn selected(&self) -> Option<&K::Choice> {
        self.selected.as_ref()
    }

    pub fn form(&self) -> &ContactForm {
        &self.form
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) {
        self.form.set(field, value);
    }

    /// The booking created by the last successful submit, while in `Success`.
    pub fn confirmation(&self) -> Option<&K::Booking> {
        self.confirmation.as_ref()
    }

    pub fn can_proceed(&self) -> bool {
        self.step == Step::Selection && self.selected.is_some()
    }

    fn expect_step(&self, expected: Step, action: &'static str) -> Result<(), StepError> {
        if self.step == expected {
            Ok(())
        } else {
            Err(StepError::WrongStep {
                action,
                current: self.step,
            })
        }
    }

    /// Refresh the bookable options. A selection that disappeared is dropped.
    pub async fn load_options(&mut self, today: NaiveDate) -> Result<&[K::Choice], BookingError> {
        self.expect_step(Step::Selection, "load options")?;

        match self.kind.load_options(self.remote.as_ref(), today).await {
            Ok(options) => {
                if let Some(selected) = &self.selected {
                    let id = K::option_id(selected);
                    if !options.iter().any(|o| K::option_id(o) == id) {
                        self.selected = None;
                    }
                }
                self.options = options;
                Ok(&self.options)
            }
            Err(e) => {
                warn!(error = %e, "Failed to load booking options");
                self.options.clear();
                self.selected = None;
                Err(e.into())
            }
        }
    }

    /// Pick one of the loaded options by id.
    pub fn select(&mut self, id: &str) -> Result<&K::Choice, StepError> {
        self.expect_step(Step::Selection, "select")?;
        let option = self
            .options
            .iter()
            .find(|o| K::option_id(o) == id)
            .cloned()
            .ok_or_else(|| StepError::UnknownOption(id.to_string()))?;
        Ok(&*self.selected.insert(option))
    }

    pub fn proceed(&mut self) -> Result<(), StepError> {
        self.expect_step(Step::Selection, "continue")?;
        if self.selected.is_none() {
            return Err(StepError::NoSelection);
        }
        self.step = Step::Details;
        Ok(())
    }

    /// Return to selection, keeping the form and the current choice.
    pub fn back(&mut self) -> Result<(), StepError> {
        self.expect_step(Step::Details, "go back")?;
        self.step = Step::Selection;
        Ok(())
    }

    /// Validate and create the booking. Errors leave the flow in `Details`.
    pub async fn submit(&mut self) -> Result<&K::Booking, BookingError> {
        self.expect_step(Step::Details, "submit")?;
        let option = self.selected.clone().ok_or(StepError::NoSelection)?;
        self.form.validate(K::REQUIRED)?;

        match self.kind.book(self.remote.as_ref(), &option, &self.form).await {
            Ok(booking) => {
                info!(option = K::option_id(&option), "Booking created");
                self.step = Step::Success;
                Ok(&*self.confirmation.insert(booking))
            }
            Err(e) => {
                match &e {
                    BookingError::Remote(_) => error!(option = K::option_id(&option), error = %e, "Booking failed"),
                    _ => warn!(option = K::option_id(&option), error = %e, "Booking rejected"),
                }
                Err(e)
            }
        }
    }

    /// Leave `Success`, clearing the selection and every form field.
    pub fn close(&mut self) -> Result<(), StepError> {
        self.expect_step(Step::Success, "close")?;
        self.step = Step::Selection;
        self.selected = None;
        self.form = ContactForm::default();
        self.confirmation = None;
        Ok(())
    }
}
