//! Consultation and webinar booking.
//!
//! Both flows run on the same three-step `BookingFlow`; the `BookingKind`
//! implementations decide what is listed and how a booking is written.
//! Consultations claim their slot with a conditional update before the
//! booking row is inserted, so a slot can only ever be held by one booking.

pub mod admin;
pub mod consultation;
pub mod error;
pub mod flow;
pub mod form;
pub mod webinar;

pub use admin::BookingAdmin;
pub use consultation::ConsultationBooking;
pub use error::{BookingError, Field, StepError};
pub use flow::{BookingFlow, BookingKind, Step};
pub use form::ContactForm;
pub use webinar::WebinarBooking;
