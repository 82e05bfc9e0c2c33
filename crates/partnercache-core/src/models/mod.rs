//! Typed records for the backend tables the dashboard reads and writes.
//!
//! - `Tutorial`, `MarketingMaterial`: paginated partner resources
//! - `PartnerProfile`: the signed-in partner's account row
//! - `ConsultationSlot`, `Consultation`: one-on-one consultation booking
//! - `WebinarSession`, `WebinarRegistration`: webinar sign-ups
//!
//! Rows are validated by deserialization at the client boundary; a row that
//! doesn't match its record shape is an error, never a silently patched value.

pub mod booking;
pub mod material;
pub mod partner;
pub mod tutorial;

pub use booking::{
    Consultation, ConsultationSlot, ConsultationStatus, NewConsultation, NewRegistration,
    RegistrationStatus, WebinarRegistration, WebinarSession,
};
pub use material::{MarketingMaterial, MaterialKind};
pub use partner::{PartnerProfile, PartnerStatus};
pub use tutorial::Tutorial;
