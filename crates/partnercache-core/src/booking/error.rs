use thiserror::Error;

use crate::api::ApiError;

use super::flow::Step;

/// Contact form fields that a flow may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Company,
    Topic,
    Message,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Name => write!(f, "name"),
            Field::Email => write!(f, "email"),
            Field::Company => write!(f, "company"),
            Field::Topic => write!(f, "topic"),
            Field::Message => write!(f, "message"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("Cannot {action} from the {current} step")]
    WrongStep { action: &'static str, current: Step },

    #[error("Select a time slot first")]
    NoSelection,

    #[error("Option {0} is not in the loaded list")]
    UnknownOption(String),
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error(transparent)]
    Step(#[from] StepError),

    #[error("Missing required field: {0}")]
    MissingField(Field),

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Slot {0} is no longer available")]
    SlotTaken(String),

    #[error("Already registered for session {0}")]
    Duplicate(String),

    #[error(transparent)]
    Remote(#[from] ApiError),
}

impl BookingError {
    /// Friendly text for end users; `Display` keeps the raw detail for admins.
    pub fn user_message(&self) -> String {
        match self {
            BookingError::Step(e) => e.to_string(),
            BookingError::MissingField(field) => format!("Please enter your {}.", field),
            BookingError::InvalidEmail(_) => "Please enter a valid email address.".to_string(),
            BookingError::SlotTaken(_) => {
                "This time slot is no longer available. Please choose another.".to_string()
            }
            BookingError::Duplicate(_) => {
                "You are already registered for this webinar session.".to_string()
            }
            BookingError::Remote(_) => {
                "Something went wrong while saving your booking. Please try again.".to_string()
            }
        }
    }
}
