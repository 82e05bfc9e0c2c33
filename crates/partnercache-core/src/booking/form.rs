use super::error::{BookingError, Field};

/// Contact details collected in the details step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub company: String,
    pub topic: String,
    pub message: String,
}

impl ContactForm {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Email => &self.email,
            Field::Company => &self.company,
            Field::Topic => &self.topic,
            Field::Message => &self.message,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        match field {
            Field::Name => self.name = value,
            Field::Email => self.email = value,
            Field::Company => self.company = value,
            Field::Topic => self.topic = value,
            Field::Message => self.message = value,
        }
    }

    /// Check `required` fields in order, then the email shape.
    pub fn validate(&self, required: &[Field]) -> Result<(), BookingError> {
        if let Some(field) = required.iter().find(|f| self.get(**f).trim().is_empty()) {
            return Err(BookingError::MissingField(*field));
        }
        let email = self.email.trim();
        if !email.is_empty() && !looks_like_email(email) {
            return Err(BookingError::InvalidEmail(email.to_string()));
        }
        Ok(())
    }

    /// Trimmed value, `None` when blank. For optional columns.
    pub fn optional(&self, field: Field) -> Option<String> {
        let value = self.get(field).trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    pub fn required(&self, field: Field) -> String {
        self.get(field).trim().to_string()
    }

    /// Emails are compared case-insensitively by the uniqueness constraint.
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_lowercase()
    }
}

/// `local@domain.tld`, no whitespace, one `@`.
fn looks_like_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, email: &str, topic: &str) -> ContactForm {
        ContactForm {
            name: name.into(),
            email: email.into(),
            topic: topic.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_required_fields_checked_in_order() {
        let required = [Field::Name, Field::Email, Field::Topic];
        assert!(matches!(
            form("", "", "").validate(&required),
            Err(BookingError::MissingField(Field::Name))
        ));
        assert!(matches!(
            form("Ana", "ana@example.com", "   ").validate(&required),
            Err(BookingError::MissingField(Field::Topic))
        ));
        assert!(form("Ana", "ana@example.com", "Payouts").validate(&required).is_ok());
        // Topic is optional for webinars
        assert!(form("Ana", "ana@example.com", "").validate(&[Field::Name, Field::Email]).is_ok());
    }

    #[test]
    fn test_email_shape() {
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("a@b"));
        assert!(!looks_like_email("@b.co"));
        assert!(!looks_like_email("a@@b.co"));
        assert!(!looks_like_email("a b@c.co"));
        assert!(matches!(
            form("Ana", "not-an-email", "x").validate(&[Field::Name, Field::Email]),
            Err(BookingError::InvalidEmail(_))
        ));
    }

    #[test]
    fn test_optional_and_normalized() {
        let mut f = form("Ana", "  Ana@Example.COM ", "x");
        f.set(Field::Company, "  ");
        assert_eq!(f.optional(Field::Company), None);
        f.set(Field::Company, " Acme ");
        assert_eq!(f.optional(Field::Company).as_deref(), Some("Acme"));
        assert_eq!(f.normalized_email(), "ana@example.com");
    }
}
