use clap::{Args, Parser, Subcommand};

use partnercache_core::booking::Field;
use partnercache_core::models::{ConsultationStatus, RegistrationStatus};

/// Partner dashboard data from the command line.
///
/// Configuration is read from ~/.config/partnercache/config.json and the
/// PARTNERCACHE_BACKEND_URL, PARTNERCACHE_ANON_KEY and PARTNERCACHE_ACCESS_TOKEN
/// environment variables. RUST_LOG controls log output.
#[derive(Debug, Parser)]
#[command(name = "partnercache", author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List tutorials
    Tutorials {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[command(flatten)]
        list: ListOptions,
    },
    /// List marketing materials
    Materials {
        #[arg(long)]
        search: Option<String>,
        /// Material type, e.g. banner or logo
        #[arg(long = "type")]
        kind: Option<String>,
        #[command(flatten)]
        list: ListOptions,
    },
    /// Show the partner profile for a user
    Profile {
        user_id: String,
        #[arg(long)]
        json: bool,
    },
    /// List open consultation slots
    Slots,
    /// Book a consultation slot
    Book {
        slot_id: String,
        #[command(flatten)]
        form: FormOptions,
    },
    /// List upcoming webinar sessions
    Sessions,
    /// Register for a webinar session
    Register {
        session_id: String,
        #[command(flatten)]
        form: FormOptions,
    },
    SetConsultationStatus {
        id: String,
        /// pending, confirmed, cancelled or completed
        status: ConsultationStatus,
    },
    SetRegistrationStatus {
        id: String,
        /// confirmed, cancelled, attended or no-show
        status: RegistrationStatus,
    },
    DeleteConsultation { id: String },
    DeleteRegistration { id: String },
    /// Show the age of each cached snapshot
    CacheStatus,
    ClearCache,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Tutorials { .. } => "tutorials",
            Command::Materials { .. } => "materials",
            Command::Profile { .. } => "profile",
            Command::Slots => "slots",
            Command::Book { .. } => "book",
            Command::Sessions => "sessions",
            Command::Register { .. } => "register",
            Command::SetConsultationStatus { .. } => "set-consultation-status",
            Command::SetRegistrationStatus { .. } => "set-registration-status",
            Command::DeleteConsultation { .. } => "delete-consultation",
            Command::DeleteRegistration { .. } => "delete-registration",
            Command::CacheStatus => "cache-status",
            Command::ClearCache => "clear-cache",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ListOptions {
    /// Number of pages to load
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    pub pages: u32,
    /// Ignore cached snapshots
    #[arg(long)]
    pub refresh: bool,
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FormOptions {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub company: Option<String>,
    #[arg(long)]
    pub topic: Option<String>,
    #[arg(long)]
    pub message: Option<String>,
}

impl FormOptions {
    /// The fields that were given, in form order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> {
        [
            (Field::Name, &self.name),
            (Field::Email, &self.email),
            (Field::Company, &self.company),
            (Field::Topic, &self.topic),
            (Field::Message, &self.message),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("partnercache").chain(line.split_whitespace()))
    }

    #[test]
    fn test_parse_booking_form() {
        let cli = parse("book s1 --name Ana --email=ana@example.com --topic Payouts").unwrap();
        let Command::Book { slot_id, form } = cli.command else {
            panic!("expected book");
        };
        assert_eq!(slot_id, "s1");
        let fields: Vec<_> = form.fields().collect();
        assert_eq!(
            fields,
            vec![
                (Field::Name, "Ana"),
                (Field::Email, "ana@example.com"),
                (Field::Topic, "Payouts"),
            ]
        );
    }

    #[test]
    fn test_missing_values_are_rejected() {
        assert!(parse("tutorials --search").is_err());
        assert!(parse("book").is_err());
        assert!(parse("frobnicate").is_err());
    }

    #[test]
    fn test_pages() {
        let pages = |line: &str| match parse(line).map(|cli| cli.command) {
            Ok(Command::Tutorials { list, .. }) => Some(list.pages),
            _ => None,
        };
        assert_eq!(pages("tutorials"), Some(1));
        assert_eq!(pages("tutorials --pages 3"), Some(3));
        assert_eq!(pages("tutorials --pages 0"), None);
        assert_eq!(pages("tutorials --pages x"), None);
    }

    #[test]
    fn test_materials_type_and_flags() {
        let cli = parse("materials --type banner --refresh --json").unwrap();
        let Command::Materials { kind, list, search } = cli.command else {
            panic!("expected materials");
        };
        assert_eq!(kind.as_deref(), Some("banner"));
        assert!(search.is_none());
        assert!(list.refresh && list.json);
    }

    #[test]
    fn test_status_is_parsed() {
        let cli = parse("set-consultation-status c1 cancelled").unwrap();
        assert_eq!(cli.command.name(), "set-consultation-status");
        assert!(matches!(
            cli.command,
            Command::SetConsultationStatus { status: ConsultationStatus::Cancelled, .. }
        ));
        assert!(parse("set-registration-status r1 lost").is_err());
    }

    #[test]
    fn test_command_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
