use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::NaiveDate;
use tracing::debug;

use partnercache_core::api::{RemoteClient, RestClient};
use partnercache_core::booking::{
    BookingAdmin, BookingFlow, BookingKind, ConsultationBooking, WebinarBooking,
};
use partnercache_core::cache::{
    load_partner_profile, CacheAges, Collection, CollectionFilter, CollectionLoader, FileStore,
    InitialLoad, SnapshotCache,
};
use partnercache_core::models::{MarketingMaterial, Tutorial};
use partnercache_core::Config;

use crate::args::{Command, FormOptions, ListOptions};

pub struct Context {
    config: Config,
    cache: SnapshotCache,
}

impl Context {
    pub fn new(config: Config) -> Result<Self> {
        let dir = config.cache_dir()?;
        let store = FileStore::new(dir, config.cache_quota_bytes)
            .context("Failed to open cache directory")?;
        Ok(Self {
            config,
            cache: SnapshotCache::new(Arc::new(store)),
        })
    }

    /// Backend client; only commands that talk to the backend need a valid config.
    fn remote(&self) -> Result<Arc<dyn RemoteClient>> {
        self.config.validate()?;
        let (Some(url), Some(key)) = (&self.config.backend_url, &self.config.anon_key) else {
            bail!("Backend URL and anon key must be configured");
        };
        let client = RestClient::new(url, key)?;
        let client = match &self.config.access_token {
            Some(token) => client.with_token(token.as_str()),
            None => client,
        };
        Ok(Arc::new(client))
    }

    fn loader<T: Collection>(&self) -> Result<CollectionLoader<T>> {
        Ok(CollectionLoader::new(self.remote()?, self.cache.clone())
            .with_page_size(self.config.page_size)
            .with_fetch_timeout(self.config.fetch_timeout()))
    }
}

pub async fn run(ctx: &Context, command: Command) -> Result<()> {
    match command {
        Command::Tutorials { search, category, list } => {
            let mut filter = CollectionFilter::default();
            if let Some(term) = search {
                filter = filter.search(term);
            }
            if let Some(category) = category {
                filter = filter.category(category);
            }
            list_collection::<Tutorial>(ctx, filter, &list, tutorial_line).await
        }
        Command::Materials { search, kind, list } => {
            let mut filter = CollectionFilter::default();
            if let Some(term) = search {
                filter = filter.search(term);
            }
            if let Some(kind) = kind {
                filter = filter.kind(kind);
            }
            list_collection::<MarketingMaterial>(ctx, filter, &list, material_line).await
        }
        Command::Profile { user_id, json } => show_profile(ctx, &user_id, json).await,
        Command::Slots => {
            list_options(ctx, ConsultationBooking, |slot| format!("{}  {}", slot.id, slot.label())).await
        }
        Command::Sessions => {
            list_options(ctx, WebinarBooking, |session| {
                let seats = session
                    .max_participants
                    .map(|max| format!(" ({} seats)", max))
                    .unwrap_or_default();
                format!("{}  {}{}", session.id, session.label(), seats)
            })
            .await
        }
        Command::Book { slot_id, form } => {
            let booking = book(ctx, ConsultationBooking, &slot_id, &form).await?;
            println!(
                "Consultation requested for {} at {} (status: {:?}). We'll confirm by email at {}.",
                booking.date, booking.time, booking.status, booking.email
            );
            Ok(())
        }
        Command::Register { session_id, form } => {
            let registration = book(ctx, WebinarBooking, &session_id, &form).await?;
            println!(
                "Registered {} for session {} (registration {}).",
                registration.email, registration.session_id, registration.id
            );
            Ok(())
        }
        Command::SetConsultationStatus { id, status } => {
            let updated = BookingAdmin::new(ctx.remote()?)
                .set_consultation_status(&id, status)
                .await?;
            println!("Consultation {} is now {:?}", updated.id, updated.status);
            Ok(())
        }
        Command::SetRegistrationStatus { id, status } => {
            let updated = BookingAdmin::new(ctx.remote()?)
                .set_registration_status(&id, status)
                .await?;
            println!("Registration {} is now {:?}", updated.id, updated.status);
            Ok(())
        }
        Command::DeleteConsultation { id } => {
            BookingAdmin::new(ctx.remote()?).delete_consultation(&id).await?;
            println!("Deleted consultation {}", id);
            Ok(())
        }
        Command::DeleteRegistration { id } => {
            BookingAdmin::new(ctx.remote()?).delete_registration(&id).await?;
            println!("Deleted registration {}", id);
            Ok(())
        }
        Command::CacheStatus => {
            let ages = ctx.cache.ages();
            println!("Partner profile:      {}", CacheAges::display(&ages.partner_data));
            println!("Tutorials:            {}", CacheAges::display(&ages.tutorials));
            println!("Marketing materials:  {}", CacheAges::display(&ages.marketing_materials));
            println!("Last updated:         {}", ages.last_updated());
            Ok(())
        }
        Command::ClearCache => {
            ctx.cache.clear_all();
            println!("Cache cleared");
            Ok(())
        }
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

// ============================================================================
// Resources
// ============================================================================

async fn list_collection<T: Collection>(
    ctx: &Context,
    filter: CollectionFilter,
    options: &ListOptions,
    line: fn(&T) -> String,
) -> Result<()> {
    let mut loader = ctx.loader::<T>()?;
    if options.refresh {
        loader.invalidate();
    }

    if filter.is_default() {
        match loader.load_initial() {
            InitialLoad::Fresh => debug!(table = T::TABLE, "Serving fresh snapshot"),
            InitialLoad::Stale => eprintln!("Showing cached data while refreshing..."),
            InitialLoad::Missing => {}
        }
    } else {
        loader.set_filter(filter);
    }
    loader.settle().await;

    for _ in 1..options.pages {
        if !loader.load_more() {
            break;
        }
        loader.settle().await;
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(loader.items())?);
        return Ok(());
    }

    if loader.items().is_empty() {
        println!("Nothing found.");
        return Ok(());
    }
    for item in loader.items() {
        println!("{}", line(item));
    }
    if loader.has_more() {
        println!("... more available (use --pages {})", loader.cursor().page + 1);
    }
    Ok(())
}

fn tutorial_line(tutorial: &Tutorial) -> String {
    let duration = tutorial
        .duration
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default();
    let video = if tutorial.has_video() { "" } else { " [no video]" };
    format!(
        "{}  [{}] {}{}{}",
        tutorial.id,
        tutorial.category_display(),
        tutorial.title,
        duration,
        video
    )
}

fn material_line(material: &MarketingMaterial) -> String {
    let dimensions = material
        .dimensions
        .as_deref()
        .map(|d| format!(" {}", d))
        .unwrap_or_default();
    format!("{}  [{}{}] {}", material.id, material.kind, dimensions, material.title)
}

async fn show_profile(ctx: &Context, user_id: &str, json: bool) -> Result<()> {
    let remote = ctx.remote()?;
    let Some(profile) = load_partner_profile(remote.as_ref(), &ctx.cache, user_id).await? else {
        println!("No partner profile for user {}", user_id);
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
        return Ok(());
    }

    println!("{} <{}>", profile.full_name, profile.email);
    if let Some(company) = &profile.company {
        println!("Company:        {}", company);
    }
    println!("Status:         {:?}", profile.status);
    println!("Commission:     {}", profile.commission_display());
    if let Some(code) = &profile.referral_code {
        println!("Referral code:  {}", code);
    }
    Ok(())
}

// ============================================================================
// Bookings
// ============================================================================

async fn list_options<K: BookingKind>(
    ctx: &Context,
    kind: K,
    line: impl Fn(&K::Choice) -> String,
) -> Result<()> {
    let mut flow = BookingFlow::new(kind, ctx.remote()?);
    let options = flow
        .load_options(today())
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if options.is_empty() {
        println!("Nothing available right now.");
    }
    for option in options {
        println!("{}", line(option));
    }
    Ok(())
}

/// Walk one flow from selection to success using the `--<field>` options.
async fn book<K: BookingKind>(
    ctx: &Context,
    kind: K,
    option_id: &str,
    form: &FormOptions,
) -> Result<K::Booking> {
    let mut flow = BookingFlow::new(kind, ctx.remote()?);
    flow.load_options(today())
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    flow.select(option_id)
        .map_err(|_| anyhow!("{} is not available for booking", option_id))?;
    flow.proceed()?;

    for (field, value) in form.fields() {
        flow.set_field(field, value);
    }

    match flow.submit().await {
        Ok(booking) => Ok(booking.clone()),
        Err(e) => Err(anyhow!(e.user_message())),
    }
}
