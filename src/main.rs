use clap::{Args as ClapArgs, Parser, Subcommand};
use color_eyre::Result;
use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;

use fieldwork::api::{ApiClient, DurationType, HttpTransport, PaymentType, Posting, StateCode};
use fieldwork::cache::{CacheSource, KvStore, NoopStore, ResourceLoader, SqliteStore};
use fieldwork::config::Config;
use fieldwork::fanout::{fetch_subresources, SubresourceStatus};
use fieldwork::feed::{
  available_payment_types, available_states, FilterLayer, FilterState, PageOutcome,
};
use fieldwork::logging;
use fieldwork::refresh::RefreshCoordinator;
use fieldwork::session::FeedSession;
use fieldwork::SyncError;

#[derive(Parser, Debug)]
#[command(name = "fieldwork")]
#[command(about = "Browse and apply to farm job postings")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/fieldwork/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Backend API url, overrides the config file
  #[arg(long, global = true)]
  url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List postings, newest first
  Feed(FeedArgs),
  /// Show one posting
  Posting {
    id: String,
    /// Bypass the cache
    #[arg(long)]
    refresh: bool,
  },
  /// Apply to a posting
  Apply { id: String },
  /// Drop every cached resource
  ClearCache,
}

#[derive(ClapArgs, Debug)]
struct FeedArgs {
  /// Number of pages to load
  #[arg(long, default_value_t = 1)]
  pages: u32,

  /// Bypass the cache for page 1
  #[arg(long)]
  refresh: bool,

  /// Only these payment types (repeatable)
  #[arg(long = "pay")]
  pay: Vec<PaymentType>,

  /// Only farms in these states (repeatable)
  #[arg(long = "state")]
  states: Vec<StateCode>,

  /// Only these durations (repeatable)
  #[arg(long = "duration")]
  durations: Vec<DurationType>,

  /// Case-insensitive title search
  #[arg(long)]
  search: Option<String>,

  /// Fetch applicant counts for the listed postings
  #[arg(long)]
  applicants: bool,
}

impl FeedArgs {
  fn filters(&self) -> FilterState {
    FilterState {
      compensation_types: self.pay.iter().copied().collect::<BTreeSet<_>>(),
      state_types: self.states.iter().cloned().collect(),
      duration_types: self.durations.iter().copied().collect(),
      search_term: self.search.clone().unwrap_or_default(),
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let config = Config::load_with_url(args.config.as_deref(), args.url.as_deref())?;

  let _guard = logging::init(&config.logging)?;

  let result = if config.cache.enabled {
    let store = match &config.cache.path {
      Some(path) => SqliteStore::open_at(path)?,
      None => SqliteStore::open()?,
    };
    run(args.command, &config, store).await
  } else {
    run(args.command, &config, NoopStore).await
  };

  if let Err(report) = &result {
    if report
      .downcast_ref::<SyncError>()
      .is_some_and(|e| e.is_retryable())
    {
      eprintln!("The backend looks temporarily unreachable, try again shortly.");
    }
  }
  result
}

async fn run<S: KvStore>(command: Command, config: &Config, store: S) -> Result<()> {
  let transport = HttpTransport::new(&config.api.url, Config::get_api_token(), config.timeout())?;
  let api = ApiClient::new(transport);
  let loader = ResourceLoader::new(store);

  if let Command::ClearCache = command {
    if loader.clear() {
      println!("Cache cleared");
    } else {
      println!("Cache could not be cleared, see log for details");
    }
    return Ok(());
  }

  let mut session = FeedSession::new(
    api.clone(),
    loader,
    RefreshCoordinator::new(),
    config.session_options(),
  );

  match command {
    Command::Feed(feed) => {
      if feed.refresh {
        session.refresh().await?;
      } else {
        session.activate().await?;
      }

      for _ in 1..feed.pages {
        match session.load_more().await? {
          PageOutcome::Exhausted | PageOutcome::Skipped => break,
          PageOutcome::Appended(_) | PageOutcome::Discarded => {}
        }
      }

      if let Some(e) = session.last_error() {
        eprintln!("Showing cached postings: {}", e);
      }

      session.set_filters(feed.filters());
      let visible = session.visible();

      let counts = if feed.applicants {
        let ids: Vec<String> = visible.iter().map(|p| p.id.clone()).collect();
        let report = fetch_subresources(ids, config.feed.fanout_concurrency, |id| {
          let api = api.clone();
          async move { api.applicant_count(&id).await }
        })
        .await;
        Some(report.values)
      } else {
        None
      };

      for posting in &visible {
        println!("{}", row(posting, counts.as_ref()));
      }

      let active = session.filters().active_layers();
      if !active.is_empty() {
        let labels: Vec<&str> = active.iter().map(FilterLayer::label).collect();
        println!("Filtered by {}", labels.join(", "));
      }
      if visible.is_empty() && !session.postings().is_empty() {
        println!("No postings match. Loaded postings have:");
        println!("  states: {}", join(&available_states(session.postings())));
        println!("  pay: {}", join(&available_payment_types(session.postings())));
      }

      let cursor = session.cursor();
      println!(
        "{} of {} postings shown, {}{}",
        visible.len(),
        session.postings().len(),
        source_label(session.first_page_source()),
        if cursor.exhausted { ", no more pages" } else { "" }
      );
    }
    Command::Posting { id, refresh } => {
      let result = session.posting(&id, refresh).await?;
      let posting = &result.data;
      let attrs = &posting.attributes;

      println!("{} ({})", attrs.title, posting.id);
      println!("{}, {} {}", attrs.farm_name, attrs.farm_city, attrs.farm_state);
      println!("{} / {}", attrs.payment_type, attrs.duration);
      if let Some(salary) = attrs.salary {
        println!("Pay: {:.2}", salary);
      }
      if !attrs.skill_requirements.is_empty() {
        let skills: Vec<&str> = attrs.skill_requirements.iter().map(String::as_str).collect();
        println!("Skills: {}", skills.join(", "));
      }
      println!("Posted {}", posting.created_at.format("%Y-%m-%d"));
      if !attrs.description.is_empty() {
        println!();
        println!("{}", attrs.description);
      }
      println!();
      println!("({})", source_label(Some(result.source)));
    }
    Command::Apply { id } => {
      session.apply(&id).await?;
      session.settle().await;
      match session.applicants(&id) {
        SubresourceStatus::Ready(count) => println!("Applied to {} ({} applicants)", id, count),
        _ => println!("Applied to {} (applicant count unavailable)", id),
      }
    }
    Command::ClearCache => {}
  }

  Ok(())
}

fn row(posting: &Posting, counts: Option<&HashMap<String, u64>>) -> String {
  let attrs = &posting.attributes;
  let mut line = format!(
    "{:>6}  {:<32}  {:<24}  {:<3}  {:<10}  {:<10}  {}",
    posting.id,
    truncate(&attrs.title, 32),
    truncate(&attrs.farm_name, 24),
    attrs.farm_state,
    attrs.payment_type,
    attrs.duration,
    posting.created_at.format("%Y-%m-%d"),
  );
  if let Some(counts) = counts {
    // Unknown is not zero
    match counts.get(&posting.id) {
      Some(count) => line.push_str(&format!("  {:>4}", count)),
      None => line.push_str("     ?"),
    }
  }
  line
}

fn join<T: std::fmt::Display>(values: &[T]) -> String {
  values.iter().map(T::to_string).collect::<Vec<_>>().join(", ")
}

fn truncate(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
  }
}

fn source_label(source: Option<CacheSource>) -> &'static str {
  match source {
    Some(CacheSource::Network) => "fresh from network",
    Some(CacheSource::Cache) => "from cache",
    Some(CacheSource::Stale) => "from stale cache",
    None => "nothing loaded",
  }
}
