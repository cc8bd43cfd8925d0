use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use streaming_analytics_api::{
    config::{self, CLI_LOG_FILTER, DEFAULT_DATA_PATH},
    loader::DatasetCache,
    overview, shows, users, FilterQuery,
};

#[derive(Parser)]
#[command(name = "streamstats")]
#[command(about = "streaming viewership analytics CLI", long_about = None)]
struct Cli {
    /// Path to the viewing-event JSON file
    #[arg(long, env = "STREAMING_DATA_PATH", default_value = DEFAULT_DATA_PATH, global = true)]
    data: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct EventFilterArgs {
    /// First day to include (YYYY-MM-DD); alone, selects that single day
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Comma-separated states; an empty value matches nothing
    #[arg(long)]
    states: Option<String>,

    /// Comma-separated genres
    #[arg(long)]
    genres: Option<String>,

    /// Comma-separated show types
    #[arg(long)]
    show_types: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print headline numbers and the filter options in the dataset
    Summary,

    /// Overview dashboard report as JSON
    Overview {
        #[command(flatten)]
        filters: EventFilterArgs,
    },

    /// Detailed show analysis as JSON
    Shows {
        #[command(flatten)]
        filters: EventFilterArgs,

        /// Narrow the analysis to one show
        #[arg(long)]
        show: Option<String>,
    },

    /// User behaviour report as JSON
    Users {
        #[command(flatten)]
        filters: EventFilterArgs,

        /// Minimum views per user
        #[arg(long)]
        min_views: Option<u64>,

        /// Lower bound on a user's average completion rate (%)
        #[arg(long)]
        min_completion: Option<f64>,

        /// Upper bound on a user's average completion rate (%)
        #[arg(long)]
        max_completion: Option<f64>,

        /// Minimum total watch hours per user
        #[arg(long)]
        min_watch_hours: Option<f64>,
    },
}

impl EventFilterArgs {
    fn into_query(self) -> FilterQuery {
        FilterQuery {
            start: self.start,
            end: self.end,
            states: self.states,
            genres: self.genres,
            show_types: self.show_types,
            ..FilterQuery::default()
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(config::log_filter(CLI_LOG_FILTER))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cache = DatasetCache::new(&cli.data);
    let dataset = cache
        .get()
        .with_context(|| format!("Failed to load dataset from {}", cli.data.display()))?;
    let table = dataset.table();

    match cli.command {
        Commands::Summary => {
            let meta = dataset.metadata();
            let metrics = overview::overview_metrics(table);

            println!("dataset: {}", cli.data.display());
            println!("  records: {}", meta.record_count);
            if let (Some(min), Some(max)) = (meta.min_date, meta.max_date) {
                println!("  dates: {} to {}", min, max);
            }
            println!("  unique users: {}", metrics.unique_users);
            match metrics.avg_completion_rate {
                Some(rate) => println!("  avg completion: {:.1}%", rate),
                None => println!("  avg completion: N/A"),
            }
            println!("  total watch hours: {:.0}", metrics.total_watch_hours);
            println!("  states: {}", meta.states.join(", "));
            println!("  genres: {}", meta.genres.join(", "));
            println!("  show types: {}", meta.show_types.join(", "));
            println!("  shows: {}", meta.show_names.len());
            Ok(())
        }
        Commands::Overview { filters } => {
            let filtered = filters.into_query().filter_set().apply(table);
            tracing::info!("{} of {} events after filters", filtered.len(), table.len());
            print_json(&overview::calculate_overview(&filtered))
        }
        Commands::Shows { filters, show } => {
            if let Some(name) = &show {
                if !dataset.metadata().show_names.contains(name) {
                    anyhow::bail!("unknown show '{}'", name);
                }
            }
            let filtered = filters.into_query().filter_set().apply(table);
            tracing::info!("{} of {} events after filters", filtered.len(), table.len());
            print_json(&shows::calculate_shows(&filtered, show.as_deref()))
        }
        Commands::Users {
            filters,
            min_views,
            min_completion,
            max_completion,
            min_watch_hours,
        } => {
            let query = FilterQuery {
                min_views,
                min_completion,
                max_completion,
                min_watch_hours,
                ..filters.into_query()
            };
            let filtered = query.filter_set().apply(table);
            tracing::info!("{} of {} events after filters", filtered.len(), table.len());
            print_json(&users::calculate_users(&filtered, &query.user_filters()))
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}
