//! CLI entry point for the COE trends service.
//!
//! Provides subcommands for serving the REST API, running the dataset
//! updater once or on a schedule, computing PQP rates from a CSV, publishing
//! summaries and exporting to S3.

use anyhow::{Context, Result};
use chrono::FixedOffset;
use clap::{Parser, Subcommand, ValueEnum};
use coe_trends::analyzers::export::export;
use coe_trends::analyzers::pqp::{PqpConfig, get_pqp_rates_with};
use coe_trends::api::{self, shutdown_signal, state::AppState};
use coe_trends::config::Config;
use coe_trends::fetch::auth::ApiKey;
use coe_trends::fetch::{BasicClient, HttpClient, fetch_source};
use coe_trends::infra::discord::client::DiscordWebhook;
use coe_trends::infra::keys::{SecretRefs, SsmKeyStore};
use coe_trends::infra::linkedin::client::LinkedInClient;
use coe_trends::output::print_json;
use coe_trends::parser::{parse_csv, validate_coe};
use coe_trends::services::Platform;
use coe_trends::store::DataStore;
use coe_trends::types::{Coe, Table};
use coe_trends::updater::schedule::{DEFAULT_CRON, Schedule, run_scheduled};
use coe_trends::updater::tasks::{CarsTask, CoeTask};
use coe_trends::updater::workflow::{build_post, run_workflow};
use coe_trends::updater::{Task, TaskContext, UpdateLog};
use std::ffi::OsStr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "coe_trends")]
#[command(about = "Vehicle registration and COE bidding data service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum TableArg {
    Cars,
    Coe,
}

impl From<TableArg> for Table {
    fn from(arg: TableArg) -> Self {
        match arg {
            TableArg::Cars => Table::Cars,
            TableArg::Coe => Table::Coe,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the updater once and publish summaries of new data
    Update {
        /// COE dataset file or URL (overrides COE_DATASET_URL)
        #[arg(long)]
        coe: Option<String>,

        /// Car registrations dataset file or URL (overrides CARS_DATASET_URL)
        #[arg(long)]
        cars: Option<String>,

        /// Update the store without posting to social media
        #[arg(long, default_value_t = false)]
        no_publish: bool,
    },
    /// Run the updater on a weekday schedule
    Schedule {
        /// Cron expression: minute hour day-of-month month day-of-week
        #[arg(long, default_value = DEFAULT_CRON)]
        cron: String,

        /// Hours east of UTC the cron expression is evaluated in
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        utc_offset: i32,

        /// Run even when APP_ENV is not prod
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Compute PQP rates from a COE results CSV file or URL
    Pqp {
        #[arg(value_name = "FILE_OR_URL")]
        source: String,

        /// Number of bidding months averaged into each rate
        #[arg(short, long, default_value_t = 3)]
        window: usize,
    },
    /// Publish the current summary of a table to the configured platforms
    Post {
        #[arg(value_enum)]
        table: TableArg,
    },
    /// Upload PQP rates and table snapshots to S3
    Export {
        /// S3 bucket (overrides S3_BUCKET)
        #[arg(long)]
        s3_bucket: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/coe_trends.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("coe_trends.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        );

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(
            EnvFilter::try_from_env("RUST_LOG_JSON").unwrap_or_else(|_| EnvFilter::new("debug")),
        );

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(path) = config.secrets_file.clone() {
        let refs = SecretRefs::load(&path)?;
        let aws = aws_config::load_from_env().await;
        config.resolve_secrets(&refs, &SsmKeyStore::new(&aws)).await?;
    }
    config.log_summary();

    match cli.command {
        Commands::Serve { port } => {
            let api_token = config.require_api_token()?.to_string();
            let ctx = open_context(&config)?;
            let state = AppState::new(ctx.store, ctx.update_log, api_token);
            api::serve(
                state,
                port.unwrap_or(config.port),
                config.cors_origin.as_deref(),
            )
            .await?;
        }
        Commands::Update {
            coe,
            cars,
            no_publish,
        } => {
            let ctx = open_context(&config)?;
            let tasks = build_tasks(&config, coe, cars)?;
            let platforms = if no_publish {
                Vec::new()
            } else {
                build_platforms(&config)?
            };

            let outcome = run_workflow(&ctx, &tasks, &platforms, &config.site_url).await?;
            print_json(&outcome)?;
        }
        Commands::Schedule {
            cron,
            utc_offset,
            force,
        } => {
            if !config.is_prod() && !force {
                warn!(
                    stage = %config.stage,
                    "Scheduler only runs in prod, pass --force to override"
                );
                return Ok(());
            }

            let offset = FixedOffset::east_opt(utc_offset * 3600)
                .with_context(|| format!("Invalid UTC offset {utc_offset}"))?;
            let schedule = cron.parse::<Schedule>()?.with_offset(offset);

            let ctx = open_context(&config)?;
            let tasks = build_tasks(&config, None, None)?;
            let platforms = build_platforms(&config)?;

            info!(cron = %cron, utc_offset, "Scheduler started");
            let (ctx, tasks, platforms, site_url) =
                (&ctx, &tasks, &platforms, config.site_url.as_str());
            run_scheduled(
                &schedule,
                move || async move {
                    let outcome = run_workflow(ctx, tasks, platforms, site_url).await?;
                    info!(message = %outcome.message, "Scheduled run finished");
                    Ok(())
                },
                shutdown_signal(),
            )
            .await;
        }
        Commands::Pqp { source, window } => {
            let bytes = fetch_source(&BasicClient::new(), &source).await?;
            let records: Vec<Coe> = parse_csv(&bytes)?;
            validate_coe(&records)?;

            let rates = get_pqp_rates_with(&records, &PqpConfig::new(window)?);
            print_json(&rates)?;
        }
        Commands::Post { table } => {
            let ctx = open_context(&config)?;
            let platforms = build_platforms(&config)?;
            if platforms.is_empty() {
                warn!("No platforms configured, nothing to post");
                return Ok(());
            }

            let table = Table::from(table);
            let Some(post) = build_post(&ctx, table, &config.site_url).await else {
                warn!(%table, "No data stored, nothing to post");
                return Ok(());
            };

            for platform in &platforms {
                match platform.publish(&post).await {
                    Ok(id) => info!(platform = platform.name(), id = %id, "Published"),
                    Err(e) => error!(platform = platform.name(), error = %e, "Publishing failed"),
                }
            }
        }
        Commands::Export { s3_bucket } => {
            let Some(bucket) = s3_bucket.or(config.s3_bucket.clone()) else {
                info!("S3 bucket not specified, skipping export");
                return Ok(());
            };

            let ctx = open_context(&config)?;
            let aws = aws_config::load_from_env().await;
            let s3 = aws_sdk_s3::Client::new(&aws);

            let index = export(&s3, &bucket, &ctx.store).await?;
            print_json(&index)?;
        }
    }

    Ok(())
}

fn open_context(config: &Config) -> Result<TaskContext> {
    let store = Arc::new(DataStore::open(&config.data_dir)?);
    let update_log = Arc::new(UpdateLog::load(config.update_log_path())?);
    Ok(TaskContext::new(store, update_log))
}

/// HTTP client for dataset downloads, authenticated when a DataMall key is set.
fn dataset_client(config: &Config) -> Result<Arc<dyn HttpClient>> {
    Ok(match &config.datamall_account_key {
        Some(key) => Arc::new(ApiKey::new(BasicClient::new(), "AccountKey", key)?),
        None => Arc::new(BasicClient::new()),
    })
}

fn build_tasks(
    config: &Config,
    coe: Option<String>,
    cars: Option<String>,
) -> Result<Vec<Arc<dyn Task>>> {
    let http = dataset_client(config)?;
    let mut tasks: Vec<Arc<dyn Task>> = Vec::new();

    match coe.or(config.coe_dataset_url.clone()) {
        Some(source) => tasks.push(Arc::new(CoeTask {
            source,
            http: http.clone(),
        })),
        None => warn!("No COE dataset source configured"),
    }
    match cars.or(config.cars_dataset_url.clone()) {
        Some(source) => tasks.push(Arc::new(CarsTask { source, http })),
        None => warn!("No cars dataset source configured"),
    }

    if tasks.is_empty() {
        anyhow::bail!("No dataset sources configured, set COE_DATASET_URL or CARS_DATASET_URL");
    }
    Ok(tasks)
}

fn build_platforms(config: &Config) -> Result<Vec<Arc<dyn Platform>>> {
    let mut platforms: Vec<Arc<dyn Platform>> = Vec::new();

    if let (Some(token), Some(org)) = (
        &config.linkedin_access_token,
        &config.linkedin_organisation_id,
    ) {
        platforms.push(Arc::new(LinkedInClient::new(
            BasicClient::new(),
            token,
            org.clone(),
        )?));
    }
    if let Some(url) = &config.discord_webhook_url {
        platforms.push(Arc::new(DiscordWebhook::new(BasicClient::new(), url)?));
    }

    info!(platforms = platforms.len(), "Social media platforms configured");
    Ok(platforms)
}
