use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use translation_matrix::cache::{CacheService, CacheStore, MemoryCache, RedisCache};
use translation_matrix::config::Config;
use translation_matrix::db::Database;
use translation_matrix::models::{
    Actor, CreateLanguageParams, CreateProjectParams, HistoryOperation, HistoryQuery,
};
use translation_matrix::retry::{with_retry, RetryPolicy};
use translation_matrix::service::seed_known_languages;
use translation_matrix::sync::PushRequest;
use translation_matrix::transfer::ExportFormat;
use translation_matrix::App;

#[derive(Parser)]
#[command(name = "translation-matrix")]
#[command(about = "Manage projects, languages and translations")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema, optionally seeding well-known languages
    Init {
        #[arg(long)]
        seed_languages: bool,
    },
    /// Manage projects
    Project {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// Manage the language directory
    Language {
        #[command(subcommand)]
        command: LanguageCommands,
    },
    /// Print a page of a project's translation matrix as JSON
    Matrix {
        project_id: i64,
        /// Keys per page; 0 or less prints every key
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
        /// Match against key names and values
        #[arg(long, default_value = "")]
        keyword: String,
    },
    /// Export a project's matrix
    Export {
        project_id: i64,
        #[arg(long, default_value = "json")]
        format: String,
        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Import translations; fails if any already exist
    Import {
        project_id: i64,
        file: PathBuf,
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Push keys (or bulk translations) from a JSON request file
    Push { file: PathBuf },
    /// Print a project's translations, optionally for one locale
    Pull {
        project_id: i64,
        #[arg(long)]
        locale: Option<String>,
    },
    /// List history records
    History {
        #[arg(long, conflicts_with_all = ["project", "user"])]
        translation: Option<i64>,
        #[arg(long, conflicts_with = "user")]
        project: Option<i64>,
        #[arg(long)]
        user: Option<i64>,
        #[arg(long)]
        operation: Option<String>,
        /// Inclusive, YYYY-MM-DD
        #[arg(long)]
        since: Option<NaiveDate>,
        /// Inclusive, YYYY-MM-DD
        #[arg(long)]
        until: Option<NaiveDate>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
    /// Print dashboard counters
    Stats,
    /// Print cache counters for this process
    CacheStats,
}

#[derive(Subcommand)]
enum ProjectCommands {
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    List {
        #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
        limit: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },
}

#[derive(Subcommand)]
enum LanguageCommands {
    Add {
        code: String,
        /// Defaults to the well-known name for the code
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        default: bool,
    },
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("translation_matrix=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let app = connect(&config).await?;
    let actor = Actor::new(config.actor_id, config.actor_name.clone());

    let result = run(cli.command, &app, &actor).await;
    app.db.close().await;
    result
}

async fn connect(config: &Config) -> Result<App> {
    let policy = RetryPolicy::startup();

    let db = with_retry(&policy, "database", || {
        Database::connect(
            &config.database_url,
            config.db_max_connections,
            config.db_acquire_timeout,
        )
    })
    .await
    .context("Failed to connect to database")?;

    let store: Arc<dyn CacheStore> = match &config.redis_url {
        Some(url) => {
            let redis = with_retry(&policy, "redis", || RedisCache::connect(url))
                .await
                .context("Failed to connect to Redis")?;
            info!("Using Redis cache");
            Arc::new(redis)
        }
        None => {
            info!("REDIS_URL not set, using in-process cache");
            Arc::new(MemoryCache::new())
        }
    };

    let cache = Arc::new(CacheService::new(store, config.cache.clone()));
    Ok(App::new(db, cache))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run(command: Commands, app: &App, actor: &Actor) -> Result<()> {
    match command {
        Commands::Init { seed_languages } => {
            if seed_languages {
                let added = seed_known_languages(app.languages.as_ref(), actor).await?;
                println!("Schema ready, {} languages added", added);
            } else {
                println!("Schema ready");
            }
        }

        Commands::Project { command } => match command {
            ProjectCommands::Create { name, description } => {
                let project = app
                    .projects
                    .create(CreateProjectParams { name, description }, actor)
                    .await?;
                print_json(&project)?;
            }
            ProjectCommands::List { limit, offset } => {
                let (projects, total) = app.projects.get_all(limit, offset).await?;
                print_json(&serde_json::json!({ "projects": projects, "total": total }))?;
            }
        },

        Commands::Language { command } => match command {
            LanguageCommands::Add {
                code,
                name,
                default,
            } => {
                let language = app
                    .languages
                    .create(
                        CreateLanguageParams {
                            code,
                            name,
                            is_default: default,
                        },
                        actor,
                    )
                    .await?;
                print_json(&language)?;
            }
            LanguageCommands::List => print_json(&app.languages.get_all().await?)?,
        },

        Commands::Matrix {
            project_id,
            limit,
            offset,
            keyword,
        } => {
            let page = app
                .translations
                .get_matrix(project_id, limit, offset, &keyword)
                .await?;
            print_json(&page)?;
        }

        Commands::Export {
            project_id,
            format,
            output,
        } => {
            let format: ExportFormat = format.parse()?;
            let data = app.translations.export(project_id, format).await?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &data)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    info!("Exported project {} to {}", project_id, path.display());
                }
                None => println!("{}", String::from_utf8_lossy(&data)),
            }
        }

        Commands::Import {
            project_id,
            file,
            format,
        } => {
            let format: ExportFormat = format.parse()?;
            let data = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let count = app
                .translations
                .import(project_id, &data, format, actor)
                .await?;
            println!("Imported {} translations", count);
        }

        Commands::Push { file } => {
            let raw = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let request: PushRequest =
                serde_json::from_slice(&raw).context("Invalid push request")?;
            let outcome = app.sync.push_keys(request, actor).await?;
            print_json(&outcome)?;
        }

        Commands::Pull { project_id, locale } => {
            let matrix = app
                .sync
                .pull_translations(project_id, locale.as_deref())
                .await?;
            print_json(&matrix)?;
        }

        Commands::History {
            translation,
            project,
            user,
            operation,
            since,
            until,
            limit,
            offset,
        } => {
            let query = HistoryQuery {
                limit,
                offset,
                operation: operation
                    .as_deref()
                    .map(str::parse::<HistoryOperation>)
                    .transpose()?,
                start_date: since,
                end_date: until,
            };
            let page = match (translation, project, user) {
                (Some(id), _, _) => app.history.list_by_translation_id(id, &query).await?,
                (_, Some(id), _) => app.history.list_by_project_id(id, &query).await?,
                (_, _, Some(id)) => app.history.list_by_user_id(id, &query).await?,
                _ => anyhow::bail!("one of --translation, --project or --user is required"),
            };
            print_json(&page)?;
        }

        Commands::Stats => print_json(&app.dashboard.get_stats().await?)?,

        Commands::CacheStats => print_json(&app.cache.metrics())?,
    }
    Ok(())
}
