use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use trove::auth::hash_password;
use trove::config::ServerConfig;
use trove::server::{AppState, create_router};
use trove::store::{SqliteStore, Store};
use trove::types::{Role, User};
use trove::validation::{validate_email, validate_password, validate_username};

#[derive(Parser)]
#[command(name = "trove")]
#[command(
    about = "A server for collections with user-defined attribute schemas",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Administrative commands
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },

    /// Start the server
    Serve {
        /// TOML configuration file; flags below override its values
        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(long, short)]
        port: Option<u16>,

        /// Data directory for the database
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Session token lifetime in seconds
        #[arg(long)]
        token_ttl_seconds: Option<u64>,
    },
}

#[derive(Subcommand)]
enum AdminCommands {
    /// Initialize the server (create database and first admin account)
    Init {
        /// Data directory for the database
        #[arg(long, default_value = "./data")]
        data_dir: PathBuf,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        email: Option<String>,

        #[arg(long)]
        password: Option<String>,

        /// Skip interactive prompts; all account flags must be given
        #[arg(long)]
        non_interactive: bool,
    },
}

struct AdminAccount {
    username: String,
    email: String,
    password: String,
}

fn to_inquire(result: Result<(), String>) -> inquire::validator::Validation {
    match result {
        Ok(()) => inquire::validator::Validation::Valid,
        Err(e) => inquire::validator::Validation::Invalid(e.into()),
    }
}

fn prompt_account(
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
) -> anyhow::Result<AdminAccount> {
    let username = match username {
        Some(u) => u,
        None => inquire::Text::new("Admin username:")
            .with_validator(|input: &str| Ok(to_inquire(validate_username(input.trim()))))
            .prompt()?,
    };
    let email = match email {
        Some(e) => e,
        None => inquire::Text::new("Admin email:")
            .with_validator(|input: &str| Ok(to_inquire(validate_email(input.trim()))))
            .prompt()?,
    };
    let password = match password {
        Some(p) => p,
        None => inquire::Password::new("Admin password:")
            .with_validator(|input: &str| Ok(to_inquire(validate_password(input))))
            .prompt()?,
    };

    Ok(AdminAccount {
        username,
        email,
        password,
    })
}

fn run_init(
    data_dir: PathBuf,
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    non_interactive: bool,
) -> anyhow::Result<()> {
    fs::create_dir_all(&data_dir)?;

    let config = ServerConfig {
        data_dir,
        ..ServerConfig::default()
    };
    let store = SqliteStore::new(config.db_path())?;
    store.initialize()?;

    if store.has_admin()? {
        bail!(
            "Server already initialized. An admin account exists in {}",
            config.db_path().display()
        );
    }

    let account = if non_interactive {
        match (username, email, password) {
            (Some(username), Some(email), Some(password)) => AdminAccount {
                username,
                email,
                password,
            },
            _ => bail!("--username, --email and --password are required with --non-interactive"),
        }
    } else {
        prompt_account(username, email, password)?
    };

    let username = account.username.trim().to_string();
    let email = account.email.trim().to_lowercase();
    let problems: Vec<String> = [
        validate_username(&username),
        validate_email(&email),
        validate_password(&account.password),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect();
    if !problems.is_empty() {
        bail!("Invalid admin account: {}", problems.join("; "));
    }

    let now = Utc::now();
    let admin = User {
        id: Uuid::new_v4().to_string(),
        username,
        email,
        password_hash: hash_password(&account.password)?,
        role: Role::Admin,
        is_active: true,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    };
    store.create_user(&admin)?;

    println!();
    println!("========================================");
    println!("Created admin '{}'", admin.username);
    println!("Database: {}", config.db_path().display());
    println!("Log in with POST /api/v1/auth/login");
    println!("========================================");
    println!();

    Ok(())
}

async fn run_serve(config: ServerConfig) -> anyhow::Result<()> {
    let db_path = config.db_path();
    if !db_path.exists() {
        bail!("Server not initialized. Run 'trove admin init' first to create the database.");
    }

    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;
    if !store.has_admin()? {
        bail!("Server not initialized. Run 'trove admin init' first to create an admin account.");
    }

    let addr = config.socket_addr()?;
    let state = Arc::new(AppState::new(Arc::new(store), config));
    let app = create_router(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trove=info".parse()?))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Admin { command } => match command {
            AdminCommands::Init {
                data_dir,
                username,
                email,
                password,
                non_interactive,
            } => {
                run_init(data_dir, username, email, password, non_interactive)?;
            }
        },
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
            token_ttl_seconds,
        } => {
            let mut config = match config {
                Some(path) => ServerConfig::from_file(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => ServerConfig::default(),
            };
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.data_dir = data_dir;
            }
            if let Some(ttl) = token_ttl_seconds {
                config.token_ttl_seconds = ttl;
            }

            run_serve(config).await?;
        }
    }

    Ok(())
}
