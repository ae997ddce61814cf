//! Postern - LDAP login for webmail
//!
//! Drives the login handler from the command line against the configured
//! directory and metadata database.

use clap::{Parser, Subcommand};
use postern_auth::{AccountResolver, CredentialValidator, LoginHandler, LoginOutcome};
use postern_core::config::PosternConfig;
use postern_core::types::{LoginRequest, NewMailServer};
use postern_metadata::MetadataStore;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "postern")]
#[command(author = "Postern Team")]
#[command(version = postern_core::VERSION)]
#[command(about = "LDAP login and mail account autoprovisioning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, env = "POSTERN_CONFIG")]
    config: Option<String>,

    /// Metadata database URL
    #[arg(long, global = true, env = "POSTERN_DATABASE_URL")]
    database_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "POSTERN_LOG_LEVEL")]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one login attempt and print the authentication result
    Login {
        #[arg(short, long)]
        login: String,

        #[arg(short, long, env = "POSTERN_PASSWORD", hide_env_values = true)]
        password: String,

        /// Ask for a persistent session
        #[arg(long)]
        sign_me: bool,
    },

    /// Check whether a login collides with the reserved administrator login
    CheckAccount {
        #[arg(short, long)]
        login: String,
    },

    /// Register a mail server for a domain ("*" accepts any domain)
    AddServer {
        #[arg(long)]
        name: String,

        #[arg(long)]
        domain: String,

        /// Enable message threading on accounts created for this server
        #[arg(long)]
        threading: bool,
    },

    /// List registered mail servers
    ListServers,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Load or create config
    let mut config = if let Some(config_path) = &cli.config {
        let mut config = PosternConfig::from_file(config_path)?;
        config.apply_env();
        config
    } else {
        PosternConfig::from_env()
    };

    // Override with CLI args
    if let Some(url) = cli.database_url {
        config.database.url = url;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_logging(&config);

    let store = Arc::new(MetadataStore::new(&config.database.url, config.database.max_connections).await?);
    let handler = LoginHandler::new(
        CredentialValidator::with_ldap(config.ldap.clone()),
        AccountResolver::from_store(store.clone()),
        &config,
    );

    match cli.command {
        Commands::Login {
            login,
            password,
            sign_me,
        } => {
            config.validate()?;
            let request = LoginRequest::new(login, password).sign_me(sign_me);
            match handler.authenticate(&request).await {
                LoginOutcome::Authenticated(result) => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                LoginOutcome::Rejected(failure) => {
                    anyhow::bail!("Login rejected: {}", failure);
                }
            }
        }
        Commands::CheckAccount { login } => {
            handler.on_check_account_exists(&login)?;
            println!("'{}' is available", login);
        }
        Commands::AddServer {
            name,
            domain,
            threading,
        } => {
            let server = store
                .create_server(&NewMailServer::new(name, domain).with_threading(threading))
                .await?;
            info!(server_id = server.id, domain = %server.domain, "Registered mail server");
            println!("{}\t{}\t{}", server.id, server.domain, server.name);
        }
        Commands::ListServers => {
            for server in store.list_servers().await? {
                println!(
                    "{}\t{}\t{}\tthreading={}",
                    server.id, server.domain, server.name, server.enable_threading
                );
            }
        }
    }

    Ok(())
}

fn init_logging(config: &PosternConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.format == "json" {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(true)).init();
    }
}
