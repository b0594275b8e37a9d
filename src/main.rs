use clap::{Parser, Subcommand};
use log::{error, info};
use rusty_tally::db::Database;
use rusty_tally::store::http::HttpStore;
use rusty_tally::{
    AdminConsole, Backend, BallotError, BallotSession, Config, Identity, Result, Selection, VoteStore,
};
use serde_json::Value;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rusty-tally")]
#[command(about = "Cast a single vote and read tallied results")]
struct Cli {
    /// Stored user record as JSON, used alongside BALLOT_TOKEN to identify you
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the ballot options
    Options,

    /// Vote for a listed option
    Vote { option_id: String },

    /// Vote for your own write-in option
    VoteOther {
        title: String,
        #[arg(long)]
        detail: Option<String>,
    },

    /// Show tallied results
    Results,

    /// List user accounts (admins only)
    Users,

    /// Add options to a local sqlite ballot
    Seed {
        #[arg(required = true)]
        texts: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            let body = serde_json::to_string(&e.to_body()).unwrap_or_else(|_| e.to_string());
            eprintln!("{}", body);
            ExitCode::FAILURE
        }
    }
}

async fn open_store(config: &Config) -> Result<Arc<dyn VoteStore>> {
    let store: Arc<dyn VoteStore> = match config.backend {
        Backend::Http => Arc::new(HttpStore::new(config)?),
        Backend::Sqlite => Arc::new(Database::new(&config.database_url).await?),
    };
    Ok(store)
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;

    let stored_user = match cli.user.as_deref() {
        Some(raw) => Some(serde_json::from_str::<Value>(raw).map_err(|e| {
            BallotError::validation(format!("--user must be a JSON object: {}", e))
        })?),
        None => None,
    };
    let identity = Identity::derive(stored_user.as_ref(), config.token.as_deref());
    info!("Signed in as {}", identity.name);

    match cli.command {
        Commands::Options => {
            let store = open_store(&config).await?;
            let mut session = BallotSession::new(store, identity, config.timeout);
            for option in session.load_options().await?.options() {
                if option.detail_text.is_empty() {
                    println!("{}\t{}", option.id, option.text);
                } else {
                    println!("{}\t{} - {}", option.id, option.text, option.detail_text);
                }
            }
        }
        Commands::Vote { option_id } => {
            let store = open_store(&config).await?;
            let mut session = BallotSession::new(store, identity, config.timeout);
            session.load_options().await?;
            let ack = session.submit(Some(Selection::option(option_id))).await?;
            println!("{}", ack.message);
        }
        Commands::VoteOther { title, detail } => {
            let store = open_store(&config).await?;
            let mut session = BallotSession::new(store, identity, config.timeout);
            session.load_options().await?;
            let ack = session
                .submit(Some(Selection::freeform(&title, detail.as_deref())))
                .await?;
            println!("{}", ack.message);
        }
        Commands::Results => {
            let store = open_store(&config).await?;
            let mut session = BallotSession::new(store, identity, config.timeout);
            session.load_options().await?;
            println!("{}", session.results().await?.summary());
        }
        Commands::Users => {
            let store = open_store(&config).await?;
            let console = AdminConsole::new(identity.as_account(), store, config.timeout);
            for user in console.list_users().await? {
                let voted = if user.has_voted { "voted" } else { "not voted" };
                println!("{}\t{}\t{}\t{}\t{}", user.id, user.name, user.email, user.role, voted);
            }
        }
        Commands::Seed { texts } => {
            if config.backend != Backend::Sqlite {
                return Err(BallotError::validation("seed requires BALLOT_BACKEND=sqlite"));
            }
            let database = Database::new(&config.database_url).await?;
            for option in database.seed_options(&texts).await? {
                println!("{}\t{}", option.id, option.text);
            }
        }
    }

    Ok(())
}
