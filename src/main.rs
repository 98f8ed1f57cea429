use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use regex::Regex;

use rust_rest_chat::common::jwt::decode_claims;
use rust_rest_chat::common::{Message, ProfileUpdate};
use rust_rest_chat::config::{self, BASE_URL_ENV};
use rust_rest_chat::ui::{FeedState, Reaction, render_feed};
use rust_rest_chat::{ApiClient, ApiError, SessionDatabase};

/// Avatars offered at registration.
const AVATAR_OPTIONS: [&str; 5] = [
    "https://i.pravatar.cc/150?img=1",
    "https://i.pravatar.cc/150?img=2",
    "https://i.pravatar.cc/150?img=3",
    "https://i.pravatar.cc/150?img=4",
    "https://i.pravatar.cc/150?img=5",
];

const NOT_LOGGED_IN: &str = "not logged in; run `login` first";

#[derive(Parser)]
#[command(
    name = "rust_rest_chat",
    version,
    about = "Command-line client for a REST chat backend"
)]
struct Cli {
    /// Path to JSON config file
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH, value_name = "FILE")]
    config: String,
    /// Backend root URL, overrides the config file and CHAT_API_BASE_URL
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        /// Avatar URL; defaults to the chosen preset
        #[arg(long)]
        avatar: Option<String>,
        /// Preset avatar number (1-5)
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=5))]
        avatar_choice: u8,
    },
    /// Log in and store the session
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Drop the stored session
    Logout,
    /// Show the identity held in the session
    Whoami,
    #[command(subcommand)]
    Profile(ProfileCommand),
    #[command(subcommand)]
    Messages(MessagesCommand),
    /// Persist the backend URL to the config file
    Configure {
        #[arg(long)]
        base_url: String,
    },
}

#[derive(Subcommand)]
enum ProfileCommand {
    Show,
    /// Change only the given fields
    Update {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        avatar: Option<String>,
    },
    /// Delete the account and log out
    Delete {
        /// Confirm the deletion; it cannot be undone
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum MessagesCommand {
    List {
        #[arg(long)]
        conversation: Option<String>,
    },
    Send {
        text: String,
        #[arg(long)]
        conversation: Option<String>,
    },
    Delete {
        id: String,
    },
    /// Re-fetch the feed on an interval
    Watch {
        #[arg(long)]
        conversation: Option<String>,
        #[arg(long, default_value_t = 5, value_name = "SECONDS")]
        interval: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();

    if let Command::Configure { base_url } = &cli.command {
        config::persist_base_url(&cli.config, base_url)
            .with_context(|| format!("failed to write {}", cli.config))?;
        println!("Saved API base URL to {}", cli.config);
        return Ok(());
    }

    let app_config = config::load_config(&cli.config);
    let env_url = std::env::var(BASE_URL_ENV).ok();
    let base_url = app_config.resolve_base_url(cli.base_url.as_deref(), env_url.as_deref());

    let session = SessionDatabase::with_path(&app_config.session_db)
        .with_context(|| format!("failed to open session store {}", app_config.session_db))?;
    let client = ApiClient::new(&base_url, Arc::new(session))?;
    log::debug!("Using backend {}", client.base_url());

    let Err(err) = run(&client, cli.command).await else {
        return Ok(());
    };
    match err.downcast_ref::<ApiError>().map(Reaction::from_error) {
        Some(Reaction::ForceLogout) => {
            client.logout();
            bail!("Your session has expired. Please log in again.")
        }
        Some(Reaction::ShowError(message)) => bail!(message),
        None => Err(err),
    }
}

async fn run(client: &ApiClient, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Register {
            username,
            email,
            password,
            avatar,
            avatar_choice,
        } => {
            if !looks_like_email(&email) {
                bail!("`{email}` is not a valid e-mail address");
            }
            let avatar = avatar
                .unwrap_or_else(|| AVATAR_OPTIONS[usize::from(avatar_choice) - 1].to_string());
            client.register(&username, &email, &password, &avatar).await?;
            println!("Registration succeeded. You can now log in as {username}.");
        }
        Command::Login { username, password } => {
            let outcome = client.login(&username, &password).await?;
            let name = outcome.claims.username.as_deref().unwrap_or(&username);
            println!("Logged in as {name}.");
        }
        Command::Logout => {
            client.logout();
            println!("Logged out.");
        }
        Command::Whoami => match client.current_user()? {
            Some(user) => {
                println!("username: {}", user.username.as_deref().unwrap_or("-"));
                println!("id:       {}", user.id.as_deref().unwrap_or("-"));
                println!("avatar:   {}", user.avatar.as_deref().unwrap_or("-"));
                if let Ok(claims) = decode_claims(&user.token) {
                    if let Some(expires) = claims.expires_at() {
                        println!("expires:  {}", expires.to_rfc3339());
                    }
                    if claims.is_expired_at(Utc::now()) {
                        println!("The stored session has expired; run `login` again.");
                    }
                }
            }
            None => println!("Not logged in."),
        },
        Command::Profile(command) => run_profile(client, command).await?,
        Command::Messages(command) => run_messages(client, command).await?,
        Command::Configure { .. } => bail!("`configure` runs before a session is opened"),
    }
    Ok(())
}

async fn run_profile(client: &ApiClient, command: ProfileCommand) -> anyhow::Result<()> {
    let user_id = require_user_id(client)?;
    match command {
        ProfileCommand::Show => {
            let user = client.get_user(&user_id).await?;
            println!("username: {}", user.username);
            println!("email:    {}", user.email);
            println!("avatar:   {}", user.avatar);
        }
        ProfileCommand::Update {
            username,
            email,
            avatar,
        } => {
            let update = ProfileUpdate {
                user_id,
                username,
                email,
                avatar,
            };
            if update.is_empty() {
                bail!("nothing to update; pass --username, --email or --avatar");
            }
            if let Some(email) = update.email.as_deref() {
                if !looks_like_email(email) {
                    bail!("`{email}` is not a valid e-mail address");
                }
            }
            client.update_user(&update).await?;
            println!("Profile updated.");
        }
        ProfileCommand::Delete { yes } => {
            if !yes {
                bail!("pass --yes to delete your account; this cannot be undone");
            }
            client.delete_user(&user_id).await?;
            client.logout();
            println!("Account deleted.");
        }
    }
    Ok(())
}

async fn run_messages(client: &ApiClient, command: MessagesCommand) -> anyhow::Result<()> {
    match command {
        MessagesCommand::List { conversation } => {
            let mut feed = FeedState::new();
            feed.replace(fetch(client, conversation.as_deref()).await?);
            print_feed(client, &feed)?;
        }
        MessagesCommand::Send { text, conversation } => {
            if text.trim().is_empty() {
                bail!("message text is empty");
            }
            let Some(user) = client.current_user()? else {
                bail!(NOT_LOGGED_IN);
            };
            let username = user.username.as_deref().unwrap_or_default();
            client
                .post_message(&text, conversation.as_deref(), user.avatar.as_deref(), username)
                .await?;

            let mut feed = FeedState::new();
            feed.replace(fetch(client, conversation.as_deref()).await?);
            print_feed(client, &feed)?;
        }
        MessagesCommand::Delete { id } => {
            client.delete_message(&id).await?;
            println!("Message {id} deleted.");
        }
        MessagesCommand::Watch {
            conversation,
            interval,
        } => {
            let mut feed = FeedState::with_placeholders(vec![Message::placeholder(
                "rust_rest_chat",
                None,
                "Watching for new messages, press Ctrl-C to stop.",
            )]);
            let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match fetch(client, conversation.as_deref()).await {
                            Ok(messages) => feed.replace(messages),
                            Err(err) if err.is_expired_session() => return Err(err.into()),
                            Err(err) => feed.set_error(err.to_string()),
                        }
                        println!("--- {} ---", chrono::Local::now().format("%H:%M:%S"));
                        print_feed(client, &feed)?;
                        if let Some(error) = &feed.error {
                            eprintln!("{error}");
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
        }
    }
    Ok(())
}

async fn fetch(client: &ApiClient, conversation: Option<&str>) -> Result<Vec<Message>, ApiError> {
    match conversation {
        Some(conversation) => client.get_messages_by_conversation(conversation).await,
        None => client.get_all_messages().await,
    }
}

fn print_feed(client: &ApiClient, feed: &FeedState) -> anyhow::Result<()> {
    let current = client.current_user()?;
    println!("{}", render_feed(&feed.rows(current.as_ref())));
    Ok(())
}

fn require_user_id(client: &ApiClient) -> anyhow::Result<String> {
    client
        .current_user()?
        .and_then(|user| user.id)
        .context(NOT_LOGGED_IN)
}

fn looks_like_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}
