mod command;
mod render;

use std::sync::Arc;

use chatsync::channel::memory::MemoryHub;
use chatsync::channel::ws::{TicketSource, WsChannel};
use chatsync::config::ConfigOverrides;
use chatsync::identity::{HttpIdentityResolver, StaticIdentity};
use chatsync::{
    ChannelAdapter, ClientConfig, ConfigError, IdentityError, IdentityResolver, InboundEvent, LoginRedirect,
    SendOutcome, SessionController, SessionError, SessionState,
};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::command::{Command, HELP, parse_command, position_reference};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("identity setup failed: {0}")]
    Identity(#[from] IdentityError),
    #[error("session failed: {0}")]
    Session(#[from] SessionError),
    #[error("stdin read failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "chatsync-cli", about = "Terminal client for a realtime chat room")]
struct Cli {
    #[arg(long, help = "Server base URL [env: CHAT_BASE_URL] [default: http://127.0.0.1:3000]")]
    base_url: Option<String>,

    #[arg(long, help = "Room to join [env: CHAT_ROOM] [default: lobby]")]
    room: Option<String>,

    #[arg(long, help = "Session cookie value [env: CHAT_SESSION_TOKEN]")]
    session_token: Option<String>,

    #[arg(long, env = "CHAT_NAME", help = "Chat under this name without signing in")]
    name: Option<String>,

    #[arg(long, default_value_t = false, help = "Use an in-process room instead of the server")]
    offline: bool,

    #[arg(long, help = "Reconnect backoff floor [env: CHAT_RECONNECT_MIN_MS] [default: 1000]")]
    reconnect_min_ms: Option<u64>,

    #[arg(long, help = "Reconnect backoff ceiling [env: CHAT_RECONNECT_MAX_MS] [default: 10000]")]
    reconnect_max_ms: Option<u64>,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            room: self.room.clone(),
            session_token: self.session_token.clone(),
            reconnect_min_ms: self.reconnect_min_ms,
            reconnect_max_ms: self.reconnect_max_ms,
        }
    }
}

/// Prints where to sign in; the chat loop stops on its own once the session
/// leaves `Active`.
struct TerminalRedirect {
    login_url: String,
}

impl LoginRedirect for TerminalRedirect {
    fn redirect_to_login(&self, reason: &str) {
        println!("{reason}; sign in at {}", self.login_url);
    }
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let config = ClientConfig::from_env()?.with_overrides(cli.overrides())?;

    let (identity, channel) = connect(&cli, &config)?;
    let redirect = Arc::new(TerminalRedirect { login_url: format!("{}/login", config.base_url) });
    let mut identity_changes = identity.on_identity_change();
    let mut controller = SessionController::new(Arc::clone(&identity), channel, redirect);

    if controller.start().await != SessionState::Active {
        return Ok(());
    }
    // Resolution itself publishes the identity; only later changes matter.
    let _ = identity_changes.borrow_and_update();
    info!(room = %config.room, offline = cli.offline, "cli: joined");
    println!("joined #{}; /help for commands", config.room);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut watching_identity = true;

    loop {
        let rev = controller.view().map_or(0, |view| view.rev);
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if let Flow::Quit = handle_line(&mut controller, &line).await? {
                    break;
                }
            }
            event = controller.next_event() => {
                match event {
                    Ok(Some(event)) => print_event(&controller, &event, rev),
                    Ok(None) => {
                        warn!("cli: channel closed");
                        break;
                    }
                    Err(_) => break,
                }
            }
            changed = identity_changes.changed(), if watching_identity => {
                if changed.is_err() {
                    watching_identity = false;
                    continue;
                }
                let current = identity_changes.borrow_and_update().clone();
                if controller.handle_identity_change(current).await != SessionState::Active {
                    break;
                }
                print_transcript(&controller);
            }
        }
    }

    Ok(())
}

/// Identity resolver and channel for the selected mode.
fn connect(
    cli: &Cli,
    config: &ClientConfig,
) -> Result<(Arc<dyn IdentityResolver>, Arc<dyn ChannelAdapter>), CliError> {
    if cli.offline {
        let name = cli.name.clone().unwrap_or_else(|| "guest".to_owned());
        let identity: Arc<dyn IdentityResolver> = Arc::new(StaticIdentity::named(name));
        let channel: Arc<dyn ChannelAdapter> = Arc::new(MemoryHub::new().connect());
        return Ok((identity, channel));
    }

    if let Some(name) = &cli.name {
        let identity: Arc<dyn IdentityResolver> = Arc::new(StaticIdentity::named(name.clone()));
        let channel: Arc<dyn ChannelAdapter> = Arc::new(WsChannel::spawn(config.ws_options(None)?));
        return Ok((identity, channel));
    }

    let resolver = Arc::new(HttpIdentityResolver::new(&config.base_url, config.session_token.as_deref())?);
    let tickets: Arc<dyn TicketSource> = resolver.clone();
    let channel: Arc<dyn ChannelAdapter> = Arc::new(WsChannel::spawn(config.ws_options(Some(tickets))?));
    let identity: Arc<dyn IdentityResolver> = resolver;
    Ok((identity, channel))
}

async fn handle_line(controller: &mut SessionController, line: &str) -> Result<Flow, CliError> {
    let command = match parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(Flow::Continue),
        Err(e) => {
            println!("{e}");
            return Ok(Flow::Continue);
        }
    };

    let result = match command {
        Command::Say(text) => say(controller, &text).await,
        Command::Edit(position) => {
            let edited = controller.begin_edit(&position_reference(position));
            if edited.is_ok() {
                print_status(controller);
            }
            edited
        }
        Command::Delete(position) => controller.delete(&position_reference(position)).await,
        Command::Cancel => controller.cancel_edit(),
        Command::List => {
            print_transcript(controller);
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Logout => {
            controller.logout().await?;
            return Ok(Flow::Quit);
        }
        Command::Quit => return Ok(Flow::Quit),
    };

    match result {
        Ok(()) => Ok(Flow::Continue),
        Err(SessionError::NotActive) => Ok(Flow::Quit),
        Err(e) => {
            println!("{e}");
            Ok(Flow::Continue)
        }
    }
}

async fn say(controller: &mut SessionController, text: &str) -> Result<(), SessionError> {
    controller.compose(text)?;
    match controller.send().await? {
        SendOutcome::Sent(id) => info!(%id, "cli: sent"),
        SendOutcome::Updated(reference) => info!(%reference, "cli: edited"),
        SendOutcome::Ignored => {}
    }
    Ok(())
}

fn print_event(controller: &SessionController, event: &InboundEvent, previous_rev: u64) {
    let Some(view) = controller.view() else {
        return;
    };
    for line in render::render_event(&view, event, previous_rev) {
        println!("{line}");
    }
}

fn print_transcript(controller: &SessionController) {
    let Some(view) = controller.view() else {
        return;
    };
    for line in render::render_transcript(&view) {
        println!("{line}");
    }
    print_status(controller);
}

fn print_status(controller: &SessionController) {
    if let Some(status) = controller.view().as_ref().and_then(render::render_status) {
        println!("{status}");
    }
}
