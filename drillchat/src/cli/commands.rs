//! CLI command execution.
//!
//! `chat` and `ask` drive a [`ChatSession`] over the chosen transport;
//! `history` and `clear` talk to the chat backend directly.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::chat::{ChatEvent, ChatSession, SendOutcome, SessionOptions, DRILLING_WELCOME};
use crate::config::Settings;
use crate::models::{Message, MessageRole, SessionId};
use crate::server;
use crate::transport::ChatTransport;

use super::args::{Backend, Cli, Commands};

// === Command Execution ===

pub async fn execute(cli: Cli) -> Result<()> {
    let settings = cli.settings;

    match cli.command {
        Commands::Chat {
            backend,
            session,
            no_welcome,
        } => {
            let mut options = SessionOptions::new().request_timeout(settings.request_timeout());
            if let Some(id) = session {
                if backend == Backend::Gemini {
                    bail!("--session only applies to the session backend");
                }
                options = options.session_id(id.parse()?);
            }

            match backend {
                Backend::Gemini => {
                    if !no_welcome {
                        options = options.welcome(DRILLING_WELCOME);
                    }
                    run_chat(ChatSession::new(settings.gemini()?, options)).await
                }
                Backend::Session => {
                    run_chat(ChatSession::new(settings.session_backend(), options)).await
                }
            }
        }
        Commands::Ask { backend, message } => {
            let message = message.join(" ");
            let options = SessionOptions::new().request_timeout(settings.request_timeout());
            match backend {
                Backend::Gemini => ask(ChatSession::new(settings.gemini()?, options), &message).await,
                Backend::Session => {
                    ask(ChatSession::new(settings.session_backend(), options), &message).await
                }
            }
        }
        Commands::History { session } => show_history(&settings, &session.parse()?).await,
        Commands::Clear { session } => clear_history(&settings, &session.parse()?).await,
        Commands::Serve { port } => server::start_server(port, settings.gemini()?).await,
    }
}

/// Interactive line-oriented chat surface.
async fn run_chat<T: ChatTransport + 'static>(chat: ChatSession<T>) -> Result<()> {
    let chat = Arc::new(chat);
    let renderer = tokio::spawn(render_events(chat.clone(), chat.subscribe()));

    println!(
        "Drilling assistant ({}) - session {}",
        chat.transport().name(),
        chat.session_id()
    );
    println!("Type /clear to reset the conversation, /quit to exit.\n");
    for message in chat.messages().await {
        print_message(&message);
    }

    if let Err(err) = chat.load_history().await {
        eprintln!("(could not load earlier messages: {err})");
    }

    let result = read_commands(&chat, BufReader::new(tokio::io::stdin())).await;
    renderer.abort();
    result
}

/// Handle input lines until `/quit` or end of input.
///
/// Sends run in the background so `/clear` and `/quit` stay usable while a
/// reply is pending.
async fn read_commands<T, R>(chat: &Arc<ChatSession<T>>, input: R) -> Result<()>
where
    T: ChatTransport + 'static,
    R: AsyncBufRead + Unpin,
{
    let mut pending: Option<JoinHandle<SendOutcome>> = None;
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read from stdin")? {
        match line.trim() {
            "/quit" | "/exit" => break,
            "/clear" => {
                if let Err(err) = chat.clear().await {
                    eprintln!("(remote history not cleared: {err})");
                }
            }
            "" => {}
            _ if chat.is_loading().await => println!("(still waiting for the previous reply)"),
            _ => {
                let chat = Arc::clone(chat);
                let text = line.clone();
                pending = Some(tokio::spawn(async move {
                    let outcome = chat.send(&text).await;
                    debug!(?outcome, "send finished");
                    outcome
                }));
            }
        }
    }

    if let Some(handle) = pending {
        handle.abort();
    }
    Ok(())
}

/// Print session changes as they happen.
async fn render_events<T: ChatTransport>(chat: Arc<ChatSession<T>>, mut events: Receiver<ChatEvent>) {
    loop {
        match events.recv().await {
            Ok(ChatEvent::MessageAppended(message)) if message.role == MessageRole::Assistant => {
                print_message(&message);
            }
            Ok(ChatEvent::LoadingChanged(true)) => println!("  ...thinking"),
            Ok(ChatEvent::Cleared) => {
                println!("(conversation cleared)");
                for message in chat.messages().await {
                    print_message(&message);
                }
            }
            Ok(ChatEvent::HistoryLoaded(count)) => {
                println!("(loaded {count} earlier messages)");
                for message in chat.messages().await {
                    print_message(&message);
                }
            }
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}

/// One exchange; the reply goes to stdout, an error reply fails the command.
async fn ask<T: ChatTransport>(chat: ChatSession<T>, message: &str) -> Result<()> {
    if chat.send(message).await == SendOutcome::Ignored {
        bail!("Message is required");
    }

    let reply = chat
        .messages()
        .await
        .pop()
        .context("No reply was recorded")?;
    if reply.is_error {
        bail!("{}", reply.text);
    }

    println!("{}", reply.text);
    Ok(())
}

async fn show_history(settings: &Settings, session: &SessionId) -> Result<()> {
    let history = settings
        .session_backend()
        .get_history(session)
        .await
        .context("Failed to load chat history")?;

    if history.is_empty() {
        println!("No messages in session {session}.");
        return Ok(());
    }

    for message in &history {
        print_message(message);
    }
    Ok(())
}

async fn clear_history(settings: &Settings, session: &SessionId) -> Result<()> {
    settings
        .session_backend()
        .delete_history(session)
        .await
        .context("Failed to clear chat history")?;

    println!("Cleared session {session}.");
    Ok(())
}

fn print_message(message: &Message) {
    let author = match (message.role, message.is_error) {
        (MessageRole::User, _) => "you",
        (MessageRole::Assistant, false) => "assistant",
        (MessageRole::Assistant, true) => "assistant (error)",
    };
    let time = message.timestamp.with_timezone(&chrono::Local).format("%H:%M");
    println!("[{time}] {author}: {}", message.text);
}
