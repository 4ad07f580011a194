//! Conversation Bot Example
//!
//! Replays Telegram updates from a file (or stdin), one JSON object per
//! line, and prints what the bot would send back.
//!
//! # Handlers
//!
//! ```text
//! message:        /start ─▶ /survey ─▶ order #N ─▶ photo ─▶ echo
//! edited_message: edit notice
//! inline_query:   inline results
//! callback_query: "like" button
//! ```
//!
//! `/survey` opens a conversation: the bot asks for a name and an age and
//! keeps asking until the age is a number. Other chats are unaffected while
//! it waits.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package conversation-bot -- demos/conversation_bot/updates.jsonl
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tracing::{debug, info};

use parley::framework::HandlerResult;
use parley::prelude::*;
use parley::runtime::SourceError;

// ============================================================================
// Update Source
// ============================================================================

/// Reads one JSON update per line.
struct LineSource {
    lines: Lines<BufReader<Box<dyn AsyncRead + Unpin + Send>>>,
    batch_size: usize,
}

impl LineSource {
    fn new(reader: Box<dyn AsyncRead + Unpin + Send>, batch_size: usize) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait]
impl UpdateSource for LineSource {
    async fn fetch(&mut self, offset: i64, _timeout: Duration) -> Result<Vec<Update>, SourceError> {
        let mut batch = Vec::new();

        while batch.len() < self.batch_size {
            let Some(line) = self.lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let update = Update::from_json(line)?;
            if update.update_id >= offset {
                batch.push(update);
            }
        }

        Ok(batch)
    }
}

// ============================================================================
// Handler Functions
// ============================================================================

/// Stands in for sending a message to the chat.
fn say(chat: ChatId, text: &str) {
    println!("[{chat}] bot: {text}");
}

async fn start(message: Message) {
    say(
        message.chat_id(),
        "Welcome! Send /survey to tell me about yourself.",
    );
}

async fn survey(message: Message) -> Reply {
    let chat = message.chat_id();
    say(chat, "What's your name?");
    Reply::converse(move |inbox| survey_conversation(chat, inbox))
}

async fn survey_conversation(chat: ChatId, mut inbox: Inbox) -> HandlerResult<()> {
    let reply = inbox.next().await;
    let name = reply.text().unwrap_or("stranger").trim().to_string();
    say(chat, &format!("Nice to meet you, {name}. How old are you?"));

    let age = loop {
        let reply = inbox.next().await;
        match reply.text().and_then(|text| text.trim().parse::<u32>().ok()) {
            Some(age) => break age,
            None => say(chat, "Age must be a number, try again."),
        }
    };

    say(chat, &format!("Thanks! {name} is {age} years old."));
    Ok(())
}

async fn photo(message: Message) {
    say(message.chat_id(), "Nice picture!");
}

async fn echo(message: Message) {
    if let Some(text) = message.text() {
        say(message.chat_id(), text);
    }
}

async fn edited(message: Message) {
    say(message.chat_id(), "I saw that edit.");
}

async fn inline(query: InlineQuery) {
    println!(
        "[inline {}] bot: 3 results for {:?}",
        query.from.first_name, query.query
    );
}

async fn liked(query: CallbackQuery) {
    println!("[callback {}] bot: Thanks for the like!", query.id);
}

fn register(runtime: &ParleyRuntime) -> Result<()> {
    runtime.add_update_listener(|update| debug!(%update, "Received"));

    runtime.add_message_handler(MessageHandler::new(start).name("start").commands(["start"]));
    runtime.add_message_handler(MessageHandler::new(survey).name("survey").commands(["survey"]));

    let order = Regex::new(r"#(\d+)")?;
    let pattern = order.clone();
    runtime.add_message_handler(
        MessageHandler::new(move |message: Message| {
            let pattern = pattern.clone();
            async move {
                let number = message
                    .text()
                    .and_then(|text| pattern.captures(text))
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().to_string());
                if let Some(number) = number {
                    say(message.chat_id(), &format!("Looking up order {number}..."));
                }
            }
        })
        .name("order")
        .regexp(order),
    );

    runtime.add_message_handler(
        MessageHandler::new(photo)
            .name("photo")
            .content_types([ContentType::Photo]),
    );
    runtime.add_message_handler(
        MessageHandler::new(echo)
            .name("echo")
            .content_types([ContentType::Text]),
    );

    runtime.add_edited_message_handler(MessageHandler::new(edited).name("edited"));
    runtime.add_inline_handler(InlineHandler::new(inline).name("inline"));
    runtime.add_callback_query_handler(
        CallbackQueryHandler::new(liked)
            .name("like")
            .func(|query| query.data.as_deref() == Some("like")),
    );

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "conversation-bot", about = "Replay Telegram updates through Parley")]
struct Args {
    /// File with one JSON update per line; stdin when omitted
    input: Option<PathBuf>,

    /// Updates returned per fetch
    #[arg(long, default_value_t = 4)]
    batch_size: usize,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Discard the input instead of dispatching it
    #[arg(long)]
    skip_pending: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let reader: Box<dyn AsyncRead + Unpin + Send> = match &args.input {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };

    let mut builder = ParleyRuntime::builder().source(LineSource::new(reader, args.batch_size));
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    let runtime = builder.build()?;

    register(&runtime)?;

    if args.skip_pending {
        let skipped = runtime.skip_updates().await?;
        info!(skipped, "Skipped pending updates");
    }

    let timeout = runtime.config().polling.timeout();
    let fetched = runtime.retrieve_updates(timeout).await?;
    info!(
        fetched,
        last_update_id = runtime.last_update_id(),
        "Input drained"
    );

    Ok(())
}
