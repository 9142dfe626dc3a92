//! Command handlers
//!
//! [`handle_ask`] is the boundary flow a UI calls for every question. The
//! remaining handlers back the CLI commands:
//! - ask: one question, answer streamed to stdout
//! - chat: interactive conversation over stdin
//! - flights: today's normalized schedule as JSON
//! - config: effective configuration

use anyhow::{Context, Result};
use futures::StreamExt;
use sdk::errors::{EngineError, FlightdeskErrorExt};
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::assistant::FlightAssistant;
use crate::cli::SourceArgs;
use crate::config::Config;
use crate::schedule::{FlightApiProvider, ScheduleProvider};
use crate::secrets::SecretString;
use crate::session::SessionStore;

/// Client id used by the single-user CLI commands
const CLI_CLIENT: &str = "cli";

/// Answer one question for a client.
///
/// `airport` is the airport currently selected by the caller; when absent
/// the session's previous selection is used. Each accumulated prefix of the
/// answer is passed to `render` as it arrives. The session is locked for the
/// whole exchange, so one client's questions are answered one at a time.
///
/// # Errors
///
/// * `AirportNotSelected` / `MissingCredential` before anything is fetched
/// * `InvalidAirportCode` if the airport is not allowed
/// * `GenerationFailure` if the answer service fails; history is untouched
pub async fn handle_ask<F>(
    store: &SessionStore,
    assistant: &FlightAssistant,
    client_id: &str,
    airport: Option<&str>,
    question: &str,
    mut render: F,
) -> Result<String, EngineError>
where
    F: FnMut(&str),
{
    let handle = store.get(client_id).await;
    let mut session = handle.lock().await;

    let airport = airport
        .map(|code| code.trim().to_uppercase())
        .or_else(|| session.selected.clone())
        .ok_or(EngineError::AirportNotSelected)?;

    if session.credential.is_blank() {
        return Err(EngineError::MissingCredential);
    }
    let credential = session.credential.clone();
    assistant.ensure_dependencies(&mut session, &credential)?;

    let messages = assistant
        .build_messages(&session, &airport, question)
        .await?;
    let mut answer_stream = assistant.stream_answer(&session, messages).await?;

    let mut answer = String::new();
    while let Some(prefix) = answer_stream.next().await {
        answer = prefix?;
        render(&answer);
    }

    assistant.persist_history(&mut session, question, &answer);
    session.selected = Some(airport);
    drop(session);
    store.touch(client_id).await;
    debug!("Answered {} chars for client {}", answer.len(), client_id);
    Ok(answer)
}

/// Ask a single question and stream the answer to stdout
pub async fn handle_ask_command(config: Config, source: SourceArgs, question: String) -> Result<()> {
    let assistant = FlightAssistant::new(Arc::new(config));
    let store = SessionStore::default();
    store
        .set_credential(CLI_CLIENT, source.api_key.unwrap_or_default())
        .await;

    let mut printer = PrefixPrinter::default();
    handle_ask(
        &store,
        &assistant,
        CLI_CLIENT,
        Some(&source.airport),
        &question,
        |prefix| printer.render(prefix),
    )
    .await
    .map_err(with_hint)?;
    printer.finish();
    Ok(())
}

/// Interactive conversation; history is kept for the whole run
pub async fn handle_chat(config: Config, source: SourceArgs) -> Result<()> {
    let config = Arc::new(config);
    let assistant = FlightAssistant::new(Arc::clone(&config));
    let store = SessionStore::new(config.session_idle_ttl());

    store
        .set_credential(CLI_CLIENT, source.api_key.unwrap_or_default())
        .await;
    select_airport(&store, &config, &source.airport).await?;

    println!("Flightdesk chat. Commands: /airport CODE, /key KEY, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await.context("Failed to read input")? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match ChatInput::parse(line) {
            ChatInput::Quit => break,
            ChatInput::Airport(code) => {
                if let Err(e) = select_airport(&store, &config, code).await {
                    eprintln!("{}", e);
                }
            }
            ChatInput::Key(key) => {
                store.set_credential(CLI_CLIENT, key).await;
                store.reset_dependencies(CLI_CLIENT).await;
                println!("Key updated.");
            }
            ChatInput::Question(question) => {
                let mut printer = PrefixPrinter::default();
                let result = handle_ask(&store, &assistant, CLI_CLIENT, None, question, |prefix| {
                    printer.render(prefix)
                })
                .await;
                printer.finish();
                if let Err(e) = result {
                    eprintln!("Error: {}\nHint: {}", e, e.user_hint());
                }
            }
        }
    }

    info!("Chat session ended");
    Ok(())
}

/// Print today's normalized flights as JSON
pub async fn handle_flights(config: Config, source: SourceArgs) -> Result<()> {
    let config = Arc::new(config);
    let airport = source.airport.trim().to_uppercase();
    let assistant = FlightAssistant::new(Arc::clone(&config));

    let provider = FlightApiProvider::new(
        Arc::clone(&config),
        SecretString::new(source.api_key.unwrap_or_default()),
        Arc::clone(assistant.cache()),
    )
    .map_err(with_hint)?;

    let today = provider
        .get_today_flights(&airport)
        .await
        .map_err(with_hint)?;
    info!(
        "{}: {} arrivals, {} departures",
        airport,
        today.arrivals.len(),
        today.departures.len()
    );

    println!("{}", serde_json::to_string_pretty(&today)?);
    Ok(())
}

/// Print the effective configuration
pub fn handle_config(config: &Config) -> Result<()> {
    print!("{}", config.to_toml_redacted().map_err(with_hint)?);
    Ok(())
}

async fn select_airport(store: &SessionStore, config: &Config, code: &str) -> Result<()> {
    let code = code.trim().to_uppercase();
    if !config.is_allowed_airport(&code) {
        return Err(with_hint(EngineError::InvalidAirportCode {
            code,
            allowed: config.allowed_codes_display(),
        }));
    }
    println!("Airport: {}", code);
    store.set_selected(CLI_CLIENT, Some(code)).await;
    Ok(())
}

fn with_hint(err: EngineError) -> anyhow::Error {
    let hint = err.user_hint().to_string();
    anyhow::Error::new(err).context(hint)
}

/// A line typed into the chat REPL
#[derive(Debug, PartialEq, Eq)]
enum ChatInput<'a> {
    Quit,
    Airport(&'a str),
    Key(&'a str),
    Question(&'a str),
}

impl<'a> ChatInput<'a> {
    fn parse(line: &'a str) -> Self {
        match line.split_once(char::is_whitespace) {
            Some(("/airport", code)) => ChatInput::Airport(code.trim()),
            Some(("/key", key)) => ChatInput::Key(key.trim()),
            _ if line == "/quit" || line == "/exit" => ChatInput::Quit,
            _ => ChatInput::Question(line),
        }
    }
}

/// Renders full-prefix updates on a terminal by printing only the new tail
#[derive(Debug, Default)]
struct PrefixPrinter {
    printed: String,
}

impl PrefixPrinter {
    fn render(&mut self, prefix: &str) {
        let mut stdout = std::io::stdout();
        match prefix.strip_prefix(self.printed.as_str()) {
            Some(tail) => {
                let _ = write!(stdout, "{}", tail);
            }
            None => {
                let _ = write!(stdout, "\n{}", prefix);
            }
        }
        let _ = stdout.flush();
        self.printed = prefix.to_string();
    }

    fn finish(&mut self) {
        if !self.printed.is_empty() {
            println!();
        }
        self.printed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_input_parsing() {
        assert_eq!(ChatInput::parse("/quit"), ChatInput::Quit);
        assert_eq!(ChatInput::parse("/airport lhr"), ChatInput::Airport("lhr"));
        assert_eq!(ChatInput::parse("/key  abc "), ChatInput::Key("abc"));
        assert_eq!(
            ChatInput::parse("Is EK001 late?"),
            ChatInput::Question("Is EK001 late?")
        );
    }

    #[test]
    fn test_prefix_printer_tracks_rendered_text() {
        let mut printer = PrefixPrinter::default();
        printer.render("Fli");
        printer.render("Flight");
        assert_eq!(printer.printed, "Flight");
        printer.finish();
        assert!(printer.printed.is_empty());
    }

    #[tokio::test]
    async fn test_ask_requires_airport() {
        let store = SessionStore::default();
        let assistant = FlightAssistant::with_cache(
            Arc::new(Config::default()),
            crate::cache::TtlCache::open_shared(std::time::Duration::from_secs(60), None),
        );
        store.set_credential("c", "key").await;

        let err = handle_ask(&store, &assistant, "c", None, "hi", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::AirportNotSelected));
    }

    #[tokio::test]
    async fn test_ask_requires_credential() {
        let store = SessionStore::default();
        let assistant = FlightAssistant::with_cache(
            Arc::new(Config::default()),
            crate::cache::TtlCache::open_shared(std::time::Duration::from_secs(60), None),
        );

        let err = handle_ask(&store, &assistant, "c", Some("DXB"), "hi", |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MissingCredential));

        let handle = store.get("c").await;
        assert!(!handle.lock().await.has_dependencies());
    }
}
