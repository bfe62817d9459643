//! Interactive story chat in the terminal.
//!
//! Run with: cargo run -p orchestrator --example story_chat
//!
//! Configuration via .env file or environment variables:
//!   STORY_API_KEY        - API key for the OpenAI-compatible endpoints (required)
//!   STORY_API_BASE       - Base URL (default: https://api.openai.com/v1)
//!   STORY_UTILITY_MODEL  - Model used to pick speakers (default: gpt-4o-mini)
//!   STORY_DIALOGUE_MODEL - Model used for replies (default: gpt-4o)
//!   DATABASE_URL         - SQLite URL (default: sqlite:troupe.db?mode=rwc)
//!   TROUPE_*             - Orchestrator settings (see OrchestratorConfig::from_env)
//!
//! Pass `--quiet` to skip live streaming: fragments go to the log (at debug)
//! and each reply is printed once it is saved.
//!
//! Commands:
//!   (empty line)   - let the characters carry on
//!   /rollback N    - delete everything after sequence N
//!   /new           - archive this conversation and start another
//!   /quit          - exit

use std::env;
use std::io::Write;
use std::sync::Arc;

use openai_brain::OpenAiBrain;
use orchestrator::{
    CapabilityClass, ChannelSink, Character, Conversation, Emitter, LoggingSink, ModelEndpoint,
    Orchestrator, OrchestratorConfig, Roster, SqliteEndpointStore, SqliteTranscriptStore, TurnEvent, TurnInput,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use troupe_database::Database;

const USER_ID: &str = "terminal";
const STORY_ID: &str = "rainy-inn";

fn roster() -> Result<Roster, orchestrator::OrchestratorError> {
    Roster::new(vec![
        Character::narrator(
            "narrator",
            "Narrator",
            "You narrate a cosy fantasy story set in a roadside inn on a stormy night. \
             Describe scenery and action briefly, in the present tense.",
        ),
        Character::new(
            "mira",
            "Mira",
            "You are Mira, the innkeeper. Warm, nosy and quick with a joke. \
             You know every rumour on the road.",
        ),
        Character::new(
            "tobin",
            "Tobin",
            "You are Tobin, a soaked and grumpy courier who wants a bed and no questions.",
        ),
    ])
}

fn opening(roster: &Roster) -> Vec<(Emitter, String)> {
    let mut lines = Vec::new();
    if let Some(narrator) = roster.narrator() {
        lines.push((
            Emitter::from_character(narrator),
            "(Rain hammers the shutters. The common room is warm and nearly empty.)".to_string(),
        ));
    }
    if let Some(mira) = roster.get("Mira") {
        lines.push((
            Emitter::from_character(mira),
            "Come in, come in, before you drown on my doorstep!".to_string(),
        ));
    }
    lines
}

async fn register_endpoints(store: &SqliteEndpointStore) -> Result<(), Box<dyn std::error::Error>> {
    let api_key = env::var("STORY_API_KEY").map_err(|_| "STORY_API_KEY must be set")?;
    let base_url =
        env::var("STORY_API_BASE").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
    let utility_model =
        env::var("STORY_UTILITY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
    let dialogue_model =
        env::var("STORY_DIALOGUE_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

    let endpoints = [
        ModelEndpoint::new(
            "story-utility",
            CapabilityClass::Utility,
            &base_url,
            &api_key,
            utility_model,
        ),
        ModelEndpoint::new(
            "story-dialogue",
            CapabilityClass::Dialogue,
            &base_url,
            &api_key,
            dialogue_model,
        ),
    ];

    for endpoint in &endpoints {
        if store.get(&endpoint.id).await.is_err() {
            store.insert(endpoint).await?;
            info!(endpoint = %endpoint.id, model = %endpoint.model, "Registered endpoint");
        }
    }
    Ok(())
}

async fn open_conversation(
    orchestrator: &Orchestrator,
    roster: &Roster,
) -> Result<Conversation, orchestrator::OrchestratorError> {
    match orchestrator.find_active(USER_ID, STORY_ID).await? {
        Some(conversation) => Ok(conversation),
        None => {
            orchestrator
                .start_conversation(USER_ID, STORY_ID, &opening(roster))
                .await
        }
    }
}

async fn print_transcript(
    orchestrator: &Orchestrator,
    conversation_id: &str,
) -> Result<(), orchestrator::OrchestratorError> {
    for message in orchestrator.messages(conversation_id).await? {
        println!("#{} {}: {}", message.sequence, message.speaker_label(), message.content);
    }
    Ok(())
}

/// Run one turn through the logging sink, printing only the saved replies.
async fn play_turn_quietly(
    orchestrator: &Orchestrator,
    conversation_id: &str,
    input: TurnInput,
    roster: &Roster,
) {
    match orchestrator
        .run_turn(conversation_id, input, roster, &LoggingSink)
        .await
    {
        Ok(outcome) => {
            for message in outcome.messages {
                println!("{}: {}", message.speaker_label(), message.content);
            }
        }
        Err(e) => error!(conversation_id, error = %e, "Turn failed"),
    }
}

/// Run one turn, printing fragments as they arrive.
async fn play_turn(orchestrator: &Orchestrator, conversation_id: &str, input: TurnInput, roster: &Roster) {
    let (sink, mut rx) = ChannelSink::new();

    let printer = tokio::spawn(async move {
        let mut speaking: Option<String> = None;
        while let Some(event) = rx.recv().await {
            match event {
                TurnEvent::SpeakersSelected { speakers } => {
                    tracing::debug!(?speakers, "Speakers selected");
                }
                TurnEvent::Fragment { speaker, text } => {
                    if speaking.as_deref() != Some(speaker.as_str()) {
                        print!("{}: ", speaker);
                        speaking = Some(speaker);
                    }
                    print!("{}", text);
                    let _ = std::io::stdout().flush();
                }
                TurnEvent::MessagePersisted { .. } => {
                    println!();
                    speaking = None;
                }
                TurnEvent::SpeakerFailed { speaker, error } => {
                    if speaking.take().is_some() {
                        println!();
                    }
                    eprintln!("[{} could not answer: {}]", speaker, error);
                }
            }
        }
    });

    let result = orchestrator
        .run_turn(conversation_id, input, roster, &sink)
        .await;
    drop(sink);
    let _ = printer.await;

    if let Err(e) = result {
        error!(conversation_id, error = %e, "Turn failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("orchestrator=info,openai_brain=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:troupe.db?mode=rwc".to_string());
    let db = Database::connect(&database_url).await?;
    db.migrate().await?;

    let endpoints = Arc::new(SqliteEndpointStore::new(db.clone()));
    register_endpoints(&endpoints).await?;

    let orchestrator = Orchestrator::builder(
        Arc::new(OpenAiBrain::from_env()?),
        endpoints,
        Arc::new(SqliteTranscriptStore::new(db.clone())),
    )
    .config(OrchestratorConfig::from_env())
    .build();

    let quiet = env::args().skip(1).any(|arg| arg == "--quiet");
    let roster = roster()?;
    let mut conversation = open_conversation(&orchestrator, &roster).await?;
    info!(conversation_id = %conversation.id, "Conversation ready");
    print_transcript(&orchestrator, &conversation.id).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();

        let input = match line {
            "/quit" => break,
            "/new" => {
                orchestrator.archive(&conversation.id).await?;
                conversation = open_conversation(&orchestrator, &roster).await?;
                print_transcript(&orchestrator, &conversation.id).await?;
                continue;
            }
            command if command.starts_with("/rollback") => {
                match command["/rollback".len()..].trim().parse::<i64>() {
                    Ok(target) => {
                        let removed = orchestrator.rollback(&conversation.id, target).await?;
                        println!("[removed {} messages]", removed);
                        print_transcript(&orchestrator, &conversation.id).await?;
                    }
                    Err(_) => eprintln!("usage: /rollback <sequence>"),
                }
                continue;
            }
            "" => TurnInput::Continue,
            text => TurnInput::User(text.to_string()),
        };

        if quiet {
            play_turn_quietly(&orchestrator, &conversation.id, input, &roster).await;
        } else {
            play_turn(&orchestrator, &conversation.id, input, &roster).await;
        }
    }

    db.close().await;
    Ok(())
}
