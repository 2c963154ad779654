use anyhow::Context;
use content_assistant::config::Config;
use content_assistant::context::registry::known_models;
use content_assistant::telemetry::init_tracing;
use content_assistant::{init_assistant, ConversationHistory, ModelSelection, PromptTemplate};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const HELP: &str = "Commands:
  /model            show the current model and the available ones
  /model <name>     switch model (persisted)
  /reset            clear the conversation
  /quit             exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("ASSISTANT_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = Config::from_file(&config_path).context("Failed to load configuration")?;
    init_tracing(&config.logging)?;

    let assistant = init_assistant(&config).context("Failed to initialize assistant")?;
    let mut selection = ModelSelection::load(&config.model.selection_file);
    if !selection.available_models.contains(&selection.current_model) {
        selection.current_model = config.model.default_model.clone();
    }
    info!("Using model {}", selection.current_model);

    let template = PromptTemplate::default();
    let mut history = ConversationHistory::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Content assistant ({}). Type /help for commands.", selection.current_model);
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/help", _) => println!("{}", HELP),
            ("/reset", _) => {
                history = ConversationHistory::new();
                println!("Conversation cleared.");
            }
            ("/model", "") => {
                println!("Current model: {}", selection.current_model);
                println!("Available: {}", selection.available_models.join(", "));
            }
            ("/model", name) => match selection.select(name) {
                Ok(()) => {
                    selection
                        .save(&config.model.selection_file)
                        .context("Failed to save model selection")?;
                    println!("Switched to {}", name);
                }
                Err(e) => println!("{}", e),
            },
            ("/models", _) => println!("Known models: {}", known_models().join(", ")),
            _ => {
                let cancel = CancellationToken::new();
                let ctrl_c = cancel.clone();
                let interrupt = tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        ctrl_c.cancel();
                    }
                });

                let result = assistant
                    .orchestrator
                    .generate(line, &template, &history, &selection.current_model, &cancel)
                    .await;
                interrupt.abort();

                match result {
                    Ok(reply) => {
                        println!("{}\n", reply);
                        history.push_user(line);
                        history.push_assistant(reply);
                    }
                    Err(e) => {
                        error!("Request failed: {}", e);
                        println!("Error: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}
