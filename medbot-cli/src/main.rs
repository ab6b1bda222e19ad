mod client;
mod conversation_logger;

use anyhow::Result;
use client::RelayClient;
use conversation_logger::{ConversationLogger, EntryType};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_RELAY_URL: &str = "http://localhost:10000/api/chat";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    // Quiet by default so log lines don't interleave with replies.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let url = std::env::var("RELAY_URL").unwrap_or_else(|_| DEFAULT_RELAY_URL.to_string());
    let client = RelayClient::new(url)?;
    let logger = ConversationLogger::default();
    if let Some(path) = logger.get_current_log_path() {
        info!("Logging conversation to: {:?}", path);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let reply = exchange(&client, &logger, &args.join(" ")).await?;
        println!("{}", reply);
        return Ok(());
    }

    run_interactive(&client, &logger).await
}

async fn run_interactive(client: &RelayClient, logger: &ConversationLogger) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Medical assistant at {} (type /quit to exit)", client.url());
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/quit" {
            break;
        }

        match exchange(client, logger, message).await {
            Ok(reply) => println!("{}\n", reply),
            Err(e) => eprintln!("error: {:#}\n", e),
        }
    }

    Ok(())
}

async fn exchange(client: &RelayClient, logger: &ConversationLogger, message: &str) -> Result<String> {
    logger.record(EntryType::UserMessage {
        content: message.to_string(),
    });

    match client.send(message).await {
        Ok(reply) => {
            logger.record(EntryType::AssistantMessage {
                content: reply.clone(),
            });
            Ok(reply)
        }
        Err(e) => {
            logger.record(EntryType::Error {
                content: format!("{:#}", e),
            });
            Err(e)
        }
    }
}
