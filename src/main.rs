//! Line-oriented driver for the analysis session
//!
//! Reads commands from stdin, one per line:
//! - `/upload <path>` select and upload a video
//! - `/download` save the processed video
//! - `/reset` start over
//! - `/status` show the session phase
//! - `/quit` exit
//!
//! Any other non-empty line is sent to the service as chat text.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use biomech_client::analysis::bytes_to_mb;
use biomech_client::{
    init_logging, AnalysisSummary, HttpTransport, Message, MessageRole, ServiceConfig,
    SessionController, VideoFile,
};

enum Command<'a> {
    Upload(&'a str),
    Download,
    Reset,
    Status,
    Quit,
    Chat(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Option<Command<'a>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        Some(match head {
            "/upload" => Command::Upload(rest.trim()),
            "/download" => Command::Download,
            "/reset" => Command::Reset,
            "/status" => Command::Status,
            "/quit" | "/exit" => Command::Quit,
            _ => Command::Chat(line),
        })
    }
}

fn print_message(message: &Message) {
    let label = match message.role {
        MessageRole::System => "system",
        MessageRole::User => "you",
        MessageRole::Assistant => "coach",
    };
    println!("[{}] {}", label, message.plain_text());
    if let Some(video) = message.video.as_deref().filter(|v| !v.is_empty()) {
        println!("        video: {}", video);
    }
}

/// Print transcript entries added since `seen`, returning the new length
async fn print_new_messages(controller: &SessionController, seen: usize) -> usize {
    let session = controller.snapshot().await;
    let start = seen.min(session.transcript.len());
    for message in &session.transcript[start..] {
        print_message(message);
    }
    session.transcript.len()
}

async fn upload(controller: &SessionController, path: &str) -> Result<()> {
    if path.is_empty() {
        anyhow::bail!("Usage: /upload <path>");
    }
    let file = VideoFile::from_path(Path::new(path)).await?;
    controller.select_file(file).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let config = ServiceConfig::load().context("Failed to load configuration")?;
    log::info!("Using analysis service at {}", config.base_url);

    let download_dir = config.download_dir.clone();
    let transport = HttpTransport::new(config).context("Failed to build HTTP client")?;
    let controller = SessionController::new(Arc::new(transport), download_dir);

    println!("Cricket biomechanics analysis. /upload <path> to begin, /quit to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut seen = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };

        let outcome: Result<()> = match command {
            Command::Quit => break,
            Command::Upload(path) => {
                seen = 0;
                upload(&controller, path).await
            }
            Command::Chat(text) => controller.send_text(text).await.map(|_| ()).map_err(Into::into),
            Command::Reset => {
                controller.reset().await;
                seen = 0;
                println!("Session reset.");
                Ok(())
            }
            Command::Download => controller
                .download_processed_video()
                .await
                .map(|path| println!("Saved processed video to {}", path.display()))
                .map_err(Into::into),
            Command::Status => {
                let session = controller.snapshot().await;
                println!(
                    "Session {} phase={:?} messages={}",
                    session.id,
                    session.phase,
                    session.transcript.len()
                );
                Ok(())
            }
        };

        let before = seen;
        seen = print_new_messages(&controller, seen).await;
        let session = controller.snapshot().await;

        if let Err(e) = outcome {
            // Chat failures are already in the transcript
            if seen == before {
                eprintln!("Error: {}", e);
            }
        }

        if seen > before && session.is_complete() {
            if let Some(results) = &session.results {
                println!("{}", AnalysisSummary::from_results(results).to_text());
            }
            if let Some(video) = &session.output_video {
                println!("Processed video: {} ({:.2} MB)", video.path, bytes_to_mb(video.size));
            }
        }
    }

    log::info!("Exiting");
    Ok(())
}
