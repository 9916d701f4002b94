//! CLI entry point for the Xiaohongshu assistant.
//!
//! This binary provides the `xhs` command: the terminal UI by default, plus
//! one-shot subcommands for each backend endpoint.

mod cli;
mod helpers;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};

use xhs_client::markdown::html_to_text;
use xhs_client::transport::connect;
use xhs_client::{
    ApiClient, App, Backend, ChatContent, ClientConfig, ClientId, ConnectionState, ServerEvent,
    TransportEvent,
};

use crate::cli::{Cli, Commands};
use crate::helpers::{
    decode_screenshot, format_result, format_task, init_file_tracing, init_tracing, load_config,
};

/// How long `chat` waits for the socket before giving up.
const CONNECT_WAIT: Duration = Duration::from_secs(15);

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.base_url, cli.log_level)?;
    let command = cli.command.unwrap_or(Commands::Tui);

    if command == Commands::Tui {
        init_file_tracing(&config.log_level, &config.log_file)?;
    } else {
        init_tracing(&config.log_level);
    }

    let api = ApiClient::new(&config).context("failed to build the REST client")?;
    info!(base_url = %api.base_url(), "backend selected");

    match command {
        Commands::Tui => cmd_tui(&config, api).await,
        Commands::Search { keyword } => cmd_search(&api, &keyword).await,
        Commands::Chat { message, idle_secs } => {
            cmd_chat(&config, &api, &message, Duration::from_secs(idle_secs)).await
        }
        Commands::Tasks { client_id } => cmd_tasks(&api, &ClientId::new(client_id)).await,
        Commands::Open => {
            println!("{}", api.open_xiaohongshu().await?);
            Ok(())
        }
        Commands::TestBrowser { save } => {
            let snapshot = api.test_browser().await?;
            println!("{}", snapshot.ocr_text.as_deref().unwrap_or("无文本"));
            if let Some(path) = save {
                let Some(image) = snapshot.image.as_deref() else {
                    bail!("backend returned no screenshot");
                };
                std::fs::write(&path, decode_screenshot(image)?)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("screenshot saved to {}", path.display());
            }
            Ok(())
        }
        Commands::OpenNote {
            note_id,
            xsec_token,
        } => {
            println!("{}", api.open_note(&note_id, &xsec_token).await?);
            Ok(())
        }
        Commands::Cancel { task_id, client_id } => {
            let message = api
                .cancel_auto_search(&ClientId::new(client_id), &task_id)
                .await?;
            println!("{message}");
            Ok(())
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand: tui
// ---------------------------------------------------------------------------

async fn cmd_tui(config: &ClientConfig, api: ApiClient) -> Result<()> {
    let client_id = ClientId::generate();
    let (transport, events) =
        connect(config, &client_id).context("failed to start the websocket session")?;

    let mut app = App::new(config, client_id, Arc::new(api));
    app.attach_transport(transport);

    xhs_tui::run_tui(app, Some(events)).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: search / tasks
// ---------------------------------------------------------------------------

async fn cmd_search(api: &ApiClient, keyword: &str) -> Result<()> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        bail!("请输入搜索关键词");
    }
    let results = api.search(keyword).await?;
    if results.is_empty() {
        println!("没有找到相关笔记");
    }
    for result in &results {
        println!("{}", format_result(result));
    }
    Ok(())
}

async fn cmd_tasks(api: &ApiClient, client_id: &ClientId) -> Result<()> {
    let tasks = api.list_tasks(client_id).await?;
    if tasks.is_empty() {
        println!("no tasks for session {client_id}");
    }
    for task in &tasks {
        println!("{}", format_task(task));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: chat
// ---------------------------------------------------------------------------

/// Wait until the transport reports an open socket.
async fn wait_until_open(events: &mut UnboundedReceiver<TransportEvent>) -> Result<()> {
    loop {
        match events.recv().await {
            Some(TransportEvent::Status(ConnectionState::Open)) => return Ok(()),
            Some(TransportEvent::Status(ConnectionState::Exhausted)) | None => {
                bail!("could not connect to the backend websocket")
            }
            Some(_) => {}
        }
    }
}

/// Replies arrive on the socket, so it is opened before the message is
/// posted. Frames are printed until none arrives for `idle`.
async fn cmd_chat(
    config: &ClientConfig,
    api: &ApiClient,
    message: &str,
    idle: Duration,
) -> Result<()> {
    let client_id = ClientId::generate();
    let (transport, mut events) = connect(config, &client_id)?;

    tokio::time::timeout(CONNECT_WAIT, wait_until_open(&mut events))
        .await
        .context("timed out connecting to the backend websocket")??;

    api.chat(&client_id, message).await?;

    while let Ok(Some(event)) = tokio::time::timeout(idle, events.recv()).await {
        match event {
            TransportEvent::Server(ServerEvent::ChatResponse { content, .. }) => {
                let (html, _) = ChatContent::from_value(content).render();
                println!("{}", html_to_text(&html));
            }
            TransportEvent::Server(ServerEvent::SearchIntent { keywords, task_id, .. }) => {
                println!("search intent: {keywords} (task {task_id})");
            }
            TransportEvent::Server(ServerEvent::Error { content }) => {
                eprintln!("error: {content}");
            }
            TransportEvent::Server(other) => info!(kind = other.kind(), "frame ignored"),
            TransportEvent::Status(ConnectionState::Exhausted) => {
                warn!("websocket gave up reconnecting");
                break;
            }
            TransportEvent::Status(_) => {}
        }
    }

    transport.shutdown().await;
    Ok(())
}
