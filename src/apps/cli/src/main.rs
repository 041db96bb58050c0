//! TARX CLI
//!
//! Streams one completion to stdout, or prints backend connectivity with `--status`.

mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use std::io::Write;
use std::path::PathBuf;
use tarx_core::{ConversationTurn, RetryPolicy, StreamEvent, TarxClientConfig, TarxMeshClient};
use tokio::io::AsyncReadExt;

#[derive(Parser, Debug)]
#[command(name = "tarx", version, about = "Stream a completion from the local TARX server or mesh")]
struct Cli {
    /// Prompt to send; read from stdin when omitted
    prompt: Option<String>,

    /// System prompt placed before the conversation
    #[arg(short, long, default_value = "")]
    system: String,

    /// Config file (TOML); defaults to <config dir>/tarx/config.toml
    #[arg(short, long, env = "TARX_CONFIG")]
    config: Option<PathBuf>,

    /// Local inference server base URL
    #[arg(long)]
    local_url: Option<String>,

    /// Mesh API base URL
    #[arg(long)]
    mesh_url: Option<String>,

    /// Model identifier
    #[arg(short, long)]
    model: Option<String>,

    /// Never route to the mesh
    #[arg(long)]
    no_mesh: bool,

    /// Total attempts for errors raised before any output
    #[arg(long, default_value_t = 1)]
    attempts: u32,

    /// Print connectivity of both backends and exit
    #[arg(long)]
    status: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,

    /// Shorthand for debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn load_config(&self) -> Result<TarxClientConfig> {
        let config = match &self.config {
            Some(path) => TarxClientConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => TarxClientConfig::load_default().context("failed to load default config")?,
        };

        let mut config = config.with_env_overrides();
        if let Some(url) = &self.local_url {
            config.local_server_url = url.clone();
        }
        if let Some(url) = &self.mesh_url {
            config.mesh_api_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if self.no_mesh {
            config.enable_mesh_routing = false;
        }

        config.validate()?;
        Ok(config)
    }

    async fn read_prompt(&self) -> Result<String> {
        if let Some(prompt) = &self.prompt {
            return Ok(prompt.clone());
        }
        let mut input = String::new();
        tokio::io::stdin()
            .read_to_string(&mut input)
            .await
            .context("failed to read prompt from stdin")?;
        Ok(input.trim_end().to_string())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_logging(logging::resolve_level(cli.log_level.as_deref(), cli.verbose));

    let config = cli.load_config()?;
    let client = TarxMeshClient::new(config);

    if cli.status {
        print_status(&client).await;
        return Ok(());
    }

    let prompt = cli.read_prompt().await?;
    if prompt.is_empty() {
        bail!("empty prompt");
    }

    let history = [ConversationTurn::user(prompt)];
    let policy = RetryPolicy {
        max_attempts: cli.attempts.max(1),
        ..RetryPolicy::default()
    };
    let mut stream = client.create_message_with_retry(
        policy,
        RetryPolicy::default_predicate,
        &cli.system,
        &history,
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;
    let mut stdout = std::io::stdout();

    loop {
        let next = tokio::select! {
            item = stream.next() => item,
            _ = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                client.abort();
                continue;
            }
        };

        match next {
            Some(Ok(StreamEvent::TextDelta { text })) => {
                stdout.write_all(text.as_bytes())?;
                stdout.flush()?;
            }
            Some(Ok(StreamEvent::Usage {
                input_tokens,
                output_tokens,
            })) => {
                writeln!(stdout)?;
                tracing::info!(
                    "Completion finished: input_tokens={}, output_tokens={}",
                    input_tokens,
                    output_tokens
                );
            }
            Some(Err(e)) => {
                writeln!(stdout)?;
                return Err(e.into());
            }
            None => break,
        }
    }

    if interrupted {
        writeln!(stdout)?;
        eprintln!("Aborted");
    }
    Ok(())
}

async fn print_status(client: &TarxMeshClient) {
    let (local, mesh) = tokio::join!(client.check_local_health(), client.mesh_connectivity());
    let model = client.get_model();
    println!("Local server: {}", local.summary());
    println!("Mesh:         {}", mesh.summary());
    println!(
        "Model:        {} (context {} tokens)",
        model.id, model.info.context_window
    );
}
