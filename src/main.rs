//! # kb-chat CLI (`kbchat`)
//!
//! Serves the chat API and offers offline views of the knowledge base and
//! template registry.
//!
//! ## Usage
//!
//! ```bash
//! kbchat --config ./config/kbchat.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kbchat serve` | Load corpus and templates, start the HTTP server |
//! | `kbchat search "<query>"` | Rank the knowledge base offline and print the context |
//! | `kbchat corpus` | List every loaded fragment |
//! | `kbchat prompts list` | List loaded prompt templates |
//! | `kbchat prompts get <name>` | Print one template body |
//!
//! ## Examples
//!
//! ```bash
//! # Start the server on the configured address
//! AZURE_OPENAI_ENDPOINT=https://acme.openai.azure.com AZURE_OPENAI_API_KEY=... kbchat serve
//!
//! # See which fragments a licensing question would retrieve
//! kbchat search "category 3A license fee" --agent-type license_recommendation
//! ```

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kb_chat::chat::{ChatService, ChatSettings};
use kb_chat::config::{self, Credentials};
use kb_chat::llm::AzureOpenAiClient;
use kb_chat::{inspect, loader, server, templates};

/// Chat completion with prompt templates and knowledge-base retrieval.
#[derive(Parser)]
#[command(
    name = "kbchat",
    about = "Chat completion with prompt templates and knowledge-base retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/kbchat.toml`. A missing file means built-in
    /// defaults.
    #[arg(long, global = true, default_value = "./config/kbchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Requires AZURE_OPENAI_ENDPOINT and AZURE_OPENAI_API_KEY.
    Serve {
        /// Override `[server].bind`.
        #[arg(long)]
        bind: Option<String>,
    },

    /// Rank the knowledge base against a query without calling the model.
    Search {
        query: String,

        /// Persona discriminator, e.g. `license_recommendation`.
        #[arg(long)]
        agent_type: Option<String>,

        /// Override `[knowledge_base].top_k`.
        #[arg(long)]
        top_k: Option<usize>,
    },

    /// List every fragment of the loaded corpus.
    Corpus,

    /// Inspect the prompt-template registry.
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },
}

#[derive(Subcommand)]
enum PromptsAction {
    /// List template names, kinds, and sources.
    List,
    /// Print one template body.
    Get { name: String },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("kbchat=info,kb_chat=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();
    config::load_dotenv();

    let mut cfg = config::load_config_or_default(&cli.config)?;
    cfg.apply_env_overrides(|key| std::env::var(key).ok())?;

    match cli.command {
        Commands::Serve { bind } => {
            let credentials = Credentials::from_env()?;
            let llm = AzureOpenAiClient::new(&credentials, &cfg.llm)
                .context("failed to build provider client")?;

            let corpus = loader::build_corpus(&cfg.knowledge_base)?;
            let registry = templates::load_registry(&cfg.templates);
            let chat = ChatService::new(
                Arc::new(corpus),
                Arc::new(registry),
                Arc::new(llm),
                ChatSettings::from(&cfg),
            );

            let bind = bind.unwrap_or_else(|| cfg.server.bind.clone());
            server::run_server(&bind, chat).await?;
        }
        Commands::Search {
            query,
            agent_type,
            top_k,
        } => {
            inspect::run_search(&cfg, &query, agent_type.as_deref(), top_k)?;
        }
        Commands::Corpus => {
            inspect::run_corpus(&cfg)?;
        }
        Commands::Prompts { action } => match action {
            PromptsAction::List => inspect::run_prompts_list(&cfg)?,
            PromptsAction::Get { name } => inspect::run_prompts_get(&cfg, &name)?,
        },
    }

    Ok(())
}
