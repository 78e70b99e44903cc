use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use webmd_chat::constants::{DEFAULT_PORT, SITE_ROOT};
use webmd_chat::links::LinkInjector;
use webmd_chat::llm_interaction::GeminiClient;
use webmd_chat::probe::{HttpProber, UrlProber};
use webmd_chat::sitemap::SitemapCache;
use webmd_chat::{chat, formatter, web_server};

// Define the command-line interface structure using clap
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

// Define the available subcommands
#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Start the chat API and widget server.
    Start {
        #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT, help = "Port for the web server.")]
        port: u16,
    },
    /// Chat with a running server from the terminal.
    Chat {
        #[arg(long, default_value = "http://127.0.0.1:3000", help = "Base URL of the chat server.")]
        server: String,
    },
    /// Run a URL through the WebMD link checks and print its canonical form.
    Check {
        #[arg(help = "Raw URL, as it might appear in a model reply.")]
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for GEMINI_API_KEY and PORT)
    dotenvy::dotenv().ok();

    // Reads log level from RUST_LOG environment variable (e.g., RUST_LOG=info,webmd_chat=debug)
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    info!("webmd-chat starting with command: {:?}", cli.command);

    match cli.command {
        Commands::Start { port } => {
            let client = reqwest::Client::new();
            let sitemap = Arc::new(SitemapCache::new());

            // Not awaited: early requests see whatever the cache holds.
            let loader = sitemap.clone();
            let loader_client = client.clone();
            tokio::spawn(async move {
                let source = loader.load(&loader_client, SITE_ROOT).await;
                info!(?source, "Sitemap ready");
            });

            let prober: Arc<dyn UrlProber> = Arc::new(HttpProber::new(client, sitemap.clone()));
            let injector = Arc::new(LinkInjector::new(prober, sitemap));
            let state = web_server::AppState::new(Arc::new(GeminiClient::from_env()), injector)?;

            let server = web_server::start_web_server(port, state);
            tokio::pin!(server);

            tokio::select! {
                res = &mut server => {
                    if let Err(e) = &res {
                        error!("Web server failed: {:?}", e);
                    }
                    res?;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, shutting down.");
                }
            }
        }
        Commands::Chat { server } => {
            chat::run_chat(&server)
                .await
                .context("Chat session failed")?;
        }
        Commands::Check { url } => {
            let client = reqwest::Client::new();
            let sitemap = Arc::new(SitemapCache::new());
            let source = sitemap.load(&client, SITE_ROOT).await;
            info!(?source, urls = sitemap.len(), "Sitemap loaded");

            let prober = HttpProber::new(client, sitemap);
            match formatter::format_url(&url, &prober).await {
                Some(canonical) => println!("{}", canonical),
                None => println!("rejected"),
            }
        }
    }

    Ok(())
}
