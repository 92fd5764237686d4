use chat_server::network::Server;
use chat_server::profanity::WordListFilter;
use chat_shared::DEFAULT_PORT;
use clap::Parser;
use log::info;

/// Command line arguments; each flag can also come from the environment
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, env = "HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Extra words rejected by the profanity filter
    #[arg(long = "deny-word", env = "CHAT_DENY_WORDS", value_delimiter = ',')]
    deny_words: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut filter = WordListFilter::new();
    filter.extend(&args.deny_words);
    info!("Profanity filter loaded with {} words", filter.len());

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(&address, Box::new(filter)).await?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Received Ctrl+C, shutting down gracefully...");
        })
        .await?;

    Ok(())
}
