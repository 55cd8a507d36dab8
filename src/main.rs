// src/main.rs
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};
use portfolio_valuation::{
    config::load_config,
    models::{Chain, Holding, PortfolioSummary, TokenRef},
    tokens::{TokenLibrary, TokenResolver},
    utils::{parse_log_level, setup_logging},
    ValuationEngine,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about = "Multichain portfolio valuation")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Value holdings read from a JSON array
    Value(ValueArgs),

    /// Print the canonical price id for one token reference
    Resolve(ResolveArgs),

    /// List the token library
    Tokens(TokensArgs),
}

#[derive(Args, Debug)]
struct ValueArgs {
    /// JSON file: [{"chain": "...", "address": "...", "token_ref": "...", "symbol": "..."}]
    #[arg(long)]
    holdings: PathBuf,

    /// Repeat the pass to exercise the warm price cache
    #[arg(long, default_value_t = 1)]
    passes: usize,
}

#[derive(Args, Debug)]
struct ResolveArgs {
    #[arg(long)]
    chain: Chain,

    /// Contract / mint / coin type, or "native"
    #[arg(long, default_value = "native")]
    token_ref: String,

    #[arg(long, default_value = "")]
    symbol: String,
}

#[derive(Args, Debug)]
struct TokensArgs {
    #[arg(long)]
    chain: Option<Chain>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenv::dotenv().ok();
    let level = std::env::var("LOG_LEVEL").unwrap_or_default();
    setup_logging(parse_log_level(&level)).context("initializing logging")?;

    let config = load_config().context("loading configuration")?;

    match cli.cmd {
        Command::Value(args) => {
            let raw = std::fs::read_to_string(&args.holdings)
                .with_context(|| format!("reading {}", args.holdings.display()))?;
            let holdings: Vec<Holding> = serde_json::from_str(&raw)
                .with_context(|| format!("parsing holdings from {}", args.holdings.display()))?;
            info!("📂 Loaded {} holding(s) from {}", holdings.len(), args.holdings.display());

            let engine = ValuationEngine::from_config(&config)?;
            for pass in 1..=args.passes.max(1) {
                let results = engine.value(holdings.clone()).await;
                let summary = PortfolioSummary::from_results(&results);

                println!("{}", serde_json::to_string_pretty(&results)?);
                println!("{}", serde_json::to_string_pretty(&summary)?);
                info!("🏁 Pass {} done: coverage {:.1}%", pass, summary.coverage_percent());
            }

            let cache = engine.cache_stats();
            info!(
                "🗄️ Price cache: {} entries ({} fresh), hit rate {:.1}%",
                cache.entry_count,
                cache.fresh_count,
                cache.hit_rate_percent()
            );
            println!("{}", serde_json::to_string_pretty(&engine.batcher_stats())?);
        }
        Command::Resolve(args) => {
            let library = TokenLibrary::load(config.custom_tokens_path.as_deref())?;
            let resolver = TokenResolver::new(Arc::new(library), config.token_symbol_fallback);
            let token_ref = TokenRef::from(args.token_ref.as_str());
            match resolver.resolve(args.chain, &token_ref, &args.symbol) {
                Ok(id) => println!("{}", id),
                Err(e) => {
                    warn!("❌ {}", e);
                    std::process::exit(1);
                }
            }
        }
        Command::Tokens(args) => {
            let library = TokenLibrary::load(config.custom_tokens_path.as_deref())?;
            let tokens = library.tokens(args.chain);
            println!("{}", serde_json::to_string_pretty(&tokens)?);
            info!("📚 {} token(s) listed", tokens.len());
        }
    }

    Ok(())
}
