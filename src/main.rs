use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use ethers::types::Address;
use phantom_client::config::{Config, EnvConfig};
use phantom_client::data::types::{MarketSnapshot, Side, UserPosition};
use phantom_client::data::view::{
    format_eth, format_percentage, no_percentage, shorten_address, time_left, yes_percentage, MarketStatus,
};
use phantom_client::execution::{SubmitOutcome, TicketDraft};
use phantom_client::PhantomClient;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "phantom")]
#[command(about = "Confidential prediction market client")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "phantom.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every market
    Markets,
    /// Show one market and, optionally, an account's position in it
    Market {
        id: String,
        #[arg(long)]
        account: Option<String>,
    },
    /// Keep a market snapshot fresh until Ctrl-C
    Watch { id: String },
    /// Place an encrypted position
    Place {
        id: String,
        #[arg(long, value_enum)]
        side: SideArg,
        #[arg(long)]
        amount: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SideArg {
    Yes,
    No,
}

impl From<SideArg> for Side {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Yes => Side::Yes,
            SideArg::No => Side::No,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = Config::load_or_default(&args.config)?;
    config.apply_env(&EnvConfig::load());
    tracing::info!(
        "Network: {} ({})",
        config.network.chain_name,
        config.network.chain_id_hex()
    );

    let client = PhantomClient::from_config(&config).await?;

    match args.command {
        Command::Markets => list_markets(&client).await,
        Command::Market { id, account } => {
            let account = account.map(|a| parse_address(&a)).transpose()?;
            show_market(&client, &id, account).await
        }
        Command::Watch { id } => watch_market(&client, &id).await,
        Command::Place { id, side, amount } => place(&client, &config, &id, side.into(), amount).await,
    }
}

fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .with_context(|| format!("Invalid address: {}", raw))
}

async fn list_markets(client: &PhantomClient) -> Result<()> {
    let markets = client.gateway().fetch_markets().await?;
    if markets.is_empty() {
        println!("No markets yet");
        return Ok(());
    }

    let now = Utc::now();
    for market in &markets {
        println!(
            "{:<12} {:<10} YES {:>6} | NO {:>6}  {}  {}",
            market.id,
            MarketStatus::of(market, now).to_string(),
            format_percentage(yes_percentage(market)),
            format_percentage(no_percentage(market)),
            format_eth(market.total_pool()),
            market.question
        );
    }
    Ok(())
}

async fn show_market(client: &PhantomClient, id: &str, account: Option<Address>) -> Result<()> {
    let account = account.or_else(|| client.wallet().account());
    if !client.refresher().refresh(id, account).await {
        bail!("Could not load market {}", id);
    }
    let Some((market, position)) = client.cache().view(id, account) else {
        bail!("Market {} not found", id);
    };
    print_market(&market, account.zip(position));
    Ok(())
}

async fn watch_market(client: &PhantomClient, id: &str) -> Result<()> {
    let account = client.wallet().account();
    if !client.refresher().refresh(id, account).await {
        tracing::warn!("Initial load of {} failed, waiting for the next poll", id);
    }
    let _guard = client.refresher().watch(id, account);
    let poller = client.refresher().spawn_polling();

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last_seen = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let Some((market, position)) = client.cache().view(id, account) else {
                    continue;
                };
                let pools = (market.yes_pool, market.no_pool);
                if last_seen != Some(pools) {
                    last_seen = Some(pools);
                    print_market(&market, account.zip(position));
                }
            }
        }
    }

    tracing::info!("Shutting down...");
    poller.abort();
    Ok(())
}

async fn place(client: &PhantomClient, config: &Config, id: &str, side: Side, amount: String) -> Result<()> {
    let Some(market) = client.gateway().fetch_market_by_id(id).await else {
        bail!("Market {} not found", id);
    };
    if !MarketStatus::of(&market, Utc::now()).accepts_positions() {
        bail!("Market {} is not accepting positions", id);
    }

    let mut draft = TicketDraft::new(side, amount);
    let mut states = client.workflow().subscribe();
    let progress = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            tracing::info!("{:?}", state);
        }
    });

    let outcome = client.workflow().submit(&market, &mut draft).await;
    progress.abort();

    match outcome? {
        SubmitOutcome::ConnectRequested(Some(account)) => {
            println!("Connected {}. Run the command again to place.", shorten_address(account));
        }
        SubmitOutcome::ConnectRequested(None) => {
            bail!("Wallet connection was not granted");
        }
        SubmitOutcome::Confirmed(inclusion) => {
            let link = config
                .network
                .explorer_tx_url(inclusion.tx_hash)
                .unwrap_or_else(|| format!("{:?}", inclusion.tx_hash));
            println!("Confirmed in block #{}: {}", inclusion.block_number, link);
            if let Some((market, position)) = client.cache().view(id, client.wallet().account()) {
                print_market(&market, client.wallet().account().zip(position));
            }
        }
    }
    Ok(())
}

fn print_market(market: &MarketSnapshot, position: Option<(Address, UserPosition)>) {
    let now = Utc::now();
    println!("{} [{}]", market.question, market.category);
    println!(
        "  status {}  closes {}  entry fee {}",
        MarketStatus::of(market, now),
        time_left(market.lock_time, now),
        format_eth(market.entry_fee)
    );
    println!(
        "  YES {} ({})  NO {} ({})",
        format_eth(market.yes_pool),
        format_percentage(yes_percentage(market)),
        format_eth(market.no_pool),
        format_percentage(no_percentage(market))
    );
    if market.decryptable {
        println!("  revealed YES {}  NO {}", market.revealed_yes, market.revealed_no);
    }

    match position {
        Some((account, p)) if p.exists => println!(
            "  {} holds {} on {}{}",
            shorten_address(account),
            format_eth(p.stake),
            if p.vote_yes { Side::Yes } else { Side::No },
            if p.claimed { " (claimed)" } else { "" }
        ),
        Some((account, _)) => println!("  {} has no position", shorten_address(account)),
        None => {}
    }
}
