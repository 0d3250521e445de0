mod render;

use chrono::{Local, NaiveDateTime, Timelike};
use clap::{Parser, Subcommand};
use color_eyre::eyre::bail;
use crypto_portfolio_core::errors::CoreError;
use crypto_portfolio_core::models::analytics::PortfolioView;
use crypto_portfolio_core::models::settings::{default_settings_path, Settings};
use crypto_portfolio_core::models::transaction::{parse_timestamp, TransactionEdit, TransactionInput};
use crypto_portfolio_core::services::scheduler::RefreshScheduler;
use crypto_portfolio_core::PortfolioTracker;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(name = "crypto-portfolio")]
#[command(about = "Track crypto purchases and their profit/loss at live prices")]
struct Args {
    /// Settings file (default: <config dir>/crypto-portfolio/settings.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database holding the transactions
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Quote currency, e.g. usd or eur
    #[arg(long, global = true)]
    currency: Option<String>,

    /// Log level (debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Record a purchase
    Add {
        /// CoinGecko coin id, e.g. bitcoin
        coin: String,

        /// Display name (default: looked up in the coin catalog)
        #[arg(long)]
        name: Option<String>,

        /// Units bought
        #[arg(short, long, conflicts_with = "investment", required_unless_present = "investment")]
        quantity: Option<f64>,

        /// Cash spent; the quantity is derived from the price
        #[arg(short, long)]
        investment: Option<f64>,

        /// Unit price paid
        #[arg(short, long)]
        price: f64,

        /// Purchase time, "YYYY-MM-DD HH:MM" (default: now)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Change date, quantity, price or invested cash of a transaction
    Edit {
        id: i64,

        #[arg(short, long)]
        date: Option<String>,

        #[arg(short, long)]
        quantity: Option<f64>,

        #[arg(short, long)]
        price: Option<f64>,

        #[arg(short, long)]
        investment: Option<f64>,
    },

    /// Delete one transaction
    Delete { id: i64 },

    /// Delete every transaction
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },

    /// Show stored transactions without fetching prices
    List,

    /// Refresh prices once and show the portfolio
    Summary,

    /// Refresh prices on a timer and redraw the portfolio
    Watch {
        /// Seconds between refreshes (default: from settings)
        #[arg(short, long)]
        interval: Option<u64>,
    },

    /// Search the coin catalog
    Coins {
        /// Matched against id, symbol and name
        #[arg(default_value = "")]
        query: String,

        #[arg(long, default_value_t = 25)]
        limit: usize,
    },

    /// Show a coin's price history
    History {
        coin: String,

        /// Number of days (1 to 90)
        #[arg(long, default_value_t = 30)]
        days: u32,
    },
}

fn init_logging(level: &str) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn load_settings(args: &Args) -> color_eyre::Result<Settings> {
    let path = match &args.config {
        Some(path) if !path.exists() => bail!("Settings file not found: {}", path.display()),
        Some(path) => path.clone(),
        None => default_settings_path(),
    };
    let mut settings = Settings::load(&path)?;
    if let Some(db) = &args.database {
        settings.database_path = Some(db.clone());
    }
    if let Some(currency) = &args.currency {
        settings.vs_currency = currency.to_lowercase();
    }
    settings.validate()?;
    Ok(settings)
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(&args.log_level);
    let settings = load_settings(&args)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args.command, settings))
}

async fn run(command: Command, settings: Settings) -> color_eyre::Result<()> {
    let mut tracker = PortfolioTracker::open(&settings)?;
    let currency = settings.vs_currency.clone();

    match command {
        Command::Add {
            coin,
            name,
            quantity,
            investment,
            price,
            date,
        } => {
            let input = match (quantity, investment) {
                (Some(q), _) => TransactionInput::Quantity(q),
                (None, Some(cash)) => TransactionInput::Investment(cash),
                (None, None) => bail!("Either --quantity or --investment is required"),
            };
            let timestamp = match date {
                Some(raw) => parse_timestamp(&raw)?,
                None => now_to_minute(),
            };
            let name = match name {
                Some(name) => name,
                None => catalog_label(&mut tracker, &coin).await,
            };

            // Fetch first so the new row gets a price snapshot.
            let current = tracker.current_price(&coin).await;
            let id = tracker.add_transaction(&name, &coin, input, price, timestamp)?;
            println!("Added transaction #{id} ({name})");
            match current {
                Some(p) => println!("Current price: {}", render::format_price(p, &currency)),
                None => println!("Current price unavailable"),
            }
        }

        Command::Edit {
            id,
            date,
            quantity,
            price,
            investment,
        } => {
            let edit = TransactionEdit {
                timestamp: date.as_deref().map(parse_timestamp).transpose()?,
                quantity,
                purchase_price: price,
                invested_cash: investment,
            };
            if edit == TransactionEdit::default() {
                bail!("Nothing to edit: pass --date, --quantity, --price or --investment");
            }
            if !tracker.edit_transaction(id, &edit)? {
                return Err(CoreError::TransactionNotFound(id).into());
            }
            println!("Updated transaction #{id}");
        }

        Command::Delete { id } => {
            if !tracker.delete_transaction(id)? {
                return Err(CoreError::TransactionNotFound(id).into());
            }
            println!("Deleted transaction #{id}");
        }

        Command::Clear { yes } => {
            if !yes {
                println!("This deletes every transaction. Re-run with --yes to confirm.");
                return Ok(());
            }
            let removed = tracker.clear_transactions()?;
            println!("Deleted {removed} transaction(s)");
        }

        Command::List => {
            render::print_transactions(&tracker.transactions()?, &currency);
        }

        Command::Summary => {
            let view = refresh_pass(&mut tracker).await?;
            render::print_view(&view, &currency);
        }

        Command::Watch { interval } => {
            let interval = match interval {
                Some(0) => bail!("--interval must be at least 1 second"),
                Some(secs) => Duration::from_secs(secs),
                None => settings.refresh_interval(),
            };
            let scheduler = RefreshScheduler::new(interval)
                .with_error_backoff(settings.refresh_error_backoff());
            watch(&mut tracker, scheduler, &currency).await?;
        }

        Command::Coins { query, limit } => {
            let coins = tracker.search_coins(&query).await?;
            let shown = &coins[..coins.len().min(limit)];
            render::print_coins(shown, coins.len());
        }

        Command::History { coin, days } => {
            let points = tracker.price_history(&coin, days).await?;
            render::print_history(&coin, &points, &currency);
        }
    }
    Ok(())
}

async fn refresh_pass(tracker: &mut PortfolioTracker) -> Result<PortfolioView, CoreError> {
    tracker.refresh_prices().await?;
    tracker.compute_view()
}

/// Live dashboard. Enter refreshes now, `p` pauses or resumes the timer,
/// `q` or Ctrl-C quits.
async fn watch(
    tracker: &mut PortfolioTracker,
    mut scheduler: RefreshScheduler,
    currency: &str,
) -> color_eyre::Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    // One listener for the whole loop so a Ctrl-C during a pass is not lost.
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(cmd)) => match cmd.trim() {
                    "q" => break,
                    "p" => {
                        let live = scheduler.toggle_live();
                        println!("Live refresh {}", if live { "resumed" } else { "paused" });
                    }
                    _ => scheduler.request_refresh(),
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    log::warn!("Failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
            _ = &mut ctrl_c => break,
        }

        let now = Instant::now();
        if !scheduler.is_due(now) {
            continue;
        }
        let Some(result) = unless_shutdown(refresh_pass(tracker), &mut ctrl_c).await else {
            break;
        };
        match result {
            Ok(view) => {
                scheduler.mark_ran(now);
                print!("\x1B[2J\x1B[H");
                render::print_view(&view, currency);
                println!();
                println!(
                    "Updated {}  |  live: {}  |  budget left: {}  |  Enter = refresh, p = pause, q = quit",
                    Local::now().format("%H:%M:%S"),
                    if scheduler.is_live() { "on" } else { "off" },
                    tracker.gateway_mut().remaining_budget(),
                );
            }
            Err(e) => {
                log::error!("Refresh failed: {e}");
                eprintln!("Refresh failed: {e}. Retrying in {:?}", scheduler.error_backoff());
                let backoff = tokio::time::sleep(scheduler.error_backoff());
                if unless_shutdown(backoff, &mut ctrl_c).await.is_none() {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Run `work` unless `shutdown` completes first. The same pinned `shutdown`
/// is reused across calls, so a signal is never missed between them.
async fn unless_shutdown<F, S>(work: F, shutdown: &mut Pin<&mut S>) -> Option<F::Output>
where
    F: Future,
    S: Future,
{
    tokio::select! {
        out = work => Some(out),
        _ = shutdown.as_mut() => None,
    }
}

/// "Name (SYM)" from the catalog, or the coin id when it is not listed.
async fn catalog_label(tracker: &mut PortfolioTracker, coin: &str) -> String {
    match tracker.search_coins(coin).await {
        Ok(coins) => coins
            .into_iter()
            .find(|c| c.id == coin)
            .map(|c| c.label())
            .unwrap_or_else(|| coin.to_string()),
        Err(e) => {
            log::warn!("Coin catalog unavailable, using id as name: {e}");
            coin.to_string()
        }
    }
}

fn now_to_minute() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now)
}
