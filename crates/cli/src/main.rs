use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fintrack_core::backend::client::FintrackClient;
use fintrack_core::backend::error::BackendError;
use fintrack_core::backend::session::Session;
use fintrack_core::backend::types::{AddToWatchlistRequest, StrategyParams};
use fintrack_core::domain::stock::Locale;
use fintrack_core::filter::{apply_filter, DashboardFilter};
use fintrack_core::llm::error::LlmDiagnosticsError;
use fintrack_core::normalize::normalize_response;

mod render;

#[derive(Debug, Parser)]
#[command(name = "fintrack", about = "Stock tracking and AI price predictions")]
struct Args {
    /// Session token; defaults to FINTRACK_TOKEN.
    #[arg(long, global = true)]
    token: Option<String>,

    /// Print raw JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Public dashboard predictions, normalized per symbol.
    Predictions {
        #[arg(long, default_value = "en")]
        lang: Locale,
        /// all, highest-confidence, potential-growth, bullish, bearish
        #[arg(long, default_value = "all")]
        filter: DashboardFilter,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
    /// Prints the session token on success.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Profile,
    Logout,
    #[command(subcommand)]
    Watchlist(WatchlistCommand),
    #[command(subcommand)]
    Strategy(StrategyCommand),
    /// Latest quotes for the given symbols.
    Quotes {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
    /// Resolve a symbol to its company name.
    Lookup {
        symbol: String,
        #[arg(long, default_value_t = 1)]
        stock_type: i32,
    },
    MarketStatus,
    /// Generative-AI predictions (offline values without GEMINI_API_KEY).
    AiPredict {
        #[arg(required = true)]
        symbols: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum WatchlistCommand {
    List,
    Add {
        symbol: String,
        #[arg(long)]
        stock_type: Option<i32>,
    },
    Remove {
        id: i64,
    },
    /// Attach a saved strategy to a watched symbol.
    Bind {
        symbol: String,
        strategy_unique_key: String,
    },
}

#[derive(Debug, Subcommand)]
enum StrategyCommand {
    List,
    Get {
        unique_key: String,
    },
    /// Save a strategy; unspecified parameters use the form defaults.
    Save {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        unique_key: String,
        #[arg(long)]
        buy_threshold_pct: Option<f64>,
        #[arg(long)]
        sell_threshold_pct: Option<f64>,
        #[arg(long)]
        initial_cash: Option<f64>,
        #[arg(long)]
        no_rebalance: bool,
        #[arg(long)]
        max_position_pct: Option<f64>,
        #[arg(long)]
        min_position_pct: Option<f64>,
        #[arg(long)]
        trade_fee_rate: Option<f64>,
        #[arg(long)]
        take_profit_threshold_pct: Option<f64>,
        #[arg(long)]
        take_profit_sell_frac: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = fintrack_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(&settings, args).await;
    if let Err(err) = &result {
        if let Some(backend) = err.downcast_ref::<BackendError>() {
            if backend.is_unauthorized() {
                tracing::error!("session rejected by backend; log in again and update FINTRACK_TOKEN");
            }
        }
        if let Some(diag) = err.downcast_ref::<LlmDiagnosticsError>() {
            tracing::debug!(
                stage = diag.stage,
                finish_reason = ?diag.finish_reason,
                raw_output = diag.raw_output.as_deref().unwrap_or(""),
                "AI model diagnostics"
            );
        }
        sentry_anyhow::capture_anyhow(err);
    }
    result
}

async fn run(settings: &fintrack_core::config::Settings, args: Args) -> anyhow::Result<()> {
    let client = FintrackClient::from_settings(settings)?;
    let mut session = match args.token.as_deref() {
        Some(token) => Session::with_token(token),
        None => Session::from_settings(settings),
    };
    let json = args.json;

    match args.command {
        Command::Predictions { lang, filter } => {
            let res = client.public_predictions(&session).await?;
            let stocks = apply_filter(normalize_response(&res, lang), filter);
            tracing::info!(received = res.items.len(), shown = stocks.len(), ?filter, "predictions");
            if json {
                render::print_json(&stocks)?;
            } else {
                render::print_stocks(&stocks);
            }
        }
        Command::Register {
            email,
            username,
            password,
        } => {
            let res = client.register(&email, &username, &password).await?;
            println!("{}", res.token);
        }
        Command::Login { email, password } => {
            let res = client.login(&email, &password).await?;
            println!("{}", res.token);
        }
        Command::Profile => {
            require_auth(&session)?;
            let user = client.profile(&session).await?;
            render::print_json(&user)?;
        }
        Command::Logout => {
            require_auth(&session)?;
            client.logout(&mut session).await?;
            println!("logged out");
        }
        Command::Watchlist(cmd) => {
            require_auth(&session)?;
            run_watchlist(&client, &session, cmd, json).await?;
        }
        Command::Strategy(cmd) => {
            require_auth(&session)?;
            run_strategy(&client, &session, cmd, json).await?;
        }
        Command::Quotes { symbols } => {
            let res = client.batch_latest_quotes(&session, &symbols).await?;
            if json {
                render::print_json(&res)?;
            } else {
                render::print_quotes(&res.quotes);
            }
        }
        Command::Lookup { symbol, stock_type } => {
            let res = client.lookup_stock(&session, &symbol, stock_type).await?;
            println!("{}\t{}", res.symbol, res.name);
        }
        Command::MarketStatus => {
            let status = client.market_status();
            if json {
                render::print_json(&status)?;
            } else {
                render::print_market_status(&status);
            }
        }
        Command::AiPredict { symbols } => {
            let model = fintrack_core::llm::from_settings(settings)?;
            let predictions = model
                .predict(&symbols)
                .await
                .with_context(|| format!("AI prediction failed (provider={:?})", model.provider()))?;
            if json {
                render::print_json(&predictions)?;
            } else {
                render::print_ai_predictions(&predictions);
            }
        }
    }

    Ok(())
}

async fn run_watchlist(
    client: &FintrackClient,
    session: &Session,
    cmd: WatchlistCommand,
    json: bool,
) -> anyhow::Result<()> {
    match cmd {
        WatchlistCommand::List => {
            let res = client.watchlist(session).await?;
            if json {
                render::print_json(&res)?;
            } else {
                render::print_watchlist(&res.watchlist);
            }
        }
        WatchlistCommand::Add { symbol, stock_type } => {
            let res = client
                .add_to_watchlist(session, &AddToWatchlistRequest { symbol, stock_type })
                .await?;
            println!("added (id={})", res.id);
        }
        WatchlistCommand::Remove { id } => {
            client.remove_from_watchlist(session, id).await?;
            println!("removed (id={id})");
        }
        WatchlistCommand::Bind {
            symbol,
            strategy_unique_key,
        } => {
            let res = client
                .bind_strategy(session, &symbol, &strategy_unique_key)
                .await?;
            println!("{}", res.message);
        }
    }
    Ok(())
}

async fn run_strategy(
    client: &FintrackClient,
    session: &Session,
    cmd: StrategyCommand,
    json: bool,
) -> anyhow::Result<()> {
    match cmd {
        StrategyCommand::List => {
            let res = client.strategies(session).await?;
            if json {
                render::print_json(&res)?;
            } else {
                render::print_strategies(&res.strategies);
            }
        }
        StrategyCommand::Get { unique_key } => {
            let params = client.strategy(session, &unique_key).await?;
            render::print_json(&params)?;
        }
        StrategyCommand::Save {
            name,
            unique_key,
            buy_threshold_pct,
            sell_threshold_pct,
            initial_cash,
            no_rebalance,
            max_position_pct,
            min_position_pct,
            trade_fee_rate,
            take_profit_threshold_pct,
            take_profit_sell_frac,
        } => {
            let d = StrategyParams::default();
            let params = StrategyParams {
                name,
                unique_key,
                buy_threshold_pct: buy_threshold_pct.unwrap_or(d.buy_threshold_pct),
                sell_threshold_pct: sell_threshold_pct.unwrap_or(d.sell_threshold_pct),
                initial_cash: initial_cash.unwrap_or(d.initial_cash),
                enable_rebalance: !no_rebalance,
                max_position_pct: max_position_pct.unwrap_or(d.max_position_pct),
                min_position_pct: min_position_pct.unwrap_or(d.min_position_pct),
                trade_fee_rate: trade_fee_rate.unwrap_or(d.trade_fee_rate),
                take_profit_threshold_pct: take_profit_threshold_pct
                    .unwrap_or(d.take_profit_threshold_pct),
                take_profit_sell_frac: take_profit_sell_frac.unwrap_or(d.take_profit_sell_frac),
                ..d
            };
            let saved = client.save_strategy(session, &params).await?;
            println!("{}", saved.unique_key);
        }
    }
    Ok(())
}

fn require_auth(session: &Session) -> anyhow::Result<()> {
    anyhow::ensure!(
        session.is_authenticated(),
        "not logged in: pass --token or set FINTRACK_TOKEN"
    );
    Ok(())
}

fn init_sentry(settings: &fintrack_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
