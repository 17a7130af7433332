use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hempin_fund::config::Config;
use hempin_fund::db::{AppState, create_pool, init_db, queries};
use hempin_fund::models::{CreateCampaign, CreateTier};
use hempin_fund::payments::PayPalClient;
use hempin_fund::session::SessionVerifier;

#[derive(Parser, Debug)]
#[command(name = "hempin-fund")]
#[command(about = "Hemp'in Fund backend: leads, pledges and PayPal reconciliation")]
struct Cli {
    /// Seed the launch campaign and its tiers (dev mode only)
    #[arg(long)]
    seed: bool,
}

const LAUNCH_SLUG: &str = "hempin-launch";
const LAUNCH_TIERS: [(&str, i64); 4] = [
    ("Seed", 2000),
    ("Sprout", 5000),
    ("Bloom", 10000),
    ("Canopy", 25000),
];

/// Seeds the launch campaign with its four tiers unless it already exists.
fn seed_dev_data(state: &AppState) -> hempin_fund::error::Result<()> {
    let mut conn = state.db.get()?;
    if queries::get_campaign_by_slug(&conn, LAUNCH_SLUG)?.is_some() {
        tracing::info!("Campaign {} already exists, skipping seed", LAUNCH_SLUG);
        return Ok(());
    }

    let tx = conn.transaction()?;
    let campaign = queries::create_campaign(
        &tx,
        &CreateCampaign {
            slug: LAUNCH_SLUG.to_string(),
            title: "Hemp'in Launch".to_string(),
            goal_cents: 1_000_000,
            starts_at: None,
            ends_at: None,
        },
    )?;
    for (title, amount_cents) in LAUNCH_TIERS {
        queries::create_tier(
            &tx,
            &campaign.id,
            &CreateTier {
                title: title.to_string(),
                amount_cents,
            },
        )?;
    }
    tx.commit()?;

    tracing::info!("============================================");
    tracing::info!("SEEDED CAMPAIGN {} (id: {})", campaign.slug, campaign.id);
    for (title, amount_cents) in LAUNCH_TIERS {
        tracing::info!("  Tier {}: {} cents", title, amount_cents);
    }
    tracing::info!("============================================");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hempin_fund=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.session_secret.is_none() {
        if config.dev_mode {
            tracing::warn!("SESSION_JWT_SECRET not set: every caller is anonymous");
        } else {
            tracing::error!("SESSION_JWT_SECRET is required outside dev mode");
            std::process::exit(1);
        }
    }
    if !config.paypal.has_credentials() {
        tracing::warn!("PayPal credentials not set: checkout and webhook verification disabled");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    let state = AppState {
        db: db_pool,
        site_url: config.site_url.clone(),
        auth_login_url: config.auth_login_url.clone(),
        default_campaign_slug: config.default_campaign_slug.clone(),
        dev_mode: config.dev_mode,
        sessions: Arc::new(SessionVerifier::new(config.session_secret.as_deref())),
        paypal: Arc::new(PayPalClient::new(config.paypal.clone())),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set FUND_ENV=dev)");
        } else if let Err(e) = seed_dev_data(&state) {
            tracing::error!("Failed to seed dev data: {}", e);
        }
    }

    if config.dev_mode {
        tracing::info!("DEV endpoints enabled: GET /api/debug/whoami");
    }

    let app = hempin_fund::app(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Hemp'in Fund listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
