//! Entitlement engine server binary.
//!
//! Loads configuration, connects to PostgreSQL, wires the adapters into
//! the command handlers, and serves the event intake endpoint.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use entitlement_engine::adapters::discord::{DiscordConfig, DiscordRoleAdapter};
use entitlement_engine::adapters::events::InboundSignatureVerifier;
use entitlement_engine::adapters::http::{intake_router, IntakeAppState};
use entitlement_engine::adapters::postgres::{
    PostgresCouponRepository, PostgresEntitlementStore, PostgresEventOutbox,
    PostgresMerchantCouponRepository, PostgresOrganizationRepository, PostgresProcessedEventStore,
    PostgresPurchaseRepository, PostgresResourceCatalog, PostgresUserDirectory,
};
use entitlement_engine::adapters::stripe::{StripeConfig, StripePaymentAdapter};
use entitlement_engine::application::handlers::{
    GrantPurchaseEntitlementsHandler, ProcessRefundHandler, RedeemCouponHandler, SyncCohortHandler,
    TransferPurchaseHandler,
};
use entitlement_engine::application::{CouponCreditService, DiscountRegistry, Reconciler};
use entitlement_engine::config::AppConfig;
use entitlement_engine::ports::EventPublisher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.server.log_level)?)
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;
    info!(
        environment = ?config.server.environment,
        "Starting entitlement engine"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(config.database.idle_timeout())
        .max_lifetime(config.database.max_lifetime())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    // Persistence adapters
    let entitlement_store = Arc::new(PostgresEntitlementStore::new(pool.clone()));
    let coupons = Arc::new(PostgresCouponRepository::new(pool.clone()));
    let merchant_coupons = Arc::new(PostgresMerchantCouponRepository::new(pool.clone()));
    let purchases = Arc::new(PostgresPurchaseRepository::new(pool.clone()));
    let organizations = Arc::new(PostgresOrganizationRepository::new(pool.clone()));
    let users = Arc::new(PostgresUserDirectory::new(pool.clone()));
    let processed_events = Arc::new(PostgresProcessedEventStore::new(pool.clone()));
    let catalog = Arc::new(PostgresResourceCatalog::new(pool.clone()));

    // External services
    let payment_provider = Arc::new(StripePaymentAdapter::new(StripeConfig::new(
        config.payment.stripe_api_key.clone(),
    )));
    let role_api = Arc::new(DiscordRoleAdapter::new(DiscordConfig::new(
        config.community.discord_bot_token.clone(),
        config.community.discord_guild_id.clone(),
    )));
    let publisher: Arc<dyn EventPublisher> = Arc::new(PostgresEventOutbox::new(pool.clone()));

    // Application services
    let reconciler = Arc::new(Reconciler::new(entitlement_store.clone(), publisher.clone()));
    let registry = Arc::new(DiscountRegistry::new(
        merchant_coupons,
        coupons.clone(),
        payment_provider,
    ));
    let credits = Arc::new(CouponCreditService::new(
        registry,
        coupons.clone(),
        entitlement_store.clone(),
        publisher.clone(),
    ));

    // Command handlers
    let grant_handler = Arc::new(GrantPurchaseEntitlementsHandler::new(
        purchases.clone(),
        catalog.clone(),
        organizations.clone(),
        entitlement_store.clone(),
        reconciler.clone(),
        credits,
        publisher.clone(),
    ));
    let redeem_handler = Arc::new(RedeemCouponHandler::new(
        coupons,
        organizations.clone(),
        entitlement_store.clone(),
        publisher.clone(),
    ));
    let refund_handler = Arc::new(ProcessRefundHandler::new(
        purchases.clone(),
        catalog.clone(),
        role_api.clone(),
        reconciler.clone(),
    ));
    let sync_handler = Arc::new(SyncCohortHandler::new(
        catalog.clone(),
        entitlement_store.clone(),
        purchases.clone(),
        organizations.clone(),
        reconciler.clone(),
        config.events.fanout_concurrency,
    ));
    let transfer_handler = Arc::new(TransferPurchaseHandler::new(
        purchases,
        users,
        catalog,
        organizations,
        entitlement_store,
        role_api,
        reconciler,
        publisher,
    ));

    let state = IntakeAppState {
        verifier: Arc::new(InboundSignatureVerifier::new(
            config.events.signing_secret.clone(),
        )),
        processed_events,
        grant_handler,
        redeem_handler,
        refund_handler,
        sync_handler,
        transfer_handler,
    };

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening for inbound events");

    axum::serve(listener, intake_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
