//! Drives the bank account core end to end: creates a customer and an account,
//! exercises the account lifecycle, and shows a rejected duplicate create.

use app::{AppError, Application, Config};
use common::{AggregateId, Version};
use domain::{CreateAccount, CreateCustomer, LockAccount, UnlockAccount};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

async fn run(app: &Application) -> Result<(), AppError> {
    let bus = app.bus();
    let customer_id = AggregateId::new();
    let account_id = AggregateId::new();

    let report = bus
        .send(CreateCustomer::new(customer_id, "Ada", "Lovelace"))
        .await?;
    tracing::info!(%customer_id, delivered = report.delivered(), "customer created");

    bus.send(CreateAccount::new(account_id, customer_id, "EUR"))
        .await?;
    tracing::info!(%account_id, %customer_id, "account opened");

    match bus
        .send(CreateAccount::new(account_id, customer_id, "EUR"))
        .await
    {
        Err(e) if e.is_retryable() => {
            tracing::info!(%account_id, error = %e, "duplicate create rejected")
        }
        Err(e) => return Err(e.into()),
        Ok(_) => tracing::warn!(%account_id, "duplicate create was accepted"),
    }

    bus.send(LockAccount::new(account_id, Version::new(2))).await?;
    bus.send(UnlockAccount::new(account_id, Version::new(3)))
        .await?;

    for account in app.directory().accounts_of(customer_id).await {
        tracing::info!(
            account_id = %account.account_id,
            currency = %account.currency,
            state = %account.state,
            version = %account.version,
            "directory entry"
        );
    }

    let purged = bus.purge_completed_sagas().await;
    tracing::debug!(purged, "completed sagas purged");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env();

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| AppError::Metrics(e.to_string()))?;

    // 3. Wire stores, registry and bus
    tracing::info!(backend = config.backend(), "starting");
    let app = Application::build(&config).await?;

    // 4. Replay any existing commits into the directory
    app.catch_up().await?;

    // 5. Drive the flow
    let outcome = run(&app).await;

    tracing::info!(metrics = %metrics_handle.render(), "shutting down");
    outcome
}
