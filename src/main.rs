//! Fintrack billing worker
//!
//! Runs the periodic jobs of the billing core:
//! - Renewal sweep over subscriptions whose period has ended
//! - Pruning of old webhook ledger records

use std::sync::Arc;

use fintrack::adapters::postgres::{
    PostgresPaymentReader, PostgresSubscriptionRepository, PostgresWebhookEventLedger,
};
use fintrack::application::{PaymentEventProcessor, RunRenewalsCommand, RunRenewalsHandler};
use fintrack::config::{AppConfig, BillingConfig};
use fintrack::domain::billing::{PaymentCalculationService, SubscriptionRenewalService};
use fintrack::domain::foundation::{today, Timestamp};
use fintrack::ports::{PaymentReader, SubscriptionRepository, WebhookEventLedger};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let filter = config.runtime.env_filter()?;
    let registry = tracing_subscriber::registry().with(filter);

    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
    Ok(())
}

async fn run_sweep(handler: &RunRenewalsHandler, batch_size: usize) {
    let cmd = RunRenewalsCommand {
        as_of: today(),
        limit: batch_size,
    };
    match handler.handle(cmd).await {
        Ok(result) => {
            for payment in &result.renewal_payments {
                tracing::info!(
                    subscription_id = %payment.subscription_id,
                    payment_id = %payment.id,
                    amount = %payment.amount,
                    "Renewal charge ready for submission"
                );
            }
        }
        Err(err) => tracing::error!(error = %err, "Renewal sweep failed"),
    }
}

async fn prune_ledger(ledger: &dyn WebhookEventLedger, billing: &BillingConfig) {
    let cutoff = Timestamp::now().add_days(-i64::from(billing.ledger_retention_days));
    match ledger.delete_before(cutoff).await {
        Ok(deleted) if deleted > 0 => {
            tracing::info!(deleted, "Pruned webhook ledger");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!(error = %err, "Failed to prune webhook ledger"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config)?;

    tracing::info!(environment = ?config.runtime.environment, "Starting fintrack worker");

    let pool = config
        .database
        .pool_options()
        .connect(&config.database.url)
        .await?;
    tracing::info!("Database pool created");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations completed");
    }

    let repository: Arc<dyn SubscriptionRepository> =
        Arc::new(PostgresSubscriptionRepository::new(pool.clone()));
    let reader: Arc<dyn PaymentReader> = Arc::new(PostgresPaymentReader::new(pool.clone()));
    let ledger: Arc<dyn WebhookEventLedger> = Arc::new(PostgresWebhookEventLedger::new(
        pool.clone(),
        config.billing.stale_claim_secs,
    ));

    let renewal = SubscriptionRenewalService::new(PaymentCalculationService::new(reader));
    let processor = Arc::new(
        PaymentEventProcessor::new(repository.clone(), ledger.clone(), renewal)
            .with_max_conflict_retries(config.billing.max_conflict_retries),
    );
    let renewals = RunRenewalsHandler::new(repository, processor);

    let mut ticker = tokio::time::interval(config.billing.renewal_interval());
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_sweep(&renewals, config.billing.renewal_batch_size).await;
                prune_ledger(ledger.as_ref(), &config.billing).await;
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    tracing::error!(error = %err, "Failed to listen for shutdown signal");
                }
                break;
            }
        }
    }

    tracing::info!("Shutting down");
    pool.close().await;
    Ok(())
}
