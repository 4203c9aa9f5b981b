use personfeed_worker::jobs::{PublishJob, RetentionJob, TransferJob};
use personfeed_worker::outbound::http::{HttpChangePublisher, HttpDeliveryClient};
use personfeed_worker::settings::Settings;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "personfeed_worker=info,personfeed_db=info,personfeed_intake=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let pool = personfeed_db::connect(&settings.database_url).await?;
    sqlx::migrate!("../../db/migrations").run(&pool).await?;
    personfeed_db::health_check(&pool).await?;

    // Lease-holder identity for the cluster-wide job locks.
    let holder = uuid::Uuid::new_v4().to_string();
    tracing::info!(holder = %holder, "personfeed worker starting");

    let cancel = CancellationToken::new();

    let transfer = TransferJob::new(
        pool.clone(),
        HttpDeliveryClient::new(settings.legacy_gateway_url.clone()),
        settings.transfer.clone(),
        settings.legacy_queue.clone(),
        holder.clone(),
    );
    let publish = PublishJob::new(
        pool.clone(),
        HttpChangePublisher::new(
            settings.publish_gateway_url.clone(),
            settings.publish.retry_attempts,
            settings.publish.retry_base_delay,
        ),
        settings.publish.clone(),
        holder.clone(),
    );
    let retention = RetentionJob::new(pool.clone(), settings.retention.clone(), holder);

    let transfer_task = tokio::spawn(transfer.run(cancel.clone()));
    let publish_task = tokio::spawn(publish.run(cancel.clone()));
    let retention_task = tokio::spawn(retention.run(cancel.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    cancel.cancel();
    let _ = tokio::join!(transfer_task, publish_task, retention_task);
    Ok(())
}
