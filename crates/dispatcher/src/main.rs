use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use courier_common::config::AppConfig;
use courier_common::redis_pool;
use courier_dispatcher::coordinator::ProcessingCoordinator;
use courier_dispatcher::events::RedisEventPublisher;
use courier_dispatcher::handler::NotificationDispatcher;
use courier_dispatcher::sms::HttpSmsGateway;
use courier_dispatcher::store::RedisIdempotenceStore;
use courier_queue::redis_queue::RedisQueueClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "courier_dispatcher=info,courier_queue=info".into()),
        )
        .json()
        .init();

    tracing::info!("Courier dispatcher starting...");

    let config = AppConfig::from_env()?;
    let redis = redis_pool::create_redis_pool(&config.redis_url).await?;

    let store = Arc::new(RedisIdempotenceStore::new(redis.clone()));
    let sms = Arc::new(HttpSmsGateway::new(
        config.sms_gateway_url.clone(),
        config.sms_api_key.clone(),
        config.sms_sender.clone(),
    ));
    let events = Arc::new(RedisEventPublisher::new(redis.clone()));

    let dispatcher = Arc::new(NotificationDispatcher::new(
        store,
        sms,
        events,
        Duration::from_secs(config.idempotence_ttl_hours * 60 * 60),
    ));

    let client = RedisQueueClient::new(redis, config.queue_poll_interval_ms);
    let coordinator =
        ProcessingCoordinator::new(client, config.notification_queue.clone(), dispatcher);

    tracing::info!(queue = %config.notification_queue, "Consuming notification queue");

    // Cancel the receive loop on Ctrl+C; in-flight deliveries finish first.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal, stopping gracefully...");
                cancel.cancel();
            }
        });
    }

    if let Err(error) = coordinator.run(cancel).await {
        tracing::error!(error = %error, "Dispatcher exited with error");
        return Err(error.into());
    }

    tracing::info!("Courier dispatcher stopped.");
    Ok(())
}
