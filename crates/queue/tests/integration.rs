//! Integration tests for the Redis queue transport.
//!
//! Requires a running Redis with `REDIS_URL` env var set. Run with:
//!
//! ```bash
//! REDIS_URL="redis://localhost:6379" \
//!   cargo test -p courier-queue --test integration -- --ignored --nocapture
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use redis::aio::ConnectionManager;
use tokio_util::sync::CancellationToken;

use courier_common::error::DispatchError;
use courier_queue::processor::{MessageEvent, ProcessorOptions, QueueClient, QueueProcessor};
use courier_queue::redis_queue::RedisQueueClient;

async fn connect() -> ConnectionManager {
    let url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    let client = redis::Client::open(url).unwrap();
    ConnectionManager::new(client).await.unwrap()
}

async fn reset(conn: &mut ConnectionManager, queue: &str) {
    redis::cmd("DEL")
        .arg(queue)
        .arg(format!("{}:processing", queue))
        .query_async::<()>(conn)
        .await
        .unwrap();
}

async fn list_len(conn: &mut ConnectionManager, key: &str) -> usize {
    redis::cmd("LLEN")
        .arg(key)
        .query_async::<usize>(conn)
        .await
        .unwrap()
}

#[tokio::test]
#[ignore]
async fn test_failed_delivery_requeues_behind_other_messages() {
    let mut conn = connect().await;
    let queue = "courier-test-requeue";
    reset(&mut conn, queue).await;

    // Producers push onto the LEFT; the processor serves the RIGHT end.
    for body in ["flaky", "steady"] {
        redis::cmd("LPUSH")
            .arg(queue)
            .arg(body)
            .query_async::<()>(&mut conn)
            .await
            .unwrap();
    }

    let client = RedisQueueClient::new(conn.clone(), 50);
    let mut processor = client.create_processor(queue, ProcessorOptions::default());

    let order = Arc::new(Mutex::new(Vec::new()));
    let flaky_attempts = Arc::new(AtomicUsize::new(0));
    let cancel = CancellationToken::new();
    {
        let order = Arc::clone(&order);
        let flaky_attempts = Arc::clone(&flaky_attempts);
        let cancel = cancel.clone();
        processor.on_message(Box::new(move |event: MessageEvent| {
            let order = Arc::clone(&order);
            let flaky_attempts = Arc::clone(&flaky_attempts);
            let cancel = cancel.clone();
            Box::pin(async move {
                order.lock().unwrap().push(event.envelope.body.clone());
                if event.envelope.body == "flaky"
                    && flaky_attempts.fetch_add(1, Ordering::SeqCst) == 0
                {
                    return Err(DispatchError::DeliveryFailed("transient".to_string()));
                }
                event.complete().await?;
                if order.lock().unwrap().len() >= 3 {
                    cancel.cancel();
                }
                Ok(())
            })
        }));
    }

    processor.start(cancel).await.unwrap();

    // The failed delivery went to the back of the queue: "steady" was served
    // before "flaky" came around again.
    assert_eq!(*order.lock().unwrap(), vec!["flaky", "steady", "flaky"]);

    // Every delivery was either completed or requeued; nothing is stranded
    // in the processing list after the loop stops.
    assert_eq!(list_len(&mut conn, &format!("{}:processing", queue)).await, 0);
    assert_eq!(list_len(&mut conn, queue).await, 0);
}
