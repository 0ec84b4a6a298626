use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use digest_service::{
    api::{AppState, run_api_server},
    clients::{
        circuit_breaker::CircuitBreaker, database::PostgresFailureStore, health::HealthChecker,
        rbmq::RabbitMqClient, telegram::TelegramClient,
    },
    config::Config,
    notifications::{
        DeliveryClient, DigestScheduler, NotificationDispatcher, PlainTextFormatter,
    },
    utils::{consume_events, init_tracing, retry_with_backoff},
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install rustls crypto provider"))?;

    let config = Config::load()?;
    let routing = Arc::new(config.routing_table()?);
    let startup_retry = config.retry_config();

    let failure_store = Arc::new(
        retry_with_backoff(&startup_retry, || PostgresFailureStore::connect(&config.database_url))
            .await?,
    );
    failure_store.ensure_schema().await?;

    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let redis_connection = retry_with_backoff(&startup_retry, || {
        redis_client.get_multiplexed_async_connection()
    })
    .await?;
    let breaker = CircuitBreaker::new(
        "telegram".to_string(),
        redis_connection,
        config.circuit_breaker_config(),
    );

    let telegram = TelegramClient::new(&config, Some(breaker.clone()))?;
    let delivery = Arc::new(DeliveryClient::new(
        Arc::new(telegram),
        failure_store.clone(),
        config.retry_config(),
    ));
    let formatter = Arc::new(PlainTextFormatter::new(config.mini_app_url.clone()));
    let dispatcher = Arc::new(NotificationDispatcher::new(routing, formatter, delivery));

    let rabbitmq =
        retry_with_backoff(&startup_retry, || RabbitMqClient::connect(&config)).await?;

    let shutdown = CancellationToken::new();

    let scheduler = DigestScheduler::spawn(
        dispatcher.clone(),
        config.sweep_interval(),
        shutdown.child_token(),
    );

    let consumer = tokio::spawn(consume_events(
        rabbitmq,
        dispatcher.clone(),
        shutdown.child_token(),
    ));

    let state = Arc::new(AppState {
        health_checker: HealthChecker::new(config.clone())
            .with_database(failure_store.clone())
            .with_channel_breaker(breaker),
        dispatcher: dispatcher.clone(),
        failure_store,
    });
    let server = tokio::spawn(run_api_server(
        config.server_port,
        state,
        shutdown.child_token(),
    ));

    info!("Digest service started");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.cancel();

    scheduler.shutdown().await;

    for (name, handle) in [("consumer", consumer), ("http server", server)] {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(task = name, error = %e, "Task exited with error"),
            Err(e) => error!(task = name, error = %e, "Task panicked"),
        }
    }

    let flushed = dispatcher.flush_all();
    info!(batches = flushed, "Flushed pending digests");

    dispatcher.close().await;
    info!("Digest service stopped");

    Ok(())
}
