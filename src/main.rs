pub mod bot_client;
pub mod config;
pub mod dispatcher;
pub mod entities;
pub mod events;
pub mod queue;
pub mod routes;
pub mod signing;
pub mod task_processor;
pub mod webhook;

use bot_client::BotClientFactory;
use config::{Config, QueueBackend};
use dispatcher::Dispatcher;
use queue::local::LocalQueue;
use queue::sqs::SqsQueue;
use queue::TaskQueue;
use routes::{create_router, AppState};
use simple_error::simple_error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

fn init_tracing(dev_server: bool) {
    let builder = tracing_subscriber::fmt().with_max_level(tracing::Level::INFO);
    if dev_server {
        builder.init();
    } else {
        builder
            // disable printing the name of the module in every log line.
            .with_target(false)
            // the hosting platform stamps ingestion time on every line.
            .without_time()
            .init();
    }
}

async fn build_queue(config: &Config, dispatcher: Arc<Dispatcher>) -> TaskQueue {
    match &config.queue_backend {
        QueueBackend::Local { capacity } => {
            let (queue, receiver) = LocalQueue::new(*capacity);
            tokio::spawn(dispatcher.run_local(receiver));
            TaskQueue::Local(queue)
        }
        QueueBackend::Sqs { queue_url } => {
            let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let queue = SqsQueue::new(aws_sdk_sqs::Client::new(&sdk_config), queue_url);
            tokio::spawn(dispatcher.run_sqs(queue.clone()));
            TaskQueue::Sqs(queue)
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::load()?;
    init_tracing(config.dev_server);

    let http = reqwest::Client::new();
    let dispatcher = Arc::new(Dispatcher::new(
        http.clone(),
        &config.task_base_url,
        config.retry_policy.clone(),
        config.task_deadline,
        config.max_in_flight,
    ));
    let queue = build_queue(&config, dispatcher).await;
    let bot_factory = BotClientFactory::new(http, &config.api_endpoint, &config.channel_token);
    // fail at startup rather than on the first task
    bot_factory
        .new_client()
        .map_err(|e| Box::new(simple_error!(format!("{:?}", e))))?;

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Listening");
    let state = AppState {
        config: Arc::new(config),
        queue,
        bot_factory,
    };
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
