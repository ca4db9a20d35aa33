use futures::StreamExt;
use lapin::{options::*, types::FieldTable, Consumer, ExchangeKind};
use std::fmt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connection::ConnectionManager;
use super::errors::{Result, SetupStep, SubscriberError};
use super::receiver::{run_receiver, ReceiverExit, ReceiverReport};
use crate::context::ProcessContext;
use crate::env::Config;

/// Name of the fanout exchange every log subscriber binds to.
pub const LOGS_EXCHANGE: &str = "logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Disconnected,
    Connected,
    ChannelOpen,
    Consuming,
    ShuttingDown,
    Terminated,
}

impl SubscriberState {
    /// State reached once `step` succeeds from `self`, or `None` if the step is out of order.
    pub fn after(self, step: SetupStep) -> Option<SubscriberState> {
        use SetupStep::*;
        use SubscriberState::*;

        match (self, step) {
            (Disconnected, Connect) => Some(Connected),
            (Connected, OpenChannel) => Some(ChannelOpen),
            // declare/bind keep the channel open; consume completes setup
            (ChannelOpen, DeclareExchange | DeclareQueue | Bind) => Some(ChannelOpen),
            (ChannelOpen, Consume) => Some(Consuming),
            _ => None,
        }
    }
}

impl fmt::Display for SubscriberState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Exchange and queue properties the subscriber declares.
///
/// Publishers must declare `logs` with the same properties or the broker
/// rejects the second declaration.
pub fn exchange_declare_options() -> ExchangeDeclareOptions {
    ExchangeDeclareOptions {
        durable: true,
        auto_delete: false,
        internal: false,
        ..ExchangeDeclareOptions::default()
    }
}

pub fn queue_declare_options() -> QueueDeclareOptions {
    // exclusive queues vanish with the connection that declared them
    QueueDeclareOptions {
        durable: false,
        exclusive: true,
        auto_delete: false,
        ..QueueDeclareOptions::default()
    }
}

pub fn consume_options() -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_ack: true,
        exclusive: false,
        no_local: false,
        ..BasicConsumeOptions::default()
    }
}

/// Subscribes one anonymous queue to the `logs` fanout exchange.
pub struct Subscriber {
    connection_manager: ConnectionManager,
    context: ProcessContext,
    exchange: String,
    state: SubscriberState,
}

impl Subscriber {
    pub fn new(config: &Config, context: ProcessContext) -> Self {
        Subscriber {
            connection_manager: ConnectionManager::new(&config.amqp_addr, config.connect_timeout()),
            context,
            exchange: LOGS_EXCHANGE.to_string(),
            state: SubscriberState::Disconnected,
        }
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    fn advance(&mut self, step: SetupStep) {
        match self.state.after(step) {
            Some(next) => {
                if next != self.state {
                    debug!(from = %self.state, to = %next, %step, "Subscriber state changed");
                }
                self.state = next;
            }
            None => warn!(state = %self.state, %step, "Setup step out of order, state unchanged"),
        }
    }

    /// Runs connect, open channel, declare, bind and consume in order.
    ///
    /// The first failing step aborts the pipeline; whatever was already opened
    /// is closed before the error is returned.
    pub async fn setup(mut self) -> Result<Subscription> {
        match self.try_setup().await {
            Ok((queue, consumer)) => Ok(Subscription {
                connection_manager: self.connection_manager,
                context: self.context,
                queue,
                consumer: Some(consumer),
                state: self.state,
            }),
            Err(e) => {
                if let Err(close_err) = self.connection_manager.close().await {
                    warn!("Cleanup after failed setup also failed: {}", close_err);
                }
                Err(e)
            }
        }
    }

    async fn try_setup(&mut self) -> Result<(String, Consumer)> {
        self.connection_manager.connect().await?;
        self.advance(SetupStep::Connect);

        let channel = self.connection_manager.open_channel().await?;
        self.advance(SetupStep::OpenChannel);

        channel
            .exchange_declare(
                &self.exchange,
                ExchangeKind::Fanout,
                exchange_declare_options(),
                FieldTable::default(),
            )
            .await
            .map_err(SubscriberError::setup(SetupStep::DeclareExchange))?;
        self.advance(SetupStep::DeclareExchange);
        info!(exchange = %self.exchange, "Exchange declared");

        let queue = channel
            .queue_declare("", queue_declare_options(), FieldTable::default())
            .await
            .map_err(SubscriberError::setup(SetupStep::DeclareQueue))?;
        let queue_name = queue.name().as_str().to_string();
        self.advance(SetupStep::DeclareQueue);
        info!(queue = %queue_name, "Queue declared");

        channel
            .queue_bind(
                &queue_name,
                &self.exchange,
                "",
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(SubscriberError::setup(SetupStep::Bind))?;
        self.advance(SetupStep::Bind);
        debug!(queue = %queue_name, exchange = %self.exchange, "Queue bound");

        let consumer = channel
            .basic_consume(&queue_name, "", consume_options(), FieldTable::default())
            .await
            .map_err(SubscriberError::setup(SetupStep::Consume))?;
        self.advance(SetupStep::Consume);
        info!(queue = %queue_name, consumer_tag = consumer.tag().as_str(), "Consumer registered");

        Ok((queue_name, consumer))
    }
}

/// A subscriber whose setup completed; owns the connection, its channel and the consumer.
pub struct Subscription {
    connection_manager: ConnectionManager,
    context: ProcessContext,
    queue: String,
    consumer: Option<Consumer>,
    state: SubscriberState,
}

impl Subscription {
    /// Broker-generated name of the exclusive queue.
    pub fn queue_name(&self) -> &str {
        &self.queue
    }

    pub fn state(&self) -> SubscriberState {
        self.state
    }

    /// Spawns the receiver task on the delivery feed. Only the first call spawns.
    fn spawn_receiver(&mut self) -> Option<JoinHandle<ReceiverReport>> {
        let consumer = self.consumer.take()?;
        let feed = consumer.map(|delivery| delivery.map(|d| d.data));
        let sink = self.context.sink.clone();
        let cancel = self.context.shutdown.child_token();

        Some(tokio::spawn(run_receiver(feed, sink, cancel)))
    }

    /// Starts the receiver, waits for the shutdown signal, then tears down.
    pub async fn run(mut self) -> Result<ReceiverReport> {
        let receiver = self.spawn_receiver();

        info!(" [*] Waiting for logs. To exit press CTRL+C");
        self.context.shutdown.cancelled().await;

        self.state = SubscriberState::ShuttingDown;
        info!("Shutdown requested, stopping receiver");

        let report = match receiver {
            Some(handle) => handle.await?,
            None => ReceiverReport {
                delivered: 0,
                feed_errors: 0,
                exit: ReceiverExit::Cancelled,
            },
        };

        self.close().await?;
        Ok(report)
    }

    /// Closes the channel, then the connection.
    pub async fn close(&mut self) -> Result<()> {
        self.connection_manager.close().await?;
        self.state = SubscriberState::Terminated;
        info!("Subscriber terminated");
        Ok(())
    }
}
