//! Fanout log subscriber for RabbitMQ.
//!
//! Binds a server-named exclusive queue to the durable `logs` fanout exchange
//! and prints every delivered payload until the process is told to stop.

pub mod config;
pub mod context;
pub mod env;
pub mod os_signals;
pub mod output;
pub mod rabbitmq;

pub use context::ProcessContext;
pub use env::Config;
pub use rabbitmq::{SetupStep, Subscriber, SubscriberError, Subscription};
