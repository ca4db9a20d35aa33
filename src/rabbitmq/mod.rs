// src/rabbitmq/mod.rs
// RabbitMQ side of the log subscriber

pub mod connection;
pub mod errors;
pub mod receiver;
pub mod subscriber;

pub use connection::ConnectionManager;
pub use errors::{Result, SetupStep, SubscriberError};
pub use receiver::{run_receiver, ReceiverExit, ReceiverReport};
pub use subscriber::{Subscriber, SubscriberState, Subscription, LOGS_EXCHANGE};
