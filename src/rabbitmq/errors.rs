// src/rabbitmq/errors.rs

use lapin::Error as LapinError;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// One step of the subscriber setup pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupStep {
    Connect,
    OpenChannel,
    DeclareExchange,
    DeclareQueue,
    Bind,
    Consume,
}

impl SetupStep {
    pub const ALL: [SetupStep; 6] = [
        SetupStep::Connect,
        SetupStep::OpenChannel,
        SetupStep::DeclareExchange,
        SetupStep::DeclareQueue,
        SetupStep::Bind,
        SetupStep::Consume,
    ];

    /// Message prefix logged when this step fails.
    pub fn context(&self) -> &'static str {
        match self {
            SetupStep::Connect => "Failed to connect to RabbitMQ",
            SetupStep::OpenChannel => "Failed to open a channel",
            SetupStep::DeclareExchange => "Failed to declare an exchange",
            SetupStep::DeclareQueue => "Failed to declare a queue",
            SetupStep::Bind => "Failed to bind a queue",
            SetupStep::Consume => "Failed to register a consumer",
        }
    }
}

impl fmt::Display for SetupStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetupStep::Connect => "connect",
            SetupStep::OpenChannel => "open_channel",
            SetupStep::DeclareExchange => "declare_exchange",
            SetupStep::DeclareQueue => "declare_queue",
            SetupStep::Bind => "bind",
            SetupStep::Consume => "consume",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("{}: {source}", .step.context())]
    Setup {
        step: SetupStep,
        #[source]
        source: LapinError,
    },

    #[error("{}: timed out after {after:?}", .step.context())]
    Timeout { step: SetupStep, after: Duration },

    #[error("Failed to close RabbitMQ resources: {0}")]
    Teardown(#[source] LapinError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Receiver task failed: {0}")]
    Receiver(#[from] tokio::task::JoinError),
}

impl SubscriberError {
    pub fn setup(step: SetupStep) -> impl FnOnce(LapinError) -> Self {
        move |source| SubscriberError::Setup { step, source }
    }

    /// The setup step that failed, if this error came from the setup pipeline.
    pub fn step(&self) -> Option<SetupStep> {
        match self {
            SubscriberError::Setup { step, .. } | SubscriberError::Timeout { step, .. } => {
                Some(*step)
            }
            _ => None,
        }
    }
}

impl From<anyhow::Error> for SubscriberError {
    fn from(error: anyhow::Error) -> Self {
        // keep the whole context chain
        SubscriberError::Config(format!("{:#}", error))
    }
}

// Custom Result type for subscriber operations
pub type Result<T> = std::result::Result<T, SubscriberError>;
