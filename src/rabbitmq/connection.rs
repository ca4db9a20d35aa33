use lapin::{Channel, Connection, ConnectionProperties};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::errors::{Result, SetupStep, SubscriberError};

const REPLY_SUCCESS: u16 = 200;

/// Owns the single broker connection of a subscriber and the one channel opened on it.
pub struct ConnectionManager {
    uri: String,
    connect_timeout: Duration,
    connection: Option<Connection>,
    channel: Option<Channel>,
}

impl ConnectionManager {
    pub fn new(uri: &str, connect_timeout: Duration) -> Self {
        ConnectionManager {
            uri: uri.to_string(),
            connect_timeout,
            connection: None,
            channel: None,
        }
    }

    /// Opens the transport session. No retry: the first failure is returned.
    pub async fn connect(&mut self) -> Result<&Connection> {
        info!(uri = %redact(&self.uri), "Connecting to RabbitMQ");

        let connection = match timeout(
            self.connect_timeout,
            Connection::connect(&self.uri, ConnectionProperties::default()),
        )
        .await
        {
            Ok(result) => result.map_err(SubscriberError::setup(SetupStep::Connect))?,
            Err(_) => {
                return Err(SubscriberError::Timeout {
                    step: SetupStep::Connect,
                    after: self.connect_timeout,
                })
            }
        };

        debug!("Successfully connected to RabbitMQ");
        Ok(&*self.connection.insert(connection))
    }

    /// Opens the one channel used for every later operation.
    pub async fn open_channel(&mut self) -> Result<Channel> {
        if let Some(channel) = &self.channel {
            return Ok(channel.clone());
        }

        let connection = self.connection.as_ref().ok_or_else(|| {
            SubscriberError::setup(SetupStep::OpenChannel)(lapin::Error::InvalidConnectionState(
                lapin::ConnectionState::Initial,
            ))
        })?;

        let channel = connection
            .create_channel()
            .await
            .map_err(SubscriberError::setup(SetupStep::OpenChannel))?;

        debug!(channel_id = channel.id(), "Channel opened");
        self.channel = Some(channel.clone());
        Ok(channel)
    }

    /// Releases the channel first, then the connection.
    ///
    /// The connection is closed even when closing the channel fails; the first
    /// error is returned.
    pub async fn close(&mut self) -> Result<()> {
        let channel = self.channel.take().filter(|ch| ch.status().connected());
        let connection = self.connection.take().filter(|conn| conn.status().connected());

        close_in_order(
            async move {
                match channel {
                    Some(channel) => {
                        info!(channel_id = channel.id(), "Closing channel");
                        channel.close(REPLY_SUCCESS, "Bye").await
                    }
                    None => Ok(()),
                }
            },
            async move {
                match connection {
                    Some(conn) => {
                        info!("Closing RabbitMQ connection");
                        conn.close(REPLY_SUCCESS, "Bye").await
                    }
                    None => Ok(()),
                }
            },
        )
        .await
    }
}

/// Awaits `channel` then `connection`, always both, and reports the first failure.
async fn close_in_order<C, N>(channel: C, connection: N) -> Result<()>
where
    C: Future<Output = std::result::Result<(), lapin::Error>>,
    N: Future<Output = std::result::Result<(), lapin::Error>>,
{
    let channel_closed = channel.await;
    if let Err(e) = &channel_closed {
        warn!("Failed to close channel, closing connection anyway: {}", e);
    }
    let connection_closed = connection.await;

    channel_closed
        .and(connection_closed)
        .map_err(SubscriberError::Teardown)
}

/// Hides the password part of an AMQP URI for logging.
pub fn redact(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return uri.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => uri.to_string(),
    }
}
