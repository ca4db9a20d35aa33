//! OS signal handling for the subscriber process.
//!
//! [`wait_for_shutdown_signal`] completes on SIGINT, SIGTERM or SIGQUIT
//! (Ctrl-C only on non-unix platforms) and reports which one fired so the
//! process can exit with `128 + signal number`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    Quit,
}

impl ShutdownSignal {
    pub fn number(&self) -> u8 {
        match self {
            ShutdownSignal::Interrupt => 2,
            ShutdownSignal::Quit => 3,
            ShutdownSignal::Terminate => 15,
        }
    }

    /// Shell convention for a process ended by this signal.
    pub fn exit_code(&self) -> u8 {
        128 + self.number()
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownSignal::Interrupt => "SIGINT",
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Quit => "SIGQUIT",
        };
        f.write_str(name)
    }
}

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    let received = tokio::select! {
        _ = sigint.recv()  => ShutdownSignal::Interrupt,
        _ = sigterm.recv() => ShutdownSignal::Terminate,
        _ = sigquit.recv() => ShutdownSignal::Quit,
    };
    Ok(received)
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<ShutdownSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(ShutdownSignal::Interrupt)
}
