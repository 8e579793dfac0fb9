use bytes::Bytes;
use tracing::trace;

use crate::adapter::Adapter;
use crate::client::Client;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, SocksError};
use crate::io::Io;

/// An I/O operation a protocol state machine needs performed on its behalf.
///
/// This exists mainly to document and log what the engine is doing, since
/// [`crate::io::Io`] calls straight through to an [`Adapter`] rather than
/// interpreting a queue of these values.
#[derive(Debug)]
pub enum Intent {
    Read,
    Write(Bytes),
    Connect { host: String, port: u16 },
    Passthrough,
}

pub(crate) enum Outcome {
    Data(Bytes),
    Unit,
}

/// Fulfils a single intent against an adapter. This is the engine's entire
/// job: every higher-level codec operation in [`crate::io::Io`] is built
/// out of calls to this function.
pub(crate) async fn dispatch<A: Adapter>(adapter: &mut A, intent: Intent) -> Result<Outcome> {
    trace!(?intent, "engine dispatching intent");
    match intent {
        Intent::Read => {
            let data = adapter.read().await?;
            Ok(Outcome::Data(data))
        }
        Intent::Write(bytes) => {
            adapter.write(bytes).await?;
            Ok(Outcome::Unit)
        }
        Intent::Connect { host, port } => {
            adapter.connect(&host, port).await?;
            Ok(Outcome::Unit)
        }
        Intent::Passthrough => {
            adapter.passthrough().await?;
            Ok(Outcome::Unit)
        }
    }
}

/// Either a server-side dispatcher or a client-side handshake, ready to be
/// driven by [`run_engine`].
pub enum StateMachine {
    Server(Dispatcher),
    Client(Client),
}

impl From<Dispatcher> for StateMachine {
    fn from(dispatcher: Dispatcher) -> Self {
        StateMachine::Server(dispatcher)
    }
}

impl From<Client> for StateMachine {
    fn from(client: Client) -> Self {
        StateMachine::Client(client)
    }
}

impl StateMachine {
    /// Drives the state machine to completion against `adapter`.
    ///
    /// Either the state machine reaches its terminal state (success, which
    /// always ends in a `Passthrough` intent) or a [`SocksError`]
    /// propagates out; there is no other outcome.
    pub async fn run<A: Adapter>(self, io: &mut Io<'_, A>) -> Result<()> {
        match self {
            StateMachine::Server(dispatcher) => dispatcher.run(io).await,
            StateMachine::Client(client) => client.run(io).await,
        }
    }
}

/// Drives a protocol state machine (a [`Dispatcher`] or a [`Client`])
/// against an [`Io`] view until it terminates.
pub async fn run_engine<A, M>(state_machine: M, io: &mut Io<'_, A>) -> Result<()>
where
    A: Adapter,
    M: Into<StateMachine>,
{
    state_machine.into().run(io).await
}

pub(crate) fn eof_error() -> SocksError {
    SocksError::UnexpectedEof
}
