use crate::transport::realtime_transport::ConnectionState;
use depthcast_core::ClientId;

/// Notifications flowing from transports (and their watchdogs) into the
/// session manager loop. `generation` identifies which transport instance of
/// the session produced the event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    StateChanged {
        client_id: ClientId,
        generation: u64,
        state: ConnectionState,
    },
    ConnectTimeout {
        client_id: ClientId,
        generation: u64,
    },
}

impl TransportEvent {
    pub fn client_id(&self) -> ClientId {
        match self {
            TransportEvent::StateChanged { client_id, .. }
            | TransportEvent::ConnectTimeout { client_id, .. } => *client_id,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            TransportEvent::StateChanged { generation, .. }
            | TransportEvent::ConnectTimeout { generation, .. } => *generation,
        }
    }
}
