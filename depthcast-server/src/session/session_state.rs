use std::fmt;

/// Lifecycle of a peer session.
///
/// `Created -> RemoteOfferSet -> AnswerSent -> Connected -> Closed`, with
/// `Failed` reachable from any live state and leading only to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    RemoteOfferSet,
    AnswerSent,
    Connected,
    Failed,
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        match (self, next) {
            (Created, RemoteOfferSet)
            | (RemoteOfferSet, AnswerSent)
            | (AnswerSent, Connected) => true,
            (Closed, _) => false,
            (Failed, Closed) => true,
            (Failed, _) => false,
            (_, Failed) | (_, Closed) => true,
            _ => false,
        }
    }

    pub fn is_closed(self) -> bool {
        self == SessionState::Closed
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Created => "created",
            SessionState::RemoteOfferSet => "remote-offer-set",
            SessionState::AnswerSent => "answer-sent",
            SessionState::Connected => "connected",
            SessionState::Failed => "failed",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}
