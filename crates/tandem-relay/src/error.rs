use tandem_core::{DispatchError, IntegrityMismatch};
use thiserror::Error;

/// Errors surfaced while relaying confirmed events.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The local system rejected an event.
    ///
    /// On a participant applying a confirmed event this means the mirror no
    /// longer agrees with the authority about what is valid.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The local source state does not match the digest the authority sent.
    #[error(transparent)]
    Integrity(#[from] IntegrityMismatch),

    /// The receiver fell behind and `n` messages were dropped.
    /// The participant must resync from history.
    #[error("relay receiver lagged, missed {0} messages")]
    Lagged(u64),

    /// A confirmed event arrived out of order, so events in between were
    /// never applied locally.
    #[error("expected confirmed event {expected}, received {received}")]
    SequenceGap { expected: u64, received: u64 },

    #[error("relay channel closed")]
    Closed,
}

impl RelayError {
    /// Whether recovering requires a full resync from the authority's history.
    pub fn needs_resync(&self) -> bool {
        matches!(
            self,
            RelayError::Integrity(_)
                | RelayError::Lagged(_)
                | RelayError::SequenceGap { .. }
                | RelayError::Dispatch(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lagged_message() {
        let err = RelayError::Lagged(3);
        assert_eq!(err.to_string(), "relay receiver lagged, missed 3 messages");
        assert!(err.needs_resync());
        assert!(!RelayError::Closed.needs_resync());

        let gap = RelayError::SequenceGap { expected: 1, received: 4 };
        assert_eq!(gap.to_string(), "expected confirmed event 1, received 4");
        assert!(gap.needs_resync());
    }
}
