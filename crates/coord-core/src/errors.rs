/// Typed error hierarchy for realtime connection operations.
/// Classifies errors as retryable (drives the reconnect loop) or terminal.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    // Retryable
    #[error("websocket handshake failed: {0}")]
    Handshake(String),
    #[error("transport error: {0}")]
    Transport(String),

    // Terminal
    #[error("reconnect attempts exhausted after {attempts}")]
    ReconnectExhausted { attempts: u32 },
    #[error("client is terminated")]
    Terminated,
}

impl ClientError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Handshake(_) | Self::Transport(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Handshake(_) => "handshake",
            Self::Transport(_) => "transport",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
            Self::Terminated => "terminated",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(ClientError::Handshake("refused".into()).is_retryable());
        assert!(ClientError::Transport("reset".into()).is_retryable());
    }

    #[test]
    fn terminal_classification() {
        assert!(!ClientError::ReconnectExhausted { attempts: 5 }.is_retryable());
        assert!(!ClientError::Terminated.is_retryable());
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(ClientError::Terminated.error_kind(), "terminated");
        assert_eq!(
            ClientError::ReconnectExhausted { attempts: 3 }.error_kind(),
            "reconnect_exhausted"
        );
    }

    #[test]
    fn display_includes_attempt_count() {
        let err = ClientError::ReconnectExhausted { attempts: 5 };
        assert!(err.to_string().contains('5'));
    }
}
