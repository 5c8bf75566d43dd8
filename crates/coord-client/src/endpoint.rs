use std::fmt::Write as _;

use secrecy::{ExposeSecret, SecretString};

use coord_core::ids::{AgentId, ClientId, SessionId};

/// WebSocket endpoint a client connects to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// General session channel: `/session/{session_id}`.
    Session(SessionId),
    /// Visualization channel: `/visualization/{session_id}`.
    Visualization(SessionId),
    /// Per-agent monitoring channel: `/agent/{session_id}/{agent_id}`.
    Agent(SessionId, AgentId),
}

impl Endpoint {
    pub fn path(&self) -> String {
        match self {
            Self::Session(session) => format!("/session/{session}"),
            Self::Visualization(session) => format!("/visualization/{session}"),
            Self::Agent(session, agent) => format!("/agent/{session}/{agent}"),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        match self {
            Self::Session(session) | Self::Visualization(session) | Self::Agent(session, _) => {
                session
            }
        }
    }

    /// Build the full connection URL, appending `client_id` and `token` query
    /// parameters when present. The token is only exposed here.
    pub fn url(
        &self,
        base_url: &str,
        client_id: Option<&ClientId>,
        token: Option<&SecretString>,
    ) -> String {
        let mut url = format!("{}{}", base_url.trim_end_matches('/'), self.path());
        let mut separator = '?';
        if let Some(id) = client_id {
            let _ = write!(url, "{separator}client_id={id}");
            separator = '&';
        }
        if let Some(token) = token {
            let _ = write!(url, "{separator}token={}", token.expose_secret());
        }
        url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SessionId {
        SessionId::from_raw("sess_1")
    }

    #[test]
    fn session_path() {
        let endpoint = Endpoint::Session(session());
        assert_eq!(endpoint.path(), "/session/sess_1");
    }

    #[test]
    fn visualization_path() {
        let endpoint = Endpoint::Visualization(session());
        assert_eq!(endpoint.path(), "/visualization/sess_1");
    }

    #[test]
    fn agent_path() {
        let endpoint = Endpoint::Agent(session(), AgentId::from_raw("agent_9"));
        assert_eq!(endpoint.path(), "/agent/sess_1/agent_9");
    }

    #[test]
    fn url_without_query_params() {
        let endpoint = Endpoint::Session(session());
        assert_eq!(
            endpoint.url("ws://host:9091/ws", None, None),
            "ws://host:9091/ws/session/sess_1"
        );
    }

    #[test]
    fn url_trims_trailing_slash() {
        let endpoint = Endpoint::Session(session());
        assert_eq!(
            endpoint.url("ws://host/ws/", None, None),
            "ws://host/ws/session/sess_1"
        );
    }

    #[test]
    fn url_with_client_id_only() {
        let endpoint = Endpoint::Session(session());
        let client_id = ClientId::from_raw("client-3");
        assert_eq!(
            endpoint.url("ws://host", Some(&client_id), None),
            "ws://host/session/sess_1?client_id=client-3"
        );
    }

    #[test]
    fn url_with_token_only() {
        let endpoint = Endpoint::Session(session());
        let token = SecretString::from("tok123");
        assert_eq!(
            endpoint.url("ws://host", None, Some(&token)),
            "ws://host/session/sess_1?token=tok123"
        );
    }

    #[test]
    fn url_with_client_id_and_token() {
        let endpoint = Endpoint::Visualization(session());
        let client_id = ClientId::from_raw("client-3");
        let token = SecretString::from("tok123");
        assert_eq!(
            endpoint.url("ws://host", Some(&client_id), Some(&token)),
            "ws://host/visualization/sess_1?client_id=client-3&token=tok123"
        );
    }

    #[test]
    fn session_id_accessor() {
        let endpoint = Endpoint::Agent(session(), AgentId::from_raw("agent_9"));
        assert_eq!(endpoint.session_id().as_str(), "sess_1");
    }
}
