//! [`SessionConnector`] implementation backed by the sidecar.

use std::{path::PathBuf, time::Duration};

use {
    async_trait::async_trait,
    secrecy::ExposeSecret,
    tracing::{debug, instrument},
};

use {
    clockname_config::AccountConfig,
    clockname_sessions::{AccountProfile, AccountSession, SessionConnector, SessionError},
};

use crate::{
    sidecar::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_SIDECAR_URL, SidecarLink},
    types::GatewayMessage,
};

/// Opens one sidecar connection per account.
#[derive(Debug, Clone)]
pub struct TelegramConnector {
    url: String,
    request_timeout: Duration,
}

impl TelegramConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for TelegramConnector {
    fn default() -> Self {
        Self::new(DEFAULT_SIDECAR_URL)
    }
}

#[async_trait]
impl SessionConnector for TelegramConnector {
    #[instrument(skip_all, fields(account_id = %account_id))]
    async fn connect(
        &self,
        account_id: &str,
        account: &AccountConfig,
        session_path: PathBuf,
    ) -> Result<Box<dyn AccountSession>, SessionError> {
        let link = SidecarLink::open(&self.url, self.request_timeout).await?;
        let connected = link
            .request(|request_id| GatewayMessage::Connect {
                account_id: account_id.to_string(),
                api_id: account.api_id,
                api_hash: account.api_hash.expose_secret().clone(),
                session_path: session_path.display().to_string(),
                request_id,
            })
            .await;
        if let Err(e) = connected {
            link.close();
            return Err(SessionError::Connect(e.to_string()));
        }
        debug!(session_path = %session_path.display(), "session opened");

        Ok(Box::new(TelegramSession {
            account_id: account_id.to_string(),
            link,
        }))
    }
}

/// A Telegram account driven through its own sidecar connection.
pub struct TelegramSession {
    account_id: String,
    link: SidecarLink,
}

#[async_trait]
impl AccountSession for TelegramSession {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    async fn is_authorized(&self) -> Result<bool, SessionError> {
        let reply = self
            .link
            .request(|request_id| GatewayMessage::IsAuthorized {
                account_id: self.account_id.clone(),
                request_id,
            })
            .await?;
        Ok(reply.authorized.unwrap_or(false))
    }

    async fn update_profile(&self, last_name: &str) -> Result<(), SessionError> {
        self.link
            .request(|request_id| GatewayMessage::UpdateProfile {
                account_id: self.account_id.clone(),
                last_name: last_name.to_string(),
                request_id,
            })
            .await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), SessionError> {
        let result = self
            .link
            .request(|request_id| GatewayMessage::Disconnect {
                account_id: self.account_id.clone(),
                request_id,
            })
            .await;
        self.link.close();
        result.map(|_| ())
    }

    async fn profile(&self) -> Option<AccountProfile> {
        let reply = self
            .link
            .request(|request_id| GatewayMessage::GetMe {
                account_id: self.account_id.clone(),
                request_id,
            })
            .await;
        match reply {
            Ok(reply) => reply.profile.map(AccountProfile::from),
            Err(e) => {
                debug!(account_id = %self.account_id, error = %e, "profile lookup failed");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::sidecar::tests::{fake_sidecar, ok},
        serde_json::{Value, json},
        std::sync::Arc,
    };

    fn telegram(req: &Value) -> Option<Value> {
        let mut reply = ok(req);
        match req["type"].as_str() {
            Some("is_authorized") => reply["authorized"] = json!(req["accountId"] != "999"),
            Some("get_me") => reply["profile"] = json!({"firstName": "Ada", "username": "ada"}),
            Some("update_profile") if req["lastName"] == "flood" => {
                reply["ok"] = json!(false);
                reply["error"] = json!("FLOOD_WAIT_5");
            },
            Some("connect") if req["apiId"] == 0 => {
                reply["ok"] = json!(false);
                reply["error"] = json!("API_ID_INVALID");
            },
            _ => {},
        }
        Some(reply)
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let (url, seen) = fake_sidecar(Arc::new(telegram)).await;
        let connector = TelegramConnector::new(url).with_request_timeout(Duration::from_secs(5));

        let session = connector
            .connect(
                "1555",
                &AccountConfig::new(12345, "abcdef"),
                PathBuf::from("/data/sessions/1555"),
            )
            .await
            .unwrap();
        assert!(session.is_authorized().await.unwrap());
        assert_eq!(session.profile().await.unwrap().to_string(), "Ada (@ada)");
        session.update_profile("10:15 UTC+8").await.unwrap();
        session.disconnect().await.unwrap();

        let seen = seen.lock().unwrap().clone();
        let kinds: Vec<_> = seen.iter().map(|r| r["type"].as_str().unwrap()).collect();
        assert_eq!(kinds, [
            "connect",
            "is_authorized",
            "get_me",
            "update_profile",
            "disconnect"
        ]);
        assert_eq!(seen[0]["apiHash"], "abcdef");
        assert_eq!(seen[0]["sessionPath"], "/data/sessions/1555");
        assert_eq!(seen[3]["lastName"], "10:15 UTC+8");
    }

    #[tokio::test]
    async fn unauthorized_account() {
        let (url, _) = fake_sidecar(Arc::new(telegram)).await;
        let session = TelegramConnector::new(url)
            .connect("999", &AccountConfig::new(1, "h"), PathBuf::from("999"))
            .await
            .unwrap();
        assert!(!session.is_authorized().await.unwrap());
    }

    #[tokio::test]
    async fn rejected_update_is_reported() {
        let (url, _) = fake_sidecar(Arc::new(telegram)).await;
        let session = TelegramConnector::new(url)
            .connect("1555", &AccountConfig::new(1, "h"), PathBuf::from("1555"))
            .await
            .unwrap();
        let err = session.update_profile("flood").await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected(reason) if reason == "FLOOD_WAIT_5"));
    }

    #[tokio::test]
    async fn refused_connect_is_a_connect_error() {
        let (url, _) = fake_sidecar(Arc::new(telegram)).await;
        let result = TelegramConnector::new(url)
            .connect("1555", &AccountConfig::new(0, "h"), PathBuf::from("1555"))
            .await;
        assert!(matches!(result, Err(SessionError::Connect(_))));
    }

    #[test]
    fn default_points_at_local_sidecar() {
        assert_eq!(TelegramConnector::default().url(), "ws://127.0.0.1:9877");
    }
}
