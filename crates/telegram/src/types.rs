//! Wire types for the sidecar protocol.

use serde::{Deserialize, Serialize};

use clockname_sessions::{AccountProfile, SessionError};

/// Requests sent to the sidecar. Every request carries a `requestId` that the
/// matching reply echoes back.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    Connect {
        #[serde(rename = "accountId")]
        account_id: String,
        #[serde(rename = "apiId")]
        api_id: i32,
        #[serde(rename = "apiHash")]
        api_hash: String,
        #[serde(rename = "sessionPath")]
        session_path: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    IsAuthorized {
        #[serde(rename = "accountId")]
        account_id: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    GetMe {
        #[serde(rename = "accountId")]
        account_id: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    UpdateProfile {
        #[serde(rename = "accountId")]
        account_id: String,
        #[serde(rename = "lastName")]
        last_name: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Disconnect {
        #[serde(rename = "accountId")]
        account_id: String,
        #[serde(rename = "requestId")]
        request_id: String,
    },
}

/// Messages received from the sidecar.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SidecarMessage {
    Response(SidecarReply),
    /// Unsolicited failure not tied to a request.
    Error {
        #[serde(rename = "accountId")]
        account_id: Option<String>,
        error: String,
    },
}

/// Answer to one [`GatewayMessage`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SidecarReply {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub authorized: Option<bool>,
    #[serde(default)]
    pub profile: Option<ProfileInfo>,
}

impl SidecarReply {
    /// Turn a negative reply into [`SessionError::Rejected`].
    pub fn into_result(self) -> Result<Self, SessionError> {
        if self.ok {
            Ok(self)
        } else {
            Err(SessionError::Rejected(
                self.error.unwrap_or_else(|| "no reason given".into()),
            ))
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileInfo {
    #[serde(rename = "firstName")]
    pub first_name: Option<String>,
    pub username: Option<String>,
}

impl From<ProfileInfo> for AccountProfile {
    fn from(p: ProfileInfo) -> Self {
        Self {
            first_name: p.first_name,
            username: p.username,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_fields() {
        let msg = GatewayMessage::UpdateProfile {
            account_id: "1555".into(),
            last_name: "10:15 UTC+8".into(),
            request_id: "r1".into(),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "update_profile");
        assert_eq!(json["accountId"], "1555");
        assert_eq!(json["lastName"], "10:15 UTC+8");
        assert_eq!(json["requestId"], "r1");
    }

    #[test]
    fn parses_reply_with_profile() {
        let msg: SidecarMessage = serde_json::from_str(
            r#"{"type":"response","requestId":"r2","ok":true,
                "profile":{"firstName":"Ada","username":"ada"}}"#,
        )
        .unwrap();
        let SidecarMessage::Response(reply) = msg else {
            panic!("expected a response");
        };
        let profile: AccountProfile = reply.profile.unwrap().into();
        assert_eq!(profile.to_string(), "Ada (@ada)");
    }

    #[test]
    fn negative_reply_is_rejected() {
        let reply = SidecarReply {
            request_id: "r3".into(),
            ok: false,
            error: Some("FLOOD_WAIT_30".into()),
            ..Default::default()
        };
        assert!(matches!(
            reply.into_result(),
            Err(SessionError::Rejected(reason)) if reason == "FLOOD_WAIT_30"
        ));
    }
}
