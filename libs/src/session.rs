use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{payload::LoginData, record::UserProfile};

/// `createdBy` value for records created without a signed-in user.
pub const ANONYMOUS: &str = "anonymous";

/// The signed-in user together with the service-issued token. Created at
/// login, dropped at sign-out, and handed explicitly to whatever needs it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user: UserProfile,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn email(&self) -> &str {
        &self.user.email
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

impl From<LoginData> for Session {
    fn from(data: LoginData) -> Self {
        Session {
            user: data.user,
            token: data.token,
            expires_at: data.expires_at,
        }
    }
}

/// The identity new records are attributed to.
pub fn attribution(session: Option<&Session>) -> &str {
    session.map(Session::email).unwrap_or(ANONYMOUS)
}
