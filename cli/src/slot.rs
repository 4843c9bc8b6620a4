use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use libs::session::Session;

const APP_DIR: &str = "td";
const SESSION_FILE: &str = "session.json";

#[derive(thiserror::Error, Debug)]
pub enum SlotError {
    #[error("could not access the session file `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("could not write the session: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The one file a signed-in session is kept in between commands. Holds the
/// profile and the service token, never the password.
#[derive(Debug, Clone)]
pub struct SessionSlot {
    path: PathBuf,
}

impl SessionSlot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SessionSlot { path: path.into() }
    }

    /// `session.json` under the platform's local data directory.
    pub fn default_location() -> Option<Self> {
        dirs::data_local_dir().map(|dir| SessionSlot::new(dir.join(APP_DIR).join(SESSION_FILE)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored session, or `None` when signed out. An expired or
    /// unreadable slot counts as signed out and is removed.
    pub fn load(&self, now: DateTime<Utc>) -> Result<Option<Session>, SlotError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let session = match serde_json::from_str::<Session>(&content) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!("discarding unreadable session file: {}", e);
                self.clear()?;
                return Ok(None);
            }
        };

        if session.is_expired(now) {
            tracing::info!("session of {} expired at {}", session.email(), session.expires_at);
            self.clear()?;
            return Ok(None);
        }
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<(), SlotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let content = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, content).map_err(|e| self.io_error(e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mut perms = fs::metadata(&self.path)
                .map_err(|e| self.io_error(e))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(|e| self.io_error(e))?;
        }
        Ok(())
    }

    /// Removes the slot. Returns whether there was anything to remove.
    pub fn clear(&self) -> Result<bool, SlotError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn io_error(&self, source: io::Error) -> SlotError {
        SlotError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use libs::record::UserProfile;

    use super::*;

    fn session(expires_at: DateTime<Utc>) -> Session {
        Session {
            user: UserProfile {
                username: "ann".to_string(),
                email: "ann@example.com".to_string(),
            },
            token: "token".to_string(),
            expires_at,
        }
    }

    #[test]
    fn empty_slot_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SessionSlot::new(dir.path().join("session.json"));
        assert_eq!(slot.load(Utc::now()).unwrap(), None);
        assert!(!slot.clear().unwrap());
    }

    #[test]
    fn saved_session_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SessionSlot::new(dir.path().join("nested").join("session.json"));
        let now = Utc::now();
        let stored = session(now + Duration::hours(1));

        slot.save(&stored).unwrap();
        assert_eq!(slot.load(now).unwrap(), Some(stored));

        let raw = fs::read_to_string(slot.path()).unwrap();
        assert!(raw.contains("\"expiresAt\""));
        assert!(!raw.contains("password"));
    }

    #[cfg(unix)]
    #[test]
    fn slot_is_private_to_the_user() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let slot = SessionSlot::new(dir.path().join("session.json"));
        slot.save(&session(Utc::now() + Duration::hours(1))).unwrap();
        let mode = fs::metadata(slot.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn expired_session_is_signed_out_and_removed() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SessionSlot::new(dir.path().join("session.json"));
        let now = Utc::now();
        slot.save(&session(now - Duration::seconds(1))).unwrap();

        assert_eq!(slot.load(now).unwrap(), None);
        assert!(!slot.path().exists());
    }

    #[test]
    fn corrupt_slot_is_signed_out() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SessionSlot::new(dir.path().join("session.json"));
        fs::write(slot.path(), "{not a session").unwrap();

        assert_eq!(slot.load(Utc::now()).unwrap(), None);
        assert!(!slot.path().exists());
    }

    #[test]
    fn clear_signs_out() {
        let dir = tempfile::tempdir().unwrap();
        let slot = SessionSlot::new(dir.path().join("session.json"));
        slot.save(&session(Utc::now() + Duration::hours(1))).unwrap();

        assert!(slot.clear().unwrap());
        assert_eq!(slot.load(Utc::now()).unwrap(), None);
    }
}
