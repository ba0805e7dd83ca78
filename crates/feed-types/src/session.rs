use std::fmt;

use uuid::Uuid;

/// Stream token of the HEAD session.
///
/// Random tokens are hyphenated UUIDs and can never collide with it.
pub const HEAD_TOKEN: &str = "$HEAD";

/// Handle to a session journal.
///
/// A session is identified by its stream token, which is also the name of
/// the journal holding its structure records. The reserved [`Session::head`]
/// handle is the baseline every new session is forked from.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Session {
    token: String,
}

impl Session {
    /// The HEAD session.
    pub fn head() -> Self {
        Self {
            token: HEAD_TOKEN.to_string(),
        }
    }

    /// A fresh session with a random (UUID v4) stream token.
    pub fn random() -> Self {
        Self {
            token: Uuid::new_v4().to_string(),
        }
    }

    /// Wrap an existing journal name.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The stream token, which doubles as the journal name.
    pub fn stream_token(&self) -> &str {
        &self.token
    }

    /// Returns `true` if this is the HEAD session.
    pub fn is_head(&self) -> bool {
        self.token == HEAD_TOKEN
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Session({})", self.token)
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token)
    }
}
