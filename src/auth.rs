//! Identity capability handed to the booking core.

/// Answers who is acting; `None` means nobody is signed in.
pub trait Auth: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Explicit session value for callers that are not HTTP requests
/// (background jobs, tests, embedding applications).
#[derive(Debug, Clone, Default)]
pub struct Session {
    user_id: Option<String>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self { user_id: Some(user_id.into()) }
    }

    pub fn sign_in(&mut self, user_id: impl Into<String>) {
        self.user_id = Some(user_id.into());
    }

    pub fn sign_out(&mut self) {
        self.user_id = None;
    }
}

impl Auth for Session {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.clone()
    }
}
