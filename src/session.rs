use uuid::Uuid;

/// Source of the current session id. Session lifecycle lives outside the
/// pipeline; exporters only read the id.
pub trait SessionProvider: Send + Sync {
    fn session_id(&self) -> String;
}

/// Session id fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct FixedSession {
    id: String,
}

impl FixedSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn random() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }
}

impl SessionProvider for FixedSession {
    fn session_id(&self) -> String {
        self.id.clone()
    }
}
