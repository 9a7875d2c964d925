use fomodbox_shared::TransportKind;
use serde::{Deserialize, Serialize};

/// One launch of the helper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: String,
    transport: TransportKind,
    boundary: Option<String>,
}

impl Session {
    pub fn new(id: impl Into<String>, transport: TransportKind, boundary: Option<String>) -> Self {
        Self {
            id: id.into(),
            transport,
            boundary,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Boundary the helper runs in, `None` when it runs unconfined.
    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }

    pub(crate) fn set_boundary(&mut self, boundary: Option<String>) {
        self.boundary = boundary;
    }
}
