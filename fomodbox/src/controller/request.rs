//! Launch request builder.

use std::fmt;
use std::sync::Arc;

use super::outcome::ExitCondition;

/// Called once with the helper's exit condition.
pub type ExitCallback = Box<dyn FnOnce(ExitCondition) + Send + 'static>;

/// Called for every line the helper writes.
pub type OutputCallback = Arc<dyn Fn(OutputStream, &str) + Send + Sync + 'static>;

/// Which helper stream a line came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to start one helper.
pub struct LaunchRequest {
    pub(crate) session_id: String,
    pub(crate) use_pipe: bool,
    pub(crate) boundary: Option<String>,
    pub(crate) on_exit: Option<ExitCallback>,
    pub(crate) on_output: Option<OutputCallback>,
}

impl LaunchRequest {
    /// Request for `session_id`, talking over standard streams, unconfined.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            use_pipe: false,
            boundary: None,
            on_exit: None,
            on_output: None,
        }
    }

    /// Use the duplex named pipes instead of stdin/stdout.
    pub fn with_pipe(mut self, use_pipe: bool) -> Self {
        self.use_pipe = use_pipe;
        self
    }

    /// Run the helper inside the isolation boundary `name`.
    pub fn with_boundary(mut self, name: impl Into<String>) -> Self {
        self.boundary = Some(name.into());
        self
    }

    pub fn on_exit(mut self, callback: impl FnOnce(ExitCondition) + Send + 'static) -> Self {
        self.on_exit = Some(Box::new(callback));
        self
    }

    pub fn on_output(mut self, callback: impl Fn(OutputStream, &str) + Send + Sync + 'static) -> Self {
        self.on_output = Some(Arc::new(callback));
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn use_pipe(&self) -> bool {
        self.use_pipe
    }

    pub fn boundary(&self) -> Option<&str> {
        self.boundary.as_deref()
    }
}

impl fmt::Debug for LaunchRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaunchRequest")
            .field("session_id", &self.session_id)
            .field("use_pipe", &self.use_pipe)
            .field("boundary", &self.boundary)
            .field("on_exit", &self.on_exit.is_some())
            .field("on_output", &self.on_output.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let request = LaunchRequest::new("abc123")
            .with_pipe(true)
            .with_boundary("fomod_abc123")
            .on_exit(|_| {});

        assert_eq!(request.session_id(), "abc123");
        assert!(request.use_pipe());
        assert_eq!(request.boundary(), Some("fomod_abc123"));

        let debug = format!("{request:?}");
        assert!(debug.contains("on_exit: true"));
        assert!(debug.contains("on_output: false"));
    }
}
