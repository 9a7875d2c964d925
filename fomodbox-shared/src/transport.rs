//! Transport selection for host-helper communication.

use std::path::PathBuf;

use crate::constants::transport::{PIPE_FLAG, REPLY_PIPE_SUFFIX};

/// Channel the helper uses to talk to the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TransportKind {
    /// Bidirectional named pipes, named after the session id.
    DuplexPipe,

    /// The helper's stdin/stdout.
    StandardStream,
}

impl TransportKind {
    /// Pick the transport for a launch request.
    pub fn select(use_pipe: bool) -> Self {
        if use_pipe {
            Self::DuplexPipe
        } else {
            Self::StandardStream
        }
    }

    /// Build the helper's argument vector for this transport.
    ///
    /// The session id is always the first argument.
    pub fn build_args(self, session_id: &str) -> Vec<String> {
        let mut args = vec![session_id.to_string()];
        if self == Self::DuplexPipe {
            args.push(PIPE_FLAG.to_string());
        }
        args
    }
}

/// Build the helper's argument vector for a launch request.
pub fn build_args(session_id: &str, use_pipe: bool) -> Vec<String> {
    TransportKind::select(use_pipe).build_args(session_id)
}

/// Literal name of a named pipe.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PipeName(String);

impl PipeName {
    /// Request pipe of a session: the session id itself.
    pub fn request(session_id: &str) -> Self {
        Self(session_id.to_string())
    }

    /// Reply pipe of a session: the session id plus `_reply`.
    pub fn reply(session_id: &str) -> Self {
        Self(format!("{session_id}{REPLY_PIPE_SUFFIX}"))
    }

    /// Both pipes of a session, request first.
    pub fn pair(session_id: &str) -> [Self; 2] {
        [Self::request(session_id), Self::reply(session_id)]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Location of the pipe endpoint in the file system namespace.
    ///
    /// Windows exposes pipes under `\\?\pipe\`. On Unix the .NET runtime backs
    /// a named pipe with a socket in the temp directory.
    pub fn endpoint_path(&self) -> PathBuf {
        #[cfg(windows)]
        {
            PathBuf::from(format!(r"\\?\pipe\{}", self.0))
        }

        #[cfg(not(windows))]
        {
            use crate::constants::transport::UNIX_PIPE_PREFIX;
            std::env::temp_dir().join(format!("{UNIX_PIPE_PREFIX}{}", self.0))
        }
    }
}

impl std::fmt::Display for PipeName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
