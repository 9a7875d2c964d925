//! Log streaming from helper stdout/stderr to the host's tracing system.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{ChildStderr, ChildStdout};
use tokio::task::JoinHandle;

use super::request::{OutputCallback, OutputStream};

/// Owns the reader tasks for one helper's output pipes.
///
/// Each stream gets a task that reads lines, logs them (stdout at DEBUG,
/// stderr at WARN) and hands them to the caller's output callback.
pub(super) struct LogStreamHandler {
    tasks: Vec<JoinHandle<()>>,
}

impl LogStreamHandler {
    pub(super) fn new(
        stdout: Option<ChildStdout>,
        stderr: Option<ChildStderr>,
        callback: Option<OutputCallback>,
    ) -> Self {
        let mut tasks = Vec::with_capacity(2);
        if let Some(stdout) = stdout {
            tasks.push(Self::spawn_reader(stdout, OutputStream::Stdout, callback.clone()));
        }
        if let Some(stderr) = stderr {
            tasks.push(Self::spawn_reader(stderr, OutputStream::Stderr, callback));
        }
        Self { tasks }
    }

    /// Strips ANSI escape codes from a string.
    ///
    /// Console runtimes colorize output when they think they own a terminal.
    fn strip_ansi_codes(text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut chars = text.chars();

        while let Some(c) = chars.next() {
            if c == '\x1b' {
                if chars.next() == Some('[') {
                    for next_char in chars.by_ref() {
                        if next_char == 'm' {
                            break;
                        }
                    }
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    fn spawn_reader<R: AsyncRead + Unpin + Send + 'static>(
        reader: R,
        stream: OutputStream,
        callback: Option<OutputCallback>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = String::from_utf8_lossy(trim_line_end(&buf));
                        let clean_line = Self::strip_ansi_codes(&line);
                        match stream {
                            OutputStream::Stdout => {
                                tracing::debug!(target: "fomod:stdout", "{}", clean_line);
                            }
                            OutputStream::Stderr => {
                                tracing::warn!(target: "fomod:stderr", "{}", clean_line);
                            }
                        }
                        if let Some(callback) = &callback {
                            callback(stream, &clean_line);
                        }
                    }
                    Err(e) => {
                        tracing::error!(
                            target: "fomod:stdout/stderr",
                            stream = %stream,
                            "Failed to read from pipe: {}", e
                        );
                        // Closing the read end would kill the helper with SIGPIPE
                        if let Err(e) = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await {
                            tracing::debug!(
                                target: "fomod:stdout/stderr",
                                stream = %stream,
                                "Discarding output failed: {}", e
                            );
                        }
                        break;
                    }
                }
            }
            tracing::debug!(
                target: "fomod:stdout/stderr",
                stream = %stream,
                "Pipe closed, reader exiting"
            );
        })
    }

    /// Wait for the readers to reach EOF, at most `timeout` in total.
    ///
    /// Readers still running after that (a grandchild inherited the pipe) are
    /// aborted.
    pub(super) async fn shutdown(self, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        for mut task in self.tasks {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!("Output reader task failed: {}", e),
                Err(_) => {
                    tracing::debug!("Output still open after helper exit, detaching reader");
                    task.abort();
                }
            }
        }
    }

    pub(super) fn abort(self) {
        for task in self.tasks {
            task.abort();
        }
    }
}

/// Strip the `\n` or `\r\n` terminator of a line.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
