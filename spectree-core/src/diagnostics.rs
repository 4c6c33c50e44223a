//! Diagnostic stream
//!
//! Per-package problems found during a run are reported here, separate from
//! both the report and the tracing log. Handles are cheap to clone; a single
//! writer thread owns the destination so lines never interleave.

use std::fmt;
use std::io::{self, Write};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub package: Option<String>,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(package) = &self.package {
            write!(f, "{}: ", package)?;
        }
        // Keep each incident on one line
        let message = self.message.replace(['\n', '\r'], " ");
        write!(f, "{}: {}", self.severity, message.trim_end())
    }
}

enum DiagnosticMessage {
    Entry(Diagnostic),
    Done,
}

#[derive(Clone)]
pub struct DiagnosticLog {
    sender: Sender<DiagnosticMessage>,
}

impl DiagnosticLog {
    /// Start a writer thread for `dest` and return a handle to it.
    pub fn spawn<W>(dest: W) -> (DiagnosticLog, DiagnosticWriter<W>)
    where
        W: Write + Send + 'static,
    {
        let (sender, receiver) = channel();
        let handle = thread::spawn(move || write_diagnostics(dest, receiver));
        (DiagnosticLog { sender }, DiagnosticWriter { handle })
    }

    /// A handle whose entries go nowhere.
    pub fn discard() -> DiagnosticLog {
        let (sender, _) = channel();
        DiagnosticLog { sender }
    }

    pub fn warn(&self, package: Option<&str>, msg: impl Into<String>) {
        self.send(package, Severity::Warning, msg.into());
    }

    pub fn error(&self, package: Option<&str>, msg: impl Into<String>) {
        self.send(package, Severity::Error, msg.into());
    }

    fn send(&self, package: Option<&str>, severity: Severity, message: String) {
        let _ = self.sender.send(DiagnosticMessage::Entry(Diagnostic {
            package: package.map(str::to_string),
            severity,
            message,
        }));
    }

    fn done(&self) {
        let _ = self.sender.send(DiagnosticMessage::Done);
    }
}

pub struct DiagnosticWriter<W> {
    handle: JoinHandle<io::Result<(W, usize)>>,
}

impl<W> DiagnosticWriter<W> {
    /// Flush outstanding entries and stop the writer thread, returning the
    /// destination and the number of lines written.
    pub fn finish(self, log: DiagnosticLog) -> io::Result<(W, usize)> {
        log.done();
        drop(log);
        self.handle
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("diagnostic writer panicked")))
    }
}

fn write_diagnostics<W: Write>(
    mut dest: W,
    receiver: Receiver<DiagnosticMessage>,
) -> io::Result<(W, usize)> {
    let mut count = 0;
    // Ends on Done or when every handle has been dropped
    while let Ok(msg) = receiver.recv() {
        match msg {
            DiagnosticMessage::Entry(diagnostic) => {
                writeln!(dest, "{}", diagnostic)?;
                count += 1;
            }
            DiagnosticMessage::Done => break,
        }
    }
    dest.flush()?;
    Ok((dest, count))
}
