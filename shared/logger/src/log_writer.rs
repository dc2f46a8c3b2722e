//! Asynchronous log writer.

use crate::error::{LoggingError, Result};
use crate::log_message::LogMessage;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::mpsc::Receiver;

/// Where formatted log lines end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Append to a file, created if missing.
    File(PathBuf),
    /// Standard error.
    Stderr,
    /// Drop everything.
    Discard,
}

/// Owns the sink and drains the channel in a dedicated thread.
pub(crate) struct LogWriter {
    sink: Box<dyn Write + Send>,
}

impl LogWriter {
    /// Opens the sink for `target`; `Discard` has no writer.
    pub fn open(target: &LogTarget) -> Result<Option<Self>> {
        let sink: Box<dyn Write + Send> = match target {
            LogTarget::File(path) => Box::new(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?,
            ),
            LogTarget::Stderr => Box::new(io::stderr()),
            LogTarget::Discard => return Ok(None),
        };
        Ok(Some(Self { sink }))
    }

    /// Writes and flushes a message.
    fn write_message(&mut self, message: &LogMessage) {
        if let Err(e) = self.sink.write_all(message.format().as_bytes()) {
            eprintln!("Error writing log: {}", e);
            return;
        }
        if let Err(e) = self.sink.flush() {
            eprintln!("Error flushing log: {}", e);
        }
    }

    /// Runs the writer loop until every sender is dropped.
    pub fn run(mut self, receiver: Receiver<LogMessage>) {
        for message in receiver {
            self.write_message(&message);
        }
    }
}

/// Spawns the writer thread for `writer`.
pub(crate) fn spawn_writer_thread(writer: LogWriter, receiver: Receiver<LogMessage>) -> Result<()> {
    std::thread::Builder::new()
        .name("log-writer".to_string())
        .spawn(move || writer.run(receiver))
        .map_err(LoggingError::WriterThread)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_level::LogLevel;
    use std::fs;
    use std::sync::mpsc::channel;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_file_target_creates_file() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");

        let writer = LogWriter::open(&LogTarget::File(log_path.clone())).unwrap();
        assert!(writer.is_some());
        assert!(log_path.exists());
    }

    #[test]
    fn test_discard_target_has_no_writer() {
        assert!(LogWriter::open(&LogTarget::Discard).unwrap().is_none());
    }

    #[test]
    fn test_spawn_writer_thread() {
        let dir = tempdir().unwrap();
        let log_path = dir.path().join("test.log");
        let (sender, receiver) = channel();

        let writer = LogWriter::open(&LogTarget::File(log_path.clone()))
            .unwrap()
            .unwrap();
        spawn_writer_thread(writer, receiver).unwrap();

        sender
            .send(LogMessage::new(LogLevel::Debug, Some("sctp"), "Thread test"))
            .unwrap();
        drop(sender);

        thread::sleep(Duration::from_millis(100));

        let content = fs::read_to_string(log_path).unwrap();
        assert!(content.contains("[component: sctp]: Thread test"));
    }
}
