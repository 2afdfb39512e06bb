//! Where `print` goes.
//!
//! Expression evaluations log printed text; block executions capture it so
//! the text can be sent back as the command's reply.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

/// Forwards printed text to the log under the `admin_eval::snippet` target.
#[derive(Default)]
pub struct LogOutput;

impl LogOutput {
    pub fn write(&self, text: &str) {
        let text = text.strip_suffix('\n').unwrap_or(text);
        if !text.is_empty() {
            info!(target: "admin_eval::snippet", "{}", text);
        }
    }
}

/// Collects printed text in memory.
#[derive(Default)]
pub struct BufferOutput {
    buffer: Mutex<String>,
}

impl BufferOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, text: &str) {
        self.buffer.lock().push_str(text);
    }

    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    pub fn clear(&self) {
        self.buffer.lock().clear();
    }
}

pub enum OutputSink {
    Log(LogOutput),
    Buffer(BufferOutput),
}

impl OutputSink {
    pub fn log() -> Self {
        OutputSink::Log(LogOutput)
    }

    pub fn buffer() -> Self {
        OutputSink::Buffer(BufferOutput::new())
    }

    pub fn write(&self, text: &str) {
        match self {
            Self::Log(sink) => sink.write(text),
            Self::Buffer(sink) => sink.write(text),
        }
    }

    /// Captured text; always empty for the log sink.
    pub fn contents(&self) -> String {
        match self {
            Self::Log(_) => String::new(),
            Self::Buffer(sink) => sink.contents(),
        }
    }

    pub fn clear(&self) {
        if let Self::Buffer(sink) = self {
            sink.clear();
        }
    }
}

impl Default for OutputSink {
    fn default() -> Self {
        Self::log()
    }
}

pub type SharedOutput = Arc<OutputSink>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_captures_in_order() {
        let sink = OutputSink::buffer();
        sink.write("hello");
        sink.write(" ");
        sink.write("world\n");
        assert_eq!(sink.contents(), "hello world\n");
        sink.clear();
        assert_eq!(sink.contents(), "");
    }

    #[test]
    fn test_log_sink_captures_nothing() {
        let sink = OutputSink::log();
        sink.write("ignored\n");
        assert_eq!(sink.contents(), "");
    }
}
