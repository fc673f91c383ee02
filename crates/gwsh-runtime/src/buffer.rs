//! Output buffer shared between the reader loop and the supervisor.
//!
//! The buffer is split into two handles: an [`OutputSink`] that can only
//! append and is not `Clone`, and any number of [`OutputBuffer`] handles
//! that can read and drain. Whoever owns the sink is the single writer.
//!
//! All operations take the same short-lived lock, so an append never
//! interleaves with a snapshot or a drain, and the reader loop never waits
//! behind a caller that is blocked on a command timeout.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct Shared {
    text: Mutex<String>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, String> {
        // A poisoned lock only means a panic elsewhere; the text is still intact.
        self.text.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create a connected sink/buffer pair.
pub fn output_buffer() -> (OutputSink, OutputBuffer) {
    let shared = Arc::new(Shared::default());
    (
        OutputSink {
            shared: Arc::clone(&shared),
        },
        OutputBuffer { shared },
    )
}

/// Append-only handle owned by the reader loop.
#[derive(Debug)]
pub struct OutputSink {
    shared: Arc<Shared>,
}

impl OutputSink {
    /// Append `chunk` at the tail.
    pub fn append(&self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.shared.lock().push_str(chunk);
    }

    /// A read handle onto the same buffer.
    pub fn buffer(&self) -> OutputBuffer {
        OutputBuffer {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Read/drain handle used by the supervisor.
#[derive(Debug, Clone)]
pub struct OutputBuffer {
    shared: Arc<Shared>,
}

impl OutputBuffer {
    /// Current content, without modifying it.
    pub fn snapshot(&self) -> String {
        self.shared.lock().clone()
    }

    /// Current content; the buffer is left empty.
    pub fn drain(&self) -> String {
        std::mem::take(&mut *self.shared.lock())
    }

    /// Drain everything except a tail that could be the start of `token`.
    ///
    /// The held-back bytes stay buffered, so a token split across reads still
    /// matches once the rest of it arrives.
    pub fn drain_before_partial(&self, token: &str) -> String {
        let mut text = self.shared.lock();
        let keep = (1..token.len())
            .rev()
            .filter(|&len| token.is_char_boundary(len))
            .find(|&len| text.ends_with(&token[..len]))
            .unwrap_or(0);
        let at = text.len() - keep;
        let tail = text.split_off(at);
        std::mem::replace(&mut *text, tail)
    }

    /// Buffered length in bytes.
    pub fn len(&self) -> usize {
        self.shared.lock().len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty()
    }

    /// Whether the accumulated content ends with `suffix`.
    ///
    /// Checks in place, so polling a large buffer does not copy it.
    pub fn ends_with(&self, suffix: &str) -> bool {
        self.shared.lock().ends_with(suffix)
    }
}
