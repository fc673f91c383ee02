//! Reader loop draining the shell's output into the buffer.
//!
//! `gw_sh` prints its prompt without a trailing newline, so reads are
//! chunk-based rather than line-based. Bytes are decoded as UTF-8 with a
//! carry-over for sequences split across reads; invalid bytes become U+FFFD
//! instead of ending the loop.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::buffer::OutputSink;

const READ_CHUNK: usize = 4096;

/// Spawn the reader loop.
///
/// One task owns the sink and drains stdout and, when given, stderr. The
/// loop ends when stdout reaches EOF or fails; it then clears `alive`. Read
/// errors end the loop quietly and are never propagated.
pub fn spawn_output_reader<O, E>(
    stdout: O,
    stderr: Option<E>,
    sink: OutputSink,
    alive: Arc<AtomicBool>,
) -> JoinHandle<()>
where
    O: AsyncRead + Unpin + Send + 'static,
    E: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut stdout = stdout;
        let mut stderr = stderr;
        let mut out_buf = vec![0u8; READ_CHUNK];
        let mut err_buf = vec![0u8; READ_CHUNK];
        let mut out_text = Utf8Carry::default();
        let mut err_text = Utf8Carry::default();

        loop {
            tokio::select! {
                read = stdout.read(&mut out_buf) => match read {
                    Ok(0) => break,
                    Ok(n) => sink.append(&out_text.decode(&out_buf[..n])),
                    Err(e) => {
                        debug!(error = %e, "stdout reader exiting due to read error");
                        break;
                    }
                },
                read = read_optional(&mut stderr, &mut err_buf), if stderr.is_some() => match read {
                    Ok(0) => stderr = None,
                    Ok(n) => sink.append(&err_text.decode(&err_buf[..n])),
                    Err(e) => {
                        debug!(error = %e, "stderr reader closed due to read error");
                        stderr = None;
                    }
                },
            }
        }

        sink.append(&err_text.finish());
        sink.append(&out_text.finish());
        alive.store(false, Ordering::SeqCst);
        debug!("output reader task exiting");
    })
}

async fn read_optional<R>(reader: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(r) => r.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Incremental UTF-8 decoder that holds back an incomplete trailing sequence.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(s) => {
                    out.push_str(s);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        // incomplete sequence at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                    }
                }
            }
        }
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
