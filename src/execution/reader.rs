//! Collects child output into the shared command

use super::stop_requested;
use fanout_shared::Command;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{watch, Mutex};
use tracing::debug;

const CHUNK_SIZE: usize = 4096;

/// Lossy UTF-8 decoder that carries incomplete sequences between chunks
#[derive(Debug, Default)]
pub struct OutputDecoder {
    pending: Vec<u8>,
}

impl OutputDecoder {
    /// Decode a chunk; a multi-byte sequence cut at the end is kept back
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut text = String::new();
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    text.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[consumed..valid_end]));
                    match e.error_len() {
                        Some(bad) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + bad;
                        }
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        text
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

#[derive(Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

async fn append(command: &Mutex<Command>, stream: Stream, text: String) {
    if text.is_empty() {
        return;
    }
    let mut cmd = command.lock().await;
    match stream {
        Stream::Stdout => cmd.stdout.push_str(&text),
        Stream::Stderr => cmd.stderr.push_str(&text),
    }
}

/// Append both pipes to `command` until they reach EOF or `stop` is raised
pub async fn read_output<O, E>(
    mut stdout: O,
    mut stderr: E,
    command: Arc<Mutex<Command>>,
    mut stop: watch::Receiver<bool>,
) where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out_buf = [0u8; CHUNK_SIZE];
    let mut err_buf = [0u8; CHUNK_SIZE];
    let mut out_decoder = OutputDecoder::default();
    let mut err_decoder = OutputDecoder::default();
    let mut out_open = true;
    let mut err_open = true;

    while out_open || err_open {
        tokio::select! {
            read = stdout.read(&mut out_buf), if out_open => match read {
                Ok(0) => out_open = false,
                Ok(n) => append(&command, Stream::Stdout, out_decoder.decode(&out_buf[..n])).await,
                Err(e) => {
                    debug!("stdout read failed: {}", e);
                    out_open = false;
                }
            },
            read = stderr.read(&mut err_buf), if err_open => match read {
                Ok(0) => err_open = false,
                Ok(n) => append(&command, Stream::Stderr, err_decoder.decode(&err_buf[..n])).await,
                Err(e) => {
                    debug!("stderr read failed: {}", e);
                    err_open = false;
                }
            },
            _ = stop_requested(&mut stop) => break,
        }
    }

    append(&command, Stream::Stdout, out_decoder.finish()).await;
    append(&command, Stream::Stderr, err_decoder.finish()).await;
}
