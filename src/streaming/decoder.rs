//! Incremental UTF-8 decoding across chunk boundaries.

/// Stateful UTF-8 decoder.
///
/// Network chunks can end in the middle of a multi-byte sequence. The
/// incomplete tail is held back until the next chunk completes it. Invalid
/// sequences decode to U+FFFD and decoding continues after them.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    /// Creates a new decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a chunk, returning all text that is complete so far.
    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);

        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;

        while consumed < self.pending.len() {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(
                        &self.pending[consumed..consumed + valid_up_to],
                    ));
                    consumed += valid_up_to;

                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed += len;
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => break,
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Flushes any held-back bytes at end of input.
    pub fn finish(&mut self) -> String {
        let out = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        out
    }

    /// Returns the number of bytes held back waiting for completion.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
