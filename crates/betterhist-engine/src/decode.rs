/// Incremental UTF-8 decoder for a byte stream that arrives in arbitrary chunks.
///
/// A sequence split across two chunks is held back until it completes.
/// Invalid bytes decode to U+FFFD and are counted.
#[derive(Debug, Default)]
pub struct Utf8Stream {
    pending: Vec<u8>,
    malformed: u64,
}

impl Utf8Stream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8], out: &mut String) {
        let buf = if self.pending.is_empty() {
            bytes.to_vec()
        } else {
            let mut buf = std::mem::take(&mut self.pending);
            buf.extend_from_slice(bytes);
            buf
        };

        let mut input = &buf[..];
        loop {
            match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    if let Ok(text) = std::str::from_utf8(valid) {
                        out.push_str(text);
                    }
                    match err.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.malformed += 1;
                            input = &rest[len..];
                        }
                        None => {
                            self.pending = rest.to_vec();
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Emit a placeholder for an incomplete trailing sequence.
    pub fn flush(&mut self, out: &mut String) {
        if !self.pending.is_empty() {
            self.pending.clear();
            out.push(char::REPLACEMENT_CHARACTER);
            self.malformed += 1;
        }
    }

    /// Forget any partial sequence (used after a recording gap).
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    pub fn malformed(&self) -> u64 {
        self.malformed
    }
}
