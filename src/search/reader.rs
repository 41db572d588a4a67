use encoding_rs_io::{DecodeReaderBytes, DecodeReaderBytesBuilder};
use std::io::{self, BufRead, BufReader, Read};

const READER_CAPACITY: usize = 8192;

/// Line-oriented reader with byte-order-mark detection.
///
/// UTF-16 LE/BE input (detected by BOM) is transcoded to UTF-8; a UTF-8 BOM
/// is stripped; everything else is assumed UTF-8, with invalid sequences
/// replaced. Recognized terminators are LF, CRLF and lone CR; terminators
/// are not part of the returned lines.
pub(crate) struct LineReader<R: Read> {
    inner: BufReader<DecodeReaderBytes<R, Vec<u8>>>,
}

impl<R: Read> LineReader<R> {
    pub(crate) fn new(stream: R) -> Self {
        let decoder = DecodeReaderBytesBuilder::new()
            .bom_sniffing(true)
            .strip_bom(true)
            .utf8_passthru(true)
            .build(stream);
        Self {
            inner: BufReader::with_capacity(READER_CAPACITY, decoder),
        }
    }

    /// Reads the next line, or `None` at end of input.
    pub(crate) fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut line: Vec<u8> = Vec::new();
        let mut read_anything = false;
        loop {
            let (used, terminator) = {
                let buffer = self.inner.fill_buf()?;
                if buffer.is_empty() {
                    if !read_anything {
                        return Ok(None);
                    }
                    return Ok(Some(into_string(line)));
                }
                match memchr::memchr2(b'\n', b'\r', buffer) {
                    Some(pos) => {
                        line.extend_from_slice(&buffer[..pos]);
                        (pos + 1, Some(buffer[pos]))
                    }
                    None => {
                        line.extend_from_slice(buffer);
                        (buffer.len(), None)
                    }
                }
            };
            read_anything = true;
            self.inner.consume(used);
            match terminator {
                Some(b'\r') => {
                    // CRLF counts as a single terminator.
                    let next_is_lf = self.inner.fill_buf()?.first() == Some(&b'\n');
                    if next_is_lf {
                        self.inner.consume(1);
                    }
                    return Ok(Some(into_string(line)));
                }
                Some(_) => return Ok(Some(into_string(line))),
                None => {}
            }
        }
    }
}

fn into_string(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            let bytes = err.into_bytes();
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }
}
