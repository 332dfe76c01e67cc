/// Line prefix that marks a payload-carrying record.
const DATA_PREFIX: &str = "data:";

/// Incremental parser for a `data: <payload>`-per-line event stream.
///
/// Transport chunks carry no alignment guarantee, so bytes accumulate in an
/// internal buffer and only the suffix appended since the previous feed is
/// scanned. A record becomes visible once its terminating newline arrives;
/// consumed bytes are never rescanned.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    scan_from: usize,
    bytes_consumed: u64,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes retired from the buffer so far.
    pub fn bytes_consumed(&self) -> u64 {
        self.bytes_consumed
    }

    /// Feeds one transport chunk and returns the payloads of every record the
    /// chunk completed, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut line_start = 0usize;

        while let Some(offset) = find_newline(&self.buffer[self.scan_from..]) {
            let line_end = self.scan_from + offset;
            if let Some(payload) = record_payload(&self.buffer[line_start..line_end]) {
                payloads.push(payload);
            }
            self.scan_from = line_end + 1;
            line_start = self.scan_from;
        }

        // Retire every completed line; the partial tail stays buffered and is
        // not rescanned until more bytes arrive.
        if line_start > 0 {
            self.bytes_consumed += line_start as u64;
            self.buffer.drain(..line_start);
        }
        self.scan_from = self.buffer.len();

        payloads
    }

    /// Flushes a trailing record that ended without a newline. Call once when
    /// the transport reports a successful end of stream.
    pub fn finish(&mut self) -> Option<String> {
        let payload = record_payload(&self.buffer);
        self.bytes_consumed += self.buffer.len() as u64;
        self.buffer.clear();
        self.scan_from = 0;
        payload
    }
}

fn find_newline(haystack: &[u8]) -> Option<usize> {
    haystack.iter().position(|byte| *byte == b'\n')
}

/// Extracts the payload of one raw line: the trimmed remainder after the
/// `data:` prefix, or `None` for non-record and empty-payload lines.
fn record_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let payload = line.trim().strip_prefix(DATA_PREFIX)?.trim();

    if payload.is_empty() {
        None
    } else {
        Some(payload.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_records_parse_in_order() {
        let mut parser = SseParser::new();
        let payloads = parser.feed(b"data: one\ndata: two\n");
        assert_eq!(payloads, vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn records_reassemble_across_chunk_boundaries() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"da").is_empty());
        assert!(parser.feed(b"ta: {\"type\":").is_empty());
        let payloads = parser.feed(b"\"token\"}\ndata: tail");
        assert_eq!(payloads, vec!["{\"type\":\"token\"}".to_string()]);

        // The partial tail only completes once its newline arrives.
        assert_eq!(parser.feed(b"\n"), vec!["tail".to_string()]);
    }

    #[test]
    fn byte_at_a_time_delivery_never_reprocesses() {
        let raw = b"data: alpha\n\ndata: beta\n";
        let mut parser = SseParser::new();
        let mut payloads = Vec::new();

        for byte in raw {
            payloads.extend(parser.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(payloads, vec!["alpha".to_string(), "beta".to_string()]);
        assert_eq!(parser.bytes_consumed(), raw.len() as u64);
    }

    #[test]
    fn non_record_lines_are_skipped() {
        let mut parser = SseParser::new();
        let payloads = parser.feed(b"event: ping\n: comment\ndata: kept\n");
        assert_eq!(payloads, vec!["kept".to_string()]);
    }

    #[test]
    fn empty_payload_after_trim_is_skipped() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data:\n").is_empty());
        assert!(parser.feed(b"data:    \n").is_empty());
    }

    #[test]
    fn leading_whitespace_before_prefix_is_tolerated() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed(b"  data: padded\n"), vec!["padded".to_string()]);
    }

    #[test]
    fn carriage_returns_are_trimmed() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed(b"data: crlf\r\n"), vec!["crlf".to_string()]);
    }

    #[test]
    fn finish_flushes_an_unterminated_record() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: terminated\ndata: dangling").len() == 1);
        assert_eq!(parser.finish(), Some("dangling".to_string()));
        assert_eq!(parser.finish(), None);
    }
}
