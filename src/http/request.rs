//! Request framing.
//!
//! # State Machine
//! ```text
//! AwaitHeaderLine ──line──▶ AccumulatingHeaders ──blank line──▶ ReadingBody ──▶ Complete
//!        │                         │                   └──(no usable length)──▶ NoBody ──▶ Complete
//!        └─────── header deadline / EOF ───────┴──────────────────────────────▶ Complete
//! ```
//!
//! # Design Decisions
//! - Two independent deadlines: one for the whole header section, one for the body
//! - A deadline never aborts the connection; framing ends with whatever was read
//! - Header lines are capped in length and count; overflow is discarded
//! - A body is buffered only when its declared length is in `(0, max_body_bytes)`

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tokio::time::{timeout_at, Instant};

use crate::config::{LimitsConfig, TimeoutConfig};

const CONTENT_LENGTH: &str = "content-length:";
const BODY_CHUNK: usize = 512;

/// Request method; only the two served methods are distinguished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl Method {
    fn parse(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            _ => Method::Other,
        }
    }
}

/// Where a request is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Predict,
    Status,
    Help,
}

impl Route {
    /// Prefix match on the raw request line.
    pub fn for_request_line(line: &str) -> Self {
        if line.starts_with("POST /predict") {
            Route::Predict
        } else if line.starts_with("GET /status") {
            Route::Status
        } else {
            Route::Help
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Route::Predict => "predict",
            Route::Status => "status",
            Route::Help => "help",
        }
    }
}

/// Framing phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePhase {
    AwaitHeaderLine,
    AccumulatingHeaders,
    ReadingBody,
    NoBody,
    Complete,
}

/// How framing ended, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FramingReport {
    pub header_timed_out: bool,
    pub body_timed_out: bool,
    /// Declared length was outside the buffered range.
    pub body_skipped: bool,
    /// Client closed before the frame was complete.
    pub eof: bool,
    pub io_error: Option<String>,
}

/// A request framed from one connection.
#[derive(Debug, Clone, Default)]
pub struct IncomingRequest {
    /// First non-empty line, trimmed. Empty if none arrived in time.
    pub request_line: String,
    pub header_lines: Vec<String>,
    pub content_length: Option<usize>,
    pub body: Vec<u8>,
    pub report: FramingReport,
}

impl IncomingRequest {
    pub fn method(&self) -> Method {
        Method::parse(self.request_line.split_whitespace().next().unwrap_or(""))
    }

    pub fn path(&self) -> &str {
        self.request_line.split_whitespace().nth(1).unwrap_or("")
    }

    pub fn route(&self) -> Route {
        Route::for_request_line(&self.request_line)
    }

    /// Body as text; invalid UTF-8 is replaced rather than rejected.
    pub fn body_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Deadlines and bounds applied while framing.
#[derive(Debug, Clone)]
pub struct FramingLimits {
    pub header_timeout: Duration,
    pub body_timeout: Duration,
    pub max_body_bytes: usize,
    pub max_header_line_bytes: usize,
    pub max_header_lines: usize,
}

impl FramingLimits {
    pub fn from_config(timeouts: &TimeoutConfig, limits: &LimitsConfig) -> Self {
        Self {
            header_timeout: timeouts.header(),
            body_timeout: timeouts.body(),
            max_body_bytes: limits.max_body_bytes,
            max_header_line_bytes: limits.max_header_line_bytes,
            max_header_lines: limits.max_header_lines,
        }
    }

    /// Whether a declared length is buffered.
    pub fn accepts_body(&self, declared: usize) -> bool {
        declared > 0 && declared < self.max_body_bytes
    }
}

impl Default for FramingLimits {
    fn default() -> Self {
        Self::from_config(&TimeoutConfig::default(), &LimitsConfig::default())
    }
}

/// Drives the framing state machine over a buffered reader.
pub struct RequestFramer<'a, R> {
    reader: &'a mut R,
    limits: &'a FramingLimits,
    phase: FramePhase,
    request: IncomingRequest,
}

impl<'a, R> RequestFramer<'a, R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn new(reader: &'a mut R, limits: &'a FramingLimits) -> Self {
        Self {
            reader,
            limits,
            phase: FramePhase::AwaitHeaderLine,
            request: IncomingRequest::default(),
        }
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    /// Run every phase and return the framed request.
    pub async fn frame(mut self) -> IncomingRequest {
        self.read_headers().await;

        self.phase = match self.request.content_length {
            Some(len) if self.limits.accepts_body(len) => FramePhase::ReadingBody,
            Some(len) if len > 0 => {
                self.request.report.body_skipped = true;
                FramePhase::NoBody
            }
            _ => FramePhase::NoBody,
        };

        if self.phase == FramePhase::ReadingBody {
            self.read_body().await;
        }

        self.phase = FramePhase::Complete;
        self.request
    }

    async fn read_headers(&mut self) {
        let deadline = Instant::now() + self.limits.header_timeout;
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = timeout_at(
                deadline,
                read_line_capped(self.reader, self.limits.max_header_line_bytes, &mut line),
            )
            .await;

            match read {
                Err(_) => {
                    self.request.report.header_timed_out = true;
                    return;
                }
                Ok(Err(e)) => {
                    self.request.report.io_error = Some(e.to_string());
                    return;
                }
                Ok(Ok(false)) => {
                    self.request.report.eof = true;
                    return;
                }
                Ok(Ok(true)) => {}
            }

            let text = String::from_utf8_lossy(&line);
            let text = text.trim();

            match self.phase {
                FramePhase::AwaitHeaderLine => {
                    // Stray blank lines before the request line are ignored.
                    if !text.is_empty() {
                        self.request.request_line = text.to_string();
                        self.phase = FramePhase::AccumulatingHeaders;
                    }
                }
                _ => {
                    if text.is_empty() {
                        return;
                    }
                    if let Some(len) = content_length(text) {
                        self.request.content_length = Some(len);
                    }
                    if self.request.header_lines.len() < self.limits.max_header_lines {
                        self.request.header_lines.push(text.to_string());
                    }
                }
            }
        }
    }

    async fn read_body(&mut self) {
        let Some(declared) = self.request.content_length else {
            return;
        };

        let deadline = Instant::now() + self.limits.body_timeout;
        let mut body = Vec::with_capacity(declared);
        let mut chunk = [0u8; BODY_CHUNK];

        while body.len() < declared {
            let want = (declared - body.len()).min(BODY_CHUNK);
            match timeout_at(deadline, self.reader.read(&mut chunk[..want])).await {
                Err(_) => {
                    self.request.report.body_timed_out = true;
                    break;
                }
                Ok(Ok(0)) => {
                    self.request.report.eof = true;
                    break;
                }
                Ok(Ok(n)) => body.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => {
                    self.request.report.io_error = Some(e.to_string());
                    break;
                }
            }
        }

        self.request.body = body;
    }
}

/// Frame one request from `reader`.
pub async fn read_request<R>(reader: &mut R, limits: &FramingLimits) -> IncomingRequest
where
    R: AsyncBufRead + Unpin,
{
    RequestFramer::new(reader, limits).frame().await
}

/// Read up to and including `\n`, keeping at most `cap` bytes of the line.
///
/// Returns `false` on EOF before any byte of a new line.
async fn read_line_capped<R>(reader: &mut R, cap: usize, line: &mut Vec<u8>) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    let mut seen_any = false;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(seen_any);
        }
        seen_any = true;

        let room = cap.saturating_sub(line.len());
        match available.iter().position(|&b| b == b'\n') {
            Some(newline) => {
                line.extend_from_slice(&available[..newline.min(room)]);
                reader.consume(newline + 1);
                return Ok(true);
            }
            None => {
                let n = available.len();
                line.extend_from_slice(&available[..n.min(room)]);
                reader.consume(n);
            }
        }
    }
}

/// Parse a `Content-Length:` header line, case-insensitively.
///
/// Leading digits are used; anything unparsable counts as zero.
fn content_length(line: &str) -> Option<usize> {
    let prefix = line.get(..CONTENT_LENGTH.len())?;
    if !prefix.eq_ignore_ascii_case(CONTENT_LENGTH) {
        return None;
    }

    let value = line[CONTENT_LENGTH.len()..].trim_start();
    let digits = value.bytes().take_while(u8::is_ascii_digit);
    let len = digits.fold(0usize, |acc, b| {
        acc.saturating_mul(10).saturating_add(usize::from(b - b'0'))
    });
    Some(len)
}
