use bytes::{Buf, BytesMut};

/// Upper bound on a declared bulk payload (the protocol's 512MB limit).
const BULK_MAX: i64 = 512 * 1024 * 1024;
/// Upper bound on a declared aggregate element count.
const ELEMENTS_MAX: i64 = 1024 * 1024;
/// An inline request line longer than this without a terminator is rejected.
const INLINE_MAX: usize = 64 * 1024;

/// One RESP frame, request or reply side. RESP2 plus the RESP3 map and push
/// aggregates. Nulls get their own variants so reply builders never wrap an
/// `Option`.
#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    /// `+line`
    Simple(String),
    /// `-message`
    Error(String),
    /// `:n`
    Integer(i64),
    /// `$len` followed by the payload
    Bulk(Vec<u8>),
    /// `$-1`
    Null,
    /// `*n` elements
    Array(Vec<RespValue>),
    /// `*-1`
    NullArray,
    /// `%n` key/value pairs (RESP3)
    Map(Vec<(RespValue, RespValue)>),
    /// `>n` out-of-band message (RESP3)
    Push(Vec<RespValue>),
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::Simple("OK".to_string())
    }

    pub fn status(s: impl Into<String>) -> Self {
        RespValue::Simple(s.into())
    }

    pub fn err(msg: impl Into<String>) -> Self {
        RespValue::Error(msg.into())
    }

    pub fn int(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn bulk(data: impl Into<Vec<u8>>) -> Self {
        RespValue::Bulk(data.into())
    }

    /// Wire encoding of this frame.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            RespValue::Simple(s) => write_line(out, b'+', s.as_bytes()),
            RespValue::Error(msg) => write_line(out, b'-', msg.as_bytes()),
            RespValue::Integer(n) => write_line(out, b':', n.to_string().as_bytes()),
            RespValue::Null => out.extend_from_slice(b"$-1\r\n"),
            RespValue::Bulk(data) => {
                write_line(out, b'$', data.len().to_string().as_bytes());
                out.extend_from_slice(data);
                out.extend_from_slice(b"\r\n");
            }
            RespValue::NullArray => out.extend_from_slice(b"*-1\r\n"),
            RespValue::Array(items) => {
                write_line(out, b'*', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
            RespValue::Map(pairs) => {
                write_line(out, b'%', pairs.len().to_string().as_bytes());
                for (key, value) in pairs {
                    key.encode(out);
                    value.encode(out);
                }
            }
            RespValue::Push(items) => {
                write_line(out, b'>', items.len().to_string().as_bytes());
                for item in items {
                    item.encode(out);
                }
            }
        }
    }

    /// Raw bytes of a string-ish frame (bulk or simple).
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RespValue::Bulk(data) => Some(data),
            RespValue::Simple(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Text form of an argument frame; integers print in decimal.
    pub fn text(&self) -> Option<String> {
        match self {
            RespValue::Integer(n) => Some(n.to_string()),
            _ => self
                .as_bytes()
                .map(|b| String::from_utf8_lossy(b).into_owned()),
        }
    }
}

fn write_line(out: &mut Vec<u8>, tag: u8, body: &[u8]) {
    out.push(tag);
    out.extend_from_slice(body);
    out.extend_from_slice(b"\r\n");
}

#[derive(Debug, thiserror::Error)]
pub enum RespError {
    #[error("unsupported frame type byte 0x{0:02x}")]
    BadType(u8),

    #[error("declared length out of range")]
    BadLength,

    #[error("unbalanced quote in inline request")]
    UnbalancedQuote,

    #[error("{0}")]
    Malformed(&'static str),
}

/// Why a decode attempt stopped: the frame isn't all here yet, or the bytes
/// can never form a frame.
enum Halt {
    Partial,
    Fail(RespError),
}

/// Incremental frame decoder.
///
/// Frames arrive fragmented, so decoding runs over a read-only window of the
/// buffer with an explicit position, and bytes are consumed only once an
/// entire frame (nested elements included) has decoded. A partially received
/// frame leaves the buffer untouched and reports `Ok(None)` — no rollback
/// bookkeeping needed.
pub struct RespParser;

impl RespParser {
    pub fn parse(buf: &mut BytesMut) -> Result<Option<RespValue>, RespError> {
        if buf.is_empty() {
            return Ok(None);
        }
        let mut window = Window {
            data: &buf[..],
            pos: 0,
        };
        // Inline requests exist only at the top level; nested elements must
        // carry a type byte.
        let attempt = match buf[0] {
            b'+' | b'-' | b':' | b'$' | b'*' | b'%' | b'>' => read_typed(&mut window),
            _ => read_inline(&mut window),
        };
        match attempt {
            Ok(frame) => {
                let used = window.pos;
                buf.advance(used);
                Ok(Some(frame))
            }
            Err(Halt::Partial) => Ok(None),
            Err(Halt::Fail(e)) => Err(e),
        }
    }
}

struct Window<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Window<'a> {
    fn rest(&self) -> &'a [u8] {
        &self.data[self.pos..]
    }

    fn next_byte(&mut self) -> Result<u8, Halt> {
        match self.rest().first() {
            Some(&b) => {
                self.pos += 1;
                Ok(b)
            }
            None => Err(Halt::Partial),
        }
    }

    /// The bytes up to the next CRLF, consuming the terminator too.
    fn line(&mut self) -> Result<&'a [u8], Halt> {
        let rest = self.rest();
        match rest.windows(2).position(|w| w == b"\r\n") {
            Some(end) => {
                self.pos += end + 2;
                Ok(&rest[..end])
            }
            None => Err(Halt::Partial),
        }
    }

    /// Exactly `n` raw bytes.
    fn chunk(&mut self, n: usize) -> Result<&'a [u8], Halt> {
        let rest = self.rest();
        if rest.len() < n {
            return Err(Halt::Partial);
        }
        self.pos += n;
        Ok(&rest[..n])
    }
}

fn read_typed(w: &mut Window) -> Result<RespValue, Halt> {
    let tag = w.next_byte()?;
    match tag {
        b'+' => Ok(RespValue::Simple(lossy(w.line()?))),
        b'-' => Ok(RespValue::Error(lossy(w.line()?))),
        b':' => Ok(RespValue::Integer(read_number(w)?)),
        b'$' => read_bulk(w),
        b'*' => match read_count(w)? {
            Some(n) => Ok(RespValue::Array(read_items(w, n)?)),
            None => Ok(RespValue::NullArray),
        },
        b'>' => match read_count(w)? {
            Some(n) => Ok(RespValue::Push(read_items(w, n)?)),
            None => Ok(RespValue::Push(Vec::new())),
        },
        b'%' => match read_count(w)? {
            Some(n) => {
                let mut pairs = Vec::with_capacity(n.min(64));
                for _ in 0..n {
                    let key = read_typed(w)?;
                    let value = read_typed(w)?;
                    pairs.push((key, value));
                }
                Ok(RespValue::Map(pairs))
            }
            None => Err(Halt::Fail(RespError::BadLength)),
        },
        other => Err(Halt::Fail(RespError::BadType(other))),
    }
}

fn read_bulk(w: &mut Window) -> Result<RespValue, Halt> {
    let len = read_number(w)?;
    if len == -1 {
        return Ok(RespValue::Null);
    }
    if len < 0 || len > BULK_MAX {
        return Err(Halt::Fail(RespError::BadLength));
    }
    let data = w.chunk(len as usize)?.to_vec();
    if w.chunk(2)? != b"\r\n" {
        return Err(Halt::Fail(RespError::Malformed(
            "bulk payload not CRLF-terminated",
        )));
    }
    Ok(RespValue::Bulk(data))
}

/// Aggregate header count. `None` is the null marker (`*-1`).
fn read_count(w: &mut Window) -> Result<Option<usize>, Halt> {
    let n = read_number(w)?;
    if n < 0 {
        return Ok(None);
    }
    if n > ELEMENTS_MAX {
        return Err(Halt::Fail(RespError::BadLength));
    }
    Ok(Some(n as usize))
}

fn read_items(w: &mut Window, n: usize) -> Result<Vec<RespValue>, Halt> {
    let mut items = Vec::with_capacity(n.min(64));
    for _ in 0..n {
        items.push(read_typed(w)?);
    }
    Ok(items)
}

fn read_number(w: &mut Window) -> Result<i64, Halt> {
    let line = w.line()?;
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(Halt::Fail(RespError::Malformed("not a decimal number")))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// A bare text line (no type byte) is an inline command; it decodes to the
/// same array-of-bulks shape a regular request has. A blank line decodes to
/// an empty array for the caller to skip.
fn read_inline(w: &mut Window) -> Result<RespValue, Halt> {
    let line = match w.line() {
        Ok(line) => line,
        Err(Halt::Partial) if w.rest().len() > INLINE_MAX => {
            return Err(Halt::Fail(RespError::Malformed("inline request too long")))
        }
        Err(halt) => return Err(halt),
    };
    let words = tokenize_inline(line).map_err(Halt::Fail)?;
    Ok(RespValue::Array(
        words.into_iter().map(RespValue::Bulk).collect(),
    ))
}

/// Split an inline line on whitespace. Double quotes group a word and accept
/// `\n` `\r` `\t` escapes (any other escaped byte passes through raw);
/// single quotes group verbatim. Quoted segments glue onto the surrounding
/// word, as in `a"b c"d`.
fn tokenize_inline(line: &[u8]) -> Result<Vec<Vec<u8>>, RespError> {
    let mut words: Vec<Vec<u8>> = Vec::new();
    let mut word: Option<Vec<u8>> = None;
    let mut i = 0;

    while i < line.len() {
        match line[i] {
            b' ' | b'\t' => {
                if let Some(done) = word.take() {
                    words.push(done);
                }
                i += 1;
            }
            b'"' => {
                let current = word.get_or_insert_with(Vec::new);
                i += 1;
                loop {
                    match line.get(i) {
                        None => return Err(RespError::UnbalancedQuote),
                        Some(b'"') => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') if i + 1 < line.len() => {
                            current.push(match line[i + 1] {
                                b'n' => b'\n',
                                b'r' => b'\r',
                                b't' => b'\t',
                                raw => raw,
                            });
                            i += 2;
                        }
                        Some(&b) => {
                            current.push(b);
                            i += 1;
                        }
                    }
                }
            }
            b'\'' => {
                let current = word.get_or_insert_with(Vec::new);
                i += 1;
                loop {
                    match line.get(i) {
                        None => return Err(RespError::UnbalancedQuote),
                        Some(b'\'') => {
                            i += 1;
                            break;
                        }
                        Some(&b) => {
                            current.push(b);
                            i += 1;
                        }
                    }
                }
            }
            b => {
                word.get_or_insert_with(Vec::new).push(b);
                i += 1;
            }
        }
    }

    if let Some(done) = word.take() {
        words.push(done);
    }
    Ok(words)
}
