//! Input line handling.
//!
//! The supervisor reads raw lines (terminator included) and hands them to the
//! worker untouched apart from the length bound. Terminator stripping and
//! blank detection happen on the worker side.

use std::io::{self, BufRead};

/// Default upper bound on a single input line, in bytes.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024;

/// Read one raw line from `reader`.
///
/// Returns `Ok(None)` at end of input. Content longer than `max_bytes` is cut
/// at the last character boundary that fits; the terminator is kept so the
/// worker still strips exactly one. Invalid UTF-8 is replaced lossily.
pub fn read_line<R: BufRead>(reader: &mut R, max_bytes: usize) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    if reader.read_until(b'\n', &mut buf)? == 0 {
        return Ok(None);
    }

    let terminator = if buf.ends_with(b"\r\n") {
        "\r\n"
    } else if buf.ends_with(b"\n") {
        "\n"
    } else {
        ""
    };
    buf.truncate(buf.len() - terminator.len());

    let mut line = String::from_utf8_lossy(&buf).into_owned();
    if line.len() > max_bytes {
        let mut cut = max_bytes;
        while !line.is_char_boundary(cut) {
            cut -= 1;
        }
        tracing::warn!(
            len = line.len(),
            max = max_bytes,
            "Input line exceeds limit, truncating"
        );
        line.truncate(cut);
    }
    line.push_str(terminator);
    Ok(Some(line))
}

/// Strip a single trailing line terminator (`\n` or `\r\n`).
pub fn strip_terminator(line: &str) -> &str {
    match line.strip_suffix('\n') {
        Some(rest) => rest.strip_suffix('\r').unwrap_or(rest),
        None => line,
    }
}

/// Whether a line is empty or made only of spaces and tabs.
pub fn is_blank(line: &str) -> bool {
    line.chars().all(|c| c == ' ' || c == '\t')
}
