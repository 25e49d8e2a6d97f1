//! Keeps player-supplied text (raw input, names) on a single log line.

const MAX_PREVIEW: usize = 200;

/// Escape a string for single-line logging. Backslash, `\n`, `\r` and `\t`
/// get their usual escapes, other control characters become `\xNN`, and
/// anything past `MAX_PREVIEW` characters is cut with an ellipsis.
pub fn escape_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len().min(MAX_PREVIEW) + 8);
    for (count, ch) in s.chars().enumerate() {
        if count >= MAX_PREVIEW {
            out.push('…');
            break;
        }
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            // ANSI sequences typed by a client would restyle the operator's terminal.
            c if c.is_control() => {
                use std::fmt::Write;
                let _ = write!(&mut out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out
}
