//! Log injection sanitizer (spec §4.2).
//!
//! Every log-bound string that carries external input must pass through
//! here first. The property under test (spec §8, "Log sanitizer
//! invariance") is that the *output* never contains a raw CR, LF, NUL, ANSI
//! CSI introducer, or Unicode line/paragraph separator — so on any of those
//! markers we replace the whole string rather than try to scrub it in place.

const DEFAULT_LIMIT: usize = 4096;

pub fn sanitize_for_log(input: &str) -> String {
    sanitize_for_log_with_limit(input, DEFAULT_LIMIT)
}

pub fn sanitize_for_log_with_limit(input: &str, limit: usize) -> String {
    if contains_injection_marker(input) {
        return format!("<LOG_INJECTION_BLOCKED:len={}>", input.len());
    }

    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '%' {
            out.push_str("%%");
        } else if (c as u32) < 0x20 || c.is_control() {
            out.push_str(&format!("\\u{{{:04x}}}", c as u32));
        } else {
            out.push(c);
        }
    }

    if out.chars().count() > limit {
        out = out.chars().take(limit).collect::<String>();
        out.push('…');
    }
    out
}

fn contains_injection_marker(s: &str) -> bool {
    if s.contains('\r') || s.contains('\n') || s.contains('\0') {
        return true;
    }
    // Unicode line separator / paragraph separator.
    if s.contains('\u{2028}') || s.contains('\u{2029}') {
        return true;
    }
    // Byte-order mark.
    if s.contains('\u{FEFF}') {
        return true;
    }
    // Bidirectional text overrides/isolates.
    if s.chars()
        .any(|c| matches!(c, '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'))
    {
        return true;
    }
    // ANSI CSI introducer.
    if s.contains('\u{1b}') {
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_crlf() {
        let out = sanitize_for_log("line1\r\nline2");
        assert!(!out.contains('\r') && !out.contains('\n'));
        assert!(out.starts_with("<LOG_INJECTION_BLOCKED"));
    }

    #[test]
    fn blocks_ansi_csi() {
        let out = sanitize_for_log("\u{1b}[31mred\u{1b}[0m");
        assert!(!out.contains('\u{1b}'));
    }

    #[test]
    fn blocks_unicode_separators() {
        let out = sanitize_for_log("a\u{2028}b");
        assert!(!out.contains('\u{2028}'));
    }

    #[test]
    fn doubles_percent() {
        assert_eq!(sanitize_for_log("100% done"), "100%% done");
    }

    #[test]
    fn truncates_long_input() {
        let s = "a".repeat(10_000);
        let out = sanitize_for_log_with_limit(&s, 100);
        assert!(out.chars().count() <= 101);
    }

    #[test]
    fn totality_no_panic_on_arbitrary_bytes() {
        // Any valid &str, including near the 64 KiB boundary, must not panic.
        let s: String = (0u32..70_000)
            .filter_map(char::from_u32)
            .collect::<String>()
            .chars()
            .take(65536)
            .collect();
        let _ = sanitize_for_log(&s);
    }
}
