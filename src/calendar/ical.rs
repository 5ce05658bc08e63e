use chrono::NaiveDateTime;

pub fn format_datetime(dt: NaiveDateTime) -> String {
    dt.format("%Y%m%dT%H%M%S").to_string()
}

pub fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Fold long lines at 75 octets (RFC 5545 requirement).
pub fn fold_line(s: &str) -> String {
    if s.len() <= 75 {
        return s.to_string();
    }
    let mut result = String::new();
    let mut pos = 0;
    while pos < s.len() {
        // Continuation lines spend one octet on the leading space.
        let width = if pos == 0 { 75 } else { 74 };
        let mut end = (pos + width).min(s.len());
        while end < s.len() && !s.is_char_boundary(end) {
            end -= 1;
        }
        if pos > 0 {
            result.push_str("\r\n ");
        }
        result.push_str(&s[pos..end]);
        pos = end;
    }
    result
}
