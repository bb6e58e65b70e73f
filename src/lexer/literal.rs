//! Values of literal tokens.

use crate::span::Span;

/// Integer value of an `LNumber` token text. `None` on overflow, where PHP
/// would switch to a float.
pub fn integer_value(text: &str) -> Option<i64> {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    let lower = digits.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if lower.len() > 1 && lower.starts_with('0') {
        i64::from_str_radix(&lower[1..], 8).ok()
    } else {
        lower.parse().ok()
    }
}

pub fn float_value(text: &str) -> Option<f64> {
    let digits: String = text.chars().filter(|&c| c != '_').collect();
    digits.parse().ok()
}

/// A decoded string literal; every character keeps the source span it came from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedString {
    pub chars: Vec<(char, Span)>,
}

impl DecodedString {
    pub fn value(&self) -> String {
        self.chars.iter().map(|(c, _)| *c).collect()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}

/// Decodes a quoted string literal token whose text starts at `base`.
///
/// Returns `None` for anything that is not a complete single- or
/// double-quoted literal.
pub fn unescape_string(text: &str, base: usize) -> Option<DecodedString> {
    let (prefix, body) = match text.as_bytes().first()? {
        b'b' | b'B' => (1, &text[1..]),
        _ => (0, text),
    };
    let quote = body.chars().next()?;
    if !(quote == '\'' || quote == '"') || body.len() < 2 || !body.ends_with(quote) {
        return None;
    }
    let inner_start = base + prefix + 1;
    let inner = &body[1..body.len() - 1];
    let mut out = Vec::new();
    let mut iter = inner.char_indices().peekable();

    while let Some((idx, c)) = iter.next() {
        let start = inner_start + idx;
        if c != '\\' {
            out.push((c, Span::new(start, start + c.len_utf8())));
            continue;
        }
        let Some(&(next_idx, next)) = iter.peek() else {
            out.push((c, Span::new(start, start + 1)));
            continue;
        };

        if quote == '\'' {
            if next == '\'' || next == '\\' {
                iter.next();
                out.push((next, Span::new(start, inner_start + next_idx + 1)));
            } else {
                out.push((c, Span::new(start, start + 1)));
            }
            continue;
        }

        let simple = match next {
            'n' => Some('\n'),
            't' => Some('\t'),
            'r' => Some('\r'),
            'v' => Some('\x0b'),
            'e' => Some('\x1b'),
            'f' => Some('\x0c'),
            '\\' => Some('\\'),
            '$' => Some('$'),
            '"' => Some('"'),
            _ => None,
        };
        if let Some(value) = simple {
            iter.next();
            out.push((value, Span::new(start, inner_start + next_idx + 1)));
            continue;
        }

        let rest = &inner[next_idx..];
        if let Some((value, len)) = numeric_escape(rest) {
            for _ in 0..rest[..len].chars().count() {
                iter.next();
            }
            out.push((value, Span::new(start, inner_start + next_idx + len)));
        } else {
            out.push((c, Span::new(start, start + 1)));
        }
    }

    Some(DecodedString { chars: out })
}

/// Octal, `\x` and `\u{}` escapes; `rest` starts after the backslash.
fn numeric_escape(rest: &str) -> Option<(char, usize)> {
    let bytes = rest.as_bytes();
    match bytes.first()? {
        b'0'..=b'7' => {
            let len = bytes.iter().take(3).take_while(|b| (b'0'..=b'7').contains(b)).count();
            let value = u32::from_str_radix(&rest[..len], 8).ok()? & 0xff;
            Some((char::from_u32(value)?, len))
        }
        b'x' => {
            let len = bytes[1..].iter().take(2).take_while(|b| b.is_ascii_hexdigit()).count();
            if len == 0 {
                return None;
            }
            let value = u32::from_str_radix(&rest[1..1 + len], 16).ok()?;
            Some((char::from_u32(value)?, 1 + len))
        }
        b'u' if bytes.get(1) == Some(&b'{') => {
            let close = rest.find('}')?;
            let value = u32::from_str_radix(&rest[2..close], 16).ok()?;
            Some((char::from_u32(value)?, close + 1))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_in_every_base() {
        assert_eq!(integer_value("1_000"), Some(1000));
        assert_eq!(integer_value("0x1F"), Some(31));
        assert_eq!(integer_value("0b101"), Some(5));
        assert_eq!(integer_value("0o17"), Some(15));
        assert_eq!(integer_value("017"), Some(15));
        assert_eq!(integer_value("0"), Some(0));
        assert_eq!(integer_value("99999999999999999999"), None);
        assert_eq!(float_value("1_0.5e1"), Some(105.0));
    }

    #[test]
    fn single_quoted_keeps_unknown_escapes() {
        let decoded = unescape_string(r"'a\'b\n'", 10).unwrap();
        assert_eq!(decoded.value(), r"a'b\n");
        assert_eq!(decoded.chars[1].1, Span::new(12, 14));
    }

    #[test]
    fn double_quoted_escapes() {
        let decoded = unescape_string(r#""\x41\101\u{1F600}\d""#, 0).unwrap();
        assert_eq!(decoded.value(), "AA\u{1F600}\\d");
        assert_eq!(decoded.chars[0].1, Span::new(1, 5));
    }
}
