//! Literal decoding shared by the front-ends
//!
//! Integer radices, float detection, escape sequences and string quoting
//! for C, Go and Python literal tokens.

use crate::features::parsing::Language;

/// Parse an integer literal token with the language's radix rules.
///
/// C strips `u`/`l` suffixes and treats a leading `0` as octal; Go accepts
/// `0o` and legacy leading-zero octal; Go and Python allow `_` separators.
/// Only C reinterprets a value above `i64::MAX` as its unsigned bit
/// pattern; elsewhere such a literal has no `i64` value.
pub fn parse_int(text: &str, language: Language) -> Option<i64> {
    let cleaned: String = match language {
        Language::C => text
            .trim_end_matches(|c: char| matches!(c, 'u' | 'U' | 'l' | 'L'))
            .replace('\'', ""),
        Language::Go => text.replace('_', ""),
        Language::Python => text.trim_end_matches(['l', 'L']).replace('_', ""),
    };
    let lower = cleaned.to_ascii_lowercase();

    let (digits, radix) = if let Some(hex) = lower.strip_prefix("0x") {
        (hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        (bin, 2)
    } else if let Some(oct) = lower.strip_prefix("0o") {
        if language == Language::C {
            return None;
        }
        (oct, 8)
    } else if lower.len() > 1 && lower.starts_with('0') {
        match language {
            Language::C | Language::Go => (&lower[1..], 8),
            // `00` is the only leading-zero form Python accepts
            Language::Python => (lower.as_str(), 10),
        }
    } else {
        (lower.as_str(), 10)
    };

    if digits.is_empty() {
        return None;
    }
    match i64::from_str_radix(digits, radix) {
        Ok(v) => Some(v),
        Err(_) if language == Language::C => {
            u64::from_str_radix(digits, radix).ok().map(|v| v as i64)
        }
        Err(_) => None,
    }
}

/// Is a C/Go numeric token a floating point literal?
pub fn is_float_literal(text: &str) -> bool {
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("0x") {
        return lower.contains('.') || lower.contains('p');
    }
    lower.contains('.') || lower.contains('e')
}

pub fn parse_float(text: &str) -> Option<f64> {
    let cleaned = text.replace('_', "");
    let trimmed = cleaned.trim_end_matches(['f', 'F', 'l', 'L']);
    trimmed.parse::<f64>().ok()
}

/// Decode backslash escapes (`\n \t \r \\ \' \" \0 \a \b \f \v \xNN \NNN
/// \uXXXX \UXXXXXXXX`). Unknown escapes are kept as written.
pub fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            'f' => out.push('\x0c'),
            'v' => out.push('\x0b'),
            'x' => {
                let hex = take_while_n(&mut chars, 2, |c| c.is_ascii_hexdigit());
                push_code(&mut out, u32::from_str_radix(&hex, 16).ok(), "\\x", &hex);
            }
            'u' => {
                let hex = take_while_n(&mut chars, 4, |c| c.is_ascii_hexdigit());
                push_code(&mut out, u32::from_str_radix(&hex, 16).ok(), "\\u", &hex);
            }
            'U' => {
                let hex = take_while_n(&mut chars, 8, |c| c.is_ascii_hexdigit());
                push_code(&mut out, u32::from_str_radix(&hex, 16).ok(), "\\U", &hex);
            }
            '0'..='7' => {
                let mut oct = next.to_string();
                oct.push_str(&take_while_n(&mut chars, 2, |c| ('0'..='7').contains(&c)));
                push_code(&mut out, u32::from_str_radix(&oct, 8).ok(), "\\", &oct);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}

fn take_while_n(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    max: usize,
    accept: impl Fn(char) -> bool,
) -> String {
    let mut taken = String::new();
    while taken.len() < max {
        match chars.peek() {
            Some(&c) if accept(c) => {
                taken.push(c);
                chars.next();
            }
            _ => break,
        }
    }
    taken
}

fn push_code(out: &mut String, code: Option<u32>, prefix: &str, raw: &str) {
    match code.and_then(char::from_u32) {
        Some(c) => out.push(c),
        None => {
            out.push_str(prefix);
            out.push_str(raw);
        }
    }
}

/// Numeric value of a C char literal or Go rune literal (`'a'`, `L'x'`,
/// `'\n'`)
pub fn char_value(text: &str) -> Option<i64> {
    let start = text.find('\'')?;
    let end = text.rfind('\'')?;
    if end <= start {
        return None;
    }
    let decoded = decode_escapes(&text[start + 1..end]);
    decoded.chars().next().map(|c| c as i64)
}

/// Body of a C string literal or Go interpreted string, escapes decoded
pub fn unquote_double(text: &str) -> String {
    let start = text.find('"').map(|i| i + 1).unwrap_or(0);
    let end = text.rfind('"').filter(|e| *e >= start).unwrap_or(text.len());
    decode_escapes(&text[start..end])
}

/// Go raw string: backticks removed, contents verbatim (carriage returns
/// dropped)
pub fn unquote_raw(text: &str) -> String {
    text.trim_start_matches('`')
        .trim_end_matches('`')
        .replace('\r', "")
}

/// Split a Python string token into its lowercase prefix and the quote
/// delimiter it uses
pub fn python_string_prefix(text: &str) -> (String, &'static str) {
    let prefix_len = text
        .find(|c: char| c == '"' || c == '\'')
        .unwrap_or(text.len());
    let prefix = text[..prefix_len].to_ascii_lowercase();
    let rest = &text[prefix_len..];
    let quote = ["\"\"\"", "'''", "\"", "'"]
        .into_iter()
        .find(|q| rest.starts_with(q))
        .unwrap_or("\"");
    (prefix, quote)
}

/// Decode a Python string body; raw strings keep their backslashes
pub fn python_string_body(body: &str, raw: bool) -> String {
    if raw {
        body.to_string()
    } else {
        decode_escapes(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_integer_radices() {
        assert_eq!(parse_int("0x1F", Language::C), Some(31));
        assert_eq!(parse_int("0b101", Language::C), Some(5));
        assert_eq!(parse_int("017", Language::C), Some(15));
        assert_eq!(parse_int("42", Language::C), Some(42));
        assert_eq!(parse_int("0", Language::C), Some(0));
        assert_eq!(parse_int("10UL", Language::C), Some(10));
        assert_eq!(parse_int("0xFFFFFFFFFFFFFFFF", Language::C), Some(-1));
        assert_eq!(parse_int("9223372036854775808", Language::Python), None);
        assert_eq!(parse_int("0xFFFFFFFFFFFFFFFF", Language::Go), None);
    }

    #[test]
    fn test_go_and_python_integers() {
        assert_eq!(parse_int("1_000", Language::Go), Some(1000));
        assert_eq!(parse_int("0o17", Language::Go), Some(15));
        assert_eq!(parse_int("017", Language::Go), Some(15));
        assert_eq!(parse_int("0O17", Language::Python), Some(15));
        assert_eq!(parse_int("00", Language::Python), Some(0));
        assert_eq!(parse_int("0x_ff", Language::Python), Some(255));
    }

    #[test]
    fn test_float_detection() {
        assert!(is_float_literal("1.5"));
        assert!(is_float_literal("1e9"));
        assert!(!is_float_literal("0x1E"));
        assert!(!is_float_literal("42"));
        assert_eq!(parse_float("2.5f"), Some(2.5));
    }

    #[test]
    fn test_escapes() {
        assert_eq!(decode_escapes(r"a\tb\n"), "a\tb\n");
        assert_eq!(decode_escapes(r"\x41\101\0"), "AA\0");
        assert_eq!(decode_escapes(r"é"), "é");
        assert_eq!(decode_escapes(r"\q"), "\\q");
        assert_eq!(char_value("'\\n'"), Some(10));
        assert_eq!(char_value("L'a'"), Some(97));
        assert_eq!(char_value("'\\''"), Some(39));
    }

    #[test]
    fn test_quoting() {
        assert_eq!(unquote_double("\"hi\\n\""), "hi\n");
        assert_eq!(unquote_raw("`a\\nb`"), "a\\nb");
        assert_eq!(python_string_prefix("rb'x'"), ("rb".to_string(), "'"));
        assert_eq!(python_string_prefix("\"\"\"doc\"\"\"").1, "\"\"\"");
        assert_eq!(python_string_body(r"\d+", true), r"\d+");
    }
}
