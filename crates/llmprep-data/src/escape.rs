//! Decoding of escaped string literals.
//!
//! Configuration files carry markers such as `<|prompt|>\n` in escaped form.
//! [`decode_unicode_escape`] turns them into the literal text that the
//! tokenizer sees, following Python's `unicode_escape` codec.

use llmprep_core::{PrepError, Result};

/// Decode backslash escapes in `input`.
///
/// Recognised escapes: `\\`, `\'`, `\"`, `\a`, `\b`, `\f`, `\n`, `\r`, `\t`,
/// `\v`, octal `\ooo` (one to three digits), `\xHH`, `\uHHHH`,
/// `\UHHHHHHHH`, and backslash-newline (line continuation, produces nothing).
/// Any other escape is kept verbatim, backslash included.
///
/// # Errors
///
/// Returns [`PrepError::Escape`] for truncated hex escapes, a trailing lone
/// backslash, or code points that are not valid `char`s.
///
/// # Example
///
/// ```
/// use llmprep_data::decode_unicode_escape;
///
/// assert_eq!(decode_unicode_escape(r"<|answer|>\n").unwrap(), "<|answer|>\n");
/// assert_eq!(decode_unicode_escape(r"ét\xe9").unwrap(), "été");
/// ```
pub fn decode_unicode_escape(input: &str) -> Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some((_, esc)) = chars.next() else {
            return Err(escape_error(pos, "\\ at end of string"));
        };

        match esc {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0C}'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'v' => out.push('\u{0B}'),
            '0'..='7' => {
                let mut value = esc.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match chars.peek().and_then(|&(_, d)| d.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(code_point(pos, value)?);
            }
            'x' => out.push(read_hex(&mut chars, pos, 2, "truncated \\xXX escape")?),
            'u' => out.push(read_hex(&mut chars, pos, 4, "truncated \\uXXXX escape")?),
            'U' => out.push(read_hex(
                &mut chars,
                pos,
                8,
                "truncated \\UXXXXXXXX escape",
            )?),
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }

    Ok(out)
}

fn read_hex<I>(
    chars: &mut std::iter::Peekable<I>,
    pos: usize,
    digits: usize,
    truncated: &str,
) -> Result<char>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut value: u32 = 0;
    for _ in 0..digits {
        let digit = chars
            .next_if(|&(_, d)| d.is_ascii_hexdigit())
            .and_then(|(_, d)| d.to_digit(16))
            .ok_or_else(|| escape_error(pos, truncated))?;
        value = value * 16 + digit;
    }
    code_point(pos, value)
}

fn code_point(pos: usize, value: u32) -> Result<char> {
    char::from_u32(value)
        .ok_or_else(|| escape_error(pos, &format!("illegal Unicode character U+{value:X}")))
}

fn escape_error(position: usize, reason: &str) -> PrepError {
    PrepError::Escape {
        position,
        reason: reason.to_string(),
    }
}
