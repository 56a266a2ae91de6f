use super::XPathError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Pipe,
    Dot,
    DotDot,
    DoubleColon,
    Star,
    Plus,
    Minus,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Literal(String),
    Number(f64),
    Name(String),
}

/// A token and the byte offset it starts at
pub type Spanned = (Token, usize);

pub fn tokenize(input: &str) -> Result<Vec<Spanned>, XPathError> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        let start = pos;
        let token = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                pos += 1;
                continue;
            }
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                pos += 2;
                Token::DoubleSlash
            }
            b'/' => {
                pos += 1;
                Token::Slash
            }
            b'[' => {
                pos += 1;
                Token::LBracket
            }
            b']' => {
                pos += 1;
                Token::RBracket
            }
            b'(' => {
                pos += 1;
                Token::LParen
            }
            b')' => {
                pos += 1;
                Token::RParen
            }
            b'@' => {
                pos += 1;
                Token::At
            }
            b',' => {
                pos += 1;
                Token::Comma
            }
            b'|' => {
                pos += 1;
                Token::Pipe
            }
            b'*' => {
                pos += 1;
                Token::Star
            }
            b'+' => {
                pos += 1;
                Token::Plus
            }
            b'-' => {
                pos += 1;
                Token::Minus
            }
            b'=' => {
                pos += 1;
                Token::Eq
            }
            b'!' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::NotEq
            }
            b'<' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::LtEq
            }
            b'<' => {
                pos += 1;
                Token::Lt
            }
            b'>' if bytes.get(pos + 1) == Some(&b'=') => {
                pos += 2;
                Token::GtEq
            }
            b'>' => {
                pos += 1;
                Token::Gt
            }
            b':' if bytes.get(pos + 1) == Some(&b':') => {
                pos += 2;
                Token::DoubleColon
            }
            b'.' if bytes.get(pos + 1) == Some(&b'.') => {
                pos += 2;
                Token::DotDot
            }
            b'.' if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                let (number, end) = read_number(input, pos)?;
                pos = end;
                Token::Number(number)
            }
            b'.' => {
                pos += 1;
                Token::Dot
            }
            b'"' | b'\'' => {
                let close = input[pos + 1..]
                    .find(c as char)
                    .ok_or_else(|| XPathError::syntax(pos, "unterminated string literal"))?;
                let literal = input[pos + 1..pos + 1 + close].to_string();
                pos += close + 2;
                Token::Literal(literal)
            }
            b'0'..=b'9' => {
                let (number, end) = read_number(input, pos)?;
                pos = end;
                Token::Number(number)
            }
            _ if is_name_start(input[pos..].chars().next().unwrap_or(' ')) => {
                let end = input[pos..]
                    .char_indices()
                    .find(|&(_, ch)| !is_name_char(ch))
                    .map(|(i, _)| pos + i)
                    .unwrap_or(input.len());
                let mut name_end = end;
                // A single colon joins a namespace prefix; `::` is an axis separator
                if bytes.get(end) == Some(&b':')
                    && bytes.get(end + 1) != Some(&b':')
                    && bytes.get(end + 1).is_some_and(|&b| is_name_start(b as char))
                {
                    name_end = input[end + 1..]
                        .char_indices()
                        .find(|&(_, ch)| !is_name_char(ch))
                        .map(|(i, _)| end + 1 + i)
                        .unwrap_or(input.len());
                }
                pos = name_end;
                Token::Name(input[start..name_end].to_string())
            }
            _ => {
                let ch = input[pos..].chars().next().unwrap_or('?');
                return Err(XPathError::syntax(
                    pos,
                    format!("unexpected character '{}'", ch),
                ));
            }
        };
        tokens.push((token, start));
    }

    Ok(tokens)
}

fn read_number(input: &str, start: usize) -> Result<(f64, usize), XPathError> {
    let end = input[start..]
        .char_indices()
        .find(|&(_, ch)| !(ch.is_ascii_digit() || ch == '.'))
        .map(|(i, _)| start + i)
        .unwrap_or(input.len());
    input[start..end]
        .parse::<f64>()
        .map(|n| (n, end))
        .map_err(|_| XPathError::syntax(start, "malformed number"))
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input).unwrap().into_iter().map(|(t, _)| t).collect()
    }

    #[test]
    fn test_path_with_predicate() {
        assert_eq!(
            kinds("//a[@class='x']"),
            vec![
                Token::DoubleSlash,
                Token::Name("a".into()),
                Token::LBracket,
                Token::At,
                Token::Name("class".into()),
                Token::Eq,
                Token::Literal("x".into()),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_hyphenated_names_and_axes() {
        assert_eq!(
            kinds("following-sibling::data-x"),
            vec![
                Token::Name("following-sibling".into()),
                Token::DoubleColon,
                Token::Name("data-x".into()),
            ]
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        assert_eq!(
            kinds("position() <= .5 != 3"),
            vec![
                Token::Name("position".into()),
                Token::LParen,
                Token::RParen,
                Token::LtEq,
                Token::Number(0.5),
                Token::NotEq,
                Token::Number(3.0),
            ]
        );
    }

    #[test]
    fn test_unterminated_literal() {
        let err = tokenize("//a[text()='oops]").unwrap_err();
        assert!(matches!(err, XPathError::Syntax { position: 10, .. }));
    }
}
