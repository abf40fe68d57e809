use crate::error::{LibError, LibResult};
use crate::noir::NoirError;
use std::io::{Bytes, ErrorKind, Read};

/// The maximum number of characters in a token.
pub(crate) const MAX_TOKEN_CHARS: usize = 31;

const LF: u8 = 0x0a;
const CR: u8 = 0x0d;

/// One token of Noir input. The End Of File is recorded as an empty token.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct Token {
    /// The one-based line number the token started on.
    pub(crate) line: i32,
    pub(crate) text: String,
}

impl Token {
    pub(crate) fn is_eof(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn first(&self) -> char {
        self.text.chars().next().unwrap_or('\0')
    }
}

/// Streaming tokenizer over a single Noir source.
///
/// Bytes pass through three filters before tokenization: an optional UTF-8
/// byte-order mark is consumed at the start of the stream, line endings are
/// normalized to LF with CR-LF and LF-CR pairs counting once, and `#`
/// introduces a comment running to the end of the line. A one-byte pushback
/// register lets token scanning stop one character past a token.
pub(crate) struct Tokenizer<R: Read> {
    bytes: Bytes<R>,
    first: bool,
    prev: Option<u8>,
    line: i32,
    pushback: Option<Option<u8>>,
}

fn is_whitespace(c: u8) -> bool {
    c == b' ' || c == b'\t' || c == LF || c == CR
}

fn is_printing(c: u8) -> bool {
    (0x21..=0x7e).contains(&c)
}

fn is_suffix(c: u8) -> bool {
    c == b'\'' || c == b',' || c == b'.'
}

fn is_accidental(c: u8) -> bool {
    matches!(
        c,
        b'x' | b'X' | b's' | b'S' | b'n' | b'N' | b'h' | b'H' | b't' | b'T'
    )
}

fn is_atomic(c: u8) -> bool {
    matches!(
        c,
        b'(' | b')' | b'[' | b']' | b'/' | b'$' | b'@' | b'{' | b':' | b'}' | b'=' | b'~'
            | b'-' | b'R' | b'r'
    )
}

fn is_pitch_start(c: u8) -> bool {
    (b'A'..=b'G').contains(&c) || (b'a'..=b'g').contains(&c)
}

fn is_rhythm_start(c: u8) -> bool {
    c.is_ascii_digit()
}

fn is_param_op(c: u8) -> bool {
    matches!(c, b'\\' | b'^' | b'&' | b'+' | b'`')
}

fn is_key_op(c: u8) -> bool {
    c == b'*' || c == b'!'
}

impl<R: Read> Tokenizer<R> {
    pub(crate) fn new(input: R) -> Self {
        Self {
            bytes: input.bytes(),
            first: true,
            prev: None,
            line: 1,
            pushback: None,
        }
    }

    fn err(&self, kind: NoirError) -> LibError {
        LibError::Compile {
            line: self.line,
            kind,
        }
    }

    fn next_raw(&mut self) -> LibResult<Option<u8>> {
        match self.bytes.next() {
            None => Ok(None),
            Some(Ok(c)) => Ok(Some(c)),
            Some(Err(ref e)) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Some(Err(_)) => Err(self.err(NoirError::ReadFailed)),
        }
    }

    /// Read a byte applying the BOM, nul and line-break filters. `None`
    /// marks the End Of File.
    fn read_filtered(&mut self) -> LibResult<Option<u8>> {
        loop {
            let c = self.next_raw()?;
            if c == Some(0) {
                return Err(self.err(NoirError::NulChar));
            }
            if self.first {
                self.first = false;
                if c == Some(0xef) {
                    // must be the start of a UTF-8 byte-order mark
                    if self.next_raw()? != Some(0xbb) || self.next_raw()? != Some(0xbf) {
                        return Err(self.err(NoirError::BadChar));
                    }
                    continue;
                }
            }
            // a CR-LF or LF-CR pair counts as a single line terminator
            if let Some(ch) = c {
                if (ch == LF && self.prev == Some(CR)) || (ch == CR && self.prev == Some(LF)) {
                    self.prev = None;
                    continue;
                }
            }
            self.prev = c;
            return Ok(match c {
                Some(CR) => Some(LF),
                other => other,
            });
        }
    }

    /// Read a byte with all filters applied: pushback, comment stripping
    /// and line counting on top of [`read_filtered`](Self::read_filtered).
    fn read_final(&mut self) -> LibResult<Option<u8>> {
        if let Some(pb) = self.pushback.take() {
            return Ok(pb);
        }
        let mut c = self.read_filtered()?;
        if c == Some(b'#') {
            loop {
                c = self.read_filtered()?;
                match c {
                    None | Some(LF) => break,
                    Some(_) => {}
                }
            }
        }
        if c == Some(LF) {
            if self.line < i32::MAX {
                self.line += 1;
            } else {
                return Err(self.err(NoirError::LineOverflow));
            }
        }
        Ok(c)
    }

    fn push_char(&self, text: &mut String, c: u8) -> LibResult<()> {
        if text.len() >= MAX_TOKEN_CHARS {
            return Err(self.err(NoirError::LongToken));
        }
        text.push(c as char);
        Ok(())
    }

    /// Read the next token. The End Of File is reported as a successful
    /// empty token.
    pub(crate) fn next_token(&mut self) -> LibResult<Token> {
        let mut c = self.read_final()?;
        while let Some(ch) = c {
            if !is_whitespace(ch) {
                break;
            }
            c = self.read_final()?;
        }
        let line = self.line;
        let first = match c {
            None => {
                return Ok(Token {
                    line,
                    text: String::new(),
                })
            }
            Some(ch) => ch,
        };

        let mut text = String::new();
        text.push(first as char);
        if is_atomic(first) {
            return Ok(Token { line, text });
        }

        if is_pitch_start(first) {
            loop {
                match self.read_final()? {
                    Some(ch) if is_accidental(ch) => self.push_char(&mut text, ch)?,
                    other => {
                        self.pushback = Some(other);
                        break;
                    }
                }
            }
            loop {
                match self.read_final()? {
                    Some(ch) if is_suffix(ch) => self.push_char(&mut text, ch)?,
                    other => {
                        self.pushback = Some(other);
                        break;
                    }
                }
            }
        } else if is_rhythm_start(first) {
            match self.read_final()? {
                Some(ch) if is_suffix(ch) => text.push(ch as char),
                other => self.pushback = Some(other),
            }
        } else if is_param_op(first) {
            loop {
                match self.read_final()? {
                    Some(b';') => {
                        self.push_char(&mut text, b';')?;
                        break;
                    }
                    Some(ch) if is_printing(ch) => self.push_char(&mut text, ch)?,
                    _ => return Err(self.err(NoirError::ParamToken)),
                }
            }
        } else if is_key_op(first) {
            match self.read_final()? {
                Some(ch) if is_printing(ch) => text.push(ch as char),
                _ => return Err(self.err(NoirError::KeyToken)),
            }
        } else {
            return Err(self.err(NoirError::BadChar));
        }
        Ok(Token { line, text })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(result: LibResult<Token>) -> NoirError {
        match result {
            Err(LibError::Compile { kind, .. }) => kind,
            other => panic!("expected a compile error, got {:?}", other),
        }
    }

    fn all_tokens(input: &str) -> Vec<String> {
        let mut tok = Tokenizer::new(input.as_bytes());
        let mut out = Vec::new();
        loop {
            let t = tok.next_token().unwrap();
            if t.is_eof() {
                return out;
            }
            out.push(t.text);
        }
    }

    #[test]
    fn basic_stream() {
        assert_eq!(
            vec!["c", "5", "/", "(", "c", "e", "g", ")", "/"],
            all_tokens("c 5 / (c e g) /")
        );
    }

    #[test]
    fn pitch_accidentals_and_suffixes() {
        assert_eq!(vec!["cs'", "Bh,,", "dxn."], all_tokens("cs' Bh,, dxn."));
    }

    #[test]
    fn rhythm_takes_one_suffix() {
        // the second suffix character is a separate (invalid) token shape,
        // but tokenization itself only binds one
        let mut tok = Tokenizer::new("5'".as_bytes());
        assert_eq!("5'", tok.next_token().unwrap().text);
    }

    #[test]
    fn param_and_key_ops() {
        assert_eq!(vec!["^-12;", "\\4;", "`100;", "*z", "!0"], all_tokens("^-12; \\4; `100; *z !0"));
    }

    #[test]
    fn comments_and_lines() {
        let mut tok = Tokenizer::new("c # comment\r\nd\n\re".as_bytes());
        let t = tok.next_token().unwrap();
        assert_eq!(("c", 1), (t.text.as_str(), t.line));
        let t = tok.next_token().unwrap();
        assert_eq!(("d", 2), (t.text.as_str(), t.line));
        let t = tok.next_token().unwrap();
        assert_eq!(("e", 3), (t.text.as_str(), t.line));
        assert!(tok.next_token().unwrap().is_eof());
    }

    #[test]
    fn bom_is_consumed() {
        let mut input = vec![0xef, 0xbb, 0xbf];
        input.extend_from_slice(b"c");
        let mut tok = Tokenizer::new(input.as_slice());
        assert_eq!("c", tok.next_token().unwrap().text);
    }

    #[test]
    fn lone_ef_is_invalid() {
        let input = [0xefu8, 0x20];
        let mut tok = Tokenizer::new(&input[..]);
        assert_eq!(NoirError::BadChar, kinds(tok.next_token()));
    }

    #[test]
    fn nul_is_invalid() {
        let input = [b'c', 0u8];
        let mut tok = Tokenizer::new(&input[..]);
        // the nul is consumed while scanning for accidentals of 'c'
        assert_eq!(NoirError::NulChar, kinds(tok.next_token()));
    }

    #[test]
    fn unterminated_param_op() {
        let mut tok = Tokenizer::new("^12".as_bytes());
        assert_eq!(NoirError::ParamToken, kinds(tok.next_token()));
    }

    #[test]
    fn key_op_needs_printing_char() {
        let mut tok = Tokenizer::new("* ".as_bytes());
        assert_eq!(NoirError::KeyToken, kinds(tok.next_token()));
    }

    #[test]
    fn overlong_token() {
        let text = format!("^{};", "1".repeat(40));
        let mut tok = Tokenizer::new(text.as_bytes());
        assert_eq!(NoirError::LongToken, kinds(tok.next_token()));
    }

    #[test]
    fn eof_token_line_number() {
        let mut tok = Tokenizer::new("c\n\n".as_bytes());
        tok.next_token().unwrap();
        let eof = tok.next_token().unwrap();
        assert!(eof.is_eof());
        assert_eq!(3, eof.line);
    }
}
