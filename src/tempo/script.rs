use crate::error::{LibError, LibResult};
use crate::tempo::TempoError;
use std::io::{Bytes, ErrorKind, Read};

/// One entity of a tempo map file.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum MapEntity {
    /// A `%name;` metacommand.
    Meta(String),
    /// A quoted string with its optional prefix, e.g. `t"5'5"`.
    Str { prefix: String, value: String },
    /// A numeric literal (unparsed).
    Number(String),
    /// An operation name.
    Op(String),
    /// The `|;` end-of-map marker.
    Eof,
}

/// Streaming reader for the structured-data surface of a tempo map:
/// whitespace-separated entities, `#` line comments, and a final `|;`
/// marker. Produces [`MapEntity`] values with their line numbers.
pub(crate) struct MapReader<R: Read> {
    bytes: Bytes<R>,
    line: i32,
    pushback: Option<Option<u8>>,
}

fn is_word_char(c: u8) -> bool {
    (0x21..=0x7e).contains(&c) && c != b'"' && c != b'#'
}

impl<R: Read> MapReader<R> {
    pub(crate) fn new(input: R) -> Self {
        Self {
            bytes: input.bytes(),
            line: 1,
            pushback: None,
        }
    }

    fn err(&self, kind: TempoError) -> LibError {
        LibError::TempoMapAt {
            line: self.line,
            kind,
        }
    }

    fn next_byte(&mut self) -> LibResult<Option<u8>> {
        if let Some(pb) = self.pushback.take() {
            return Ok(pb);
        }
        let c = match self.bytes.next() {
            None => None,
            Some(Ok(c)) => Some(c),
            Some(Err(ref e)) if e.kind() == ErrorKind::UnexpectedEof => None,
            Some(Err(_)) => return Err(self.err(TempoError::Syntax)),
        };
        if c == Some(b'\n') {
            self.line = self.line.saturating_add(1);
        }
        Ok(c)
    }

    /// Skip whitespace and comments, returning the first significant byte.
    fn skip_blank(&mut self) -> LibResult<Option<u8>> {
        loop {
            match self.next_byte()? {
                Some(b'#') => loop {
                    match self.next_byte()? {
                        None => return Ok(None),
                        Some(b'\n') => break,
                        Some(_) => {}
                    }
                },
                Some(c) if c.is_ascii_whitespace() => {}
                other => return Ok(other),
            }
        }
    }

    fn read_quoted(&mut self) -> LibResult<String> {
        let mut value = String::new();
        loop {
            match self.next_byte()? {
                None => return Err(self.err(TempoError::Syntax)),
                Some(b'"') => return Ok(value),
                Some(c) => value.push(c as char),
            }
        }
    }

    /// Read the next entity. The line number reported alongside is the
    /// line the entity started on.
    pub(crate) fn next_entity(&mut self) -> LibResult<(i32, MapEntity)> {
        let first = match self.skip_blank()? {
            None => return Err(self.err(TempoError::Syntax)),
            Some(c) => c,
        };
        let line = self.line;

        if first == b'%' {
            let mut name = String::new();
            loop {
                match self.next_byte()? {
                    Some(b';') => return Ok((line, MapEntity::Meta(name))),
                    Some(c) if is_word_char(c) => name.push(c as char),
                    _ => return Err(self.err(TempoError::Syntax)),
                }
            }
        }

        if first == b'|' {
            return match self.next_byte()? {
                Some(b';') => Ok((line, MapEntity::Eof)),
                _ => Err(self.err(TempoError::Syntax)),
            };
        }

        if first == b'"' {
            let value = self.read_quoted()?;
            return Ok((
                line,
                MapEntity::Str {
                    prefix: String::new(),
                    value,
                },
            ));
        }

        if !is_word_char(first) {
            return Err(self.err(TempoError::Syntax));
        }
        let mut word = String::new();
        word.push(first as char);
        loop {
            match self.next_byte()? {
                Some(b'"') => {
                    // the word was the prefix of a quoted string
                    let value = self.read_quoted()?;
                    return Ok((
                        line,
                        MapEntity::Str {
                            prefix: word,
                            value,
                        },
                    ));
                }
                Some(c) if is_word_char(c) => word.push(c as char),
                other => {
                    self.pushback = Some(other);
                    break;
                }
            }
        }
        let entity = if word.starts_with(|c: char| c.is_ascii_digit() || c == '+' || c == '-') {
            MapEntity::Number(word)
        } else {
            MapEntity::Op(word)
        };
        Ok((line, entity))
    }

    /// Verify nothing but blank space follows the end-of-map marker.
    pub(crate) fn consume_trailing(&mut self) -> LibResult<()> {
        match self.skip_blank()? {
            None => Ok(()),
            Some(_) => Err(self.err(TempoError::Trailing)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(input: &str) -> Vec<MapEntity> {
        let mut reader = MapReader::new(input.as_bytes());
        let mut out = Vec::new();
        loop {
            let (_, entity) = reader.next_entity().unwrap();
            let done = entity == MapEntity::Eof;
            out.push(entity);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn header_and_ops() {
        let entities = read_all("%noir-tempo;\n96 1200 tempo\n|;");
        assert_eq!(
            vec![
                MapEntity::Meta("noir-tempo".to_string()),
                MapEntity::Number("96".to_string()),
                MapEntity::Number("1200".to_string()),
                MapEntity::Op("tempo".to_string()),
                MapEntity::Eof,
            ],
            entities
        );
    }

    #[test]
    fn strings_with_prefix() {
        let entities = read_all("\"55\" t\"5'\" |;");
        assert_eq!(
            vec![
                MapEntity::Str {
                    prefix: String::new(),
                    value: "55".to_string()
                },
                MapEntity::Str {
                    prefix: "t".to_string(),
                    value: "5'".to_string()
                },
                MapEntity::Eof,
            ],
            entities
        );
    }

    #[test]
    fn comments_and_lines() {
        let mut reader = MapReader::new("# header comment\n  42 |;".as_bytes());
        let (line, entity) = reader.next_entity().unwrap();
        assert_eq!(2, line);
        assert_eq!(MapEntity::Number("42".to_string()), entity);
    }

    #[test]
    fn signed_numbers() {
        let entities = read_all("-5 +7 |;");
        assert_eq!(
            vec![
                MapEntity::Number("-5".to_string()),
                MapEntity::Number("+7".to_string()),
                MapEntity::Eof,
            ],
            entities
        );
    }

    #[test]
    fn trailing_content_is_rejected() {
        let mut reader = MapReader::new("|; leftovers".as_bytes());
        reader.next_entity().unwrap();
        assert!(reader.consume_trailing().is_err());
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let mut reader = MapReader::new("\"55".as_bytes());
        assert!(reader.next_entity().is_err());
    }
}
