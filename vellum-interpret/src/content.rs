//! Iterating the operations of a content stream.

use log::warn;
use smallvec::SmallVec;
use vellum_syntax::lexer::{Keyword, Lexer, Token};
use vellum_syntax::object::{ByteString, Dict, Value};
use vellum_syntax::parse::parse_content_value;

/// One item of a content stream.
#[derive(Debug, Clone)]
pub enum ContentItem {
    /// An operator with the operands that preceded it.
    Operation {
        /// The operand stack, in source order.
        operands: SmallVec<[Value; 8]>,
        /// The operator bytes.
        operator: ByteString,
    },
    /// An inline image (`BI … ID … EI`).
    InlineImage {
        /// The image parameter dictionary.
        dict: Dict,
        /// The raw (still filtered) image bytes.
        data: Vec<u8>,
    },
}

/// An iterator over the operations of a content stream.
///
/// Malformed stretches are skipped; iteration continues at the next
/// operator.
pub struct ContentIter<'a> {
    lexer: Lexer<'a>,
    data: &'a [u8],
}

impl<'a> ContentIter<'a> {
    /// Iterate the given decoded content-stream bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            lexer: Lexer::new(data),
            data,
        }
    }

    fn inline_image(&mut self) -> Option<ContentItem> {
        let mut dict = Dict::new();

        // Key/value pairs up to the `ID` operator.
        loop {
            match self.lexer.peek()? {
                Token::Operator(op) if op == b"ID" => {
                    self.lexer.next_token();

                    break;
                }
                Token::Name(_) => {
                    let Some(Token::Name(raw)) = self.lexer.next_token() else {
                        return None;
                    };

                    let key = ByteString::new(vellum_syntax::lexer::unescape_name(raw));

                    let value = parse_content_value(&mut self.lexer)?;
                    dict.insert(key, value);
                }
                _ => {
                    warn!("unexpected token in an inline image header");

                    self.lexer.next_token()?;
                }
            }
        }

        // A single white space separates `ID` from the data.
        let start = self.lexer.offset() + 1;

        // The data runs to the first `EI` that sits on a token boundary.
        let mut pos = start;

        let end = loop {
            let tail = self.data.get(pos..)?;
            let found = tail.windows(2).position(|w| w == b"EI")?;
            let absolute = pos + found;

            let before_ok = absolute == 0
                || self
                    .data
                    .get(absolute - 1)
                    .is_some_and(|b| is_ws(*b));
            let after_ok = self
                .data
                .get(absolute + 2)
                .is_none_or(|b| !b.is_ascii_alphanumeric());

            if before_ok && after_ok {
                break absolute;
            }

            pos = absolute + 2;
        };

        let data = self.data.get(start..end)?.to_vec();

        // Trim the white space in front of `EI`.
        let data = match data.last() {
            Some(b) if is_ws(*b) => data[..data.len() - 1].to_vec(),
            _ => data,
        };

        self.lexer.jump(end + 2);

        Some(ContentItem::InlineImage { dict, data })
    }
}

fn is_ws(byte: u8) -> bool {
    matches!(byte, 0x00 | 0x09 | 0x0a | 0x0c | 0x0d | 0x20)
}

impl Iterator for ContentIter<'_> {
    type Item = ContentItem;

    fn next(&mut self) -> Option<Self::Item> {
        let mut operands: SmallVec<[Value; 8]> = SmallVec::new();

        loop {
            match self.lexer.peek()? {
                Token::Operator(op) => {
                    if op == b"BI" {
                        self.lexer.next_token();

                        return self.inline_image();
                    }

                    let operator = ByteString::from(op);
                    self.lexer.next_token();

                    return Some(ContentItem::Operation { operands, operator });
                }
                Token::Keyword(kw) => {
                    match kw {
                        Keyword::True | Keyword::False | Keyword::Null => {
                            match parse_content_value(&mut self.lexer) {
                                Some(v) => operands.push(v),
                                None => {
                                    self.lexer.next_token()?;
                                }
                            }
                        }
                        // File-structure keywords have no business in a
                        // content stream; drop them.
                        _ => {
                            self.lexer.next_token()?;
                        }
                    }
                }
                _ => match parse_content_value(&mut self.lexer) {
                    Some(v) => {
                        // A runaway operand stack means the stream is
                        // garbage; keep only the most recent operands.
                        if operands.len() >= 64 {
                            operands.remove(0);
                        }

                        operands.push(v);
                    }
                    None => {
                        self.lexer.next_token()?;
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ops(data: &[u8]) -> Vec<ContentItem> {
        ContentIter::new(data).collect()
    }

    #[test]
    fn operands_attach_to_their_operator() {
        let items = ops(b"1 0 0 1 50 50 cm 10 20 m 30 40 l S");

        let ContentItem::Operation { operands, operator } = &items[0] else {
            panic!("expected an operation");
        };
        assert_eq!(operator.as_bytes(), b"cm");
        assert_eq!(operands.len(), 6);

        let ContentItem::Operation { operator, .. } = &items[3] else {
            panic!("expected an operation");
        };
        assert_eq!(operator.as_bytes(), b"S");
    }

    #[test]
    fn show_text_array() {
        let items = ops(b"[(Hel) -20 (lo)] TJ");

        let ContentItem::Operation { operands, operator } = &items[0] else {
            panic!("expected an operation");
        };
        assert_eq!(operator.as_bytes(), b"TJ");
        assert_eq!(operands[0].as_array().unwrap().len(), 3);
    }

    #[test]
    fn inline_image() {
        let items = ops(b"BI /W 2 /H 1 /BPC 8 /CS /G ID \x00\xff EI Q");

        let ContentItem::InlineImage { dict, data } = &items[0] else {
            panic!("expected an inline image");
        };
        assert_eq!(dict.get_direct::<i64>(b"W"), Some(2));
        assert_eq!(data.as_slice(), &[0x00, 0xff]);

        let ContentItem::Operation { operator, .. } = &items[1] else {
            panic!("expected an operation");
        };
        assert_eq!(operator.as_bytes(), b"Q");
    }

    #[test]
    fn garbage_is_skipped() {
        let items = ops(b"(unterminated string S 1 0 0 1 0 0 cm");
        // The broken string swallows the rest; nothing usable remains,
        // but iteration terminates.
        assert!(items.len() <= 1);
    }
}
