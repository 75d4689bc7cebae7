//! Parsing PDF values and indirect objects.

use crate::crypt::{DecryptionTarget, Decryptor};
use crate::lexer::{Keyword, Lexer, Token, decode_hex, unescape_literal, unescape_name};
use crate::object::dict::keys::LENGTH;
use crate::object::{
    Array, ByteString, Dict, IndirectObject, ObjRef, Stream, StreamLocator, Value,
};
use crate::trivia::skip_white_spaces_and_comments;
use log::warn;

/// Nesting depth bound for containers, to keep recursion in check on
/// hostile input.
const MAX_NESTING: u32 = 64;

/// Context threaded through value parsing.
#[derive(Clone, Copy, Default)]
pub(crate) struct ParseCtx<'a> {
    /// The decryptor of the owning document, if any.
    pub(crate) decryptor: Option<&'a Decryptor>,
    /// The identity of the enclosing indirect object. Strings are keyed by
    /// it when decrypting.
    pub(crate) obj_id: Option<ObjRef>,
    /// In content streams, numbers can never start an object reference.
    pub(crate) in_content_stream: bool,
}

impl ParseCtx<'_> {
    fn decode_string(&self, bytes: Vec<u8>) -> ByteString {
        if let (Some(decryptor), Some(id)) = (self.decryptor, self.obj_id) {
            ByteString::new(
                decryptor
                    .decrypt(id, &bytes, DecryptionTarget::String)
                    .unwrap_or_default(),
            )
        } else {
            ByteString::new(bytes)
        }
    }
}

/// Parse a single value at the lexer's position.
pub(crate) fn parse_value(lexer: &mut Lexer<'_>, ctx: &ParseCtx<'_>) -> Option<Value> {
    parse_value_at(lexer, ctx, 0)
}

/// Parse a single value inside a content stream, where numbers can never
/// start an object reference and nothing is encrypted.
pub fn parse_content_value(lexer: &mut Lexer<'_>) -> Option<Value> {
    let ctx = ParseCtx {
        in_content_stream: true,
        ..ParseCtx::default()
    };

    parse_value(lexer, &ctx)
}

fn parse_value_at(lexer: &mut Lexer<'_>, ctx: &ParseCtx<'_>, depth: u32) -> Option<Value> {
    if depth > MAX_NESTING {
        warn!("value nesting exceeds the supported depth");

        return None;
    }

    let value = match lexer.next_token()? {
        Token::Int(i) => {
            if !ctx.in_content_stream
                && let Some(r) = try_reference(lexer, i)
            {
                if r.is_valid() {
                    Value::Ref(r)
                } else {
                    // A reference to object 0 is as good as no reference.
                    Value::Null
                }
            } else {
                Value::Int(i)
            }
        }
        Token::Real(r) => Value::Real(r),
        Token::Name(raw) => Value::Name(ByteString::new(unescape_name(raw))),
        Token::LiteralString(raw, dirty) => {
            let bytes = if dirty {
                unescape_literal(raw)
            } else {
                raw.to_vec()
            };

            Value::String(ctx.decode_string(bytes))
        }
        Token::HexString(raw) => Value::String(ctx.decode_string(decode_hex(raw))),
        Token::ArrayOpen => Value::Array(parse_array_body(lexer, ctx, depth)?),
        Token::DictOpen => Value::Dict(parse_dict_body(lexer, ctx, depth)?),
        Token::Keyword(Keyword::True) => Value::Bool(true),
        Token::Keyword(Keyword::False) => Value::Bool(false),
        Token::Keyword(Keyword::Null) => Value::Null,
        _ => return None,
    };

    Some(value)
}

/// If the lexer is positioned after the object number of an `N G R`
/// triplet, consume the rest and return the reference.
fn try_reference(lexer: &mut Lexer<'_>, num: i64) -> Option<ObjRef> {
    let mut ahead = lexer.clone();

    let generation = match ahead.next_token()? {
        Token::Int(g) => g,
        _ => return None,
    };

    if ahead.next_token()? != Token::Keyword(Keyword::R) {
        return None;
    }

    *lexer = ahead;

    let num = u32::try_from(num).unwrap_or(0);

    Some(ObjRef::new(num, generation as i32))
}

fn parse_array_body(lexer: &mut Lexer<'_>, ctx: &ParseCtx<'_>, depth: u32) -> Option<Array> {
    let mut values = vec![];

    loop {
        match lexer.peek()? {
            Token::ArrayClose => {
                lexer.next_token();

                return Some(Array::new(values));
            }
            _ => match parse_value_at(lexer, ctx, depth + 1) {
                Some(v) => values.push(v),
                // Tolerate stray operators in arrays; just drop the token.
                None => {
                    lexer.next_token()?;
                }
            },
        }
    }
}

fn parse_dict_body(lexer: &mut Lexer<'_>, ctx: &ParseCtx<'_>, depth: u32) -> Option<Dict> {
    let mut dict = Dict::new();

    loop {
        match lexer.next_token()? {
            Token::DictClose => return Some(dict),
            Token::Name(raw) => {
                let key = ByteString::new(unescape_name(raw));

                match parse_value_at(lexer, ctx, depth + 1) {
                    Some(v) => dict.insert(key, v),
                    None => {
                        warn!("dict entry {:?} has no readable value", key.as_str_lossy());

                        lexer.next_token()?;
                    }
                }
            }
            other => {
                warn!("expected a name key in dict, found {other:?}");

                return None;
            }
        }
    }
}

/// Parse the indirect object at `offset`.
///
/// `resolve_length` is consulted when the stream dictionary's `/Length` is
/// itself an indirect reference.
pub(crate) fn parse_indirect(
    data: &[u8],
    offset: usize,
    ctx: &ParseCtx<'_>,
    resolve_length: &dyn Fn(ObjRef) -> Option<Value>,
) -> Option<IndirectObject> {
    let mut lexer = Lexer::new_at(data, offset);

    let Token::Int(num) = lexer.next_token()? else {
        return None;
    };
    let Token::Int(generation) = lexer.next_token()? else {
        return None;
    };

    if lexer.next_token()? != Token::Keyword(Keyword::Obj) {
        return None;
    }

    let id = ObjRef::new(u32::try_from(num).ok()?, generation as i32);
    let ctx = ParseCtx {
        obj_id: Some(id),
        ..*ctx
    };

    let value = parse_value(&mut lexer, &ctx)?;

    // A dictionary may be followed by a stream envelope.
    let value = if let Value::Dict(dict) = value {
        skip_white_spaces_and_comments(lexer.reader());

        if lexer.reader().peek_tag(b"stream") {
            let locator = read_stream_envelope(data, &mut lexer, &dict, &ctx, resolve_length)?;

            Value::Stream(Stream { dict, locator })
        } else {
            Value::Dict(dict)
        }
    } else {
        value
    };

    // `endobj` is required by the specification but often missing or
    // misplaced in real files; its absence is not an error.

    Some(IndirectObject { id, value })
}

fn read_stream_envelope(
    data: &[u8],
    lexer: &mut Lexer<'_>,
    dict: &Dict,
    ctx: &ParseCtx<'_>,
    resolve_length: &dyn Fn(ObjRef) -> Option<Value>,
) -> Option<StreamLocator> {
    let r = lexer.reader();
    r.forward_tag(b"stream")?;

    // The keyword is followed by CRLF or LF, not a lone CR.
    r.forward_tag(b"\r\n").or_else(|| r.forward_tag(b"\n"));

    let start = r.offset();

    let declared = match dict.get_raw(LENGTH) {
        Some(Value::Int(len)) => usize::try_from(*len).ok(),
        Some(Value::Ref(len_ref)) => resolve_length(*len_ref).and_then(|v| match v {
            Value::Int(len) => usize::try_from(len).ok(),
            _ => None,
        }),
        _ => None,
    };

    let len = declared
        .filter(|len| stream_end_is_plausible(data, start, *len))
        .or_else(|| {
            warn!("stream length is missing or wrong, scanning for endstream");

            scan_for_endstream(data, start)
        })?;

    Some(StreamLocator {
        offset: start,
        len,
        encrypted: ctx.decryptor.is_some(),
        owner: ctx.obj_id.unwrap_or(ObjRef::new(0, 0)),
    })
}

/// Check that `endstream` indeed follows the declared content range.
fn stream_end_is_plausible(data: &[u8], start: usize, len: usize) -> bool {
    let end = start.checked_add(len);

    match end.and_then(|end| data.get(end..)) {
        Some(tail) => {
            let mut r = crate::reader::Reader::new(tail);
            crate::trivia::skip_white_spaces_and_comments(&mut r);

            r.peek_tag(b"endstream")
        }
        None => false,
    }
}

/// Locate `endstream` by scanning forward; the content length excludes the
/// end-of-line marker right before the keyword.
fn scan_for_endstream(data: &[u8], start: usize) -> Option<usize> {
    let tail = data.get(start..)?;
    let pos = memchr::memmem::find(tail, b"endstream")?;

    let mut len = pos;

    if len > 0 && tail[len - 1] == b'\n' {
        len -= 1;
    }

    if len > 0 && tail[len - 1] == b'\r' {
        len -= 1;
    }

    Some(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(data: &[u8]) -> Value {
        let mut lexer = Lexer::new(data);
        parse_value(&mut lexer, &ParseCtx::default()).unwrap()
    }

    #[test]
    fn scalars() {
        assert_eq!(value(b"true"), Value::Bool(true));
        assert_eq!(value(b"null"), Value::Null);
        assert_eq!(value(b"42"), Value::Int(42));
        assert_eq!(value(b"-1.5"), Value::Real(-1.5));
    }

    #[test]
    fn reference_lookahead() {
        assert_eq!(value(b"12 0 R"), Value::Ref(ObjRef::new(12, 0)));
        // Not a reference: the third token is missing.
        assert_eq!(value(b"12 0"), Value::Int(12));
        // Invalid object number zero degrades to null.
        assert_eq!(value(b"0 0 R"), Value::Null);
    }

    #[test]
    fn nested_containers() {
        let v = value(b"<</Kids [3 0 R 4 0 R] /Count 2>>");
        let dict = v.as_dict().unwrap();
        assert_eq!(dict.get_direct::<i64>(b"Count"), Some(2));
        assert_eq!(dict.get_raw(b"Kids").unwrap().as_array().unwrap().len(), 2);
    }

    #[test]
    fn strings() {
        assert_eq!(
            value(b"(Hi \\(there\\))"),
            Value::String(ByteString::from(&b"Hi (there)"[..]))
        );
        assert_eq!(
            value(b"<48656C6C6F>"),
            Value::String(ByteString::from(&b"Hello"[..]))
        );
    }

    #[test]
    fn indirect_with_stream() {
        let data = b"7 0 obj <</Length 5>> stream\nhello\nendstream endobj";
        let obj = parse_indirect(data, 0, &ParseCtx::default(), &|_| None).unwrap();

        assert_eq!(obj.id, ObjRef::new(7, 0));
        let stream = obj.value.as_stream().unwrap();
        assert_eq!(&data[stream.locator.offset..][..stream.locator.len], b"hello");
    }

    #[test]
    fn indirect_with_wrong_length() {
        let data = b"7 0 obj <</Length 99>> stream\nhello\nendstream endobj";
        let obj = parse_indirect(data, 0, &ParseCtx::default(), &|_| None).unwrap();

        let stream = obj.value.as_stream().unwrap();
        assert_eq!(&data[stream.locator.offset..][..stream.locator.len], b"hello");
    }

    #[test]
    fn indirect_plain_value() {
        let data = b"3 1 obj [1 2 3] endobj";
        let obj = parse_indirect(data, 0, &ParseCtx::default(), &|_| None).unwrap();

        assert_eq!(obj.id, ObjRef::new(3, 1));
        assert_eq!(obj.value.as_array().unwrap().len(), 3);
    }
}
