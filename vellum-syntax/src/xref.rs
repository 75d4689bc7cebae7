//! Building the object index from the cross-reference machinery.
//!
//! A file carries its index either as classic `xref` tables, as
//! cross-reference streams, or as a mix of both (hybrid files). Revisions
//! chain through `/Prev`; older revisions are applied first so that later
//! ones win. When the whole machinery is broken, a repair scan enumerates
//! `N G obj` starts over the file.

use crate::filter;
use crate::lexer::{Keyword, Lexer, Token};
use crate::object::dict::keys::{
    ENCRYPT, FIRST, INDEX, N, PREV, ROOT, SIZE, TYPE, W, XREF_STM,
};
use crate::object::{Dict, ObjRef, Stream, Value};
use crate::parse::{ParseCtx, parse_indirect, parse_value};
use crate::reader::Reader;
use crate::trivia::skip_white_spaces_and_comments;
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

pub(crate) const XREF_ENTRY_LEN: usize = 20;

/// One entry of the object index.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ObjectEntry {
    /// An object stored directly in the file.
    Uncompressed {
        /// Byte offset of `N G obj`.
        offset: usize,
        /// Whether the entry came from a cross-reference stream.
        in_stream: bool,
    },
    /// An object packed into an object stream.
    Compressed {
        /// The object number of the containing object stream.
        stream_num: u32,
        /// The position within the object stream.
        index: u32,
        /// Whether the entry came from a cross-reference stream.
        in_stream: bool,
    },
    /// A free entry. Kept for diagnostics; never materialized.
    Free {
        /// The object number of the next free object.
        next_num: u32,
        /// The generation to use if the object is revived.
        next_gen: i32,
    },
}

type EntryMap = FxHashMap<ObjRef, ObjectEntry>;

/// The composite object index of a document.
#[derive(Debug, Default)]
pub struct Index {
    map: EntryMap,
    trailer: Dict,
    repaired: bool,
}

impl Index {
    /// Build the index by following the cross-reference chain from
    /// `startxref`. Returns `None` when the chain is unreadable.
    pub(crate) fn build(data: &[u8]) -> Option<Self> {
        let start = find_startxref(data)?;
        let mut map = EntryMap::default();
        let mut visited = FxHashSet::default();
        let trailer = populate(data, start, &mut map, &mut visited)?;

        Some(Self {
            map,
            trailer,
            repaired: false,
        })
    }

    /// Build the index by scanning the whole file for `N G obj` starts.
    pub(crate) fn rebuild_by_scan(data: &[u8]) -> Option<Self> {
        warn!("xref chain is unreadable, rebuilding the index by scanning");

        let (map, trailer) = scan_for_objects(data);
        let trailer = trailer?;

        warn!("rebuilt index with {} entries", map.len());

        Some(Self {
            map,
            trailer,
            repaired: true,
        })
    }

    /// Look up the entry for a reference.
    pub fn get(&self, id: ObjRef) -> Option<&ObjectEntry> {
        self.map.get(&id)
    }

    /// The trailer dictionary of the newest revision.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// The number of indexed objects.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Whether the index was produced by the repair scan.
    pub fn is_repaired(&self) -> bool {
        self.repaired
    }

    /// Iterate over all indexed references.
    pub fn entries(&self) -> impl Iterator<Item = (&ObjRef, &ObjectEntry)> {
        self.map.iter()
    }

    /// Replace the contents with a scan-built index, keeping the trailer
    /// when the scan doesn't find a better one.
    pub(crate) fn repair(&mut self, data: &[u8]) {
        let (map, trailer) = scan_for_objects(data);

        self.map = map;
        self.repaired = true;

        if let Some(trailer) = trailer {
            self.trailer = trailer;
        }
    }
}

/// Find the offset announced by the last `startxref` in the file.
pub(crate) fn find_startxref(data: &[u8]) -> Option<usize> {
    // The keyword lives in the last chunk of the file; searching the whole
    // tail keeps truncated files working.
    let pos = memchr::memmem::rfind(data, b"startxref")?;
    let mut lexer = Lexer::new_at(data, pos + b"startxref".len());

    match lexer.next_token()? {
        Token::Int(offset) => usize::try_from(offset).ok().filter(|o| *o < data.len()),
        _ => None,
    }
}

/// Populate `map` from the cross-reference section at `pos`, recursing
/// into previous revisions first. Returns the section's trailer dict.
fn populate(
    data: &[u8],
    pos: usize,
    map: &mut EntryMap,
    visited: &mut FxHashSet<usize>,
) -> Option<Dict> {
    if !visited.insert(pos) {
        warn!("cross-reference chain loops back to offset {pos}");

        return None;
    }

    let mut lexer = Lexer::new_at(data, pos);

    match lexer.peek()? {
        Token::Keyword(Keyword::Xref) => populate_from_table(data, pos, map, visited),
        Token::Int(_) => populate_from_stream(data, pos, map, visited),
        _ => None,
    }
}

fn populate_from_table(
    data: &[u8],
    pos: usize,
    map: &mut EntryMap,
    visited: &mut FxHashSet<usize>,
) -> Option<Dict> {
    let trailer = read_table_trailer(data, pos)?;

    if let Some(prev) = trailer.get_direct::<usize>(PREV) {
        populate(data, prev, map, visited);
    }

    // Now the table's own entries.
    let mut lexer = Lexer::new_at(data, pos);

    if lexer.next_token()? != Token::Keyword(Keyword::Xref) {
        return None;
    }

    loop {
        let mut ahead = lexer.clone();

        let (Some(Token::Int(start)), Some(Token::Int(count))) =
            (ahead.next_token(), ahead.next_token())
        else {
            break;
        };

        lexer = ahead;
        let r = lexer.reader();
        r.forward_while(crate::trivia::is_white_space_character);

        let start = u32::try_from(start).ok()?;
        let count = u32::try_from(count).ok()?;

        for i in 0..count {
            let bytes = r.read_bytes(XREF_ENTRY_LEN)?;
            let id_num = start + i;

            match parse_table_entry(bytes) {
                Some((offset, generation, true)) => {
                    map.insert(ObjRef::new(id_num, generation), ObjectEntry::Uncompressed {
                        offset,
                        in_stream: false,
                    });
                }
                Some((next, next_gen, false)) => {
                    map.insert(ObjRef::new(id_num, next_gen), ObjectEntry::Free {
                        next_num: next as u32,
                        next_gen,
                    });
                }
                None => {
                    warn!("unreadable xref entry for object {id_num}");

                    return None;
                }
            }
        }
    }

    // In hybrid files the cross-reference stream shadows the table.
    if let Some(xref_stm) = trailer.get_direct::<usize>(XREF_STM) {
        populate(data, xref_stm, map, visited);
    }

    Some(trailer)
}

/// A classic 20-byte entry: ten offset digits, five generation digits and
/// the type letter, at fixed columns.
fn parse_table_entry(bytes: &[u8]) -> Option<(usize, i32, bool)> {
    fn fixed_number(bytes: &[u8]) -> Option<u64> {
        let mut out = 0u64;

        for b in bytes {
            if !b.is_ascii_digit() {
                return None;
            }

            out = out * 10 + u64::from(b - b'0');
        }

        Some(out)
    }

    let offset = fixed_number(bytes.get(0..10)?)? as usize;
    let generation = fixed_number(bytes.get(11..16)?)? as i32;
    let in_use = match bytes.get(17)? {
        b'n' => true,
        b'f' => false,
        _ => return None,
    };

    Some((offset, generation, in_use))
}

/// Skip past the subsections of a classic table and read its trailer.
fn read_table_trailer(data: &[u8], pos: usize) -> Option<Dict> {
    let mut lexer = Lexer::new_at(data, pos);

    if lexer.next_token()? != Token::Keyword(Keyword::Xref) {
        return None;
    }

    loop {
        let mut ahead = lexer.clone();

        match (ahead.next_token()?, ahead.next_token()) {
            (Token::Int(_), Some(Token::Int(count))) => {
                lexer = ahead;
                let r = lexer.reader();
                r.forward_while(crate::trivia::is_white_space_character);
                r.skip_bytes(XREF_ENTRY_LEN * usize::try_from(count).ok()?)?;
            }
            (Token::Keyword(Keyword::Trailer), _) => {
                lexer.next_token();

                return parse_value(&mut lexer, &ParseCtx::default())
                    .and_then(|v| v.as_dict().cloned());
            }
            _ => return None,
        }
    }
}

fn populate_from_stream(
    data: &[u8],
    pos: usize,
    map: &mut EntryMap,
    visited: &mut FxHashSet<usize>,
) -> Option<Dict> {
    let obj = parse_indirect(data, pos, &ParseCtx::default(), &|_| None)?;
    let Value::Stream(stream) = obj.value else {
        return None;
    };

    if let Some(prev) = stream.dict.get_direct::<usize>(PREV) {
        populate(data, prev, map, visited);
    }

    let raw = data.get(stream.locator.offset..stream.locator.offset + stream.locator.len)?;
    let decoded = filter::decode(raw, &stream.dict)?;

    let widths = stream.dict.get_direct::<[f32; 3]>(W)?;
    let [w1, w2, w3] = widths.map(|w| w as usize);

    if w2 > size_of::<u64>() {
        warn!("xref stream offset field is wider than supported");

        return None;
    }

    let size = stream.dict.get_direct::<u32>(SIZE)?;

    let subsections: Vec<(u32, u32)> = match stream.dict.get_direct::<crate::object::Array>(INDEX) {
        Some(index) => {
            let nums: Vec<u32> = index.iter().filter_map(|v| match v {
                Value::Int(i) => u32::try_from(*i).ok(),
                _ => None,
            })
            .collect();

            nums.chunks_exact(2).map(|c| (c[0], c[1])).collect()
        }
        None => vec![(0, size)],
    };

    let mut r = Reader::new(&decoded);

    for (start, count) in subsections {
        for i in 0..count {
            let id_num = start + i;

            // A missing first field defaults to type 1.
            let entry_type = if w1 == 0 { 1 } else { r.read_be_number(w1)? };
            let f2 = r.read_be_number(w2)?;
            let f3 = if w3 == 0 { 0 } else { r.read_be_number(w3)? };

            match entry_type {
                0 => {
                    map.insert(ObjRef::new(id_num, f3 as i32), ObjectEntry::Free {
                        next_num: f2 as u32,
                        next_gen: f3 as i32,
                    });
                }
                1 => {
                    map.insert(
                        ObjRef::new(id_num, f3 as i32),
                        ObjectEntry::Uncompressed {
                            offset: f2 as usize,
                            in_stream: true,
                        },
                    );
                }
                2 => {
                    // Objects in object streams always have generation 0.
                    map.insert(ObjRef::new(id_num, 0), ObjectEntry::Compressed {
                        stream_num: f2 as u32,
                        index: f3 as u32,
                        in_stream: true,
                    });
                }
                other => {
                    warn!("unknown xref stream entry type {other}");

                    return None;
                }
            }
        }
    }

    Some(stream.dict)
}

/// The repair path: enumerate `N G obj` starts (and the payloads of any
/// object streams found this way) over the whole file.
fn scan_for_objects(data: &[u8]) -> (EntryMap, Option<Dict>) {
    let mut map = EntryMap::default();
    let mut trailer: Option<Dict> = None;
    let mut lexer = Lexer::new(data);

    loop {
        skip_white_spaces_and_comments(lexer.reader());
        let pos = lexer.offset();

        if pos >= data.len() {
            break;
        }

        let mut ahead = lexer.clone();

        match (ahead.next_token(), ahead.next_token(), ahead.next_token()) {
            (
                Some(Token::Int(num)),
                Some(Token::Int(generation)),
                Some(Token::Keyword(Keyword::Obj)),
            ) => {
                if let Ok(num) = u32::try_from(num) {
                    let id = ObjRef::new(num, generation as i32);
                    map.insert(id, ObjectEntry::Uncompressed {
                        offset: pos,
                        in_stream: false,
                    });

                    if let Some(obj) = parse_indirect(data, pos, &ParseCtx::default(), &|_| None) {
                        if let Value::Stream(stream) = &obj.value {
                            index_object_stream_payload(data, num, stream, &mut map);
                            skip_past(&mut lexer, stream.locator.offset + stream.locator.len);

                            continue;
                        }

                        if let Value::Dict(dict) = &obj.value
                            && trailer_candidate(dict)
                        {
                            trailer = Some(dict.clone());
                        }
                    }
                }

                lexer = ahead;
            }
            (Some(Token::Keyword(Keyword::Trailer)), _, _) => {
                lexer.next_token();

                if let Some(dict) = parse_value(&mut lexer, &ParseCtx::default())
                    .and_then(|v| v.as_dict().cloned())
                    && trailer_candidate(&dict)
                {
                    trailer = Some(dict);
                }
            }
            (Some(_), _, _) => {
                if lexer.next_token().is_none() {
                    break;
                }

                // `next_token` can legitimately stand still only at the
                // end of input, which the surrounding checks cover.
                if lexer.offset() <= pos {
                    lexer.reader().forward();
                }
            }
            (None, _, _) => break,
        }
    }

    (map, trailer)
}

fn trailer_candidate(dict: &Dict) -> bool {
    dict.contains_key(SIZE) && dict.contains_key(ROOT)
        || dict.contains_key(ROOT) && dict.contains_key(ENCRYPT)
}

fn skip_past(lexer: &mut Lexer<'_>, offset: usize) {
    lexer.jump(offset);
    // Leave `endstream endobj` behind.
    let mut ahead = lexer.clone();

    while let Some(token) = ahead.next_token() {
        match token {
            Token::Keyword(Keyword::EndStream) | Token::Keyword(Keyword::EndObj) => {
                *lexer = ahead.clone();
            }
            _ => break,
        }
    }
}

/// Index the sub-objects of an object stream found during the scan.
fn index_object_stream_payload(data: &[u8], stream_num: u32, stream: &Stream, map: &mut EntryMap) {
    if stream.dict.get_direct::<crate::object::Name>(TYPE).as_deref() != Some(&b"ObjStm"[..]) {
        return;
    }

    let Some(raw) = data.get(stream.locator.offset..stream.locator.offset + stream.locator.len)
    else {
        return;
    };

    let Some(decoded) = filter::decode(raw, &stream.dict) else {
        return;
    };

    let Some(count) = stream.dict.get_direct::<usize>(N) else {
        return;
    };

    if stream.dict.get_direct::<usize>(FIRST).is_none() {
        return;
    }

    let mut lexer = Lexer::new(&decoded);

    for index in 0..count {
        let (Some(Token::Int(num)), Some(Token::Int(_offset))) =
            (lexer.next_token(), lexer.next_token())
        else {
            return;
        };

        if let Ok(num) = u32::try_from(num) {
            map.insert(ObjRef::new(num, 0), ObjectEntry::Compressed {
                stream_num,
                index: index as u32,
                in_stream: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::minimal_classic_pdf;

    #[test]
    fn classic_table() {
        let data = minimal_classic_pdf();
        let index = Index::build(&data).unwrap();

        assert!(!index.is_repaired());
        assert!(matches!(
            index.get(ObjRef::new(1, 0)),
            Some(ObjectEntry::Uncompressed {
                in_stream: false,
                ..
            })
        ));
        assert!(matches!(
            index.get(ObjRef::new(0, 65535)),
            Some(ObjectEntry::Free { .. })
        ));
        assert_eq!(index.trailer().get_ref(ROOT), Some(ObjRef::new(1, 0)));
    }

    #[test]
    fn startxref_is_found_from_the_tail() {
        let data = minimal_classic_pdf();
        let pos = find_startxref(&data).unwrap();
        assert!(data[pos..].starts_with(b"xref"));
    }

    #[test]
    fn update_layering() {
        // A second revision moves object 3 and frees object 4. The newest
        // declarations must win.
        let mut data = minimal_classic_pdf();
        let first_xref = find_startxref(&data).unwrap();

        let new_offset = data.len();
        data.extend_from_slice(b"3 0 obj <</Type/Page/Parent 2 0 R/MediaBox [0 0 100 100]/Contents 4 0 R>> endobj\n");

        let xref_pos = data.len();
        data.extend_from_slice(
            format!(
                "xref\n3 2\n{new_offset:010} 00000 n \n0000000000 00001 f \ntrailer <</Size 5/Root 1 0 R/Prev {first_xref}>>\nstartxref\n{xref_pos}\n%%EOF"
            )
            .as_bytes(),
        );

        let index = Index::build(&data).unwrap();

        assert_eq!(
            index.get(ObjRef::new(3, 0)),
            Some(&ObjectEntry::Uncompressed {
                offset: new_offset,
                in_stream: false,
            })
        );
        assert!(matches!(
            index.get(ObjRef::new(4, 1)),
            Some(ObjectEntry::Free { .. })
        ));
    }

    #[test]
    fn repair_scan_finds_objects() {
        // Break the startxref offset; the scan must still find everything.
        let data = minimal_classic_pdf();
        let broken = String::from_utf8(data).unwrap().replace("startxref", "startxrEF");

        let index = Index::rebuild_by_scan(broken.as_bytes()).unwrap();

        assert!(index.is_repaired());
        assert!(index.get(ObjRef::new(1, 0)).is_some());
        assert!(index.get(ObjRef::new(4, 0)).is_some());
        assert_eq!(index.trailer().get_ref(ROOT), Some(ObjRef::new(1, 0)));
    }
}
