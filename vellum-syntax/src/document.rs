//! The document facade.

use crate::PdfData;
use crate::crypt::{self, DecryptionError, DecryptionTarget, Decryptor};
use crate::filter;
use crate::object::dict::keys::{
    DECODE_PARMS, DECODE_PARMS_ABBREVIATION, DEST_OUTPUT_PROFILE, ENCRYPT, FILTER, ID,
    JBIG2_GLOBALS, OUTPUT_INTENTS, ROOT,
};
use crate::object::{
    Array, ByteString, Dict, FromValue, IndirectObject, MAX_RESOLVE_DEPTH, ObjRef, Stream, Value,
};
use crate::page::{self, Page};
use crate::parse::{ParseCtx, parse_indirect, parse_value};
use crate::xref::{Index, ObjectEntry};
use log::{error, warn};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// An error produced while opening a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenError {
    /// The file structure is too damaged to build an object index.
    Unreadable,
    /// Decryption failed; `InvalidPassword` means the supplied password
    /// matched neither the user nor the owner password.
    Encryption(DecryptionError),
}

impl std::fmt::Display for OpenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unreadable => write!(f, "the file structure is unreadable"),
            Self::Encryption(e) => write!(f, "decryption failed: {e}"),
        }
    }
}

impl std::error::Error for OpenError {}

struct DecodedObjectStream {
    data: Vec<u8>,
    offsets: Vec<(u32, usize)>,
}

/// A read-only PDF document.
///
/// All access is lazy: objects are materialized on first request and kept
/// in a cache. Reading is safe from multiple threads; duplicate
/// concurrent materialization can happen, but the first stored object
/// wins and is the one every caller sees.
pub struct Document {
    data: PdfData,
    index: RwLock<Index>,
    cache: RwLock<FxHashMap<ObjRef, Arc<IndirectObject>>>,
    object_streams: RwLock<FxHashMap<u32, Arc<DecodedObjectStream>>>,
    decryptor: Option<Decryptor>,
    trailer: Dict,
    catalog: Dict,
    pages: Vec<Page>,
    output_intent: Option<Arc<Vec<u8>>>,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("pages", &self.pages.len())
            .field("encrypted", &self.decryptor.is_some())
            .finish_non_exhaustive()
    }
}

impl Document {
    /// Open a document with the empty password.
    pub fn open(data: PdfData) -> Result<Self, OpenError> {
        Self::open_with_password(data, b"")
    }

    /// Open a document, authenticating with the given password when the
    /// file is encrypted. The password is tried as the user password
    /// first, then as the owner password.
    pub fn open_with_password(data: PdfData, password: &[u8]) -> Result<Self, OpenError> {
        let bytes = data.as_ref().as_ref();

        let index = Index::build(bytes)
            .or_else(|| Index::rebuild_by_scan(bytes))
            .ok_or(OpenError::Unreadable)?;

        let trailer = index.trailer().clone();

        let decryptor = match trailer.get_raw(ENCRYPT) {
            Some(encrypt) => {
                let encrypt = bootstrap_resolve(bytes, &index, encrypt);

                let Some(dict) = encrypt.as_dict() else {
                    return Err(OpenError::Encryption(DecryptionError::InvalidEncryption));
                };

                let file_id = trailer
                    .get_raw(ID)
                    .and_then(|v| v.as_array())
                    .and_then(|a| a.get_direct::<ByteString>(0))
                    .unwrap_or_default();

                if file_id.is_empty() {
                    warn!("encrypted document without a file ID");
                }

                Some(crypt::build(dict, &file_id, password).map_err(OpenError::Encryption)?)
            }
            None => None,
        };

        let mut doc = Self {
            data,
            index: RwLock::new(index),
            cache: RwLock::new(FxHashMap::default()),
            object_streams: RwLock::new(FxHashMap::default()),
            decryptor,
            trailer,
            catalog: Dict::new(),
            pages: vec![],
            output_intent: None,
        };

        doc.catalog = doc
            .trailer
            .get::<Dict>(&doc, ROOT)
            .unwrap_or_else(|| {
                warn!("document has no readable catalog");

                Dict::new()
            });

        doc.output_intent = doc.read_output_intent();
        doc.pages = page::build_page_list(&doc);

        Ok(doc)
    }

    fn bytes(&self) -> &[u8] {
        self.data.as_ref().as_ref()
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// The document catalog.
    pub fn catalog(&self) -> &Dict {
        &self.catalog
    }

    /// The pages of the document, in display order.
    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// The page with the given 1-based number.
    pub fn page(&self, number: usize) -> Option<&Page> {
        number.checked_sub(1).and_then(|i| self.pages.get(i))
    }

    /// The raw bytes of the document's output-intent ICC profile, when
    /// one is present.
    pub fn output_intent(&self) -> Option<&Arc<Vec<u8>>> {
        self.output_intent.as_ref()
    }

    /// Whether the document was opened with a decryptor.
    pub fn is_encrypted(&self) -> bool {
        self.decryptor.is_some()
    }

    /// Materialize the object with the given reference.
    ///
    /// Returns the cached object when it was materialized before. Free
    /// and missing entries yield `None`.
    pub fn get_object(&self, id: ObjRef) -> Option<Arc<IndirectObject>> {
        if !id.is_valid() {
            return None;
        }

        if let Some(hit) = self.cache.read().ok()?.get(&id) {
            return Some(hit.clone());
        }

        let entry = *self.index.read().ok()?.get(id)?;

        let object = match entry {
            ObjectEntry::Uncompressed { offset, .. } => self.materialize_at(id, offset)?,
            ObjectEntry::Compressed {
                stream_num, index, ..
            } => self.materialize_compressed(id, stream_num, index)?,
            ObjectEntry::Free { .. } => return None,
        };

        let object = Arc::new(object);

        // First stored wins; a concurrent materialization of the same
        // object hands back whatever landed first.
        let mut cache = self.cache.write().ok()?;

        Some(
            cache
                .entry(id)
                .or_insert_with(|| object.clone())
                .clone(),
        )
    }

    fn materialize_at(&self, id: ObjRef, offset: usize) -> Option<IndirectObject> {
        let ctx = ParseCtx {
            decryptor: self.decryptor.as_ref(),
            obj_id: None,
            in_content_stream: false,
        };

        let resolve_length = |r: ObjRef| self.get_object(r).map(|o| o.value.clone());

        let parsed = parse_indirect(self.bytes(), offset, &ctx, &resolve_length);

        match parsed {
            Some(obj) if obj.id == id => Some(obj),
            _ => {
                // The index lied about the offset. Repair once, then try
                // again.
                if self.index.read().ok()?.is_repaired() {
                    error!("object {id:?} is unreadable even after repairing the index");

                    return None;
                }

                warn!("broken xref entry for {id:?}, repairing the index");
                self.index.write().ok()?.repair(self.bytes());

                let entry = *self.index.read().ok()?.get(id)?;

                match entry {
                    ObjectEntry::Uncompressed { offset, .. } => {
                        let parsed = parse_indirect(self.bytes(), offset, &ctx, &resolve_length)?;

                        (parsed.id == id).then_some(parsed)
                    }
                    ObjectEntry::Compressed {
                        stream_num, index, ..
                    } => self.materialize_compressed(id, stream_num, index),
                    ObjectEntry::Free { .. } => None,
                }
            }
        }
    }

    fn materialize_compressed(
        &self,
        id: ObjRef,
        stream_num: u32,
        index: u32,
    ) -> Option<IndirectObject> {
        let decoded = self.decoded_object_stream(stream_num)?;
        let (num, offset) = *decoded.offsets.get(index as usize)?;

        if num != id.num {
            warn!("object stream {stream_num} disagrees about the object at slot {index}");

            return None;
        }

        // Sub-objects were decrypted together with their containing
        // stream, so no decryptor applies here.
        let ctx = ParseCtx {
            decryptor: None,
            obj_id: Some(id),
            in_content_stream: false,
        };

        let mut lexer = crate::lexer::Lexer::new_at(&decoded.data, offset);
        let value = parse_value(&mut lexer, &ctx)?;

        Some(IndirectObject { id, value })
    }

    fn decoded_object_stream(&self, stream_num: u32) -> Option<Arc<DecodedObjectStream>> {
        if let Some(hit) = self.object_streams.read().ok()?.get(&stream_num) {
            return Some(hit.clone());
        }

        let container = self.get_object(ObjRef::new(stream_num, 0))?;
        let stream = container.value.as_stream()?;

        let data = self.decoded_stream(stream);
        let offsets = filter::object_stream_offsets(&data, &stream.dict)?;

        let decoded = Arc::new(DecodedObjectStream { data, offsets });

        let mut cache = self.object_streams.write().ok()?;

        Some(
            cache
                .entry(stream_num)
                .or_insert_with(|| decoded.clone())
                .clone(),
        )
    }

    /// All in-use references known to the index, for the brute-force
    /// page walk.
    pub(crate) fn index_snapshot(&self) -> Option<Vec<ObjRef>> {
        let index = self.index.read().ok()?;

        Some(
            index
                .entries()
                .filter(|(_, entry)| !matches!(entry, ObjectEntry::Free { .. }))
                .map(|(id, _)| *id)
                .collect(),
        )
    }

    /// Resolve a value: follow reference chains up to a bounded depth.
    /// Cycles and dangling references yield `Null`.
    pub fn resolve(&self, value: &Value) -> Value {
        let mut current = value.clone();

        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Value::Ref(r) => match self.get_object(r) {
                    Some(obj) => current = obj.value.clone(),
                    None => return Value::Null,
                },
                other => return other,
            }
        }

        warn!("reference chain exceeds the resolution depth");

        Value::Null
    }

    /// Resolve and convert a value in one step.
    pub fn resolve_as<T: FromValue>(&self, value: &Value) -> Option<T> {
        T::from_value(self.resolve(value))
    }

    /// The raw (still filtered) bytes of a stream, decrypted when the
    /// document is encrypted.
    pub fn raw_stream(&self, stream: &Stream) -> Vec<u8> {
        let locator = stream.locator;

        let Some(raw) = self.bytes().get(locator.offset..locator.offset + locator.len) else {
            warn!("stream range is out of bounds");

            return vec![];
        };

        if locator.encrypted
            && let Some(decryptor) = &self.decryptor
        {
            decryptor
                .decrypt(locator.owner, raw, DecryptionTarget::Stream)
                .unwrap_or_default()
        } else {
            raw.to_vec()
        }
    }

    /// The decoded content of a stream. Unsupported filters or codec
    /// failures yield empty bytes.
    pub fn decoded_stream(&self, stream: &Stream) -> Vec<u8> {
        self.decoded_stream_with_info(stream)
            .map(|r| r.data)
            .unwrap_or_default()
    }

    /// The decoded content of a stream, along with image information
    /// reported by the codec (JPX and DCT carry their own color space).
    pub fn decoded_stream_with_info(&self, stream: &Stream) -> Option<filter::FilterResult> {
        let raw = self.raw_stream(stream);
        let dict = self.resolved_filter_dict(&stream.dict);

        filter::decode_with_info(&raw, &dict)
    }

    /// Decode already-extracted bytes through the filter chain a
    /// dictionary declares. Inline images go through this path, where
    /// `/F` abbreviates `/Filter`.
    pub fn decode_raw(&self, data: &[u8], dict: &Dict) -> Option<filter::FilterResult> {
        let mut dict = dict.clone();

        if !dict.contains_key(FILTER)
            && let Some(f) = dict.get_raw(b"F").cloned()
        {
            dict.insert(ByteString::from(FILTER), f);
        }

        let dict = self.resolved_filter_dict(&dict);

        filter::decode_with_info(data, &dict)
    }

    /// Clone the stream dictionary with `/Filter` and `/DecodeParms`
    /// resolved, and any `/JBIG2Globals` stream replaced by its decoded
    /// bytes so the filter layer never needs to reach back into the
    /// document.
    fn resolved_filter_dict(&self, dict: &Dict) -> Dict {
        let mut out = dict.clone();

        if let Some(filter) = dict.get_raw(FILTER) {
            let resolved = match self.resolve(filter) {
                Value::Array(arr) => Value::Array(arr.resolved(self)),
                other => other,
            };

            out.insert(ByteString::from(FILTER), resolved);
        }

        for key in [DECODE_PARMS, DECODE_PARMS_ABBREVIATION] {
            let Some(parms) = dict.get_raw(key) else {
                continue;
            };

            let resolved = match self.resolve(parms) {
                Value::Array(arr) => Value::Array(Array::new(
                    arr.iter()
                        .map(|v| self.embed_jbig2_globals(self.resolve(v)))
                        .collect(),
                )),
                other => self.embed_jbig2_globals(other),
            };

            out.insert(ByteString::from(key), resolved);
        }

        out
    }

    fn embed_jbig2_globals(&self, value: Value) -> Value {
        let Value::Dict(mut dict) = value else {
            return value;
        };

        if let Some(globals) = dict.get_raw(JBIG2_GLOBALS).cloned() {
            if let Some(stream) = self.resolve(&globals).as_stream() {
                let decoded = self.decoded_stream(stream);
                dict.insert(
                    ByteString::from(JBIG2_GLOBALS),
                    Value::String(ByteString::new(decoded)),
                );
            }
        }

        Value::Dict(dict)
    }

    fn read_output_intent(&self) -> Option<Arc<Vec<u8>>> {
        let intents = self.catalog.get::<Array>(self, OUTPUT_INTENTS)?;

        for intent in intents.iter_resolved::<Dict>(self) {
            if let Some(profile) = intent.get::<Stream>(self, DEST_OUTPUT_PROFILE) {
                let decoded = self.decoded_stream(&profile);

                if !decoded.is_empty() {
                    return Some(Arc::new(decoded));
                }
            }
        }

        None
    }
}

/// Resolve a value against a bare index, before the document exists.
/// Only uncompressed entries can be reached at this stage, which is all
/// the `/Encrypt` dictionary needs.
fn bootstrap_resolve(bytes: &[u8], index: &Index, value: &Value) -> Value {
    match value {
        Value::Ref(r) => match index.get(*r) {
            Some(ObjectEntry::Uncompressed { offset, .. }) => {
                parse_indirect(bytes, *offset, &ParseCtx::default(), &|_| None)
                    .map(|o| o.value)
                    .unwrap_or(Value::Null)
            }
            _ => Value::Null,
        },
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::minimal_classic_pdf;

    fn open(data: Vec<u8>) -> Document {
        Document::open(Arc::new(data)).unwrap()
    }

    #[test]
    fn materializes_objects() {
        let doc = open(minimal_classic_pdf());

        let catalog = doc.get_object(ObjRef::new(1, 0)).unwrap();
        assert_eq!(
            catalog
                .value
                .as_dict()
                .unwrap()
                .get_raw(b"Type")
                .unwrap()
                .as_name()
                .map(|n| n.as_bytes()),
            Some(&b"Catalog"[..])
        );

        // Second fetch comes from the cache and is the same allocation.
        let again = doc.get_object(ObjRef::new(1, 0)).unwrap();
        assert!(Arc::ptr_eq(&catalog, &again));
    }

    #[test]
    fn resolve_follows_references() {
        let doc = open(minimal_classic_pdf());

        let resolved = doc.resolve(&Value::Ref(ObjRef::new(2, 0)));
        assert_eq!(
            resolved.as_dict().unwrap().get_direct::<i64>(b"Count"),
            Some(1)
        );

        // resolve(Reference(r)) equals resolve(get_object(r).value).
        let via_object = doc.get_object(ObjRef::new(2, 0)).unwrap();
        assert_eq!(resolved, doc.resolve(&via_object.value));
    }

    #[test]
    fn resolve_of_dangling_reference_is_null() {
        let doc = open(minimal_classic_pdf());
        assert!(doc.resolve(&Value::Ref(ObjRef::new(99, 0))).is_null());
    }

    #[test]
    fn decoded_stream_of_unfiltered_stream() {
        let doc = open(minimal_classic_pdf());
        let obj = doc.get_object(ObjRef::new(4, 0)).unwrap();
        let stream = obj.value.as_stream().unwrap().clone();

        assert_eq!(doc.decoded_stream(&stream), b"0 0 m S\n");
    }

    #[test]
    fn page_list_is_built() {
        let doc = open(minimal_classic_pdf());
        assert_eq!(doc.pages().len(), 1);
        assert!(doc.page(1).is_some());
        assert!(doc.page(0).is_none());
        assert!(doc.page(2).is_none());
    }

    fn hex(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02X}")).collect()
    }

    // A cross-reference stream revision on top of a classic table; object
    // 5 is absent in the old revision and a stream in the new one.
    #[test]
    fn xref_stream_revision_wins() {
        let mut data = minimal_classic_pdf();
        let prev = crate::xref::find_startxref(&data).unwrap();

        let o5 = data.len();
        data.extend_from_slice(b"5 0 obj <</Length 4>> stream\nABCD\nendstream endobj\n");

        let o6 = data.len();

        let mut entries = vec![];
        for offset in [o5, o6] {
            entries.push(1u8);
            entries.extend_from_slice(&(offset as u16).to_be_bytes());
            entries.push(0);
        }

        data.extend_from_slice(
            format!(
                "6 0 obj <</Type/XRef/Size 7/Root 1 0 R/W [1 2 1]/Index [5 2]/Prev {prev}/Length {}>> stream\n",
                entries.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&entries);
        data.extend_from_slice(
            format!("\nendstream endobj\nstartxref\n{o6}\n%%EOF").as_bytes(),
        );

        let doc = open(data);

        // The old revision still provides the page tree.
        assert_eq!(doc.pages().len(), 1);

        let five = doc.get_object(ObjRef::new(5, 0)).unwrap();
        let stream = five.value.as_stream().expect("object 5 is a stream");
        assert_eq!(doc.decoded_stream(stream), b"ABCD");
    }

    // Objects packed into an object stream, reached through a
    // cross-reference stream with type-2 entries.
    #[test]
    fn compressed_objects_materialize() {
        let mut data = Vec::new();
        data.extend_from_slice(b"%PDF-1.5\n");

        let mut offsets = vec![];

        for body in [
            &b"1 0 obj <</Type/Catalog/Pages 2 0 R>> endobj\n"[..],
            &b"2 0 obj <</Type/Pages/Kids [3 0 R]/Count 1/MediaBox [0 0 10 10]>> endobj\n"[..],
            &b"3 0 obj <</Type/Page/Parent 2 0 R>> endobj\n"[..],
        ] {
            offsets.push(data.len());
            data.extend_from_slice(body);
        }

        // The object stream holds objects 7 and 8.
        let body_7 = b"<</Kind 7>>";
        let body_8 = b"<</Kind 8>>";
        let header = format!("7 0 8 {} ", body_7.len() + 1);
        let first = header.len();

        let mut payload = header.into_bytes();
        payload.extend_from_slice(body_7);
        payload.push(b' ');
        payload.extend_from_slice(body_8);

        let o9 = data.len();
        data.extend_from_slice(
            format!(
                "9 0 obj <</Type/ObjStm/N 2/First {first}/Length {}>> stream\n",
                payload.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&payload);
        data.extend_from_slice(b"\nendstream endobj\n");

        let o10 = data.len();

        let mut entries = vec![];
        // Objects 1 to 3: plain offsets.
        for offset in &offsets {
            entries.push(1u8);
            entries.extend_from_slice(&(*offset as u16).to_be_bytes());
            entries.push(0);
        }
        // Objects 7 and 8: in object stream 9, slots 0 and 1.
        for slot in 0..2u8 {
            entries.push(2);
            entries.extend_from_slice(&9u16.to_be_bytes());
            entries.push(slot);
        }
        // Objects 9 and 10: plain offsets.
        for offset in [o9, o10] {
            entries.push(1);
            entries.extend_from_slice(&(offset as u16).to_be_bytes());
            entries.push(0);
        }

        data.extend_from_slice(
            format!(
                "10 0 obj <</Type/XRef/Size 11/Root 1 0 R/W [1 2 1]/Index [1 3 7 4]/Length {}>> stream\n",
                entries.len()
            )
            .as_bytes(),
        );
        data.extend_from_slice(&entries);
        data.extend_from_slice(
            format!("\nendstream endobj\nstartxref\n{o10}\n%%EOF").as_bytes(),
        );

        let doc = open(data);

        let seven = doc.get_object(ObjRef::new(7, 0)).unwrap();
        assert_eq!(
            seven.value.as_dict().unwrap().get_direct::<i64>(b"Kind"),
            Some(7)
        );

        let eight = doc.get_object(ObjRef::new(8, 0)).unwrap();
        assert_eq!(
            eight.value.as_dict().unwrap().get_direct::<i64>(b"Kind"),
            Some(8)
        );
    }

    // Build an RC4-encrypted file (V2/R3) from scratch with the crate's
    // own primitives and open it through the front door.
    #[test]
    fn encrypted_document_roundtrip() {
        use crate::crypt::rc4::Rc4;
        use crate::crypt::{PASSWORD_PADDING, file_key_rev4, md5, object_key, pad_password};

        let user_pw: &[u8] = b"test";
        let owner_pw: &[u8] = b"owner";
        let file_id = [0x42u8; 16];
        let permissions_value: i64 = -4;
        let permissions = permissions_value as u32;
        const KEY_BYTES: u16 = 5;

        // Algorithm 3: the /O entry.
        let owner_key = {
            let mut hash = md5::digest(&pad_password(owner_pw));
            for _ in 0..50 {
                hash = md5::digest(&hash);
            }

            hash[..usize::from(KEY_BYTES)].to_vec()
        };

        let mut o_entry = pad_password(user_pw).to_vec();
        for i in 0..=19u8 {
            let round_key: Vec<u8> = owner_key.iter().map(|b| b ^ i).collect();
            o_entry = Rc4::new(&round_key).apply(&o_entry);
        }

        // Algorithm 2: the file key.
        let key = file_key_rev4(
            &pad_password(user_pw),
            &o_entry,
            permissions,
            &file_id,
            3,
            KEY_BYTES,
            true,
        );

        // Algorithm 5: the /U entry.
        let u_entry = {
            let mut input = vec![];
            input.extend_from_slice(&PASSWORD_PADDING);
            input.extend_from_slice(&file_id);

            let mut value = Rc4::new(&key).apply(&md5::digest(&input));

            for i in 1..=19u8 {
                let round_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
                value = Rc4::new(&round_key).apply(&value);
            }

            value.resize(32, 0);
            value
        };

        let content = b"0 0 m S\n";
        let encrypted_content =
            Rc4::new(&object_key(&key, ObjRef::new(4, 0), false)).apply(content);

        let mut data = Vec::new();
        data.extend_from_slice(b"%PDF-1.4\n");

        let mut offsets = vec![];
        let bodies: Vec<Vec<u8>> = vec![
            b"1 0 obj <</Type/Catalog/Pages 2 0 R>> endobj\n".to_vec(),
            b"2 0 obj <</Type/Pages/Kids [3 0 R]/Count 1/MediaBox [0 0 612 792]>> endobj\n"
                .to_vec(),
            b"3 0 obj <</Type/Page/Parent 2 0 R/Contents 4 0 R>> endobj\n".to_vec(),
            {
                let mut body = format!("4 0 obj <</Length {}>> stream\n", encrypted_content.len())
                    .into_bytes();
                body.extend_from_slice(&encrypted_content);
                body.extend_from_slice(b"\nendstream endobj\n");
                body
            },
            format!(
                "5 0 obj <</Filter/Standard/V 2/R 3/Length 40/O <{}>/U <{}>/P {permissions_value}>> endobj\n",
                hex(&o_entry),
                hex(&u_entry),
            )
            .into_bytes(),
        ];

        for body in &bodies {
            offsets.push(data.len());
            data.extend_from_slice(body);
        }

        let xref_pos = data.len();
        data.extend_from_slice(b"xref\n0 6\n0000000000 65535 f \n");

        for offset in &offsets {
            data.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }

        data.extend_from_slice(
            format!(
                "trailer <</Size 6/Root 1 0 R/Encrypt 5 0 R/ID [<{id}> <{id}>]>>\nstartxref\n{xref_pos}\n%%EOF",
                id = hex(&file_id),
            )
            .as_bytes(),
        );

        // The user password opens the document and streams decrypt.
        let doc = Document::open_with_password(Arc::new(data.clone()), b"test").unwrap();
        assert!(doc.is_encrypted());

        let four = doc.get_object(ObjRef::new(4, 0)).unwrap();
        let stream = four.value.as_stream().unwrap();
        assert_eq!(doc.decoded_stream(stream), content);

        // The owner password works too.
        let doc = Document::open_with_password(Arc::new(data.clone()), b"owner").unwrap();
        let four = doc.get_object(ObjRef::new(4, 0)).unwrap();
        assert_eq!(doc.decoded_stream(four.value.as_stream().unwrap()), content);

        // A wrong password is a hard error; there is no partial open.
        assert_eq!(
            Document::open_with_password(Arc::new(data), b"wrong").unwrap_err(),
            OpenError::Encryption(DecryptionError::InvalidPassword)
        );
    }
}
