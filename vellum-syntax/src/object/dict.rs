//! Dictionary objects.

use crate::document::Document;
use crate::object::{ByteString, FromValue, ObjRef, Value};
use rustc_hash::FxHashMap;

/// A mapping from names to PDF values.
///
/// Keys are stored without the leading solidus; looking up `"Type"` and
/// `"/Type"` yields the same entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dict(FxHashMap<ByteString, Value>);

fn normalize(key: &[u8]) -> &[u8] {
    key.strip_prefix(b"/").unwrap_or(key)
}

impl Dict {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self(FxHashMap::default())
    }

    /// Create a dictionary from key/value pairs.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (ByteString, Value)>) -> Self {
        Self(pairs.into_iter().collect())
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert an entry. The key is normalized.
    pub fn insert(&mut self, key: ByteString, value: Value) {
        let key = match key.as_bytes().first() {
            Some(b'/') => ByteString::from(&key.as_bytes()[1..]),
            _ => key,
        };

        self.0.insert(key, value);
    }

    /// Whether an entry exists for the key.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.0.contains_key(normalize(key))
    }

    /// The entry for the key, unresolved.
    pub fn get_raw(&self, key: &[u8]) -> Option<&Value> {
        self.0.get(normalize(key))
    }

    /// The entry for the key, resolved through the document and converted.
    pub fn get<T: FromValue>(&self, doc: &Document, key: &[u8]) -> Option<T> {
        T::from_value(doc.resolve(self.get_raw(key)?))
    }

    /// The entry for the key, converted without resolution. References
    /// yield `None`.
    pub fn get_direct<T: FromValue>(&self, key: &[u8]) -> Option<T> {
        T::from_value(self.get_raw(key)?.clone())
    }

    /// The entry for the key if it is an indirect reference.
    pub fn get_ref(&self, key: &[u8]) -> Option<ObjRef> {
        self.get_raw(key)?.as_ref()
    }

    /// Iterate over the keys.
    pub fn keys(&self) -> impl Iterator<Item = &ByteString> {
        self.0.keys()
    }

    /// Iterate over the entries.
    pub fn iter(&self) -> impl Iterator<Item = (&ByteString, &Value)> {
        self.0.iter()
    }
}

/// Dictionary key names.
pub mod keys {
    macro_rules! key {
        ($ident:ident, $lit:literal) => {
            /// The dictionary key.
            pub const $ident: &[u8] = $lit;
        };
    }

    key!(TYPE, b"Type");
    key!(SUBTYPE, b"Subtype");
    key!(LENGTH, b"Length");
    key!(FILTER, b"Filter");
    key!(DECODE_PARMS, b"DecodeParms");
    key!(DECODE_PARMS_ABBREVIATION, b"DP");
    key!(FILTER_ABBREVIATION, b"F");

    key!(SIZE, b"Size");
    key!(PREV, b"Prev");
    key!(ROOT, b"Root");
    key!(ID, b"ID");
    key!(ENCRYPT, b"Encrypt");
    key!(W, b"W");
    key!(INDEX, b"Index");
    key!(XREF_STM, b"XRefStm");
    key!(N, b"N");
    key!(FIRST, b"First");

    key!(PAGES, b"Pages");
    key!(KIDS, b"Kids");
    key!(COUNT, b"Count");
    key!(PARENT, b"Parent");
    key!(MEDIA_BOX, b"MediaBox");
    key!(CROP_BOX, b"CropBox");
    key!(BLEED_BOX, b"BleedBox");
    key!(TRIM_BOX, b"TrimBox");
    key!(ART_BOX, b"ArtBox");
    key!(ROTATE, b"Rotate");
    key!(RESOURCES, b"Resources");
    key!(CONTENTS, b"Contents");
    key!(ANNOTS, b"Annots");
    key!(PAGE_LABELS, b"PageLabels");
    key!(NUMS, b"Nums");
    key!(S, b"S");
    key!(ST, b"St");
    key!(P, b"P");

    key!(RECT, b"Rect");
    key!(IRT, b"IRT");
    key!(RT, b"RT");
    key!(POPUP, b"Popup");
    key!(T, b"T");
    key!(M, b"M");
    key!(C, b"C");
    key!(F, b"F");
    key!(AP, b"AP");

    key!(FONT, b"Font");
    key!(X_OBJECT, b"XObject");
    key!(EXT_G_STATE, b"ExtGState");
    key!(COLOR_SPACE, b"ColorSpace");
    key!(PATTERN, b"Pattern");
    key!(SHADING, b"Shading");
    key!(PROPERTIES, b"Properties");

    key!(FUNCTION_TYPE, b"FunctionType");
    key!(DOMAIN, b"Domain");
    key!(RANGE, b"Range");
    key!(C0, b"C0");
    key!(C1, b"C1");
    key!(BOUNDS, b"Bounds");
    key!(ENCODE, b"Encode");
    key!(DECODE, b"Decode");
    key!(FUNCTIONS, b"Functions");
    key!(BITS_PER_SAMPLE, b"BitsPerSample");

    key!(PREDICTOR, b"Predictor");
    key!(COLORS, b"Colors");
    key!(COLUMNS, b"Columns");
    key!(BITS_PER_COMPONENT, b"BitsPerComponent");
    key!(EARLY_CHANGE, b"EarlyChange");
    key!(K, b"K");
    key!(ROWS, b"Rows");
    key!(END_OF_LINE, b"EndOfLine");
    key!(ENCODED_BYTE_ALIGN, b"EncodedByteAlign");
    key!(BLACK_IS_1, b"BlackIs1");
    key!(END_OF_BLOCK, b"EndOfBlock");
    key!(DAMAGED_ROWS_BEFORE_ERROR, b"DamagedRowsBeforeError");
    key!(JBIG2_GLOBALS, b"JBIG2Globals");

    key!(V, b"V");
    key!(R, b"R");
    key!(O, b"O");
    key!(U, b"U");
    key!(OE, b"OE");
    key!(UE, b"UE");
    key!(PERMS, b"Perms");
    key!(ENCRYPT_METADATA, b"EncryptMetadata");
    key!(CF, b"CF");
    key!(CFM, b"CFM");
    key!(STM_F, b"StmF");
    key!(STR_F, b"StrF");

    key!(WHITE_POINT, b"WhitePoint");
    key!(BLACK_POINT, b"BlackPoint");
    key!(GAMMA, b"Gamma");
    key!(MATRIX, b"Matrix");
    key!(ALTERNATE, b"Alternate");
    key!(OUTPUT_INTENTS, b"OutputIntents");
    key!(DEST_OUTPUT_PROFILE, b"DestOutputProfile");

    key!(WIDTH, b"Width");
    key!(HEIGHT, b"Height");
    key!(IMAGE_MASK, b"ImageMask");
    key!(B_BOX, b"BBox");
    key!(GROUP, b"Group");
    key!(INTERPOLATE, b"Interpolate");
    key!(S_MASK, b"SMask");
}

#[cfg(test)]
mod tests {
    use super::Dict;
    use crate::object::{ByteString, Value};

    #[test]
    fn key_normalization() {
        let mut dict = Dict::new();
        dict.insert(ByteString::from(&b"/Type"[..]), Value::Int(1));
        dict.insert(ByteString::from(&b"Count"[..]), Value::Int(2));

        assert_eq!(dict.get_direct::<i64>(b"Type"), Some(1));
        assert_eq!(dict.get_direct::<i64>(b"/Type"), Some(1));
        assert_eq!(dict.get_direct::<i64>(b"/Count"), Some(2));
        assert!(dict.contains_key(b"Count"));
        assert!(!dict.contains_key(b"Kids"));
    }
}
