//! Decoding data streams.

mod ascii_85;
mod ascii_hex;
mod ccitt;
mod dct;
mod jbig2;
mod jpx;
mod lzw_flate;
mod run_length;

use crate::object::dict::keys::{DECODE_PARMS, DECODE_PARMS_ABBREVIATION, FILTER};
use crate::object::{Array, Dict, Value};
use log::warn;

/// A stream filter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Filter {
    /// The ASCII-hex filter.
    AsciiHexDecode,
    /// The ASCII85 filter.
    Ascii85Decode,
    /// The LZW filter.
    LzwDecode,
    /// The flate (zlib/deflate) filter.
    FlateDecode,
    /// The run-length filter.
    RunLengthDecode,
    /// The CCITT fax filter.
    CcittFaxDecode,
    /// The JBIG2 filter.
    Jbig2Decode,
    /// The DCT (JPEG) filter.
    DctDecode,
    /// The JPX (JPEG 2000) filter.
    JpxDecode,
    /// The crypt filter. Decryption happens at the raw-range layer, so
    /// this is a pass-through here.
    Crypt,
}

/// The color space of a decoded image, for filters that carry one.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ImageColorSpace {
    /// One gray component.
    Gray,
    /// Three RGB components.
    Rgb,
    /// Four CMYK components.
    Cmyk,
}

/// The result of running a filter chain.
pub struct FilterResult {
    /// The decoded bytes.
    pub data: Vec<u8>,
    /// The color space of the image, when the codec knows it (JPX, DCT).
    pub color_space: Option<ImageColorSpace>,
    /// The bits per component, when the codec knows it.
    pub bits_per_component: Option<u8>,
}

impl FilterResult {
    fn from_data(data: Vec<u8>) -> Self {
        Self {
            data,
            color_space: None,
            bits_per_component: None,
        }
    }
}

impl Filter {
    pub(crate) fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"ASCIIHexDecode" | b"AHx" => Some(Self::AsciiHexDecode),
            b"ASCII85Decode" | b"A85" => Some(Self::Ascii85Decode),
            b"LZWDecode" | b"LZW" => Some(Self::LzwDecode),
            b"FlateDecode" | b"Fl" => Some(Self::FlateDecode),
            b"RunLengthDecode" | b"RL" => Some(Self::RunLengthDecode),
            b"CCITTFaxDecode" | b"CCF" => Some(Self::CcittFaxDecode),
            b"JBIG2Decode" => Some(Self::Jbig2Decode),
            b"DCTDecode" | b"DCT" => Some(Self::DctDecode),
            b"JPXDecode" => Some(Self::JpxDecode),
            b"Crypt" => Some(Self::Crypt),
            _ => {
                warn!(
                    "unknown filter: {}",
                    String::from_utf8_lossy(name)
                );

                None
            }
        }
    }

    /// Apply the filter to some data.
    pub(crate) fn apply(&self, data: &[u8], params: &Dict) -> Option<FilterResult> {
        let result = match self {
            Self::AsciiHexDecode => ascii_hex::decode(data).map(FilterResult::from_data),
            Self::Ascii85Decode => ascii_85::decode(data).map(FilterResult::from_data),
            Self::RunLengthDecode => run_length::decode(data).map(FilterResult::from_data),
            Self::LzwDecode => lzw_flate::lzw::decode(data, params).map(FilterResult::from_data),
            Self::FlateDecode => {
                lzw_flate::flate::decode(data, params).map(FilterResult::from_data)
            }
            Self::CcittFaxDecode => ccitt::decode(data, params).map(FilterResult::from_data),
            Self::Jbig2Decode => jbig2::decode(data, params).map(FilterResult::from_data),
            Self::DctDecode => dct::decode(data, params),
            Self::JpxDecode => jpx::decode(data),
            Self::Crypt => Some(FilterResult::from_data(data.to_vec())),
        };

        if result.is_none() {
            warn!("failed to apply filter {self:?}");
        }

        result
    }
}

/// The filter chain of a stream dictionary, with per-filter parameters.
///
/// Entries in the dictionary are expected to be direct values; a document
/// that stores them behind references resolves them before decoding.
pub(crate) fn filter_chain(dict: &Dict) -> Vec<(Filter, Dict)> {
    let filters: Vec<Filter> = match dict.get_raw(FILTER) {
        Some(Value::Name(name)) => Filter::from_name(name).into_iter().collect(),
        Some(Value::Array(arr)) => arr
            .iter()
            .filter_map(|v| v.as_name().and_then(|n| Filter::from_name(n)))
            .collect(),
        _ => vec![],
    };

    let params_of = |i: usize| -> Dict {
        let raw = dict
            .get_raw(DECODE_PARMS)
            .or_else(|| dict.get_raw(DECODE_PARMS_ABBREVIATION));

        match raw {
            Some(Value::Dict(d)) if i == 0 => d.clone(),
            Some(Value::Array(arr)) => arr
                .get_direct::<Dict>(i)
                .unwrap_or_default(),
            _ => Dict::new(),
        }
    };

    filters
        .into_iter()
        .enumerate()
        .map(|(i, f)| (f, params_of(i)))
        .collect()
}

/// Decode a stream's raw bytes through its full filter chain.
pub(crate) fn decode(data: &[u8], dict: &Dict) -> Option<Vec<u8>> {
    decode_with_info(data, dict).map(|r| r.data)
}

/// Decode a stream's raw bytes, keeping codec-reported image information.
pub(crate) fn decode_with_info(data: &[u8], dict: &Dict) -> Option<FilterResult> {
    let chain = filter_chain(dict);

    if chain.is_empty() {
        return Some(FilterResult::from_data(data.to_vec()));
    }

    let mut result = FilterResult::from_data(data.to_vec());

    for (filter, params) in chain {
        let next = filter.apply(&result.data, &params)?;

        result = FilterResult {
            data: next.data,
            color_space: next.color_space.or(result.color_space),
            bits_per_component: next.bits_per_component.or(result.bits_per_component),
        };
    }

    Some(result)
}

/// Read the sub-object offset table of an object stream (`/ObjStm`).
///
/// The header consists of `N` pairs `(obj_num, relative_offset)`; bodies
/// start at `/First`.
pub(crate) fn object_stream_offsets(decoded: &[u8], dict: &Dict) -> Option<Vec<(u32, usize)>> {
    use crate::lexer::{Lexer, Token};
    use crate::object::dict::keys::{FIRST, N};

    let count = dict.get_direct::<usize>(N)?;
    let first = dict.get_direct::<usize>(FIRST)?;

    let mut lexer = Lexer::new(decoded);
    let mut offsets = Vec::with_capacity(count);

    for _ in 0..count {
        let (Some(Token::Int(num)), Some(Token::Int(offset))) =
            (lexer.next_token(), lexer.next_token())
        else {
            return None;
        };

        offsets.push((
            u32::try_from(num).ok()?,
            first.checked_add(usize::try_from(offset).ok()?)?,
        ));
    }

    Some(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{ByteString, Value};

    #[test]
    fn chain_from_single_name() {
        let mut dict = Dict::new();
        dict.insert(
            ByteString::from(&b"Filter"[..]),
            Value::Name(ByteString::from(&b"FlateDecode"[..])),
        );

        let chain = filter_chain(&dict);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].0, Filter::FlateDecode);
    }

    #[test]
    fn chain_from_array_with_params() {
        let mut parms = Dict::new();
        parms.insert(ByteString::from(&b"Predictor"[..]), Value::Int(12));

        let mut dict = Dict::new();
        dict.insert(
            ByteString::from(&b"Filter"[..]),
            Value::Array(Array::from(vec![
                Value::Name(ByteString::from(&b"ASCII85Decode"[..])),
                Value::Name(ByteString::from(&b"FlateDecode"[..])),
            ])),
        );
        dict.insert(
            ByteString::from(&b"DecodeParms"[..]),
            Value::Array(Array::from(vec![Value::Null, Value::Dict(parms)])),
        );

        let chain = filter_chain(&dict);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].0, Filter::Ascii85Decode);
        assert!(chain[0].1.is_empty());
        assert_eq!(chain[1].1.get_direct::<i64>(b"Predictor"), Some(12));
    }

    #[test]
    fn unfiltered_stream_is_copied() {
        let dict = Dict::new();
        assert_eq!(decode(b"abc", &dict).unwrap(), b"abc");
    }
}
