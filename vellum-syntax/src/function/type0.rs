//! Type 0: sampled functions.

use crate::document::Document;
use crate::function::{Intervals, Values, clamp_to, interpolate, read_intervals};
use crate::object::dict::keys::{BITS_PER_SAMPLE, DECODE, ENCODE, SIZE};
use crate::object::{Array, Stream};
use log::warn;
use smallvec::{SmallVec, smallvec};

#[derive(Debug)]
pub(crate) struct Sampled {
    sizes: SmallVec<[u32; 4]>,
    samples: Vec<u32>,
    bits_per_sample: u8,
    domain: Intervals,
    range: Intervals,
    encode: Intervals,
    decode: Intervals,
}

impl Sampled {
    pub(crate) fn new(doc: &Document, stream: &Stream) -> Option<Self> {
        let dict = &stream.dict;

        let bits_per_sample = dict.get::<u8>(doc, BITS_PER_SAMPLE)?;

        if !matches!(bits_per_sample, 1 | 2 | 4 | 8 | 12 | 16 | 24 | 32) {
            warn!("unsupported bits per sample: {bits_per_sample}");

            return None;
        }

        let sizes: SmallVec<[u32; 4]> = dict
            .get::<Array>(doc, SIZE)?
            .iter_resolved::<u32>(doc)
            .collect();

        if sizes.is_empty() || sizes.iter().any(|s| *s == 0) {
            return None;
        }

        let domain = super::domain_of(doc, dict)?;
        let range = super::range_of(doc, dict)?;

        if domain.len() != sizes.len() {
            return None;
        }

        let encode = dict
            .get::<Array>(doc, ENCODE)
            .and_then(|a| read_intervals(doc, &a))
            .unwrap_or_else(|| sizes.iter().map(|s| (0.0, (*s - 1) as f32)).collect());

        let decode = dict
            .get::<Array>(doc, DECODE)
            .and_then(|a| read_intervals(doc, &a))
            .unwrap_or_else(|| range.clone());

        let samples = {
            let data = doc.decoded_stream(stream);
            let total: usize = sizes.iter().map(|s| *s as usize).product::<usize>() * range.len();

            let mut out = Vec::with_capacity(total);
            let mut reader = BitCursor::new(&data);

            for _ in 0..total {
                out.push(reader.read(bits_per_sample)?);
            }

            out
        };

        Some(Self {
            sizes,
            samples,
            bits_per_sample,
            domain,
            range,
            encode,
            decode,
        })
    }

    fn sample(&self, coords: &[u32], output: usize) -> f32 {
        // Dimension 0 varies fastest.
        let mut index = 0usize;
        let mut stride = 1usize;

        for (coord, size) in coords.iter().zip(&self.sizes) {
            index += *coord as usize * stride;
            stride *= *size as usize;
        }

        self.samples
            .get(index * self.range.len() + output)
            .copied()
            .unwrap_or(0) as f32
    }

    pub(crate) fn eval(&self, input: &[f32]) -> Option<Values> {
        let dims = self.sizes.len();

        if input.len() != dims {
            warn!("wrong number of arguments for a sampled function");

            return None;
        }

        if dims > 16 {
            return None;
        }

        // Map each input into sample-index space.
        let mut lower: SmallVec<[u32; 4]> = smallvec![0; dims];
        let mut upper: SmallVec<[u32; 4]> = smallvec![0; dims];
        let mut frac: SmallVec<[f32; 4]> = smallvec![0.0; dims];

        for d in 0..dims {
            let (d0, d1) = self.domain[d];
            let (e0, e1) = self.encode[d];
            let max = (self.sizes[d] - 1) as f32;

            let x = interpolate(input[d].clamp(d0, d1), d0, d1, e0, e1).clamp(0.0, max);

            lower[d] = x.floor() as u32;
            upper[d] = x.ceil() as u32;
            frac[d] = x - x.floor();
        }

        // Multilinear interpolation over the 2^dims surrounding corners.
        let mut acc: Values = smallvec![0.0; self.range.len()];
        let mut coords: SmallVec<[u32; 4]> = smallvec![0; dims];

        for corner in 0..1u32 << dims {
            let mut weight = 1.0f32;

            for d in 0..dims {
                if corner >> d & 1 == 1 {
                    coords[d] = upper[d];
                    weight *= frac[d];
                } else {
                    coords[d] = lower[d];
                    weight *= 1.0 - frac[d];
                }
            }

            if weight == 0.0 {
                continue;
            }

            for (j, slot) in acc.iter_mut().enumerate() {
                *slot += weight * self.sample(&coords, j);
            }
        }

        // Map samples into the output range.
        let sample_max = if self.bits_per_sample == 32 {
            u32::MAX as f32
        } else {
            ((1u64 << self.bits_per_sample) - 1) as f32
        };

        let mut out: Values = smallvec![0.0; self.range.len()];

        for (j, slot) in out.iter_mut().enumerate() {
            let (d0, d1) = self.decode[j];
            *slot = interpolate(acc[j], 0.0, sample_max, d0, d1);
        }

        clamp_to(&mut out, &self.range);

        Some(out)
    }
}

/// Reads big-endian bit fields of 1 to 32 bits.
struct BitCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitCursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read(&mut self, bits: u8) -> Option<u32> {
        let mut out = 0u32;

        for _ in 0..bits {
            let byte = *self.data.get(self.pos / 8)?;
            out = out << 1 | u32::from(byte >> (7 - self.pos % 8) & 1);
            self.pos += 1;
        }

        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::function::Function;
    use crate::object::{ObjRef, Value};
    use crate::testutil::doc_with_object;

    fn function(body: &str) -> Function {
        let doc = doc_with_object(body);
        Function::new(&doc, &Value::Ref(ObjRef::new(3, 0))).unwrap()
    }

    #[test]
    fn linear_ramp_1d() {
        let f = function(
            "<</FunctionType 0/Domain [0 1]/Range [0 1]/Size [2]/BitsPerSample 8\
              /Filter /ASCIIHexDecode/Length 5>> stream\n00FF>\nendstream",
        );

        assert_eq!(f.eval(&[0.0]).unwrap().as_slice(), &[0.0]);
        assert_eq!(f.eval(&[1.0]).unwrap().as_slice(), &[1.0]);

        let mid = f.eval(&[0.5]).unwrap()[0];
        assert!((mid - 0.5).abs() < 1e-3, "{mid}");
    }

    #[test]
    fn bilinear_2d() {
        // Samples: (0,0) -> 0, (1,0) -> 255, (0,1) -> 255, (1,1) -> 255.
        let f = function(
            "<</FunctionType 0/Domain [0 1 0 1]/Range [0 1]/Size [2 2]/BitsPerSample 8\
              /Filter /ASCIIHexDecode/Length 9>> stream\n00FFFFFF>\nendstream",
        );

        assert_eq!(f.eval(&[0.0, 0.0]).unwrap().as_slice(), &[0.0]);
        assert_eq!(f.eval(&[1.0, 1.0]).unwrap().as_slice(), &[1.0]);

        let center = f.eval(&[0.5, 0.5]).unwrap()[0];
        assert!((center - 0.75).abs() < 1e-3, "{center}");
    }

    #[test]
    fn decode_maps_the_output() {
        let f = function(
            "<</FunctionType 0/Domain [0 1]/Range [0 1]/Decode [1 0]/Size [2]/BitsPerSample 8\
              /Filter /ASCIIHexDecode/Length 5>> stream\n00FF>\nendstream",
        );

        assert_eq!(f.eval(&[0.0]).unwrap().as_slice(), &[1.0]);
        assert_eq!(f.eval(&[1.0]).unwrap().as_slice(), &[0.0]);
    }

    #[test]
    fn sub_byte_samples() {
        // Four 2-bit samples: 0, 1, 2, 3 packed into one byte (0x1B).
        let f = function(
            "<</FunctionType 0/Domain [0 3]/Range [0 3]/Size [4]/BitsPerSample 2\
              /Filter /ASCIIHexDecode/Length 3>> stream\n1B>\nendstream",
        );

        for i in 0..4 {
            assert_eq!(f.eval(&[i as f32]).unwrap().as_slice(), &[i as f32]);
        }
    }
}
