//! PDF functions.
//!
//! Functions map a small number of input values to a small number of
//! output values. They drive tint transforms, shadings and transfer
//! curves.

mod type0;
mod type2;
mod type3;

use crate::document::Document;
use crate::function::type0::Sampled;
use crate::function::type2::Exponential;
use crate::function::type3::Stitching;
use crate::object::dict::keys::{DOMAIN, FUNCTION_TYPE, RANGE};
use crate::object::{Array, Dict, Value};
use log::warn;
use smallvec::SmallVec;
use std::sync::Arc;

/// The input/output values of a function.
pub type Values = SmallVec<[f32; 4]>;

/// A list of (min, max) pairs.
pub(crate) type Intervals = SmallVec<[(f32, f32); 4]>;

#[derive(Debug)]
enum Kind {
    Sampled(Sampled),
    Exponential(Exponential),
    Stitching(Stitching),
}

/// A PDF function.
#[derive(Debug, Clone)]
pub struct Function(Arc<Kind>);

impl Function {
    /// Build a function from a (possibly indirect) dictionary or stream.
    pub fn new(doc: &Document, value: &Value) -> Option<Self> {
        let resolved = doc.resolve(value);

        let (dict, stream) = match &resolved {
            Value::Dict(d) => (d, None),
            Value::Stream(s) => (&s.dict, Some(s)),
            _ => return None,
        };

        let kind = match dict.get::<u8>(doc, FUNCTION_TYPE)? {
            0 => Kind::Sampled(Sampled::new(doc, stream?)?),
            2 => Kind::Exponential(Exponential::new(doc, dict)?),
            3 => Kind::Stitching(Stitching::new(doc, dict)?),
            other => {
                warn!("unsupported function type {other}");

                return None;
            }
        };

        Some(Self(Arc::new(kind)))
    }

    /// Evaluate the function.
    pub fn eval(&self, input: &[f32]) -> Option<Values> {
        match self.0.as_ref() {
            Kind::Sampled(f) => f.eval(input),
            Kind::Exponential(f) => Some(f.eval(*input.first()?)),
            Kind::Stitching(f) => f.eval(*input.first()?),
        }
    }
}

/// Read an array of 2n numbers as n (min, max) pairs.
pub(crate) fn read_intervals(doc: &Document, arr: &Array) -> Option<Intervals> {
    let nums: Vec<f32> = arr.iter_resolved::<f32>(doc).collect();

    if nums.len() % 2 != 0 {
        return None;
    }

    Some(nums.chunks_exact(2).map(|c| (c[0], c[1])).collect())
}

pub(crate) fn domain_of(doc: &Document, dict: &Dict) -> Option<Intervals> {
    read_intervals(doc, &dict.get::<Array>(doc, DOMAIN)?)
}

pub(crate) fn range_of(doc: &Document, dict: &Dict) -> Option<Intervals> {
    read_intervals(doc, &dict.get::<Array>(doc, RANGE)?)
}

pub(crate) fn clamp_to(values: &mut [f32], intervals: &Intervals) {
    for ((min, max), v) in intervals.iter().zip(values.iter_mut()) {
        *v = v.clamp(*min, *max);
    }
}

/// Linearly map `x` from the range `(x_min, x_max)` to `(y_min, y_max)`.
pub(crate) fn interpolate(x: f32, x_min: f32, x_max: f32, y_min: f32, y_max: f32) -> f32 {
    if x_max == x_min {
        return y_min;
    }

    y_min + (x - x_min) * (y_max - y_min) / (x_max - x_min)
}
