//! Type 2: exponential interpolation.

use crate::document::Document;
use crate::function::{Intervals, Values, domain_of, range_of};
use crate::object::Array;
use crate::object::Dict;
use crate::object::dict::keys::{C0, C1, N};
use smallvec::{SmallVec, smallvec};

#[derive(Debug)]
pub(crate) struct Exponential {
    c0: SmallVec<[f32; 4]>,
    c1: SmallVec<[f32; 4]>,
    exponent: f32,
    domain: (f32, f32),
    range: Option<Intervals>,
}

impl Exponential {
    pub(crate) fn new(doc: &Document, dict: &Dict) -> Option<Self> {
        let c0 = match dict.get::<Array>(doc, C0) {
            Some(arr) => arr.iter_resolved::<f32>(doc).collect(),
            None => smallvec![0.0],
        };
        let c1 = match dict.get::<Array>(doc, C1) {
            Some(arr) => arr.iter_resolved::<f32>(doc).collect(),
            None => smallvec![1.0],
        };

        let exponent = dict.get::<f32>(doc, N)?;
        let domain = *domain_of(doc, dict)?.first()?;

        Some(Self {
            c0,
            c1,
            exponent,
            domain,
            range: range_of(doc, dict),
        })
    }

    pub(crate) fn eval(&self, input: f32) -> Values {
        let x = input.clamp(self.domain.0, self.domain.1);

        // A non-positive exponent has no sensible meaning here; treat it
        // as linear interpolation.
        let n = if self.exponent <= 0.0 {
            1.0
        } else {
            self.exponent
        };

        let mut out: Values = self
            .c0
            .iter()
            .zip(&self.c1)
            .map(|(c0, c1)| c0 + x.powf(n) * (c1 - c0))
            .collect();

        if let Some(range) = &self.range {
            super::clamp_to(&mut out, range);
        }

        out
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
    fn linear() {
        let f = function("<</FunctionType 2/Domain [0 1]/C0 [0 20]/C1 [30 -50]/N 1>>");

        assert_eq!(f.eval(&[0.0]).unwrap().as_slice(), &[0.0, 20.0]);
        assert_eq!(f.eval(&[0.5]).unwrap().as_slice(), &[15.0, -15.0]);
        assert_eq!(f.eval(&[1.0]).unwrap().as_slice(), &[30.0, -50.0]);
    }

    #[test]
    fn quadratic() {
        let f = function("<</FunctionType 2/Domain [0 1]/C0 [0]/C1 [30]/N 2>>");
        assert_eq!(f.eval(&[0.5]).unwrap().as_slice(), &[7.5]);
    }

    #[test]
    fn input_is_clamped_to_domain() {
        let f = function("<</FunctionType 2/Domain [0.2 0.8]/C0 [0]/C1 [30]/N 1>>");
        assert_eq!(f.eval(&[-10.0]), f.eval(&[0.2]));
        assert_eq!(f.eval(&[1.2]), f.eval(&[0.8]));
    }

    #[test]
    fn output_is_clamped_to_range() {
        let f = function("<</FunctionType 2/Domain [0 1]/Range [10 20]/C0 [0]/C1 [30]/N 1>>");
        assert_eq!(f.eval(&[0.0]).unwrap().as_slice(), &[10.0]);
        assert_eq!(f.eval(&[0.5]).unwrap().as_slice(), &[15.0]);
        assert_eq!(f.eval(&[1.0]).unwrap().as_slice(), &[20.0]);
    }

    #[test]
    fn non_positive_exponent_is_linear() {
        let f = function("<</FunctionType 2/Domain [0 1]/C0 [0]/C1 [10]/N 0>>");
        assert_eq!(f.eval(&[0.5]).unwrap().as_slice(), &[5.0]);
    }

    #[test]
    fn defaults_for_c0_and_c1() {
        let f = function("<</FunctionType 2/Domain [0 1]/N 1>>");
        assert_eq!(f.eval(&[0.25]).unwrap().as_slice(), &[0.25]);
    }
}
