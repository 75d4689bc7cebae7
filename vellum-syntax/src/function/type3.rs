//! Type 3: stitching.

use crate::document::Document;
use crate::function::{Function, Intervals, Values, domain_of, interpolate, range_of, read_intervals};
use crate::object::Array;
use crate::object::Dict;
use crate::object::dict::keys::{BOUNDS, ENCODE, FUNCTIONS};

#[derive(Debug)]
pub(crate) struct Stitching {
    functions: Vec<Function>,
    bounds: Vec<f32>,
    encode: Intervals,
    domain: (f32, f32),
    range: Option<Intervals>,
}

impl Stitching {
    pub(crate) fn new(doc: &Document, dict: &Dict) -> Option<Self> {
        let domain = *domain_of(doc, dict)?.first()?;

        let functions: Vec<Function> = dict
            .get::<Array>(doc, FUNCTIONS)?
            .iter()
            .map(|v| Function::new(doc, v))
            .collect::<Option<_>>()?;

        let bounds: Vec<f32> = match dict.get::<Array>(doc, BOUNDS) {
            Some(arr) => arr.iter_resolved::<f32>(doc).collect(),
            None => vec![],
        };

        if bounds.len() + 1 != functions.len() {
            return None;
        }

        let encode = read_intervals(doc, &dict.get::<Array>(doc, ENCODE)?)?;

        Some(Self {
            functions,
            bounds,
            encode,
            domain,
            range: range_of(doc, dict),
        })
    }

    /// Select the subfunction whose interval contains `x`. Intervals are
    /// half-open except the last, which is closed on the right.
    fn select(&self, x: f32) -> usize {
        self.bounds.iter().position(|b| x < *b).unwrap_or(self.bounds.len())
    }

    pub(crate) fn eval(&self, input: f32) -> Option<Values> {
        let x = input.clamp(self.domain.0, self.domain.1);

        let k = self.select(x);

        let low = if k == 0 { self.domain.0 } else { self.bounds[k - 1] };
        let high = if k == self.bounds.len() {
            self.domain.1
        } else {
            self.bounds[k]
        };

        let (e0, e1) = *self.encode.get(k)?;
        let encoded = interpolate(x, low, high, e0, e1);

        let mut out = self.functions.get(k)?.eval(&[encoded])?;

        if let Some(range) = &self.range {
            super::clamp_to(&mut out, range);
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
    fn selects_by_bounds() {
        let f = function(
            "<</FunctionType 3/Domain [-7 7]
               /Functions [
                 <</FunctionType 2/Domain [0 1]/C0 [0.5 0.5 0.5]/C1 [0.5 0.5 0.5]/N 1>>
                 <</FunctionType 2/Domain [0 1]/C0 [0.7 0.7 0.7]/C1 [0.7 0.7 0.7]/N 1>>
               ]
               /Bounds [0]
               /Encode [0 1 0 1]>>",
        );

        assert_eq!(f.eval(&[-7.0]).unwrap().as_slice(), &[0.5, 0.5, 0.5]);
        assert_eq!(f.eval(&[-0.5]).unwrap().as_slice(), &[0.5, 0.5, 0.5]);
        assert_eq!(f.eval(&[0.0]).unwrap().as_slice(), &[0.7, 0.7, 0.7]);
        assert_eq!(f.eval(&[7.0]).unwrap().as_slice(), &[0.7, 0.7, 0.7]);
    }

    #[test]
    fn encode_remaps_the_local_domain() {
        // The second piece runs its subfunction backwards.
        let f = function(
            "<</FunctionType 3/Domain [0 1]
               /Functions [
                 <</FunctionType 2/Domain [0 1]/C0 [0]/C1 [1]/N 1>>
                 <</FunctionType 2/Domain [0 1]/C0 [0]/C1 [1]/N 1>>
               ]
               /Bounds [0.5]
               /Encode [0 1 1 0]>>",
        );

        assert_eq!(f.eval(&[0.25]).unwrap().as_slice(), &[0.5]);
        assert_eq!(f.eval(&[0.75]).unwrap().as_slice(), &[0.5]);
        assert_eq!(f.eval(&[1.0]).unwrap().as_slice(), &[0.0]);
    }
}
