//! Array objects.

use crate::document::Document;
use crate::object::{FromValue, Value};

/// An ordered sequence of PDF values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array(Vec<Value>);

impl Array {
    /// Create a new array.
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    /// The number of elements.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the array is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The element at `index`, unresolved.
    pub fn get_raw(&self, index: usize) -> Option<&Value> {
        self.0.get(index)
    }

    /// The element at `index`, resolved through the document and converted.
    pub fn get<T: FromValue>(&self, doc: &Document, index: usize) -> Option<T> {
        T::from_value(doc.resolve(self.0.get(index)?))
    }

    /// The element at `index`, converted without resolution.
    pub fn get_direct<T: FromValue>(&self, index: usize) -> Option<T> {
        T::from_value(self.0.get(index)?.clone())
    }

    /// Iterate over the raw elements.
    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.0.iter()
    }

    /// Iterate over elements resolved through the document and converted;
    /// elements that fail to convert are skipped.
    pub fn iter_resolved<'a, T: FromValue>(
        &'a self,
        doc: &'a Document,
    ) -> impl Iterator<Item = T> + 'a {
        self.0
            .iter()
            .filter_map(move |v| T::from_value(doc.resolve(v)))
    }

    /// A copy of the array with every element resolved through the document.
    pub fn resolved(&self, doc: &Document) -> Self {
        Self(self.0.iter().map(|v| doc.resolve(v)).collect())
    }
}

impl From<Vec<Value>> for Array {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

impl<'a> IntoIterator for &'a Array {
    type Item = &'a Value;
    type IntoIter = std::slice::Iter<'a, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::Array;
    use crate::object::Value;

    #[test]
    fn direct_access() {
        let arr = Array::from(vec![Value::Int(1), Value::Bool(true)]);
        assert_eq!(arr.get_direct::<i64>(0), Some(1));
        assert_eq!(arr.get_direct::<bool>(1), Some(true));
        assert_eq!(arr.get_direct::<i64>(2), None);
        assert_eq!(arr.get_direct::<bool>(0), None);
    }
}
