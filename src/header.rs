use std::collections::hash_map::{self, HashMap};

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";

pub const APPLICATION_JSON: &str = "application/json";

/// Header multimap: case-sensitive field name to an ordered list of values.
///
/// A name present in the map always maps to at least one value. Order of the values under a
/// single name follows insertion order; order across names is unspecified.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct Headers(HashMap<String, Vec<String>>);

impl Headers {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` under `name`, keeping any values already present.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Replaces all values under `name` with the single `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), vec![value.into()]);
    }

    /// Returns the first value under `name`.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[inline]
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.0.get(name).map(Vec::as_slice)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Number of distinct field names.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> + '_ {
        self.0
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Adds every value of a raw (unsplit) header value under `name`.
    ///
    /// NOTE: values are split on every literal comma, so values that legitimately contain commas
    /// (quoted strings, `Date`) come out as several values. Quoting is intentionally not honored.
    pub(crate) fn add_raw(&mut self, name: &str, raw: &str) {
        let values = self.0.entry(name.trim().to_owned()).or_default();
        values.extend(split_values(raw).map(str::to_owned));
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = hash_map::Iter<'a, String, Vec<String>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut headers = Self::new();
        for (name, value) in iter {
            headers.add(name, value);
        }
        headers
    }
}

#[inline]
pub(crate) fn split_values(raw: &str) -> impl Iterator<Item = &str> {
    raw.trim().split(',').map(str::trim)
}
