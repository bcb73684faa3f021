use std::collections::{BTreeMap, btree_map};

use crate::error::{Error, Result};
use crate::mime::{is_quoted_string_safe, is_token};

/// An HTTP header multimap with case-insensitive names.
///
/// Names are normalized to lowercase. Each name maps to the values
/// appended to it, in append order; [`get`](Headers::get) joins them
/// with `", "`. Iteration is in lexicographic name order regardless of
/// insertion order.
///
/// Every mutation validates before writing, so a rejected name or value
/// never leaves the store partially updated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: BTreeMap<String, Vec<String>>,
}

/// The accepted shapes for building a [`Headers`].
#[derive(Debug, Clone)]
pub enum HeadersInit {
    /// Deep copy of an existing store.
    Headers(Headers),
    /// Name/value pairs, each applied with `append`. Every inner sequence
    /// must have exactly two elements.
    Pairs(Vec<Vec<String>>),
    /// A name → value record, each applied with `set`.
    Record(Vec<(String, String)>),
}

fn prepare_name(name: &str) -> Result<String> {
    let name = name.to_ascii_lowercase();
    if name.is_empty() || !is_token(&name) {
        return Err(Error::InvalidHeaderName(name));
    }
    Ok(name)
}

fn prepare_header(name: &str, value: &str) -> Result<(String, String)> {
    let name = prepare_name(name)?;
    let value = value.trim();
    if !is_quoted_string_safe(value) {
        return Err(Error::InvalidHeaderValue {
            name,
            value: value.to_string(),
        });
    }
    Ok((name, value.to_string()))
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from any of the [`HeadersInit`] shapes. The first
    /// invalid entry aborts construction.
    pub fn from_init(init: HeadersInit) -> Result<Self> {
        match init {
            HeadersInit::Headers(headers) => Ok(headers),
            HeadersInit::Pairs(pairs) => {
                let mut headers = Headers::new();
                for pair in pairs {
                    let [name, value] = <[String; 2]>::try_from(pair).map_err(|_| {
                        Error::InvalidHeaderInit("Each header pair must be a name/value tuple")
                    })?;
                    headers.append(&name, &value)?;
                }
                Ok(headers)
            }
            HeadersInit::Record(record) => {
                let mut headers = Headers::new();
                for (name, value) in record {
                    headers.set(&name, &value)?;
                }
                Ok(headers)
            }
        }
    }

    /// Build a store from name/value pairs, applying each with `append`.
    pub fn try_from_pairs<I, N, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut headers = Headers::new();
        for (name, value) in pairs {
            headers.append(name.as_ref(), value.as_ref())?;
        }
        Ok(headers)
    }

    pub fn append(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = prepare_header(name, value)?;
        self.entries.entry(name).or_default().push(value);
        Ok(())
    }

    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let (name, value) = prepare_header(name, value)?;
        self.entries.insert(name, vec![value]);
        Ok(())
    }

    /// All values for `name` joined with `", "`, or `None` if absent.
    pub fn get(&self, name: &str) -> Result<Option<String>> {
        let name = prepare_name(name)?;
        Ok(self.entries.get(&name).map(|values| values.join(", ")))
    }

    pub fn has(&self, name: &str) -> Result<bool> {
        let name = prepare_name(name)?;
        Ok(self.entries.contains_key(&name))
    }

    pub fn delete(&mut self, name: &str) -> Result<()> {
        let name = prepare_name(name)?;
        self.entries.remove(&name);
        Ok(())
    }

    /// The individual `set-cookie` values, which must not be joined.
    pub fn get_set_cookie(&self) -> Vec<String> {
        self.entries.get("set-cookie").cloned().unwrap_or_default()
    }

    /// Normalized names in lexicographic order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<String> {
        self.entries.values().map(|values| values.join(", ")).collect()
    }

    /// `(name, joined value)` pairs in key order.
    pub fn entries(&self) -> Vec<(String, String)> {
        self.iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect()
    }

    pub fn iter(&self) -> Iter<'_> {
        self.into_iter()
    }

    /// A deep copy of the underlying multimap.
    pub fn raw(&self) -> BTreeMap<String, Vec<String>> {
        self.entries.clone()
    }

    /// The unjoined values stored for a normalized name.
    pub(crate) fn raw_values(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Iterator over `(name, joined value)` pairs in key order.
pub type Iter<'a> = std::iter::Map<
    btree_map::Iter<'a, String, Vec<String>>,
    fn((&'a String, &'a Vec<String>)) -> (&'a str, String),
>;

fn joined<'a>((name, values): (&'a String, &'a Vec<String>)) -> (&'a str, String) {
    (name.as_str(), values.join(", "))
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, String);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.entries.iter().map(joined as fn(_) -> _)
    }
}

impl From<Headers> for HeadersInit {
    fn from(headers: Headers) -> Self {
        HeadersInit::Headers(headers)
    }
}

impl From<Vec<(String, String)>> for HeadersInit {
    fn from(record: Vec<(String, String)>) -> Self {
        HeadersInit::Record(record)
    }
}

impl From<Vec<Vec<String>>> for HeadersInit {
    fn from(pairs: Vec<Vec<String>>) -> Self {
        HeadersInit::Pairs(pairs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_get() {
        let mut headers = Headers::new();
        headers.append("Content-Type", "text/html").unwrap();
        assert_eq!(headers.get("content-type").unwrap().as_deref(), Some("text/html"));
        assert_eq!(headers.get("CONTENT-TYPE").unwrap().as_deref(), Some("text/html"));
    }

    #[test]
    fn append_twice_joins_values() {
        let mut headers = Headers::new();
        headers.append("Accept", "text/html").unwrap();
        headers.append("accept", "application/json").unwrap();
        assert_eq!(
            headers.get("Accept").unwrap().as_deref(),
            Some("text/html, application/json")
        );
    }

    #[test]
    fn names_differing_in_case_share_a_key() {
        let mut headers = Headers::new();
        headers.set("content-type", "a/b").unwrap();
        assert!(headers.has("Content-Type").unwrap());
        assert_eq!(headers.has("Content-Type").unwrap(), headers.has("content-type").unwrap());
        headers.set("CONTENT-TYPE", "c/d").unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("content-type").unwrap().as_deref(), Some("c/d"));
    }

    #[test]
    fn set_replaces_all_values() {
        let mut headers = Headers::new();
        headers.append("X-A", "1").unwrap();
        headers.append("X-A", "2").unwrap();
        headers.set("x-a", "3").unwrap();
        assert_eq!(headers.get("x-a").unwrap().as_deref(), Some("3"));
    }

    #[test]
    fn values_are_trimmed() {
        let mut headers = Headers::new();
        headers.append("X-Pad", "  padded \t").unwrap();
        assert_eq!(headers.get("x-pad").unwrap().as_deref(), Some("padded"));
    }

    #[test]
    fn get_missing_is_none() {
        let headers = Headers::new();
        assert_eq!(headers.get("x-missing").unwrap(), None);
        assert!(!headers.has("x-missing").unwrap());
    }

    #[test]
    fn invalid_name_is_rejected_without_mutation() {
        let mut headers = Headers::new();
        headers.append("x-ok", "1").unwrap();
        assert!(matches!(
            headers.append("bad name", "v"),
            Err(Error::InvalidHeaderName(_))
        ));
        assert!(headers.append("", "v").is_err());
        assert!(headers.set("x:colon", "v").is_err());
        assert_eq!(headers.keys(), vec!["x-ok"]);
    }

    #[test]
    fn invalid_value_is_rejected_without_mutation() {
        let mut headers = Headers::new();
        headers.append("x-a", "1").unwrap();
        assert!(matches!(
            headers.append("x-a", "line\nbreak"),
            Err(Error::InvalidHeaderValue { .. })
        ));
        assert!(headers.set("x-a", "nul\0").is_err());
        assert_eq!(headers.get("x-a").unwrap().as_deref(), Some("1"));
    }

    #[test]
    fn keys_are_sorted() {
        let mut headers = Headers::new();
        headers.append("Zeta", "1").unwrap();
        headers.append("alpha", "2").unwrap();
        headers.append("Mid", "3").unwrap();
        assert_eq!(headers.keys(), vec!["alpha", "mid", "zeta"]);
        assert_eq!(headers.values(), vec!["2", "3", "1"]);
        assert_eq!(
            headers.entries(),
            vec![
                ("alpha".to_string(), "2".to_string()),
                ("mid".to_string(), "3".to_string()),
                ("zeta".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn iterates_by_reference() {
        let mut headers = Headers::new();
        headers.append("b", "2").unwrap();
        headers.append("a", "1").unwrap();
        headers.append("a", "3").unwrap();
        let mut seen = Vec::new();
        for (name, value) in &headers {
            seen.push(format!("{name}={value}"));
        }
        assert_eq!(seen, vec!["a=1, 3", "b=2"]);
    }

    #[test]
    fn delete_is_name_normalized() {
        let mut headers = Headers::new();
        headers.append("X-Gone", "1").unwrap();
        headers.delete("x-GONE").unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn set_cookie_values_stay_separate() {
        let mut headers = Headers::new();
        headers.append("Set-Cookie", "a=1").unwrap();
        headers.append("Set-Cookie", "b=2").unwrap();
        assert_eq!(headers.get_set_cookie(), vec!["a=1", "b=2"]);
        assert_eq!(headers.get("set-cookie").unwrap().as_deref(), Some("a=1, b=2"));
        assert!(Headers::new().get_set_cookie().is_empty());
    }

    #[test]
    fn from_pairs_appends() {
        let headers = Headers::from_init(HeadersInit::Pairs(vec![
            vec!["Accept".into(), "a".into()],
            vec!["accept".into(), "b".into()],
        ]))
        .unwrap();
        assert_eq!(headers.get("accept").unwrap().as_deref(), Some("a, b"));
    }

    #[test]
    fn from_pairs_rejects_non_tuples() {
        let err = Headers::from_init(HeadersInit::Pairs(vec![vec![
            "a".into(),
            "b".into(),
            "c".into(),
        ]]))
        .unwrap_err();
        assert_eq!(err.to_string(), "Each header pair must be a name/value tuple");
        assert!(Headers::from_init(HeadersInit::Pairs(vec![vec!["solo".into()]])).is_err());
    }

    #[test]
    fn from_record_sets() {
        let headers = Headers::from_init(HeadersInit::Record(vec![
            ("X-A".into(), "1".into()),
            ("x-a".into(), "2".into()),
        ]))
        .unwrap();
        assert_eq!(headers.get("x-a").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn bulk_construction_aborts_on_first_invalid_entry() {
        let result = Headers::try_from_pairs([("x-a", "1"), ("bad name", "2"), ("x-c", "3")]);
        assert!(result.is_err());
    }

    #[test]
    fn copy_is_deep() {
        let mut original = Headers::new();
        original.append("x-a", "1").unwrap();
        let mut copy = Headers::from_init(original.clone().into()).unwrap();
        copy.append("x-a", "2").unwrap();
        assert_eq!(original.get("x-a").unwrap().as_deref(), Some("1"));
        assert_eq!(copy.raw()["x-a"], vec!["1", "2"]);
    }
}
