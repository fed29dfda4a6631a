use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::error::PdfResult;
use super::filters;

/// A PDF name. Equality between two `Name`s is over the raw, as-written
/// bytes (so `/A#20B` and `/A B` are distinct names, even though both
/// expand to `A B`); `#`-escape-insensitive matching is available through
/// [`Name::expanded_bytes`] and the `PartialEq<str>` impl below, which a
/// `Dictionary` key lookup goes through.
#[derive(Debug, Clone, Eq)]
pub struct Name {
    raw: Vec<u8>,
    expanded: Vec<u8>,
}

impl Name {
    /// Builds a `Name` from already-expanded bytes (the common case: the
    /// lexer expands `#xx` escapes while it scans, so `raw` and `expanded`
    /// usually coincide unless the caller explicitly supplies the original
    /// written form via [`Name::with_raw`]).
    pub fn new(expanded: impl Into<Vec<u8>>) -> Self {
        let expanded = expanded.into();
        Name {
            raw: expanded.clone(),
            expanded,
        }
    }

    /// Builds a `Name` remembering the exact `#`-escaped bytes as written,
    /// distinct from its expanded form.
    pub fn with_raw(raw: impl Into<Vec<u8>>, expanded: impl Into<Vec<u8>>) -> Self {
        Name {
            raw: raw.into(),
            expanded: expanded.into(),
        }
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw
    }

    pub fn expanded_bytes(&self) -> &[u8] {
        &self.expanded
    }

    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.expanded)
    }
}

impl PartialEq for Name {
    /// Name-to-name equality is over the raw, as-written bytes (so
    /// `/A#20B` and `/A B` are distinct names); only comparison against a
    /// plain `str` (see the `PartialEq<str>` impl below) goes through the
    /// `#`-expanded form.
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.expanded == other.as_bytes()
    }
}

impl std::hash::Hash for Name {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.expanded.hash(state);
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}", self.as_str())
    }
}

/// An ordered `Name -> Object` mapping. A value that is `Object::Null` is
/// equivalent to key absence for every lookup in this module, but is still
/// retained in `entries` for lossless inspection.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: Vec<(Name, Object)>,
    index: HashMap<Vec<u8>, usize>,
}

impl Dictionary {
    pub fn new() -> Self {
        Dictionary::default()
    }

    pub fn insert(&mut self, key: Name, value: Object) {
        let index_key = key.expanded_bytes().to_vec();
        if let Some(&i) = self.index.get(&index_key) {
            self.entries[i] = (key, value);
        } else {
            self.index.insert(index_key, self.entries.len());
            self.entries.push((key, value));
        }
    }

    /// Looks up `key`, treating an explicit `Null` value as absent.
    pub fn get(&self, key: &str) -> Option<&Object> {
        let i = *self.index.get(key.as_bytes())?;
        match &self.entries[i].1 {
            Object::Null => None,
            value => Some(value),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// All entries in insertion order, including explicit `Null` values.
    pub fn entries(&self) -> impl Iterator<Item = (&Name, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Numeric PDF value. Integer tokens keep their exact value; anything with a
/// fractional part or exponent becomes a `Real`. An integer literal outside
/// `i64` range also falls back to `Real` rather than losing the value.
#[derive(Debug, Clone, Copy)]
pub enum Numeric {
    Integer(i64),
    Real(f64),
}

impl Numeric {
    pub fn as_f64(&self) -> f64 {
        match self {
            Numeric::Integer(i) => *i as f64,
            Numeric::Real(r) => *r,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Numeric::Integer(i) => Some(*i),
            Numeric::Real(r) if r.fract() == 0.0 => Some(*r as i64),
            Numeric::Real(_) => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Numeric::Integer(_))
    }
}

impl PartialEq for Numeric {
    fn eq(&self, other: &Self) -> bool {
        self.as_f64() == other.as_f64()
    }
}

/// The eight PDF object kinds plus the `Null`, `Reference`, and `Indirect`
/// wrapper forms needed to express the file body.
#[derive(Debug, Clone)]
pub enum Object {
    Boolean(bool),
    Numeric(Numeric),
    LiteralString(Vec<u8>),
    HexString(Vec<u8>),
    Name(Name),
    Array(Vec<Object>),
    Dictionary(Dictionary),
    /// Dictionary, opaque raw payload, and a lazily-populated decoded-filter
    /// cache: the first call to [`Object::decoded_stream`] runs the
    /// `/Filter` chain and memoizes the result so repeat reads (e.g. a
    /// content stream inspected more than once) don't re-inflate. The cache
    /// is behind `Arc<Mutex<_>>` rather than a plain `RefCell` so `Object`
    /// (and the `Document` that holds millions of them) stays `Sync` and can
    /// be shared read-only across threads once construction is done.
    Stream(Dictionary, Vec<u8>, Arc<Mutex<Option<Vec<u8>>>>),
    Null,
    Reference { obj_no: u32, gen_no: u16 },
    Indirect {
        obj_no: u32,
        gen_no: u16,
        inner: Box<Object>,
    },
}

impl Object {
    /// `Null != Null` deliberately (see the `PartialEq` impl below); use
    /// this instead of a `== Object::Null` comparison.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    pub fn as_dict(&self) -> Option<&Dictionary> {
        match self {
            Object::Dictionary(d) => Some(d),
            Object::Stream(d, _, _) => Some(d),
            _ => None,
        }
    }

    /// Builds a `Stream` with an empty decoded-filter cache.
    pub fn new_stream(dict: Dictionary, raw: Vec<u8>) -> Object {
        Object::Stream(dict, raw, Arc::new(Mutex::new(None)))
    }

    /// Runs this stream's `/Filter` chain on first call and returns the
    /// decoded bytes; later calls return the cached result instead of
    /// re-running the filter pipeline. Fails if `self` is not a `Stream`.
    pub fn decoded_stream(&self) -> PdfResult<Vec<u8>> {
        match self {
            Object::Stream(dict, raw, cache) => {
                let mut cache = cache.lock().unwrap();
                if let Some(decoded) = cache.as_ref() {
                    return Ok(decoded.clone());
                }
                let decoded = filters::decode_stream(dict, raw)?;
                *cache = Some(decoded.clone());
                Ok(decoded)
            }
            _ => Err(super::error::PdfError::malformed_token(0, "stream object")),
        }
    }

    pub fn as_array(&self) -> Option<&[Object]> {
        match self {
            Object::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&Name> {
        match self {
            Object::Name(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<Numeric> {
        match self {
            Object::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<(u32, u16)> {
        match self {
            Object::Reference { obj_no, gen_no } => Some((*obj_no, *gen_no)),
            _ => None,
        }
    }

    /// Unwraps an `Indirect` envelope to its inner object; passes everything
    /// else through unchanged.
    pub fn into_inner(self) -> Object {
        match self {
            Object::Indirect { inner, .. } => *inner,
            other => other,
        }
    }

    pub fn inner(&self) -> &Object {
        match self {
            Object::Indirect { inner, .. } => inner,
            other => other,
        }
    }
}

/// `Object` deliberately does not derive `PartialEq`: a `Null` object is
/// never equal to anything, including itself, which requires hand-writing
/// this impl rather than deriving it.
impl PartialEq for Object {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Object::Null, _) | (_, Object::Null) => false,
            (Object::Boolean(a), Object::Boolean(b)) => a == b,
            (Object::Numeric(a), Object::Numeric(b)) => a == b,
            (Object::LiteralString(a), Object::LiteralString(b)) => a == b,
            (Object::HexString(a), Object::HexString(b)) => a == b,
            (Object::Name(a), Object::Name(b)) => a == b,
            (Object::Array(a), Object::Array(b)) => a == b,
            (
                Object::Reference { obj_no: a1, gen_no: a2 },
                Object::Reference { obj_no: b1, gen_no: b2 },
            ) => a1 == b1 && a2 == b2,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_equality_is_over_raw_bytes() {
        // Same expansion, different raw bytes as written: NOT equal as
        // `Name`s, even though both expand to `A B`.
        let a = Name::with_raw(b"A#20B".to_vec(), b"A B".to_vec());
        let b = Name::new(b"A B".to_vec());
        assert_ne!(a, b);
        assert_eq!(a.raw_bytes(), b"A#20B");
        assert_eq!(a.expanded_bytes(), b"A B");

        // Identical raw bytes: equal.
        let c = Name::with_raw(b"A#20B".to_vec(), b"A B".to_vec());
        assert_eq!(a, c);
    }

    #[test]
    fn test_name_str_comparison_uses_expanded_bytes() {
        // Comparing a `Name` against a plain `str` still goes through the
        // expanded form, so `#`-escaped and literal spellings both match a
        // lookup key written the expanded way.
        let a = Name::with_raw(b"A#20B".to_vec(), b"A B".to_vec());
        assert!(PartialEq::<str>::eq(&a, "A B"));
    }

    #[test]
    fn test_name_hash_matches_equality() {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let a = Name::with_raw(b"A#20B".to_vec(), b"A B".to_vec());
        let b = Name::new(b"A B".to_vec());

        let mut ha = DefaultHasher::new();
        a.hash(&mut ha);
        let mut hb = DefaultHasher::new();
        b.hash(&mut hb);
        assert_eq!(ha.finish(), hb.finish());
    }

    #[test]
    fn test_null_never_equal() {
        assert_ne!(Object::Null, Object::Null);
        assert!(Object::Null.is_null());
    }

    #[test]
    fn test_dictionary_null_is_absent() {
        let mut dict = Dictionary::new();
        dict.insert(Name::new(b"Foo".to_vec()), Object::Null);
        assert!(dict.get("Foo").is_none());
        assert_eq!(dict.len(), 1); // still retained for lossless inspection
    }

    #[test]
    fn test_dictionary_escape_key_lookup() {
        let mut dict = Dictionary::new();
        dict.insert(
            Name::with_raw(b"My#20Key".to_vec(), b"My Key".to_vec()),
            Object::Boolean(true),
        );
        assert_eq!(dict.get("My Key"), Some(&Object::Boolean(true)));
    }

    #[test]
    fn test_numeric_integer_preserved_exactly() {
        let n = Numeric::Integer(42);
        assert_eq!(n.as_i64(), Some(42));
        assert!(n.is_integer());
    }
}
