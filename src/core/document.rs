//! Orchestrates header parsing, cross-reference chain traversal, eager object
//! materialization, and indirect-reference dereferencing.
//!
//! `Document` is the only owner of `Indirect` objects: a `Reference` carries
//! no data of its own and is resolved back through the `Document` that
//! produced it, which keeps the object graph acyclic even when the file
//! itself contains cycles of `N G R` tokens.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use log::{debug, trace, warn};
use lru::LruCache;
use rustc_hash::FxHashMap;

/// `cache_capacity` default when the caller leaves it unset.
const DEFAULT_RESOLVED_CACHE_CAPACITY: usize = 256;

use super::cursor::ByteCursor;
use super::error::{PdfError, PdfResult};
use super::lexer;
use super::object::{Dictionary, Object};
use super::objstm;
use super::parser::ObjectParser;
use super::xref::{self, XRefEntry, XRefSection};

/// Construction-time configuration, the ambient equivalent of a config layer
/// for a core with no external config files.
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// When `true` (the default), a failure materializing any single in-use
    /// object aborts construction. When `false`, the failing object is
    /// logged and treated as absent, and construction continues.
    pub strict: bool,
    /// Capacity of the read-side LRU cache in front of `get_obj`. Defaults
    /// to 256 entries when unset; every in-use object is eagerly
    /// materialized during construction regardless, so this only bounds how
    /// many resolved `(obj_no, gen_no)` pairs stay warm for repeat lookups.
    pub cache_capacity: Option<usize>,
}

impl Default for OpenOptions {
    fn default() -> Self {
        OpenOptions {
            strict: true,
            cache_capacity: None,
        }
    }
}

/// A construction progress snapshot, polled by a host UI through a
/// [`ProgressHandle`] while `Document::open_with_progress` runs on a worker
/// thread.
#[derive(Debug, Clone)]
pub struct Progress {
    pub status: String,
    pub fraction: f32,
}

impl Default for Progress {
    fn default() -> Self {
        Progress {
            status: "starting".to_string(),
            fraction: 0.0,
        }
    }
}

/// Mutex-guarded status/fraction slot a host polls during construction. The
/// mutex protects exactly this one status string and fraction, matching the
/// narrow critical section the concurrency model calls for.
pub type ProgressHandle = Arc<Mutex<Progress>>;

fn report(progress: &Option<ProgressHandle>, status: impl Into<String>, fraction: f32) {
    if let Some(handle) = progress {
        if let Ok(mut guard) = handle.lock() {
            guard.status = status.into();
            guard.fraction = fraction;
        }
    }
}

/// One (body + xref + trailer + EOF) cycle. A document is an ordered chain
/// of increments, oldest first; a later increment's `Prev` points at the
/// preceding increment's xref offset.
#[derive(Debug, Clone)]
pub struct Increment {
    pub startxref: usize,
    pub xref: XRefSection,
    pub trailer: Dictionary,
    /// Whether this increment's xref/trailer was immediately followed by a
    /// `startxref\n<offset>\n%%EOF` suffix. An increment without a confirmed
    /// EOF is skipped during dereference (see [`Document::get_obj`]) rather
    /// than treated as authoritative.
    pub eof_seen: bool,
}

impl Increment {
    /// In-use, free, and compressed entry counts across every subsection,
    /// in that order. Used by the CLI's `xref` subcommand.
    pub fn entry_counts(&self) -> (usize, usize, usize) {
        let mut in_use = 0;
        let mut free = 0;
        let mut compressed = 0;
        for sub in &self.xref.subsections {
            for entry in &sub.entries {
                match entry {
                    XRefEntry::InUse { .. } => in_use += 1,
                    XRefEntry::Free { .. } => free += 1,
                    XRefEntry::Compressed { .. } => compressed += 1,
                }
            }
        }
        (in_use, free, compressed)
    }
}

/// A parsed and eagerly-materialized PDF document.
///
/// Construction performs the whole ingest pipeline up front: header parse,
/// xref chain walk, in-use object materialization, and object-stream
/// decoding. Every public query after that is read-only and
/// side-effect-free with respect to the underlying tables.
pub struct Document {
    version: (u32, u32),
    bytes: ByteCursor,
    /// Oldest to newest.
    increments: Vec<Increment>,
    /// Keyed by the byte offset the xref table named, not by (obj_no,
    /// gen_no): several increments can claim the same object number at
    /// different offsets across revisions.
    offset_obj: FxHashMap<usize, Object>,
    compressed_obj: FxHashMap<(u32, u32), Object>,
    /// Read-side cache in front of `get_obj`. Every in-use object is already
    /// eagerly materialized into `offset_obj`/`compressed_obj` during
    /// construction, so this never needs a miss-fill path beyond the first
    /// touch of a given `(obj_no, gen_no)` pair, it exists purely to skip
    /// the increment-chain walk on repeated lookups during page-tree walks.
    resolved_cache: Mutex<LruCache<(u32, u16), Object>>,
    ready: bool,
}

impl Document {
    /// Opens a document from an in-memory buffer with default options and no
    /// progress reporting.
    pub fn open(bytes: Vec<u8>) -> PdfResult<Document> {
        Document::open_with_progress(bytes, OpenOptions::default(), None)
    }

    /// Opens a document from an in-memory buffer with explicit options.
    pub fn open_with_options(bytes: Vec<u8>, options: OpenOptions) -> PdfResult<Document> {
        Document::open_with_progress(bytes, options, None)
    }

    /// Opens a document, reading the whole file into memory first.
    pub fn from_path(
        path: impl AsRef<std::path::Path>,
        options: OpenOptions,
    ) -> PdfResult<Document> {
        let bytes = std::fs::read(path)?;
        Document::open_with_options(bytes, options)
    }

    /// Opens a document, reporting construction progress through `progress`
    /// if supplied. `Document::open` is a thin wrapper around this that
    /// constructs a throwaway handle nobody reads.
    pub fn open_with_progress(
        bytes: Vec<u8>,
        options: OpenOptions,
        progress: Option<ProgressHandle>,
    ) -> PdfResult<Document> {
        let cursor = ByteCursor::from_bytes(bytes);

        report(&progress, "0% processed", 0.0);

        let version = parse_header(&cursor)?;
        debug!("parsed header: PDF-{}.{}", version.0, version.1);

        let primary_offset = locate_primary_xref_offset(&cursor)?;
        trace!("primary xref offset at {primary_offset}");

        let increments = build_increments(&cursor, primary_offset)?;
        debug!("xref chain depth: {}", increments.len());

        let cache_capacity = options
            .cache_capacity
            .unwrap_or(DEFAULT_RESOLVED_CACHE_CAPACITY)
            .max(1);

        let mut doc = Document {
            version,
            bytes: cursor,
            increments,
            offset_obj: FxHashMap::default(),
            compressed_obj: FxHashMap::default(),
            resolved_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(cache_capacity).expect("clamped to at least 1 above"),
            )),
            ready: false,
        };

        doc.materialize_in_use(options.strict, &progress)?;
        debug!("materialized {} in-use objects", doc.offset_obj.len());

        report(&progress, "Decoding object streams...", 0.9);
        doc.decode_object_streams()?;
        debug!("decoded {} compressed objects", doc.compressed_obj.len());

        doc.ready = true;
        report(&progress, "100% processed", 1.0);
        report(&progress, "Done", 1.0);

        Ok(doc)
    }

    pub fn version(&self) -> (u32, u32) {
        self.version
    }

    pub fn increments(&self) -> &[Increment] {
        &self.increments
    }

    pub fn object_count(&self) -> usize {
        self.offset_obj.len() + self.compressed_obj.len()
    }

    fn materialize_in_use(
        &mut self,
        strict: bool,
        progress: &Option<ProgressHandle>,
    ) -> PdfResult<()> {
        let mut targets: Vec<(usize, u32, u16)> = Vec::new();
        for inc in &self.increments {
            for sub in &inc.xref.subsections {
                for (i, entry) in sub.entries.iter().enumerate() {
                    if let XRefEntry::InUse { offset, gen_no } = entry {
                        let obj_no = sub.first_obj_no + i as u32;
                        targets.push((*offset, obj_no, *gen_no));
                    }
                }
            }
        }

        let total = targets.len().max(1);
        for (i, (offset, obj_no, gen_no)) in targets.into_iter().enumerate() {
            if self.offset_obj.contains_key(&offset) {
                continue;
            }
            match materialize_one(&self.increments, &self.bytes, offset, obj_no, gen_no) {
                Ok(obj) => {
                    self.offset_obj.insert(offset, obj);
                }
                Err(e) if !strict => {
                    warn!("skipping object {obj_no} {gen_no} at offset {offset}: {e}");
                }
                Err(e) => return Err(e),
            }
            let pct = ((i + 1) * 100 / total) as u32;
            report(progress, format!("{pct}% processed"), (i + 1) as f32 / total as f32 * 0.9);
        }
        Ok(())
    }

    fn decode_object_streams(&mut self) -> PdfResult<()> {
        let mut found: Vec<((u32, u32), Object)> = Vec::new();
        for obj in self.offset_obj.values() {
            if let Object::Indirect { obj_no, inner, .. } = obj {
                if let Object::Stream(dict, ..) = inner.as_ref() {
                    if name_is(dict, "Type", "ObjStm") {
                        let decoded = inner.decoded_stream()?;
                        let items = objstm::decode_objstm(*obj_no, dict, &decoded)?;
                        for item in items {
                            found.push(((item.container_obj_no, item.index as u32), item.object));
                        }
                    }
                }
            }
        }
        for (key, value) in found {
            self.compressed_obj.insert(key, value);
        }
        Ok(())
    }

    /// Resolves `(obj_no, gen_no)` to its logical value (the `Indirect`
    /// envelope stripped away). Walks increments newest-to-oldest,
    /// considering only those with a confirmed `eof_seen`; the first one
    /// whose xref section names this object wins.
    pub fn get_obj(&self, obj_no: u32, gen_no: u16) -> PdfResult<Object> {
        if !self.ready {
            return Err(PdfError::NotReady);
        }
        let key = (obj_no, gen_no);
        if let Some(cached) = self.resolved_cache.lock().unwrap().get(&key) {
            return Ok(cached.clone());
        }
        let resolved = self.get_obj_uncached(obj_no, gen_no)?;
        self.resolved_cache.lock().unwrap().put(key, resolved.clone());
        Ok(resolved)
    }

    fn get_obj_uncached(&self, obj_no: u32, gen_no: u16) -> PdfResult<Object> {
        for inc in self.increments.iter().rev() {
            if !inc.eof_seen {
                continue;
            }
            let entry = match inc.xref.lookup(obj_no) {
                Some(e) => e,
                None => continue,
            };
            if entry.gen_no() != gen_no {
                continue;
            }
            return match entry {
                XRefEntry::Free { .. } => Ok(Object::Null),
                XRefEntry::InUse { offset, .. } => self
                    .offset_obj
                    .get(offset)
                    .cloned()
                    .map(Object::into_inner)
                    .ok_or(PdfError::ObjectNotFound { obj_no, gen_no }),
                XRefEntry::Compressed {
                    container_obj_no,
                    index,
                } => self
                    .compressed_obj
                    .get(&(*container_obj_no, *index))
                    .cloned()
                    .map(Object::into_inner)
                    .ok_or(PdfError::ObjectNotFound { obj_no, gen_no }),
            };
        }
        Err(PdfError::ObjectNotFound { obj_no, gen_no })
    }

    /// Resolves `obj` one hop if it is a `Reference`; otherwise clones it.
    pub fn resolve(&self, obj: &Object) -> PdfResult<Object> {
        match obj {
            Object::Reference { obj_no, gen_no } => self.get_obj(*obj_no, *gen_no),
            other => Ok(other.clone()),
        }
    }

    /// Returns the trailer dictionary for the `increment`-th increment
    /// (negative indices count from the newest, `-1` being the latest).
    pub fn get_trailer(&self, increment: i32) -> PdfResult<Dictionary> {
        if !self.ready {
            return Err(PdfError::NotReady);
        }
        let len = self.increments.len() as i32;
        let idx = if increment < 0 { len + increment } else { increment };
        if idx < 0 || idx >= len {
            return Err(PdfError::invalid_xref(0, "increment index out of range"));
        }
        Ok(self.increments[idx as usize].trailer.clone())
    }

    /// Resolves the document catalog (`trailer['Root']`) for `increment`.
    pub fn get_catalog(&self, increment: i32) -> PdfResult<Dictionary> {
        let trailer = self.get_trailer(increment)?;
        let root = trailer
            .get("Root")
            .ok_or_else(|| PdfError::missing_required_entry("trailer", "Root"))?;
        let resolved = self.resolve(root)?;
        resolved
            .as_dict()
            .cloned()
            .ok_or_else(|| PdfError::malformed_token(0, "/Root must resolve to a dictionary"))
    }

    /// Traverses the page tree rooted at `catalog['Pages']`, returning the
    /// `index`-th page's dictionary (0-based). Uses the running `Count`
    /// totals to skip whole subtrees rather than visiting every leaf.
    pub fn get_page_dict(&self, index: usize, increment: i32) -> PdfResult<Dictionary> {
        let catalog = self.get_catalog(increment)?;
        let pages_obj = catalog
            .get("Pages")
            .ok_or_else(|| PdfError::missing_required_entry("catalog", "Pages"))?;
        let root = self.resolve(pages_obj)?;

        let mut stack = vec![root];
        let mut counter = 0usize;

        while let Some(node) = stack.pop() {
            let resolved = self.resolve(&node)?;
            let dict = resolved
                .as_dict()
                .cloned()
                .ok_or_else(|| PdfError::malformed_token(0, "page-tree node must be a dictionary"))?;

            if name_is(&dict, "Type", "Pages") {
                let count = dict
                    .get("Count")
                    .and_then(|o| o.as_numeric())
                    .and_then(|n| n.as_i64())
                    .unwrap_or(0)
                    .max(0) as usize;

                if counter + count > index {
                    let kids = dict
                        .get("Kids")
                        .ok_or_else(|| PdfError::missing_required_entry("Pages", "Kids"))?;
                    let kids_resolved = self.resolve(kids)?;
                    let items = kids_resolved
                        .as_array()
                        .ok_or_else(|| PdfError::malformed_token(0, "/Kids must be an array"))?;
                    for kid in items.iter().rev() {
                        stack.push(kid.clone());
                    }
                } else {
                    counter += count;
                }
            } else if name_is(&dict, "Type", "Page") {
                if counter == index {
                    return Ok(dict);
                }
                counter += 1;
            } else {
                return Err(PdfError::malformed_token(
                    0,
                    "page-tree node /Type must be /Pages or /Page",
                ));
            }
        }

        Err(PdfError::ObjectNotFound {
            obj_no: index as u32,
            gen_no: 0,
        })
    }

    /// Every page dictionary in document order, for `increment`.
    pub fn get_all_page_dicts(&self, increment: i32) -> PdfResult<Vec<Dictionary>> {
        let catalog = self.get_catalog(increment)?;
        let pages_obj = catalog
            .get("Pages")
            .ok_or_else(|| PdfError::missing_required_entry("catalog", "Pages"))?;
        let root = self.resolve(pages_obj)?;
        let count = root
            .as_dict()
            .and_then(|d| d.get("Count"))
            .and_then(|o| o.as_numeric())
            .and_then(|n| n.as_i64())
            .unwrap_or(0)
            .max(0) as usize;

        (0..count).map(|i| self.get_page_dict(i, increment)).collect()
    }
}

fn name_is(dict: &Dictionary, key: &str, expected: &str) -> bool {
    matches!(dict.get(key), Some(Object::Name(n)) if n.expanded_bytes() == expected.as_bytes())
}

/// Reads the first line and matches `%PDF-(\d+)\.(\d+)`.
fn parse_header(bytes: &ByteCursor) -> PdfResult<(u32, u32)> {
    let mut cursor = bytes.clone();
    cursor.seek_set(0);
    let line = lexer::read_until(&mut cursor, &lexer::eol_patterns()).prefix;
    let text = std::str::from_utf8(&line).map_err(|_| PdfError::NotAPdf)?;
    let rest = text.strip_prefix("%PDF-").ok_or(PdfError::NotAPdf)?;
    let (major_str, minor_str) = rest.split_once('.').ok_or(PdfError::NotAPdf)?;
    let major: u32 = major_str.trim().parse().map_err(|_| PdfError::NotAPdf)?;
    let minor: u32 = minor_str.trim().parse().map_err(|_| PdfError::NotAPdf)?;
    Ok((major, minor))
}

fn trim_ascii_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| !lexer::is_whitespace(*b)).unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !lexer::is_whitespace(*b))
        .map(|p| p + 1)
        .unwrap_or(0);
    if start >= end {
        &[]
    } else {
        &bytes[start..end]
    }
}

/// Reverse-iterates lines to find the last `%%EOF`, the `startxref` two
/// lines before it, and the byte offset on the line between them.
fn locate_primary_xref_offset(bytes: &ByteCursor) -> PdfResult<usize> {
    let mut seen_eof = false;
    let mut pending_offset: Option<Vec<u8>> = None;

    for line in bytes.rlines(None) {
        let trimmed = trim_ascii_whitespace(line);
        if !seen_eof {
            if trimmed == b"%%EOF" {
                seen_eof = true;
            }
            continue;
        }
        if pending_offset.is_none() {
            pending_offset = Some(trimmed.to_vec());
            continue;
        }
        if trimmed == b"startxref" {
            let offset_line = pending_offset.take().unwrap();
            let text = std::str::from_utf8(&offset_line)
                .map_err(|_| PdfError::invalid_xref(0, "non-utf8 startxref offset"))?;
            return text
                .trim()
                .parse()
                .map_err(|_| PdfError::invalid_xref(0, "malformed startxref offset"));
        }
        return Err(PdfError::invalid_xref(
            0,
            "startxref does not immediately precede the offset before the final %%EOF",
        ));
    }

    Err(PdfError::invalid_xref(0, "no startxref/%%EOF trailer found"))
}

/// Parses one xref section, classic or stream-based, at `offset`, and
/// reports whether a `startxref\n<offset>\n%%EOF` suffix immediately
/// follows it.
fn parse_xref_at(bytes: &ByteCursor, offset: usize) -> PdfResult<(XRefSection, bool)> {
    let mut cursor = bytes.clone();
    cursor.seek_set(offset);
    lexer::skip_whitespace_and_comments(&mut cursor)?;

    if cursor.peek_at_least(4) == b"xref" {
        let section = xref::parse_classic_section(&mut cursor)?;
        let eof_seen = confirm_eof_follows(&cursor);
        return Ok((section, eof_seen));
    }

    let parser = ObjectParser::new();
    let obj = parser.parse_indirect_at(&mut cursor)?;
    let (dict, raw) = match obj {
        Object::Indirect { inner, .. } => match *inner {
            Object::Stream(dict, raw, _) => (dict, raw),
            _ => return Err(PdfError::invalid_xref(offset, "xref entry is not a stream")),
        },
        _ => return Err(PdfError::invalid_xref(offset, "xref entry is not an indirect object")),
    };
    if !name_is(&dict, "Type", "XRef") {
        return Err(PdfError::missing_required_entry("XRef", "Type"));
    }
    let decoded = super::filters::decode_stream(&dict, &raw)?;
    let section = xref::parse_xref_stream(&dict, &decoded)?;
    let eof_seen = confirm_eof_follows(&cursor);
    Ok((section, eof_seen))
}

fn confirm_eof_follows(cursor: &ByteCursor) -> bool {
    let mut c = cursor.clone();
    if lexer::skip_whitespace_and_comments(&mut c).is_err() {
        return false;
    }
    if c.peek_at_least(9) != b"startxref" {
        return false;
    }
    c.seek_cur(9);
    if lexer::skip_whitespace_and_comments(&mut c).is_err() {
        return false;
    }
    let digits_start = c.tell();
    while matches!(c.peek_byte(), Some(b) if b.is_ascii_digit()) {
        c.seek_cur(1);
    }
    if c.tell() == digits_start {
        return false;
    }
    if lexer::skip_whitespace_and_comments(&mut c).is_err() {
        return false;
    }
    c.peek_at_least(5) == b"%%EOF"
}

/// Walks the `Prev` chain from `primary_offset`, returning increments
/// oldest-to-newest. A `Prev` pointing at an offset already visited in this
/// walk is an [`PdfError::XRefChainCycle`], not an infinite loop.
fn build_increments(bytes: &ByteCursor, primary_offset: usize) -> PdfResult<Vec<Increment>> {
    let mut visited = HashSet::new();
    let mut newest_first = Vec::new();
    let mut current = Some(primary_offset);

    while let Some(offset) = current {
        if !visited.insert(offset) {
            return Err(PdfError::XRefChainCycle { offset });
        }
        let (section, eof_seen) = parse_xref_at(bytes, offset)?;
        let prev = section.prev_offset();
        let trailer = section.trailer.clone();
        newest_first.push(Increment {
            startxref: offset,
            xref: section,
            trailer,
            eof_seen,
        });
        current = prev;
    }

    newest_first.reverse();
    Ok(newest_first)
}

/// Looks up `(obj_no, gen_no)`'s in-use byte offset across the in-progress
/// increment chain, the same newest-to-oldest walk `get_obj` performs once
/// the document is ready. Used only to resolve a stream's `/Length` when it
/// is itself an indirect reference, during the eager-materialization phase
/// before `Document::get_obj` is available.
fn lookup_offset_in_progress(increments: &[Increment], obj_no: u32, gen_no: u16) -> Option<usize> {
    for inc in increments.iter().rev() {
        if !inc.eof_seen {
            continue;
        }
        if let Some(entry) = inc.xref.lookup(obj_no) {
            if entry.gen_no() != gen_no {
                continue;
            }
            return match entry {
                XRefEntry::InUse { offset, .. } => Some(*offset),
                _ => None,
            };
        }
    }
    None
}

fn resolve_length_via_xref(
    increments: &[Increment],
    bytes: &ByteCursor,
    obj_no: u32,
    gen_no: u16,
) -> PdfResult<i64> {
    let offset = lookup_offset_in_progress(increments, obj_no, gen_no)
        .ok_or(PdfError::ObjectNotFound { obj_no, gen_no })?;
    let mut cursor = bytes.clone();
    cursor.seek_set(offset);
    let parser = ObjectParser::new();
    match parser.parse_indirect_at(&mut cursor)? {
        Object::Indirect { inner, .. } => match *inner {
            Object::Numeric(n) => n
                .as_i64()
                .ok_or_else(|| PdfError::malformed_token(offset, "integer /Length")),
            _ => Err(PdfError::malformed_token(offset, "integer /Length")),
        },
        _ => Err(PdfError::malformed_token(offset, "indirect object")),
    }
}

fn materialize_one(
    increments: &[Increment],
    bytes: &ByteCursor,
    offset: usize,
    obj_no: u32,
    gen_no: u16,
) -> PdfResult<Object> {
    let mut cursor = bytes.clone();
    cursor.seek_set(offset);

    let resolver = |len_obj, len_gen| resolve_length_via_xref(increments, bytes, len_obj, len_gen);
    let parser = ObjectParser::with_length_resolver(&resolver);
    let obj = parser.parse_indirect_at(&mut cursor)?;

    match &obj {
        Object::Indirect {
            obj_no: found_no,
            gen_no: found_gen,
            ..
        } => {
            if *found_no != obj_no || *found_gen != gen_no {
                return Err(PdfError::ObjectMismatch {
                    xref_says: (obj_no, gen_no),
                    found: (*found_no, *found_gen),
                });
            }
        }
        _ => unreachable!("parse_indirect_at always returns Object::Indirect on success"),
    }

    Ok(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pdf() -> Vec<u8> {
        let body = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Page /Parent 2 0 R >>\nendobj\n"
            .to_vec();

        let xref_offset = body.len();
        let mut pdf = body;
        pdf.extend_from_slice(b"xref\n0 4\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n", 9).as_bytes());
        pdf.extend_from_slice(format!("{:010} 00000 n \n", 58).as_bytes());
        pdf.extend_from_slice(format!("{:010} 00000 n \n", 115).as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\n");
        pdf.extend_from_slice(b"startxref\n");
        pdf.extend_from_slice(format!("{xref_offset}\n").as_bytes());
        pdf.extend_from_slice(b"%%EOF\n");
        pdf
    }

    #[test]
    fn test_open_minimal_pdf_and_get_catalog() {
        let doc = Document::open(minimal_pdf()).unwrap();
        assert_eq!(doc.version(), (1, 4));
        let catalog = doc.get_catalog(-1).unwrap();
        assert!(name_is(&catalog, "Type", "Catalog"));
    }

    #[test]
    fn test_get_obj_returns_inner_value() {
        let doc = Document::open(minimal_pdf()).unwrap();
        let obj = doc.get_obj(1, 0).unwrap();
        assert!(name_is(obj.as_dict().unwrap(), "Type", "Catalog"));
    }

    #[test]
    fn test_page_tree_traversal() {
        let doc = Document::open(minimal_pdf()).unwrap();
        let page = doc.get_page_dict(0, -1).unwrap();
        assert!(name_is(&page, "Type", "Page"));
    }

    #[test]
    fn test_get_all_page_dicts() {
        let doc = Document::open(minimal_pdf()).unwrap();
        let pages = doc.get_all_page_dicts(-1).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn test_page_tree_rejects_unrelated_node_type() {
        // Object 3 (what /Kids points at) has /Type /Font, neither /Pages nor
        // /Page: a malformed tree, which must be a fatal error rather than
        // silently treated as a Page node.
        let body = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n\
2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n\
3 0 obj\n<< /Type /Font >>\nendobj\n"
            .to_vec();

        let xref_offset = body.len();
        let mut pdf = body;
        pdf.extend_from_slice(b"xref\n0 4\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n", 9).as_bytes());
        pdf.extend_from_slice(format!("{:010} 00000 n \n", 58).as_bytes());
        pdf.extend_from_slice(format!("{:010} 00000 n \n", 115).as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 4 /Root 1 0 R >>\n");
        pdf.extend_from_slice(b"startxref\n");
        pdf.extend_from_slice(format!("{xref_offset}\n").as_bytes());
        pdf.extend_from_slice(b"%%EOF\n");

        let doc = Document::open(pdf).unwrap();
        let err = doc.get_page_dict(0, -1).unwrap_err();
        assert!(matches!(err, PdfError::MalformedToken { .. }));
    }

    #[test]
    fn test_not_a_pdf() {
        let err = Document::open(b"hello world".to_vec()).unwrap_err();
        assert!(matches!(err, PdfError::NotAPdf));
    }

    #[test]
    fn test_object_not_found() {
        let doc = Document::open(minimal_pdf()).unwrap();
        let err = doc.get_obj(99, 0).unwrap_err();
        assert!(matches!(err, PdfError::ObjectNotFound { obj_no: 99, gen_no: 0 }));
    }

    #[test]
    fn test_xref_chain_cycle_detected() {
        // A trailer whose Prev points back at its own xref offset must not
        // loop forever.
        let mut pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n".to_vec();
        let xref_offset = pdf.len();
        pdf.extend_from_slice(b"xref\n0 2\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n", 9).as_bytes());
        pdf.extend_from_slice(
            format!("trailer\n<< /Size 2 /Root 1 0 R /Prev {xref_offset} >>\n").as_bytes(),
        );
        pdf.extend_from_slice(b"startxref\n");
        pdf.extend_from_slice(format!("{xref_offset}\n").as_bytes());
        pdf.extend_from_slice(b"%%EOF\n");

        let err = Document::open(pdf).unwrap_err();
        assert!(matches!(err, PdfError::XRefChainCycle { .. }));
    }

    #[test]
    fn test_incremental_update_newer_value_wins() {
        let mut pdf = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R /Marker (old) >>\nendobj\n".to_vec();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
        let xref1_offset = pdf.len();
        pdf.extend_from_slice(b"xref\n0 3\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n", 9).as_bytes());
        let obj2_offset = 9 + b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R /Marker (old) >>\nendobj\n".len();
        pdf.extend_from_slice(format!("{obj2_offset:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        pdf.extend_from_slice(b"startxref\n");
        pdf.extend_from_slice(format!("{xref1_offset}\n").as_bytes());
        pdf.extend_from_slice(b"%%EOF\n");

        let update_obj1_offset = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R /Marker (new) >>\nendobj\n");
        let xref2_offset = pdf.len();
        pdf.extend_from_slice(b"xref\n0 3\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{update_obj1_offset:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(format!("{obj2_offset:010} 00000 n \n").as_bytes());
        pdf.extend_from_slice(
            format!("trailer\n<< /Size 3 /Root 1 0 R /Prev {xref1_offset} >>\n").as_bytes(),
        );
        pdf.extend_from_slice(b"startxref\n");
        pdf.extend_from_slice(format!("{xref2_offset}\n").as_bytes());
        pdf.extend_from_slice(b"%%EOF\n");

        let doc = Document::open(pdf).unwrap();
        let catalog = doc.get_catalog(-1).unwrap();
        match catalog.get("Marker") {
            Some(Object::LiteralString(bytes)) => assert_eq!(bytes, b"new"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
