use super::cursor::ByteCursor;
use super::error::{PdfError, PdfResult};
use super::lexer;
use super::object::{Dictionary, Numeric, Object};
use super::parser::ObjectParser;
use std::collections::HashMap;

/// One cross-reference table entry, in the three forms PDF uses.
#[derive(Debug, Clone, Copy)]
pub enum XRefEntry {
    /// Object number is available for reuse; `next_free_obj_no` chains to the
    /// next free slot, terminating at object 0.
    Free { next_free_obj_no: u32, gen_no: u16 },
    /// Object lives uncompressed at `offset` in the file.
    InUse { offset: usize, gen_no: u16 },
    /// Object is the `index`-th object inside the Object Stream numbered
    /// `container_obj_no`. Compressed objects always have generation 0.
    Compressed { container_obj_no: u32, index: u32 },
}

impl XRefEntry {
    pub fn gen_no(&self) -> u16 {
        match self {
            XRefEntry::Free { gen_no, .. } => *gen_no,
            XRefEntry::InUse { gen_no, .. } => *gen_no,
            XRefEntry::Compressed { .. } => 0,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, XRefEntry::Free { .. })
    }
}

/// A contiguous run of entries for object numbers
/// `first_obj_no .. first_obj_no + entries.len()`.
#[derive(Debug, Clone)]
pub struct XRefSubsection {
    pub first_obj_no: u32,
    pub entries: Vec<XRefEntry>,
}

impl XRefSubsection {
    pub fn get(&self, obj_no: u32) -> Option<&XRefEntry> {
        if obj_no < self.first_obj_no {
            return None;
        }
        self.entries.get((obj_no - self.first_obj_no) as usize)
    }
}

/// One cross-reference section: either a classic `xref` table or a single
/// XRef stream, paired with the trailer dictionary it carries (the stream's
/// own dictionary, in the stream case).
#[derive(Debug, Clone)]
pub struct XRefSection {
    pub subsections: Vec<XRefSubsection>,
    pub trailer: Dictionary,
}

impl XRefSection {
    pub fn lookup(&self, obj_no: u32) -> Option<&XRefEntry> {
        self.subsections.iter().find_map(|s| s.get(obj_no))
    }

    /// Offset of the previous increment's xref section, if this one chains
    /// backward via `/Prev`.
    pub fn prev_offset(&self) -> Option<usize> {
        match self.trailer.get("Prev") {
            Some(Object::Numeric(n)) => n.as_i64().filter(|v| *v >= 0).map(|v| v as usize),
            _ => None,
        }
    }
}

/// Parses a classic `xref` table starting at `cursor`'s current position
/// (which must sit on the `xref` keyword) through its trailing `trailer`
/// dictionary.
pub fn parse_classic_section(cursor: &mut ByteCursor) -> PdfResult<XRefSection> {
    lexer::skip_whitespace_and_comments(cursor)?;
    expect_keyword(cursor, b"xref")?;

    let mut subsections = Vec::new();
    loop {
        lexer::skip_whitespace_and_comments(cursor)?;
        if cursor.peek_at_least(7) == b"trailer" {
            break;
        }
        if cursor.at_eof() {
            return Err(PdfError::invalid_xref(cursor.tell(), "unexpected end of xref table"));
        }
        subsections.push(parse_classic_subsection(cursor)?);
    }

    expect_keyword(cursor, b"trailer")?;
    lexer::skip_whitespace_and_comments(cursor)?;
    let parser = ObjectParser::new();
    let trailer = match parser.parse_object(cursor)? {
        Object::Dictionary(d) => d,
        other => {
            return Err(PdfError::invalid_xref(
                cursor.tell(),
                format!("trailer is not a dictionary: {other:?}"),
            ))
        }
    };

    Ok(XRefSection { subsections, trailer })
}

fn parse_classic_subsection(cursor: &mut ByteCursor) -> PdfResult<XRefSubsection> {
    let first_obj_no = parse_decimal_run(cursor)? as u32;
    skip_single_space(cursor)?;
    let count = parse_decimal_run(cursor)?;
    lexer::seek_until(cursor, &lexer::eol_patterns(), false);
    skip_one_eol(cursor)?;

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        entries.push(parse_classic_entry(cursor)?);
    }

    validate_free_chain(first_obj_no, &entries)?;

    Ok(XRefSubsection { first_obj_no, entries })
}

/// A classic xref entry is exactly 20 bytes:
/// `NNNNNNNNNN GGGGG n|f EOL` where EOL is `sp cr`, `sp lf`, or `cr lf`.
fn parse_classic_entry(cursor: &mut ByteCursor) -> PdfResult<XRefEntry> {
    let raw = cursor.read(20)?;
    if raw.len() != 20 {
        return Err(PdfError::invalid_xref(cursor.tell(), "truncated xref entry"));
    }

    let offset_str = std::str::from_utf8(&raw[0..10])
        .map_err(|_| PdfError::invalid_xref(cursor.tell(), "non-utf8 xref offset field"))?;
    let gen_str = std::str::from_utf8(&raw[11..16])
        .map_err(|_| PdfError::invalid_xref(cursor.tell(), "non-utf8 xref generation field"))?;
    let kind = raw[17];

    let offset: usize = offset_str
        .parse()
        .map_err(|_| PdfError::invalid_xref(cursor.tell(), "malformed xref offset field"))?;
    let gen_no: u16 = gen_str
        .parse()
        .map_err(|_| PdfError::invalid_xref(cursor.tell(), "malformed xref generation field"))?;

    match kind {
        b'n' => Ok(XRefEntry::InUse { offset, gen_no }),
        b'f' => Ok(XRefEntry::Free {
            next_free_obj_no: offset as u32,
            gen_no,
        }),
        other => Err(PdfError::invalid_xref(
            cursor.tell(),
            format!("xref entry type byte is neither 'n' nor 'f' (got {other:#04x})"),
        )),
    }
}

/// Checks the free-list invariant once the full subsection has been
/// collected: every free entry's `next_free_obj_no` should eventually chain
/// back to object 0. This is checked after assembly rather than while each
/// entry is read, so a free entry near the head that looks broken in
/// isolation but is completed later in the same subsection isn't flagged.
fn validate_free_chain(first_obj_no: u32, entries: &[XRefEntry]) -> PdfResult<()> {
    let by_obj_no: HashMap<u32, XRefEntry> = entries
        .iter()
        .enumerate()
        .map(|(i, e)| (first_obj_no + i as u32, *e))
        .collect();

    let head = match by_obj_no.get(&0) {
        Some(e) if e.is_free() => *e,
        Some(_) => {
            return Err(PdfError::invalid_xref(0, "object 0 must be a free entry"));
        }
        None => return Ok(()), // incremental subsection not covering object 0
    };

    if head.gen_no() != 65535 {
        return Err(PdfError::invalid_xref(
            0,
            format!("object 0's free entry must have generation 65535, found {}", head.gen_no()),
        ));
    }

    let mut visited = std::collections::HashSet::new();
    visited.insert(0u32);
    let mut current = head;
    loop {
        let next = match current {
            XRefEntry::Free { next_free_obj_no, .. } => next_free_obj_no,
            _ => unreachable!(),
        };
        if next == 0 {
            break;
        }
        if !visited.insert(next) {
            return Err(PdfError::invalid_xref(0, "free list chain cycles without reaching object 0"));
        }
        match by_obj_no.get(&next) {
            Some(e) if e.is_free() => current = *e,
            Some(_) => {
                return Err(PdfError::invalid_xref(
                    0,
                    format!("free list points to in-use object {next}"),
                ))
            }
            // Chains into an object number outside this subsection; another
            // increment owns it, nothing more to check here.
            None => break,
        }
    }

    Ok(())
}

/// Decodes an XRef stream (`/Type /XRef`) from its already-inflated payload.
/// The stream's own dictionary doubles as the trailer.
pub fn parse_xref_stream(dict: &Dictionary, payload: &[u8]) -> PdfResult<XRefSection> {
    let w = require_widths(dict)?;
    let size = require_int(dict, "Size")?;
    let index = read_index(dict, size);

    let record_len = (w[0] + w[1] + w[2]) as usize;
    if record_len == 0 {
        return Err(PdfError::invalid_xref(0, "XRef stream /W is all zero"));
    }

    let mut subsections = Vec::with_capacity(index.len());
    let mut offset = 0usize;
    for (first_obj_no, count) in index {
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if offset + record_len > payload.len() {
                return Err(PdfError::invalid_xref(offset, "XRef stream data shorter than /Index promises"));
            }
            let record = &payload[offset..offset + record_len];
            entries.push(decode_xref_stream_record(record, &w)?);
            offset += record_len;
        }
        subsections.push(XRefSubsection { first_obj_no, entries });
    }

    Ok(XRefSection {
        subsections,
        trailer: dict.clone(),
    })
}

fn decode_xref_stream_record(record: &[u8], w: &[usize; 3]) -> PdfResult<XRefEntry> {
    let mut pos = 0;
    let field_type = if w[0] == 0 {
        1
    } else {
        read_big_endian(&record[pos..pos + w[0]])
    };
    pos += w[0];
    let field2 = read_big_endian(&record[pos..pos + w[1]]);
    pos += w[1];
    let field3 = read_big_endian(&record[pos..pos + w[2]]);

    match field_type {
        0 => Ok(XRefEntry::Free {
            next_free_obj_no: field2 as u32,
            gen_no: field3 as u16,
        }),
        1 => Ok(XRefEntry::InUse {
            offset: field2 as usize,
            gen_no: field3 as u16,
        }),
        2 => Ok(XRefEntry::Compressed {
            container_obj_no: field2 as u32,
            index: field3 as u32,
        }),
        other => Err(PdfError::invalid_xref(0, format!("XRef stream entry has unknown type {other}"))),
    }
}

fn read_big_endian(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

fn require_widths(dict: &Dictionary) -> PdfResult<[usize; 3]> {
    let arr = match dict.get("W") {
        Some(Object::Array(a)) if a.len() == 3 => a,
        _ => return Err(PdfError::missing_required_entry("XRef", "W")),
    };
    let mut w = [0usize; 3];
    for (i, slot) in w.iter_mut().enumerate() {
        *slot = arr[i]
            .as_numeric()
            .and_then(|n| n.as_i64())
            .filter(|v| *v >= 0)
            .ok_or_else(|| PdfError::invalid_xref(0, "XRef /W entries must be non-negative integers"))?
            as usize;
    }
    Ok(w)
}

fn require_int(dict: &Dictionary, key: &str) -> PdfResult<i64> {
    match dict.get(key) {
        Some(Object::Numeric(Numeric::Integer(v))) => Ok(*v),
        _ => Err(PdfError::missing_required_entry("XRef", key)),
    }
}

/// `/Index` defaults to `[0 Size]` when absent.
fn read_index(dict: &Dictionary, size: i64) -> Vec<(u32, u32)> {
    match dict.get("Index") {
        Some(Object::Array(a)) => a
            .chunks(2)
            .filter_map(|pair| {
                let first = pair.first()?.as_numeric()?.as_i64()?;
                let count = pair.get(1)?.as_numeric()?.as_i64()?;
                Some((first as u32, count as u32))
            })
            .collect(),
        _ => vec![(0, size.max(0) as u32)],
    }
}

fn parse_decimal_run(cursor: &mut ByteCursor) -> PdfResult<i64> {
    let start = cursor.tell();
    let mut digits = Vec::new();
    while let Some(b) = cursor.peek_byte() {
        if b.is_ascii_digit() {
            digits.push(b);
            cursor.seek_cur(1);
        } else {
            break;
        }
    }
    if digits.is_empty() {
        return Err(PdfError::malformed_token(start, "decimal integer"));
    }
    std::str::from_utf8(&digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| PdfError::malformed_token(start, "decimal integer"))
}

fn skip_single_space(cursor: &mut ByteCursor) -> PdfResult<()> {
    match cursor.read_byte()? {
        b' ' => Ok(()),
        _ => Err(PdfError::malformed_token(cursor.tell() - 1, "single space")),
    }
}

fn skip_one_eol(cursor: &mut ByteCursor) -> PdfResult<()> {
    match cursor.peek_at_least(2) {
        [b'\r', b'\n'] => {
            cursor.seek_cur(2);
            Ok(())
        }
        [b'\r', _] | [b'\n', ..] => {
            cursor.seek_cur(1);
            Ok(())
        }
        _ => Ok(()),
    }
}

fn expect_keyword(cursor: &mut ByteCursor, keyword: &[u8]) -> PdfResult<()> {
    let got = cursor.read(keyword.len())?;
    if got == keyword {
        Ok(())
    } else {
        Err(PdfError::malformed_token(
            cursor.tell() - keyword.len(),
            String::from_utf8_lossy(keyword).into_owned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::object::Name;

    fn classic_fixture() -> Vec<u8> {
        let mut bytes = b"xref\n0 3\n".to_vec();
        bytes.extend_from_slice(b"0000000000 65535 f \n");
        bytes.extend_from_slice(b"0000000018 00000 n \n");
        bytes.extend_from_slice(b"0000000077 00000 n \n");
        bytes.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>");
        bytes
    }

    #[test]
    fn test_parse_classic_section() {
        let mut cursor = ByteCursor::from_bytes(classic_fixture());
        let section = parse_classic_section(&mut cursor).unwrap();
        assert_eq!(section.subsections.len(), 1);
        assert!(matches!(
            section.lookup(0),
            Some(XRefEntry::Free { next_free_obj_no: 0, gen_no: 65535 })
        ));
        assert!(matches!(
            section.lookup(1),
            Some(XRefEntry::InUse { offset: 18, gen_no: 0 })
        ));
        assert_eq!(
            section.trailer.get("Size"),
            Some(&Object::Numeric(Numeric::Integer(3)))
        );
    }

    #[test]
    fn test_prev_offset_from_trailer() {
        let mut dict = Dictionary::new();
        dict.insert(Name::new(b"Prev".to_vec()), Object::Numeric(Numeric::Integer(512)));
        let section = XRefSection { subsections: Vec::new(), trailer: dict };
        assert_eq!(section.prev_offset(), Some(512));
    }

    #[test]
    fn test_free_chain_must_reach_zero() {
        // Object 0 claims to free-chain to object 1, which is in-use: invalid.
        let mut bytes = b"xref\n0 2\n".to_vec();
        bytes.extend_from_slice(b"0000000001 65535 f \n");
        bytes.extend_from_slice(b"0000000018 00000 n \n");
        bytes.extend_from_slice(b"trailer\n<< /Size 2 >>");
        let mut cursor = ByteCursor::from_bytes(bytes);
        let err = parse_classic_section(&mut cursor).unwrap_err();
        assert!(matches!(err, PdfError::InvalidXRef { .. }));
    }

    #[test]
    fn test_parse_xref_stream_uncompressed_and_compressed() {
        // W = [1,2,1]: type(1B), field2(2B), field3(1B)
        let mut dict = Dictionary::new();
        dict.insert(
            Name::new(b"W".to_vec()),
            Object::Array(vec![
                Object::Numeric(Numeric::Integer(1)),
                Object::Numeric(Numeric::Integer(2)),
                Object::Numeric(Numeric::Integer(1)),
            ]),
        );
        dict.insert(Name::new(b"Size".to_vec()), Object::Numeric(Numeric::Integer(2)));

        let payload = vec![
            1, 0, 20, 0, // obj 0: in-use, offset=20, gen=0
            2, 0, 9, 3, // obj 1: compressed in container 9, index 3
        ];
        let section = parse_xref_stream(&dict, &payload).unwrap();
        assert!(matches!(
            section.lookup(0),
            Some(XRefEntry::InUse { offset: 20, gen_no: 0 })
        ));
        assert!(matches!(
            section.lookup(1),
            Some(XRefEntry::Compressed { container_obj_no: 9, index: 3 })
        ));
    }

    #[test]
    fn test_xref_stream_missing_w_is_error() {
        let dict = Dictionary::new();
        let err = parse_xref_stream(&dict, &[]).unwrap_err();
        assert!(matches!(err, PdfError::MissingRequiredEntry { .. }));
    }
}
