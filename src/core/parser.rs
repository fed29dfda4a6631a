use super::cursor::ByteCursor;
use super::error::{PdfError, PdfResult};
use super::lexer;
use super::object::{Dictionary, Name, Numeric, Object};

/// Callback used to resolve a stream's `/Length` when it is an indirect
/// reference rather than a direct integer. Returns the integer length.
/// Document supplies one backed by the in-progress xref section; standalone
/// callers (tests, primarily) that pass `None` get `MissingRequiredEntry` if
/// a stream actually needs it.
pub type LengthResolver<'a> = dyn Fn(u32, u16) -> PdfResult<i64> + 'a;

/// Recursive-descent parser for the eight PDF object kinds plus the
/// indirect-object envelope. Every entry point restores the cursor to its
/// starting position on failure.
pub struct ObjectParser<'a> {
    resolve_length: Option<&'a LengthResolver<'a>>,
}

impl<'a> ObjectParser<'a> {
    pub fn new() -> Self {
        ObjectParser {
            resolve_length: None,
        }
    }

    pub fn with_length_resolver(resolver: &'a LengthResolver<'a>) -> Self {
        ObjectParser {
            resolve_length: Some(resolver),
        }
    }

    /// Parses one object starting at the cursor's current position,
    /// dispatching on the leading non-whitespace byte.
    pub fn parse_object(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let start = cursor.tell();
        lexer::skip_whitespace_and_comments(cursor)?;

        let lead = match cursor.peek_byte() {
            Some(b) => b,
            None => {
                cursor.seek_set(start);
                return Err(PdfError::UnexpectedEof { offset: start });
            }
        };

        let result = match lead {
            b't' | b'f' => self.parse_boolean(cursor),
            b'0'..=b'9' | b'+' | b'-' | b'.' => self.parse_numeric_family(cursor),
            b'(' => self.parse_literal_string(cursor),
            b'<' => {
                if cursor.peek_at_least(2) == b"<<" {
                    self.parse_dictionary_or_stream(cursor)
                } else {
                    self.parse_hex_string(cursor)
                }
            }
            b'/' => self.parse_name(cursor).map(Object::Name),
            b'[' => self.parse_array(cursor),
            b'n' => self.parse_null(cursor),
            _ => Err(PdfError::malformed_token(start, "object")),
        };

        if result.is_err() {
            cursor.seek_set(start);
        }
        result
    }

    fn parse_boolean(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let start = cursor.tell();
        if cursor.peek_at_least(4) == b"true" {
            cursor.seek_set(start + 4);
            return Ok(Object::Boolean(true));
        }
        if cursor.peek_at_least(5) == b"false" {
            cursor.seek_set(start + 5);
            return Ok(Object::Boolean(false));
        }
        Err(PdfError::malformed_token(start, "true or false"))
    }

    fn parse_null(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let start = cursor.tell();
        if cursor.peek_at_least(4) == b"null" {
            cursor.seek_set(start + 4);
            return Ok(Object::Null);
        }
        Err(PdfError::malformed_token(start, "null"))
    }

    /// Parses a numeric token, then (for non-negative integers only)
    /// attempts the two-token lookahead to disambiguate `N G obj` and
    /// `N G R` from a bare number, restoring the cursor past just the first
    /// number if neither matches.
    fn parse_numeric_family(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let after_first = {
            let num = self.parse_numeric_token(cursor)?;
            (num, cursor.tell())
        };
        let (first, pos_after_first) = after_first;

        let obj_no = match first {
            Numeric::Integer(i) if i >= 0 => i as u32,
            _ => return Ok(Object::Numeric(first)),
        };

        // Attempt the lookahead; any failure restores to just past the
        // first number and returns it as a bare Numeric.
        let lookahead_start = cursor.tell();
        if let Some(result) = self.try_indirect_or_reference(cursor, obj_no) {
            return Ok(result);
        }
        let _ = lookahead_start;
        cursor.seek_set(pos_after_first);
        Ok(Object::Numeric(first))
    }

    fn try_indirect_or_reference(&self, cursor: &mut ByteCursor, obj_no: u32) -> Option<Object> {
        lexer::skip_whitespace_and_comments(cursor).ok()?;
        let gen_token = self.parse_numeric_token(cursor).ok()?;
        let gen_no = match gen_token {
            Numeric::Integer(g) if g >= 0 => g as u16,
            _ => return None,
        };
        lexer::skip_whitespace_and_comments(cursor).ok()?;

        if cursor.peek_at_least(1) == b"R" && !is_name_continuation(cursor, 1) {
            cursor.seek_cur(1);
            return Some(Object::Reference { obj_no, gen_no });
        }
        if cursor.peek_at_least(3) == b"obj" && !is_name_continuation(cursor, 3) {
            cursor.seek_cur(3);
            let inner = self.parse_object(cursor).ok()?;
            return self.finish_indirect(cursor, obj_no, gen_no, inner).ok();
        }
        None
    }

    fn finish_indirect(
        &self,
        cursor: &mut ByteCursor,
        obj_no: u32,
        gen_no: u16,
        inner: Object,
    ) -> PdfResult<Object> {
        lexer::skip_whitespace_and_comments(cursor)?;

        if let Object::Dictionary(dict) = &inner {
            if cursor.peek_at_least(6) == b"stream" {
                let stream = self.parse_stream_body(cursor, dict.clone(), obj_no, gen_no)?;
                lexer::skip_whitespace_and_comments(cursor)?;
                expect_keyword(cursor, b"endobj")?;
                return Ok(Object::Indirect {
                    obj_no,
                    gen_no,
                    inner: Box::new(stream),
                });
            }
        }

        expect_keyword(cursor, b"endobj")?;
        Ok(Object::Indirect {
            obj_no,
            gen_no,
            inner: Box::new(inner),
        })
    }

    /// Parses `obj_no gen_no obj ...` fully from scratch (used by Document
    /// when materializing an in-use xref entry, where the caller already
    /// knows an indirect object starts here and wants validation rather
    /// than the bare-numeric fallback `parse_object` offers).
    pub fn parse_indirect_at(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let start = cursor.tell();
        let result = (|| {
            lexer::skip_whitespace_and_comments(cursor)?;
            let obj_no = match self.parse_numeric_token(cursor)? {
                Numeric::Integer(i) if i >= 0 => i as u32,
                _ => return Err(PdfError::malformed_token(cursor.tell(), "object number")),
            };
            lexer::skip_whitespace_and_comments(cursor)?;
            let gen_no = match self.parse_numeric_token(cursor)? {
                Numeric::Integer(g) if g >= 0 => g as u16,
                _ => return Err(PdfError::malformed_token(cursor.tell(), "generation number")),
            };
            lexer::skip_whitespace_and_comments(cursor)?;
            expect_keyword(cursor, b"obj")?;
            let inner = self.parse_object(cursor)?;
            self.finish_indirect(cursor, obj_no, gen_no, inner)
        })();

        if result.is_err() {
            cursor.seek_set(start);
        }
        result
    }

    fn parse_numeric_token(&self, cursor: &mut ByteCursor) -> PdfResult<Numeric> {
        let start = cursor.tell();
        let mut text = Vec::new();
        let mut is_real = false;

        if matches!(cursor.peek_byte(), Some(b'+') | Some(b'-')) {
            text.push(cursor.read_byte()?);
        }
        while let Some(b) = cursor.peek_byte() {
            match b {
                b'0'..=b'9' => {
                    text.push(cursor.read_byte()?);
                }
                b'.' => {
                    is_real = true;
                    text.push(cursor.read_byte()?);
                }
                _ => break,
            }
        }
        if text.is_empty() || text == b"+" || text == b"-" {
            cursor.seek_set(start);
            return Err(PdfError::malformed_token(start, "number"));
        }

        let text_str = String::from_utf8_lossy(&text);
        if is_real {
            let value: f64 = text_str.parse().unwrap_or(0.0);
            Ok(Numeric::Real(value))
        } else {
            match text_str.parse::<i64>() {
                Ok(v) => Ok(Numeric::Integer(v)),
                Err(_) => Ok(Numeric::Real(text_str.parse().unwrap_or(0.0))),
            }
        }
    }

    fn parse_literal_string(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let start = cursor.tell();
        if cursor.read_byte()? != b'(' {
            return Err(PdfError::malformed_token(start, "("));
        }

        let mut depth = 1usize;
        let mut raw = Vec::new();
        loop {
            let b = cursor.read_byte().map_err(|_| PdfError::UnexpectedEof { offset: start })?;
            match b {
                b'\\' => {
                    let escaped = cursor.read_byte().map_err(|_| PdfError::UnexpectedEof { offset: start })?;
                    raw.push(b'\\');
                    raw.push(escaped);
                }
                b'(' => {
                    depth += 1;
                    raw.push(b);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    raw.push(b);
                }
                other => raw.push(other),
            }
        }

        Ok(Object::LiteralString(resolve_literal_string_escapes(&raw)))
    }

    fn parse_hex_string(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let start = cursor.tell();
        if cursor.read_byte()? != b'<' {
            return Err(PdfError::malformed_token(start, "<"));
        }
        let mut nibbles = Vec::new();
        loop {
            let b = cursor.read_byte().map_err(|_| PdfError::UnexpectedEof { offset: start })?;
            if b == b'>' {
                break;
            }
            if lexer::is_whitespace(b) {
                continue;
            }
            match hex_digit(b) {
                Some(v) => nibbles.push(v),
                None => return Err(PdfError::malformed_token(cursor.tell(), "hex digit")),
            }
        }
        if nibbles.len() % 2 == 1 {
            nibbles.push(0);
        }
        let bytes = nibbles
            .chunks(2)
            .map(|pair| (pair[0] << 4) | pair[1])
            .collect();
        Ok(Object::HexString(bytes))
    }

    fn parse_name(&self, cursor: &mut ByteCursor) -> PdfResult<Name> {
        let start = cursor.tell();
        if cursor.read_byte()? != b'/' {
            return Err(PdfError::malformed_token(start, "/"));
        }
        let mut raw = Vec::new();
        let mut expanded = Vec::new();
        while let Some(b) = cursor.peek_byte() {
            if lexer::is_special(b) {
                break;
            }
            cursor.seek_cur(1);
            if b == b'#' {
                let saved = cursor.tell();
                if let (Some(h1), Some(h2)) = (cursor.peek_byte(), {
                    let mut c2 = cursor.clone();
                    c2.seek_cur(1);
                    c2.peek_byte()
                }) {
                    if let (Some(d1), Some(d2)) = (hex_digit(h1), hex_digit(h2)) {
                        cursor.seek_cur(2);
                        raw.push(b'#');
                        raw.push(h1);
                        raw.push(h2);
                        expanded.push((d1 << 4) | d2);
                        continue;
                    }
                }
                cursor.seek_set(saved);
                raw.push(b'#');
                expanded.push(b'#');
            } else {
                raw.push(b);
                expanded.push(b);
            }
        }
        Ok(Name::with_raw(raw, expanded))
    }

    fn parse_array(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let start = cursor.tell();
        if cursor.read_byte()? != b'[' {
            return Err(PdfError::malformed_token(start, "["));
        }
        let mut items = Vec::new();
        loop {
            lexer::skip_whitespace_and_comments(cursor)?;
            if cursor.peek_byte() == Some(b']') {
                cursor.seek_cur(1);
                break;
            }
            if cursor.peek_byte().is_none() {
                return Err(PdfError::UnexpectedEof { offset: cursor.tell() });
            }
            items.push(self.parse_object(cursor)?);
        }
        Ok(Object::Array(items))
    }

    fn parse_dictionary_or_stream(&self, cursor: &mut ByteCursor) -> PdfResult<Object> {
        let dict = self.parse_dictionary(cursor)?;
        Ok(Object::Dictionary(dict))
    }

    fn parse_dictionary(&self, cursor: &mut ByteCursor) -> PdfResult<Dictionary> {
        let start = cursor.tell();
        if cursor.peek_at_least(2) != b"<<" {
            return Err(PdfError::malformed_token(start, "<<"));
        }
        cursor.seek_cur(2);
        let mut dict = Dictionary::new();
        loop {
            lexer::skip_whitespace_and_comments(cursor)?;
            if cursor.peek_at_least(2) == b">>" {
                cursor.seek_cur(2);
                break;
            }
            if cursor.peek_byte().is_none() {
                return Err(PdfError::UnexpectedEof { offset: cursor.tell() });
            }
            let key = self.parse_name(cursor)?;
            lexer::skip_whitespace_and_comments(cursor)?;
            let value = self.parse_object(cursor)?;
            dict.insert(key, value);
        }
        Ok(dict)
    }

    /// Parses a stream body once the cursor sits right after the closing
    /// `>>` of its dictionary. Requires `/Length` (a direct integer, or an
    /// indirect reference resolved through the configured callback).
    fn parse_stream_body(
        &self,
        cursor: &mut ByteCursor,
        dict: Dictionary,
        obj_no: u32,
        gen_no: u16,
    ) -> PdfResult<Object> {
        expect_keyword(cursor, b"stream")?;
        // stream\r\n or stream\n, never stream\r alone.
        match cursor.peek_byte() {
            Some(b'\r') => {
                cursor.seek_cur(1);
                if cursor.peek_byte() != Some(b'\n') {
                    return Err(PdfError::malformed_token(cursor.tell(), "\\n after \\r"));
                }
                cursor.seek_cur(1);
            }
            Some(b'\n') => cursor.seek_cur(1),
            _ => return Err(PdfError::malformed_token(cursor.tell(), "EOL after 'stream'")),
        }

        let length = self.resolve_stream_length(&dict, obj_no, gen_no)?;
        let payload = cursor.read(length as usize)?;

        lexer::skip_whitespace_and_comments(cursor)?;
        expect_keyword(cursor, b"endstream")?;

        Ok(Object::new_stream(dict, payload))
    }

    fn resolve_stream_length(&self, dict: &Dictionary, obj_no: u32, gen_no: u16) -> PdfResult<i64> {
        match dict.get("Length") {
            Some(Object::Numeric(Numeric::Integer(n))) if *n >= 0 => Ok(*n),
            Some(Object::Reference {
                obj_no: len_obj,
                gen_no: len_gen,
            }) => match self.resolve_length {
                Some(resolver) => resolver(*len_obj, *len_gen),
                None => Err(PdfError::MissingRequiredEntry {
                    dict: format!("stream {obj_no} {gen_no}"),
                    key: "Length (indirect, no resolver available)".to_string(),
                }),
            },
            _ => Err(PdfError::missing_required_entry(
                format!("stream {obj_no} {gen_no}"),
                "Length".to_string(),
            )),
        }
    }
}

impl<'a> Default for ObjectParser<'a> {
    fn default() -> Self {
        Self::new()
    }
}

fn is_name_continuation(cursor: &ByteCursor, offset_after: usize) -> bool {
    let mut c = cursor.clone();
    c.seek_cur(offset_after as i64);
    match c.peek_byte() {
        Some(b) => !lexer::is_special(b),
        None => false,
    }
}

fn expect_keyword(cursor: &mut ByteCursor, keyword: &[u8]) -> PdfResult<()> {
    let start = cursor.tell();
    if cursor.peek_at_least(keyword.len()) == keyword {
        cursor.seek_cur(keyword.len() as i64);
        Ok(())
    } else {
        Err(PdfError::malformed_token(
            start,
            String::from_utf8_lossy(keyword).into_owned(),
        ))
    }
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

/// Post-processes a literal string's raw bytes (escapes not yet resolved,
/// but parens/backslash pairs already balanced by the caller): line
/// continuations are stripped first, then EOL normalization, then named
/// escapes, then octal escapes.
fn resolve_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    // Step 1: remove `\<EOL>` line continuations.
    let mut step1 = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            let rest = &raw[i + 1..];
            if rest.starts_with(b"\r\n") {
                i += 3;
                continue;
            } else if rest.starts_with(b"\r") || rest.starts_with(b"\n") {
                i += 2;
                continue;
            }
        }
        step1.push(raw[i]);
        i += 1;
    }

    // Step 2: normalize raw `\r\n` and `\r` to `\n`.
    let mut step2 = Vec::with_capacity(step1.len());
    let mut i = 0;
    while i < step1.len() {
        if step1[i] == b'\r' {
            step2.push(b'\n');
            if i + 1 < step1.len() && step1[i + 1] == b'\n' {
                i += 2;
            } else {
                i += 1;
            }
        } else {
            step2.push(step1[i]);
            i += 1;
        }
    }

    // Step 3 + 4: expand named escapes, then octal escapes.
    let mut out = Vec::with_capacity(step2.len());
    let mut i = 0;
    while i < step2.len() {
        if step2[i] == b'\\' && i + 1 < step2.len() {
            let next = step2[i + 1];
            match next {
                b'n' => {
                    out.push(b'\n');
                    i += 2;
                }
                b'r' => {
                    out.push(b'\r');
                    i += 2;
                }
                b't' => {
                    out.push(b'\t');
                    i += 2;
                }
                b'b' => {
                    out.push(0x08);
                    i += 2;
                }
                b'f' => {
                    out.push(0x0C);
                    i += 2;
                }
                b'(' | b')' | b'\\' => {
                    out.push(next);
                    i += 2;
                }
                b'0'..=b'7' => {
                    let mut value: u32 = 0;
                    let mut digits = 0;
                    let mut j = i + 1;
                    while digits < 3 && j < step2.len() && (b'0'..=b'7').contains(&step2[j]) {
                        value = value * 8 + (step2[j] - b'0') as u32;
                        j += 1;
                        digits += 1;
                    }
                    if value <= 255 {
                        out.push(value as u8);
                    } else {
                        out.extend_from_slice(&step2[i..j]);
                    }
                    i = j;
                }
                _ => {
                    out.push(step2[i]);
                    i += 1;
                }
            }
        } else {
            out.push(step2[i]);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &[u8]) -> PdfResult<Object> {
        let mut cursor = ByteCursor::from_bytes(input.to_vec());
        ObjectParser::new().parse_object(&mut cursor)
    }

    #[test]
    fn test_boolean_and_null() {
        assert!(matches!(parse(b"true").unwrap(), Object::Boolean(true)));
        assert!(matches!(parse(b"false").unwrap(), Object::Boolean(false)));
        assert!(parse(b"null").unwrap().is_null());
    }

    #[test]
    fn test_numeric_bare() {
        match parse(b"-3.14").unwrap() {
            Object::Numeric(Numeric::Real(r)) => assert!((r + 3.14).abs() < 1e-9),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_reference_disambiguation() {
        match parse(b"12 0 R").unwrap() {
            Object::Reference { obj_no, gen_no } => {
                assert_eq!(obj_no, 12);
                assert_eq!(gen_no, 0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_bare_number_restores_cursor() {
        let mut cursor = ByteCursor::from_bytes(b"42 hello".to_vec());
        let result = ObjectParser::new().parse_object(&mut cursor).unwrap();
        assert!(matches!(result, Object::Numeric(Numeric::Integer(42))));
        assert_eq!(cursor.tell(), 2);
    }

    #[test]
    fn test_negative_number_never_starts_indirect() {
        match parse(b"-3 0 obj").unwrap() {
            Object::Numeric(Numeric::Integer(-3)) => {}
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_literal_string_escapes() {
        let obj = parse(b"(ab\\(c\\)\\\\d\\n\\101)").unwrap();
        match obj {
            Object::LiteralString(bytes) => assert_eq!(bytes, b"ab(c)\\d\nA"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_hex_string_odd_padding() {
        let obj = parse(b"<A1B>").unwrap();
        match obj {
            Object::HexString(bytes) => assert_eq!(bytes, vec![0xA1, 0xB0]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_name_hash_escape() {
        let obj = parse(b"/Name#20A").unwrap();
        match obj {
            Object::Name(name) => {
                assert_eq!(name.raw_bytes(), b"Name#20A");
                assert_eq!(name.expanded_bytes(), b"Name A");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_array_of_mixed_types() {
        let obj = parse(b"[true false 42 -3.14 /Name#20A]").unwrap();
        match obj {
            Object::Array(items) => assert_eq!(items.len(), 5),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_dictionary_basic() {
        let obj = parse(b"<< /Type /Catalog /Size 4 >>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name().unwrap().as_str(), "Catalog");
    }

    #[test]
    fn test_indirect_object() {
        let mut cursor = ByteCursor::from_bytes(b"1 0 obj\n[true false 42]\nendobj".to_vec());
        let obj = ObjectParser::new().parse_indirect_at(&mut cursor).unwrap();
        match obj {
            Object::Indirect { obj_no, gen_no, inner } => {
                assert_eq!(obj_no, 1);
                assert_eq!(gen_no, 0);
                assert!(matches!(*inner, Object::Array(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_stream_with_direct_length() {
        let mut cursor =
            ByteCursor::from_bytes(b"2 0 obj\n<< /Length 5 >>\nstream\nhello\nendstream\nendobj".to_vec());
        let obj = ObjectParser::new().parse_indirect_at(&mut cursor).unwrap();
        match obj {
            Object::Indirect { inner, .. } => match *inner {
                Object::Stream(_, payload, _) => assert_eq!(payload, b"hello"),
                other => panic!("unexpected {other:?}"),
            },
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_malformed_restores_cursor() {
        let mut cursor = ByteCursor::from_bytes(b"<< /Type /Catalog >".to_vec());
        let start = cursor.tell();
        assert!(ObjectParser::new().parse_object(&mut cursor).is_err());
        assert_eq!(cursor.tell(), start);
    }
}
