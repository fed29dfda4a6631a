use super::cursor::ByteCursor;
use super::error::{PdfError, PdfResult};
use super::lexer;
use super::object::{Dictionary, Numeric, Object};
use super::parser::ObjectParser;

/// One compressed object extracted from an Object Stream, keyed by
/// `(container_obj_no, index_in_stream)`.
pub struct CompressedObject {
    pub container_obj_no: u32,
    pub index: usize,
    pub obj_no: u32,
    pub object: Object,
}

/// Decodes every inner object out of an already-inflated ObjStm payload.
/// `dict` is the stream's own dictionary (must carry `/N` and `/First`).
pub fn decode_objstm(
    container_obj_no: u32,
    dict: &Dictionary,
    payload: &[u8],
) -> PdfResult<Vec<CompressedObject>> {
    let n = require_non_negative_int(dict, "N")?;
    let first = require_non_negative_int(dict, "First")?;

    let mut header_cursor = ByteCursor::from_bytes(payload.to_vec());
    let parser = ObjectParser::new();

    let mut pairs = Vec::with_capacity(n as usize * 2);
    for _ in 0..(2 * n) {
        lexer::skip_whitespace_and_comments(&mut header_cursor)?;
        let value = parse_bare_integer(&parser, &mut header_cursor)?;
        if value < 0 {
            return Err(PdfError::invalid_xref(
                0,
                format!("negative obj no./offset in ObjStm {container_obj_no}"),
            ));
        }
        pairs.push(value);
    }

    let mut result = Vec::with_capacity(n as usize);
    for (index, chunk) in pairs.chunks(2).enumerate() {
        let obj_no = chunk[0] as u32;
        let relative_offset = chunk[1] as usize;
        let mut body_cursor = ByteCursor::from_bytes(payload.to_vec());
        body_cursor.seek_set(first as usize + relative_offset);
        let inner = parser.parse_object(&mut body_cursor)?;
        result.push(CompressedObject {
            container_obj_no,
            index,
            obj_no,
            object: Object::Indirect {
                obj_no,
                gen_no: 0,
                inner: Box::new(inner),
            },
        });
    }

    Ok(result)
}

fn require_non_negative_int(dict: &Dictionary, key: &str) -> PdfResult<i64> {
    match dict.get(key) {
        Some(Object::Numeric(Numeric::Integer(v))) if *v >= 0 => Ok(*v),
        _ => Err(PdfError::missing_required_entry("ObjStm", key)),
    }
}

fn parse_bare_integer(parser: &ObjectParser, cursor: &mut ByteCursor) -> PdfResult<i64> {
    match parser.parse_object(cursor)? {
        Object::Numeric(n) => n
            .as_i64()
            .ok_or_else(|| PdfError::malformed_token(cursor.tell(), "integer")),
        _ => Err(PdfError::malformed_token(cursor.tell(), "integer")),
    }
}
