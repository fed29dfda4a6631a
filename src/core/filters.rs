use super::error::{PdfError, PdfResult};
use super::object::{Dictionary, Numeric, Object};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Applies a stream's `/Filter` chain (a single Name or an Array of Names,
/// paired positionally with `/DecodeParms`) to its raw payload, in file
/// order.
pub fn decode_stream(dict: &Dictionary, raw: &[u8]) -> PdfResult<Vec<u8>> {
    let filters = filter_names(dict);
    let params = decode_parms(dict, filters.len());

    let mut data = raw.to_vec();
    for (name, parms) in filters.iter().zip(params.iter()) {
        data = apply_filter(name, &data, parms.as_ref())?;
    }
    Ok(data)
}

fn filter_names(dict: &Dictionary) -> Vec<String> {
    match dict.get("Filter") {
        Some(Object::Name(n)) => vec![n.as_str().into_owned()],
        Some(Object::Array(items)) => items
            .iter()
            .filter_map(|o| o.as_name().map(|n| n.as_str().into_owned()))
            .collect(),
        _ => Vec::new(),
    }
}

fn decode_parms(dict: &Dictionary, count: usize) -> Vec<Option<Dictionary>> {
    let raw = dict.get("DecodeParms").or_else(|| dict.get("DP"));
    let mut out = vec![None; count];
    match raw {
        Some(Object::Dictionary(d)) => {
            if count > 0 {
                out[0] = Some(d.clone());
            }
        }
        Some(Object::Array(items)) => {
            for (i, item) in items.iter().enumerate().take(count) {
                if let Object::Dictionary(d) = item {
                    out[i] = Some(d.clone());
                }
            }
        }
        _ => {}
    }
    out
}

fn apply_filter(name: &str, data: &[u8], parms: Option<&Dictionary>) -> PdfResult<Vec<u8>> {
    match name {
        "FlateDecode" | "Fl" => flate_decode(data, parms),
        "DCTDecode" | "DCT" => Ok(data.to_vec()),
        other => Err(PdfError::unsupported_filter(other)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Predictor {
    NoPrediction,
    Tiff,
    PngNone,
    PngSub,
    PngUp,
    PngAvg,
    PngPaeth,
    PngOptimum,
}

impl Predictor {
    fn from_value(v: i64) -> Option<Self> {
        match v {
            1 => Some(Predictor::NoPrediction),
            2 => Some(Predictor::Tiff),
            10 => Some(Predictor::PngNone),
            11 => Some(Predictor::PngSub),
            12 => Some(Predictor::PngUp),
            13 => Some(Predictor::PngAvg),
            14 => Some(Predictor::PngPaeth),
            15 => Some(Predictor::PngOptimum),
            _ => None,
        }
    }

    fn is_png_family(self) -> bool {
        matches!(
            self,
            Predictor::PngNone
                | Predictor::PngSub
                | Predictor::PngUp
                | Predictor::PngAvg
                | Predictor::PngPaeth
                | Predictor::PngOptimum
        )
    }
}

/// Zlib inflate, then PNG/TIFF predictor row reconstruction as named by
/// `/DecodeParms`. `Columns` defaults to 1, `Predictor` to `NoPrediction`.
fn flate_decode(data: &[u8], parms: Option<&Dictionary>) -> PdfResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut inflated = Vec::new();
    decoder
        .read_to_end(&mut inflated)
        .map_err(|e| PdfError::Io(format!("zlib inflate failed: {e}")))?;

    let predictor_value = parms
        .and_then(|p| p.get("Predictor"))
        .and_then(|o| o.as_numeric())
        .and_then(|n| n.as_i64())
        .unwrap_or(1);

    let predictor = Predictor::from_value(predictor_value)
        .ok_or(PdfError::UnsupportedPredictor { value: predictor_value })?;

    if predictor == Predictor::NoPrediction {
        return Ok(inflated);
    }
    if !predictor.is_png_family() {
        return Err(PdfError::UnsupportedPredictor { value: predictor_value });
    }

    let columns = parms
        .and_then(|p| p.get("Columns"))
        .and_then(|o| o.as_numeric())
        .and_then(|n| match n {
            Numeric::Integer(i) => Some(i),
            _ => None,
        })
        .unwrap_or(1) as usize;

    unfilter_png_rows(&inflated, columns)
}

fn unfilter_png_rows(data: &[u8], columns: usize) -> PdfResult<Vec<u8>> {
    let row_len = columns + 1;
    if row_len == 0 || data.len() % row_len != 0 {
        return Err(PdfError::invalid_xref(
            0,
            format!("PNG-predicted data length {} is not a multiple of row length {row_len}", data.len()),
        ));
    }

    let mut output = Vec::with_capacity(data.len());
    let mut prev_row = vec![0u8; row_len];

    for row in data.chunks(row_len) {
        let filter_byte = row[0];
        let mut current: Vec<u8> = row.to_vec();

        match filter_byte {
            0 => {}
            1 => {
                for i in 2..row_len {
                    current[i] = current[i].wrapping_add(current[i - 1]);
                }
            }
            2 => {
                for i in 1..row_len {
                    current[i] = current[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 1..row_len {
                    let left = if i > 1 { current[i - 1] as u16 } else { 0 };
                    let up = prev_row[i] as u16;
                    let avg = ((left + up) / 2) as u8;
                    current[i] = current[i].wrapping_add(avg);
                }
            }
            4 => {
                for i in 1..row_len {
                    let left = if i > 1 { current[i - 1] } else { 0 };
                    let up = prev_row[i];
                    let up_left = if i > 1 { prev_row[i - 1] } else { 0 };
                    current[i] = current[i].wrapping_add(paeth_predictor(left, up, up_left));
                }
            }
            other => {
                return Err(PdfError::UnsupportedPredictor { value: other as i64 });
            }
        }

        output.extend_from_slice(&current[1..]);
        prev_row = current;
    }

    Ok(output)
}

/// Picks whichever of `{left, up, up_left}` minimizes `|p - x|` where
/// `p = left + up - up_left`; ties go to `left`, then `up`.
fn paeth_predictor(left: u8, up: u8, up_left: u8) -> u8 {
    let p = left as i32 + up as i32 - up_left as i32;
    let dist_left = (p - left as i32).abs();
    let dist_up = (p - up as i32).abs();
    let dist_up_left = (p - up_left as i32).abs();

    if dist_left <= dist_up && dist_left <= dist_up_left {
        left
    } else if dist_up <= dist_up_left {
        up
    } else {
        up_left
    }
}
