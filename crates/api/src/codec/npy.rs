//! Reader for the NumPy `.npy` array format (versions 1.0 through 3.0).
//!
//! Every supported element type is widened or narrowed to `f32`; the
//! returned data is always in C (row-major) order.

const MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Bool,
}

impl Kind {
    fn size(self) -> usize {
        match self {
            Kind::I8 | Kind::U8 | Kind::Bool => 1,
            Kind::I16 | Kind::U16 => 2,
            Kind::F32 | Kind::I32 | Kind::U32 => 4,
            Kind::F64 | Kind::I64 | Kind::U64 => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dtype {
    kind: Kind,
    big_endian: bool,
}

#[derive(Debug)]
struct Header {
    dtype: Dtype,
    fortran_order: bool,
    shape: Vec<usize>,
}

pub fn parse(bytes: &[u8]) -> Result<NpyArray, String> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err("missing .npy magic".to_string());
    }
    let major = bytes[MAGIC.len()];
    let mut pos = MAGIC.len() + 2;

    let header_len = match major {
        1 => {
            let raw = bytes.get(pos..pos + 2).ok_or("truncated header length")?;
            pos += 2;
            u16::from_le_bytes([raw[0], raw[1]]) as usize
        }
        2 | 3 => {
            let raw = bytes.get(pos..pos + 4).ok_or("truncated header length")?;
            pos += 4;
            u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize
        }
        v => return Err(format!("unsupported .npy version {v}")),
    };

    let header_bytes = bytes
        .get(pos..pos + header_len)
        .ok_or("truncated header")?;
    let header_text = std::str::from_utf8(header_bytes).map_err(|_| "header is not text")?;
    let header = parse_header(header_text)?;
    pos += header_len;

    let count = header
        .shape
        .iter()
        .try_fold(1_usize, |acc, &d| acc.checked_mul(d))
        .ok_or("shape overflows")?;
    let needed = count
        .checked_mul(header.dtype.kind.size())
        .ok_or("shape overflows")?;
    let end = pos.checked_add(needed).ok_or("shape overflows")?;
    let raw = bytes
        .get(pos..end)
        .ok_or_else(|| format!("expected {needed} data bytes, got {}", bytes.len() - pos))?;

    let mut data = decode(header.dtype, raw);
    if header.fortran_order && header.shape.len() > 1 {
        data = fortran_to_c(&data, &header.shape);
    }

    Ok(NpyArray {
        shape: header.shape,
        data,
    })
}

fn parse_header(text: &str) -> Result<Header, String> {
    let descr = quoted_value(text, "descr").ok_or("header has no 'descr'")?;
    let dtype = parse_descr(descr)?;

    let fortran_order = match raw_value(text, "fortran_order") {
        Some(v) if v.starts_with("True") => true,
        Some(v) if v.starts_with("False") => false,
        _ => return Err("header has no 'fortran_order'".to_string()),
    };

    let shape_src = raw_value(text, "shape").ok_or("header has no 'shape'")?;
    let open = shape_src.find('(').ok_or("malformed 'shape'")?;
    let close = shape_src.find(')').ok_or("malformed 'shape'")?;
    let mut shape = Vec::new();
    for part in shape_src[open + 1..close].split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        // numpy on some platforms writes dims as `10L`
        let part = part.trim_end_matches('L');
        shape.push(
            part.parse::<usize>()
                .map_err(|_| format!("bad dimension '{part}'"))?,
        );
    }

    Ok(Header {
        dtype,
        fortran_order,
        shape,
    })
}

/// Text following `'key':`, with leading whitespace removed.
fn raw_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let needle_single = format!("'{key}'");
    let needle_double = format!("\"{key}\"");
    let start = text
        .find(&needle_single)
        .map(|i| i + needle_single.len())
        .or_else(|| text.find(&needle_double).map(|i| i + needle_double.len()))?;
    let rest = text[start..].trim_start();
    let rest = rest.strip_prefix(':')?;
    Some(rest.trim_start())
}

fn quoted_value<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let rest = raw_value(text, key)?;
    let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    let body = &rest[1..];
    let end = body.find(quote)?;
    Some(&body[..end])
}

fn parse_descr(descr: &str) -> Result<Dtype, String> {
    let mut chars = descr.chars();
    let order = chars.next().ok_or("empty dtype")?;
    let (big_endian, code) = match order {
        '<' | '=' | '|' => (false, chars.as_str()),
        '>' => (true, chars.as_str()),
        _ => (false, descr),
    };

    let kind = match code {
        "f4" => Kind::F32,
        "f8" => Kind::F64,
        "i1" => Kind::I8,
        "i2" => Kind::I16,
        "i4" => Kind::I32,
        "i8" => Kind::I64,
        "u1" => Kind::U8,
        "u2" => Kind::U16,
        "u4" => Kind::U32,
        "u8" => Kind::U64,
        "b1" => Kind::Bool,
        _ => return Err(format!("unsupported dtype '{descr}'")),
    };

    Ok(Dtype { kind, big_endian })
}

fn decode(dtype: Dtype, raw: &[u8]) -> Vec<f32> {
    let big_endian = dtype.big_endian;

    macro_rules! convert {
        ($t:ty) => {
            raw.chunks_exact(std::mem::size_of::<$t>())
                .map(|chunk| {
                    let mut buf = [0u8; std::mem::size_of::<$t>()];
                    buf.copy_from_slice(chunk);
                    let v = if big_endian {
                        <$t>::from_be_bytes(buf)
                    } else {
                        <$t>::from_le_bytes(buf)
                    };
                    v as f32
                })
                .collect()
        };
    }

    match dtype.kind {
        Kind::F32 => convert!(f32),
        Kind::F64 => convert!(f64),
        Kind::I8 => convert!(i8),
        Kind::I16 => convert!(i16),
        Kind::I32 => convert!(i32),
        Kind::I64 => convert!(i64),
        Kind::U8 => convert!(u8),
        Kind::U16 => convert!(u16),
        Kind::U32 => convert!(u32),
        Kind::U64 => convert!(u64),
        Kind::Bool => raw.iter().map(|&b| if b != 0 { 1.0 } else { 0.0 }).collect(),
    }
}

fn fortran_to_c(data: &[f32], shape: &[usize]) -> Vec<f32> {
    let rank = shape.len();
    let mut f_strides = vec![1_usize; rank];
    for i in 1..rank {
        f_strides[i] = f_strides[i - 1] * shape[i - 1];
    }

    let mut out = Vec::with_capacity(data.len());
    let mut index = vec![0_usize; rank];
    for _ in 0..data.len() {
        let offset: usize = index.iter().zip(&f_strides).map(|(i, s)| i * s).sum();
        out.push(data[offset]);
        // advance the C-order index, last axis fastest
        for axis in (0..rank).rev() {
            index[axis] += 1;
            if index[axis] < shape[axis] {
                break;
            }
            index[axis] = 0;
        }
    }
    out
}
