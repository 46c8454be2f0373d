use std::io::{Cursor, Read};

use crate::error::{EngineError, Result};

pub mod npy;

pub type Features = Vec<Vec<f32>>;
pub type Labels = Vec<f32>;

/// Decodes a NumPy `.npz` archive holding `x` (samples × features) and
/// `y` (samples). No member may decompress to more than `max_member_bytes`.
pub fn decode_training_archive(
    bytes: &[u8],
    max_member_bytes: usize,
) -> Result<(Features, Labels)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| EngineError::MalformedArchive(format!("not an npz archive: {e}")))?;

    let limit = u64::try_from(max_member_bytes).unwrap_or(u64::MAX);
    let x = read_member(&mut archive, "x", limit)?;
    let y = read_member(&mut archive, "y", limit)?;

    let (samples, width) = match x.shape.as_slice() {
        [n, d] => (*n, *d),
        other => {
            return Err(EngineError::MalformedArchive(format!(
                "array 'x' must be 2-D, got shape {other:?}"
            )));
        }
    };

    let label_count = match y.shape.as_slice() {
        [n] | [n, 1] => *n,
        other => {
            return Err(EngineError::MalformedArchive(format!(
                "array 'y' must be 1-D, got shape {other:?}"
            )));
        }
    };

    if label_count != samples {
        return Err(EngineError::MalformedArchive(format!(
            "'x' has {samples} samples but 'y' has {label_count}"
        )));
    }

    let features = if width == 0 {
        vec![Vec::new(); samples]
    } else {
        x.data.chunks(width).map(<[f32]>::to_vec).collect()
    };

    Ok((features, y.data))
}

fn read_member(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    limit: u64,
) -> Result<npy::NpyArray> {
    let mut file = match archive.by_name(&format!("{name}.npy")) {
        Ok(f) => f,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(EngineError::MalformedArchive(format!(
                "missing array '{name}'"
            )));
        }
        Err(e) => {
            return Err(EngineError::MalformedArchive(format!(
                "array '{name}': {e}"
            )));
        }
    };

    let too_large = || {
        EngineError::MalformedArchive(format!(
            "array '{name}' decompresses to more than {limit} bytes"
        ))
    };
    if file.size() > limit {
        return Err(too_large());
    }

    // the declared size is not trusted; stop one byte past the limit
    let mut buf = Vec::new();
    (&mut file)
        .take(limit.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|e| EngineError::MalformedArchive(format!("array '{name}': {e}")))?;
    if buf.len() as u64 > limit {
        return Err(too_large());
    }

    npy::parse(&buf).map_err(|e| EngineError::MalformedArchive(format!("array '{name}': {e}")))
}

/// Interprets the whole buffer as one sample of little-endian `f32`s.
pub fn decode_inference_buffer(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(EngineError::MalformedBuffer(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
