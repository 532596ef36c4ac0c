//! Run-length zero encoding of intensity vectors.
//!
//! Non-zero intensities are emitted in ascending bin order as positive
//! signed 32-bit words; a run of zero bins between them is emitted as a
//! single negative word holding the run length. The word stream is packed
//! little-endian and handed to [`super::lzf`].

use byteorder::{ByteOrder, LittleEndian};

use super::{lzf, CodecError};

/// Quantities derived while encoding a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanTotals {
    /// Total ion current: sum of all intensities
    pub tic: i64,
    /// Base peak intensity: the maximum intensity
    pub bpi: i32,
    /// Bin index holding the base peak
    pub bpi_bin: i32,
    /// Number of non-zero bins
    pub non_zero_count: i32,
}

struct RlzStream {
    words: Vec<i32>,
    totals: ScanTotals,
    previous_bin: i32,
}

impl RlzStream {
    fn new() -> Self {
        Self {
            words: Vec::new(),
            totals: ScanTotals::default(),
            previous_bin: -1,
        }
    }

    fn push(&mut self, bin: i32, intensity: i32) {
        let skip = bin - self.previous_bin - 1;
        if skip > 0 {
            self.words.push(-skip);
        }
        self.words.push(intensity);
        self.previous_bin = bin;

        self.totals.tic += intensity as i64;
        if intensity > self.totals.bpi {
            self.totals.bpi = intensity;
            self.totals.bpi_bin = bin;
        }
        self.totals.non_zero_count += 1;
    }

    fn finish(self) -> (Vec<u8>, ScanTotals) {
        if self.words.is_empty() {
            return (Vec::new(), self.totals);
        }
        let mut bytes = vec![0u8; self.words.len() * 4];
        LittleEndian::write_i32_into(&self.words, &mut bytes);
        (lzf::compress(&bytes), self.totals)
    }
}

/// Encode a dense intensity vector indexed by bin.
///
/// Returns the compressed BLOB together with the derived totals. The BLOB
/// is empty when every input intensity is zero. Negative intensities are
/// rejected with [`CodecError::InvalidIntensity`].
pub fn encode_scan(intensities: &[i32]) -> Result<(Vec<u8>, ScanTotals), CodecError> {
    let mut stream = RlzStream::new();
    for (bin, &intensity) in intensities.iter().enumerate() {
        if intensity < 0 {
            return Err(CodecError::InvalidIntensity {
                bin: bin as i32,
                value: intensity,
            });
        }
        if intensity > 0 {
            stream.push(bin as i32, intensity);
        }
    }
    Ok(stream.finish())
}

/// Encode a sparse `(bin, intensity)` list sorted by ascending bin.
///
/// Intensities must be strictly positive; zero entries are skipped. The
/// leading zero-run is written as `-(first_bin + time_offset - 1)` when that
/// value is positive, matching the historical producer. With
/// `time_offset == 1` the output is byte-identical to [`encode_scan`] over
/// the densified input.
pub fn encode_scan_sparse(
    pairs: &[(i32, i32)],
    time_offset: i32,
) -> Result<(Vec<u8>, ScanTotals), CodecError> {
    let mut stream = RlzStream::new();
    for &(bin, intensity) in pairs {
        if intensity < 0 {
            return Err(CodecError::InvalidIntensity {
                bin,
                value: intensity,
            });
        }
        if intensity == 0 {
            continue;
        }
        if stream.totals.non_zero_count == 0 {
            let leading = bin + time_offset - 1;
            if leading > 0 {
                stream.words.push(-leading);
            }
            stream.words.push(intensity);
            stream.previous_bin = bin;
            stream.totals.tic = intensity as i64;
            stream.totals.bpi = intensity;
            stream.totals.bpi_bin = bin;
            stream.totals.non_zero_count = 1;
        } else {
            stream.push(bin, intensity);
        }
    }
    Ok(stream.finish())
}

/// Decode an intensity BLOB back to `(bin, intensity)` pairs.
///
/// A negative word advances the bin cursor; a positive word reports an
/// intensity at the cursor and advances it by one. An empty BLOB decodes to
/// an empty list. Bin-range validation is left to the caller, which knows
/// the dataset's bin count.
pub fn decode_scan(blob: &[u8]) -> Result<Vec<(i32, i32)>, CodecError> {
    if blob.is_empty() {
        return Ok(Vec::new());
    }
    let bytes = lzf::decompress(blob)?;
    if bytes.len() % 4 != 0 {
        return Err(CodecError::MisalignedPayload(bytes.len()));
    }

    let mut pairs = Vec::with_capacity(bytes.len() / 8);
    let mut cursor = 0i32;
    for word in bytes.chunks_exact(4) {
        let value = LittleEndian::read_i32(word);
        if value < 0 {
            cursor += -value;
        } else if value > 0 {
            pairs.push((cursor, value));
            cursor += 1;
        }
    }
    Ok(pairs)
}
