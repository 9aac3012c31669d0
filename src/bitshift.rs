//! Bit-level left shift of a byte buffer.
//!
//! Block/ECC regions within a page end on arbitrary bit boundaries (ECC
//! sizes are specified in bits, not bytes). This is the primitive the page
//! splitter uses to re-align the remainder of a page to a byte boundary
//! after each block+ecc extraction.

/// Returns `buf` with its first `nbits` bits discarded, the remainder
/// left-aligned in a freshly allocated buffer.
///
/// Let `q = nbits / 8`, `r = nbits % 8`. When `r == 0` this is a plain
/// slice copy of `buf[q..]`. Otherwise byte `i` of the result is
/// `(buf[q+i] >> r) | (buf[q+i+1] << (8-r))`, treating one byte past the
/// end of `buf` as `0x00`. The result length is `buf.len() - q` (or 0 if
/// `q >= buf.len()`).
pub fn shift(buf: &[u8], nbits: usize) -> Vec<u8> {
    let q = nbits / 8;
    let r = nbits % 8;

    if q >= buf.len() {
        return Vec::new();
    }

    let tail = &buf[q..];
    if r == 0 {
        return tail.to_vec();
    }

    let mut out = Vec::with_capacity(tail.len());
    for i in 0..tail.len() {
        let next = tail.get(i + 1).copied().unwrap_or(0);
        out.push((tail[i] >> r) | (next << (8 - r)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_shift_drops_whole_bytes() {
        assert_eq!(shift(&[0xAA, 0xBB, 0xCC], 8), vec![0xBB, 0xCC]);
    }

    #[test]
    fn unaligned_shift_uses_sentinel_byte() {
        // (0xAA>>4)|(0xBB<<4)=0xBA, (0xBB>>4)|(0xCC<<4)=0xCB, (0xCC>>4)|(0x00<<4)=0x0C.
        let out = shift(&[0xAA, 0xBB, 0xCC], 4);
        assert_eq!(out, vec![0xBA, 0xCB, 0x0C]);
    }

    #[test]
    fn zero_shift_is_identity() {
        let buf = [1u8, 2, 3, 4];
        assert_eq!(shift(&buf, 0), buf.to_vec());
    }

    #[test]
    fn shift_past_end_yields_empty() {
        assert_eq!(shift(&[1, 2, 3], 100), Vec::<u8>::new());
    }

    #[test]
    fn composition_law_matches_common_prefix() {
        let buf: Vec<u8> = (0u8..=250).collect();
        let a = 11usize;
        let b = 13usize;
        let combined = shift(&buf, a + b);
        let stepwise = shift(&shift(&buf, a), b);
        let n = combined.len().min(stepwise.len());
        assert_eq!(&combined[..n], &stepwise[..n]);
    }
}
