//! Flash Control Block parsing and the NAND geometry it describes.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{Error, Result};

/// Minimum number of bytes the parser reads starting at the FCB header.
/// Covers every field up to and including `bch_type` at offset 136.
pub const FCB_HEADER_LEN: usize = 140;

const MAGIC: &[u8; 4] = b"FCB ";

/// Finds the first occurrence of the `"FCB "` magic in `dump` and returns
/// the offset of the FCB *header* (4 bytes before the magic, since the
/// magic itself sits at header offset 4).
///
/// Returns `None` if the magic is absent, or found before offset 4 (there
/// would be no room for the header that precedes it).
pub fn locate(dump: &[u8]) -> Option<usize> {
    dump.windows(MAGIC.len())
        .position(|w| w == MAGIC)
        .filter(|&i| i >= 4)
        .map(|i| i - 4)
}

fn u32le(b: &[u8], offset: usize) -> u32 {
    LittleEndian::read_u32(&b[offset..offset + 4])
}

/// NAND geometry and ECC layout, decoded from an FCB header.
///
/// Immutable after construction except through the `set_*` overrides, which
/// recompute any derived value they affect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub version: u32,
    pub page_data_size: u32,
    pub total_page_size: u32,
    pub sectors_per_block: u32,
    pub nb_nands: u32,
    pub ecc_blockn_t: u32,
    pub ecc_block0_data_size: u32,
    pub ecc_blockn_data_size: u32,
    pub ecc_block0_t: u32,
    pub metadata_bytes: u32,
    pub nb_ecc_blocks_per_page: u32,
    pub fw1_start: u32,
    pub fw2_start: u32,
    pub pages_fw1: u32,
    pub pages_fw2: u32,
    pub bb_marker: u32,
    pub bb_marker_bits: u32,
    pub bch_type: u32,
    /// Physical byte offset in the raw page where the bad-block marker
    /// currently sits. Derived; recomputed by `set_bad_block_marker`,
    /// `set_metadata_bytes` and `set_ecc_size_bits`.
    pub marker_raw_offset: usize,
}

impl Geometry {
    /// Parses a `Geometry` out of an FCB header. `content` must contain at
    /// least [`FCB_HEADER_LEN`] bytes, the first of which is the header
    /// start (the magic is expected at `content[4..8]`).
    pub fn parse(content: &[u8]) -> Result<Geometry> {
        if content.len() < 132 {
            return Err(Error::FcbTooShort);
        }
        let magic = &content[4..8];
        if magic != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(magic);
            return Err(Error::FcbBadMagic { found });
        }

        let version = BigEndian::read_u32(&content[8..12]);
        let page_data_size = u32le(content, 20);
        let total_page_size = u32le(content, 24);
        let sectors_per_block = u32le(content, 28);
        let nb_nands = u32le(content, 32);
        let ecc_blockn_t = u32le(content, 44);
        let ecc_block0_data_size = u32le(content, 48);
        let ecc_blockn_data_size = u32le(content, 52);
        let ecc_block0_t = u32le(content, 56);
        let metadata_bytes = u32le(content, 60);
        let nb_ecc_blocks_per_page = u32le(content, 64);
        let fw1_start = u32le(content, 104);
        let fw2_start = u32le(content, 108);
        let pages_fw1 = u32le(content, 112);
        let pages_fw2 = u32le(content, 116);
        let bb_marker = u32le(content, 124);
        let bb_marker_bits = u32le(content, 128);
        let bch_type = if content.len() >= FCB_HEADER_LEN { u32le(content, 136) } else { 0 };

        let marker_raw_offset = compute_marker_raw_offset(
            metadata_bytes,
            ecc_block0_t,
            ecc_blockn_t,
            ecc_blockn_data_size,
            bb_marker,
        );

        Ok(Geometry {
            version,
            page_data_size,
            total_page_size,
            sectors_per_block,
            nb_nands,
            ecc_blockn_t,
            ecc_block0_data_size,
            ecc_blockn_data_size,
            ecc_block0_t,
            metadata_bytes,
            nb_ecc_blocks_per_page,
            fw1_start,
            fw2_start,
            pages_fw1,
            pages_fw2,
            bb_marker,
            bb_marker_bits,
            bch_type,
            marker_raw_offset,
        })
    }

    /// Bytes of ECC per Block0 codeword, `⌈26·ecc_block0_t/8⌉`.
    pub fn ecc_block0_bytes(&self) -> usize {
        ceil_div(26 * self.ecc_block0_t as usize, 8)
    }

    /// Bytes of ECC per BlockN codeword, `⌈26·ecc_blockn_t/8⌉`.
    pub fn ecc_blockn_bytes(&self) -> usize {
        ceil_div(26 * self.ecc_blockn_t as usize, 8)
    }

    /// Total bytes produced per page once split: Block0 plus every BlockN.
    pub fn output_page_size(&self) -> usize {
        self.ecc_block0_data_size as usize
            + self.nb_ecc_blocks_per_page as usize * self.ecc_blockn_data_size as usize
    }

    /// Validates the invariants from the data model: derived sizes must not
    /// exceed `total_page_size`, and no block/ecc size may be zero.
    pub fn validate(&self) -> Result<()> {
        if self.ecc_block0_data_size == 0 || self.ecc_blockn_data_size == 0 {
            return Err(Error::GeometryInvalid("data block size is zero".into()));
        }
        if self.ecc_block0_t == 0 || self.ecc_blockn_t == 0 {
            return Err(Error::GeometryInvalid("ECC strength t is zero".into()));
        }
        let required = self.metadata_bytes as usize
            + self.ecc_block0_data_size as usize
            + self.ecc_block0_bytes()
            + self.nb_ecc_blocks_per_page as usize
                * (self.ecc_blockn_data_size as usize + self.ecc_blockn_bytes());
        if (self.total_page_size as usize) < required {
            return Err(Error::GeometryInvalid(format!(
                "total_page_size {} is smaller than the {} bytes the block layout requires",
                self.total_page_size, required
            )));
        }
        Ok(())
    }

    /// Forces the metadata region size, recomputing `marker_raw_offset`.
    pub fn set_metadata_bytes(&mut self, metadata_bytes: u32) {
        self.metadata_bytes = metadata_bytes;
        self.recompute_marker_raw_offset();
    }

    /// Forces the page data size. Does not touch any other field.
    pub fn set_page_data_size(&mut self, page_data_size: u32) {
        self.page_data_size = page_data_size;
    }

    /// Forces the bad-block marker's logical byte offset, recomputing
    /// `marker_raw_offset`.
    pub fn set_bad_block_marker(&mut self, bb_marker: u32) {
        self.bb_marker = bb_marker;
        self.recompute_marker_raw_offset();
    }

    /// Sets both Block0 and BlockN ECC strength from a total ECC size in
    /// bits: `t = ⌊bits/26⌋`. Recomputes `marker_raw_offset` since it
    /// depends on both strengths.
    pub fn set_ecc_size_bits(&mut self, bits: u32) {
        let t = bits / 26;
        self.ecc_block0_t = t;
        self.ecc_blockn_t = t;
        self.recompute_marker_raw_offset();
    }

    fn recompute_marker_raw_offset(&mut self) {
        self.marker_raw_offset = compute_marker_raw_offset(
            self.metadata_bytes,
            self.ecc_block0_t,
            self.ecc_blockn_t,
            self.ecc_blockn_data_size,
            self.bb_marker,
        );
    }
}

fn ceil_div(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}

/// `⌈n/d⌉` for a possibly-negative `n` and positive `d`, rounding toward
/// `+∞` the way Python's `math.ceil` does (e.g. `ceil_div_signed(-208, 8)`
/// is `-26`, not `-27`).
fn ceil_div_signed(n: i64, d: i64) -> i64 {
    let q = n.div_euclid(d);
    let r = n.rem_euclid(d);
    if r == 0 {
        q
    } else {
        q + 1
    }
}

fn compute_marker_raw_offset(
    metadata_bytes: u32,
    ecc_block0_t: u32,
    ecc_blockn_t: u32,
    ecc_blockn_data_size: u32,
    bb_marker: u32,
) -> usize {
    if ecc_blockn_data_size == 0 {
        return metadata_bytes as usize;
    }
    // `marker_page - 1` is negative whenever the marker falls in the first
    // BlockN (the common case of `bb_marker < ecc_blockn_data_size`); the
    // ceil-division below must round that negative intermediate the same
    // way the original tool's Python `math.ceil` does, not clamp it to 0.
    let marker_page = (bb_marker / ecc_blockn_data_size) as i64;
    let block0_ecc_bytes = ceil_div(26 * ecc_block0_t as usize, 8) as i64;
    let blockn_ecc_bits = (marker_page - 1) * 26 * ecc_blockn_t as i64;
    let blockn_ecc_bytes = ceil_div_signed(blockn_ecc_bits, 8);
    let offset = metadata_bytes as i64 + block0_ecc_bytes + blockn_ecc_bytes + bb_marker as i64;
    offset.max(0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fcb_bytes() -> Vec<u8> {
        let mut b = vec![0u8; FCB_HEADER_LEN];
        b[4..8].copy_from_slice(b"FCB ");
        BigEndian::write_u32(&mut b[8..12], 1);
        LittleEndian::write_u32(&mut b[20..24], 2048); // page_data_size
        LittleEndian::write_u32(&mut b[24..28], 2162); // total_page_size
        LittleEndian::write_u32(&mut b[28..32], 64); // sectors_per_block
        LittleEndian::write_u32(&mut b[32..36], 1); // nb_nands
        LittleEndian::write_u32(&mut b[44..48], 8); // ecc_blockn_t
        LittleEndian::write_u32(&mut b[48..52], 512); // ecc_block0_data_size
        LittleEndian::write_u32(&mut b[52..56], 512); // ecc_blockn_data_size
        LittleEndian::write_u32(&mut b[56..60], 8); // ecc_block0_t
        LittleEndian::write_u32(&mut b[60..64], 10); // metadata_bytes
        LittleEndian::write_u32(&mut b[64..68], 3); // nb_ecc_blocks_per_page
        LittleEndian::write_u32(&mut b[104..108], 10); // fw1_start
        LittleEndian::write_u32(&mut b[108..112], 40); // fw2_start
        LittleEndian::write_u32(&mut b[112..116], 20); // pages_fw1
        LittleEndian::write_u32(&mut b[116..120], 20); // pages_fw2
        LittleEndian::write_u32(&mut b[124..128], 0); // bb_marker
        LittleEndian::write_u32(&mut b[128..132], 0); // bb_marker_bits
        LittleEndian::write_u32(&mut b[136..140], 1); // bch_type
        b
    }

    #[test]
    fn locate_scenario_a() {
        // Magic starts at absolute index 4, so per the locator's own
        // contract (header = magic_index - 4) the header sits at 0.
        let mut dump = vec![0u8; 4];
        dump.extend_from_slice(b"FCB ");
        dump.extend(std::iter::repeat(0u8).take(200));
        assert_eq!(locate(&dump), Some(0));
    }

    #[test]
    fn locate_scenario_b_too_early() {
        let mut dump = Vec::new();
        dump.extend_from_slice(b"FCB ");
        dump.extend(std::iter::repeat(0u8).take(200));
        assert_eq!(locate(&dump), None);
    }

    #[test]
    fn locate_absent() {
        let dump = vec![0u8; 64];
        assert_eq!(locate(&dump), None);
    }

    #[test]
    fn parse_fields() {
        let geo = Geometry::parse(&fcb_bytes()).unwrap();
        assert_eq!(geo.version, 1);
        assert_eq!(geo.page_data_size, 2048);
        assert_eq!(geo.total_page_size, 2162);
        assert_eq!(geo.ecc_block0_t, 8);
        assert_eq!(geo.ecc_blockn_t, 8);
        assert_eq!(geo.nb_ecc_blocks_per_page, 3);
        assert_eq!(geo.fw1_start, 10);
        assert_eq!(geo.pages_fw1, 20);
    }

    #[test]
    fn too_short_fails() {
        let short = vec![0u8; 50];
        assert!(matches!(Geometry::parse(&short), Err(Error::FcbTooShort)));
    }

    #[test]
    fn bad_magic_fails() {
        let mut b = fcb_bytes();
        b[4..8].copy_from_slice(&hex_literal::hex!("58 58 58 58")); // "XXXX"
        assert!(matches!(Geometry::parse(&b), Err(Error::FcbBadMagic { .. })));
    }

    #[test]
    fn override_composition_is_independent() {
        let mut geo = Geometry::parse(&fcb_bytes()).unwrap();
        let before_metadata = geo.metadata_bytes;
        let before_ecc0 = geo.ecc_block0_t;
        let before_bb = geo.bb_marker;
        geo.set_page_data_size(4096);
        assert_eq!(geo.page_data_size, 4096);
        assert_eq!(geo.metadata_bytes, before_metadata);
        assert_eq!(geo.ecc_block0_t, before_ecc0);
        assert_eq!(geo.bb_marker, before_bb);
    }

    #[test]
    fn set_ecc_size_bits_updates_both_strengths() {
        let mut geo = Geometry::parse(&fcb_bytes()).unwrap();
        geo.set_ecc_size_bits(260); // 260 / 26 = 10
        assert_eq!(geo.ecc_block0_t, 10);
        assert_eq!(geo.ecc_blockn_t, 10);
    }

    #[test]
    fn output_page_size_matches_scenario_d() {
        let geo = Geometry::parse(&fcb_bytes()).unwrap();
        assert_eq!(geo.output_page_size(), 512 * 4);
    }

    #[test]
    fn marker_raw_offset_handles_marker_page_zero() {
        // bb_marker = 0 < ecc_blockn_data_size (512), so marker_page = 0 and
        // the (marker_page - 1) term is negative: metadata(10) +
        // block0_ecc_bytes(26) + ceil(-208/8)=-26 + bb_marker(0) = 10.
        let geo = Geometry::parse(&fcb_bytes()).unwrap();
        assert_eq!(geo.marker_raw_offset, 10);
    }

    #[test]
    fn marker_raw_offset_handles_marker_page_one() {
        let mut geo = Geometry::parse(&fcb_bytes()).unwrap();
        geo.set_bad_block_marker(600); // marker_page = 600 / 512 = 1
        assert_eq!(geo.marker_raw_offset, 10 + 26 + 0 + 600);
    }

    #[test]
    fn validate_accepts_well_formed_geometry() {
        let geo = Geometry::parse(&fcb_bytes()).unwrap();
        assert!(geo.validate().is_ok());
    }

    #[test]
    fn validate_rejects_too_small_total_page_size() {
        let mut geo = Geometry::parse(&fcb_bytes()).unwrap();
        geo.total_page_size = 10;
        assert!(geo.validate().is_err());
    }
}
