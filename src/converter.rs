//! Drives the page splitter across a whole dump or a firmware subrange.

use crate::bch::BchDecoder;
use crate::error::{Error, Result};
use crate::fcb::Geometry;
use crate::splitter::split_page;
use crate::stats::EccStats;

/// What subset of the dump to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every page in the dump.
    Full,
    /// Only the pages belonging to firmware 1 or 2, as located by the FCB.
    Firmware(u32),
}

/// Converts `dump` according to `mode`, optionally correcting ECC, and
/// reports progress as `(pages_done, pages_total)` after every page.
///
/// Returns the linearised output and the ECC statistics accumulated over
/// the run (all-zero if `correct_ecc` is `false`).
pub fn convert(
    dump: &[u8],
    geo: &Geometry,
    mode: Mode,
    correct_ecc: bool,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<(Vec<u8>, EccStats)> {
    let total_page_size = geo.total_page_size as usize;

    let region = match mode {
        Mode::Full => dump,
        Mode::Firmware(id) => {
            let (start_page, page_count) = match id {
                1 => (geo.fw1_start as usize, geo.pages_fw1 as usize),
                2 => (geo.fw2_start as usize, geo.pages_fw2 as usize),
                other => return Err(Error::FirmwareIdInvalid(other)),
            };
            let start = start_page.saturating_mul(total_page_size).min(dump.len());
            let end = start
                .saturating_add(page_count.saturating_mul(total_page_size))
                .min(dump.len());
            &dump[start..end]
        }
    };

    let npages = region.len() / total_page_size;
    let bch = if correct_ecc { Some(BchDecoder::new()) } else { None };
    let mut stats = EccStats::new();
    let mut output = Vec::with_capacity(npages * geo.output_page_size());

    for i in 0..npages {
        let page = &region[i * total_page_size..(i + 1) * total_page_size];
        let block = split_page(page, geo, bch.as_ref(), &mut stats)?;
        output.extend_from_slice(&block);
        on_progress(i + 1, npages);
    }

    Ok((output, stats))
}
