use std::fmt;

/// Everything that can abort a run. Per-page ECC outcomes are not errors —
/// they are recovered locally and folded into [`crate::stats::EccStats`].
#[derive(Debug)]
pub enum Error {
    /// The `"FCB "` magic could not be found, or was found before byte offset 4.
    FcbNotFound,
    /// Fewer than 132 bytes were available starting at the claimed FCB offset.
    FcbTooShort,
    /// The magic at header offset 4 was present but did not read `"FCB "`.
    FcbBadMagic { found: [u8; 4] },
    /// The geometry's derived sizes are inconsistent with `total_page_size`,
    /// or produce a zero-length block.
    GeometryInvalid(String),
    /// A page buffer ran out of bytes before the next block/ecc extraction.
    PageTruncated { needed: usize, available: usize },
    /// `firmware_id` was not 1 or 2.
    FirmwareIdInvalid(u32),
    /// A file read or write failed.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::FcbNotFound => write!(f, "FCB not found, check your dump"),
            Error::FcbTooShort => write!(f, "FCB content must contain at least 132 bytes"),
            Error::FcbBadMagic { found } => {
                write!(f, "wrong FCB magic value ({found:02x?} instead of \"FCB \")")
            }
            Error::GeometryInvalid(reason) => write!(f, "invalid NAND geometry: {reason}"),
            Error::PageTruncated { needed, available } => write!(
                f,
                "page buffer truncated: needed {needed} bytes but only {available} remained"
            ),
            Error::FirmwareIdInvalid(id) => write!(f, "firmware index must be 1 or 2, got {id}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
