//! Format detection: classify fetched bytes by content sniffing.
//!
//! ## Why sniff instead of trusting the URL?
//!
//! Sources arrive as presigned storage URLs whose paths often carry no
//! extension at all (`/download?id=…`), or a wrong one. The first bytes of
//! the payload are the only reliable signal. Every downstream stage matches
//! exhaustively on the resulting [`SourceKind`], so adding a format is a
//! compile-time-checked extension point rather than a stringly-typed guess.

/// Content classification of one fetched source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A PDF document (`%PDF` signature).
    Pdf,
    /// A raster image in one of the supported formats.
    Image(ImageKind),
    /// No recognized signature. Surfaced as an `UnsupportedFormat` source
    /// error, never a crash.
    Unknown,
}

/// Raster formats the normalizer knows how to wrap into a PDF page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
    Gif,
    Bmp,
    Tiff,
    Webp,
}

/// Number of leading bytes [`detect`] looks at; also the slice reported in
/// `UnsupportedFormat` errors.
pub const SNIFF_LEN: usize = 12;

/// Classify raw bytes by their leading signature.
pub fn detect(bytes: &[u8]) -> SourceKind {
    if bytes.starts_with(b"%PDF") {
        return SourceKind::Pdf;
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return SourceKind::Image(ImageKind::Jpeg);
    }
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        return SourceKind::Image(ImageKind::Png);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return SourceKind::Image(ImageKind::Gif);
    }
    if bytes.starts_with(b"BM") {
        return SourceKind::Image(ImageKind::Bmp);
    }
    // TIFF: little-endian II*\0 or big-endian MM\0*
    if bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00]) || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A])
    {
        return SourceKind::Image(ImageKind::Tiff);
    }
    // WEBP: RIFF container with WEBP fourcc at offset 8
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return SourceKind::Image(ImageKind::Webp);
    }
    SourceKind::Unknown
}

/// The leading bytes to report when classification fails.
pub fn sniff_prefix(bytes: &[u8]) -> Vec<u8> {
    bytes[..bytes.len().min(SNIFF_LEN)].to_vec()
}
