//! Normalization: turn fetched bytes into an in-memory PDF document.
//!
//! PDFs pass through a validating parse (`lopdf::Document::load_mem`);
//! images become a one-page document whose page canvas equals the image's
//! pixel dimensions at 72 dpi (1 px = 1 pt), so aspect ratio is preserved
//! exactly and no resampling ever happens.
//!
//! ## Why two embedding paths for images?
//!
//! JPEG data can be placed into a PDF image XObject as-is (`DCTDecode`),
//! avoiding a decode/re-encode generation loss — but only when the JPEG's
//! channel layout maps onto a PDF colour space directly (1 component →
//! `DeviceGray`, 3 components → `DeviceRGB`). Every other input (PNG, GIF,
//! BMP, TIFF, WEBP, and exotic 4-channel JPEGs) is decoded and promoted to
//! RGB8, then embedded as a zlib `FlateDecode` stream, which is lossless
//! with respect to the decoded pixels.
//!
//! This function is CPU-bound; the merge engine runs it under
//! `tokio::task::spawn_blocking`.

use crate::error::SourceError;
use crate::pipeline::detect::{sniff_prefix, ImageKind, SourceKind};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::io::Write;
use tracing::debug;

/// Normalize one fetched source into a PDF document.
///
/// Matches exhaustively on the detected [`SourceKind`]; `Unknown` becomes
/// the `UnsupportedFormat` source error, carrying the sniffed leading bytes
/// for diagnostics.
pub fn normalize(bytes: &[u8], kind: SourceKind, url: &str) -> Result<Document, SourceError> {
    match kind {
        SourceKind::Pdf => parse_pdf(bytes, url),
        SourceKind::Image(image_kind) => image_to_document(bytes, image_kind, url),
        SourceKind::Unknown => Err(SourceError::UnsupportedFormat {
            url: url.to_string(),
            magic: sniff_prefix(bytes),
        }),
    }
}

/// Validating pass-through parse for PDF sources.
fn parse_pdf(bytes: &[u8], url: &str) -> Result<Document, SourceError> {
    let doc = Document::load_mem(bytes).map_err(|e| SourceError::PdfParse {
        url: url.to_string(),
        detail: e.to_string(),
    })?;

    if doc.is_encrypted() {
        return Err(SourceError::PdfParse {
            url: url.to_string(),
            detail: "encrypted PDF documents are not supported".to_string(),
        });
    }

    let page_count = doc.get_pages().len();
    if page_count == 0 {
        return Err(SourceError::PdfParse {
            url: url.to_string(),
            detail: "document has no pages".to_string(),
        });
    }

    debug!(url, pages = page_count, "PDF source parsed");
    Ok(doc)
}

/// Decode a raster image and wrap it into a single-page document.
fn image_to_document(bytes: &[u8], kind: ImageKind, url: &str) -> Result<Document, SourceError> {
    let format = image_format(kind);
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(|e| {
        SourceError::ImageDecode {
            url: url.to_string(),
            detail: e.to_string(),
        }
    })?;

    let (width, height) = (decoded.width(), decoded.height());
    if width == 0 || height == 0 {
        return Err(SourceError::ImageDecode {
            url: url.to_string(),
            detail: "image has zero width or height".to_string(),
        });
    }

    let xobject = match kind {
        // Embed original JPEG bytes when the channel layout maps onto a PDF
        // colour space; otherwise fall through to the RGB path below.
        ImageKind::Jpeg => match jpeg_components(bytes) {
            Some(1) => jpeg_xobject(bytes, width, height, "DeviceGray"),
            Some(3) => jpeg_xobject(bytes, width, height, "DeviceRGB"),
            _ => rgb_xobject(&decoded, url)?,
        },
        _ => rgb_xobject(&decoded, url)?,
    };

    debug!(url, width, height, "image source wrapped into one PDF page");
    Ok(single_page_document(width, height, xobject))
}

fn image_format(kind: ImageKind) -> image::ImageFormat {
    match kind {
        ImageKind::Jpeg => image::ImageFormat::Jpeg,
        ImageKind::Png => image::ImageFormat::Png,
        ImageKind::Gif => image::ImageFormat::Gif,
        ImageKind::Bmp => image::ImageFormat::Bmp,
        ImageKind::Tiff => image::ImageFormat::Tiff,
        ImageKind::Webp => image::ImageFormat::WebP,
    }
}

/// Image XObject embedding the original JPEG scan data (`DCTDecode`).
fn jpeg_xobject(bytes: &[u8], width: u32, height: u32, colorspace: &str) -> Stream {
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => colorspace,
        "BitsPerComponent" => 8,
        "Filter" => "DCTDecode",
    };
    Stream::new(dict, bytes.to_vec()).with_compression(false)
}

/// Image XObject with RGB8-promoted pixels in a zlib stream (`FlateDecode`).
fn rgb_xobject(decoded: &DynamicImage, url: &str) -> Result<Stream, SourceError> {
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(rgb.as_raw())
        .and_then(|_| encoder.finish())
        .map(|data| {
            let dict = dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            };
            Stream::new(dict, data).with_compression(false)
        })
        .map_err(|e| SourceError::ImageDecode {
            url: url.to_string(),
            detail: format!("pixel stream compression failed: {e}"),
        })
}

/// Build a one-page document placing `xobject` over the full page canvas.
///
/// The page's MediaBox is `[0 0 width height]` in points — the 72 dpi
/// fixed-resolution mapping (1 px = 1 pt).
fn single_page_document(width: u32, height: u32, xobject: Stream) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Object::Stream(xobject));

    let operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                (width as i64).into(),
                0.into(),
                0.into(),
                (height as i64).into(),
                0.into(),
                0.into(),
            ],
        ),
        Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
        Operation::new("Q", vec![]),
    ];
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        Dictionary::new(),
        content.encode().unwrap_or_default(),
    ));

    let resources_id = doc.add_object(dictionary! {
        "XObject" => dictionary! {
            "Im0" => Object::Reference(image_id),
        },
    });

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![0.into(), 0.into(), (width as i64).into(), (height as i64).into()],
        "Contents" => Object::Reference(content_id),
        "Resources" => Object::Reference(resources_id),
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", catalog_id);

    doc
}

/// Component count from a JPEG's start-of-frame header.
///
/// Walks the marker chain to the first SOFn marker and reads its component
/// byte. Returns `None` for malformed streams; callers then take the
/// decode-and-promote path instead of embedding the scan data directly.
fn jpeg_components(bytes: &[u8]) -> Option<u8> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut i = 2;
    while i + 4 <= bytes.len() {
        if bytes[i] != 0xFF {
            return None;
        }
        let marker = bytes[i + 1];
        // Standalone markers carry no length field.
        if marker == 0xD8 || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            i += 2;
            continue;
        }
        // Start of scan: no SOF seen before the entropy-coded data.
        if marker == 0xDA {
            return None;
        }
        let len = u16::from_be_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
        let is_sof = matches!(marker, 0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF);
        if is_sof {
            // SOF payload: precision(1) height(2) width(2) components(1)
            if len >= 8 && i + 9 < bytes.len() {
                return Some(bytes[i + 9]);
            }
            return None;
        }
        i += 2 + len;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::detect::detect;
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .expect("png encode");
        buf
    }

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 120, 240]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
            .expect("jpeg encode");
        buf
    }

    fn media_box(doc: &Document) -> Vec<i64> {
        let (_, page_id) = doc.get_pages().into_iter().next().expect("one page");
        let page = doc.get_dictionary(page_id).expect("page dict");
        page.get(b"MediaBox")
            .and_then(|obj| obj.as_array())
            .expect("media box array")
            .iter()
            .map(|o| o.as_i64().expect("integer box coord"))
            .collect()
    }

    #[test]
    fn png_becomes_single_page_matching_dimensions() {
        let bytes = png_bytes(120, 80);
        let kind = detect(&bytes);
        let doc = normalize(&bytes, kind, "https://example.com/img.png").unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(media_box(&doc), vec![0, 0, 120, 80]);
    }

    #[test]
    fn jpeg_page_preserves_aspect_ratio() {
        let bytes = jpeg_bytes(64, 128);
        let kind = detect(&bytes);
        let doc = normalize(&bytes, kind, "https://example.com/photo.jpg").unwrap();
        assert_eq!(doc.get_pages().len(), 1);
        assert_eq!(media_box(&doc), vec![0, 0, 64, 128]);
    }

    #[test]
    fn grayscale_png_promotes_to_rgb() {
        let img = image::GrayImage::from_pixel(10, 10, image::Luma([128]));
        let mut bytes = Vec::new();
        DynamicImage::ImageLuma8(img)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let doc = normalize(&bytes, detect(&bytes), "https://example.com/gray.png").unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn corrupt_image_data_is_a_decode_error() {
        // PNG signature followed by garbage.
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend_from_slice(&[0u8; 16]);
        let result = normalize(&bytes, detect(&bytes), "https://example.com/broken.png");
        assert!(matches!(result, Err(SourceError::ImageDecode { .. })));
    }

    #[test]
    fn unknown_bytes_are_unsupported_format() {
        let bytes = b"<html>not a document</html>";
        let result = normalize(bytes, detect(bytes), "https://example.com/page");
        match result {
            Err(SourceError::UnsupportedFormat { magic, .. }) => {
                assert!(magic.starts_with(b"<html>"));
            }
            other => panic!("expected UnsupportedFormat, got {other:?}"),
        }
    }

    #[test]
    fn truncated_pdf_is_a_parse_error() {
        let bytes = b"%PDF-1.4\nnot really a pdf";
        let result = normalize(bytes, detect(bytes), "https://example.com/bad.pdf");
        assert!(matches!(result, Err(SourceError::PdfParse { .. })));
    }

    #[test]
    fn valid_pdf_passes_through_with_pages_intact() {
        // Round-trip a generated single-page document.
        let mut original = single_page_document(50, 50, jpeg_xobject(&[0xFF], 50, 50, "DeviceRGB"));
        let mut buf = Vec::new();
        original.save_to(&mut buf).unwrap();

        let doc = normalize(&buf, detect(&buf), "https://example.com/ok.pdf").unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn jpeg_component_scan_reads_sof() {
        let bytes = jpeg_bytes(8, 8);
        assert_eq!(jpeg_components(&bytes), Some(3));

        let gray = {
            let img = image::GrayImage::from_pixel(8, 8, image::Luma([7]));
            let mut buf = Vec::new();
            DynamicImage::ImageLuma8(img)
                .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Jpeg)
                .unwrap();
            buf
        };
        assert_eq!(jpeg_components(&gray), Some(1));

        assert_eq!(jpeg_components(b"not a jpeg"), None);
        assert_eq!(jpeg_components(&[0xFF, 0xD8, 0xFF]), None);
    }
}
