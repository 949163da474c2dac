//! EXIF orientation extraction from JPEG byte streams.
//!
//! The resolver walks the JPEG marker segments looking for the APP1 `Exif`
//! container, then reads IFD0 of the embedded TIFF structure until it finds
//! the orientation tag. Orientation correction is best-effort: every parse
//! failure collapses to [`Orientation::Normal`] so an upload is never
//! rejected because of its metadata.

use std::io::{Cursor, Read, Seek, SeekFrom};

use thiserror::Error;

use super::Orientation;

// JPEG markers
const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const MARKER_PREFIX: u8 = 0xFF;
const MARKER_APP1: u8 = 0xE1;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;
const MARKER_TEM: u8 = 0x01;

const EXIF_HEADER: &[u8; 6] = b"Exif\0\0";

// TIFF structure
const TIFF_LE: [u8; 2] = *b"II";
const TIFF_BE: [u8; 2] = *b"MM";
const TIFF_MAGIC: u16 = 42;
const TAG_ORIENTATION: u16 = 0x0112;
const TYPE_SHORT: u16 = 3;
const MAX_IFD_ENTRIES: u16 = 1000;

/// Why orientation metadata could not be read.
///
/// Never surfaced past [`resolve_orientation`]; kept as a type so the
/// fallback reason can be logged.
#[derive(Debug, Error)]
pub enum OrientationParseError {
    #[error("expected marker prefix at offset {0}")]
    InvalidMarker(usize),

    #[error("segment at offset {offset} has invalid length {length}")]
    InvalidSegmentLength { offset: usize, length: usize },

    #[error("segment at offset {0} runs past end of data")]
    TruncatedSegment(usize),

    #[error("unknown TIFF byte order {0:?}")]
    UnknownByteOrder([u8; 2]),

    #[error("bad TIFF magic {0}")]
    BadMagic(u16),

    #[error("IFD offset {0} outside metadata payload")]
    IfdOutOfBounds(u32),

    #[error("too many IFD entries ({0})")]
    TooManyEntries(u16),

    #[error("orientation tag has type {typ} and count {count}")]
    MalformedTag { typ: u16, count: u32 },

    #[error("metadata truncated: {0}")]
    Truncated(#[from] std::io::Error),
}

/// Check if a byte slice starts with the JPEG start-of-image marker.
#[inline]
pub fn has_jpeg_signature(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[..2] == JPEG_SOI
}

/// Resolve the physical orientation of an uploaded photo.
///
/// Returns `Orientation::Normal` when the bytes are not a JPEG, carry no
/// EXIF container, have no orientation tag, or are malformed in any way.
pub fn resolve_orientation(bytes: &[u8]) -> Orientation {
    match read_orientation_code(bytes) {
        Ok(Some(code @ 1..=8)) => Orientation::from(code as u32),
        Ok(Some(code)) => {
            log::debug!("ignoring out-of-range orientation code {}", code);
            Orientation::Normal
        }
        Ok(None) => Orientation::Normal,
        Err(e) => {
            log::debug!("orientation metadata unreadable, assuming upright: {}", e);
            Orientation::Normal
        }
    }
}

/// Read the raw orientation tag value, if one is present.
///
/// `Ok(None)` means the stream legitimately has no orientation (not a JPEG,
/// no EXIF segment, or no orientation tag).
pub fn read_orientation_code(bytes: &[u8]) -> Result<Option<u16>, OrientationParseError> {
    if !has_jpeg_signature(bytes) {
        return Ok(None);
    }

    let mut offset = JPEG_SOI.len();
    while offset + 4 <= bytes.len() {
        if bytes[offset] != MARKER_PREFIX {
            return Err(OrientationParseError::InvalidMarker(offset));
        }

        let marker = bytes[offset + 1];
        match marker {
            // Fill byte before the real marker
            MARKER_PREFIX => {
                offset += 1;
                continue;
            }
            // Image data starts; metadata segments always precede it
            MARKER_SOS | MARKER_EOI => return Ok(None),
            // Standalone markers carry no length field
            0xD0..=0xD7 | MARKER_TEM => {
                offset += 2;
                continue;
            }
            _ => {}
        }

        let length = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]) as usize;
        if length < 2 {
            return Err(OrientationParseError::InvalidSegmentLength { offset, length });
        }
        let end = offset + 2 + length;
        if end > bytes.len() {
            return Err(OrientationParseError::TruncatedSegment(offset));
        }

        if marker == MARKER_APP1 {
            let payload = &bytes[offset + 4..end];
            // APP1 is also used for XMP; only the EXIF flavour is interesting
            if let Some(tiff) = payload.strip_prefix(EXIF_HEADER.as_slice()) {
                return read_tiff_orientation(tiff);
            }
        }

        offset = end;
    }

    Ok(None)
}

/// Scan IFD0 of a TIFF structure for the orientation tag.
fn read_tiff_orientation(tiff: &[u8]) -> Result<Option<u16>, OrientationParseError> {
    let mut cursor = Cursor::new(tiff);

    let mut order = [0u8; 2];
    cursor.read_exact(&mut order)?;
    let little_endian = match order {
        TIFF_LE => true,
        TIFF_BE => false,
        other => return Err(OrientationParseError::UnknownByteOrder(other)),
    };

    let magic = read_u16(&mut cursor, little_endian)?;
    if magic != TIFF_MAGIC {
        return Err(OrientationParseError::BadMagic(magic));
    }

    let ifd0_offset = read_u32(&mut cursor, little_endian)?;
    if ifd0_offset as usize >= tiff.len() {
        return Err(OrientationParseError::IfdOutOfBounds(ifd0_offset));
    }
    cursor.seek(SeekFrom::Start(ifd0_offset as u64))?;

    let entry_count = read_u16(&mut cursor, little_endian)?;
    if entry_count > MAX_IFD_ENTRIES {
        return Err(OrientationParseError::TooManyEntries(entry_count));
    }

    for _ in 0..entry_count {
        let tag = read_u16(&mut cursor, little_endian)?;
        let typ = read_u16(&mut cursor, little_endian)?;
        let count = read_u32(&mut cursor, little_endian)?;
        let mut value = [0u8; 4];
        cursor.read_exact(&mut value)?;

        if tag != TAG_ORIENTATION {
            continue;
        }
        if typ != TYPE_SHORT || count == 0 {
            return Err(OrientationParseError::MalformedTag { typ, count });
        }
        // A single SHORT is stored left-justified in the value field
        let code = if little_endian {
            u16::from_le_bytes([value[0], value[1]])
        } else {
            u16::from_be_bytes([value[0], value[1]])
        };
        return Ok(Some(code));
    }

    Ok(None)
}

fn read_u16<R: Read>(reader: &mut R, little_endian: bool) -> Result<u16, OrientationParseError> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(if little_endian {
        u16::from_le_bytes(buf)
    } else {
        u16::from_be_bytes(buf)
    })
}

fn read_u32<R: Read>(reader: &mut R, little_endian: bool) -> Result<u32, OrientationParseError> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(if little_endian {
        u32::from_le_bytes(buf)
    } else {
        u32::from_be_bytes(buf)
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Build an APP1 EXIF segment holding a single orientation entry.
    pub fn exif_segment(code: u16, little_endian: bool) -> Vec<u8> {
        let mut tiff = Vec::new();
        if little_endian {
            tiff.extend_from_slice(b"II");
            tiff.extend_from_slice(&42u16.to_le_bytes());
            tiff.extend_from_slice(&8u32.to_le_bytes());
            tiff.extend_from_slice(&2u16.to_le_bytes());
            // An unrelated entry first (ImageWidth) so the scan has to skip
            tiff.extend_from_slice(&0x0100u16.to_le_bytes());
            tiff.extend_from_slice(&3u16.to_le_bytes());
            tiff.extend_from_slice(&1u32.to_le_bytes());
            tiff.extend_from_slice(&[64, 0, 0, 0]);
            tiff.extend_from_slice(&0x0112u16.to_le_bytes());
            tiff.extend_from_slice(&3u16.to_le_bytes());
            tiff.extend_from_slice(&1u32.to_le_bytes());
            tiff.extend_from_slice(&code.to_le_bytes());
            tiff.extend_from_slice(&[0, 0]);
            tiff.extend_from_slice(&0u32.to_le_bytes());
        } else {
            tiff.extend_from_slice(b"MM");
            tiff.extend_from_slice(&42u16.to_be_bytes());
            tiff.extend_from_slice(&8u32.to_be_bytes());
            tiff.extend_from_slice(&2u16.to_be_bytes());
            tiff.extend_from_slice(&0x0100u16.to_be_bytes());
            tiff.extend_from_slice(&3u16.to_be_bytes());
            tiff.extend_from_slice(&1u32.to_be_bytes());
            tiff.extend_from_slice(&[0, 64, 0, 0]);
            tiff.extend_from_slice(&0x0112u16.to_be_bytes());
            tiff.extend_from_slice(&3u16.to_be_bytes());
            tiff.extend_from_slice(&1u32.to_be_bytes());
            tiff.extend_from_slice(&code.to_be_bytes());
            tiff.extend_from_slice(&[0, 0]);
            tiff.extend_from_slice(&0u32.to_be_bytes());
        }

        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&tiff);

        let mut segment = vec![0xFF, 0xE1];
        segment.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        segment.extend_from_slice(&payload);
        segment
    }

    /// Splice an EXIF segment directly after the SOI marker of `jpeg`.
    pub fn with_orientation(jpeg: &[u8], code: u16, little_endian: bool) -> Vec<u8> {
        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&exif_segment(code, little_endian));
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    /// SOI + EXIF segment + EOI, no image data.
    pub fn bare_jpeg(code: u16, little_endian: bool) -> Vec<u8> {
        with_orientation(&[0xFF, 0xD8, 0xFF, 0xD9], code, little_endian)
    }

    /// A real 4x2 JPEG encoded by the `image` crate.
    pub fn encoded_jpeg() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(4, 2, image::Rgb([200, 40, 40]));
        let mut buffer = std::io::Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageFormat::Jpeg)
            .expect("encode fixture jpeg");
        buffer.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_non_jpeg_is_normal() {
        assert_eq!(resolve_orientation(&[]), Orientation::Normal);
        assert_eq!(resolve_orientation(&[0x89, 0x50, 0x4E, 0x47]), Orientation::Normal);
        assert!(read_orientation_code(b"GIF89a").unwrap().is_none());
    }

    #[test]
    fn test_all_codes_little_endian() {
        for code in 1..=8u16 {
            let bytes = bare_jpeg(code, true);
            assert_eq!(resolve_orientation(&bytes), Orientation::from(code as u32));
        }
    }

    #[test]
    fn test_all_codes_big_endian() {
        for code in 1..=8u16 {
            let bytes = bare_jpeg(code, false);
            assert_eq!(resolve_orientation(&bytes).code() as u16, code);
        }
    }

    #[test]
    fn test_jpeg_without_exif_is_normal() {
        let jpeg = encoded_jpeg();
        assert!(read_orientation_code(&jpeg).unwrap().is_none());
        assert_eq!(resolve_orientation(&jpeg), Orientation::Normal);
    }

    #[test]
    fn test_exif_after_other_segments() {
        // APP0 JFIF segment ahead of the EXIF segment
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x07, b'J', b'F', b'I', b'F', 0x00]);
        bytes.extend_from_slice(&exif_segment(6, true));
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        assert_eq!(resolve_orientation(&bytes), Orientation::Rotate90CW);
    }

    #[test]
    fn test_xmp_app1_is_skipped() {
        let mut bytes = vec![0xFF, 0xD8];
        let xmp = b"http://ns.adobe.com/xap/1.0/\0<x/>";
        bytes.extend_from_slice(&[0xFF, 0xE1]);
        bytes.extend_from_slice(&((xmp.len() + 2) as u16).to_be_bytes());
        bytes.extend_from_slice(xmp);
        bytes.extend_from_slice(&exif_segment(3, false));
        assert_eq!(resolve_orientation(&bytes), Orientation::Rotate180);
    }

    #[test]
    fn test_truncated_segment_degrades() {
        let bytes = bare_jpeg(6, true);
        let truncated = &bytes[..20];
        assert!(read_orientation_code(truncated).is_err());
        assert_eq!(resolve_orientation(truncated), Orientation::Normal);
    }

    #[test]
    fn test_every_prefix_degrades_without_panicking() {
        let bytes = bare_jpeg(8, false);
        for end in 0..bytes.len() {
            let orientation = resolve_orientation(&bytes[..end]);
            assert!(orientation == Orientation::Normal || orientation == Orientation::Rotate90CCW);
        }
    }

    #[test]
    fn test_bad_byte_order_degrades() {
        let mut bytes = bare_jpeg(6, true);
        // "II" sits right after SOI(2) + marker(2) + length(2) + "Exif\0\0"(6)
        bytes[12] = b'X';
        assert!(matches!(
            read_orientation_code(&bytes),
            Err(OrientationParseError::UnknownByteOrder(_))
        ));
        assert_eq!(resolve_orientation(&bytes), Orientation::Normal);
    }

    #[test]
    fn test_out_of_range_code_is_normal() {
        let bytes = bare_jpeg(9, true);
        assert_eq!(read_orientation_code(&bytes).unwrap(), Some(9));
        assert_eq!(resolve_orientation(&bytes), Orientation::Normal);
    }

    #[test]
    fn test_garbage_between_segments_degrades() {
        let mut bytes = vec![0xFF, 0xD8, 0x12, 0x34, 0x56, 0x78];
        bytes.extend_from_slice(&exif_segment(6, true));
        assert!(matches!(
            read_orientation_code(&bytes),
            Err(OrientationParseError::InvalidMarker(2))
        ));
        assert_eq!(resolve_orientation(&bytes), Orientation::Normal);
    }

    #[test]
    fn test_agrees_with_kamadak_exif() {
        let jpeg = encoded_jpeg();
        for code in 1..=8u16 {
            for little_endian in [true, false] {
                let bytes = with_orientation(&jpeg, code, little_endian);
                let exif = exif::Reader::new()
                    .read_from_container(&mut Cursor::new(&bytes))
                    .unwrap();
                let expected = exif
                    .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                    .and_then(|f| f.value.get_uint(0))
                    .unwrap();
                assert_eq!(resolve_orientation(&bytes).code() as u32, expected);
            }
        }
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: arbitrary bytes never panic and always yield a valid code.
        #[test]
        fn prop_arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
            let orientation = resolve_orientation(&bytes);
            prop_assert!((1..=8).contains(&orientation.code()));
        }

        /// Property: arbitrary bytes after a JPEG signature never panic.
        #[test]
        fn prop_arbitrary_jpeg_body_never_panics(body in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut bytes = vec![0xFF, 0xD8];
            bytes.extend_from_slice(&body);
            let orientation = resolve_orientation(&bytes);
            prop_assert!((1..=8).contains(&orientation.code()));
        }
    }
}
