//! Embeddable `data:` URIs.

use base64::{engine::general_purpose, Engine as _};

use super::png::{encode_mask_png, encode_png, EncodeError};
use crate::decode::Raster;
use crate::mask::CommittedMask;

const BASE64_MARKER: &str = ";base64,";

/// Wrap already-encoded bytes in a `data:<mime>;base64,` URI.
pub fn to_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{}{}{}", mime, BASE64_MARKER, general_purpose::STANDARD.encode(bytes))
}

/// Encode a raster as an embeddable PNG data URI.
pub fn raster_to_data_uri(raster: &Raster) -> Result<String, EncodeError> {
    Ok(to_data_uri("image/png", &encode_png(raster)?))
}

/// Encode a mask as an embeddable PNG data URI.
pub fn mask_to_data_uri(mask: &CommittedMask) -> Result<String, EncodeError> {
    Ok(to_data_uri("image/png", &encode_mask_png(mask)?))
}

/// True for strings that look like an image data URI.
pub fn is_image_data_uri(s: &str) -> bool {
    s.starts_with("data:image/")
}

/// Extract the bytes of a base64 image data URI.
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, EncodeError> {
    if !is_image_data_uri(uri) {
        return Err(EncodeError::InvalidDataUri("not an image data URI".to_string()));
    }

    let start = uri
        .find(BASE64_MARKER)
        .ok_or_else(|| EncodeError::InvalidDataUri("missing base64 marker".to_string()))?;

    general_purpose::STANDARD
        .decode(uri[start + BASE64_MARKER.len()..].trim())
        .map_err(|e| EncodeError::InvalidDataUri(format!("base64: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raster_data_uri_round_trip() {
        let raster = Raster::filled(2, 2, [9, 8, 7, 255]);
        let uri = raster_to_data_uri(&raster).unwrap();
        assert!(uri.starts_with("data:image/png;base64,"));

        let bytes = decode_data_uri(&uri).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().into_rgba8();
        assert_eq!(Raster::from_rgba_image(decoded), raster);
    }

    #[test]
    fn test_mask_data_uri() {
        let mask = CommittedMask {
            width: 1,
            height: 1,
            data: vec![255],
        };
        assert!(mask_to_data_uri(&mask).unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_decode_rejects_non_image() {
        assert!(decode_data_uri("https://example.com/a.png").is_err());
        assert!(decode_data_uri("data:text/plain;base64,aGk=").is_err());
    }

    #[test]
    fn test_decode_requires_base64_marker() {
        assert!(matches!(
            decode_data_uri("data:image/png,rawbytes"),
            Err(EncodeError::InvalidDataUri(_))
        ));
    }

    #[test]
    fn test_decode_bad_payload() {
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
    }

    #[test]
    fn test_to_data_uri() {
        assert_eq!(to_data_uri("image/jpeg", b"hi"), "data:image/jpeg;base64,aGk=");
    }
}
