//! Media type sniffing over a bounded content prefix.
//!
//! Detection is a fixed magic-number table followed by a text heuristic, so
//! the same prefix always yields the same media type. Anything unrecognized,
//! including an empty prefix, is `application/octet-stream`.

pub const OCTET_STREAM: &str = "application/octet-stream";

const ISO_BMFF_AVIF: &[&[u8]] = &[b"avif", b"avis"];
const ISO_BMFF_HEIC: &[&[u8]] = &[b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1"];
const ISO_BMFF_QUICKTIME: &[&[u8]] = &[b"qt  "];

/// Infer the media type of content from its first bytes
pub fn sniff(prefix: &[u8]) -> &'static str {
    if prefix.is_empty() {
        return OCTET_STREAM;
    }
    if let Some(media_type) = sniff_binary(prefix) {
        return media_type;
    }
    sniff_text(prefix).unwrap_or(OCTET_STREAM)
}

fn sniff_binary(prefix: &[u8]) -> Option<&'static str> {
    if prefix.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some("image/jpeg");
    }
    if prefix.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some("image/png");
    }
    if prefix.starts_with(b"GIF87a") || prefix.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if prefix.len() >= 12 && prefix.starts_with(b"RIFF") && &prefix[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    if prefix.starts_with(b"II*\0") || prefix.starts_with(b"MM\0*") {
        return Some("image/tiff");
    }
    if prefix.len() >= 10 && prefix.starts_with(b"BM") && prefix[6..10] == [0, 0, 0, 0] {
        return Some("image/bmp");
    }
    if prefix.starts_with(&[0x00, 0x00, 0x01, 0x00]) {
        return Some("image/x-icon");
    }
    if prefix.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if prefix.len() >= 12 && &prefix[4..8] == b"ftyp" {
        let brand = &prefix[8..12];
        return Some(if ISO_BMFF_AVIF.contains(&brand) {
            "image/avif"
        } else if ISO_BMFF_HEIC.contains(&brand) {
            "image/heic"
        } else if ISO_BMFF_QUICKTIME.contains(&brand) {
            "video/quicktime"
        } else {
            "video/mp4"
        });
    }
    if prefix.starts_with(&[0x1F, 0x8B]) {
        return Some("application/gzip");
    }
    if prefix.starts_with(b"PK\x03\x04") {
        return Some("application/zip");
    }
    None
}

fn sniff_text(prefix: &[u8]) -> Option<&'static str> {
    let text = utf8_prefix(prefix)?;
    let is_text = text
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r' | '\x0C'));
    if !is_text {
        return None;
    }

    let trimmed = text.trim_start_matches('\u{FEFF}').trim_start();
    let head = trimmed.get(..trimmed.len().min(5)).unwrap_or("").to_ascii_lowercase();
    if head.starts_with("<svg") || (head.starts_with("<?xml") && trimmed.contains("<svg")) {
        return Some("image/svg+xml");
    }
    if head.starts_with("<?xml") {
        return Some("application/xml");
    }
    Some("text/plain")
}

/// The prefix as UTF-8, tolerating a multi-byte character cut off by the bound.
fn utf8_prefix(prefix: &[u8]) -> Option<&str> {
    match std::str::from_utf8(prefix) {
        Ok(text) => Some(text),
        Err(e) if e.error_len().is_none() && e.valid_up_to() > 0 => {
            std::str::from_utf8(&prefix[..e.valid_up_to()]).ok()
        }
        Err(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_image_signatures() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]), "image/jpeg");
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"), "image/png");
        assert_eq!(sniff(b"GIF89a\x01\x00"), "image/gif");
        assert_eq!(sniff(b"RIFF\x24\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff(b"BM\x36\x00\x0c\x00\0\0\0\0\x36\0"), "image/bmp");
        assert_eq!(sniff(b"\0\0\0\x1cftypavif\0\0\0\0"), "image/avif");
        assert_eq!(sniff(b"\0\0\0\x18ftypheic\0\0\0\0"), "image/heic");
        assert_eq!(sniff(b"\0\0\0\x18ftypisom\0\0\0\0"), "video/mp4");
    }

    #[test]
    fn empty_prefix_is_octet_stream() {
        assert_eq!(sniff(&[]), OCTET_STREAM);
    }

    #[test]
    fn text_and_markup() {
        assert_eq!(sniff(b"hello, world\n"), "text/plain");
        assert_eq!(sniff(b"  <svg xmlns=\"http://www.w3.org/2000/svg\"/>"), "image/svg+xml");
        assert_eq!(
            sniff(b"<?xml version=\"1.0\"?>\n<svg></svg>"),
            "image/svg+xml"
        );
        assert_eq!(sniff(b"<?xml version=\"1.0\"?><feed/>"), "application/xml");
    }

    #[test]
    fn truncated_utf8_still_counts_as_text() {
        let mut prefix = "caf".as_bytes().to_vec();
        prefix.push(0xC3); // first byte of 'é', cut off by the bound
        assert_eq!(sniff(&prefix), "text/plain");
    }

    #[test]
    fn binary_garbage_is_octet_stream() {
        assert_eq!(sniff(&[0x00, 0x01, 0x02, 0x03, 0xFE]), OCTET_STREAM);
    }
}
