//! Container sniffing for synthesized audio.
//!
//! Remote engines rarely send a trustworthy content type, so the first
//! bytes of the payload decide how the clip is decoded.

pub const MPEG: &str = "audio/mpeg";
pub const WAV: &str = "audio/wav";
pub const OGG: &str = "audio/ogg";
pub const MP4: &str = "audio/mp4";

pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [b'I', b'D', b'3', ..] | [0xFF, 0xFB, ..] | [0xFF, 0xFA, ..] => MPEG,
        [b'R', b'I', b'F', b'F', ..] => WAV,
        [b'O', b'g', b'g', b'S', ..] => OGG,
        [_, _, _, _, b'f', b't', b'y', b'p', ..] => MP4,
        _ => MPEG,
    }
}

/// True for content types that can carry raw audio bytes.
pub fn is_binary_audio(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim();
    mime.starts_with("audio/") || mime == "application/octet-stream"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_known_headers() {
        assert_eq!(sniff_mime(b"ID3\x04\0\0"), MPEG);
        assert_eq!(sniff_mime(&[0xFF, 0xFB, 0x90, 0x00]), MPEG);
        assert_eq!(sniff_mime(&[0xFF, 0xFA, 0x90, 0x00]), MPEG);
        assert_eq!(sniff_mime(b"RIFF\x24\0\0\0WAVE"), WAV);
        assert_eq!(sniff_mime(b"OggS\0\x02"), OGG);
        assert_eq!(sniff_mime(b"\0\0\0\x20ftypM4A "), MP4);
    }

    #[test]
    fn unknown_or_short_payloads_default_to_mpeg() {
        assert_eq!(sniff_mime(b""), MPEG);
        assert_eq!(sniff_mime(b"ftyp"), MPEG);
        assert_eq!(sniff_mime(b"<html>"), MPEG);
    }

    #[test]
    fn binary_content_types() {
        assert!(is_binary_audio("audio/mpeg"));
        assert!(is_binary_audio("audio/wav; codecs=1"));
        assert!(is_binary_audio("application/octet-stream"));
        assert!(!is_binary_audio("application/json; charset=utf-8"));
        assert!(!is_binary_audio("text/html"));
    }
}
