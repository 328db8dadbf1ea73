//! Embed generation parameters into PNG files.
//!
//! The WebUI and most viewers read a text chunk with the keyword
//! `parameters`. We splice one in right after IHDR and drop any older
//! chunk with the same keyword.

use thiserror::Error;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
pub const PARAMETERS_KEYWORD: &str = "parameters";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("not a PNG image")]
    NotPng,

    #[error("PNG data truncated at byte {0}")]
    Truncated(usize),

    #[error("PNG does not start with an IHDR chunk")]
    MissingIhdr,
}

struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
    /// Whole chunk including length, type and CRC.
    raw: &'a [u8],
}

fn chunks(png: &[u8]) -> Result<Vec<Chunk<'_>>, MetadataError> {
    if png.len() < PNG_SIGNATURE.len() || png[..8] != PNG_SIGNATURE {
        return Err(MetadataError::NotPng);
    }

    let mut out = Vec::new();
    let mut pos = PNG_SIGNATURE.len();
    while pos < png.len() {
        let header = png.get(pos..pos + 8).ok_or(MetadataError::Truncated(pos))?;
        let len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let kind = [header[4], header[5], header[6], header[7]];
        let end = pos
            .checked_add(12)
            .and_then(|v| v.checked_add(len))
            .filter(|end| *end <= png.len())
            .ok_or(MetadataError::Truncated(pos))?;

        out.push(Chunk {
            kind,
            data: &png[pos + 8..pos + 8 + len],
            raw: &png[pos..end],
        });
        pos = end;

        if &kind == b"IEND" {
            break;
        }
    }
    Ok(out)
}

fn chunk_keyword<'a>(chunk: &Chunk<'a>) -> Option<&'a [u8]> {
    if &chunk.kind != b"tEXt" && &chunk.kind != b"iTXt" {
        return None;
    }
    chunk.data.split(|b| *b == 0).next()
}

fn encode_chunk(kind: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + 12);
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
    out
}

/// tEXt when the text fits Latin-1, iTXt (uncompressed UTF-8) otherwise.
fn text_chunk(keyword: &str, text: &str) -> Vec<u8> {
    let mut data = Vec::with_capacity(keyword.len() + text.len() + 8);
    data.extend_from_slice(keyword.as_bytes());
    data.push(0);

    if text.chars().all(|c| (c as u32) <= 0xFF) {
        data.extend(text.chars().map(|c| c as u32 as u8));
        encode_chunk(b"tEXt", &data)
    } else {
        // compression flag, compression method, empty language tag, empty translated keyword
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(text.as_bytes());
        encode_chunk(b"iTXt", &data)
    }
}

/// Return a copy of `png` carrying `text` under the `parameters` keyword.
pub fn embed_parameters(png: &[u8], text: &str) -> Result<Vec<u8>, MetadataError> {
    let parsed = chunks(png)?;
    let first = parsed.first().ok_or(MetadataError::MissingIhdr)?;
    if &first.kind != b"IHDR" {
        return Err(MetadataError::MissingIhdr);
    }

    let new_chunk = text_chunk(PARAMETERS_KEYWORD, text);
    let mut out = Vec::with_capacity(png.len() + new_chunk.len());
    out.extend_from_slice(&PNG_SIGNATURE);
    out.extend_from_slice(first.raw);
    out.extend_from_slice(&new_chunk);

    for chunk in &parsed[1..] {
        if chunk_keyword(chunk) == Some(PARAMETERS_KEYWORD.as_bytes()) {
            continue;
        }
        out.extend_from_slice(chunk.raw);
    }
    Ok(out)
}

/// Read the `parameters` text back out of a PNG, if present.
pub fn read_parameters(png: &[u8]) -> Option<String> {
    let parsed = chunks(png).ok()?;
    let chunk = parsed
        .iter()
        .find(|c| chunk_keyword(c) == Some(PARAMETERS_KEYWORD.as_bytes()))?;
    let body = chunk.data.get(PARAMETERS_KEYWORD.len() + 1..)?;

    if &chunk.kind == b"tEXt" {
        Some(body.iter().map(|b| *b as char).collect())
    } else {
        // Skip compression flag and method, then language tag and translated keyword
        let rest = body.get(2..)?;
        let mut parts = rest.splitn(3, |b| *b == 0);
        parts.next()?;
        parts.next()?;
        String::from_utf8(parts.next()?.to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest valid 1x1 grayscale PNG.
    fn tiny_png() -> Vec<u8> {
        let mut png = PNG_SIGNATURE.to_vec();
        let ihdr = [0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0];
        png.extend(encode_chunk(b"IHDR", &ihdr));
        // zlib stream for a single filtered scanline [0, 0]
        let idat = [0x78, 0x9c, 0x63, 0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01];
        png.extend(encode_chunk(b"IDAT", &idat));
        png.extend(encode_chunk(b"IEND", &[]));
        png
    }

    #[test]
    fn test_embed_then_read() {
        let png = tiny_png();
        let out = embed_parameters(&png, "a cat\nSteps: 20, Sampler: Euler a").unwrap();
        assert_eq!(
            read_parameters(&out).as_deref(),
            Some("a cat\nSteps: 20, Sampler: Euler a")
        );
        // Chunk lands right after IHDR
        let parsed = chunks(&out).unwrap();
        assert_eq!(&parsed[0].kind, b"IHDR");
        assert_eq!(&parsed[1].kind, b"tEXt");
        assert_eq!(&parsed.last().unwrap().kind, b"IEND");
    }

    #[test]
    fn test_embed_replaces_existing_parameters() {
        let png = tiny_png();
        let once = embed_parameters(&png, "first").unwrap();
        let twice = embed_parameters(&once, "second").unwrap();
        assert_eq!(read_parameters(&twice).as_deref(), Some("second"));

        let count = chunks(&twice)
            .unwrap()
            .iter()
            .filter(|c| chunk_keyword(c) == Some(b"parameters".as_slice()))
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_embed_non_latin_uses_itxt() {
        let png = tiny_png();
        let out = embed_parameters(&png, "猫, watercolor").unwrap();
        let parsed = chunks(&out).unwrap();
        assert_eq!(&parsed[1].kind, b"iTXt");
        assert_eq!(read_parameters(&out).as_deref(), Some("猫, watercolor"));
    }

    #[test]
    fn test_crc_matches_reference() {
        // An empty IEND chunk always has this CRC
        let iend = encode_chunk(b"IEND", &[]);
        assert_eq!(&iend[8..], &[0xAEu8, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn test_rejects_non_png() {
        assert_eq!(embed_parameters(b"GIF89a....", "x"), Err(MetadataError::NotPng));
        let mut truncated = tiny_png();
        truncated.truncate(20);
        assert!(matches!(
            embed_parameters(&truncated, "x"),
            Err(MetadataError::Truncated(_))
        ));
    }
}
