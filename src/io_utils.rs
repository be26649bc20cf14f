//! Delimiter, encoding and stream plumbing shared by the loader and the CLI.
//!
//! - `.tsv` inputs default to tab, everything else to comma; `--delimiter`
//!   overrides either.
//! - Input bytes are decoded with `encoding_rs` (UTF-8 unless told otherwise);
//!   output is encoded the same way before it reaches the file.
//! - The path `-` means stdin for input and stdout for output.

use std::{
    fs::File,
    io::{self, BufReader, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn resolve_delimiter(path: Option<&Path>, provided: Option<u8>) -> u8 {
    if let Some(delimiter) = provided {
        return delimiter;
    }
    match path.and_then(|p| p.extension()).and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

/// Accepts a single character or one of the names `comma`, `tab`,
/// `semicolon`, `pipe`.
pub fn parse_delimiter(value: &str) -> Result<u8> {
    match value.trim().to_ascii_lowercase().as_str() {
        "comma" | "," => Ok(b','),
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        "semicolon" | ";" => Ok(b';'),
        "pipe" | "|" => Ok(b'|'),
        other if other.len() == 1 && other.is_ascii() => Ok(other.as_bytes()[0]),
        _ => Err(anyhow!(
            "Delimiter '{value}' must be a single ASCII character or comma/tab/semicolon/pipe"
        )),
    }
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}

/// Reads the whole input and decodes it to UTF-8 text.
pub fn read_text(path: &Path, encoding: &'static Encoding) -> Result<String> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading stdin")?;
    } else {
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        BufReader::new(file)
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    decode_bytes(&bytes, encoding)
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn csv_reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(text.as_bytes())
}

/// Encodes `text` and writes it to `path` (stdout for `None` or `-`).
pub fn write_text(path: Option<&Path>, text: &str, encoding: &'static Encoding) -> Result<()> {
    let (encoded, _, had_errors) = encoding.encode(text);
    if had_errors {
        return Err(anyhow!(
            "Output contains characters that {} cannot represent",
            encoding.name()
        ));
    }
    match path {
        Some(p) if !is_dash(p) => {
            let mut file =
                File::create(p).with_context(|| format!("Creating output file {p:?}"))?;
            file.write_all(&encoded)
                .with_context(|| format!("Writing output file {p:?}"))?;
            file.flush().with_context(|| format!("Flushing output file {p:?}"))
        }
        _ => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&encoded).context("Writing to stdout")?;
            stdout.flush().context("Flushing stdout")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1252;

    #[test]
    fn delimiter_follows_extension_unless_overridden() {
        assert_eq!(resolve_delimiter(Some(Path::new("a.tsv")), None), b'\t');
        assert_eq!(resolve_delimiter(Some(Path::new("a.csv")), None), b',');
        assert_eq!(resolve_delimiter(Some(Path::new("a.tsv")), Some(b';')), b';');
        assert_eq!(resolve_delimiter(None, None), b',');
    }

    #[test]
    fn parse_delimiter_accepts_names_and_characters() {
        assert_eq!(parse_delimiter("tab").unwrap(), b'\t');
        assert_eq!(parse_delimiter("|").unwrap(), b'|');
        assert!(parse_delimiter("ab").is_err());
    }

    #[test]
    fn decodes_legacy_encodings() {
        let encoding = resolve_encoding(Some("windows-1252")).unwrap();
        assert_eq!(encoding, WINDOWS_1252);
        assert_eq!(decode_bytes(&[0x63, 0x61, 0x66, 0xe9], encoding).unwrap(), "café");
        assert!(resolve_encoding(Some("klingon")).is_err());
    }
}
