//! Tabular text parser with encoding and delimiter auto-detection.
//!
//! Turns raw delimited text into rows of string cells. No business rules
//! live here: row/column counts are the validator's concern.

use std::path::Path;

use crate::error::{CsvError, CsvResult};

/// Delimiter assumed when detection finds nothing better.
pub const DEFAULT_DELIMITER: char = ',';

/// Rows of cells, with the detected source metadata.
#[derive(Debug, Clone)]
pub struct ParsedTable {
    /// Non-blank rows in source order; the first is the header.
    pub rows: Vec<Vec<String>>,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding, lossy on bad input.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Detect the delimiter by counting unquoted occurrences in the first line.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut counts = [0usize; 4];
    let mut in_quotes = false;

    for c in first_line.chars() {
        if c == '"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(i) = separators.iter().position(|&s| s == c) {
            counts[i] += 1;
        }
    }

    let mut best_sep = DEFAULT_DELIMITER;
    let mut best_count = 0;
    for (sep, count) in separators.iter().zip(counts) {
        if count > best_count {
            best_count = count;
            best_sep = *sep;
        }
    }

    best_sep
}

/// Parse delimited text into rows of cells.
///
/// Accepts `\n` and `\r\n` line endings and drops blank lines. A field may
/// be wrapped in double quotes; inside quotes `""` is one literal quote and
/// delimiters or line breaks are part of the field.
///
/// # Example
/// ```ignore
/// use caseload::parse_rows;
///
/// let rows = parse_rows("a,b\r\n\"x, y\",\"say \"\"hi\"\"\"\n", ',').unwrap();
/// assert_eq!(rows[1], vec!["x, y", "say \"hi\""]);
/// ```
pub fn parse_rows(text: &str, delimiter: char) -> CsvResult<Vec<Vec<String>>> {
    let delimiter_byte = u8::try_from(u32::from(delimiter))
        .ok()
        .filter(u8::is_ascii)
        .ok_or(CsvError::UnsupportedDelimiter(delimiter))?;

    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .double_quote(true)
        .delimiter(delimiter_byte)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        // whitespace-only line; delimiter-only lines are real rows
        if record.len() == 1 && record[0].trim().is_empty() {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }

    Ok(rows)
}

/// Parse already-decoded text, detecting the delimiter when none is given.
pub fn parse_text_auto(text: &str, delimiter: Option<char>) -> CsvResult<ParsedTable> {
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(text));
    Ok(ParsedTable {
        rows: parse_rows(text, delimiter)?,
        encoding: "utf-8".to_string(),
        delimiter,
    })
}

/// Parse raw bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8], delimiter: Option<char>) -> CsvResult<ParsedTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));

    Ok(ParsedTable {
        rows: parse_rows(&content, delimiter)?,
        encoding,
        delimiter,
    })
}

/// Read a local file and parse it with auto-detection.
pub fn parse_file_auto<P: AsRef<Path>>(path: P, delimiter: Option<char>) -> CsvResult<ParsedTable> {
    let bytes = std::fs::read(path.as_ref())?;
    parse_bytes_auto(&bytes, delimiter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_rows() {
        let rows = parse_rows("name,age\nAlice,30\nBob,25", ',').unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["name", "age"]);
        assert_eq!(rows[2], vec!["Bob", "25"]);
    }

    #[test]
    fn test_crlf_and_blank_lines() {
        let rows = parse_rows("a,b\r\n1,2\r\n\r\n   \n3,4\r\n", ',').unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2], vec!["3", "4"]);
    }

    #[test]
    fn test_delimiter_only_line_is_a_row() {
        let rows = parse_rows("a,b,c\n,,\n  \n1,2,3\n", ',').unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec!["", "", ""]);
        assert_eq!(rows[2], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_quoted_delimiter_and_newline() {
        let csv = "id,details\n1,\"Lahore, Punjab\"\n2,\"line one\nline two\"\n";
        let rows = parse_rows(csv, ',').unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][1], "Lahore, Punjab");
        assert_eq!(rows[2][1], "line one\nline two");
    }

    #[test]
    fn test_escaped_quotes() {
        let rows = parse_rows("a\n\"He said \"\"refund\"\"\"\n", ',').unwrap();
        assert_eq!(rows[1][0], "He said \"refund\"");
    }

    #[test]
    fn test_ragged_rows_are_kept() {
        let rows = parse_rows("a,b,c\n1\n1,2,3,4", ',').unwrap();

        assert_eq!(rows[1].len(), 1);
        assert_eq!(rows[2].len(), 4);
    }

    #[test]
    fn test_bom_is_stripped() {
        let rows = parse_rows("\u{feff}cnic,name\n1,x", ',').unwrap();
        assert_eq!(rows[0][0], "cnic");
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_rows("", ',').unwrap().is_empty());
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        assert!(matches!(
            parse_rows("a§b", '§'),
            Err(CsvError::UnsupportedDelimiter('§'))
        ));
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc\n1\t2\t3"), '\t');
        assert_eq!(detect_delimiter("a|b|c\n1|2|3"), '|');
    }

    #[test]
    fn test_detect_delimiter_ignores_quoted() {
        assert_eq!(detect_delimiter("\"a;b;c\",d,e"), ',');
    }

    #[test]
    fn test_auto_parse() {
        let result = parse_bytes_auto(b"cnic;name\n4210112345671;Ali\n", None).unwrap();

        assert_eq!(result.delimiter, ';');
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.encoding, "utf-8");
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1");
        assert_eq!(decoded, "Société");
    }
}
