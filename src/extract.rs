//! Multi-format text extraction.
//!
//! Each format is an [`Extractor`] registered in an [`ExtractorRegistry`]
//! under the file extensions it handles. Extensions without a registered
//! extractor produce a placeholder string rather than an error, so
//! ingestion of an unknown file still succeeds.
//!
//! | Extension | Output |
//! |-----------|--------|
//! | `.pdf` | page text concatenated in page order |
//! | `.docx`, `.doc` | one paragraph per line |
//! | `.txt` | file content verbatim (UTF-8) |
//! | `.csv`, `.xlsx` | aligned table rendering |
//! | `.json` | value re-serialised with 2-space indentation |

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use crate::tabular::{parse_csv, Table};

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum cells to read from a worksheet.
const XLSX_MAX_CELLS: usize = 100_000;
/// Columns in a worksheet, `A` through `XFD`.
const XLSX_MAX_COLUMNS: usize = 16_384;

/// Extraction failure for a file whose contents cannot be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("file is not valid UTF-8: {0}")]
    Utf8(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
    #[error("JSON parsing failed: {0}")]
    Json(String),
    #[error("CSV parsing failed: {0}")]
    Csv(String),
}

/// A format-specific text extractor.
pub trait Extractor: Send + Sync {
    /// Lower-case extensions handled, including the leading dot.
    fn extensions(&self) -> &[&'static str];

    /// Extracts plain text from the file at `path`.
    fn extract(&self, path: &Path) -> Result<String, ExtractError>;
}

/// Returns the extension of `path` with its leading dot, case preserved,
/// or an empty string when there is none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// Extension-keyed dispatch table with a placeholder fallback.
pub struct ExtractorRegistry {
    by_extension: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// An empty registry; every file falls through to the placeholder.
    pub fn new() -> Self {
        Self {
            by_extension: HashMap::new(),
        }
    }

    /// A registry with every built-in format registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(PdfExtractor);
        registry.register(DocxExtractor);
        registry.register(PlainTextExtractor);
        registry.register(CsvExtractor);
        registry.register(XlsxExtractor);
        registry.register(JsonExtractor);
        registry
    }

    /// Registers `extractor` for each of its extensions, replacing any
    /// previous registration.
    pub fn register<E: Extractor + 'static>(&mut self, extractor: E) {
        let extractor: Arc<dyn Extractor> = Arc::new(extractor);
        for ext in extractor.extensions() {
            self.by_extension
                .insert(ext.to_ascii_lowercase(), extractor.clone());
        }
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn Extractor>> {
        self.by_extension
            .get(&extension.to_ascii_lowercase())
            .cloned()
    }

    /// Extracts text from `path`, dispatching on its extension.
    pub fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let ext = extension_of(path).to_ascii_lowercase();
        match self.get(&ext) {
            Some(extractor) => extractor.extract(path),
            None => Ok(unsupported_placeholder(&ext)),
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn unsupported_placeholder(ext: &str) -> String {
    format!("Unsupported file type: {}", ext)
}

fn read_utf8(path: &Path) -> Result<String, ExtractError> {
    let bytes = std::fs::read(path)?;
    String::from_utf8(bytes).map_err(|e| ExtractError::Utf8(e.to_string()))
}

// ============ PDF ============

pub struct PdfExtractor;

impl Extractor for PdfExtractor {
    fn extensions(&self) -> &[&'static str] {
        &[".pdf"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        pdf_extract::extract_text_from_mem(&bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
    }
}

// ============ Plain text ============

pub struct PlainTextExtractor;

impl Extractor for PlainTextExtractor {
    fn extensions(&self) -> &[&'static str] {
        &[".txt"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        read_utf8(path)
    }
}

// ============ JSON ============

pub struct JsonExtractor;

impl Extractor for JsonExtractor {
    fn extensions(&self) -> &[&'static str] {
        &[".json"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let content = read_utf8(path)?;
        let value: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| ExtractError::Json(e.to_string()))?;
        serde_json::to_string_pretty(&value).map_err(|e| ExtractError::Json(e.to_string()))
    }
}

// ============ CSV ============

pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn extensions(&self) -> &[&'static str] {
        &[".csv"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let content = read_utf8(path)?;
        let records = parse_csv(&content)?;
        if records.is_empty() {
            return Err(ExtractError::Csv("no columns to parse from file".to_string()));
        }
        Ok(Table::from_records(records).render())
    }
}

// ============ OOXML (docx / xlsx) ============

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn has_attr(e: &quick_xml::events::BytesStart<'_>, key: &[u8], value: &[u8]) -> bool {
    e.attributes().any(|a| {
        a.as_ref()
            .map(|a| a.key.as_ref() == key && a.value.as_ref() == value)
            .unwrap_or(false)
    })
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        (a.key.as_ref() == key).then(|| String::from_utf8_lossy(a.value.as_ref()).into_owned())
    })
}

/// Word documents: `.doc` is routed here too and fails as a non-ZIP file.
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn extensions(&self) -> &[&'static str] {
        &[".docx", ".doc"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        let mut archive = open_archive(&bytes)?;
        let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
        docx_paragraphs(&xml)
    }
}

/// Collects `w:p` paragraphs, each terminated by a newline.
fn docx_paragraphs(xml: &[u8]) -> Result<String, ExtractError> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"p" => out.push('\n'),
                b"tab" => out.push('\t'),
                b"br" | b"cr" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// Excel workbooks: the first worksheet, rendered as a table.
pub struct XlsxExtractor;

impl Extractor for XlsxExtractor {
    fn extensions(&self) -> &[&'static str] {
        &[".xlsx"]
    }

    fn extract(&self, path: &Path) -> Result<String, ExtractError> {
        let bytes = std::fs::read(path)?;
        let mut archive = open_archive(&bytes)?;
        let shared_strings = read_shared_strings(&mut archive)?;
        let sheet = first_worksheet_name(&archive)
            .ok_or_else(|| ExtractError::Ooxml("workbook has no worksheets".to_string()))?;
        let sheet_xml = read_zip_entry_bounded(&mut archive, &sheet, MAX_XML_ENTRY_BYTES)?;
        let records = read_sheet_rows(&sheet_xml, &shared_strings)?;
        Ok(Table::from_records(records).render())
    }
}

fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>, ExtractError> {
    use quick_xml::events::Event;

    if archive.index_for_name("xl/sharedStrings.xml").is_none() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::Text(te)) if in_text => {
                if let Some(s) = current.as_mut() {
                    let text = te
                        .unescape()
                        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                    s.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn first_worksheet_name(archive: &Archive<'_>) -> Option<String> {
    archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .min_by_key(|name| {
            name.trim_start_matches("xl/worksheets/sheet")
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        })
        .map(str::to_string)
}

/// Zero-based column index from a cell reference such as `"AB12"`.
///
/// `Ok(None)` when the reference has no column letters. Columns past `XFD`
/// are rejected.
fn column_index(cell_ref: &str) -> Result<Option<usize>, ExtractError> {
    let mut n = 0usize;
    let mut seen = false;
    for b in cell_ref.bytes().take_while(u8::is_ascii_alphabetic) {
        seen = true;
        let digit = (b.to_ascii_uppercase() - b'A' + 1) as usize;
        n = n
            .checked_mul(26)
            .and_then(|n| n.checked_add(digit))
            .filter(|n| *n <= XLSX_MAX_COLUMNS)
            .ok_or_else(|| column_out_of_range(cell_ref))?;
    }
    Ok(seen.then(|| n - 1))
}

fn column_out_of_range(cell_ref: &str) -> ExtractError {
    ExtractError::Ooxml(format!(
        "cell reference {} is beyond the last worksheet column (XFD)",
        cell_ref
    ))
}

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Number,
    Shared,
    Inline,
    Bool,
    Other,
}

fn read_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    use quick_xml::events::Event;

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut col = 0usize;
    let mut kind = CellKind::Number;
    let mut in_value = false;
    let mut cells = 0usize;
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        if cells >= XLSX_MAX_CELLS {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row = Vec::new();
                    col = 0;
                }
                b"c" => {
                    if let Some(cell_ref) = attr_value(&e, b"r") {
                        if let Some(idx) = column_index(&cell_ref)? {
                            col = idx;
                        }
                    }
                    kind = if has_attr(&e, b"t", b"s") {
                        CellKind::Shared
                    } else if has_attr(&e, b"t", b"inlineStr") {
                        CellKind::Inline
                    } else if has_attr(&e, b"t", b"b") {
                        CellKind::Bool
                    } else if attr_value(&e, b"t").is_some() {
                        CellKind::Other
                    } else {
                        CellKind::Number
                    };
                }
                b"v" => in_value = true,
                b"t" if kind == CellKind::Inline => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let raw = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                let value = match kind {
                    CellKind::Shared => raw
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared_strings.get(i).cloned())
                        .unwrap_or_default(),
                    CellKind::Bool => if raw.trim() == "1" { "True" } else { "False" }.to_string(),
                    _ => raw.into_owned(),
                };
                if col >= XLSX_MAX_COLUMNS {
                    return Err(ExtractError::Ooxml(format!(
                        "row has more than {} columns",
                        XLSX_MAX_COLUMNS
                    )));
                }
                if row.len() <= col {
                    row.resize(col + 1, String::new());
                }
                row[col].push_str(&value);
                cells += 1;
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => col += 1,
                b"row" => rows.push(std::mem::take(&mut row)),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                let idx = match attr_value(&e, b"r") {
                    Some(cell_ref) => column_index(&cell_ref)?,
                    None => None,
                };
                col = idx.unwrap_or(col) + 1;
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if !row.is_empty() {
        rows.push(row);
    }
    rows.retain(|r| r.iter().any(|c| !c.is_empty()));
    Ok(rows)
}
