//! Synchronous in-process extraction for office and plain-text formats.
//!
//! The router sends `.docx` / `.pptx` / `.xlsx` / `.txt` here; everything
//! produced is an [`ExtractionOutcome`] with page structure preserved
//! (one page per slide or sheet, a single page for word-processing
//! documents) so the twin and the chunker can track provenance. Scanned
//! formats never reach this module; they go to the heavy-analysis
//! service.

use std::io::Read;

use quick_xml::events::Event;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{ExtractionMethod, ExtractionOutcome, FileKind, Page, Table};

/// Maximum decompressed bytes read from a single ZIP entry (zip-bomb guard).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
/// Maximum sheets processed in an xlsx workbook.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells processed per sheet.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;

/// Extract text from raw bytes according to the declared file kind.
///
/// Legacy binary formats and unknown extensions return
/// [`Error::UnsupportedFormat`]; malformed input for a supported format
/// returns [`Error::ExtractionService`].
pub fn extract(bytes: &[u8], kind: FileKind) -> Result<ExtractionOutcome> {
    match kind {
        FileKind::Docx => extract_docx(bytes),
        FileKind::Pptx => extract_pptx(bytes),
        FileKind::Xlsx => extract_xlsx(bytes),
        FileKind::Txt => extract_txt(bytes),
        FileKind::LegacyDoc | FileKind::LegacyPpt | FileKind::LegacyXls => {
            Err(Error::UnsupportedFormat(
                "legacy binary Office formats require a conversion capability".to_string(),
            ))
        }
        FileKind::Pdf => Err(Error::UnsupportedFormat(
            "paginated documents are handled by the analysis service".to_string(),
        )),
        FileKind::Unknown => Err(Error::UnsupportedFormat(
            "unrecognized file extension".to_string(),
        )),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Plain text
// ═══════════════════════════════════════════════════════════════════════

fn extract_txt(bytes: &[u8]) -> Result<ExtractionOutcome> {
    let text = String::from_utf8(bytes.to_vec())
        .map_err(|_| Error::ExtractionService("text file is not valid UTF-8".to_string()))?;
    Ok(ExtractionOutcome {
        pages: vec![Page {
            page_number: 1,
            text,
        }],
        tables: Vec::new(),
        method: ExtractionMethod::Txt,
        job_id: None,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// OOXML helpers
// ═══════════════════════════════════════════════════════════════════════

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| Error::ExtractionService(format!("not a valid OOXML archive: {}", e)))
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .map_err(|e| Error::ExtractionService(format!("missing archive entry {}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| Error::ExtractionService(e.to_string()))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(Error::ExtractionService(format!(
            "archive entry {} exceeds size limit",
            name
        )));
    }
    Ok(out)
}

/// Entry names matching `{prefix}N{suffix}`, sorted by N.
fn numbered_entries(archive: &Archive<'_>, prefix: &str, suffix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(suffix))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(suffix)
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn xml_error(e: quick_xml::Error) -> Error {
    Error::ExtractionService(format!("malformed XML: {}", e))
}

// ═══════════════════════════════════════════════════════════════════════
// docx
// ═══════════════════════════════════════════════════════════════════════

/// Word-processing documents carry no page geometry in the XML, so the
/// whole body becomes page 1; tables are lifted into structured rows.
fn extract_docx(bytes: &[u8]) -> Result<ExtractionOutcome> {
    let mut archive = open_archive(bytes)?;
    let xml = read_entry(&mut archive, "word/document.xml")?;

    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut lines: Vec<String> = Vec::new();
    let mut tables: Vec<Table> = Vec::new();

    let mut paragraph = String::new();
    let mut in_text = false;
    let mut table_depth = 0u32;
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"t" => in_text = true,
                b"tbl" => table_depth += 1,
                b"tr" if table_depth > 0 => row.clear(),
                b"tc" if table_depth > 0 => cell.clear(),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().unwrap_or_default();
                if table_depth > 0 {
                    cell.push_str(&text);
                } else {
                    paragraph.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" if table_depth == 0 => {
                    if !paragraph.is_empty() {
                        lines.push(std::mem::take(&mut paragraph));
                    }
                }
                b"tc" if table_depth > 0 => row.push(std::mem::take(&mut cell)),
                b"tr" if table_depth > 0 => {
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                b"tbl" => {
                    table_depth = table_depth.saturating_sub(1);
                    if table_depth == 0 && !rows.is_empty() {
                        tables.push(Table {
                            table_index: tables.len() as u32 + 1,
                            page_number: Some(1),
                            rows: std::mem::take(&mut rows),
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }

    let text = lines.join("\n");
    debug!(chars = text.len(), tables = tables.len(), "docx extracted");
    Ok(ExtractionOutcome {
        pages: vec![Page {
            page_number: 1,
            text,
        }],
        tables,
        method: ExtractionMethod::Docx,
        job_id: None,
    })
}

// ═══════════════════════════════════════════════════════════════════════
// pptx
// ═══════════════════════════════════════════════════════════════════════

/// One page per slide, in slide order. DrawingML table cells hold their
/// text in the same `a:t` elements as shapes, so plain text collection
/// covers them too.
fn extract_pptx(bytes: &[u8]) -> Result<ExtractionOutcome> {
    let mut archive = open_archive(bytes)?;
    let slide_names = numbered_entries(&archive, "ppt/slides/slide", ".xml");
    if slide_names.is_empty() {
        return Err(Error::ExtractionService(
            "presentation has no slides".to_string(),
        ));
    }

    let mut pages = Vec::new();
    for (idx, name) in slide_names.iter().enumerate() {
        let xml = read_entry(&mut archive, name)?;
        let lines = collect_text_elements(&xml)?;
        pages.push(Page {
            page_number: idx as u32 + 1,
            text: lines.join("\n"),
        });
    }

    Ok(ExtractionOutcome {
        pages,
        tables: Vec::new(),
        method: ExtractionMethod::Pptx,
        job_id: None,
    })
}

/// Collect the contents of every `t` element, one string per element.
fn collect_text_elements(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut out = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().unwrap_or_default().into_owned();
                if !text.is_empty() {
                    out.push(text);
                }
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"t" => in_text = false,
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

// ═══════════════════════════════════════════════════════════════════════
// xlsx
// ═══════════════════════════════════════════════════════════════════════

/// One page per worksheet, in sheet order; rows are tab-joined, both
/// shared-string and literal cell values included.
fn extract_xlsx(bytes: &[u8]) -> Result<ExtractionOutcome> {
    let mut archive = open_archive(bytes)?;
    let shared = read_shared_strings(&mut archive)?;
    let sheet_names = numbered_entries(&archive, "xl/worksheets/sheet", ".xml");
    if sheet_names.is_empty() {
        return Err(Error::ExtractionService(
            "workbook has no worksheets".to_string(),
        ));
    }

    let mut pages = Vec::new();
    for (idx, name) in sheet_names.iter().take(XLSX_MAX_SHEETS).enumerate() {
        let xml = read_entry(&mut archive, name)?;
        let rows = extract_sheet_rows(&xml, &shared)?;
        let text = rows
            .iter()
            .map(|cells| cells.join("\t"))
            .collect::<Vec<_>>()
            .join("\n");
        pages.push(Page {
            page_number: idx as u32 + 1,
            text,
        });
    }

    Ok(ExtractionOutcome {
        pages,
        tables: Vec::new(),
        method: ExtractionMethod::Xlsx,
        job_id: None,
    })
}

/// `xl/sharedStrings.xml` is optional; workbooks without string cells
/// simply don't have one.
fn read_shared_strings(archive: &mut Archive<'_>) -> Result<Vec<String>> {
    if !archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        return Ok(Vec::new());
    }
    let xml = read_entry(archive, "xl/sharedStrings.xml")?;

    let mut reader = quick_xml::Reader::from_reader(xml.as_slice());
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_text = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                current.push_str(&t.unescape().unwrap_or_default());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

fn extract_sheet_rows(xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut in_row = false;
    let mut in_value = false;
    let mut cell_is_shared = false;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    in_row = true;
                    row.clear();
                }
                b"c" if in_row => {
                    cell_is_shared = e.attributes().any(|a| {
                        a.as_ref()
                            .map(|a| a.key.as_ref() == b"t" && a.value.as_ref() == b"s")
                            .unwrap_or(false)
                    });
                }
                b"v" if in_row => in_value = true,
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => {
                let raw = t.unescape().unwrap_or_default();
                let value = raw.trim();
                if !value.is_empty() {
                    let resolved = if cell_is_shared {
                        value
                            .parse::<usize>()
                            .ok()
                            .and_then(|i| shared.get(i))
                            .cloned()
                    } else {
                        Some(value.to_string())
                    };
                    if let Some(text) = resolved {
                        row.push(text);
                        cell_count += 1;
                    }
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" => in_value = false,
                b"c" => cell_is_shared = false,
                b"row" => {
                    in_row = false;
                    if !row.is_empty() {
                        rows.push(std::mem::take(&mut row));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}
