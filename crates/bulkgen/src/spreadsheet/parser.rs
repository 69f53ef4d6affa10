use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Reader};
use log::debug;

use crate::error::ParseError;

use super::row::{dedup_keywords, Language, ParsedRow, RowSpec, Tone};

const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE2_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Spreadsheet container formats accepted for bulk submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xls,
    Csv,
}

impl SheetFormat {
    /// Picks the format from the file extension, falling back to magic bytes
    /// when the name carries no extension.
    pub fn detect(file_name: &str, bytes: &[u8]) -> Result<Self, ParseError> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match extension.as_deref() {
            Some("xlsx") | Some("xlsm") => Ok(SheetFormat::Xlsx),
            Some("xls") => Ok(SheetFormat::Xls),
            Some("csv") => Ok(SheetFormat::Csv),
            Some(other) => Err(ParseError::UnsupportedFormat(format!(
                "'.{}' files are not accepted (expected .xlsx, .xls or .csv)",
                other
            ))),
            None => Self::sniff(bytes),
        }
    }

    fn sniff(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.starts_with(ZIP_MAGIC) {
            Ok(SheetFormat::Xlsx)
        } else if bytes.starts_with(OLE2_MAGIC) {
            Ok(SheetFormat::Xls)
        } else if std::str::from_utf8(bytes).is_ok() {
            Ok(SheetFormat::Csv)
        } else {
            Err(ParseError::UnsupportedFormat(
                "content is neither a workbook nor UTF-8 text".to_string(),
            ))
        }
    }
}

/// Column positions resolved from the header row.
#[derive(Debug, Default)]
struct HeaderMap {
    title: Option<usize>,
    sub_headings: Option<usize>,
    keywords: Option<usize>,
    tone: Option<usize>,
    language: Option<usize>,
}

impl HeaderMap {
    fn from_cells(cells: &[String]) -> Self {
        let mut map = HeaderMap::default();
        for (col, cell) in cells.iter().enumerate() {
            let key: String = cell
                .chars()
                .filter(|c| !matches!(c, ' ' | '_' | '-'))
                .flat_map(char::to_lowercase)
                .collect();
            let slot = match key.as_str() {
                "title" | "topic" | "heading" | "articletitle" => &mut map.title,
                "subheadings" | "subheading" | "outline" | "sections" => &mut map.sub_headings,
                "keywords" | "keyword" | "tags" => &mut map.keywords,
                "tone" | "style" => &mut map.tone,
                "language" | "lang" => &mut map.language,
                _ => continue,
            };
            // First matching column wins.
            slot.get_or_insert(col);
        }
        map
    }
}

/// Converts uploaded spreadsheet bytes into ordered row specs.
#[derive(Debug, Clone, Default)]
pub struct SpreadsheetParser {
    default_tone: Tone,
    default_language: Language,
}

impl SpreadsheetParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tone and language applied to rows that leave those columns blank.
    pub fn with_defaults(tone: Tone, language: Language) -> Self {
        Self {
            default_tone: tone,
            default_language: language,
        }
    }

    /// Parses a spreadsheet. Row order is preserved; rows with missing or
    /// invalid fields come back flagged as malformed instead of aborting.
    pub fn parse(&self, file_name: &str, bytes: &[u8]) -> Result<Vec<ParsedRow>, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::EmptyFile);
        }

        let format = SheetFormat::detect(file_name, bytes)?;
        debug!("Parsing '{}' as {:?} ({} bytes)", file_name, format, bytes.len());

        let grid = match format {
            SheetFormat::Xlsx | SheetFormat::Xls => read_workbook(bytes)?,
            SheetFormat::Csv => read_csv(bytes)?,
        };

        self.rows_from_grid(grid)
    }

    fn rows_from_grid(&self, grid: Vec<(usize, Vec<String>)>) -> Result<Vec<ParsedRow>, ParseError> {
        let mut lines = grid.into_iter().filter(|(_, cells)| !is_blank(cells));

        let (header_line, header_cells) = lines.next().ok_or(ParseError::EmptyFile)?;
        let header = HeaderMap::from_cells(&header_cells);
        let title_col = header.title.ok_or_else(|| ParseError::MalformedRow {
            line: header_line,
            reason: "header has no 'title' column".to_string(),
        })?;

        let mut rows = Vec::new();
        for (line, cells) in lines {
            let index = rows.len();
            rows.push(self.build_row(index, line, &cells, title_col, &header));
        }

        if rows.is_empty() {
            return Err(ParseError::EmptyFile);
        }

        Ok(rows)
    }

    fn build_row(
        &self,
        index: usize,
        line: usize,
        cells: &[String],
        title_col: usize,
        header: &HeaderMap,
    ) -> ParsedRow {
        let cell = |col: Option<usize>| cell_at(cells, col);

        let mut spec = RowSpec {
            title: cell(Some(title_col)).to_string(),
            sub_headings: split_list(cell(header.sub_headings), &['|', ';', '\n']),
            keywords: dedup_keywords(
                split_list(cell(header.keywords), &[',', ';', '\n']).into_iter(),
            ),
            tone: self.default_tone,
            language: self.default_language,
        };

        let mut problem = None;

        let tone = cell(header.tone);
        if !tone.is_empty() {
            match tone.parse() {
                Ok(t) => spec.tone = t,
                Err(e) => problem = Some(e),
            }
        }

        let language = cell(header.language);
        if !language.is_empty() {
            match language.parse() {
                Ok(l) => spec.language = l,
                Err(e) => {
                    problem.get_or_insert(e);
                }
            }
        }

        if spec.title.is_empty() {
            problem = Some("missing required column 'title'".to_string());
        }

        match problem {
            Some(reason) => {
                debug!("Row {} (line {}) is malformed: {}", index, line, reason);
                ParsedRow::malformed(index, line, spec, format!("malformed-row: {}", reason))
            }
            None => ParsedRow::valid(index, line, spec),
        }
    }
}

fn read_workbook(bytes: &[u8]) -> Result<Vec<(usize, Vec<String>)>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::UnsupportedFormat(format!("unreadable workbook: {}", e)))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(Ok(range)) => range,
        Some(Err(e)) => {
            return Err(ParseError::UnsupportedFormat(format!(
                "unreadable worksheet: {}",
                e
            )))
        }
        None => return Err(ParseError::EmptyFile),
    };

    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    Ok(range
        .rows()
        .enumerate()
        .map(|(i, row)| {
            let cells = row.iter().map(|c| c.to_string().trim().to_string()).collect();
            (first_row + i + 1, cells)
        })
        .collect())
}

fn read_csv(bytes: &[u8]) -> Result<Vec<(usize, Vec<String>)>, ParseError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ParseError::UnsupportedFormat("CSV file is not valid UTF-8".to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(text))
        .from_reader(text.as_bytes());

    let mut grid = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| ParseError::MalformedRow {
            line: e
                .position()
                .map(|p| p.line() as usize)
                .unwrap_or(i + 1),
            reason: e.to_string(),
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(i + 1);
        grid.push((line, record.iter().map(|f| f.trim().to_string()).collect()));
    }

    Ok(grid)
}

/// Picks `,`, `;` or tab from whichever appears most in the first line.
/// Spreadsheet exports in many locales use `;`.
fn sniff_delimiter(text: &str) -> u8 {
    let first_line = text.lines().next().unwrap_or("");
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| {
            (
                first_line.bytes().filter(|b| b == d).count(),
                // Prefer comma on ties.
                (*d == b',') as usize,
            )
        })
        .unwrap_or(b',')
}

fn cell_at(cells: &[String], col: Option<usize>) -> &str {
    col.and_then(|c| cells.get(c))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn split_list(value: &str, separators: &[char]) -> Vec<String> {
    value
        .split(|c| separators.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn is_blank(cells: &[String]) -> bool {
    cells.iter().all(|c| c.trim().is_empty())
}
