//! Builders for test inputs.

#![allow(dead_code)]

use std::io::{Cursor, Write};
use std::sync::Arc;
use std::time::Duration;

use bulkgen::config::LimitsConfig;
use bulkgen::generator::ContentGenerator;
use bulkgen::{BulkJobStore, BulkPipeline, ImagePool, PoolImage, RetryPolicy, SchedulerConfig};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Retry policy with millisecond delays.
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

pub fn scheduler_config(workers: usize) -> SchedulerConfig {
    SchedulerConfig::default()
        .with_worker_count(workers)
        .with_retry(fast_retry())
}

pub fn pipeline(generator: Arc<dyn ContentGenerator>, workers: usize) -> BulkPipeline {
    pipeline_with_store(Arc::new(BulkJobStore::new()), generator, workers)
}

pub fn pipeline_with_store(
    store: Arc<BulkJobStore>,
    generator: Arc<dyn ContentGenerator>,
    workers: usize,
) -> BulkPipeline {
    BulkPipeline::new(
        store,
        generator,
        scheduler_config(workers),
        LimitsConfig::default(),
    )
}

/// Builds CSV bytes with a `title,subheadings,keywords` header.
#[derive(Default)]
pub struct CsvBuilder {
    rows: Vec<(String, String, String)>,
}

impl CsvBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(mut self, title: &str) -> Self {
        self.rows
            .push((title.to_string(), String::new(), String::new()));
        self
    }

    /// Sub-headings are `|`-separated in the sheet.
    pub fn row_with(mut self, title: &str, sub_headings: &[&str], keywords: &[&str]) -> Self {
        self.rows.push((
            title.to_string(),
            sub_headings.join("|"),
            keywords.join(";"),
        ));
        self
    }

    pub fn titles(titles: &[&str]) -> Self {
        titles.iter().fold(Self::new(), |b, t| b.row(t))
    }

    pub fn build(&self) -> Vec<u8> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record(["title", "subheadings", "keywords"])
            .unwrap();
        for (title, subs, keywords) in &self.rows {
            writer.write_record([title, subs, keywords]).unwrap();
        }
        writer.into_inner().unwrap()
    }
}

/// Pool of images named `names`, with ids `img-0`, `img-1`, ...
pub fn image_pool(names: &[&str]) -> ImagePool {
    let images = names
        .iter()
        .enumerate()
        .map(|(i, name)| PoolImage::new(format!("img-{}", i), format!("uploads/{}", name), *name));
    ImagePool::from_images(images, 20).unwrap()
}

pub enum XlsxCell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for XlsxCell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            XlsxCell::Empty
        } else {
            XlsxCell::Text(value.to_string())
        }
    }
}

impl From<f64> for XlsxCell {
    fn from(value: f64) -> Self {
        XlsxCell::Number(value)
    }
}

/// Single-sheet `.xlsx` workbook with shared-string text cells.
pub struct XlsxBuilder {
    first_row: u32,
    rows: Vec<Vec<XlsxCell>>,
}

impl XlsxBuilder {
    pub fn new() -> Self {
        Self {
            first_row: 1,
            rows: Vec::new(),
        }
    }

    /// One-based sheet row the first added row lands on.
    pub fn starting_at_row(mut self, row: u32) -> Self {
        self.first_row = row;
        self
    }

    pub fn row<C: Into<XlsxCell>>(mut self, cells: impl IntoIterator<Item = C>) -> Self {
        self.rows.push(cells.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut strings: Vec<&str> = Vec::new();
        let mut sheet_rows = String::new();
        for (i, row) in self.rows.iter().enumerate() {
            let r = self.first_row + i as u32;
            sheet_rows.push_str(&format!("<row r=\"{}\">", r));
            for (col, cell) in row.iter().enumerate() {
                let reference = format!("{}{}", column_name(col), r);
                match cell {
                    XlsxCell::Text(text) => {
                        let idx = match strings.iter().position(|s| *s == text.as_str()) {
                            Some(idx) => idx,
                            None => {
                                strings.push(text);
                                strings.len() - 1
                            }
                        };
                        sheet_rows.push_str(&format!(
                            "<c r=\"{}\" t=\"s\"><v>{}</v></c>",
                            reference, idx
                        ));
                    }
                    XlsxCell::Number(n) => {
                        sheet_rows.push_str(&format!("<c r=\"{}\"><v>{}</v></c>", reference, n));
                    }
                    XlsxCell::Empty => {}
                }
            }
            sheet_rows.push_str("</row>");
        }

        let shared: String = strings
            .iter()
            .map(|s| format!("<si><t xml:space=\"preserve\">{}</t></si>", xml_escape(s)))
            .collect();

        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES.to_string()),
            ("_rels/.rels", ROOT_RELS.to_string()),
            ("xl/workbook.xml", WORKBOOK.to_string()),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS.to_string()),
            (
                "xl/sharedStrings.xml",
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                     <sst xmlns=\"{}\" count=\"{}\" uniqueCount=\"{}\">{}</sst>",
                    MAIN_NS,
                    strings.len(),
                    strings.len(),
                    shared
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
                     <worksheet xmlns=\"{}\"><sheetData>{}</sheetData></worksheet>",
                    MAIN_NS, sheet_rows
                ),
            ),
        ];

        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in parts {
            zip.start_file(name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#;

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Articles" sheetId="1" r:id="rId1"/></sheets>
</workbook>"#;

const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

fn column_name(mut col: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (col % 26) as u8);
        if col < 26 {
            break;
        }
        col = col / 26 - 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap()
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
