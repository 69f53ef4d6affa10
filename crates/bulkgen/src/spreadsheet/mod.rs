//! Spreadsheet intake: turns an uploaded `.xlsx`, `.xls` or `.csv` file into
//! ordered article row specs.

pub mod parser;
pub mod row;

pub use parser::{SheetFormat, SpreadsheetParser};
pub use row::{Language, ParsedRow, RowSpec, RowValidity, Tone};
