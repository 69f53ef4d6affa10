//! Parsing real `.xlsx` workbooks, not just CSV.

mod common;

use std::sync::Arc;

use bulkgen::{JobSettings, JobStatus, Language, RowOutcome, SpreadsheetParser, Tone};

use common::*;

fn article_workbook() -> Vec<u8> {
    XlsxBuilder::new()
        .starting_at_row(2)
        .row(["Article Title", "Outline", "Tags", "Style", "Lang"])
        .row(["Growing tomatoes", "Soil|Watering|Harvest", "garden, tomato", "casual", ""])
        .row(["Composting basics", "Bins; Greens and browns", "compost", "", "de"])
        .row([
            XlsxCell::from("Best of"),
            XlsxCell::Empty,
            XlsxCell::Empty,
            XlsxCell::Empty,
            XlsxCell::Empty,
        ])
        .row([
            XlsxCell::from(2024.0),
            XlsxCell::from("Review"),
            XlsxCell::Empty,
            XlsxCell::Empty,
            XlsxCell::Empty,
        ])
        .build()
}

#[test]
fn test_xlsx_rows_parsed_in_sheet_order() {
    let rows = SpreadsheetParser::new()
        .parse("articles.xlsx", &article_workbook())
        .unwrap();

    let titles: Vec<&str> = rows.iter().map(|r| r.spec.title.as_str()).collect();
    assert_eq!(titles, vec!["Growing tomatoes", "Composting basics", "Best of", "2024"]);
    assert!(rows.iter().all(|r| r.is_valid()));

    let indices: Vec<usize> = rows.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    // The header sits on sheet row 2, so data starts on line 3.
    let lines: Vec<usize> = rows.iter().map(|r| r.line).collect();
    assert_eq!(lines, vec![3, 4, 5, 6]);
}

#[test]
fn test_xlsx_columns_mapped_through_header_aliases() {
    let rows = SpreadsheetParser::new()
        .parse("articles.xlsx", &article_workbook())
        .unwrap();

    let tomatoes = &rows[0].spec;
    assert_eq!(tomatoes.sub_headings, vec!["Soil", "Watering", "Harvest"]);
    assert_eq!(tomatoes.keywords, vec!["garden", "tomato"]);
    assert_eq!(tomatoes.tone, Tone::Casual);
    assert_eq!(tomatoes.language, Language::English);

    let compost = &rows[1].spec;
    assert_eq!(compost.sub_headings, vec!["Bins", "Greens and browns"]);
    assert_eq!(compost.tone, Tone::Professional);
    assert_eq!(compost.language, Language::German);

    assert!(rows[2].spec.sub_headings.is_empty());
    assert_eq!(rows[3].spec.sub_headings, vec!["Review"]);
}

#[test]
fn test_xlsx_without_title_column_is_rejected() {
    let sheet = XlsxBuilder::new()
        .row(["Outline", "Tags"])
        .row(["Intro", "misc"])
        .build();

    let err = SpreadsheetParser::new().parse("nope.xlsx", &sheet).unwrap_err();
    assert!(err.to_string().contains("title"), "error: {}", err);
}

#[tokio::test]
async fn test_xlsx_job_generates_every_row() {
    let pipeline = pipeline(Arc::new(ScriptedGenerator::new()), 2);

    let handle = pipeline
        .submit("articles.xlsx", &article_workbook(), None, JobSettings::default())
        .unwrap();
    let job_id = handle.job_id().to_string();
    let summary = handle.wait().await.unwrap();

    assert_eq!(summary.status, JobStatus::Completed);
    assert_eq!(summary.total_articles, 4);
    assert_eq!(summary.completed_articles, 4);

    let results = pipeline.results(&job_id).unwrap();
    let Some(RowOutcome::Success { article }) = &results[0] else {
        panic!("first row should succeed");
    };
    assert_eq!(article.title, "Growing tomatoes");
    let headings: Vec<&str> = article.sections.iter().map(|s| s.heading.as_str()).collect();
    assert_eq!(headings, vec!["Soil", "Watering", "Harvest"]);
}
