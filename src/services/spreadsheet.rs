//! Reads the first worksheet of an `.xls`/`.xlsx` workbook into columns.
//!
//! The header row is row 1 of the sheet read from column A rightwards, stopping
//! at the first blank cell. Every following row that has at least one non-blank
//! cell becomes one data row; cells past the last header are ignored and missing
//! or blank cells are recorded as `None`. Date cells are stored as ISO-8601
//! text and repeated header names are suffixed to keep them distinct.

use std::collections::HashSet;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use thiserror::Error;

use crate::models::upload::{CellValue, ColumnData};

const ISO_DATETIME: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Failed to parse Excel file: {0}")]
    Workbook(#[from] calamine::Error),
    #[error("Failed to parse Excel file: workbook has no worksheets")]
    NoWorksheet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSheet {
    pub columns: Vec<ColumnData>,
    pub row_count: usize,
}

impl ParsedSheet {
    fn empty() -> Self {
        Self {
            columns: Vec::new(),
            row_count: 0,
        }
    }
}

pub fn parse_workbook(bytes: Vec<u8>) -> Result<ParsedSheet, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::NoWorksheet)??;

    Ok(parse_range(&range))
}

fn is_blank(cell: &Data) -> bool {
    match cell {
        Data::Empty => true,
        Data::String(s) => s.is_empty(),
        _ => false,
    }
}

fn cell_value(cell: &Data) -> Option<CellValue> {
    match cell {
        Data::Empty => None,
        Data::Bool(b) => Some(CellValue::Bool(*b)),
        Data::Int(i) => Some(CellValue::Int(*i)),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
            Some(CellValue::Int(*f as i64))
        }
        Data::Float(f) => Some(CellValue::Float(*f)),
        Data::String(s) => Some(CellValue::Text(s.clone())),
        Data::DateTime(d) if d.is_datetime() => match d.as_datetime() {
            Some(dt) => Some(CellValue::Text(dt.format(ISO_DATETIME).to_string())),
            None => Some(CellValue::Float(d.as_f64())),
        },
        Data::DateTime(d) => Some(CellValue::Float(d.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(CellValue::Text(s.clone())),
        Data::Error(e) => Some(CellValue::Text(e.to_string())),
    }
}

/// Repeated headers get a `_2`, `_3`, ... suffix so every column can be named.
fn unique_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .map(|header| {
            let mut candidate = header.clone();
            let mut n = 2;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{}_{}", header, n);
                n += 1;
            }
            candidate
        })
        .collect()
}

fn header_text(cell: &Data) -> String {
    match cell_value(cell) {
        Some(CellValue::Text(s)) => s,
        Some(CellValue::Int(i)) => i.to_string(),
        Some(CellValue::Float(f)) => f.to_string(),
        Some(CellValue::Bool(b)) => b.to_string(),
        None => String::new(),
    }
}

/// `range` only spans the used area of the sheet, so its start offset decides
/// whether row 1 / column A were populated at all.
fn parse_range(range: &Range<Data>) -> ParsedSheet {
    let Some((start_row, start_col)) = range.start() else {
        return ParsedSheet::empty();
    };
    if start_row != 0 || start_col != 0 {
        return ParsedSheet::empty();
    }

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(first) => first
            .iter()
            .take_while(|cell| !is_blank(cell))
            .map(header_text)
            .collect(),
        None => Vec::new(),
    };

    if headers.is_empty() {
        return ParsedSheet::empty();
    }

    let mut columns: Vec<ColumnData> = unique_headers(headers)
        .into_iter()
        .map(|header| ColumnData {
            header,
            values: Vec::new(),
        })
        .collect();
    let mut row_count = 0;

    for row in rows {
        if row.iter().all(is_blank) {
            continue;
        }

        row_count += 1;
        for (idx, column) in columns.iter_mut().enumerate() {
            column.values.push(row.get(idx).and_then(cell_value));
        }
    }

    ParsedSheet { columns, row_count }
}
