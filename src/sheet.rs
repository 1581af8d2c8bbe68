use anyhow::Context;
use calamine::{open_workbook_auto, Data, Reader};
use serde_json::{Map, Value};
use std::path::Path;

pub const SUPPORTED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

/// Extension gate for uploaded workbooks. Checked before any parsing so a
/// wrong file type is rejected with a plain message instead of a parser
/// error.
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            SUPPORTED_EXTENSIONS.iter().any(|s| *s == e)
        })
        .unwrap_or(false)
}

fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(Value::Number((*i).into())),
        Data::Float(f) => serde_json::Number::from_f64(*f).map(Value::Number),
        Data::Bool(b) => Some(Value::Bool(*b)),
        // Dates, durations and cell errors surface as their display text and
        // fall through to field validation like any other string.
        other => Some(Value::String(other.to_string())),
    }
}

/// Read the first worksheet into raw rows keyed by the header row's cell
/// text. Rows keep their sheet position (interior blank rows become empty
/// maps) so row numbers reported downstream line up with the spreadsheet;
/// trailing blank rows are dropped.
pub fn read_rows(path: &Path) -> anyhow::Result<Vec<Map<String, Value>>> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("open workbook {}", path.display()))?;
    let sheet_names = workbook.sheet_names().to_owned();
    let Some(first) = sheet_names.first() else {
        anyhow::bail!("workbook has no sheets");
    };
    let range = workbook
        .worksheet_range(first)
        .with_context(|| format!("read sheet {first:?}"))?;

    let mut rows_iter = range.rows();
    let Some(header_cells) = rows_iter.next() else {
        return Ok(Vec::new());
    };
    let headers: Vec<String> = header_cells
        .iter()
        .map(|c| match c {
            Data::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        })
        .collect();

    let mut rows: Vec<Map<String, Value>> = Vec::new();
    for cells in rows_iter {
        let mut row = Map::new();
        for (i, cell) in cells.iter().enumerate() {
            let Some(header) = headers.get(i) else {
                break;
            };
            if header.is_empty() {
                continue;
            }
            if let Some(value) = cell_to_value(cell) {
                row.insert(header.clone(), value);
            }
        }
        rows.push(row);
    }
    while rows.last().is_some_and(|r| r.is_empty()) {
        rows.pop();
    }
    Ok(rows)
}
