use crate::error::ImportError;
use crate::records::StudentDraft;
use std::io::Read;

struct Columns {
    name: usize,
    age: usize,
    class: usize,
    marks: Option<usize>,
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
}

fn resolve_columns(headers: &csv::StringRecord) -> Result<Columns, ImportError> {
    let name = find_column(headers, &["name"]);
    let age = find_column(headers, &["age"]);
    let class = find_column(headers, &["class", "class_id"]);
    let mut missing = Vec::new();
    if name.is_none() {
        missing.push("name".to_string());
    }
    if age.is_none() {
        missing.push("age".to_string());
    }
    if class.is_none() {
        missing.push("class".to_string());
    }
    match (name, age, class) {
        (Some(name), Some(age), Some(class)) => Ok(Columns {
            name,
            age,
            class,
            marks: find_column(headers, &["marks", "mark"]),
        }),
        _ => Err(ImportError::MissingColumns(missing)),
    }
}

/// Reads an externally supplied student sheet. Needs `name`, `age` and `class`
/// (or `class_id`); `marks` is optional. Nothing is returned unless every row parses.
pub fn parse_students<R: Read>(source: R) -> Result<Vec<StudentDraft>, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);
    let headers = rdr
        .headers()
        .map_err(|e| ImportError::Unreadable(e.to_string()))?
        .clone();
    let cols = resolve_columns(&headers)?;

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(|e| ImportError::Unreadable(e.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let cell = |idx: usize| record.get(idx).map(str::trim).unwrap_or("");

        if record.iter().all(|c| c.trim().is_empty()) {
            continue;
        }

        let name = cell(cols.name);
        if name.is_empty() {
            return Err(ImportError::BadRow {
                line,
                message: "name is empty".to_string(),
            });
        }
        let age = cell(cols.age)
            .parse::<u32>()
            .map_err(|_| ImportError::BadRow {
                line,
                message: format!("age must be a whole number, got {:?}", cell(cols.age)),
            })?;
        let class_id = cell(cols.class);
        if class_id.is_empty() {
            return Err(ImportError::BadRow {
                line,
                message: "class is empty".to_string(),
            });
        }
        let marks = match cols.marks.map(cell).filter(|m| !m.is_empty()) {
            None => None,
            Some(raw) => Some(raw.parse::<f64>().map_err(|_| ImportError::BadRow {
                line,
                message: format!("marks must be numeric, got {:?}", raw),
            })?),
        };

        out.push(StudentDraft {
            name: name.to_string(),
            age,
            class_id: class_id.to_string(),
            marks,
        });
    }
    Ok(out)
}
