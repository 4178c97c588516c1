//! CSV import of reference data.
//!
//! Shared by `POST /api/admin/{kind}/import` and `hm-cli import`. The file is
//! parsed and validated in full first, then rows are written one at a time.
//! A bad row never aborts the import; it is reported with its line number.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;

use harvest_market_core::StateId;

use crate::db::reference::{CategoryInput, CityInput, StateInput, UnitInput};
use crate::db::{ReferenceRepository, RepositoryError};
use crate::validation::{self, ValidationError};

/// Largest file accepted, in data rows.
pub const MAX_ROWS: usize = 5_000;

pub const MAX_NAME: usize = 100;
pub const MAX_ABBREVIATION: usize = 16;
pub const MAX_STATE_CODE: usize = 8;
pub const MAX_DESCRIPTION: usize = 500;

/// Errors that stop an import before or during writing.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unknown import kind: {0}")]
    UnknownKind(String),

    #[error("CSV is missing the required '{0}' column")]
    MissingColumn(&'static str),

    #[error("CSV has no header row")]
    MissingHeader,

    #[error("CSV has more than {max} rows")]
    TooManyRows { max: usize },

    #[error("CSV could not be read: {0}")]
    Csv(#[from] csv::Error),

    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Which reference table a file feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Categories,
    Units,
    States,
    Cities,
}

impl ImportKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Categories => "categories",
            Self::Units => "units",
            Self::States => "states",
            Self::Cities => "cities",
        }
    }

    const fn required_columns(self) -> &'static [&'static str] {
        match self {
            Self::Categories | Self::States => &["name"],
            Self::Units => &["name", "abbreviation"],
            Self::Cities => &["name", "state"],
        }
    }
}

impl FromStr for ImportKind {
    type Err = ImportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "categories" => Ok(Self::Categories),
            "units" => Ok(Self::Units),
            "states" => Ok(Self::States),
            "cities" => Ok(Self::Cities),
            other => Err(ImportError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedRow {
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RowError {
    pub line: u64,
    pub message: String,
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportReport {
    pub inserted: u32,
    pub skipped: Vec<SkippedRow>,
    pub errors: Vec<RowError>,
}

impl ImportReport {
    fn skip(&mut self, line: u64, reason: impl Into<String>) {
        self.skipped.push(SkippedRow {
            line,
            reason: reason.into(),
        });
    }

    fn error(&mut self, line: u64, message: impl Into<String>) {
        self.errors.push(RowError {
            line,
            message: message.into(),
        });
    }
}

/// One validated row.
#[derive(Debug, Clone)]
enum ImportRow {
    Category(CategoryInput),
    Unit(UnitInput),
    State(StateInput),
    City { state: String, name: String },
}

impl ImportRow {
    /// Case-insensitive identity used to spot duplicates inside one file.
    fn dedupe_key(&self) -> String {
        match self {
            Self::Category(c) => c.name.to_lowercase(),
            Self::Unit(u) => u.name.to_lowercase(),
            Self::State(s) => s.name.to_lowercase(),
            Self::City { state, name } => {
                format!("{}\u{1f}{}", state.to_lowercase(), name.to_lowercase())
            }
        }
    }
}

#[derive(Debug)]
struct ParsedRow {
    line: u64,
    row: Result<ImportRow, ValidationError>,
}

/// Header positions, looked up by lowercase name.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn get<'r>(&self, record: &'r csv::StringRecord, name: &str) -> Option<&'r str> {
        self.0.get(name).and_then(|&i| record.get(i))
    }
}

fn parse_csv(kind: ImportKind, data: &[u8]) -> Result<Vec<ParsedRow>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let headers = reader.headers()?.clone();
    if headers.iter().all(str::is_empty) {
        return Err(ImportError::MissingHeader);
    }

    let columns = Columns(
        headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.trim_start_matches('\u{feff}').to_lowercase(), i))
            .collect(),
    );
    for &required in kind.required_columns() {
        if !columns.0.contains_key(required) {
            return Err(ImportError::MissingColumn(required));
        }
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        if rows.len() == MAX_ROWS {
            return Err(ImportError::TooManyRows { max: MAX_ROWS });
        }
        let line = record.position().map_or(0, csv::Position::line);
        rows.push(ParsedRow {
            line,
            row: parse_record(kind, &columns, &record),
        });
    }

    Ok(rows)
}

fn parse_record(
    kind: ImportKind,
    columns: &Columns,
    record: &csv::StringRecord,
) -> Result<ImportRow, ValidationError> {
    let name = validation::required_text(
        "name",
        columns.get(record, "name").unwrap_or_default(),
        MAX_NAME,
    )?;

    let row = match kind {
        ImportKind::Categories => {
            let description = validation::optional_text(
                "description",
                columns.get(record, "description"),
                MAX_DESCRIPTION,
            )?;
            let slug = validation::slugify(&name);
            if slug.is_empty() {
                return Err(ValidationError(
                    "name must contain letters or digits".to_string(),
                ));
            }
            ImportRow::Category(CategoryInput {
                name,
                slug,
                description,
                image_url: None,
            })
        }
        ImportKind::Units => ImportRow::Unit(UnitInput {
            name,
            abbreviation: validation::required_text(
                "abbreviation",
                columns.get(record, "abbreviation").unwrap_or_default(),
                MAX_ABBREVIATION,
            )?,
        }),
        ImportKind::States => ImportRow::State(StateInput {
            name,
            code: validation::optional_text("code", columns.get(record, "code"), MAX_STATE_CODE)?
                .map(|c| c.to_uppercase()),
        }),
        ImportKind::Cities => ImportRow::City {
            state: validation::required_text(
                "state",
                columns.get(record, "state").unwrap_or_default(),
                MAX_NAME,
            )?,
            name,
        },
    };

    Ok(row)
}

/// Imports reference data from CSV.
pub struct Importer<'a> {
    reference: ReferenceRepository<'a>,
}

impl<'a> Importer<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            reference: ReferenceRepository::new(pool),
        }
    }

    /// Import `data` into the table for `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read as CSV, lacks a required
    /// column or is too long, or if the database fails. Row-level problems
    /// are reported in the [`ImportReport`] instead.
    #[tracing::instrument(skip(self, data), fields(kind = kind.as_str(), bytes = data.len()))]
    pub async fn import(&self, kind: ImportKind, data: &[u8]) -> Result<ImportReport, ImportError> {
        let rows = parse_csv(kind, data)?;
        let mut report = ImportReport::default();
        let mut seen = HashSet::new();
        let mut states: HashMap<String, Option<StateId>> = HashMap::new();

        for ParsedRow { line, row } in rows {
            let row = match row {
                Ok(row) => row,
                Err(e) => {
                    report.error(line, e.0);
                    continue;
                }
            };

            if !seen.insert(row.dedupe_key()) {
                report.skip(line, "duplicate row in file");
                continue;
            }

            match self.write_row(row, &mut states).await {
                Ok(RowOutcome::Inserted) => report.inserted += 1,
                Ok(RowOutcome::Exists) => report.skip(line, "already exists"),
                Ok(RowOutcome::Invalid(message)) => report.error(line, message),
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            inserted = report.inserted,
            skipped = report.skipped.len(),
            errors = report.errors.len(),
            "Import finished"
        );
        Ok(report)
    }

    async fn write_row(
        &self,
        row: ImportRow,
        states: &mut HashMap<String, Option<StateId>>,
    ) -> Result<RowOutcome, RepositoryError> {
        let result = match row {
            ImportRow::Category(input) => {
                if self
                    .reference
                    .find_category(&input.name, &input.slug)
                    .await?
                    .is_some()
                {
                    return Ok(RowOutcome::Exists);
                }
                self.reference.create_category(&input).await.map(drop)
            }
            ImportRow::Unit(input) => {
                if self.reference.find_unit(&input.name).await?.is_some() {
                    return Ok(RowOutcome::Exists);
                }
                self.reference.create_unit(&input).await.map(drop)
            }
            ImportRow::State(input) => {
                if self.reference.find_state(&input.name).await?.is_some() {
                    return Ok(RowOutcome::Exists);
                }
                self.reference.create_state(&input).await.map(drop)
            }
            ImportRow::City { state, name } => {
                let key = state.to_lowercase();
                let state_id = match states.get(&key) {
                    Some(id) => *id,
                    None => {
                        let id = self.reference.find_state(&state).await?.map(|s| s.id);
                        states.insert(key, id);
                        id
                    }
                };
                let Some(state_id) = state_id else {
                    return Ok(RowOutcome::Invalid(format!("unknown state: {state}")));
                };
                if self.reference.find_city(state_id, &name).await?.is_some() {
                    return Ok(RowOutcome::Exists);
                }
                self.reference
                    .create_city(&CityInput { state_id, name })
                    .await
                    .map(drop)
            }
        };

        match result {
            Ok(()) => Ok(RowOutcome::Inserted),
            // Inserted concurrently between lookup and insert
            Err(RepositoryError::Conflict(_)) => Ok(RowOutcome::Exists),
            Err(RepositoryError::InvalidReference(msg)) => Ok(RowOutcome::Invalid(msg)),
            Err(e) => Err(e),
        }
    }
}

enum RowOutcome {
    Inserted,
    Exists,
    Invalid(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ok_rows(rows: &[ParsedRow]) -> Vec<&ImportRow> {
        rows.iter().filter_map(|r| r.row.as_ref().ok()).collect()
    }

    #[test]
    fn test_kind_from_path_segment() {
        assert_eq!("cities".parse::<ImportKind>().unwrap(), ImportKind::Cities);
        assert!(matches!(
            "users".parse::<ImportKind>(),
            Err(ImportError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_categories_with_optional_description() {
        let csv = "name,description\nFresh Fruits,Seasonal\nGrains,\n";
        let rows = parse_csv(ImportKind::Categories, csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        match ok_rows(&rows).as_slice() {
            [ImportRow::Category(a), ImportRow::Category(b)] => {
                assert_eq!(a.slug, "fresh-fruits");
                assert_eq!(a.description.as_deref(), Some("Seasonal"));
                assert_eq!(b.description, None);
            }
            other => panic!("unexpected rows: {other:?}"),
        }
    }

    #[test]
    fn test_headers_are_case_insensitive_and_bom_tolerant() {
        let csv = "\u{feff}Name,Abbreviation\nKilogram,kg\n";
        let rows = parse_csv(ImportKind::Units, csv.as_bytes()).unwrap();
        assert!(matches!(ok_rows(&rows).as_slice(), [ImportRow::Unit(_)]));
    }

    #[test]
    fn test_missing_required_column() {
        let csv = "name\nKilogram\n";
        assert!(matches!(
            parse_csv(ImportKind::Units, csv.as_bytes()),
            Err(ImportError::MissingColumn("abbreviation"))
        ));
    }

    #[test]
    fn test_bad_rows_carry_line_numbers() {
        let csv = "name,state\nIbadan,Oyo\n,Oyo\nKano,\n";
        let rows = parse_csv(ImportKind::Cities, csv.as_bytes()).unwrap();
        let failures: Vec<(u64, String)> = rows
            .iter()
            .filter_map(|r| r.row.as_ref().err().map(|e| (r.line, e.0.clone())))
            .collect();
        assert_eq!(
            failures,
            vec![
                (3, "name is required".to_string()),
                (4, "state is required".to_string())
            ]
        );
    }

    #[test]
    fn test_state_codes_are_uppercased() {
        let csv = "name,code\nLagos,la\n";
        let rows = parse_csv(ImportKind::States, csv.as_bytes()).unwrap();
        match ok_rows(&rows).as_slice() {
            [ImportRow::State(s)] => assert_eq!(s.code.as_deref(), Some("LA")),
            other => panic!("unexpected rows: {other:?}"),
        }
    }

    #[test]
    fn test_dedupe_key_ignores_case() {
        let a = ImportRow::City {
            state: "Oyo".into(),
            name: "Ibadan".into(),
        };
        let b = ImportRow::City {
            state: "OYO".into(),
            name: "ibadan".into(),
        };
        assert_eq!(a.dedupe_key(), b.dedupe_key());
    }

    #[test]
    fn test_row_limit() {
        let mut csv = String::from("name\n");
        for i in 0..=MAX_ROWS {
            csv.push_str(&format!("State {i}\n"));
        }
        assert!(matches!(
            parse_csv(ImportKind::States, csv.as_bytes()),
            Err(ImportError::TooManyRows { .. })
        ));
    }
}
