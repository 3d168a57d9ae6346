//! Column resolution: header detection and logical-field mapping
//!
//! Spreadsheet exports rarely agree on where the header row sits or what a
//! column is called. The resolver locates the header by scoring candidate
//! rows against the configured aliases, then maps each logical field to a
//! concrete column position, honoring explicit index overrides for files
//! with duplicate header names.

use tracing::debug;

use crate::config::{ColumnSpec, TableColumns};
use crate::types::{Cell, RawTable, ReconError, ReconResult, SourceKind};

/// Concrete column positions for one table, computed once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedColumns {
    /// Detected (or configured) header row index
    pub header_row: usize,
    /// Account code column
    pub account_code: usize,
    /// Debit column; `None` only for trial balances missing that side
    pub debit: Option<usize>,
    /// Credit column; `None` only for trial balances missing that side
    pub credit: Option<usize>,
    /// Book column when one resolved by alias or index
    pub book: Option<usize>,
}

impl ResolvedColumns {
    /// Whether the table carries a real book column
    pub fn has_book(&self) -> bool {
        self.book.is_some()
    }
}

/// Resolves logical fields against a raw table
pub struct ColumnResolver<'a> {
    columns: &'a TableColumns,
    header_row_index: Option<usize>,
    header_scan_limit: usize,
}

impl<'a> ColumnResolver<'a> {
    /// Create a resolver over one table's column configuration
    pub fn new(
        columns: &'a TableColumns,
        header_row_index: Option<usize>,
        header_scan_limit: usize,
    ) -> Self {
        Self {
            columns,
            header_row_index,
            header_scan_limit,
        }
    }

    /// Resolve all logical fields, failing if a required one is missing
    ///
    /// Requirements depend on the source: journals need account code, debit
    /// and credit; trial balances need account code and at least one of
    /// debit/credit. The book column is optional everywhere.
    pub fn resolve(&self, table: &RawTable, kind: SourceKind) -> ReconResult<ResolvedColumns> {
        let header_row = self.locate_header(table)?;
        let header = normalized_header_row(&table.rows[header_row]);
        debug!(table = %table.name, header_row, "resolved header row");

        let account_code = self
            .resolve_field(table, &header, &self.columns.account_code, "account_code")?
            .ok_or_else(|| self.missing(table, &self.columns.account_code, "account_code"))?;

        let debit = self.resolve_field(table, &header, &self.columns.debit, "debit")?;
        let credit = self.resolve_field(table, &header, &self.columns.credit, "credit")?;

        match kind {
            SourceKind::Journal => {
                if debit.is_none() {
                    return Err(self.missing(table, &self.columns.debit, "debit"));
                }
                if credit.is_none() {
                    return Err(self.missing(table, &self.columns.credit, "credit"));
                }
            }
            SourceKind::TrialBalance => {
                if debit.is_none() && credit.is_none() {
                    return Err(self.missing(table, &self.columns.debit, "debit/credit"));
                }
            }
        }

        let book = match &self.columns.book {
            Some(spec) => self.resolve_field(table, &header, spec, "book")?,
            None => None,
        };

        Ok(ResolvedColumns {
            header_row,
            account_code,
            debit,
            credit,
            book,
        })
    }

    /// Pick the header row: configured override, or the scanned row with the
    /// most alias hits (ties break to the earliest row)
    fn locate_header(&self, table: &RawTable) -> ReconResult<usize> {
        if let Some(index) = self.header_row_index {
            if index >= table.rows.len() {
                return Err(ReconError::HeaderRowOutOfRange {
                    table: table.name.clone(),
                    index,
                    rows: table.rows.len(),
                });
            }
            debug!(table = %table.name, index, "using configured header row");
            return Ok(index);
        }

        let scan = self.header_scan_limit.min(table.rows.len());
        let mut best: Option<(usize, usize)> = None;
        for (row_index, row) in table.rows.iter().take(scan).enumerate() {
            let hits = self.alias_hits(row);
            if hits > 0 && best.map_or(true, |(_, best_hits)| hits > best_hits) {
                best = Some((row_index, hits));
            }
        }

        match best {
            Some((row_index, hits)) => {
                debug!(table = %table.name, row_index, hits, "detected header row");
                Ok(row_index)
            }
            None => Err(ReconError::HeaderNotFound {
                table: table.name.clone(),
                scanned: scan,
            }),
        }
    }

    /// Count cells in a candidate row matching any configured alias
    fn alias_hits(&self, row: &[Cell]) -> usize {
        let mut specs: Vec<&ColumnSpec> = vec![
            &self.columns.account_code,
            &self.columns.debit,
            &self.columns.credit,
        ];
        if let Some(book) = &self.columns.book {
            specs.push(book);
        }

        row.iter()
            .filter_map(|cell| cell.as_text())
            .map(|text| normalize_header(&text))
            .filter(|text| {
                specs
                    .iter()
                    .any(|spec| spec.aliases.iter().any(|a| normalize_header(a) == *text))
            })
            .count()
    }

    fn resolve_field(
        &self,
        table: &RawTable,
        header: &[Option<String>],
        spec: &ColumnSpec,
        field: &str,
    ) -> ReconResult<Option<usize>> {
        find_field(&table.name, header, spec, field)
    }

    fn missing(&self, table: &RawTable, spec: &ColumnSpec, field: &str) -> ReconError {
        ReconError::MissingColumn {
            table: table.name.clone(),
            field: field.to_string(),
            aliases: spec.aliases.join(", "),
        }
    }
}

/// Resolve one field against a normalized header row: explicit index wins,
/// otherwise the first alias that matches a header cell (alias priority
/// first, then column order)
pub fn find_field(
    table_name: &str,
    header: &[Option<String>],
    spec: &ColumnSpec,
    field: &str,
) -> ReconResult<Option<usize>> {
    if let Some(index) = spec.index {
        if index >= header.len() {
            return Err(ReconError::ColumnIndexOutOfRange {
                table: table_name.to_string(),
                field: field.to_string(),
                index,
                width: header.len(),
            });
        }
        return Ok(Some(index));
    }

    for alias in &spec.aliases {
        let wanted = normalize_header(alias);
        for (col, cell) in header.iter().enumerate() {
            if cell.as_deref() == Some(wanted.as_str()) {
                return Ok(Some(col));
            }
        }
    }
    Ok(None)
}

/// Normalize a header row for [`find_field`] lookups
pub fn normalized_header_row(row: &[Cell]) -> Vec<Option<String>> {
    row.iter()
        .map(|cell| cell.as_text().map(|s| normalize_header(&s)))
        .collect()
}

/// Case-fold and collapse whitespace for header comparison
fn normalize_header(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
