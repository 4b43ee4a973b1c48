//! In-memory row-set shared by the loaders, the reprojector and the writers

use std::collections::HashMap;

use crate::types::Value;

/// One row of a [`RowSet`], tagged with its positional identity
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    id: usize,
    cells: Vec<Value>,
}

impl Row {
    /// Stable identity assigned at load time
    pub fn id(&self) -> usize {
        self.id
    }

    /// Cells in column order
    pub fn cells(&self) -> &[Value] {
        &self.cells
    }
}

/// Ordered sequence of rows with a homogeneous column set
///
/// Rows keep the identity they were given when the row-set was built, so a
/// filtered copy can be merged back into its parent with [`RowSet::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowSet {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RowSet {
    /// Creates an empty row-set with the given columns
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Builds a row-set from raw cell vectors, assigning positional identities
    ///
    /// Short rows are padded with nulls, long rows are truncated.
    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: impl IntoIterator<Item = Vec<Value>>,
    ) -> Self {
        let mut set = Self::new(columns);
        for cells in rows {
            set.push(cells);
        }
        set
    }

    /// Appends a row; its identity is its position
    pub fn push(&mut self, mut cells: Vec<Value>) {
        cells.resize(self.columns.len(), Value::Null);
        let id = self.rows.len();
        self.rows.push(Row { id, cells });
    }

    /// Column names in order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Returns whether the column exists
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Adds the column filled with `default` if missing, returning its index
    pub fn ensure_column(&mut self, name: &str, default: Value) -> usize {
        if let Some(index) = self.column_index(name) {
            return index;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.cells.push(default.clone());
        }
        self.columns.len() - 1
    }

    /// Cell at row position `row` and column index `column`
    pub fn cell(&self, row: usize, column: usize) -> &Value {
        &self.rows[row].cells[column]
    }

    /// Overwrites a cell
    pub fn set_cell(&mut self, row: usize, column: usize, value: Value) {
        self.rows[row].cells[column] = value;
    }

    /// Cell by column name, `None` when the column or row does not exist
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let column = self.column_index(column)?;
        self.rows.get(row)?.cells.get(column)
    }

    /// All cells of one column in row order
    pub fn column(&self, column: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row.cells[column])
    }

    /// Overwrites every cell of a column with the same value
    pub fn fill_column(&mut self, column: usize, value: Value) {
        for row in &mut self.rows {
            row.cells[column] = value.clone();
        }
    }

    /// Distinct values of a column in first-seen order
    pub fn distinct(&self, column: usize) -> Vec<Value> {
        let mut seen: Vec<Value> = Vec::new();
        for value in self.column(column) {
            if !seen.contains(value) {
                seen.push(value.clone());
            }
        }
        seen
    }

    /// Copy of the rows matching `predicate`, identities preserved
    pub fn filter<F>(&self, mut predicate: F) -> RowSet
    where
        F: FnMut(&Row) -> bool,
    {
        RowSet {
            columns: self.columns.clone(),
            rows: self.rows.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// Merges `other` into this row-set by row identity
    ///
    /// Only columns present in both sets are touched, and null cells in
    /// `other` never overwrite existing values. Rows of `other` whose identity
    /// is unknown here are ignored. Returns the number of rows updated.
    pub fn update(&mut self, other: &RowSet) -> usize {
        let positions: HashMap<usize, usize> = self
            .rows
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.id, pos))
            .collect();

        let shared: Vec<(usize, usize)> = other
            .columns
            .iter()
            .enumerate()
            .filter_map(|(src, name)| self.column_index(name).map(|dst| (src, dst)))
            .collect();

        let mut updated = 0;
        for row in &other.rows {
            let Some(&pos) = positions.get(&row.id) else {
                continue;
            };
            for &(src, dst) in &shared {
                let value = &row.cells[src];
                if !value.is_null() {
                    self.rows[pos].cells[dst] = value.clone();
                }
            }
            updated += 1;
        }
        updated
    }

    /// Copies the named columns of `other` into this row-set by row
    /// identity, null cells included
    ///
    /// Names missing from either set are skipped. Returns the number of rows
    /// assigned.
    pub fn assign_columns(&mut self, other: &RowSet, names: &[&str]) -> usize {
        let positions: HashMap<usize, usize> = self
            .rows
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.id, pos))
            .collect();

        let pairs: Vec<(usize, usize)> = names
            .iter()
            .filter_map(|name| Some((other.column_index(name)?, self.column_index(name)?)))
            .collect();

        let mut assigned = 0;
        for row in &other.rows {
            let Some(&pos) = positions.get(&row.id) else {
                continue;
            };
            for &(src, dst) in &pairs {
                self.rows[pos].cells[dst] = row.cells[src].clone();
            }
            assigned += 1;
        }
        assigned
    }
}
