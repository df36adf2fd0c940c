// Tabular files: named columns over rows of nullable text cells.

use crate::errors::TableError;
use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;
use std::io::Cursor;

/// A single cell. `None` is a null (written as an empty CSV field).
pub type Cell = Option<String>;

pub fn number_cell(value: f64) -> Cell {
    Some(value.to_string())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_columns(columns: &[&str]) -> Self {
        Self::new(columns.iter().map(|name| name.to_string()).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)?.as_deref()
    }

    /// Numeric view of a cell. Nulls and non-numeric text read as `None`.
    pub fn get_f64(&self, row: usize, column: &str) -> Option<f64> {
        self.get(row, column)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .filter(|value| value.is_finite())
    }

    pub fn set(&mut self, row: usize, column: &str, value: Cell) -> bool {
        let Some(col) = self.column_index(column) else {
            return false;
        };
        match self.rows.get_mut(row) {
            Some(cells) => {
                cells[col] = value;
                true
            }
            None => false,
        }
    }

    /// Adds a column filled with nulls. Returns the index of the column,
    /// which is the existing one if the name is already present.
    pub fn add_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column_index(name) {
            return idx;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(None);
        }
        self.columns.len() - 1
    }

    pub fn rename_column(&mut self, idx: usize, name: String) {
        if let Some(column) = self.columns.get_mut(idx) {
            *column = name;
        }
    }

    pub fn remove_column(&mut self, idx: usize) -> Vec<Cell> {
        if idx >= self.columns.len() {
            return Vec::new();
        }
        self.columns.remove(idx);
        self.rows.iter_mut().map(|row| row.remove(idx)).collect()
    }

    /// Mutable access to every cell of one column, in row order.
    pub fn column_cells_mut(&mut self, idx: usize) -> impl Iterator<Item = &mut Cell> + '_ {
        self.rows.iter_mut().filter_map(move |row| row.get_mut(idx))
    }

    /// Appends a row given as `(column, value)` pairs. Columns the table does
    /// not have yet are added; columns the row does not mention stay null.
    pub fn push_row<I, S>(&mut self, values: I)
    where
        I: IntoIterator<Item = (S, Cell)>,
        S: AsRef<str>,
    {
        let mut row = vec![None; self.columns.len()];
        for (column, value) in values {
            let idx = self.add_column(column.as_ref());
            if idx >= row.len() {
                row.resize(idx + 1, None);
            }
            row[idx] = value;
        }
        self.rows.push(row);
    }

    pub fn remove_row(&mut self, index: usize) -> Result<Vec<Cell>, TableError> {
        if index >= self.rows.len() {
            return Err(TableError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(index))
    }

    /// Appends every row of `other`, matching cells by column name.
    pub fn append(&mut self, other: &Table) {
        for row in &other.rows {
            self.push_row(
                other
                    .columns
                    .iter()
                    .zip(row.iter().cloned())
                    .map(|(column, value)| (column.as_str(), value)),
            );
        }
    }

    pub fn from_csv(bytes: &[u8]) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let mut row: Vec<Cell> = record
                .iter()
                .take(columns.len())
                .map(|field| {
                    if field.trim().is_empty() {
                        None
                    } else {
                        Some(field.to_string())
                    }
                })
                .collect();
            row.resize(columns.len(), None);
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn to_csv(&self) -> Result<Vec<u8>, TableError> {
        let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
        }
        writer
            .into_inner()
            .map_err(|err| TableError::Io(err.into_error()))
    }

    /// Single-sheet workbook with a header row. Cells of `numeric_columns`
    /// that parse as numbers are written as numbers, everything else as text.
    pub fn to_xlsx(&self, numeric_columns: &[&str]) -> Result<Vec<u8>, TableError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();

        for (col, name) in self.columns.iter().enumerate() {
            worksheet.write_string(0, col as u16, name.as_str())?;
        }
        for (col, name) in self.columns.iter().enumerate() {
            let numeric = numeric_columns.contains(&name.as_str());
            for (row_idx, row) in self.rows.iter().enumerate() {
                let Some(value) = &row[col] else { continue };
                let xlsx_row = row_idx as u32 + 1;
                let number = value
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .filter(|number| numeric && number.is_finite());
                match number {
                    Some(number) => {
                        worksheet.write_number(xlsx_row, col as u16, number)?;
                    }
                    None => {
                        worksheet.write_string(xlsx_row, col as u16, value.as_str())?;
                    }
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }

    /// Reads the first sheet of an xlsx workbook. The first row holds the
    /// column names.
    pub fn from_xlsx(bytes: &[u8]) -> Result<Self, TableError> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
        let sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or(TableError::NoSheets)?;
        let range = workbook.worksheet_range(&sheet)?;

        let mut rows = range.rows();
        let columns: Vec<String> = match rows.next() {
            Some(header) => header
                .iter()
                .map(|cell| xlsx_cell(cell).unwrap_or_default())
                .collect(),
            None => Vec::new(),
        };
        let rows = rows
            .map(|cells| {
                let mut row: Vec<Cell> = cells.iter().take(columns.len()).map(xlsx_cell).collect();
                row.resize(columns.len(), None);
                row
            })
            .collect();

        Ok(Self { columns, rows })
    }
}

fn xlsx_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => None,
        Data::String(value) if value.trim().is_empty() => None,
        Data::String(value) => Some(value.clone()),
        Data::Float(number) => number_cell(*number),
        Data::Int(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}
