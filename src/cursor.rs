/// Row cursors and row enumeration.
///
/// A `RowCursor` is a (source, position) pair. It caches nothing: every
/// read goes back through the source, which re-checks validity first.
///
/// `Rows` enumerates a table or view in order. It captures the root table
/// version when created and re-checks it before each step; a mismatch ends
/// the enumeration with `InvalidState`, after which it yields nothing and
/// cannot be reset.

use crate::accessor::TableOrView;
use crate::column::ColumnValue;
use crate::error::{Error, Result};
use crate::table::Table;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub struct RowCursor<'a, S: TableOrView + ?Sized> {
    source: &'a S,
    row: usize,
}

impl<'a, S: TableOrView + ?Sized> RowCursor<'a, S> {
    pub(crate) fn new(source: &'a S, row: usize) -> Self {
        RowCursor { source, row }
    }

    /// Position within the source table or view.
    pub fn row_index(&self) -> usize {
        self.row
    }

    /// Position within the root table.
    pub fn source_index(&self) -> Result<usize> {
        self.source.source_index(self.row)
    }

    pub fn source(&self) -> &'a S {
        self.source
    }

    /// True while the source is valid and still covers this position.
    pub fn is_valid(&self) -> bool {
        self.source.is_valid() && self.source.size().map_or(false, |size| self.row < size)
    }

    pub fn get_value(&self, column: usize) -> Result<ColumnValue> {
        self.source.get_value(column, self.row)
    }

    pub fn get_row(&self) -> Result<HashMap<String, ColumnValue>> {
        self.source.get_row(self.row)
    }

    pub fn get_value_by_name(&self, name: &str) -> Result<ColumnValue> {
        self.source.get_value_by_name(name, self.row)
    }

    pub fn is_null(&self, column: usize) -> Result<bool> {
        self.source.is_null(column, self.row)
    }

    pub fn get_int(&self, column: usize) -> Result<i64> {
        self.source.get_int(column, self.row)
    }

    pub fn get_bool(&self, column: usize) -> Result<bool> {
        self.source.get_bool(column, self.row)
    }

    pub fn get_float(&self, column: usize) -> Result<f32> {
        self.source.get_float(column, self.row)
    }

    pub fn get_double(&self, column: usize) -> Result<f64> {
        self.source.get_double(column, self.row)
    }

    pub fn get_string(&self, column: usize) -> Result<String> {
        self.source.get_string(column, self.row)
    }

    pub fn get_binary(&self, column: usize) -> Result<Vec<u8>> {
        self.source.get_binary(column, self.row)
    }

    pub fn get_timestamp(&self, column: usize) -> Result<i64> {
        self.source.get_timestamp(column, self.row)
    }

    pub fn get_mixed(&self, column: usize) -> Result<ColumnValue> {
        self.source.get_mixed(column, self.row)
    }

    pub fn get_subtable(&self, column: usize) -> Result<Rc<Table>> {
        self.source.get_subtable(column, self.row)
    }

    pub fn set_value(&self, column: usize, value: ColumnValue) -> Result<()> {
        self.source.set_value(column, self.row, value)
    }

    pub fn set_null(&self, column: usize) -> Result<()> {
        self.source.set_null(column, self.row)
    }

    pub fn set_int(&self, column: usize, value: i64) -> Result<()> {
        self.source.set_int(column, self.row, value)
    }

    pub fn set_bool(&self, column: usize, value: bool) -> Result<()> {
        self.source.set_bool(column, self.row, value)
    }

    pub fn set_float(&self, column: usize, value: f32) -> Result<()> {
        self.source.set_float(column, self.row, value)
    }

    pub fn set_double(&self, column: usize, value: f64) -> Result<()> {
        self.source.set_double(column, self.row, value)
    }

    pub fn set_string(&self, column: usize, value: &str) -> Result<()> {
        self.source.set_string(column, self.row, value)
    }

    pub fn set_binary(&self, column: usize, value: &[u8]) -> Result<()> {
        self.source.set_binary(column, self.row, value)
    }

    pub fn set_timestamp(&self, column: usize, value: i64) -> Result<()> {
        self.source.set_timestamp(column, self.row, value)
    }

    pub fn set_mixed(&self, column: usize, value: ColumnValue) -> Result<()> {
        self.source.set_mixed(column, self.row, value)
    }
}

impl<S: TableOrView + ?Sized> Clone for RowCursor<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: TableOrView + ?Sized> Copy for RowCursor<'_, S> {}

impl<S: TableOrView + ?Sized> fmt::Display for RowCursor<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source.row_to_string(self.row) {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "<{}>", e),
        }
    }
}

impl<S: TableOrView + ?Sized> fmt::Debug for RowCursor<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor").field("row", &self.row).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Exhausted,
    Failed,
}

/// Ordered enumeration of the rows of a table or view.
pub struct Rows<'a, S: TableOrView + ?Sized> {
    source: &'a S,
    /// Root table version at creation; `None` if the source was already
    /// invalid.
    version: Option<u64>,
    position: usize,
    state: State,
}

impl<'a, S: TableOrView + ?Sized> Rows<'a, S> {
    pub(crate) fn new(source: &'a S) -> Self {
        let version = source.root_table().and_then(|table| table.version()).ok();
        Rows {
            source,
            version,
            position: 0,
            state: State::Active,
        }
    }

    /// Next position to be yielded.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_failed(&self) -> bool {
        self.state == State::Failed
    }

    /// Restart from the first row. Fails once the enumeration has failed,
    /// or if the table changed since the enumeration was created.
    pub fn reset(&mut self) -> Result<()> {
        if self.state == State::Failed {
            return Err(Error::invalid_state(
                "enumeration has failed and cannot be restarted; start a new one",
            ));
        }
        if let Err(e) = self.check_version() {
            self.state = State::Failed;
            return Err(e);
        }
        self.position = 0;
        self.state = State::Active;
        Ok(())
    }

    fn check_version(&self) -> Result<()> {
        let captured = self
            .version
            .ok_or_else(|| Error::invalid_state("enumeration started on an invalid table or view"))?;
        let current = self.source.root_table()?.version()?;
        if captured != current {
            log::debug!(
                "enumeration stopped at row {}: table version {} -> {}",
                self.position,
                captured,
                current
            );
            return Err(Error::invalid_state(format!(
                "concurrent modification during iteration (table version {} -> {})",
                captured, current
            )));
        }
        Ok(())
    }

    fn step(&mut self) -> Result<Option<RowCursor<'a, S>>> {
        self.check_version()?;
        let size = self.source.size()?;
        if self.position >= size {
            return Ok(None);
        }
        let cursor = RowCursor::new(self.source, self.position);
        self.position += 1;
        Ok(Some(cursor))
    }
}

impl<'a, S: TableOrView + ?Sized> Iterator for Rows<'a, S> {
    type Item = Result<RowCursor<'a, S>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.state != State::Active {
            return None;
        }
        match self.step() {
            Ok(Some(cursor)) => Some(Ok(cursor)),
            Ok(None) => {
                self.state = State::Exhausted;
                None
            }
            Err(e) => {
                self.state = State::Failed;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnType;
    use crate::engine::Engine;
    use crate::table::Schema;

    fn numbers(values: &[i64]) -> Rc<Table> {
        let engine = Engine::new();
        let schema = Schema::new(vec![("n".to_string(), ColumnType::Int, false)]);
        let table = Table::new(&engine, "numbers", schema).unwrap();
        for v in values {
            let mut row = HashMap::new();
            row.insert("n".to_string(), ColumnValue::Int(*v));
            table.append_row(row).unwrap();
        }
        table
    }

    #[test]
    fn test_rows_in_order() {
        let table = numbers(&[3, 1, 4]);
        let view = table.all_rows().unwrap();
        let values: Vec<i64> = view
            .rows()
            .map(|cursor| cursor.unwrap().get_int(0).unwrap())
            .collect();
        assert_eq!(values, vec![3, 1, 4]);
    }

    #[test]
    fn test_rows_fail_after_structural_change() {
        let table = numbers(&[1, 2, 3]);
        let view = table.all_rows().unwrap();
        let mut rows = view.rows();

        assert!(rows.next().unwrap().is_ok());
        table.add_empty_row().unwrap();
        assert!(matches!(rows.next(), Some(Err(Error::InvalidState(_)))));
        assert!(rows.next().is_none());
        assert!(rows.is_failed());
        assert!(matches!(rows.reset(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_rows_reset() {
        let table = numbers(&[1, 2]);
        let mut rows = table.rows();
        assert_eq!(rows.by_ref().count(), 2);
        assert!(rows.next().is_none());

        rows.reset().unwrap();
        assert_eq!(rows.position(), 0);
        assert_eq!(rows.next().unwrap().unwrap().get_int(0).unwrap(), 1);

        // Cell writes do not disturb enumeration.
        table.set_int(0, 1, 20).unwrap();
        assert_eq!(rows.next().unwrap().unwrap().get_int(0).unwrap(), 20);
    }

    #[test]
    fn test_reset_after_change_fails() {
        let table = numbers(&[1]);
        let mut rows = table.rows();
        table.remove(0).unwrap();
        assert!(matches!(rows.reset(), Err(Error::InvalidState(_))));
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_cursor_reads_live_values() {
        let table = numbers(&[7, 8]);
        let view = table.all_rows().unwrap();
        let cursor = view.row(1).unwrap();
        assert_eq!(cursor.row_index(), 1);
        assert_eq!(cursor.get_row().unwrap()["n"], ColumnValue::Int(8));
        assert_eq!(cursor.source_index().unwrap(), 1);

        table.set_int(0, 1, 80).unwrap();
        assert_eq!(cursor.get_int(0).unwrap(), 80);
        cursor.set_int(0, 81).unwrap();
        assert_eq!(table.get_int(0, 1).unwrap(), 81);
        assert!(cursor.is_valid());

        table.remove(0).unwrap();
        assert!(!cursor.is_valid());
        assert!(matches!(cursor.get_int(0), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_cursor_on_table_past_end() {
        let table = numbers(&[1, 2]);
        let cursor = table.last().unwrap();
        table.remove(0).unwrap();
        // Tables are authoritative; the stale position is a bounds error.
        assert!(!cursor.is_valid());
        assert!(matches!(cursor.get_int(0), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_enumeration_on_invalid_source() {
        let table = numbers(&[1]);
        let view = table.all_rows().unwrap();
        table.add_empty_row().unwrap();
        let mut rows = view.rows();
        assert!(matches!(rows.next(), Some(Err(Error::InvalidState(_)))));
        assert!(rows.next().is_none());
    }
}
