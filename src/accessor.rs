/// Typed accessor surface shared by `Table` and `TableView`.
///
/// Implementors supply the engine, the schema, the root table and a single
/// validity checkpoint (`validated_id`). Everything else is a default
/// method: each one that touches rows passes the checkpoint first and then
/// delegates to the engine. Schema metadata is answered locally.

use crate::column::{ColumnType, ColumnValue};
use crate::cursor::{RowCursor, Rows};
use crate::engine::{Aggregate, Engine, ResourceId};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::table::{Schema, Table};
use crate::view::{SortOrder, TableView};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

pub trait TableOrView {
    fn engine(&self) -> &Rc<Engine>;

    fn schema(&self) -> &Schema;

    /// The table at the root of any chain of views.
    fn root_table(&self) -> Result<Rc<Table>>;

    /// Pure validity check; never fails.
    fn is_valid(&self) -> bool;

    fn is_read_only(&self) -> bool;

    /// Validity checkpoint. Fails with `InvalidState` when `is_valid()` is
    /// false, otherwise returns the native resource to operate on.
    fn validated_id(&self) -> Result<ResourceId>;

    fn size(&self) -> Result<usize> {
        let id = self.validated_id()?;
        self.engine().size(id)
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.size()? == 0)
    }

    fn column_count(&self) -> usize {
        self.schema().len()
    }

    fn column_index(&self, name: &str) -> Result<usize> {
        self.schema()
            .get_column_index(name)
            .ok_or_else(|| Error::ColumnNotFound(name.to_string()))
    }

    fn column_name(&self, column: usize) -> Result<&str> {
        self.schema()
            .get_column_info(column)
            .map(|(name, _, _)| name)
            .ok_or_else(|| Error::out_of_range(column, self.schema().len()))
    }

    fn column_type(&self, column: usize) -> Result<ColumnType> {
        self.schema()
            .get_column_info(column)
            .map(|(_, column_type, _)| column_type)
            .ok_or_else(|| Error::out_of_range(column, self.schema().len()))
    }

    /// Position in the root table of a row of this table or view.
    fn source_index(&self, row: usize) -> Result<usize> {
        let id = self.validated_id()?;
        self.engine().source_index(id, row)
    }

    // ==================== Cell access ====================

    fn get_value(&self, column: usize, row: usize) -> Result<ColumnValue> {
        let id = self.validated_id()?;
        self.column_type(column)?;
        self.engine().get(id, column, row)
    }

    /// All cells of a row keyed by column name.
    fn get_row(&self, row: usize) -> Result<HashMap<String, ColumnValue>> {
        let id = self.validated_id()?;
        self.engine().row_map(id, row)
    }

    fn get_value_by_name(&self, name: &str, row: usize) -> Result<ColumnValue> {
        let column = self.column_index(name)?;
        self.get_value(column, row)
    }

    /// Write any value the column accepts. Cell writes are not structural
    /// and leave every view valid.
    fn set_value(&self, column: usize, row: usize, value: ColumnValue) -> Result<()> {
        let id = writable_id(self)?;
        self.column_type(column)?;
        self.engine().set(id, column, row, value)
    }

    fn set_value_by_name(&self, name: &str, row: usize, value: ColumnValue) -> Result<()> {
        let column = self.column_index(name)?;
        self.set_value(column, row, value)
    }

    fn is_null(&self, column: usize, row: usize) -> Result<bool> {
        Ok(self.get_value(column, row)?.is_null())
    }

    fn set_null(&self, column: usize, row: usize) -> Result<()> {
        self.set_value(column, row, ColumnValue::Null)
    }

    fn get_int(&self, column: usize, row: usize) -> Result<i64> {
        let value = read(self, column, row, ColumnType::Int)?;
        value.as_int().ok_or_else(|| mismatch(ColumnType::Int, &value))
    }

    fn get_bool(&self, column: usize, row: usize) -> Result<bool> {
        let value = read(self, column, row, ColumnType::Bool)?;
        value.as_bool().ok_or_else(|| mismatch(ColumnType::Bool, &value))
    }

    fn get_float(&self, column: usize, row: usize) -> Result<f32> {
        let value = read(self, column, row, ColumnType::Float)?;
        value.as_float().ok_or_else(|| mismatch(ColumnType::Float, &value))
    }

    fn get_double(&self, column: usize, row: usize) -> Result<f64> {
        let value = read(self, column, row, ColumnType::Double)?;
        value.as_double().ok_or_else(|| mismatch(ColumnType::Double, &value))
    }

    fn get_string(&self, column: usize, row: usize) -> Result<String> {
        match read(self, column, row, ColumnType::String)? {
            ColumnValue::String(s) => Ok(s),
            other => Err(mismatch(ColumnType::String, &other)),
        }
    }

    fn get_binary(&self, column: usize, row: usize) -> Result<Vec<u8>> {
        match read(self, column, row, ColumnType::Binary)? {
            ColumnValue::Binary(bytes) => Ok(bytes),
            other => Err(mismatch(ColumnType::Binary, &other)),
        }
    }

    /// Milliseconds since the Unix epoch.
    fn get_timestamp(&self, column: usize, row: usize) -> Result<i64> {
        let value = read(self, column, row, ColumnType::Timestamp)?;
        value.as_timestamp().ok_or_else(|| mismatch(ColumnType::Timestamp, &value))
    }

    fn get_mixed(&self, column: usize, row: usize) -> Result<ColumnValue> {
        read(self, column, row, ColumnType::Mixed)
    }

    /// The nested table stored in a subtable cell. The returned table
    /// borrows its storage from the parent row and becomes invalid when that
    /// row is removed.
    fn get_subtable(&self, column: usize, row: usize) -> Result<Rc<Table>> {
        let id = self.validated_id()?;
        expect_type(self, column, ColumnType::Table)?;
        let (child, name, schema) = self.engine().subtable(id, column, row)?;
        Ok(Table::subtable(self.root_table()?, child, name, schema, self.is_read_only()))
    }

    fn set_int(&self, column: usize, row: usize, value: i64) -> Result<()> {
        write(self, column, row, ColumnType::Int, ColumnValue::Int(value))
    }

    fn set_bool(&self, column: usize, row: usize, value: bool) -> Result<()> {
        write(self, column, row, ColumnType::Bool, ColumnValue::Bool(value))
    }

    fn set_float(&self, column: usize, row: usize, value: f32) -> Result<()> {
        write(self, column, row, ColumnType::Float, ColumnValue::Float(value))
    }

    fn set_double(&self, column: usize, row: usize, value: f64) -> Result<()> {
        write(self, column, row, ColumnType::Double, ColumnValue::Double(value))
    }

    fn set_string(&self, column: usize, row: usize, value: &str) -> Result<()> {
        write(self, column, row, ColumnType::String, ColumnValue::String(value.to_string()))
    }

    fn set_binary(&self, column: usize, row: usize, value: &[u8]) -> Result<()> {
        write(self, column, row, ColumnType::Binary, ColumnValue::Binary(value.to_vec()))
    }

    fn set_timestamp(&self, column: usize, row: usize, value: i64) -> Result<()> {
        write(self, column, row, ColumnType::Timestamp, ColumnValue::Timestamp(value))
    }

    fn set_mixed(&self, column: usize, row: usize, value: ColumnValue) -> Result<()> {
        write(self, column, row, ColumnType::Mixed, value)
    }

    /// Replace the contents of a subtable cell. This is structural for the
    /// nested table only; the parent's version is unchanged.
    fn set_subtable(&self, column: usize, row: usize, rows: Vec<HashMap<String, ColumnValue>>) -> Result<()> {
        writable_id(self)?;
        let nested = self.get_subtable(column, row)?;
        nested.replace_rows(rows)?;
        Ok(())
    }

    // ==================== Search ====================

    fn find_first_int(&self, column: usize, value: i64) -> Result<Option<usize>> {
        find_first(self, column, ColumnType::Int, ColumnValue::Int(value))
    }

    fn find_first_bool(&self, column: usize, value: bool) -> Result<Option<usize>> {
        find_first(self, column, ColumnType::Bool, ColumnValue::Bool(value))
    }

    fn find_first_timestamp(&self, column: usize, value: i64) -> Result<Option<usize>> {
        find_first(self, column, ColumnType::Timestamp, ColumnValue::Timestamp(value))
    }

    fn find_first_float(&self, column: usize, value: f32) -> Result<Option<usize>> {
        find_first(self, column, ColumnType::Float, ColumnValue::Float(value))
    }

    fn find_first_double(&self, column: usize, value: f64) -> Result<Option<usize>> {
        find_first(self, column, ColumnType::Double, ColumnValue::Double(value))
    }

    fn find_first_string(&self, column: usize, value: &str) -> Result<Option<usize>> {
        find_first(self, column, ColumnType::String, ColumnValue::String(value.to_string()))
    }

    fn find_first_binary(&self, column: usize, value: &[u8]) -> Result<Option<usize>> {
        find_first(self, column, ColumnType::Binary, ColumnValue::Binary(value.to_vec()))
    }

    fn find_all_int(&self, column: usize, value: i64) -> Result<TableView> {
        find_all(self, column, ColumnType::Int, ColumnValue::Int(value))
    }

    fn find_all_bool(&self, column: usize, value: bool) -> Result<TableView> {
        find_all(self, column, ColumnType::Bool, ColumnValue::Bool(value))
    }

    fn find_all_timestamp(&self, column: usize, value: i64) -> Result<TableView> {
        find_all(self, column, ColumnType::Timestamp, ColumnValue::Timestamp(value))
    }

    fn find_all_float(&self, column: usize, value: f32) -> Result<TableView> {
        find_all(self, column, ColumnType::Float, ColumnValue::Float(value))
    }

    fn find_all_double(&self, column: usize, value: f64) -> Result<TableView> {
        find_all(self, column, ColumnType::Double, ColumnValue::Double(value))
    }

    fn find_all_string(&self, column: usize, value: &str) -> Result<TableView> {
        find_all(self, column, ColumnType::String, ColumnValue::String(value.to_string()))
    }

    /// The storage engine has no binary find-all; this always fails with
    /// `NotImplemented` on a valid source.
    fn find_all_binary(&self, column: usize, _value: &[u8]) -> Result<TableView> {
        self.validated_id()?;
        expect_type(self, column, ColumnType::Binary)?;
        Err(Error::NotImplemented("find_all_binary"))
    }

    /// View of the rows whose row map satisfies `predicate`. The predicate
    /// may read or write cells; if it adds or removes rows the filter fails
    /// with `InvalidState`.
    fn filter<F>(&self, predicate: F) -> Result<TableView>
    where
        F: Fn(&HashMap<String, ColumnValue>) -> bool,
    {
        let id = self.validated_id()?;
        let view_id = self.engine().filter(id, &predicate)?;
        derive_view(self, view_id)
    }

    /// New view over the same rows ordered by an int, bool or timestamp
    /// column.
    fn sorted_view(&self, column: usize, order: SortOrder) -> Result<TableView> {
        let id = self.validated_id()?;
        expect_sortable(self, column)?;
        let view_id = self.engine().sorted(id, column, order == SortOrder::Ascending)?;
        derive_view(self, view_id)
    }

    // ==================== Aggregates ====================

    fn sum_int(&self, column: usize) -> Result<i64> {
        let value = aggregate(self, column, ColumnType::Int, Aggregate::Sum)?;
        value.as_int().ok_or_else(|| mismatch(ColumnType::Int, &value))
    }

    fn sum_float(&self, column: usize) -> Result<f64> {
        let value = aggregate(self, column, ColumnType::Float, Aggregate::Sum)?;
        value.as_double().ok_or_else(|| mismatch(ColumnType::Double, &value))
    }

    fn sum_double(&self, column: usize) -> Result<f64> {
        let value = aggregate(self, column, ColumnType::Double, Aggregate::Sum)?;
        value.as_double().ok_or_else(|| mismatch(ColumnType::Double, &value))
    }

    fn minimum_int(&self, column: usize) -> Result<i64> {
        let value = aggregate(self, column, ColumnType::Int, Aggregate::Minimum)?;
        value.as_int().ok_or_else(|| mismatch(ColumnType::Int, &value))
    }

    fn minimum_float(&self, column: usize) -> Result<f32> {
        let value = aggregate(self, column, ColumnType::Float, Aggregate::Minimum)?;
        value.as_float().ok_or_else(|| mismatch(ColumnType::Float, &value))
    }

    fn minimum_double(&self, column: usize) -> Result<f64> {
        let value = aggregate(self, column, ColumnType::Double, Aggregate::Minimum)?;
        value.as_double().ok_or_else(|| mismatch(ColumnType::Double, &value))
    }

    fn minimum_timestamp(&self, column: usize) -> Result<i64> {
        let value = aggregate(self, column, ColumnType::Timestamp, Aggregate::Minimum)?;
        value.as_timestamp().ok_or_else(|| mismatch(ColumnType::Timestamp, &value))
    }

    fn maximum_int(&self, column: usize) -> Result<i64> {
        let value = aggregate(self, column, ColumnType::Int, Aggregate::Maximum)?;
        value.as_int().ok_or_else(|| mismatch(ColumnType::Int, &value))
    }

    fn maximum_float(&self, column: usize) -> Result<f32> {
        let value = aggregate(self, column, ColumnType::Float, Aggregate::Maximum)?;
        value.as_float().ok_or_else(|| mismatch(ColumnType::Float, &value))
    }

    fn maximum_double(&self, column: usize) -> Result<f64> {
        let value = aggregate(self, column, ColumnType::Double, Aggregate::Maximum)?;
        value.as_double().ok_or_else(|| mismatch(ColumnType::Double, &value))
    }

    fn maximum_timestamp(&self, column: usize) -> Result<i64> {
        let value = aggregate(self, column, ColumnType::Timestamp, Aggregate::Maximum)?;
        value.as_timestamp().ok_or_else(|| mismatch(ColumnType::Timestamp, &value))
    }

    /// Mean of the non-null cells; 0.0 when there are none.
    fn average_int(&self, column: usize) -> Result<f64> {
        let value = aggregate(self, column, ColumnType::Int, Aggregate::Average)?;
        value.as_double().ok_or_else(|| mismatch(ColumnType::Double, &value))
    }

    fn average_float(&self, column: usize) -> Result<f64> {
        let value = aggregate(self, column, ColumnType::Float, Aggregate::Average)?;
        value.as_double().ok_or_else(|| mismatch(ColumnType::Double, &value))
    }

    fn average_double(&self, column: usize) -> Result<f64> {
        let value = aggregate(self, column, ColumnType::Double, Aggregate::Average)?;
        value.as_double().ok_or_else(|| mismatch(ColumnType::Double, &value))
    }

    fn count_int(&self, column: usize, value: i64) -> Result<usize> {
        count(self, column, ColumnType::Int, ColumnValue::Int(value))
    }

    fn count_float(&self, column: usize, value: f32) -> Result<usize> {
        count(self, column, ColumnType::Float, ColumnValue::Float(value))
    }

    fn count_double(&self, column: usize, value: f64) -> Result<usize> {
        count(self, column, ColumnType::Double, ColumnValue::Double(value))
    }

    fn count_string(&self, column: usize, value: &str) -> Result<usize> {
        count(self, column, ColumnType::String, ColumnValue::String(value.to_string()))
    }

    // ==================== Cursors ====================

    /// Cursor at `index`; fails with `IndexOutOfRange` outside `[0, size)`.
    fn row(&self, index: usize) -> Result<RowCursor<'_, Self>> {
        let size = self.size()?;
        if index >= size {
            return Err(Error::out_of_range(index, size));
        }
        Ok(RowCursor::new(self, index))
    }

    fn last(&self) -> Result<RowCursor<'_, Self>> {
        let size = self.size()?;
        if size == 0 {
            return Err(Error::invalid_state("empty view: there is no last row"));
        }
        Ok(RowCursor::new(self, size - 1))
    }

    /// Enumerate rows in order. The iterator fails with `InvalidState` at
    /// the first step after a structural change to the root table.
    fn rows(&self) -> Rows<'_, Self> {
        Rows::new(self)
    }

    // ==================== Rendering ====================

    fn to_json(&self) -> Result<String> {
        let id = self.validated_id()?;
        self.engine().to_json(id)
    }

    fn to_string_limited(&self, limit: usize) -> Result<String> {
        let id = self.validated_id()?;
        self.engine().to_string(id, Some(limit))
    }

    fn row_to_string(&self, row: usize) -> Result<String> {
        let id = self.validated_id()?;
        self.engine().row_to_string(id, row)
    }
}

fn mismatch(expected: ColumnType, value: &ColumnValue) -> Error {
    Error::TypeMismatch {
        expected,
        found: value.type_name().to_string(),
    }
}

fn expect_type<S: TableOrView + ?Sized>(source: &S, column: usize, expected: ColumnType) -> Result<()> {
    let actual = source.column_type(column)?;
    if actual == expected {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            expected,
            found: format!("{:?} column", actual),
        })
    }
}

pub(crate) fn expect_sortable<S: TableOrView + ?Sized>(source: &S, column: usize) -> Result<()> {
    let column_type = source.column_type(column)?;
    if column_type.is_sortable() {
        Ok(())
    } else {
        Err(Error::UnsupportedColumnType {
            operation: "sort",
            column_type,
        })
    }
}

/// Checkpoint for writes: valid and not read-only.
pub(crate) fn writable_id<S: TableOrView + ?Sized>(source: &S) -> Result<ResourceId> {
    let id = source.validated_id()?;
    if source.is_read_only() {
        return Err(Error::invalid_state("cannot write through a read-only handle"));
    }
    Ok(id)
}

/// Wrap a freshly created native view. If the view cannot be bound, the
/// handle is dropped and the native view released before the error returns.
pub(crate) fn derive_view<S: TableOrView + ?Sized>(source: &S, view_id: ResourceId) -> Result<TableView> {
    let handle = Handle::owned(source.engine(), view_id, source.is_read_only());
    TableView::new(source.root_table()?, Some(handle))
}

pub(crate) fn render<S: TableOrView + ?Sized>(source: &S, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match source
        .validated_id()
        .and_then(|id| source.engine().to_string(id, None))
    {
        Ok(text) => f.write_str(&text),
        Err(e) => write!(f, "<{}>", e),
    }
}

fn read<S: TableOrView + ?Sized>(source: &S, column: usize, row: usize, expected: ColumnType) -> Result<ColumnValue> {
    let id = source.validated_id()?;
    expect_type(source, column, expected)?;
    source.engine().get(id, column, row)
}

fn write<S: TableOrView + ?Sized>(source: &S, column: usize, row: usize, expected: ColumnType, value: ColumnValue) -> Result<()> {
    let id = writable_id(source)?;
    expect_type(source, column, expected)?;
    source.engine().set(id, column, row, value)
}

fn find_first<S: TableOrView + ?Sized>(source: &S, column: usize, expected: ColumnType, value: ColumnValue) -> Result<Option<usize>> {
    let id = source.validated_id()?;
    expect_type(source, column, expected)?;
    source.engine().find_first(id, column, &value)
}

fn find_all<S: TableOrView + ?Sized>(source: &S, column: usize, expected: ColumnType, value: ColumnValue) -> Result<TableView> {
    let id = source.validated_id()?;
    expect_type(source, column, expected)?;
    let view_id = source.engine().find_all(id, column, &value)?;
    derive_view(source, view_id)
}

fn aggregate<S: TableOrView + ?Sized>(source: &S, column: usize, expected: ColumnType, op: Aggregate) -> Result<ColumnValue> {
    let id = source.validated_id()?;
    expect_type(source, column, expected)?;
    source.engine().aggregate(id, column, op)
}

fn count<S: TableOrView + ?Sized>(source: &S, column: usize, expected: ColumnType, value: ColumnValue) -> Result<usize> {
    let id = source.validated_id()?;
    expect_type(source, column, expected)?;
    source.engine().count(id, column, &value)
}
