/// LiveView Table Implementation
///
/// A Table is the mutable base collection: a schema plus row storage held by
/// the engine behind an owned `Handle`. Inserting or removing rows is a
/// structural mutation and bumps the table version; writing a cell is not.
///
/// # Examples
///
/// ```
/// use liveview::{ColumnType, ColumnValue, Engine, Schema, Table, TableOrView};
/// use std::collections::HashMap;
///
/// let engine = Engine::new();
/// let schema = Schema::new(vec![
///     ("id".to_string(), ColumnType::Int, false),
///     ("name".to_string(), ColumnType::String, false),
/// ]);
/// let table = Table::new(&engine, "users", schema).unwrap();
///
/// let mut row = HashMap::new();
/// row.insert("id".to_string(), ColumnValue::Int(1));
/// row.insert("name".to_string(), ColumnValue::String("Alice".to_string()));
/// table.append_row(row).unwrap();
///
/// assert_eq!(table.size().unwrap(), 1);
/// assert_eq!(table.version().unwrap(), 1);
/// assert_eq!(table.get_string(1, 0).unwrap(), "Alice");
/// ```

use crate::accessor::{self, TableOrView};
use crate::column::{ColumnType, ColumnValue};
use crate::engine::{Engine, ResourceId};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::view::TableView;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

/// Schema definition with column names and types.
///
/// A schema defines the structure of a table, specifying the name, type,
/// and nullability of each column. Subtable columns carry the schema of the
/// nested table created for every row.
///
/// # Examples
///
/// ```
/// use liveview::{Schema, ColumnType};
///
/// let items = Schema::new(vec![("sku".to_string(), ColumnType::String, false)]);
/// let schema = Schema::new(vec![
///     ("id".to_string(), ColumnType::Int, false),      // Required
///     ("note".to_string(), ColumnType::String, true),  // Nullable
/// ])
/// .with_subtable("items", items);
///
/// assert_eq!(schema.len(), 3);
/// assert_eq!(schema.get_column_index("items"), Some(2));
/// assert!(schema.subtable_schema("items").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    columns: Vec<(String, ColumnType, bool)>, // (name, type, nullable)
    subtables: Vec<(String, Schema)>,
}

impl Schema {
    /// Creates a new schema with the specified columns.
    ///
    /// # Arguments
    ///
    /// * `columns` - Vector of tuples: (column_name, column_type, is_nullable)
    pub fn new(columns: Vec<(String, ColumnType, bool)>) -> Self {
        Schema {
            columns,
            subtables: Vec::new(),
        }
    }

    /// Appends a subtable column whose rows each hold a nested table with
    /// `schema`.
    pub fn with_subtable(mut self, name: impl Into<String>, schema: Schema) -> Self {
        let name = name.into();
        self.columns.push((name.clone(), ColumnType::Table, false));
        self.subtables.push((name, schema));
        self
    }

    /// Returns the number of columns in the schema.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns a list of all column names.
    pub fn get_column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(name, _, _)| name.as_str()).collect()
    }

    /// Returns the index of a column by name, or None if not found.
    pub fn get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|(n, _, _)| n == name)
    }

    /// Returns information about a column at the given index.
    ///
    /// Returns a tuple of (name, type, nullable) or None if index is out of bounds.
    pub fn get_column_info(&self, index: usize) -> Option<(&str, ColumnType, bool)> {
        self.columns.get(index).map(|(name, ty, nullable)| (name.as_str(), *ty, *nullable))
    }

    /// Returns the type of a column by name, or None if not found.
    pub fn get_column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, ty, _)| *ty)
    }

    /// Schema of the nested tables stored in a subtable column.
    pub fn subtable_schema(&self, name: &str) -> Option<&Schema> {
        self.subtables
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, schema)| schema)
    }

    pub(crate) fn columns(&self) -> impl Iterator<Item = (&str, ColumnType, bool)> + '_ {
        self.columns
            .iter()
            .map(|(name, ty, nullable)| (name.as_str(), *ty, *nullable))
    }

    fn check_unique(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for (name, _, _) in &self.columns {
            if !seen.insert(name.as_str()) {
                return Err(Error::DuplicateColumn(name.clone()));
            }
        }
        for (_, nested) in &self.subtables {
            nested.check_unique()?;
        }
        Ok(())
    }
}

/// Mutable base table.
///
/// Tables are always held in an `Rc`: views keep their root table alive
/// through it, and subtables keep their parent alive the same way.
pub struct Table {
    name: String,
    schema: Schema,
    engine: Rc<Engine>,
    /// `None` once the table has been closed.
    handle: RefCell<Option<Handle>>,
    /// Parent of a subtable or read-only alias.
    parent: Option<Rc<Table>>,
    self_ref: Weak<Table>,
}

impl Table {
    /// Create a new table in `engine`.
    ///
    /// Fails with `DuplicateColumn` if the schema (or a nested subtable
    /// schema) repeats a column name.
    pub fn new(engine: &Rc<Engine>, name: impl Into<String>, schema: Schema) -> Result<Rc<Table>> {
        let name = name.into();
        schema.check_unique()?;
        let id = engine.create_table(&name, schema.clone());
        let handle = Handle::owned(engine, id, false);
        Ok(Self::bind(engine, name, schema, handle, None))
    }

    fn bind(engine: &Rc<Engine>, name: String, schema: Schema, handle: Handle, parent: Option<Rc<Table>>) -> Rc<Table> {
        Rc::new_cyclic(|self_ref| Table {
            name,
            schema,
            engine: Rc::clone(engine),
            handle: RefCell::new(Some(handle)),
            parent,
            self_ref: self_ref.clone(),
        })
    }

    /// Bind a nested table owned by a row of `parent`.
    pub(crate) fn subtable(parent: Rc<Table>, id: ResourceId, name: String, schema: Schema, read_only: bool) -> Rc<Table> {
        let engine = Rc::clone(&parent.engine);
        let handle = Handle::borrowed(&engine, id, read_only);
        Self::bind(&engine, name, schema, handle, Some(parent))
    }

    /// A read-only alias over the same storage. The alias sees every change
    /// made through this table, and views derived from it are read-only.
    pub fn read_only(&self) -> Result<Rc<Table>> {
        let id = self.validated_id()?;
        let handle = Handle::borrowed(&self.engine, id, true);
        Ok(Self::bind(&self.engine, self.name.clone(), self.schema.clone(), handle, Some(self.root_table()?)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Rc<Table>> {
        self.parent.as_ref()
    }

    /// Current structural version.
    pub fn version(&self) -> Result<u64> {
        let id = self.validated_id()?;
        self.engine.version(id)
    }

    pub fn is_closed(&self) -> bool {
        self.handle.borrow().is_none()
    }

    /// Release the table now. The table and every view or cursor derived
    /// from it become permanently invalid. Closing a subtable or read-only
    /// alias only detaches that binding.
    pub fn close(&self) {
        let handle = self.handle.borrow_mut().take();
        if let Some(handle) = handle {
            log::debug!("closing table '{}'", self.name);
            handle.release();
        }
    }

    /// Convert a row map to per-column values in schema order. Subtable
    /// columns may be omitted.
    fn row_values(&self, mut row: HashMap<String, ColumnValue>) -> Result<Vec<Option<ColumnValue>>> {
        let mut values = Vec::with_capacity(self.schema.len());
        for (name, column_type, nullable) in self.schema.columns() {
            match row.remove(name) {
                Some(ColumnValue::Null) => {
                    if !nullable && !matches!(column_type, ColumnType::Table | ColumnType::Mixed) {
                        return Err(Error::NotNullable(name.to_string()));
                    }
                    values.push(Some(ColumnValue::Null));
                }
                Some(value) if column_type != ColumnType::Table && value.fits(column_type) => {
                    values.push(Some(value));
                }
                Some(value) => {
                    return Err(Error::TypeMismatch {
                        expected: column_type,
                        found: value.type_name().to_string(),
                    });
                }
                None if column_type == ColumnType::Table => values.push(None),
                None => return Err(Error::MissingValue(name.to_string())),
            }
        }
        if let Some(extra) = row.into_keys().next() {
            return Err(Error::ColumnNotFound(extra));
        }
        Ok(values)
    }

    /// Append a row, returning its index.
    pub fn append_row(&self, row: HashMap<String, ColumnValue>) -> Result<usize> {
        let id = accessor::writable_id(self)?;
        let values = self.row_values(row)?;
        self.engine.append_row(id, values)
    }

    /// Append several rows. All rows are checked first; on error no rows
    /// are inserted.
    pub fn append_rows(&self, rows: Vec<HashMap<String, ColumnValue>>) -> Result<usize> {
        let id = accessor::writable_id(self)?;
        let prepared = self.prepare_rows(rows)?;
        self.insert_prepared(id, prepared)
    }

    /// Replace every row. All rows are validated before the table is
    /// touched, so a rejected batch leaves the old rows in place.
    pub fn replace_rows(&self, rows: Vec<HashMap<String, ColumnValue>>) -> Result<usize> {
        let id = accessor::writable_id(self)?;
        let prepared = self.prepare_rows(rows)?;
        self.engine.clear(id)?;
        self.insert_prepared(id, prepared)
    }

    fn prepare_rows(&self, rows: Vec<HashMap<String, ColumnValue>>) -> Result<Vec<Vec<Option<ColumnValue>>>> {
        rows.into_iter().map(|row| self.row_values(row)).collect()
    }

    fn insert_prepared(&self, id: ResourceId, prepared: Vec<Vec<Option<ColumnValue>>>) -> Result<usize> {
        let count = prepared.len();
        for values in prepared {
            self.engine.append_row(id, values)?;
        }
        Ok(count)
    }

    pub fn insert_row(&self, index: usize, row: HashMap<String, ColumnValue>) -> Result<()> {
        let id = accessor::writable_id(self)?;
        let values = self.row_values(row)?;
        self.engine.insert_row(id, index, values)
    }

    /// Append a row of column defaults (null for nullable columns, empty
    /// nested tables for subtable columns).
    pub fn add_empty_row(&self) -> Result<usize> {
        let id = accessor::writable_id(self)?;
        self.engine.append_row(id, vec![None; self.schema.len()])
    }

    pub fn remove(&self, row: usize) -> Result<()> {
        let id = accessor::writable_id(self)?;
        self.engine.remove_row(id, row)
    }

    /// Remove every row. Clearing an empty table is not a structural change.
    pub fn clear(&self) -> Result<()> {
        let id = accessor::writable_id(self)?;
        self.engine.clear(id)
    }

    /// View over every row in table order.
    pub fn all_rows(&self) -> Result<TableView> {
        let id = self.validated_id()?;
        let view_id = self.engine.view_all(id)?;
        accessor::derive_view(self, view_id)
    }
}

impl TableOrView for Table {
    fn engine(&self) -> &Rc<Engine> {
        &self.engine
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn root_table(&self) -> Result<Rc<Table>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| Error::invalid_state(format!("table '{}' is being dropped", self.name)))
    }

    fn is_valid(&self) -> bool {
        self.handle
            .borrow()
            .as_ref()
            .map_or(false, |handle| handle.is_attached())
    }

    fn is_read_only(&self) -> bool {
        self.handle
            .borrow()
            .as_ref()
            .map_or(false, |handle| handle.is_read_only())
    }

    fn validated_id(&self) -> Result<ResourceId> {
        let handle = self.handle.borrow();
        let handle = handle
            .as_ref()
            .ok_or_else(|| Error::invalid_state(format!("table '{}' has been closed", self.name)))?;
        if !handle.is_attached() {
            return Err(Error::invalid_state(format!(
                "table '{}' is no longer attached to its storage",
                self.name
            )));
        }
        Ok(handle.id())
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        accessor::render(self, f)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("columns", &self.schema.get_column_names())
            .field("handle", &self.handle.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Rc<Table> {
        let engine = Engine::new();
        let schema = Schema::new(vec![
            ("name".to_string(), ColumnType::String, false),
            ("age".to_string(), ColumnType::Int, true),
        ]);
        Table::new(&engine, "people", schema).unwrap()
    }

    fn person(name: &str, age: ColumnValue) -> HashMap<String, ColumnValue> {
        let mut row = HashMap::new();
        row.insert("name".to_string(), ColumnValue::String(name.to_string()));
        row.insert("age".to_string(), age);
        row
    }

    #[test]
    fn test_table_basic() {
        let table = people();
        assert_eq!(table.name(), "people");
        assert_eq!(table.version().unwrap(), 0);

        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        table.append_row(person("Bob", ColumnValue::Null)).unwrap();

        assert_eq!(table.size().unwrap(), 2);
        assert_eq!(table.version().unwrap(), 2);
        assert_eq!(table.get_int(1, 0).unwrap(), 30);
        assert!(table.is_null(1, 1).unwrap());
    }

    #[test]
    fn test_table_insert() {
        let table = people();
        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        table.append_row(person("Charlie", ColumnValue::Int(35))).unwrap();
        table.insert_row(1, person("Bob", ColumnValue::Int(25))).unwrap();

        assert_eq!(table.get_string(0, 1).unwrap(), "Bob");
        assert_eq!(table.get_string(0, 2).unwrap(), "Charlie");
        assert!(matches!(
            table.insert_row(9, person("Zed", ColumnValue::Int(1))),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_table_delete() {
        let table = people();
        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        table.append_row(person("Bob", ColumnValue::Int(25))).unwrap();

        table.remove(0).unwrap();
        assert_eq!(table.size().unwrap(), 1);
        assert_eq!(table.get_string(0, 0).unwrap(), "Bob");
        assert_eq!(table.version().unwrap(), 3);
        assert!(matches!(table.remove(5), Err(Error::IndexOutOfRange { .. })));
    }

    #[test]
    fn test_set_value_keeps_version() {
        let table = people();
        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        table.set_int(1, 0, 31).unwrap();
        table.set_string(0, 0, "Alicia").unwrap();

        assert_eq!(table.get_int(1, 0).unwrap(), 31);
        assert_eq!(table.get_string(0, 0).unwrap(), "Alicia");
        assert_eq!(table.version().unwrap(), 1);
    }

    #[test]
    fn test_row_validation() {
        let table = people();
        let mut row = HashMap::new();
        row.insert("name".to_string(), ColumnValue::String("NoAge".to_string()));
        assert_eq!(
            table.append_row(row).unwrap_err(),
            Error::MissingValue("age".to_string())
        );

        let mut row = person("Extra", ColumnValue::Int(1));
        row.insert("email".to_string(), ColumnValue::Null);
        assert_eq!(
            table.append_row(row).unwrap_err(),
            Error::ColumnNotFound("email".to_string())
        );

        let rows = vec![
            person("Good", ColumnValue::Int(1)),
            person("Bad", ColumnValue::String("old".to_string())),
        ];
        assert!(matches!(
            table.append_rows(rows),
            Err(Error::TypeMismatch { expected: ColumnType::Int, .. })
        ));
        assert_eq!(table.size().unwrap(), 0);
    }

    #[test]
    fn test_typed_access_mismatch() {
        let table = people();
        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        assert!(matches!(table.get_int(0, 0), Err(Error::TypeMismatch { .. })));
        assert!(matches!(table.get_int(7, 0), Err(Error::IndexOutOfRange { .. })));
        assert_eq!(
            table.column_index("missing").unwrap_err(),
            Error::ColumnNotFound("missing".to_string())
        );
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let engine = Engine::new();
        let schema = Schema::new(vec![
            ("a".to_string(), ColumnType::Int, false),
            ("a".to_string(), ColumnType::Bool, false),
        ]);
        assert_eq!(
            Table::new(&engine, "dup", schema).unwrap_err(),
            Error::DuplicateColumn("a".to_string())
        );
        assert_eq!(engine.resource_count(), 0);
    }

    #[test]
    fn test_close_invalidates() {
        let table = people();
        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        assert!(table.is_valid());

        table.close();
        assert!(table.is_closed());
        assert!(!table.is_valid());
        assert!(matches!(table.size(), Err(Error::InvalidState(_))));
        assert_eq!(table.engine().resource_count(), 0);
    }

    #[test]
    fn test_clear() {
        let table = people();
        table.clear().unwrap();
        assert_eq!(table.version().unwrap(), 0);

        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        table.clear().unwrap();
        assert!(table.is_empty().unwrap());
        assert_eq!(table.version().unwrap(), 2);
    }

    #[test]
    fn test_read_only_alias() {
        let table = people();
        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        let alias = table.read_only().unwrap();

        assert!(alias.is_read_only());
        assert_eq!(alias.get_string(0, 0).unwrap(), "Alice");
        assert!(matches!(alias.set_int(1, 0, 1), Err(Error::InvalidState(_))));
        assert!(matches!(
            alias.append_row(person("Bob", ColumnValue::Null)),
            Err(Error::InvalidState(_))
        ));

        let view = alias.all_rows().unwrap();
        assert!(view.is_read_only());
        assert!(matches!(view.remove(0), Err(Error::InvalidState(_))));

        // Closing the alias leaves the table attached.
        alias.close();
        assert!(table.is_valid());
    }

    #[test]
    fn test_display_and_json() {
        let table = people();
        table.append_row(person("Alice", ColumnValue::Int(30))).unwrap();
        table.append_row(person("Bob", ColumnValue::Null)).unwrap();

        let text = table.to_string();
        assert!(text.starts_with("   name   age "));
        assert!(text.contains("Alice"));

        let json: serde_json::Value = serde_json::from_str(&table.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["name"], "Alice");
        assert_eq!(json[1]["age"], serde_json::Value::Null);

        let limited = table.to_string_limited(1).unwrap();
        assert!(limited.ends_with("... and 1 more rows\n"));
    }
}
