/// LiveView Storage Engine
///
/// The engine owns every piece of row storage. Bindings (`Table`,
/// `TableView`) never see storage directly: they hold a `Handle` naming a
/// `ResourceId` and call engine operations with it.
///
/// # Resources
///
/// - Table resources hold the schema, typed columns and the raw structural
///   mutation counter (`version`). The counter starts at 0 and is bumped by
///   every inserted or removed row and by clearing a non-empty table. Cell
///   writes and view sorting leave it untouched.
/// - View resources hold the id of their root table and an ordered list of
///   row positions in that table.
///
/// # Empty-set aggregates
///
/// Aggregates skip null cells. Over an empty row set `sum` is 0, `average`
/// is 0.0, `count` is 0, and `minimum` / `maximum` return the zero value of
/// the column type (timestamps: the epoch).
///
/// The engine bounds-checks every position it is given and reports
/// `IndexOutOfRange`; an unknown or released id reports `InvalidState`.

use crate::column::{Column, ColumnType, ColumnValue};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::format;
use crate::table::Schema;
use std::cell::{Cell, RefCell, RefMut};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Opaque identifier of a native resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(u64);

impl ResourceId {
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Aggregate operations supported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Sum,
    Minimum,
    Maximum,
    Average,
}

impl Aggregate {
    fn name(self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Minimum => "minimum",
            Aggregate::Maximum => "maximum",
            Aggregate::Average => "average",
        }
    }

    fn supports(self, column_type: ColumnType) -> bool {
        match self {
            Aggregate::Sum | Aggregate::Average => {
                matches!(column_type, ColumnType::Int | ColumnType::Float | ColumnType::Double)
            }
            Aggregate::Minimum | Aggregate::Maximum => matches!(
                column_type,
                ColumnType::Int | ColumnType::Float | ColumnType::Double | ColumnType::Timestamp
            ),
        }
    }
}

struct TableStorage {
    name: String,
    schema: Schema,
    columns: Vec<Column>,
    row_count: usize,
    version: u64,
}

impl TableStorage {
    fn column(&self, column: usize) -> Result<&Column> {
        self.columns
            .get(column)
            .ok_or_else(|| Error::out_of_range(column, self.columns.len()))
    }

    fn row_map(&self, row: usize) -> Result<HashMap<String, ColumnValue>> {
        let mut result = HashMap::with_capacity(self.columns.len());
        for col in &self.columns {
            result.insert(col.name().to_string(), col.get(row)?.clone());
        }
        Ok(result)
    }

    /// Remove a row from every column, returning the removed cells.
    fn remove_row(&mut self, row: usize) -> Result<Vec<ColumnValue>> {
        if row >= self.row_count {
            return Err(Error::out_of_range(row, self.row_count));
        }
        let mut removed = Vec::with_capacity(self.columns.len());
        for col in self.columns.iter_mut() {
            removed.push(col.remove(row)?);
        }
        self.row_count -= 1;
        self.version += 1;
        Ok(removed)
    }

    fn subtable_ids(&self) -> Vec<ResourceId> {
        let mut ids = Vec::new();
        for col in &self.columns {
            if col.column_type() != ColumnType::Table {
                continue;
            }
            for row in 0..self.row_count {
                if let Ok(ColumnValue::Subtable(id)) = col.get(row) {
                    ids.push(*id);
                }
            }
        }
        ids
    }
}

struct ViewStorage {
    table: ResourceId,
    rows: Vec<usize>,
}

enum Resource {
    Table(TableStorage),
    View(ViewStorage),
}

type Resources = HashMap<ResourceId, Resource>;

fn detached(id: ResourceId) -> Error {
    Error::invalid_state(format!("native resource {} has been released", id.0))
}

fn table_ref(resources: &Resources, id: ResourceId) -> Result<&TableStorage> {
    match resources.get(&id) {
        Some(Resource::Table(table)) => Ok(table),
        Some(Resource::View(_)) => Err(Error::invalid_state(format!(
            "native resource {} is a view, not a table",
            id.0
        ))),
        None => Err(detached(id)),
    }
}

fn table_mut(resources: &mut Resources, id: ResourceId) -> Result<&mut TableStorage> {
    match resources.get_mut(&id) {
        Some(Resource::Table(table)) => Ok(table),
        Some(Resource::View(_)) => Err(Error::invalid_state(format!(
            "native resource {} is a view, not a table",
            id.0
        ))),
        None => Err(detached(id)),
    }
}

/// Root table and the root row positions covered by a resource, in order.
fn positions(resources: &Resources, id: ResourceId) -> Result<(ResourceId, Vec<usize>)> {
    match resources.get(&id) {
        Some(Resource::Table(table)) => Ok((id, (0..table.row_count).collect())),
        Some(Resource::View(view)) => {
            table_ref(resources, view.table)?;
            Ok((view.table, view.rows.clone()))
        }
        None => Err(detached(id)),
    }
}

/// Map a resource-local row to (root table, root row).
fn locate(resources: &Resources, id: ResourceId, row: usize) -> Result<(ResourceId, usize)> {
    match resources.get(&id) {
        Some(Resource::Table(table)) => {
            if row >= table.row_count {
                return Err(Error::out_of_range(row, table.row_count));
            }
            Ok((id, row))
        }
        Some(Resource::View(view)) => {
            let root = *view
                .rows
                .get(row)
                .ok_or_else(|| Error::out_of_range(row, view.rows.len()))?;
            let table = table_ref(resources, view.table)?;
            if root >= table.row_count {
                return Err(Error::out_of_range(root, table.row_count));
            }
            Ok((view.table, root))
        }
        None => Err(detached(id)),
    }
}

/// Remove a resource and, for tables, every nested subtable it owns.
fn release_in(resources: &mut Resources, id: ResourceId) -> bool {
    match resources.remove(&id) {
        Some(Resource::Table(table)) => {
            for child in table.subtable_ids() {
                release_in(resources, child);
            }
            true
        }
        Some(Resource::View(_)) => true,
        None => false,
    }
}

fn sort_key(value: &ColumnValue) -> Option<i64> {
    match value {
        ColumnValue::Int(n) | ColumnValue::Timestamp(n) => Some(*n),
        ColumnValue::Bool(b) => Some(*b as i64),
        _ => None,
    }
}

/// Stable sort of root positions by a sortable column. Nulls order first
/// when ascending.
fn sort_positions(table: &TableStorage, column: usize, ascending: bool, rows: &mut Vec<usize>) -> Result<()> {
    let col = table.column(column)?;
    if !col.column_type().is_sortable() {
        return Err(Error::UnsupportedColumnType {
            operation: "sort",
            column_type: col.column_type(),
        });
    }

    // Keys are read up front so a bad position fails before any reordering.
    let mut keyed = rows
        .iter()
        .map(|&root| col.get(root).map(|v| (sort_key(v), root)))
        .collect::<Result<Vec<_>>>()?;
    keyed.sort_by(|a, b| {
        let ord = a.0.cmp(&b.0);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    *rows = keyed.into_iter().map(|(_, root)| root).collect();
    Ok(())
}

fn compare_cells(a: &ColumnValue, b: &ColumnValue) -> Ordering {
    match (a, b) {
        (ColumnValue::Int(a), ColumnValue::Int(b)) => a.cmp(b),
        (ColumnValue::Timestamp(a), ColumnValue::Timestamp(b)) => a.cmp(b),
        (ColumnValue::Float(a), ColumnValue::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (ColumnValue::Double(a), ColumnValue::Double(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// In-memory storage engine addressed through opaque resource ids.
pub struct Engine {
    config: EngineConfig,
    resources: RefCell<Resources>,
    /// Releases requested while `resources` was borrowed.
    deferred: RefCell<Vec<ResourceId>>,
    next_id: Cell<u64>,
}

impl Engine {
    /// Create an engine with the default configuration.
    pub fn new() -> Rc<Engine> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Rc<Engine> {
        log::debug!("starting engine with {:?}", config);
        Rc::new(Engine {
            config,
            resources: RefCell::new(HashMap::new()),
            deferred: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of live native resources (tables, subtables and views).
    pub fn resource_count(&self) -> usize {
        self.resources_mut().len()
    }

    /// Mutable access to the registry, applying deferred releases first.
    fn resources_mut(&self) -> RefMut<'_, Resources> {
        let mut resources = self.resources.borrow_mut();
        for id in self.deferred.take() {
            if release_in(&mut resources, id) {
                log::trace!("released deferred resource {}", id.0);
            }
        }
        resources
    }

    fn allocate_id(&self) -> ResourceId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        ResourceId(id)
    }

    fn new_table_storage(&self, name: String, schema: Schema) -> TableStorage {
        let columns = schema
            .columns()
            .map(|(col_name, col_type, nullable)| {
                Column::new(col_name.to_string(), col_type, nullable, self.config.storage)
            })
            .collect();
        TableStorage {
            name,
            schema,
            columns,
            row_count: 0,
            version: 0,
        }
    }

    fn insert_view(&self, table: ResourceId, rows: Vec<usize>) -> ResourceId {
        let id = self.allocate_id();
        log::trace!("view {} over table {} with {} rows", id.0, table.0, rows.len());
        self.resources
            .borrow_mut()
            .insert(id, Resource::View(ViewStorage { table, rows }));
        id
    }

    pub(crate) fn create_table(&self, name: &str, schema: Schema) -> ResourceId {
        let id = self.allocate_id();
        let storage = self.new_table_storage(name.to_string(), schema);
        log::debug!("created table '{}' as resource {}", name, id.0);
        self.resources_mut().insert(id, Resource::Table(storage));
        id
    }

    pub(crate) fn is_attached(&self, id: ResourceId) -> bool {
        self.resources
            .try_borrow()
            .map(|resources| resources.contains_key(&id))
            .unwrap_or(false)
            && !self.deferred.borrow().contains(&id)
    }

    /// Release a resource. Returns false if it was unknown.
    /// A release that arrives while the engine is borrowed is queued and
    /// applied by the next mutable access.
    pub(crate) fn release(&self, id: ResourceId) -> bool {
        if self.resources.try_borrow_mut().is_err() {
            log::debug!("engine busy; deferring release of resource {}", id.0);
            self.deferred.borrow_mut().push(id);
            return true;
        }
        let mut resources = self.resources_mut();
        let released = release_in(&mut resources, id);
        if released {
            log::trace!("released resource {}", id.0);
        } else {
            log::warn!("release of unknown resource {}", id.0);
        }
        released
    }

    pub(crate) fn version(&self, id: ResourceId) -> Result<u64> {
        let resources = self.resources.borrow();
        Ok(table_ref(&resources, id)?.version)
    }

    pub(crate) fn size(&self, id: ResourceId) -> Result<usize> {
        match self.resources.borrow().get(&id) {
            Some(Resource::Table(table)) => Ok(table.row_count),
            Some(Resource::View(view)) => Ok(view.rows.len()),
            None => Err(detached(id)),
        }
    }

    pub(crate) fn get(&self, id: ResourceId, column: usize, row: usize) -> Result<ColumnValue> {
        let resources = self.resources.borrow();
        let (table_id, root) = locate(&resources, id, row)?;
        Ok(table_ref(&resources, table_id)?.column(column)?.get(root)?.clone())
    }

    pub(crate) fn row_map(&self, id: ResourceId, row: usize) -> Result<HashMap<String, ColumnValue>> {
        let resources = self.resources.borrow();
        let (table_id, root) = locate(&resources, id, row)?;
        table_ref(&resources, table_id)?.row_map(root)
    }

    /// Write a cell. Not a structural mutation.
    pub(crate) fn set(&self, id: ResourceId, column: usize, row: usize, value: ColumnValue) -> Result<()> {
        let mut resources = self.resources_mut();
        let (table_id, root) = locate(&resources, id, row)?;
        let table = table_mut(&mut resources, table_id)?;
        let column_count = table.columns.len();
        let col = table
            .columns
            .get_mut(column)
            .ok_or_else(|| Error::out_of_range(column, column_count))?;
        if col.column_type() == ColumnType::Table {
            return Err(Error::NotImplemented("direct assignment of subtable cells"));
        }
        col.set(root, value)?;
        Ok(())
    }

    /// Validate a row and allocate its nested subtables.
    fn prepare_row(&self, resources: &mut Resources, table_id: ResourceId, values: Vec<Option<ColumnValue>>) -> Result<Vec<ColumnValue>> {
        let table = table_ref(resources, table_id)?;
        if values.len() != table.columns.len() {
            return Err(Error::invalid_state(format!(
                "row has {} values but table '{}' has {} columns",
                values.len(),
                table.name,
                table.columns.len()
            )));
        }

        let mut cells = Vec::with_capacity(values.len());
        let mut nested = Vec::new();
        for (index, (col, value)) in table.columns.iter().zip(values).enumerate() {
            if col.column_type() == ColumnType::Table {
                match value {
                    None | Some(ColumnValue::Null) => {}
                    Some(other) => {
                        return Err(Error::TypeMismatch {
                            expected: ColumnType::Table,
                            found: other.type_name().to_string(),
                        })
                    }
                }
                let schema = table.schema.subtable_schema(col.name()).cloned().unwrap_or_default();
                nested.push((index, format!("{}.{}", table.name, col.name()), schema));
                cells.push(ColumnValue::Null);
            } else {
                let value = value.unwrap_or_else(|| col.default_value());
                col.check(&value)?;
                cells.push(value);
            }
        }

        for (index, name, schema) in nested {
            let child = self.allocate_id();
            resources.insert(child, Resource::Table(self.new_table_storage(name, schema)));
            cells[index] = ColumnValue::Subtable(child);
        }
        Ok(cells)
    }

    /// Insert a row at `index` of a table. `None` values take the column
    /// default; subtable cells always start as an empty nested table.
    pub(crate) fn insert_row(&self, id: ResourceId, index: usize, values: Vec<Option<ColumnValue>>) -> Result<()> {
        let mut resources = self.resources_mut();
        let row_count = table_ref(&resources, id)?.row_count;
        if index > row_count {
            return Err(Error::out_of_range(index, row_count + 1));
        }
        let cells = self.prepare_row(&mut resources, id, values)?;
        let table = table_mut(&mut resources, id)?;
        for (col, value) in table.columns.iter_mut().zip(cells) {
            col.insert(index, value)?;
        }
        table.row_count += 1;
        table.version += 1;
        Ok(())
    }

    pub(crate) fn append_row(&self, id: ResourceId, values: Vec<Option<ColumnValue>>) -> Result<usize> {
        let index = self.size(id)?;
        self.insert_row(id, index, values)?;
        Ok(index)
    }

    /// Remove a row from a table, or the row behind a view position. When
    /// removing through a view, that view's own row list drops the entry
    /// and shifts later positions; other views are left untouched.
    pub(crate) fn remove_row(&self, id: ResourceId, row: usize) -> Result<()> {
        let mut resources = self.resources_mut();
        let (table_id, root) = locate(&resources, id, row)?;
        let removed = table_mut(&mut resources, table_id)?.remove_row(root)?;
        for value in removed {
            if let ColumnValue::Subtable(child) = value {
                release_in(&mut resources, child);
            }
        }

        if let Some(Resource::View(view)) = resources.get_mut(&id) {
            view.rows.remove(row);
            for parent_idx in view.rows.iter_mut() {
                if *parent_idx > root {
                    *parent_idx -= 1;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn clear(&self, id: ResourceId) -> Result<()> {
        let mut resources = self.resources_mut();
        let table = table_mut(&mut resources, id)?;
        let children = table.subtable_ids();
        if table.row_count > 0 {
            for col in table.columns.iter_mut() {
                col.clear();
            }
            table.row_count = 0;
            table.version += 1;
        }
        for child in children {
            release_in(&mut resources, child);
        }
        Ok(())
    }

    /// Position (within the resource) of the first row whose cell equals
    /// `value`.
    pub(crate) fn find_first(&self, id: ResourceId, column: usize, value: &ColumnValue) -> Result<Option<usize>> {
        let resources = self.resources.borrow();
        let (table_id, rows) = positions(&resources, id)?;
        let col = table_ref(&resources, table_id)?.column(column)?;
        for (position, root) in rows.into_iter().enumerate() {
            if col.get(root)? == value {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// Build a new view from the rows of `id` accepted by `keep`.
    fn select<F>(&self, id: ResourceId, mut keep: F) -> Result<ResourceId>
    where
        F: FnMut(&TableStorage, usize) -> Result<bool>,
    {
        let (table_id, selected) = {
            let resources = self.resources.borrow();
            let (table_id, rows) = positions(&resources, id)?;
            let table = table_ref(&resources, table_id)?;
            let mut selected = Vec::new();
            for root in rows {
                if keep(table, root)? {
                    selected.push(root);
                }
            }
            (table_id, selected)
        };
        Ok(self.insert_view(table_id, selected))
    }

    pub(crate) fn view_all(&self, id: ResourceId) -> Result<ResourceId> {
        self.select(id, |_, _| Ok(true))
    }

    pub(crate) fn find_all(&self, id: ResourceId, column: usize, value: &ColumnValue) -> Result<ResourceId> {
        self.select(id, |table, root| Ok(table.column(column)?.get(root)? == value))
    }

    /// Build a view of the rows accepted by `predicate`. Row maps are
    /// copied out first so the predicate runs with the engine unborrowed;
    /// a structural change made by the predicate fails the filter.
    pub(crate) fn filter(&self, id: ResourceId, predicate: &dyn Fn(&HashMap<String, ColumnValue>) -> bool) -> Result<ResourceId> {
        let (table_id, version, candidates) = {
            let resources = self.resources.borrow();
            let (table_id, rows) = positions(&resources, id)?;
            let table = table_ref(&resources, table_id)?;
            let candidates = rows
                .into_iter()
                .map(|root| Ok((root, table.row_map(root)?)))
                .collect::<Result<Vec<_>>>()?;
            (table_id, table.version, candidates)
        };
        let selected: Vec<usize> = candidates
            .into_iter()
            .filter(|(_, row)| predicate(row))
            .map(|(root, _)| root)
            .collect();
        let current = self.version(table_id)?;
        if current != version {
            return Err(Error::invalid_state(format!(
                "table changed while filtering (version {} -> {})",
                version, current
            )));
        }
        Ok(self.insert_view(table_id, selected))
    }

    /// New view over the rows of `id`, sorted by a column.
    pub(crate) fn sorted(&self, id: ResourceId, column: usize, ascending: bool) -> Result<ResourceId> {
        let (table_id, rows) = {
            let resources = self.resources.borrow();
            let (table_id, mut rows) = positions(&resources, id)?;
            sort_positions(table_ref(&resources, table_id)?, column, ascending, &mut rows)?;
            (table_id, rows)
        };
        Ok(self.insert_view(table_id, rows))
    }

    /// Reorder a view in place.
    pub(crate) fn sort(&self, id: ResourceId, column: usize, ascending: bool) -> Result<()> {
        let mut resources = self.resources_mut();
        let (table_id, mut rows) = match resources.get(&id) {
            Some(Resource::View(view)) => (view.table, view.rows.clone()),
            Some(Resource::Table(_)) => return Err(Error::NotImplemented("in-place sort of a table")),
            None => return Err(detached(id)),
        };
        sort_positions(table_ref(&resources, table_id)?, column, ascending, &mut rows)?;
        if let Some(Resource::View(view)) = resources.get_mut(&id) {
            view.rows = rows;
        }
        Ok(())
    }

    pub(crate) fn aggregate(&self, id: ResourceId, column: usize, op: Aggregate) -> Result<ColumnValue> {
        let resources = self.resources.borrow();
        let (table_id, rows) = positions(&resources, id)?;
        let col = table_ref(&resources, table_id)?.column(column)?;
        let column_type = col.column_type();
        if !op.supports(column_type) {
            return Err(Error::UnsupportedColumnType {
                operation: op.name(),
                column_type,
            });
        }

        let mut values = Vec::with_capacity(rows.len());
        for root in rows {
            let value = col.get(root)?;
            if !value.is_null() {
                values.push(value);
            }
        }

        let result = match op {
            Aggregate::Sum if column_type == ColumnType::Int => ColumnValue::Int(
                values
                    .iter()
                    .filter_map(|v| v.as_int())
                    .fold(0i64, |acc, n| acc.wrapping_add(n)),
            ),
            Aggregate::Sum => ColumnValue::Double(values.iter().filter_map(|v| v.as_f64()).sum()),
            Aggregate::Average => {
                if values.is_empty() {
                    ColumnValue::Double(0.0)
                } else {
                    let total: f64 = values.iter().filter_map(|v| v.as_f64()).sum();
                    ColumnValue::Double(total / values.len() as f64)
                }
            }
            Aggregate::Minimum => values
                .into_iter()
                .reduce(|best, v| if compare_cells(v, best) == Ordering::Less { v } else { best })
                .cloned()
                .unwrap_or_else(|| column_type.default_value()),
            Aggregate::Maximum => values
                .into_iter()
                .reduce(|best, v| if compare_cells(v, best) == Ordering::Greater { v } else { best })
                .cloned()
                .unwrap_or_else(|| column_type.default_value()),
        };
        Ok(result)
    }

    /// Number of rows whose cell equals `value`.
    pub(crate) fn count(&self, id: ResourceId, column: usize, value: &ColumnValue) -> Result<usize> {
        let resources = self.resources.borrow();
        let (table_id, rows) = positions(&resources, id)?;
        let col = table_ref(&resources, table_id)?.column(column)?;
        let mut count = 0;
        for root in rows {
            if col.get(root)? == value {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Position in the root table of a resource-local row.
    pub(crate) fn source_index(&self, id: ResourceId, row: usize) -> Result<usize> {
        let resources = self.resources.borrow();
        locate(&resources, id, row).map(|(_, root)| root)
    }

    /// Nested table stored at (column, row): its id, name and schema.
    pub(crate) fn subtable(&self, id: ResourceId, column: usize, row: usize) -> Result<(ResourceId, String, Schema)> {
        let resources = self.resources.borrow();
        let (table_id, root) = locate(&resources, id, row)?;
        let table = table_ref(&resources, table_id)?;
        let col = table.column(column)?;
        match col.get(root)? {
            ColumnValue::Subtable(child) => {
                let child_table = table_ref(&resources, *child)?;
                Ok((*child, child_table.name.clone(), child_table.schema.clone()))
            }
            other => Err(Error::TypeMismatch {
                expected: ColumnType::Table,
                found: other.type_name().to_string(),
            }),
        }
    }

    fn rows_to_json(resources: &Resources, table: &TableStorage, rows: &[usize]) -> Result<serde_json::Value> {
        let mut out = Vec::with_capacity(rows.len());
        for &root in rows {
            let mut obj = serde_json::Map::new();
            for col in &table.columns {
                let json = match col.get(root)? {
                    ColumnValue::Subtable(child) => {
                        let nested = table_ref(resources, *child)?;
                        let nested_rows: Vec<usize> = (0..nested.row_count).collect();
                        Self::rows_to_json(resources, nested, &nested_rows)?
                    }
                    value => format::scalar_to_json(value),
                };
                obj.insert(col.name().to_string(), json);
            }
            out.push(serde_json::Value::Object(obj));
        }
        Ok(serde_json::Value::Array(out))
    }

    /// JSON array of row objects; subtables nest as arrays.
    pub(crate) fn to_json(&self, id: ResourceId) -> Result<String> {
        let resources = self.resources.borrow();
        let (table_id, rows) = positions(&resources, id)?;
        let table = table_ref(&resources, table_id)?;
        let value = Self::rows_to_json(&resources, table, &rows)?;
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn display_cells(resources: &Resources, table: &TableStorage, root: usize) -> Result<Vec<String>> {
        let mut cells = Vec::with_capacity(table.columns.len());
        for col in &table.columns {
            let cell = match col.get(root)? {
                ColumnValue::Subtable(child) => {
                    format!("<table: {} rows>", table_ref(resources, *child)?.row_count)
                }
                value => format::display_scalar(value),
            };
            cells.push(cell);
        }
        Ok(cells)
    }

    /// Text grid of at most `limit` rows (the configured render limit when
    /// `None`).
    pub(crate) fn to_string(&self, id: ResourceId, limit: Option<usize>) -> Result<String> {
        let limit = limit.unwrap_or(self.config.render_limit);
        let resources = self.resources.borrow();
        let (table_id, rows) = positions(&resources, id)?;
        let table = table_ref(&resources, table_id)?;
        let mut rendered = Vec::with_capacity(rows.len().min(limit));
        for (position, &root) in rows.iter().enumerate().take(limit) {
            rendered.push((position, Self::display_cells(&resources, table, root)?));
        }
        Ok(format::render_grid(&table.schema.get_column_names(), &rendered, rows.len()))
    }

    pub(crate) fn row_to_string(&self, id: ResourceId, row: usize) -> Result<String> {
        let resources = self.resources.borrow();
        let (table_id, root) = locate(&resources, id, row)?;
        let table = table_ref(&resources, table_id)?;
        let cells = Self::display_cells(&resources, table, root)?;
        Ok(format::render_grid(&table.schema.get_column_names(), &[(row, cells)], 1))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Engine {{ storage: {:?}, resources: {} }}",
            self.config.storage,
            self.resource_count()
        )
    }
}
