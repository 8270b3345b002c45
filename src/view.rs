/// LiveView View Implementation
///
/// A TableView is an ordered list of row positions in a root table, produced
/// by a search, filter or sort. Cell reads go straight to the table, so a
/// view always shows current values. Row membership and order, however, are
/// fixed at creation: the view captures the table version then and refuses
/// every operation once the table has been structurally modified. A stale
/// view never becomes valid again.

use crate::accessor::{self, TableOrView};
use crate::engine::{Engine, ResourceId};
use crate::error::{Error, Result};
use crate::handle::Handle;
use crate::table::{Schema, Table};
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

/// Sort order specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Ascending order (smallest first, nulls first)
    #[default]
    Ascending,
    /// Descending order (largest first, nulls last)
    Descending,
}

pub struct TableView {
    /// Keep-alive back-reference to the root table.
    table: Rc<Table>,
    handle: Handle,
    snapshot_version: u64,
    /// Rows removed through this view.
    local_version: Cell<u64>,
}

impl TableView {
    /// Bind a native view to its root table, capturing the table version.
    ///
    /// Fails if `handle` is absent or the table is not valid. On failure the
    /// handle is dropped, releasing the native view.
    pub(crate) fn new(table: Rc<Table>, handle: Option<Handle>) -> Result<TableView> {
        let handle = handle.ok_or_else(|| Error::invalid_state("view requires a native view handle"))?;
        let snapshot_version = table.version()?;
        log::trace!(
            "view {} bound to table '{}' at version {}",
            handle.id().value(),
            table.name(),
            snapshot_version
        );
        Ok(TableView {
            table,
            handle,
            snapshot_version,
            local_version: Cell::new(0),
        })
    }

    /// The root table, even for views derived from other views.
    pub fn table(&self) -> &Rc<Table> {
        &self.table
    }

    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Table version captured when the view was created.
    pub fn snapshot_version(&self) -> u64 {
        self.snapshot_version
    }

    pub fn local_version(&self) -> u64 {
        self.local_version.get()
    }

    /// Reorder the view in place by an int, bool or timestamp column.
    ///
    /// Sorting is not structural: the table version and this view's
    /// validity are unchanged. An unsupported column leaves the order as it
    /// was.
    pub fn sort(&self, column: usize, order: SortOrder) -> Result<()> {
        let id = self.validated_id()?;
        accessor::expect_sortable(self, column)?;
        self.handle
            .engine()
            .sort(id, column, order == SortOrder::Ascending)
    }

    pub fn sort_by_name(&self, name: &str, order: SortOrder) -> Result<()> {
        let column = self.column_index(name)?;
        self.sort(column, order)
    }

    /// Remove the table row behind view position `row`.
    ///
    /// This is a structural mutation of the root table. Every view over the
    /// table becomes invalid, including this one: its snapshot is not
    /// advanced.
    pub fn remove(&self, row: usize) -> Result<()> {
        let id = accessor::writable_id(self)?;
        self.handle.engine().remove_row(id, row)?;
        self.local_version.set(self.local_version.get() + 1);
        log::debug!(
            "removed row {} through view {}; view is now stale",
            row,
            self.handle.id().value()
        );
        Ok(())
    }
}

impl TableOrView for TableView {
    fn engine(&self) -> &Rc<Engine> {
        self.handle.engine()
    }

    fn schema(&self) -> &Schema {
        self.table.schema()
    }

    fn root_table(&self) -> Result<Rc<Table>> {
        Ok(Rc::clone(&self.table))
    }

    fn is_valid(&self) -> bool {
        self.table.is_valid()
            && self.handle.is_attached()
            && self
                .table
                .version()
                .map_or(false, |version| version == self.snapshot_version)
    }

    fn is_read_only(&self) -> bool {
        self.handle.is_read_only()
    }

    fn validated_id(&self) -> Result<ResourceId> {
        if !self.table.is_valid() {
            return Err(Error::invalid_state(format!(
                "underlying table '{}' is no longer valid",
                self.table.name()
            )));
        }
        let current = self.table.version()?;
        if current != self.snapshot_version {
            log::debug!(
                "view {} is stale: captured version {}, table is at {}",
                self.handle.id().value(),
                self.snapshot_version,
                current
            );
            return Err(Error::invalid_state(format!(
                "view is stale: table '{}' was structurally modified (version {} -> {})",
                self.table.name(),
                self.snapshot_version,
                current
            )));
        }
        if !self.handle.is_attached() {
            return Err(Error::invalid_state("view has been released"));
        }
        Ok(self.handle.id())
    }
}

impl fmt::Display for TableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        accessor::render(self, f)
    }
}

impl fmt::Debug for TableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableView")
            .field("table", &self.table.name())
            .field("handle", &self.handle)
            .field("snapshot_version", &self.snapshot_version)
            .field("local_version", &self.local_version.get())
            .finish()
    }
}
