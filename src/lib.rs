/// LiveView - Versioned Views and Cursors over a Columnar Table Store
///
/// Tables live in an in-process `Engine` and are reached only through
/// handles. Searches, filters and sorts produce `TableView`s: live windows
/// whose cell reads always reflect current values, but which capture the
/// table's structural version and reject every operation once rows have
/// been inserted or removed. `RowCursor`s and the `Rows` enumerator apply
/// the same check on every access.

pub mod error;
pub mod sequence;
pub mod column;
pub mod config;
pub mod engine;
pub mod handle;
pub mod accessor;
pub mod table;
pub mod view;
pub mod cursor;
mod format;

pub use error::{Error, ErrorKind, Result};
pub use sequence::{ArraySequence, Sequence, TieredVectorSequence};
pub use column::{Column, ColumnType, ColumnValue};
pub use config::{EngineConfig, StorageHint};
pub use engine::{Engine, ResourceId};
pub use handle::{Handle, Ownership};
pub use accessor::TableOrView;
pub use table::{Schema, Table};
pub use view::{SortOrder, TableView};
pub use cursor::{RowCursor, Rows};

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::collections::HashMap;
    use std::rc::Rc;

    fn int_table(engine: &Rc<Engine>, values: &[i64]) -> Rc<Table> {
        let schema = Schema::new(vec![
            ("value".to_string(), ColumnType::Int, false),
            ("label".to_string(), ColumnType::String, false),
        ]);
        let table = Table::new(engine, "ints", schema).unwrap();
        for (i, v) in values.iter().enumerate() {
            let mut row = HashMap::new();
            row.insert("value".to_string(), ColumnValue::Int(*v));
            row.insert("label".to_string(), ColumnValue::String(format!("row{}", i)));
            table.append_row(row).unwrap();
        }
        table
    }

    #[test]
    fn test_find_all_sort_remove_scenario() {
        let engine = Engine::new();
        let table = int_table(&engine, &[5, 1, 5]);

        let view = table.find_all_int(0, 5).unwrap();
        assert_eq!(view.size().unwrap(), 2);
        assert_eq!(view.source_index(0).unwrap(), 0);
        assert_eq!(view.source_index(1).unwrap(), 2);

        // Equal keys: a stable sort keeps the order.
        view.sort(0, SortOrder::default()).unwrap();
        assert_eq!(view.source_index(0).unwrap(), 0);
        assert_eq!(view.source_index(1).unwrap(), 2);
        assert!(view.is_valid());

        let before = table.version().unwrap();
        table.remove(1).unwrap();
        assert_eq!(table.version().unwrap(), before + 1);

        assert!(!view.is_valid());
        assert!(matches!(view.row(0), Err(Error::InvalidState(_))));
        assert!(matches!(view.get_int(0, 0), Err(Error::InvalidState(_))));
        assert!(matches!(view.sort(0, SortOrder::Ascending), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_indexed_access_bounds() {
        let engine = Engine::new();
        let table = int_table(&engine, &[1, 2, 3]);
        let view = table.all_rows().unwrap();
        for i in 0..view.size().unwrap() {
            assert_eq!(view.row(i).unwrap().row_index(), i);
        }
        assert_eq!(
            view.row(3).unwrap_err(),
            Error::IndexOutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn test_enumeration_yields_size_cursors() {
        let engine = Engine::new();
        let table = int_table(&engine, &[9, 8, 7, 6]);
        let view = table.all_rows().unwrap();
        let positions: Vec<usize> = view
            .rows()
            .map(|cursor| cursor.map(|c| c.row_index()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(positions, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_enumeration_with_mid_traversal_mutation() {
        let engine = Engine::new();
        let table = int_table(&engine, &[1, 2, 3, 4]);
        let view = table.all_rows().unwrap();

        let mut seen = Vec::new();
        let mut failure = None;
        for cursor in view.rows() {
            match cursor {
                Ok(cursor) => {
                    seen.push(cursor.get_int(0).unwrap());
                    if seen.len() == 2 {
                        table.remove(3).unwrap();
                    }
                }
                Err(e) => failure = Some(e),
            }
        }
        assert_eq!(seen, vec![1, 2]);
        assert!(matches!(failure, Some(Error::InvalidState(_))));
    }

    #[test]
    fn test_find_all_round_trip() {
        let engine = Engine::new();
        let table = int_table(&engine, &[3, 7, 3, 3, 9]);
        let view = table.find_all_int(0, 3).unwrap();
        assert_eq!(view.size().unwrap(), 3);
        for cursor in view.rows() {
            assert_eq!(cursor.unwrap().get_int(0).unwrap(), 3);
        }
    }

    #[test]
    fn test_last_on_empty_view() {
        let engine = Engine::new();
        let table = int_table(&engine, &[]);
        let view = table.all_rows().unwrap();
        let err = view.last().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert!(err.to_string().contains("empty view"));
        assert!(matches!(table.last(), Err(Error::InvalidState(_))));

        let filled = int_table(&engine, &[4, 5]);
        assert_eq!(filled.all_rows().unwrap().last().unwrap().get_int(0).unwrap(), 5);
    }

    #[test]
    fn test_empty_view_aggregates() {
        let engine = Engine::new();
        let schema = Schema::new(vec![
            ("i".to_string(), ColumnType::Int, false),
            ("f".to_string(), ColumnType::Float, false),
            ("d".to_string(), ColumnType::Double, false),
            ("t".to_string(), ColumnType::Timestamp, false),
        ]);
        let table = Table::new(&engine, "empty", schema).unwrap();
        let view = table.all_rows().unwrap();

        assert_eq!(view.sum_int(0).unwrap(), 0);
        assert_eq!(view.average_int(0).unwrap(), 0.0);
        assert_eq!(view.minimum_int(0).unwrap(), 0);
        assert_eq!(view.maximum_int(0).unwrap(), 0);
        assert_eq!(view.sum_float(1).unwrap(), 0.0);
        assert_eq!(view.minimum_float(1).unwrap(), 0.0);
        assert_eq!(view.average_double(2).unwrap(), 0.0);
        assert_eq!(view.maximum_double(2).unwrap(), 0.0);
        assert_eq!(view.minimum_timestamp(3).unwrap(), 0);
        assert_eq!(view.count_int(0, 1).unwrap(), 0);
    }

    #[test]
    fn test_view_aggregates() {
        let engine = Engine::new();
        let schema = Schema::new(vec![
            ("group".to_string(), ColumnType::String, false),
            ("amount".to_string(), ColumnType::Double, true),
            ("at".to_string(), ColumnType::Timestamp, false),
        ]);
        let table = Table::new(&engine, "payments", schema).unwrap();
        let rows = [
            ("a", ColumnValue::Double(10.0), 3_000),
            ("b", ColumnValue::Double(99.0), 1_000),
            ("a", ColumnValue::Null, 2_000),
            ("a", ColumnValue::Double(20.0), 5_000),
        ];
        for (group, amount, at) in rows {
            let mut row = HashMap::new();
            row.insert("group".to_string(), ColumnValue::String(group.to_string()));
            row.insert("amount".to_string(), amount);
            row.insert("at".to_string(), ColumnValue::Timestamp(at));
            table.append_row(row).unwrap();
        }

        let group_a = table.find_all_string(0, "a").unwrap();
        assert_eq!(group_a.size().unwrap(), 3);
        assert_eq!(group_a.sum_double(1).unwrap(), 30.0);
        assert_eq!(group_a.average_double(1).unwrap(), 15.0);
        assert_eq!(group_a.minimum_double(1).unwrap(), 10.0);
        assert_eq!(group_a.maximum_timestamp(2).unwrap(), 5_000);
        assert_eq!(group_a.minimum_timestamp(2).unwrap(), 2_000);
        assert_eq!(group_a.count_double(1, 20.0).unwrap(), 1);
        assert_eq!(table.count_string(0, "a").unwrap(), 3);

        assert!(matches!(
            table.sum_double(0),
            Err(Error::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_find_first_and_binary() {
        let engine = Engine::new();
        let schema = Schema::new(vec![
            ("flag".to_string(), ColumnType::Bool, false),
            ("blob".to_string(), ColumnType::Binary, false),
            ("score".to_string(), ColumnType::Float, false),
        ]);
        let table = Table::new(&engine, "blobs", schema).unwrap();
        for (flag, blob, score) in [(false, vec![1u8], 1.5f32), (true, vec![2, 3], 2.5)] {
            let mut row = HashMap::new();
            row.insert("flag".to_string(), ColumnValue::Bool(flag));
            row.insert("blob".to_string(), ColumnValue::Binary(blob));
            row.insert("score".to_string(), ColumnValue::Float(score));
            table.append_row(row).unwrap();
        }

        assert_eq!(table.find_first_bool(0, true).unwrap(), Some(1));
        assert_eq!(table.find_first_binary(1, &[2, 3]).unwrap(), Some(1));
        assert_eq!(table.find_first_binary(1, &[9]).unwrap(), None);
        assert_eq!(table.find_first_float(2, 1.5).unwrap(), Some(0));
        assert_eq!(table.find_all_float(2, 2.5).unwrap().size().unwrap(), 1);
        assert_eq!(table.find_all_bool(0, false).unwrap().size().unwrap(), 1);

        assert_eq!(
            table.find_all_binary(1, &[2, 3]).unwrap_err(),
            Error::NotImplemented("find_all_binary")
        );
        assert_eq!(table.get_binary(1, 1).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_find_first_within_view_positions() {
        let engine = Engine::new();
        let table = int_table(&engine, &[4, 2, 8, 2]);
        let view = table.sorted_view(0, SortOrder::Descending).unwrap();
        // View order: 8, 4, 2, 2
        assert_eq!(view.find_first_int(0, 2).unwrap(), Some(2));
        assert_eq!(view.find_first_int(0, 5).unwrap(), None);
        assert_eq!(view.source_index(0).unwrap(), 2);
    }

    #[test]
    fn test_subtables() {
        let engine = Engine::new();
        let items = Schema::new(vec![
            ("sku".to_string(), ColumnType::String, false),
            ("qty".to_string(), ColumnType::Int, false),
        ]);
        let schema = Schema::new(vec![("id".to_string(), ColumnType::Int, false)])
            .with_subtable("items", items);
        let orders = Table::new(&engine, "orders", schema).unwrap();

        let mut row = HashMap::new();
        row.insert("id".to_string(), ColumnValue::Int(1));
        orders.append_row(row).unwrap();
        orders.add_empty_row().unwrap();

        let nested = orders.get_subtable(1, 0).unwrap();
        assert_eq!(nested.name(), "orders.items");
        assert!(nested.is_empty().unwrap());

        let mut item = HashMap::new();
        item.insert("sku".to_string(), ColumnValue::String("w-1".to_string()));
        item.insert("qty".to_string(), ColumnValue::Int(3));
        nested.append_row(item.clone()).unwrap();
        nested.append_row(item).unwrap();

        // Nested inserts are structural only for the nested table.
        assert_eq!(orders.version().unwrap(), 2);
        assert_eq!(nested.version().unwrap(), 2);
        assert_eq!(orders.get_subtable(1, 0).unwrap().sum_int(1).unwrap(), 6);

        let json: serde_json::Value = serde_json::from_str(&orders.to_json().unwrap()).unwrap();
        assert_eq!(json[0]["items"][1]["sku"], "w-1");
        assert_eq!(json[1]["items"], serde_json::json!([]));
        assert!(orders.to_string().contains("<table: 2 rows>"));

        orders.remove(0).unwrap();
        assert!(!nested.is_valid());
        assert!(matches!(nested.size(), Err(Error::InvalidState(_))));
    }

    #[test]
    fn test_set_subtable_replaces_rows() {
        let engine = Engine::new();
        let tags = Schema::new(vec![("tag".to_string(), ColumnType::String, false)]);
        let schema = Schema::new(vec![]).with_subtable("tags", tags);
        let table = Table::new(&engine, "posts", schema).unwrap();
        table.add_empty_row().unwrap();

        let rows = ["rust", "views"]
            .iter()
            .map(|t| {
                let mut row = HashMap::new();
                row.insert("tag".to_string(), ColumnValue::String(t.to_string()));
                row
            })
            .collect();
        table.set_subtable(0, 0, rows).unwrap();

        let nested = table.get_subtable(0, 0).unwrap();
        assert_eq!(nested.size().unwrap(), 2);
        assert_eq!(nested.get_string(0, 1).unwrap(), "views");
        assert!(matches!(
            table.set_value(0, 0, ColumnValue::Null),
            Err(Error::NotImplemented(_))
        ));
    }

    #[test]
    fn test_rejected_set_subtable_keeps_rows() {
        let engine = Engine::new();
        let tags = Schema::new(vec![("tag".to_string(), ColumnType::String, false)]);
        let schema = Schema::new(vec![]).with_subtable("tags", tags);
        let table = Table::new(&engine, "posts", schema).unwrap();
        table.add_empty_row().unwrap();

        let mut keep = HashMap::new();
        keep.insert("tag".to_string(), ColumnValue::String("keep".to_string()));
        table.set_subtable(0, 0, vec![keep]).unwrap();
        let nested = table.get_subtable(0, 0).unwrap();
        let version = nested.version().unwrap();

        let mut good = HashMap::new();
        good.insert("tag".to_string(), ColumnValue::String("new".to_string()));
        let mut bad = HashMap::new();
        bad.insert("tag".to_string(), ColumnValue::Int(1));
        assert!(matches!(
            table.set_subtable(0, 0, vec![good, bad]),
            Err(Error::TypeMismatch { .. })
        ));

        assert_eq!(nested.size().unwrap(), 1);
        assert_eq!(nested.get_string(0, 0).unwrap(), "keep");
        assert_eq!(nested.version().unwrap(), version);
    }

    #[test]
    fn test_mixed_and_nullable_columns() {
        let engine = Engine::new();
        let schema = Schema::new(vec![
            ("any".to_string(), ColumnType::Mixed, false),
            ("maybe".to_string(), ColumnType::Timestamp, true),
        ]);
        let table = Table::new(&engine, "mixed", schema).unwrap();
        table.add_empty_row().unwrap();

        assert!(table.is_null(0, 0).unwrap());
        assert!(table.is_null(1, 0).unwrap());
        table.set_mixed(0, 0, ColumnValue::String("hello".to_string())).unwrap();
        table.set_timestamp(1, 0, 86_400_000).unwrap();
        assert_eq!(table.get_mixed(0, 0).unwrap().as_string(), Some("hello"));
        assert_eq!(table.get_timestamp(1, 0).unwrap(), 86_400_000);

        table.set_null(1, 0).unwrap();
        assert!(matches!(table.get_timestamp(1, 0), Err(Error::TypeMismatch { .. })));
        assert!(table.row_to_string(0).unwrap().contains("hello"));
    }

    #[test]
    fn test_filter_over_row_maps() {
        let engine = Engine::new();
        let table = int_table(&engine, &[10, 25, 30, 5]);
        let big = table
            .filter(|row| row.get("value").and_then(|v| v.as_int()).unwrap_or(0) > 20)
            .unwrap();
        assert_eq!(big.size().unwrap(), 2);
        assert_eq!(big.get_value_by_name("label", 0).unwrap().as_string(), Some("row1"));
    }

    #[test]
    fn test_filter_predicate_may_write_cells() {
        let engine = Engine::new();
        let table = int_table(&engine, &[10, 25, 30]);
        let picked = table
            .filter(|row| {
                let value = row.get("value").and_then(|v| v.as_int()).unwrap_or(0);
                table.set_int(0, 0, 99).is_ok() && value > 20
            })
            .unwrap();
        assert_eq!(picked.size().unwrap(), 2);
        assert_eq!(table.get_int(0, 0).unwrap(), 99);
        assert!(picked.is_valid());
    }

    #[test]
    fn test_filter_fails_on_structural_change() {
        let engine = Engine::new();
        let table = int_table(&engine, &[1, 2]);
        let result = table.filter(|_| table.add_empty_row().is_ok());
        assert!(matches!(result, Err(Error::InvalidState(_))));
        assert_eq!(table.size().unwrap(), 4);
        assert_eq!(engine.resource_count(), 1);
    }

    #[test]
    fn test_filter_predicate_may_drop_views() {
        let engine = Engine::new();
        let table = int_table(&engine, &[1, 2, 3]);
        let picked = table
            .filter(|row| {
                let scratch = table.all_rows();
                scratch.is_ok() && row.get("value").and_then(|v| v.as_int()) != Some(2)
            })
            .unwrap();
        assert_eq!(picked.size().unwrap(), 2);
        assert_eq!(engine.resource_count(), 2);
        drop(picked);
        assert_eq!(engine.resource_count(), 1);
    }

    #[test]
    fn test_configured_render_limit() {
        let config = EngineConfig {
            storage: StorageHint::FastUpdates,
            render_limit: 2,
        };
        let engine = Engine::with_config(config);
        let table = int_table(&engine, &[1, 2, 3, 4, 5]);
        let text = table.all_rows().unwrap().to_string();
        assert_eq!(text.lines().count(), 4);
        assert!(text.ends_with("... and 3 more rows\n"));
    }

    #[test]
    fn test_resources_released() {
        let engine = Engine::new();
        {
            let table = int_table(&engine, &[1, 2]);
            let _view = table.find_all_int(0, 1).unwrap();
            let _sorted = table.sorted_view(0, SortOrder::Ascending).unwrap();
            assert_eq!(engine.resource_count(), 3);
        }
        assert_eq!(engine.resource_count(), 0);
    }
}
