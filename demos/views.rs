/// Views Example
///
/// This example demonstrates:
/// - Creating views with find_all, filter and sorted_view
/// - Reading live values through a view after cell writes
/// - A view turning stale after a structural change
/// - Enumerating rows with cursors
///
/// Run with `RUST_LOG=debug` to see staleness diagnostics.

use liveview::{ColumnType, ColumnValue, Engine, EngineConfig, Schema, SortOrder, Table, TableOrView};
use std::collections::HashMap;

fn main() -> liveview::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    println!("=== LiveView Views Example ===\n");

    // 1. Create a sales table
    println!("1. Creating sales table...");
    let engine = Engine::with_config(EngineConfig::from_env()?);
    let schema = Schema::new(vec![
        ("product".to_string(), ColumnType::String, false),
        ("category".to_string(), ColumnType::String, false),
        ("price".to_string(), ColumnType::Double, false),
        ("quantity".to_string(), ColumnType::Int, false),
    ]);
    let table = Table::new(&engine, "sales", schema)?;

    let data = [
        ("Laptop", "Electronics", 999.99, 5),
        ("Mouse", "Electronics", 29.99, 50),
        ("Desk", "Furniture", 299.99, 10),
        ("Chair", "Furniture", 199.99, 15),
        ("Monitor", "Electronics", 349.99, 8),
    ];
    for (product, category, price, quantity) in data {
        let mut row = HashMap::new();
        row.insert("product".to_string(), ColumnValue::String(product.to_string()));
        row.insert("category".to_string(), ColumnValue::String(category.to_string()));
        row.insert("price".to_string(), ColumnValue::Double(price));
        row.insert("quantity".to_string(), ColumnValue::Int(quantity));
        table.append_row(row)?;
    }
    println!("{}", table);

    // 2. Find all electronics
    println!("2. Electronics only (find_all_string):");
    let electronics = table.find_all_string(1, "Electronics")?;
    println!("{}", electronics);
    println!(
        "   total quantity: {}, average price: {:.2}\n",
        electronics.sum_int(3)?,
        electronics.average_double(2)?
    );

    // 3. Sorted view over a predicate filter
    println!("3. Items with price > 100, sorted by quantity (descending):");
    let expensive = table.filter(|row| row.get("price").and_then(|p| p.as_double()).unwrap_or(0.0) > 100.0)?;
    let by_quantity = expensive.sorted_view(3, SortOrder::Descending)?;
    for cursor in by_quantity.rows() {
        let cursor = cursor?;
        println!(
            "   {:<8} qty {:>3} (table row {})",
            cursor.get_string(0)?,
            cursor.get_int(3)?,
            cursor.source_index()?
        );
    }

    // 4. Cell writes show through every view
    println!("\n4. Updating Mouse quantity to 45...");
    table.set_int(3, 1, 45)?;
    println!("   electronics still valid: {}", electronics.is_valid());
    println!("   Mouse quantity via view: {}\n", electronics.get_int(3, 1)?);

    // 5. Structural changes make views stale
    println!("5. Removing the Desk row...");
    table.remove(2)?;
    println!("   electronics valid: {}", electronics.is_valid());
    match electronics.size() {
        Ok(size) => println!("   unexpected size {}", size),
        Err(e) => println!("   access rejected: {}", e),
    }

    let refreshed = table.find_all_string(1, "Electronics")?;
    println!("   fresh electronics view has {} rows\n", refreshed.size()?);

    println!("6. As JSON:");
    println!("{}", refreshed.to_json()?);

    println!("\n=== Example Complete ===");
    Ok(())
}
