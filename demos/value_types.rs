//! Value types example
//!
//! This example demonstrates working with database values without a server:
//! - Type conversions
//! - Null handling
//! - Scanning rows into tuples
//! - Argument sanitization in wrapped errors
//!
//! Run with: cargo run --example value_types

use std::sync::Arc;

use chrono::Utc;
use gobit_db::core::sanitize_args;
use gobit_db::prelude::*;

fn main() -> Result<()> {
    println!("=== gobit-db - Value Types Example ===\n");

    println!("1. Converting Rust values...");
    let values: Vec<DatabaseValue> = vec![
        true.into(),
        42.into(),
        9_007_199_254_740_993i64.into(),
        2.5f64.into(),
        "hello".into(),
        vec![0xdeu8, 0xad, 0xbe, 0xef].into(),
        Utc::now().into(),
        Option::<i32>::None.into(),
    ];
    for value in &values {
        println!("   {:<10} {:?}", value.type_name(), value);
    }
    println!();

    println!("2. Extracting values...");
    println!("   as_long(Int(42))   = {:?}", values[1].as_long());
    println!("   as_int(Long(..))   = {:?}", values[2].as_int());
    println!("   as_str(Bool(true)) = {:?}", values[0].as_str());
    println!("   is_null(Null)      = {}", values[7].is_null());
    match String::from_value(&values[1]) {
        Ok(s) => println!("   String::from_value(Int) = {:?}", s),
        Err(e) => println!("   String::from_value(Int) failed: {}", e),
    }
    println!();

    println!("3. Scanning rows...");
    let columns: Arc<[String]> =
        vec!["id".to_string(), "name".to_string(), "age".to_string()].into();
    let mut rows = Rows::from_values(
        columns,
        vec![
            vec![1.into(), "Alice".into(), 30.into()],
            vec![2.into(), "Bob".into(), DatabaseValue::Null],
        ],
    );
    while rows.advance() {
        let (id, name, age): (i64, String, Option<i32>) = rows.scan()?;
        println!("   {} {} {:?}", id, name, age);
    }
    rows.close();
    println!();

    println!("4. Sanitizing arguments...");
    let args: Vec<DatabaseValue> = vec!["x".repeat(100).into(), 7.into()];
    for arg in sanitize_args(&args) {
        println!("   {:?}", arg);
    }
    let err = DatabaseError::query(
        "INSERT INTO notes (body, id) VALUES (?, ?)",
        &args,
        "duplicate entry",
    );
    if let Some(query_err) = err.as_query_error() {
        println!("   error: {}", err);
        let first_len = query_err.args()[0].as_str().map(|s| s.len()).unwrap_or(0);
        println!("   kept {} args, first is {} chars", query_err.args().len(), first_len);
    }

    println!("\n=== Example completed successfully ===");
    Ok(())
}
