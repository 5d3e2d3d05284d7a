use crate::cli::OutputFormat;
use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;

pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => println!("{}", pretty(value)),
        OutputFormat::Table => print_as_table(value),
    }
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_notice(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Prints a catalog window: one row per loaded item.
pub fn print_items(items: &[(u64, Value)], total: u64, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let rows: Vec<Value> = items.iter().map(|(_, item)| item.clone()).collect();
            let window = serde_json::json!({
                "total": total,
                "from": items.first().map(|(i, _)| *i),
                "items": rows,
            });
            println!("{}", pretty(&window));
        }
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No products found.");
                return;
            }
            let mut builder = Builder::default();
            builder.push_record(["#", "ID", "Name", "Price"]);
            for (index, item) in items {
                builder.push_record([
                    index.to_string(),
                    field(item, &["id"]),
                    field(item, &["name", "title"]),
                    field(item, &["price", "salePrice"]),
                ]);
            }
            let table = builder.build().with(Style::rounded()).to_string();
            println!("{table}");
            if let (Some((first, _)), Some((last, _))) = (items.first(), items.last()) {
                println!("{} {}-{} of {}", "Showing".cyan(), first, last, total);
            }
        }
    }
}

fn print_as_table(value: &Value) {
    match value.as_object() {
        Some(object) => {
            let mut builder = Builder::default();
            builder.push_record(["Field", "Value"]);
            for (key, field) in object {
                builder.push_record([key.clone(), scalar(field)]);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
        None => println!("{}", pretty(value)),
    }
}

fn field(item: &Value, names: &[&str]) -> String {
    names
        .iter()
        .find_map(|name| item.get(*name))
        .map_or_else(|| "-".to_string(), scalar)
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
