//! Terminal rendering for command results

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Bordered table
    #[default]
    Table,
    Json,
    Yaml,
    /// `header: value` lines, one block per row
    Plain,
}

/// A result row with fixed column headers
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn serialized<S: Serialize + ?Sized>(value: &S, format: OutputFormat) -> Option<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).ok().map(|s| s + "\n"),
        OutputFormat::Yaml => serde_yaml::to_string(value).ok(),
        OutputFormat::Table | OutputFormat::Plain => None,
    }
}

fn render_rows<T: TableDisplay>(rows: &[&T], format: OutputFormat) {
    let headers = T::headers();
    if let OutputFormat::Plain = format {
        let blocks: Vec<String> = rows
            .iter()
            .map(|item| {
                headers
                    .iter()
                    .zip(item.row())
                    .map(|(header, value)| format!("{}: {}\n", header, value))
                    .collect()
            })
            .collect();
        print!("{}", blocks.join("---\n"));
        return;
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers);
    for item in rows {
        table.add_row(item.row());
    }
    println!("{table}");
}

pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match serialized(item, format) {
        Some(text) => print!("{}", text),
        None => render_rows(&[item], format),
    }
}

pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if let Some(text) = serialized(items, format) {
        print!("{}", text);
    } else if items.is_empty() {
        println!("Nothing to show.");
    } else {
        render_rows(&items.iter().collect::<Vec<_>>(), format);
    }
}

pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Errors go to stderr so structured stdout stays parseable
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Cell text for an optional value
pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
