//! Terminal output helpers

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use reportwiz_filters::ConfigurationPhase;
use reportwiz_protocol::CategoryValue;

/// Table with the CLI's preset and cyan headers.
fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(headers.iter().map(|h| Cell::new(h).fg(Color::Cyan)));
    table
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = new_table(headers);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

/// Like [`print_table`], with an optional color per cell.
pub fn print_table_colored(headers: &[&str], rows: Vec<Vec<(String, Option<Color>)>>) {
    let mut table = new_table(headers);
    for row in rows {
        table.add_row(row.into_iter().map(|(text, color)| {
            let cell = Cell::new(text);
            match color {
                Some(color) => cell.fg(color),
                None => cell,
            }
        }));
    }
    println!("{table}");
}

pub fn color_for_phase(phase: ConfigurationPhase) -> Color {
    match phase {
        ConfigurationPhase::Empty => Color::Grey,
        ConfigurationPhase::Partial => Color::Yellow,
        ConfigurationPhase::Submittable => Color::Green,
    }
}

/// One-line rendering of a category value.
pub fn format_category_value(value: Option<&CategoryValue>) -> String {
    match value {
        None => "-".to_string(),
        Some(CategoryValue::Scalar(value)) => value.to_string(),
        Some(CategoryValue::Composite(filter)) => filter
            .field_names()
            .filter_map(|name| filter.get(name).map(|value| format!("{}={}", name, value)))
            .collect::<Vec<_>>()
            .join(", "),
        Some(CategoryValue::Tags(tags)) => tags
            .values()
            .map(|value| value.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    }
}
