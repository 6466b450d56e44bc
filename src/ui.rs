use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use console::style;
use rust_decimal::Decimal;

/// Defines different styles for text elements.
pub enum StyleType {
    Title,
    TotalValue,
    Error,
    Subtle,
}

/// Applies a consistent style to a string.
pub fn style_text(text: &str, style_type: StyleType) -> String {
    let styled = match style_type {
        StyleType::Title => style(text).bold().underlined(),
        StyleType::TotalValue => style(text).green().bold(),
        StyleType::Error => style(text).red(),
        StyleType::Subtle => style(text).dim(),
    };
    styled.to_string()
}

/// Creates a new `comfy_table::Table` with standard styling.
pub fn new_styled_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Creates a styled header cell for a table.
pub fn header_cell(text: &str) -> Cell {
    Cell::new(text)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

/// Right-aligned monetary amount, rounded to `dp` decimal places.
pub fn amount_cell(value: Decimal, dp: u32) -> Cell {
    Cell::new(format!("{:.prec$}", value, prec = dp as usize))
        .set_alignment(CellAlignment::Right)
}

/// Like [`amount_cell`] but with an explicit sign and gain/loss coloring.
pub fn signed_cell(value: Decimal, dp: u32) -> Cell {
    let color = if value >= Decimal::ZERO {
        Color::Green
    } else {
        Color::Red
    };
    Cell::new(format!("{:+.prec$}", value, prec = dp as usize))
        .fg(color)
        .set_alignment(CellAlignment::Right)
}

/// Creates a cell for displaying percentage change with color coding.
pub fn change_cell(change: Decimal) -> Cell {
    let text = format!("{change:.2}%");
    if change >= Decimal::ZERO {
        Cell::new(text)
            .fg(Color::Green)
            .set_alignment(CellAlignment::Right)
    } else {
        Cell::new(text)
            .fg(Color::Red)
            .set_alignment(CellAlignment::Right)
    }
}
