pub mod chart;
pub mod input;
pub mod table;
pub mod terminal;
pub mod utils;

pub use chart::{render_series_chart, ChartState};
pub use input::{InputKind, TextInput};
pub use table::{build_table, column_widths, header_row, highlight_row};
pub use terminal::TerminalGuard;
