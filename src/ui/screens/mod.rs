pub mod fetch_progress;
pub mod main_menu;
pub mod region_picker;
pub mod results;
pub mod series_chart;
pub mod stats_browser;
pub mod trade_search;

pub use fetch_progress::{run_fetch_progress, FetchOutcome};
pub use main_menu::{run_main_menu, MenuAction, MenuContext};
pub use region_picker::run_region_picker;
pub use results::run_results_table;
pub use series_chart::{run_series_chart, ChartExit};
pub use stats_browser::{run_stats_browser, StatsOutcome};
pub use trade_search::{run_trade_search, SearchAction};
