pub mod components;
pub mod screens;
pub mod styles;

pub use components::TerminalGuard;
pub use screens::{
    run_fetch_progress, run_main_menu, run_region_picker, run_results_table, run_series_chart,
    run_stats_browser, run_trade_search, ChartExit, FetchOutcome, MenuAction, MenuContext,
    SearchAction, StatsOutcome,
};
pub use styles::Notice;
