//! Time-series logic behind the chart screen: label parsing, shared axes,
//! hit-testing and two-point comparison. Nothing here touches the terminal.

pub mod compare;
pub mod period;
pub mod plot;

pub use compare::{compare, format_pct, Comparison};
pub use period::{format_index, parse_period, Granularity, Period};
pub use plot::{
    ChartKind, ChartModel, Hit, PlotArea, PlotPoint, PreparedSeries, TimeAxis, ValueAxis,
};
