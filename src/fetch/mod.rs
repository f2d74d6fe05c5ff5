use crate::error::Result;

pub mod batch;
pub mod decode;
pub mod normalize;
pub mod regions;
pub mod request;
pub mod stats;
pub mod trades;

pub use batch::{
    preview_url, run_batch, spawn_batch_fetch, BatchHandle, BatchRequest, CancelToken,
    FetchEvent, HttpPageSource, PageRequest, PageResponse, PageSource,
};
pub use regions::{
    RegionCatalog, RegionClient, RegionEntry, RegionLevel, RegionSelection, RegionSource,
};
pub use stats::{
    NamedSeries, SeriesPoint, SeriesRange, StatEntry, StatItem, StatsClient, StatsProvider,
};
pub use trades::{Column, RentRecord, SaleRecord, TradeKind, TradePage, TradeRecord};

pub type FetchResult<T> = Result<T>;
