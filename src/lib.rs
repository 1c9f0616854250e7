mod config;
mod dashboard;
mod fetch;
mod plots;
mod portfolio;
mod reports;
mod stats;
mod utils;

pub use crate::config::{ConfigError, DashboardConfig, HoldingConfig, PortfolioConfig, TimePeriod};
pub use crate::dashboard::{
    build_dashboard, Dashboard, DashboardOptions, MissingTickerPolicy, OutcomeStatus,
    PortfolioOutcome, NO_DATA_MESSAGE,
};
pub use crate::fetch::{FetchError, PriceSource, StaticPriceSource, YahooFinance};
pub use crate::portfolio::{default_portfolios, Holding, Portfolio, PortfolioError, Role};
pub use crate::reports::{html, text_summary, HtmlReportOptions, ReportError};
pub use crate::stats::{
    compute_performance_metrics, portfolio_performance, relative_prices, top_drawdowns,
    CalcError, CalcOptions, Drawdown, PerformanceMetrics, Rebalance,
};
pub use crate::utils::{
    common_dates, DataError, PerformanceSeries, PriceHistory, PriceSeries, TimeSeries,
};
