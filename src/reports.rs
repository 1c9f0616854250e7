use std::path::{Path, PathBuf};

use crate::dashboard::{Dashboard, OutcomeStatus, PortfolioOutcome, NO_DATA_MESSAGE};
use crate::plots::{self, escape, palette_color, ChartSeries};

const DEFAULT_TITLE: &str = "Portfolio Performance Visualizer";
const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_TEMPLATE: &str = include_str!("dashboard_template.html");

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct HtmlReportOptions {
    pub title: String,
    pub output: Option<PathBuf>,
    pub template_path: Option<PathBuf>,
    /// Adds the total-return bar chart and the drawdown chart.
    pub extra_charts: bool,
}

impl Default for HtmlReportOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            output: None,
            template_path: None,
            extra_charts: true,
        }
    }
}

impl HtmlReportOptions {
    pub fn with_output<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_title<S: Into<String>>(mut self, title: S) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_template_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.template_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_extra_charts(mut self, enabled: bool) -> Self {
        self.extra_charts = enabled;
        self
    }
}

/// Renders `dashboard` as a standalone HTML page, writing it to
/// `options.output` when set.
pub fn html(dashboard: &Dashboard, options: HtmlReportOptions) -> Result<String, ReportError> {
    let mut tpl = if let Some(path) = &options.template_path {
        std::fs::read_to_string(path)?
    } else {
        DEFAULT_TEMPLATE.to_string()
    };

    let date_range = format!(
        "{} - {}",
        dashboard.start.format("%e %b, %Y").to_string().trim(),
        dashboard.end.format("%e %b, %Y").to_string().trim()
    );

    tpl = tpl.replace("{{title}}", &escape(&options.title));
    tpl = tpl.replace("{{period}}", &escape(&dashboard.period_label));
    tpl = tpl.replace("{{date_range}}", &date_range);
    tpl = tpl.replace("{{v}}", VERSION);
    tpl = tpl.replace("{{warnings}}", &build_warnings(dashboard));

    let charts = chart_series(dashboard);
    let chart_html = if charts.is_empty() {
        String::new()
    } else {
        plots::performance_comparison(
            &charts,
            dashboard.base,
            &format!("Portfolio Performance Comparison ({})", dashboard.period_label),
            &y_caption(dashboard.base),
        )
    };
    tpl = tpl.replace("{{chart}}", &chart_html);
    tpl = tpl.replace("{{metrics}}", &build_metrics_table(dashboard));

    let (returns_html, drawdown_html) = if options.extra_charts && !charts.is_empty() {
        let bars: Vec<(&str, f64)> = dashboard
            .charted()
            .filter_map(|o| {
                o.metrics
                    .as_ref()
                    .map(|m| (o.portfolio.name.as_str(), m.total_return))
            })
            .collect();
        (
            plots::labelled_bars(&bars, "Total Return"),
            plots::drawdowns(&charts, "Drawdown"),
        )
    } else {
        (String::new(), String::new())
    };
    tpl = tpl.replace("{{returns_chart}}", &returns_html);
    tpl = tpl.replace("{{drawdown_chart}}", &drawdown_html);

    let portfolios_html: String = dashboard.outcomes.iter().map(build_composition).collect();
    tpl = tpl.replace("{{portfolios}}", &portfolios_html);

    if let Some(path) = &options.output {
        std::fs::write(path, &tpl)?;
    }

    Ok(tpl)
}

/// Plain-text version of the metrics table, one portfolio per line.
pub fn text_summary(dashboard: &Dashboard) -> String {
    let mut out = format!(
        "Portfolio performance, {} ({} to {})\n",
        dashboard.period_label, dashboard.start, dashboard.end
    );

    if !dashboard.has_data() {
        out.push_str(NO_DATA_MESSAGE);
        out.push('\n');
        return out;
    }

    let benchmark = dashboard.benchmark_metrics();
    for outcome in dashboard.outcomes.iter() {
        if outcome.status == OutcomeStatus::Inactive {
            continue;
        }
        out.push_str(&outcome.portfolio.name);
        out.push_str(": ");
        match &outcome.metrics {
            Some(m) => {
                out.push_str(&format!("{:.2}%", m.total_return * 100.0));
                if let Some(b) = benchmark.filter(|_| !outcome.portfolio.is_benchmark()) {
                    out.push_str(&format!(
                        " ({:+.2}% vs benchmark)",
                        m.excess_over(b) * 100.0
                    ));
                }
            }
            None => out.push_str("No data"),
        }
        out.push('\n');
    }

    out
}

fn y_caption(base: f64) -> String {
    format!("Cumulative Return ({} = Initial Investment)", base)
}

/// Series in display order. The first benchmark always takes the first
/// palette color; the other portfolios follow in list order.
fn chart_series(dashboard: &Dashboard) -> Vec<ChartSeries<'_>> {
    let benchmark_idx = dashboard
        .outcomes
        .iter()
        .position(|o| o.portfolio.is_benchmark());

    dashboard
        .outcomes
        .iter()
        .enumerate()
        .filter_map(|(idx, outcome)| {
            let slot = match benchmark_idx {
                Some(b) if idx == b => 0,
                Some(b) if idx < b => idx + 1,
                _ => idx,
            };
            outcome.performance.as_ref().map(|series| ChartSeries {
                label: outcome.portfolio.name.as_str(),
                color: palette_color(slot),
                series,
            })
        })
        .collect()
}

fn build_warnings(dashboard: &Dashboard) -> String {
    let mut messages: Vec<&str> = dashboard.warnings.iter().map(String::as_str).collect();
    if !dashboard.has_data() {
        messages.push(NO_DATA_MESSAGE);
    }
    if messages.is_empty() {
        return String::new();
    }

    let mut html = String::from(r#"<div class="pv-warnings"><ul>"#);
    for message in messages {
        html.push_str("<li>");
        html.push_str(&escape(message));
        html.push_str("</li>");
    }
    html.push_str("</ul></div>");
    html
}

fn signed_class(value: f64) -> &'static str {
    if value >= 0.0 {
        "pos"
    } else {
        "neg"
    }
}

fn build_metrics_table(dashboard: &Dashboard) -> String {
    let benchmark = dashboard.benchmark_metrics();

    let mut html = String::new();
    html.push_str("<table><thead><tr><th>Portfolio</th><th>Total Return</th>");
    if benchmark.is_some() {
        html.push_str("<th>vs Benchmark</th>");
    }
    html.push_str(
        "<th>Annualized Return</th><th>Volatility (ann.)</th><th>Sharpe</th><th>Max Drawdown</th><th>Max DD Days</th><th>Best Day</th><th>Worst Day</th>",
    );
    html.push_str("</tr></thead><tbody>");

    for outcome in &dashboard.outcomes {
        html.push_str("<tr><td>");
        html.push_str(&escape(&outcome.portfolio.name));
        html.push_str("</td>");

        let Some(m) = &outcome.metrics else {
            let cols = if benchmark.is_some() { 9 } else { 8 };
            html.push_str(r#"<td class="pv-empty">No data</td>"#);
            for _ in 1..cols {
                html.push_str("<td>-</td>");
            }
            html.push_str("</tr>");
            continue;
        };

        html.push_str(&format!(
            r#"<td class="{}">{:.2}%</td>"#,
            signed_class(m.total_return),
            m.total_return * 100.0
        ));

        if let Some(b) = benchmark {
            if outcome.portfolio.is_benchmark() {
                html.push_str("<td>-</td>");
            } else {
                let delta = m.excess_over(b);
                html.push_str(&format!(
                    r#"<td class="{}">{:+.2}%</td>"#,
                    signed_class(delta),
                    delta * 100.0
                ));
            }
        }

        html.push_str(&format!(
            "<td>{:.2}%</td><td>{:.2}%</td><td>{:.2}</td><td>{:.2}%</td><td>{}</td><td>{:.2}%</td><td>{:.2}%</td>",
            m.annualized_return * 100.0,
            m.annualized_volatility * 100.0,
            m.sharpe_ratio,
            m.max_drawdown * 100.0,
            m.max_drawdown_duration,
            m.best_day * 100.0,
            m.worst_day * 100.0,
        ));
        html.push_str("</tr>");
    }

    html.push_str("</tbody></table>");
    html
}

fn build_composition(outcome: &PortfolioOutcome) -> String {
    let portfolio = &outcome.portfolio;
    let mut html = String::from(r#"<div class="portfolio-editor">"#);
    html.push_str(&format!(
        "<h3>{} Composition</h3>",
        escape(&portfolio.name)
    ));

    if portfolio.holdings().is_empty() {
        html.push_str(r#"<p class="pv-empty">No holdings</p></div>"#);
        return html;
    }

    let normalized = portfolio.normalized_weights().unwrap_or_default();

    html.push_str("<table><thead><tr><th>Symbol</th><th>Weight</th><th>Normalized</th></tr></thead><tbody>");
    for (holding, (_, share)) in portfolio.holdings().iter().zip(normalized.iter()) {
        let flag = if outcome.dropped_tickers.contains(&holding.symbol) {
            " (no data)"
        } else {
            ""
        };
        html.push_str(&format!(
            "<tr><td>{}{}</td><td>{:.1}%</td><td>{:.1}%</td></tr>",
            escape(&holding.symbol),
            flag,
            holding.weight,
            share * 100.0
        ));
    }
    html.push_str("</tbody></table>");

    html.push_str(&format!(
        "<p><strong>Total Weight: {:.1}%</strong></p>",
        portfolio.total_weight()
    ));
    if portfolio.weight_warning().is_some() {
        html.push_str(r#"<p class="neg">Total weight should be 100%</p>"#);
    }

    html.push_str("</div>");
    html
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::dashboard::{build_dashboard, DashboardOptions, MissingTickerPolicy};
    use crate::fetch::StaticPriceSource;
    use crate::portfolio::Portfolio;
    use crate::stats::Rebalance;
    use crate::utils::TimeSeries;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, day).unwrap()
    }

    fn dashboard(portfolios: &[Portfolio]) -> Dashboard {
        let source = StaticPriceSource::new()
            .with_series(
                "AAA",
                TimeSeries::new(vec![d(3), d(4), d(5)], vec![10.0, 11.0, 12.0], None).unwrap(),
            )
            .with_series(
                "BBB",
                TimeSeries::new(vec![d(3), d(4), d(5)], vec![20.0, 19.0, 21.0], None).unwrap(),
            );
        let options = DashboardOptions {
            start: d(1),
            end: d(30),
            period_label: "1 Month".to_string(),
            base: 1.0,
            rebalance: Rebalance::Never,
            missing_ticker: MissingTickerPolicy::DropTicker,
            risk_free_rate: 0.0,
            periods_per_year: 252,
        };
        build_dashboard(&source, portfolios, &options)
    }

    fn sample() -> Dashboard {
        dashboard(&[
            Portfolio::benchmark("Benchmark Portfolio")
                .with_holding("BBB", 100.0)
                .unwrap(),
            Portfolio::custom("Custom <1>")
                .with_holding("AAA", 60.0)
                .unwrap()
                .with_holding("ZZZ", 10.0)
                .unwrap(),
            Portfolio::custom("Custom Portfolio 2"),
        ])
    }

    #[test]
    fn report_contains_chart_metrics_and_warnings() {
        let html = html(&sample(), HtmlReportOptions::default()).unwrap();

        assert!(html.contains("Portfolio Performance Comparison (1 Month)"));
        assert!(html.contains("Cumulative Return (1 = Initial Investment)"));
        assert!(html.contains("No data available for ZZZ"));
        assert!(html.contains("Custom &lt;1&gt;"));
        assert!(!html.contains("Custom <1>"));
        // BBB: 21 / 20 - 1
        assert!(html.contains("5.00%"));
        // AAA alone after ZZZ is dropped: 12 / 10 - 1, 15 points ahead
        assert!(html.contains("20.00%"));
        assert!(html.contains("+15.00%"));
        assert!(html.contains("ZZZ (no data)"));
        assert!(html.contains("Total weight should be 100%"));
        assert!(html.contains("No holdings"));
        assert!(html.contains("Data provided by Yahoo Finance"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn report_without_data_says_so() {
        let dash = dashboard(&[Portfolio::custom("Ghost").with_holding("NOPE", 100.0).unwrap()]);
        let html = html(&dash, HtmlReportOptions::default().with_extra_charts(false)).unwrap();

        assert!(html.contains(NO_DATA_MESSAGE));
        assert!(!html.contains("<polyline"));
        assert!(html.contains("No data"));
    }

    #[test]
    fn report_is_written_to_output() {
        let path = std::env::temp_dir().join(format!(
            "portfolio-viz-report-{}.html",
            std::process::id()
        ));
        let rendered = html(&sample(), HtmlReportOptions::default().with_output(&path)).unwrap();
        let on_disk = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(rendered, on_disk);
    }

    #[test]
    fn text_summary_lists_deltas() {
        let summary = text_summary(&sample());
        assert!(summary.contains("Benchmark Portfolio: 5.00%\n"));
        assert!(summary.contains("Custom <1>: 20.00% (+15.00% vs benchmark)"));
        assert!(!summary.contains("Custom Portfolio 2"));
    }

    #[test]
    fn benchmark_keeps_first_color_wherever_listed() {
        let dash = dashboard(&[
            Portfolio::custom("Mine").with_holding("AAA", 100.0).unwrap(),
            Portfolio::benchmark("Bench").with_holding("BBB", 100.0).unwrap(),
        ]);
        let charts = chart_series(&dash);

        assert_eq!(charts[0].label, "Mine");
        assert_eq!(charts[0].color, palette_color(1));
        assert_eq!(charts[1].label, "Bench");
        assert_eq!(charts[1].color, "#1f77b4");
    }

    #[test]
    fn placeholder_like_names_are_not_expanded() {
        let dash = dashboard(&[
            Portfolio::benchmark("{{metrics}}").with_holding("BBB", 100.0).unwrap(),
            Portfolio::custom("{{portfolios}}").with_holding("NOPE", 100.0).unwrap(),
        ]);
        let html = html(&dash, HtmlReportOptions::default()).unwrap();

        assert_eq!(html.matches("<th>Sharpe</th>").count(), 1);
        assert_eq!(html.matches(r#"<div class="portfolio-editor">"#).count(), 2);
        assert!(html.contains("&#123;&#123;metrics&#125;&#125;"));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn y_caption_uses_base() {
        assert_eq!(y_caption(100.0), "Cumulative Return (100 = Initial Investment)");
    }
}
