use chrono::{Datelike, NaiveDate, Weekday};
use portfolio_viz::{
    build_dashboard, html, text_summary, DashboardConfig, HtmlReportOptions, PriceSeries,
    StaticPriceSource, TimeSeries,
};

/// Deterministic trending price path with a little oscillation.
fn synthetic_prices(
    start: NaiveDate,
    days: u64,
    first: f64,
    drift: f64,
    swing: f64,
) -> Result<PriceSeries, Box<dyn std::error::Error>> {
    let mut dates = Vec::new();
    let mut values = Vec::new();
    let mut price = first;

    for i in 0..days {
        let date = start + chrono::Days::new(i);
        // skip weekends like a real exchange calendar
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            continue;
        }
        let wobble = match i % 7 {
            0 => swing,
            1 => -swing / 2.0,
            2 => swing / 3.0,
            3 => -swing,
            _ => 0.0,
        };
        price *= 1.0 + drift + wobble;
        dates.push(date);
        values.push(price);
    }

    Ok(TimeSeries::new(dates, values, None)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DashboardConfig::from_json_str(include_str!("portfolios.json"))?;
    let (portfolios, input_warnings) = config.build_portfolios();

    let end = NaiveDate::from_ymd_opt(2024, 12, 31).ok_or("invalid end date")?;
    let options = config.dashboard_options(end);
    let start = options.start;

    // SPY deliberately left out to show how missing data is reported
    let source = StaticPriceSource::new()
        .with_series("XIU.TO", synthetic_prices(start, 400, 32.0, 0.0004, 0.006)?)
        .with_series("VFV.TO", synthetic_prices(start, 400, 110.0, 0.0008, 0.008)?)
        .with_series("AVUV", synthetic_prices(start, 400, 85.0, 0.0003, 0.012)?)
        .with_series("XEF.TO", synthetic_prices(start, 400, 33.0, 0.0002, 0.005)?);

    let mut dashboard = build_dashboard(&source, &portfolios, &options);
    dashboard.prepend_warnings(input_warnings);
    let report = html(
        &dashboard,
        HtmlReportOptions::default()
            .with_title(config.title.as_str())
            .with_output("offline_dashboard.html"),
    )?;

    print!("{}", text_summary(&dashboard));
    println!(
        "Generated dashboard ({} bytes) at offline_dashboard.html",
        report.len()
    );

    Ok(())
}
