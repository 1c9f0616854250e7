use crate::utils::PerformanceSeries;
use chrono::{Datelike, NaiveDate};

const WIDTH: i32 = 960;
const HEIGHT: i32 = 480;
const PADDING: f64 = 48.0;
const MAX_TIME_LABELS: usize = 12;
const VALUE_TICKS: usize = 5;
const GUIDE_COLOR: &str = "#8c8c8c";
const POSITIVE_COLOR: &str = "#4fa487";
const NEGATIVE_COLOR: &str = "#af4b64";

/// Line colors handed out to portfolios in display order.
pub const PALETTE: [&str; 8] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd", "#8c564b", "#e377c2", "#17becf",
];

pub fn palette_color(idx: usize) -> &'static str {
    PALETTE[idx % PALETTE.len()]
}

/// A labelled series to draw on a shared chart.
pub struct ChartSeries<'a> {
    pub label: &'a str,
    pub color: &'static str,
    pub series: &'a PerformanceSeries,
}

struct IndexedSeries {
    label: String,
    color: &'static str,
    points: Vec<(usize, f64)>,
}

struct HorizontalGuide {
    value: f64,
    color: &'static str,
    dash: bool,
    label: Option<String>,
}

pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            // keeps user text from reading as a template placeholder
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_percentage(value: f64) -> String {
    let pct = value * 100.0;
    if pct.abs() >= 1000.0 {
        format!("{:.0}K%", pct / 1000.0)
    } else {
        format!("{:.0}%", pct)
    }
}

fn format_axis_value(value: f64) -> String {
    if value.abs() >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.2}", value)
    }
}

fn extent_from_series(
    series_list: &[IndexedSeries],
    guides: &[HorizontalGuide],
) -> Option<(f64, f64)> {
    let mut min_v = f64::INFINITY;
    let mut max_v = f64::NEG_INFINITY;

    let values = series_list
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, v)| *v))
        .chain(guides.iter().map(|g| g.value));
    for value in values.filter(|v| v.is_finite()) {
        min_v = min_v.min(value);
        max_v = max_v.max(value);
    }

    if !min_v.is_finite() || !max_v.is_finite() {
        return None;
    }

    if min_v == max_v {
        let adjust = if min_v == 0.0 { 1.0 } else { min_v.abs() * 0.1 }; // widen flat ranges
        min_v -= adjust;
        max_v += adjust;
    }

    Some((min_v, max_v))
}

fn scale_value(value: f64, min_v: f64, max_v: f64, height: f64) -> f64 {
    if (max_v - min_v).abs() < f64::EPSILON {
        return height / 2.0;
    }

    let inner_height = height - 2.0 * PADDING;
    let norm = (value - min_v) / (max_v - min_v);
    PADDING + (1.0 - norm) * inner_height
}

fn draw_line_legend(svg: &mut String, series_list: &[IndexedSeries]) {
    let mut y = PADDING + 14.0;
    let x = PADDING + 10.0;
    for series in series_list.iter().filter(|s| !s.points.is_empty()) {
        svg.push_str(&format!(
            r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{color}" stroke-width="2" />"##,
            x1 = x,
            x2 = x + 20.0,
            y = y - 4.0,
            color = series.color,
        ));
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="start" fill="#333">{label}</text>"##,
            x = x + 26.0,
            y = y,
            label = escape(&series.label)
        ));
        y += 16.0;
    }
}

fn render_indexed_line_chart(
    dates: &[NaiveDate],
    series_list: &[IndexedSeries],
    guides: &[HorizontalGuide],
    title: &str,
    y_caption: &str,
    value_format: fn(f64) -> String,
) -> String {
    if dates.is_empty() || series_list.iter().all(|s| s.points.is_empty()) {
        return String::new();
    }

    let width = WIDTH as f64;
    let height = HEIGHT as f64;
    let axis_xs = x_positions(dates.len(), width);

    let (min_v, max_v) = match extent_from_series(series_list, guides) {
        Some(extent) => extent,
        None => return String::new(),
    };

    let mut svg = String::new();
    svg.push_str(&svg_header(WIDTH, HEIGHT));

    add_value_axis(&mut svg, min_v, max_v, width, height, y_caption, value_format);

    for guide in guides {
        let y = scale_value(guide.value, min_v, max_v, height);
        svg.push_str(&format!(
            r#"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{color}" stroke-width="1" stroke-dasharray="{dash}" />"#,
            x1 = PADDING,
            x2 = width - PADDING,
            y = y,
            color = guide.color,
            dash = if guide.dash { "4 3" } else { "0" }
        ));
        if let Some(label) = &guide.label {
            svg.push_str(&format!(
                r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end" fill="{color}" font-size="9">{label}</text>"#,
                x = width - PADDING,
                y = y - 4.0,
                color = guide.color,
                label = escape(label)
            ));
        }
    }

    for series in series_list {
        let points_attr = series
            .points
            .iter()
            .filter(|(idx, value)| *idx < axis_xs.len() && value.is_finite())
            .map(|(idx, value)| {
                format!(
                    "{:.2},{:.2}",
                    axis_xs[*idx],
                    scale_value(*value, min_v, max_v, height)
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        if points_attr.is_empty() {
            continue;
        }
        svg.push_str(&format!(
            r#"<polyline fill="none" stroke="{color}" stroke-width="1.5" points="{points}"><title>{label}</title></polyline>"#,
            color = series.color,
            points = points_attr,
            label = escape(&series.label)
        ));
    }

    add_time_axis(&mut svg, dates, &axis_xs, width, height);
    draw_line_legend(&mut svg, series_list);

    svg.push_str(svg_footer());
    wrap_plot(title, svg)
}

fn svg_header(width: i32, height: i32) -> String {
    format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 {w} {h}"><style>text{{font-family:Arial,sans-serif;font-size:10px;fill:#666}}</style>"#,
        w = width,
        h = height
    )
}

fn svg_footer() -> &'static str {
    "</svg>"
}

fn wrap_plot(title: &str, svg_body: String) -> String {
    format!(
        r#"<div class="pv-plot"><div class="pv-plot-title">{title}</div>{svg}</div>"#,
        title = escape(title),
        svg = svg_body
    )
}

fn add_value_axis(
    svg: &mut String,
    min_v: f64,
    max_v: f64,
    width: f64,
    height: f64,
    caption: &str,
    value_format: fn(f64) -> String,
) {
    let step = (max_v - min_v) / (VALUE_TICKS - 1) as f64;
    for i in 0..VALUE_TICKS {
        let value = min_v + step * i as f64;
        let y = scale_value(value, min_v, max_v, height);
        svg.push_str(&format!(
            r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#eeeeee" stroke-width="1" />"##,
            x1 = PADDING,
            x2 = width - PADDING,
            y = y
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="end" dy="3">{label}</text>"#,
            x = PADDING - 6.0,
            y = y,
            label = value_format(value)
        ));
    }

    if !caption.is_empty() {
        svg.push_str(&format!(
            r#"<text x="12" y="{y:.2}" text-anchor="middle" transform="rotate(-90 12 {y:.2})">{caption}</text>"#,
            y = height / 2.0,
            caption = escape(caption)
        ));
    }
}

fn add_time_axis(svg: &mut String, dates: &[NaiveDate], xs: &[f64], width: f64, height: f64) {
    if dates.is_empty() || xs.is_empty() {
        return;
    }

    let axis_y = height - PADDING + 5.0;

    svg.push_str(&format!(
        r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#000" stroke-width="1" />"##,
        x1 = PADDING,
        x2 = width - PADDING,
        y = axis_y
    ));

    // First trading day of each month, thinned out for long windows
    let month_starts: Vec<usize> = dates
        .iter()
        .enumerate()
        .filter(|(idx, date)| {
            *idx == 0 || {
                let prev = dates[idx - 1];
                (prev.year(), prev.month()) != (date.year(), date.month())
            }
        })
        .map(|(idx, _)| idx)
        .collect();
    let stride = month_starts.len().div_ceil(MAX_TIME_LABELS).max(1);

    for idx in month_starts.into_iter().step_by(stride) {
        if idx >= xs.len() {
            break;
        }
        let x = xs[idx];
        let label = dates[idx].format("%Y-%m").to_string();

        svg.push_str(&format!(
            r##"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="#dddddd" stroke-width="0.5" />"##,
            x = x,
            y1 = PADDING,
            y2 = height - PADDING
        ));
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
            x = x,
            y = axis_y + 16.0,
            label = label
        ));
    }
}

fn x_positions(len: usize, width: f64) -> Vec<f64> {
    if len == 0 {
        return Vec::new();
    }

    if len == 1 {
        return vec![width / 2.0];
    }

    let inner_width = width - 2.0 * PADDING;
    (0..len)
        .map(|i| PADDING + inner_width * (i as f64 / (len - 1) as f64))
        .collect()
}

/// Sorted union of all dates, with each series mapped onto it.
fn index_on_union(
    charts: &[ChartSeries<'_>],
    transform: fn(&[f64]) -> Vec<f64>,
) -> (Vec<NaiveDate>, Vec<IndexedSeries>) {
    let mut dates: Vec<NaiveDate> = charts
        .iter()
        .flat_map(|c| c.series.dates.iter().copied())
        .collect();
    dates.sort();
    dates.dedup();

    let indexed = charts
        .iter()
        .map(|chart| {
            let values = transform(&chart.series.values);
            let points = chart
                .series
                .dates
                .iter()
                .zip(values)
                .filter_map(|(date, value)| {
                    dates.binary_search(date).ok().map(|idx| (idx, value))
                })
                .collect();
            IndexedSeries {
                label: chart.label.to_string(),
                color: chart.color,
                points,
            }
        })
        .collect();

    (dates, indexed)
}

fn drawdown_curve(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|v| {
            if !v.is_finite() {
                return f64::NAN;
            }
            peak = peak.max(*v);
            if peak > 0.0 {
                v / peak - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Indexed value of several portfolios on one time axis, with a dashed
/// guide at the common starting value.
pub fn performance_comparison(
    charts: &[ChartSeries<'_>],
    base: f64,
    title: &str,
    y_caption: &str,
) -> String {
    let (dates, indexed) = index_on_union(charts, <[f64]>::to_vec);
    let guides = [HorizontalGuide {
        value: base,
        color: GUIDE_COLOR,
        dash: true,
        label: Some("Initial Investment".to_string()),
    }];

    render_indexed_line_chart(&dates, &indexed, &guides, title, y_caption, format_axis_value)
}

/// Underwater curves: distance below each portfolio's running peak.
pub fn drawdowns(charts: &[ChartSeries<'_>], title: &str) -> String {
    let (dates, indexed) = index_on_union(charts, drawdown_curve);
    let guides = [HorizontalGuide {
        value: 0.0,
        color: GUIDE_COLOR,
        dash: false,
        label: None,
    }];

    render_indexed_line_chart(&dates, &indexed, &guides, title, "Drawdown", format_percentage)
}

/// One bar per portfolio for a fractional value such as total return.
pub fn labelled_bars(bars: &[(&str, f64)], title: &str) -> String {
    let values: Vec<f64> = bars.iter().map(|(_, v)| *v).collect();
    if values.iter().all(|v| !v.is_finite()) {
        return String::new();
    }

    let width = WIDTH as f64;
    let height = HEIGHT as f64;
    let xs = x_positions(values.len(), width);

    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min_v = finite.clone().fold(0.0_f64, f64::min);
    let max_v = finite.fold(0.0_f64, f64::max);
    let (min_v, max_v) = if min_v == max_v { (-1.0, 1.0) } else { (min_v, max_v) };
    let zero = scale_value(0.0, min_v, max_v, height);

    let mut svg = String::new();
    svg.push_str(&svg_header(WIDTH, HEIGHT));

    let bar_width = ((width - 2.0 * PADDING) / values.len().max(1) as f64) * 0.5;

    for (i, (label, v)) in bars.iter().enumerate() {
        let x_center = xs[i];
        svg.push_str(&format!(
            r#"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"#,
            x = x_center,
            y = height - PADDING + 21.0,
            label = escape(label)
        ));
        if !v.is_finite() {
            continue;
        }
        let y = scale_value(*v, min_v, max_v, height);
        let (top, bottom) = if y < zero { (y, zero) } else { (zero, y) };
        let color = if *v >= 0.0 { POSITIVE_COLOR } else { NEGATIVE_COLOR };
        svg.push_str(&format!(
            r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="{color}" />"#,
            x = x_center - bar_width / 2.0,
            y = top,
            w = bar_width,
            h = (bottom - top).abs(),
            color = color
        ));
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="middle" fill="#333">{pct:.2}%</text>"##,
            x = x_center,
            y = top - 4.0,
            pct = v * 100.0
        ));
    }

    svg.push_str(&format!(
        r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="#000" stroke-width="1" />"##,
        x1 = PADDING,
        x2 = width - PADDING,
        y = zero
    ));

    svg.push_str(svg_footer());
    wrap_plot(title, svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::TimeSeries;

    fn series(start_day: u32, values: &[f64]) -> PerformanceSeries {
        let dates = (0..values.len() as u32)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, start_day + i).unwrap())
            .collect();
        TimeSeries::new(dates, values.to_vec(), None).unwrap()
    }

    #[test]
    fn comparison_draws_one_line_per_series() {
        let a = series(1, &[1.0, 1.1, 1.2]);
        let b = series(2, &[1.0, 0.9, 0.95]);
        let svg = performance_comparison(
            &[
                ChartSeries { label: "Bench", color: palette_color(0), series: &a },
                ChartSeries { label: "Mine & Co", color: palette_color(1), series: &b },
            ],
            1.0,
            "Portfolio Performance Comparison (1 Month)",
            "Cumulative Return (1 = Initial Investment)",
        );

        assert_eq!(svg.matches("<polyline").count(), 2);
        assert!(svg.contains("#1f77b4"));
        assert!(svg.contains("#ff7f0e"));
        assert!(svg.contains("Mine &amp; Co"));
        assert!(svg.contains("2024-01"));
        assert!(svg.contains("Initial Investment"));
    }

    #[test]
    fn escape_covers_markup_and_braces() {
        assert_eq!(escape("<a & 'b'>"), "&lt;a &amp; &#39;b&#39;&gt;");
        assert_eq!(escape("{{x}}"), "&#123;&#123;x&#125;&#125;");
    }

    #[test]
    fn nothing_to_draw_is_empty() {
        assert!(performance_comparison(&[], 1.0, "t", "").is_empty());
        assert!(labelled_bars(&[("x", f64::NAN)], "t").is_empty());
    }

    #[test]
    fn drawdown_curve_tracks_running_peak() {
        let dd = drawdown_curve(&[1.0, 2.0, 1.0, 3.0]);
        assert_eq!(dd, vec![0.0, 0.0, -0.5, 0.0]);
    }

    #[test]
    fn bars_are_colored_by_sign() {
        let svg = labelled_bars(&[("Up", 0.1), ("Down", -0.05)], "Total Return");
        assert!(svg.contains(POSITIVE_COLOR));
        assert!(svg.contains(NEGATIVE_COLOR));
        assert!(svg.contains("10.00%"));
    }

    #[test]
    fn time_labels_are_thinned() {
        let start = NaiveDate::from_ymd_opt(2019, 1, 1).unwrap();
        let dates: Vec<NaiveDate> = (0..1825).map(|i| start + chrono::Days::new(i)).collect();
        let xs = x_positions(dates.len(), WIDTH as f64);
        let mut svg = String::new();
        add_time_axis(&mut svg, &dates, &xs, WIDTH as f64, HEIGHT as f64);
        assert!(svg.matches("<text").count() <= MAX_TIME_LABELS);
    }
}
