//! Terminal line charts for price tables

use super::ui;
use crate::core::table::Table;
use anyhow::{Result, anyhow, bail};
use console::Term;

const CHART_HEIGHT: usize = 16;
const AXIS_WIDTH: usize = 12;

/// Displays one column of a table as a chart.
pub trait ChartRenderer {
    /// Renders `table[column]` and returns once the viewer is done with it.
    fn render(&mut self, title: &str, table: &Table, column: &str) -> Result<()>;
}

/// Draws charts on stdout and waits for a key press before returning.
pub struct TerminalChart {
    term: Term,
    height: usize,
}

impl TerminalChart {
    pub fn new() -> Self {
        Self {
            term: Term::stdout(),
            height: CHART_HEIGHT,
        }
    }
}

impl Default for TerminalChart {
    fn default() -> Self {
        Self::new()
    }
}

/// Averages `values` into at most `width` buckets.
fn downsample(values: &[f64], width: usize) -> Vec<f64> {
    if values.len() <= width || width == 0 {
        return values.to_vec();
    }
    (0..width)
        .map(|i| {
            let start = i * values.len() / width;
            let end = ((i + 1) * values.len() / width).max(start + 1);
            let bucket = &values[start..end];
            bucket.iter().sum::<f64>() / bucket.len() as f64
        })
        .collect()
}

/// Plots `values` on a `height`-row grid, one column per value after
/// downsampling to `width`. Returns rows top to bottom.
pub fn plot(values: &[f64], width: usize, height: usize) -> Vec<String> {
    let points = downsample(values, width);
    if points.is_empty() || height == 0 {
        return Vec::new();
    }

    let min = points.iter().copied().fold(f64::INFINITY, f64::min);
    let max = points.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    let row_of = |v: f64| -> usize {
        if span == 0.0 {
            (height - 1) / 2
        } else {
            (((v - min) / span) * (height - 1) as f64).round() as usize
        }
    };

    let mut grid = vec![vec![' '; points.len()]; height];
    let mut previous: Option<usize> = None;
    for (col, value) in points.iter().enumerate() {
        let row = row_of(*value);
        if let Some(prev) = previous {
            let (low, high) = if prev < row { (prev, row) } else { (row, prev) };
            for r in (low + 1)..high {
                grid[height - 1 - r][col] = '│';
            }
        }
        grid[height - 1 - row][col] = '•';
        previous = Some(row);
    }

    grid.into_iter()
        .map(|line| line.into_iter().collect::<String>().trim_end().to_string())
        .collect()
}

impl ChartRenderer for TerminalChart {
    fn render(&mut self, title: &str, table: &Table, column: &str) -> Result<()> {
        let series = table
            .column(column)
            .ok_or_else(|| anyhow!("Column '{}' not found for {}", column, title))?;
        if series.is_empty() {
            bail!("No {} data to chart for {}", column, title);
        }

        let points: Vec<_> = series.iter().collect();
        let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let width = ui::terminal_width().saturating_sub(AXIS_WIDTH + 2).max(10);

        let rows = plot(&values, width, self.height);
        let last_row = rows.len().saturating_sub(1);

        let heading = ui::style_text(title, ui::StyleType::Title);
        self.term.write_line("")?;
        self.term.write_line(&heading)?;
        self.term.write_line("")?;
        for (i, row) in rows.iter().enumerate() {
            let label = match i {
                0 => ui::format_price(max),
                i if i == last_row => ui::format_price(min),
                _ => String::new(),
            };
            let line = format!("{label:>AXIS_WIDTH$} ┤{row}");
            self.term.write_line(&line)?;
        }
        let plotted = values.len().min(width);
        let axis = format!("{:>AXIS_WIDTH$} └{}", "", "─".repeat(plotted));
        self.term.write_line(&axis)?;

        let (first_date, _) = points[0];
        let (last_date, latest) = points[points.len() - 1];
        let first_label = first_date.to_string();
        let gap = plotted.saturating_sub(first_label.len() + 10).max(1);
        let spacer = " ".repeat(gap);
        let dates = format!("{:>AXIS_WIDTH$}  {first_label}{spacer}{last_date}", "");
        self.term.write_line(&dates)?;

        let mut summary = ui::new_styled_table();
        summary.set_header(vec![
            ui::header_cell("From"),
            ui::header_cell("To"),
            ui::header_cell("Min"),
            ui::header_cell("Max"),
            ui::header_cell(&format!("Latest ({column})")),
        ]);
        summary.add_row(vec![
            comfy_table::Cell::new(first_date),
            comfy_table::Cell::new(last_date),
            ui::price_cell(min),
            ui::price_cell(max),
            ui::price_cell(latest),
        ]);
        self.term.write_line("")?;
        self.term.write_line(&summary.to_string())?;

        if self.term.is_term() {
            let hint = ui::style_text("Press any key to close the chart", ui::StyleType::Subtle);
            self.term.write_line(&hint)?;
            self.term.read_key()?;
        }
        Ok(())
    }
}
