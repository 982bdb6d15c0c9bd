//! Terminal rendering of node listings

use anyhow::Result;
use unicode_width::UnicodeWidthStr;

use nodescope_types::{LabelIndex, Node, QueriedNodes};

/// CPU in millicores as kubectl shows it: "250m", "2", "1.5"
pub fn format_cpu(millis: i64) -> String {
    if millis < 1000 {
        format!("{}m", millis)
    } else if millis % 1000 == 0 {
        format!("{}", millis / 1000)
    } else {
        format!("{:.1}", millis as f64 / 1000.0)
    }
}

/// Memory in bytes with a binary suffix
pub fn format_memory(bytes: i64) -> String {
    const KI: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KI * KI * KI {
        format!("{:.1}Gi", b / (KI * KI * KI))
    } else if b >= KI * KI {
        format!("{:.0}Mi", b / (KI * KI))
    } else if b >= KI {
        format!("{:.0}Ki", b / KI)
    } else {
        format!("{}B", bytes)
    }
}

fn usage_cell(used: String, total: String, percent: Option<f64>) -> String {
    match percent {
        Some(p) => format!("{}/{} ({:.0}%)", used, total, p),
        None => format!("{}/{}", used, total),
    }
}

/// Render nodes as an aligned table; `wide` adds the console and dashboard links
pub fn render_table(nodes: &[Node], wide: bool) -> String {
    if nodes.is_empty() {
        return "No nodes found".to_string();
    }

    let mut header = vec!["NAME", "INSTANCE TYPE", "CPU", "MEMORY"];
    if wide {
        header.extend(["CONSOLE", "DASHBOARD"]);
    }

    let rows: Vec<Vec<String>> = nodes
        .iter()
        .map(|node| {
            let mut row = vec![
                node.name.clone(),
                node.instance_type.clone(),
                usage_cell(
                    format_cpu(node.usage.cpu),
                    format_cpu(node.capacity.cpu),
                    node.cpu_percent(),
                ),
                usage_cell(
                    format_memory(node.usage.memory),
                    format_memory(node.capacity.memory),
                    node.memory_percent(),
                ),
            ];
            if wide {
                row.push(node.console_page_url.clone());
                row.push(node.dashboard_url.clone());
            }
            row
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.width()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.width());
        }
    }

    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    std::iter::once(&header)
        .chain(rows.iter())
        .map(|row| format_row(row, &widths))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_row(cells: &[String], widths: &[usize]) -> String {
    let last = cells.len().saturating_sub(1);
    let mut line = String::new();
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        line.push_str(cell);
        if i < last {
            line.push_str(&" ".repeat(width - cell.width() + 2));
        }
    }
    line
}

/// One line per label key with its distinct values
pub fn render_labels(labels: &LabelIndex) -> String {
    labels
        .iter()
        .map(|(key, values)| format!("{}: {}", key, values.join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_json(queried: &QueriedNodes) -> Result<String> {
    Ok(serde_json::to_string_pretty(queried)?)
}
