use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::task::Task;

/// Plain-text table rendering. The whole table is rewritten on every
/// refresh; there is no in-place update.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    #[tracing::instrument(skip(self, tasks))]
    pub fn print_task_table(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();

        if tasks.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Title".to_string(),
            "Description".to_string(),
        ];

        write_table(&mut out, headers, self.task_rows(tasks))?;
        Ok(())
    }

    /// One row per task, in the order given. Completed tasks get a marker
    /// and a struck-through title.
    fn task_rows(&self, tasks: &[Task]) -> Vec<Vec<String>> {
        let mut rows = Vec::with_capacity(tasks.len());

        for task in tasks {
            let id = self.paint(&task.id.to_string(), "33");
            let done = if task.completed {
                self.paint("x", "32")
            } else {
                String::new()
            };
            let title = if task.completed {
                self.paint(&task.title, "9;2")
            } else {
                task.title.clone()
            };

            rows.push(vec![id, done, title, task.description.clone()]);
        }

        rows
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::{Renderer, strip_ansi, write_table};
    use crate::config::Config;
    use crate::task::Task;

    fn task(id: u64, title: &str, completed: bool) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: String::new(),
            completed,
        }
    }

    #[test]
    fn rows_mark_completed_tasks_only() {
        let renderer = Renderer::new(&Config::default()).expect("renderer");
        let rows = renderer.task_rows(&[task(1, "open", false), task(2, "closed", true)]);

        // stdout is not a terminal under test, so cells come back unpainted
        assert_eq!(rows[0][1], "");
        assert_eq!(rows[1][1], "x");
        assert_eq!(rows[0][2], "open");
        assert_eq!(rows[1][2], "closed");
    }

    #[test]
    fn rows_preserve_input_order() {
        let renderer = Renderer::new(&Config::default()).expect("renderer");
        let rows = renderer.task_rows(&[task(9, "b", false), task(2, "a", false)]);
        assert_eq!(rows[0][0], "9");
        assert_eq!(rows[1][0], "2");
    }

    #[test]
    fn table_columns_align_on_visible_width() {
        let headers = vec!["ID".to_string(), "Title".to_string()];
        let rows = vec![
            vec!["1".to_string(), "short".to_string()],
            vec!["10".to_string(), "\x1b[2mpainted\x1b[0m".to_string()],
        ];

        let mut out = Vec::new();
        write_table(&mut out, headers, rows).expect("table");
        let text = String::from_utf8(out).expect("utf8");

        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("ID "));
        assert!(lines[2].starts_with("1  short"));
        assert!(strip_ansi(lines[3]).starts_with("10 painted"));
    }

    #[test]
    fn invalid_color_setting_is_rejected() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("color".to_string(), "maybe".to_string())]);
        assert!(Renderer::new(&cfg).is_err());
    }
}
