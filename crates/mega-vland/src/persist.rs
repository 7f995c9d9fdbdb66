//! On-disk copy of the alias table.
//!
//! The file is a two-column table with an `Alias\tVLAN` header, rewritten in
//! full after every new allocation and read back only when a node starts.
//!
//! Aliases that would not survive column alignment (surrounding whitespace,
//! a leading `"`, control characters) are written double-quoted with `"`,
//! `\` and line breaks escaped. Everything else is written as is.

use crate::allocator::VlanAllocator;
use mega_types::VlanId;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// File name of the alias table under the node base directory.
pub const ALIAS_TABLE_FILE: &str = "vlans";

/// Column headers.
pub const ALIAS_TABLE_HEADER: [&str; 2] = ["Alias", "VLAN"];

const MIN_WIDTH: usize = 5;
const PADDING: usize = 1;

/// A quoted alias cell.
static QUOTED_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"((?:[^"\\]|\\.)*)"$"#).expect("Invalid regex pattern"));

/// Escape sequences inside a quoted alias cell.
static CELL_UNESCAPE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\(.)").expect("Invalid regex pattern"));

fn needs_quoting(alias: &str) -> bool {
    alias.is_empty()
        || alias.trim() != alias
        || alias.starts_with('"')
        || alias.chars().any(char::is_control)
}

fn alias_cell(alias: &str) -> String {
    if !needs_quoting(alias) {
        return alias.to_string();
    }
    let mut cell = String::with_capacity(alias.len() + 2);
    cell.push('"');
    for c in alias.chars() {
        match c {
            '"' => cell.push_str("\\\""),
            '\\' => cell.push_str("\\\\"),
            '\n' => cell.push_str("\\n"),
            '\r' => cell.push_str("\\r"),
            '\t' => cell.push_str("\\t"),
            c => cell.push(c),
        }
    }
    cell.push('"');
    cell
}

fn parse_alias_cell(cell: &str) -> Option<String> {
    if !cell.starts_with('"') {
        return Some(cell.to_string());
    }
    let caps = QUOTED_CELL_RE.captures(cell)?;
    let alias = CELL_UNESCAPE_RE.replace_all(&caps[1], |esc: &Captures| match &esc[1] {
        "n" => "\n".to_string(),
        "r" => "\r".to_string(),
        "t" => "\t".to_string(),
        other => other.to_string(),
    });
    Some(alias.into_owned())
}

/// Renders rows as a space-aligned table. An empty table renders as "".
pub fn render_alias_table(rows: &[(String, VlanId)]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let cells: Vec<(String, VlanId)> = rows
        .iter()
        .map(|(alias, vlan)| (alias_cell(alias), *vlan))
        .collect();

    let width = cells
        .iter()
        .map(|(cell, _)| cell.chars().count())
        .chain(std::iter::once(ALIAS_TABLE_HEADER[0].len()))
        .max()
        .map_or(MIN_WIDTH, |w| (w + PADDING).max(MIN_WIDTH));

    let mut out = format!(
        "{:<width$}{}\n",
        ALIAS_TABLE_HEADER[0], ALIAS_TABLE_HEADER[1]
    );
    for (cell, vlan) in &cells {
        out.push_str(&format!("{cell:<width$}{vlan}\n"));
    }
    out
}

/// Parses a rendered table. Malformed rows are skipped with a warning.
///
/// Only the last column is split off; the alias cell keeps its inner
/// whitespace, and a quoted cell is unescaped back to the exact alias.
pub fn parse_alias_table(text: &str) -> Vec<(String, VlanId)> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let mut cols = line.split_whitespace();
            !(cols.next() == Some(ALIAS_TABLE_HEADER[0])
                && cols.next() == Some(ALIAS_TABLE_HEADER[1])
                && cols.next().is_none())
        })
        .filter_map(|line| {
            let parsed = line
                .rsplit_once(char::is_whitespace)
                .and_then(|(cell, vlan)| {
                    let cell = cell.trim_end();
                    if cell.is_empty() {
                        return None;
                    }
                    Some((parse_alias_cell(cell)?, vlan.parse::<VlanId>().ok()?))
                });
            if parsed.is_none() {
                warn!(line, "Skipping malformed alias table row");
            }
            parsed
        })
        .collect()
}

/// Reads the alias table file. A missing file is an empty table.
pub async fn read_alias_table(path: impl AsRef<Path>) -> io::Result<Vec<(String, VlanId)>> {
    match tokio::fs::read_to_string(path.as_ref()).await {
        Ok(text) => Ok(parse_alias_table(&text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e),
    }
}

/// Rewrites the alias table file.
///
/// Writers are serialized, and each write goes to a temporary file that is
/// renamed over the table, so readers never see a torn file.
#[derive(Debug)]
pub struct AliasTableWriter {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AliasTableWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshots the allocator and replaces the file with it.
    pub async fn persist(&self, allocator: &dyn VlanAllocator) -> io::Result<()> {
        let _guard = self.lock.lock().await;

        // Snapshot under the lock so the newest writer also writes the newest table.
        let rows = allocator.tabular(None);
        let data = render_alias_table(&rows);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, data.as_bytes()).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), rows = rows.len(), "Wrote alias table");
        Ok(())
    }
}
