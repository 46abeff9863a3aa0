use std::fmt;

/// Rendered in place of a dump when a sheet has no data rows.
pub const NO_DATA: &str = "No data.";

/// One data row of a sheet: key in column A, label in B, count in C.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub key: String,
    pub label: String,
    /// Cell text as the store renders it, so `1,500` shows as formatted.
    /// Absent when the cell is empty.
    pub count: Option<String>,
}

impl Row {
    /// Missing trailing cells read as empty, the store omits them.
    pub fn from_cells(cells: Vec<String>) -> Self {
        let mut cells = cells.into_iter();
        let key = cells.next().unwrap_or_default();
        let label = cells.next().unwrap_or_default();
        let count = cells
            .next()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        Row { key, label, count }
    }

    /// Blank rows inside the range have no key and never match a lookup.
    pub fn is_keyed(&self, key: &str) -> bool {
        !self.key.is_empty() && self.key == key
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ID: {}, Name: {}, Count: {}", self.key, self.label, self.count.as_deref().unwrap_or("0"))
    }
}

pub fn format_rows(rows: &[Row]) -> String {
    if rows.is_empty() {
        return NO_DATA.to_string();
    }
    rows.iter()
        .map(Row::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(raw: &[&[&str]]) -> Vec<Row> {
        raw.iter()
            .map(|r| Row::from_cells(r.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    #[test]
    fn formats_rows_one_per_line() {
        let rows = rows(&[&["1", "Alice", "3"], &["2", "Bob", ""]]);
        assert_eq!(format_rows(&rows), "ID: 1, Name: Alice, Count: 3\nID: 2, Name: Bob, Count: 0");
    }

    #[test]
    fn empty_sheet_renders_sentinel() {
        assert_eq!(format_rows(&[]), NO_DATA);
    }

    #[test]
    fn short_and_odd_rows() {
        let rows = rows(&[&["7"], &[], &["8", "Carol", "many"], &["9", "Dan", " -4 "]]);
        assert_eq!(rows[0], Row { key: "7".into(), label: String::new(), count: None });
        assert_eq!(rows[1].key, "");
        assert_eq!(rows[2].count.as_deref(), Some("many"));
        assert_eq!(rows[3].count.as_deref(), Some("-4"));
    }

    #[test]
    fn formatted_counts_render_as_shown() {
        let rows = rows(&[&["1", "A", "1,500"], &["2", "B", "2.5"], &["3", "C", "  "]]);
        assert_eq!(
            format_rows(&rows),
            "ID: 1, Name: A, Count: 1,500\nID: 2, Name: B, Count: 2.5\nID: 3, Name: C, Count: 0"
        );
    }

    #[test]
    fn blank_rows_match_no_key() {
        let blank = Row::from_cells(Vec::new());
        assert!(!blank.is_keyed(""));
        assert!(Row::from_cells(vec!["5".to_string()]).is_keyed("5"));
    }
}
