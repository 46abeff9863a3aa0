//! A1 notation helpers for addressing a sheet.

/// Row 1 holds the header, data starts below it.
pub const FIRST_DATA_ROW: usize = 2;

const KEY_TO_COUNT_COLUMNS: &str = "A2:C";
const COUNT_COLUMN: char = 'C';

/// Sheet names made of anything but ASCII alphanumerics or `_` must be quoted,
/// with embedded quotes doubled.
pub fn sheet_ref(partition: &str) -> String {
    let plain = !partition.is_empty()
        && partition.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        partition.to_string()
    } else {
        format!("'{}'", partition.replace('\'', "''"))
    }
}

pub fn rows_range(partition: &str) -> String {
    format!("{}!{}", sheet_ref(partition), KEY_TO_COUNT_COLUMNS)
}

/// Cell holding the count of the row at `index` in a [`rows_range`] read.
pub fn count_cell(partition: &str, index: usize) -> String {
    format!("{}!{}{}", sheet_ref(partition), COUNT_COLUMN, index + FIRST_DATA_ROW)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_stay_bare() {
        assert_eq!(rows_range("Sheet1"), "Sheet1!A2:C");
        assert_eq!(count_cell("Sheet1", 1), "Sheet1!C3");
        assert_eq!(count_cell("Sheet1", 0), "Sheet1!C2");
    }

    #[test]
    fn other_names_are_quoted() {
        assert_eq!(rows_range("Tuấn"), "'Tuấn'!A2:C");
        assert_eq!(rows_range("My Sheet"), "'My Sheet'!A2:C");
        assert_eq!(count_cell("Bob's", 4), "'Bob''s'!C6");
    }
}
