//! A1 notation

use crate::{Error, Result};

/// 1 → "A", 26 → "Z", 27 → "AA"
pub fn column_letter(column: usize) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// (row 3, column 2) → "B3"
pub fn cell_a1(row: usize, column: usize) -> String {
    format!("{}{}", column_letter(column), row)
}

/// "B3" → (3, 2)
pub fn parse_cell(a1: &str) -> Result<(usize, usize)> {
    let a1 = a1.trim();
    let split = a1
        .find(|c: char| c.is_ascii_digit())
        .ok_or_else(|| Error::InvalidInput(format!("Not an A1 cell reference: {}", a1)))?;
    let (letters, digits) = a1.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidInput(format!("Not an A1 cell reference: {}", a1)));
    }

    let column = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    let row: usize = digits
        .parse()
        .map_err(|_| Error::InvalidInput(format!("Not an A1 cell reference: {}", a1)))?;
    if row == 0 {
        return Err(Error::InvalidInput(format!("Row 0 in {}", a1)));
    }
    Ok((row, column))
}

/// Rectangular range, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start_row: usize,
    pub start_column: usize,
    pub end_row: usize,
    pub end_column: usize,
}

impl CellRange {
    /// Parse "A2:C10" or a single cell "B3"
    pub fn parse(range: &str) -> Result<Self> {
        let (start, end) = match range.split_once(':') {
            Some((a, b)) => (parse_cell(a)?, parse_cell(b)?),
            None => {
                let cell = parse_cell(range)?;
                (cell, cell)
            }
        };
        Ok(Self {
            start_row: start.0.min(end.0),
            start_column: start.1.min(end.1),
            end_row: start.0.max(end.0),
            end_column: start.1.max(end.1),
        })
    }

    pub fn num_rows(&self) -> usize {
        self.end_row - self.start_row + 1
    }

    pub fn num_columns(&self) -> usize {
        self.end_column - self.start_column + 1
    }

    /// A1 reference of the cell at (row_offset, column_offset) from the top-left corner
    pub fn offset_a1(&self, row_offset: usize, column_offset: usize) -> String {
        cell_a1(self.start_row + row_offset, self.start_column + column_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(703), "AAA");
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("B3").unwrap(), (3, 2));
        assert_eq!(parse_cell("aa10").unwrap(), (10, 27));
        assert!(parse_cell("3B").is_err());
        assert!(parse_cell("A0").is_err());
    }

    #[test]
    fn test_range_normalizes_corners() {
        let range = CellRange::parse("C10:A2").unwrap();
        assert_eq!(range.start_row, 2);
        assert_eq!(range.start_column, 1);
        assert_eq!(range.num_rows(), 9);
        assert_eq!(range.num_columns(), 3);
        assert_eq!(range.offset_a1(1, 2), "C3");
    }
}
