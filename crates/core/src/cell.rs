//! A1-notation cell coordinates. Rows and columns are 1-based, the way
//! spreadsheet users (and the variant tables) write them.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// `CellRef::at("BE", 12)`; `None` for an invalid column name.
    pub fn at(column: &str, row: u32) -> Option<Self> {
        Some(Self::new(row, column_index(column)?))
    }

    /// Parse `"L1"`, `"be12"`. Row and column must both be present and non-zero.
    pub fn parse(a1: &str) -> Option<Self> {
        let a1 = a1.trim();
        let split = a1.find(|c: char| c.is_ascii_digit())?;
        let (letters, digits) = a1.split_at(split);
        let row: u32 = digits.parse().ok()?;
        if row == 0 {
            return None;
        }
        Some(Self::new(row, column_index(letters)?))
    }

    pub fn offset_rows(self, rows: u32) -> Self {
        Self::new(self.row + rows, self.col)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

/// `"A"` → 1, `"Z"` → 26, `"AA"` → 27, `"BF"` → 58.
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        Some(acc * 26 + (c.to_ascii_uppercase() as u32 - 'A' as u32 + 1))
    })
}

pub fn column_letters(mut index: u32) -> String {
    let mut out = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        out.push((b'A' + rem as u8) as char);
        index = (index - 1) / 26;
    }
    out.iter().rev().collect()
}

/// Parse a rectangular range such as `"L1:U1"` into its corners.
pub fn parse_range(range: &str) -> Option<(CellRef, CellRef)> {
    let (first, last) = range.split_once(':')?;
    let (first, last) = (CellRef::parse(first)?, CellRef::parse(last)?);
    if first.row > last.row || first.col > last.col {
        return None;
    }
    Some((first, last))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_conversion() {
        assert_eq!(column_index("A"), Some(1));
        assert_eq!(column_index("z"), Some(26));
        assert_eq!(column_index("AA"), Some(27));
        assert_eq!(column_index("BE"), Some(57));
        assert_eq!(column_index("BF"), Some(58));
        assert_eq!(column_index(""), None);
        assert_eq!(column_index("A1"), None);
        assert_eq!(column_letters(57), "BE");
        assert_eq!(column_letters(26), "Z");
        assert_eq!(column_letters(703), "AAA");
    }

    #[test]
    fn test_parse_a1() {
        assert_eq!(CellRef::parse("L1"), Some(CellRef::new(1, 12)));
        assert_eq!(CellRef::parse("be12"), Some(CellRef::new(12, 57)));
        assert_eq!(CellRef::parse("12"), None);
        assert_eq!(CellRef::parse("A0"), None);
        assert_eq!(CellRef::new(3, 8).to_string(), "H3");
    }

    #[test]
    fn test_parse_range() {
        let (a, b) = parse_range("L1:U1").unwrap();
        assert_eq!(a, CellRef::new(1, 12));
        assert_eq!(b, CellRef::new(1, 21));
        assert!(parse_range("U1:L1").is_none());
        assert!(parse_range("L1").is_none());
    }
}
