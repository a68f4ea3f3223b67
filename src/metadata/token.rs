//! Metadata tokens.
//!
//! A token is the 32-bit handle ECMA-335 uses for rows in metadata tables: the
//! high byte names the table, the low 24 bits the 1-based row. The model uses
//! the same tokens the compiled module carries, which is what lets debug
//! information (keyed by `MethodDef` row) be matched back to method bodies.

use std::fmt;

/// Table id of `TypeDef` rows.
pub const TABLE_TYPE_DEF: u8 = 0x02;
/// Table id of `MethodDef` rows.
pub const TABLE_METHOD_DEF: u8 = 0x06;

/// A metadata token: table id in the high byte, row in the low 24 bits.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Wraps a raw token value.
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Builds a token from a table id and a row number.
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// `TypeDef` token for `row`.
    #[must_use]
    pub fn type_def(row: u32) -> Self {
        Self::from_parts(TABLE_TYPE_DEF, row)
    }

    /// `MethodDef` token for `row`.
    #[must_use]
    pub fn method_def(row: u32) -> Self {
        Self::from_parts(TABLE_METHOD_DEF, row)
    }

    /// The raw 32-bit value.
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// The table id (high byte).
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// The 1-based row (low 24 bits).
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// `true` for the null token.
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// `true` if this token points into the `TypeDef` table.
    #[must_use]
    pub fn is_type_def(&self) -> bool {
        self.table() == TABLE_TYPE_DEF
    }

    /// `true` if this token points into the `MethodDef` table.
    #[must_use]
    pub fn is_method_def(&self) -> bool {
        self.table() == TABLE_METHOD_DEF
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parts() {
        let token = Token(0x0600_0001);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 1);
        assert!(token.is_method_def());
        assert!(!token.is_type_def());

        let token = Token(0x06FF_FFFF);
        assert_eq!(token.row(), 0x00FF_FFFF);
    }

    #[test]
    fn test_token_constructors() {
        assert_eq!(Token::type_def(5), Token(0x0200_0005));
        assert_eq!(Token::method_def(0x1234), Token(0x0600_1234));
        // Rows wider than 24 bits are truncated instead of spilling into the table id
        assert_eq!(Token::from_parts(0x02, 0x0100_0001).value(), 0x0200_0001);
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token(0).is_null());
        assert!(!Token::method_def(1).is_null());
    }

    #[test]
    fn test_token_formatting() {
        let token = Token(0x0600_0001);
        assert_eq!(format!("{}", token), "0x06000001");

        let debug_str = format!("{:?}", token);
        assert!(debug_str.contains("Token(0x06000001"));
        assert!(debug_str.contains("table: 0x06"));
        assert!(debug_str.contains("row: 1"));
    }

    #[test]
    fn test_token_ordering() {
        assert!(Token::type_def(9) < Token::method_def(1));
        assert!(Token::method_def(1) < Token::method_def(2));
    }
}
