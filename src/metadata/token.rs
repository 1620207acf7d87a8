use std::fmt;

use crate::{metadata::tables::TableId, Result};

/// A metadata token addressing one row of one table within an image.
///
/// Tokens in .NET metadata are 32-bit values where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
///
/// This type keeps both parts apart with the table as a typed [`TableId`], so a token can
/// never name a table that does not exist. Row `0` is the nil token of a table and never
/// addresses an entity.
///
/// A token is only meaningful together with the image it was decoded from.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token {
    table: TableId,
    row: u32,
}

impl Token {
    /// Maximum row index representable in a raw token
    pub const MAX_ROW: u32 = 0x00FF_FFFF;

    /// Creates a new token for `row` of `table`
    ///
    /// Rows above [`Token::MAX_ROW`] are truncated to 24 bits, the same way they would
    /// be when encoded into a raw token.
    #[must_use]
    pub fn new(table: TableId, row: u32) -> Self {
        Token {
            table,
            row: row & Self::MAX_ROW,
        }
    }

    /// The nil token of `table` (row `0`)
    #[must_use]
    pub fn nil(table: TableId) -> Self {
        Token { table, row: 0 }
    }

    /// Decodes a raw 32-bit token value
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the high byte does not name a known table.
    pub fn from_raw(value: u32) -> Result<Self> {
        let byte = (value >> 24) as u8;
        match TableId::from_token_byte(byte) {
            Some(table) => Ok(Token {
                table,
                row: value & Self::MAX_ROW,
            }),
            None => Err(malformed_error!(
                "Token 0x{:08x} refers to unknown table 0x{:02x}",
                value,
                byte
            )),
        }
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        (u32::from(self.table.as_byte()) << 24) | self.row
    }

    /// The table this token addresses
    #[must_use]
    pub fn table(&self) -> TableId {
        self.table
    }

    /// The 1-based row index within the table
    #[must_use]
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Returns true if this is a nil token (row 0)
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.row == 0
    }

    /// Returns true if this token addresses `table`
    #[must_use]
    pub fn is_table(&self, table: TableId) -> bool {
        self.table == table
    }
}

impl TryFrom<u32> for Token {
    type Error = crate::Error;

    fn try_from(value: u32) -> Result<Self> {
        Token::from_raw(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.value()
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: {}, row: {})",
            self.value(),
            self.table,
            self.row
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.value())
    }
}
