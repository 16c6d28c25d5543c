//! Symbol alphabet mapping class indices to prompt characters.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The 26 Latin capitals used by the reference trainer.
pub const LATIN_UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlphabetError {
    #[error("alphabet must contain at least one symbol")]
    Empty,
    #[error("symbol '{0}' appears more than once")]
    Duplicate(char),
}

/// Ordered set of distinct symbols; the index of a symbol is its class label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AlphabetRecord")]
pub struct Alphabet {
    symbols: Vec<char>,
}

#[derive(Deserialize)]
struct AlphabetRecord {
    symbols: Vec<char>,
}

impl TryFrom<AlphabetRecord> for Alphabet {
    type Error = AlphabetError;

    fn try_from(record: AlphabetRecord) -> Result<Self, AlphabetError> {
        Self::from_symbols(record.symbols)
    }
}

impl Alphabet {
    /// Builds an alphabet from a string of distinct symbols.
    pub fn new(symbols: &str) -> Result<Self, AlphabetError> {
        Self::from_symbols(symbols.chars().collect())
    }

    fn from_symbols(symbols: Vec<char>) -> Result<Self, AlphabetError> {
        if symbols.is_empty() {
            return Err(AlphabetError::Empty);
        }
        for (idx, &symbol) in symbols.iter().enumerate() {
            if symbols[..idx].contains(&symbol) {
                return Err(AlphabetError::Duplicate(symbol));
            }
        }
        Ok(Self { symbols })
    }

    pub fn latin_uppercase() -> Self {
        Self {
            symbols: LATIN_UPPERCASE.chars().collect(),
        }
    }

    /// Alphabet size C.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbol(&self, index: usize) -> Option<char> {
        self.symbols.get(index).copied()
    }

    pub fn index_of(&self, symbol: char) -> Option<usize> {
        self.symbols.iter().position(|&s| s == symbol)
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Draws the next prompt label uniformly from the alphabet.
    pub fn random_label<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.gen_range(0..self.symbols.len())
    }
}

impl Default for Alphabet {
    fn default() -> Self {
        Self::latin_uppercase()
    }
}
