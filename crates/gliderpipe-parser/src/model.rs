use polars::prelude::DataFrame;

/// Result of decoding one raw payload file.
#[derive(Debug, Clone)]
pub struct DecodedPayload {
    pub dataframe: DataFrame,
    pub stats: DecodeStats,
}

/// Bookkeeping for a single decode: what survived and what was coerced away.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeStats {
    /// Rows that made it into the dataframe.
    pub rows_decoded: usize,
    /// Rows dropped because every cell was missing.
    pub rows_dropped_empty: usize,
    /// Non-empty cells that failed numeric parsing and became missing.
    pub coerced_cells: usize,
    /// Non-empty timestamps that failed parsing and became missing.
    pub coerced_timestamps: usize,
}

impl DecodeStats {
    pub fn had_coercions(&self) -> bool {
        self.coerced_cells > 0 || self.coerced_timestamps > 0
    }
}
