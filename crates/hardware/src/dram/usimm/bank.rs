//! Bank and address decoding for the channel model.

use super::params::{Geometry, Timing};

/// Where an address lands in the DRAM array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Location {
    /// Channel index.
    pub channel: usize,
    /// Rank within the channel.
    pub rank: usize,
    /// Bank within the rank.
    pub bank: usize,
    /// Row within the bank.
    pub row: u64,
}

/// Splits `addr` into channel, rank, bank and row.
///
/// Addresses wrap at `ADDRESS_BITS`. With mapping 1 the fields from least significant up are
/// column, channel, bank, rank, row; with mapping 2 they are channel, bank, rank, column, row.
pub fn decode(addr: u64, g: &Geometry) -> Location {
    let mask = if g.address_bits >= 64 {
        u64::MAX
    } else {
        (1u64 << g.address_bits) - 1
    };
    let mut bits = (addr & mask) >> g.line_bits;
    let mut take = |width: u32| {
        let field = bits & ((1u64 << width) - 1);
        bits >>= width;
        field
    };
    let (channel, bank, rank) = if g.mapping == 1 {
        let _column = take(g.column_bits);
        let channel = take(g.channel_bits);
        let bank = take(g.bank_bits);
        let rank = take(g.rank_bits);
        (channel, bank, rank)
    } else {
        let channel = take(g.channel_bits);
        let bank = take(g.bank_bits);
        let rank = take(g.rank_bits);
        let _column = take(g.column_bits);
        (channel, bank, rank)
    };
    let row = take(g.row_bits);
    Location {
        channel: channel as usize,
        rank: rank as usize,
        bank: bank as usize,
        row,
    }
}

/// Row buffer state of the bank an access goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowOutcome {
    /// The row is already open.
    Hit,
    /// No row is open.
    Closed,
    /// Another row is open and must be precharged.
    Conflict,
}

/// One DRAM bank under an open-page policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct Bank {
    open_row: Option<u64>,
    busy_until: u64,
}

impl Bank {
    /// Returns true if the bank can take a command at `cycle`.
    #[inline]
    pub const fn is_ready(&self, cycle: u64) -> bool {
        self.busy_until <= cycle
    }

    /// Returns true if a row is open.
    #[inline]
    pub const fn has_open_row(&self) -> bool {
        self.open_row.is_some()
    }

    /// Row buffer state for an access to `row`.
    pub fn outcome(&self, row: u64) -> RowOutcome {
        match self.open_row {
            Some(open) if open == row => RowOutcome::Hit,
            Some(_) => RowOutcome::Conflict,
            None => RowOutcome::Closed,
        }
    }

    /// Cycles from issue until the data burst ends.
    ///
    /// # Arguments
    ///
    /// * `outcome` - Row buffer state for the access.
    /// * `is_write` - Writes use the column-write delay instead of CAS.
    /// * `t` - Timing parameters.
    pub const fn latency(outcome: RowOutcome, is_write: bool, t: &Timing) -> u64 {
        let column = if is_write { t.t_cwd } else { t.t_cas };
        let row = match outcome {
            RowOutcome::Hit => 0,
            RowOutcome::Closed => t.t_rcd,
            RowOutcome::Conflict => t.t_rp + t.t_rcd,
        };
        row + column + t.t_data_trans
    }

    /// Opens `row` and keeps the bank busy until `done`.
    pub fn occupy(&mut self, row: u64, done: u64) {
        self.open_row = Some(row);
        self.busy_until = done;
    }
}
