use std::str::FromStr;

use serde::Serialize;

/// Lowest block a genesis start scans from
pub const GENESIS_BLOCK: u64 = 1;

/// Where a filter without a cursor starts scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartBlock {
    /// Replays from block 1. Deterministic, used for tests and backfills.
    Genesis,
    /// Starts at the current head, ignoring history
    #[default]
    Head,
}

impl FromStr for StartBlock {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "genesis" => Ok(StartBlock::Genesis),
            "head" => Ok(StartBlock::Head),
            other => Err(format!("Unknown start block `{other}`, expected head or genesis")),
        }
    }
}

/// Inclusive block range scanned in one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// `None` when the filter has caught up with `head`
    pub fn compute(
        last_processed_block: Option<u64>,
        head: u64,
        max_block_range: u64,
        start_block: StartBlock,
    ) -> Option<Self> {
        let from = match (last_processed_block, start_block) {
            (Some(last_processed_block), _) => last_processed_block.saturating_add(1),
            (None, StartBlock::Genesis) => GENESIS_BLOCK,
            (None, StartBlock::Head) => head,
        };
        let to = head.min(from.saturating_add(max_block_range.max(1) - 1));

        (from <= to).then_some(Self { from, to })
    }

    pub fn block_count(&self) -> u64 {
        self.to - self.from + 1
    }
}
