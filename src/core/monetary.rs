//! Monetary schedule
//!
//! Bitcoin-shaped but scaled for an educational chain: the subsidy is one
//! hundredth of the denomination and halves every 210 000 blocks using
//! integer division on the block's own zero-based height.

/// Smallest units in one coin
pub const DENOMINATION: u64 = 100_000_000;

/// Reward minted by the coinbase of block 0
pub const SUBSIDY: u64 = DENOMINATION / 100;

/// Blocks between reward reductions
pub const HALVING_INTERVAL: u64 = 210_000;

/// Reward for the block at the given zero-based height.
pub fn block_reward(height: u64) -> u64 {
    SUBSIDY / (1 + height / HALVING_INTERVAL)
}

/// Total value minted by all blocks below `height`.
pub fn circulating_supply(height: u64) -> u64 {
    (0..height).map(block_reward).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_reward() {
        assert_eq!(block_reward(0), 1_000_000);
    }

    #[test]
    fn test_reward_reduction_schedule() {
        assert_eq!(block_reward(HALVING_INTERVAL - 1), SUBSIDY);
        assert_eq!(block_reward(HALVING_INTERVAL), SUBSIDY / 2);
        assert_eq!(block_reward(2 * HALVING_INTERVAL), SUBSIDY / 3);
    }

    #[test]
    fn test_supply_accumulates_rewards() {
        assert_eq!(circulating_supply(0), 0);
        assert_eq!(circulating_supply(1), block_reward(0));
        assert_eq!(circulating_supply(3), 3 * SUBSIDY);
    }
}
