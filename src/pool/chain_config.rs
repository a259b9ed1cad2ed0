/// Block at which mainnet activated EIP-155 replay protection.
pub const MAINNET_EIP155_BLOCK: u64 = 2_675_000;

/// Chain id plus the fork parameters that decide how transactions are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// First block signed with EIP-155 domain separation
    pub eip155_block: u64,
}

impl ChainConfig {
    /// Fork schedule for a chain id: mainnet keeps its historical EIP-155
    /// activation, every other chain has it from genesis.
    pub fn for_chain_id(chain_id: u64) -> Self {
        let eip155_block = if chain_id == 1 { MAINNET_EIP155_BLOCK } else { 0 };
        Self {
            chain_id,
            eip155_block,
        }
    }

    pub fn is_eip155(&self, block_number: u64) -> bool {
        block_number >= self.eip155_block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_schedule() {
        let cfg = ChainConfig::for_chain_id(1);
        assert!(!cfg.is_eip155(MAINNET_EIP155_BLOCK - 1));
        assert!(cfg.is_eip155(MAINNET_EIP155_BLOCK));
    }

    #[test]
    fn test_other_chains_from_genesis() {
        let cfg = ChainConfig::for_chain_id(31337);
        assert_eq!(cfg.eip155_block, 0);
        assert!(cfg.is_eip155(0));
    }
}
