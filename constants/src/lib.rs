//! Protocol parameter tables.
//!
//! The original C++ source scatters these as process-wide `constexpr`s in
//! `CryptoNoteConfig.h`. Per the design notes we collapse them into a
//! single immutable [`Currency`] value that every component receives by
//! reference, so a Forknote-style fork can override any field at startup
//! (see `--money-supply`, `--upgrade-height-v2`, etc. on the daemon CLI)
//! without touching global state.

pub mod block;
pub mod deposit;
pub mod difficulty;
pub mod genesis;
pub mod mempool;
pub mod money;
pub mod p2p;
pub mod upgrade;

use block::BlockParams;
use deposit::DepositParams;
use difficulty::DifficultyParams;
use money::MoneyParams;
use upgrade::UpgradeParams;

/// The full set of consensus parameters for one network (mainnet, testnet,
/// or a Forknote-style fork with overridden values).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Currency {
    pub money: MoneyParams,
    pub block: BlockParams,
    pub difficulty: DifficultyParams,
    pub upgrade: UpgradeParams,
    pub deposit: DepositParams,
    /// 16 bytes, byte 0 flipped for testnet.
    pub network_id: [u8; 16],
    pub testnet: bool,
}

impl Currency {
    pub fn mainnet() -> Self {
        Self {
            money: MoneyParams::default(),
            block: BlockParams::default(),
            difficulty: DifficultyParams::default(),
            upgrade: UpgradeParams::default(),
            deposit: DepositParams::default(),
            network_id: genesis::MAINNET_NETWORK_ID,
            testnet: false,
        }
    }

    pub fn testnet() -> Self {
        let mut network_id = genesis::MAINNET_NETWORK_ID;
        network_id[0] ^= 0xff;
        Self {
            upgrade: UpgradeParams {
                // Testnets commonly skip checkpoints/voting frictions.
                ..UpgradeParams::default()
            },
            network_id,
            testnet: true,
            ..Self::mainnet()
        }
    }

    /// The difficulty window/cut/target triple in effect at `height`,
    /// selecting between the V1 and V2 parameter sets at the upgrade
    /// boundary (§4.2).
    pub fn difficulty_params_for_major_version(&self, major_version: u8) -> (usize, usize, u64) {
        if major_version >= 2 {
            (
                self.difficulty.window_v2,
                self.difficulty.cut_v2,
                self.difficulty.target_seconds_v2,
            )
        } else {
            (
                self.difficulty.window_v1,
                self.difficulty.cut_v1,
                self.difficulty.target_seconds_v1,
            )
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::mainnet()
    }
}
