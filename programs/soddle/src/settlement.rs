use anchor_lang::prelude::*;

use crate::{SoddleError, BPS_DENOMINATOR, PLATFORM_FEE_BPS};

/// How a vault balance is divided at distribution time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolSplit {
    pub platform_amount: u64,
    pub reward_amount:   u64,
}

impl PoolSplit {
    pub fn total(&self) -> u64 {
        self.platform_amount.saturating_add(self.reward_amount)
    }
}

/// Platform fee rounds down; the reward side takes the remainder so the two
/// legs always add back up to `pool`.
pub fn split_pool(pool: u64) -> Result<PoolSplit> {
    let platform_amount = (pool as u128)
        .checked_mul(PLATFORM_FEE_BPS as u128)
        .ok_or(SoddleError::NumericOverflow)?
        / BPS_DENOMINATOR as u128;
    let platform_amount = u64::try_from(platform_amount).map_err(|_| SoddleError::NumericOverflow)?;
    let reward_amount = pool
        .checked_sub(platform_amount)
        .ok_or(SoddleError::NumericOverflow)?;

    Ok(PoolSplit { platform_amount, reward_amount })
}

/// Move lamports out of the program-owned vault PDA.
pub fn transfer_from_vault<'info>(
    vault: &AccountInfo<'info>,
    to: &AccountInfo<'info>,
    amount: u64,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }
    let mut vault_lamports = vault.try_borrow_mut_lamports()?;
    **vault_lamports = (**vault_lamports)
        .checked_sub(amount)
        .ok_or(SoddleError::AccountingBroken)?;
    drop(vault_lamports);

    let mut to_lamports = to.try_borrow_mut_lamports()?;
    **to_lamports = (**to_lamports)
        .checked_add(amount)
        .ok_or(SoddleError::NumericOverflow)?;
    Ok(())
}
