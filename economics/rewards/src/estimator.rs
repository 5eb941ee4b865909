use crate::types::*;

/// Convert micro-units to whole units, rounding down.
pub fn whole_units(micro: u64) -> u64 {
    micro / UNIT_SCALE
}

/// Estimate how many rounds remain until the reward pool pays out.
///
/// Formula: ceil((total_money_whole - residue - rate) / rate)
///
/// The subtraction may go negative once the residue has crossed the payout
/// threshold, so the arithmetic is done in `i128` and clamped back into `i64`.
/// Returns `None` when `rate` is zero.
pub fn rounds_until_payout(total_money_whole: u64, rate: u64, residue: u64) -> Option<i64> {
    if rate == 0 {
        return None;
    }

    let numerator = total_money_whole as i128 - residue as i128 - rate as i128;
    let rounds = div_ceil_signed(numerator, rate as i128);

    Some(i64::try_from(rounds).unwrap_or(if rounds < 0 { i64::MIN } else { i64::MAX }))
}

/// Ceiling division for a signed numerator and a positive divisor.
fn div_ceil_signed(numerator: i128, divisor: i128) -> i128 {
    let quotient = numerator / divisor;
    if numerator % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

/// Derive the round-level reward parameters. Independent of any account.
pub fn estimate_round(round: u64, total_money: u64, rate: u64, residue: u64) -> RoundInfo {
    RoundInfo {
        round,
        reward_rate: rate,
        reward_residue: residue,
        total_money,
        estimated_rounds_until_payout: rounds_until_payout(whole_units(total_money), rate, residue),
    }
}

/// Derive the account-level reward metrics.
///
/// `account` is `None` when the address failed validation and nothing was
/// fetched; the result is then the zero record tagged with the raw address.
/// A non-participating account is an error and yields no partial record.
pub fn estimate_account(
    address: &str,
    account: Option<&AccountSnapshot>,
    total_money: u64,
    rate: u64,
    residue: u64,
) -> Result<AccountInfo, RewardsError> {
    let Some(account) = account else {
        return Ok(AccountInfo::empty(address));
    };

    if !account.status.is_eligible() {
        return Err(RewardsError::NotParticipating {
            address: address.to_string(),
        });
    }

    let next_reward_amount = whole_units(account.balance_without_rewards);
    let total_money_whole = whole_units(total_money);

    // Proportional share of this round's pool increment.
    let pending_rewards = if total_money_whole == 0 {
        0.0
    } else {
        next_reward_amount as f64 * (residue as f64 + rate as f64) / total_money_whole as f64
    };

    Ok(AccountInfo {
        address: address.to_string(),
        balance_without_rewards: account.balance_without_rewards,
        // The node's "pending" counter is what has already been earned.
        earned_rewards: account.pending_rewards_field,
        pending_rewards,
        next_reward_amount,
    })
}

/// The full per-round estimate. The account half may fail on its own; the
/// round half is always available.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardEstimate {
    pub round: RoundInfo,
    pub account: Result<AccountInfo, RewardsError>,
}

/// Compute both records for one round from the fetched snapshots.
pub fn estimate(
    round: u64,
    total_money: u64,
    rate: u64,
    residue: u64,
    address: &str,
    account: Option<&AccountSnapshot>,
) -> RewardEstimate {
    let round_info = estimate_round(round, total_money, rate, residue);
    let account_info = estimate_account(address, account, total_money, rate, residue);

    if let Err(e) = &account_info {
        tracing::debug!(round, error = %e, "account estimate unavailable");
    }

    RewardEstimate {
        round: round_info,
        account: account_info,
    }
}
