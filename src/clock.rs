//! # Expiration Clock
//!
//! Pure rotation-boundary arithmetic over a wallet's genesis time and fixed
//! rotation interval. All timestamps are whole Unix seconds; sub-second
//! precision is dropped at the system boundary (`now_unix`).

use crate::error::{WalletError, WalletResult};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as whole Unix seconds
pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Compute the next rotation boundary at or after `now`.
///
/// `elapsed = now - genesis`, `k = ceil(elapsed / interval)`, result is
/// `genesis + k * interval`. At `now == genesis` the result is `genesis`
/// itself (`k = 0`); exactly on a later boundary the result is that
/// boundary, which makes the function idempotent:
/// `next_boundary(g, i, next_boundary(g, i, now)) == next_boundary(g, i, now)`.
pub fn next_boundary(genesis: u64, interval: u64, now: u64) -> WalletResult<u64> {
    if interval == 0 {
        return Err(WalletError::clock(
            "rotation interval must be a positive number of seconds",
        ));
    }
    if now < genesis {
        return Err(WalletError::clock(format!(
            "now ({}) precedes genesis ({})",
            now, genesis
        )));
    }
    let elapsed = now - genesis;
    let k = elapsed.div_ceil(interval);
    Ok(genesis + k * interval)
}

/// Rotation counter for the boundary at or after `now`. Counter `i`
/// corresponds to the schedule leaf expiring at `genesis + i * interval`.
pub fn rotation_counter(genesis: u64, interval: u64, now: u64) -> WalletResult<u64> {
    let boundary = next_boundary(genesis, interval, now)?;
    Ok((boundary - genesis) / interval)
}
