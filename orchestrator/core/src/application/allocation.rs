// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Volume Allocation
//!
//! Static allocation table: the usable share of the node disk is split by
//! tier divider and rounded down to whole volume chunks.
//!
//! | Tier | Divider |
//! |------|---------|
//! | large | 1 |
//! | medium | 8 |
//! | test, test4 | 8 |
//! | small | 128 |

use crate::domain::schain::SchainTier;

pub const LARGE_DIVIDER: u64 = 1;
pub const MEDIUM_DIVIDER: u64 = 8;
pub const TEST_DIVIDER: u64 = 8;
pub const SMALL_DIVIDER: u64 = 128;

/// Volumes are sized in multiples of this many bytes.
pub const VOLUME_CHUNK: u64 = 512 * SMALL_DIVIDER;

/// Share of the disk left to volumes, `1 - 1/(MEDIUM_DIVIDER + 1)`, in
/// thousandths and floored.
const DISK_FACTOR_PERMILLE: u64 = 888;

pub fn divider(tier: SchainTier) -> u64 {
    match tier {
        SchainTier::Large => LARGE_DIVIDER,
        SchainTier::Medium => MEDIUM_DIVIDER,
        SchainTier::Test | SchainTier::Test4 => TEST_DIVIDER,
        SchainTier::Small => SMALL_DIVIDER,
    }
}

pub fn free_disk_space(disk_size: u64) -> u64 {
    let usable = (disk_size as u128 * DISK_FACTOR_PERMILLE as u128 / 1000) as u64;
    usable / VOLUME_CHUNK * VOLUME_CHUNK
}

/// Data volume size for a workload of `tier` on a node with `disk_size` bytes.
pub fn volume_size(tier: SchainTier, disk_size: u64) -> u64 {
    free_disk_space(disk_size) / divider(tier) / VOLUME_CHUNK * VOLUME_CHUNK
}
