// Copyright 2025 dentsusoken
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Staleness policy for blocks.
//!
//! A block is expired once `now - updated_at >= interval`. The boundary is
//! inclusive, and a block stamped in the future (clock skew) is never expired.
//! Expiry is derived on every evaluation; nothing is ever swept from storage.

use crate::block::Block;
use crate::clock::Clock;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_BLOCK_INTERVAL_SECS: u64 = 30;

#[derive(Clone)]
pub struct ExpiredValidator {
    interval: TimeDelta,
    clock: Arc<dyn Clock>,
}

impl ExpiredValidator {
    /// `interval_secs` is expected to be positive; configuration rejects zero.
    pub fn new(interval_secs: u64, clock: Arc<dyn Clock>) -> Self {
        let seconds = i64::try_from(interval_secs).unwrap_or(i64::MAX);
        let interval = TimeDelta::try_seconds(seconds).unwrap_or(TimeDelta::MAX);
        Self { interval, clock }
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn is_expired(&self, block: &Block) -> bool {
        self.is_expired_at(block, self.clock.now())
    }

    pub fn is_expired_at(&self, block: &Block, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(block.updated_at()) >= self.interval
    }

    /// Instant at which `block` stops being active, if representable.
    pub fn expires_at(&self, block: &Block) -> Option<DateTime<Utc>> {
        block.updated_at().checked_add_signed(self.interval)
    }
}

impl fmt::Debug for ExpiredValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiredValidator")
            .field("interval_secs", &self.interval.num_seconds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 20, 8, 30, 0).unwrap()
    }

    fn block_updated_ago(seconds: i64) -> Block {
        let updated = now() - TimeDelta::seconds(seconds);
        Block::with_timestamps("page-1", "editor", updated, updated).unwrap()
    }

    fn validator(interval_secs: u64) -> ExpiredValidator {
        ExpiredValidator::new(interval_secs, Arc::new(FixedClock::new(now())))
    }

    #[test]
    fn block_last_updated_thirty_seconds_ago() {
        let block = block_updated_ago(30);
        assert!(validator(20).is_expired(&block));
        assert!(validator(30).is_expired(&block));
        assert!(!validator(60).is_expired(&block));
    }

    #[test]
    fn block_last_updated_one_minute_ago() {
        let block = block_updated_ago(60);
        assert!(validator(30).is_expired(&block));
        assert!(validator(60).is_expired(&block));
        assert!(!validator(90).is_expired(&block));
    }

    #[test]
    fn block_last_updated_one_hour_ago() {
        let block = block_updated_ago(3600);
        assert!(validator(1800).is_expired(&block));
        assert!(validator(3600).is_expired(&block));
        assert!(!validator(5400).is_expired(&block));
    }

    #[test]
    fn expiry_matches_elapsed_time_for_every_interval() {
        for interval in 1..=120u64 {
            let validator = validator(interval);
            for elapsed in -5..=125i64 {
                let expected = elapsed >= interval as i64;
                assert_eq!(
                    validator.is_expired(&block_updated_ago(elapsed)),
                    expected,
                    "interval {interval}, elapsed {elapsed}"
                );
            }
        }
    }

    #[test]
    fn future_block_is_never_expired() {
        let block = block_updated_ago(-3600);
        assert!(!validator(1).is_expired(&block));
    }

    #[test]
    fn follows_injected_clock() {
        let clock = Arc::new(FixedClock::new(now()));
        let validator = ExpiredValidator::new(30, clock.clone());
        let block = block_updated_ago(0);

        assert!(!validator.is_expired(&block));
        clock.advance(TimeDelta::seconds(29));
        assert!(!validator.is_expired(&block));
        clock.advance(TimeDelta::seconds(1));
        assert!(validator.is_expired(&block));
    }

    #[test]
    fn expires_at_adds_interval() {
        let block = block_updated_ago(10);
        assert_eq!(
            validator(30).expires_at(&block),
            Some(now() + TimeDelta::seconds(20))
        );
    }
}
