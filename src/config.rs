//! Compile-time configuration for the benchmark
//!
//! The constants here describe the kernel objects the port must create
//! before starting the two benchmark tasks, and the defaults for [`Config`].

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Number of rounds each primitive is measured for.
///
/// Defaults to 10000. Set `BENCH_ROUND_NUM` in the build environment to
/// override it. More rounds give a steadier average but take longer.
pub const ROUND_NUM: u32 = match option_env!("BENCH_ROUND_NUM") {
    Some(value) => parse_u32(value),
    None => 10_000,
};

/// How many counter wraps the idle loop counts between two overflow reports
pub const OVERFLOW_NUM: u32 = 10_000;

/// Maximum count of the counting semaphore under test
pub const SEM_CNT_MAX: u32 = 100;

/// Capacity, in messages, of the message queue under test
pub const QUEUE_LENGTH: usize = 100;

/// Size of one message queue item, in bytes
pub const QUEUE_ITEM_SIZE: usize = core::mem::size_of::<u32>();

/// Size of the allocator's pool, in 32-bit words
pub const TEST_MEM_POOL: usize = 4096;

/// Stack size of each benchmark task, in 32-bit words
pub const TASK_STACK_SIZE: usize = 256;

/// Name given to the sender task
pub const SENDER_NAME: &str = "Func1";

/// Name given to the receiver task
pub const RECEIVER_NAME: &str = "Func2";

/// Priority the sender task is created with.
///
/// It must start above the receiver so it gets to print the header first.
pub const SENDER_INITIAL_PRIORITY: u8 = 2;

/// Priority the sender drops to for the whole benchmark
pub const SENDER_PRIORITY: u8 = 1;

/// Priority the receiver task is created with, and keeps for the yield test
pub const RECEIVER_INITIAL_PRIORITY: u8 = 1;

/// Priority the receiver is raised to once the yield test is over, so that
/// every signal preempts the sender immediately.
pub const RECEIVER_PRIORITY: u8 = 2;

/// Run-time view of the benchmark settings
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Config {
    /// Rounds per primitive
    pub rounds: u32,
    /// Allocator pool size in 32-bit words
    pub pool_words: usize,
    /// Return from the receiver once the report is printed, instead of
    /// parking in the overflow monitor.
    pub exit_after_benchmark: bool,
}

impl Config {
    /// The settings given by the compile-time constants
    pub const DEFAULT: Config = Config {
        rounds: ROUND_NUM,
        pool_words: TEST_MEM_POOL,
        exit_after_benchmark: false,
    };

    /// Make the default configuration
    pub const fn new() -> Config {
        Self::DEFAULT
    }

    /// Change the number of rounds per primitive
    pub const fn rounds(mut self, rounds: u32) -> Config {
        assert!(rounds > 0);
        self.rounds = rounds;
        self
    }

    /// Change the allocator pool size, in 32-bit words
    pub const fn pool_words(mut self, pool_words: usize) -> Config {
        // The smallest size classes add fixed offsets of up to 64 words
        assert!(pool_words >= 512);
        self.pool_words = pool_words;
        self
    }

    /// Choose whether the receiver returns when it is done
    pub const fn exit_after_benchmark(mut self, exit: bool) -> Config {
        self.exit_after_benchmark = exit;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

/// Parse a decimal number at compile time
const fn parse_u32(value: &str) -> u32 {
    let bytes = value.as_bytes();
    assert!(!bytes.is_empty(), "BENCH_ROUND_NUM is empty");
    let mut result: u32 = 0;
    let mut idx = 0;
    while idx < bytes.len() {
        let digit = bytes[idx];
        assert!(digit.is_ascii_digit(), "BENCH_ROUND_NUM is not a number");
        result = match result.checked_mul(10) {
            Some(v) => v,
            None => panic!("BENCH_ROUND_NUM is too large"),
        };
        result = match result.checked_add((digit - b'0') as u32) {
            Some(v) => v,
            None => panic!("BENCH_ROUND_NUM is too large"),
        };
        idx += 1;
    }
    assert!(result > 0, "BENCH_ROUND_NUM must be at least 1");
    result
}


// End of File
