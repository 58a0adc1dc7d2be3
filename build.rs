//! Build script for rtbench

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Entry point to the build script
fn main() {
    arm_targets::process();
    // `config::ROUND_NUM` reads this with `option_env!`
    println!("cargo::rerun-if-env-changed=BENCH_ROUND_NUM");
}

// End of File
