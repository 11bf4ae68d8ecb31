// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2025.

//! Makes `memory.x` visible to the `link.x` script of `cortex-m-rt` and
//! rebuilds the board when it changes.

use std::env;
use std::fs;
use std::path::PathBuf;

const MEMORY_SCRIPT: &str = "memory.x";

fn main() {
    let out = PathBuf::from(env::var_os("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let script = fs::read(MEMORY_SCRIPT)
        .unwrap_or_else(|_| panic!("Boards must provide a `{}` file", MEMORY_SCRIPT));
    fs::write(out.join(MEMORY_SCRIPT), script).expect("failed to copy the memory script");

    println!("cargo:rustc-link-search={}", out.display());
    println!("cargo:rerun-if-changed={}", MEMORY_SCRIPT);
    println!("cargo:rerun-if-changed=build.rs");
}
