// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Strong types shared across the cache.
//!
//! - Configuration values ([`MaxRequestLen`](config::MaxRequestLen))

pub mod config;

// Note: Public types are re-exported from lib.rs, not here
