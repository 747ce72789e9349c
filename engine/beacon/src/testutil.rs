// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use poies_policy::VdfConfig;

/// 127-bit semiprime test modulus; real policies use a much larger
/// group.
pub(crate) const TEST_MODULUS_HEX: &str = "780000000000a8e7a00000002808ca5f";

pub(crate) fn test_config() -> VdfConfig {
    VdfConfig {
        modulus: hex::decode(TEST_MODULUS_HEX).unwrap(),
        challenge_bits: 128,
        t_min: 1,
        t_max: 1 << 20,
    }
}
