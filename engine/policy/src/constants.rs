// Copyright 2019-2022 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Default policy parameters. Networks override these through the
//! policy document; the defaults describe the devnet profile.

use lazy_static::lazy_static;

use poies_shared::math::MuNat;

pub const POLICY_VERSION: u32 = 1;

/// Global cap Γ on `Σψ_eff` per candidate block: 4 nats.
pub const GLOBAL_CAP: MuNat = 4_000_000;

/// Per-proof caps `C_p` in tag order (hash, ai, quantum, storage, vdf).
pub const PER_PROOF_CAP: [MuNat; 5] = [2_000_000, 4_000_000, 4_000_000, 2_000_000, 2_000_000];

/// Per-type caps `C_t` in tag order.
pub const PER_TYPE_CAP: [MuNat; 5] = [4_000_000, 8_000_000, 8_000_000, 6_000_000, 4_000_000];

/// Neutral per-type weights.
pub const WEIGHT_PPM: u64 = 1_000_000;

/// Trap-failure penalty slope for AI and quantum proofs: a traps ratio
/// of 0.5 zeroes the proof.
pub const TRAPS_PENALTY_PPM: u64 = 2_000_000;

// --- Θ retargeting ---

/// Initial acceptance threshold: 6 nats.
pub const THETA_INITIAL: MuNat = 6_000_000;
/// Threshold floor; must stay above Γ + margin.
pub const THETA_MIN: MuNat = 5_000_000;
pub const THETA_MAX: MuNat = 12_000_000;
/// Safety margin between Γ and the threshold floor.
pub const THETA_MARGIN: MuNat = 500_000;
/// Target inter-block interval.
pub const TARGET_INTERVAL_MS: u64 = 12_000;
/// EMA smoothing factor λ for observed intervals.
pub const EMA_LAMBDA_PPM: u64 = 200_000;
/// Retarget gain η applied to `ln(ema/Δ*)`.
pub const THETA_GAIN_PPM: u64 = 250_000;
/// Per-epoch bound on |ΔΘ|: 0.25 nats.
pub const THETA_STEP_MAX: MuNat = 250_000;

// --- α-tuner ---

pub const ALPHA_INITIAL_PPM: u64 = 1_000_000;
pub const ALPHA_MIN_PPM: u64 = 500_000;
pub const ALPHA_MAX_PPM: u64 = 2_000_000;
pub const ALPHA_STEP_PPM: u64 = 50_000;
pub const ALPHA_WINDOW_BLOCKS: u64 = 128;
/// Target per-type shares τ in tag order; sums to one.
pub const ALPHA_TARGET_PPM: [u64; 5] = [300_000, 250_000, 150_000, 200_000, 100_000];

// --- escort / diversity ---

/// Smooth-mode boost slopes b[t] in tag order.
pub const ESCORT_BOOST_PPM: [u64; 5] = [0, 250_000, 250_000, 0, 0];
pub const ESCORT_BOOST_MAX_PPM: u64 = 500_000;
/// Reference escort levels; zero means the kind is not a reference.
pub const ESCORT_REFERENCE: [MuNat; 5] = [0, 0, 0, 500_000, 250_000];

// --- beacon / VDF ---

pub const BEACON_GENESIS_HEIGHT: u64 = 0;
pub const BEACON_COMMIT_WINDOW: u64 = 32;
pub const BEACON_REVEAL_WINDOW: u64 = 32;
/// Consumers read round `r - lag`; one round behind prevents last-block
/// grinding.
pub const BEACON_LAG: u64 = 1;
pub const BEACON_MAX_REVEALS: u32 = 512;
pub const BEACON_MAX_ADDR_BYTES: u32 = 64;

pub const VDF_CHALLENGE_BITS: u32 = 128;
pub const VDF_T_MIN: u64 = 1;
pub const VDF_T_MAX: u64 = 1 << 34;

/// Devnet RSA modulus (1024-bit). Production networks replace this at
/// genesis; the choice flows through the policy root.
pub const DEVNET_MODULUS_HEX: &str = concat!(
    "b3db32988d3336e93b2fa94bd006cff29b72e61d3708078f3ff6e1cd1d5de3e4",
    "ba451d5b32af34f62d11d6df3cbea2e2c1aaf03cdb11bc3ada9b6780435b4522",
    "b913cf12df4e88c40a6d9e9487c4a1a5622cb29c664fc921f3a7e85103744f00",
    "37585a373fb6e3fbad601b667fc6747a4ac1d87338bbce152208e549a4d7f145",
);

lazy_static! {
    pub static ref DEVNET_MODULUS: Vec<u8> =
        hex::decode(DEVNET_MODULUS_HEX).expect("devnet modulus hex is valid");
}

// --- nullifier TTLs ---

/// Proof nullifier TTLs in blocks, tag order.
pub const NULLIFIER_TTL_BLOCKS: [u64; 5] = [2_048, 2_048, 2_048, 2_048, 2_048];
/// TTL for beacon reveal nullifiers.
pub const REVEAL_TTL_BLOCKS: u64 = 512;

// --- epochs / budgets ---

/// Retarget boundary: every this many canonical blocks.
pub const EPOCH_BLOCKS: u64 = 120;

/// Per-kind (max_body_bytes, max_verify_ms) budgets, tag order.
pub const PROOF_BUDGETS: [(u32, u32); 5] = [
    (64, 1),
    (131_072, 50),
    (65_536, 50),
    (4_096, 10),
    (4_096, 20),
];
