//! One-way passphrase hashing.
//!
//! The construction first stretches the input strings with a deterministic
//! character shuffle, then runs an iterated SHA-256 chain in which periodic
//! "walls" fold the full raw input back into the state. The shuffle adds no
//! cryptographic strength; it exists so previously derived hashes stay
//! reproducible bit for bit.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const STATIC_SALT: &str = "{[Me Some SALT! X?~BxVzzJ14Ry]}";
const MINIMUM_ITERATIONS: u32 = 10_007;
const NUM_WALLS: u32 = 101;
const WALL_THICKNESS: u32 = 7;

/// Size of a `hash256` digest
pub const HASH256_SIZE: usize = 32;

/// Size of a `hash512` digest
pub const HASH512_SIZE: usize = 64;

/// Generate a 256 bit one-way hash of `secret`.
///
/// At least `max(10007, iterations)` rounds of SHA-256 are applied. Every
/// `iterations / 101` rounds a wall of 7 rounds mixes the raw input back in,
/// alternating the concatenation order by round parity.
pub fn hash256(secret: &str, salt: &str, iterations: u32) -> [u8; HASH256_SIZE] {
    let mut material = Zeroizing::new(derive_longer_string(secret));
    material.extend(STATIC_SALT.encode_utf16());
    material.extend(derive_longer_string(salt));
    let raw_input = Zeroizing::new(utf16_to_utf8(&material));

    let wall_interval = (iterations / NUM_WALLS).max(1);
    let rounds = iterations.max(MINIMUM_ITERATIONS);

    let mut state = Zeroizing::new([0u8; HASH256_SIZE]);
    for i in 0..rounds {
        // The first round hashes the raw input, every later one the state
        let stepped = if i == 0 {
            Sha256::digest(raw_input.as_slice())
        } else {
            Sha256::digest(state.as_slice())
        };
        let next = if i % wall_interval < WALL_THICKNESS {
            let folded = if i % 2 == 0 {
                Sha256::new()
                    .chain_update(stepped)
                    .chain_update(raw_input.as_slice())
                    .finalize()
            } else {
                Sha256::new()
                    .chain_update(raw_input.as_slice())
                    .chain_update(stepped)
                    .finalize()
            };
            Sha256::new()
                .chain_update(stepped)
                .chain_update(folded)
                .finalize()
        } else {
            Sha256::digest(stepped)
        };
        state.copy_from_slice(&next);
    }

    *state
}

/// Generate a 512 bit one-way hash from two independent `hash256` runs.
///
/// The second run hashes the upper-case hex of the first digest, salted with
/// the original secret.
pub fn hash512(secret: &str, salt: &str, iterations: u32) -> [u8; HASH512_SIZE] {
    let first = Zeroizing::new(hash256(secret, salt, iterations.saturating_add(3) / 2));
    let first_hex = Zeroizing::new(hex::encode_upper(*first));
    let second = Zeroizing::new(hash256(
        &first_hex,
        secret,
        iterations.saturating_add(1) / 2,
    ));

    let mut out = [0u8; HASH512_SIZE];
    out[..HASH256_SIZE].copy_from_slice(&first[..]);
    out[HASH256_SIZE..].copy_from_slice(&second[..]);
    out
}

/// raw + mix(lower + upper) + mix(reverse(lower + upper))
fn derive_longer_string(input: &str) -> Vec<u16> {
    let mut cased: Vec<u16> = input.to_lowercase().encode_utf16().collect();
    cased.extend(input.to_uppercase().encode_utf16());

    let mut result: Vec<u16> = input.encode_utf16().collect();
    result.extend(mix(&cased));
    result.extend(mix(&reverse_units(&cased)));
    result
}

fn mix(units: &[u16]) -> Vec<u16> {
    let mut result = units.to_vec();
    for _ in 0..units.len() / 4 {
        result = mix_step(&result);
    }
    result
}

/// One deterministic rearrangement pass, driven by the ordering of the
/// leading three code units.
fn mix_step(units: &[u16]) -> Vec<u16> {
    match units.len() {
        0 | 1 => return units.to_vec(),
        2 => return reverse_units(units),
        _ => {}
    }

    let (first, second, third) = (units[0], units[1], units[2]);
    let rest = mix_step(&units[2..]);
    let mut out = Vec::with_capacity(units.len());

    if first > second && first < third {
        out.extend(rest);
        out.push(second);
        out.push(first);
    } else if first > second && first > third {
        out.push(second);
        out.extend(reverse_units(&rest));
        out.push(first);
    } else if first < second && first > third {
        out.push(first);
        out.extend(rest);
        out.push(second);
    } else if first < second && first < third {
        out.push(first);
        out.extend(reverse_units(&rest));
        out.push(second);
    } else {
        out.push(second);
        out.push(first);
        out.extend(rest);
    }
    out
}

/// Reverse a UTF-16 sequence, keeping well-formed surrogate pairs in order.
fn reverse_units(units: &[u16]) -> Vec<u16> {
    let mut reversed: Vec<u16> = units.iter().rev().copied().collect();
    let mut i = 0;
    while i + 1 < reversed.len() {
        if is_low_surrogate(reversed[i]) && is_high_surrogate(reversed[i + 1]) {
            reversed.swap(i, i + 1);
            i += 2;
        } else {
            i += 1;
        }
    }
    reversed
}

fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

/// UTF-8 encode, replacing any unpaired surrogate with '?'
fn utf16_to_utf8(units: &[u16]) -> Vec<u8> {
    char::decode_utf16(units.iter().copied())
        .map(|c| c.unwrap_or('?'))
        .collect::<String>()
        .into_bytes()
}
