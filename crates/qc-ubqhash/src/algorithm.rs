//! Ubqhash memory-hard hashing
//!
//! Ethash-style construction: a per-epoch verification cache is derived from
//! the epoch seed, every 64-byte dataset item is an FNV mix of 256 pseudo
//! random cache rows, and hashimoto walks 64 random 128-byte dataset pages to
//! produce the mix digest and the final result. From the UIP-1 epoch on the
//! cache is built with SHA3-512 instead of legacy Keccak-512.

use crate::dump::Endian;
use rayon::prelude::*;
use sha3::{Digest, Keccak256, Keccak512, Sha3_512};
use std::time::Instant;
use tracing::{debug, info};

/// Blocks per epoch
pub const EPOCH_LENGTH: u64 = 30_000;
/// Epochs with precomputed sizes in other implementations; futures stop here
pub const MAX_EPOCH: u64 = 2048;

const CACHE_INIT_BYTES: u64 = 1 << 24;
const CACHE_GROWTH_BYTES: u64 = 1 << 17;
const DATASET_INIT_BYTES: u64 = 1 << 30;
const DATASET_GROWTH_BYTES: u64 = 1 << 23;

/// Bytes per cache row and dataset item
pub const HASH_BYTES: usize = 64;
/// 32-bit words per cache row and dataset item
pub const HASH_WORDS: usize = HASH_BYTES / 4;
/// Bytes per hashimoto mix page
pub const MIX_BYTES: usize = 128;
const MIX_WORDS: usize = MIX_BYTES / 4;
const DATASET_PARENTS: u32 = 256;
const CACHE_ROUNDS: usize = 3;
const LOOP_ACCESSES: usize = 64;
const FNV_PRIME: u32 = 0x0100_0193;

/// Cache size used in test mode
pub const TEST_CACHE_SIZE: u64 = 1024;
/// Dataset size used in test mode
pub const TEST_DATASET_SIZE: u64 = 32 * 1024;

/// Random access to the 32-bit words of a cache or dataset
pub trait WordSource {
    /// Word at `index`
    fn word(&self, index: usize) -> u32;
    /// Number of words available
    fn word_count(&self) -> usize;
}

impl WordSource for [u32] {
    fn word(&self, index: usize) -> u32 {
        self[index]
    }

    fn word_count(&self) -> usize {
        self.len()
    }
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3u64;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

fn largest_prime_size(mut size: u64, unit: u64) -> u64 {
    while !is_prime(size / unit) {
        size -= 2 * unit;
    }
    size
}

/// Verification cache size in bytes for `epoch`
pub fn cache_size(epoch: u64) -> u64 {
    let unit = HASH_BYTES as u64;
    largest_prime_size(CACHE_INIT_BYTES + CACHE_GROWTH_BYTES * epoch - unit, unit)
}

/// Mining dataset size in bytes for `epoch`
pub fn dataset_size(epoch: u64) -> u64 {
    let unit = MIX_BYTES as u64;
    largest_prime_size(DATASET_INIT_BYTES + DATASET_GROWTH_BYTES * epoch - unit, unit)
}

pub(crate) fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(data));
    out
}

fn keccak512(data: &[u8]) -> [u8; HASH_BYTES] {
    let mut out = [0u8; HASH_BYTES];
    out.copy_from_slice(&Keccak512::digest(data));
    out
}

pub(crate) fn next_seed(seed: &[u8; 32]) -> [u8; 32] {
    keccak256(seed)
}

/// Seed of `epoch`: Keccak-256 applied `epoch` times to 32 zero bytes
pub fn seed_hash(epoch: u64) -> [u8; 32] {
    (0..epoch).fold([0u8; 32], |seed, _| next_seed(&seed))
}

fn fnv(a: u32, b: u32) -> u32 {
    a.wrapping_mul(FNV_PRIME) ^ b
}

fn fnv_hash(mix: &mut [u32], data: &[u32]) {
    for (m, d) in mix.iter_mut().zip(data) {
        *m = fnv(*m, *d);
    }
}

fn le_word(bytes: &[u8], index: usize) -> u32 {
    Endian::Little.read_u32(&bytes[index * 4..])
}

/// Fill `dest` with the verification cache of `epoch`, words in `endian` order.
#[tracing::instrument(skip(dest, seed), fields(bytes = dest.len()))]
pub fn generate_cache(dest: &mut [u8], epoch: u64, special_fork_epoch: u64, seed: &[u8; 32], endian: Endian) {
    let start = Instant::now();
    if epoch >= special_fork_epoch {
        fill_cache::<Sha3_512>(dest, seed);
    } else {
        fill_cache::<Keccak512>(dest, seed);
    }
    endian.convert_le_words(dest);
    debug!(elapsed = ?start.elapsed(), "Generated ubqhash verification cache");
}

fn hash_into<D: Digest>(out: &mut [u8], data: &[u8]) {
    out[..HASH_BYTES].copy_from_slice(&D::digest(data));
}

/// Sequential hash chain followed by RandMemoHash rounds, little-endian words
fn fill_cache<D: Digest>(cache: &mut [u8], seed: &[u8]) {
    let size = cache.len();
    let rows = size / HASH_BYTES;
    if rows == 0 {
        return;
    }

    hash_into::<D>(&mut cache[..HASH_BYTES], seed);
    for offset in (HASH_BYTES..rows * HASH_BYTES).step_by(HASH_BYTES) {
        let (prev, rest) = cache.split_at_mut(offset);
        hash_into::<D>(rest, &prev[offset - HASH_BYTES..]);
    }

    let mut temp = [0u8; HASH_BYTES];
    for _ in 0..CACHE_ROUNDS {
        for row in 0..rows {
            let src = ((row + rows - 1) % rows) * HASH_BYTES;
            let dst = row * HASH_BYTES;
            let xor = (le_word(cache, row * HASH_WORDS) as usize % rows) * HASH_BYTES;
            for (k, byte) in temp.iter_mut().enumerate() {
                *byte = cache[src + k] ^ cache[xor + k];
            }
            hash_into::<D>(&mut cache[dst..dst + HASH_BYTES], &temp);
        }
    }
}

/// Verification cache of `size` bytes as native words
pub fn cache_words(size: u64, epoch: u64, special_fork_epoch: u64, seed: &[u8; 32]) -> Vec<u32> {
    let mut bytes = vec![0u8; size as usize];
    generate_cache(&mut bytes, epoch, special_fork_epoch, seed, Endian::Little);
    bytes.chunks_exact(4).map(|w| Endian::Little.read_u32(w)).collect()
}

/// Dataset item `index`, computed from the cache
fn dataset_item<W: WordSource + ?Sized>(cache: &W, index: u32) -> [u8; HASH_BYTES] {
    let rows = (cache.word_count() / HASH_WORDS) as u32;
    let base = (index % rows) as usize * HASH_WORDS;

    let mut mix = [0u8; HASH_BYTES];
    for (i, chunk) in mix.chunks_exact_mut(4).enumerate() {
        let mut word = cache.word(base + i);
        if i == 0 {
            word ^= index;
        }
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    let mix = keccak512(&mix);

    let mut int_mix = [0u32; HASH_WORDS];
    for (i, word) in int_mix.iter_mut().enumerate() {
        *word = le_word(&mix, i);
    }

    let mut parent_words = [0u32; HASH_WORDS];
    for i in 0..DATASET_PARENTS {
        let parent = (fnv(index ^ i, int_mix[i as usize % HASH_WORDS]) % rows) as usize;
        for (k, word) in parent_words.iter_mut().enumerate() {
            *word = cache.word(parent * HASH_WORDS + k);
        }
        fnv_hash(&mut int_mix, &parent_words);
    }

    let mut out = [0u8; HASH_BYTES];
    for (chunk, word) in out.chunks_exact_mut(4).zip(int_mix) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
    keccak512(&out)
}

/// Fill `dest` with the mining dataset expanded from `cache`, in parallel.
#[tracing::instrument(skip(dest, cache), fields(bytes = dest.len()))]
pub fn generate_dataset<W>(dest: &mut [u8], epoch: u64, cache: &W, endian: Endian)
where
    W: WordSource + Sync + ?Sized,
{
    let start = Instant::now();
    dest.par_chunks_mut(HASH_BYTES)
        .enumerate()
        .for_each(|(index, chunk)| {
            let item = dataset_item(cache, index as u32);
            let len = chunk.len();
            chunk.copy_from_slice(&item[..len]);
            endian.convert_le_words(chunk);
        });
    info!(elapsed = ?start.elapsed(), "Generated ubqhash mining dataset");
}

fn hashimoto<F>(hash: &[u8; 32], nonce: u64, size: u64, lookup: F) -> ([u8; 32], [u8; 32])
where
    F: Fn(u32) -> [u32; HASH_WORDS],
{
    let rows = (size / MIX_BYTES as u64) as u32;

    let mut seed_input = [0u8; 40];
    seed_input[..32].copy_from_slice(hash);
    seed_input[32..].copy_from_slice(&nonce.to_le_bytes());
    let seed = keccak512(&seed_input);
    let seed_head = le_word(&seed, 0);

    let mut mix = [0u32; MIX_WORDS];
    for (i, word) in mix.iter_mut().enumerate() {
        *word = le_word(&seed, i % HASH_WORDS);
    }

    let mut page = [0u32; MIX_WORDS];
    for i in 0..LOOP_ACCESSES {
        let parent = fnv(i as u32 ^ seed_head, mix[i % MIX_WORDS]) % rows;
        for (j, half) in page.chunks_exact_mut(HASH_WORDS).enumerate() {
            half.copy_from_slice(&lookup(2 * parent + j as u32));
        }
        fnv_hash(&mut mix, &page);
    }

    let mut digest = [0u8; 32];
    for (chunk, lanes) in digest.chunks_exact_mut(4).zip(mix.chunks_exact(4)) {
        let folded = fnv(fnv(fnv(lanes[0], lanes[1]), lanes[2]), lanes[3]);
        chunk.copy_from_slice(&folded.to_le_bytes());
    }

    let mut result_input = [0u8; HASH_BYTES + 32];
    result_input[..HASH_BYTES].copy_from_slice(&seed);
    result_input[HASH_BYTES..].copy_from_slice(&digest);
    (digest, keccak256(&result_input))
}

/// Hashimoto over a dataset of `size` bytes computed on the fly from `cache`.
///
/// Returns `(mix_digest, result)`.
pub fn hashimoto_light<W: WordSource + ?Sized>(
    size: u64,
    cache: &W,
    hash: &[u8; 32],
    nonce: u64,
) -> ([u8; 32], [u8; 32]) {
    hashimoto(hash, nonce, size, |index| {
        let item = dataset_item(cache, index);
        std::array::from_fn(|k| le_word(&item, k))
    })
}

/// Hashimoto over a fully generated dataset. Returns `(mix_digest, result)`.
pub fn hashimoto_full<W: WordSource + ?Sized>(
    dataset: &W,
    hash: &[u8; 32],
    nonce: u64,
) -> ([u8; 32], [u8; 32]) {
    let size = dataset.word_count() as u64 * 4;
    hashimoto(hash, nonce, size, |index| {
        let base = index as usize * HASH_WORDS;
        std::array::from_fn(|k| dataset.word(base + k))
    })
}
