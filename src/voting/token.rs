use std::collections::HashSet;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};

use crate::error::TokenError;

/// Random bytes behind each token; 16 bytes encode to 22 url-safe characters.
pub const DEFAULT_TOKEN_BYTES: usize = 16;

/// Draws allowed per new token before giving up.
pub const MAX_ATTEMPTS_PER_TOKEN: u32 = 1_000;

/// Extends `existing` with `count` new url-safe tokens drawn from the OS RNG.
///
/// The returned list starts with `existing` unchanged, followed by the new
/// tokens. Every new token differs from all tokens before it.
pub fn generate_tokens(
    count: usize,
    existing: Vec<String>,
    nbytes: usize,
) -> Result<Vec<String>, TokenError> {
    generate_tokens_with(&mut OsRng, count, existing, nbytes)
}

pub fn generate_tokens_with<R>(
    rng: &mut R,
    count: usize,
    existing: Vec<String>,
    nbytes: usize,
) -> Result<Vec<String>, TokenError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    if nbytes == 0 {
        return Err(TokenError::NoEntropy);
    }

    let mut seen: HashSet<String> = existing.iter().cloned().collect();
    let mut tokens = existing;
    tokens.reserve(count);

    let mut buf = vec![0u8; nbytes];
    for _ in 0..count {
        let token = draw_unique(rng, &mut buf, &seen)?;
        seen.insert(token.clone());
        tokens.push(token);
    }

    Ok(tokens)
}

fn draw_unique<R>(rng: &mut R, buf: &mut [u8], seen: &HashSet<String>) -> Result<String, TokenError>
where
    R: RngCore + CryptoRng + ?Sized,
{
    for _ in 0..MAX_ATTEMPTS_PER_TOKEN {
        rng.fill_bytes(buf);
        let candidate = URL_SAFE_NO_PAD.encode(&*buf);
        if !seen.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(TokenError::Exhausted {
        attempts: MAX_ATTEMPTS_PER_TOKEN,
    })
}
