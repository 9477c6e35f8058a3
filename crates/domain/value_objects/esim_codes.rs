use anyhow::{Result, bail};
use rand::Rng;

pub const ESIM_CODE_PREFIX: &str = "ESIM";
const ESIM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SEGMENTS: usize = 3;
const SEGMENT_LEN: usize = 4;
/// Collisions are retried this many times before giving up.
pub const MAX_ESIM_CODE_ATTEMPTS: usize = 5;

/// `ESIM-XXXX-XXXX-XXXX` with `X` in `[A-Z0-9]`. Uniqueness is checked against
/// the orders table by the caller.
pub fn generate_esim_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    let mut code = String::with_capacity(ESIM_CODE_PREFIX.len() + SEGMENTS * (SEGMENT_LEN + 1));
    code.push_str(ESIM_CODE_PREFIX);
    for _ in 0..SEGMENTS {
        code.push('-');
        for _ in 0..SEGMENT_LEN {
            let idx = rng.gen_range(0..ESIM_CODE_ALPHABET.len());
            code.push(ESIM_CODE_ALPHABET[idx] as char);
        }
    }
    code
}

pub fn is_valid_esim_code(code: &str) -> bool {
    let mut parts = code.split('-');
    if parts.next() != Some(ESIM_CODE_PREFIX) {
        return false;
    }

    let mut segments = 0;
    for part in parts {
        segments += 1;
        if part.len() != SEGMENT_LEN
            || !part
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
        {
            return false;
        }
    }
    segments == SEGMENTS
}

/// LPA activation payload: `LPA:1$<host>$<code>$$<package name>`.
pub fn lpa_payload(provider_host: &str, esim_code: &str, package_name: &str) -> Result<String> {
    if provider_host.trim().is_empty() {
        bail!("eSIM provider host is empty");
    }
    if !is_valid_esim_code(esim_code) {
        bail!("Invalid eSIM code: {esim_code}");
    }
    Ok(format!("LPA:1${provider_host}${esim_code}$${package_name}"))
}
