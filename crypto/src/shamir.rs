//! Shamir threshold secret sharing over GF(2^8).
//!
//! A secret blob is split byte-wise: for each byte a random polynomial of
//! degree `threshold - 1` is sampled with the secret byte as constant
//! term, and each share holds the polynomial's value at a distinct
//! non-zero point. Any `threshold` shares reconstruct the secret via
//! Lagrange interpolation at zero; fewer reveal nothing, because every
//! proper subset is consistent with every possible constant term.
//!
//! Share wire format: `[x, y_0, y_1, ..]`, the evaluation point followed
//! by one byte per secret byte.

use rand::{CryptoRng, RngCore};
use thiserror::Error;
use zeroize::Zeroize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShamirError {
    #[error("threshold must be at least 2, got {0}")]
    ThresholdTooSmall(usize),
    #[error("threshold {threshold} exceeds share count {shares}")]
    ThresholdExceedsShares { threshold: usize, shares: usize },
    #[error("cannot split into more than 255 shares, got {0}")]
    TooManyShares(usize),
    #[error("secret must not be empty")]
    EmptySecret,
    #[error("need at least 2 shares to combine, got {0}")]
    NotEnoughShares(usize),
    #[error("shares have inconsistent lengths")]
    LengthMismatch,
    #[error("share is malformed")]
    MalformedShare,
    #[error("duplicate evaluation point {0}")]
    DuplicatePoint(u8),
}

// GF(2^8) with the AES reduction polynomial x^8 + x^4 + x^3 + x + 1.

fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1b;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse via a^(2^8 - 2). Zero has no inverse; callers
/// guarantee non-zero input (evaluation points are distinct and non-zero).
fn gf_inv(a: u8) -> u8 {
    debug_assert_ne!(a, 0);
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u32;
    while exp > 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

fn gf_div(a: u8, b: u8) -> u8 {
    gf_mul(a, gf_inv(b))
}

/// Evaluate a polynomial (coefficients low-to-high) at `x` via Horner.
fn poly_eval(coefficients: &[u8], x: u8) -> u8 {
    let mut y = 0u8;
    for &coefficient in coefficients.iter().rev() {
        y = gf_mul(y, x) ^ coefficient;
    }
    y
}

/// Split `secret` into `shares` shares, any `threshold` of which
/// reconstruct it.
pub fn split_secret<R: RngCore + CryptoRng>(
    secret: &[u8],
    shares: usize,
    threshold: usize,
    rng: &mut R,
) -> Result<Vec<Vec<u8>>, ShamirError> {
    if secret.is_empty() {
        return Err(ShamirError::EmptySecret);
    }
    if threshold < 2 {
        return Err(ShamirError::ThresholdTooSmall(threshold));
    }
    if threshold > shares {
        return Err(ShamirError::ThresholdExceedsShares { threshold, shares });
    }
    if shares > 255 {
        return Err(ShamirError::TooManyShares(shares));
    }

    // One random polynomial per secret byte, constant term = secret byte.
    let mut polynomials = Vec::with_capacity(secret.len());
    for &byte in secret {
        let mut coefficients = vec![0u8; threshold];
        coefficients[0] = byte;
        rng.fill_bytes(&mut coefficients[1..]);
        polynomials.push(coefficients);
    }

    let mut out = Vec::with_capacity(shares);
    for index in 1..=shares as u8 {
        let mut share = Vec::with_capacity(secret.len() + 1);
        share.push(index);
        for coefficients in &polynomials {
            share.push(poly_eval(coefficients, index));
        }
        out.push(share);
    }

    for coefficients in &mut polynomials {
        coefficients.zeroize();
    }
    Ok(out)
}

/// Reconstruct the secret from shares via Lagrange interpolation at zero.
///
/// Deterministic: any subset of `threshold` valid shares yields the exact
/// original blob regardless of which subset or its order.
pub fn combine_secret(shares: &[Vec<u8>]) -> Result<Vec<u8>, ShamirError> {
    if shares.len() < 2 {
        return Err(ShamirError::NotEnoughShares(shares.len()));
    }
    let length = shares[0].len();
    if length < 2 {
        return Err(ShamirError::MalformedShare);
    }
    let mut points = Vec::with_capacity(shares.len());
    for share in shares {
        if share.len() != length {
            return Err(ShamirError::LengthMismatch);
        }
        let x = share[0];
        if x == 0 {
            return Err(ShamirError::MalformedShare);
        }
        if points.contains(&x) {
            return Err(ShamirError::DuplicatePoint(x));
        }
        points.push(x);
    }

    let mut secret = Vec::with_capacity(length - 1);
    for byte_index in 1..length {
        let mut value = 0u8;
        for (i, share_i) in shares.iter().enumerate() {
            let x_i = share_i[0];
            let y_i = share_i[byte_index];
            // Lagrange basis at x = 0: Π_{j≠i} x_j / (x_j ⊕ x_i)
            let mut basis = 1u8;
            for (j, share_j) in shares.iter().enumerate() {
                if i == j {
                    continue;
                }
                let x_j = share_j[0];
                basis = gf_mul(basis, gf_div(x_j, x_j ^ x_i));
            }
            value ^= gf_mul(y_i, basis);
        }
        secret.push(value);
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn gf_mul_known_values() {
        // 0x53 * 0xca = 0x01 in the AES field
        assert_eq!(gf_mul(0x53, 0xca), 0x01);
        assert_eq!(gf_mul(0, 0x42), 0);
        assert_eq!(gf_mul(1, 0x42), 0x42);
    }

    #[test]
    fn gf_inv_roundtrip() {
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "inverse failed for {a}");
        }
    }

    #[test]
    fn split_and_combine_all_shares() {
        let secret = b"the private key material";
        let shares = split_secret(secret, 5, 3, &mut OsRng).unwrap();
        assert_eq!(shares.len(), 5);
        let recovered = combine_secret(&shares).unwrap();
        assert_eq!(recovered, secret);
    }

    #[test]
    fn any_threshold_subset_reconstructs() {
        let secret = b"drift";
        let shares = split_secret(secret, 5, 3, &mut OsRng).unwrap();

        for a in 0..5 {
            for b in (a + 1)..5 {
                for c in (b + 1)..5 {
                    let subset = vec![shares[a].clone(), shares[b].clone(), shares[c].clone()];
                    assert_eq!(combine_secret(&subset).unwrap(), secret);
                }
            }
        }
    }

    #[test]
    fn below_threshold_does_not_reconstruct() {
        let secret = b"super secret wallet key";
        let shares = split_secret(secret, 5, 3, &mut OsRng).unwrap();

        // Interpolating from t-1 shares yields a polynomial of the wrong
        // degree; the result should essentially never match the secret.
        let subset = vec![shares[0].clone(), shares[1].clone()];
        let wrong = combine_secret(&subset).unwrap();
        assert_ne!(wrong, secret);
    }

    #[test]
    fn validation_errors() {
        let mut rng = OsRng;
        assert_eq!(
            split_secret(b"", 5, 3, &mut rng).unwrap_err(),
            ShamirError::EmptySecret
        );
        assert_eq!(
            split_secret(b"x", 5, 1, &mut rng).unwrap_err(),
            ShamirError::ThresholdTooSmall(1)
        );
        assert_eq!(
            split_secret(b"x", 2, 3, &mut rng).unwrap_err(),
            ShamirError::ThresholdExceedsShares {
                threshold: 3,
                shares: 2
            }
        );
        assert_eq!(
            split_secret(b"x", 300, 3, &mut rng).unwrap_err(),
            ShamirError::TooManyShares(300)
        );
    }

    #[test]
    fn duplicate_share_rejected() {
        let shares = split_secret(b"abc", 3, 2, &mut OsRng).unwrap();
        let dup = vec![shares[0].clone(), shares[0].clone()];
        assert_eq!(
            combine_secret(&dup).unwrap_err(),
            ShamirError::DuplicatePoint(shares[0][0])
        );
    }

    #[test]
    fn share_order_does_not_matter() {
        let secret = b"order independent";
        let shares = split_secret(secret, 4, 2, &mut OsRng).unwrap();
        let forward = combine_secret(&[shares[1].clone(), shares[3].clone()]).unwrap();
        let reversed = combine_secret(&[shares[3].clone(), shares[1].clone()]).unwrap();
        assert_eq!(forward, secret);
        assert_eq!(reversed, secret);
    }
}
