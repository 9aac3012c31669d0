//! BCH error-correction over GF(2^13), parameterised by strength *t*.
//!
//! The i.MX BCH engine is configured with primitive polynomial `0x201B`
//! (the degree-13 row of the standard table) and a bit-reversed bit
//! ordering convention. A [`BchDecoder`] is built once and its per-`t`
//! generator polynomials are cached for the run, matching how the
//! hardware keeps a single engine instance configured per ECC strength.

use std::cell::RefCell;
use std::collections::HashMap;

/// Galois-field degree used by the i.MX BCH engine.
const GF_M: u32 = 13;
/// Primitive polynomial for GF(2^13) (low `m` bits; the `x^m` term is
/// implicit), matching the original tool's `bchlib.BCH(8219, ...)` call
/// (8219 decimal == 0x201B).
const GF_PRIM_POLY: u32 = 0x201B;

/// Outcome of a single BCH decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BchOutcome {
    /// Zero bit errors detected.
    Clean,
    /// `k` bit errors detected and repaired.
    Corrected(u32),
    /// Too many bit errors to correct; data is returned unchanged.
    Uncorrectable,
    /// The decoder could not run at all (bad parameters); data is
    /// returned unchanged.
    Fatal,
}

/// Log/antilog tables for GF(2^13) under [`GF_PRIM_POLY`].
struct GaloisField {
    n: usize, // 2^m - 1
    exp: Vec<u16>,
    log: Vec<i32>,
}

impl GaloisField {
    fn new(m: u32, poly: u32) -> Self {
        let n = (1usize << m) - 1;
        let mut exp = vec![0u16; n + 1];
        let mut log = vec![-1i32; n + 1];

        let mut x: u32 = 1;
        for i in 0..n {
            exp[i] = x as u16;
            log[x as usize] = i as i32;
            x <<= 1;
            if x & (1 << m) != 0 {
                x ^= poly;
            }
        }
        exp[n] = exp[0];

        Self { n, exp, log }
    }

    #[inline]
    fn alpha(&self, i: usize) -> u16 {
        self.exp[i % self.n]
    }

    #[inline]
    fn mul(&self, a: u16, b: u16) -> u16 {
        if a == 0 || b == 0 {
            return 0;
        }
        let la = self.log[a as usize] as usize;
        let lb = self.log[b as usize] as usize;
        self.exp[(la + lb) % self.n]
    }

    #[inline]
    fn div(&self, a: u16, b: u16) -> u16 {
        if a == 0 {
            return 0;
        }
        let la = self.log[a as usize] as usize;
        let lb = self.log[b as usize] as usize;
        self.exp[(la + self.n - lb) % self.n]
    }
}

/// Multiplies two polynomials with coefficients in GF(2^13) (ascending
/// order, index == degree).
fn poly_mul_gf(a: &[u16], b: &[u16], gf: &GaloisField) -> Vec<u16> {
    let mut out = vec![0u16; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            out[i + j] ^= gf.mul(ai, bj);
        }
    }
    out
}

/// Multiplies two binary (GF(2)) polynomials, coefficients 0/1, ascending order.
fn poly_mul_gf2(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; a.len() + b.len() - 1];
    for (i, &ai) in a.iter().enumerate() {
        if ai == 0 {
            continue;
        }
        for (j, &bj) in b.iter().enumerate() {
            if bj != 0 {
                out[i + j] ^= 1;
            }
        }
    }
    out
}

/// Minimal polynomial of `alpha^root_exp` over GF(2), built from its
/// cyclotomic coset. The product of `(x + alpha^j)` over a full coset
/// always has coefficients in GF(2) (0 or 1).
fn minimal_poly(gf: &GaloisField, root_exp: usize) -> Vec<u8> {
    let n = gf.n;
    let mut coset = Vec::new();
    let mut j = root_exp % n;
    loop {
        if coset.contains(&j) {
            break;
        }
        coset.push(j);
        j = (j * 2) % n;
    }

    let mut poly = vec![1u16];
    for &e in &coset {
        let alpha_e = gf.alpha(e);
        poly = poly_mul_gf(&poly, &[alpha_e, 1u16], gf);
    }

    poly.iter().map(|&c| if c == 0 { 0 } else { 1 }).collect()
}

/// Generator polynomial g(x) for a `t`-error-correcting binary BCH code:
/// the product of the distinct minimal polynomials of `alpha^1..alpha^2t`.
/// Returned ascending-order, ready to use in GF(2) long division.
fn compute_generator(gf: &GaloisField, t: usize) -> Vec<u8> {
    let n = gf.n;
    let mut visited = vec![false; n];
    let mut g: Vec<u8> = vec![1];

    for i in 1..=(2 * t) {
        let root = i % n;
        if visited[root] {
            continue;
        }
        let mp = minimal_poly(gf, root);

        let mut j = root;
        loop {
            visited[j] = true;
            j = (j * 2) % n;
            if j == root {
                break;
            }
        }

        g = poly_mul_gf2(&g, &mp);
    }

    g
}

struct Generator {
    /// Ascending-order binary coefficients, degree == `bits.len() - 1`.
    bits: Vec<u8>,
    /// Generator degree == number of ECC bits the code actually uses.
    r: usize,
}

/// Picks bit `pos` of the logical codeword, where positions `0..r` come
/// from `ecc` (the parity, low-degree part) and positions `r..` come
/// from `data` (the message, shifted up by `r`). This mirrors standard
/// systematic BCH framing: `codeword(x) = message(x)*x^r + parity(x)`.
fn bit_at(data: &[u8], ecc: &[u8], r: usize, pos: usize) -> u8 {
    if pos < r {
        (ecc[pos / 8] >> (pos % 8)) & 1
    } else {
        let p = pos - r;
        (data[p / 8] >> (p % 8)) & 1
    }
}

/// Berlekamp-Massey: derives the error-locator polynomial from syndromes.
fn berlekamp_massey(gf: &GaloisField, s: &[u16]) -> Vec<u16> {
    let n = s.len();
    let mut c = vec![0u16; n + 1];
    let mut b = vec![0u16; n + 1];
    c[0] = 1;
    b[0] = 1;
    let mut l = 0usize;
    let mut m = 1usize;
    let mut last_discrepancy = 1u16;

    for round in 0..n {
        let mut d = s[round];
        for i in 1..=l {
            d ^= gf.mul(c[i], s[round - i]);
        }

        if d == 0 {
            m += 1;
        } else if 2 * l <= round {
            let prev_c = c.clone();
            let coef = gf.div(d, last_discrepancy);
            for i in 0..(n + 1 - m) {
                c[i + m] ^= gf.mul(coef, b[i]);
            }
            l = round + 1 - l;
            b = prev_c;
            last_discrepancy = d;
            m = 1;
        } else {
            let coef = gf.div(d, last_discrepancy);
            for i in 0..(n + 1 - m) {
                c[i + m] ^= gf.mul(coef, b[i]);
            }
            m += 1;
        }
    }

    c.truncate(l + 1);
    c
}

/// Chien search: finds roots of `sigma` among `alpha^-0 .. alpha^-(total_bits-1)`,
/// returning the bit positions (in the `bit_at` convention) where errors lie.
fn chien_search(gf: &GaloisField, sigma: &[u16], total_bits: usize) -> Vec<usize> {
    let mut positions = Vec::new();
    for i in 0..total_bits {
        let inv_exp = (gf.n - (i % gf.n)) % gf.n;
        let alpha_inv = gf.alpha(inv_exp);
        let mut acc = 0u16;
        let mut power = 1u16;
        for &coef in sigma {
            acc ^= gf.mul(coef, power);
            power = gf.mul(power, alpha_inv);
        }
        if acc == 0 {
            positions.push(i);
        }
    }
    positions
}

/// A BCH decoder scoped to one GF(2^13) field, with per-`t` generator
/// polynomials computed lazily and cached for the decoder's lifetime.
pub struct BchDecoder {
    gf: GaloisField,
    generators: RefCell<HashMap<usize, std::rc::Rc<Generator>>>,
}

impl BchDecoder {
    pub fn new() -> Self {
        Self { gf: GaloisField::new(GF_M, GF_PRIM_POLY), generators: RefCell::new(HashMap::new()) }
    }

    fn generator_for(&self, t: usize) -> std::rc::Rc<Generator> {
        if let Some(g) = self.generators.borrow().get(&t) {
            return g.clone();
        }
        let bits = compute_generator(&self.gf, t);
        let r = bits.len() - 1;
        let gen = std::rc::Rc::new(Generator { bits, r });
        self.generators.borrow_mut().insert(t, gen.clone());
        gen
    }

    /// Attempts to correct `data` (the block) using `ecc` (its parity
    /// bytes) for a code correcting up to `t` bit errors. `ecc` must hold
    /// at least `ceil(generator_degree(t) / 8)` bytes; any extra bytes
    /// (padding to a whole byte) are ignored.
    pub fn decode(&self, data: &[u8], ecc: &[u8], t: usize) -> (BchOutcome, Vec<u8>) {
        if t == 0 || ecc.is_empty() || data.is_empty() {
            return (BchOutcome::Fatal, data.to_vec());
        }

        let gen = self.generator_for(t);
        if ecc.len() * 8 < gen.r {
            return (BchOutcome::Fatal, data.to_vec());
        }

        let total_bits = gen.r + data.len() * 8;
        let mut syndromes = vec![0u16; 2 * t];
        for (i, syn) in syndromes.iter_mut().enumerate() {
            let alpha = self.gf.alpha(i + 1);
            let mut acc = 0u16;
            let mut power = 1u16;
            for pos in 0..total_bits {
                if bit_at(data, ecc, gen.r, pos) != 0 {
                    acc ^= power;
                }
                power = self.gf.mul(power, alpha);
            }
            *syn = acc;
        }

        if syndromes.iter().all(|&s| s == 0) {
            return (BchOutcome::Clean, data.to_vec());
        }

        let sigma = berlekamp_massey(&self.gf, &syndromes);
        let nerr = sigma.len() - 1;
        if nerr == 0 || nerr > t {
            return (BchOutcome::Uncorrectable, data.to_vec());
        }

        let positions = chien_search(&self.gf, &sigma, total_bits);
        if positions.len() != nerr {
            return (BchOutcome::Uncorrectable, data.to_vec());
        }

        let mut corrected = data.to_vec();
        for &pos in &positions {
            if pos >= gen.r {
                let p = pos - gen.r;
                corrected[p / 8] ^= 1 << (p % 8);
            }
        }
        (BchOutcome::Corrected(positions.len() as u32), corrected)
    }

    /// Encodes `data` into its BCH parity bytes for strength `t`. Used by
    /// tests to produce known-good codewords; the production pipeline
    /// never encodes (the i.MX hardware already wrote the ECC).
    #[cfg(test)]
    fn encode(&self, data: &[u8], t: usize) -> Vec<u8> {
        let gen = self.generator_for(t);
        let r = gen.r;
        let k = data.len() * 8;

        let mut buf = vec![0u8; r + k];
        for i in 0..k {
            buf[r + i] = (data[i / 8] >> (i % 8)) & 1;
        }

        for pos in (r..r + k).rev() {
            if buf[pos] != 0 {
                for (gi, &gc) in gen.bits.iter().enumerate() {
                    if gc != 0 {
                        buf[pos - r + gi] ^= 1;
                    }
                }
            }
        }

        let ecc_len = (r + 7) / 8;
        let mut ecc = vec![0u8; ecc_len];
        for (i, &b) in buf[0..r].iter().enumerate() {
            if b != 0 {
                ecc[i / 8] |= 1 << (i % 8);
            }
        }
        ecc
    }
}

impl Default for BchDecoder {
    fn default() -> Self {
        Self::new()
    }
}
