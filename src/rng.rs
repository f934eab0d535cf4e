use core::fmt;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Parameters of the recurrence `x_{n+1} = (a * x_n + c) mod m`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LcgParams {
    pub multiplier: u64,
    pub increment: u64,
    pub modulus: u64,
}

impl LcgParams {
    pub fn new(multiplier: u64, increment: u64, modulus: u64) -> Result<Self> {
        let params = LcgParams {
            multiplier,
            increment,
            modulus,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        if self.modulus == 0 {
            return Err(Error::configuration("LCG modulus must be greater than 0"));
        }
        if self.multiplier >= self.modulus {
            return Err(Error::configuration(format!(
                "LCG multiplier {} must be in [0, {})",
                self.multiplier, self.modulus
            )));
        }
        if self.increment >= self.modulus {
            return Err(Error::configuration(format!(
                "LCG increment {} must be in [0, {})",
                self.increment, self.modulus
            )));
        }
        Ok(())
    }

    /// Hull-Dobell theorem: the generator visits every value in `[0, m)`
    /// before repeating iff `c` and `m` are coprime, `a - 1` is divisible by
    /// every prime factor of `m`, and `a - 1` is divisible by 4 when `m` is.
    pub fn has_full_period(&self) -> bool {
        let m = self.modulus;
        if m == 1 {
            return true;
        }
        if gcd(self.increment, m) != 1 {
            return false;
        }
        let a_minus_one = match self.multiplier.checked_sub(1) {
            Some(v) => v,
            None => return false,
        };
        if m % 4 == 0 && a_minus_one % 4 != 0 {
            return false;
        }
        // Strip from m every prime it shares with a - 1; what is left is
        // the product of the primes of m that do not divide a - 1.
        let mut rest = m;
        loop {
            let g = gcd(rest, a_minus_one);
            if g == 1 {
                break;
            }
            while rest % g == 0 {
                rest /= g;
            }
        }
        rest == 1
    }

    #[inline]
    fn mul_mod(&self, x: u64, y: u64) -> u64 {
        ((x as u128 * y as u128) % self.modulus as u128) as u64
    }

    #[inline]
    fn mul_add_mod(&self, x: u64, y: u64, z: u64) -> u64 {
        ((x as u128 * y as u128 + z as u128) % self.modulus as u128) as u64
    }
}

fn gcd(mut x: u64, mut y: u64) -> u64 {
    while y != 0 {
        let r = x % y;
        x = y;
        y = r;
    }
    x
}

/// A linear congruential generator with caller-chosen parameters.
///
/// All arithmetic is exact integer arithmetic carried out in `u128`, so any
/// modulus up to `u64::MAX` works without overflow. The generator is a plain
/// owned value: drawing needs `&mut self`, so one instance can never be
/// advanced from two places at once without the caller serialising access.
#[derive(Clone, PartialEq, Eq)]
pub struct Lcg {
    params: LcgParams,
    state: u64,
}

impl Lcg {
    pub fn new(params: LcgParams, seed: u64) -> Result<Self> {
        params.validate()?;
        let mut lcg = Lcg { params, state: 0 };
        lcg.seed(seed)?;
        debug!(
            "LCG seeded with {} (a={}, c={}, m={})",
            seed, params.multiplier, params.increment, params.modulus
        );
        Ok(lcg)
    }

    /// Resets the state to `x0`. Fails unless `0 <= x0 < m`.
    pub fn seed(&mut self, x0: u64) -> Result<()> {
        if x0 >= self.params.modulus {
            return Err(Error::configuration(format!(
                "LCG seed {} must be in [0, {})",
                x0, self.params.modulus
            )));
        }
        self.state = x0;
        Ok(())
    }

    pub fn params(&self) -> LcgParams {
        self.params
    }

    pub fn modulus(&self) -> u64 {
        self.params.modulus
    }

    pub fn state(&self) -> u64 {
        self.state
    }

    pub fn has_full_period(&self) -> bool {
        self.params.has_full_period()
    }

    /// Advances the state once and returns the new state.
    #[inline]
    pub fn next_value(&mut self) -> u64 {
        self.state = self
            .params
            .mul_add_mod(self.params.multiplier, self.state, self.params.increment);
        self.state
    }

    /// Next value scaled into `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.next_value() as f64 / self.params.modulus as f64
    }

    /// Multi-step advance (jump-ahead).
    ///
    /// The method used here is based on Brown, "Random Number Generation
    /// with Arbitrary Stride," Transactions of the American Nuclear
    /// Society (Nov. 1994). The algorithm is very similar to fast
    /// exponentiation, with every product reduced modulo `m`.
    ///
    /// Using this function is equivalent to calling `next_value()` `delta`
    /// number of times.
    pub fn advance(&mut self, delta: u64) {
        let p = &self.params;
        let mut acc_mult: u64 = 1 % p.modulus;
        let mut acc_plus: u64 = 0;
        let mut cur_mult = p.multiplier;
        let mut cur_plus = p.increment;
        let mut mdelta = delta;

        while mdelta > 0 {
            if (mdelta & 1) != 0 {
                acc_mult = p.mul_mod(acc_mult, cur_mult);
                acc_plus = p.mul_add_mod(acc_plus, cur_mult, cur_plus);
            }
            // (cur_mult + 1) may equal m; reduce through u128 in mul_mod.
            let mult_plus_one = ((cur_mult as u128 + 1) % p.modulus as u128) as u64;
            cur_plus = p.mul_mod(mult_plus_one, cur_plus);
            cur_mult = p.mul_mod(cur_mult, cur_mult);
            mdelta /= 2;
        }
        self.state = p.mul_add_mod(acc_mult, self.state, acc_plus);
    }

    /// The value returned by the `index`-th call to `next_value()` (1-based)
    /// on a generator freshly seeded with `seed`.
    pub fn value_at(params: LcgParams, seed: u64, index: u64) -> Result<u64> {
        let mut lcg = Lcg::new(params, seed)?;
        lcg.advance(index);
        Ok(lcg.state)
    }
}

// The state stays out of debug output so logs never leak a mid-run position.
impl fmt::Debug for Lcg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Lcg {{ a: {}, c: {}, m: {} }}",
            self.params.multiplier, self.params.increment, self.params.modulus
        )
    }
}

impl Iterator for Lcg {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        Some(self.next_value())
    }
}

/// One row of the generated random-number table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LcgRow {
    pub index: u64,
    pub value: u64,
    pub uniform: f64,
}

/// First `count` values of a freshly seeded generator, as table rows.
pub fn sequence(params: LcgParams, seed: u64, count: usize) -> Result<Vec<LcgRow>> {
    let lcg = Lcg::new(params, seed)?;
    let modulus = params.modulus as f64;
    Ok(lcg
        .take(count)
        .enumerate()
        .map(|(i, value)| LcgRow {
            index: i as u64 + 1,
            value,
            uniform: value as f64 / modulus,
        })
        .collect())
}
