// src/common/money.rs

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Valor monetário em centavos (unidade menor), sem ponto flutuante.
///
/// O servidor troca preços como floats em unidades maiores; a conversão passa
/// por `Decimal` e arredonda metade para longe do zero, uma única vez.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Unidades inteiras (euros), útil em testes e seeds.
    pub const fn from_units(units: i64) -> Self {
        Money(units * 100)
    }

    pub fn from_decimal(value: Decimal) -> Self {
        let cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) * Decimal::ONE_HUNDRED;
        Money(cents.to_i64().unwrap_or_default())
    }

    /// Converte um float vindo do backend. NaN e infinitos viram zero.
    pub fn from_major(value: f64) -> Self {
        if !value.is_finite() {
            return Money::ZERO;
        }
        Decimal::from_f64(value).map(Money::from_decimal).unwrap_or_default()
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn to_major(self) -> f64 {
        self.to_decimal().to_f64().unwrap_or_default()
    }

    pub fn times(self, quantity: u32) -> Self {
        Money(self.0.saturating_mul(i64::from(quantity)))
    }

    pub fn clamp_non_negative(self) -> Self {
        Money(self.0.max(0))
    }

    /// Valor com imposto: `ht × (1 + taxa/100)`, arredondado ao centavo.
    pub fn with_vat_percent(self, rate_percent: Decimal) -> Self {
        let factor = Decimal::ONE + rate_percent / Decimal::ONE_HUNDRED;
        Money::from_decimal(self.to_decimal() * factor)
    }

    /// Média arredondada ao centavo; zero quando `count == 0`.
    pub fn average(total: Money, count: usize) -> Self {
        if count == 0 {
            return Money::ZERO;
        }
        Money::from_decimal(total.to_decimal() / Decimal::from(count))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn converts_server_floats_with_half_away_rounding() {
        assert_eq!(Money::from_major(49.99).cents(), 4999);
        assert_eq!(Money::from_major(10.125).cents(), 1013);
        assert_eq!(Money::from_major(-1.125).cents(), -113);
        assert_eq!(Money::from_major(f64::NAN), Money::ZERO);
        assert!((Money::from_cents(1234).to_major() - 12.34).abs() < 1e-9);
    }

    #[test]
    fn vat_is_applied_on_cents_and_rounded_once() {
        // 19.99 HT a 20% = 23.988 -> 23.99
        let ttc = Money::from_cents(1999).with_vat_percent(Decimal::from(20));
        assert_eq!(ttc.cents(), 2399);
    }

    #[test]
    fn average_of_nothing_is_zero() {
        assert_eq!(Money::average(Money::from_units(10), 0), Money::ZERO);
        assert_eq!(Money::average(Money::from_cents(100), 3).cents(), 33);
    }
}
