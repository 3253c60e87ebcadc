use crate::{currency::CurrencyId, error::InstrumentError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::Neg;

/// An exact-decimal amount scoped to a single [`CurrencyId`].
///
/// Arithmetic across two [`Money`] values is only defined when both operands share a currency;
/// mixed-currency addition/subtraction returns [`InstrumentError::CurrencyMismatch`] rather than
/// silently coercing. Scalar multiplication never needs a currency check.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub struct Money {
    pub amount: Decimal,
    pub currency: CurrencyId,
}

impl Money {
    pub fn new(amount: Decimal, currency: CurrencyId) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: CurrencyId) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn checked_add(&self, rhs: &Money) -> Result<Money, InstrumentError> {
        self.require_same_currency(rhs)?;
        Ok(Money::new(self.amount + rhs.amount, self.currency.clone()))
    }

    pub fn checked_sub(&self, rhs: &Money) -> Result<Money, InstrumentError> {
        self.require_same_currency(rhs)?;
        Ok(Money::new(self.amount - rhs.amount, self.currency.clone()))
    }

    pub fn scale(&self, factor: Decimal) -> Money {
        Money::new(self.amount * factor, self.currency.clone())
    }

    fn require_same_currency(&self, rhs: &Money) -> Result<(), InstrumentError> {
        if self.currency == rhs.currency {
            Ok(())
        } else {
            Err(InstrumentError::CurrencyMismatch {
                lhs: self.currency.0.to_string(),
                rhs: rhs.currency.0.to_string(),
            })
        }
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Self::Output {
        Money::new(-self.amount, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn usd(amount: Decimal) -> Money {
        Money::new(amount, CurrencyId::new("USD"))
    }

    fn eur(amount: Decimal) -> Money {
        Money::new(amount, CurrencyId::new("EUR"))
    }

    #[test]
    fn same_currency_add_and_sub() {
        let a = usd(dec!(10.50));
        let b = usd(dec!(4.25));

        assert_eq!(a.checked_add(&b).unwrap().amount, dec!(14.75));
        assert_eq!(a.checked_sub(&b).unwrap().amount, dec!(6.25));
    }

    #[test]
    fn mixed_currency_arithmetic_fails() {
        let a = usd(dec!(10));
        let b = eur(dec!(10));

        assert!(matches!(
            a.checked_add(&b),
            Err(InstrumentError::CurrencyMismatch { .. })
        ));
    }

    #[test]
    fn scale_never_fails() {
        let a = usd(dec!(10));
        assert_eq!(a.scale(dec!(3)).amount, dec!(30));
    }
}
