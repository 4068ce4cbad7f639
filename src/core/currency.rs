use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// The two currencies the ledger records.
///
/// `Ars` is the floating spot currency, `Usd` the stable reference.
/// Every monetary figure in the system is tagged with one of them,
/// and conversion between the two always goes through an [`ExchangeRate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Currency {
    Ars,
    Usd,
}

impl Currency {
    /// ISO-style three-letter code.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Ars => "ARS",
            Currency::Usd => "USD",
        }
    }

    /// Number of decimal places in the currency's minor unit.
    pub fn minor_unit(&self) -> u32 {
        2
    }

    /// The smallest representable step (one minor unit, e.g. one cent).
    pub fn minor_step(&self) -> Decimal {
        Decimal::new(1, self.minor_unit())
    }

    /// The other currency of the pair.
    pub fn counterpart(&self) -> Currency {
        match self {
            Currency::Ars => Currency::Usd,
            Currency::Usd => Currency::Ars,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors arising from money and exchange-rate operations.
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("exchange rate must be positive, got {rate}")]
    InvalidRate { rate: Decimal },
    #[error("amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },
}

/// A spot exchange rate: how many ARS one USD buys at `as_of`.
///
/// Rates are supplied by an external oracle (or an explicit per-call
/// override) and are immutable once recorded on a ledger entry. A later
/// rate change never retroactively alters historical figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRate {
    rate: Decimal,
    as_of: DateTime<Utc>,
}

impl ExchangeRate {
    /// Create a rate observed at `as_of`. Rejects non-positive rates.
    pub fn new(rate: Decimal, as_of: DateTime<Utc>) -> Result<Self, MoneyError> {
        if rate <= Decimal::ZERO {
            return Err(MoneyError::InvalidRate { rate });
        }
        Ok(Self { rate, as_of })
    }

    /// Create a rate observed right now.
    pub fn now(rate: Decimal) -> Result<Self, MoneyError> {
        Self::new(rate, Utc::now())
    }

    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ARS/USD", self.rate)
    }
}

/// A currency-tagged fixed-precision amount.
///
/// All arithmetic uses [`Decimal`] — never binary floating point — so the
/// allocation engine can guarantee exact reconstruction of totals.
/// Amounts may be negative (the balance ledger records signed entries).
///
/// # Examples
///
/// ```
/// use settlement_ledger::core::currency::{Currency, ExchangeRate, Money};
/// use rust_decimal_macros::dec;
///
/// let rate = ExchangeRate::now(dec!(1000)).unwrap();
/// let expense = Money::new(dec!(90), Currency::Usd);
/// let in_ars = expense.convert(&rate).unwrap();
/// assert_eq!(in_ars.amount(), dec!(90000));
/// assert_eq!(in_ars.currency(), Currency::Ars);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    /// Round to the currency's minor unit using round-half-to-even.
    pub fn round_minor(&self) -> Money {
        Money::new(
            self.amount.round_dp_with_strategy(
                self.currency.minor_unit(),
                RoundingStrategy::MidpointNearestEven,
            ),
            self.currency,
        )
    }

    /// Add two amounts of the same currency.
    pub fn checked_add(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(Money::new(self.amount + other.amount, self.currency))
    }

    /// Subtract an amount of the same currency.
    pub fn checked_sub(&self, other: &Money) -> Result<Money, MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(Money::new(self.amount - other.amount, self.currency))
    }

    /// Negate the amount, keeping the currency tag.
    pub fn negated(&self) -> Money {
        Money::new(-self.amount, self.currency)
    }

    /// Convert to the counterpart currency at the given rate,
    /// rounded to the minor unit.
    pub fn convert(&self, rate: &ExchangeRate) -> Result<Money, MoneyError> {
        let converted = match self.currency {
            Currency::Usd => self.amount * rate.rate(),
            Currency::Ars => self.amount / rate.rate(),
        };
        Ok(Money::new(converted, self.currency.counterpart()).round_minor())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
