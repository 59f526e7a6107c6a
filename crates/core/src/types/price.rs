//! Price representation in centavos.
//!
//! The payment processor works in the smallest currency unit, so prices are
//! stored as integer centavos and only converted to decimal for display.
//! All catalog prices are BRL.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A BRL price in centavos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(i64);

impl Price {
    /// Create a price from centavos (e.g. `2999` for R$ 29,99).
    #[must_use]
    pub const fn from_centavos(centavos: i64) -> Self {
        Self(centavos)
    }

    /// Amount in centavos, as sent to the payment processor.
    #[must_use]
    pub const fn centavos(&self) -> i64 {
        self.0
    }

    /// Amount as a decimal in reais.
    #[must_use]
    pub fn amount(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Brazilian formatting uses a comma as the decimal separator.
        let reais = self.0 / 100;
        let cents = (self.0 % 100).abs();
        write!(f, "R$ {reais},{cents:02}")
    }
}
