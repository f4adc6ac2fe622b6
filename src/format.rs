use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How the aggregate total is rendered into the summary block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyFormat {
    /// Fixed number of decimal places (rounded half away from zero, then padded).
    pub decimals: u32,

    /// Prefix placed after any minus sign, e.g. `$`.
    pub symbol: String,

    /// Insert `,` thousands separators in the integer part.
    pub grouping: bool,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            decimals: 2,
            symbol: "$".to_string(),
            grouping: false,
        }
    }
}

impl CurrencyFormat {
    /// Round `value` to the configured precision.
    pub fn round(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.decimals, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn format(&self, value: Decimal) -> String {
        let rounded = self.round(value);
        let negative = rounded.is_sign_negative() && !rounded.is_zero();

        let mut digits = pad_fraction_to_dp(&rounded.abs().normalize().to_string(), self.decimals);
        if self.grouping {
            digits = group_number_string(&digits);
        }

        let mut out = String::with_capacity(digits.len() + self.symbol.len() + 1);
        if negative {
            out.push('-');
        }
        out.push_str(&self.symbol);
        out.push_str(&digits);
        out
    }
}

fn pad_fraction_to_dp(s: &str, dp: u32) -> String {
    let (int_part, frac_part) = s.split_once('.').unwrap_or((s, ""));
    if dp == 0 {
        return int_part.to_string();
    }

    let mut frac: String = frac_part.chars().take(dp as usize).collect();
    while frac.len() < dp as usize {
        frac.push('0');
    }
    format!("{int_part}.{frac}")
}

fn group_number_string(s: &str) -> String {
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s, None),
    };

    let len = int_part.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, ch) in int_part.chars().enumerate() {
        grouped.push(ch);
        let remaining = len - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            grouped.push(',');
        }
    }

    match frac_part {
        Some(f) => format!("{grouped}.{f}"),
        None => grouped,
    }
}
