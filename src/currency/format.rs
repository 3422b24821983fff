use rust_decimal::Decimal;

/// Locale-dependent number rendering: grouping of the integer part, and the
/// decimal mark.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberFormat {
    pub group_separator: char,
    pub decimal_separator: char,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            group_separator: ',',
            decimal_separator: '.',
        }
    }
}

impl NumberFormat {
    /// Render a value exactly, without trailing zeros: `24350` -> `24,350`.
    pub fn format(&self, value: Decimal) -> String {
        self.render(&value.normalize().to_string())
    }

    // Takes the plain `Decimal` rendering ("-1234.5") and localizes it.
    fn render(&self, plain: &str) -> String {
        let (sign, digits) = match plain.strip_prefix('-') {
            Some(rest) => ("-", rest),
            None => ("", plain),
        };
        let (integer, fraction) = match digits.split_once('.') {
            Some((integer, fraction)) => (integer, Some(fraction)),
            None => (digits, None),
        };

        let mut out = String::with_capacity(plain.len() + integer.len() / 3);
        out.push_str(sign);
        for (i, digit) in integer.chars().enumerate() {
            if i > 0 && (integer.len() - i) % 3 == 0 {
                out.push(self.group_separator);
            }
            out.push(digit);
        }
        if let Some(fraction) = fraction {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }

        out
    }
}
