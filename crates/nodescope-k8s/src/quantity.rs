//! Kubernetes resource quantity parsing
//!
//! Quantities are decimal numbers with an optional suffix: decimal SI
//! (`n`, `u`, `m`, `k`, `M`, `G`, `T`, `P`, `E`), binary SI (`Ki` .. `Ei`)
//! or a decimal exponent (`1e3`). Conversions round up, as the API server does.

use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

/// A quantity as `mantissa * binary * 10^exponent`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Parsed {
    mantissa: i128,
    exponent: i32,
    binary: i128,
}

impl Parsed {
    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };

        let end = rest
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .unwrap_or(rest.len());
        let (number, suffix) = rest.split_at(end);

        let (int_part, frac_part) = number.split_once('.').unwrap_or((number, ""));
        if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
            return None;
        }

        let mut mantissa: i128 = format!("{int_part}{frac_part}").parse().ok()?;
        if negative {
            mantissa = -mantissa;
        }
        let (decimal, binary) = suffix_scale(suffix)?;

        let exponent = decimal.checked_sub(i32::try_from(frac_part.len()).ok()?)?;

        Some(Self {
            mantissa,
            exponent,
            binary,
        })
    }

    /// Value expressed in units of `10^unit_exponent`, rounded up
    fn scaled(&self, unit_exponent: i32) -> Option<i64> {
        let base = self.mantissa.checked_mul(self.binary)?;
        let shift = self.exponent.checked_sub(unit_exponent)?;

        let value = if shift >= 0 {
            base.checked_mul(10i128.checked_pow(shift as u32)?)?
        } else {
            match 10i128.checked_pow(shift.unsigned_abs()) {
                Some(divisor) if base > 0 => (base + divisor - 1) / divisor,
                Some(divisor) => base / divisor,
                // Smaller than any representable unit
                None => i128::from(base > 0),
            }
        };

        i64::try_from(value).ok()
    }
}

fn suffix_scale(suffix: &str) -> Option<(i32, i128)> {
    let scale = match suffix {
        "" => (0, 1),
        "n" => (-9, 1),
        "u" => (-6, 1),
        "m" => (-3, 1),
        "k" => (3, 1),
        "M" => (6, 1),
        "G" => (9, 1),
        "T" => (12, 1),
        "P" => (15, 1),
        "E" => (18, 1),
        "Ki" => (0, 1 << 10),
        "Mi" => (0, 1 << 20),
        "Gi" => (0, 1 << 30),
        "Ti" => (0, 1 << 40),
        "Pi" => (0, 1 << 50),
        "Ei" => (0, 1 << 60),
        _ => {
            let exponent = suffix.strip_prefix(['e', 'E'])?;
            (exponent.parse().ok()?, 1)
        }
    };
    Some(scale)
}

/// CPU quantity in millicores
pub fn cpu_millis(quantity: &Quantity) -> Option<i64> {
    Parsed::parse(&quantity.0)?.scaled(-3)
}

/// Memory quantity in bytes
pub fn memory_bytes(quantity: &Quantity) -> Option<i64> {
    Parsed::parse(&quantity.0)?.scaled(0)
}
