use rust_decimal::Decimal;
use serde::Serialize;

use crate::errors::TallyError;

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), TallyError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn money(amount: Decimal) -> String {
    format!("{amount:.2}")
}

pub fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_pads_to_cents() {
        assert_eq!(money(Decimal::new(455, 1)), "45.50");
        assert_eq!(money(Decimal::from(3)), "3.00");
    }

    #[test]
    fn missing_values_render_as_dash() {
        assert_eq!(or_dash(None::<u32>), "-");
        assert_eq!(or_dash(Some(7)), "7");
    }
}
