pub mod mention;
pub mod news;
pub mod quarterly;

use serenity::all::{CommandDataOptionValue, CommandInteraction};

pub(crate) fn get_str_opt<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| match o.value {
            CommandDataOptionValue::String(ref s) => Some(s.as_str()),
            _ => None,
        })
}

pub(crate) fn get_int_opt(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| match o.value {
            CommandDataOptionValue::Integer(i) => Some(i),
            _ => None,
        })
}

/// Trim and upper-case a user-supplied ticker; `None` if nothing is left.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let ticker = raw.trim().to_ascii_uppercase();
    (!ticker.is_empty()).then_some(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_ticker() {
        assert_eq!(normalize_ticker(" aapl "), Some("AAPL".to_string()));
        assert_eq!(normalize_ticker("BRK.B"), Some("BRK.B".to_string()));
        assert_eq!(normalize_ticker("   "), None);
    }
}
