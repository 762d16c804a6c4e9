use std::sync::OnceLock;

use regex::Regex;

fn mention_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"tg:@?([A-Za-z0-9_]+)").ok()).as_ref()
}

fn mention_with_spacing() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\s*tg:\S+").ok()).as_ref()
}

/// Extracts the Telegram username from a CRM driver field such as
/// `Иван Петров tg:@ivan_p`.
pub fn driver_username(driver_field: &str) -> Option<String> {
    let captures = mention_pattern()?.captures(driver_field)?;
    captures.get(1).map(|matched| matched.as_str().to_owned())
}

/// Driver field as shown to clients, with the Telegram mention removed.
pub fn driver_display_name(driver_field: &str) -> String {
    match mention_with_spacing() {
        Some(pattern) => pattern.replace_all(driver_field, "").trim().to_owned(),
        None => driver_field.trim().to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::{driver_display_name, driver_username};

    #[test]
    fn username_is_extracted_with_or_without_at_sign() {
        assert_eq!(driver_username("Иван Петров tg:@ivan_p").as_deref(), Some("ivan_p"));
        assert_eq!(driver_username("Пётр tg:petr77").as_deref(), Some("petr77"));
        assert_eq!(driver_username("Без телеграма"), None);
    }

    #[test]
    fn display_name_drops_mention() {
        assert_eq!(driver_display_name("Иван Петров tg:@ivan_p"), "Иван Петров");
        assert_eq!(driver_display_name("Иван tg:@ivan, +7999"), "Иван +7999");
    }
}
