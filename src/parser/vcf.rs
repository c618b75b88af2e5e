//! vCard (.vcf) contact extraction.
//!
//! WhatsApp exports include a `.vcf` file for every contact card shared in
//! the chat. Only the display name, phone number and WhatsApp ID matter
//! here; the rest of the vCard is ignored.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Contact details extracted from a shared vCard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Display name, from the `FN:` property.
    pub name: String,
    /// Phone number as written in the card, if any.
    pub phone_number: Option<String>,
    /// WhatsApp account ID (`waid=` parameter on the TEL line), if any.
    pub whatsapp_id: Option<String>,
}

static WAID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"waid=(\d+)").expect("waid pattern must compile"));

/// Parses a single vCard.
///
/// Returns `None` when the card has no `FN:` name, which is the only
/// required field. The phone number is taken from the text after the last
/// colon of a `TEL` line, e.g.
/// `item1.TEL;waid=555191786084:+55 51 9178-6084`.
pub fn parse_vcf(content: &str) -> Option<ContactInfo> {
    let mut name: Option<String> = None;
    let mut phone_number: Option<String> = None;
    let mut whatsapp_id: Option<String> = None;

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("FN:") {
            name = Some(rest.trim().to_string());
        }

        if line.contains("TEL") {
            if let Some(caps) = WAID.captures(line) {
                whatsapp_id = Some(caps[1].to_string());
            }
            if let Some(colon) = line.rfind(':') {
                phone_number = Some(line[colon + 1..].trim().to_string());
            }
        }
    }

    Some(ContactInfo {
        name: name?,
        phone_number,
        whatsapp_id,
    })
}

/// Cosmetic phone formatting. Numbers that already carry separators pass
/// through; bare Brazilian numbers get the conventional grouping.
pub fn format_phone_number(phone: &str) -> String {
    if phone.contains(' ') || phone.contains('-') {
        return phone.to_string();
    }

    if phone.starts_with("+55") && phone.len() >= 13 {
        let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
        if digits.len() == 13 {
            return format!(
                "+{} {} {}-{}",
                &digits[..2],
                &digits[2..4],
                &digits[4..9],
                &digits[9..]
            );
        }
        if digits.len() == 12 {
            return format!(
                "+{} {} {}-{}",
                &digits[..2],
                &digits[2..4],
                &digits[4..8],
                &digits[8..]
            );
        }
    }

    phone.to_string()
}

/// Whether a string is plausibly a phone number once separators are
/// stripped: at least 8 characters, all digits.
pub fn is_phone_number(s: &str) -> bool {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '+' | '(' | ')'))
        .collect();
    cleaned.len() >= 8 && cleaned.chars().all(|c| c.is_ascii_digit())
}

/// WhatsApp IDs are bare phone numbers; prefix `+` for display.
pub fn phone_from_whatsapp_id(waid: &str) -> String {
    if !waid.is_empty() && waid.chars().all(|c| c.is_ascii_digit()) {
        format!("+{waid}")
    } else {
        waid.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = "\
BEGIN:VCARD
VERSION:3.0
N:Fontoura;Claudio;;;
FN:Claudio Fontoura
item1.TEL;waid=555191786084:+55 51 9178-6084
item1.X-ABLabel:Celular
END:VCARD
";

    #[test]
    fn test_parse_full_card() {
        let contact = parse_vcf(CARD).unwrap();
        assert_eq!(contact.name, "Claudio Fontoura");
        assert_eq!(contact.phone_number.as_deref(), Some("+55 51 9178-6084"));
        assert_eq!(contact.whatsapp_id.as_deref(), Some("555191786084"));
    }

    #[test]
    fn test_tel_without_waid() {
        let card = "BEGIN:VCARD\nFN:Ana\nTEL;TYPE=CELL:+55 51 9204-9865\nEND:VCARD";
        let contact = parse_vcf(card).unwrap();
        assert_eq!(contact.phone_number.as_deref(), Some("+55 51 9204-9865"));
        assert!(contact.whatsapp_id.is_none());
    }

    #[test]
    fn test_missing_name_rejected() {
        let card = "BEGIN:VCARD\nTEL:+1 555 0100\nEND:VCARD";
        assert!(parse_vcf(card).is_none());
    }

    #[test]
    fn test_name_only() {
        let contact = parse_vcf("BEGIN:VCARD\nFN:Solo\nEND:VCARD").unwrap();
        assert_eq!(contact.name, "Solo");
        assert!(contact.phone_number.is_none());
    }

    #[test]
    fn test_format_phone_number_brazilian() {
        assert_eq!(format_phone_number("+5551917860842"), "+55 51 91786-0842");
        assert_eq!(format_phone_number("+555191786084"), "+55 51 9178-6084");
        // Already formatted, left alone.
        assert_eq!(format_phone_number("+55 51 9178-6084"), "+55 51 9178-6084");
        // Not Brazilian, left alone.
        assert_eq!(format_phone_number("+15550100200"), "+15550100200");
    }

    #[test]
    fn test_is_phone_number() {
        assert!(is_phone_number("+55 51 9178-6084"));
        assert!(is_phone_number("(555) 010-0200"));
        assert!(!is_phone_number("Claudio"));
        assert!(!is_phone_number("1234"));
    }

    #[test]
    fn test_phone_from_whatsapp_id() {
        assert_eq!(phone_from_whatsapp_id("555191786084"), "+555191786084");
        assert_eq!(phone_from_whatsapp_id("not-a-waid"), "not-a-waid");
    }
}
