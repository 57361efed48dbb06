//! FITS header card formatting. One card is exactly 80 ASCII bytes:
//! an 8 character keyword, "= ", a fixed format value field and an
//! optional "/ comment".
use crate::error::FormattingError;

/// Card length, bytes.
pub const CARD_LEN: usize = 80;

/// Value field of fixed format cards ends at this column.
const VALUE_END: usize = 30;

pub type Card = [u8; CARD_LEN];

/// Logical card: T/F right justified to column 30.
pub fn logical(key: &str, value: bool, comment: Option<&str>) -> Result<Card, FormattingError> {
    let value = if value { "T" } else { "F" };
    build(key, &format!("{:>20}", value), comment)
}

/// Integer card, right justified to column 30.
pub fn integer(key: &str, value: i64, comment: Option<&str>) -> Result<Card, FormattingError> {
    build(key, &format!("{:>20}", value), comment)
}

/// Real card, right justified to column 30.
pub fn real(key: &str, value: f64, comment: Option<&str>) -> Result<Card, FormattingError> {
    build(key, &format!("{:>20}", format_real(value)), comment)
}

/// String card: quoted, padded to at least 8 characters inside
/// the quotes. Single quotes in the value are doubled.
pub fn string(key: &str, value: &str, comment: Option<&str>) -> Result<Card, FormattingError> {
    let escaped = value.replace('\'', "''");
    build(key, &format!("'{:<8}'", escaped), comment)
}

/// The mandatory END card.
pub fn end() -> Card {
    let mut card = [b' '; CARD_LEN];
    card[..3].copy_from_slice(b"END");
    card
}

fn build(key: &str, value_field: &str, comment: Option<&str>) -> Result<Card, FormattingError> {
    if key.len() > 8 {
        return Err(FormattingError::KeywordTooLong(key.to_string()));
    }
    let mut content = format!("{:<8}= {}", key.to_uppercase(), value_field);
    if let Some(comment) = comment {
        // align comments of short value fields to a common column
        while content.len() < VALUE_END {
            content.push(' ');
        }
        content.push_str(" / ");
        content.push_str(comment);
    }

    // the zip below bounds the card at 80 bytes
    let mut card = [b' '; CARD_LEN];
    for (slot, byte) in card.iter_mut().zip(content.bytes()) {
        // header cards are restricted to printable ASCII
        *slot = if (0x20..=0x7E).contains(&byte) {
            byte
        } else {
            b'?'
        };
    }
    Ok(card)
}

/*
 * Decimal when the magnitude is reasonable, exponent form
 * (with an explicit sign, as the standard prefers) otherwise.
 */
fn format_real(value: f64) -> String {
    if value == 0.0 {
        return "0.0".to_string();
    }
    if !value.is_finite() {
        // headers cannot carry non finite reals
        return "0.0".to_string();
    }
    let magnitude = value.abs();
    if (1.0e-3..1.0e9).contains(&magnitude) {
        let mut s = format!("{:.6}", value);
        // keep one digit after the point
        while s.ends_with('0') && !s.ends_with(".0") {
            s.pop();
        }
        s
    } else {
        let s = format!("{:E}", value);
        match s.split_once('E') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}E+{}", mantissa, exp),
            _ => s,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn text(card: &Card) -> String {
        String::from_utf8_lossy(card).to_string()
    }

    #[test]
    fn card_is_80_bytes() {
        let card = logical("SIMPLE", true, Some("conforms to FITS standard")).unwrap();
        assert_eq!(card.len(), 80);
        assert!(text(&card).starts_with("SIMPLE  =                    T / conforms"));
    }

    #[test]
    fn integer_alignment() {
        let card = integer("NAXIS", 3, None).unwrap();
        let s = text(&card);
        assert_eq!(&s[0..10], "NAXIS   = ");
        assert_eq!(s.as_bytes()[29], b'3');
    }

    #[test]
    fn string_quoting() {
        let card = string("OBJECT", "sun", None).unwrap();
        assert!(text(&card).starts_with("OBJECT  = 'sun     '"));

        let card = string("UNIT", "s.f.u.", Some("Data unit")).unwrap();
        assert!(text(&card).contains("'s.f.u.  '"));
        assert!(text(&card).contains("/ Data unit"));
    }

    #[test]
    fn real_formats() {
        assert_eq!(format_real(0.0), "0.0");
        assert_eq!(format_real(15.25), "15.25");
        assert_eq!(format_real(-13.7), "-13.7");
        assert_eq!(format_real(0.0083886), "0.008389");
        assert_eq!(format_real(1.0e12), "1E+12");
        assert_eq!(format_real(1.5e-7), "1.5E-7");
    }

    #[test]
    fn keyword_length_guard() {
        assert!(matches!(
            integer("TOOLONGKEY", 1, None),
            Err(FormattingError::KeywordTooLong(_))
        ));
    }

    #[test]
    fn end_card() {
        let card = end();
        assert!(text(&card).starts_with("END "));
        assert_eq!(card.len(), 80);
    }
}
