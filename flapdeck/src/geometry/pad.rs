//! Blank-padding helpers for routine output.

use super::Size;

/// Pad `text` with leading blanks up to the area of `size`.
///
/// Text already at or over the area is returned unchanged.
pub fn left_pad(text: &str, size: Size) -> String {
    pad(text, size, true)
}

/// Pad `text` with trailing blanks up to the area of `size`.
pub fn right_pad(text: &str, size: Size) -> String {
    pad(text, size, false)
}

fn pad(text: &str, size: Size, left: bool) -> String {
    let len = text.chars().count();
    if len >= size.area() {
        return text.to_string();
    }
    let blanks = " ".repeat(size.area() - len);
    if left {
        format!("{blanks}{text}")
    } else {
        format!("{text}{blanks}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_pad_single_row() {
        assert_eq!(left_pad("ABCD", Size::new(6, 1)), "  ABCD");
    }

    #[test]
    fn test_left_pad_two_rows() {
        assert_eq!(left_pad("ABCD", Size::new(6, 2)), "        ABCD");
    }

    #[test]
    fn test_right_pad() {
        assert_eq!(right_pad("ABCD", Size::new(6, 1)), "ABCD  ");
    }

    #[test]
    fn test_pad_preserves_full_text() {
        assert_eq!(left_pad("ABCDEF", Size::new(6, 1)), "ABCDEF");
        assert_eq!(right_pad("ABCDEFG", Size::new(6, 1)), "ABCDEFG");
    }

    #[test]
    fn test_pad_length_invariant() {
        let size = Size::new(8, 2);
        for text in ["", "A", "HELLO"] {
            assert_eq!(left_pad(text, size).chars().count(), size.area());
            assert_eq!(right_pad(text, size).chars().count(), size.area());
        }
    }

    #[test]
    fn test_pad_counts_chars_not_bytes() {
        // degree sign is two bytes but one module
        assert_eq!(left_pad("°°", Size::new(4, 1)), "  °°");
    }
}
