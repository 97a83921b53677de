// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! ASCII armor envelope.
//!
//! ```text
//! -----BEGIN ENCRYPTED CONTENT-----
//! <body in lines of at most 32 characters>
//! -----END ENCRYPTED CONTENT-----
//! ```

use super::CrypterError;

pub const ARMOR_HEADER: &str = "-----BEGIN ENCRYPTED CONTENT-----";
pub const ARMOR_FOOTER: &str = "-----END ENCRYPTED CONTENT-----";
pub const ARMOR_LINE_LENGTH: usize = 32;

/// Wrap `input` in the envelope, LF line endings.
pub fn armor(input: &str) -> String {
    let mut out = String::with_capacity(
        ARMOR_HEADER.len() + ARMOR_FOOTER.len() + input.len() + input.len() / ARMOR_LINE_LENGTH + 3,
    );
    out.push_str(ARMOR_HEADER);
    out.push('\n');

    let chars: Vec<char> = input.chars().collect();
    for line in chars.chunks(ARMOR_LINE_LENGTH) {
        out.extend(line);
        out.push('\n');
    }

    out.push_str(ARMOR_FOOTER);
    out
}

/// Strip the envelope and join the body lines.
pub fn dearmor(text: &str) -> Result<String, CrypterError> {
    let start = text.find(ARMOR_HEADER).ok_or(CrypterError::BadArmor)? + ARMOR_HEADER.len();
    let end = text[start..]
        .find(ARMOR_FOOTER)
        .ok_or(CrypterError::BadArmor)?
        + start;

    Ok(text[start..end].lines().map(str::trim).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_lines(armored: &str) -> Vec<&str> {
        let lines: Vec<&str> = armored.lines().collect();
        assert_eq!(lines.first(), Some(&ARMOR_HEADER));
        assert_eq!(lines.last(), Some(&ARMOR_FOOTER));
        lines[1..lines.len() - 1].to_vec()
    }

    #[test]
    fn short_input_is_one_line() {
        let armored = armor("abc");
        assert_eq!(body_lines(&armored), vec!["abc"]);
        assert_eq!(
            armored,
            "-----BEGIN ENCRYPTED CONTENT-----\nabc\n-----END ENCRYPTED CONTENT-----"
        );
    }

    #[test]
    fn lines_are_at_most_32_and_concatenate_back() {
        for len in [1usize, 31, 32, 33, 64, 65, 200] {
            let input: String = (0..len).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
            let armored = armor(&input);
            let lines = body_lines(&armored);

            assert_eq!(lines.len(), len.div_ceil(32));
            assert!(lines.iter().all(|l| l.len() <= 32));
            assert!(lines[..lines.len() - 1].iter().all(|l| l.len() == 32));
            assert_eq!(lines.concat(), input);
            assert_eq!(dearmor(&armored).unwrap(), input);
        }
    }

    #[test]
    fn missing_sentinels_are_rejected() {
        let armored = armor("abcdef");
        let no_header = armored.replace(ARMOR_HEADER, "");
        let no_footer = armored.replace(ARMOR_FOOTER, "");
        assert_eq!(dearmor(&no_header), Err(CrypterError::BadArmor));
        assert_eq!(dearmor(&no_footer), Err(CrypterError::BadArmor));
        assert_eq!(dearmor("abcdef"), Err(CrypterError::BadArmor));
    }

    #[test]
    fn footer_before_header_is_rejected() {
        let reversed = format!("{ARMOR_FOOTER}\nabc\n{ARMOR_HEADER}");
        assert_eq!(dearmor(&reversed), Err(CrypterError::BadArmor));
    }

    #[test]
    fn crlf_and_surrounding_text_are_tolerated() {
        let text = format!("note:\r\n{ARMOR_HEADER}\r\nabc\r\ndef\r\n{ARMOR_FOOTER}\r\n");
        assert_eq!(dearmor(&text).unwrap(), "abcdef");
    }
}
