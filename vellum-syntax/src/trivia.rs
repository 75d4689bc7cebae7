//! Comments and white spaces.

use crate::reader::Reader;

#[inline(always)]
pub(crate) fn is_white_space_character(byte: u8) -> bool {
    matches!(byte, 0x00 | 0x09 | 0x0a | 0x0c | 0x0d | 0x20)
}

#[inline(always)]
pub(crate) fn is_delimiter_character(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

#[inline(always)]
pub(crate) fn is_regular_character(byte: u8) -> bool {
    !is_white_space_character(byte) && !is_delimiter_character(byte)
}

#[inline(always)]
pub(crate) fn is_eol_character(byte: u8) -> bool {
    matches!(byte, 0x0a | 0x0d)
}

/// Skip a single `%` comment up to (but not including) the end of the line.
pub(crate) fn skip_comment(r: &mut Reader<'_>) -> Option<()> {
    r.forward_tag(b"%")?;
    r.forward_while(|b| !is_eol_character(b));

    Some(())
}

/// Skip any run of white space characters and comments.
pub(crate) fn skip_white_spaces_and_comments(r: &mut Reader<'_>) {
    while let Some(b) = r.peek_byte() {
        if is_white_space_character(b) {
            r.forward();
        } else if b == b'%' {
            skip_comment(r);
        } else {
            return;
        }
    }
}

/// Skip any run of end-of-line characters.
pub(crate) fn skip_eol_characters(r: &mut Reader<'_>) {
    while let Some(b) = r.peek_byte() {
        if is_eol_character(b) {
            r.forward();
        } else {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Reader;

    #[test]
    fn comment_runs_to_eol() {
        let mut r = Reader::new(b"% a comment\n42");
        skip_white_spaces_and_comments(&mut r);
        assert_eq!(r.peek_byte(), Some(b'4'));
    }

    #[test]
    fn mixed_trivia() {
        let mut r = Reader::new(b"  \t%x\r\n  %y\n/Name");
        skip_white_spaces_and_comments(&mut r);
        assert_eq!(r.peek_byte(), Some(b'/'));
    }
}
