//! Newline-delimited line scanning.

use memchr::memchr;

/// One line view produced by [`LineScanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScannedLine<'a> {
    /// The line bytes, excluding any newline.
    pub bytes: &'a [u8],
    /// Whether the view ended at a newline. False only for a final view
    /// that ran out of bytes first (a partial line).
    pub terminated: bool,
}

/// Iterator splitting a byte range into newline-delimited views.
///
/// The newline separating two lines belongs to neither of them, and a range
/// ending in a newline yields no trailing empty view.
#[derive(Debug, Clone)]
pub struct LineScanner<'a> {
    rest: &'a [u8],
}

impl<'a> LineScanner<'a> {
    pub fn new(data: &'a [u8]) -> LineScanner<'a> {
        LineScanner { rest: data }
    }

    /// Bytes not yet consumed by the scanner.
    pub fn remaining(&self) -> &'a [u8] {
        self.rest
    }
}

impl<'a> Iterator for LineScanner<'a> {
    type Item = ScannedLine<'a>;

    fn next(&mut self) -> Option<ScannedLine<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        match memchr(b'\n', self.rest) {
            Some(at) => {
                let bytes = &self.rest[..at];
                self.rest = &self.rest[at + 1..];
                Some(ScannedLine { bytes, terminated: true })
            }
            None => {
                let bytes = self.rest;
                self.rest = &[];
                Some(ScannedLine { bytes, terminated: false })
            }
        }
    }
}

#[cfg(test)]
mod test {
    use rstest::*;

    use super::LineScanner;

    #[rstest]
    #[case(&b""[..], vec![])]
    #[case(&b"abc"[..], vec![(&b"abc"[..], false)])]
    #[case(&b"abc\n"[..], vec![(&b"abc"[..], true)])]
    #[case(&b"a\nb"[..], vec![(&b"a"[..], true), (&b"b"[..], false)])]
    #[case(&b"\n"[..], vec![(&b""[..], true)])]
    #[case(&b"\n\n"[..], vec![(&b""[..], true), (&b""[..], true)])]
    #[case(
        &b"a\n\nb\n"[..],
        vec![(&b"a"[..], true), (&b""[..], true), (&b"b"[..], true)],
    )]
    fn test_line_scanner(#[case] data: &[u8], #[case] expected: Vec<(&[u8], bool)>) {
        let actual: Vec<_> = LineScanner::new(data)
            .map(|line| (line.bytes, line.terminated))
            .collect();
        assert_eq!(actual, expected);
    }

    #[rstest]
    fn test_remaining_tracks_cursor() {
        let mut scanner = LineScanner::new(b"one\ntwo\nthree");

        assert_eq!(scanner.remaining(), b"one\ntwo\nthree");
        scanner.next().unwrap();
        assert_eq!(scanner.remaining(), b"two\nthree");
        scanner.next().unwrap();
        assert_eq!(scanner.remaining(), b"three");
        scanner.next().unwrap();
        assert_eq!(scanner.remaining(), b"");
        assert!(scanner.next().is_none());
    }
}
