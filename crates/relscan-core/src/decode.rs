//! Filename decoder.
//!
//! Scans a filename left to right against a [`Dictionary`]. Every byte of
//! the input ends up in exactly one token, so joining the captured text of
//! the result gives back the original name.

use relscan_schema::DecodedToken;

use crate::dictionary::Dictionary;

fn is_separator(byte: u8) -> bool {
    matches!(byte, b'-' | b'_' | b'.')
}

/// Pending free text between two matches.
#[derive(Debug, Default)]
struct Run {
    start: Option<usize>,
    separator: Option<usize>,
}

impl Run {
    /// Emit the run (if non-empty) followed by the separator that ended it.
    fn flush(&mut self, name: &str, at: usize, suffix_only: bool, out: &mut Vec<DecodedToken>) {
        let Some(start) = self.start.take() else {
            return;
        };
        let separator = self.separator.take();
        let end = separator.unwrap_or(at);
        // Single character runs are kept too; dropping them would leave
        // part of the name uncovered by any token.
        if start < end {
            out.push(DecodedToken::unmatched(&name[start..end], suffix_only));
        }
        if let Some(sep) = separator {
            out.push(DecodedToken::separator(&name[sep..=sep]));
        }
    }
}

/// Decode one filename into its token sequence.
///
/// Matching is greedy and longest-first per position. After a suffix-only
/// token has matched, only suffix-only entries are considered and any other
/// text joins an unmatched run flagged as suffix-only.
pub fn decode(dictionary: &Dictionary, name: &str) -> Vec<DecodedToken> {
    let bytes = name.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut suffix_only = false;
    let mut run = Run::default();
    let mut i = 0;

    while i < len {
        if let Some(meaning) = dictionary.match_at(name, i, suffix_only) {
            let end = i + meaning.key.len();
            run.flush(name, i, suffix_only, &mut tokens);
            tokens.push(DecodedToken::matched(&name[i..end], meaning.clone()));
            suffix_only |= meaning.suffix_only;
            i = end;
        } else {
            run.start.get_or_insert(i);
            while i < len && !is_separator(bytes[i]) {
                i += 1;
            }
        }

        if i < len && is_separator(bytes[i]) {
            if run.start.is_some() {
                run.separator = Some(i);
            } else {
                tokens.push(DecodedToken::separator(&name[i..=i]));
            }
            i += 1;
        }
    }

    if let Some(start) = run.start.filter(|&start| start < len) {
        tokens.push(DecodedToken::unmatched(&name[start..], suffix_only));
    }

    tokens
}

/// Decode the directory part of an archive member path.
///
/// Each `/`-separated component is decoded on its own and every resulting
/// token is flagged as coming from a folder.
pub fn decode_directory(dictionary: &Dictionary, directory: &str) -> Vec<DecodedToken> {
    directory
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .flat_map(|part| decode(dictionary, part))
        .map(|mut token| {
            token.folder = true;
            token
        })
        .collect()
}
