//! Deterministic refId assignment: A..Z, then AA, AB, ... like spreadsheet columns.

use std::collections::HashSet;

const ALPHABET: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn ref_id_for_index(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % ALPHABET.len();
        letters.push(ALPHABET[rem] as char);
        n = (n - 1) / ALPHABET.len();
    }
    letters.iter().rev().collect()
}

/// First id of the sequence not already taken; used when a new target is added.
pub fn first_unused_ref_id<'a, I>(used: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let used: HashSet<&str> = used.into_iter().collect();
    (0..)
        .map(ref_id_for_index)
        .find(|id| !used.contains(id.as_str()))
        .unwrap_or_default()
}
