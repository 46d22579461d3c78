//! Conversions between 0-based (row, column) indexes and Excel-style references.

/// Converts 0-based row & column indexes to an Excel-style reference such as `B3`.
pub(crate) fn index_to_reference(row: usize, col: usize) -> String {
    let mut reference = index_to_col(col);
    reference.push_str(&(row + 1).to_string());
    reference
}

/// Converts a 0-based column index to its letters (0 = `A`, 26 = `AA`).
pub(crate) fn index_to_col(col: usize) -> String {
    let mut letters = Vec::new();
    let mut number = col + 1;
    while number > 0 {
        number -= 1;
        letters.push(b'A' + (number % 26) as u8);
        number /= 26;
    }
    letters.iter().rev().map(|letter| *letter as char).collect()
}

/// Parses column letters (case-insensitive) to a 0-based column index.
pub(crate) fn col_to_index(letters: &str) -> Option<usize> {
    if letters.is_empty() || !letters.chars().all(|letter| letter.is_ascii_alphabetic()) {
        return None;
    }
    letters
        .to_ascii_uppercase()
        .bytes()
        .try_fold(0usize, |index, letter| {
            index.checked_mul(26)?.checked_add((letter - b'A') as usize + 1)
        })
        .map(|column| column - 1)
}

/// Parses a 1-based row number to a 0-based row index.
pub(crate) fn row_to_index(number: &str) -> Option<usize> {
    number
        .parse::<usize>()
        .ok()
        .filter(|row| *row > 0)
        .map(|row| row - 1)
}

/// Parses an Excel-style reference such as `B3` or `$B$3` to 0-based indexes.
pub(crate) fn reference_to_index(reference: &str) -> Option<(usize, usize)> {
    let reference = reference.replace('$', "");
    let split = reference.find(|character: char| character.is_ascii_digit())?;
    let col = col_to_index(&reference[..split])?;
    let row = row_to_index(&reference[split..])?;
    Some((row, col))
}
