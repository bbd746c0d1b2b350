//! Re-wrapping of translated lines for display.

/// Break every physical line of `text` that is wider than `max_width`
/// characters into two, at the space closest to its middle.
pub fn reflow(text: &str, max_width: usize) -> String {
    text.split('\n')
        .map(|line| reflow_line(line, max_width))
        .collect::<Vec<_>>()
        .join("\n")
}

fn reflow_line(line: &str, max_width: usize) -> String {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= max_width {
        return line.to_string();
    }

    match split_point(&chars) {
        Some(at) => {
            let first: String = chars[..at].iter().collect();
            let second: String = chars[at..].iter().collect();
            let (first, second) = (first.trim(), second.trim());
            if second.is_empty() {
                first.to_string()
            } else {
                format!("{}\n{}", first, second)
            }
        }
        None => line.to_string(),
    }
}

/// Char index of the space to break at, or `None` when the line has no space.
fn split_point(chars: &[char]) -> Option<usize> {
    let mid = chars.len().div_ceil(2);

    let left = chars[..mid].iter().rposition(|c| *c == ' ');
    let right = chars[mid..].iter().position(|c| *c == ' ').map(|i| mid + i);

    match (left, right) {
        (Some(l), Some(r)) => {
            let (move_left, move_right) = (mid - l, r - mid);
            if move_left != move_right {
                return Some(if move_left < move_right { l } else { r });
            }
            if imbalance(chars, l) <= imbalance(chars, r) {
                Some(l)
            } else {
                Some(r)
            }
        }
        (l, r) => l.or(r),
    }
}

/// Length difference between the two trimmed halves when splitting at `at`
fn imbalance(chars: &[char], at: usize) -> usize {
    let first: String = chars[..at].iter().collect();
    let second: String = chars[at..].iter().collect();
    first.trim().chars().count().abs_diff(second.trim().chars().count())
}

/// Put the two speakers of a "-Line one. -Line two." dialog on separate lines.
///
/// Returns `None` unless the text starts with a dash and has another one later.
/// The split is always at the second dash.
pub fn split_dialog(text: &str) -> Option<String> {
    let rest = text.strip_prefix('-')?;
    let dash = rest.find('-')?;
    Some(join_dialog(rest, dash))
}

fn join_dialog(rest: &str, dash: usize) -> String {
    let first = rest[..dash].trim();
    let second = rest[dash + 1..].trim();
    format!("-{}\n-{}", first, second)
}
