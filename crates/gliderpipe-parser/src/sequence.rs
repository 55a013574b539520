/// Extracts a segment sequence number from a file name.
///
/// Conventions are tried in priority order; the digit run adjacent to the
/// first recognized marker wins:
///
/// 1. trailing digits before a `.csv` extension (`mission_007.csv`,
///    `dive_12.csv`, `telemetry.3.csv`, `183.csv`)
/// 2. digits after a `.sub.` marker (`glider.pld1.sub.9`)
/// 3. digits after a `.raw.` marker (`glider.pld1.raw.42`)
///
/// Names matching no convention are unsequenced and yield `None`.
pub fn extract_sequence(file_name: &str) -> Option<u32> {
    if let Some(stem) = file_name.strip_suffix(".csv") {
        if let Some(sequence) = trailing_digits(stem) {
            return Some(sequence);
        }
    }

    for marker in [".sub.", ".raw."] {
        if let Some((_, rest)) = file_name.rsplit_once(marker) {
            if let Some(sequence) = leading_digits(rest) {
                return Some(sequence);
            }
        }
    }

    None
}

fn trailing_digits(stem: &str) -> Option<u32> {
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    }
}

fn leading_digits(rest: &str) -> Option<u32> {
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());

    if end == 0 {
        None
    } else {
        rest[..end].parse().ok()
    }
}
