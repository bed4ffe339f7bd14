/// Similarity ratio between two strings in the Ratcliff/Obershelp sense:
/// `2 * M / T`, where `M` is the number of characters in matching blocks and
/// `T` the total length of both inputs.
///
/// Returns 1.0 for two empty strings and 0.0 when exactly one is empty.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Highest ratio two strings of these lengths could reach, used to skip
/// candidates before running the quadratic comparison.
pub fn ratio_upper_bound(len_a: usize, len_b: usize) -> f64 {
    let total = len_a + len_b;
    if total == 0 {
        return 1.0;
    }
    2.0 * len_a.min(len_b) as f64 / total as f64
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_common_block(&a[a_lo..a_hi], &b[b_lo..b_hi]);
        if size == 0 {
            continue;
        }
        matched += size;
        let (i, j) = (a_lo + i, b_lo + j);
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    matched
}

/// Longest common contiguous block, earliest in `a` on ties.
fn longest_common_block(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut previous = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            current[j + 1] = if ca == cb { previous[j] + 1 } else { 0 };
            let size = current[j + 1];
            if size > best.2 {
                best = (i + 1 - size, j + 1 - size, size);
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    best
}
