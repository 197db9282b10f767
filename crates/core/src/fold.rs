// crates/core/src/fold.rs
//! RNA secondary-structure folding engine.
//!
//! Nussinov-style base-pair maximization with a minimum hairpin loop of
//! three bases, producing a dot-bracket structure and a pair-count
//! energy score. Watson-Crick pairs (AU, GC) plus the GU wobble pair
//! are allowed. DNA input is accepted; T is read as U.

/// Minimum number of unpaired bases inside a hairpin loop.
const MIN_LOOP: usize = 3;

/// Folding result for one sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Fold {
    /// Dot-bracket notation, same length as the input sequence.
    pub structure: String,
    /// Free-energy score in kcal/mol (more negative is more stable).
    pub energy: f64,
}

fn can_pair(a: u8, b: u8) -> bool {
    matches!(
        (a, b),
        (b'A', b'U') | (b'U', b'A') | (b'G', b'C') | (b'C', b'G') | (b'G', b'U') | (b'U', b'G')
    )
}

fn pair_energy(a: u8, b: u8) -> f64 {
    match (a, b) {
        (b'G', b'C') | (b'C', b'G') => -3.0,
        (b'A', b'U') | (b'U', b'A') => -2.0,
        (b'G', b'U') | (b'U', b'G') => -1.0,
        _ => 0.0,
    }
}

/// Fold a single RNA (or DNA) sequence.
pub fn fold(sequence: &str) -> Fold {
    let bases: Vec<u8> = sequence
        .bytes()
        .map(|b| match b.to_ascii_uppercase() {
            b'T' => b'U',
            other => other,
        })
        .collect();
    let n = bases.len();
    if n == 0 {
        return Fold {
            structure: String::new(),
            energy: 0.0,
        };
    }

    // dp[i][j]: max pairs in bases[i..=j].
    let mut dp = vec![vec![0usize; n]; n];
    for span in (MIN_LOOP + 1)..n {
        for i in 0..n - span {
            let j = i + span;
            // j unpaired
            let mut best = dp[i][j - 1];
            // j paired with some k in [i, j - MIN_LOOP - 1]
            for k in i..=j.saturating_sub(MIN_LOOP + 1) {
                if can_pair(bases[k], bases[j]) {
                    let left = if k > i { dp[i][k - 1] } else { 0 };
                    let inner = if k + 1 <= j - 1 { dp[k + 1][j - 1] } else { 0 };
                    best = best.max(left + inner + 1);
                }
            }
            dp[i][j] = best;
        }
    }

    // Traceback, iterative to keep long sequences off the call stack.
    let mut structure = vec![b'.'; n];
    let mut energy = 0.0;
    let mut stack = vec![(0usize, n - 1)];
    while let Some((i, j)) = stack.pop() {
        if i >= j || j - i <= MIN_LOOP {
            continue;
        }
        if dp[i][j] == dp[i][j - 1] {
            stack.push((i, j - 1));
            continue;
        }
        for k in i..=j - MIN_LOOP - 1 {
            if !can_pair(bases[k], bases[j]) {
                continue;
            }
            let left = if k > i { dp[i][k - 1] } else { 0 };
            let inner = if k + 1 <= j - 1 { dp[k + 1][j - 1] } else { 0 };
            if left + inner + 1 == dp[i][j] {
                structure[k] = b'(';
                structure[j] = b')';
                energy += pair_energy(bases[k], bases[j]);
                if k > i {
                    stack.push((i, k - 1));
                }
                if k + 1 <= j - 1 {
                    stack.push((k + 1, j - 1));
                }
                break;
            }
        }
    }

    Fold {
        structure: String::from_utf8(structure).unwrap_or_default(),
        energy,
    }
}
