//! Dictionary matching and code-rotation helpers.

use crate::dictionary::Dictionary;

/// A dictionary match for an observed marker code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Match {
    /// Marker id in the dictionary.
    pub id: u32,
    /// Rotation `0..=3` such that `observed == rotate(dict_code, rotation)`.
    pub rotation: u8,
    /// Hamming distance after rotation.
    pub hamming: u8,
}

/// Brute-force matcher over all ids and the four rotations.
///
/// Dictionaries top out at 1000 ids, so precomputing the rotated codes and
/// scanning linearly stays cheap.
#[derive(Clone, Debug)]
pub struct Matcher {
    dict: Dictionary,
    max_hamming: u8,
    rotated: Vec<[u64; 4]>,
}

impl Matcher {
    pub fn new(dict: Dictionary, max_hamming: u8) -> Self {
        debug_assert!(dict.bit_count() <= 64);
        let rotated = dict
            .codes
            .iter()
            .map(|&base| {
                [
                    base,
                    rotate_code_u64(base, dict.marker_size, 1),
                    rotate_code_u64(base, dict.marker_size, 2),
                    rotate_code_u64(base, dict.marker_size, 3),
                ]
            })
            .collect();
        Self {
            dict,
            max_hamming,
            rotated,
        }
    }

    #[inline]
    pub fn dictionary(&self) -> &Dictionary {
        &self.dict
    }

    #[inline]
    pub fn max_hamming(&self) -> u8 {
        self.max_hamming
    }

    /// Best match within `max_hamming`, if any.
    pub fn match_code(&self, observed: u64) -> Option<Match> {
        let mut best: Option<Match> = None;
        for (id, rots) in self.rotated.iter().enumerate() {
            for (rot, &cand) in rots.iter().enumerate() {
                let h = (observed ^ cand).count_ones() as u8;
                if h > self.max_hamming {
                    continue;
                }
                if best.map(|b| h < b.hamming).unwrap_or(true) {
                    let m = Match {
                        id: id as u32,
                        rotation: rot as u8,
                        hamming: h,
                    };
                    if h == 0 {
                        return Some(m);
                    }
                    best = Some(m);
                }
            }
        }
        best
    }
}

/// Rotate a code stored in row-major bits (`idx = y * n + x`) by `rot`
/// quarter turns.
pub fn rotate_code_u64(code: u64, n: usize, rot: u8) -> u64 {
    let rot = rot & 3;
    if rot == 0 {
        return code;
    }

    let mut out = 0u64;
    for y in 0..n {
        for x in 0..n {
            let (sx, sy) = match rot {
                1 => (y, n - 1 - x),
                2 => (n - 1 - x, n - 1 - y),
                _ => (n - 1 - y, x),
            };
            let bit = (code >> (sy * n + sx)) & 1;
            out |= bit << (y * n + x);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_four_times_is_identity() {
        let code = 0x0123_4567_89ab_cdef_u64;
        let mut r = code;
        for _ in 0..4 {
            r = rotate_code_u64(r, 8, 1);
        }
        assert_eq!(code, r);
    }

    #[test]
    fn matcher_finds_rotated_code() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let base = dict.codes[7];
        let n = dict.marker_size;
        let matcher = Matcher::new(dict, 0);

        let observed = rotate_code_u64(base, n, 1);
        let m = matcher.match_code(observed).expect("match");
        assert_eq!(m.id, 7);
        assert_eq!(m.rotation, 1);
        assert_eq!(m.hamming, 0);
    }

    #[test]
    fn corrupted_code_matches_within_budget() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let base = dict.codes[3];
        let matcher = Matcher::new(dict, 1);

        let corrupted = base ^ (1 << 12); // flip one inner bit
        let m = matcher.match_code(corrupted).expect("match");
        assert_eq!(m.id, 3);
        assert_eq!(m.hamming, 1);
    }

    #[test]
    fn noise_beyond_budget_is_rejected() {
        let dict = Dictionary::by_name("ARUCO_5X5_50").expect("builtin");
        let base = dict.codes[0];
        let matcher = Matcher::new(dict, 0);
        assert!(matcher.match_code(base ^ 0b101).is_none());
    }
}
