//! Marker dictionaries.
//!
//! Codes are generated with the classic 5x5 coding scheme: each of the 5
//! rows carries 2 data bits protected by a fixed 5-bit codeword, so every
//! pair of row words differs in at least 3 cells. Ids enumerate the 10
//! data bits in order, which makes the dictionary fully deterministic for
//! any requested size up to 1024.

/// A fixed square-marker dictionary.
#[derive(Clone, Debug)]
pub struct Dictionary {
    /// Human-readable name (for logging and config files).
    pub name: String,
    /// Marker side length in inner bits.
    pub marker_size: usize,
    /// Hamming distance the dictionary can safely correct.
    pub max_correction_bits: u8,
    /// One `u64` per marker id, inner bits in row-major order, black = 1.
    pub codes: Vec<u64>,
}

impl Dictionary {
    /// Total number of inner bits per marker.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    /// Look up a dictionary by its config-file name.
    pub fn by_name(name: &str) -> Option<Self> {
        let count = match name {
            "ARUCO_5X5_50" => 50,
            "ARUCO_5X5_100" => 100,
            "ARUCO_5X5_250" => 250,
            "ARUCO_5X5_1000" => 1000,
            _ => return None,
        };
        Some(Self::classic_5x5(name, count))
    }

    /// The classic 5x5 dictionary truncated to `count` ids.
    pub fn classic_5x5(name: &str, count: usize) -> Self {
        // Row codewords for data values 0..=3, MSB = leftmost cell,
        // 1 = black. Pairwise Hamming distance >= 3.
        const ROW_WORDS: [u8; 4] = [0b10000, 0b10111, 0b01001, 0b01110];
        assert!(count <= 1 << 10, "classic 5x5 coding carries 10 data bits");

        let codes = (0..count as u64)
            .map(|id| {
                let mut code = 0u64;
                for row in 0..5 {
                    let data = ((id >> (2 * (4 - row))) & 0b11) as usize;
                    let word = ROW_WORDS[data];
                    for x in 0..5usize {
                        let bit = ((word >> (4 - x)) & 1) as u64;
                        code |= bit << (row as usize * 5 + x);
                    }
                }
                code
            })
            .collect();

        Self {
            name: name.to_string(),
            marker_size: 5,
            max_correction_bits: 2,
            codes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_name_resolves_known_sizes() {
        let d = Dictionary::by_name("ARUCO_5X5_50").expect("known name");
        assert_eq!(d.codes.len(), 50);
        assert_eq!(d.marker_size, 5);
        assert!(Dictionary::by_name("NOPE_9X9").is_none());
    }

    #[test]
    fn codes_are_distinct() {
        let d = Dictionary::classic_5x5("test", 1000);
        let mut sorted = d.codes.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 1000);
    }

    #[test]
    fn neighboring_ids_are_well_separated() {
        let d = Dictionary::classic_5x5("test", 50);
        for i in 0..d.codes.len() {
            for j in (i + 1)..d.codes.len() {
                let h = (d.codes[i] ^ d.codes[j]).count_ones();
                assert!(h >= 3, "ids {i} and {j} only differ in {h} bits");
            }
        }
    }
}
