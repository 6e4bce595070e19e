//! Median Filter for Echo Timings

use crate::{BUFFER_DEPTH, CM_PER_ECHO_US, MAX_ECHO_US};

/// Number of smallest samples that must be ordered to find the median
const LOWER_HALF: usize = BUFFER_DEPTH / 2 + 1;

/// Clamp a raw elapsed time to the longest plausible echo
#[inline]
pub fn clamp_echo(elapsed_us: u32) -> u32 {
    elapsed_us.min(MAX_ECHO_US)
}

/// Convert an echo duration to centimetres, truncating toward zero
#[inline]
pub fn echo_to_distance(elapsed_us: u32) -> u32 {
    (elapsed_us as f32 * CM_PER_ECHO_US) as u32
}

/// Exact median of a full sample window.
///
/// Partial insertion sort: only the `BUFFER_DEPTH / 2 + 1` smallest samples
/// are kept in order, larger ones are dropped as soon as they are seen. The
/// last kept element is the median for an odd depth.
pub fn median_of(samples: &[u32; BUFFER_DEPTH]) -> u32 {
    let mut lowest = [0u32; LOWER_HALF];
    let mut len = 0;

    for &sample in samples {
        let mut pos = if len < LOWER_HALF {
            len
        } else if sample < lowest[LOWER_HALF - 1] {
            // evicts the current largest of the kept samples
            LOWER_HALF - 1
        } else {
            continue;
        };

        while pos > 0 && lowest[pos - 1] > sample {
            lowest[pos] = lowest[pos - 1];
            pos -= 1;
        }
        lowest[pos] = sample;

        if len < LOWER_HALF {
            len += 1;
        }
    }

    lowest[LOWER_HALF - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_median_of_scrambled_window() {
        assert_eq!(median_of(&[5, 1, 9, 3, 7, 2, 8]), 5);
    }

    #[test]
    fn test_median_rejects_single_spike() {
        let window = [1200, 1210, 1190, 26_233, 1205, 1195, 1200];
        assert_eq!(median_of(&window), 1200);
    }

    #[test]
    fn test_median_with_duplicates() {
        assert_eq!(median_of(&[4, 4, 4, 1, 9, 9, 9]), 4);
        assert_eq!(median_of(&[0; BUFFER_DEPTH]), 0);
    }

    #[test]
    fn test_median_of_descending_window() {
        assert_eq!(median_of(&[70, 60, 50, 40, 30, 20, 10]), 40);
    }

    #[test]
    fn test_clamp_echo() {
        assert_eq!(clamp_echo(26_234), MAX_ECHO_US);
        assert_eq!(clamp_echo(u32::MAX), MAX_ECHO_US);
        assert_eq!(clamp_echo(26_233), 26_233);
        assert_eq!(clamp_echo(100), 100);
    }

    #[test]
    fn test_echo_to_distance_truncates() {
        // 5 us is well under one centimetre
        assert_eq!(echo_to_distance(5), 0);
        // 1000 us ~ 17.16 cm
        assert_eq!(echo_to_distance(1000), 17);
        // maximum range ~ 450 cm
        assert_eq!(echo_to_distance(MAX_ECHO_US), 450);
    }

    proptest! {
        #[test]
        fn prop_median_matches_full_sort(window in prop::array::uniform7(any::<u32>())) {
            let mut sorted = window;
            sorted.sort_unstable();
            prop_assert_eq!(median_of(&window), sorted[BUFFER_DEPTH / 2]);
        }
    }
}
