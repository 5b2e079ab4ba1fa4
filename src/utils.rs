// utility functions

/// energy of one block of samples, the plain sum of squares
///
/// This is the quantity everything downstream gates and windows on.  It is
/// deliberately not normalized; divide by the block length to get power.
pub fn block_energy(block: &[f32]) -> f32 {
    block.iter().fold(0.0, |acc, s| acc + s * s)
}

/// convert a window length in seconds to a whole number of blocks
pub fn seconds_to_blocks(seconds: f32, sample_rate: usize, block_size: usize) -> usize {
    if block_size == 0 {
        return 0;
    }
    (seconds * sample_rate as f32 / block_size as f32) as usize
}

/// convert a window length in seconds to a whole number of samples
pub fn seconds_to_samples(seconds: f32, sample_rate: usize) -> usize {
    (seconds * sample_rate as f32) as usize
}

#[cfg(test)]
mod test_utils {
    use super::*;

    #[test]
    fn energy_of_block() {
        assert_eq!(block_energy(&[]), 0.0);
        assert_eq!(block_energy(&[1.0, -1.0, 2.0]), 6.0);
    }

    #[test]
    fn window_conversions() {
        // 0.5s at 48kHz with 128 frame blocks is 187.5 blocks, truncated
        assert_eq!(seconds_to_blocks(0.5, 48_000, 128), 187);
        assert_eq!(seconds_to_samples(0.5, 48_000), 24_000);
        assert_eq!(seconds_to_blocks(0.5, 48_000, 0), 0);
    }
}
