use more_asserts::debug_assert_gt;

/// Alignment every work-memory buffer handed to a builder must satisfy.
/// Driven by the widest placed element (block handles and descriptor slots).
pub const ALIGNMENT_BUFFER: usize = 8;

#[must_use]
pub const fn is_power_of_two(value: usize) -> bool {
    value != 0 && (value & (value - 1)) == 0
}

#[must_use]
pub fn align_up(value: usize, alignment: usize) -> usize {
    debug_assert!(is_power_of_two(alignment), "alignment {} is not a power of two", alignment);
    (value + alignment - 1) & !(alignment - 1)
}

#[must_use]
pub fn is_aligned(value: usize, alignment: usize) -> bool {
    debug_assert_gt!(alignment, 0);
    value % alignment == 0
}

#[must_use]
pub fn is_address_aligned(memory: &[u8], alignment: usize) -> bool {
    is_aligned(memory.as_ptr() as usize, alignment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 8, 0)]
    #[case(1, 8, 8)]
    #[case(8, 8, 8)]
    #[case(9, 4, 12)]
    #[case(255, 256, 256)]
    #[case(257, 256, 512)]
    fn test_align_up(#[case] value: usize, #[case] alignment: usize, #[case] expected: usize) {
        assert_eq!(align_up(value, alignment), expected);
    }

    #[test]
    fn test_is_power_of_two() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(256));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(12));
    }

    #[test]
    fn test_is_address_aligned() {
        let backend = vec![0_u64; 4];
        let memory: &[u8] = bytemuck::cast_slice(&backend);

        assert!(is_address_aligned(memory, ALIGNMENT_BUFFER));
        assert!(!is_address_aligned(&memory[1..], 2));
    }
}
