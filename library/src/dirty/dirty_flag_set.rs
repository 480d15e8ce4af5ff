use more_asserts::assert_lt;

const BITS_PER_WORD: usize = u32::BITS as usize;

/// Per-buffering-slot bitsets over parameter indices, stored in caller memory.
///
/// An edit marks the parameter in every slot; uploading into a slot clears only
/// that slot's bits. A slot therefore never misses an edit that another slot
/// has already consumed.
#[derive(Default)]
pub struct DirtyFlagSet<'a> {
    words: &'a mut [u32],
    flag_count: usize,
    slot_count: usize,
}

impl<'a> DirtyFlagSet<'a> {
    #[must_use]
    pub fn words_per_slot(flag_count: usize) -> usize {
        flag_count.div_ceil(BITS_PER_WORD)
    }

    #[must_use]
    pub fn required_words(flag_count: usize, slot_count: usize) -> usize {
        Self::words_per_slot(flag_count) * slot_count
    }

    #[must_use]
    pub fn new(words: &'a mut [u32], flag_count: usize, slot_count: usize) -> Self {
        assert_eq!(words.len(), Self::required_words(flag_count, slot_count), "dirty flag storage size mismatch");
        let mut result = Self { words, flag_count, slot_count };
        result.reset_dirty_flags();
        result
    }

    #[must_use]
    pub fn flag_count(&self) -> usize {
        self.flag_count
    }

    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[must_use]
    fn slot_words(&self, slot: usize) -> &[u32] {
        assert_lt!(slot, self.slot_count);
        let stride = Self::words_per_slot(self.flag_count);
        &self.words[slot * stride..(slot + 1) * stride]
    }

    #[must_use]
    fn slot_words_mut(&mut self, slot: usize) -> &mut [u32] {
        assert_lt!(slot, self.slot_count);
        let stride = Self::words_per_slot(self.flag_count);
        &mut self.words[slot * stride..(slot + 1) * stride]
    }

    pub fn set_dirty_flag(&mut self, index: usize) {
        assert_lt!(index, self.flag_count);
        for slot in 0..self.slot_count {
            self.slot_words_mut(slot)[index / BITS_PER_WORD] |= 1 << (index % BITS_PER_WORD);
        }
    }

    /// Marks every flag of every slot.
    pub fn set_all(&mut self) {
        for slot in 0..self.slot_count {
            for index in 0..self.flag_count {
                self.slot_words_mut(slot)[index / BITS_PER_WORD] |= 1 << (index % BITS_PER_WORD);
            }
        }
    }

    #[must_use]
    pub fn is_flag_dirty(&self) -> bool {
        self.words.iter().any(|word| *word != 0)
    }

    #[must_use]
    pub fn is_slot_dirty(&self, slot: usize) -> bool {
        self.slot_words(slot).iter().any(|word| *word != 0)
    }

    #[must_use]
    pub fn is_dirty(&self, slot: usize, index: usize) -> bool {
        assert_lt!(index, self.flag_count);
        0 != self.slot_words(slot)[index / BITS_PER_WORD] & (1 << (index % BITS_PER_WORD))
    }

    pub fn reset_dirty_flags(&mut self) {
        self.words.fill(0);
    }

    pub fn clear_slot(&mut self, slot: usize) {
        self.slot_words_mut(slot).fill(0);
    }

    pub fn dirty_indices(&self, slot: usize) -> impl Iterator<Item = usize> + '_ {
        let words = self.slot_words(slot);
        (0..self.flag_count).filter(move |index| 0 != words[index / BITS_PER_WORD] & (1 << (index % BITS_PER_WORD)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_required_words() {
        assert_eq!(DirtyFlagSet::required_words(0, 2), 0);
        assert_eq!(DirtyFlagSet::required_words(1, 2), 2);
        assert_eq!(DirtyFlagSet::required_words(32, 3), 3);
        assert_eq!(DirtyFlagSet::required_words(33, 3), 6);
    }

    #[test]
    fn test_new_resets_storage() {
        let mut storage = vec![u32::MAX; 2];

        let system_under_test = DirtyFlagSet::new(&mut storage, 5, 2);

        assert!(!system_under_test.is_flag_dirty());
    }

    #[rstest]
    #[case(1)]
    #[case(2)]
    #[case(3)]
    fn test_edit_then_clear_every_slot(#[case] slot_count: usize) {
        let flag_count = 40;
        let mut storage = vec![0; DirtyFlagSet::required_words(flag_count, slot_count)];
        let mut system_under_test = DirtyFlagSet::new(&mut storage, flag_count, slot_count);

        system_under_test.set_dirty_flag(35);
        assert!(system_under_test.is_flag_dirty());

        for slot in 0..slot_count {
            assert!(system_under_test.is_dirty(slot, 35));
            system_under_test.clear_slot(slot);
        }
        assert!(!system_under_test.is_flag_dirty());
    }

    #[test]
    fn test_clearing_one_slot_keeps_others() {
        let mut storage = vec![0; DirtyFlagSet::required_words(3, 2)];
        let mut system_under_test = DirtyFlagSet::new(&mut storage, 3, 2);

        system_under_test.set_dirty_flag(1);
        system_under_test.clear_slot(0);

        assert!(!system_under_test.is_slot_dirty(0));
        assert!(system_under_test.is_slot_dirty(1));
        assert!(system_under_test.is_flag_dirty());
    }

    #[test]
    fn test_dirty_indices() {
        let mut storage = vec![0; DirtyFlagSet::required_words(70, 1)];
        let mut system_under_test = DirtyFlagSet::new(&mut storage, 70, 1);

        system_under_test.set_dirty_flag(0);
        system_under_test.set_dirty_flag(33);
        system_under_test.set_dirty_flag(69);

        let actual: Vec<usize> = system_under_test.dirty_indices(0).collect();
        assert_eq!(actual, vec![0, 33, 69]);
    }

    #[test]
    fn test_set_all_respects_flag_count() {
        let mut storage = vec![0; DirtyFlagSet::required_words(3, 2)];
        let mut system_under_test = DirtyFlagSet::new(&mut storage, 3, 2);

        system_under_test.set_all();

        assert_eq!(system_under_test.dirty_indices(1).count(), 3);
        drop(system_under_test);
        assert_eq!(storage, vec![0b111, 0b111]);
    }

    #[test]
    fn test_reset() {
        let mut storage = vec![0; DirtyFlagSet::required_words(3, 2)];
        let mut system_under_test = DirtyFlagSet::new(&mut storage, 3, 2);
        system_under_test.set_all();

        system_under_test.reset_dirty_flags();

        assert!(!system_under_test.is_flag_dirty());
    }

    #[test]
    #[should_panic]
    fn test_out_of_range_index() {
        let mut storage = vec![0; DirtyFlagSet::required_words(3, 1)];
        let mut system_under_test = DirtyFlagSet::new(&mut storage, 3, 1);

        system_under_test.set_dirty_flag(3);
    }
}
