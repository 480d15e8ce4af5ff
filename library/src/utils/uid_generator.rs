/// Hands out non-zero identifiers, reusing returned ones first.
#[derive(Default)]
pub(crate) struct UidGenerator {
    last_generated_uid: u64,
    returned: Vec<u64>,
}

impl UidGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self { last_generated_uid: 0, returned: Vec::new() }
    }

    #[must_use]
    pub(crate) fn next(&mut self) -> u64 {
        match self.returned.pop() {
            Some(uid) => uid,
            None => {
                self.last_generated_uid = self.last_generated_uid.wrapping_add(1).max(1);
                self.last_generated_uid
            }
        }
    }

    pub(crate) fn put_back(&mut self, uid: u64) {
        debug_assert_ne!(uid, 0, "zero is never generated");
        self.returned.push(uid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uid_generator_creates_new_uids() {
        let mut system_under_test = UidGenerator::new();

        let first = system_under_test.next();
        let second = system_under_test.next();

        assert_ne!(first, second);
        assert_ne!(first, 0);
    }

    #[test]
    fn test_uid_generator_put_back_and_reuse() {
        let mut system_under_test = UidGenerator::new();

        let first = system_under_test.next();
        system_under_test.put_back(first);
        let second = system_under_test.next();

        assert_eq!(first, second);
    }
}
