use core::fmt;
use core::num::NonZeroU32;

/// 1-based identifier assigned to a case when it is inserted into a set.
///
/// `NonZero` keeps `Option<CaseId>` the same size as `CaseId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseId(NonZeroU32);

impl CaseId {
    /// Id for the case stored at 0-based position `index`.
    pub fn from_index(index: usize) -> Option<Self> {
        let raw = u32::try_from(index).ok()?.checked_add(1)?;
        NonZeroU32::new(raw).map(Self)
    }

    /// Id from its 1-based value; `None` for zero.
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Recover the 0-based position.
    pub fn index(self) -> usize {
        (self.0.get() - 1) as usize
    }
}

impl fmt::Debug for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CaseId({})", self.get())
    }
}

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trip_index() {
        for i in [0_usize, 1, 2, 42, 10_000] {
            let id = CaseId::from_index(i).unwrap();
            assert_eq!(id.index(), i);
            assert_eq!(id.get() as usize, i + 1);
        }
    }

    #[test]
    fn zero_is_not_an_id() {
        assert!(CaseId::new(0).is_none());
        assert_eq!(CaseId::new(1), CaseId::from_index(0));
    }

    #[test]
    fn option_id_is_small() {
        assert_eq!(
            core::mem::size_of::<CaseId>(),
            core::mem::size_of::<Option<CaseId>>()
        );
    }
}
