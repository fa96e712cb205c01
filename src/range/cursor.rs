use std::iter::FusedIterator;
use std::net::Ipv4Addr;

/// Single-pass cursor over an [`AddressRange`](super::AddressRange).
///
/// The cursor holds the two bounds and the last address it handed out:
///    - `next` adds one to the current address, the 32-bit equivalent of
///      bumping the last octet and carrying into the higher ones;
///    - it stops when the addition would overflow past `255.255.255.255` or
///      when the new address reaches the end bound, so a range whose end
///      equals its start yields nothing;
///    - once stopped it stays stopped until [`AddressIter::reset`].
///
/// Because it starts from the start bound and increments before yielding,
/// the start address is never produced.
#[derive(Debug, Clone)]
pub struct AddressIter {
    start: u32,
    end: u32,
    current: u32,
    done: bool,
}

impl AddressIter {
    pub(super) const fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            current: start,
            done: false,
        }
    }

    /// Rewinds the cursor to the start of its range.
    pub fn reset(&mut self) {
        self.current = self.start;
        self.done = false;
    }

    fn remaining(&self) -> usize {
        if self.done {
            return 0;
        }
        let remaining = self.end.saturating_sub(self.current).saturating_sub(1);
        usize::try_from(remaining).unwrap_or(usize::MAX)
    }
}

impl Iterator for AddressIter {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let Some(next) = self.current.checked_add(1) else {
            self.done = true;
            return None;
        };

        if next >= self.end {
            self.done = true;
            return None;
        }

        self.current = next;
        Some(Ipv4Addr::from(next))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for AddressIter {}

impl FusedIterator for AddressIter {}

#[cfg(test)]
mod tests {
    use super::AddressIter;
    use std::net::Ipv4Addr;

    fn cursor(start: Ipv4Addr, end: Ipv4Addr) -> AddressIter {
        AddressIter::new(start.into(), end.into())
    }

    #[test]
    fn size_hint_tracks_progress() {
        let mut it = cursor(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 0, 4));
        assert_eq!(it.len(), 3);
        it.next();
        assert_eq!(it.len(), 2);
        assert_eq!(it.by_ref().count(), 2);
        assert_eq!(it.len(), 0);
    }

    #[test]
    fn stays_exhausted_until_reset() {
        let mut it = cursor(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(it.next(), Some(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(it.next(), None);
        assert_eq!(it.next(), None);

        it.reset();
        assert_eq!(it.next(), Some(Ipv4Addr::new(10, 0, 0, 1)));
    }

    #[test]
    fn reset_mid_iteration_starts_over() {
        let mut it = cursor(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 1, 0));
        let first = it.by_ref().take(10).collect::<Vec<_>>();
        it.reset();
        let again = it.take(10).collect::<Vec<_>>();
        assert_eq!(first, again);
    }

    #[test]
    fn equal_bounds_yield_nothing() {
        let mut it = cursor(Ipv4Addr::new(10, 0, 0, 9), Ipv4Addr::new(10, 0, 0, 9));
        assert_eq!(it.len(), 0);
        assert_eq!(it.next(), None);
    }

    #[test]
    fn overflow_ends_iteration() {
        let mut it = cursor(Ipv4Addr::new(255, 255, 255, 254), Ipv4Addr::new(255, 255, 255, 255));
        assert_eq!(it.next(), None);

        let mut it = AddressIter::new(u32::MAX, u32::MAX);
        assert_eq!(it.len(), 0);
        assert_eq!(it.next(), None);
    }
}
