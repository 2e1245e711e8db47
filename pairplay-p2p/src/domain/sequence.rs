use std::collections::BTreeMap;

/// Outcome of offering a sequenced item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// Delivered, possibly releasing buffered successors
    InOrder,
    /// Ahead of the next expected sequence; held back
    Buffered,
    /// Already delivered or already buffered
    Duplicate,
    /// Ahead of sequence with a full buffer; not stored, so the stream
    /// cannot complete any more
    Overflow,
}

/// Restores per-sender order of sequenced items
///
/// Sequences start at 1. Items ahead of the next expected sequence are held
/// until the gap fills; anything at or below the last delivered sequence is
/// dropped.
#[derive(Debug, Clone)]
pub struct InboundSequencer<T> {
    delivered: u64,
    pending: BTreeMap<u64, T>,
    max_pending: usize,
}

impl<T> InboundSequencer<T> {
    pub fn new(max_pending: usize) -> Self {
        Self {
            delivered: 0,
            pending: BTreeMap::new(),
            max_pending,
        }
    }

    /// Offer an item; in-order items (and any buffered run behind them) are
    /// appended to `out`
    pub fn accept(&mut self, sequence: u64, item: T, out: &mut Vec<T>) -> Arrival {
        if sequence <= self.delivered || self.pending.contains_key(&sequence) {
            return Arrival::Duplicate;
        }

        if sequence == self.delivered + 1 {
            out.push(item);
            self.delivered = sequence;

            while let Some(next) = self.pending.remove(&(self.delivered + 1)) {
                out.push(next);
                self.delivered += 1;
            }
            return Arrival::InOrder;
        }

        if self.pending.len() >= self.max_pending {
            return Arrival::Overflow;
        }

        self.pending.insert(sequence, item);
        Arrival::Buffered
    }

    /// Highest sequence delivered so far (0 before the first)
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// First missing sequence while items are buffered
    pub fn missing_from(&self) -> Option<u64> {
        if self.pending.is_empty() {
            None
        } else {
            Some(self.delivered + 1)
        }
    }

    pub fn reset(&mut self) {
        self.delivered = 0;
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_order_delivery() {
        let mut seq = InboundSequencer::new(8);
        let mut out = Vec::new();

        assert_eq!(seq.accept(1, "a", &mut out), Arrival::InOrder);
        assert_eq!(seq.accept(2, "b", &mut out), Arrival::InOrder);

        assert_eq!(out, vec!["a", "b"]);
        assert_eq!(seq.delivered(), 2);
    }

    #[test]
    fn test_gap_is_buffered_until_filled() {
        let mut seq = InboundSequencer::new(8);
        let mut out = Vec::new();

        assert_eq!(seq.accept(3, "c", &mut out), Arrival::Buffered);
        assert_eq!(seq.accept(2, "b", &mut out), Arrival::Buffered);
        assert!(out.is_empty());
        assert_eq!(seq.missing_from(), Some(1));

        assert_eq!(seq.accept(1, "a", &mut out), Arrival::InOrder);
        assert_eq!(out, vec!["a", "b", "c"]);
        assert_eq!(seq.pending_len(), 0);
        assert_eq!(seq.missing_from(), None);
    }

    #[test]
    fn test_duplicates_dropped() {
        let mut seq = InboundSequencer::new(8);
        let mut out = Vec::new();

        seq.accept(1, "a", &mut out);
        seq.accept(3, "c", &mut out);

        assert_eq!(seq.accept(1, "again", &mut out), Arrival::Duplicate);
        assert_eq!(seq.accept(3, "again", &mut out), Arrival::Duplicate);
        assert_eq!(seq.accept(0, "zero", &mut out), Arrival::Duplicate);
        assert_eq!(out, vec!["a"]);
    }

    #[test]
    fn test_overflow_leaves_item_out() {
        let mut seq = InboundSequencer::new(1);
        let mut out = Vec::new();

        assert_eq!(seq.accept(3, "c", &mut out), Arrival::Buffered);
        assert_eq!(seq.accept(4, "d", &mut out), Arrival::Overflow);

        assert!(out.is_empty());
        assert_eq!(seq.pending_len(), 1);
        assert_eq!(seq.missing_from(), Some(1));
    }

    #[test]
    fn test_reset() {
        let mut seq = InboundSequencer::new(8);
        let mut out = Vec::new();
        seq.accept(1, 10, &mut out);
        seq.accept(5, 50, &mut out);

        seq.reset();

        assert_eq!(seq.delivered(), 0);
        assert_eq!(seq.pending_len(), 0);
        assert_eq!(seq.accept(1, 11, &mut out), Arrival::InOrder);
    }
}
