//! Redelivery filter for inbound proctor messages.

/// Admits each sequence number at most once.
///
/// The proctor numbers messages with a monotonically increasing `seq`; a
/// message at or below the highest number already admitted is a redelivery.
/// Messages without a sequence number cannot be deduplicated and are always
/// admitted.
#[derive(Debug, Clone, Default)]
pub struct SequenceFilter {
    highest: Option<u64>,
    rejected: u64,
}

impl SequenceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a message carrying `seq` should be delivered.
    pub fn admit(&mut self, seq: Option<u64>) -> bool {
        let Some(seq) = seq else {
            return true;
        };
        match self.highest {
            Some(highest) if seq <= highest => {
                self.rejected += 1;
                false
            }
            _ => {
                self.highest = Some(seq);
                true
            }
        }
    }

    /// Highest sequence number admitted so far.
    pub fn highest(&self) -> Option<u64> {
        self.highest
    }

    /// Messages rejected as redeliveries.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
