// src/cursor/tracker.rs

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::feed::SeqToken;

/// What intake should do with an event arriving from the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// First sighting; dispatch it.
    New,
    /// Previously failed; dispatch it again.
    Retry,
    /// Already queued or running after a redelivery; drop the duplicate.
    InFlight,
    /// Acknowledged above the watermark; nothing to do.
    AlreadyAcked,
    /// At or below the watermark; nothing to do.
    BelowWatermark,
}

impl Admission {
    pub fn should_dispatch(self) -> bool {
        matches!(self, Admission::New | Admission::Retry)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    InFlight,
    Failed,
    /// Acknowledged run from the key through `through`, covering every token
    /// admitted in between.
    Acked { through: SeqToken },
}

/// Low-watermark bookkeeping over admitted sequence tokens.
///
/// Events are admitted in feed order and may finish in any order. The
/// watermark is the highest token `w` such that every admitted event with
/// sequence `<= w` was acknowledged; a failed or unfinished event pins it.
///
/// Adjacent acknowledged events collapse into one run, so the map holds at
/// most one entry per unfinished or failed event plus one run between each
/// of them, however long the watermark stays pinned.
#[derive(Debug, Clone)]
pub struct CommitTracker {
    watermark: SeqToken,
    slots: BTreeMap<SeqToken, Slot>,
}

impl CommitTracker {
    pub fn new(watermark: SeqToken) -> Self {
        Self {
            watermark,
            slots: BTreeMap::new(),
        }
    }

    pub fn watermark(&self) -> &SeqToken {
        &self.watermark
    }

    pub fn admit(&mut self, seq: &SeqToken) -> Admission {
        if *seq <= self.watermark {
            return Admission::BelowWatermark;
        }

        match self.slots.get_mut(seq) {
            Some(slot @ Slot::Failed) => {
                *slot = Slot::InFlight;
                return Admission::Retry;
            }
            Some(Slot::InFlight) => return Admission::InFlight,
            Some(Slot::Acked { .. }) => return Admission::AlreadyAcked,
            None => {}
        }

        // Feeds deliver in order, so a token inside an acknowledged run was
        // seen before.
        let covering = self.slots.range::<SeqToken, _>(..seq).next_back();
        if let Some((_, Slot::Acked { through })) = covering {
            if seq <= through {
                return Admission::AlreadyAcked;
            }
        }

        self.slots.insert(seq.clone(), Slot::InFlight);
        Admission::New
    }

    /// Record the end of an admitted event. Returns the new watermark when it
    /// moved. Unknown or already acknowledged tokens are ignored.
    pub fn finish(&mut self, seq: &SeqToken, acked: bool) -> Option<SeqToken> {
        let slot = self.slots.get_mut(seq)?;
        if matches!(slot, Slot::Acked { .. }) {
            return None;
        }
        if !acked {
            *slot = Slot::Failed;
            return None;
        }

        let next = self
            .slots
            .range::<SeqToken, _>((Bound::Excluded(seq), Bound::Unbounded))
            .next()
            .and_then(|(key, slot)| match slot {
                Slot::Acked { through } => Some((key.clone(), through.clone())),
                _ => None,
            });
        let prev = self
            .slots
            .range::<SeqToken, _>(..seq)
            .next_back()
            .and_then(|(key, slot)| matches!(slot, Slot::Acked { .. }).then(|| key.clone()));

        let mut through = seq.clone();
        if let Some((next_key, next_through)) = next {
            self.slots.remove(&next_key);
            through = next_through;
        }
        match prev {
            Some(prev_key) => {
                self.slots.remove(seq);
                self.slots.insert(prev_key, Slot::Acked { through });
            }
            None => {
                self.slots.insert(seq.clone(), Slot::Acked { through });
            }
        }

        let before = self.watermark.clone();
        while let Some(entry) = self.slots.first_entry() {
            let Slot::Acked { through } = entry.get() else {
                break;
            };
            let through = through.clone();
            entry.remove();
            self.watermark = through;
        }

        (self.watermark != before).then(|| self.watermark.clone())
    }

    /// Admitted events that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, Slot::InFlight))
            .count()
    }

    /// Failed events currently pinning the watermark.
    pub fn failed(&self) -> Vec<SeqToken> {
        self.slots
            .iter()
            .filter(|(_, s)| matches!(s, Slot::Failed))
            .map(|(t, _)| t.clone())
            .collect()
    }

    pub fn has_failed(&self) -> bool {
        self.slots.values().any(|s| matches!(s, Slot::Failed))
    }

    /// Entries held above the watermark.
    pub fn tracked(&self) -> usize {
        self.slots.len()
    }
}
