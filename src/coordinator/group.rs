//! Per-group state machine: phase map, quorum queries, poll reconciliation
//!
//! One `GroupCoordinator` holds one group's membership and phases. All
//! queries are pure reads over the shared map; all mutations are total
//! overwrites, so every operation is idempotent under retried or
//! duplicated requests. There is no push channel: convergence happens
//! because every member's poll re-derives its next step from the same
//! map, under the group's writer lock.

use crate::checkpoint::Snapshot;
use crate::common::{Error, Result};
use crate::coordinator::Phase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// What the request handler should show a member after an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberView {
    /// The member still owes its artifact.
    Submit,
    /// Member submitted; the rest of the group hasn't.
    AwaitingSubmissions,
    /// This member's submission completed the set: the caller should
    /// compose the derived artifact, then render the review.
    Compose,
    /// An approval round is in flight; show the composed artifact.
    Review,
    /// Member approved; the rest of the group hasn't.
    AwaitingApprovals,
    /// Everyone approved and this member has seen it.
    Done,
}

/// Pending self-correction derived by [`GroupCoordinator::survey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Correction {
    /// All members submitted and no round timer is running yet.
    OpenRound,
    /// The round was rolled back from under the timer; stop it.
    CloseRound,
    /// The round outlived its deadline; the whole group restarts.
    AbortExpired,
    /// A round is already in flight elsewhere; a `Ready` member joins it
    /// rather than stall the group.
    FastForward,
    /// Someone rolled the round back; an `Approved` member follows.
    Regress,
    /// The member observed the group fully approved.
    MarkDone,
}

/// Outcome of one pure state query: either the member's settled view, or
/// the single correction that must be applied before the view settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Survey {
    Settled(MemberView),
    Correct(Correction),
}

/// Result of a reconciling poll.
#[derive(Debug, Clone, Copy)]
pub struct Reconciled {
    /// What the member should see now.
    pub view: MemberView,
    /// Did the phase map change? Changed state must be checkpointed.
    pub changed: bool,
    /// Every member has observed `Done`; the group can be torn down.
    pub complete: bool,
}

/// One group's membership/phase map and transition protocol.
pub struct GroupCoordinator {
    name: String,
    capacity: usize,
    deadline: Option<Duration>,
    members: BTreeMap<String, Phase>,
    /// When the current approval round opened. Not persisted; a restored
    /// in-flight round restarts its clock on the first poll.
    round_opened: Option<Instant>,
}

impl GroupCoordinator {
    pub fn new(
        name: impl Into<String>,
        capacity: usize,
        deadline: Option<Duration>,
    ) -> Result<Self> {
        let name = name.into();
        if capacity == 0 {
            return Err(Error::InvalidConfig(format!(
                "group {} needs a positive capacity",
                name
            )));
        }
        Ok(Self {
            name,
            capacity,
            deadline,
            members: BTreeMap::new(),
            round_opened: None,
        })
    }

    /// Rebuild a group from a restored snapshot. The snapshot does not
    /// carry capacity, so the restored group is exactly as large as its
    /// recorded membership.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let members: BTreeMap<String, Phase> = snapshot.members.into_iter().collect();
        Self {
            name: snapshot.name,
            capacity: members.len(),
            deadline: None,
            members,
            round_opened: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_member(&self, user: &str) -> bool {
        self.members.contains_key(user)
    }

    pub fn phase_of(&self, user: &str) -> Option<Phase> {
        self.members.get(user).copied()
    }

    /// Error out unless `user` has joined this group.
    pub fn expect_member(&self, user: &str) -> Result<()> {
        if self.is_member(user) {
            Ok(())
        } else {
            Err(Error::UnknownMember {
                group: self.name.clone(),
                user: user.to_string(),
            })
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Full membership with phases, in name order.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            name: self.name.clone(),
            members: self
                .members
                .iter()
                .map(|(user, phase)| (user.clone(), *phase))
                .collect(),
        }
    }

    // === Membership ===

    /// Add a member at `Ready`. Re-entry by an existing member (browser
    /// back-button, reconnect) is a no-op returning the current phase.
    pub fn join(&mut self, user: &str) -> Result<Phase> {
        if let Some(phase) = self.members.get(user) {
            return Ok(*phase);
        }
        if self.members.len() >= self.capacity {
            return Err(Error::CapacityExceeded {
                group: self.name.clone(),
                capacity: self.capacity,
            });
        }
        self.members.insert(user.to_string(), Phase::Ready);
        Ok(Phase::Ready)
    }

    /// Overwrite one member's phase. Unknown users are ignored; only
    /// `join` grows the membership.
    pub(crate) fn set_phase(&mut self, user: &str, phase: Phase) {
        if let Some(slot) = self.members.get_mut(user) {
            *slot = phase;
        }
    }

    /// Set every member's phase in one step. Returns whether anything
    /// actually changed.
    pub(crate) fn reset_all(&mut self, phase: Phase) -> bool {
        let mut changed = false;
        for slot in self.members.values_mut() {
            if *slot != phase {
                *slot = phase;
                changed = true;
            }
        }
        changed
    }

    // === Quorum queries ===

    /// True iff the group is at declared capacity and every member holds
    /// `phase`. A partial group never satisfies any all-in-phase check:
    /// it is pending, not complete.
    pub fn all_in_phase(&self, phase: Phase) -> bool {
        self.members.len() == self.capacity && self.members.values().all(|p| *p == phase)
    }

    /// True iff the group is full and every member is `Approved` or
    /// already `Done`. Tolerates members who have moved on ahead.
    pub fn all_approved_or_done(&self) -> bool {
        self.members.len() == self.capacity
            && self
                .members
                .values()
                .all(|p| matches!(p, Phase::Approved | Phase::Done))
    }

    pub fn any_in_phase(&self, phase: Phase) -> bool {
        self.members.values().any(|p| *p == phase)
    }

    // === Approval round ===

    /// Is an approval round in flight? Either the whole group just
    /// submitted, or someone already approved the composed artifact.
    fn round_active(&self) -> bool {
        self.all_in_phase(Phase::Submitted) || self.any_in_phase(Phase::Approved)
    }

    pub fn round_open(&self) -> bool {
        self.round_opened.is_some()
    }

    pub(crate) fn close_round(&mut self) {
        self.round_opened = None;
    }

    // === Transition protocol ===

    /// The one pure state query: derive, from the shared map alone, what
    /// `user` should see and whether a correction is pending. Every
    /// calling boundary goes through this; nothing re-derives phases ad
    /// hoc.
    fn survey(&self, user: &str, now: Instant) -> Survey {
        // Round bookkeeping is group-wide and takes precedence: any
        // member's poll may open the timer or abort an expired round.
        if self.round_active() {
            match self.round_opened {
                None => return Survey::Correct(Correction::OpenRound),
                Some(opened) => {
                    if let Some(deadline) = self.deadline {
                        if now.duration_since(opened) >= deadline && !self.all_approved_or_done() {
                            return Survey::Correct(Correction::AbortExpired);
                        }
                    }
                }
            }
        } else if self.round_opened.is_some() {
            return Survey::Correct(Correction::CloseRound);
        }

        // Membership is checked by reconcile before we get here.
        let phase = match self.members.get(user) {
            Some(phase) => *phase,
            None => return Survey::Settled(MemberView::Submit),
        };

        match phase {
            Phase::Ready => {
                if self.any_in_phase(Phase::Approved) {
                    Survey::Correct(Correction::FastForward)
                } else {
                    Survey::Settled(MemberView::Submit)
                }
            }
            Phase::Submitted => {
                if self.round_active() {
                    Survey::Settled(MemberView::Review)
                } else {
                    Survey::Settled(MemberView::AwaitingSubmissions)
                }
            }
            Phase::Approved => {
                if self.all_approved_or_done() {
                    Survey::Correct(Correction::MarkDone)
                } else if self.any_in_phase(Phase::Ready) {
                    Survey::Correct(Correction::Regress)
                } else {
                    Survey::Settled(MemberView::AwaitingApprovals)
                }
            }
            Phase::Done => Survey::Settled(MemberView::Done),
        }
    }

    fn apply(&mut self, correction: Correction, user: &str, now: Instant) -> bool {
        match correction {
            Correction::OpenRound => {
                tracing::debug!("Group {}: approval round opened", self.name);
                self.round_opened = Some(now);
                // Timer only; the phase map is untouched.
                false
            }
            Correction::CloseRound => {
                self.round_opened = None;
                false
            }
            Correction::AbortExpired => {
                tracing::info!("Group {}: approval round expired, restarting", self.name);
                self.round_opened = None;
                self.reset_all(Phase::Ready)
            }
            Correction::FastForward => {
                tracing::debug!("Group {}: fast-forwarding {} into the round", self.name, user);
                self.set_phase(user, Phase::Submitted);
                true
            }
            Correction::Regress => {
                tracing::debug!("Group {}: {} follows rollback, back to submitted", self.name, user);
                self.set_phase(user, Phase::Submitted);
                true
            }
            Correction::MarkDone => {
                self.set_phase(user, Phase::Done);
                true
            }
        }
    }

    /// Reconcile `user` against the group: apply pending corrections
    /// until the survey settles, then report the member's view, whether
    /// the phase map changed, and whether the whole group is done.
    ///
    /// Each correction strictly advances the member or restarts the
    /// group, so the loop settles within a few steps.
    pub fn reconcile(&mut self, user: &str, now: Instant) -> Result<Reconciled> {
        self.expect_member(user)?;

        let mut changed = false;
        loop {
            match self.survey(user, now) {
                Survey::Settled(view) => {
                    return Ok(Reconciled {
                        view,
                        changed,
                        complete: self.all_in_phase(Phase::Done),
                    });
                }
                Survey::Correct(correction) => {
                    changed |= self.apply(correction, user, now);
                }
            }
        }
    }
}
