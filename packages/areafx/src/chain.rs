//! Ordered effect chain.
//!
//! A chain is two parallel sequences, steps and their parameters, that always
//! have the same length and order. Some effects occupy several consecutive
//! passes (Blur, SeeingWorlds, Bloom). Such a block is created, moved and
//! deleted only as a whole, and only its first step (the lead) accepts
//! structural edits.
//!
//! Group boundaries are recomputed after every mutation and cached as
//! [`GroupSpan`]s, so neighbour lookups never re-scan the sequence.

use thiserror::Error;

use crate::effect::{self, EffectKind, EffectParameters, TargetingMode};
use crate::scene::ObjectId;

/// Structural edit rejected by a [`Chain`]. The chain is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("index {index} is out of range for a chain of {len} passes")]
    OutOfRange { index: usize, len: usize },

    #[error("pass {index} is part of a group; edit its lead pass instead")]
    NotALead { index: usize },

    #[error("{} cannot be added on its own", .0.name())]
    NotInsertable(EffectKind),
}

/// One pass of the chain.
#[derive(Clone, Debug, PartialEq)]
pub struct EffectStep {
    kind: EffectKind,
    mode: TargetingMode,
    target: Option<ObjectId>,
    pass_count: usize,
    label: String,
}

impl EffectStep {
    pub fn kind(&self) -> EffectKind {
        self.kind
    }

    pub fn mode(&self) -> TargetingMode {
        self.mode
    }

    pub fn target(&self) -> Option<ObjectId> {
        self.target
    }

    /// Size of the block this step leads; 1 for single passes and for the
    /// non-lead members of a block.
    pub fn pass_count(&self) -> usize {
        self.pass_count
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A contiguous block of passes: lead index and block length.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GroupSpan {
    pub lead: usize,
    pub len: usize,
}

impl GroupSpan {
    pub fn end(&self) -> usize {
        self.lead + self.len
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.lead && index < self.end()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards index 0 (runs earlier).
    Up,
    /// Towards the end (runs later).
    Down,
}

#[derive(Clone, Debug, Default)]
pub struct Chain {
    steps: Vec<EffectStep>,
    params: Vec<EffectParameters>,
    groups: Vec<GroupSpan>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one user-facing effect, expanding it into its passes.
    ///
    /// Every pass of the block shares `mode`, `target` and `label`. Returns
    /// the index of the new lead pass.
    pub fn append(
        &mut self,
        kind: EffectKind,
        mode: TargetingMode,
        target: Option<ObjectId>,
        label: impl Into<String>,
    ) -> Result<usize, ChainError> {
        if !kind.is_insertable() {
            return Err(ChainError::NotInsertable(kind));
        }

        let label = label.into();
        let lead = self.steps.len();
        let members = effect::group_defaults(kind);
        let pass_count = members.len();

        for (offset, (member, params)) in members.into_iter().enumerate() {
            self.steps.push(EffectStep {
                kind: member,
                mode,
                target,
                pass_count: if offset == 0 { pass_count } else { 1 },
                label: label.clone(),
            });
            self.params.push(params);
        }

        self.reindex();
        log::debug!("Appended {} ({} passes) at {}", kind.name(), pass_count, lead);
        Ok(lead)
    }

    /// Swap the group led by `index` with its neighbour in `direction`.
    ///
    /// Returns `Ok(false)` when the group already sits at that end.
    pub fn move_group(&mut self, index: usize, direction: Direction) -> Result<bool, ChainError> {
        let position = self.group_position(index)?;

        let (first, second) = match direction {
            Direction::Up if position == 0 => return Ok(false),
            Direction::Up => (self.groups[position - 1], self.groups[position]),
            Direction::Down if position + 1 == self.groups.len() => return Ok(false),
            Direction::Down => (self.groups[position], self.groups[position + 1]),
        };

        let range = first.lead..second.end();
        self.steps[range.clone()].rotate_left(first.len);
        self.params[range].rotate_left(first.len);

        self.reindex();
        Ok(true)
    }

    pub fn move_up(&mut self, index: usize) -> Result<bool, ChainError> {
        self.move_group(index, Direction::Up)
    }

    pub fn move_down(&mut self, index: usize) -> Result<bool, ChainError> {
        self.move_group(index, Direction::Down)
    }

    /// Erase the whole group led by `index`.
    pub fn remove(&mut self, index: usize) -> Result<(), ChainError> {
        let span = self.groups[self.group_position(index)?];

        self.steps.drain(span.lead..span.end());
        self.params.drain(span.lead..span.end());

        self.reindex();
        Ok(())
    }

    pub fn clear(&mut self) {
        self.steps.clear();
        self.params.clear();
        self.groups.clear();
    }

    /// Passes in execution order with their parameters.
    pub fn passes(&self) -> impl Iterator<Item = (&EffectStep, &EffectParameters)> + '_ {
        self.steps.iter().zip(self.params.iter())
    }

    pub fn steps(&self) -> &[EffectStep] {
        &self.steps
    }

    pub fn parameters(&self) -> &[EffectParameters] {
        &self.params
    }

    pub fn params(&self, index: usize) -> Option<&EffectParameters> {
        self.params.get(index)
    }

    /// Parameters of one pass, for live edits between frames.
    pub fn params_mut(&mut self, index: usize) -> Option<&mut EffectParameters> {
        self.params.get_mut(index)
    }

    pub fn groups(&self) -> &[GroupSpan] {
        &self.groups
    }

    pub fn is_lead(&self, index: usize) -> bool {
        self.groups.binary_search_by_key(&index, |g| g.lead).is_ok()
    }

    /// The group containing pass `index`.
    pub fn group_at(&self, index: usize) -> Option<GroupSpan> {
        let position = match self.groups.binary_search_by_key(&index, |g| g.lead) {
            Ok(p) => p,
            Err(0) => return None,
            Err(p) => p - 1,
        };
        self.groups.get(position).copied().filter(|g| g.contains(index))
    }

    /// Number of passes.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_count(&self) -> usize {
        self.len()
    }

    /// Number of user-facing effects.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Whether any pass reads the separately rendered merge copy.
    pub fn needs_merge_target(&self) -> bool {
        self.steps.iter().any(|s| s.kind == EffectKind::Merge)
    }

    fn group_position(&self, index: usize) -> Result<usize, ChainError> {
        if index >= self.steps.len() {
            return Err(ChainError::OutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        self.groups
            .binary_search_by_key(&index, |g| g.lead)
            .map_err(|_| ChainError::NotALead { index })
    }

    fn reindex(&mut self) {
        self.groups.clear();
        let mut lead = 0;
        while lead < self.steps.len() {
            let len = self.steps[lead].pass_count.clamp(1, self.steps.len() - lead);
            self.groups.push(GroupSpan { lead, len });
            lead += len;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uniforms::XorShift64;

    fn kinds(chain: &Chain) -> Vec<EffectKind> {
        chain.steps().iter().map(|s| s.kind()).collect()
    }

    fn fullscreen(chain: &mut Chain, kind: EffectKind) -> usize {
        chain
            .append(kind, TargetingMode::Fullscreen, None, kind.name())
            .unwrap()
    }

    fn assert_groups_consistent(chain: &Chain) {
        assert_eq!(chain.steps().len(), chain.parameters().len());
        let mut expected_lead = 0;
        for span in chain.groups() {
            assert_eq!(span.lead, expected_lead);
            let lead = &chain.steps()[span.lead];
            assert_eq!(lead.pass_count(), span.len);
            assert_eq!(lead.kind().group_kinds(), &kinds(chain)[span.lead..span.end()]);
            for step in &chain.steps()[span.lead..span.end()] {
                assert_eq!(step.label(), lead.label());
                assert_eq!(step.mode(), lead.mode());
            }
            for (step, params) in chain.passes().skip(span.lead).take(span.len) {
                assert!(
                    params.matches_kind(step.kind()),
                    "{:?} paired with {:?}",
                    step.kind(),
                    params
                );
            }
            expected_lead = span.end();
        }
        assert_eq!(expected_lead, chain.len());
    }

    #[test]
    fn test_bloom_lifecycle() {
        let mut chain = Chain::new();
        let lead = fullscreen(&mut chain, EffectKind::Bloom);
        assert_eq!(lead, 0);
        assert_eq!(
            kinds(&chain),
            vec![EffectKind::Bloom, EffectKind::Blur, EffectKind::SecondBlur, EffectKind::Merge]
        );
        assert_eq!(chain.params(1), Some(&EffectParameters::Blur { radius: 29 }));
        assert_eq!(chain.group_count(), 1);

        chain.remove(0).unwrap();
        assert!(chain.is_empty());
        assert!(chain.parameters().is_empty());
        assert!(chain.groups().is_empty());
    }

    #[test]
    fn test_move_down_across_mixed_sizes() {
        let mut chain = Chain::new();
        fullscreen(&mut chain, EffectKind::Tint);
        fullscreen(&mut chain, EffectKind::Blur);
        fullscreen(&mut chain, EffectKind::Inverse);

        assert!(chain.move_down(0).unwrap());
        assert_eq!(
            kinds(&chain),
            vec![EffectKind::Blur, EffectKind::SecondBlur, EffectKind::Tint, EffectKind::Inverse]
        );
        assert_eq!(chain.params(0), Some(&EffectParameters::Blur { radius: 5 }));
        assert!(matches!(chain.params(2), Some(EffectParameters::Tint { .. })));
        assert_groups_consistent(&chain);
    }

    #[test]
    fn test_move_up_brings_group_forward() {
        let mut chain = Chain::new();
        fullscreen(&mut chain, EffectKind::Inverse);
        fullscreen(&mut chain, EffectKind::Bloom);

        assert!(chain.move_up(1).unwrap());
        assert_eq!(kinds(&chain)[0], EffectKind::Bloom);
        assert_eq!(kinds(&chain)[4], EffectKind::Inverse);
        assert_eq!(chain.groups(), &[GroupSpan { lead: 0, len: 4 }, GroupSpan { lead: 4, len: 1 }]);
    }

    #[test]
    fn test_boundary_moves_are_noops() {
        let mut chain = Chain::new();
        fullscreen(&mut chain, EffectKind::Tint);
        fullscreen(&mut chain, EffectKind::SeeingWorlds);
        let before = kinds(&chain);

        assert_eq!(chain.move_up(0), Ok(false));
        assert_eq!(chain.move_down(1), Ok(false));
        assert_eq!(kinds(&chain), before);
    }

    #[test]
    fn test_non_lead_edits_are_rejected() {
        let mut chain = Chain::new();
        fullscreen(&mut chain, EffectKind::Blur);
        let before = kinds(&chain);

        assert_eq!(chain.remove(1), Err(ChainError::NotALead { index: 1 }));
        assert_eq!(chain.move_up(1), Err(ChainError::NotALead { index: 1 }));
        assert_eq!(chain.move_down(7), Err(ChainError::OutOfRange { index: 7, len: 2 }));
        assert_eq!(kinds(&chain), before);
    }

    #[test]
    fn test_continuations_cannot_be_appended() {
        let mut chain = Chain::new();
        for kind in [EffectKind::SecondBlur, EffectKind::SecondSeeingWorlds, EffectKind::Merge, EffectKind::None] {
            assert_eq!(
                chain.append(kind, TargetingMode::Fullscreen, None, ""),
                Err(ChainError::NotInsertable(kind))
            );
        }
        assert!(chain.is_empty());
    }

    #[test]
    fn test_group_lookup() {
        let mut chain = Chain::new();
        fullscreen(&mut chain, EffectKind::Tint);
        fullscreen(&mut chain, EffectKind::Bloom);
        assert!(chain.is_lead(1));
        assert!(!chain.is_lead(3));
        assert_eq!(chain.group_at(3), Some(GroupSpan { lead: 1, len: 4 }));
        assert_eq!(chain.group_at(0), Some(GroupSpan { lead: 0, len: 1 }));
        assert_eq!(chain.group_at(5), None);
        assert!(chain.needs_merge_target());
    }

    #[test]
    fn test_group_shares_target_and_label() {
        let mut chain = Chain::new();
        chain
            .append(EffectKind::SeeingWorlds, TargetingMode::Area, Some(ObjectId(2)), "Portal")
            .unwrap();
        for step in chain.steps() {
            assert_eq!(step.target(), Some(ObjectId(2)));
            assert_eq!(step.label(), "Portal");
        }
        assert_eq!(chain.steps()[0].pass_count(), 2);
        assert_eq!(chain.steps()[1].pass_count(), 1);
    }

    #[test]
    fn test_random_edit_sequences_keep_groups_intact() {
        let insertable: Vec<EffectKind> = EffectKind::ALL
            .iter()
            .copied()
            .filter(|k| k.is_insertable())
            .collect();
        let mut rng = XorShift64::new(7);
        let mut chain = Chain::new();

        for _ in 0..2000 {
            let pick = |rng: &mut XorShift64, n: usize| (rng.next_u64() % n.max(1) as u64) as usize;
            match pick(&mut rng, 5) {
                0 | 1 => {
                    let kind = insertable[pick(&mut rng, insertable.len())];
                    let expected = chain.len() + kind.group_size();
                    chain.append(kind, TargetingMode::Fullscreen, None, "").unwrap();
                    assert_eq!(chain.len(), expected);
                }
                2 if !chain.is_empty() => {
                    let span = chain.groups()[pick(&mut rng, chain.group_count())];
                    let expected = chain.len() - span.len;
                    chain.remove(span.lead).unwrap();
                    assert_eq!(chain.len(), expected);
                }
                3 if !chain.is_empty() => {
                    let span = chain.groups()[pick(&mut rng, chain.group_count())];
                    chain.move_up(span.lead).unwrap();
                }
                4 if !chain.is_empty() => {
                    let span = chain.groups()[pick(&mut rng, chain.group_count())];
                    chain.move_down(span.lead).unwrap();
                }
                _ => {
                    let index = pick(&mut rng, chain.len());
                    if !chain.is_lead(index) {
                        let before = kinds(&chain);
                        assert!(chain.remove(index).is_err());
                        assert_eq!(kinds(&chain), before);
                    }
                }
            }
            assert_groups_consistent(&chain);
            if chain.len() > 60 {
                chain.clear();
            }
        }
    }
}
