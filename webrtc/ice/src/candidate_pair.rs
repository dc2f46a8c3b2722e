//! ICE candidate pair management.

use crate::candidate::Candidate;

/// Represents a pair of local and remote candidates for connectivity checking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePair {
    pub local: Candidate,
    pub remote: Candidate,
    pub priority: u64,
    /// A check succeeded in either direction
    pub valid: bool,
    /// Nominated by the controlling agent
    pub nominated: bool,
}

impl CandidatePair {
    /// Creates a pair whose priority depends on which side is controlling.
    pub fn new(local: Candidate, remote: Candidate, is_controlling: bool) -> Self {
        let priority = Self::priority_for(&local, &remote, is_controlling);
        Self {
            local,
            remote,
            priority,
            valid: false,
            nominated: false,
        }
    }

    /// Recomputes the priority once the role is known.
    pub(crate) fn set_role(&mut self, is_controlling: bool) {
        self.priority = Self::priority_for(&self.local, &self.remote, is_controlling);
    }

    fn priority_for(local: &Candidate, remote: &Candidate, is_controlling: bool) -> u64 {
        if is_controlling {
            Self::calculate_priority(local.priority, remote.priority)
        } else {
            Self::calculate_priority(remote.priority, local.priority)
        }
    }

    /// pair priority = 2^32 * MIN(G,D) + 2 * MAX(G,D) + (G>D?1:0)
    ///
    /// `g` belongs to the controlling agent, `d` to the controlled one.
    fn calculate_priority(g: u32, d: u32) -> u64 {
        let min = g.min(d) as u64;
        let max = g.max(d) as u64;
        let g_greater = if g > d { 1u64 } else { 0u64 };

        (1u64 << 32) * min + 2 * max + g_greater
    }
}

impl std::fmt::Display for CandidatePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} <-> {} {}",
            self.local.candidate_type,
            self.local.address,
            self.remote.candidate_type,
            self.remote.address
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(priority: u32, port: u16) -> Candidate {
        let mut candidate = Candidate::host(format!("192.168.1.1:{}", port).parse().unwrap(), 1);
        candidate.priority = priority;
        candidate
    }

    #[test]
    fn test_priority_when_g_greater_than_d() {
        let pair = CandidatePair::new(candidate(2000, 1), candidate(1000, 2), true);
        assert_eq!(pair.priority, (1u64 << 32) * 1000 + 2 * 2000 + 1);
    }

    #[test]
    fn test_priority_when_d_greater_than_g() {
        let pair = CandidatePair::new(candidate(1000, 1), candidate(2000, 2), true);
        assert_eq!(pair.priority, (1u64 << 32) * 1000 + 2 * 2000);
    }

    #[test]
    fn test_both_sides_agree_on_priority() {
        let a = candidate(3000, 1);
        let b = candidate(1000, 2);
        let controlling = CandidatePair::new(a.clone(), b.clone(), true);
        let controlled = CandidatePair::new(b, a, false);
        assert_eq!(controlling.priority, controlled.priority);
    }

    #[test]
    fn test_set_role_recomputes() {
        let mut pair = CandidatePair::new(candidate(3000, 1), candidate(1000, 2), false);
        let before = pair.priority;
        pair.set_role(true);
        assert_eq!(pair.priority, before + 1);
        assert!(!pair.valid && !pair.nominated);
    }
}
