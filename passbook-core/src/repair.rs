//! Bounded propose/validate loop for parser repair.
//!
//! Stages: `Propose → Validate → Accept | Retry → Propose … | Fail`.
//! The loop knows nothing about parsing: proposals come from a `ProposalSource`
//! and are judged by a `Validator`.

use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Propose { attempt: u32 },
    Validate { attempt: u32 },
    Accept { attempt: u32 },
    Retry { attempt: u32, reason: String },
    Fail { reason: String },
}

/// Produces the proposal for a given attempt (1-based). `None` means nothing left to try.
pub trait ProposalSource {
    type Proposal;

    fn propose(&mut self, attempt: u32) -> Option<Self::Proposal>;
}

/// Accepts a proposal or explains why it was rejected.
pub trait Validator<P> {
    fn validate(&mut self, proposal: &P) -> Result<(), String>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<P> {
    Accepted { proposal: P, attempts: u32 },
    Failed { attempts: u32, reason: String },
}

impl<P> Outcome<P> {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Outcome::Accepted { .. })
    }
}

#[derive(Debug, Clone)]
pub struct RepairLoop {
    max_attempts: u32,
    trace: Vec<Stage>,
}

impl RepairLoop {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            trace: Vec::new(),
        }
    }

    /// Every stage visited by the last `run`, in order.
    pub fn trace(&self) -> &[Stage] {
        &self.trace
    }

    pub fn run<S, V>(&mut self, source: &mut S, validator: &mut V) -> Outcome<S::Proposal>
    where
        S: ProposalSource,
        V: Validator<S::Proposal>,
    {
        self.trace.clear();

        let mut current: Option<S::Proposal> = None;
        let mut attempts = 0;
        let mut stage = Stage::Propose { attempt: 1 };

        loop {
            self.trace.push(stage.clone());

            stage = match stage {
                Stage::Propose { attempt } => {
                    if attempt > self.max_attempts {
                        Stage::Fail {
                            reason: format!("attempt budget of {} exhausted", self.max_attempts),
                        }
                    } else {
                        match source.propose(attempt) {
                            Some(p) => {
                                attempts = attempt;
                                current = Some(p);
                                Stage::Validate { attempt }
                            }
                            None => Stage::Fail {
                                reason: format!("no proposal available for attempt {}", attempt),
                            },
                        }
                    }
                }

                Stage::Validate { attempt } => match current.as_ref() {
                    Some(p) => match validator.validate(p) {
                        Ok(()) => Stage::Accept { attempt },
                        Err(reason) => Stage::Retry { attempt, reason },
                    },
                    None => Stage::Fail {
                        reason: "nothing to validate".to_string(),
                    },
                },

                Stage::Retry { attempt, reason } => {
                    warn!(attempt, %reason, "proposal rejected");
                    if attempt >= self.max_attempts {
                        Stage::Fail {
                            reason: format!("gave up after {} attempt(s): {}", attempt, reason),
                        }
                    } else {
                        Stage::Propose {
                            attempt: attempt + 1,
                        }
                    }
                }

                Stage::Accept { attempt } => match current.take() {
                    Some(proposal) => {
                        info!(attempt, "proposal accepted");
                        return Outcome::Accepted {
                            proposal,
                            attempts: attempt,
                        };
                    }
                    None => Stage::Fail {
                        reason: "accepted proposal went missing".to_string(),
                    },
                },

                Stage::Fail { reason } => {
                    return Outcome::Failed { attempts, reason };
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Numbers(Vec<u32>);

    impl ProposalSource for Numbers {
        type Proposal = u32;

        fn propose(&mut self, attempt: u32) -> Option<u32> {
            self.0.get(attempt as usize - 1).copied()
        }
    }

    /// Accepts only the wanted number and counts calls.
    struct Wants {
        wanted: u32,
        calls: u32,
    }

    impl Validator<u32> for Wants {
        fn validate(&mut self, p: &u32) -> Result<(), String> {
            self.calls += 1;
            if *p == self.wanted {
                Ok(())
            } else {
                Err(format!("{} is not {}", p, self.wanted))
            }
        }
    }

    #[test]
    fn test_accepts_first_valid() {
        let mut lp = RepairLoop::new(3);
        let mut v = Wants { wanted: 7, calls: 0 };
        let out = lp.run(&mut Numbers(vec![7, 8]), &mut v);
        assert_eq!(out, Outcome::Accepted { proposal: 7, attempts: 1 });
        assert_eq!(v.calls, 1);
        assert_eq!(
            lp.trace(),
            &[
                Stage::Propose { attempt: 1 },
                Stage::Validate { attempt: 1 },
                Stage::Accept { attempt: 1 },
            ]
        );
    }

    #[test]
    fn test_retries_until_valid() {
        let mut lp = RepairLoop::new(3);
        let mut v = Wants { wanted: 9, calls: 0 };
        let out = lp.run(&mut Numbers(vec![1, 9]), &mut v);
        assert_eq!(out, Outcome::Accepted { proposal: 9, attempts: 2 });
        assert!(lp.trace().iter().any(|s| matches!(s, Stage::Retry { attempt: 1, .. })));
    }

    #[test]
    fn test_fails_when_budget_exhausted() {
        let mut lp = RepairLoop::new(2);
        let mut v = Wants { wanted: 99, calls: 0 };
        let out = lp.run(&mut Numbers(vec![1, 2, 3, 99]), &mut v);
        match out {
            Outcome::Failed { attempts, reason } => {
                assert_eq!(attempts, 2);
                assert!(reason.contains("2 is not 99"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(v.calls, 2);
    }

    #[test]
    fn test_fails_when_proposals_run_out() {
        let mut lp = RepairLoop::new(5);
        let mut v = Wants { wanted: 99, calls: 0 };
        let out = lp.run(&mut Numbers(vec![1]), &mut v);
        assert!(!out.is_accepted());
        assert!(matches!(lp.trace().last(), Some(Stage::Fail { .. })));
    }

    #[test]
    fn test_zero_budget_never_proposes() {
        let mut lp = RepairLoop::new(0);
        let mut v = Wants { wanted: 1, calls: 0 };
        let out = lp.run(&mut Numbers(vec![1]), &mut v);
        assert_eq!(
            out,
            Outcome::Failed {
                attempts: 0,
                reason: "attempt budget of 0 exhausted".to_string()
            }
        );
        assert_eq!(v.calls, 0);
    }
}
