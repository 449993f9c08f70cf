//! Reference checking and sequence target resolution.

use crate::{
    error::{Error, ErrorKind},
    model::{Fsm, Sequence, State, Transition, TransitionKind},
    types::Map,
};
use rustc_hash::FxHashSet;

/// Resolve every sequence transition and check every reference.
///
/// All states and transitions are visited in sorted order; the first error
/// found is returned.
pub fn validate(fsm: &mut Fsm) -> Result<(), Error> {
    let span = tracing::trace_span!("validate");
    let _entered = span.enter();

    let resolved = resolve_all(fsm)?;
    check_signatures(fsm)?;

    for ((state_id, transition_id), target) in resolved {
        let transition = fsm
            .states
            .get_mut(&state_id)
            .and_then(|state| state.transitions.get_mut(&transition_id));
        if let Some(transition) = transition {
            if let TransitionKind::Sequence(seq) = &mut transition.kind {
                tracing::trace!("{}::{} resolves to {}", state_id, transition_id, target);
                seq.resolved = Some(target);
            }
        }
    }
    fsm.sort();

    tracing::debug!("validated fsm `{}'", fsm.id);
    Ok(())
}

fn resolve_all(fsm: &Fsm) -> Result<Map<(String, String), String>, Error> {
    let mut resolver = Resolver {
        fsm,
        resolved: Map::default(),
    };
    for state in fsm.states.values() {
        for transition in state.transitions.values() {
            match &transition.kind {
                TransitionKind::State(direct) => {
                    resolver.lookup_state(&direct.target, direct.target_line)?;
                }
                TransitionKind::Sequence(seq) => {
                    resolver.resolve(state, transition, seq)?;
                }
            }
        }
    }
    Ok(resolver.resolved)
}

struct Resolver<'a> {
    fsm: &'a Fsm,
    resolved: Map<(String, String), String>,
}

/// A sequence under resolution.
struct Frame<'a> {
    state: &'a State,
    transition: &'a Transition,
    seq: &'a Sequence,
    // index of the next step to run.
    step: usize,
    // the simulated state reached by the steps run so far.
    current: &'a State,
}

impl<'a> Frame<'a> {
    fn new(state: &'a State, transition: &'a Transition, seq: &'a Sequence) -> Self {
        Self {
            state,
            transition,
            seq,
            step: 0,
            current: state,
        }
    }

    fn key(&self) -> (&'a str, &'a str) {
        (self.state.id.as_str(), self.transition.id.as_str())
    }
}

impl<'a> Resolver<'a> {
    fn lookup_state(&self, id: &str, line: usize) -> Result<&'a State, Error> {
        self.fsm
            .state(id)
            .ok_or_else(|| Error::new(line, ErrorKind::UnknownState { id: id.to_owned() }))
    }

    fn memoized(&self, state: &State, transition: &Transition) -> Option<&str> {
        self.resolved
            .get(&(state.id.clone(), transition.id.clone()))
            .map(String::as_str)
    }

    /// Resolve the final state of the sequence `seq` declared by `transition`
    /// in `state`, by simulating its call chain.
    ///
    /// Nested sequences are walked with an explicit stack of frames, so the
    /// depth of a call chain is only bounded by memory.
    fn resolve(
        &mut self,
        state: &'a State,
        transition: &'a Transition,
        seq: &'a Sequence,
    ) -> Result<&'a State, Error> {
        if let Some(target) = self.memoized(state, transition) {
            return self.lookup_state(target, transition.line);
        }

        let mut stack = vec![Frame::new(state, transition, seq)];
        let mut active: FxHashSet<(&'a str, &'a str)> = FxHashSet::default();
        active.insert((state.id.as_str(), transition.id.as_str()));
        // the final state of the step that just completed.
        let mut returned: Option<&'a State> = None;

        while let Some(frame) = stack.last_mut() {
            if let Some(target) = returned.take() {
                frame.current = target;
                frame.step += 1;
            }

            let seq = frame.seq;
            let current = frame.current;
            let Some(step) = seq.steps.get(frame.step) else {
                let key = frame.key();
                active.remove(&key);
                self.resolved
                    .insert((key.0.to_owned(), key.1.to_owned()), current.id.clone());
                stack.pop();
                returned = Some(current);
                continue;
            };

            let callee = current.transitions.get(&*step.id).ok_or_else(|| {
                Error::new(
                    step.line,
                    ErrorKind::UnknownTransition {
                        id: step.id.clone(),
                        state: current.id.clone(),
                    },
                )
            })?;
            if callee.params.len() != step.args.len() {
                return Err(Error::new(
                    step.line,
                    ErrorKind::ConflictingSignature {
                        id: step.id.clone(),
                        detail: format!(
                            "called with {} argument(s) but `{}' takes {}",
                            step.args.len(),
                            callee.signature(),
                            callee.params.len()
                        ),
                    },
                ));
            }

            match &callee.kind {
                TransitionKind::State(direct) => {
                    returned = Some(self.lookup_state(&direct.target, direct.target_line)?);
                }
                TransitionKind::Sequence(nested) => {
                    if let Some(target) = self.memoized(current, callee) {
                        returned = Some(self.lookup_state(target, callee.line)?);
                    } else if !active.insert((current.id.as_str(), callee.id.as_str())) {
                        return Err(Error::new(
                            callee.line,
                            ErrorKind::RecursiveSequence {
                                id: callee.id.clone(),
                                state: current.id.clone(),
                            },
                        ));
                    } else {
                        stack.push(Frame::new(current, callee, nested));
                    }
                }
            }
        }

        returned.ok_or_else(|| {
            Error::new(
                transition.line,
                ErrorKind::UnknownTransition {
                    id: transition.id.clone(),
                    state: state.id.clone(),
                },
            )
        })
    }
}

/// Transitions sharing an id must share their parameter types, since a single
/// method is generated for them.
fn check_signatures(fsm: &Fsm) -> Result<(), Error> {
    let methods = fsm.methods();
    for state in fsm.states.values() {
        for transition in state.transitions.values() {
            let Some(first) = methods.get(transition.id.as_str()) else {
                continue;
            };
            if !transition.param_types().eq(first.param_types()) {
                return Err(Error::new(
                    transition.line,
                    ErrorKind::ConflictingSignature {
                        id: transition.id.clone(),
                        detail: format!(
                            "`{}' in state `{}' differs from `{}'",
                            transition.signature(),
                            state.id,
                            first.signature()
                        ),
                    },
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lexer, lexer::LexerConfig, parser, relex};

    fn load(source: &str) -> Result<Fsm, Error> {
        let config = LexerConfig::default();
        let mut tokens = lexer::tokenize(source, 1, &config)?;
        relex::explode(&mut tokens, &config)?;
        let mut fsm = parser::parse(&tokens)?;
        validate(&mut fsm)?;
        Ok(fsm)
    }

    fn target<'a>(fsm: &'a Fsm, state: &str, transition: &str) -> Option<&'a str> {
        fsm.states[state].transitions[transition].target()
    }

    #[test]
    fn sequence_resolves_through_the_chain() {
        let fsm = load(
            "fsm F { class C as c;
                A { x => B; z => x(), y(); }
                B { y => C; }
                C { }
            }",
        )
        .unwrap();
        assert_eq!(target(&fsm, "A", "z"), Some("C"));
        assert_eq!(target(&fsm, "A", "x"), Some("B"));
    }

    #[test]
    fn nested_sequences_resolve_first() {
        let fsm = load(
            "fsm F { class C as c;
                A { x => B; w => z(), back(); z => x(), y(); }
                B { y => C; }
                C { back => A; }
            }",
        )
        .unwrap();
        assert_eq!(target(&fsm, "A", "z"), Some("C"));
        assert_eq!(target(&fsm, "A", "w"), Some("A"));
    }

    #[test]
    fn sequence_with_arguments() {
        let fsm = load(
            "fsm F { class C as c;
                A { go(int n) => B; twice(int n) => go(n), go(n); }
                B { go(int n) => A; }
            }",
        )
        .unwrap();
        assert_eq!(target(&fsm, "A", "twice"), Some("A"));
    }

    #[test]
    fn unknown_target_state() {
        let err = load("fsm F { class C as c;\n A { x => Nowhere; } }").unwrap_err();
        assert_eq!(err.line(), 2);
        assert_eq!(
            *err.kind(),
            ErrorKind::UnknownState {
                id: "Nowhere".into()
            }
        );
        assert!(err.kind().is_unknown_reference());
    }

    #[test]
    fn unknown_step_in_simulated_state() {
        // `x` exists in A but not in B, where the second step runs.
        let err = load(
            "fsm F { class C as c;
                A { x => B; z => x(),\n x(); }
                B { }
            }",
        )
        .unwrap_err();
        assert_eq!(err.line(), 3);
        assert_eq!(
            *err.kind(),
            ErrorKind::UnknownTransition {
                id: "x".into(),
                state: "B".into()
            }
        );
    }

    #[test]
    fn deep_sequence_chain() {
        let n = 20_000;
        let mut source = String::from("fsm F { class C as c;\n A {\n");
        for i in 0..n {
            source.push_str(&format!("  t{} => t{}();\n", i, i + 1));
        }
        source.push_str(&format!("  t{} => B;\n }}\n B {{ }}\n}}\n", n));

        let fsm = load(&source).unwrap();
        assert_eq!(target(&fsm, "A", "t0"), Some("B"));
        assert_eq!(target(&fsm, "A", &format!("t{}", n / 2)), Some("B"));
    }

    #[test]
    fn shared_sequence_is_resolved_per_state() {
        let fsm = load(
            "fsm F { class C as c;
                A { x => B; twice => hop(), hop(); hop => x(); }
                B { x => A; hop => x(); }
            }",
        )
        .unwrap();
        assert_eq!(target(&fsm, "A", "hop"), Some("B"));
        assert_eq!(target(&fsm, "B", "hop"), Some("A"));
        assert_eq!(target(&fsm, "A", "twice"), Some("A"));
    }

    #[test]
    fn indirect_recursion_is_rejected() {
        let err = load("fsm F { class C as c;\n A { p => q();\n q => p(); } }").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RecursiveSequence { state, .. } if state == "A"));
        assert!(err.kind().is_unknown_reference());
    }

    #[test]
    fn recursive_sequence_is_rejected() {
        let err = load("fsm F { class C as c;\n A { z => z(); } }").unwrap_err();
        assert_eq!(err.line(), 2);
        assert!(matches!(err.kind(), ErrorKind::RecursiveSequence { id, .. } if id == "z"));
    }

    #[test]
    fn first_error_in_sorted_order() {
        let err = load(
            "fsm F { class C as c;
                Zed { a => Missing1; }
                Abc { b => Missing2; }
            }",
        )
        .unwrap_err();
        assert_eq!(
            *err.kind(),
            ErrorKind::UnknownState {
                id: "Missing2".into()
            }
        );
    }

    #[test]
    fn conflicting_signatures() {
        let err = load(
            "fsm F { class C as c;
                A { go(int n) => B; }
                B {\n go(float n) => A; }
            }",
        )
        .unwrap_err();
        assert_eq!(err.line(), 4);
        assert!(matches!(err.kind(), ErrorKind::ConflictingSignature { id, .. } if id == "go"));

        let err = load("fsm F { class C as c; A { go(int n) => A; z => go(); } }").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ConflictingSignature { id, .. } if id == "go"));
    }
}
