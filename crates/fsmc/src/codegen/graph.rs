use super::{Codegen, Output};
use crate::model::TransitionKind;
use std::fmt::{self, Write as _};

// Sequence transitions have no single arrow in the source and are omitted.
pub(super) fn write(cg: &Codegen<'_>, f: &mut Output<'_, '_>) -> fmt::Result {
    let fsm = cg.fsm;
    cg.banner(f)?;
    writeln!(f, "digraph {} {{", fsm.id)?;
    for state in fsm.states.values() {
        if state.id == fsm.begin {
            writeln!(f, "    {} [peripheries=2];", state.id)?;
        } else {
            writeln!(f, "    {};", state.id)?;
        }
    }
    for state in fsm.states.values() {
        for transition in state.transitions.values() {
            if let TransitionKind::State(direct) = &transition.kind {
                writeln!(
                    f,
                    "    {} -> {} [label=\"{}\"];",
                    state.id, direct.target, transition.id
                )?;
            }
        }
    }
    writeln!(f, "}}")
}
