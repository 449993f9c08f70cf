use super::{Codegen, Output, DEBUG_MACRO};
use crate::model::Transition;
use std::fmt::{self, Write as _};

pub(super) fn write(cg: &Codegen<'_>, f: &mut Output<'_, '_>) -> fmt::Result {
    let fsm = cg.fsm;

    cg.banner(f)?;
    writeln!(f, "#pragma once")?;
    writeln!(f)?;
    if let Some(header) = &fsm.header {
        cg.verbatim(f, header)?;
        writeln!(f)?;
    }

    writeln!(f, "class {};", fsm.class)?;
    writeln!(f)?;
    writeln!(f, "class {} {{", fsm.id)?;
    writeln!(f, "public:")?;
    writeln!(f, "    enum State {{")?;
    for state in fsm.states.values() {
        writeln!(f, "        {},", state.id)?;
    }
    writeln!(f, "    }};")?;
    writeln!(f)?;
    writeln!(f, "    explicit {}({}& {});", fsm.id, fsm.class, fsm.ctx)?;
    writeln!(f)?;
    writeln!(f, "    State currentState() const {{ return state_; }}")?;
    writeln!(f)?;
    for transition in fsm.methods().values() {
        writeln!(f, "    {};", method_signature(transition))?;
    }
    writeln!(f)?;

    writeln!(f, "protected:")?;
    writeln!(f, "    bool before();")?;
    writeln!(f, "    bool before(State state);")?;
    writeln!(f, "    void after();")?;
    writeln!(f, "    void after(State state);")?;
    writeln!(f)?;

    writeln!(f, "#ifdef {}", DEBUG_MACRO)?;
    writeln!(f, "public:")?;
    writeln!(f, "    static const char* stateName(State state);")?;
    writeln!(
        f,
        "    void trace(const char* transition, State from, State to, bool ok) const;"
    )?;
    writeln!(f, "#endif")?;
    writeln!(f)?;

    writeln!(f, "private:")?;
    writeln!(f, "    {}& {};", fsm.class, fsm.ctx)?;
    writeln!(f, "    State state_;")?;
    writeln!(f, "}};")?;
    Ok(())
}

// `bool name(T1 a, T2 b)`
fn method_signature(transition: &Transition) -> impl fmt::Display + '_ {
    crate::util::display_fn(move |f| write!(f, "bool {}", transition.signature()))
}

#[cfg(test)]
mod tests {
    use super::super::{tests::*, Codegen};

    #[test]
    fn declaration_lists_states_and_methods() {
        let fsm = load(DOOR);
        let header = Codegen::new(&fsm, "/src/door.fsm", "door")
            .header()
            .to_string();

        assert!(header.starts_with("// Generated by fsmc from /src/door.fsm. Do not edit.\n"));
        assert!(header.contains("#line 1 \"/src/door.fsm\"\n #include \"door_ctx.h\" \n"));
        assert!(header.contains(
            "    enum State {\n        Closed,\n        Locked,\n        Open,\n    };\n"
        ));
        assert!(header.contains("    explicit Door(DoorCtx& ctx);\n"));
        assert!(header.contains(
            "    bool close();\n    bool kick(int force);\n    bool lock();\n    bool open(int force);\n    bool unlock();\n"
        ));
        assert!(header.contains("    bool before(State state);\n"));
        assert!(header.contains("#ifdef FSM_DEBUG\n"));
        // back to the generated file after the verbatim block.
        assert!(header.contains(" #include \"door_ctx.h\" \n#line 7 \"door.h\"\n"));
        assert!(header.contains("    DoorCtx& ctx;\n    State state_;\n"));
    }
}
