use super::{rewrite_precondition, Codegen, Output, DEBUG_MACRO};
use crate::{
    model::{Direct, Sequence, State, Transition, TransitionKind, Verbatim},
    util::join,
};
use std::fmt::{self, Write as _};

pub(super) fn write(cg: &Codegen<'_>, f: &mut Output<'_, '_>) -> fmt::Result {
    let fsm = cg.fsm;

    cg.banner(f)?;
    writeln!(f, "#include \"{}.h\"", cg.base_name)?;
    writeln!(f)?;
    if let Some(cpp) = &fsm.cpp {
        cg.verbatim(f, cpp)?;
        writeln!(f)?;
    }

    writeln!(
        f,
        "{id}::{id}({class}& {ctx}) : {ctx}({ctx}), state_({begin}) {{}}",
        id = fsm.id,
        class = fsm.class,
        ctx = fsm.ctx,
        begin = fsm.begin,
    )?;
    writeln!(f)?;

    write_global_hook(cg, f, "bool", "before", fsm.before.as_ref())?;
    write_state_hook(cg, f, "bool", "before", |state| state.before.as_ref())?;
    write_global_hook(cg, f, "void", "after", fsm.after.as_ref())?;
    write_state_hook(cg, f, "void", "after", |state| state.after.as_ref())?;

    for (id, method) in fsm.methods() {
        write_dispatch(cg, f, id, method)?;
    }

    write_debug_helpers(cg, f)?;
    Ok(())
}

fn write_global_hook(
    cg: &Codegen<'_>,
    f: &mut Output<'_, '_>,
    ret: &str,
    name: &str,
    hook: Option<&Verbatim>,
) -> fmt::Result {
    writeln!(f, "{} {}::{}() {{", ret, cg.fsm.id, name)?;
    if let Some(hook) = hook {
        cg.verbatim(f, hook)?;
    }
    if ret == "bool" {
        writeln!(f, "    return true;")?;
    }
    writeln!(f, "}}")?;
    writeln!(f)
}

fn write_state_hook(
    cg: &Codegen<'_>,
    f: &mut Output<'_, '_>,
    ret: &str,
    name: &str,
    hook: impl Fn(&State) -> Option<&Verbatim>,
) -> fmt::Result {
    writeln!(f, "{} {}::{}(State state) {{", ret, cg.fsm.id, name)?;
    let hooked: Vec<_> = cg
        .fsm
        .states
        .values()
        .filter_map(|state| hook(state).map(|block| (state, block)))
        .collect();
    if hooked.is_empty() {
        writeln!(f, "    (void)state;")?;
    } else {
        writeln!(f, "    switch (state) {{")?;
        for (state, block) in hooked {
            writeln!(f, "    case {}: {{", state.id)?;
            cg.verbatim(f, block)?;
            writeln!(f, "        break;")?;
            writeln!(f, "    }}")?;
        }
        writeln!(f, "    default:")?;
        writeln!(f, "        break;")?;
        writeln!(f, "    }}")?;
    }
    if ret == "bool" {
        writeln!(f, "    return true;")?;
    }
    writeln!(f, "}}")?;
    writeln!(f)
}

fn write_dispatch(
    cg: &Codegen<'_>,
    f: &mut Output<'_, '_>,
    id: &str,
    method: &Transition,
) -> fmt::Result {
    let params = method
        .params
        .iter()
        .map(|p| format!("{} {}", p.ty, p.id))
        .collect::<Vec<_>>();
    writeln!(
        f,
        "bool {}::{}({}) {{",
        cg.fsm.id,
        id,
        join(&params, ", ")
    )?;
    writeln!(f, "    switch (state_) {{")?;
    for (state, transition) in cg.fsm.states_with(id) {
        writeln!(f, "    case {}: {{", state.id)?;
        writeln!(f, "        if (!before()) return false;")?;
        writeln!(f, "        if (!before({})) return false;", state.id)?;
        match &transition.kind {
            TransitionKind::State(direct) => write_direct(cg, f, state, transition, direct)?,
            TransitionKind::Sequence(seq) => write_sequence(f, state, transition, seq)?,
        }
        writeln!(f, "    }}")?;
    }
    writeln!(f, "    default:")?;
    writeln!(f, "        return false;")?;
    writeln!(f, "    }}")?;
    writeln!(f, "}}")?;
    writeln!(f)
}

fn write_direct(
    cg: &Codegen<'_>,
    f: &mut Output<'_, '_>,
    state: &State,
    transition: &Transition,
    direct: &Direct,
) -> fmt::Result {
    if let Some(precondition) = &direct.precondition {
        writeln!(f, "        if (![&]() -> bool {{")?;
        let body = rewrite_precondition(&precondition.text);
        cg.verbatim_text(f, precondition.line, &body)?;
        writeln!(f, "            return true;")?;
        writeln!(f, "        }}()) return false;")?;
    }
    writeln!(f, "        state_ = {};", direct.target)?;
    writeln!(f, "        after({});", state.id)?;
    writeln!(f, "        after();")?;
    write_trace(f, transition, state, "true")?;
    writeln!(f, "        return true;")
}

fn write_sequence(
    f: &mut Output<'_, '_>,
    state: &State,
    transition: &Transition,
    seq: &Sequence,
) -> fmt::Result {
    let calls = seq
        .steps
        .iter()
        .map(|step| {
            let args = step.args.iter().map(|arg| &*arg.id).collect::<Vec<_>>();
            format!("{}({})", step.id, join(&args, ", "))
        })
        .collect::<Vec<_>>();
    writeln!(f, "        const bool ok = {};", join(&calls, " && "))?;
    writeln!(f, "        if (ok) {{")?;
    writeln!(f, "            after({});", state.id)?;
    writeln!(f, "            after();")?;
    writeln!(f, "        }}")?;
    write_trace(f, transition, state, "ok")?;
    writeln!(f, "        return ok;")
}

fn write_trace(
    f: &mut Output<'_, '_>,
    transition: &Transition,
    from: &State,
    ok: &str,
) -> fmt::Result {
    writeln!(f, "#ifdef {}", DEBUG_MACRO)?;
    writeln!(
        f,
        "        trace(\"{}\", {}, state_, {});",
        transition.id, from.id, ok
    )?;
    writeln!(f, "#endif")
}

fn write_debug_helpers(cg: &Codegen<'_>, f: &mut Output<'_, '_>) -> fmt::Result {
    let fsm = cg.fsm;
    writeln!(f, "#ifdef {}", DEBUG_MACRO)?;
    writeln!(f, "#include <cstdio>")?;
    writeln!(f)?;
    writeln!(f, "const char* {}::stateName(State state) {{", fsm.id)?;
    writeln!(f, "    switch (state) {{")?;
    for state in fsm.states.values() {
        writeln!(f, "    case {id}: return \"{id}\";", id = state.id)?;
    }
    writeln!(f, "    }}")?;
    writeln!(f, "    return \"?\";")?;
    writeln!(f, "}}")?;
    writeln!(f)?;
    writeln!(
        f,
        "void {}::trace(const char* transition, State from, State to, bool ok) const {{",
        fsm.id
    )?;
    writeln!(
        f,
        "    std::fprintf(stderr, \"{}: %s: %s -> %s%s\\n\", transition, stateName(from), stateName(to), ok ? \"\" : \" (failed)\");",
        fsm.id
    )?;
    writeln!(f, "}}")?;
    writeln!(f, "#endif")
}
