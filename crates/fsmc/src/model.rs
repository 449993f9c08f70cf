//! The in-memory FSM model built by the parser.

use crate::{types::Map, util::display_fn};
use std::{collections::BTreeMap, fmt};

/// Code copied verbatim into the generated output.
#[derive(Debug, Clone, PartialEq)]
pub struct Verbatim {
    /// The line of the opening brace.
    pub line: usize,
    /// The text between the braces.
    pub text: String,
}

#[derive(Debug)]
pub struct Fsm {
    pub id: String,
    pub line: usize,
    pub header: Option<Verbatim>,
    pub cpp: Option<Verbatim>,
    /// Name of the externally defined context type.
    pub class: String,
    /// Name of the member bound to the context.
    pub ctx: String,
    pub before: Option<Verbatim>,
    pub after: Option<Verbatim>,
    /// The first state declared in the source.
    pub begin: String,
    pub states: Map<String, State>,
}

impl Fsm {
    /// Re-sort states and transitions by identifier.
    pub fn sort(&mut self) {
        self.states.sort_keys();
        for state in self.states.values_mut() {
            state.transitions.sort_keys();
        }
    }

    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.get(id)
    }

    /// Every distinct transition id, sorted, with its first declaration.
    pub fn methods(&self) -> BTreeMap<&str, &Transition> {
        let mut methods = BTreeMap::new();
        for state in self.states.values() {
            for transition in state.transitions.values() {
                methods.entry(&*transition.id).or_insert(transition);
            }
        }
        methods
    }

    /// States declaring the transition `id`.
    pub fn states_with<'a>(
        &'a self,
        id: &'a str,
    ) -> impl Iterator<Item = (&'a State, &'a Transition)> + 'a {
        self.states
            .values()
            .filter_map(move |state| state.transitions.get(id).map(|t| (state, t)))
    }
}

impl fmt::Display for Fsm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fsm {} (class {} as {})", self.id, self.class, self.ctx)?;
        for state in self.states.values() {
            write!(f, "  {}", state.id)?;
            if state.id == self.begin {
                f.write_str(" (begin)")?;
            }
            writeln!(f)?;
            for transition in state.transitions.values() {
                writeln!(f, "    {}", transition)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct State {
    pub id: String,
    pub line: usize,
    pub before: Option<Verbatim>,
    pub after: Option<Verbatim>,
    pub transitions: Map<String, Transition>,
}

#[derive(Debug)]
pub struct Transition {
    pub id: String,
    pub line: usize,
    pub params: Vec<Param>,
    pub kind: TransitionKind,
}

impl Transition {
    /// The state this transition ends in, once known.
    ///
    /// Sequence targets are only available after validation.
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            TransitionKind::State(direct) => Some(&direct.target),
            TransitionKind::Sequence(seq) => seq.resolved.as_deref(),
        }
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.kind, TransitionKind::Sequence(..))
    }

    /// The list of parameter types, used to compare signatures.
    pub fn param_types(&self) -> impl Iterator<Item = &str> + '_ {
        self.params.iter().map(|p| &*p.ty)
    }

    // `"name(T1 a, T2 b)"`
    pub fn signature(&self) -> impl fmt::Display + '_ {
        display_fn(move |f| {
            write!(f, "{}(", self.id)?;
            for (i, param) in self.params.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{} {}", param.ty, param.id)?;
            }
            f.write_str(")")
        })
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => ", self.signature())?;
        match &self.kind {
            TransitionKind::State(direct) => {
                f.write_str(&direct.target)?;
                if direct.precondition.is_some() {
                    f.write_str(" {...}")?;
                }
            }
            TransitionKind::Sequence(seq) => {
                for (i, step) in seq.steps.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}(", step.id)?;
                    for (j, arg) in step.args.iter().enumerate() {
                        if j > 0 {
                            f.write_str(", ")?;
                        }
                        f.write_str(&arg.id)?;
                    }
                    f.write_str(")")?;
                }
                if let Some(resolved) = &seq.resolved {
                    write!(f, " [-> {}]", resolved)?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub ty: String,
    pub id: String,
    pub line: usize,
}

#[derive(Debug)]
pub enum TransitionKind {
    /// A direct move to a declared state.
    State(Direct),
    /// A chain of calls to other transitions.
    Sequence(Sequence),
}

#[derive(Debug)]
pub struct Direct {
    pub target: String,
    pub target_line: usize,
    pub precondition: Option<Verbatim>,
}

#[derive(Debug)]
pub struct Sequence {
    pub steps: Vec<Step>,
    /// Filled in by the validator.
    pub resolved: Option<String>,
}

#[derive(Debug)]
pub struct Step {
    pub id: String,
    pub line: usize,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub id: String,
    pub line: usize,
}
