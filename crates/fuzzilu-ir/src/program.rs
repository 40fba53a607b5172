use ahash::AHashMap as HashMap;
use std::fmt;
use std::rc::Rc;

use rand::Rng;

use crate::code::Code;

/// Opaque identifier for a [`Program`], stable across its lifetime in
/// the corpus and in the serialized `.fzil` format (§6). Allocated
/// randomly rather than sequentially so ids exchanged between workers
/// never collide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(u64);

impl ProgramId {
    pub fn from_u64(raw: u64) -> Self {
        ProgramId(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn fresh() -> Self {
        ProgramId(rand::thread_rng().gen())
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// An immutable [`Code`] plus identity, ancestry, and provenance
/// metadata. Built once by the [`crate::builder::ProgramBuilder`] and
/// never mutated afterwards — mutators and the splicer always produce a
/// fresh `Program` rather than editing one in place.
#[derive(Debug, Clone)]
pub struct Program {
    id: ProgramId,
    code: Code,
    parent: Option<ProgramId>,
    comments: HashMap<usize, String>,
    contributors: Vec<Rc<str>>,
}

impl Program {
    pub fn new(code: Code) -> Self {
        Program {
            id: ProgramId::fresh(),
            code,
            parent: None,
            comments: HashMap::new(),
            contributors: Vec::new(),
        }
    }

    pub fn with_parent(code: Code, parent: ProgramId) -> Self {
        Program {
            id: ProgramId::fresh(),
            code,
            parent: Some(parent),
            comments: HashMap::new(),
            contributors: Vec::new(),
        }
    }

    /// Rebuild a `Program` with explicit identity and provenance, used
    /// by [`crate::serialize::deserialize_program`] to restore exactly
    /// the id a program had before it was written to disk (`Program::new`
    /// would mint a fresh, unrelated id instead).
    pub fn from_parts(
        id: ProgramId,
        code: Code,
        parent: Option<ProgramId>,
        comments: HashMap<usize, String>,
        contributors: Vec<Rc<str>>,
    ) -> Self {
        Program {
            id,
            code,
            parent,
            comments,
            contributors,
        }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }

    pub fn code(&self) -> &Code {
        &self.code
    }

    pub fn parent(&self) -> Option<ProgramId> {
        self.parent
    }

    pub fn contributors(&self) -> &[Rc<str>] {
        &self.contributors
    }

    pub fn add_contributor(&mut self, name: impl Into<Rc<str>>) {
        let name = name.into();
        if !self.contributors.contains(&name) {
            self.contributors.push(name);
        }
    }

    pub fn set_comment(&mut self, position: usize, comment: impl Into<String>) {
        self.comments.insert(position, comment.into());
    }

    pub fn comment_at(&self, position: usize) -> Option<&str> {
        self.comments.get(&position).map(String::as_str)
    }

    pub fn comments(&self) -> impl Iterator<Item = (usize, &str)> {
        self.comments.iter().map(|(&pc, s)| (pc, s.as_str()))
    }
}
