//! RDF term model.
//!
//! A [`Term`] is an IRI, a blank node label, or a literal. Literals carry a
//! lexical form plus either nothing, a datatype IRI, or a language tag.
//! Term identity for storage purposes is decided *after* NFC normalisation
//! (see the `validate` module), so canonically equivalent Unicode spellings
//! map to the same dictionary entry.

use crate::term_id::TermType;
use std::fmt;

/// The qualifier on a literal's lexical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LiteralKind {
    /// Plain literal, no datatype or language
    Plain,
    /// Typed literal with a datatype IRI
    Datatype(String),
    /// Language-tagged string
    Language(String),
}

/// A literal term: lexical form plus qualifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Literal {
    pub lexical: String,
    pub kind: LiteralKind,
}

/// An RDF term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal(Literal),
}

impl Term {
    /// Create an IRI term
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    /// Create a blank node term
    pub fn bnode(label: impl Into<String>) -> Self {
        Term::BlankNode(label.into())
    }

    /// Create a plain literal
    pub fn literal(lexical: impl Into<String>) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            kind: LiteralKind::Plain,
        })
    }

    /// Create a typed literal
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            kind: LiteralKind::Datatype(datatype.into()),
        })
    }

    /// Create a language-tagged literal
    pub fn lang_tagged(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Term::Literal(Literal {
            lexical: lexical.into(),
            kind: LiteralKind::Language(language.into()),
        })
    }

    /// The allocated term type this term maps to when it is not inlined.
    pub fn term_type(&self) -> TermType {
        match self {
            Term::Iri(_) => TermType::Uri,
            Term::BlankNode(_) => TermType::BlankNode,
            Term::Literal(_) => TermType::Literal,
        }
    }
}

impl fmt::Display for Term {
    /// N-Triples-style rendering, for logs and test failure messages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::BlankNode(label) => write!(f, "_:{}", label),
            Term::Literal(lit) => match &lit.kind {
                LiteralKind::Plain => write!(f, "{:?}", lit.lexical),
                LiteralKind::Datatype(dt) => write!(f, "{:?}^^<{}>", lit.lexical, dt),
                LiteralKind::Language(lang) => write!(f, "{:?}@{}", lit.lexical, lang),
            },
        }
    }
}
