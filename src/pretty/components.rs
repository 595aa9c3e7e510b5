use std::sync::Arc;

use crate::name::Name;
use crate::expr::{ Expr, mk_app, mk_const, mk_var };

pub const MAX_PRIORITY : usize = 1024;

/// One token-or-hole step in a notation's concrete syntax, read left to
/// right. `Expr(rbp)` and the literal keyword steps are the only two kinds
/// the renderer and matcher give full treatment to -- they're enough to
/// reconstruct ordinary prefix/infix/postfix operators and most of Lean's
/// actual mixfix notations. The remaining variants show up in notations this
/// printer doesn't have a faithful rendering for (binder-collecting macros,
/// Lua-defined extensions, arbitrary scoped antiquotations); matching still
/// recognizes them so the notation isn't silently dropped from the table,
/// but rendering falls back to plain application syntax when one is hit.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Keyword(String),
    Expr(usize),
    Exprs,
    Binder,
    Binders,
    ScopedExpr,
    Ext(String),
    LuaExt(String),
}

/// A single notation rule: some literal syntax tokens and expression holes,
/// registered against the head constant that ultimately fills the
/// right-most hole (`nud == true`) or the right-most hole of an application
/// whose *leading* argument fills the left-most hole (`nud == false`, i.e. an
/// infix/postfix "led" rule). `ascii_safe` lets configuration fall back to
/// an ASCII rendering of the same rule (`->` instead of `→`) when the output
/// target doesn't handle unicode well.
///
/// `pattern` is a small synthetic term built from the same `head`, with a
/// `Var(i)` standing in for each of the rule's `num_params` holes (`Var(0)`
/// is the right-most hole, counting outward exactly the way a real de Bruijn
/// index counts binder depth). The matcher in `pretty::notation` walks this
/// alongside a candidate term instead of needing a hand-written matcher per
/// rule; `explicit` tells it whether to match the application spine
/// position-for-position (an `@`-annotated rule) or to skip over implicit
/// arguments in the term while walking the head's inferred type.
#[derive(Debug, Clone, PartialEq)]
pub struct NotationEntry {
    pub head : Name,
    pub priority : usize,
    pub nud : bool,
    pub transitions : Vec<Transition>,
    pub ascii_safe : bool,
    pub pattern : Expr,
    pub num_params : usize,
    pub explicit : bool,
}

impl NotationEntry {
    pub fn new(head : Name, priority : usize, nud : bool, transitions : Vec<Transition>, ascii_safe : bool, pattern : Expr, num_params : usize) -> Self {
        NotationEntry { head, priority, nud, transitions, ascii_safe, pattern, num_params, explicit : false }
    }

    /// Builds the canonical `f(Var(n-1), ..., Var(0))` pattern for a head
    /// applied to `num_params` holes, left to right.
    fn spine_pattern(head : &Name, num_params : usize) -> Expr {
        let mut acc = mk_const(head.clone(), Vec::new());
        for i in (0..num_params).rev() {
            acc = mk_app(acc, mk_var(i));
        }
        acc
    }

    /// `op x`
    pub fn new_prefix(head : Name, priority : usize, op : impl Into<String>) -> Self {
        let pattern = Self::spine_pattern(&head, 1);
        NotationEntry::new(head, priority, true, vec![Transition::Keyword(op.into()), Transition::Expr(priority)], true, pattern, 1)
    }

    /// `x op y`
    pub fn new_infix(head : Name, priority : usize, op : impl Into<String>) -> Self {
        let pattern = Self::spine_pattern(&head, 2);
        NotationEntry::new(head, priority, false, vec![Transition::Keyword(op.into()), Transition::Expr(priority + 1)], true, pattern, 2)
    }

    /// `x op`
    pub fn new_postfix(head : Name, priority : usize, op : impl Into<String>) -> Self {
        let pattern = Self::spine_pattern(&head, 1);
        NotationEntry::new(head, priority, false, vec![Transition::Keyword(op.into())], true, pattern, 1)
    }

    pub fn is_infix(&self) -> bool {
        !self.nud && self.transitions.iter().any(|t| matches!(t, Transition::Expr(_)))
    }

    pub fn is_postfix(&self) -> bool {
        !self.nud && !self.transitions.iter().any(|t| matches!(t, Transition::Expr(_)))
    }
}

#[derive(Debug, Clone)]
pub struct Doc(Arc<InnerDoc>);

impl From<&String> for Doc {
    fn from(s : &String) -> Doc {
        Text(s.clone()).into()
    }
}

impl From<String> for Doc {
    fn from(s : String) -> Doc {
        Text(s).into()
    }
}

impl From<&str> for Doc {
    fn from(s : &str) -> Doc {
        Text(String::from(s)).into()
    }
}

#[derive(Debug, Clone)]
pub enum InnerDoc {
    Concat(Doc, Doc),
    Nest(usize, Doc),
    Text(String),
    Line(String),
    Group(Doc)
}

use InnerDoc::*;

impl std::convert::AsRef<InnerDoc> for Doc {
    fn as_ref(&self) -> &InnerDoc {
        match self {
            Doc(x) => x.as_ref()
        }
    }
}

impl From<InnerDoc> for Doc {
    fn from(t : InnerDoc) -> Doc {
        Doc(Arc::new(t))
    }
}

impl From<&InnerDoc> for Doc {
    fn from(t : &InnerDoc) -> Doc {
        Doc(Arc::new(t.clone()))
    }
}

impl Doc {

    pub fn line() -> Doc {
        Line(format!(" ")).into()
    }

    pub fn zero_width_line() -> Doc {
        Line(format!("")).into()
    }

    pub fn as_text(t : String) -> Doc {
        Text(t).into()
    }

    pub fn group(&self) -> Doc {
        Group(self.clone()).into()
    }

    pub fn nest(&self, idx : usize) -> Doc {
        Nest(idx, self.clone()).into()
    }

    pub fn flat_size(&self) -> usize {
        match self.as_ref() {
            Concat(a, b) => a.flat_size() + b.flat_size(),
            Nest(_, d) => d.flat_size(),
            Text(t) => t.len(),
            Line(x) => x.len(),
            Group(a) => a.flat_size()
        }
    }

    pub fn contains_line(&self) -> bool {
        match self.as_ref() {
            Line(_) => true,
            Concat(a, b) => a.contains_line() || b.contains_line(),
            Nest(_, d) => d.contains_line(),
            Text(_) => false,
            Group(a) => a.contains_line()
        }
    }

    pub fn dist_to_first_line(&self) -> usize {
        match self.as_ref() {
            Line(_) => 0,
            Concat(a, b) => a.dist_to_line(b.dist_to_first_line()),
            Nest(_, d) => d.dist_to_first_line(),
            Text(t) => t.len(),
            Group(a) => a.dist_to_first_line()
        }
    }

    pub fn dist_to_line(&self, after : usize) -> usize {
        if self.contains_line() {
            self.dist_to_first_line()
        } else {
            self.dist_to_first_line() + after
        }
    }

    pub fn render(self, line_width : usize) -> String {
        let mut acc = String::new();
        let mut eol = acc.len() + line_width;

        self.render_core(0, false, 0, line_width, &mut eol, &mut acc);
        acc
    }

    pub fn render_core(&self,
                       nest : usize,
                       flatmode : bool,
                       dist_to_next_line : usize,
                       line_width : usize,
                       eol : &mut usize,
                       acc : &mut String) {
        match self.as_ref() {
            Concat(a, b) => {
                a.render_core(nest,
                              flatmode,
                              b.dist_to_line(dist_to_next_line),
                              line_width,
                              eol,
                              acc);
                b.render_core(nest, flatmode, dist_to_next_line, line_width, eol, acc);
            },
            Nest(idx, a) => {
                a.render_core(nest + idx, flatmode, dist_to_next_line, line_width, eol, acc);
            },
            Text(t) => {
                acc.push_str(t.as_str());
            },
            Line(x) => {
                if flatmode {
                    acc.push_str(x.as_str());
                } else {
                    assert!(!flatmode);
                    acc.push_str("\n");
                    *eol = acc.len() + line_width;
                    for _ in 0..nest {
                        acc.push(' ');
                    }
                }
            },
            Group(a) => {
                a.render_core(nest,
                              flatmode || acc.len() + a.flat_size() + dist_to_next_line <= *eol,
                              dist_to_next_line,
                              line_width,
                              eol,
                              acc);
            }
        }
    }

    pub fn concat(self, other : impl Into<Doc>) -> Doc {
        Concat(self, other.into()).into()
    }

    pub fn concat_line(self, other : impl Into<Doc>) -> Doc {
        let lhs = Concat(self, Doc::line()).into();
        Concat(lhs, other.into()).into()
    }

    pub fn concat_plus(self, rhs : impl Into<Doc>) -> Doc {
        let lhs = Concat(self, Text(format!(" ")).into()).into();
        Concat(lhs, rhs.into()).into()
    }

    /// Unconditionally wraps in parens; used by callers that have already
    /// made the parenthesization decision (e.g. the notation renderer's
    /// `Expr(rbp)` holes) rather than deriving it from a `Parenable`.
    pub fn paren(self) -> Doc {
        Doc::from("(").concat(self).concat(")")
    }

    /// Styling hook. Nanoda's plain-text printer has nowhere to put ANSI
    /// color codes, and this crate doesn't claim a terminal-styling
    /// dependency the teacher never had a use for, so both of these are
    /// identity passthroughs -- they exist so call sites that want to mark
    /// "this is a keyword" or "this is worth highlighting" can do so once,
    /// in a way a future renderer (one that does emit color) can hook into
    /// without every case printer needing to change.
    pub fn highlight(self) -> Doc {
        self
    }

    pub fn highlight_keyword(self) -> Doc {
        self
    }
}

pub fn word_wrap_val(s : impl Iterator<Item = Doc>) -> Doc {
    let mut fold_source = s.enumerate()
                           .map(|(idx, elem)| {
                               if idx == 0 {
                                   elem.clone()
                               } else {
                                   Doc::line().concat(elem.clone()).group()
                               }
                           });
    match fold_source.next() {
        None => Doc::from(""),
        Some(init) => fold_source.fold(init, |acc, next| acc.concat(next))
    }
}

/// Carries both binding powers for a printed expression: `lbp` governs
/// whether a notation rule looking for a *left* operand at some minimum
/// power would accept this result without parenthesizing it, `rbp`
/// the mirror image for a right operand. Plain (non-notation) expression
/// forms set `lbp == rbp`; infix/postfix notation results can have an
/// asymmetric pair when the underlying operator is one-sided (e.g.
/// right-associative arrow), which is exactly the case two-gate
/// parenthesization in the notation renderer needs to tell apart from a
/// symmetric one.
pub struct Parenable {
    pub lbp : usize,
    pub rbp : usize,
    pub doc : Doc
}

impl Parenable {

    pub fn new(bp : usize, doc : Doc) -> Self {
        Parenable { lbp : bp, rbp : bp, doc }
    }

    pub fn new_lr(lbp : usize, rbp : usize, doc : Doc) -> Self {
        Parenable { lbp, rbp, doc }
    }

    pub fn new_max(doc : Doc) -> Self {
        Parenable { lbp : MAX_PRIORITY, rbp : MAX_PRIORITY, doc }
    }

    /// Parenthesize if being placed in a context demanding at least
    /// `ctx_bp` binding power would bind tighter than this result's `rbp`.
    pub fn parens(&self, ctx_bp : usize) -> Doc {
        if ctx_bp > self.rbp {
            self.doc.clone().paren()
        } else {
            self.doc.clone()
        }
    }

    /// Mirror of `parens` for a left-hand slot, used by the notation
    /// renderer's two-gate check when a rule's leading hole has its own
    /// minimum binding power distinct from the rule's overall priority.
    pub fn parens_left(&self, ctx_bp : usize) -> Doc {
        if ctx_bp > self.lbp {
            self.doc.clone().paren()
        } else {
            self.doc.clone()
        }
    }
}
