//! The top-level driver (`PrettyPrinter::pp`/`render`) and every per-form
//! case printer that turns a purified `Expr` into a `Doc`. Everything here
//! reads as a big mutually-recursive descent over `Expr`'s variants, gated
//! at the top by a depth/step budget and a notation lookup, bottoming out in
//! `pp_structural` when neither of those short-circuits apply.
//!
//! The two printing entry points a case printer reaches for are:
//!  * `pp_child(e, ctx_bp)` -- ordinary structural recursion, single-gate
//!    parenthesization (`ctx_bp > result.rbp`);
//!  * `pp_notation_child(e, rule_priority, rbp)` -- the hole-filler the
//!    notation renderer calls, two-gate parenthesization so an
//!    asymmetric (e.g. right-associative) notation result doesn't get
//!    over- or under-parenthesized relative to the rule's own priority.
//!
//! Both funnel through `resolve_child`, which is where implicit-argument
//! transparency, metavariable-argument-spine hiding, and coercion elision
//! all live -- see its doc comment.

use std::cell::RefCell;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::name::Name;
use crate::level::{ Level, InnerLevel };
use crate::env::Env;
use crate::tc::TypeChecker;
use crate::expr::{
    Expr, InnerExpr::*, Binding, BinderStyle, MacroKind,
    mk_const,
};
use crate::pretty::options::PPOptions;
use crate::pretty::purifier::{ self, PurifyState };
use crate::pretty::notation::{ match_notation, render_notation };
use crate::pretty::components::{ Doc, Parenable, MAX_PRIORITY };

/// `ctx_bp` one below max: the binding power a case printer uses for a slot
/// that should basically never need parenthesizing (an already-atomic
/// child, like the argument side of an application).
const ARG_BP : usize = MAX_PRIORITY - 1;

/// Renders terms against a fixed `Env`/`PPOptions`. One `PrettyPrinter`
/// is typically built once per output target (a REPL, a declaration dump)
/// and reused across many `pp` calls; the `RefCell` counters it carries
/// reset at the top of every `pp`, not across calls, so concurrent use from
/// multiple threads needs one `PrettyPrinter` per thread (the same
/// constraint the underlying `TypeChecker` already has, since its caches
/// aren't behind a lock either).
pub struct PrettyPrinter {
    pub env : Arc<RwLock<Env>>,
    pub options : PPOptions,
    tc : RefCell<TypeChecker>,
    depth : RefCell<usize>,
    num_steps : RefCell<usize>,
}

impl PrettyPrinter {
    pub fn new(env : Arc<RwLock<Env>>, options : PPOptions) -> Self {
        let tc = TypeChecker::new(env.clone());
        PrettyPrinter {
            env,
            options,
            tc : RefCell::new(tc),
            depth : RefCell::new(0),
            num_steps : RefCell::new(0),
        }
    }

    pub fn new_default(env : Arc<RwLock<Env>>) -> Self {
        PrettyPrinter::new(env, PPOptions::new_default())
    }

    /// Swaps the active option set. The printer's caches live on the
    /// `TypeChecker`, not on the options, so there's nothing to invalidate.
    pub fn set_options(&mut self, options : PPOptions) {
        self.options = options;
    }

    /// Top-level entry point: purify `e`'s metavariables/locals, optionally
    /// beta-reduce, reset the depth/step budget, and print at the loosest
    /// context binding power (0, i.e. never needs parens).
    pub fn pp(&self, e : &Expr) -> Doc {
        #[cfg(feature = "tracing")]
        log::debug!("pp: entering top-level call (max_depth={}, max_steps={})", self.options.max_depth, self.options.max_steps);

        *self.depth.borrow_mut() = 0;
        *self.num_steps.borrow_mut() = 0;

        let mut purify_state = PurifyState::new();
        let purified = purifier::purify(e, &self.options, &mut purify_state);
        let purified = if self.options.beta { purified.beta_reduce() } else { purified };

        self.pp_child(&purified, 0)
    }

    pub fn render(&self, e : &Expr) -> String {
        self.pp(e).render(self.options.width)
    }

    /// Renders a declaration the way a `#print` command would: `name :
    /// type` for an axiom, `name : type := value` for a definition.
    pub fn print_declar(&self, name : &Name, ty : &Expr, value : Option<&Expr>) -> String {
        let head = Doc::from(format!("{:?}", name)).concat_plus(":").concat_plus(self.pp(ty));
        let whole = match value {
            Some(v) => head.concat_plus(":=").concat(Doc::line()).concat(self.pp(v)).group(),
            None => head,
        };
        whole.render(self.options.width)
    }

    /// Ordinary structural recursion slot: single-gate parenthesization
    /// (parenthesize iff `ctx_bp > result.rbp`).
    fn pp_child(&self, e : &Expr, ctx_bp : usize) -> Doc {
        let pr = self.resolve_child(e, ctx_bp);
        pr.parens(ctx_bp)
    }

    /// The hole-filler the notation renderer calls. `rule_priority` is the
    /// notation rule's own priority (what an adjacent literal-arg slot with
    /// no asymmetry would use); `rbp` is the transition's declared binding
    /// power for this particular hole. Two-gate: parenthesize unless the
    /// child's own two-sided binding powers both clear the rule's demand --
    /// `pr.rbp < lbp_context || pr.lbp <= rbp_context` triggers parens.
    fn pp_notation_child(&self, e : &Expr, rule_priority : usize, rbp : usize) -> Doc {
        let pr = self.resolve_child(e, rbp);
        let needs_parens = pr.rbp < rule_priority || pr.lbp <= rbp;
        if needs_parens { pr.doc.paren() } else { pr.doc }
    }

    /// Resolves `e` to a `Parenable`, applying -- in order -- implicit
    /// argument transparency, metavariable argument-spine hiding, and
    /// coercion elision, before falling through to ordinary dispatch. All
    /// three are "print this differently-shaped subterm instead" policies
    /// that both `pp_child` and `pp_notation_child` need identically, so
    /// they live here once rather than being duplicated at each call site.
    fn resolve_child(&self, e : &Expr, ctx_bp : usize) -> Parenable {
        // Policy 1: when `pp.implicit` is off, an application whose
        // function position is itself a (possibly partial) application of
        // something whose *next* parameter is implicit/strict-implicit/
        // instance-implicit is transparent -- we recurse straight through
        // `fun` and print only `arg`, never materializing the wrapping App
        // as a two-child node.
        if !self.options.implicit {
            if let App { fun, .. } = e.as_ref() {
                if self.is_implicit(fun) {
                    return self.resolve_child(fun, ctx_bp);
                }
            }
        }

        // Metavariable argument-spine hiding: `?m a b c` with
        // `pp.metavar_args` off prints as bare `?m`, discarding the spine.
        if !self.options.metavar_args {
            let (head, args) = e.unfold_apps_rev();
            if head.is_meta() && !args.is_empty() {
                return self.resolve_child(head, ctx_bp);
            }
        }

        // Coercion elision.
        if !self.options.coercions {
            if let Some(pr) = self.try_elide_coercion_pr(e) {
                return pr;
            }
        }

        self.pp_dispatch(e)
    }

    /// `true` iff `e`'s *next* parameter (inferred from its type) carries
    /// non-`Default` binder info, or `e` is itself a bare `Const`/`Local`
    /// whose own declared/stored type is a `Pi` with non-`Default` binder
    /// info on its first argument. Serves both the implicit-argument
    /// transparency check in `resolve_child` (called on a partially applied
    /// function) and the `@`-prefix marker check in `pp_const_core`/
    /// `pp_local_core` (called directly on the bare head), since `infer`
    /// already returns the relevant Pi-type for either shape.
    fn is_implicit(&self, e : &Expr) -> bool {
        let mut tc = self.tc.borrow_mut();
        match tc.infer(e) {
            Some(ty) => match tc.ensure_pi(&ty) {
                Some((binder, _)) => !binder.is_explicit(),
                None => false,
            },
            None => false,
        }
    }

    /// If `e`'s head is a registered coercion constant and the coercion
    /// should be elided, returns the `Parenable` for the replacement term;
    /// otherwise `None` (either the head isn't a coercion, or it is but the
    /// arity doesn't call for any elision at this particular arg count).
    ///
    /// Arity rule (`k` = registered arity, `n` = number of args actually
    /// applied): `n <= k` is too few args to have reached the coerced value
    /// yet, so print structurally; `n == k + 1` means the coercion's own
    /// args are all present and exactly one more arg (the coerced value)
    /// follows, so print that lone trailing arg by itself; `n > k + 1`
    /// strips the head and its `k` args and re-folds the remaining
    /// arguments onto the (elided) coerced value.
    fn try_elide_coercion_pr(&self, e : &Expr) -> Option<Parenable> {
        let (head, args) = e.unfold_apps_rev();
        let head_name = head.get_const_name()?;
        let k = self.env.read().coercion_arity(head_name)? as usize;
        let n = args.len();

        if n <= k {
            return None;
        }
        if n == k + 1 {
            return Some(self.resolve_child(args[k], ARG_BP));
        }
        let coerced = args[k].clone();
        let rest = &args[k + 1..];
        let folded = coerced.foldl_apps(rest.iter().map(|a| *a));
        Some(self.resolve_child(&folded, ARG_BP))
    }

    /// Budget check, then notation consult, then numeral fold, then
    /// ordinary structural dispatch -- in that order, each one a chance to
    /// short-circuit the rest.
    fn pp_dispatch(&self, e : &Expr) -> Parenable {
        {
            let mut depth = self.depth.borrow_mut();
            let mut steps = self.num_steps.borrow_mut();
            if *depth >= self.options.max_depth || *steps >= self.options.max_steps {
                #[cfg(feature = "tracing")]
                log::trace!("pp_dispatch: budget exceeded at depth={}, steps={}, collapsing to ellipsis", *depth, *steps);
                return Parenable::new_max(Doc::from(self.options.ellipsis_tok()));
            }
            *depth += 1;
            *steps += 1;
        }
        let result = self.pp_dispatch_core(e);
        *self.depth.borrow_mut() -= 1;
        result
    }

    fn pp_dispatch_core(&self, e : &Expr) -> Parenable {
        // Fold proof terms away under `pp.proofs = false`, before notation
        // or numerals get a look, since a folded proof is never worth
        // rendering through either.
        if !self.options.proofs && self.tc.borrow_mut().is_proof(e) {
            return Parenable::new_max(Doc::from("_"));
        }

        if self.options.notation {
            if let Some(pr) = self.try_notation(e) {
                return pr;
            }
        }

        if let Some(pr) = self.try_fold_numeral(e) {
            return pr;
        }

        self.pp_structural(e)
    }

    /// Looks the applied head up in the notation table and tries each
    /// registered entry in turn, returning the first one that both matches
    /// and renders. Entries are cloned out of the read-locked `Env` before
    /// `match_notation`/`render_notation` run (both of which call back into
    /// `tc`, which independently locks `Env` for its own lookups) so the
    /// lock isn't held across that reentrant call.
    fn try_notation(&self, e : &Expr) -> Option<Parenable> {
        let (head, _) = e.unfold_apps_rev();
        let head_name = head.get_const_name()?;
        let entries = self.env.read().notations_for(head_name).to_vec();

        for entry in entries.iter() {
            let slots = {
                let mut tc = self.tc.borrow_mut();
                match_notation(entry, e, &mut tc)
            };
            let slots = match slots {
                Some(slots) => slots,
                None => continue,
            };
            let mut render_child = |slot : &Expr, priority : usize, rbp : usize| -> Doc {
                self.pp_notation_child(slot, priority, rbp)
            };
            if let Some(pr) = render_notation(&mut render_child, entry, slots) {
                return Some(pr);
            }
        }
        None
    }

    /// Folds a `nat.zero`/`nat.succ` application chain into its decimal
    /// literal (`nat.succ (nat.succ nat.zero)` -> `2`). Conservative: any
    /// shape other than a closed run of `succ`s bottoming out at `zero`
    /// (an open variable, a `succ` applied to something else entirely, an
    /// over/under-applied `succ`) aborts back to `None` so the ordinary
    /// `App`/`Const` printer handles it instead.
    fn try_fold_numeral(&self, e : &Expr) -> Option<Parenable> {
        let mut n : u64 = 0;
        let mut cur = e;
        loop {
            let (head, args) = cur.unfold_apps_rev();
            match head.get_const_name() {
                Some(name) if is_nat_zero(name) && args.is_empty() => {
                    return Some(Parenable::new_max(Doc::from(n.to_string())));
                },
                Some(name) if is_nat_succ(name) && args.len() == 1 => {
                    n = n.checked_add(1)?;
                    cur = args[0];
                },
                _ => return None,
            }
        }
    }

    fn pp_structural(&self, e : &Expr) -> Parenable {
        match e.as_ref() {
            Var { dbj, .. } => Parenable::new_max(Doc::from(format!("#{}", dbj))),
            Sort { level, .. } => self.pp_sort_core(level),
            Const { name, levels, .. } => self.pp_const_core(name, levels),
            Local {..} => self.pp_local_core(e),
            Meta { name, ty } => self.pp_meta_core(name, ty),
            App {..} => self.pp_app_core(e),
            Lambda {..} => self.pp_lambda_core(e),
            Pi {..} => self.pp_pi_core(e),
            Let {..} => self.pp_let_core(e),
            Macro { kind : MacroKind::Have, .. } => self.pp_have_core(e),
            Macro { kind : MacroKind::Show, .. } => self.pp_show_core(e),
            Macro { kind : MacroKind::Opaque(name), args } => self.pp_opaque_macro_core(name, args),
        }
    }

    fn pp_sort_core(&self, level : &Level) -> Parenable {
        let doc = match level.as_ref() {
            InnerLevel::Zero => Doc::from("Prop"),
            _ if !self.options.universes => Doc::from("Type"),
            _ => Doc::from("Type").concat(".{").concat(self.pp_level(level)).concat("}"),
        };
        Parenable::new_max(doc.highlight_keyword())
    }

    fn pp_level(&self, level : &Level) -> Doc {
        match level.as_ref() {
            InnerLevel::Zero => Doc::from("0"),
            InnerLevel::Param(n) => Doc::from(format!("{:?}", n)),
            InnerLevel::Meta(n) => Doc::from(format!("?{:?}", n)),
            InnerLevel::Succ(_) => {
                let (offset, inner) = level.to_offset();
                match inner.as_ref() {
                    InnerLevel::Zero => Doc::from(offset.to_string()),
                    _ => self.pp_level(inner).concat("+").concat(Doc::from(offset.to_string())),
                }
            },
            InnerLevel::Max(a, b) => {
                Doc::from("max").concat_plus(self.pp_level_atom(a)).concat_plus(self.pp_level_atom(b))
            },
            InnerLevel::IMax(a, b) => {
                Doc::from("imax").concat_plus(self.pp_level_atom(a)).concat_plus(self.pp_level_atom(b))
            },
        }
    }

    /// A `max`/`imax` argument needs parens unless it's itself a leaf
    /// (`Zero`/`Param`/`Meta`) or an offset run atop one of those.
    fn pp_level_atom(&self, level : &Level) -> Doc {
        let doc = self.pp_level(level);
        match level.as_ref() {
            InnerLevel::Max(..) | InnerLevel::IMax(..) => doc.paren(),
            _ => doc,
        }
    }

    fn pp_levels(&self, levels : &[Level]) -> Doc {
        let mut iter = levels.iter();
        let first = match iter.next() {
            Some(l) => self.pp_level(l),
            None => return Doc::from(""),
        };
        iter.fold(first, |acc, l| acc.concat(",").concat(Doc::line()).concat(self.pp_level(l)))
    }

    fn pp_const_core(&self, name : &Name, levels : &[Level]) -> Parenable {
        let shortened = self.shorten_const_name(name);
        let mut doc = Doc::from(format!("{:?}", shortened));
        if self.options.universes && !levels.is_empty() {
            doc = doc.concat(".{").concat(self.pp_levels(levels)).concat("}");
        }
        if self.options.implicit {
            let e = mk_const(name.clone(), levels.to_vec());
            if self.is_implicit(&e) {
                doc = Doc::from("@").concat(doc);
            }
        }
        Parenable::new_max(doc)
    }

    /// Implements spec.md's constant-name-shortening rule: a private name
    /// resolves through `env.user_name` first (unless `full_names`);
    /// `full_names` prints the fully qualified name untouched; otherwise an
    /// alias registered against this exact name wins; failing that, the
    /// longest currently-open namespace that's actually a prefix of `name`
    /// gets stripped.
    fn shorten_const_name(&self, name : &Name) -> Name {
        if self.options.full_names {
            return name.clone();
        }
        let env = self.env.read();
        let resolved = if self.options.private_names { env.user_name(name).clone() } else { name.clone() };

        if let Some(alias) = env.resolve_alias(&resolved) {
            return alias.clone();
        }

        self.strip_longest_namespace(&resolved, &env)
    }

    fn strip_longest_namespace(&self, name : &Name, env : &Env) -> Name {
        env.active_namespaces()
           .iter()
           .filter_map(|ns| name.strip_namespace(ns).map(|stripped| (name_segment_count(ns), stripped)))
           .filter(|(_, stripped)| !stripped.is_anon())
           .max_by_key(|(depth, _)| *depth)
           .map(|(_, stripped)| stripped)
           .unwrap_or_else(|| name.clone())
    }

    fn pp_local_core(&self, e : &Expr) -> Parenable {
        let binder = e.lc_binding();
        let mut doc = Doc::from(format!("{:?}", binder.pp_name));
        if self.options.implicit && self.is_implicit(e) {
            doc = Doc::from("@").concat(doc);
        }
        Parenable::new_max(doc)
    }

    fn pp_meta_core(&self, name : &Name, _ty : &Expr) -> Parenable {
        Parenable::new_max(Doc::from(format!("?{:?}", name)))
    }

    /// `pp_child(f, max-1) <nest line> pp_child(a, max)`, literally: the
    /// function side is printed one binding power below max (so a nested
    /// application on the left doesn't get needlessly parenthesized),
    /// the argument side at max (so it's always atomic or parenthesized).
    /// Recursing through the same rule for a multi-argument spine still
    /// visually flattens it out, since each nested `App`'s function side
    /// prints without its own parens.
    fn pp_app_core(&self, e : &Expr) -> Parenable {
        let (fun, arg) = match e.as_ref() {
            App { fun, arg, .. } => (fun, arg),
            _ => unreachable!(),
        };
        let doc = self.pp_child(fun, ARG_BP).concat(Doc::line()).concat(self.pp_child(arg, MAX_PRIORITY)).nest(self.options.indent);
        Parenable::new(ARG_BP, doc.group())
    }

    /// Collects a maximal run of *consecutive* binders of one specific kind
    /// (all-`Lambda` or all-`Pi`, never mixed) starting at `e`, stopping the
    /// moment the kind changes or a non-binder is reached. Returns the
    /// collected `Binding`s (still referring to bound, not yet freshened,
    /// variables) alongside the final, fully-unwrapped body. Kept separate
    /// per kind (rather than one combined Pi-or-Lambda telescope) because
    /// Lambda and Pi are printed by entirely separate case printers with
    /// their own grouping/arrow-form rules.
    fn collect_binder_chain(&self, e : &Expr, want_lambda : bool) -> (Vec<Binding>, Expr) {
        let mut binders = Vec::new();
        let mut cur = e.clone();
        loop {
            let next = match cur.as_ref() {
                Lambda { binder, body, .. } if want_lambda => Some((binder.clone(), body.clone())),
                Pi { binder, body, .. } if !want_lambda => Some((binder.clone(), body.clone())),
                _ => None,
            };
            match next {
                Some((binder, body)) => {
                    binders.push(binder);
                    cur = body;
                },
                None => break,
            }
        }
        (binders, cur)
    }

    /// Freshens each collected binder's name against everything already in
    /// use (starting from `used`, which the caller seeds from purification's
    /// namespace plus whatever this chain has already handed out),
    /// instantiates each binder's body in turn against a matching `Local`,
    /// and returns the fresh `Binding`s alongside the fully-instantiated
    /// (Local-headed) final body.
    fn freshen_binder_chain(&self, binders : &[Binding], body : &Expr, used : &mut hashbrown::HashSet<Name>) -> (Vec<Binding>, Expr) {
        let mut fresh_binders = Vec::with_capacity(binders.len());
        let mut locals = Vec::with_capacity(binders.len());
        for binder in binders {
            let instd_ty = binder.ty.instantiate(locals.iter().rev());
            let forbidden = used.iter().collect::<hashbrown::HashSet<&Name>>();
            let fresh_name = Name::fresh_name(&format!("{}", binder.pp_name), forbidden);
            used.insert(fresh_name.clone());
            let fresh_binder = Binding::mk(fresh_name, instd_ty, binder.style);
            locals.push(fresh_binder.clone().as_local());
            fresh_binders.push(fresh_binder);
        }
        let instd_body = body.instantiate(locals.iter().rev());
        (fresh_binders, instd_body)
    }

    /// Groups a flat, already-freshened binder list into runs sharing both
    /// domain type (structural `==`) and `BinderStyle`, per spec.md's
    /// literal "identical domain type and binder info" rule -- no extra
    /// carve-out for `InstImplicit` singletons.
    fn group_binders<'b>(&self, binders : &'b [Binding]) -> Vec<Vec<&'b Binding>> {
        let mut groups : Vec<Vec<&Binding>> = Vec::new();
        for b in binders {
            match groups.last_mut() {
                Some(group) if group[0].ty == b.ty && group[0].style == b.style => group.push(b),
                _ => groups.push(vec![b]),
            }
        }
        groups
    }

    fn pp_binder_group(&self, group : &[&Binding]) -> Doc {
        let names = group.iter()
                          .map(|b| Doc::from(format!("{:?}", b.pp_name)))
                          .fold(None, |acc : Option<Doc>, d| Some(match acc { None => d, Some(a) => a.concat(Doc::line()).concat(d) }))
                          .unwrap_or_else(|| Doc::from(""));
        let ty_doc = self.pp_child(&group[0].ty, 0);
        let inner = names.concat_plus(":").concat(Doc::line()).concat(ty_doc).nest(self.options.indent).group();
        match group[0].style {
            BinderStyle::Default => Doc::from("(").concat(inner).concat(")"),
            BinderStyle::Implicit => Doc::from("{").concat(inner).concat("}"),
            BinderStyle::StrictImplicit => {
                let (l, r) = self.options.strict_implicit_brackets();
                Doc::from(l).concat(inner).concat(r)
            },
            BinderStyle::InstImplicit => Doc::from("[").concat(inner).concat("]"),
        }
    }

    fn pp_binders(&self, binders : &[Binding]) -> Doc {
        let groups = self.group_binders(binders);
        let mut iter = groups.into_iter();
        let first = match iter.next() {
            Some(g) => self.pp_binder_group(&g),
            None => return Doc::from(""),
        };
        iter.fold(first, |acc, g| acc.concat(Doc::line()).concat(self.pp_binder_group(&g)))
    }

    fn pp_lambda_core(&self, e : &Expr) -> Parenable {
        let (binders, body) = self.collect_binder_chain(e, true);
        let mut used = hashbrown::HashSet::new();
        let (fresh_binders, fresh_body) = self.freshen_binder_chain(&binders, &body, &mut used);
        let head = Doc::from(self.options.lambda_tok()).concat_plus(self.pp_binders(&fresh_binders)).concat(",");
        let doc = head.concat(Doc::line()).concat(self.pp_child(&fresh_body, 0)).nest(self.options.indent);
        Parenable::new(ARG_BP, doc.group())
    }

    /// Pi gets three shapes: a vacuous-binder (body doesn't depend on the
    /// bound variable) `Default`-style binder prints as a plain arrow
    /// `dom → body`; a non-vacuous chain picks the `∀`/`Π` token once, up
    /// front, based on whether the *original*, not-yet-telescoped Pi
    /// expression is itself a proposition (propositionhood is invariant as
    /// you walk a Pi's own telescope, since each step's codomain is still
    /// the same proposition-or-not sort as the whole); anything else uses
    /// ordinary binder-group notation.
    fn pp_pi_core(&self, e : &Expr) -> Parenable {
        let (binder, body) = match e.as_ref() {
            Pi { binder, body, .. } => (binder, body),
            _ => unreachable!(),
        };

        if !body.has_vars() && binder.style == BinderStyle::Default {
            let dom = self.pp_child(&binder.ty, ARG_BP + 1);
            let cod = self.pp_child(body, ARG_BP);
            let doc = dom.concat_plus(self.options.arrow_tok()).concat(Doc::line()).concat(cod).nest(self.options.indent);
            return Parenable::new_lr(ARG_BP, ARG_BP, doc.group());
        }

        let is_prop = self.tc.borrow_mut().is_proposition(e);
        let tok = if is_prop { self.options.forall_tok() } else { self.options.pi_tok() };

        let (binders, body) = self.collect_binder_chain(e, false);
        let mut used = hashbrown::HashSet::new();
        let (fresh_binders, fresh_body) = self.freshen_binder_chain(&binders, &body, &mut used);
        let head = Doc::from(tok).concat_plus(self.pp_binders(&fresh_binders)).concat(",");
        let doc = head.concat(Doc::line()).concat(self.pp_child(&fresh_body, 0)).nest(self.options.indent);
        Parenable::new(ARG_BP, doc.group())
    }

    /// Collects a maximal chain of nested `Let`s. Each binding's displayed
    /// name is freshened against every name already handed out earlier in
    /// the same chain (so `let x := .. in let x := .. in ..` doesn't print
    /// two bindings that look like the same variable).
    fn pp_let_core(&self, e : &Expr) -> Parenable {
        let mut lines = Vec::new();
        let mut used = hashbrown::HashSet::new();
        let mut cur = e.clone();

        loop {
            let (binder, val, body) = match cur.as_ref() {
                Let { binder, val, body, .. } => (binder.clone(), val.clone(), body.clone()),
                _ => break,
            };
            let forbidden = used.iter().collect::<hashbrown::HashSet<&Name>>();
            let fresh_name = Name::fresh_name(&format!("{}", binder.pp_name), forbidden);
            used.insert(fresh_name.clone());
            let fresh_binder = binder.swap_name(fresh_name);
            let local = fresh_binder.clone().as_local();

            let ty_doc = self.pp_child(&binder.ty, 0);
            let val_doc = self.pp_child(&val, 0);
            let line = Doc::from(format!("{:?}", fresh_binder.pp_name))
                .concat_plus(":").concat(Doc::line()).concat(ty_doc)
                .concat_plus(":=").concat(Doc::line()).concat(val_doc);
            lines.push(line);

            cur = body.instantiate(Some(&local).into_iter());
        }

        let bindings = lines.into_iter()
                             .fold(None, |acc : Option<Doc>, d| Some(match acc {
                                 None => d,
                                 Some(a) => a.concat(Doc::line()).concat(d),
                             }))
                             .unwrap_or_else(|| Doc::from(""));

        let doc = Doc::from("let").concat_plus(bindings.nest(self.options.indent)).concat(Doc::line())
                     .concat(Doc::from("in")).concat(Doc::line()).concat(self.pp_child(&cur, 0));
        Parenable::new(ARG_BP, doc.group())
    }

    /// Wraps a `have` binder's name in the bracket style its `BinderStyle`
    /// calls for (matching `pp_binder_group`'s choice of brackets); a
    /// `Default` binder gets no marker at all.
    fn pp_have_visibility_marker(&self, style : BinderStyle, name_doc : Doc) -> Doc {
        match style {
            BinderStyle::Default => name_doc,
            BinderStyle::Implicit => Doc::from("{").concat(name_doc).concat("}"),
            BinderStyle::StrictImplicit => {
                let (l, r) = self.options.strict_implicit_brackets();
                Doc::from(l).concat(name_doc).concat(r)
            },
            BinderStyle::InstImplicit => Doc::from("[").concat(name_doc).concat("]"),
        }
    }

    fn pp_have_core(&self, e : &Expr) -> Parenable {
        let (binder, val, body) = match e.get_have_fields() {
            Some(fields) => fields,
            None => return self.pp_opaque_fallback(e),
        };
        let forbidden = hashbrown::HashSet::new();
        let fresh_name = Name::fresh_name(&format!("{}", binder.pp_name), forbidden);
        let fresh_binder = binder.swap_name(fresh_name);
        let local = fresh_binder.clone().as_local();
        let instd_body = body.instantiate(Some(&local).into_iter());

        let name_doc = Doc::from(format!("{:?}", fresh_binder.pp_name));
        let marker = self.pp_have_visibility_marker(fresh_binder.style, name_doc);

        let doc = Doc::from("have").concat_plus(marker)
                     .concat_plus(":").concat(Doc::line()).concat(self.pp_child(&binder.ty, 0))
                     .concat(",").concat(Doc::line()).concat(Doc::from("from")).concat_plus(self.pp_child(val, 0))
                     .concat(",").concat(Doc::line()).concat(self.pp_child(&instd_body, 0)).nest(self.options.indent);
        Parenable::new(ARG_BP, doc.group())
    }

    fn pp_show_core(&self, e : &Expr) -> Parenable {
        let (ty, val) = match e.get_show_fields() {
            Some(fields) => fields,
            None => return self.pp_opaque_fallback(e),
        };
        let doc = Doc::from("show").concat_plus(self.pp_child(ty, 0))
                     .concat(",").concat(Doc::line()).concat(Doc::from("from")).concat_plus(self.pp_child(val, 0)).nest(self.options.indent);
        Parenable::new(ARG_BP, doc.group())
    }

    fn pp_opaque_macro_core(&self, name : &Name, args : &[Expr]) -> Parenable {
        let head = Doc::from(format!("{:?}", name));
        let doc = args.iter().fold(head, |acc, a| acc.concat(Doc::line()).concat(self.pp_child(a, ARG_BP)).group());
        Parenable::new(ARG_BP, doc)
    }

    fn pp_opaque_fallback(&self, e : &Expr) -> Parenable {
        match e.get_macro_fields() {
            Some((kind, args)) => {
                let name = match kind {
                    MacroKind::Have => Name::from("have"),
                    MacroKind::Show => Name::from("show"),
                    MacroKind::Opaque(n) => n.clone(),
                };
                self.pp_opaque_macro_core(&name, args)
            },
            None => Parenable::new_max(Doc::from("_")),
        }
    }
}

fn is_nat_zero(name : &Name) -> bool {
    format!("{:?}", name) == "nat.zero"
}

fn is_nat_succ(name : &Name) -> bool {
    format!("{:?}", name) == "nat.succ"
}

fn name_segment_count(n : &Name) -> usize {
    let mut count = 0;
    let mut cur = n.clone();
    while !cur.is_anon() {
        count += 1;
        cur = cur.get_prefix().clone();
    }
    count
}

#[cfg(test)]
mod pretty_printer_tests {
    use super::*;
    use crate::expr::{ mk_prop, mk_sort, mk_local, mk_lambda, mk_pi, mk_meta, mk_app, mk_var };
    use crate::level::{ mk_zero, mk_succ, mk_param };
    use crate::env::Declaration;

    fn fresh_env() -> Arc<RwLock<Env>> {
        Arc::new(RwLock::new(Env::new(16)))
    }

    fn pp_with(env : Arc<RwLock<Env>>, opts : PPOptions) -> PrettyPrinter {
        PrettyPrinter::new(env, opts)
    }

    /// scenario 1: `App(Const("f"), Var(0))` at bp max-1 prints `f #0`.
    #[test]
    fn app_of_const_and_var_prints_flat() {
        let env = fresh_env();
        let pp = pp_with(env, PPOptions::new_default());
        let e = mk_app(mk_const("f", Vec::new()), mk_var(0));
        let rendered = pp.render(&e);
        assert_eq!(rendered, "f #0");
    }

    #[test]
    fn lambda_prints_binder_and_body() {
        let env = fresh_env();
        let pp = pp_with(env, PPOptions::new_default());
        let x = mk_local("x", mk_prop(), BinderStyle::Default);
        let body = mk_var(0);
        let lam = mk_lambda(Binding::from(&x), body);
        let rendered = pp.render(&lam);
        assert!(rendered.starts_with("λ"));
        assert!(rendered.contains(':'));
    }

    #[test]
    fn vacuous_pi_prints_as_arrow() {
        let env = fresh_env();
        let pp = pp_with(env, PPOptions::new_default());
        let binder = Binding::mk(crate::name::mk_anon(), mk_prop(), BinderStyle::Default);
        let arrow = mk_pi(binder, mk_prop());
        let rendered = pp.render(&arrow);
        assert!(rendered.contains("→"));
    }

    #[test]
    fn sort_zero_prints_prop_and_succ_prints_type() {
        let env = fresh_env();
        let pp = pp_with(env, PPOptions::new_default());
        assert_eq!(pp.render(&mk_sort(mk_zero())), "Prop");
        assert_eq!(pp.render(&mk_sort(mk_succ(mk_zero()))), "Type");
    }

    #[test]
    fn universes_on_shows_param_level() {
        let env = fresh_env();
        let mut opts = PPOptions::new_default();
        opts.universes = true;
        let pp = pp_with(env, opts);
        let rendered = pp.render(&mk_sort(mk_param(Name::from("u"))));
        assert_eq!(rendered, "Type.{u}");
    }

    #[test]
    fn namespace_shortening_strips_active_prefix() {
        let env = fresh_env();
        env.write().open_namespace(Name::from("list"));
        let pp = pp_with(env, PPOptions::new_default());
        let name = Name::from("list").extend_str("map");
        let rendered = pp.render(&mk_const(name, Vec::new()));
        assert_eq!(rendered, "map");
    }

    #[test]
    fn chained_lets_collect_into_one_block() {
        let env = fresh_env();
        let pp = pp_with(env, PPOptions::new_default());
        let x = mk_local("x", mk_prop(), BinderStyle::Default);
        let inner = crate::expr::mk_let(Binding::from(&x), mk_prop(), mk_var(0));
        let y = mk_local("y", mk_prop(), BinderStyle::Default);
        let outer_body = inner.abstract_(Some(&y).into_iter());
        let outer = crate::expr::mk_let(Binding::from(&y), mk_prop(), outer_body);
        let rendered = pp.render(&outer);
        assert_eq!(rendered.matches("let").count(), 1);
        assert!(rendered.contains("in"));
    }

    #[test]
    fn metavar_prints_with_question_mark() {
        let env = fresh_env();
        let pp = pp_with(env, PPOptions::new_default());
        let m = mk_meta(Name::from("orig"), mk_prop());
        let rendered = pp.render(&m);
        assert!(rendered.starts_with("?"));
    }

    #[test]
    fn numeral_folds_from_succ_chain() {
        let env = fresh_env();
        env.write().insert_declaration(Declaration::new_axiom(Name::from("nat"), Vec::new(), mk_sort(mk_succ(mk_zero()))));
        let pp = pp_with(env, PPOptions::new_default());
        let zero = mk_const(Name::from("nat").extend_str("zero"), Vec::new());
        let one = mk_app(mk_const(Name::from("nat").extend_str("succ"), Vec::new()), zero.clone());
        let two = mk_app(mk_const(Name::from("nat").extend_str("succ"), Vec::new()), one);
        assert_eq!(pp.render(&zero), "0");
        assert_eq!(pp.render(&two), "2");
    }

    #[test]
    fn coercion_elision_strips_registered_head() {
        let env = fresh_env();
        env.write().add_coercion(Name::from("coe"), 0);
        let mut opts = PPOptions::new_default();
        opts.coercions = false;
        let pp = pp_with(env, opts);
        let wrapped = mk_app(mk_const("coe", Vec::new()), mk_const("n", Vec::new()));
        assert_eq!(pp.render(&wrapped), "n");
    }

    #[test]
    fn depth_budget_collapses_to_ellipsis() {
        let env = fresh_env();
        let mut opts = PPOptions::new_default();
        opts.max_depth = 1;
        let pp = pp_with(env, opts);
        let nested = mk_app(mk_const("f", Vec::new()), mk_const("x", Vec::new()));
        let rendered = pp.render(&nested);
        assert!(rendered.contains(pp.options.ellipsis_tok()));
    }

    #[test]
    fn beta_option_reduces_before_printing() {
        let env = fresh_env();
        let mut opts = PPOptions::new_default();
        opts.beta = true;
        let pp = pp_with(env, opts);
        let x = mk_local("x", mk_prop(), BinderStyle::Default);
        let lam = mk_lambda(Binding::from(&x), mk_var(0));
        let applied = mk_app(lam, mk_const("c", Vec::new()));
        assert_eq!(pp.render(&applied), "c");
    }
}
