use std::sync::Arc;
use hashbrown::HashMap;
use parking_lot::RwLock;

use crate::utils::{ ShortCircuit, ShortCircuit::*, EqCache };
use crate::level::{ Level, mk_imax, mk_succ };
use crate::expr::{ Expr, Binding, InnerExpr::*, mk_app, mk_lambda, mk_var, mk_sort, mk_prop, mk_pi };
use crate::env::Env;

/// A much smaller relative of nanoda's original kernel type checker.
/// The original exists to *verify* that a term is well-typed, and panics
/// (via `errors::err_*`) the moment something doesn't check out, because a
/// broken invariant there means the kernel itself is unsound. The printer
/// has the opposite obligation: it has to produce *some* reasonable output
/// even when handed a term that's still full of holes, or whose declarations
/// haven't made it into `Env` yet, so every query here degrades to `None`
/// (or a conservative default) instead of calling a panic helper.
///
/// Consequently there's no `check_def_eq`, no reduction-rule application for
/// recursors/quotients, and no universe/type checking of applications --
/// those all belong to the kernel this was distilled from, not to the part
/// of it that prints terms back out as text.
#[derive(Clone)]
pub struct TypeChecker {
    pub infer_cache : HashMap<Expr, Option<Expr>>,
    pub whnf_cache : HashMap<Expr, Expr>,
    pub env : Arc<RwLock<Env>>,
}

impl std::fmt::Debug for TypeChecker {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "<typechecker>")
    }
}

impl TypeChecker {
    pub fn new(env : Arc<RwLock<Env>>) -> Self {
        TypeChecker {
            infer_cache : HashMap::with_capacity(1000),
            whnf_cache : HashMap::with_capacity(256),
            env
        }
    }

    /// `e` is a Prop iff it whnf-reduces to `Sort(Level::Zero)`. Used by the
    /// printer to decide whether to fold proof terms under `pp.proofs = false`.
    pub fn is_prop(&mut self, e : &Expr) -> bool {
        match self.whnf(e).as_ref() {
            Sort { level, .. } => level.is_zero(),
            _ => false
        }
    }

    /// infers the type of `e`, then checks whether *that* is a Prop.
    pub fn is_proposition(&mut self, e : &Expr) -> bool {
        match self.infer(e) {
            Some(ty) => self.is_prop(&ty),
            None => false
        }
    }

    pub fn is_proof(&mut self, p : &Expr) -> bool {
        match self.infer(p) {
            Some(ty) => self.is_proposition(&ty),
            None => false
        }
    }

    /// Reduces `e` to a `Pi` if possible, returning its binder and body.
    /// Total: anything that doesn't whnf down to a `Pi` just yields `None`,
    /// which callers treat as "don't know, print the plain term."
    pub fn ensure_pi(&mut self, e : &Expr) -> Option<(Binding, Expr)> {
        match self.whnf(e).as_ref() {
            Pi { binder, body, .. } => Some((binder.clone(), body.clone())),
            _ => None
        }
    }

    /// Weak-head-normal-form reduction: unfold definitions and beta-reduce
    /// until the head is no longer an applied `Lambda` or a `Let`, or until
    /// there's nothing left in the environment to unfold. Always terminates
    /// on well-formed input and never panics on malformed input -- an
    /// unresolvable constant just means "already in whnf as far as we know."
    pub fn whnf(&mut self, e : &Expr) -> Expr {
        if let Some(cached) = self.whnf_cache.get(e) {
            return cached.clone()
        }
        let cache_key = e.clone();
        let result = self.whnf_core(e);
        self.whnf_cache.insert(cache_key, result.clone());
        result
    }

    fn whnf_core(&mut self, e : &Expr) -> Expr {
        let (_fn, apps) = e.unfold_apps();

        match _fn.as_ref() {
            Sort { level, .. } => mk_sort(level.simplify()),
            Lambda {..} if !apps.is_empty() => {
                let intermed = self.whnf_lambda(_fn, apps);
                self.whnf_core(&intermed)
            },
            Let { val, body, .. } => {
                let instd = body.instantiate(Some(val).into_iter());
                let applied = instd.foldl_apps(apps.into_iter().rev());
                self.whnf_core(&applied)
            },
            Const { name, .. } => {
                match self.unfold_definition(name, _fn, apps.as_slice()) {
                    Some(unfolded) => self.whnf_core(&unfolded),
                    None => e.clone()
                }
            },
            _ => e.clone()
        }
    }

    fn whnf_lambda(&mut self, mut f : &Expr, mut apps : Vec<&Expr>) -> Expr {
        let mut ctx = Vec::with_capacity(apps.len());

        while let Lambda { body, .. } = f.as_ref() {
            if let Some(hd) = apps.pop() {
                ctx.push(hd);
                f = body;
                continue
            } else {
                break
            }
        }

        f.instantiate(ctx.into_iter().rev())
         .foldl_apps(apps.into_iter().rev())
    }

    /// Looks `name` up as a (non-opaque) definition in the environment and,
    /// if its value is known, instantiates it at the universe arguments
    /// carried by `_fn` and re-applies `apps`. Returns `None` for axioms,
    /// constants with no known body, unknown names, or a universe-argument
    /// count mismatch -- any of which just means "can't unfold this."
    fn unfold_definition(&self, name : &crate::name::Name, _fn : &Expr, apps : &[&Expr]) -> Option<Expr> {
        let levels = _fn.get_const_levels()?;
        let env = self.env.read();
        let decl = env.get_declaration(name)?;
        let value = decl.value.as_ref()?;

        if decl.univ_params.len() != levels.len() {
            return None
        }

        let subst_map = decl.univ_params.iter().cloned().zip(levels.iter().cloned()).collect::<Vec<(Level, Level)>>();
        let instd = value.instantiate_lparams(subst_map.iter().map(|(a, b)| (a, b)));
        Some(instd.foldl_apps(apps.iter().rev().map(|x| *x)))
    }

    /// Type inference, analogous to the kernel's but total: any shape it
    /// can't handle (an under-elaborated `Meta`, a `Macro` whose structure
    /// doesn't match what the printer produced, a malformed application
    /// spine) yields `None` rather than aborting the whole print.
    pub fn infer(&mut self, term : &Expr) -> Option<Expr> {
        if let Some(cached) = self.infer_cache.get(term) {
            return cached.clone()
        }

        let cache_key = term.clone();
        let result = self.infer_core(term);
        self.infer_cache.insert(cache_key, result.clone());
        result
    }

    fn infer_core(&mut self, term : &Expr) -> Option<Expr> {
        match term.as_ref() {
            Var {..} => None,
            Sort { level, .. } => Some(mk_sort(mk_succ(level.clone()))),
            Const { name, levels, .. } => self.infer_const(name, levels),
            Local { binder, .. } => Some(binder.ty.clone()),
            App {..} => self.infer_apps(term),
            Lambda {..} => self.infer_lambda(term),
            Pi {..} => self.infer_pi(term).map(mk_sort),
            Let { binder, val, body, .. } => self.infer_let(binder, val, body),
            Meta { ty, .. } => Some(ty.clone()),
            Macro { kind : crate::expr::MacroKind::Show, args, .. } if args.len() == 2 => Some(args[0].clone()),
            Macro { args, .. } => args.last().and_then(|last| self.infer(last)),
        }
    }

    fn infer_const(&mut self, name : &crate::name::Name, levels : &[Level]) -> Option<Expr> {
        let env = self.env.read();
        let decl = env.get_declaration(name)?;
        if decl.univ_params.len() != levels.len() {
            return None
        }
        let subst_map = decl.univ_params.iter().cloned().zip(levels.iter().cloned()).collect::<Vec<(Level, Level)>>();
        Some(decl.ty.instantiate_lparams(subst_map.iter().map(|(a, b)| (a, b))))
    }

    fn infer_lambda(&mut self, mut term : &Expr) -> Option<Expr> {
        let mut domains = Vec::with_capacity(16);
        let mut locals = Vec::with_capacity(16);

        while let Lambda { binder, body, .. } = term.as_ref() {
            domains.push(binder.clone());
            let new_dom_ty = binder.ty.instantiate(locals.iter().rev());
            let new_local = binder.clone().swap_ty(new_dom_ty).as_local();
            locals.push(new_local);
            term = body;
        }

        let instd = term.instantiate(locals.iter().rev());
        let inferred = self.infer(&instd)?;
        let mut abstrd = inferred.abstract_(locals.iter().rev());

        while let Some(d) = domains.pop() {
            abstrd = mk_pi(d, abstrd);
        }

        Some(abstrd)
    }

    fn infer_apps(&mut self, term : &Expr) -> Option<Expr> {
        let (_fn, mut apps) = term.unfold_apps();
        let mut acc = self.infer(_fn)?;
        let mut context = Vec::<&Expr>::with_capacity(apps.len());

        while let Some(elem) = apps.pop() {
            if let Pi { body, .. } = acc.as_ref() {
                context.push(elem);
                acc = body.clone();
            } else {
                let instd = acc.instantiate(context.iter().map(|x| *x).rev());
                let whnfd = self.whnf(&instd);
                match whnfd.as_ref() {
                    Pi {..} => {
                        apps.push(elem);
                        context = Vec::new();
                        acc = whnfd;
                    },
                    _ => return None
                }
            }
        }

        Some(acc.instantiate(context.iter().map(|x| *x).rev()))
    }

    fn infer_pi(&mut self, mut term : &Expr) -> Option<Level> {
        let mut locals = Vec::new();
        let mut universes = Vec::new();

        while let Pi { binder, body, .. } = term.as_ref() {
            let new_dom_ty = binder.ty.instantiate(locals.iter().rev());
            let new_dom = binder.clone().swap_ty(new_dom_ty.clone());
            let dom_univ = self.infer(&new_dom_ty).and_then(|t| {
                match self.whnf(&t).as_ref() {
                    Sort { level, .. } => Some(level.clone()),
                    _ => None
                }
            })?;
            universes.push(dom_univ);
            locals.push(new_dom.as_local());
            term = body;
        }

        let instd = term.instantiate(locals.iter().rev());
        let inferred_ty = self.infer(&instd)?;
        let mut inferred = match self.whnf(&inferred_ty).as_ref() {
            Sort { level, .. } => level.clone(),
            _ => return None
        };

        while let Some(u) = universes.pop() {
            inferred = mk_imax(u, inferred);
        }

        Some(inferred)
    }

    fn infer_let(&mut self, _dom : &Binding, val : &Expr, body : &Expr) -> Option<Expr> {
        let instd_body = body.instantiate(Some(val).into_iter());
        self.infer(&instd_body)
    }
}

#[cfg(test)]
mod tc_tests {
    use super::*;
    use crate::env::Env;
    use crate::expr::{ BinderStyle, mk_local, mk_var };
    use crate::level::mk_zero;

    fn fresh_tc() -> TypeChecker {
        TypeChecker::new(Arc::new(RwLock::new(Env::new(16))))
    }

    #[test]
    fn whnf_beta_reduces() {
        let mut tc = fresh_tc();
        let x = mk_local("x", mk_prop(), BinderStyle::Default);
        let lam = mk_lambda(Binding::from(&x), mk_var(0));
        let applied = mk_app(lam, mk_prop());
        let reduced = tc.whnf(&applied);
        assert_eq!(reduced, mk_prop());
    }

    #[test]
    fn is_prop_of_sort_zero() {
        let mut tc = fresh_tc();
        assert!(tc.is_prop(&mk_sort(mk_zero())));
        assert!(!tc.is_prop(&mk_sort(mk_succ(mk_zero()))));
    }

    #[test]
    fn ensure_pi_on_non_pi_is_none() {
        let mut tc = fresh_tc();
        assert!(tc.ensure_pi(&mk_prop()).is_none());
    }
}
