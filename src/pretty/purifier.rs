//! Collision-free renaming pass run once, top-to-bottom, before any case
//! printer looks at a term. Two separate namespaces get freshened:
//!
//!  * metavariables (`?m`, both term-level `Expr::Meta` and, when
//!    `pp.universes` is on, universe-level `Level::Meta`) are assigned a
//!    display name the first time they're seen, drawn from a single shared
//!    `meta_prefix`-plus-counter sequence;
//!  * locals (`Expr::Local`) keep their suggested `pp_name` if it's not
//!    already taken, otherwise get a numeric suffix appended until one is
//!    free -- exactly the collision-avoidance `Name::fresh_name` already
//!    does for the binder formatter, reused here so two unrelated free
//!    variables that happen to share a suggested name never print as if
//!    they were the same variable.
//!
//! A subterm that carries no metavariables, no locals, and (when universes
//! are off) no universe metavariables either is returned unchanged instead
//! of being walked and rebuilt -- most closed, ground subterms (a `Const`
//! applied to other `Const`s, say) hit this short circuit immediately.

use hashbrown::{ HashMap, HashSet };

use crate::name::Name;
use crate::level::{ Level, InnerLevel };
use crate::expr::{
    Expr, InnerExpr::*, Binding,
    mk_app, mk_sort, mk_const, mk_meta, mk_lambda, mk_pi, mk_let, mk_macro,
};
use crate::pretty::options::PPOptions;

/// Per-top-level-call purification state. A fresh one is built for every
/// `PrettyPrinter::pp` entry so that two unrelated declarations never share
/// a `?M1`.
pub struct PurifyState {
    meta_prefix : &'static str,
    next_meta_idx : usize,
    meta_table : HashMap<Name, Name>,
    local_table : HashMap<u64, Name>,
    used_locals : HashSet<Name>,
}

impl PurifyState {
    pub fn new() -> Self {
        PurifyState {
            meta_prefix : "M",
            next_meta_idx : 1,
            meta_table : HashMap::new(),
            local_table : HashMap::new(),
            used_locals : HashSet::new(),
        }
    }

    fn purify_meta_name(&mut self, orig : &Name) -> Name {
        if let Some(existing) = self.meta_table.get(orig) {
            return existing.clone();
        }
        let fresh = Name::from(format!("{}{}", self.meta_prefix, self.next_meta_idx).as_str());
        self.next_meta_idx += 1;
        self.meta_table.insert(orig.clone(), fresh.clone());
        fresh
    }

    fn purify_local_name(&mut self, serial : u64, suggested : &Name) -> Name {
        if let Some(existing) = self.local_table.get(&serial) {
            return existing.clone();
        }
        let forbidden = self.used_locals.iter().collect::<HashSet<&Name>>();
        let display = Name::fresh_name(&format!("{}", suggested), forbidden);
        self.used_locals.insert(display.clone());
        self.local_table.insert(serial, display.clone());
        display
    }

    /// Display names this call has already handed out to locals. The
    /// top-level printer seeds its own fresh-name generator from this set
    /// after purification so a later synthetic binder name (e.g. one
    /// invented for an anonymous `Pi` domain) can't collide with a name
    /// purification already committed to.
    pub fn used_locals(&self) -> &HashSet<Name> {
        &self.used_locals
    }
}

/// Purifies `e`'s metavariables and locals in place (conceptually; `Expr` is
/// persistent, so this returns a new tree sharing whatever subterms didn't
/// need to change). Intended to be called once, at the very top of a
/// top-level `pp` call, before any recursive case printing begins.
pub fn purify(e : &Expr, opts : &PPOptions, st : &mut PurifyState) -> Expr {
    if !needs_purify(e, opts.universes) {
        return e.clone();
    }

    match e.as_ref() {
        Var {..} => e.clone(),
        Sort { level, .. } => {
            if opts.universes {
                mk_sort(purify_level(level, st))
            } else {
                e.clone()
            }
        },
        Const { name, levels, .. } => {
            if opts.universes {
                let new_levels = levels.iter().map(|l| purify_level(l, st)).collect::<Vec<Level>>();
                mk_const(name.clone(), new_levels)
            } else {
                e.clone()
            }
        },
        Meta { name, ty } => {
            let new_ty = purify(ty, opts, st);
            let display = st.purify_meta_name(name);
            mk_meta(display, new_ty)
        },
        Local { binder, serial, .. } => {
            let new_ty = purify(&binder.ty, opts, st);
            let display = st.purify_local_name(*serial, &binder.pp_name);
            e.swap_local_name_and_ty(&display, new_ty)
        },
        App { fun, arg, .. } => mk_app(purify(fun, opts, st), purify(arg, opts, st)),
        Lambda { binder, body, .. } => {
            let new_binder = Binding::mk(binder.pp_name.clone(), purify(&binder.ty, opts, st), binder.style);
            mk_lambda(new_binder, purify(body, opts, st))
        },
        Pi { binder, body, .. } => {
            let new_binder = Binding::mk(binder.pp_name.clone(), purify(&binder.ty, opts, st), binder.style);
            mk_pi(new_binder, purify(body, opts, st))
        },
        Let { binder, val, body, .. } => {
            let new_binder = Binding::mk(binder.pp_name.clone(), purify(&binder.ty, opts, st), binder.style);
            mk_let(new_binder, purify(val, opts, st), purify(body, opts, st))
        },
        Macro { kind, args, .. } => {
            let new_args = args.iter().map(|a| purify(a, opts, st)).collect::<Vec<Expr>>();
            mk_macro(kind.clone(), new_args)
        },
    }
}

fn purify_level(level : &Level, st : &mut PurifyState) -> Level {
    match level.as_ref() {
        InnerLevel::Zero => level.clone(),
        InnerLevel::Param(_) => level.clone(),
        InnerLevel::Succ(x) => crate::level::mk_succ(purify_level(x, st)),
        InnerLevel::Max(a, b) => crate::level::mk_max(purify_level(a, st), purify_level(b, st)),
        InnerLevel::IMax(a, b) => crate::level::mk_imax(purify_level(a, st), purify_level(b, st)),
        InnerLevel::Meta(name) => crate::level::mk_meta(st.purify_meta_name(name)),
    }
}

fn needs_purify(e : &Expr, universes_on : bool) -> bool {
    if e.has_locals() {
        return true;
    }
    if has_meta(e) {
        return true;
    }
    universes_on && has_level_meta(e)
}

fn has_meta(e : &Expr) -> bool {
    match e.as_ref() {
        Var {..} | Sort {..} | Const {..} => false,
        Meta {..} => true,
        Local { binder, .. } => has_meta(&binder.ty),
        App { fun, arg, .. } => has_meta(fun) || has_meta(arg),
        Lambda { binder, body, .. } | Pi { binder, body, .. } => has_meta(&binder.ty) || has_meta(body),
        Let { binder, val, body, .. } => has_meta(&binder.ty) || has_meta(val) || has_meta(body),
        Macro { args, .. } => args.iter().any(has_meta),
    }
}

fn has_level_meta(e : &Expr) -> bool {
    match e.as_ref() {
        Var {..} => false,
        Sort { level, .. } => level_has_meta(level),
        Const { levels, .. } => levels.iter().any(level_has_meta),
        Meta { ty, .. } => has_level_meta(ty),
        Local { binder, .. } => has_level_meta(&binder.ty),
        App { fun, arg, .. } => has_level_meta(fun) || has_level_meta(arg),
        Lambda { binder, body, .. } | Pi { binder, body, .. } => has_level_meta(&binder.ty) || has_level_meta(body),
        Let { binder, val, body, .. } => has_level_meta(&binder.ty) || has_level_meta(val) || has_level_meta(body),
        Macro { args, .. } => args.iter().any(has_level_meta),
    }
}

fn level_has_meta(l : &Level) -> bool {
    match l.as_ref() {
        InnerLevel::Zero | InnerLevel::Param(_) => false,
        InnerLevel::Meta(_) => true,
        InnerLevel::Succ(x) => level_has_meta(x),
        InnerLevel::Max(a, b) | InnerLevel::IMax(a, b) => level_has_meta(a) || level_has_meta(b),
    }
}

#[cfg(test)]
mod purifier_tests {
    use super::*;
    use crate::expr::{ BinderStyle, mk_var, mk_prop };
    use crate::level::{ mk_param };

    #[test]
    fn distinct_metas_get_distinct_names() {
        let opts = PPOptions::new_default();
        let mut st = PurifyState::new();
        let m1 = mk_meta(Name::from("orig1"), mk_prop());
        let m2 = mk_meta(Name::from("orig2"), mk_prop());
        let pair = mk_app(m1, m2);
        let purified = purify(&pair, &opts, &mut st);
        let (f, a) = purified.unfold_apps_rev();
        let (n1, _) = f.get_meta_fields().unwrap();
        let (n2, _) = a[0].get_meta_fields().unwrap();
        assert_ne!(n1, n2);
    }

    #[test]
    fn repeated_occurrences_of_same_meta_get_same_name() {
        let opts = PPOptions::new_default();
        let mut st = PurifyState::new();
        let name = Name::from("same");
        let m1 = mk_meta(name.clone(), mk_prop());
        let m2 = mk_meta(name.clone(), mk_prop());
        let pair = mk_app(m1, m2);
        let purified = purify(&pair, &opts, &mut st);
        let (f, a) = purified.unfold_apps_rev();
        let (n1, _) = f.get_meta_fields().unwrap();
        let (n2, _) = a[0].get_meta_fields().unwrap();
        assert_eq!(n1, n2);
    }

    #[test]
    fn distinct_locals_sharing_a_suggested_name_are_disambiguated() {
        let opts = PPOptions::new_default();
        let mut st = PurifyState::new();
        let l1 = crate::expr::mk_local("x", mk_prop(), BinderStyle::Default);
        let l2 = crate::expr::mk_local("x", mk_prop(), BinderStyle::Default);
        let pair = mk_app(l1, l2);
        let purified = purify(&pair, &opts, &mut st);
        let (f, a) = purified.unfold_apps_rev();
        assert_ne!(f.lc_binding().pp_name, a[0].lc_binding().pp_name);
    }

    #[test]
    fn ground_term_short_circuits_unchanged() {
        let opts = PPOptions::new_default();
        let mut st = PurifyState::new();
        let e = mk_app(mk_const("f", Vec::new()), mk_var(0));
        let purified = purify(&e, &opts, &mut st);
        assert_eq!(e, purified);
    }

    #[test]
    fn universe_metas_only_purified_when_universes_on() {
        let mut opts = PPOptions::new_default();
        let lvl = crate::level::mk_meta(Name::from("u"));
        let e = mk_sort(lvl);

        opts.universes = false;
        let mut st = PurifyState::new();
        let untouched = purify(&e, &opts, &mut st);
        assert_eq!(e, untouched);

        opts.universes = true;
        let mut st = PurifyState::new();
        let touched = purify(&e, &opts, &mut st);
        assert_ne!(e, touched);
    }

    #[test]
    fn params_are_never_purified() {
        let mut opts = PPOptions::new_default();
        opts.universes = true;
        let lvl = mk_param(Name::from("u"));
        let e = mk_sort(lvl.clone());
        let mut st = PurifyState::new();
        let purified = purify(&e, &opts, &mut st);
        assert_eq!(purified.get_sort_level().unwrap(), &lvl);
    }
}
