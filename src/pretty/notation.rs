//! The two halves of mixfix notation support: `match_notation` decides
//! whether a registered `NotationEntry` applies to a given term (and, if so,
//! extracts the subterms that fill its holes), and `render_notation` turns
//! those extracted subterms back into a `Doc` by walking the entry's
//! transition list.
//!
//! Both are driven by the entry's synthetic `pattern` (see
//! `components::NotationEntry`) rather than a hand-written matcher per rule
//! shape -- the same two functions handle every prefix/infix/postfix entry
//! `Env::add_notation` was given, and degrade gracefully (return `None`) the
//! moment they hit a transition kind they don't have a rendering for.

use crate::level::Level;
use crate::expr::{ Expr, InnerExpr::*, BinderStyle };
use crate::tc::TypeChecker;
use crate::pretty::components::{ NotationEntry, Transition, Doc, Parenable };

/// Tries to match `entry`'s pattern against `term`. On success, returns the
/// subterms bound to each of the pattern's `num_params` holes, ordered so
/// that `slots[i]` is the term matched against `Var(i)` in the pattern (so
/// `slots[size - 1]` is the *left-most*, outer-most argument and `slots[0]`
/// is the right-most).
pub fn match_notation(entry : &NotationEntry, term : &Expr, tc : &mut TypeChecker) -> Option<Vec<Expr>> {
    let mut slots : Vec<Option<Expr>> = vec![None; entry.num_params];
    if match_core(&entry.pattern, term, &mut slots, entry.num_params, entry.explicit, tc) {
        slots.into_iter().collect::<Option<Vec<Expr>>>()
    } else {
        None
    }
}

fn match_core(pattern : &Expr, term : &Expr, slots : &mut Vec<Option<Expr>>, size : usize, explicit : bool, tc : &mut TypeChecker) -> bool {
    match pattern.as_ref() {
        Var { dbj, .. } => {
            let slot_idx = size - 1 - dbj;
            match slots.get(slot_idx).cloned().flatten() {
                Some(existing) => existing == *term,
                None => {
                    slots[slot_idx] = Some(term.clone());
                    true
                }
            }
        },
        Const { name, levels, .. } => {
            match term.as_ref() {
                Const { name : name2, levels : levels2, .. } if name == name2 => level_match_vec(levels, levels2),
                _ => false
            }
        },
        Sort { level, .. } => {
            match term.as_ref() {
                Sort { level : level2, .. } => level_match(level, level2),
                _ => false
            }
        },
        App {..} => {
            match term.as_ref() {
                App {..} => match_app(pattern, term, slots, size, explicit, tc),
                _ => false
            }
        },
        _ => false,
    }
}

fn match_app(pattern : &Expr, term : &Expr, slots : &mut Vec<Option<Expr>>, size : usize, explicit : bool, tc : &mut TypeChecker) -> bool {
    let (p_head, p_args) = pattern.unfold_apps_rev();
    let (t_head, t_args) = term.unfold_apps_rev();

    if !match_core(p_head, t_head, slots, size, explicit, tc) {
        return false;
    }

    if explicit {
        if p_args.len() != t_args.len() {
            return false;
        }
        return p_args.iter().zip(t_args.iter()).all(|(p, t)| match_core(p, t, slots, size, explicit, tc));
    }

    // Implicit-skipping walk: consume a pattern argument only for term
    // argument positions whose binder info (read off the head's inferred
    // Pi-type) is `Default`; everything else is skipped without consuming
    // a pattern hole. Succeeds only if every pattern argument got consumed.
    let mut p_iter = p_args.into_iter();
    let mut cur_ty = tc.infer(t_head);

    for t_arg in t_args.into_iter() {
        let pi_info = cur_ty.clone().and_then(|ty| tc.ensure_pi(&ty));
        let is_explicit_position = match &pi_info {
            Some((binder, _)) => binder.style == BinderStyle::Default,
            // No Pi-type information available for this position: treat it
            // as an ordinary explicit argument rather than silently
            // dropping it from the match.
            None => true,
        };
        if let Some((_, body)) = &pi_info {
            cur_ty = Some(body.instantiate(Some(t_arg).into_iter()));
        }
        if is_explicit_position {
            match p_iter.next() {
                Some(p) if match_core(p, t_arg, slots, size, explicit, tc) => continue,
                _ => return false,
            }
        }
    }

    p_iter.next().is_none()
}

/// Universe-level matcher. When `pp.universes` would be consulted the
/// entry's levels must match exactly; this printer doesn't expose a way to
/// register a notation whose levels are meant to match loosely, so equality
/// is the only rule -- kept as its own function so a future looser matcher
/// (wildcard levels in a hand-authored pattern) only has to change this one
/// place.
fn level_match(p : &Level, t : &Level) -> bool {
    p.eq_by_antisymm(t)
}

/// An empty pattern level list (what every synthetic prefix/infix/postfix
/// pattern carries, since it's built without knowing the head's real
/// universe arity) is a wildcard: it matches a constant at any universe
/// instantiation. A non-empty pattern level list demands the same arity and
/// pointwise equality -- mismatched arity is a conservative failure.
fn level_match_vec(p : &[Level], t : &[Level]) -> bool {
    p.is_empty() || (p.len() == t.len() && p.iter().zip(t.iter()).all(|(a, b)| level_match(a, b)))
}

/// Renders a successfully matched notation entry. `slots` must have exactly
/// `entry.num_params` elements, ordered the same way `match_notation`
/// returns them (`slots[size-1]` left-most). Walks the transition list
/// right to left, popping one slot per `Transition::Expr`; aborts (`None`)
/// the moment it hits a transition kind it can't render (`Exprs`, `Binder`,
/// `Binders`, `ScopedExpr`, `Ext`, `LuaExt`) so the caller can fall back to
/// plain application syntax.
pub fn render_notation(pp_child : &mut dyn FnMut(&Expr, usize, usize) -> Doc, entry : &NotationEntry, mut slots : Vec<Expr>) -> Option<Parenable> {
    let mut doc : Option<Doc> = None;

    for transition in entry.transitions.iter().rev() {
        match transition {
            Transition::Keyword(tok) => {
                doc = Some(match doc {
                    None => Doc::from(tok.as_str()),
                    Some(d) => Doc::from(tok.as_str()).concat(Doc::line()).concat(d),
                });
            },
            Transition::Expr(rbp) => {
                let slot = slots.pop()?;
                let rendered = pp_child(&slot, entry.priority, *rbp);
                doc = Some(match doc {
                    None => rendered,
                    Some(d) => rendered.concat(Doc::line()).concat(d),
                });
            },
            Transition::Exprs | Transition::Binder | Transition::Binders
                | Transition::ScopedExpr | Transition::Ext(_) | Transition::LuaExt(_) => {
                return None;
            },
        }
    }

    let mut doc = doc.unwrap_or_else(|| Doc::from(""));
    if !entry.nud {
        let leading = slots.pop()?;
        let rendered = pp_child(&leading, entry.priority, entry.priority);
        doc = rendered.concat(Doc::line()).concat(doc);
    }

    let bp = entry.priority.saturating_sub(1);
    Some(Parenable::new(bp, doc.group()))
}

#[cfg(test)]
mod notation_tests {
    use super::*;
    use std::sync::Arc;
    use parking_lot::RwLock;
    use crate::env::Env;
    use crate::expr::{ mk_app, mk_const };

    fn fresh_tc() -> TypeChecker {
        TypeChecker::new(Arc::new(RwLock::new(Env::new(16))))
    }

    #[test]
    fn infix_pattern_matches_applied_head() {
        let mut tc = fresh_tc();
        let entry = NotationEntry::new_infix(crate::name::Name::from("add"), 65, "+");
        let lhs = mk_const("x", Vec::new());
        let rhs = mk_const("y", Vec::new());
        let term = mk_app(mk_app(mk_const("add", Vec::new()), lhs.clone()), rhs.clone());
        let slots = match_notation(&entry, &term, &mut tc).expect("should match");
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0], lhs);
        assert_eq!(slots[1], rhs);
    }

    #[test]
    fn mismatched_head_does_not_match() {
        let mut tc = fresh_tc();
        let entry = NotationEntry::new_infix(crate::name::Name::from("add"), 65, "+");
        let term = mk_app(mk_app(mk_const("mul", Vec::new()), mk_const("x", Vec::new())), mk_const("y", Vec::new()));
        assert!(match_notation(&entry, &term, &mut tc).is_none());
    }

    #[test]
    fn infix_renders_with_operator_between_operands() {
        let mut tc = fresh_tc();
        let entry = NotationEntry::new_infix(crate::name::Name::from("add"), 65, "+");
        let lhs = mk_const("x", Vec::new());
        let rhs = mk_const("y", Vec::new());
        let term = mk_app(mk_app(mk_const("add", Vec::new()), lhs), rhs);
        let slots = match_notation(&entry, &term, &mut tc).unwrap();
        let mut render_child = |e : &Expr, _l : usize, _r : usize| -> Doc {
            Doc::from(format!("{:?}", e.get_const_name().unwrap()))
        };
        let result = render_notation(&mut render_child, &entry, slots).expect("should render");
        let rendered = result.doc.render(80);
        assert_eq!(rendered, "x + y");
    }

    #[test]
    fn prefix_renders_operator_before_operand() {
        let mut tc = fresh_tc();
        let entry = NotationEntry::new_prefix(crate::name::Name::from("neg"), 75, "-");
        let x = mk_const("x", Vec::new());
        let term = mk_app(mk_const("neg", Vec::new()), x);
        let slots = match_notation(&entry, &term, &mut tc).unwrap();
        let mut render_child = |e : &Expr, _l : usize, _r : usize| -> Doc {
            Doc::from(format!("{:?}", e.get_const_name().unwrap()))
        };
        let result = render_notation(&mut render_child, &entry, slots).unwrap();
        assert_eq!(result.doc.render(80), "- x");
    }
}
