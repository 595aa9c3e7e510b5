/// The knobs a top-level `pp` call reads before descending into an
/// expression. Nanoda's original set was `{all, implicit, notation, proofs,
/// locals_full_names, indent, width}`; the fields below it are new, one per
/// row of spec.md's "Recognized options" table. `proofs` and
/// `locals_full_names` aren't named anywhere in that table, but nothing
/// excludes them either, so they stay as extra ambient flags nanoda already
/// had a use for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PPOptions {
    /// Legacy "just show me everything" switch; when set, callers
    /// typically also flip `implicit`/`universes`/`full_names` on.
    pub all : bool,
    /// Fold away proof terms (replace a term inferred to be a proof of some
    /// proposition with `_`) when `false`.
    pub proofs : bool,
    /// Always print a local's full suggested name rather than a possibly
    /// shortened display form.
    pub locals_full_names : bool,
    pub indent : usize,
    pub width : usize,

    /// Exceeding this recursion depth collapses the offending subtree to
    /// the ellipsis glyph.
    pub max_depth : usize,
    /// Exceeding this step count collapses the remainder of the current
    /// top-level print to the ellipsis glyph.
    pub max_steps : usize,
    /// Show implicit/strict-implicit/instance-implicit arguments, and
    /// prefix a head carrying them with `@`.
    pub implicit : bool,
    /// Unicode tokens (`λ Π ∀ → ⦃⦄ …`) vs. their ASCII spellings
    /// (`fun Pi forall -> {{}} ...`).
    pub unicode : bool,
    /// Show registered coercion heads instead of eliding them.
    pub coercions : bool,
    /// Consult the notation table at all.
    pub notation : bool,
    /// Display universe arguments (`.{u, v}`) and `Type.{u}` rather than
    /// bare `Type`.
    pub universes : bool,
    /// Print a constant's fully qualified name rather than applying alias/
    /// namespace shortening.
    pub full_names : bool,
    /// Resolve a hidden/private declaration's internal name back to its
    /// user-facing alias.
    pub private_names : bool,
    /// Show the argument spine of an unresolved metavariable application.
    pub metavar_args : bool,
    /// Beta-reduce the expression before printing.
    pub beta : bool,
}

impl PPOptions {
    /// Every boolean off, indent/width/budgets at their smallest sane
    /// values. Used as the base a config-file parser mutates in place.
    pub fn new_all_false() -> Self {
        PPOptions {
            all : false,
            proofs : false,
            locals_full_names : false,
            indent : 2,
            width : 80,
            max_depth : 64,
            max_steps : 4096,
            implicit : false,
            unicode : false,
            coercions : false,
            notation : false,
            universes : false,
            full_names : false,
            private_names : false,
            metavar_args : false,
            beta : false,
        }
    }

    /// The printer's out-of-the-box configuration: unicode notation on,
    /// coercions/proofs/metavariable argument spines shown, names shortened,
    /// generous but finite depth/step budgets.
    pub fn new_default() -> Self {
        PPOptions {
            all : false,
            proofs : true,
            locals_full_names : false,
            indent : 2,
            width : 100,
            max_depth : 512,
            max_steps : 200_000,
            implicit : false,
            unicode : true,
            coercions : true,
            notation : true,
            universes : false,
            full_names : false,
            private_names : false,
            metavar_args : true,
            beta : false,
        }
    }

    pub fn lambda_tok(&self) -> &'static str {
        if self.unicode { "λ" } else { "fun" }
    }

    pub fn pi_tok(&self) -> &'static str {
        if self.unicode { "Π" } else { "Pi" }
    }

    pub fn forall_tok(&self) -> &'static str {
        if self.unicode { "∀" } else { "forall" }
    }

    pub fn arrow_tok(&self) -> &'static str {
        if self.unicode { "→" } else { "->" }
    }

    pub fn strict_implicit_brackets(&self) -> (&'static str, &'static str) {
        if self.unicode { ("⦃", "⦄") } else { ("{{", "}}") }
    }

    pub fn ellipsis_tok(&self) -> &'static str {
        if self.unicode { "…" } else { "..." }
    }
}

impl Default for PPOptions {
    fn default() -> Self {
        PPOptions::new_default()
    }
}

#[cfg(test)]
mod options_tests {
    use super::*;

    #[test]
    fn unicode_toggle_selects_tokens() {
        let mut opts = PPOptions::new_default();
        opts.unicode = true;
        assert_eq!(opts.lambda_tok(), "λ");
        opts.unicode = false;
        assert_eq!(opts.lambda_tok(), "fun");
    }

    #[test]
    fn all_false_has_zero_budgets_below_default() {
        let off = PPOptions::new_all_false();
        let default = PPOptions::new_default();
        assert!(off.max_depth < default.max_depth);
        assert!(off.max_steps < default.max_steps);
    }
}
