use hashbrown::HashMap;

use crate::name::Name;
use crate::level::Level;
use crate::expr::Expr;
use crate::pretty::components::NotationEntry;

/// One declared name's signature, and -- for definitions and lemmas -- its
/// unfolded value. Axioms and opaque constants carry `value : None`, which is
/// exactly the signal `TypeChecker::unfold_definition` uses to know there's
/// nothing to unfold.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name : Name,
    pub univ_params : Vec<Level>,
    pub ty : Expr,
    pub value : Option<Expr>,
}

impl Declaration {
    pub fn new_axiom(name : Name, univ_params : Vec<Level>, ty : Expr) -> Self {
        Declaration { name, univ_params, ty, value : None }
    }

    pub fn new_definition(name : Name, univ_params : Vec<Level>, ty : Expr, value : Expr) -> Self {
        Declaration { name, univ_params, ty, value : Some(value) }
    }

    pub fn is_definition(&self) -> bool {
        self.value.is_some()
    }
}

/// Everything the printer (and the type checker it drives) is allowed to read
/// about the surrounding world: declarations, the notation table, which
/// namespaces are currently open (for name-shortening), registered aliases,
/// the map from hidden/private names to the name they display as, and the
/// registered coercions. Nanoda's original `Env` additionally carried the
/// reduction-rule map and the machinery to compile and check `Modification`s
/// (axioms, definitions, inductive types, quotient) into the environment --
/// none of that survives here, since nothing in this crate adds declarations
/// to an environment or verifies them; it only reads one back out to print
/// terms.
#[derive(Clone)]
pub struct Env {
    pub declarations : HashMap<Name, Declaration>,
    pub notations : HashMap<Name, Vec<NotationEntry>>,
    pub namespaces : Vec<Name>,
    pub aliases : HashMap<Name, Name>,
    pub hidden_names : HashMap<Name, Name>,
    pub coercions : HashMap<Name, u16>,
    pub impredicative : bool,
}

impl Env {
    pub fn new(num_declars : usize) -> Self {
        Env {
            declarations : HashMap::with_capacity(num_declars),
            notations : HashMap::with_capacity(500),
            namespaces : Vec::new(),
            aliases : HashMap::new(),
            hidden_names : HashMap::new(),
            coercions : HashMap::new(),
            impredicative : true,
        }
    }

    pub fn get_declaration(&self, name : &Name) -> Option<&Declaration> {
        self.declarations.get(name)
    }

    pub fn insert_declaration(&mut self, d : Declaration) {
        self.declarations.insert(d.name.clone(), d);
    }

    pub fn get_value(&self, name : &Name) -> Option<&Expr> {
        self.declarations.get(name).and_then(|d| d.value.as_ref())
    }

    pub fn num_declars(&self) -> usize {
        self.declarations.len()
    }

    /// Registers a notation entry under its head, leaving already-registered
    /// entries for that head in place (the first entry a given head gets
    /// registered with wins out, mirroring the teacher's existing
    /// `add_notation`, which never overwrote an occupied slot -- except that
    /// a head may now carry several entries, since one constant can have more
    /// than one mixfix form).
    pub fn add_notation(&mut self, entry : NotationEntry) {
        let head = entry.head.clone();
        let no_duplicate = self.notations.get(&head)
                                          .map_or(true, |v| !v.iter().any(|e| *e == entry));
        if no_duplicate {
            self.notations.entry(head).or_insert_with(Vec::new).push(entry);
        }
    }

    pub fn notations_for(&self, name : &Name) -> &[NotationEntry] {
        self.notations.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Namespaces currently "open" for the purpose of name shortening, most
    /// recently opened last. `open_namespace`/`close_namespace` are a stack;
    /// the shortening logic in the pretty printer walks them to find the
    /// longest active prefix of a constant's name to strip.
    pub fn open_namespace(&mut self, ns : Name) {
        self.namespaces.push(ns);
    }

    pub fn close_namespace(&mut self) {
        self.namespaces.pop();
    }

    pub fn active_namespaces(&self) -> &[Name] {
        self.namespaces.as_slice()
    }

    pub fn add_alias(&mut self, alias : Name, full : Name) {
        self.aliases.insert(alias, full);
    }

    /// An alias `a` resolves to `full` iff `full` is actually the registered
    /// target of `a` *and* no currently active namespace shadows it (i.e.
    /// `ns ++ a` is not itself a declared name for any open `ns`).
    pub fn resolve_alias(&self, full : &Name) -> Option<&Name> {
        let (alias, target) = self.aliases.iter().find(|(_, t)| *t == full)?;
        let shadowed = self.namespaces.iter().any(|ns| {
            self.declarations.contains_key(&ns.concat(alias))
        });
        if shadowed { None } else { Some(alias) }
    }

    pub fn hide_name(&mut self, hidden : Name, user_facing : Name) {
        self.hidden_names.insert(hidden, user_facing);
    }

    pub fn is_hidden(&self, name : &Name) -> bool {
        self.hidden_names.contains_key(name)
    }

    pub fn user_name<'n>(&'n self, name : &'n Name) -> &'n Name {
        self.hidden_names.get(name).unwrap_or(name)
    }

    pub fn add_coercion(&mut self, head : Name, arity : u16) {
        self.coercions.insert(head, arity);
    }

    pub fn coercion_arity(&self, head : &Name) -> Option<u16> {
        self.coercions.get(head).copied()
    }
}
