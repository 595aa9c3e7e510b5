use std::sync::Arc;
use std::fs::read_to_string;
use std::path::PathBuf;

use parking_lot::RwLock;
use structopt::StructOpt;

use crate::name::{ Name, mk_anon };
use crate::level::mk_zero;
use crate::expr::{ mk_sort, mk_const, mk_local, BinderStyle };
use crate::pretty::pretty_printer::PrettyPrinter;
use crate::pretty::options::PPOptions;
use crate::pretty::components::NotationEntry;
use crate::env::{ Env, Declaration };

#[derive(StructOpt, Debug)]
#[structopt(raw(setting = "structopt::clap::AppSettings::ColoredHelp"))]
#[structopt(name = "kernel-pp",
            about = "Pretty printer for a small dependently-typed term language",
            author = "ammkrn",
            version = "0.1.0")]
pub struct Opt {
    #[structopt(short = "d", long = "debug")]
    pub debug : bool,

    /** Fully qualified declaration names to print. If none are given, every
        declaration registered in the demo environment is printed (or, failing
        that, whatever `config/pp_names.txt` lists). */
    #[structopt(name = "NAME x N")]
    pub names : Vec<Name>,

    #[structopt(long = "width")]
    pub width : Option<usize>,
    #[structopt(long = "indent")]
    pub indent : Option<usize>,
    #[structopt(long = "implicit")]
    pub implicit : bool,
    /// ASCII token spellings (`fun`, `Pi`, `->`) instead of unicode.
    #[structopt(long = "ascii")]
    pub ascii : bool,
    #[structopt(long = "hide-coercions")]
    pub hide_coercions : bool,
    #[structopt(long = "no-notation")]
    pub no_notation : bool,
    #[structopt(long = "universes")]
    pub universes : bool,
    #[structopt(long = "full-names")]
    pub full_names : bool,
    #[structopt(long = "show-private-names")]
    pub show_private_names : bool,
    #[structopt(long = "hide-metavar-args")]
    pub hide_metavar_args : bool,
    #[structopt(long = "beta")]
    pub beta : bool,
}

impl Opt {
    /// Starts from whatever `pp_options.txt`/`config/pp_options.txt` says (or
    /// the printer's own default if neither exists), then lets this run's
    /// flags override individual fields. Flags always win over the file.
    pub fn resolve_pp_options(&self) -> PPOptions {
        let mut options = try_read_pp_options().unwrap_or_else(PPOptions::new_default);
        if let Some(w) = self.width { options.width = w; }
        if let Some(i) = self.indent { options.indent = i; }
        if self.implicit { options.implicit = true; }
        if self.ascii { options.unicode = false; }
        if self.hide_coercions { options.coercions = false; }
        if self.no_notation { options.notation = false; }
        if self.universes { options.universes = true; }
        if self.full_names { options.full_names = true; }
        if self.show_private_names { options.private_names = true; }
        if self.hide_metavar_args { options.metavar_args = false; }
        if self.beta { options.beta = true; }
        options
    }
}

// I'll fix these at some point; at the moment we're (very)
// fast and loose with the parsing, and parsing fails silently.
fn find_true_else_false(s : &str) -> bool {
    if s.contains("true") {
        return true
    } else {
        false
    }
}

fn find_first_usize(s : &str) -> Option<usize> {
    for ws in s.split_whitespace() {
        match ws.parse::<usize>() {
            Ok(n) => return Some(n),
            _ => continue
        }
    }

    None
}

pub fn try_read_pp_options() -> Option<PPOptions> {
    let mut cwd = std::env::current_dir().ok()?;
    let mut cwd_separate_cfg = cwd.clone();
    cwd.push(PathBuf::from("pp_options.txt"));
    cwd_separate_cfg.push(PathBuf::from("config/pp_options.txt"));

    let mut opts = PPOptions::new_default();

    // try to read in both locations
    for line in read_to_string(cwd)
                .ok()
                .or(read_to_string(cwd_separate_cfg).ok())?
                .lines() {
        match line {
            s if s.starts_with('#') => (),
            s if s.contains("pp.proofs") => opts.proofs = find_true_else_false(s),
            s if s.contains("pp.locals_full_names") => opts.locals_full_names = find_true_else_false(s),
            s if s.contains("pp.max_depth") => opts.max_depth = find_first_usize(s)?,
            s if s.contains("pp.max_steps") => opts.max_steps = find_first_usize(s)?,
            s if s.contains("pp.implicit") => opts.implicit = find_true_else_false(s),
            s if s.contains("pp.unicode") => opts.unicode = find_true_else_false(s),
            s if s.contains("pp.coercions") => opts.coercions = find_true_else_false(s),
            s if s.contains("pp.notation") => opts.notation = find_true_else_false(s),
            s if s.contains("pp.universes") => opts.universes = find_true_else_false(s),
            s if s.contains("pp.full_names") => opts.full_names = find_true_else_false(s),
            s if s.contains("pp.private_names") => opts.private_names = find_true_else_false(s),
            s if s.contains("pp.metavar_args") => opts.metavar_args = find_true_else_false(s),
            s if s.contains("pp.beta") => opts.beta = find_true_else_false(s),
            s if s.contains("pp.indent") => opts.indent = find_first_usize(s)?,
            s if s.contains("pp.width") => opts.width = find_first_usize(s)?,
            _ => ()
        }
    }

    Some(opts)
}

pub fn try_read_pp_file() -> Option<(Vec<Name>, Vec<String>)> {
    let mut cwd = std::env::current_dir().ok()?;
    let mut cwd_separate_cfg = cwd.clone();
    cwd.push(PathBuf::from("pp_names.txt"));
    cwd_separate_cfg.push(PathBuf::from("config/pp_names.txt"));

    let (mut names, mut errs) = (Vec::new(), Vec::new());

    for line in read_to_string(cwd)
                .ok()
                .or(read_to_string(cwd_separate_cfg).ok())?
                .lines() {
        match line.parse::<Name>() {
            Ok(n) => names.push(n),
            Err(_) => errs.push(String::from(line))
        }
    }

    Some((names, errs))
}

/// A handful of illustrative declarations (naturals, addition with infix
/// notation, the identity function) registered under an open `nat`
/// namespace, so there's something for `pp_selected` to print without this
/// crate needing a parser or an elaborator of its own to build one up from
/// source text.
pub fn build_demo_env() -> Env {
    let mut env = Env::new(16);

    let nat = Name::from("nat");
    let nat_ty = mk_sort(mk_zero());
    env.insert_declaration(Declaration::new_axiom(nat.clone(), Vec::new(), nat_ty));

    let nat_e = mk_const(nat.clone(), Vec::new());

    let zero = nat.extend_str("zero");
    env.insert_declaration(Declaration::new_axiom(zero, Vec::new(), nat_e.clone()));

    let succ = nat.extend_str("succ");
    env.insert_declaration(Declaration::new_axiom(succ, Vec::new(), nat_e.mk_arrow(&nat_e)));

    let add = nat.extend_str("add");
    let add_ty = nat_e.mk_arrow(&nat_e.mk_arrow(&nat_e));
    env.insert_declaration(Declaration::new_axiom(add.clone(), Vec::new(), add_ty));
    env.add_notation(NotationEntry::new_infix(add, 65, "+"));

    let id_name = nat.extend_str("id");
    let id_ty = nat_e.mk_arrow(&nat_e);
    let n_local = mk_local("n", nat_e.clone(), BinderStyle::Default);
    let id_val = n_local.apply_lambda(&n_local);
    env.insert_declaration(Declaration::new_definition(id_name, Vec::new(), id_ty, id_val));

    env.open_namespace(nat);

    env
}

/// Prints either the names this run was asked for (positionally, or via
/// `config/pp_names.txt` when none were given on the command line), or every
/// declaration in `env` as a last resort.
pub fn pp_selected(opt : &Opt, env : &Arc<RwLock<Env>>) {
    let options = opt.resolve_pp_options();
    let pp = PrettyPrinter::new(env.clone(), options);

    let names = if !opt.names.is_empty() {
        opt.names.clone()
    } else if let Some((ns, _errs)) = try_read_pp_file() {
        ns
    } else {
        let mut all = env.read().declarations.keys().cloned().collect::<Vec<Name>>();
        all.sort_by_key(|n| format!("{:?}", n));
        all
    };

    if names.is_empty() {
        println!("\nNo items to pretty print\n");
        return;
    }

    println!("\nBEGIN PRETTY PRINTER OUTPUT : \n");
    for name in names.iter() {
        let decl = { env.read().get_declaration(name).cloned() };
        match decl {
            Some(d) => println!("{}\n", pp.print_declar(name, &d.ty, d.value.as_ref())),
            None => println!("{:?} : <declaration not found>\n", name),
        }
    }
    println!("END PRETTY PRINTER OUTPUT : \n");
}

impl std::str::FromStr for Name {
    type Err = String;
    fn from_str(s : &str) -> Result<Name, String> {
        let mut base = mk_anon();

        if s.is_empty() {
            return Err(format!("Cannot pretty print the empty/anonymous Lean name!"))
        }

        let fragments = s.split_terminator('.');

        for f in fragments {
            match f.parse::<u64>() {
                Ok(n) => { base = base.extend_num(n); },
                _ => {
                    if f.is_empty() {
                        return Err(format!("Name cannot be empty!"))
                    } else if f.starts_with('#') {
                        return Err(format!("Commented out"))
                    } else {
                        base = base.extend_str(f);
                    }
                }
            }
        }

        Ok(base)
    }
}
