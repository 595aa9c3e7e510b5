use std::fmt::Debug;

/// Most of these are errors that get thrown in the event
/// that a pattern match expects something that it doesn't end up getting.
/// For instance, partial conversions or failed definitional equality/
/// inference checks. Ideally we would get rid of the ones related to partial functions,
/// but Rust's type system doesn't offer discrimination of enum variants
/// at the type level, and my experience trying to break each enum variant
/// out into its own struct suggested that the amount of extra code you would need
/// just to do explicit casting between types would be a huge hit to readability
/// and directness.
///
/// These are reserved for shapes that are genuinely impossible to produce from
/// well-formed input; anything the printer can receive from an un-elaborated
/// or partially-broken term (a missing declaration, a query the type checker
/// can't answer, a notation that doesn't match) must **not** end up here --
/// those cases degrade to a conservative default instead of calling one of
/// these functions. See `PrettyPrinter`'s case printers for the pattern.

pub fn err_get_serial<T : Debug>(loc : u32, owise : &T) -> ! {
    eprintln!("expr line {}; Expr::get_serial is a partial function defined only on expresisons made with the `Local` constructor, but it was called with {:?}\n", loc, owise);
    std::process::exit(-1);
}

pub fn err_lc_binding<T : Debug>(loc : u32, owise : &T) -> ! {
    eprintln!("expr line {}; Expr::lc_binding is a partial function defined only on expresisons made with the `Local` constructor, but it was called with {:?}\n", loc, owise);
    std::process::exit(-1);
}

pub fn err_binding_lc<T : Debug>(loc : u32, owise : &T) -> ! {
    eprintln!("expr line {}; `From` conversion for Expr -> Binding is a partial function defined only on arguments of the form Expr::Local, but it was called with the following expression {:?}\n\n", loc, owise);
    std::process::exit(-1);
}

pub fn err_swap_local_binding_name<T : Debug>(loc : u32, owise : &T) -> !{
    eprintln!("expr line {}; Expr::swap_local_binding_name is a partial function defined only on expresisons made with the `Local` constructor, but it was called with {:?}\n", loc, owise);
    std::process::exit(-1);
}

pub fn err_offset_cache(loc : u32, idx : usize, len : usize) -> ! {
    eprintln!("expr line {}; OffsetCache failed to retrieve HashMap at index {}; vec length was {}\n", loc, idx, len);
    std::process::exit(-1);
}

pub fn err_param_name<T : Debug>(loc : u32, got : &T) -> ! {
    eprintln!("level line {}; Level::get_param_name() is a partial function defined only for Param variants. Got {:?}\n", loc, got);
    std::process::exit(-1)
}

pub fn partial_is_pi<T : Debug>(loc : u32, item : T) -> ! {
    eprintln!("expr line {}; bad call to partial function `binder_is_pi`; expected Pi or Lambda, got {:?}\n", loc, item);
    std::process::exit(-1);
}

pub fn toplevel_err<T : Debug>(t : &T) -> ! {
   eprintln!("execution failed with error : {:?}\n", t);
   std::process::exit(-1)
}

pub type NanodaResult<T> = Result<T, NanodaErr>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NanodaErr {
    BadIndexErr(&'static str, u32, usize),
    NotSortErr(&'static str, u32),
    NotLocalErr(&'static str, u32),
    NotBinderErr(&'static str, u32),
    NotConstErr(&'static str, u32),
    NoneErr(&'static str, u32, &'static str),
    UnknownDeclarErr(&'static str, u32),
    BadNameErr(String),
}

impl std::fmt::Display for NanodaErr {
    fn fmt(&self, f : &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            NanodaErr::BadIndexErr(file, loc, idx) => write!(f, "Got a fatal error at {} line {} for a bad index. Tried to get {}\n", file, loc, idx),
            NanodaErr::NotSortErr(file, loc)  => write!(f, "Got a fatal error at {} line {}; tried to get info about a `Sort` Expr, but the argument was not a Sort.\n", file, loc),
            NanodaErr::NotLocalErr(file, loc)  => write!(f, "Got a fatal error at {} line {}; tried to get info about a `Local` Expr, but the argument was not a Local.\n", file, loc),
            NanodaErr::NotBinderErr(file, loc)  => write!(f, "Got a fatal error at {} line {}; function expected a binder expression (Pi or Lambda), but got something else.\n", file, loc),
            NanodaErr::NotConstErr(file, loc) => write!(f, "Got a fatal error at {} line {}; function expected a Const expression, but got something else.\n", file, loc),
            NanodaErr::NoneErr(file, loc, msg) => write!(f, "Got a fatal err (None err) in {} line {}; {}", file, loc, msg),
            NanodaErr::UnknownDeclarErr(file, loc) => write!(f, "Got a fatal error at {} line {}; declaration was not present in the environment.", file, loc),
            NanodaErr::BadNameErr(msg) => write!(f, "Failed to parse a hierarchical name : {}", msg),
        }
    }
}

impl std::error::Error for NanodaErr {}
