#![forbid(unsafe_code)]
#![allow(unused_parens)]
#![allow(non_snake_case)]

use std::sync::Arc;

use parking_lot::RwLock;
use structopt::StructOpt;

use crate::cli::{ Opt, build_demo_env, pp_selected };

pub mod utils;
pub mod errors;
pub mod name;
pub mod level;
pub mod expr;
pub mod tc;
pub mod env;
pub mod pretty;
pub mod cli;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

fn main() {
    #[cfg(feature = "tracing")]
    env_logger::init();

    let opt = Opt::from_args();

    if opt.debug {
        println!("CLI returned these arguments : {:#?}", opt);
    }

    let env = Arc::new(RwLock::new(build_demo_env()));
    pp_selected(&opt, &env);
}
