use hashbrown::HashMap;

use crate::expr::Expr;

pub fn safe_minus_one(n : u16) -> u16 {
    if n == 0 {
        n
    } else {
        n - 1
    }
}

pub fn max3(n1 : u16, n2 : u16, n3 : u16) -> u16 {
    n1.max(n2).max(n3)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShortCircuit {
    EqShort,
    NeqShort,
}

pub type SSOption = Option<ShortCircuit>;

/// HashMap based cache; given two expressions, will tell you whether
/// the TypeChecker has seen this particular pair before, and if so,
/// what the result of a definitional equality comparison was.
/// HashMap<(Expr, Expr), ShortCircuit> would be more intuitive, but
/// would require cloning both keys on every lookup due to the memory
/// layout of tuples.
#[derive(Clone)]
pub struct EqCache {
    inner : HashMap<Expr, Vec<(Expr, ShortCircuit)>>
}

impl EqCache {
    pub fn with_capacity(n : usize) -> Self {
        EqCache {
            inner : HashMap::with_capacity(n)
        }
    }

    pub fn get(&self, e1 : &Expr, e2 : &Expr) -> Option<ShortCircuit> {
        let closure = |k : &Expr, seq : &Vec<(Expr, ShortCircuit)>| {
            seq.iter().find(|(lhs, _)| lhs == k).map(|(_, ss_result)| *ss_result)
        };

        self.inner.get(e1)
        .and_then(|vec1| closure(e2, vec1))
        .or_else(|| self.inner.get(e2)
        .and_then(|vec2| closure(e1, vec2)))
    }

    pub fn insert(&mut self, e : Expr, ee : Expr, val : ShortCircuit) {
        match self.inner.get_mut(&e) {
            Some(v) => {
                v.push((ee, val));
            },
            None => {
                let mut v = Vec::with_capacity(10);
                v.push((ee, val));
                self.inner.insert(e, v);
            }
        }
    }
}
