//! Behavioral equivalence between performed and elided copies.
//!
//! A small reference interpreter gives every variable a boxed list of
//! integers: copies deep-clone the list, elided copies share it, element
//! writes mutate it in place. Randomly generated programs are executed once
//! with every copy performed and once with the analysis-approved copies
//! elided; all observables must match.

use nacre_cfg::{ExprId, ExprKind, Lit, Routine, RoutineBuilder, Stmt, Terminator, VarName};
use nacre_data_structures::fx::{FxHashMap, FxHashSet};
use nacre_flow::analysis::find_unnecessary_copies;
use pretty_assertions::assert_eq;
use std::cell::RefCell;
use std::rc::Rc;

type Cell = Rc<RefCell<Vec<i64>>>;

struct Interp<'a> {
    routine: &'a Routine,
    elided: &'a FxHashSet<ExprId>,
    vars: FxHashMap<String, Cell>,
    returned: Option<Vec<i64>>,
}

impl Interp<'_> {
    fn cell(&self, name: &str) -> Cell {
        Rc::clone(&self.vars[name])
    }

    fn eval(&mut self, id: ExprId) -> Cell {
        let routine = self.routine;
        match routine.expr_kind(id) {
            ExprKind::Lit(Lit::Int(v)) => Rc::new(RefCell::new(vec![*v])),
            ExprKind::Lit(Lit::Bool(v)) => Rc::new(RefCell::new(vec![i64::from(*v)])),
            ExprKind::Lit(Lit::Null) => Rc::new(RefCell::new(Vec::new())),
            ExprKind::Var(var) => match &var.name {
                VarName::Direct(name) => self.cell(name),
                VarName::Dynamic(_) => unreachable!("the generator emits direct names only"),
            },
            ExprKind::Copy(inner) => {
                let cell = self.eval(*inner);
                if self.elided.contains(&id) {
                    cell
                } else {
                    let contents = cell.borrow().clone();
                    Rc::new(RefCell::new(contents))
                }
            }
            ExprKind::Assign { target, value } => self.eval_assign(*target, *value),
            other => unreachable!("the generator does not emit {other:?}"),
        }
    }

    fn eval_assign(&mut self, target: ExprId, value: ExprId) -> Cell {
        let routine = self.routine;
        let cell = self.eval(value);
        match routine.expr_kind(target) {
            ExprKind::Var(var) => {
                let VarName::Direct(name) = &var.name else {
                    unreachable!("the generator emits direct targets only")
                };
                self.vars.insert(name.clone(), Rc::clone(&cell));
                cell
            }
            ExprKind::Index { base, index } => {
                let ExprKind::Var(var) = routine.expr_kind(*base) else {
                    unreachable!("the generator indexes variables only")
                };
                let VarName::Direct(name) = &var.name else {
                    unreachable!("the generator emits direct bases only")
                };
                let idx = self.eval(*index).borrow().first().copied().unwrap_or(0).unsigned_abs()
                    as usize
                    % 4;
                let val = cell.borrow().first().copied().unwrap_or(0);
                let base_cell = self.cell(name);
                {
                    let mut list = base_cell.borrow_mut();
                    if list.len() <= idx {
                        list.resize(idx + 1, 0);
                    }
                    list[idx] = val;
                }
                base_cell
            }
            other => unreachable!("the generator does not assign through {other:?}"),
        }
    }

    fn run(&mut self) {
        let routine = self.routine;
        let mut block = routine.entry;
        loop {
            for stmt in &routine.block(block).stmts {
                match stmt {
                    Stmt::Expr(expr) => {
                        self.eval(*expr);
                    }
                    Stmt::Return(Some(expr)) => {
                        let cell = self.eval(*expr);
                        let contents = cell.borrow().clone();
                        self.returned = Some(contents);
                    }
                    Stmt::Return(None) => self.returned = Some(Vec::new()),
                }
            }
            match &routine.block(block).terminator {
                Some(Terminator::Jump(target)) => block = *target,
                Some(Terminator::Branch { condition, then_block, else_block }) => {
                    let taken = self.eval(*condition).borrow().first().copied().unwrap_or(0) != 0;
                    block = if taken { *then_block } else { *else_block };
                }
                None => return,
            }
        }
    }

    fn observables(&self) -> (Vec<(String, Vec<i64>)>, Option<Vec<i64>>) {
        let mut vars: Vec<_> =
            self.vars.iter().map(|(name, cell)| (name.clone(), cell.borrow().clone())).collect();
        vars.sort();
        (vars, self.returned.clone())
    }
}

fn observe(
    routine: &Routine,
    elided: &FxHashSet<ExprId>,
) -> (Vec<(String, Vec<i64>)>, Option<Vec<i64>>) {
    let vars = routine
        .flow
        .vars()
        .map(|v| (routine.flow.name(v).to_owned(), Rc::new(RefCell::new(Vec::new()))))
        .collect();
    let mut interp = Interp { routine, elided, vars, returned: None };
    interp.run();
    interp.observables()
}

struct XorShift(u64);

impl XorShift {
    fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

const VARS: [&str; 4] = ["a", "b", "c", "d"];

fn random_stmt(b: &mut RoutineBuilder, rng: &mut XorShift) {
    let target = VARS[rng.below(4) as usize];
    match rng.below(4) {
        0 => {
            let lit = b.lit_int(rng.below(100) as i64);
            b.assign(target, lit);
        }
        1 => {
            let source = VARS[rng.below(4) as usize];
            let read = b.read(source);
            let copy = b.copied(read);
            b.assign(target, copy);
        }
        // An assignment whose copy an earlier round already elided: the two
        // variables are true aliases.
        2 => {
            let source = VARS[rng.below(4) as usize];
            let read = b.read(source);
            b.assign(target, read);
        }
        _ => {
            let idx = b.lit_int(rng.below(3) as i64);
            let val = b.lit_int(rng.below(100) as i64);
            b.assign_index(target, idx, val);
        }
    }
}

fn random_routine(seed: u64) -> Routine {
    let mut rng = XorShift::new(seed);
    let mut b = RoutineBuilder::new("generated");
    for _ in 0..rng.below(4) + 2 {
        random_stmt(&mut b, &mut rng);
    }
    if rng.below(2) == 0 {
        let then_block = b.create_block();
        let else_block = b.create_block();
        let merge = b.create_block();
        let cond = b.lit_bool(rng.below(2) == 0);
        b.branch(cond, then_block, else_block);
        b.switch_to_block(then_block);
        for _ in 0..rng.below(3) + 1 {
            random_stmt(&mut b, &mut rng);
        }
        b.jump(merge);
        b.switch_to_block(else_block);
        for _ in 0..rng.below(3) + 1 {
            random_stmt(&mut b, &mut rng);
        }
        b.jump(merge);
        b.switch_to_block(merge);
        for _ in 0..rng.below(3) {
            random_stmt(&mut b, &mut rng);
        }
    }
    let ret = VARS[rng.below(4) as usize];
    let read = b.read(ret);
    let copy = b.copied(read);
    b.ret(Some(copy));
    b.finish()
}

#[test]
fn elided_copies_preserve_observable_behavior() {
    let keep_all = FxHashSet::default();
    for seed in 1..=400 {
        let routine = random_routine(seed);
        let elided = find_unnecessary_copies(&routine).unwrap();
        let baseline = observe(&routine, &keep_all);
        let optimized = observe(&routine, &elided);
        assert_eq!(baseline, optimized, "observable divergence for seed {seed}:\n{routine}");
    }
}

#[test]
fn straight_line_chain_matches_by_hand() {
    let mut b = RoutineBuilder::new("chain");
    let one = b.lit_int(1);
    b.assign("a", one);
    let read_a = b.read("a");
    let copy_a = b.copied(read_a);
    b.assign("b", copy_a);
    let zero = b.lit_int(0);
    let nine = b.lit_int(9);
    b.assign_index("b", zero, nine);
    let read_b = b.read("b");
    let ret_copy = b.copied(read_b);
    b.ret(Some(ret_copy));
    let routine = b.finish();

    let elided = find_unnecessary_copies(&routine).unwrap();
    // The mutation of `b` pins the assignment copy; the return copy is free.
    assert!(!elided.contains(&copy_a));
    assert!(elided.contains(&ret_copy));

    let (vars, returned) = observe(&routine, &elided);
    assert_eq!(returned, Some(vec![9]));
    let a = vars.iter().find(|(name, _)| name == "a").map(|(_, v)| v.clone());
    assert_eq!(a, Some(vec![1]));
}
