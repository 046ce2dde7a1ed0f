//! Tree-walking evaluator for parsed scripts.
//!
//! Each call to [`Interpreter::exec_file`] takes an environment and hands back
//! a new one; the input environment is never mutated in place.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use indexmap::IndexMap;

use super::ast::*;
use super::builtins;
use super::error::ScriptError;
use super::methods;
use super::parser::{parse, parse_expr};
use super::value::{as_f64, compare, float_to_int, Args, DictKey, Function, Locals, Value};
use crate::script_err;

/// Global bindings visible to a script.
pub type Env = im::HashMap<String, Value>;

/// Exported bindings of a loadable module.
pub type Module = IndexMap<String, Value>;

/// Default limit on nested function calls.
pub const DEFAULT_MAX_DEPTH: usize = 200;

/// Largest list or string that repetition or `range` may produce.
pub const MAX_SEQUENCE_LEN: usize = 1 << 24;

/// Resolves `load("name", ...)` statements.
pub trait ModuleLoader {
    fn load(&self, module: &str) -> Result<Module, ScriptError>;
}

/// Receives lines written by `print()`.
pub trait OutputSink {
    fn emit(&mut self, line: &str);
}

impl OutputSink for Vec<String> {
    fn emit(&mut self, line: &str) {
        self.push(line.to_string());
    }
}

/// A loader that knows no modules.
pub struct NoModules;

impl ModuleLoader for NoModules {
    fn load(&self, module: &str) -> Result<Module, ScriptError> {
        script_err!("module not defined: \"{}\"", module)
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

pub struct Interpreter<'a> {
    loader: &'a dyn ModuleLoader,
    output: &'a mut dyn OutputSink,
    depth: usize,
    max_depth: usize,
}

enum Flow {
    Normal,
    Return(Value),
    Break,
    Continue,
}

struct Frame {
    globals: Rc<RefCell<Env>>,
    locals: Option<Locals>,
    enclosing: Vec<Locals>,
}

impl Frame {
    /// Own locals first, then enclosing functions from the innermost out, then globals.
    fn lookup(&self, name: &str) -> Option<Value> {
        let scopes = self.locals.iter().chain(self.enclosing.iter().rev());
        for scope in scopes {
            if let Some(value) = scope.borrow().get(name) {
                return Some(value.clone());
            }
        }
        self.globals.borrow().get(name).cloned()
    }

    fn bind(&mut self, name: &str, value: Value) {
        match &self.locals {
            Some(locals) => {
                locals.borrow_mut().insert(name.to_string(), value);
            }
            None => {
                self.globals.borrow_mut().insert(name.to_string(), value);
            }
        }
    }

    /// Scopes visible to a function or comprehension created in this frame.
    fn closure(&self) -> Vec<Locals> {
        let mut scopes = self.enclosing.clone();
        scopes.extend(self.locals.clone());
        scopes
    }

    fn nested(&self) -> Frame {
        Frame {
            globals: self.globals.clone(),
            locals: Some(Locals::default()),
            enclosing: self.closure(),
        }
    }
}

impl<'a> Interpreter<'a> {
    pub fn new(loader: &'a dyn ModuleLoader, output: &'a mut dyn OutputSink) -> Self {
        Self {
            loader,
            output,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Writes one line of script output.
    pub fn print(&mut self, line: &str) {
        self.output.emit(line);
    }

    /// Executes `source` as a module against `env` and returns the resulting globals.
    pub fn exec_file(&mut self, source: &str, env: Env) -> Result<Env, ScriptError> {
        let stmts = parse(source)?;
        let globals = Rc::new(RefCell::new(env));
        let mut frame = Frame {
            globals: globals.clone(),
            locals: None,
            enclosing: Vec::new(),
        };
        self.exec_block(&stmts, &mut frame)?;
        let env = globals.borrow().clone();
        Ok(env)
    }

    /// Invokes any callable value.
    pub fn call(&mut self, callee: &Value, args: Args) -> Result<Value, ScriptError> {
        match callee {
            Value::Function(f) => self.call_function(f, args),
            Value::Builtin(b) => (b.func)(self, args),
            other => script_err!("invalid call of non-function ({})", other.type_name()),
        }
    }

    fn call_function(&mut self, f: &Function, args: Args) -> Result<Value, ScriptError> {
        if self.depth >= self.max_depth {
            return script_err!("maximum recursion depth exceeded");
        }
        let locals = bind_params(f, args)?;
        let mut frame = Frame {
            globals: f.globals.clone(),
            locals: Some(Rc::new(RefCell::new(locals))),
            enclosing: f.enclosing.clone(),
        };
        self.depth += 1;
        let flow = self.exec_block(&f.def.body, &mut frame);
        self.depth -= 1;
        match flow? {
            Flow::Return(value) => Ok(value),
            _ => Ok(Value::None),
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn exec_block(&mut self, stmts: &[Stmt], frame: &mut Frame) -> Result<Flow, ScriptError> {
        for stmt in stmts {
            match self
                .exec_stmt(stmt, frame)
                .map_err(|e| e.or_at(stmt.pos))?
            {
                Flow::Normal => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt, frame: &mut Frame) -> Result<Flow, ScriptError> {
        match &stmt.kind {
            StmtKind::Expr(expr) => {
                self.eval(expr, frame)?;
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value, frame)?;
                self.assign(target, value, frame)?;
            }
            StmtKind::AugAssign { target, op, value } => {
                self.aug_assign(target, *op, value, frame)?;
            }
            StmtKind::Def(def) => {
                let function = self.make_function(def, frame)?;
                frame.bind(&def.name, function);
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, frame)?,
                    None => Value::None,
                };
                return Ok(Flow::Return(value));
            }
            StmtKind::If {
                branches,
                otherwise,
            } => {
                for (cond, body) in branches {
                    if self.eval(cond, frame)?.truth() {
                        return self.exec_block(body, frame);
                    }
                }
                return self.exec_block(otherwise, frame);
            }
            StmtKind::For { target, iter, body } => {
                for item in self.eval(iter, frame)?.iterate()? {
                    self.assign(target, item, frame)?;
                    match self.exec_block(body, frame)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        ret @ Flow::Return(_) => return Ok(ret),
                    }
                }
            }
            StmtKind::Pass => {}
            StmtKind::Break => return Ok(Flow::Break),
            StmtKind::Continue => return Ok(Flow::Continue),
            StmtKind::Load { module, bindings } => {
                let loaded = self.loader.load(module).map_err(|e| {
                    ScriptError::new(format!("cannot load {}: {}", module, e.message))
                })?;
                for (local, exported) in bindings {
                    let value = loaded.get(exported).cloned().ok_or_else(|| {
                        ScriptError::new(format!(
                            "load: name {} not found in module {}",
                            exported, module
                        ))
                    })?;
                    frame.bind(local, value);
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn make_function(&mut self, def: &Rc<FunctionDef>, frame: &mut Frame) -> Result<Value, ScriptError> {
        let defaults = def
            .params
            .iter()
            .map(|p| p.default.as_ref().map(|e| self.eval(e, frame)).transpose())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Value::Function(Rc::new(Function {
            def: def.clone(),
            defaults,
            globals: frame.globals.clone(),
            enclosing: frame.closure(),
        })))
    }

    fn assign(&mut self, target: &Target, value: Value, frame: &mut Frame) -> Result<(), ScriptError> {
        match target {
            Target::Name(name) => frame.bind(name, value),
            Target::Index { object, index } => {
                let object = self.eval(object, frame)?;
                let index = self.eval(index, frame)?;
                set_index(&object, index, value)?;
            }
            Target::Tuple(targets) => {
                let items = value.iterate()?;
                if items.len() != targets.len() {
                    return script_err!(
                        "unpack: got {} values, want {}",
                        items.len(),
                        targets.len()
                    );
                }
                for (target, item) in targets.iter().zip(items) {
                    self.assign(target, item, frame)?;
                }
            }
        }
        Ok(())
    }

    fn aug_assign(
        &mut self,
        target: &Target,
        op: BinOp,
        value: &Expr,
        frame: &mut Frame,
    ) -> Result<(), ScriptError> {
        match target {
            Target::Name(name) => {
                let current = self.lookup(name, frame)?;
                let rhs = self.eval(value, frame)?;
                let updated = augment(current, op, &rhs)?;
                frame.bind(name, updated);
            }
            Target::Index { object, index } => {
                let object = self.eval(object, frame)?;
                let index = self.eval(index, frame)?;
                let current = get_index(&object, &index)?;
                let rhs = self.eval(value, frame)?;
                let updated = augment(current, op, &rhs)?;
                set_index(&object, index, updated)?;
            }
            Target::Tuple(_) => return script_err!("invalid target for augmented assignment"),
        }
        Ok(())
    }

    fn lookup(&self, name: &str, frame: &Frame) -> Result<Value, ScriptError> {
        frame
            .lookup(name)
            .or_else(|| builtins::lookup(name))
            .ok_or_else(|| ScriptError::new(format!("undefined: {}", name)))
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    fn eval(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Value, ScriptError> {
        self.eval_kind(expr, frame).map_err(|e| e.or_at(expr.pos))
    }

    fn eval_all(&mut self, exprs: &[Expr], frame: &mut Frame) -> Result<Vec<Value>, ScriptError> {
        exprs.iter().map(|e| self.eval(e, frame)).collect()
    }

    fn eval_kind(&mut self, expr: &Expr, frame: &mut Frame) -> Result<Value, ScriptError> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(literal_value(lit)),
            ExprKind::Name(name) => self.lookup(name, frame),
            ExprKind::List(items) => Ok(Value::list(self.eval_all(items, frame)?)),
            ExprKind::Tuple(items) => Ok(Value::tuple(self.eval_all(items, frame)?)),
            ExprKind::Dict(entries) => {
                let mut map = IndexMap::new();
                for (key, value) in entries {
                    let key = DictKey::from_value(&self.eval(key, frame)?)?;
                    let value = self.eval(value, frame)?;
                    map.insert(key, value);
                }
                Ok(Value::dict(map))
            }
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand, frame)?;
                unary_op(*op, value)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, frame)?;
                let rhs = self.eval(rhs, frame)?;
                binary_op(*op, &lhs, &rhs)
            }
            ExprKind::Logical { op, lhs, rhs } => {
                let lhs = self.eval(lhs, frame)?;
                match (op, lhs.truth()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(lhs),
                    _ => self.eval(rhs, frame),
                }
            }
            ExprKind::Cond {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond, frame)?.truth() {
                    self.eval(then, frame)
                } else {
                    self.eval(otherwise, frame)
                }
            }
            ExprKind::Call { func, args } => {
                let callee = self.eval(func, frame)?;
                let args = self.eval_args(args, frame)?;
                self.call(&callee, args)
            }
            ExprKind::Attr { object, name } => {
                let object = self.eval(object, frame)?;
                get_attr(&object, name)
            }
            ExprKind::Index { object, index } => {
                let object = self.eval(object, frame)?;
                let index = self.eval(index, frame)?;
                get_index(&object, &index)
            }
            ExprKind::Slice {
                object,
                start,
                stop,
                step,
            } => {
                let object = self.eval(object, frame)?;
                let mut bound = |e: &Option<Box<Expr>>| -> Result<Option<i64>, ScriptError> {
                    match e {
                        None => Ok(None),
                        Some(e) => match self.eval(e, frame)? {
                            Value::None => Ok(None),
                            Value::Int(n) => Ok(Some(n)),
                            other => script_err!(
                                "invalid slice index: got {}, want int",
                                other.type_name()
                            ),
                        },
                    }
                };
                let start = bound(start)?;
                let stop = bound(stop)?;
                let step = bound(step)?;
                slice(&object, start, stop, step)
            }
            ExprKind::ListComp { element, clauses } => {
                let mut scope = frame.nested();
                let mut out = Vec::new();
                self.comprehend(clauses, &mut scope, &mut |interp, scope| {
                    out.push(interp.eval(element, scope)?);
                    Ok(())
                })?;
                Ok(Value::list(out))
            }
            ExprKind::DictComp {
                key,
                value,
                clauses,
            } => {
                let mut scope = frame.nested();
                let mut out = IndexMap::new();
                self.comprehend(clauses, &mut scope, &mut |interp, scope| {
                    let k = DictKey::from_value(&interp.eval(key, scope)?)?;
                    let v = interp.eval(value, scope)?;
                    out.insert(k, v);
                    Ok(())
                })?;
                Ok(Value::dict(out))
            }
            ExprKind::Lambda(def) => self.make_function(def, frame),
        }
    }

    /// Runs `emit` once per binding produced by the `for`/`if` clauses.
    fn comprehend(
        &mut self,
        clauses: &[CompClause],
        scope: &mut Frame,
        emit: &mut dyn FnMut(&mut Self, &mut Frame) -> Result<(), ScriptError>,
    ) -> Result<(), ScriptError> {
        match clauses.split_first() {
            None => emit(self, scope)?,
            Some((CompClause::For { target, iter }, rest)) => {
                for item in self.eval(iter, scope)?.iterate()? {
                    self.assign(target, item, scope)?;
                    self.comprehend(rest, scope, emit)?;
                }
            }
            Some((CompClause::If(cond), rest)) => {
                if self.eval(cond, scope)?.truth() {
                    self.comprehend(rest, scope, emit)?;
                }
            }
        }
        Ok(())
    }

    fn eval_args(&mut self, args: &[Arg], frame: &mut Frame) -> Result<Args, ScriptError> {
        let mut out = Args::default();
        for arg in args {
            match arg {
                Arg::Positional(e) => out.positional.push(self.eval(e, frame)?),
                Arg::Keyword(name, e) => {
                    let value = self.eval(e, frame)?;
                    out.named.push((name.clone(), value));
                }
                Arg::Star(e) => out.positional.extend(self.eval(e, frame)?.iterate()?),
                Arg::StarStar(e) => match self.eval(e, frame)? {
                    Value::Dict(entries) => {
                        for (key, value) in entries.borrow().iter() {
                            match key {
                                DictKey::Str(name) => out.named.push((name.clone(), value.clone())),
                                _ => return script_err!("keywords must be strings"),
                            }
                        }
                    }
                    other => {
                        return script_err!(
                            "argument after ** must be a dict, not {}",
                            other.type_name()
                        )
                    }
                },
            }
        }
        Ok(out)
    }
}

// ============================================================================
// PARAMETER BINDING
// ============================================================================

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn bind_params(f: &Function, args: Args) -> Result<HashMap<String, Value>, ScriptError> {
    let def = &f.def;
    let params = &def.params;
    let given = args.positional.len();
    if given > params.len() && def.varargs.is_none() {
        let at_most = if f.defaults.iter().any(Option::is_some) {
            "at most "
        } else {
            ""
        };
        return script_err!(
            "function {} accepts {}{} positional argument{} ({} given)",
            def.name,
            at_most,
            params.len(),
            plural(params.len()),
            given
        );
    }

    let mut slots: Vec<Option<Value>> = vec![None; params.len()];
    let mut positional = args.positional.into_iter();
    for slot in slots.iter_mut() {
        match positional.next() {
            Some(value) => *slot = Some(value),
            None => break,
        }
    }
    let extra: Vec<Value> = positional.collect();

    let mut kwargs = IndexMap::new();
    for (key, value) in args.named {
        match params.iter().position(|p| p.name == key) {
            Some(i) if slots[i].is_some() => {
                return script_err!(
                    "function {} got multiple values for parameter {}",
                    def.name,
                    key
                )
            }
            Some(i) => slots[i] = Some(value),
            None if def.kwargs.is_some() => {
                kwargs.insert(DictKey::Str(key), value);
            }
            None => {
                return script_err!(
                    "function {} got an unexpected keyword argument {}",
                    def.name,
                    key
                )
            }
        }
    }

    let mut locals = HashMap::new();
    let mut missing = Vec::new();
    for ((param, slot), default) in params.iter().zip(slots).zip(&f.defaults) {
        match slot.or_else(|| default.clone()) {
            Some(value) => {
                locals.insert(param.name.clone(), value);
            }
            None => missing.push(param.name.as_str()),
        }
    }
    if !missing.is_empty() {
        return script_err!(
            "function {} missing {} argument{} ({})",
            def.name,
            missing.len(),
            plural(missing.len()),
            missing.join(", ")
        );
    }
    if let Some(name) = &def.varargs {
        locals.insert(name.clone(), Value::tuple(extra));
    }
    if let Some(name) = &def.kwargs {
        locals.insert(name.clone(), Value::dict(kwargs));
    }
    Ok(locals)
}

// ============================================================================
// OPERATORS
// ============================================================================

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(n) => Value::Int(*n),
        Literal::Float(x) => Value::Float(*x),
        Literal::Str(s) => Value::Str(s.clone()),
    }
}

fn unary_op(op: UnaryOp, value: Value) -> Result<Value, ScriptError> {
    match (op, value) {
        (UnaryOp::Not, v) => Ok(Value::Bool(!v.truth())),
        (UnaryOp::Neg, Value::Int(n)) => n
            .checked_neg()
            .map(Value::Int)
            .ok_or_else(|| ScriptError::new("integer overflow")),
        (UnaryOp::Neg, Value::Float(x)) => Ok(Value::Float(-x)),
        (UnaryOp::Plus, v @ (Value::Int(_) | Value::Float(_))) => Ok(v),
        (UnaryOp::Neg, v) => script_err!("unsupported unary op: -{}", v.type_name()),
        (UnaryOp::Plus, v) => script_err!("unsupported unary op: +{}", v.type_name()),
    }
}

/// Applies a binary operator to two evaluated operands.
pub(crate) fn binary_op(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    use std::cmp::Ordering::*;
    Ok(match op {
        BinOp::Eq => Value::Bool(lhs == rhs),
        BinOp::NotEq => Value::Bool(lhs != rhs),
        BinOp::Lt => Value::Bool(compare(lhs, rhs)? == Less),
        BinOp::LtEq => Value::Bool(compare(lhs, rhs)? != Greater),
        BinOp::Gt => Value::Bool(compare(lhs, rhs)? == Greater),
        BinOp::GtEq => Value::Bool(compare(lhs, rhs)? != Less),
        BinOp::In => Value::Bool(contains(rhs, lhs)?),
        BinOp::NotIn => Value::Bool(!contains(rhs, lhs)?),
        _ => arith(op, lhs, rhs)?,
    })
}

fn augment(current: Value, op: BinOp, rhs: &Value) -> Result<Value, ScriptError> {
    if let (BinOp::Add, Value::List(items)) = (op, &current) {
        let extra = rhs.iterate()?;
        items.borrow_mut().extend(extra);
        return Ok(current);
    }
    binary_op(op, &current, rhs)
}

fn arith(op: BinOp, lhs: &Value, rhs: &Value) -> Result<Value, ScriptError> {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            float_arith(op, as_f64(lhs), as_f64(rhs))
        }
        (Value::Str(a), Value::Str(b)) if op == BinOp::Add => Ok(Value::Str(format!("{}{}", a, b))),
        (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s)) if op == BinOp::Mul => {
            let times = repeat_count(s.len(), *n)?;
            Ok(Value::Str(s.repeat(times)))
        }
        (Value::List(a), Value::List(b)) if op == BinOp::Add => Ok(Value::list(
            a.borrow().iter().chain(b.borrow().iter()).cloned().collect(),
        )),
        (Value::Tuple(a), Value::Tuple(b)) if op == BinOp::Add => {
            Ok(Value::tuple(a.iter().chain(b.iter()).cloned().collect()))
        }
        (Value::List(a), Value::Int(n)) | (Value::Int(n), Value::List(a)) if op == BinOp::Mul => {
            let items = a.borrow();
            let times = repeat_count(items.len(), *n)?;
            let mut out = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                out.extend(items.iter().cloned());
            }
            Ok(Value::list(out))
        }
        (Value::Str(format), _) if op == BinOp::Mod => percent_format(format, rhs),
        _ => script_err!(
            "unknown binary op: {} {} {}",
            lhs.type_name(),
            op.symbol(),
            rhs.type_name()
        ),
    }
}

/// Number of copies for `seq * n`, refusing results past [`MAX_SEQUENCE_LEN`].
fn repeat_count(len: usize, n: i64) -> Result<usize, ScriptError> {
    let times = usize::try_from(n.max(0)).unwrap_or(usize::MAX);
    if len == 0 || times == 0 {
        return Ok(0);
    }
    match len.checked_mul(times) {
        Some(total) if total <= MAX_SEQUENCE_LEN => Ok(times),
        _ => script_err!("excessive repeat ({} * {} elements)", len, n),
    }
}

fn int_arith(op: BinOp, a: i64, b: i64) -> Result<Value, ScriptError> {
    let overflow = || ScriptError::new("integer overflow");
    Ok(match op {
        BinOp::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        BinOp::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        BinOp::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        BinOp::Div => {
            if b == 0 {
                return script_err!("floating-point division by zero");
            }
            Value::Float(a as f64 / b as f64)
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return script_err!("integer division by zero");
            }
            let q = a.checked_div(b).ok_or_else(overflow)?;
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            Value::Int(if r != 0 && (a < 0) != (b < 0) { q - 1 } else { q })
        }
        BinOp::Mod => {
            if b == 0 {
                return script_err!("integer modulo by zero");
            }
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            Value::Int(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        _ => return script_err!("unknown binary op: int {} int", op.symbol()),
    })
}

fn float_arith(op: BinOp, a: f64, b: f64) -> Result<Value, ScriptError> {
    let needs_divisor = matches!(op, BinOp::Div | BinOp::FloorDiv | BinOp::Mod);
    if needs_divisor && b == 0.0 {
        return script_err!("floating-point division by zero");
    }
    Ok(Value::Float(match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => a / b,
        BinOp::FloorDiv => (a / b).floor(),
        BinOp::Mod => a - b * (a / b).floor(),
        _ => return script_err!("unknown binary op: float {} float", op.symbol()),
    }))
}

fn percent_format(format: &str, args: &Value) -> Result<Value, ScriptError> {
    let values = match args {
        Value::Tuple(items) => items.as_ref().clone(),
        other => vec![other.clone()],
    };
    let mut values = values.into_iter();
    let mut out = String::new();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let directive = chars.next();
        if directive == Some('%') {
            out.push('%');
            continue;
        }
        let value = values
            .next()
            .ok_or_else(|| ScriptError::new("not enough arguments for format string"))?;
        match (directive, &value) {
            (Some('s'), v) => out.push_str(&v.to_string()),
            (Some('r'), v) => out.push_str(&v.repr()),
            (Some('d'), Value::Int(n)) => out.push_str(&n.to_string()),
            (Some('d'), Value::Float(x)) => match float_to_int(*x) {
                Some(n) => out.push_str(&n.to_string()),
                None => return script_err!("%d format: float out of range"),
            },
            (Some('d'), v) => {
                return script_err!("%d format requires integer: {}", v.type_name())
            }
            (Some(other), _) => return script_err!("unsupported format character '{}'", other),
            (None, _) => return script_err!("incomplete format"),
        }
    }
    if values.next().is_some() {
        return script_err!("too many arguments for format string");
    }
    Ok(Value::Str(out))
}

fn contains(container: &Value, item: &Value) -> Result<bool, ScriptError> {
    match container {
        Value::Str(s) => match item {
            Value::Str(needle) => Ok(s.contains(needle.as_str())),
            other => script_err!(
                "'in <string>' requires string as left operand, not {}",
                other.type_name()
            ),
        },
        Value::List(items) => Ok(items.borrow().iter().any(|v| v == item)),
        Value::Tuple(items) => Ok(items.iter().any(|v| v == item)),
        Value::Dict(entries) => Ok(entries.borrow().contains_key(&DictKey::from_value(item)?)),
        other => script_err!(
            "unknown binary op: {} in {}",
            item.type_name(),
            other.type_name()
        ),
    }
}

// ============================================================================
// ATTRIBUTES, INDEXING AND SLICING
// ============================================================================

pub(crate) fn get_attr(object: &Value, name: &str) -> Result<Value, ScriptError> {
    match object {
        Value::Struct(s) => s.fields.get(name).cloned().ok_or_else(|| {
            if s.type_name == "struct" {
                ScriptError::new(format!("struct has no .{} attribute", name))
            } else {
                ScriptError::new(format!(
                    "\"{}\" struct has no .{} attribute",
                    s.type_name, name
                ))
            }
        }),
        other => methods::bind(other, name).ok_or_else(|| {
            ScriptError::new(format!(
                "{} has no .{} field or method",
                other.type_name(),
                name
            ))
        }),
    }
}

fn resolve_index(index: &Value, len: usize, kind: &str) -> Result<usize, ScriptError> {
    let Value::Int(i) = index else {
        return script_err!("{} index: got {}, want int", kind, index.type_name());
    };
    let n = len as i64;
    let j = if *i < 0 { i + n } else { *i };
    if j < 0 || j >= n {
        return script_err!("{} index {} out of range (length {})", kind, i, len);
    }
    Ok(j as usize)
}

pub(crate) fn get_index(object: &Value, index: &Value) -> Result<Value, ScriptError> {
    match object {
        Value::List(items) => {
            let items = items.borrow();
            Ok(items[resolve_index(index, items.len(), "list")?].clone())
        }
        Value::Tuple(items) => Ok(items[resolve_index(index, items.len(), "tuple")?].clone()),
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(Value::Str(chars[resolve_index(index, chars.len(), "string")?].to_string()))
        }
        Value::Dict(entries) => {
            let key = DictKey::from_value(index)?;
            entries
                .borrow()
                .get(&key)
                .cloned()
                .ok_or_else(|| ScriptError::new(format!("key {} not in dict", index.repr())))
        }
        other => script_err!(
            "unhandled index operation {}[{}]",
            other.type_name(),
            index.type_name()
        ),
    }
}

fn set_index(object: &Value, index: Value, value: Value) -> Result<(), ScriptError> {
    match object {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = resolve_index(&index, items.len(), "list")?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(entries) => {
            entries
                .borrow_mut()
                .insert(DictKey::from_value(&index)?, value);
            Ok(())
        }
        other => script_err!("{} value does not support item assignment", other.type_name()),
    }
}

fn slice_indices(len: usize, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<usize> {
    let n = len as i64;
    let norm = |v: i64| if v < 0 { v + n } else { v };
    if step > 0 {
        let s = start.map(|v| norm(v).clamp(0, n)).unwrap_or(0);
        let e = stop.map(|v| norm(v).clamp(0, n)).unwrap_or(n);
        (s..e).step_by(step as usize).map(|i| i as usize).collect()
    } else {
        let s = start.map(|v| norm(v).clamp(-1, n - 1)).unwrap_or(n - 1);
        let e = stop.map(|v| norm(v).clamp(-1, n - 1)).unwrap_or(-1);
        let mut out = Vec::new();
        let mut i = s;
        while i > e {
            out.push(i as usize);
            i += step;
        }
        out
    }
}

fn slice(
    object: &Value,
    start: Option<i64>,
    stop: Option<i64>,
    step: Option<i64>,
) -> Result<Value, ScriptError> {
    let step = step.unwrap_or(1);
    if step == 0 {
        return script_err!("slice step cannot be zero");
    }
    match object {
        Value::List(items) => {
            let items = items.borrow();
            let picked = slice_indices(items.len(), start, stop, step);
            Ok(Value::list(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Tuple(items) => {
            let picked = slice_indices(items.len(), start, stop, step);
            Ok(Value::tuple(picked.into_iter().map(|i| items[i].clone()).collect()))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let picked = slice_indices(chars.len(), start, stop, step);
            Ok(Value::Str(picked.into_iter().map(|i| chars[i]).collect()))
        }
        other => script_err!("invalid slice operand {}", other.type_name()),
    }
}

// ============================================================================
// LITERAL EVALUATION
// ============================================================================

/// Evaluates a literal expression (numbers, strings, lists, tuples, dicts)
/// without any environment.
pub fn eval_literal(source: &str) -> Result<Value, ScriptError> {
    literal_expr(&parse_expr(source)?)
}

fn literal_expr(expr: &Expr) -> Result<Value, ScriptError> {
    let all = |items: &[Expr]| items.iter().map(literal_expr).collect::<Result<Vec<_>, _>>();
    match &expr.kind {
        ExprKind::Literal(lit) => Ok(literal_value(lit)),
        ExprKind::List(items) => Ok(Value::list(all(items)?)),
        ExprKind::Tuple(items) => Ok(Value::tuple(all(items)?)),
        ExprKind::Dict(entries) => {
            let mut map = IndexMap::new();
            for (k, v) in entries {
                map.insert(DictKey::from_value(&literal_expr(k)?)?, literal_expr(v)?);
            }
            Ok(Value::dict(map))
        }
        ExprKind::Unary {
            op: op @ (UnaryOp::Neg | UnaryOp::Plus),
            operand,
        } => unary_op(*op, literal_expr(operand)?),
        _ => Err(ScriptError::at("expected a literal value", expr.pos)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Result<(Env, Vec<String>), ScriptError> {
        let mut out = Vec::new();
        let env = Interpreter::new(&NoModules, &mut out).exec_file(source, Env::new())?;
        Ok((env, out))
    }

    fn global(env: &Env, name: &str) -> String {
        env.get(name).map(Value::repr).unwrap_or_default()
    }

    #[test]
    fn test_exec_returns_new_environment() {
        let base: Env = Env::new().update("x".to_string(), Value::Int(1));
        let mut out = Vec::new();
        let env = Interpreter::new(&NoModules, &mut out)
            .exec_file("y = x + 1", base.clone())
            .unwrap();
        assert_eq!(global(&env, "y"), "2");
        assert!(base.get("y").is_none());
    }

    #[test]
    fn test_functions_defaults_and_keywords() {
        let (env, _) = run("def f(a, b=10, *rest, **kw):\n  return [a, b, len(rest), len(kw)]\nr = f(1, c=3)\ns = f(1, 2, 3, 4)").unwrap();
        assert_eq!(global(&env, "r"), "[1, 10, 0, 1]");
        assert_eq!(global(&env, "s"), "[1, 2, 2, 0]");
    }

    #[test]
    fn test_arity_errors_use_function_wording() {
        let err = run("def transform(ds):\n  pass\ntransform(1, 2)").unwrap_err();
        assert!(err
            .message
            .contains("function transform accepts 1 positional argument (2 given)"));

        let err = run("def f(x, y):\n  pass\nf(1)").unwrap_err();
        assert_eq!(err.message, "function f missing 1 argument (y)");

        let err = run("def f(x, y=1):\n  pass\nf(1, 2, 3)").unwrap_err();
        assert!(err.message.contains("accepts at most 2 positional arguments (3 given)"));
    }

    #[test]
    fn test_control_flow() {
        let source = "\
total = 0
for i in range(10):
    if i == 2:
        continue
    elif i > 5:
        break
    total += i
";
        let (env, _) = run(source).unwrap();
        assert_eq!(global(&env, "total"), "13");
    }

    #[test]
    fn test_print_goes_to_sink() {
        let (_, out) = run("print('hello', 42)\nprint([1, 'a'])").unwrap();
        assert_eq!(out, vec!["hello 42".to_string(), "[1, \"a\"]".to_string()]);
    }

    #[test]
    fn test_comprehension_does_not_leak_variables() {
        let (env, _) = run("xs = [x * x for x in [1, 2, 3] if x != 2]").unwrap();
        assert_eq!(global(&env, "xs"), "[1, 9]");
        assert!(env.get("x").is_none());
    }

    #[test]
    fn test_nested_function_reads_enclosing_locals() {
        let source = "\
def outer(n):
    prefix = 'row'
    def label(i):
        return prefix + str(i + n)
    def twice(i):
        return label(i) + label(i)
    return [twice(i) for i in range(2)]
rows = outer(1)
";
        let (env, _) = run(source).unwrap();
        assert_eq!(global(&env, "rows"), "[\"row1row1\", \"row2row2\"]");
        assert!(env.get("prefix").is_none());
    }

    #[test]
    fn test_closure_sees_later_assignment() {
        let source = "\
def outer():
    def get():
        return value
    value = 3
    return get()
r = outer()
";
        let (env, _) = run(source).unwrap();
        assert_eq!(global(&env, "r"), "3");
    }

    #[test]
    fn test_lambda_and_dict_comprehension() {
        let source = "\
def lengths(keys):
    bonus = 10
    return {k: len(k) + bonus for k in keys if k}
d = lengths(['a', '', 'bb'])
inc = lambda x, by=1: x + by
n = inc(inc(1), by=5)
rows = sorted([('b', 2), ('a', 1)], key=lambda r: r[1])
";
        let (env, _) = run(source).unwrap();
        assert_eq!(global(&env, "d"), "{\"a\": 11, \"bb\": 12}");
        assert_eq!(global(&env, "n"), "7");
        assert_eq!(global(&env, "rows"), "[(\"a\", 1), (\"b\", 2)]");
        assert!(env.get("k").is_none());
    }

    #[test]
    fn test_integer_division_overflow_is_an_error() {
        for op in ["//", "%"] {
            let err = run(&format!("r = (-9223372036854775807 - 1) {} -1", op)).unwrap_err();
            assert!(err.message.contains("integer overflow"), "{}", err);
        }
        let (env, _) = run("a = -9223372036854775807 // -1").unwrap();
        assert_eq!(global(&env, "a"), "9223372036854775807");
    }

    #[test]
    fn test_excessive_repeat_is_an_error() {
        let err = run("s = 'x' * 99999999999").unwrap_err();
        assert!(err.message.contains("excessive repeat"));
        let err = run("l = [1, 2] * 99999999999").unwrap_err();
        assert!(err.message.contains("excessive repeat"));
        let (env, _) = run("s = 'ab' * 3\nl = [0] * -1").unwrap();
        assert_eq!(global(&env, "s"), "\"ababab\"");
        assert_eq!(global(&env, "l"), "[]");
    }

    #[test]
    fn test_self_containing_list_prints() {
        let (env, out) = run("x = [1]\nx.append(x)\nprint(x)\ns = str(x)").unwrap();
        assert_eq!(out, vec!["[1, [...]]".to_string()]);
        assert_eq!(global(&env, "s"), "\"[1, [...]]\"");
    }

    #[test]
    fn test_recursion_limit() {
        let mut out = Vec::new();
        let err = Interpreter::new(&NoModules, &mut out)
            .with_max_depth(20)
            .exec_file("def f(n):\n  return f(n + 1)\nf(0)", Env::new())
            .unwrap_err();
        assert!(err.message.contains("maximum recursion depth exceeded"));
    }

    #[test]
    fn test_errors_carry_positions() {
        let err = run("x = 1\ny = x + 'a'").unwrap_err();
        assert_eq!(err.to_string(), "2:7: unknown binary op: int + string");
    }

    #[test]
    fn test_unknown_module() {
        let err = run("load('nope.star', 'x')").unwrap_err();
        assert!(err.message.contains("module not defined: \"nope.star\""));
    }

    #[test]
    fn test_indexing_slicing_and_mod() {
        let (env, _) = run("a = [1, 2, 3, 4][1:3]\nb = 'hello'[-1]\nc = -7 // 2\nd = -7 % 3\ne = '%s=%d' % ('k', 5)\nf = [1,2,3][::-1]").unwrap();
        assert_eq!(global(&env, "a"), "[2, 3]");
        assert_eq!(global(&env, "b"), "\"o\"");
        assert_eq!(global(&env, "c"), "-4");
        assert_eq!(global(&env, "d"), "2");
        assert_eq!(global(&env, "e"), "\"k=5\"");
        assert_eq!(global(&env, "f"), "[3, 2, 1]");
    }

    #[test]
    fn test_eval_literal_rejects_names() {
        assert_eq!(
            eval_literal("[\"test\", 1, -2]").unwrap().repr(),
            "[\"test\", 1, -2]"
        );
        assert!(eval_literal("[foo]").is_err());
    }
}
