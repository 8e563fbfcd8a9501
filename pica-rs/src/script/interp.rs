//! Script interpreter.
//!
//! The [`Interpreter`] owns a stack of scopes (innermost last) and a table of
//! native functions, and walks parsed [`Stmt`] trees.  It never suspends: a
//! host drives it one block at a time and reads bindings back in between.

use std::collections::HashMap;
use std::sync::Arc;

use super::ast::{
    AssignTarget, Call, Expr, ExprKind, FieldAccess, FunctionDecl, Member, Stmt, StmtKind,
};
use super::builtins::CORE;
use super::error::{ErrorKind, Position, RuntimeError, ScriptError};
use super::value::{Record, Value};

/// A host-supplied function callable by name from scripts.
pub type NativeFn = Arc<dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, ErrorKind> + Send + Sync>;

// ── ControlFlow ───────────────────────────────────────────────────────────────

/// Non-error control-flow signals that unwind out of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlFlow {
    Return(Value),
    Break,
    Continue,
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter {
    /// Variable scopes, innermost last.  Index 0 is the base scope and is
    /// never popped.
    scopes: Vec<Record>,
    builtins: HashMap<String, NativeFn>,
    /// Lines written by `echo`/`echoln`.
    pub output: Vec<String>,
    /// Whether the last output line was left open by `echo`.
    line_open: bool,
    /// Loops enclosing the current statement within the current function.
    loop_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        let builtins = CORE
            .iter()
            .map(|(name, f)| (name.to_string(), Arc::new(*f) as NativeFn))
            .collect();
        Interpreter {
            scopes: vec![Record::new()],
            builtins,
            output: Vec::new(),
            line_open: false,
            loop_depth: 0,
        }
    }

    /// Add a native function.  Names are never overwritten.
    pub fn register_function(
        &mut self,
        name: impl Into<String>,
        f: NativeFn,
    ) -> Result<(), ErrorKind> {
        let name = name.into();
        if self.builtins.contains_key(&name) {
            return Err(ErrorKind::DuplicateFunction(name));
        }
        self.builtins.insert(name, f);
        Ok(())
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    // ── Scopes ────────────────────────────────────────────────────────────────

    pub fn push_scope(&mut self, scope: Record) {
        self.scopes.push(scope);
    }

    /// Pop the innermost scope.  The base scope stays; `None` if only it is
    /// left.
    pub fn pop_scope(&mut self) -> Option<Record> {
        if self.scopes.len() > 1 {
            self.scopes.pop()
        } else {
            None
        }
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    /// Run `f` with `scope` pushed; the scope is popped on every exit path.
    fn with_scope<T>(&mut self, scope: Record, f: impl FnOnce(&mut Self) -> T) -> T {
        self.scopes.push(scope);
        let out = f(self);
        self.scopes.pop();
        out
    }

    /// Innermost binding of `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }

    /// Resolve a name.  An unbound name that is a registered native function
    /// resolves to a reference to it.
    pub fn lookup(&self, name: &str) -> Result<Value, ErrorKind> {
        if let Some(v) = self.get(name) {
            return Ok(v.clone());
        }
        if self.builtins.contains_key(name) {
            return Ok(Value::Native(name.to_owned()));
        }
        Err(ErrorKind::UndefinedVariable(name.to_owned()))
    }

    /// Bind `name` in the innermost scope.
    pub fn assign(&mut self, name: impl Into<String>, value: Value) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value);
        }
    }

    // ── Output ────────────────────────────────────────────────────────────────

    pub fn write_output(&mut self, text: &str, end_line: bool) {
        let mut parts = text.split('\n');
        if let Some(first) = parts.next() {
            match self.output.last_mut() {
                Some(last) if self.line_open => last.push_str(first),
                _ => self.output.push(first.to_owned()),
            }
        }
        self.output.extend(parts.map(str::to_owned));
        self.line_open = !end_line;
    }

    pub fn take_output(&mut self) -> Vec<String> {
        self.line_open = false;
        std::mem::take(&mut self.output)
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    /// Parse and run a source string in the current scope.
    pub fn run_source(&mut self, src: &str) -> Result<Value, ScriptError> {
        let block = super::parse(src)?;
        match self.eval_block(&block)? {
            Some(ControlFlow::Return(v)) => Ok(v),
            _ => Ok(Value::Nil),
        }
    }

    /// Run statements in order, stopping at the first control-flow signal.
    pub fn eval_block(&mut self, stmts: &[Stmt]) -> Result<Option<ControlFlow>, RuntimeError> {
        for stmt in stmts {
            if let Some(cf) = self.eval_statement(stmt)? {
                return Ok(Some(cf));
            }
        }
        Ok(None)
    }

    pub fn eval_statement(&mut self, stmt: &Stmt) -> Result<Option<ControlFlow>, RuntimeError> {
        match &stmt.kind {
            StmtKind::NewLine | StmtKind::Comment(_) => Ok(None),

            StmtKind::Assign { target, value } => {
                let v = self.eval_expression(value)?;
                match target {
                    AssignTarget::Variable(name) => self.assign(name.as_str(), v),
                    AssignTarget::Field { root, path } => {
                        self.assign_field(root, path, v).map_err(|k| k.at(stmt.pos))?
                    }
                }
                Ok(None)
            }

            StmtKind::FunctionDecl(decl) => {
                self.assign(decl.name.as_str(), Value::Func(Arc::clone(decl)));
                Ok(None)
            }

            StmtKind::Expr(e) => {
                self.eval_expression(e)?;
                Ok(None)
            }

            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => match self.eval_expression(cond)? {
                Value::Bool(true) => self.eval_block(then_block),
                Value::Bool(false) => match else_block {
                    Some(block) => self.eval_block(block),
                    None => Ok(None),
                },
                other => Err(ErrorKind::type_mismatch(format!(
                    "if condition must be bool, got {}",
                    other.type_name()
                ))
                .at(cond.pos)),
            },

            StmtKind::For {
                index,
                item,
                iterable,
                body,
            } => {
                let pairs: Vec<(Value, Value)> =
                    match self.lookup(iterable).map_err(|k| k.at(stmt.pos))? {
                        Value::List(items) => items
                            .into_iter()
                            .enumerate()
                            .map(|(i, v)| (Value::Int(i as i64), v))
                            .collect(),
                        Value::Record(rec) => {
                            rec.into_iter().map(|(k, v)| (Value::Str(k), v)).collect()
                        }
                        other => {
                            return Err(ErrorKind::type_mismatch(format!(
                                "cannot iterate over {}",
                                other.type_name()
                            ))
                            .at(stmt.pos))
                        }
                    };
                self.loop_depth += 1;
                let out = self.run_loop(index, item, pairs, body);
                self.loop_depth -= 1;
                out
            }

            StmtKind::Return(value) => {
                let v = match value {
                    Some(e) => self.eval_expression(e)?,
                    None => Value::Nil,
                };
                Ok(Some(ControlFlow::Return(v)))
            }

            StmtKind::Break => self.loop_signal(ControlFlow::Break, "break", stmt.pos),
            StmtKind::Continue => self.loop_signal(ControlFlow::Continue, "continue", stmt.pos),
            StmtKind::Import(path) => Err(ErrorKind::NotImplemented(format!(
                "import '{path}' is only resolved at the top level of a script file"
            ))
            .at(stmt.pos)),
        }
    }

    fn loop_signal(
        &self,
        cf: ControlFlow,
        word: &'static str,
        pos: Position,
    ) -> Result<Option<ControlFlow>, RuntimeError> {
        if self.loop_depth == 0 {
            Err(ErrorKind::MisplacedControl(word).at(pos))
        } else {
            Ok(Some(cf))
        }
    }

    fn run_loop(
        &mut self,
        index: &str,
        item: &str,
        pairs: Vec<(Value, Value)>,
        body: &[Stmt],
    ) -> Result<Option<ControlFlow>, RuntimeError> {
        for (i, v) in pairs {
            self.assign(index, i);
            self.assign(item, v);
            match self.eval_block(body)? {
                Some(ControlFlow::Break) => break,
                Some(ControlFlow::Continue) | None => {}
                Some(cf @ ControlFlow::Return(_)) => return Ok(Some(cf)),
            }
        }
        Ok(None)
    }

    /// Read-modify-rebind of `root.path… = value`.
    fn assign_field(&mut self, root: &str, path: &[String], value: Value) -> Result<(), ErrorKind> {
        let mut rec = match self.get(root) {
            None | Some(Value::Nil) => Record::new(),
            Some(Value::Record(r)) => r.clone(),
            Some(other) => {
                return Err(ErrorKind::type_mismatch(format!(
                    "cannot set field of {} `{root}`",
                    other.type_name()
                )))
            }
        };
        set_path(&mut rec, path, value)?;
        self.assign(root, Value::Record(rec));
        Ok(())
    }

    // ── Expressions ───────────────────────────────────────────────────────────

    pub fn eval_expression(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Nil => Ok(Value::Nil),
            ExprKind::Variable(name) => self.lookup(name).map_err(|k| k.at(pos)),
            ExprKind::List(items) => items
                .iter()
                .map(|e| self.eval_expression(e))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            ExprKind::Block(block) => self.eval_record(block).map(Value::Record),
            ExprKind::Binary { op, left, right } => {
                let l = self.eval_expression(left)?;
                let r = self.eval_expression(right)?;
                l.binary(*op, &r).map_err(|k| k.at(pos))
            }
            ExprKind::Call(call) => self.eval_call(call, pos),
            ExprKind::Field(access) => self.eval_field(access, pos),
            ExprKind::Index { base, index } => {
                let base = self.eval_expression(base)?;
                let index = self.eval_expression(index)?;
                index_value(&base, &index).map_err(|k| k.at(pos))
            }
        }
    }

    fn eval_record(&mut self, block: &[Stmt]) -> Result<Record, RuntimeError> {
        let mut rec = Record::new();
        for stmt in block {
            match &stmt.kind {
                StmtKind::Assign {
                    target: AssignTarget::Variable(key),
                    value,
                } => {
                    let v = self.eval_expression(value)?;
                    rec.insert(key.clone(), v);
                }
                StmtKind::FunctionDecl(decl) => {
                    rec.insert(decl.name.clone(), Value::Func(Arc::clone(decl)));
                }
                StmtKind::NewLine | StmtKind::Comment(_) => {}
                _ => {
                    return Err(ErrorKind::type_mismatch(
                        "record literals may only contain assignments and functions",
                    )
                    .at(stmt.pos))
                }
            }
        }
        Ok(rec)
    }

    fn eval_field(&mut self, access: &FieldAccess, pos: Position) -> Result<Value, RuntimeError> {
        let rec = match self.eval_expression(&access.base)? {
            Value::Record(rec) => rec,
            other => {
                let what = match &access.member {
                    Member::Name(key) => format!("field `{key}`"),
                    Member::Call(call) => format!("method `{}`", call.name),
                };
                return Err(ErrorKind::type_mismatch(format!(
                    "cannot access {what} of {}",
                    other.type_name()
                ))
                .at(pos));
            }
        };
        match &access.member {
            Member::Name(key) => Ok(rec.get(key).cloned().unwrap_or_default()),
            Member::Call(call) => {
                // Arguments belong to the caller; only `this` is added for the body.
                let args = self.eval_args(call)?;
                let mut scope = Record::new();
                scope.insert("this".to_owned(), Value::Record(rec));
                self.with_scope(scope, |me| {
                    let callee = me.resolve_callee(&call.name, pos)?;
                    me.call_value(&callee, args, pos)
                })
            }
        }
    }

    // ── Calls ─────────────────────────────────────────────────────────────────

    /// Resolve and invoke `call`: built-ins first, then a function field of
    /// `this`, then a function bound in scope.
    fn eval_call(&mut self, call: &Call, pos: Position) -> Result<Value, RuntimeError> {
        let callee = self.resolve_callee(&call.name, pos)?;
        let args = self.eval_args(call)?;
        self.call_value(&callee, args, pos)
    }

    fn resolve_callee(&self, name: &str, pos: Position) -> Result<Value, RuntimeError> {
        if self.builtins.contains_key(name) {
            return Ok(Value::Native(name.to_owned()));
        }
        if let Some(f) = self.this_method(name) {
            return Ok(f);
        }
        match self.get(name) {
            Some(v) if v.is_callable() => Ok(v.clone()),
            Some(v) => Err(ErrorKind::type_mismatch(format!(
                "`{name}` is a {}, not a function",
                v.type_name()
            ))
            .at(pos)),
            None => Err(ErrorKind::UndefinedFunction(name.to_owned()).at(pos)),
        }
    }

    fn eval_args(&mut self, call: &Call) -> Result<Vec<Value>, RuntimeError> {
        call.args.iter().map(|e| self.eval_expression(e)).collect()
    }

    fn this_method(&self, name: &str) -> Option<Value> {
        match self.get("this") {
            Some(Value::Record(this)) => this.get(name).filter(|v| v.is_callable()).cloned(),
            _ => None,
        }
    }

    /// Invoke a function value with evaluated arguments.
    pub fn call_value(
        &mut self,
        callee: &Value,
        args: Vec<Value>,
        pos: Position,
    ) -> Result<Value, RuntimeError> {
        match callee {
            Value::Native(name) => {
                let f = self
                    .builtins
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ErrorKind::UndefinedFunction(name.clone()).at(pos))?;
                tracing::trace!(name = %name, argc = args.len(), "native call");
                f(self, &args).map_err(|k| k.at(pos))
            }
            Value::Func(decl) => self.call_user(decl, args, pos),
            other => Err(ErrorKind::type_mismatch(format!(
                "{} is not callable",
                other.type_name()
            ))
            .at(pos)),
        }
    }

    fn call_user(
        &mut self,
        decl: &FunctionDecl,
        args: Vec<Value>,
        pos: Position,
    ) -> Result<Value, RuntimeError> {
        if args.len() != decl.params.len() {
            return Err(
                ErrorKind::arity(&decl.name, decl.params.len().to_string(), args.len()).at(pos),
            );
        }
        tracing::trace!(name = %decl.name, depth = self.scopes.len(), "call");
        let scope: Record = decl.params.iter().cloned().zip(args).collect();
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        let out = self.with_scope(scope, |me| me.eval_block(&decl.body));
        self.loop_depth = saved_loops;
        match out? {
            Some(ControlFlow::Return(v)) => Ok(v),
            _ => Ok(Value::Nil),
        }
    }
}

fn set_path(rec: &mut Record, path: &[String], value: Value) -> Result<(), ErrorKind> {
    let Some((key, rest)) = path.split_first() else {
        return Ok(());
    };
    if rest.is_empty() {
        rec.insert(key.clone(), value);
        return Ok(());
    }
    let slot = rec
        .entry(key.clone())
        .or_insert_with(|| Value::Record(Record::new()));
    if matches!(slot, Value::Nil) {
        *slot = Value::Record(Record::new());
    }
    match slot {
        Value::Record(inner) => set_path(inner, rest, value),
        other => Err(ErrorKind::type_mismatch(format!(
            "cannot set field of {} `{key}`",
            other.type_name()
        ))),
    }
}

fn index_value(base: &Value, index: &Value) -> Result<Value, ErrorKind> {
    match (base, index) {
        (Value::List(items), Value::Int(i)) => usize::try_from(*i)
            .ok()
            .and_then(|u| items.get(u))
            .cloned()
            .ok_or(ErrorKind::IndexOutOfRange {
                index: *i,
                len: items.len(),
            }),
        (Value::Record(rec), Value::Str(key)) => Ok(rec.get(key).cloned().unwrap_or_default()),
        _ => Err(ErrorKind::type_mismatch(format!(
            "cannot index {} with {}",
            base.type_name(),
            index.type_name()
        ))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(src: &str) -> Interpreter {
        let mut interp = Interpreter::new();
        interp.run_source(src).expect("run failed");
        interp
    }

    fn var(interp: &Interpreter, name: &str) -> Value {
        interp.get(name).cloned().unwrap_or_else(|| panic!("{name} unbound"))
    }

    fn fails(src: &str) -> ErrorKind {
        let mut interp = Interpreter::new();
        match interp.run_source(src) {
            Err(ScriptError::Runtime(e)) => e.kind,
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn addition() {
        assert_eq!(var(&run("a = 1 + 2"), "a"), Value::Int(3));
    }

    #[test]
    fn precedence_is_conventional() {
        assert_eq!(var(&run("a = 2 * 3 + 4"), "a"), Value::Int(10));
        assert_eq!(var(&run("a = 2 * (3 + 4)"), "a"), Value::Int(14));
        assert_eq!(var(&run("a = 10 - 4 - 3"), "a"), Value::Int(3));
    }

    #[test]
    fn division() {
        assert_eq!(var(&run("a = 7 / 2"), "a"), Value::Int(3));
        assert_eq!(fails("a = 10 / 0"), ErrorKind::DivideByZero);
    }

    #[test]
    fn record_copy_on_assign() {
        let interp = run(
            "headers = {'Content-Type' = 'application/json'}\n\
             saved = headers\n\
             headers['Authorization'] = 'X'",
        );
        let Value::Record(h) = var(&interp, "headers") else {
            panic!("headers is not a record");
        };
        assert_eq!(h.len(), 2);
        assert_eq!(h.get("Authorization"), Some(&Value::from("X")));
        let Value::Record(saved) = var(&interp, "saved") else {
            panic!("saved is not a record");
        };
        assert_eq!(saved.len(), 1);
    }

    #[test]
    fn field_assign_creates_missing_records() {
        let interp = run("a.b.c = 1\nd = a.b.c");
        assert_eq!(var(&interp, "d"), Value::Int(1));
    }

    #[test]
    fn missing_field_reads_nil() {
        assert_eq!(var(&run("r = {a = 1}\nx = r.zzz"), "x"), Value::Nil);
    }

    #[test]
    fn field_of_non_record_is_type_mismatch() {
        assert!(matches!(fails("a = 1\nb = a.x"), ErrorKind::TypeMismatch(_)));
        assert!(matches!(fails("a = 1\na.x = 2"), ErrorKind::TypeMismatch(_)));
    }

    #[test]
    fn assert_failures() {
        assert_eq!(fails("assert(false)"), ErrorKind::AssertionFailed);
        assert!(matches!(fails("assert(1)"), ErrorKind::TypeMismatch(_)));
        run("assert(1 + 1 == 2)");
    }

    #[test]
    fn for_iterates_lists() {
        let interp = run(
            "items = [10, 20, 30]\n\
             total = 0\n\
             last = -1\n\
             for {\n  total = total + item\n  last = index\n}",
        );
        assert_eq!(var(&interp, "total"), Value::Int(60));
        assert_eq!(var(&interp, "last"), Value::Int(2));
    }

    #[test]
    fn for_iterates_records_in_key_order() {
        let interp = run(
            "r = {b = 2, a = 1}\n\
             keys = []\n\
             for k, v in r {\n  keys = keys + [k]\n}",
        );
        assert_eq!(
            var(&interp, "keys"),
            Value::List(vec![Value::from("a"), Value::from("b")])
        );
    }

    #[test]
    fn for_break_and_continue() {
        let interp = run(
            "xs = [1, 2, 3, 4, 5]\n\
             sum = 0\n\
             for i, x in xs {\n\
               if x == 2 {\n    continue\n  }\n\
               if x == 4 {\n    break\n  }\n\
               sum = sum + x\n\
             }",
        );
        assert_eq!(var(&interp, "sum"), Value::Int(4));
    }

    #[test]
    fn for_over_non_iterable() {
        assert!(matches!(
            fails("n = 3\nfor i, v in n { }"),
            ErrorKind::TypeMismatch(_)
        ));
        assert_eq!(
            fails("for { }"),
            ErrorKind::UndefinedVariable("items".into())
        );
    }

    #[test]
    fn break_outside_loop() {
        assert_eq!(fails("break"), ErrorKind::MisplacedControl("break"));
        assert_eq!(
            fails("xs = [1]\nf() {\n  continue\n}\nfor i, x in xs {\n  f()\n}"),
            ErrorKind::MisplacedControl("continue")
        );
    }

    #[test]
    fn user_function_call_and_return() {
        let interp = run("add(a, b) {\n  return a + b\n}\nc = add(2, 3)");
        assert_eq!(var(&interp, "c"), Value::Int(5));
    }

    #[test]
    fn function_without_return_yields_nil() {
        let interp = run("f() {\n  x = 1\n}\nr = f()");
        assert_eq!(var(&interp, "r"), Value::Nil);
        assert!(interp.get("x").is_none());
    }

    #[test]
    fn early_return_from_loop() {
        let interp = run(
            "find(xs) {\n  for i, x in xs {\n    if x > 1 {\n      return i\n    }\n  }\n  return -1\n}\n\
             r = find([0, 1, 5, 9])",
        );
        assert_eq!(var(&interp, "r"), Value::Int(2));
    }

    #[test]
    fn arity_mismatch() {
        assert!(matches!(
            fails("f(a) {\n}\nf()"),
            ErrorKind::ArityMismatch { found: 0, .. }
        ));
    }

    #[test]
    fn undefined_names() {
        assert_eq!(fails("x = y"), ErrorKind::UndefinedVariable("y".into()));
        assert_eq!(fails("nope()"), ErrorKind::UndefinedFunction("nope".into()));
        assert!(matches!(fails("x = 1\nx()"), ErrorKind::TypeMismatch(_)));
    }

    #[test]
    fn assign_writes_innermost_scope_only() {
        let interp = run("x = 1\nf() {\n  x = 2\n  return x\n}\ny = f()");
        assert_eq!(var(&interp, "y"), Value::Int(2));
        assert_eq!(var(&interp, "x"), Value::Int(1));
    }

    #[test]
    fn binding_not_visible_before_assignment() {
        let mut interp = Interpreter::new();
        let block = crate::script::parse("a = b\nb = 1").unwrap();
        let err = interp.eval_block(&block).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UndefinedVariable("b".into()));
        assert_eq!(err.pos, Position::new(1, 5));
    }

    #[test]
    fn scope_is_popped_when_call_fails() {
        let mut interp = Interpreter::new();
        interp
            .run_source("boom() {\n  return 1 / 0\n}")
            .unwrap();
        let depth = interp.scope_depth();
        assert!(interp.run_source("boom()").is_err());
        assert_eq!(interp.scope_depth(), depth);
    }

    #[test]
    fn method_call_sees_this_and_siblings() {
        let interp = run(
            "user = {\n  name = 'ann'\n  greet(p) {\n    return p + this.name\n  }\n  hi() {\n    return greet('hi ')\n  }\n}\n\
             a = user.greet('hello ')\n\
             b = user.hi()",
        );
        assert_eq!(var(&interp, "a"), Value::from("hello ann"));
        assert_eq!(var(&interp, "b"), Value::from("hi ann"));
    }

    #[test]
    fn method_arguments_resolve_in_caller_scope() {
        let interp = run(
            "name = 'bob'\n\
             user = {name = 'ann', greet(p) {\n  return p\n}}\n\
             r = user.greet(name)\n\
             s = user.greet(user.name)",
        );
        assert_eq!(var(&interp, "r"), Value::from("bob"));
        assert_eq!(var(&interp, "s"), Value::from("ann"));
    }

    #[test]
    fn method_body_sees_only_this() {
        assert_eq!(
            fails("user = {name = 'ann', who() {\n  return name\n}}\nr = user.who()"),
            ErrorKind::UndefinedVariable("name".into())
        );
    }

    #[test]
    fn unresolved_import_is_not_implemented() {
        let mut interp = Interpreter::new();
        let err = interp.run_source("x = 1\nimport 'lib.fun'").unwrap_err();
        assert_eq!(err.position(), Position::new(2, 1));
        assert!(matches!(err.kind(), Some(ErrorKind::NotImplemented(_))));
    }

    #[test]
    fn builtins_win_over_user_functions() {
        let interp = run("len(x) {\n  return 99\n}\nn = len([1, 2])");
        assert_eq!(var(&interp, "n"), Value::Int(2));
    }

    #[test]
    fn builtin_as_value() {
        let interp = run("f = typeof\nt = typeof(f)");
        assert_eq!(var(&interp, "t"), Value::from("builtin"));
    }

    #[test]
    fn if_requires_bool() {
        assert!(matches!(fails("if 1 {\n}"), ErrorKind::TypeMismatch(_)));
        let interp = run("if 2 > 1 {\n  r = 'yes'\n} else {\n  r = 'no'\n}");
        assert_eq!(var(&interp, "r"), Value::from("yes"));
    }

    #[test]
    fn index_access() {
        let interp = run("xs = [1, 2, 3]\na = xs[1] + xs[2]\nr = {k = 'v'}\nb = r['k']");
        assert_eq!(var(&interp, "a"), Value::Int(5));
        assert_eq!(var(&interp, "b"), Value::from("v"));
        assert_eq!(
            fails("xs = [1]\na = xs[3]"),
            ErrorKind::IndexOutOfRange { index: 3, len: 1 }
        );
    }

    #[test]
    fn echo_output_lines() {
        let mut interp = run("echo('a', 1)\necho('b')\necholn('!')\necholn([1, 'x'])");
        assert_eq!(interp.take_output(), vec!["a1b!", "[1, 'x']"]);
        assert!(interp.output.is_empty());
    }

    #[test]
    fn register_function_rejects_duplicates() {
        let mut interp = Interpreter::new();
        let f: NativeFn =
            Arc::new(|_: &mut Interpreter, _: &[Value]| -> Result<Value, ErrorKind> {
                Ok(Value::Int(42))
            });
        interp.register_function("answer", f.clone()).unwrap();
        assert_eq!(
            interp.register_function("answer", f.clone()),
            Err(ErrorKind::DuplicateFunction("answer".into()))
        );
        assert_eq!(
            interp.register_function("echo", f),
            Err(ErrorKind::DuplicateFunction("echo".into()))
        );
        interp.run_source("x = answer()").unwrap();
        assert_eq!(var(&interp, "x"), Value::Int(42));
    }

    #[test]
    fn host_scope_push_and_pop() {
        let mut interp = Interpreter::new();
        interp.assign("base", Value::Int(1));
        let mut scope = Record::new();
        scope.insert("url".into(), Value::from("/users"));
        interp.push_scope(scope);
        interp.run_source("copy = url\nb = base").unwrap();
        assert_eq!(var(&interp, "b"), Value::Int(1));
        let popped = interp.pop_scope().unwrap();
        assert_eq!(popped.get("copy"), Some(&Value::from("/users")));
        assert!(interp.get("copy").is_none());
        assert!(interp.pop_scope().is_none());
    }

    #[test]
    fn run_source_returns_top_level_return() {
        let mut interp = Interpreter::new();
        assert_eq!(interp.run_source("return 5"), Ok(Value::Int(5)));
    }
}
