//! Static analysis: type checking plus local/upvalue record assignment.
//!
//! The analyzer walks the parse tree once, maintaining a stack of scopes
//! (one per enclosing function literal, with the program root at the
//! bottom). Reading or assigning a name that is not local to the current
//! function registers an upvalue, transitively, so that by the time a
//! function literal has been checked its scope knows exactly which
//! parent slots its closures must capture.

use crate::ast::{BinOp, Clause, Expr, FuncLit, Program, Span, Stmt, TypeAnnotation};
use crate::error::TypeError;
use crate::scope::{Scope, UpvalueRecord};
use crate::typed::{TypedClause, TypedExpr, TypedExprKind, TypedFunc, TypedProgram, TypedStmt};
use crate::types::Type;

/// Check a parsed program, producing the typed tree the compiler
/// consumes. All type errors found anywhere in the tree are reported
/// together.
pub fn check(program: &Program) -> Result<TypedProgram, Vec<TypeError>> {
    let mut checker = Checker {
        scopes: vec![Scope::new(None)],
        errors: Vec::new(),
    };

    let stmts = program
        .stmts
        .iter()
        .map(|s| checker.check_stmt(s))
        .collect();

    let root = checker.scopes.pop().expect("root scope");
    let (locals, upvalues) = root.into_records();

    if checker.errors.is_empty() {
        Ok(TypedProgram {
            stmts,
            locals,
            upvalues,
        })
    } else {
        Err(checker.errors)
    }
}

struct Checker {
    /// Scope stack; index 0 is the program root and the last entry is the
    /// function currently being checked.
    scopes: Vec<Scope>,
    errors: Vec<TypeError>,
}

impl Checker {
    fn error(&mut self, span: Span, message: impl Into<String>) {
        self.errors
            .push(TypeError::new(message, span.line, span.col));
    }

    fn error_with_note(&mut self, span: Span, message: impl Into<String>, note: impl Into<String>) {
        self.errors
            .push(TypeError::new(message, span.line, span.col).with_note(note));
    }

    fn current(&mut self) -> &mut Scope {
        self.scopes.last_mut().expect("scope stack underflow")
    }

    /// Find a name anywhere in the scope chain; returns the scope index it
    /// was declared in and its type.
    fn lookup_variable(&self, name: &str) -> Option<(usize, Type)> {
        for idx in (0..self.scopes.len()).rev() {
            if let Some(ty) = self.scopes[idx].variables.get(name) {
                return Some((idx, ty.clone()));
            }
        }
        None
    }

    /// Register `name` as an upvalue of `scopes[idx]`, creating records in
    /// every intermediate scope, and return its position in that scope's
    /// upvalue list. Registration is idempotent per scope.
    fn register_upvalue(&mut self, idx: usize, name: &str) -> usize {
        if let Some(pos) = self.scopes[idx].upvalue_order.iter().position(|n| n == name) {
            return pos;
        }
        assert!(idx > 0, "cannot capture a variable in the root scope");

        let parent = idx - 1;
        let record = if self.scopes[parent].variables.contains_key(name) {
            let lookup_index = self.scopes[parent]
                .variable_index(name)
                .expect("declared variable is registered");
            UpvalueRecord {
                name: name.to_string(),
                local_to_parent: true,
                lookup_index,
            }
        } else {
            let lookup_index = self.register_upvalue(parent, name);
            UpvalueRecord {
                name: name.to_string(),
                local_to_parent: false,
                lookup_index,
            }
        };

        let scope = &mut self.scopes[idx];
        let pos = scope.upvalue_order.len();
        scope.upvalue_order.push(name.to_string());
        scope.upvalues.insert(name.to_string(), record);
        pos
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn check_stmt(&mut self, stmt: &Stmt) -> TypedStmt {
        match stmt {
            Stmt::Let { name, value, span } => self.check_let(name, value, *span),
            Stmt::Assign { name, value, span } => self.check_assign(name, value, *span),
            Stmt::Print { value, .. } => TypedStmt::Print {
                value: self.check_expr(value),
            },
            Stmt::Return { value, span } => self.check_return(value.as_ref(), *span),
            Stmt::If {
                clauses,
                else_body,
                ..
            } => TypedStmt::If {
                clauses: clauses.iter().map(|c| self.check_clause(c)).collect(),
                else_body: else_body
                    .as_ref()
                    .map(|body| body.iter().map(|s| self.check_stmt(s)).collect()),
            },
            Stmt::While { cond, body, .. } => {
                let cond = self.check_condition(cond);
                TypedStmt::While {
                    cond,
                    body: body.iter().map(|s| self.check_stmt(s)).collect(),
                }
            }
            Stmt::Expr(expr) => TypedStmt::Expr {
                value: self.check_expr(expr),
            },
        }
    }

    fn check_let(&mut self, name: &str, value: &Expr, span: Span) -> TypedStmt {
        if self.current().variables.contains_key(name) {
            self.error_with_note(
                span,
                format!("variable `{}` has already been declared", name),
                format!("`{}` cannot be re-declared in the same scope", name),
            );
        }

        // For function literals the signature is derived from annotations
        // alone and registered before the body is checked, which is what
        // makes direct recursion type-check.
        let typed = if let Expr::Func(func) = value {
            let sig = self.func_signature(func);
            if !self.current().variables.contains_key(name) {
                self.current().register_variable(name, sig.clone());
            }
            self.check_func_body(func, sig)
        } else {
            let typed = self.check_expr(value);
            if !self.current().variables.contains_key(name) {
                self.current().register_variable(name, typed.ty.clone());
            }
            typed
        };

        TypedStmt::Let {
            name: name.to_string(),
            value: typed,
        }
    }

    fn check_assign(&mut self, name: &str, value: &Expr, span: Span) -> TypedStmt {
        let typed = self.check_expr(value);

        match self.lookup_variable(name) {
            Some((idx, declared)) => {
                if idx < self.scopes.len() - 1 {
                    self.register_upvalue(self.scopes.len() - 1, name);
                }
                if declared != typed.ty {
                    self.error_with_note(
                        span,
                        format!(
                            "variable `{}` (type `{}`) cannot be assigned a value of type `{}`",
                            name, declared, typed.ty
                        ),
                        format!("`{}` was declared with type `{}`", name, declared),
                    );
                }
            }
            None => {
                self.error(
                    span,
                    format!("variable `{}` cannot be assigned before it has been declared", name),
                );
            }
        }

        TypedStmt::Assign {
            name: name.to_string(),
            value: typed,
        }
    }

    fn check_return(&mut self, value: Option<&Expr>, span: Span) -> TypedStmt {
        let expected = self.scopes.last().expect("scope stack").return_type.clone();

        let typed = value.map(|v| self.check_expr(v));

        match expected {
            None => self.error(span, "`return` outside of a function"),
            Some(expected) => {
                if let Some(typed) = &typed {
                    if typed.ty != expected {
                        self.error(
                            span,
                            format!(
                                "cannot return `{}` from a function declared to return `{}`",
                                typed.ty, expected
                            ),
                        );
                    }
                }
            }
        }

        TypedStmt::Return { value: typed }
    }

    fn check_clause(&mut self, clause: &Clause) -> TypedClause {
        let cond = self.check_condition(&clause.cond);
        TypedClause {
            cond,
            body: clause.body.iter().map(|s| self.check_stmt(s)).collect(),
        }
    }

    fn check_condition(&mut self, cond: &Expr) -> TypedExpr {
        let span = cond.span();
        let typed = self.check_expr(cond);
        if typed.ty != Type::Bool {
            self.error(
                span,
                format!("condition must have type `Bool`, instead found `{}`", typed.ty),
            );
        }
        typed
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn check_expr(&mut self, expr: &Expr) -> TypedExpr {
        match expr {
            Expr::Int { value, .. } => TypedExpr {
                ty: Type::Int,
                kind: TypedExprKind::Int(*value),
            },
            Expr::Dec { value, .. } => TypedExpr {
                ty: Type::Dec,
                kind: TypedExprKind::Dec(*value),
            },
            Expr::Bool { value, .. } => TypedExpr {
                ty: Type::Bool,
                kind: TypedExprKind::Bool(*value),
            },
            Expr::Str { value, .. } => TypedExpr {
                ty: Type::Str,
                kind: TypedExprKind::Str(value.clone()),
            },
            Expr::Ident { name, span } => self.check_ident(name, *span),
            Expr::Unary { op, operand, span } => {
                let typed = self.check_expr(operand);
                if !typed.ty.is_numeric() {
                    self.error(
                        *span,
                        format!("unary `-` requires `Int` or `Dec`, found `{}`", typed.ty),
                    );
                }
                TypedExpr {
                    ty: typed.ty.clone(),
                    kind: TypedExprKind::Unary {
                        op: *op,
                        operand: Box::new(typed),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs, span } => self.check_binary(*op, lhs, rhs, *span),
            Expr::Call { callee, args, span } => self.check_call(callee, args, *span),
            Expr::Func(func) => {
                let sig = self.func_signature(func);
                self.check_func_body(func, sig)
            }
        }
    }

    fn check_ident(&mut self, name: &str, span: Span) -> TypedExpr {
        let ty = match self.lookup_variable(name) {
            Some((idx, ty)) => {
                if idx < self.scopes.len() - 1 {
                    self.register_upvalue(self.scopes.len() - 1, name);
                }
                ty
            }
            None => {
                self.error(span, format!("variable `{}` is undeclared", name));
                Type::Int
            }
        };
        TypedExpr {
            ty,
            kind: TypedExprKind::Ident(name.to_string()),
        }
    }

    fn check_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, span: Span) -> TypedExpr {
        let lhs = self.check_expr(lhs);
        let rhs = self.check_expr(rhs);

        if lhs.ty != rhs.ty {
            self.error(
                span,
                format!(
                    "incompatible operand types `{}` and `{}` for `{}`",
                    lhs.ty,
                    rhs.ty,
                    op.symbol()
                ),
            );
        } else if !lhs.ty.is_numeric() {
            self.error(
                span,
                format!(
                    "operator `{}` requires `Int` or `Dec` operands, found `{}`",
                    op.symbol(),
                    lhs.ty
                ),
            );
        }

        let ty = if op.is_comparison() {
            Type::Bool
        } else if op == BinOp::Div {
            // Integer division promotes: the VM's IntDiv writes a decimal.
            Type::Dec
        } else {
            lhs.ty.clone()
        };

        TypedExpr {
            ty,
            kind: TypedExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> TypedExpr {
        let callee_span = callee.span();
        let callee = self.check_expr(callee);
        let typed_args: Vec<TypedExpr> = args.iter().map(|a| self.check_expr(a)).collect();

        let ty = match &callee.ty {
            Type::Func { params, ret } => {
                if params.len() != typed_args.len() {
                    self.error(
                        span,
                        format!(
                            "{} argument(s) passed, but the function expects {}",
                            typed_args.len(),
                            params.len()
                        ),
                    );
                } else {
                    for (n, (param, arg)) in params.iter().zip(typed_args.iter()).enumerate() {
                        if *param != arg.ty {
                            self.error(
                                args[n].span(),
                                format!(
                                    "argument {} has type `{}`, but the function expects `{}`",
                                    n + 1,
                                    arg.ty,
                                    param
                                ),
                            );
                        }
                    }
                }
                (**ret).clone()
            }
            other => {
                self.error(
                    callee_span,
                    format!("cannot call a value of type `{}`", other),
                );
                Type::Int
            }
        };

        TypedExpr {
            ty,
            kind: TypedExprKind::Call {
                callee: Box::new(callee),
                args: typed_args,
            },
        }
    }

    // ========================================================================
    // Function literals
    // ========================================================================

    /// The type of a function literal, derived from its annotations alone.
    fn func_signature(&mut self, func: &FuncLit) -> Type {
        let params = func
            .params
            .iter()
            .map(|p| self.resolve_annotation(&p.annotation))
            .collect();
        let ret = self.resolve_annotation(&func.ret);
        Type::Func {
            params,
            ret: Box::new(ret),
        }
    }

    fn check_func_body(&mut self, func: &FuncLit, sig: Type) -> TypedExpr {
        let Type::Func { params, ret } = &sig else {
            unreachable!("func_signature returns a function type");
        };

        let mut scope = Scope::new(Some((**ret).clone()));
        for (param, ty) in func.params.iter().zip(params.iter()) {
            if scope.variables.contains_key(&param.name) {
                self.error(
                    param.span,
                    format!("duplicate parameter name `{}`", param.name),
                );
                continue;
            }
            scope.parameters.push(param.name.clone());
            scope.register_variable(&param.name, ty.clone());
        }

        self.scopes.push(scope);
        let body = func.body.iter().map(|s| self.check_stmt(s)).collect();
        let scope = self.scopes.pop().expect("function scope");
        let (locals, upvalues) = scope.into_records();

        TypedExpr {
            ty: sig,
            kind: TypedExprKind::Func(TypedFunc {
                locals,
                upvalues,
                body,
            }),
        }
    }

    fn resolve_annotation(&mut self, annotation: &TypeAnnotation) -> Type {
        match annotation {
            TypeAnnotation::Named { name, span } => match name.as_str() {
                "Int" => Type::Int,
                "Dec" => Type::Dec,
                "Bool" => Type::Bool,
                "Str" => Type::Str,
                other => {
                    self.error(*span, format!("unknown type `{}`", other));
                    Type::Int
                }
            },
            TypeAnnotation::Func { params, ret, .. } => {
                let params = params.iter().map(|p| self.resolve_annotation(p)).collect();
                let ret = self.resolve_annotation(ret);
                Type::Func {
                    params,
                    ret: Box::new(ret),
                }
            }
        }
    }
}
