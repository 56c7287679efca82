//! S-expression rendering of the typed tree, used by `--debug-ast`.

use crate::typed::{TypedExpr, TypedExprKind, TypedProgram, TypedStmt};

pub fn stringify_program(program: &TypedProgram) -> String {
    format!(
        "(program (locals={} upvalues={}) (\n{}\n))",
        program.locals.len(),
        program.upvalues.len(),
        indent(&stringify_block(&program.stmts))
    )
}

fn stringify_block(stmts: &[TypedStmt]) -> String {
    stmts
        .iter()
        .map(stringify_stmt)
        .collect::<Vec<_>>()
        .join("\n")
}

fn stringify_stmt(stmt: &TypedStmt) -> String {
    match stmt {
        TypedStmt::Let { name, value } => {
            format!("(let {} {})", name, stringify_expr(value))
        }
        TypedStmt::Assign { name, value } => {
            format!("(assign {} {})", name, stringify_expr(value))
        }
        TypedStmt::Print { value } => format!("(print {})", stringify_expr(value)),
        TypedStmt::Return { value } => match value {
            Some(v) => format!("(return {})", stringify_expr(v)),
            None => "(return)".to_string(),
        },
        TypedStmt::If { clauses, else_body } => {
            let mut parts = Vec::new();
            for clause in clauses {
                parts.push(format!(
                    "(clause {} (\n{}\n))",
                    stringify_expr(&clause.cond),
                    indent(&stringify_block(&clause.body))
                ));
            }
            if let Some(body) = else_body {
                parts.push(format!("(else (\n{}\n))", indent(&stringify_block(body))));
            }
            format!("(if {})", parts.join(" "))
        }
        TypedStmt::While { cond, body } => format!(
            "(while {} (\n{}\n))",
            stringify_expr(cond),
            indent(&stringify_block(body))
        ),
        TypedStmt::Expr { value } => stringify_expr(value),
    }
}

fn stringify_expr(expr: &TypedExpr) -> String {
    match &expr.kind {
        TypedExprKind::Int(v) => format!("{}", v),
        TypedExprKind::Dec(v) => format!("{:?}", v),
        TypedExprKind::Bool(v) => format!("{}", v),
        TypedExprKind::Str(v) => format!("{:?}", v),
        TypedExprKind::Ident(name) => name.clone(),
        TypedExprKind::Unary { operand, .. } => format!("(neg {})", stringify_expr(operand)),
        TypedExprKind::Binary { op, lhs, rhs } => format!(
            "({} {} {})",
            op.symbol(),
            stringify_expr(lhs),
            stringify_expr(rhs)
        ),
        TypedExprKind::Call { callee, args } => {
            let args = args
                .iter()
                .map(stringify_expr)
                .collect::<Vec<_>>()
                .join(" ");
            format!("(dispatch {} ({}))", stringify_expr(callee), args)
        }
        TypedExprKind::Func(func) => {
            let params = func
                .locals
                .iter()
                .filter(|l| l.is_parameter)
                .map(|l| format!("[{}]", l.name))
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "(fn (locals={} upvalues={}) ({}) (\n{}\n))",
                func.locals.len(),
                func.upvalues.len(),
                params,
                indent(&stringify_block(&func.body))
            )
        }
    }
}

fn indent(block: &str) -> String {
    block
        .lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}
