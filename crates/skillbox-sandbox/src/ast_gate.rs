//! Static policy gate for candidate source text.
//!
//! Parses the candidate with `oxc_parser` and walks the syntax tree in
//! pre-order (depth-first, left-to-right), refusing on the first
//! denylisted construct. Because the walk is pre-order, when a candidate
//! contains several violations the one closest to the start of the source
//! is the one reported.
//!
//! Two denylist categories:
//!
//! - **syntax** — `with` statements (scoped-context blocks), static
//!   `import` declarations, `import.meta`;
//! - **calls** — `open`, `eval`, `require`, `Function`, `AsyncFunction`,
//!   `GeneratorFunction` in call or `new` position, and dynamic
//!   `import(...)`.
//!
//! The gate is purely syntactic and inspects only the candidate's own
//! source text. A denylisted construct inside a helper the candidate
//! calls by reference is not seen here; that is a documented limitation
//! of the check, not something the gate attempts to close.

use oxc_allocator::Allocator;
use oxc_ast::ast::*;
use oxc_parser::Parser;
use oxc_span::SourceType;
use skillbox_error::Violation;

/// Maximum bracket nesting depth before the source is refused.
/// Bounds parser recursion on adversarially nested input.
const MAX_NESTING_DEPTH: usize = 256;

/// Names refused in call or `new` position.
const FORBIDDEN_CALLS: &[&str] = &[
    "open",
    "eval",
    "require",
    "Function",
    "AsyncFunction",
    "GeneratorFunction",
];

/// Check bracket nesting depth before parsing.
fn check_nesting_depth(source: &str) -> Result<(), Violation> {
    let mut depth: usize = 0;
    let mut max_depth: usize = 0;
    for ch in source.chars() {
        match ch {
            '{' | '[' | '(' => {
                depth += 1;
                if depth > max_depth {
                    max_depth = depth;
                }
            }
            '}' | ']' | ')' => {
                depth = depth.saturating_sub(1);
            }
            _ => {}
        }
    }
    if max_depth > MAX_NESTING_DEPTH {
        return Err(Violation::NestingTooDeep {
            max: MAX_NESTING_DEPTH,
            actual: max_depth,
        });
    }
    Ok(())
}

/// Validate candidate source against the denylist.
///
/// Returns `Ok(())` when no denylisted construct appears, or the first
/// [`Violation`] in pre-order traversal order.
pub fn validate(source: &str) -> Result<(), Violation> {
    check_nesting_depth(source)?;

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();

    if ret.panicked {
        return Err(Violation::Parse {
            message: "parser panicked on malformed input".into(),
        });
    }

    if !ret.errors.is_empty() {
        return Err(Violation::Parse {
            message: ret
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown parse error".into()),
        });
    }

    for stmt in &ret.program.body {
        walk_statement(stmt)?;
    }

    Ok(())
}

fn forbidden_syntax(construct: &str) -> Violation {
    Violation::ForbiddenSyntax {
        construct: construct.to_string(),
    }
}

fn forbidden_call(name: &str) -> Violation {
    Violation::ForbiddenCall {
        name: name.to_string(),
    }
}

/// Check a callee expression for a denylisted name.
fn check_callee(callee: &Expression<'_>) -> Result<(), Violation> {
    if let Expression::Identifier(ident) = callee {
        let name = ident.name.as_str();
        if FORBIDDEN_CALLS.contains(&name) {
            return Err(forbidden_call(name));
        }
    }
    Ok(())
}

fn walk_statement(stmt: &Statement<'_>) -> Result<(), Violation> {
    match stmt {
        Statement::WithStatement(_) => Err(forbidden_syntax("with statement")),
        Statement::ImportDeclaration(_) => Err(forbidden_syntax("import declaration")),
        Statement::ExpressionStatement(es) => walk_expression(&es.expression),
        Statement::BlockStatement(block) => {
            for s in &block.body {
                walk_statement(s)?;
            }
            Ok(())
        }
        Statement::IfStatement(ifs) => {
            walk_expression(&ifs.test)?;
            walk_statement(&ifs.consequent)?;
            if let Some(alt) = &ifs.alternate {
                walk_statement(alt)?;
            }
            Ok(())
        }
        Statement::ReturnStatement(ret) => {
            if let Some(arg) = &ret.argument {
                walk_expression(arg)?;
            }
            Ok(())
        }
        Statement::VariableDeclaration(decl) => {
            for declarator in &decl.declarations {
                if let Some(init) = &declarator.init {
                    walk_expression(init)?;
                }
            }
            Ok(())
        }
        Statement::ForStatement(fors) => {
            if let Some(init) = &fors.init {
                match init {
                    ForStatementInit::VariableDeclaration(decl) => {
                        for declarator in &decl.declarations {
                            if let Some(init) = &declarator.init {
                                walk_expression(init)?;
                            }
                        }
                    }
                    _ => {
                        if let Some(expr) = init.as_expression() {
                            walk_expression(expr)?;
                        }
                    }
                }
            }
            if let Some(test) = &fors.test {
                walk_expression(test)?;
            }
            if let Some(update) = &fors.update {
                walk_expression(update)?;
            }
            walk_statement(&fors.body)
        }
        Statement::ForInStatement(fis) => {
            walk_expression(&fis.right)?;
            walk_statement(&fis.body)
        }
        Statement::ForOfStatement(fos) => {
            walk_expression(&fos.right)?;
            walk_statement(&fos.body)
        }
        Statement::WhileStatement(ws) => {
            walk_expression(&ws.test)?;
            walk_statement(&ws.body)
        }
        Statement::DoWhileStatement(dws) => {
            walk_statement(&dws.body)?;
            walk_expression(&dws.test)
        }
        Statement::SwitchStatement(ss) => {
            walk_expression(&ss.discriminant)?;
            for case in &ss.cases {
                if let Some(test) = &case.test {
                    walk_expression(test)?;
                }
                for s in &case.consequent {
                    walk_statement(s)?;
                }
            }
            Ok(())
        }
        Statement::TryStatement(ts) => {
            for s in &ts.block.body {
                walk_statement(s)?;
            }
            if let Some(handler) = &ts.handler {
                for s in &handler.body.body {
                    walk_statement(s)?;
                }
            }
            if let Some(finalizer) = &ts.finalizer {
                for s in &finalizer.body {
                    walk_statement(s)?;
                }
            }
            Ok(())
        }
        Statement::ThrowStatement(ts) => walk_expression(&ts.argument),
        Statement::LabeledStatement(ls) => walk_statement(&ls.body),
        Statement::FunctionDeclaration(fd) => {
            if let Some(body) = &fd.body {
                for s in &body.statements {
                    walk_statement(s)?;
                }
            }
            Ok(())
        }
        Statement::ClassDeclaration(cd) => walk_class_body(&cd.body),
        // Break, Continue, Empty, Debugger carry no sub-expressions
        _ => Ok(()),
    }
}

fn walk_class_body(body: &ClassBody<'_>) -> Result<(), Violation> {
    for element in &body.body {
        match element {
            ClassElement::MethodDefinition(md) => {
                if let Some(body) = &md.value.body {
                    for s in &body.statements {
                        walk_statement(s)?;
                    }
                }
            }
            ClassElement::PropertyDefinition(pd) => {
                if let Some(val) = &pd.value {
                    walk_expression(val)?;
                }
            }
            ClassElement::StaticBlock(sb) => {
                for s in &sb.body {
                    walk_statement(s)?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn walk_arguments<'a>(args: &oxc_allocator::Vec<'a, Argument<'a>>) -> Result<(), Violation> {
    for arg in args {
        match arg {
            Argument::SpreadElement(spread) => walk_expression(&spread.argument)?,
            _ => {
                if let Some(expr) = arg.as_expression() {
                    walk_expression(expr)?;
                }
            }
        }
    }
    Ok(())
}

fn walk_expression(expr: &Expression<'_>) -> Result<(), Violation> {
    match expr {
        Expression::CallExpression(call) => {
            check_callee(&call.callee)?;
            walk_expression(&call.callee)?;
            walk_arguments(&call.arguments)
        }
        Expression::NewExpression(new_expr) => {
            check_callee(&new_expr.callee)?;
            walk_expression(&new_expr.callee)?;
            walk_arguments(&new_expr.arguments)
        }
        Expression::ImportExpression(_) => Err(forbidden_call("import")),
        Expression::MetaProperty(meta) => {
            if meta.meta.name.as_str() == "import" && meta.property.name.as_str() == "meta" {
                return Err(forbidden_syntax("import.meta"));
            }
            Ok(())
        }
        Expression::StaticMemberExpression(member) => walk_expression(&member.object),
        Expression::ComputedMemberExpression(member) => {
            walk_expression(&member.object)?;
            walk_expression(&member.expression)
        }
        Expression::ArrowFunctionExpression(arrow) => {
            for s in &arrow.body.statements {
                walk_statement(s)?;
            }
            Ok(())
        }
        Expression::FunctionExpression(func) => {
            if let Some(body) = &func.body {
                for s in &body.statements {
                    walk_statement(s)?;
                }
            }
            Ok(())
        }
        Expression::ClassExpression(class) => walk_class_body(&class.body),
        Expression::AssignmentExpression(assign) => {
            if let Some(member) = assign.left.as_member_expression() {
                match member {
                    MemberExpression::StaticMemberExpression(m) => walk_expression(&m.object)?,
                    MemberExpression::ComputedMemberExpression(m) => {
                        walk_expression(&m.object)?;
                        walk_expression(&m.expression)?;
                    }
                    MemberExpression::PrivateFieldExpression(pf) => {
                        walk_expression(&pf.object)?;
                    }
                }
            }
            walk_expression(&assign.right)
        }
        Expression::BinaryExpression(bin) => {
            walk_expression(&bin.left)?;
            walk_expression(&bin.right)
        }
        Expression::LogicalExpression(log) => {
            walk_expression(&log.left)?;
            walk_expression(&log.right)
        }
        Expression::ConditionalExpression(cond) => {
            walk_expression(&cond.test)?;
            walk_expression(&cond.consequent)?;
            walk_expression(&cond.alternate)
        }
        Expression::UnaryExpression(unary) => walk_expression(&unary.argument),
        Expression::SequenceExpression(seq) => {
            for e in &seq.expressions {
                walk_expression(e)?;
            }
            Ok(())
        }
        Expression::ArrayExpression(arr) => {
            for elem in &arr.elements {
                match elem {
                    ArrayExpressionElement::SpreadElement(spread) => {
                        walk_expression(&spread.argument)?;
                    }
                    ArrayExpressionElement::Elision(_) => {}
                    _ => {
                        if let Some(expr) = elem.as_expression() {
                            walk_expression(expr)?;
                        }
                    }
                }
            }
            Ok(())
        }
        Expression::ObjectExpression(obj) => {
            for prop in &obj.properties {
                match prop {
                    ObjectPropertyKind::ObjectProperty(p) => walk_expression(&p.value)?,
                    ObjectPropertyKind::SpreadProperty(spread) => {
                        walk_expression(&spread.argument)?;
                    }
                }
            }
            Ok(())
        }
        Expression::AwaitExpression(aw) => walk_expression(&aw.argument),
        Expression::YieldExpression(y) => {
            if let Some(arg) = &y.argument {
                walk_expression(arg)?;
            }
            Ok(())
        }
        Expression::TemplateLiteral(tl) => {
            for e in &tl.expressions {
                walk_expression(e)?;
            }
            Ok(())
        }
        Expression::TaggedTemplateExpression(tagged) => {
            walk_expression(&tagged.tag)?;
            for e in &tagged.quasi.expressions {
                walk_expression(e)?;
            }
            Ok(())
        }
        Expression::ParenthesizedExpression(paren) => walk_expression(&paren.expression),
        Expression::ChainExpression(chain) => match &chain.expression {
            ChainElement::CallExpression(call) => {
                check_callee(&call.callee)?;
                walk_expression(&call.callee)?;
                walk_arguments(&call.arguments)
            }
            ChainElement::StaticMemberExpression(m) => walk_expression(&m.object),
            ChainElement::ComputedMemberExpression(m) => {
                walk_expression(&m.object)?;
                walk_expression(&m.expression)
            }
            ChainElement::PrivateFieldExpression(pf) => walk_expression(&pf.object),
            _ => Ok(()),
        },
        // Literals, identifiers in non-call position, this, super,
        // update expressions (target is an assignment target, not an
        // expression) carry nothing denylisted.
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_arrow_function() {
        assert!(validate("(a, b) => a + b").is_ok());
    }

    #[test]
    fn accepts_named_function_expression() {
        let source = r#"(function add(a, b) {
            let total = 0;
            for (const x of [a, b]) {
                total += x;
            }
            return total;
        })"#;
        assert!(validate(source).is_ok());
    }

    #[test]
    fn rejects_with_statement() {
        let source = "(x) => { with (x) { return y; } }";
        let err = validate(source).unwrap_err();
        assert_eq!(
            err,
            Violation::ForbiddenSyntax {
                construct: "with statement".into()
            }
        );
    }

    #[test]
    fn rejects_import_declaration() {
        let source = "import fs from \"fs\";\n(a) => a";
        let err = validate(source).unwrap_err();
        assert_eq!(
            err,
            Violation::ForbiddenSyntax {
                construct: "import declaration".into()
            }
        );
    }

    #[test]
    fn rejects_dynamic_import() {
        let source = "async (m) => { const fs = await import(m); return fs; }";
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "import".into() });
    }

    #[test]
    fn rejects_eval_call() {
        let source = "(s) => eval(s)";
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "eval".into() });
    }

    #[test]
    fn rejects_open_call() {
        let source = "(p) => open(p)";
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "open".into() });
    }

    #[test]
    fn rejects_require_call() {
        let source = "() => require(\"fs\")";
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "require".into() });
    }

    #[test]
    fn rejects_function_constructor() {
        let source = "(body) => new Function(body)";
        let err = validate(source).unwrap_err();
        assert_eq!(
            err,
            Violation::ForbiddenCall {
                name: "Function".into()
            }
        );
    }

    #[test]
    fn rejects_function_call_without_new() {
        let source = "(body) => Function(body)()";
        let err = validate(source).unwrap_err();
        assert_eq!(
            err,
            Violation::ForbiddenCall {
                name: "Function".into()
            }
        );
    }

    #[test]
    fn rejects_import_meta() {
        let source = "() => import.meta.url";
        let err = validate(source).unwrap_err();
        assert_eq!(
            err,
            Violation::ForbiddenSyntax {
                construct: "import.meta".into()
            }
        );
    }

    #[test]
    fn rejects_eval_nested_in_helper_body() {
        // Nested function bodies in the candidate's own source are walked.
        let source = r#"(x) => {
            const helper = (s) => eval(s);
            return helper(x);
        }"#;
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "eval".into() });
    }

    #[test]
    fn reports_first_violation_in_preorder() {
        // Both an eval call and a with statement; eval appears first in
        // the source, so pre-order traversal reports it.
        let source = r#"(x) => {
            eval(x);
            with (x) { return y; }
        }"#;
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "eval".into() });
    }

    #[test]
    fn accepts_eval_as_bare_reference() {
        // Only call position is denylisted; a bare reference does nothing
        // in the stripped namespace (the global is absent at run time).
        assert!(validate("() => typeof eval").is_ok());
    }

    #[test]
    fn rejects_eval_inside_ternary_branch() {
        let source = "(flag, s) => flag ? eval(s) : null";
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "eval".into() });
    }

    #[test]
    fn rejects_eval_inside_template_literal() {
        let source = "(s) => `value: ${eval(s)}`";
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "eval".into() });
    }

    #[test]
    fn rejects_eval_in_optional_chain() {
        let source = "(o, s) => o?.f(eval(s))";
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "eval".into() });
    }

    #[test]
    fn rejects_eval_in_class_method() {
        let source = r#"(s) => {
            class Helper {
                run() { return eval(s); }
            }
            return new Helper().run();
        }"#;
        let err = validate(source).unwrap_err();
        assert_eq!(err, Violation::ForbiddenCall { name: "eval".into() });
    }

    #[test]
    fn rejects_unparseable_source() {
        let err = validate("(a, b => a +").unwrap_err();
        assert!(matches!(err, Violation::Parse { .. }));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let source = format!("{}1{}", "(".repeat(300), ")".repeat(300));
        let err = validate(&source).unwrap_err();
        assert!(matches!(err, Violation::NestingTooDeep { .. }));
    }

    #[test]
    fn accepts_deep_but_bounded_nesting() {
        let source = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert!(validate(&source).is_ok());
    }
}
