use crate::ast::{BinaryOp, CompareOp, Expr, LogicalOp, Program, Stmt};
use crate::error::{MinipyError, Span};
use crate::value::{Class, ClassInstance, Closure, Method, Object, ObjectHolder};
use std::io::Write;
use std::rc::Rc;

const INIT_METHOD: &str = "__init__";
const STR_METHOD: &str = "__str__";
const EQ_METHOD: &str = "__eq__";
const LT_METHOD: &str = "__lt__";
const ADD_METHOD: &str = "__add__";

/// How a statement stops short of producing a value: a runtime error, or
/// the return signal travelling up to the nearest enclosing method body.
/// The two are distinct; errors pass through method bodies unchanged.
enum Unwind {
    Error(MinipyError),
    Return(ObjectHolder),
}

impl From<MinipyError> for Unwind {
    fn from(error: MinipyError) -> Self {
        Unwind::Error(error)
    }
}

type Exec = Result<ObjectHolder, Unwind>;

/// Tree-walking executor. Guest `print` output goes to the caller-provided
/// sink; diagnostics never do.
pub struct Evaluator<'out, W: Write> {
    output: &'out mut W,
    /// Every class the program has defined, by name. Method frames carry
    /// only `self` and the call arguments, so class names resolve here
    /// when the local scope misses.
    classes: Closure,
}

impl<'out, W: Write> Evaluator<'out, W> {
    pub fn new(output: &'out mut W) -> Self {
        Self {
            output,
            classes: Closure::new(),
        }
    }

    /// Runs a program against a fresh global scope.
    pub fn evaluate_program(&mut self, program: &Program) -> Result<(), MinipyError> {
        let mut globals = Closure::new();
        self.evaluate_program_in(program, &mut globals)
    }

    /// Runs a program against a caller-owned global scope (the REPL feeds
    /// successive snippets into one scope).
    pub fn evaluate_program_in(
        &mut self,
        program: &Program,
        globals: &mut Closure,
    ) -> Result<(), MinipyError> {
        for statement in &program.statements {
            match self.execute_statement(statement, globals) {
                Ok(_) => {}
                Err(Unwind::Error(error)) => return Err(error),
                Err(Unwind::Return(_)) => {
                    return Err(MinipyError::runtime_error(
                        statement.span().clone(),
                        "'return' outside of a method",
                    ));
                }
            }
        }
        Ok(())
    }

    /// Evaluates one expression in a caller-owned scope.
    pub fn evaluate_expression_in(
        &mut self,
        expr: &Expr,
        globals: &mut Closure,
    ) -> Result<ObjectHolder, MinipyError> {
        match self.evaluate_expression(expr, globals) {
            Ok(value) => Ok(value),
            Err(Unwind::Error(error)) => Err(error),
            Err(Unwind::Return(_)) => Err(MinipyError::runtime_error(
                expr.span().clone(),
                "'return' outside of a method",
            )),
        }
    }

    /// Renders a value the way `print` would, into a fresh string.
    pub fn render_value(
        &mut self,
        value: &ObjectHolder,
        span: &Span,
    ) -> Result<String, MinipyError> {
        let mut buffer = String::new();
        match self.render(value, span, &mut buffer) {
            Ok(()) => Ok(buffer),
            Err(Unwind::Error(error)) => Err(error),
            Err(Unwind::Return(_)) => Err(MinipyError::runtime_error(
                span.clone(),
                "'return' outside of a method",
            )),
        }
    }

    // ---------------------------------------------------------------------
    // Statements
    // ---------------------------------------------------------------------

    fn execute_statement(&mut self, stmt: &Stmt, closure: &mut Closure) -> Exec {
        match stmt {
            Stmt::Expression { expr, .. } => self.evaluate_expression(expr, closure),
            Stmt::Assign { name, value, .. } => {
                let value = self.evaluate_expression(value, closure)?;
                closure.insert(name.clone(), value.clone());
                Ok(value)
            }
            Stmt::FieldAssign {
                object,
                field,
                value,
                span,
            } => {
                let target = self.evaluate_expression(object, closure)?;
                let value = self.evaluate_expression(value, closure)?;
                match target.as_instance() {
                    Some(instance) => {
                        instance.fields_mut().insert(field.clone(), value.clone());
                        Ok(value)
                    }
                    None => Err(MinipyError::runtime_error(
                        span.clone(),
                        format!("Cannot assign field '{}' on {}", field, target.type_name()),
                    )
                    .into()),
                }
            }
            Stmt::Print { args, span } => {
                let mut line = String::new();
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        line.push(' ');
                    }
                    let value = self.evaluate_expression(arg, closure)?;
                    self.render(&value, arg.span(), &mut line)?;
                }
                writeln!(self.output, "{}", line).map_err(|error| {
                    MinipyError::runtime_error(
                        span.clone(),
                        format!("Failed to write output: {}", error),
                    )
                })?;
                Ok(ObjectHolder::own(Object::Str(line)))
            }
            Stmt::Return { value, .. } => {
                let result = match value {
                    Some(expr) => self.evaluate_expression(expr, closure)?,
                    None => ObjectHolder::none(),
                };
                Err(Unwind::Return(result))
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
                ..
            } => {
                let cond = self.evaluate_expression(condition, closure)?;
                match cond.as_bool() {
                    Some(true) => self.execute_block(then_branch, closure),
                    Some(false) => match else_branch {
                        Some(stmts) => self.execute_block(stmts, closure),
                        None => Ok(ObjectHolder::none()),
                    },
                    None => Err(MinipyError::runtime_error(
                        condition.span().clone(),
                        format!("Condition must be a bool, got {}", cond.type_name()),
                    )
                    .into()),
                }
            }
            Stmt::ClassDef {
                name,
                parent,
                methods,
                span,
            } => {
                let parent_class = match parent {
                    Some(parent_name) => {
                        let holder = match self.lookup(parent_name, closure) {
                            Some(holder) => holder,
                            None => {
                                return Err(MinipyError::runtime_error(
                                    span.clone(),
                                    format!("Undefined base class '{}'", parent_name),
                                )
                                .into());
                            }
                        };
                        match holder.as_class() {
                            Some(class) => Some(Rc::clone(class)),
                            None => {
                                return Err(MinipyError::runtime_error(
                                    span.clone(),
                                    format!("'{}' is not a class", parent_name),
                                )
                                .into());
                            }
                        }
                    }
                    None => None,
                };

                let methods = methods
                    .iter()
                    .map(|def| Method {
                        name: def.name.clone(),
                        formal_params: def.params.clone(),
                        body: def.body.clone(),
                    })
                    .collect();
                let class = Rc::new(Class::new(name.clone(), methods, parent_class));
                let holder = ObjectHolder::own(Object::Class(class));
                closure.insert(name.clone(), holder.clone());
                self.classes.insert(name.clone(), holder.clone());
                Ok(holder)
            }
        }
    }

    /// An ordered statement list; its own value is empty. The return
    /// signal and errors pass straight through.
    fn execute_block(&mut self, statements: &[Stmt], closure: &mut Closure) -> Exec {
        for statement in statements {
            self.execute_statement(statement, closure)?;
        }
        Ok(ObjectHolder::none())
    }

    // ---------------------------------------------------------------------
    // Expressions
    // ---------------------------------------------------------------------

    fn evaluate_expression(&mut self, expr: &Expr, closure: &mut Closure) -> Exec {
        match expr {
            Expr::None { .. } => Ok(ObjectHolder::none()),
            Expr::Number { value, .. } => Ok(ObjectHolder::own(Object::Number(*value))),
            Expr::Str { value, .. } => Ok(ObjectHolder::own(Object::Str(value.clone()))),
            Expr::Bool { value, .. } => Ok(ObjectHolder::own(Object::Bool(*value))),
            Expr::Variable { names, span } => self.resolve_variable(names, span, closure),
            Expr::Call { callee, args, span } => {
                let target = self.evaluate_expression(callee, closure)?;
                let class = match target.as_class() {
                    Some(class) => Rc::clone(class),
                    None => {
                        return Err(MinipyError::runtime_error(
                            span.clone(),
                            format!("{} is not callable", target.type_name()),
                        )
                        .into());
                    }
                };
                let mut actual = Vec::with_capacity(args.len());
                for arg in args {
                    actual.push(self.evaluate_expression(arg, closure)?);
                }
                self.instantiate(&class, actual, span)
            }
            Expr::MethodCall {
                object,
                method,
                args,
                span,
            } => {
                let receiver = self.evaluate_expression(object, closure)?;
                match receiver.as_instance() {
                    Some(instance) => {
                        if !instance.has_method(method, args.len()) {
                            return Err(MinipyError::runtime_error(
                                span.clone(),
                                format!(
                                    "Class '{}' has no method '{}' taking {} argument(s)",
                                    instance.class().name(),
                                    method,
                                    args.len()
                                ),
                            )
                            .into());
                        }
                    }
                    None => {
                        return Err(MinipyError::runtime_error(
                            span.clone(),
                            format!(
                                "Cannot call method '{}' on {}",
                                method,
                                receiver.type_name()
                            ),
                        )
                        .into());
                    }
                }
                let mut actual = Vec::with_capacity(args.len());
                for arg in args {
                    actual.push(self.evaluate_expression(arg, closure)?);
                }
                self.call_method(&receiver, method, actual, span)
            }
            Expr::Stringify { arg, span } => {
                let value = self.evaluate_expression(arg, closure)?;
                let mut buffer = String::new();
                self.render(&value, span, &mut buffer)?;
                Ok(ObjectHolder::own(Object::Str(buffer)))
            }
            Expr::Binary {
                left,
                operator,
                right,
                span,
            } => {
                let lhs = self.evaluate_expression(left, closure)?;
                let rhs = self.evaluate_expression(right, closure)?;
                self.evaluate_binary_op(*operator, lhs, rhs, span)
            }
            Expr::Comparison {
                left,
                operator,
                right,
                span,
            } => {
                let lhs = self.evaluate_expression(left, closure)?;
                let rhs = self.evaluate_expression(right, closure)?;
                let result = match operator {
                    CompareOp::Equal => self.equal(&lhs, &rhs, span)?,
                    CompareOp::NotEqual => !self.equal(&lhs, &rhs, span)?,
                    CompareOp::Less => self.less(&lhs, &rhs, span)?,
                    CompareOp::LessEqual => {
                        self.less(&lhs, &rhs, span)? || self.equal(&lhs, &rhs, span)?
                    }
                    CompareOp::Greater => {
                        !self.less(&lhs, &rhs, span)? && !self.equal(&lhs, &rhs, span)?
                    }
                    CompareOp::GreaterEqual => !self.less(&lhs, &rhs, span)?,
                };
                Ok(ObjectHolder::own(Object::Bool(result)))
            }
            Expr::Logical {
                left,
                operator,
                right,
                ..
            } => {
                // Logic consults only Bool values; anything else counts as
                // false on this path and is never coerced.
                match operator {
                    LogicalOp::Or => {
                        if self.evaluate_expression(left, closure)?.as_bool() == Some(true) {
                            return Ok(ObjectHolder::own(Object::Bool(true)));
                        }
                        if self.evaluate_expression(right, closure)?.as_bool() == Some(true) {
                            return Ok(ObjectHolder::own(Object::Bool(true)));
                        }
                        Ok(ObjectHolder::own(Object::Bool(false)))
                    }
                    LogicalOp::And => {
                        if self.evaluate_expression(left, closure)?.as_bool() != Some(true) {
                            return Ok(ObjectHolder::own(Object::Bool(false)));
                        }
                        if self.evaluate_expression(right, closure)?.as_bool() != Some(true) {
                            return Ok(ObjectHolder::own(Object::Bool(false)));
                        }
                        Ok(ObjectHolder::own(Object::Bool(true)))
                    }
                }
            }
            Expr::Not { operand, span } => {
                let value = self.evaluate_expression(operand, closure)?;
                match value.as_bool() {
                    Some(b) => Ok(ObjectHolder::own(Object::Bool(!b))),
                    None => Err(MinipyError::runtime_error(
                        span.clone(),
                        format!("Operand of 'not' must be a bool, got {}", value.type_name()),
                    )
                    .into()),
                }
            }
        }
    }

    /// Resolves `a.b.c`: the first segment in the current scope, each
    /// further segment in the field table of the instance so far.
    fn resolve_variable(&self, names: &[String], span: &Span, closure: &Closure) -> Exec {
        let (first, rest) = match names.split_first() {
            Some(parts) => parts,
            None => {
                return Err(MinipyError::runtime_error(
                    span.clone(),
                    "Invalid variable reference",
                )
                .into());
            }
        };
        let mut value = match self.lookup(first, closure) {
            Some(holder) => holder,
            None => {
                return Err(MinipyError::runtime_error(
                    span.clone(),
                    format!("Undefined variable '{}'", first),
                )
                .into());
            }
        };
        for name in rest {
            let next = match value.as_instance() {
                Some(instance) => instance.fields().get(name).cloned(),
                None => {
                    return Err(MinipyError::runtime_error(
                        span.clone(),
                        format!("{} has no field '{}'", value.type_name(), name),
                    )
                    .into());
                }
            };
            value = match next {
                Some(holder) => holder,
                None => {
                    return Err(MinipyError::runtime_error(
                        span.clone(),
                        format!("Undefined field '{}'", name),
                    )
                    .into());
                }
            };
        }
        Ok(value)
    }

    /// Name lookup: the current scope first, then the defined classes. A
    /// local binding shadows a class of the same name.
    fn lookup(&self, name: &str, closure: &Closure) -> Option<ObjectHolder> {
        closure
            .get(name)
            .cloned()
            .or_else(|| self.classes.get(name).cloned())
    }

    // ---------------------------------------------------------------------
    // Classes, instances, dispatch
    // ---------------------------------------------------------------------

    /// Builds an instance of `class` and runs a matching-arity `__init__`
    /// when the class chain has one (its result is discarded).
    fn instantiate(&mut self, class: &Rc<Class>, args: Vec<ObjectHolder>, span: &Span) -> Exec {
        let instance = ObjectHolder::own(Object::Instance(ClassInstance::new(Rc::clone(class))));
        let has_init = class
            .get_method(INIT_METHOD)
            .map_or(false, |method| method.formal_params.len() == args.len());
        if has_init {
            self.call_method(&instance, INIT_METHOD, args, span)?;
        }
        Ok(instance)
    }

    /// Dispatches `name` on an instance: fresh frame, `self` shared onto
    /// the receiver, formals bound positionally, body executed. The body is
    /// the catch point of the return signal.
    fn call_method(
        &mut self,
        receiver: &ObjectHolder,
        name: &str,
        actual_args: Vec<ObjectHolder>,
        span: &Span,
    ) -> Exec {
        let rc = match receiver.rc() {
            Some(rc) => Rc::clone(rc),
            None => {
                return Err(MinipyError::runtime_error(
                    span.clone(),
                    format!("Cannot call method '{}' on None", name),
                )
                .into());
            }
        };
        let instance = match rc.as_ref() {
            Object::Instance(instance) => instance,
            other => {
                return Err(MinipyError::runtime_error(
                    span.clone(),
                    format!("Cannot call method '{}' on {}", name, other.type_name()),
                )
                .into());
            }
        };
        let class = Rc::clone(instance.class());
        let method = match class.get_method(name) {
            Some(method) => method,
            None => {
                return Err(MinipyError::runtime_error(
                    span.clone(),
                    format!("Class '{}' has no method '{}'", class.name(), name),
                )
                .into());
            }
        };
        if method.formal_params.len() != actual_args.len() {
            return Err(MinipyError::runtime_error(
                span.clone(),
                format!(
                    "Method '{}' of class '{}' takes {} argument(s), got {}",
                    name,
                    class.name(),
                    method.formal_params.len(),
                    actual_args.len()
                ),
            )
            .into());
        }

        let mut frame = Closure::new();
        frame.insert("self".to_string(), ObjectHolder::share(&rc));
        for (param, value) in method.formal_params.iter().zip(actual_args) {
            frame.insert(param.clone(), value);
        }

        match self.execute_block(&method.body, &mut frame) {
            Ok(value) => Ok(value),
            Err(Unwind::Return(value)) => Ok(value),
            Err(error) => Err(error),
        }
    }

    /// Renders a value into `out` the way `print` shows it. Instances with
    /// a zero-argument `__str__` delegate to it; others show their class
    /// name and address. Never touches the program output sink.
    fn render(&mut self, value: &ObjectHolder, span: &Span, out: &mut String) -> Result<(), Unwind> {
        match value.object() {
            None => out.push_str("None"),
            Some(Object::Number(n)) => out.push_str(&n.to_string()),
            Some(Object::Str(s)) => out.push_str(s),
            Some(Object::Bool(b)) => out.push_str(if *b { "True" } else { "False" }),
            Some(Object::Class(class)) => {
                out.push_str("Class ");
                out.push_str(class.name());
            }
            Some(Object::Instance(instance)) => {
                if instance.has_method(STR_METHOD, 0) {
                    let rendered = self.call_method(value, STR_METHOD, Vec::new(), span)?;
                    self.render(&rendered, span, out)?;
                } else if let Some(rc) = value.rc() {
                    out.push_str(&format!(
                        "<{} object at {:p}>",
                        instance.class().name(),
                        Rc::as_ptr(rc)
                    ));
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Operators
    // ---------------------------------------------------------------------

    fn evaluate_binary_op(
        &mut self,
        operator: BinaryOp,
        left: ObjectHolder,
        right: ObjectHolder,
        span: &Span,
    ) -> Exec {
        match operator {
            BinaryOp::Add => {
                if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
                    return self.checked_number(l.checked_add(r), l, '+', r, span);
                }
                if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
                    return Ok(ObjectHolder::own(Object::Str(format!("{}{}", l, r))));
                }
                if let Some(instance) = left.as_instance() {
                    if instance.has_method(ADD_METHOD, 1) {
                        return self.call_method(&left, ADD_METHOD, vec![right], span);
                    }
                }
                Err(MinipyError::runtime_error(
                    span.clone(),
                    format!(
                        "Cannot add {} and {}",
                        left.type_name(),
                        right.type_name()
                    ),
                )
                .into())
            }
            BinaryOp::Subtract => match (left.as_number(), right.as_number()) {
                (Some(l), Some(r)) => self.checked_number(l.checked_sub(r), l, '-', r, span),
                _ => Err(MinipyError::runtime_error(
                    span.clone(),
                    format!(
                        "Cannot subtract {} and {}",
                        left.type_name(),
                        right.type_name()
                    ),
                )
                .into()),
            },
            BinaryOp::Multiply => match (left.as_number(), right.as_number()) {
                (Some(l), Some(r)) => self.checked_number(l.checked_mul(r), l, '*', r, span),
                _ => Err(MinipyError::runtime_error(
                    span.clone(),
                    format!(
                        "Cannot multiply {} and {}",
                        left.type_name(),
                        right.type_name()
                    ),
                )
                .into()),
            },
            BinaryOp::Divide => match (left.as_number(), right.as_number()) {
                (Some(_), Some(0)) => {
                    Err(MinipyError::runtime_error(span.clone(), "Division by zero").into())
                }
                // checked_div still fails on MIN / -1.
                (Some(l), Some(r)) => self.checked_number(l.checked_div(r), l, '/', r, span),
                _ => Err(MinipyError::runtime_error(
                    span.clone(),
                    format!(
                        "Cannot divide {} and {}",
                        left.type_name(),
                        right.type_name()
                    ),
                )
                .into()),
            },
        }
    }

    /// Guest integers are 32-bit; a result outside their range is a
    /// runtime error rather than a wrap or a crash.
    fn checked_number(
        &self,
        result: Option<i32>,
        left: i32,
        operator: char,
        right: i32,
        span: &Span,
    ) -> Exec {
        match result {
            Some(value) => Ok(ObjectHolder::own(Object::Number(value))),
            None => Err(MinipyError::runtime_error(
                span.clone(),
                format!(
                    "Integer overflow computing {} {} {}",
                    left, operator, right
                ),
            )
            .into()),
        }
    }

    fn equal(
        &mut self,
        left: &ObjectHolder,
        right: &ObjectHolder,
        span: &Span,
    ) -> Result<bool, Unwind> {
        if left.is_none() && right.is_none() {
            return Ok(true);
        }
        if let (Some(l), Some(r)) = (left.as_bool(), right.as_bool()) {
            return Ok(l == r);
        }
        if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
            return Ok(l == r);
        }
        if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
            return Ok(l == r);
        }
        if let Some(instance) = left.as_instance() {
            if instance.has_method(EQ_METHOD, 1) {
                let result = self.call_method(left, EQ_METHOD, vec![right.clone()], span)?;
                return Ok(result.is_truthy());
            }
        }
        Err(MinipyError::runtime_error(
            span.clone(),
            format!(
                "Cannot compare {} and {} for equality",
                left.type_name(),
                right.type_name()
            ),
        )
        .into())
    }

    fn less(
        &mut self,
        left: &ObjectHolder,
        right: &ObjectHolder,
        span: &Span,
    ) -> Result<bool, Unwind> {
        if let (Some(l), Some(r)) = (left.as_bool(), right.as_bool()) {
            return Ok(l < r);
        }
        if let (Some(l), Some(r)) = (left.as_number(), right.as_number()) {
            return Ok(l < r);
        }
        if let (Some(l), Some(r)) = (left.as_str(), right.as_str()) {
            return Ok(l < r);
        }
        if let Some(instance) = left.as_instance() {
            if instance.has_method(LT_METHOD, 1) {
                let result = self.call_method(left, LT_METHOD, vec![right.clone()], span)?;
                return Ok(result.is_truthy());
            }
        }
        Err(MinipyError::runtime_error(
            span.clone(),
            format!(
                "Cannot order {} and {}",
                left.type_name(),
                right.type_name()
            ),
        )
        .into())
    }
}
