use crate::ast::{BlockStatement, Expression, InfixOperator, PrefixOperator, Program, Statement};
use crate::object::{Environment, EvalError, EvalResult, Heap, Object};

/// Tree-walking evaluator. Owns the heap and the root environment; every
/// Environment, FunctionObject and return payload produced during evaluation
/// is registered on the heap and reclaimed either by a sweep or when the
/// evaluator is dropped.
pub struct Evaluator {
    environment: Environment,
    heap: Heap,
}

impl Evaluator {
    pub fn new() -> Self {
        let mut heap = Heap::new();
        let environment = heap.alloc_environment(None);

        Evaluator { environment, heap }
    }

    /// Number of live heap allocations, root environment included.
    pub fn live_objects(&self) -> usize {
        self.heap.len()
    }

    pub fn evaluate(&mut self, program: &Program) -> EvalResult {
        let mut result = Object::Null;
        let env = self.environment.clone();

        for statement in &program.statements {
            result = self.eval_statement(statement, &env)?;

            if let Object::Return(payload) = &result {
                let value = (*payload.get()).clone();
                self.sweep(&value);
                return Ok(value);
            }

            self.sweep(&result);
        }

        Ok(result)
    }

    // Collection points sit at top-level statement boundaries: no expression
    // is mid-flight, so the current result is the only live value outside
    // the environment graph.
    fn sweep(&mut self, result: &Object) {
        self.heap.collect(&self.environment, result);
    }

    fn eval_statement(&mut self, statement: &Statement, env: &Environment) -> EvalResult {
        match statement {
            Statement::Expression(expression) => self.eval_expression(expression, env),
            Statement::Return(expression) => {
                let value = self.eval_expression(expression, env)?;
                Ok(Object::Return(self.heap.alloc_return(value)))
            }
            Statement::Let(name, expression) => {
                let value = self.eval_expression(expression, env)?;
                env.set(name, value);
                Ok(Object::Null)
            }
        }
    }

    fn eval_block_statement(&mut self, block: &BlockStatement, env: &Environment) -> EvalResult {
        let mut result = Object::Null;

        for statement in &block.statements {
            result = self.eval_statement(statement, env)?;

            if let Object::Return(_) = result {
                // Don't unwrap it here - want to propagate it back up the call stack
                return Ok(result);
            }
        }

        Ok(result)
    }

    fn eval_expression(&mut self, expression: &Expression, env: &Environment) -> EvalResult {
        match expression {
            Expression::Identifier(name) => Ok(env.get(name).unwrap_or(Object::Null)),
            Expression::IntegerLiteral(v) => Ok(Object::Integer(*v)),
            Expression::Boolean(b) => Ok(Object::Boolean(*b)),
            Expression::Prefix(operator, expression) => {
                self.eval_prefix_expression(operator, expression, env)
            }
            Expression::Infix(operator, left, right) => {
                self.eval_infix_expression(operator, left, right, env)
            }
            Expression::If(condition, consequence, alternative) => {
                self.eval_if_expression(condition, consequence, alternative, env)
            }
            Expression::FunctionLiteral(parameters, body) => {
                Ok(Object::Function(self.heap.alloc_function(
                    parameters.clone(),
                    body.clone(),
                    env.clone(),
                )))
            }
            Expression::Call(function, arguments) => {
                self.eval_call_expression(function, arguments, env)
            }
        }
    }

    fn eval_prefix_expression(
        &mut self,
        operator: &PrefixOperator,
        expression: &Expression,
        env: &Environment,
    ) -> EvalResult {
        let object = self.eval_expression(expression, env)?;

        match operator {
            PrefixOperator::Bang => Ok(Object::Boolean(!object.is_truthy())),
            PrefixOperator::Minus => match object {
                Object::Integer(v) => Ok(Object::Integer(-v)),
                _ => Err(EvalError::UnknownOperator(format!(
                    "{}{}",
                    operator,
                    object.type_name()
                ))),
            },
        }
    }

    fn eval_infix_expression(
        &mut self,
        operator: &InfixOperator,
        left_exp: &Expression,
        right_exp: &Expression,
        env: &Environment,
    ) -> EvalResult {
        let left = self.eval_expression(left_exp, env)?;
        let right = self.eval_expression(right_exp, env)?;

        match (&left, &right) {
            (Object::Integer(l), Object::Integer(r)) => {
                eval_integer_infix_expression(operator, *l, *r)
            }
            (Object::Boolean(l), Object::Boolean(r)) => {
                eval_boolean_infix_expression(operator, *l, *r)
            }
            _ if left.type_name() != right.type_name() => Err(EvalError::TypeMismatch(format!(
                "{} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            ))),
            _ => Err(EvalError::UnknownOperator(format!(
                "{} {} {}",
                left.type_name(),
                operator,
                right.type_name()
            ))),
        }
    }

    fn eval_if_expression(
        &mut self,
        condition: &Expression,
        consequence: &BlockStatement,
        alternative: &BlockStatement,
        env: &Environment,
    ) -> EvalResult {
        let test = self.eval_expression(condition, env)?;

        // The alternative is always present; an omitted `else` is an empty
        // block, which evaluates to null.
        if test.is_truthy() {
            self.eval_block_statement(consequence, env)
        } else {
            self.eval_block_statement(alternative, env)
        }
    }

    fn eval_call_expression(
        &mut self,
        function: &Expression,
        arguments: &[Expression],
        env: &Environment,
    ) -> EvalResult {
        let callee = self.eval_expression(function, env)?;

        let function = match &callee {
            Object::Function(function) => function.get(),
            _ => return Err(EvalError::NotAFunction(callee.type_name().to_string())),
        };

        if arguments.len() != function.parameters.len() {
            return Err(EvalError::FunctionArgumentMismatch {
                expected: function.parameters.len(),
                got: arguments.len(),
            });
        }

        let call_env = self
            .heap
            .alloc_environment(Some(function.environment.clone()));

        // Arguments are evaluated in the caller's environment; a parameter
        // that shadows an outer name must not capture its own argument list.
        for (parameter, argument) in function.parameters.iter().zip(arguments) {
            let value = self.eval_expression(argument, env)?;
            call_env.set(parameter, value);
        }

        let result = self.eval_block_statement(&function.body, &call_env)?;

        // `return` escapes to the innermost function boundary only.
        match result {
            Object::Return(payload) => Ok((*payload.get()).clone()),
            other => Ok(other),
        }
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

fn eval_integer_infix_expression(operator: &InfixOperator, left: i64, right: i64) -> EvalResult {
    match operator {
        InfixOperator::Eq => Ok(Object::Boolean(left == right)),
        InfixOperator::NotEq => Ok(Object::Boolean(left != right)),
        InfixOperator::Lt => Ok(Object::Boolean(left < right)),
        InfixOperator::Gt => Ok(Object::Boolean(left > right)),
        InfixOperator::Plus => Ok(Object::Integer(left + right)),
        InfixOperator::Minus => Ok(Object::Integer(left - right)),
        InfixOperator::Asterisk => Ok(Object::Integer(left * right)),
        InfixOperator::Slash => Ok(Object::Integer(left / right)),
    }
}

fn eval_boolean_infix_expression(operator: &InfixOperator, left: bool, right: bool) -> EvalResult {
    match operator {
        InfixOperator::Eq => Ok(Object::Boolean(left == right)),
        InfixOperator::NotEq => Ok(Object::Boolean(left != right)),
        _ => Err(EvalError::UnknownOperator(format!(
            "{} {} {}",
            Object::Boolean(left).type_name(),
            operator,
            Object::Boolean(right).type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use crate::evaluator::Evaluator;
    use crate::object::Object;
    use crate::parser::parse;

    #[test]
    fn eval_integer_expression() {
        expect_values(vec![
            ("5;", "5"),
            ("10;", "10"),
            ("-5", "-5"),
            ("-10", "-10"),
            ("5 + 5 + 5 + 5 - 10", "10"),
            ("2 * 2 * 2 * 2 * 2", "32"),
            ("-50 + 100 + -50", "0"),
            ("5 * 2 + 10", "20"),
            ("5 + 2 * 10", "25"),
            ("5 + 5 * 2", "15"),
            ("20 + 2 * -10", "0"),
            ("50 / 2 * 2 + 10", "60"),
            ("2 * (5 + 10)", "30"),
            ("3 * 3 * 3 + 10", "37"),
            ("3 * (3 * 3) + 10", "37"),
            ("(5 + 10 * 2 + 15 / 3) * 2 + -10", "50"),
            ("7 / 2", "3"),
            ("-7 / 2", "-3"),
        ]);
    }

    #[test]
    fn eval_boolean_expression() {
        expect_values(vec![
            ("true;", "true"),
            ("false;", "false"),
            ("1 < 2", "true"),
            ("1 > 2", "false"),
            ("1 < 1", "false"),
            ("1 > 1", "false"),
            ("1 == 1", "true"),
            ("1 != 1", "false"),
            ("1 == 2", "false"),
            ("1 != 2", "true"),
            ("true == true", "true"),
            ("false == false", "true"),
            ("true == false", "false"),
            ("true != false", "true"),
            ("false != true", "true"),
            ("(1 < 2) == true", "true"),
            ("(1 < 2) == false", "false"),
            ("(1 > 2) == true", "false"),
            ("(1 > 2) == false", "true"),
        ]);
    }

    #[test]
    fn eval_bang_expression() {
        expect_values(vec![
            ("!true;", "false"),
            ("!false;", "true"),
            ("!5;", "false"),
            ("!!true;", "true"),
            ("!!false;", "false"),
            ("!!5;", "true"),
        ]);
    }

    #[test]
    fn eval_if() {
        expect_values(vec![
            ("if (true) { 10 }", "10"),
            ("if (false) { 10 }", "null"),
            ("if (1) { 10 }", "10"),
            ("if (1 < 2) { 10 }", "10"),
            ("if (1 > 2) { 10 }", "null"),
            ("if (1 < 2) { 10 } else { 20 }", "10"),
            ("if (1 > 2) { 10 } else { 20 }", "20"),
        ]);
    }

    #[test]
    fn eval_return() {
        expect_values(vec![
            ("return 10;", "10"),
            ("return 10; 9;", "10"),
            ("return 2 * 5; 9;", "10"),
            ("9; return 2 * 5; 9;", "10"),
            ("if (10 > 1) { return 10; }", "10"),
            (
                "
if (10 > 1) {
  if (10 > 1) {
    return 10;
  }

  return 1;
}
",
                "10",
            ),
        ]);
    }

    #[test]
    fn let_statements() {
        expect_values(vec![
            ("let a = 5; a;", "5"),
            ("let a = 5 * 5; a;", "25"),
            ("let a = 5; let b = a; b;", "5"),
            ("let a = 5; let b = a; let c = a + b + 5; c;", "15"),
            // A let statement is not itself a value.
            ("let a = 5;", "null"),
        ]);
    }

    #[test]
    fn unresolved_identifiers_are_null() {
        expect_values(vec![
            ("foobar", "null"),
            ("let x = y; x", "null"),
            ("!missing", "true"),
        ]);
    }

    #[test]
    fn fn_expressions() {
        expect_values(vec![("fn(x) { x + 2; }", "fn(x) { (x + 2); }")]);
    }

    #[test]
    fn fn_application() {
        expect_values(vec![
            ("let identity = fn(x) { x; }; identity(5);", "5"),
            ("let identity = fn(x) { return x; }; identity(5);", "5"),
            ("let double = fn(x) { x * 2; }; double(5);", "10"),
            ("let add = fn(x, y) { x + y; }; add(5, 5);", "10"),
            (
                "let add = fn(x, y) { x + y; }; add(5 + 5, add(5, 5));",
                "20",
            ),
            ("fn(x) { x; }(5)", "5"),
        ]);
    }

    #[test]
    fn function_with_closures() {
        expect_values(vec![(
            r#"
let newAdder = fn(x) {
    fn(y) { x + y };
};

let addTwo = newAdder(2);
addTwo(3);
"#,
            "5",
        )]);
    }

    #[test]
    fn closures_capture_the_environment_by_reference() {
        // Rebinding mutates the captured environment, so the closure sees
        // the new value.
        expect_values(vec![(
            "let a = 1; let f = fn(){ a }; let a = 2; f()",
            "2",
        )]);
    }

    #[test]
    fn recursive_functions() {
        expect_values(vec![(
            "let fib = fn(x){ if (x < 3) { 1 } else { fib(x - 1) + fib(x - 2) } }; fib(5)",
            "5",
        )]);
    }

    #[test]
    fn arguments_evaluate_in_the_callers_environment() {
        expect_values(vec![
            ("let f = fn(a, b){ b }; let a = 1; f(2, a)", "1"),
            ("let x = 10; let f = fn(x){ x }; f(x + 1)", "11"),
        ]);
    }

    #[test]
    fn eval_error_handling() {
        expect_errors(vec![
            ("-true", "unknown operator: -BOOLEAN"),
            ("-false", "unknown operator: -BOOLEAN"),
            ("5 - false", "type mismatch: INTEGER - BOOLEAN"),
            ("5 + true;", "type mismatch: INTEGER + BOOLEAN"),
            ("5 + true; 5;", "type mismatch: INTEGER + BOOLEAN"),
            ("true + false", "unknown operator: BOOLEAN + BOOLEAN"),
            ("true < false", "unknown operator: BOOLEAN < BOOLEAN"),
            ("5; true + false; 5", "unknown operator: BOOLEAN + BOOLEAN"),
            (
                "
            if (10 > 1) {
                if (10 > 1) {
                  return true + false;
                }

                return 1;
              }
            ",
                "unknown operator: BOOLEAN + BOOLEAN",
            ),
            ("let x = 5; x();", "not a function: INTEGER"),
            ("missing()", "not a function: NULL"),
            (
                "let f = fn(x){ x }; f(1, 2);",
                "wrong number of arguments: expected 1, got 2",
            ),
            (
                "let f = fn(x, y){ x }; f(1);",
                "wrong number of arguments: expected 2, got 1",
            ),
        ]);
    }

    #[test]
    fn arity_is_checked_before_arguments_evaluate() {
        // boom() would be a NotAFunction error; the arity check wins.
        expect_errors(vec![(
            "let f = fn(x){ x }; f(1, boom());",
            "wrong number of arguments: expected 1, got 2",
        )]);
    }

    #[test]
    fn sweep_collects_rebound_closure_cycle() {
        let mut evaluator = Evaluator::new();

        evaluator
            .evaluate(&parse("let f = fn(){ f() };").unwrap())
            .unwrap();
        // root environment + the self-referential closure
        assert_eq!(2, evaluator.live_objects());

        evaluator.evaluate(&parse("let f = 0;").unwrap()).unwrap();
        assert_eq!(1, evaluator.live_objects());
    }

    #[test]
    fn sweep_reclaims_call_environments() {
        let mut evaluator = Evaluator::new();

        evaluator
            .evaluate(
                &parse("let newAdder = fn(x){ fn(y){ x + y } }; let addTwo = newAdder(2);")
                    .unwrap(),
            )
            .unwrap();

        let before = evaluator.live_objects();
        let result = evaluator.evaluate(&parse("addTwo(3)").unwrap()).unwrap();

        assert_eq!(Object::Integer(5), result);
        assert_eq!(before, evaluator.live_objects());
    }

    #[test]
    fn return_payloads_are_reclaimed_after_unwrapping() {
        let mut evaluator = Evaluator::new();

        let result = evaluator.evaluate(&parse("return 5;").unwrap()).unwrap();

        assert_eq!(Object::Integer(5), result);
        assert_eq!(1, evaluator.live_objects());
    }

    #[test]
    fn teardown_releases_closure_cycles() {
        let handle = {
            let mut evaluator = Evaluator::new();
            evaluator
                .evaluate(&parse("let f = fn(){ f() };").unwrap())
                .unwrap();

            let Object::Function(handle) = evaluator.evaluate(&parse("f").unwrap()).unwrap()
            else {
                panic!("expected a function");
            };
            assert!(handle.upgrade().is_some());
            handle
        };

        // The evaluator is gone; the cycle must not have kept itself alive.
        assert!(handle.upgrade().is_none());
    }

    #[test]
    fn heap_typed_results_survive_the_final_sweep() {
        let mut evaluator = Evaluator::new();

        let result = evaluator.evaluate(&parse("fn(x){ x }").unwrap()).unwrap();

        assert_eq!("fn(x) { x; }", result.to_string());
    }

    fn expect_values(tests: Vec<(&str, &str)>) {
        for (input, expected) in &tests {
            let program = parse(input)
                .unwrap_or_else(|err| panic!("parse error for `{}`: {}", input, err));
            let mut evaluator = Evaluator::new();

            match evaluator.evaluate(&program) {
                Ok(object) => {
                    assert_eq!(expected.to_string(), object.to_string(), "for `{}`", input);
                }
                Err(err) => {
                    panic!(
                        "expected `{}`, but got error={} for `{}`",
                        expected, err, input
                    );
                }
            }
        }
    }

    fn expect_errors(tests: Vec<(&str, &str)>) {
        for (input, expected_message) in &tests {
            let program = parse(input)
                .unwrap_or_else(|err| panic!("parse error for `{}`: {}", input, err));
            let mut evaluator = Evaluator::new();

            match evaluator.evaluate(&program) {
                Ok(object) => {
                    panic!("no error returned. got=`{}` for `{}`", object, input);
                }
                Err(err) => {
                    assert_eq!(expected_message, &err.to_string(), "for `{}`", input);
                }
            }
        }
    }
}
