//! Walks the syntax tree and emits blocks into the session's current target.
//!
//! Every handler returns `None` once it has reported a problem; the caller stops working on
//! that statement and compilation carries on with the next one. Scopes (parse context and
//! attachment) are only ever opened through `with_context` / `in_scope` so they are released
//! on every path.

use crate::ast::{
    AssignOp, BinaryOp, Constant, ElseBranch, Expr, Param, Program, Span, Statement, UnaryOp,
};
use crate::attach::AttachInfo;
use crate::block::{CallResult, Literal, Operand, SlotValue};
use crate::builder::IdGenerator;
use crate::custom_block::{CustomBlock, CustomBlockBuilder};
use crate::diagnostic::Diagnostic;
use crate::primitives;
use crate::project::ProjectCompiler;
use crate::target::TargetCompiler;
use crate::types::{self, TypeMismatch, ValueType};

pub struct Visitor<'a> {
    project: &'a mut ProjectCompiler,
    contexts: Vec<Span>,
    function: Option<CustomBlockBuilder>,
    branch_depth: usize,
}

impl<'a> Visitor<'a> {
    pub fn new(project: &'a mut ProjectCompiler) -> Self {
        Self {
            project,
            contexts: Vec::new(),
            function: None,
            branch_depth: 0,
        }
    }

    pub fn visit_program(&mut self, program: &Program) {
        for statement in &program.lines {
            let needs_script = !matches!(
                statement,
                Statement::Attribute { .. }
                    | Statement::Comment { .. }
                    | Statement::FunctionDeclaration { .. }
            );
            if needs_script {
                self.target().ensure_entry_point();
            }
            self.with_context(statement.span(), |v| v.visit_statement(statement));
        }
    }

    fn target(&mut self) -> &mut TargetCompiler {
        self.project.current_target_mut()
    }

    fn ids(&mut self) -> &mut IdGenerator {
        self.project.current_target_mut().ids_mut()
    }

    fn with_context<R>(&mut self, span: Span, f: impl FnOnce(&mut Self) -> R) -> R {
        self.contexts.push(span);
        let result = f(self);
        self.contexts.pop();
        result
    }

    /// Runs `f` with `info` as the innermost attachment scope and hands back the scope's
    /// final state.
    fn in_scope<R>(&mut self, info: AttachInfo, f: impl FnOnce(&mut Self) -> R) -> (R, AttachInfo) {
        self.target().enter_attachment_scope(info.clone());
        let result = f(self);
        let info = self.target().exit_attachment_scope().unwrap_or(info);
        (result, info)
    }

    fn report(&mut self, code: &str, span: Option<Span>, args: &[&str]) {
        let span = span.or_else(|| self.contexts.last().copied());
        self.project.report(Diagnostic::new(code, span, args));
    }

    fn report_mismatch(&mut self, code: &str, span: Span, mismatch: TypeMismatch) {
        let expected = mismatch.expected.to_string();
        let found = mismatch.found.to_string();
        self.report(code, Some(span), &[expected.as_str(), found.as_str()]);
    }

    fn expected_type(&self, operand: &Operand) -> ValueType {
        types::expected_type(
            self.project.current_target(),
            self.function.as_ref(),
            operand,
        )
    }

    fn assert_type(&mut self, ty: ValueType, operands: &[Operand]) -> Result<(), TypeMismatch> {
        let target = self.project.current_target_mut();
        types::assert_type(target, self.function.as_mut(), ty, operands)
    }

    /// `assert_type`, reporting `E11` on mismatch.
    fn expect_type(&mut self, ty: ValueType, operands: &[Operand], span: Span) -> Option<()> {
        match self.assert_type(ty, operands) {
            Ok(()) => Some(()),
            Err(mismatch) => {
                self.report_mismatch("E11", span, mismatch);
                None
            }
        }
    }

    fn hint_type(&mut self, ty: ValueType, operands: &[Operand]) {
        let target = self.project.current_target_mut();
        types::hint_type(target, self.function.as_mut(), ty, operands);
    }

    fn is_argument(&self, name: &str) -> bool {
        self.function.as_ref().is_some_and(|f| f.has_argument(name))
    }

    /// Visits `expr` and drops a non-block result into the innermost input scope.
    fn try_visit(&mut self, expr: &Expr) -> Option<Operand> {
        let before = self.project.diagnostics().len();
        let operand = self.visit_expression(expr);
        match &operand {
            Some(operand) => self.target().try_assign(operand),
            None if self.project.diagnostics().len() == before => {
                self.report("E2", Some(expr.span()), &[]);
            }
            None => {}
        }
        operand
    }

    fn visit_statement(&mut self, statement: &Statement) -> Option<()> {
        match statement {
            Statement::VariableDeclaration {
                name,
                name_span,
                value,
                ..
            } => self.visit_declaration(name, *name_span, value),
            Statement::Assignment {
                name,
                name_span,
                op,
                op_span,
                value,
                ..
            } => self.visit_assignment(name, *name_span, *op, *op_span, value),
            Statement::Return { span, value } => self.visit_return(*span, value),
            Statement::FunctionDeclaration {
                name,
                name_span,
                params,
                body,
                ..
            } => self.visit_function(name, *name_span, params, body),
            Statement::Call { span, name, args } => {
                self.visit_call(*span, name, args, true).map(|_| ())
            }
            Statement::If {
                condition,
                then_body,
                else_branch,
                ..
            } => self.visit_if(condition, then_body, else_branch.as_ref()),
            Statement::Attribute {
                name, name_span, ..
            } => self.visit_attribute(name, *name_span),
            Statement::Comment { text, .. } => {
                self.target().add_comment(text);
                Some(())
            }
        }
    }

    fn visit_block(&mut self, statements: &[Statement]) -> AttachInfo {
        let (_, info) = self.in_scope(AttachInfo::next(None), |v| {
            for statement in statements {
                v.with_context(statement.span(), |v| v.visit_statement(statement));
            }
        });
        info
    }

    fn visit_declaration(&mut self, name: &str, name_span: Span, value: &Expr) -> Option<()> {
        log::debug!("declaring variable '{}'", name);
        let declared = self.target().variable(name).is_some_and(|v| v.built);
        if declared || self.is_argument(name) {
            self.report("E3", Some(name_span), &[name]);
            return None;
        }
        let is_function = self.target().function(name).is_some()
            || self.function.as_ref().is_some_and(|f| f.name() == name);
        if is_function {
            self.report("E25", Some(name_span), &[name]);
            return None;
        }

        let variable = self.target().create_variable(name, ValueType::Unresolved);
        let set = primitives::set_variable_to(self.ids(), &variable, None);
        let set = self.target().add_block(set);
        let (value_operand, _) = self.in_scope(AttachInfo::input(&set), |v| v.try_visit(value));
        let value_operand = value_operand?;

        let ty = match self.expected_type(&value_operand) {
            ValueType::Unresolved => {
                self.report("W5", Some(value.span()), &[name]);
                ValueType::String
            }
            ValueType::Void => ValueType::String,
            ty => ty,
        };
        if let Err(mismatch) = self.assert_type(ty, std::slice::from_ref(&value_operand)) {
            self.report_mismatch("E11", value.span(), mismatch);
            return None;
        }
        if let Some(variable) = self.target().variable_mut(name) {
            variable.ty = ty;
            variable.built = true;
        }
        log::debug!("variable '{}' is {}", name, ty);
        Some(())
    }

    fn visit_assignment(
        &mut self,
        name: &str,
        name_span: Span,
        op: AssignOp,
        op_span: Span,
        value: &Expr,
    ) -> Option<()> {
        log::debug!("assigning '{}' with '{:?}'", name, op);
        let Some(variable) = self.target().variable(name).filter(|v| v.built).cloned() else {
            self.report("E7", Some(name_span), &[name]);
            return None;
        };
        let reference = variable.reference();
        let set = primitives::set_variable_to(self.ids(), &reference, None);
        let set = self.target().add_block(set);

        let Some(binary) = op.binary() else {
            let (operand, _) = self.in_scope(AttachInfo::input(&set), |v| v.try_visit(value));
            let operand = operand?;
            if let Err(mismatch) = self.assert_type(variable.ty, std::slice::from_ref(&operand)) {
                let found = mismatch.found.to_string();
                let expected = variable.ty.to_string();
                self.report("E8", Some(value.span()), &[found.as_str(), expected.as_str()]);
                return None;
            }
            return Some(());
        };

        if variable.ty != ValueType::Number {
            let expected = variable.ty.to_string();
            self.report("E8", Some(op_span), &["number", expected.as_str()]);
            return None;
        }
        let current = Operand::Variable(reference);
        let ids = self.ids();
        let arithmetic = match binary {
            BinaryOp::Add => primitives::add(ids, Some(&current), None),
            BinaryOp::Subtract => primitives::subtract(ids, Some(&current), None),
            BinaryOp::Multiply => primitives::multiply(ids, Some(&current), None),
            BinaryOp::Divide => primitives::divide(ids, Some(&current), None),
            _ => primitives::modulo(ids, Some(&current), None),
        };
        let (operand, _) = self.in_scope(AttachInfo::input(&set), |v| {
            let arithmetic = v.target().add_block(arithmetic);
            v.in_scope(AttachInfo::input(&arithmetic), |v| v.try_visit(value)).0
        });
        let operand = operand?;
        self.warn_division_by_zero(binary, &operand, value.span());
        self.expect_type(ValueType::Number, &[operand], value.span())
    }

    fn warn_division_by_zero(&mut self, op: BinaryOp, divisor: &Operand, span: Span) {
        if op != BinaryOp::Divide {
            return;
        }
        if let Operand::Literal(literal) = divisor {
            if literal.is_zero() {
                self.report("W1", Some(span), &[]);
            }
        }
    }

    fn visit_return(&mut self, span: Span, value: &Expr) -> Option<()> {
        let Some(function) = self.function.as_ref() else {
            self.report("E17", Some(span), &[]);
            return None;
        };
        let function_name = function.name().to_string();
        log::debug!("return in '{}'", function_name);
        let variable = match function.return_variable() {
            Some(variable) => variable.clone(),
            None => {
                let target_name = self.project.current_target().name.clone();
                let variable_name = CustomBlock::return_variable_name(&function_name, &target_name);
                let variable = self.target().create_variable(&variable_name, ValueType::Unresolved);
                if let Some(function) = self.function.as_mut() {
                    function.set_return_variable(variable.clone());
                }
                variable
            }
        };

        let set = primitives::set_variable_to(self.ids(), &variable, None);
        let set = self.target().add_block(set);
        let (operand, _) = self.in_scope(AttachInfo::input(&set), |v| v.try_visit(value));
        let operand = operand?;

        let declared = self
            .function
            .as_ref()
            .map(CustomBlockBuilder::return_type)
            .unwrap_or_default();
        let ty = if declared.is_resolved() {
            self.expect_type(declared, std::slice::from_ref(&operand), value.span())?;
            declared
        } else {
            let ty = match self.expected_type(&operand) {
                ValueType::Unresolved | ValueType::Void => {
                    self.report("W18", Some(value.span()), &[function_name.as_str()]);
                    ValueType::String
                }
                ty => ty,
            };
            self.expect_type(ty, std::slice::from_ref(&operand), value.span())?;
            if let Some(function) = self.function.as_mut() {
                function.set_return_type(ty);
            }
            ty
        };
        if let Some(variable) = self.target().variable_mut(&variable.name) {
            variable.ty = ty;
        }

        let stop = primitives::stop(self.ids(), "this script");
        self.target().add_block(stop);
        Some(())
    }

    fn visit_function(
        &mut self,
        name: &str,
        name_span: Span,
        params: &[Param],
        body: &[Statement],
    ) -> Option<()> {
        log::debug!("defining function '{}'", name);
        if self.function.is_some() || self.branch_depth > 0 {
            self.report("E16", Some(name_span), &[]);
            return None;
        }
        if self.target().variable(name).is_some() {
            self.report("E12", Some(name_span), &[name]);
            return None;
        }
        if self.target().function(name).is_some() {
            self.report("E13", Some(name_span), &[name]);
            return None;
        }

        let mut builder = CustomBlockBuilder::new(name, self.ids());
        for param in params {
            if param.name == name {
                self.report("E14", Some(param.span), &[]);
                return None;
            }
            if self.target().variable(&param.name).is_some() {
                self.report("E15", Some(param.span), &[]);
                return None;
            }
            if !builder.add_argument(&param.name, self.ids()) {
                self.report("E23", Some(param.span), &[param.name.as_str()]);
                return None;
            }
        }

        self.function = Some(builder);
        let info = self.visit_block(body);
        let mut builder = self.function.take()?;

        for argument in builder.unresolved_arguments() {
            self.report("W19", Some(name_span), &[argument.as_str(), name]);
            let _ = builder.resolve_argument(&argument, ValueType::String, self.target());
        }
        let function = builder.build(self.target(), info.head.as_deref());
        log::debug!(
            "function '{}' registered, returns {}",
            name,
            function.return_type
        );
        self.target().add_function(function);
        Some(())
    }

    fn visit_if(
        &mut self,
        condition: &Expr,
        then_body: &[Statement],
        else_branch: Option<&ElseBranch>,
    ) -> Option<()> {
        log::debug!("visiting conditional");
        let ids = self.ids();
        let block = match else_branch {
            Some(_) => primitives::control_if_else(ids, None),
            None => primitives::control_if(ids, None),
        };
        let id = self.target().add_block(block);

        let (operand, _) = self.in_scope(AttachInfo::input(&id), |v| v.try_visit(condition));
        self.expect_type(ValueType::Boolean, &[operand?], condition.span())?;

        self.branch_depth += 1;
        let then_info = self.visit_block(then_body);
        self.attach_branch(&id, "SUBSTACK", then_info);
        if let Some(else_branch) = else_branch {
            let else_info = match else_branch {
                ElseBranch::Block(statements) => self.visit_block(statements),
                ElseBranch::If(statement) => self.visit_block(std::slice::from_ref(&**statement)),
            };
            self.attach_branch(&id, "SUBSTACK2", else_info);
        }
        self.branch_depth -= 1;
        self.target().set_next(&id, None);
        Some(())
    }

    fn attach_branch(&mut self, block: &str, slot: &str, info: AttachInfo) {
        if let Some(head) = &info.head {
            self.target().set_substack(block, slot, head);
        }
        if let Some(last) = &info.anchor {
            self.target().set_next(last, None);
        }
    }

    fn visit_attribute(&mut self, name: &str, span: Span) -> Option<()> {
        let target = self.project.current_target();
        let late = target.has_content() || target.entry_point().is_some();
        if late || self.function.is_some() || self.branch_depth > 0 {
            self.report("E4", Some(span), &[]);
            return None;
        }
        match name {
            "stage" => {
                self.project.set_current_target("Stage");
            }
            "ignore_errors" => {
                self.project.set_ignore_errors(true);
                self.report("W24", Some(span), &[]);
            }
            _ => {
                self.report("E20", Some(span), &[name]);
                return None;
            }
        }
        log::debug!("attribute '{}' applied", name);
        Some(())
    }

    /// Emits a call to a user function. As a statement the call is sequenced normally; as an
    /// expression it runs just before the current statement and yields its return variable.
    fn visit_call(&mut self, span: Span, name: &str, args: &[Expr], statement: bool) -> Option<Operand> {
        let Some(callee) = self.target().function(name).cloned() else {
            self.report("E21", Some(span), &[name]);
            return None;
        };
        if callee.arguments.len() != args.len() {
            let expected = callee.arguments.len().to_string();
            let given = args.len().to_string();
            self.report("E22", Some(span), &[name, expected.as_str(), given.as_str()]);
            return None;
        }
        if !statement && callee.return_type == ValueType::Void {
            self.report("E11", Some(span), &["value", "void"]);
            return None;
        }
        log::debug!("calling '{}'", name);

        let call = callee.call_block(self.ids());
        let call = if statement {
            self.target().add_block(call)
        } else {
            self.target().register(call)
        };
        let (values, _) = self.in_scope(AttachInfo::input(&call), |v| {
            args.iter().map(|arg| v.try_visit(arg)).collect::<Option<Vec<_>>>()
        });
        let values = values?;
        for ((value, (_, ty)), arg) in values.iter().zip(callee.arguments.values()).zip(args) {
            self.expect_type(*ty, std::slice::from_ref(value), arg.span())?;
        }

        if !statement {
            match self.target().current_statement() {
                Some(current) => self.target().insert_before(&current, &call),
                None => {
                    let (x, y) = self.target().next_script_position();
                    if let Some(block) = self.target().block_mut(&call) {
                        block.top_level = true;
                        block.x = Some(x);
                        block.y = Some(y);
                    }
                }
            }
        }
        Some(Operand::Call(CallResult {
            function: name.to_string(),
            variable: callee.return_variable.clone(),
        }))
    }

    fn visit_expression(&mut self, expr: &Expr) -> Option<Operand> {
        match expr {
            Expr::Constant { value, .. } => Some(Operand::Literal(match value {
                Constant::Number(n) => Literal::Number(*n),
                Constant::String(s) => Literal::Text(s.clone()),
                Constant::Boolean(b) => Literal::Bool(*b),
                Constant::Color(c) => Literal::Color(c.clone()),
            })),
            Expr::Identifier { span, name } => self.visit_identifier(*span, name),
            Expr::Paren { inner, .. } => self.visit_expression(inner),
            Expr::Unary {
                op,
                op_span,
                operand,
                ..
            } => self.visit_unary(*op, *op_span, operand),
            Expr::Binary {
                op,
                op_span,
                left,
                right,
                ..
            } => self.visit_binary(*op, *op_span, left, right),
            Expr::Call { span, name, args } => self.visit_call(*span, name, args, false),
        }
    }

    fn visit_identifier(&mut self, span: Span, name: &str) -> Option<Operand> {
        if let Some(variable) = self.project.current_target().variable(name).filter(|v| v.built) {
            return Some(Operand::Variable(variable.reference()));
        }
        if self.is_argument(name) {
            let ids = self.project.current_target_mut().ids_mut();
            let reporter = self.function.as_ref()?.reporter(name, ids)?;
            let id = self.target().add_block(reporter);
            if let Some(function) = self.function.as_mut() {
                function.track_reporter(name, &id);
            }
            return Some(Operand::Block(id));
        }
        self.report("E9", Some(span), &[name]);
        None
    }

    fn visit_unary(&mut self, op: UnaryOp, op_span: Span, operand: &Expr) -> Option<Operand> {
        if op == UnaryOp::Not {
            let not = primitives::not(self.ids(), None);
            let not = self.target().add_block(not);
            let (value, _) = self.in_scope(AttachInfo::input(&not), |v| v.try_visit(operand));
            self.expect_type(ValueType::Boolean, &[value?], op_span)?;
            return Some(Operand::Block(not));
        }

        let sign = Operand::Literal(Literal::Text(op.symbol().to_string()));
        let join = primitives::join(self.ids(), Some(&sign), None);
        let join = self.target().add_block(join);
        let (value, _) = self.in_scope(AttachInfo::input(&join).starting_at(1), |v| {
            v.try_visit(operand)
        });
        self.expect_type(ValueType::Number, &[value?], operand.span())?;
        if let Some(block) = self.target().block_mut(&join) {
            block.inferred = ValueType::Number;
        }
        Some(Operand::Block(join))
    }

    /// Visits both operands into the free slots of `anchor`, left first.
    fn visit_operands(&mut self, anchor: &str, left: &Expr, right: &Expr) -> Option<(Operand, Operand)> {
        let (operands, _) = self.in_scope(AttachInfo::input(anchor), |v| {
            let left = v.try_visit(left)?;
            let right = v.try_visit(right)?;
            Some((left, right))
        });
        operands
    }

    fn visit_binary(&mut self, op: BinaryOp, op_span: Span, left: &Expr, right: &Expr) -> Option<Operand> {
        match op {
            BinaryOp::NotEquals => return self.visit_not_equals(left, right),
            BinaryOp::GreaterOrEqual | BinaryOp::LessOrEqual => {
                return self.visit_inclusive_comparison(op, left, right)
            }
            _ => {}
        }

        let ids = self.ids();
        let block = match op {
            BinaryOp::Add => primitives::add(ids, None, None),
            BinaryOp::Subtract => primitives::subtract(ids, None, None),
            BinaryOp::Multiply => primitives::multiply(ids, None, None),
            BinaryOp::Divide => primitives::divide(ids, None, None),
            BinaryOp::Modulo => primitives::modulo(ids, None, None),
            BinaryOp::Equals => primitives::equals(ids, None, None),
            BinaryOp::LessThan => primitives::less_than(ids, None, None),
            BinaryOp::GreaterThan => primitives::greater_than(ids, None, None),
            BinaryOp::And => primitives::and(ids, None, None),
            _ => primitives::or(ids, None, None),
        };
        let id = self.target().add_block(block);
        let (l, r) = self.visit_operands(&id, left, right)?;

        if op.is_arithmetic() {
            self.warn_division_by_zero(op, &r, right.span());
            self.expect_type(ValueType::Number, &[l, r], op_span)?;
        } else if matches!(op, BinaryOp::And | BinaryOp::Or) {
            self.expect_type(ValueType::Boolean, &[l, r], op_span)?;
        } else if op == BinaryOp::Equals {
            self.hint_equal(&l, &r);
        } else {
            self.hint_type(ValueType::Number, &[l, r]);
        }
        Some(Operand::Block(id))
    }

    fn hint_equal(&mut self, left: &Operand, right: &Operand) {
        let left_type = self.expected_type(left);
        let right_type = self.expected_type(right);
        self.hint_type(right_type, std::slice::from_ref(left));
        self.hint_type(left_type, std::slice::from_ref(right));
    }

    fn visit_not_equals(&mut self, left: &Expr, right: &Expr) -> Option<Operand> {
        let equals = primitives::equals(self.ids(), None, None);
        let equals = self.target().register(equals);
        let not = primitives::not(self.ids(), Some(&Operand::Block(equals.clone())));
        let not = self.target().add_block(not);
        let (l, r) = self.visit_operands(&equals, left, right)?;
        self.hint_equal(&l, &r);
        Some(Operand::Block(not))
    }

    /// `a >= b` as `(a > b) or (a = b)`, the equals block mirroring the comparison's slots.
    fn visit_inclusive_comparison(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Option<Operand> {
        let ids = self.ids();
        let primary = if op == BinaryOp::GreaterOrEqual {
            primitives::greater_than(ids, None, None)
        } else {
            primitives::less_than(ids, None, None)
        };
        let primary = self.target().register(primary);
        let equals = primitives::equals(self.ids(), None, None);
        let equals = self.target().register(equals);
        let or = primitives::or(
            self.ids(),
            Some(&Operand::Block(primary.clone())),
            Some(&Operand::Block(equals.clone())),
        );
        let or = self.target().add_block(or);

        let (l, r) = self.visit_operands(&primary, left, right)?;
        self.hint_type(ValueType::Number, &[l, r]);
        self.mirror_slots(&primary, &equals);
        Some(Operand::Block(or))
    }

    fn mirror_slots(&mut self, source: &str, mirror: &str) {
        let Some(inputs) = self.target().block(source).map(|b| b.inputs.clone()) else {
            return;
        };
        for (slot, input) in inputs {
            let value = match input.block_id() {
                Some(child) => {
                    let copies = self.target().duplicate_subtree(child, mirror);
                    self.track_copied_reporters(&copies);
                    match copies.first() {
                        Some(root) => SlotValue::Block(root.clone()),
                        None => continue,
                    }
                }
                None => input.value.clone(),
            };
            self.target().fill_slot(mirror, &slot, value);
        }
    }

    fn track_copied_reporters(&mut self, copies: &[String]) {
        for id in copies {
            let argument = self.project.current_target().block(id).and_then(|b| b.argument.clone());
            if let (Some(argument), Some(function)) = (argument, self.function.as_mut()) {
                function.track_reporter(&argument, id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn compile(source: &str) -> ProjectCompiler {
        let tokens = Lexer::new(source).tokenize().unwrap();
        let program = Parser::new(tokens).parse_program().unwrap();
        let mut project = ProjectCompiler::new("Sprite1");
        Visitor::new(&mut project).visit_program(&program);
        project
    }

    fn codes(project: &ProjectCompiler) -> Vec<String> {
        project.diagnostics().iter().map(|d| d.code.clone()).collect()
    }

    fn find<'p>(project: &'p ProjectCompiler, opcode: &str) -> Vec<&'p crate::block::Block> {
        project
            .current_target()
            .blocks()
            .values()
            .filter(|b| b.opcode == opcode)
            .collect()
    }

    #[test]
    fn test_declaration_and_assignment() {
        let project = compile("let x = 5\nx = 6\n");
        assert!(project.success(), "{:?}", codes(&project));
        assert_eq!(find(&project, "data_setvariableto").len(), 2);
        assert_eq!(
            project.current_target().variable("x").unwrap().ty,
            ValueType::Number
        );
    }

    #[test]
    fn test_assignment_to_unknown_variable() {
        let project = compile("y = 1\n");
        assert_eq!(codes(&project), vec!["E7"]);
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let project = compile("let x = 1\nx = \"hi\"\n");
        assert_eq!(codes(&project), vec!["E8"]);
        assert!(project.diagnostics()[0].message.contains("\"string\""));
    }

    #[test]
    fn test_compound_assignment_wraps_arithmetic() {
        let project = compile("let x = 1\nx += 2\n");
        assert!(project.success(), "{:?}", codes(&project));
        let add = find(&project, "operator_add");
        assert_eq!(add.len(), 1);
        let value = serde_json::to_value(add[0]).unwrap();
        let var_id = &project.current_target().variable("x").unwrap().id;
        assert_eq!(value["inputs"]["NUM1"][1], serde_json::json!([12, "x", var_id]));
        assert_eq!(value["inputs"]["NUM2"], serde_json::json!([1, [4, "2"]]));
    }

    #[test]
    fn test_compound_assignment_on_string_variable() {
        let project = compile("let s = \"a\"\ns -= 1\n");
        assert_eq!(codes(&project), vec!["E8"]);
    }

    #[test]
    fn test_division_by_literal_zero_warns() {
        let project = compile("let x = 4 / 0\n");
        assert_eq!(codes(&project), vec!["W1"]);
        assert!(project.success());
    }

    #[test]
    fn test_unknown_identifier() {
        let project = compile("let x = y + 1\n");
        assert_eq!(codes(&project), vec!["E9"]);
    }

    #[test]
    fn test_return_outside_function() {
        let project = compile("return 1\n");
        assert_eq!(codes(&project), vec!["E17"]);
    }

    #[test]
    fn test_nested_function_rejected() {
        let project = compile("function f() {\n function g() {\n }\n}\n");
        assert!(codes(&project).contains(&"E16".to_string()));
    }

    #[test]
    fn test_function_name_conflicts() {
        let project = compile("let f = 1\nfunction f() {\n}\n");
        assert_eq!(codes(&project), vec!["E12"]);
        let project = compile("function f() {\n}\nfunction f() {\n}\n");
        assert_eq!(codes(&project), vec!["E13"]);
        let project = compile("let v = 1\nfunction f(v) {\n}\n");
        assert_eq!(codes(&project), vec!["E15"]);
        let project = compile("function f(f) {\n}\n");
        assert_eq!(codes(&project), vec!["E14"]);
        let project = compile("function f(a, a) {\n}\n");
        assert_eq!(codes(&project), vec!["E23"]);
    }

    #[test]
    fn test_unused_argument_defaults_to_string() {
        let project = compile("function f(a) {\n}\n");
        assert_eq!(codes(&project), vec!["W19"]);
        let function = project.current_target().function("f").unwrap();
        assert_eq!(function.arguments["a"].1, ValueType::String);
    }

    #[test]
    fn test_call_checks() {
        let project = compile("g()\n");
        assert_eq!(codes(&project), vec!["E21"]);
        let project = compile("function f(a) {\n let b = a * 2\n}\nf(1, 2)\n");
        assert_eq!(codes(&project), vec!["E22"]);
        let project = compile("function f(a) {\n let b = a * 2\n}\nf(true)\n");
        assert_eq!(codes(&project), vec!["E11"]);
    }

    #[test]
    fn test_call_statement_is_sequenced() {
        let project = compile("function f() {\n}\nf()\n");
        assert!(project.success(), "{:?}", codes(&project));
        let target = project.current_target();
        let hat = target.entry_point().unwrap();
        let call = find(&project, "procedures_call")[0];
        assert_eq!(target.block(hat).unwrap().next.as_deref(), Some(call.id.as_str()));
    }

    #[test]
    fn test_attributes() {
        let project = compile("@stage\nlet x = 1\n");
        assert!(project.success());
        assert!(project.current_target().is_stage);
        assert!(project.current_target().variable("x").is_some());

        let project = compile("let x = 1\n@stage\n");
        assert_eq!(codes(&project), vec!["E4"]);

        let project = compile("@warp\n");
        assert_eq!(codes(&project), vec!["E20"]);
    }

    #[test]
    fn test_ignore_errors_allows_packaging() {
        let project = compile("@ignore_errors\ny = 1\n");
        assert_eq!(codes(&project), vec!["W24", "E7"]);
        assert!(!project.success());
        assert!(project.can_package());
    }

    #[test]
    fn test_comment_becomes_target_comment() {
        let project = compile("// hello\nlet x = 1\n");
        let comments = project.current_target().comments();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments.values().next().unwrap().text, "hello");
    }

    #[test]
    fn test_unary_minus_is_join() {
        let project = compile("let x = -5\n");
        assert!(project.success(), "{:?}", codes(&project));
        let join = find(&project, "operator_join");
        assert_eq!(join.len(), 1);
        let value = serde_json::to_value(join[0]).unwrap();
        assert_eq!(value["inputs"]["STRING1"], serde_json::json!([1, [10, "-"]]));
        assert_eq!(value["inputs"]["STRING2"], serde_json::json!([1, [4, "5"]]));
        assert_eq!(
            project.current_target().variable("x").unwrap().ty,
            ValueType::Number
        );
    }

    #[test]
    fn test_not_equals_wraps_equals() {
        let project = compile("let b = 1 != 2\n");
        assert!(project.success(), "{:?}", codes(&project));
        let not = find(&project, "operator_not")[0];
        let equals = find(&project, "operator_equals")[0];
        assert_eq!(not.input_block("OPERAND"), Some(equals.id.as_str()));
        assert_eq!(equals.parent.as_deref(), Some(not.id.as_str()));
        assert_eq!(
            project.current_target().variable("b").unwrap().ty,
            ValueType::Boolean
        );
    }

    #[test]
    fn test_logical_operands_must_be_boolean() {
        let project = compile("let b = true && 1\n");
        assert_eq!(codes(&project), vec!["E11"]);
    }

    #[test]
    fn test_failed_condition_skips_branches() {
        let project = compile("if 1 {\n y = 1\n} else {\n z = 2\n}\n");
        assert_eq!(codes(&project), vec!["E11"]);
        assert!(find(&project, "data_setvariableto").is_empty());
    }

    #[test]
    fn test_call_expression_runs_before_statement() {
        let project = compile("function f() {\n return 3\n}\nlet y = f() + 1\n");
        assert!(project.success(), "{:?}", codes(&project));
        let target = project.current_target();
        let hat = target.block(target.entry_point().unwrap()).unwrap();
        let call = find(&project, "procedures_call")[0];
        assert_eq!(hat.next.as_deref(), Some(call.id.as_str()));
        let set = target.block(call.next.as_deref().unwrap()).unwrap();
        assert_eq!(set.opcode, "data_setvariableto");
        assert_eq!(set.fields["VARIABLE"].value, "y");
        let add = target.block(set.input_block("VALUE").unwrap()).unwrap();
        let value = serde_json::to_value(add).unwrap();
        assert_eq!(value["inputs"]["NUM1"][1][1], "f_Sprite1_ReturnValue");
    }

    #[test]
    fn test_return_emits_stop() {
        let project = compile("function f() {\n return \"a\"\n}\n");
        assert!(project.success(), "{:?}", codes(&project));
        let function = project.current_target().function("f").unwrap();
        assert_eq!(function.return_type, ValueType::String);
        let target = project.current_target();
        let definition = target.block(&function.definition).unwrap();
        let set = target.block(definition.next.as_deref().unwrap()).unwrap();
        assert_eq!(set.opcode, "data_setvariableto");
        let stop = target.block(set.next.as_deref().unwrap()).unwrap();
        assert_eq!(stop.opcode, "control_stop");
    }

    #[test]
    fn test_conflicting_returns() {
        let project = compile("function f() {\n return 1\n return true\n}\n");
        assert_eq!(codes(&project), vec!["E11"]);
    }

    #[test]
    fn test_untyped_return_warns() {
        let project = compile("function f(a) {\n return a\n}\n");
        assert_eq!(codes(&project), vec!["W18"]);
        let function = project.current_target().function("f").unwrap();
        assert_eq!(function.arguments["a"].1, ValueType::String);
        assert_eq!(function.return_type, ValueType::String);
    }
}
