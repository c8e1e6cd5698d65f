//! AST to IR lowering.
//!
//! A [`LoweringSession`] owns the IR module (and with it the function
//! registry) plus the symbol table of the function currently being lowered.
//! Constructs must be lowered in source order: a construct may refer to
//! functions introduced by earlier ones, never later ones.

use std::collections::HashMap;

use crate::ast::{Construct, Expr, Function, Prototype};
use crate::error::LowerError;
use crate::ir::{FunctionBuilder, FunctionId, Module, Value};

#[derive(Debug)]
pub struct LoweringSession {
    module: Module,
    named_values: HashMap<String, Value>,
}

impl LoweringSession {
    pub fn new(module_name: impl Into<String>) -> Self {
        LoweringSession {
            module: Module::new(module_name),
            named_values: HashMap::new(),
        }
    }

    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn into_module(self) -> Module {
        self.module
    }

    /// Lower one top-level construct. Separators and end of input produce
    /// no IR.
    pub fn lower(&mut self, construct: &Construct) -> Result<Option<FunctionId>, LowerError> {
        match construct {
            Construct::Definition(function) | Construct::TopLevelExpr(function) => {
                self.lower_function(function).map(Some)
            }
            Construct::Extern(proto) => self.lower_prototype(proto).map(Some),
            Construct::Separator | Construct::EndOfInput => Ok(None),
        }
    }

    /// Declare `proto`, or reuse an existing function of the same name and
    /// arity. A differing arity is rejected rather than shadowed.
    pub fn lower_prototype(&mut self, proto: &Prototype) -> Result<FunctionId, LowerError> {
        let Some(existing) = self.module.get_function(&proto.name) else {
            return Ok(self.module.declare_function(&proto.name, &proto.params));
        };

        let expected = self
            .module
            .function(existing)
            .map_or(0, |function| function.arity());
        if expected != proto.params.len() {
            return Err(LowerError::SignatureMismatch {
                name: proto.name.clone(),
                expected,
                found: proto.params.len(),
            });
        }
        Ok(existing)
    }

    pub fn lower_function(&mut self, function: &Function) -> Result<FunctionId, LowerError> {
        let proto = &function.proto;
        let existing = self.module.get_function(&proto.name);

        if let Some(id) = existing {
            if self
                .module
                .function(id)
                .is_some_and(|existing| !existing.is_declaration())
            {
                return Err(LowerError::Redefinition(proto.name.clone()));
            }
        }

        let id = self.lower_prototype(proto)?;

        let mut builder = FunctionBuilder::new(&proto.params);
        self.named_values.clear();
        for (index, param) in proto.params.iter().enumerate() {
            self.named_values.insert(param.clone(), builder.param(index));
        }

        // A function created for this definition goes away on failure. An
        // earlier declaration is kept exactly as it was declared.
        let ret = match self.lower_expr(&function.body, &mut builder) {
            Ok(ret) => ret,
            Err(err) => {
                if existing.is_none() {
                    self.module.erase_function(id);
                }
                return Err(err);
            }
        };

        let previous = self.module.define_function(id, builder.build_ret(ret));
        if let Err(err) = self.module.verify_function(id) {
            if existing.is_some() {
                self.module.clear_body(id, previous);
            } else {
                self.module.erase_function(id);
            }
            return Err(LowerError::Verification {
                name: proto.name.clone(),
                reason: err.to_string(),
            });
        }
        Ok(id)
    }

    fn lower_expr(&self, expr: &Expr, builder: &mut FunctionBuilder) -> Result<Value, LowerError> {
        match expr {
            Expr::Number(value) => Ok(Value::Constant(*value)),
            Expr::Variable(name) => self
                .named_values
                .get(name)
                .copied()
                .ok_or_else(|| LowerError::UnknownVariable(name.clone())),
            Expr::Binary { .. } => {
                // Left-associative chains nest on the left, so walk that
                // spine with a loop and only recurse into right operands.
                let mut spine = Vec::new();
                let mut leftmost = expr;
                while let Expr::Binary { op, lhs, rhs } = leftmost {
                    spine.push((*op, rhs.as_ref()));
                    leftmost = lhs.as_ref();
                }

                let mut acc = self.lower_expr(leftmost, builder)?;
                for (op, rhs) in spine.into_iter().rev() {
                    let rhs = self.lower_expr(rhs, builder)?;
                    acc = build_binary(builder, op, acc, rhs)?;
                }
                Ok(acc)
            }
            Expr::Call { callee, args } => {
                let target = self
                    .module
                    .get_function(callee)
                    .ok_or_else(|| LowerError::UnknownFunction(callee.clone()))?;
                let expected = self
                    .module
                    .function(target)
                    .map_or(0, |function| function.arity());
                if expected != args.len() {
                    return Err(LowerError::ArityMismatch {
                        callee: callee.clone(),
                        expected,
                        found: args.len(),
                    });
                }

                let args = args
                    .iter()
                    .map(|arg| self.lower_expr(arg, builder))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(builder.build_call(target, args, "calltmp"))
            }
        }
    }
}

fn build_binary(
    builder: &mut FunctionBuilder,
    op: char,
    lhs: Value,
    rhs: Value,
) -> Result<Value, LowerError> {
    match op {
        '+' => Ok(builder.build_fadd(lhs, rhs, "addtmp")),
        '-' => Ok(builder.build_fsub(lhs, rhs, "subtmp")),
        '*' => Ok(builder.build_fmul(lhs, rhs, "multmp")),
        '<' => {
            let cmp = builder.build_fcmp_ult(lhs, rhs, "cmptmp");
            Ok(builder.build_uitofp(cmp, "booltmp"))
        }
        other => Err(LowerError::InvalidOperator(other)),
    }
}
