//! A small SSA-style IR in the shape of LLVM's, restricted to what Kaleido
//! needs: `double` functions with a single entry block.
//!
//! The module is a registry of functions keyed by name. Function bodies are
//! assembled with a [`FunctionBuilder`] that owns the instructions until they
//! are installed with [`Module::define_function`], so lowering can read the
//! module (for callee lookups) while a body is under construction.
//!
//! Printing follows LLVM's textual syntax closely enough to be read by
//! anyone familiar with `.ll` files.

use std::collections::{HashMap, HashSet};
use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Type {
    Double,
    I1,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Double => f.write_str("double"),
            Type::I1 => f.write_str("i1"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstId(usize);

/// An operand. `Param` and `Inst` are local to the function they belong to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Constant(f64),
    Bool(bool),
    Param(usize),
    Inst(InstId),
}

impl Value {
    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Value::Constant(value) => Some(*value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstKind {
    FAdd(Value, Value),
    FSub(Value, Value),
    FMul(Value, Value),
    /// Unordered or less-than.
    FCmpUlt(Value, Value),
    UIToFP(Value),
    Call { callee: FunctionId, args: Vec<Value> },
}

impl InstKind {
    fn result_type(&self) -> Type {
        match self {
            InstKind::FCmpUlt(..) => Type::I1,
            _ => Type::Double,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub name: String,
    pub kind: InstKind,
}

/// The single `entry` block of a defined function.
#[derive(Debug, Clone, PartialEq)]
pub struct Body {
    pub instructions: Vec<Instruction>,
    pub ret: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Empty for anonymous functions, which are never found by name.
    pub name: String,
    pub params: Vec<String>,
    pub body: Option<Body>,
}

impl Function {
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn is_declaration(&self) -> bool {
        self.body.is_none()
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("function does not exist")]
    NoSuchFunction,
    #[error("function has no body")]
    MissingBody,
    #[error("entry block has no terminator")]
    MissingTerminator,
    #[error("operand of '{inst}' refers to an undefined value")]
    UndefinedValue { inst: String },
    #[error("operand of '{inst}' has type {found}, expected {expected}")]
    OperandType {
        inst: String,
        expected: Type,
        found: Type,
    },
    #[error("call '{inst}' targets a function that no longer exists")]
    UnknownCallee { inst: String },
    #[error("call '{inst}' passes {found} argument(s) to a function taking {expected}")]
    CallArity {
        inst: String,
        expected: usize,
        found: usize,
    },
}

/// Accumulates the entry block of one function.
///
/// Local names are made unique the way LLVM does it: a clashing name gets
/// the first free numeric suffix (`addtmp`, `addtmp1`, ...).
#[derive(Debug)]
pub struct FunctionBuilder {
    params: Vec<String>,
    instructions: Vec<Instruction>,
    used_names: HashSet<String>,
    /// Next suffix to try for each clashing base name.
    next_suffix: HashMap<String, usize>,
}

impl FunctionBuilder {
    pub fn new(params: &[String]) -> Self {
        let mut builder = FunctionBuilder {
            params: Vec::with_capacity(params.len()),
            instructions: Vec::new(),
            used_names: HashSet::new(),
            next_suffix: HashMap::new(),
        };
        for param in params {
            let name = builder.unique_name(param);
            builder.params.push(name);
        }
        builder
    }

    fn unique_name(&mut self, base: &str) -> String {
        if self.used_names.insert(base.to_string()) {
            return base.to_string();
        }
        let suffix = self.next_suffix.entry(base.to_string()).or_insert(1);
        loop {
            let candidate = format!("{base}{suffix}");
            *suffix += 1;
            if self.used_names.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn push(&mut self, name: &str, kind: InstKind) -> Value {
        let name = self.unique_name(name);
        self.instructions.push(Instruction { name, kind });
        Value::Inst(InstId(self.instructions.len() - 1))
    }

    pub fn param(&self, index: usize) -> Value {
        Value::Param(index)
    }

    pub fn build_fadd(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        match (lhs, rhs) {
            (Value::Constant(a), Value::Constant(b)) => Value::Constant(a + b),
            _ => self.push(name, InstKind::FAdd(lhs, rhs)),
        }
    }

    pub fn build_fsub(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        match (lhs, rhs) {
            (Value::Constant(a), Value::Constant(b)) => Value::Constant(a - b),
            _ => self.push(name, InstKind::FSub(lhs, rhs)),
        }
    }

    pub fn build_fmul(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        match (lhs, rhs) {
            (Value::Constant(a), Value::Constant(b)) => Value::Constant(a * b),
            _ => self.push(name, InstKind::FMul(lhs, rhs)),
        }
    }

    pub fn build_fcmp_ult(&mut self, lhs: Value, rhs: Value, name: &str) -> Value {
        match (lhs, rhs) {
            (Value::Constant(a), Value::Constant(b)) => {
                Value::Bool(a < b || a.is_nan() || b.is_nan())
            }
            _ => self.push(name, InstKind::FCmpUlt(lhs, rhs)),
        }
    }

    pub fn build_uitofp(&mut self, value: Value, name: &str) -> Value {
        match value {
            Value::Bool(flag) => Value::Constant(if flag { 1.0 } else { 0.0 }),
            _ => self.push(name, InstKind::UIToFP(value)),
        }
    }

    pub fn build_call(&mut self, callee: FunctionId, args: Vec<Value>, name: &str) -> Value {
        self.push(name, InstKind::Call { callee, args })
    }

    /// Seal the block with `ret value`.
    pub fn build_ret(self, value: Value) -> DefinedBody {
        DefinedBody {
            params: self.params,
            body: Body {
                instructions: self.instructions,
                ret: Some(value),
            },
        }
    }
}

/// A finished body together with the (uniqued) parameter names it was
/// built against.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedBody {
    params: Vec<String>,
    body: Body,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    name: String,
    /// Slots stay in place when a function is erased so ids remain stable.
    functions: Vec<Option<Function>>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a named function. Anonymous functions are never returned.
    pub fn get_function(&self, name: &str) -> Option<FunctionId> {
        if name.is_empty() {
            return None;
        }
        self.functions().find_map(|(id, function)| (function.name == name).then_some(id))
    }

    pub fn function(&self, id: FunctionId) -> Option<&Function> {
        self.functions.get(id.0).and_then(Option::as_ref)
    }

    pub fn functions(&self) -> impl Iterator<Item = (FunctionId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|function| (FunctionId(idx), function)))
    }

    /// Add a body-less `double(double, ...)` function. Named functions must
    /// not already be present; callers check with [`Module::get_function`].
    pub fn declare_function(&mut self, name: &str, params: &[String]) -> FunctionId {
        debug_assert!(name.is_empty() || self.get_function(name).is_none());
        self.functions.push(Some(Function {
            name: name.to_string(),
            params: params.to_vec(),
            body: None,
        }));
        FunctionId(self.functions.len() - 1)
    }

    /// Install a finished body, replacing the parameter names. Returns the
    /// names it replaced so a rejected body can be undone with
    /// [`Module::clear_body`].
    pub fn define_function(&mut self, id: FunctionId, defined: DefinedBody) -> Vec<String> {
        match self.functions.get_mut(id.0) {
            Some(Some(function)) => {
                function.body = Some(defined.body);
                std::mem::replace(&mut function.params, defined.params)
            }
            _ => Vec::new(),
        }
    }

    /// Turn a definition back into a declaration with the given parameter
    /// names.
    pub fn clear_body(&mut self, id: FunctionId, params: Vec<String>) {
        if let Some(Some(function)) = self.functions.get_mut(id.0) {
            function.params = params;
            function.body = None;
        }
    }

    pub fn erase_function(&mut self, id: FunctionId) -> Option<Function> {
        self.functions.get_mut(id.0).and_then(Option::take)
    }

    fn value_type(body: &Body, value: Value) -> Option<Type> {
        match value {
            Value::Constant(_) | Value::Param(_) => Some(Type::Double),
            Value::Bool(_) => Some(Type::I1),
            Value::Inst(InstId(idx)) => body
                .instructions
                .get(idx)
                .map(|inst| inst.kind.result_type()),
        }
    }

    /// Structural checks on a defined function: every operand is defined
    /// before use and well typed, calls match their callee's arity, and the
    /// block ends in a `double` return.
    pub fn verify_function(&self, id: FunctionId) -> Result<(), VerifyError> {
        let function = self.function(id).ok_or(VerifyError::NoSuchFunction)?;
        let body = function.body.as_ref().ok_or(VerifyError::MissingBody)?;

        let check = |inst: &str, position: usize, value: Value, expected: Type| {
            let defined = match value {
                Value::Param(idx) => idx < function.params.len(),
                Value::Inst(InstId(idx)) => idx < position,
                Value::Constant(_) | Value::Bool(_) => true,
            };
            if !defined {
                return Err(VerifyError::UndefinedValue {
                    inst: inst.to_string(),
                });
            }
            match Self::value_type(body, value) {
                Some(found) if found == expected => Ok(()),
                Some(found) => Err(VerifyError::OperandType {
                    inst: inst.to_string(),
                    expected,
                    found,
                }),
                None => Err(VerifyError::UndefinedValue {
                    inst: inst.to_string(),
                }),
            }
        };

        for (position, inst) in body.instructions.iter().enumerate() {
            let name = inst.name.as_str();
            match &inst.kind {
                InstKind::FAdd(lhs, rhs)
                | InstKind::FSub(lhs, rhs)
                | InstKind::FMul(lhs, rhs)
                | InstKind::FCmpUlt(lhs, rhs) => {
                    check(name, position, *lhs, Type::Double)?;
                    check(name, position, *rhs, Type::Double)?;
                }
                InstKind::UIToFP(value) => check(name, position, *value, Type::I1)?,
                InstKind::Call { callee, args } => {
                    let target = self.function(*callee).ok_or(VerifyError::UnknownCallee {
                        inst: name.to_string(),
                    })?;
                    if target.arity() != args.len() {
                        return Err(VerifyError::CallArity {
                            inst: name.to_string(),
                            expected: target.arity(),
                            found: args.len(),
                        });
                    }
                    for arg in args {
                        check(name, position, *arg, Type::Double)?;
                    }
                }
            }
        }

        let ret = body.ret.ok_or(VerifyError::MissingTerminator)?;
        check("ret", body.instructions.len(), ret, Type::Double)
    }

    /// Printable form of a single function, with global names resolved
    /// against this module.
    pub fn display_function(&self, id: FunctionId) -> Option<FunctionDisplay<'_>> {
        self.function(id).map(|function| FunctionDisplay {
            module: self,
            id,
            function,
        })
    }

    /// LLVM numbers unnamed globals in module order.
    fn global_name(&self, id: FunctionId) -> String {
        match self.function(id) {
            Some(function) if !function.is_anonymous() => format!("@{}", function.name),
            Some(_) => {
                let slot = self
                    .functions()
                    .filter(|(_, function)| function.is_anonymous())
                    .position(|(other, _)| other == id)
                    .unwrap_or_default();
                format!("@{slot}")
            }
            None => "@<erased>".to_string(),
        }
    }
}

pub struct FunctionDisplay<'m> {
    module: &'m Module,
    id: FunctionId,
    function: &'m Function,
}

impl FunctionDisplay<'_> {
    fn operand(&self, value: Value) -> String {
        let Some(body) = &self.function.body else {
            return String::new();
        };
        match value {
            Value::Constant(value) => format_double(value),
            Value::Bool(flag) => flag.to_string(),
            Value::Param(idx) => self
                .function
                .params
                .get(idx)
                .map_or_else(|| "%<undef>".to_string(), |param| format!("%{param}")),
            Value::Inst(InstId(idx)) => body
                .instructions
                .get(idx)
                .map_or_else(|| "%<undef>".to_string(), |inst| format!("%{}", inst.name)),
        }
    }

    fn typed(&self, value: Value) -> String {
        let ty = self
            .function
            .body
            .as_ref()
            .and_then(|body| Module::value_type(body, value))
            .unwrap_or(Type::Double);
        format!("{ty} {}", self.operand(value))
    }
}

impl fmt::Display for FunctionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.module.global_name(self.id);
        let Some(body) = &self.function.body else {
            let params = vec!["double"; self.function.arity()].join(", ");
            return writeln!(f, "declare double {name}({params})");
        };

        let params = self
            .function
            .params
            .iter()
            .map(|param| format!("double %{param}"))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(f, "define double {name}({params}) {{")?;
        writeln!(f, "entry:")?;
        for inst in &body.instructions {
            write!(f, "  %{} = ", inst.name)?;
            match &inst.kind {
                InstKind::FAdd(lhs, rhs) => {
                    write!(f, "fadd double {}, {}", self.operand(*lhs), self.operand(*rhs))?
                }
                InstKind::FSub(lhs, rhs) => {
                    write!(f, "fsub double {}, {}", self.operand(*lhs), self.operand(*rhs))?
                }
                InstKind::FMul(lhs, rhs) => {
                    write!(f, "fmul double {}, {}", self.operand(*lhs), self.operand(*rhs))?
                }
                InstKind::FCmpUlt(lhs, rhs) => write!(
                    f,
                    "fcmp ult double {}, {}",
                    self.operand(*lhs),
                    self.operand(*rhs)
                )?,
                InstKind::UIToFP(value) => {
                    write!(f, "uitofp {} to double", self.typed(*value))?
                }
                InstKind::Call { callee, args } => {
                    let args = args
                        .iter()
                        .map(|arg| self.typed(*arg))
                        .collect::<Vec<_>>()
                        .join(", ");
                    write!(
                        f,
                        "call double {}({args})",
                        self.module.global_name(*callee)
                    )?
                }
            }
            writeln!(f)?;
        }
        if let Some(ret) = body.ret {
            writeln!(f, "  ret {}", self.typed(ret))?;
        }
        writeln!(f, "}}")
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; ModuleID = '{}'", self.name)?;
        writeln!(f, "source_filename = \"{}\"", self.name)?;
        for (id, _) in self.functions() {
            writeln!(f)?;
            if let Some(display) = self.display_function(id) {
                write!(f, "{display}")?;
            }
        }
        Ok(())
    }
}

/// Format a double constant the way LLVM prints it: `%e` notation when that
/// is exact, otherwise the raw bit pattern in hex.
pub fn format_double(value: f64) -> String {
    if value.is_finite() {
        let rendered = format!("{value:.6e}");
        if let Some((mantissa, exponent)) = rendered.split_once('e') {
            if let Ok(exponent) = exponent.parse::<i32>() {
                let sign = if exponent < 0 { '-' } else { '+' };
                let text = format!("{mantissa}e{sign}{:02}", exponent.abs());
                if text.parse::<f64>().is_ok_and(|parsed| parsed.to_bits() == value.to_bits()) {
                    return text;
                }
            }
        }
    }
    format!("0x{:016X}", value.to_bits())
}
