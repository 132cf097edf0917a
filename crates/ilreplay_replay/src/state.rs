//! Reference IR builder.
//!
//! [`ReferenceBuilder`] implements [`IlBuilderApi`] in memory. It checks the
//! handles it is given, keeps the method shape and records every IL-emitting
//! call as an [`Op`], so a replay can be inspected, fingerprinted and diffed
//! without a real compiler behind it. Handles are issued densely in call
//! order, which makes two replays of the same log produce equal methods.

use crate::api::{
    BinaryOp, BuilderRef, ForLoopArgs, FunctionSignature, IlBuilderApi, LoopExits, TypeRef,
    ValueRef,
};
use ilreplay_core::{BuilderError, DataType, Digest, DigestError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Entry in the type dictionary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeNode {
    /// A primitive type
    Primitive(DataType),
    /// Pointer to another dictionary entry
    Pointer(TypeRef),
}

/// What a builder is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuilderKind {
    /// The method builder itself
    Method,
    /// A sub-builder
    Il,
}

/// A builder the method owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderNode {
    /// Kind
    pub kind: BuilderKind,
    /// Builder whose statement created this one
    pub created_by: Option<BuilderRef>,
    /// Builder this one was appended to, if any
    pub appended_to: Option<BuilderRef>,
}

/// A named parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Name
    pub name: String,
    /// Element type
    pub ty: TypeRef,
    /// Passed as an array
    pub array: bool,
}

/// A named local
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Local {
    /// Name
    pub name: String,
    /// Declared type; `None` when the local came into being through a store
    pub ty: Option<TypeRef>,
}

/// Where a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueNode {
    /// Builder the producing op was emitted into
    pub builder: BuilderRef,
    /// Index of the producing op
    pub op: usize,
}

/// Operand or result of an [`Op`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operand {
    /// IL value
    Value(ValueRef),
    /// IL type
    Type(TypeRef),
    /// Builder
    Builder(BuilderRef),
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// Name or other text
    Text(String),
    /// Address literal
    Address(u64),
    /// Boolean flag
    Flag(bool),
    /// Element or argument count
    Count(usize),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => write!(f, "{}", v),
            Self::Type(t) => write!(f, "{}", t),
            Self::Builder(b) => write!(f, "{}", b),
            Self::Int(n) => write!(f, "{}", n),
            Self::Float(x) => write!(f, "{:?}", x),
            Self::Text(s) => write!(f, "{:?}", s),
            Self::Address(a) => write!(f, "{{0x{:x}}}", a),
            Self::Flag(b) => write!(f, "{}", b),
            Self::Count(n) => write!(f, "#{}", n),
        }
    }
}

/// One recorded IL-emitting call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    /// Builder the call was made on
    pub builder: BuilderRef,
    /// Operation name
    pub name: String,
    /// Inputs in call order
    pub operands: Vec<Operand>,
    /// Objects the call produced
    pub results: Vec<Operand>,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.builder)?;
        if !self.results.is_empty() {
            write_list(f, &self.results)?;
            f.write_str(" = ")?;
        }
        f.write_str(&self.name)?;
        if !self.operands.is_empty() {
            f.write_str(" ")?;
            write_list(f, &self.operands)?;
        }
        Ok(())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, operands: &[Operand]) -> fmt::Result {
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", operand)?;
    }
    Ok(())
}

/// The method as rebuilt by a replay
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconstructedMethod {
    /// Method name
    pub name: Option<String>,
    /// Source file
    pub file: Option<String>,
    /// Source line
    pub line: Option<String>,
    /// Return type
    pub return_type: Option<TypeRef>,
    /// Parameters in declaration order
    pub parameters: Vec<Parameter>,
    /// Locals in declaration order
    pub locals: Vec<Local>,
    /// Callable functions
    pub functions: Vec<FunctionSignature>,
    /// Interned type dictionary, indexed by [`TypeRef`]
    pub types: Vec<TypeNode>,
    /// Builders, indexed by [`BuilderRef`]
    pub builders: Vec<BuilderNode>,
    /// Values, indexed by [`ValueRef`]
    pub values: Vec<ValueNode>,
    /// IL-emitting calls in order
    pub ops: Vec<Op>,
    /// `AllLocalsHaveBeenDefined` was seen
    pub locals_complete: bool,
}

impl ReconstructedMethod {
    /// Op that produced `v`
    #[must_use]
    pub fn producer(&self, v: ValueRef) -> Option<&Op> {
        self.values
            .get(v.index() as usize)
            .and_then(|node| self.ops.get(node.op))
    }

    /// Primitive type behind `t`, if it is one
    #[must_use]
    pub fn type_of(&self, t: TypeRef) -> Option<DataType> {
        match self.types.get(t.index() as usize)? {
            TypeNode::Primitive(dt) => Some(*dt),
            TypeNode::Pointer(_) => None,
        }
    }

    /// Ops emitted into one builder, in order
    pub fn ops_in(&self, b: BuilderRef) -> impl Iterator<Item = &Op> {
        self.ops.iter().filter(move |op| op.builder == b)
    }

    /// Declared function by name
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionSignature> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Whether `name` can be loaded
    #[must_use]
    pub fn has_variable(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name) || self.locals.iter().any(|l| l.name == name)
    }

    /// Fingerprint of the whole method
    ///
    /// # Errors
    ///
    /// Returns error if the method cannot be encoded
    pub fn fingerprint(&self) -> Result<Digest, DigestError> {
        Digest::of(self)
    }
}

/// In-memory [`IlBuilderApi`] implementation
#[derive(Debug, Clone)]
pub struct ReferenceBuilder {
    method: ReconstructedMethod,
}

impl ReferenceBuilder {
    /// Create with a single, empty method builder
    #[must_use]
    pub fn new() -> Self {
        let mut method = ReconstructedMethod::default();
        method.builders.push(BuilderNode {
            kind: BuilderKind::Method,
            created_by: None,
            appended_to: None,
        });
        Self { method }
    }

    /// The method built so far
    #[must_use]
    pub const fn method(&self) -> &ReconstructedMethod {
        &self.method
    }

    /// Take the finished method
    #[must_use]
    pub fn into_method(self) -> ReconstructedMethod {
        self.method
    }

    /// Fingerprint of the method built so far
    ///
    /// # Errors
    ///
    /// Returns error if the method cannot be encoded
    pub fn fingerprint(&self) -> Result<Digest, DigestError> {
        self.method.fingerprint()
    }

    /// Number of recorded ops
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.method.ops.len()
    }

    /// Number of builders, the method builder included
    #[must_use]
    pub fn builder_count(&self) -> usize {
        self.method.builders.len()
    }

    /// Number of values issued
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.method.values.len()
    }

    /// Number of distinct types
    #[must_use]
    pub fn type_count(&self) -> usize {
        self.method.types.len()
    }

    // handle checks

    fn builder(&self, b: BuilderRef) -> Result<&BuilderNode, BuilderError> {
        self.method
            .builders
            .get(b.index() as usize)
            .ok_or_else(|| unknown(BuilderRef::KIND, b.index()))
    }

    fn check_method(&self, operation: &str, mb: BuilderRef) -> Result<(), BuilderError> {
        match self.builder(mb)?.kind {
            BuilderKind::Method => Ok(()),
            BuilderKind::Il => Err(BuilderError::rejected(
                operation,
                format!("{} is not a method builder", mb),
            )),
        }
    }

    fn check_value(&self, v: ValueRef) -> Result<(), BuilderError> {
        if (v.index() as usize) < self.method.values.len() {
            Ok(())
        } else {
            Err(unknown(ValueRef::KIND, v.index()))
        }
    }

    fn check_type(&self, t: TypeRef) -> Result<(), BuilderError> {
        if (t.index() as usize) < self.method.types.len() {
            Ok(())
        } else {
            Err(unknown(TypeRef::KIND, t.index()))
        }
    }

    fn check_values(&self, values: &[ValueRef]) -> Result<(), BuilderError> {
        values.iter().try_for_each(|v| self.check_value(*v))
    }

    // recording

    fn intern(&mut self, node: TypeNode) -> TypeRef {
        let index = match self.method.types.iter().position(|t| *t == node) {
            Some(index) => index,
            None => {
                self.method.types.push(node);
                self.method.types.len() - 1
            }
        };
        TypeRef::new(to_index(index))
    }

    fn new_builder(&mut self, created_by: BuilderRef) -> BuilderRef {
        self.method.builders.push(BuilderNode {
            kind: BuilderKind::Il,
            created_by: Some(created_by),
            appended_to: None,
        });
        BuilderRef::new(to_index(self.method.builders.len() - 1))
    }

    fn emit(&mut self, b: BuilderRef, name: &str, operands: Vec<Operand>, results: Vec<Operand>) {
        self.method.ops.push(Op {
            builder: b,
            name: name.to_string(),
            operands,
            results,
        });
    }

    /// Record an op that yields one new value
    fn emit_value(
        &mut self,
        b: BuilderRef,
        name: &str,
        operands: Vec<Operand>,
    ) -> Result<ValueRef, BuilderError> {
        self.builder(b)?;
        let v = ValueRef::new(to_index(self.method.values.len()));
        self.method.values.push(ValueNode {
            builder: b,
            op: self.method.ops.len(),
        });
        self.emit(b, name, operands, vec![Operand::Value(v)]);
        Ok(v)
    }

    fn emit_void(
        &mut self,
        b: BuilderRef,
        name: &str,
        operands: Vec<Operand>,
    ) -> Result<(), BuilderError> {
        self.builder(b)?;
        self.emit(b, name, operands, Vec::new());
        Ok(())
    }

    fn add_local(&mut self, name: &str, ty: Option<TypeRef>) {
        self.method.locals.push(Local {
            name: name.to_string(),
            ty,
        });
    }

    fn return_type_of(&self, name: &str) -> Option<Option<TypeRef>> {
        if let Some(function) = self.method.function(name) {
            return Some(Some(function.return_type));
        }
        (self.method.name.as_deref() == Some(name)).then_some(self.method.return_type)
    }

    fn returns_value(&self, ty: Option<TypeRef>) -> bool {
        match ty {
            Some(t) => self.method.type_of(t) != Some(DataType::NoType),
            None => false,
        }
    }
}

impl Default for ReferenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn to_index(n: usize) -> u32 {
    n as u32
}

fn unknown(kind: &str, handle: u32) -> BuilderError {
    BuilderError::UnknownHandle {
        kind: kind.to_string(),
        handle,
    }
}

impl IlBuilderApi for ReferenceBuilder {
    fn method_builder(&self) -> BuilderRef {
        BuilderRef::new(0)
    }

    fn define_line(&mut self, mb: BuilderRef, line: &str) -> Result<(), BuilderError> {
        self.check_method("DefineLine", mb)?;
        self.method.line = Some(line.to_string());
        Ok(())
    }

    fn define_file(&mut self, mb: BuilderRef, file: &str) -> Result<(), BuilderError> {
        self.check_method("DefineFile", mb)?;
        self.method.file = Some(file.to_string());
        Ok(())
    }

    fn define_name(&mut self, mb: BuilderRef, name: &str) -> Result<(), BuilderError> {
        self.check_method("DefineName", mb)?;
        self.method.name = Some(name.to_string());
        Ok(())
    }

    fn define_parameter(
        &mut self,
        mb: BuilderRef,
        name: &str,
        ty: TypeRef,
    ) -> Result<(), BuilderError> {
        self.check_method("DefineParameter", mb)?;
        self.check_type(ty)?;
        if self.method.has_variable(name) {
            return Err(BuilderError::rejected(
                "DefineParameter",
                format!("`{}` is already defined", name),
            ));
        }
        self.method.parameters.push(Parameter {
            name: name.to_string(),
            ty,
            array: false,
        });
        Ok(())
    }

    fn define_array_parameter(
        &mut self,
        mb: BuilderRef,
        name: &str,
        ty: TypeRef,
    ) -> Result<(), BuilderError> {
        self.check_method("DefineArrayParameter", mb)?;
        self.check_type(ty)?;
        if self.method.has_variable(name) {
            return Err(BuilderError::rejected(
                "DefineArrayParameter",
                format!("`{}` is already defined", name),
            ));
        }
        self.method.parameters.push(Parameter {
            name: name.to_string(),
            ty,
            array: true,
        });
        Ok(())
    }

    fn define_local(&mut self, b: BuilderRef, name: &str, ty: TypeRef) -> Result<(), BuilderError> {
        self.builder(b)?;
        self.check_type(ty)?;
        match self.method.locals.iter().find(|l| l.name == name) {
            Some(local) if local.ty.is_some() && local.ty != Some(ty) => Err(BuilderError::rejected(
                "DefineLocal",
                format!("`{}` redefined with a different type", name),
            )),
            Some(_) => Ok(()),
            None => {
                self.add_local(name, Some(ty));
                Ok(())
            }
        }
    }

    fn define_return_type(&mut self, mb: BuilderRef, ty: TypeRef) -> Result<(), BuilderError> {
        self.check_method("DefineReturnType", mb)?;
        self.check_type(ty)?;
        self.method.return_type = Some(ty);
        Ok(())
    }

    fn define_function(
        &mut self,
        mb: BuilderRef,
        sig: FunctionSignature,
    ) -> Result<(), BuilderError> {
        self.check_method("DefineFunction", mb)?;
        self.check_type(sig.return_type)?;
        sig.params.iter().try_for_each(|t| self.check_type(*t))?;
        if self.method.function(&sig.name).is_some() {
            return Err(BuilderError::rejected(
                "DefineFunction",
                format!("function `{}` is already defined", sig.name),
            ));
        }
        self.method.functions.push(sig);
        Ok(())
    }

    fn all_locals_have_been_defined(&mut self, mb: BuilderRef) -> Result<(), BuilderError> {
        self.check_method("AllLocalsHaveBeenDefined", mb)?;
        self.method.locals_complete = true;
        Ok(())
    }

    fn primitive_type(&mut self, b: BuilderRef, dt: DataType) -> Result<TypeRef, BuilderError> {
        self.builder(b)?;
        Ok(self.intern(TypeNode::Primitive(dt)))
    }

    fn pointer_to(&mut self, b: BuilderRef, base: TypeRef) -> Result<TypeRef, BuilderError> {
        self.builder(b)?;
        self.check_type(base)?;
        Ok(self.intern(TypeNode::Pointer(base)))
    }

    fn const_int8(&mut self, b: BuilderRef, v: i8) -> Result<ValueRef, BuilderError> {
        self.emit_value(b, "ConstInt8", vec![Operand::Int(v.into())])
    }

    fn const_int16(&mut self, b: BuilderRef, v: i16) -> Result<ValueRef, BuilderError> {
        self.emit_value(b, "ConstInt16", vec![Operand::Int(v.into())])
    }

    fn const_int32(&mut self, b: BuilderRef, v: i32) -> Result<ValueRef, BuilderError> {
        self.emit_value(b, "ConstInt32", vec![Operand::Int(v.into())])
    }

    fn const_int64(&mut self, b: BuilderRef, v: i64) -> Result<ValueRef, BuilderError> {
        self.emit_value(b, "ConstInt64", vec![Operand::Int(v)])
    }

    fn const_float(&mut self, b: BuilderRef, v: f32) -> Result<ValueRef, BuilderError> {
        self.emit_value(b, "ConstFloat", vec![Operand::Float(v.into())])
    }

    fn const_double(&mut self, b: BuilderRef, v: f64) -> Result<ValueRef, BuilderError> {
        self.emit_value(b, "ConstDouble", vec![Operand::Float(v)])
    }

    fn const_address(&mut self, b: BuilderRef, addr: u64) -> Result<ValueRef, BuilderError> {
        self.emit_value(b, "ConstAddress", vec![Operand::Address(addr)])
    }

    fn load(&mut self, b: BuilderRef, name: &str) -> Result<ValueRef, BuilderError> {
        if !self.method.has_variable(name) {
            return Err(BuilderError::rejected(
                "Load",
                format!("no such local `{}`", name),
            ));
        }
        self.emit_value(b, "Load", vec![Operand::Text(name.to_string())])
    }

    fn load_at(
        &mut self,
        b: BuilderRef,
        ty: TypeRef,
        address: ValueRef,
    ) -> Result<ValueRef, BuilderError> {
        self.check_type(ty)?;
        self.check_value(address)?;
        self.emit_value(b, "LoadAt", vec![Operand::Type(ty), Operand::Value(address)])
    }

    fn store(&mut self, b: BuilderRef, name: &str, value: ValueRef) -> Result<(), BuilderError> {
        self.builder(b)?;
        self.check_value(value)?;
        if !self.method.has_variable(name) {
            self.add_local(name, None);
        }
        self.emit_void(
            b,
            "Store",
            vec![Operand::Text(name.to_string()), Operand::Value(value)],
        )
    }

    fn store_at(
        &mut self,
        b: BuilderRef,
        address: ValueRef,
        value: ValueRef,
    ) -> Result<(), BuilderError> {
        self.check_values(&[address, value])?;
        self.emit_void(b, "StoreAt", vec![Operand::Value(address), Operand::Value(value)])
    }

    fn index_at(
        &mut self,
        b: BuilderRef,
        ty: TypeRef,
        base: ValueRef,
        index: ValueRef,
    ) -> Result<ValueRef, BuilderError> {
        self.check_type(ty)?;
        self.check_values(&[base, index])?;
        self.emit_value(
            b,
            "IndexAt",
            vec![Operand::Type(ty), Operand::Value(base), Operand::Value(index)],
        )
    }

    fn create_local_array(
        &mut self,
        b: BuilderRef,
        count: usize,
        elem: TypeRef,
    ) -> Result<ValueRef, BuilderError> {
        self.check_type(elem)?;
        self.emit_value(
            b,
            "CreateLocalArray",
            vec![Operand::Count(count), Operand::Type(elem)],
        )
    }

    fn create_local_struct(
        &mut self,
        b: BuilderRef,
        ty: TypeRef,
    ) -> Result<ValueRef, BuilderError> {
        self.check_type(ty)?;
        self.emit_value(b, "CreateLocalStruct", vec![Operand::Type(ty)])
    }

    fn binary(
        &mut self,
        b: BuilderRef,
        op: BinaryOp,
        left: ValueRef,
        right: ValueRef,
    ) -> Result<ValueRef, BuilderError> {
        self.check_values(&[left, right])?;
        self.emit_value(b, op.name(), vec![Operand::Value(left), Operand::Value(right)])
    }

    fn negate(&mut self, b: BuilderRef, v: ValueRef) -> Result<ValueRef, BuilderError> {
        self.check_value(v)?;
        self.emit_value(b, "Negate", vec![Operand::Value(v)])
    }

    fn convert_to(
        &mut self,
        b: BuilderRef,
        ty: TypeRef,
        v: ValueRef,
    ) -> Result<ValueRef, BuilderError> {
        self.check_type(ty)?;
        self.check_value(v)?;
        self.emit_value(b, "ConvertTo", vec![Operand::Type(ty), Operand::Value(v)])
    }

    fn unsigned_convert_to(
        &mut self,
        b: BuilderRef,
        ty: TypeRef,
        v: ValueRef,
    ) -> Result<ValueRef, BuilderError> {
        self.check_type(ty)?;
        self.check_value(v)?;
        self.emit_value(
            b,
            "UnsignedConvertTo",
            vec![Operand::Type(ty), Operand::Value(v)],
        )
    }

    fn orphan_builder(&mut self, b: BuilderRef) -> Result<BuilderRef, BuilderError> {
        self.builder(b)?;
        let orphan = self.new_builder(b);
        self.emit(b, "NewIlBuilder", Vec::new(), vec![Operand::Builder(orphan)]);
        Ok(orphan)
    }

    fn append_builder(&mut self, b: BuilderRef, target: BuilderRef) -> Result<(), BuilderError> {
        self.builder(b)?;
        let node = self.builder(target)?;
        if node.kind == BuilderKind::Method || target == b {
            return Err(BuilderError::rejected(
                "AppendBuilder",
                format!("{} cannot be appended to {}", target, b),
            ));
        }
        if let Some(parent) = node.appended_to {
            return Err(BuilderError::rejected(
                "AppendBuilder",
                format!("{} is already appended to {}", target, parent),
            ));
        }
        if let Some(node) = self.method.builders.get_mut(target.index() as usize) {
            node.appended_to = Some(b);
        }
        self.emit(b, "AppendBuilder", vec![Operand::Builder(target)], Vec::new());
        Ok(())
    }

    fn if_then(
        &mut self,
        b: BuilderRef,
        then_path: BuilderRef,
        cond: ValueRef,
    ) -> Result<(), BuilderError> {
        self.builder(then_path)?;
        self.check_value(cond)?;
        self.emit_void(
            b,
            "IfThen",
            vec![Operand::Builder(then_path), Operand::Value(cond)],
        )
    }

    fn if_then_else(
        &mut self,
        b: BuilderRef,
        then_path: BuilderRef,
        else_path: BuilderRef,
        cond: ValueRef,
    ) -> Result<(), BuilderError> {
        self.builder(then_path)?;
        self.builder(else_path)?;
        self.check_value(cond)?;
        self.emit_void(
            b,
            "IfThenElse",
            vec![
                Operand::Builder(then_path),
                Operand::Builder(else_path),
                Operand::Value(cond),
            ],
        )
    }

    fn if_cmp_equal_zero(
        &mut self,
        b: BuilderRef,
        target: BuilderRef,
        cond: ValueRef,
    ) -> Result<(), BuilderError> {
        self.builder(target)?;
        self.check_value(cond)?;
        self.emit_void(
            b,
            "IfCmpEqualZero",
            vec![Operand::Builder(target), Operand::Value(cond)],
        )
    }

    fn if_cmp_not_equal_zero(
        &mut self,
        b: BuilderRef,
        target: BuilderRef,
        cond: ValueRef,
    ) -> Result<(), BuilderError> {
        self.builder(target)?;
        self.check_value(cond)?;
        self.emit_void(
            b,
            "IfCmpNotEqualZero",
            vec![Operand::Builder(target), Operand::Value(cond)],
        )
    }

    fn for_loop(&mut self, b: BuilderRef, args: &ForLoopArgs) -> Result<LoopExits, BuilderError> {
        self.builder(b)?;
        self.builder(args.body)?;
        self.check_values(&[args.initial, args.limit, args.increment])?;
        if !self.method.has_variable(&args.induction_var) {
            self.add_local(&args.induction_var, None);
        }

        let exits = LoopExits {
            break_builder: args.want_break.then(|| self.new_builder(b)),
            continue_builder: args.want_continue.then(|| self.new_builder(b)),
        };
        let results = [exits.break_builder, exits.continue_builder]
            .into_iter()
            .flatten()
            .map(Operand::Builder)
            .collect();
        self.emit(
            b,
            "ForLoop",
            vec![
                Operand::Flag(args.count_up),
                Operand::Text(args.induction_var.clone()),
                Operand::Builder(args.body),
                Operand::Value(args.initial),
                Operand::Value(args.limit),
                Operand::Value(args.increment),
            ],
            results,
        );
        Ok(exits)
    }

    fn call(
        &mut self,
        b: BuilderRef,
        name: &str,
        args: &[ValueRef],
    ) -> Result<Option<ValueRef>, BuilderError> {
        self.builder(b)?;
        self.check_values(args)?;
        let return_type = self
            .return_type_of(name)
            .ok_or_else(|| BuilderError::rejected("Call", format!("undefined function `{}`", name)))?;
        if let Some(function) = self.method.function(name) {
            if function.params.len() != args.len() {
                return Err(BuilderError::rejected(
                    "Call",
                    format!(
                        "`{}` takes {} argument(s), got {}",
                        name,
                        function.params.len(),
                        args.len()
                    ),
                ));
            }
        }

        let mut operands = vec![Operand::Text(name.to_string())];
        operands.extend(args.iter().copied().map(Operand::Value));
        if self.returns_value(return_type) {
            self.emit_value(b, "Call", operands).map(Some)
        } else {
            self.emit(b, "Call", operands, Vec::new());
            Ok(None)
        }
    }

    fn return_value(&mut self, b: BuilderRef, v: ValueRef) -> Result<(), BuilderError> {
        self.check_value(v)?;
        self.emit_void(b, "ReturnValue", vec![Operand::Value(v)])
    }

    fn return_void(&mut self, b: BuilderRef) -> Result<(), BuilderError> {
        self.emit_void(b, "Return", Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32(rb: &mut ReferenceBuilder) -> TypeRef {
        let mb = rb.method_builder();
        rb.primitive_type(mb, DataType::Int32).unwrap()
    }

    #[test]
    fn test_method_shape() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        let t = int32(&mut rb);
        rb.define_name(mb, "fib").unwrap();
        rb.define_file(mb, "fib.c").unwrap();
        rb.define_line(mb, "3").unwrap();
        rb.define_parameter(mb, "n", t).unwrap();
        rb.define_return_type(mb, t).unwrap();
        rb.all_locals_have_been_defined(mb).unwrap();

        let m = rb.method();
        assert_eq!(m.name.as_deref(), Some("fib"));
        assert_eq!(m.parameters.len(), 1);
        assert_eq!(m.return_type, Some(t));
        assert!(m.locals_complete);
        assert_eq!(rb.op_count(), 0);
    }

    #[test]
    fn test_shape_needs_method_builder() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        let sub = rb.orphan_builder(mb).unwrap();
        assert!(matches!(
            rb.define_name(sub, "fib"),
            Err(BuilderError::Rejected { .. })
        ));
    }

    #[test]
    fn test_types_interned() {
        let mut rb = ReferenceBuilder::new();
        let a = int32(&mut rb);
        let b = int32(&mut rb);
        assert_eq!(a, b);
        let mb = rb.method_builder();
        let p = rb.pointer_to(mb, a).unwrap();
        assert_ne!(p, a);
        assert_eq!(rb.pointer_to(mb, a).unwrap(), p);
        assert_eq!(rb.type_count(), 2);
        assert_eq!(rb.method().type_of(p), None);
    }

    #[test]
    fn test_unknown_handles() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        assert_eq!(
            rb.negate(mb, ValueRef::new(4)),
            Err(BuilderError::UnknownHandle {
                kind: "value".to_string(),
                handle: 4
            })
        );
        assert!(rb.const_int32(BuilderRef::new(9), 1).is_err());
        assert_eq!(rb.value_count(), 0);
    }

    #[test]
    fn test_load_store() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        assert!(rb.load(mb, "x").is_err());
        let one = rb.const_int32(mb, 1).unwrap();
        rb.store(mb, "x", one).unwrap();
        let x = rb.load(mb, "x").unwrap();
        assert_eq!(rb.method().producer(x).map(|op| op.name.as_str()), Some("Load"));
        assert_eq!(rb.method().locals[0].ty, None);
    }

    #[test]
    fn test_call_return_types() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        let t = int32(&mut rb);
        let void = rb.primitive_type(mb, DataType::NoType).unwrap();
        let sig = |name: &str, ret, params| FunctionSignature {
            name: name.to_string(),
            file: "f.c".to_string(),
            line: "1".to_string(),
            entry: 0x10,
            return_type: ret,
            params,
        };
        rb.define_function(mb, sig("sq", t, vec![t])).unwrap();
        rb.define_function(mb, sig("tick", void, vec![])).unwrap();
        let one = rb.const_int32(mb, 1).unwrap();

        assert!(rb.call(mb, "sq", &[one]).unwrap().is_some());
        assert_eq!(rb.call(mb, "tick", &[]).unwrap(), None);
        assert!(rb.call(mb, "sq", &[]).is_err());
        assert!(rb.call(mb, "missing", &[]).is_err());
    }

    #[test]
    fn test_recursive_call() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        let t = int32(&mut rb);
        rb.define_name(mb, "fib").unwrap();
        rb.define_return_type(mb, t).unwrap();
        let n = rb.const_int32(mb, 5).unwrap();
        assert!(rb.call(mb, "fib", &[n]).unwrap().is_some());
    }

    #[test]
    fn test_append_once() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        let sub = rb.orphan_builder(mb).unwrap();
        rb.append_builder(mb, sub).unwrap();
        assert!(rb.append_builder(mb, sub).is_err());
        assert!(rb.append_builder(mb, mb).is_err());
        assert_eq!(rb.method().builders[1].appended_to, Some(mb));
    }

    #[test]
    fn test_for_loop_exits() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        let body = rb.orphan_builder(mb).unwrap();
        let zero = rb.const_int32(mb, 0).unwrap();
        let args = ForLoopArgs {
            count_up: true,
            induction_var: "i".to_string(),
            body,
            want_break: true,
            want_continue: false,
            initial: zero,
            limit: zero,
            increment: zero,
        };
        let exits = rb.for_loop(mb, &args).unwrap();
        assert!(exits.break_builder.is_some());
        assert_eq!(exits.continue_builder, None);
        assert_eq!(rb.builder_count(), 3);
        assert!(rb.method().has_variable("i"));
    }

    #[test]
    fn test_op_display() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        let a = rb.const_int32(mb, 1).unwrap();
        let b = rb.const_int32(mb, 2).unwrap();
        rb.binary(mb, BinaryOp::Add, a, b).unwrap();
        assert_eq!(
            rb.method().ops[2].to_string(),
            "builder0: value2 = Add value0, value1"
        );
        assert_eq!(rb.method().ops_in(mb).count(), 3);
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let build = || {
            let mut rb = ReferenceBuilder::new();
            let mb = rb.method_builder();
            let a = rb.const_double(mb, 1.5).unwrap();
            rb.return_value(mb, a).unwrap();
            rb
        };
        let first = build().fingerprint().unwrap();
        assert_eq!(first, build().fingerprint().unwrap());

        let mut other = build();
        let mb = other.method_builder();
        other.return_void(mb).unwrap();
        assert_ne!(first, other.fingerprint().unwrap());
    }

    #[test]
    fn test_method_json() {
        let mut rb = ReferenceBuilder::new();
        let mb = rb.method_builder();
        rb.define_name(mb, "fib").unwrap();
        rb.const_int64(mb, -3).unwrap();
        let json = serde_json::to_string(rb.method()).unwrap();
        let back: ReconstructedMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(&back, rb.method());
    }
}
