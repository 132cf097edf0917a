//! The builder call surface driven by replay.
//!
//! [`IlBuilderApi`] is what a real IR construction API (or the in-memory
//! [`ReferenceBuilder`](crate::state::ReferenceBuilder)) implements. Handles
//! are opaque: the implementation issues them and the replay only stores them
//! in the registry and hands them back.

use ilreplay_core::{BuilderError, DataType};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(u32);

        impl $name {
            /// Handle kind, for diagnostics
            pub const KIND: &'static str = $prefix;

            /// Create from a raw index
            #[must_use]
            pub const fn new(index: u32) -> Self {
                Self(index)
            }

            /// Raw index
            #[must_use]
            pub const fn index(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

handle_type!(
    /// Handle to a method builder or IL builder
    BuilderRef,
    "builder"
);
handle_type!(
    /// Handle to an IL value
    ValueRef,
    "value"
);
handle_type!(
    /// Handle to an IL type
    TypeRef,
    "type"
);

/// Two-operand value operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    /// `Add`
    Add,
    /// `Sub`
    Sub,
    /// `Mul`
    Mul,
    /// `Div`
    Div,
    /// `Rem`
    Rem,
    /// `And`
    And,
    /// `Or`
    Or,
    /// `Xor`
    Xor,
    /// `ShiftL`
    ShiftL,
    /// `ShiftR`
    ShiftR,
    /// `UnsignedShiftR`
    UnsignedShiftR,
    /// `EqualTo`
    EqualTo,
    /// `NotEqualTo`
    NotEqualTo,
    /// `LessThan`
    LessThan,
    /// `LessOrEqualTo`
    LessOrEqualTo,
    /// `GreaterThan`
    GreaterThan,
    /// `GreaterOrEqualTo`
    GreaterOrEqualTo,
    /// `UnsignedLessThan`
    UnsignedLessThan,
    /// `UnsignedGreaterThan`
    UnsignedGreaterThan,
}

impl BinaryOp {
    /// Every binary operation
    pub const ALL: [Self; 19] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Rem,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::ShiftL,
        Self::ShiftR,
        Self::UnsignedShiftR,
        Self::EqualTo,
        Self::NotEqualTo,
        Self::LessThan,
        Self::LessOrEqualTo,
        Self::GreaterThan,
        Self::GreaterOrEqualTo,
        Self::UnsignedLessThan,
        Self::UnsignedGreaterThan,
    ];

    /// Statement name as recorded
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Mul => "Mul",
            Self::Div => "Div",
            Self::Rem => "Rem",
            Self::And => "And",
            Self::Or => "Or",
            Self::Xor => "Xor",
            Self::ShiftL => "ShiftL",
            Self::ShiftR => "ShiftR",
            Self::UnsignedShiftR => "UnsignedShiftR",
            Self::EqualTo => "EqualTo",
            Self::NotEqualTo => "NotEqualTo",
            Self::LessThan => "LessThan",
            Self::LessOrEqualTo => "LessOrEqualTo",
            Self::GreaterThan => "GreaterThan",
            Self::GreaterOrEqualTo => "GreaterOrEqualTo",
            Self::UnsignedLessThan => "UnsignedLessThan",
            Self::UnsignedGreaterThan => "UnsignedGreaterThan",
        }
    }

    /// Look up by recorded name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }

    /// Whether the result is a boolean comparison
    #[must_use]
    pub const fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::EqualTo
                | Self::NotEqualTo
                | Self::LessThan
                | Self::LessOrEqualTo
                | Self::GreaterThan
                | Self::GreaterOrEqualTo
                | Self::UnsignedLessThan
                | Self::UnsignedGreaterThan
        )
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A function the method may call, as declared by `DefineFunction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Function name
    pub name: String,
    /// Source file it was declared in
    pub file: String,
    /// Source line, as recorded
    pub line: String,
    /// Entry point address
    pub entry: u64,
    /// Return type
    pub return_type: TypeRef,
    /// Parameter types in order
    pub params: Vec<TypeRef>,
}

/// Arguments of a counted loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForLoopArgs {
    /// Count up (`true`) or down
    pub count_up: bool,
    /// Name of the induction variable
    pub induction_var: String,
    /// Loop body
    pub body: BuilderRef,
    /// Whether the caller wants a break builder back
    pub want_break: bool,
    /// Whether the caller wants a continue builder back
    pub want_continue: bool,
    /// Initial value
    pub initial: ValueRef,
    /// Iteration limit
    pub limit: ValueRef,
    /// Step
    pub increment: ValueRef,
}

/// Exit builders generated by a loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopExits {
    /// Builder that jumps past the loop
    pub break_builder: Option<BuilderRef>,
    /// Builder that jumps to the next iteration
    pub continue_builder: Option<BuilderRef>,
}

/// IR construction API replayed against
///
/// Every operation is invoked at most once per log statement, in log order.
/// Any error aborts the replay.
pub trait IlBuilderApi {
    /// The method builder being replayed
    fn method_builder(&self) -> BuilderRef;

    // Method shape

    /// `DefineLine`
    fn define_line(&mut self, mb: BuilderRef, line: &str) -> Result<(), BuilderError>;
    /// `DefineFile`
    fn define_file(&mut self, mb: BuilderRef, file: &str) -> Result<(), BuilderError>;
    /// `DefineName`
    fn define_name(&mut self, mb: BuilderRef, name: &str) -> Result<(), BuilderError>;
    /// `DefineParameter`
    fn define_parameter(&mut self, mb: BuilderRef, name: &str, ty: TypeRef)
        -> Result<(), BuilderError>;
    /// `DefineArrayParameter`
    fn define_array_parameter(
        &mut self,
        mb: BuilderRef,
        name: &str,
        ty: TypeRef,
    ) -> Result<(), BuilderError>;
    /// `DefineLocal`; IL builders may define locals too
    fn define_local(&mut self, b: BuilderRef, name: &str, ty: TypeRef) -> Result<(), BuilderError>;
    /// `DefineReturnType`
    fn define_return_type(&mut self, mb: BuilderRef, ty: TypeRef) -> Result<(), BuilderError>;
    /// `DefineFunction`
    fn define_function(&mut self, mb: BuilderRef, sig: FunctionSignature)
        -> Result<(), BuilderError>;
    /// `AllLocalsHaveBeenDefined`
    fn all_locals_have_been_defined(&mut self, mb: BuilderRef) -> Result<(), BuilderError>;

    // Type dictionary

    /// `PrimitiveType`
    fn primitive_type(&mut self, b: BuilderRef, dt: DataType) -> Result<TypeRef, BuilderError>;
    /// `PointerType`
    fn pointer_to(&mut self, b: BuilderRef, base: TypeRef) -> Result<TypeRef, BuilderError>;

    // Constants

    /// `ConstInt8`
    fn const_int8(&mut self, b: BuilderRef, v: i8) -> Result<ValueRef, BuilderError>;
    /// `ConstInt16`
    fn const_int16(&mut self, b: BuilderRef, v: i16) -> Result<ValueRef, BuilderError>;
    /// `ConstInt32`
    fn const_int32(&mut self, b: BuilderRef, v: i32) -> Result<ValueRef, BuilderError>;
    /// `ConstInt64`
    fn const_int64(&mut self, b: BuilderRef, v: i64) -> Result<ValueRef, BuilderError>;
    /// `ConstFloat`
    fn const_float(&mut self, b: BuilderRef, v: f32) -> Result<ValueRef, BuilderError>;
    /// `ConstDouble`
    fn const_double(&mut self, b: BuilderRef, v: f64) -> Result<ValueRef, BuilderError>;
    /// `ConstAddress`
    fn const_address(&mut self, b: BuilderRef, addr: u64) -> Result<ValueRef, BuilderError>;

    // Memory

    /// `Load` of a named local or parameter
    fn load(&mut self, b: BuilderRef, name: &str) -> Result<ValueRef, BuilderError>;
    /// `LoadAt`
    fn load_at(
        &mut self,
        b: BuilderRef,
        ty: TypeRef,
        address: ValueRef,
    ) -> Result<ValueRef, BuilderError>;
    /// `Store` to a named local
    fn store(&mut self, b: BuilderRef, name: &str, value: ValueRef) -> Result<(), BuilderError>;
    /// `StoreAt`
    fn store_at(
        &mut self,
        b: BuilderRef,
        address: ValueRef,
        value: ValueRef,
    ) -> Result<(), BuilderError>;
    /// `IndexAt`
    fn index_at(
        &mut self,
        b: BuilderRef,
        ty: TypeRef,
        base: ValueRef,
        index: ValueRef,
    ) -> Result<ValueRef, BuilderError>;
    /// `CreateLocalArray`
    fn create_local_array(
        &mut self,
        b: BuilderRef,
        count: usize,
        elem: TypeRef,
    ) -> Result<ValueRef, BuilderError>;
    /// `CreateLocalStruct`
    fn create_local_struct(&mut self, b: BuilderRef, ty: TypeRef)
        -> Result<ValueRef, BuilderError>;

    // Operations

    /// Any of the [`BinaryOp`]s
    fn binary(
        &mut self,
        b: BuilderRef,
        op: BinaryOp,
        left: ValueRef,
        right: ValueRef,
    ) -> Result<ValueRef, BuilderError>;
    /// `Negate`
    fn negate(&mut self, b: BuilderRef, v: ValueRef) -> Result<ValueRef, BuilderError>;
    /// `ConvertTo`
    fn convert_to(&mut self, b: BuilderRef, ty: TypeRef, v: ValueRef)
        -> Result<ValueRef, BuilderError>;
    /// `UnsignedConvertTo`
    fn unsigned_convert_to(
        &mut self,
        b: BuilderRef,
        ty: TypeRef,
        v: ValueRef,
    ) -> Result<ValueRef, BuilderError>;

    // Control flow

    /// `NewIlBuilder`: a builder not yet attached anywhere
    fn orphan_builder(&mut self, b: BuilderRef) -> Result<BuilderRef, BuilderError>;
    /// `AppendBuilder`
    fn append_builder(&mut self, b: BuilderRef, target: BuilderRef) -> Result<(), BuilderError>;
    /// Single-branch `IfThenElse`
    fn if_then(
        &mut self,
        b: BuilderRef,
        then_path: BuilderRef,
        cond: ValueRef,
    ) -> Result<(), BuilderError>;
    /// Two-branch `IfThenElse`
    fn if_then_else(
        &mut self,
        b: BuilderRef,
        then_path: BuilderRef,
        else_path: BuilderRef,
        cond: ValueRef,
    ) -> Result<(), BuilderError>;
    /// `IfCmpEqualZero`
    fn if_cmp_equal_zero(
        &mut self,
        b: BuilderRef,
        target: BuilderRef,
        cond: ValueRef,
    ) -> Result<(), BuilderError>;
    /// `IfCmpNotEqualZero`
    fn if_cmp_not_equal_zero(
        &mut self,
        b: BuilderRef,
        target: BuilderRef,
        cond: ValueRef,
    ) -> Result<(), BuilderError>;
    /// `ForLoop`; returns the exits that were asked for
    fn for_loop(&mut self, b: BuilderRef, args: &ForLoopArgs) -> Result<LoopExits, BuilderError>;

    // Calls and returns

    /// `Call`; `None` when the callee returns nothing
    fn call(
        &mut self,
        b: BuilderRef,
        name: &str,
        args: &[ValueRef],
    ) -> Result<Option<ValueRef>, BuilderError>;
    /// `ReturnValue`
    fn return_value(&mut self, b: BuilderRef, v: ValueRef) -> Result<(), BuilderError>;
    /// `Return`
    fn return_void(&mut self, b: BuilderRef) -> Result<(), BuilderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_display() {
        assert_eq!(BuilderRef::new(0).to_string(), "builder0");
        assert_eq!(ValueRef::new(12).to_string(), "value12");
        assert_eq!(TypeRef::new(3).index(), 3);
        assert_eq!(TypeRef::KIND, "type");
    }

    #[test]
    fn test_binary_op_names() {
        for op in BinaryOp::ALL {
            assert_eq!(BinaryOp::from_name(op.name()), Some(op));
        }
        assert_eq!(BinaryOp::from_name("Negate"), None);
        assert!(BinaryOp::LessThan.is_comparison());
        assert!(!BinaryOp::ShiftL.is_comparison());
    }
}
