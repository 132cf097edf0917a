//! Statement names and the phases they may appear in.

use crate::api::BinaryOp;
use ilreplay_core::Phase;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every statement the replay understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    /// `NewMethodBuilder`
    NewMethodBuilder,
    /// `DefineLine`
    DefineLine,
    /// `DefineFile`
    DefineFile,
    /// `DefineName`
    DefineName,
    /// `DefineParameter`
    DefineParameter,
    /// `DefineArrayParameter`
    DefineArrayParameter,
    /// `DefineLocal`
    DefineLocal,
    /// `PrimitiveType`
    PrimitiveType,
    /// `PointerType`
    PointerType,
    /// `DefineReturnType`
    DefineReturnType,
    /// `DefineFunction`
    DefineFunction,
    /// `AllLocalsHaveBeenDefined`
    AllLocalsHaveBeenDefined,
    /// `DoneConstructor` sentinel
    DoneConstructor,
    /// `ConstInt8`
    ConstInt8,
    /// `ConstInt16`
    ConstInt16,
    /// `ConstInt32`
    ConstInt32,
    /// `ConstInt64`
    ConstInt64,
    /// `ConstFloat`
    ConstFloat,
    /// `ConstDouble`
    ConstDouble,
    /// `ConstAddress`
    ConstAddress,
    /// `Load`
    Load,
    /// `LoadAt`
    LoadAt,
    /// `Store`
    Store,
    /// `StoreAt`
    StoreAt,
    /// `IndexAt`
    IndexAt,
    /// `CreateLocalArray`
    CreateLocalArray,
    /// `CreateLocalStruct`
    CreateLocalStruct,
    /// One of the binary operations
    Binary(BinaryOp),
    /// `Negate`
    Negate,
    /// `ConvertTo`
    ConvertTo,
    /// `UnsignedConvertTo`
    UnsignedConvertTo,
    /// `NewIlBuilder`
    NewIlBuilder,
    /// `AppendBuilder`
    AppendBuilder,
    /// `IfThenElse`, with or without the else path
    IfThenElse,
    /// `IfCmpEqualZero`
    IfCmpEqualZero,
    /// `IfCmpNotEqualZero`
    IfCmpNotEqualZero,
    /// `ForLoop`
    ForLoop,
    /// `Call`
    Call,
    /// `ReturnValue`
    ReturnValue,
    /// `Return`
    Return,
}

const NON_BINARY: [StatementKind; 39] = [
    StatementKind::NewMethodBuilder,
    StatementKind::DefineLine,
    StatementKind::DefineFile,
    StatementKind::DefineName,
    StatementKind::DefineParameter,
    StatementKind::DefineArrayParameter,
    StatementKind::DefineLocal,
    StatementKind::PrimitiveType,
    StatementKind::PointerType,
    StatementKind::DefineReturnType,
    StatementKind::DefineFunction,
    StatementKind::AllLocalsHaveBeenDefined,
    StatementKind::DoneConstructor,
    StatementKind::ConstInt8,
    StatementKind::ConstInt16,
    StatementKind::ConstInt32,
    StatementKind::ConstInt64,
    StatementKind::ConstFloat,
    StatementKind::ConstDouble,
    StatementKind::ConstAddress,
    StatementKind::Load,
    StatementKind::LoadAt,
    StatementKind::Store,
    StatementKind::StoreAt,
    StatementKind::IndexAt,
    StatementKind::CreateLocalArray,
    StatementKind::CreateLocalStruct,
    StatementKind::Negate,
    StatementKind::ConvertTo,
    StatementKind::UnsignedConvertTo,
    StatementKind::NewIlBuilder,
    StatementKind::AppendBuilder,
    StatementKind::IfThenElse,
    StatementKind::IfCmpEqualZero,
    StatementKind::IfCmpNotEqualZero,
    StatementKind::ForLoop,
    StatementKind::Call,
    StatementKind::ReturnValue,
    StatementKind::Return,
];

impl StatementKind {
    /// Name as interned by the recorder
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NewMethodBuilder => "NewMethodBuilder",
            Self::DefineLine => "DefineLine",
            Self::DefineFile => "DefineFile",
            Self::DefineName => "DefineName",
            Self::DefineParameter => "DefineParameter",
            Self::DefineArrayParameter => "DefineArrayParameter",
            Self::DefineLocal => "DefineLocal",
            Self::PrimitiveType => "PrimitiveType",
            Self::PointerType => "PointerType",
            Self::DefineReturnType => "DefineReturnType",
            Self::DefineFunction => "DefineFunction",
            Self::AllLocalsHaveBeenDefined => "AllLocalsHaveBeenDefined",
            Self::DoneConstructor => "DoneConstructor",
            Self::ConstInt8 => "ConstInt8",
            Self::ConstInt16 => "ConstInt16",
            Self::ConstInt32 => "ConstInt32",
            Self::ConstInt64 => "ConstInt64",
            Self::ConstFloat => "ConstFloat",
            Self::ConstDouble => "ConstDouble",
            Self::ConstAddress => "ConstAddress",
            Self::Load => "Load",
            Self::LoadAt => "LoadAt",
            Self::Store => "Store",
            Self::StoreAt => "StoreAt",
            Self::IndexAt => "IndexAt",
            Self::CreateLocalArray => "CreateLocalArray",
            Self::CreateLocalStruct => "CreateLocalStruct",
            Self::Binary(op) => op.name(),
            Self::Negate => "Negate",
            Self::ConvertTo => "ConvertTo",
            Self::UnsignedConvertTo => "UnsignedConvertTo",
            Self::NewIlBuilder => "NewIlBuilder",
            Self::AppendBuilder => "AppendBuilder",
            Self::IfThenElse => "IfThenElse",
            Self::IfCmpEqualZero => "IfCmpEqualZero",
            Self::IfCmpNotEqualZero => "IfCmpNotEqualZero",
            Self::ForLoop => "ForLoop",
            Self::Call => "Call",
            Self::ReturnValue => "ReturnValue",
            Self::Return => "Return",
        }
    }

    /// Look up by interned name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        BinaryOp::from_name(name)
            .map(Self::Binary)
            .or_else(|| NON_BINARY.into_iter().find(|kind| kind.name() == name))
    }

    /// Binary operation, if this is one
    #[must_use]
    pub const fn binary_op(self) -> Option<BinaryOp> {
        match self {
            Self::Binary(op) => Some(op),
            _ => None,
        }
    }

    /// Whether the statement configures the method rather than emitting IL
    #[must_use]
    pub const fn is_method_shape(self) -> bool {
        matches!(
            self,
            Self::NewMethodBuilder
                | Self::DefineLine
                | Self::DefineFile
                | Self::DefineName
                | Self::DefineParameter
                | Self::DefineArrayParameter
                | Self::DefineLocal
                | Self::PrimitiveType
                | Self::PointerType
                | Self::DefineReturnType
                | Self::DefineFunction
                | Self::AllLocalsHaveBeenDefined
                | Self::DoneConstructor
        )
    }

    /// Whether the statement may be dispatched in `phase`
    ///
    /// Locals and types may still be declared while IL is being built.
    #[must_use]
    pub const fn allowed_in(self, phase: Phase) -> bool {
        match phase {
            Phase::Constructor => self.is_method_shape(),
            Phase::BuildIL => {
                !self.is_method_shape()
                    || matches!(
                        self,
                        Self::DefineLocal
                            | Self::PrimitiveType
                            | Self::PointerType
                            | Self::AllLocalsHaveBeenDefined
                    )
            }
            Phase::Done => false,
        }
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_roundtrip() {
        for kind in NON_BINARY {
            assert_eq!(StatementKind::from_name(kind.name()), Some(kind));
        }
        for op in BinaryOp::ALL {
            let kind = StatementKind::Binary(op);
            assert_eq!(StatementKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.binary_op(), Some(op));
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(StatementKind::from_name("Frobnicate"), None);
        assert_eq!(StatementKind::from_name("add"), None);
    }

    #[test]
    fn test_phase_tables() {
        use StatementKind::*;
        assert!(DefineParameter.allowed_in(Phase::Constructor));
        assert!(!DefineParameter.allowed_in(Phase::BuildIL));
        assert!(DefineLocal.allowed_in(Phase::Constructor));
        assert!(DefineLocal.allowed_in(Phase::BuildIL));
        assert!(PrimitiveType.allowed_in(Phase::BuildIL));
        assert!(!Binary(BinaryOp::Add).allowed_in(Phase::Constructor));
        assert!(Binary(BinaryOp::Add).allowed_in(Phase::BuildIL));
        assert!(!Call.allowed_in(Phase::Constructor));
        assert!(!DoneConstructor.allowed_in(Phase::BuildIL));
        assert!(!Return.allowed_in(Phase::Done));
    }
}
