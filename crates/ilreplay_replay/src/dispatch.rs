//! Statement dispatcher.
//!
//! Each handler decodes its fixed argument shape from the cursor, checks that
//! nothing is left over, makes exactly one builder call and registers any
//! result under the ID the log declared for it. Arguments are fully decoded
//! and resolved before the builder is called, so a malformed line never
//! reaches the builder.

use crate::api::{BinaryOp, BuilderRef, ForLoopArgs, FunctionSignature, IlBuilderApi, TypeRef, ValueRef};
use crate::registry::{Handle, Registry};
use crate::statement::StatementKind;
use ilreplay_core::{BuilderError, IdTag, LexError, LogId, ProtocolError, ReplayError, ReplayResult};
use ilreplay_log::TokenCursor;
use tracing::trace;

/// Dispatch one statement
///
/// `args` must be positioned at the statement's first argument.
///
/// # Errors
///
/// Returns error if the arguments do not match the statement's shape, an ID
/// does not resolve, or the builder call fails
pub fn dispatch<B: IlBuilderApi + ?Sized>(
    kind: StatementKind,
    owner: LogId,
    args: TokenCursor<'_>,
    registry: &mut Registry,
    builder: &mut B,
) -> ReplayResult<()> {
    Dispatcher {
        owner,
        args,
        registry,
        builder,
    }
    .run(kind)
}

struct Dispatcher<'a, 'l, B: ?Sized> {
    owner: LogId,
    args: TokenCursor<'l>,
    registry: &'a mut Registry,
    builder: &'a mut B,
}

impl<'l, B: IlBuilderApi + ?Sized> Dispatcher<'_, 'l, B> {
    fn run(mut self, kind: StatementKind) -> ReplayResult<()> {
        match kind {
            StatementKind::NewMethodBuilder => self.new_method_builder(),
            StatementKind::DefineLine => {
                let (mb, text) = self.method_text()?;
                Ok(self.builder.define_line(mb, &text)?)
            }
            StatementKind::DefineFile => {
                let (mb, text) = self.method_text()?;
                Ok(self.builder.define_file(mb, &text)?)
            }
            StatementKind::DefineName => {
                let (mb, text) = self.method_text()?;
                Ok(self.builder.define_name(mb, &text)?)
            }
            StatementKind::DefineParameter => {
                let mb = self.owner_method()?;
                let (ty, name) = self.typed_name()?;
                Ok(self.builder.define_parameter(mb, &name, ty)?)
            }
            StatementKind::DefineArrayParameter => {
                let mb = self.owner_method()?;
                let (ty, name) = self.typed_name()?;
                Ok(self.builder.define_array_parameter(mb, &name, ty)?)
            }
            StatementKind::DefineLocal => {
                let b = self.owner_builder()?;
                let (ty, name) = self.typed_name()?;
                Ok(self.builder.define_local(b, &name, ty)?)
            }
            StatementKind::PrimitiveType => self.primitive_type(),
            StatementKind::PointerType => self.pointer_type(),
            StatementKind::DefineReturnType => {
                let mb = self.owner_method()?;
                let ty = self.ty()?;
                self.args.finish()?;
                Ok(self.builder.define_return_type(mb, ty)?)
            }
            StatementKind::DefineFunction => self.define_function(),
            StatementKind::AllLocalsHaveBeenDefined => {
                let mb = self.owner_method()?;
                self.args.finish()?;
                Ok(self.builder.all_locals_have_been_defined(mb)?)
            }
            // consumed by the phase machine before dispatch
            StatementKind::DoneConstructor => Ok(()),
            StatementKind::ConstInt8 => self.constant(|args| int_arg::<i8>(args, "Int8"), |api, b, v| {
                api.const_int8(b, v)
            }),
            StatementKind::ConstInt16 => self.constant(|args| int_arg::<i16>(args, "Int16"), |api, b, v| {
                api.const_int16(b, v)
            }),
            StatementKind::ConstInt32 => self.constant(int32_arg, |api, b, v| api.const_int32(b, v)),
            StatementKind::ConstInt64 => {
                self.constant(TokenCursor::next_i64, |api, b, v| api.const_int64(b, v))
            }
            #[allow(clippy::cast_possible_truncation)]
            StatementKind::ConstFloat => self.constant(TokenCursor::next_f64, |api, b, v| {
                api.const_float(b, v as f32)
            }),
            StatementKind::ConstDouble => {
                self.constant(TokenCursor::next_f64, |api, b, v| api.const_double(b, v))
            }
            StatementKind::ConstAddress => {
                self.constant(TokenCursor::next_address, |api, b, v| api.const_address(b, v))
            }
            StatementKind::Load => {
                let b = self.owner_builder()?;
                let result = self.args.next_reference(IdTag::Value)?;
                let name = self.args.next_text()?;
                self.args.finish()?;
                let v = self.builder.load(b, &name)?;
                self.bind_value(result, v)
            }
            StatementKind::LoadAt => {
                let b = self.owner_builder()?;
                let result = self.args.next_reference(IdTag::Value)?;
                let ty = self.ty()?;
                let address = self.value()?;
                self.args.finish()?;
                let v = self.builder.load_at(b, ty, address)?;
                self.bind_value(result, v)
            }
            StatementKind::Store => {
                let b = self.owner_builder()?;
                let name = self.args.next_text()?;
                let value = self.value()?;
                self.args.finish()?;
                Ok(self.builder.store(b, &name, value)?)
            }
            StatementKind::StoreAt => {
                let b = self.owner_builder()?;
                let address = self.value()?;
                let value = self.value()?;
                self.args.finish()?;
                Ok(self.builder.store_at(b, address, value)?)
            }
            StatementKind::IndexAt => {
                let b = self.owner_builder()?;
                let result = self.args.next_reference(IdTag::Value)?;
                let ty = self.ty()?;
                let base = self.value()?;
                let index = self.value()?;
                self.args.finish()?;
                let v = self.builder.index_at(b, ty, base, index)?;
                self.bind_value(result, v)
            }
            StatementKind::CreateLocalArray => {
                let b = self.owner_builder()?;
                let result = self.args.next_reference(IdTag::Value)?;
                let count = self.args.next_count()?;
                let elem = self.ty()?;
                self.args.finish()?;
                let v = self.builder.create_local_array(b, count, elem)?;
                self.bind_value(result, v)
            }
            StatementKind::CreateLocalStruct => {
                let b = self.owner_builder()?;
                let result = self.args.next_reference(IdTag::Value)?;
                let ty = self.ty()?;
                self.args.finish()?;
                let v = self.builder.create_local_struct(b, ty)?;
                self.bind_value(result, v)
            }
            StatementKind::Binary(op) => self.binary(op),
            StatementKind::Negate => {
                let b = self.owner_builder()?;
                let result = self.args.next_reference(IdTag::Value)?;
                let operand = self.value()?;
                self.args.finish()?;
                let v = self.builder.negate(b, operand)?;
                self.bind_value(result, v)
            }
            StatementKind::ConvertTo => self.convert(false),
            StatementKind::UnsignedConvertTo => self.convert(true),
            StatementKind::NewIlBuilder => {
                let b = self.owner_builder()?;
                let result = self.args.next_reference(IdTag::Builder)?;
                self.args.finish()?;
                let orphan = self.builder.orphan_builder(b)?;
                self.bind(result, Handle::IlBuilder(orphan))
            }
            StatementKind::AppendBuilder => {
                let b = self.owner_builder()?;
                let target = self.builder_arg()?;
                self.args.finish()?;
                Ok(self.builder.append_builder(b, target)?)
            }
            StatementKind::IfThenElse => self.if_then_else(),
            StatementKind::IfCmpEqualZero => {
                let (b, target, cond) = self.branch_args()?;
                Ok(self.builder.if_cmp_equal_zero(b, target, cond)?)
            }
            StatementKind::IfCmpNotEqualZero => {
                let (b, target, cond) = self.branch_args()?;
                Ok(self.builder.if_cmp_not_equal_zero(b, target, cond)?)
            }
            StatementKind::ForLoop => self.for_loop(),
            StatementKind::Call => self.call(),
            StatementKind::ReturnValue => {
                let b = self.owner_builder()?;
                let value = self.value()?;
                self.args.finish()?;
                Ok(self.builder.return_value(b, value)?)
            }
            StatementKind::Return => {
                let b = self.owner_builder()?;
                self.args.finish()?;
                Ok(self.builder.return_void(b)?)
            }
        }
    }

    fn new_method_builder(&mut self) -> ReplayResult<()> {
        let declared = self.args.next_reference(IdTag::Builder)?;
        self.args.finish()?;
        if declared != self.owner {
            return Err(ProtocolError::OwnerMismatch {
                owner: self.owner,
                declared,
            }
            .into());
        }
        self.owner_method()?;
        Ok(())
    }

    fn primitive_type(&mut self) -> ReplayResult<()> {
        let b = self.owner_builder()?;
        let result = self.args.next_reference(IdTag::Type)?;
        let dt = self.args.next_data_type()?;
        self.args.finish()?;
        let ty = self.builder.primitive_type(b, dt)?;
        self.bind(result, Handle::Type(ty))
    }

    fn pointer_type(&mut self) -> ReplayResult<()> {
        let b = self.owner_builder()?;
        let result = self.args.next_reference(IdTag::Type)?;
        let base = self.ty()?;
        self.args.finish()?;
        let ty = self.builder.pointer_to(b, base)?;
        self.bind(result, Handle::Type(ty))
    }

    fn define_function(&mut self) -> ReplayResult<()> {
        let mb = self.owner_method()?;
        let name = self.args.next_text()?;
        let file = self.args.next_text()?;
        let line = self.args.next_text()?;
        let entry = self.args.next_address()?;
        let return_type = self.ty()?;
        let count = self.args.next_count()?;
        let params = (0..count).map(|_| self.ty()).collect::<ReplayResult<Vec<_>>>()?;
        self.args.finish()?;

        let sig = FunctionSignature {
            name,
            file,
            line,
            entry,
            return_type,
            params,
        };
        Ok(self.builder.define_function(mb, sig)?)
    }

    fn constant<T>(
        &mut self,
        decode: impl FnOnce(&mut TokenCursor<'l>) -> ReplayResult<T>,
        emit: impl FnOnce(&mut B, BuilderRef, T) -> Result<ValueRef, BuilderError>,
    ) -> ReplayResult<()> {
        let b = self.owner_builder()?;
        let result = self.args.next_reference(IdTag::Value)?;
        let literal = decode(&mut self.args)?;
        self.args.finish()?;
        let v = emit(&mut *self.builder, b, literal)?;
        self.bind_value(result, v)
    }

    fn binary(&mut self, op: BinaryOp) -> ReplayResult<()> {
        let b = self.owner_builder()?;
        let result = self.args.next_reference(IdTag::Value)?;
        let left = self.value()?;
        let right = self.value()?;
        self.args.finish()?;
        let v = self.builder.binary(b, op, left, right)?;
        self.bind_value(result, v)
    }

    fn convert(&mut self, unsigned: bool) -> ReplayResult<()> {
        let b = self.owner_builder()?;
        let result = self.args.next_reference(IdTag::Value)?;
        let ty = self.ty()?;
        let value = self.value()?;
        self.args.finish()?;
        let v = if unsigned {
            self.builder.unsigned_convert_to(b, ty, value)?
        } else {
            self.builder.convert_to(b, ty, value)?
        };
        self.bind_value(result, v)
    }

    fn if_then_else(&mut self) -> ReplayResult<()> {
        let b = self.owner_builder()?;
        let then_path = self.builder_arg()?;
        let else_path = match self.args.next_optional_builder()? {
            Some(id) => Some(self.registry.builder(id)?),
            None => None,
        };
        let cond = self.value()?;
        self.args.finish()?;

        match else_path {
            Some(else_path) => self.builder.if_then_else(b, then_path, else_path, cond)?,
            None => self.builder.if_then(b, then_path, cond)?,
        }
        Ok(())
    }

    fn branch_args(&mut self) -> ReplayResult<(BuilderRef, BuilderRef, ValueRef)> {
        let b = self.owner_builder()?;
        let target = self.builder_arg()?;
        let cond = self.value()?;
        self.args.finish()?;
        Ok((b, target, cond))
    }

    fn for_loop(&mut self) -> ReplayResult<()> {
        let b = self.owner_builder()?;
        let count_up = self.args.next_bool()?;
        let induction_var = self.args.next_text()?;
        let body = self.builder_arg()?;
        let break_id = self.args.next_optional_builder()?;
        let continue_id = self.args.next_optional_builder()?;
        let initial = self.value()?;
        let limit = self.value()?;
        let increment = self.value()?;
        self.args.finish()?;

        let exits = self.builder.for_loop(
            b,
            &ForLoopArgs {
                count_up,
                induction_var,
                body,
                want_break: break_id.is_some(),
                want_continue: continue_id.is_some(),
                initial,
                limit,
                increment,
            },
        )?;

        if let Some(id) = break_id {
            let exit = exits.break_builder.ok_or_else(|| missing_output(StatementKind::ForLoop, id))?;
            self.bind(id, Handle::IlBuilder(exit))?;
        }
        if let Some(id) = continue_id {
            let exit = exits
                .continue_builder
                .ok_or_else(|| missing_output(StatementKind::ForLoop, id))?;
            self.bind(id, Handle::IlBuilder(exit))?;
        }
        Ok(())
    }

    fn call(&mut self) -> ReplayResult<()> {
        let b = self.owner_builder()?;
        let name = self.args.next_text()?;
        let count = self.args.next_count()?;
        let values = (0..count).map(|_| self.value()).collect::<ReplayResult<Vec<_>>>()?;
        // The recorder writes the result ID only when the call produced one.
        let result = self.args.next_trailing_reference(IdTag::Value)?;
        self.args.finish()?;

        let returned = self.builder.call(b, &name, &values)?;
        match result {
            Some(id) => {
                let v = returned.ok_or_else(|| missing_output(StatementKind::Call, id))?;
                self.bind_value(id, v)
            }
            None => Ok(()),
        }
    }

    // argument helpers

    fn owner_builder(&self) -> ReplayResult<BuilderRef> {
        Ok(self.registry.builder(self.owner)?)
    }

    fn owner_method(&self) -> ReplayResult<BuilderRef> {
        Ok(self.registry.method_builder(self.owner)?)
    }

    fn method_text(&mut self) -> ReplayResult<(BuilderRef, String)> {
        let mb = self.owner_method()?;
        let text = self.args.next_text()?;
        self.args.finish()?;
        Ok((mb, text))
    }

    fn typed_name(&mut self) -> ReplayResult<(TypeRef, String)> {
        let ty = self.ty()?;
        let name = self.args.next_text()?;
        self.args.finish()?;
        Ok((ty, name))
    }

    fn value(&mut self) -> ReplayResult<ValueRef> {
        let id = self.args.next_reference(IdTag::Value)?;
        Ok(self.registry.value(id)?)
    }

    fn ty(&mut self) -> ReplayResult<TypeRef> {
        let id = self.args.next_reference(IdTag::Type)?;
        Ok(self.registry.ty(id)?)
    }

    fn builder_arg(&mut self) -> ReplayResult<BuilderRef> {
        let id = self.args.next_reference(IdTag::Builder)?;
        Ok(self.registry.builder(id)?)
    }

    fn bind_value(&mut self, id: LogId, v: ValueRef) -> ReplayResult<()> {
        self.bind(id, Handle::Value(v))
    }

    fn bind(&mut self, id: LogId, handle: Handle) -> ReplayResult<()> {
        trace!(owner = %self.owner, %id, kind = %handle.kind(), "registering result");
        self.registry.register(id, handle)?;
        Ok(())
    }
}

fn missing_output(kind: StatementKind, id: LogId) -> ReplayError {
    ProtocolError::MissingOutput {
        statement: kind.name().to_string(),
        id,
    }
    .into()
}

fn int_arg<T: TryFrom<i64>>(args: &mut TokenCursor<'_>, type_name: &str) -> ReplayResult<T> {
    let token = args.peek().map(|raw| raw.text.to_string()).unwrap_or_default();
    let n = args.next_i64()?;
    T::try_from(n).map_err(|_| out_of_range(token, type_name))
}

/// Int32 literals may be recorded unsigned; those are reinterpreted.
#[allow(clippy::cast_possible_wrap)]
fn int32_arg(args: &mut TokenCursor<'_>) -> ReplayResult<i32> {
    let token = args.peek().map(|raw| raw.text.to_string()).unwrap_or_default();
    let n = args.next_i64()?;
    i32::try_from(n)
        .or_else(|_| u32::try_from(n).map(|u| u as i32))
        .map_err(|_| out_of_range(token, "Int32"))
}

fn out_of_range(token: String, type_name: &str) -> ReplayError {
    LexError::Malformed {
        token,
        reason: format!("literal out of range for {}", type_name),
    }
    .into()
}
