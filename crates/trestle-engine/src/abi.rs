use anyhow::bail;
use trestle_bridge::ArgPtr;
use wasmtime::component::{Type, Val};

/// Read a scalar of component type `ty` from a pinned argument address.
///
/// # Safety
///
/// `addr` must point to a live, properly aligned host value whose
/// representation matches `ty`, pinned for the duration of the call.
pub(crate) unsafe fn lift(ty: &Type, addr: ArgPtr) -> anyhow::Result<Val> {
    let val = match ty {
        Type::Bool => Val::Bool(unsafe { *addr.cast::<u8>() } != 0),
        Type::U8 => Val::U8(unsafe { *addr.cast::<u8>() }),
        Type::S8 => Val::S8(unsafe { *addr.cast::<i8>() }),
        Type::U16 => Val::U16(unsafe { *addr.cast::<u16>() }),
        Type::S16 => Val::S16(unsafe { *addr.cast::<i16>() }),
        Type::U32 => Val::U32(unsafe { *addr.cast::<u32>() }),
        Type::S32 => Val::S32(unsafe { *addr.cast::<i32>() }),
        Type::U64 => Val::U64(unsafe { *addr.cast::<u64>() }),
        Type::S64 => Val::S64(unsafe { *addr.cast::<i64>() }),
        Type::Float32 => Val::Float32(unsafe { *addr.cast::<f32>() }),
        Type::Float64 => Val::Float64(unsafe { *addr.cast::<f64>() }),
        Type::Char => {
            let raw = unsafe { *addr.cast::<u32>() };
            match char::from_u32(raw) {
                Some(c) => Val::Char(c),
                None => bail!("invalid char value {raw:#x}"),
            }
        }
        other => bail!(
            "unsupported parameter type {other:?}: only scalar values may cross the boundary"
        ),
    };
    Ok(val)
}

/// Write a scalar result back to its pinned address.
///
/// # Safety
///
/// Same contract as [`lift`]: `addr` must point to writable, properly
/// aligned storage for the value's host representation.
pub(crate) unsafe fn lower(val: &Val, addr: ArgPtr) -> anyhow::Result<()> {
    match val {
        Val::Bool(v) => unsafe { *addr.cast::<u8>() = u8::from(*v) },
        Val::U8(v) => unsafe { *addr.cast::<u8>() = *v },
        Val::S8(v) => unsafe { *addr.cast::<i8>() = *v },
        Val::U16(v) => unsafe { *addr.cast::<u16>() = *v },
        Val::S16(v) => unsafe { *addr.cast::<i16>() = *v },
        Val::U32(v) => unsafe { *addr.cast::<u32>() = *v },
        Val::S32(v) => unsafe { *addr.cast::<i32>() = *v },
        Val::U64(v) => unsafe { *addr.cast::<u64>() = *v },
        Val::S64(v) => unsafe { *addr.cast::<i64>() = *v },
        Val::Float32(v) => unsafe { *addr.cast::<f32>() = *v },
        Val::Float64(v) => unsafe { *addr.cast::<f64>() = *v },
        Val::Char(v) => unsafe { *addr.cast::<u32>() = *v as u32 },
        other => bail!(
            "unsupported result type for value {other:?}: only scalar values may cross the boundary"
        ),
    }
    Ok(())
}
