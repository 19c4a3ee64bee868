//! Branch prediction hints. Plain identity functions on stable; kept so hot
//! paths read the same as they would with the intrinsics enabled.

#[inline]
pub(crate) fn likely(b: bool) -> bool {
    b
}

#[inline]
pub(crate) fn unlikely(b: bool) -> bool {
    b
}
