use crate::core::HandlerError;

/// Receives decoded records from `BagReader::read`, one call per record.
///
/// `ctx` is an opaque caller-owned value threaded through every call.
/// Returning an error stops the read; the error reaches the caller of
/// `read` unchanged inside `Error::Handler`.
pub trait Handler<M, C: ?Sized> {
    fn handle(&mut self, msg: M, ctx: &mut C) -> Result<(), HandlerError>;
}

impl<M, C, F> Handler<M, C> for F
where
    C: ?Sized,
    F: FnMut(M, &mut C) -> Result<(), HandlerError>,
{
    fn handle(&mut self, msg: M, ctx: &mut C) -> Result<(), HandlerError> {
        self(msg, ctx)
    }
}
