/// An opaque, boolean-valued predicate the queue evaluates. The queue never
/// inspects `C` beyond calling `check`; everything else about it (what data
/// it closes over, how expensive it is) is the caller's concern.
pub trait Check: Send {
    fn check(&self) -> bool;
}

impl<F> Check for F
where
    F: Fn() -> bool + Send,
{
    fn check(&self) -> bool {
        self()
    }
}
