use sched_api::Pid;

/// Opaque identifier matching a sleeper to the wakeup that resumes it
///
/// Two channels are equal only if they name the same object, so unrelated
/// subsystems never wake each other by accident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// A process, by pid: parents wait here for their children
    Proc(Pid),
    /// The global tick counter
    Ticks,
    /// Any other kernel object, by address
    Addr(usize),
}

impl Channel {
    /// Channel naming the object behind `obj`
    pub fn of<T: ?Sized>(obj: &T) -> Self {
        Channel::Addr(obj as *const T as *const u8 as usize)
    }
}
